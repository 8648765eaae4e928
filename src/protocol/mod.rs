//! Wire protocol: JSON frames of shape `{"event": <name>, "data": <payload>}`
//! in both directions.

use serde::{Deserialize, Serialize};

use crate::db::id::UserId;

pub(crate) mod client;
pub(crate) mod server;

pub(crate) use client::ClientEvent;
pub(crate) use server::ServerEvent;

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum Role {
    Teacher,
    Student,
    Admin,
}

impl Role {
    /// Teachers and admins may stream, screen-share and moderate.
    pub(crate) fn is_privileged(self) -> bool {
        matches!(self, Role::Teacher | Role::Admin)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum UserStatus {
    Online,
    Away,
    Offline,
}

impl Default for UserStatus {
    fn default() -> Self {
        UserStatus::Online
    }
}

/// Identity carried by the `join_room` payload. Established upstream; the
/// server takes `role` as ground truth.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct User {
    pub(crate) id: UserId,
    pub(crate) username: String,
    pub(crate) role: Role,
    #[serde(default)]
    pub(crate) status: UserStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) email: Option<String>,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub(crate) enum StreamQuality {
    Low,
    Medium,
    High,
}
