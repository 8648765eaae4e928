use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, Deserialize, Serialize, Display, Hash, PartialEq, Eq)]
pub(crate) struct RoomId(String);

impl RoomId {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Display, Hash, PartialEq, Eq)]
pub(crate) struct LectureId(String);

impl LectureId {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Display, Hash, PartialEq, Eq)]
pub(crate) struct UserId(String);

impl UserId {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Identifies a single WebSocket connection for its whole lifetime.
#[derive(Copy, Clone, Debug, Deserialize, Serialize, Display, Hash, PartialEq, Eq)]
pub(crate) struct SocketId(Uuid);

impl SocketId {
    pub(crate) fn random() -> Self {
        Self(Uuid::new_v4())
    }
}
