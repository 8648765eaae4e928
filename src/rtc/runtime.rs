use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::id::{SocketId, UserId};
use crate::protocol::{Role, StreamQuality, User, UserStatus};

////////////////////////////////////////////////////////////////////////////////

/// Chat history kept per room. The oldest message is dropped beyond this.
pub(crate) const MESSAGE_HISTORY_LIMIT: usize = 100;

/// A connected user inside one room. Never persisted.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Participant {
    pub(crate) id: UserId,
    pub(crate) username: String,
    pub(crate) role: Role,
    pub(crate) status: UserStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) email: Option<String>,
    pub(crate) socket_id: SocketId,
    pub(crate) joined_at: DateTime<Utc>,
    pub(crate) can_stream: bool,
    pub(crate) can_chat: bool,
    pub(crate) can_screen_share: bool,
    pub(crate) is_streaming: bool,
    pub(crate) hand_raised: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) hand_raised_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub(crate) fn new(user: User, socket_id: SocketId) -> Self {
        let privileged = user.role.is_privileged();

        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            status: user.status,
            display_name: user.display_name,
            email: user.email,
            socket_id,
            joined_at: Utc::now(),
            can_stream: privileged,
            can_chat: true,
            can_screen_share: privileged,
            is_streaming: false,
            hand_raised: false,
            hand_raised_at: None,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChatMessage {
    pub(crate) user_id: UserId,
    pub(crate) username: String,
    pub(crate) content: String,
    pub(crate) timestamp: DateTime<Utc>,
    pub(crate) seq: u64,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StreamInfo {
    pub(crate) streamer_id: UserId,
    pub(crate) quality: StreamQuality,
    pub(crate) started_at: DateTime<Utc>,
}

////////////////////////////////////////////////////////////////////////////////

/// Mutable in-memory state of one room. Guarded by a per-room mutex owned by
/// the core; everything in here is touched under that lock.
#[derive(Debug)]
pub(crate) struct RoomRuntime {
    pub(crate) participants: HashMap<SocketId, Participant>,
    messages: VecDeque<ChatMessage>,
    message_sequence: u64,
    pub(crate) stream: Option<StreamInfo>,
    pub(crate) last_activity: DateTime<Utc>,
}

impl RoomRuntime {
    pub(crate) fn new() -> Self {
        Self {
            participants: HashMap::new(),
            messages: VecDeque::new(),
            message_sequence: 0,
            stream: None,
            last_activity: Utc::now(),
        }
    }

    pub(crate) fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Stamps, appends and returns the message; drops the oldest entry once
    /// the history exceeds [`MESSAGE_HISTORY_LIMIT`].
    pub(crate) fn push_message(
        &mut self,
        user_id: UserId,
        username: String,
        content: String,
    ) -> ChatMessage {
        self.message_sequence += 1;

        let message = ChatMessage {
            user_id,
            username,
            content,
            timestamp: Utc::now(),
            seq: self.message_sequence,
        };

        self.messages.push_back(message.clone());

        while self.messages.len() > MESSAGE_HISTORY_LIMIT {
            self.messages.pop_front();
        }

        self.touch();
        message
    }

    pub(crate) fn messages(&self) -> Vec<ChatMessage> {
        self.messages.iter().cloned().collect()
    }

    pub(crate) fn participant_by_user(&mut self, user_id: &UserId) -> Option<&mut Participant> {
        self.participants
            .values_mut()
            .find(|participant| participant.id == *user_id)
    }
}

////////////////////////////////////////////////////////////////////////////////
