//! Server → client events.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::{Role, UserStatus};
use crate::db::{
    id::{RoomId, SocketId, UserId},
    lecture,
};
use crate::rtc::runtime::{ChatMessage, Participant, StreamInfo};

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub(crate) enum ServerEvent {
    Welcome(Welcome),
    RoomState(RoomState),
    UserJoined(UserJoined),
    UserLeft(UserLeft),
    NewMessage(ChatMessage),
    StreamStarted(StreamInfo),
    StreamStopped,
    WebrtcOffer(WebrtcOffer),
    WebrtcAnswer(WebrtcAnswer),
    WebrtcIceCandidate(WebrtcIceCandidate),
    LectureRecordingStarted(RecordingStarted),
    LectureRecordingStopped(RecordingStopped),
    MuteAll(MuteAll),
    MutedByTeacher(MutedByTeacher),
    KickedFromRoom(KickedFromRoom),
    ParticipantKicked(ParticipantKicked),
    HandRaised(HandRaised),
    HandLowered(HandLowered),
    RoomCleared(RoomCleared),
    JoinRoomError(JoinRoomError),
    Error(ErrorPayload),
}

impl ServerEvent {
    pub(crate) fn encode(&self) -> String {
        serde_json::to_string(self).expect("Server event serialization never fails")
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Welcome {
    pub(crate) message: String,
    pub(crate) timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RoomState {
    pub(crate) stream: Option<StreamInfo>,
    pub(crate) participants: Vec<Participant>,
    pub(crate) messages: Vec<ChatMessage>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserJoined {
    pub(crate) user_id: UserId,
    pub(crate) username: String,
    pub(crate) socket_id: SocketId,
    pub(crate) role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) display_name: Option<String>,
    pub(crate) status: UserStatus,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserLeft {
    pub(crate) socket_id: SocketId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) user_id: Option<UserId>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WebrtcOffer {
    pub(crate) from_peer_id: SocketId,
    pub(crate) offer: JsonValue,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WebrtcAnswer {
    pub(crate) from_peer_id: SocketId,
    pub(crate) answer: JsonValue,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WebrtcIceCandidate {
    pub(crate) from_peer_id: SocketId,
    pub(crate) candidate: JsonValue,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecordingStarted {
    pub(crate) teacher_id: UserId,
    pub(crate) timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecordingStopped {
    pub(crate) teacher_id: UserId,
    pub(crate) duration: u64,
    pub(crate) timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MuteAll {
    pub(crate) requested_by: UserId,
    pub(crate) timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MutedByTeacher {
    pub(crate) requested_by: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) reason: Option<String>,
    pub(crate) timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct KickedFromRoom {
    pub(crate) room_id: RoomId,
    pub(crate) reason: String,
    pub(crate) kicked_by: UserId,
    pub(crate) timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ParticipantKicked {
    pub(crate) user_id: UserId,
    pub(crate) reason: String,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HandRaised {
    pub(crate) user_id: UserId,
    pub(crate) username: String,
    pub(crate) timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HandLowered {
    pub(crate) user_id: UserId,
    pub(crate) timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RoomCleared {
    pub(crate) room_id: RoomId,
    pub(crate) reason: String,
    pub(crate) timestamp: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub(crate) enum JoinErrorCode {
    #[serde(rename = "ROOM_UNAVAILABLE")]
    RoomUnavailable,
    #[serde(rename = "ROOM_FULL")]
    RoomFull,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JoinRoomError {
    pub(crate) code: JoinErrorCode,
    pub(crate) message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) lecture_status: Option<lecture::Status>,
    pub(crate) room_id: RoomId,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ErrorPayload {
    pub(crate) message: String,
}

////////////////////////////////////////////////////////////////////////////////
