//! Client → server events.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::{StreamQuality, User};
use crate::db::id::{RoomId, SocketId, UserId};

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub(crate) enum ClientEvent {
    JoinRoom(JoinRoom),
    LeaveRoom(LeaveRoom),
    SendMessage(SendMessage),
    StartStream(StartStream),
    StopStream(StopStream),
    WebrtcOffer(WebrtcOffer),
    WebrtcAnswer(WebrtcAnswer),
    WebrtcIceCandidate(WebrtcIceCandidate),
    RecordingStarted(RecordingStarted),
    RecordingStopped(RecordingStopped),
    RaiseHand(Hand),
    LowerHand(Hand),
}

impl ClientEvent {
    pub(crate) fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// The event name, for logging.
    pub(crate) fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom(_) => "join_room",
            ClientEvent::LeaveRoom(_) => "leave_room",
            ClientEvent::SendMessage(_) => "send_message",
            ClientEvent::StartStream(_) => "start_stream",
            ClientEvent::StopStream(_) => "stop_stream",
            ClientEvent::WebrtcOffer(_) => "webrtc_offer",
            ClientEvent::WebrtcAnswer(_) => "webrtc_answer",
            ClientEvent::WebrtcIceCandidate(_) => "webrtc_ice_candidate",
            ClientEvent::RecordingStarted(_) => "recording_started",
            ClientEvent::RecordingStopped(_) => "recording_stopped",
            ClientEvent::RaiseHand(_) => "raise_hand",
            ClientEvent::LowerHand(_) => "lower_hand",
        }
    }
}

////////////////////////////////////////////////////////////////////////////////

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct JoinRoom {
    pub(crate) room_id: RoomId,
    pub(crate) user: User,
}

/// Older clients send the room id bare, newer ones wrap it in an object.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum LeaveRoom {
    Bare(RoomId),
    #[serde(rename_all = "camelCase")]
    Wrapped {
        room_id: RoomId,
    },
}

impl LeaveRoom {
    pub(crate) fn room_id(self) -> RoomId {
        match self {
            LeaveRoom::Bare(room_id) => room_id,
            LeaveRoom::Wrapped { room_id } => room_id,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendMessage {
    pub(crate) room_id: RoomId,
    pub(crate) message: OutgoingChatMessage,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct OutgoingChatMessage {
    pub(crate) user_id: UserId,
    pub(crate) username: String,
    pub(crate) content: String,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StartStream {
    pub(crate) room_id: RoomId,
    pub(crate) user_id: UserId,
    pub(crate) quality: StreamQuality,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StopStream {
    pub(crate) room_id: RoomId,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WebrtcOffer {
    #[allow(dead_code)]
    pub(crate) room_id: RoomId,
    pub(crate) peer_id: SocketId,
    pub(crate) offer: JsonValue,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WebrtcAnswer {
    #[allow(dead_code)]
    pub(crate) room_id: RoomId,
    pub(crate) peer_id: SocketId,
    pub(crate) answer: JsonValue,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WebrtcIceCandidate {
    #[allow(dead_code)]
    pub(crate) room_id: RoomId,
    pub(crate) peer_id: SocketId,
    pub(crate) candidate: JsonValue,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecordingStarted {
    pub(crate) room_id: RoomId,
    pub(crate) teacher_id: UserId,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RecordingStopped {
    pub(crate) room_id: RoomId,
    pub(crate) teacher_id: UserId,
    pub(crate) duration: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Hand {
    pub(crate) room_id: RoomId,
    pub(crate) user_id: UserId,
}

////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_join_room() {
        let raw = json!({
            "event": "join_room",
            "data": {
                "roomId": "test-room-1",
                "user": {
                    "id": "U2",
                    "username": "student",
                    "role": "student",
                },
            },
        });

        match ClientEvent::parse(&raw.to_string()).expect("Failed to parse") {
            ClientEvent::JoinRoom(payload) => {
                assert_eq!(payload.room_id, RoomId::new("test-room-1"));
                assert_eq!(payload.user.username, "student");
                assert_eq!(payload.user.status, crate::protocol::UserStatus::Online);
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn parses_leave_room_in_both_shapes() {
        for data in [json!("test-room-1"), json!({"roomId": "test-room-1"})] {
            let raw = json!({"event": "leave_room", "data": data});

            match ClientEvent::parse(&raw.to_string()).expect("Failed to parse") {
                ClientEvent::LeaveRoom(payload) => {
                    assert_eq!(payload.room_id(), RoomId::new("test-room-1"));
                }
                other => panic!("Unexpected event: {:?}", other),
            }
        }
    }

    #[test]
    fn rejects_unknown_event() {
        let raw = json!({"event": "self_destruct", "data": {}});
        assert!(ClientEvent::parse(&raw.to_string()).is_err());
    }

    #[test]
    fn relay_payload_is_passed_through_unparsed() {
        let raw = json!({
            "event": "webrtc_offer",
            "data": {
                "roomId": "test-room-1",
                "peerId": uuid::Uuid::nil().to_string(),
                "offer": {"type": "offer", "sdp": "v=0..."},
            },
        });

        match ClientEvent::parse(&raw.to_string()).expect("Failed to parse") {
            ClientEvent::WebrtcOffer(payload) => {
                assert_eq!(payload.offer["sdp"], "v=0...");
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }
}
