use serde_json::Value as JsonValue;
use tokio::sync::mpsc;

use crate::db::id::{RoomId, SocketId};
use crate::protocol::User;
use crate::rtc::{Outbound, RtcCore};

/// A fake connection: registers an outbox with the core and lets tests
/// drain what the server sent to it.
pub(crate) struct TestPeer {
    pub(crate) socket_id: SocketId,
    rx: mpsc::UnboundedReceiver<Outbound>,
}

impl TestPeer {
    pub(crate) fn connect(rtc: &RtcCore) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let socket_id = SocketId::random();
        rtc.register_connection(socket_id, tx);
        Self { socket_id, rx }
    }

    pub(crate) fn join(rtc: &RtcCore, room_id: RoomId, user: User) -> Self {
        Self::join_with_limit(rtc, room_id, user, None)
    }

    pub(crate) fn join_with_limit(
        rtc: &RtcCore,
        room_id: RoomId,
        user: User,
        limit: Option<u32>,
    ) -> Self {
        let peer = Self::connect(rtc);
        rtc.join_room(peer.socket_id, room_id, user, limit)
            .expect("Failed to join");
        peer
    }

    /// Drains everything sent so far, parsed.
    pub(crate) fn events(&mut self) -> Vec<JsonValue> {
        let mut events = Vec::new();

        while let Ok(frame) = self.rx.try_recv() {
            if let Outbound::Event(raw) = frame {
                events.push(serde_json::from_str(&raw).expect("Failed to parse frame"));
            }
        }

        events
    }

    pub(crate) fn event_names(&mut self) -> Vec<String> {
        self.events()
            .iter()
            .map(|event| event["event"].as_str().expect("No event name").to_owned())
            .collect()
    }

    /// True when a close frame has been queued for this connection.
    pub(crate) fn saw_close(&mut self) -> bool {
        while let Ok(frame) = self.rx.try_recv() {
            if matches!(frame, Outbound::Close) {
                return true;
            }
        }

        false
    }
}
