//! The real-time communication core: per-room in-memory state, event
//! fan-out, teacher controls and the lecture admission gate.

use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::anyhow;
use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::error::{Error, ErrorExt, ErrorKind};
use crate::db::{
    id::{LectureId, RoomId, SocketId, UserId},
    lecture,
};
use crate::protocol::{server, ServerEvent, StreamQuality, User};

use self::lookup::{LectureLookup, RegisteredStatus};
use self::runtime::{Participant, RoomRuntime, StreamInfo};

pub(crate) mod lookup;
pub(crate) mod runtime;

////////////////////////////////////////////////////////////////////////////////

/// How long a kicked client gets to close on its own before the server
/// closes the socket unilaterally.
pub(crate) const KICK_CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Frames queued towards one connection's writer task.
#[derive(Debug)]
pub(crate) enum Outbound {
    Event(String),
    Close,
}

#[derive(Clone, Debug)]
struct ConnectionHandle {
    tx: mpsc::UnboundedSender<Outbound>,
}

////////////////////////////////////////////////////////////////////////////////

pub(crate) struct RtcCore {
    rooms: Mutex<HashMap<RoomId, Arc<Mutex<RoomRuntime>>>>,
    lookup: Mutex<LectureLookup>,
    connections: Mutex<HashMap<SocketId, ConnectionHandle>>,
}

impl RtcCore {
    pub(crate) fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            lookup: Mutex::new(LectureLookup::default()),
            connections: Mutex::new(HashMap::new()),
        }
    }

    ////////////////////////////////////////////////////////////////////////////
    // Connection accounting

    pub(crate) fn register_connection(
        &self,
        socket_id: SocketId,
        tx: mpsc::UnboundedSender<Outbound>,
    ) {
        self.connections
            .lock()
            .insert(socket_id, ConnectionHandle { tx });
    }

    /// Socket close: the connection leaves every room it was in, and an
    /// orphaned stream is shut down with it.
    pub(crate) fn disconnect(&self, socket_id: SocketId) {
        let rooms: Vec<_> = self.rooms.lock().values().cloned().collect();

        for room in rooms {
            let mut runtime = room.lock();

            let removed = match runtime.participants.remove(&socket_id) {
                Some(participant) => participant,
                None => continue,
            };

            runtime.touch();

            self.broadcast(
                &runtime,
                &ServerEvent::UserLeft(server::UserLeft {
                    socket_id,
                    user_id: Some(removed.id.clone()),
                }),
            );

            let streamer_left = runtime
                .stream
                .as_ref()
                .map_or(false, |stream| stream.streamer_id == removed.id);

            if streamer_left {
                runtime.stream = None;
                self.broadcast(&runtime, &ServerEvent::StreamStopped);
            }
        }

        self.connections.lock().remove(&socket_id);
    }

    ////////////////////////////////////////////////////////////////////////////
    // Lifecycle gates

    pub(crate) fn register_lecture(
        &self,
        lecture_id: LectureId,
        room_id: RoomId,
        status: RegisteredStatus,
    ) {
        if status == RegisteredStatus::Active {
            warn!(
                lecture_id = %lecture_id,
                room_id = %room_id,
                "lecture registered with the legacy 'active' status"
            );
        }

        self.lookup.lock().register(lecture_id, room_id, status);
    }

    pub(crate) fn update_lecture_status(&self, lecture_id: &LectureId, status: RegisteredStatus) {
        if status == RegisteredStatus::Active {
            warn!(lecture_id = %lecture_id, "lecture moved to the legacy 'active' status");
        }

        if !self.lookup.lock().update_status(lecture_id, status) {
            warn!(lecture_id = %lecture_id, "status update for an unregistered lecture");
        }
    }

    pub(crate) fn unregister_lecture(&self, lecture_id: &LectureId) {
        self.lookup.lock().unregister(lecture_id);
    }

    pub(crate) fn is_room_available(&self, room_id: &RoomId) -> bool {
        self.lookup.lock().is_room_available(room_id)
    }

    pub(crate) fn registered_lecture(&self, room_id: &RoomId) -> Option<lookup::Registration> {
        self.lookup.lock().registration_for_room(room_id).cloned()
    }

    ////////////////////////////////////////////////////////////////////////////
    // Room membership

    /// Idempotent: an existing runtime (and its participants) is left alone.
    pub(crate) fn setup_for_room(&self, room_id: RoomId) {
        self.rooms
            .lock()
            .entry(room_id)
            .or_insert_with(|| Arc::new(Mutex::new(RoomRuntime::new())));
    }

    /// Admission plus join. Denials are answered with `join_room_error` on
    /// the joiner's socket (never with a generic error) and reported to the
    /// caller as `NoLectureActive` / `RoomFull`.
    pub(crate) fn join_room(
        &self,
        socket_id: SocketId,
        room_id: RoomId,
        user: User,
        capacity_limit: Option<u32>,
    ) -> Result<(), Error> {
        let denied = {
            let lookup = self.lookup.lock();

            match lookup.registration_for_room(&room_id) {
                Some(registration) if !registration.status.is_admissible() => {
                    Some(registration.status)
                }
                _ => None,
            }
        };

        if let Some(status) = denied {
            let lifecycle = status.lifecycle();

            info!(
                room_id = %room_id,
                lecture_status = %status,
                "join refused, lecture not admissible"
            );

            self.send_to(
                socket_id,
                &ServerEvent::JoinRoomError(server::JoinRoomError {
                    code: server::JoinErrorCode::RoomUnavailable,
                    message: denial_message(lifecycle).to_owned(),
                    lecture_status: lifecycle,
                    room_id: room_id.clone(),
                }),
            );

            return Err(anyhow!("lecture for room '{}' is {}", room_id, status))
                .error(ErrorKind::NoLectureActive);
        }

        let room = self.room_runtime(&room_id);
        let mut runtime = room.lock();

        if let Some(limit) = capacity_limit {
            if runtime.participants.len() as u32 >= limit {
                info!(room_id = %room_id, limit, "join refused, room is full");

                self.send_to(
                    socket_id,
                    &ServerEvent::JoinRoomError(server::JoinRoomError {
                        code: server::JoinErrorCode::RoomFull,
                        message: "This room is full".to_owned(),
                        lecture_status: None,
                        room_id: room_id.clone(),
                    }),
                );

                return Err(anyhow!("room '{}' is at capacity {}", room_id, limit))
                    .error(ErrorKind::RoomFull);
            }
        }

        let participant = Participant::new(user, socket_id);
        let announcement = server::UserJoined {
            user_id: participant.id.clone(),
            username: participant.username.clone(),
            socket_id,
            role: participant.role,
            display_name: participant.display_name.clone(),
            status: participant.status,
        };

        runtime.participants.insert(socket_id, participant);
        runtime.touch();

        self.send_to(
            socket_id,
            &ServerEvent::Welcome(server::Welcome {
                message: "Welcome to the room".to_owned(),
                timestamp: Utc::now(),
            }),
        );

        self.send_to(
            socket_id,
            &ServerEvent::RoomState(server::RoomState {
                stream: runtime.stream.clone(),
                participants: runtime.participants.values().cloned().collect(),
                messages: runtime.messages(),
            }),
        );

        self.broadcast_except(&runtime, &ServerEvent::UserJoined(announcement), socket_id);
        Ok(())
    }

    pub(crate) fn leave_room(&self, room_id: &RoomId, socket_id: SocketId) {
        let room = match self.rooms.lock().get(room_id).cloned() {
            Some(room) => room,
            None => return,
        };

        let mut runtime = room.lock();

        if let Some(removed) = runtime.participants.remove(&socket_id) {
            runtime.touch();

            self.broadcast(
                &runtime,
                &ServerEvent::UserLeft(server::UserLeft {
                    socket_id,
                    user_id: Some(removed.id),
                }),
            );
        }
    }

    ////////////////////////////////////////////////////////////////////////////
    // Chat

    pub(crate) fn send_message(
        &self,
        room_id: &RoomId,
        user_id: UserId,
        username: String,
        content: String,
    ) -> Result<(), Error> {
        let room = self.existing_room(room_id)?;
        let mut runtime = room.lock();

        info!(
            room_id = %room_id,
            user_id = %user_id,
            "chat message: {}",
            message_preview(&content)
        );

        let message = runtime.push_message(user_id, username, content);
        self.broadcast(&runtime, &ServerEvent::NewMessage(message));
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////
    // Stream state

    pub(crate) fn start_stream(
        &self,
        room_id: &RoomId,
        user_id: UserId,
        quality: StreamQuality,
    ) -> Result<(), Error> {
        let room = self.existing_room(room_id)?;
        let mut runtime = room.lock();

        let stream = StreamInfo {
            streamer_id: user_id.clone(),
            quality,
            started_at: Utc::now(),
        };

        runtime.stream = Some(stream.clone());

        for participant in runtime.participants.values_mut() {
            participant.is_streaming = participant.id == user_id;
        }

        runtime.touch();
        self.broadcast(&runtime, &ServerEvent::StreamStarted(stream));
        Ok(())
    }

    pub(crate) fn stop_stream(&self, room_id: &RoomId) -> Result<(), Error> {
        let room = self.existing_room(room_id)?;
        let mut runtime = room.lock();

        runtime.stream = None;

        for participant in runtime.participants.values_mut() {
            participant.is_streaming = false;
        }

        runtime.touch();
        self.broadcast(&runtime, &ServerEvent::StreamStopped);
        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////
    // WebRTC signal relay

    /// Forwards a pre-built signaling event to the addressed peer. The
    /// payload is never inspected.
    pub(crate) fn relay(&self, peer_id: SocketId, event: &ServerEvent) -> Result<(), Error> {
        let tx = self
            .connections
            .lock()
            .get(&peer_id)
            .map(|handle| handle.tx.clone());

        match tx {
            Some(tx) => {
                let _ = tx.send(Outbound::Event(event.encode()));
                Ok(())
            }
            None => Err(anyhow!("no connected peer '{}'", peer_id))
                .error(ErrorKind::ParticipantNotFound),
        }
    }

    ////////////////////////////////////////////////////////////////////////////
    // Recording notifications

    pub(crate) fn recording_started(
        &self,
        room_id: &RoomId,
        teacher_id: UserId,
    ) -> Result<(), Error> {
        let room = self.existing_room(room_id)?;
        let runtime = room.lock();

        self.broadcast(
            &runtime,
            &ServerEvent::LectureRecordingStarted(server::RecordingStarted {
                teacher_id,
                timestamp: Utc::now(),
            }),
        );

        Ok(())
    }

    pub(crate) fn recording_stopped(
        &self,
        room_id: &RoomId,
        teacher_id: UserId,
        duration: u64,
    ) -> Result<(), Error> {
        let room = self.existing_room(room_id)?;
        let runtime = room.lock();

        self.broadcast(
            &runtime,
            &ServerEvent::LectureRecordingStopped(server::RecordingStopped {
                teacher_id,
                duration,
                timestamp: Utc::now(),
            }),
        );

        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////
    // Raised hands

    pub(crate) fn raise_hand(&self, room_id: &RoomId, user_id: &UserId) -> Result<(), Error> {
        let room = self.existing_room(room_id)?;
        let mut runtime = room.lock();
        let now = Utc::now();

        let participant = runtime
            .participant_by_user(user_id)
            .ok_or_else(|| anyhow!("user '{}' is not in room '{}'", user_id, room_id))
            .error(ErrorKind::ParticipantNotFound)?;

        participant.hand_raised = true;
        participant.hand_raised_at = Some(now);
        let username = participant.username.clone();

        runtime.touch();

        self.broadcast(
            &runtime,
            &ServerEvent::HandRaised(server::HandRaised {
                user_id: user_id.clone(),
                username,
                timestamp: now,
            }),
        );

        Ok(())
    }

    pub(crate) fn lower_hand(&self, room_id: &RoomId, user_id: &UserId) -> Result<(), Error> {
        let room = self.existing_room(room_id)?;
        let mut runtime = room.lock();
        let now = Utc::now();

        let participant = runtime
            .participant_by_user(user_id)
            .ok_or_else(|| anyhow!("user '{}' is not in room '{}'", user_id, room_id))
            .error(ErrorKind::ParticipantNotFound)?;

        participant.hand_raised = false;
        participant.hand_raised_at = None;

        runtime.touch();

        self.broadcast(
            &runtime,
            &ServerEvent::HandLowered(server::HandLowered {
                user_id: user_id.clone(),
                timestamp: now,
            }),
        );

        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////
    // Teacher controls

    pub(crate) fn mute_all_participants(
        &self,
        room_id: &RoomId,
        requester_id: &UserId,
    ) -> Result<(), Error> {
        let room = self.existing_room(room_id)?;
        let runtime = room.lock();

        require_moderator(&runtime, requester_id)?;

        self.broadcast(
            &runtime,
            &ServerEvent::MuteAll(server::MuteAll {
                requested_by: requester_id.clone(),
                timestamp: Utc::now(),
            }),
        );

        Ok(())
    }

    pub(crate) fn mute_participant(
        &self,
        room_id: &RoomId,
        target_user_id: &UserId,
        requester_id: &UserId,
    ) -> Result<(), Error> {
        let room = self.existing_room(room_id)?;
        let mut runtime = room.lock();

        require_moderator(&runtime, requester_id)?;

        let target = runtime
            .participant_by_user(target_user_id)
            .ok_or_else(|| anyhow!("user '{}' is not in room '{}'", target_user_id, room_id))
            .error(ErrorKind::ParticipantNotFound)?;

        let target_socket = target.socket_id;

        self.send_to(
            target_socket,
            &ServerEvent::MutedByTeacher(server::MutedByTeacher {
                requested_by: requester_id.clone(),
                reason: None,
                timestamp: Utc::now(),
            }),
        );

        Ok(())
    }

    /// Removes the target from the room, tells everyone, and closes the
    /// socket unilaterally after [`KICK_CLOSE_GRACE`] in case the client
    /// ignores `kicked_from_room`.
    pub(crate) fn kick_participant(
        &self,
        room_id: &RoomId,
        target_user_id: &UserId,
        requester_id: &UserId,
        reason: Option<String>,
    ) -> Result<(), Error> {
        let room = self.existing_room(room_id)?;
        let mut runtime = room.lock();

        require_moderator(&runtime, requester_id)?;

        let target_socket = runtime
            .participant_by_user(target_user_id)
            .map(|participant| participant.socket_id)
            .ok_or_else(|| anyhow!("user '{}' is not in room '{}'", target_user_id, room_id))
            .error(ErrorKind::ParticipantNotFound)?;

        let reason = reason.unwrap_or_else(|| "No reason provided".to_owned());

        info!(
            room_id = %room_id,
            target = %target_user_id,
            requested_by = %requester_id,
            "kicking participant"
        );

        self.send_to(
            target_socket,
            &ServerEvent::KickedFromRoom(server::KickedFromRoom {
                room_id: room_id.clone(),
                reason: reason.clone(),
                kicked_by: requester_id.clone(),
                timestamp: Utc::now(),
            }),
        );

        runtime.participants.remove(&target_socket);
        runtime.touch();

        self.broadcast(
            &runtime,
            &ServerEvent::ParticipantKicked(server::ParticipantKicked {
                user_id: target_user_id.clone(),
                reason,
            }),
        );

        let tx = self
            .connections
            .lock()
            .get(&target_socket)
            .map(|handle| handle.tx.clone());

        if let Some(tx) = tx {
            tokio::spawn(async move {
                tokio::time::sleep(KICK_CLOSE_GRACE).await;
                let _ = tx.send(Outbound::Close);
            });
        }

        Ok(())
    }

    ////////////////////////////////////////////////////////////////////////////
    // Resource lifecycle

    /// Purges a room's runtime state and notifies whoever was still
    /// attached. Returns false when no runtime existed.
    pub(crate) fn clear_room(&self, room_id: &RoomId) -> bool {
        let room = match self.rooms.lock().remove(room_id) {
            Some(room) => room,
            None => return false,
        };

        let runtime = room.lock();
        let sockets: Vec<_> = runtime.participants.keys().copied().collect();

        info!(room_id = %room_id, participants = sockets.len(), "clearing room");

        self.send_to_sockets(
            &sockets,
            &ServerEvent::RoomCleared(server::RoomCleared {
                room_id: room_id.clone(),
                reason: "Lecture ended".to_owned(),
                timestamp: Utc::now(),
            }),
        );

        true
    }

    pub(crate) fn allocate_resources(&self, event_id: &LectureId) {
        debug!(lecture_id = %event_id, "resources allocated");
    }

    /// Callers pass either a room id or a lecture id here; the lecture id is
    /// resolved through the lookup.
    pub(crate) fn deallocate_resources(&self, event_id: &str) -> Result<(), Error> {
        if self.clear_room(&RoomId::new(event_id)) {
            return Ok(());
        }

        let via_lookup = self
            .lookup
            .lock()
            .room_of(&LectureId::new(event_id))
            .cloned();

        match via_lookup {
            Some(room_id) => {
                self.clear_room(&room_id);
                Ok(())
            }
            None => Err(anyhow!("'{}' matches neither a room nor a lecture", event_id))
                .error(ErrorKind::ResourceDeallocationFailed),
        }
    }

    /// In-memory snapshot; the store is never consulted.
    pub(crate) fn room_participants(&self, room_id: &RoomId) -> Vec<Participant> {
        match self.rooms.lock().get(room_id) {
            Some(room) => room.lock().participants.values().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub(crate) fn room_last_activity(&self, room_id: &RoomId) -> Option<chrono::DateTime<Utc>> {
        self.rooms
            .lock()
            .get(room_id)
            .map(|room| room.lock().last_activity)
    }

    ////////////////////////////////////////////////////////////////////////////

    fn room_runtime(&self, room_id: &RoomId) -> Arc<Mutex<RoomRuntime>> {
        self.rooms
            .lock()
            .entry(room_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(RoomRuntime::new())))
            .clone()
    }

    fn existing_room(&self, room_id: &RoomId) -> Result<Arc<Mutex<RoomRuntime>>, Error> {
        self.rooms
            .lock()
            .get(room_id)
            .cloned()
            .ok_or_else(|| anyhow!("no active room '{}'", room_id))
            .error(ErrorKind::RoomNotFound)
    }

    fn send_to(&self, socket_id: SocketId, event: &ServerEvent) {
        let tx = self
            .connections
            .lock()
            .get(&socket_id)
            .map(|handle| handle.tx.clone());

        if let Some(tx) = tx {
            let _ = tx.send(Outbound::Event(event.encode()));
        }
    }

    fn send_to_sockets(&self, sockets: &[SocketId], event: &ServerEvent) {
        let raw = event.encode();
        let connections = self.connections.lock();

        for socket_id in sockets {
            if let Some(handle) = connections.get(socket_id) {
                let _ = handle.tx.send(Outbound::Event(raw.clone()));
            }
        }
    }

    fn broadcast(&self, runtime: &RoomRuntime, event: &ServerEvent) {
        let raw = event.encode();
        let connections = self.connections.lock();

        for socket_id in runtime.participants.keys() {
            if let Some(handle) = connections.get(socket_id) {
                let _ = handle.tx.send(Outbound::Event(raw.clone()));
            }
        }
    }

    fn broadcast_except(&self, runtime: &RoomRuntime, event: &ServerEvent, except: SocketId) {
        let raw = event.encode();
        let connections = self.connections.lock();

        for socket_id in runtime.participants.keys() {
            if *socket_id == except {
                continue;
            }

            if let Some(handle) = connections.get(socket_id) {
                let _ = handle.tx.send(Outbound::Event(raw.clone()));
            }
        }
    }
}

fn require_moderator(runtime: &RoomRuntime, requester_id: &UserId) -> Result<(), Error> {
    let requester = runtime
        .participants
        .values()
        .find(|participant| participant.id == *requester_id)
        .ok_or_else(|| anyhow!("requester '{}' is not in the room", requester_id))
        .error(ErrorKind::Unauthorized)?;

    if !requester.role.is_privileged() {
        return Err(anyhow!("user '{}' is not a teacher or admin", requester_id))
            .error(ErrorKind::Unauthorized);
    }

    Ok(())
}

/// Log preview: long chat messages are cut at 50 characters.
fn message_preview(content: &str) -> String {
    if content.chars().count() > 50 {
        format!("{}...", content.chars().take(50).collect::<String>())
    } else {
        content.to_owned()
    }
}

fn denial_message(status: Option<lecture::Status>) -> &'static str {
    match status {
        Some(lecture::Status::Scheduled) => "This lecture has not started yet",
        Some(lecture::Status::Completed) => "This lecture has ended",
        Some(lecture::Status::Cancelled) => "This lecture has been cancelled",
        Some(lecture::Status::Delayed) => "This lecture is delayed",
        // Admissible statuses never deny; this arm is for completeness.
        Some(lecture::Status::InProgress) | None => "This room is unavailable",
    }
}

////////////////////////////////////////////////////////////////////////////////
