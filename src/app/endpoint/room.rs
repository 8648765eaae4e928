use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{Extension, Path},
    Json,
};
use tracing::info;
use tracing_attributes::instrument;

use crate::app::context::{AppContext, GlobalContext};
use crate::app::endpoint::EventHandler;
use crate::app::error::{Error, ErrorKind};
use crate::app::gateway::RoomStatus;
use crate::app::http::UserExtractor;
use crate::app::room_registry::CreateRoomOptions;
use crate::db::{
    id::{RoomId, SocketId},
    lecture, room,
};
use crate::protocol::client;
use crate::util;

///////////////////////////////////////////////////////////////////////////////
// Wire events

pub(crate) struct JoinHandler;

#[async_trait]
impl EventHandler for JoinHandler {
    type Payload = client::JoinRoom;

    #[instrument(skip(context, payload), fields(room_id = %payload.room_id, user_id = %payload.user.id))]
    async fn handle<C: GlobalContext>(
        context: &C,
        socket_id: SocketId,
        payload: Self::Payload,
    ) -> Result<(), Error> {
        let limit = capacity_limit(context, &payload.room_id);

        match context
            .rtc()
            .join_room(socket_id, payload.room_id, payload.user, limit)
        {
            Ok(()) => Ok(()),
            // Already answered with a join_room_error frame.
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::NoLectureActive | ErrorKind::RoomFull
                ) =>
            {
                info!(error = %err, "join denied");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

/// The admission cap: the room's persisted capacity, tightened by the
/// registered lecture's `maxParticipants` when that is lower.
fn capacity_limit<C: GlobalContext>(context: &C, room_id: &RoomId) -> Option<u32> {
    let room_capacity = room::FindQuery::new()
        .id(room_id.clone())
        .execute(context.db())
        .map(|room| room.capacity);

    let lecture_cap = context
        .rtc()
        .registered_lecture(room_id)
        .and_then(|registration| {
            lecture::FindQuery::new()
                .id(registration.id)
                .execute(context.db())
        })
        .and_then(|lecture| lecture.max_participants);

    match (room_capacity, lecture_cap) {
        (Some(capacity), Some(cap)) => Some(capacity.min(cap)),
        (Some(capacity), None) => Some(capacity),
        (None, Some(cap)) => Some(cap),
        (None, None) => None,
    }
}

pub(crate) struct LeaveHandler;

#[async_trait]
impl EventHandler for LeaveHandler {
    type Payload = client::LeaveRoom;

    #[instrument(skip(context, payload))]
    async fn handle<C: GlobalContext>(
        context: &C,
        socket_id: SocketId,
        payload: Self::Payload,
    ) -> Result<(), Error> {
        context.rtc().leave_room(&payload.room_id(), socket_id);
        Ok(())
    }
}

///////////////////////////////////////////////////////////////////////////////
// HTTP API

pub(crate) async fn create(
    Extension(context): Extension<Arc<AppContext>>,
    UserExtractor(user): UserExtractor,
    Json(options): Json<CreateRoomOptions>,
) -> Result<Json<room::Object>, Error> {
    let gateway = context.gateway().clone();

    let room = util::spawn_blocking(move || gateway.create_room(&user, options)).await?;
    Ok(Json(room))
}

pub(crate) async fn list(
    Extension(context): Extension<Arc<AppContext>>,
    UserExtractor(user): UserExtractor,
) -> Result<Json<Vec<room::Object>>, Error> {
    Ok(Json(context.gateway().list_rooms(&user)?))
}

pub(crate) async fn read(
    Extension(context): Extension<Arc<AppContext>>,
    UserExtractor(user): UserExtractor,
    Path(id): Path<String>,
) -> Result<Json<RoomStatus>, Error> {
    let status = context.gateway().room_status(&user, &RoomId::new(id))?;
    Ok(Json(status))
}

pub(crate) async fn delete(
    Extension(context): Extension<Arc<AppContext>>,
    UserExtractor(user): UserExtractor,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, Error> {
    let gateway = context.gateway().clone();

    util::spawn_blocking(move || gateway.delete_room(&user, &RoomId::new(id))).await?;
    Ok(Json(serde_json::json!({})))
}
