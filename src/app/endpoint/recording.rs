//! Recording notifications. Authorization is trusted from the payload; the
//! server keeps no recording state, it only fans the notification out.

use async_trait::async_trait;
use tracing_attributes::instrument;

use crate::app::context::GlobalContext;
use crate::app::endpoint::EventHandler;
use crate::app::error::Error;
use crate::db::id::SocketId;
use crate::protocol::client;

///////////////////////////////////////////////////////////////////////////////

pub(crate) struct StartedHandler;

#[async_trait]
impl EventHandler for StartedHandler {
    type Payload = client::RecordingStarted;

    #[instrument(skip(context, payload), fields(room_id = %payload.room_id))]
    async fn handle<C: GlobalContext>(
        context: &C,
        _socket_id: SocketId,
        payload: Self::Payload,
    ) -> Result<(), Error> {
        context
            .rtc()
            .recording_started(&payload.room_id, payload.teacher_id)
    }
}

pub(crate) struct StoppedHandler;

#[async_trait]
impl EventHandler for StoppedHandler {
    type Payload = client::RecordingStopped;

    #[instrument(skip(context, payload), fields(room_id = %payload.room_id))]
    async fn handle<C: GlobalContext>(
        context: &C,
        _socket_id: SocketId,
        payload: Self::Payload,
    ) -> Result<(), Error> {
        context.rtc().recording_stopped(
            &payload.room_id,
            payload.teacher_id,
            payload.duration,
        )
    }
}
