use async_trait::async_trait;
use tracing_attributes::instrument;

use crate::app::context::GlobalContext;
use crate::app::endpoint::EventHandler;
use crate::app::error::Error;
use crate::db::id::SocketId;
use crate::protocol::client;

///////////////////////////////////////////////////////////////////////////////

pub(crate) struct StartHandler;

#[async_trait]
impl EventHandler for StartHandler {
    type Payload = client::StartStream;

    #[instrument(skip(context, payload), fields(room_id = %payload.room_id, user_id = %payload.user_id))]
    async fn handle<C: GlobalContext>(
        context: &C,
        _socket_id: SocketId,
        payload: Self::Payload,
    ) -> Result<(), Error> {
        context
            .rtc()
            .start_stream(&payload.room_id, payload.user_id, payload.quality)
    }
}

pub(crate) struct StopHandler;

#[async_trait]
impl EventHandler for StopHandler {
    type Payload = client::StopStream;

    #[instrument(skip(context, payload), fields(room_id = %payload.room_id))]
    async fn handle<C: GlobalContext>(
        context: &C,
        _socket_id: SocketId,
        payload: Self::Payload,
    ) -> Result<(), Error> {
        context.rtc().stop_stream(&payload.room_id)
    }
}
