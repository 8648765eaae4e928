use async_trait::async_trait;
use tracing_attributes::instrument;

use crate::app::context::GlobalContext;
use crate::app::endpoint::EventHandler;
use crate::app::error::Error;
use crate::db::id::SocketId;
use crate::protocol::client;

///////////////////////////////////////////////////////////////////////////////

pub(crate) struct RaiseHandler;

#[async_trait]
impl EventHandler for RaiseHandler {
    type Payload = client::Hand;

    #[instrument(skip(context, payload), fields(room_id = %payload.room_id, user_id = %payload.user_id))]
    async fn handle<C: GlobalContext>(
        context: &C,
        _socket_id: SocketId,
        payload: Self::Payload,
    ) -> Result<(), Error> {
        context.rtc().raise_hand(&payload.room_id, &payload.user_id)
    }
}

pub(crate) struct LowerHandler;

#[async_trait]
impl EventHandler for LowerHandler {
    type Payload = client::Hand;

    #[instrument(skip(context, payload), fields(room_id = %payload.room_id, user_id = %payload.user_id))]
    async fn handle<C: GlobalContext>(
        context: &C,
        _socket_id: SocketId,
        payload: Self::Payload,
    ) -> Result<(), Error> {
        context.rtc().lower_hand(&payload.room_id, &payload.user_id)
    }
}
