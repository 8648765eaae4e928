use async_trait::async_trait;
use tracing_attributes::instrument;

use crate::app::context::GlobalContext;
use crate::app::endpoint::EventHandler;
use crate::app::error::Error;
use crate::db::id::SocketId;
use crate::protocol::client;

///////////////////////////////////////////////////////////////////////////////

pub(crate) struct SendHandler;

#[async_trait]
impl EventHandler for SendHandler {
    type Payload = client::SendMessage;

    #[instrument(skip(context, payload), fields(room_id = %payload.room_id))]
    async fn handle<C: GlobalContext>(
        context: &C,
        _socket_id: SocketId,
        payload: Self::Payload,
    ) -> Result<(), Error> {
        let message = payload.message;

        context.rtc().send_message(
            &payload.room_id,
            message.user_id,
            message.username,
            message.content,
        )
    }
}
