use async_trait::async_trait;

use crate::app::context::GlobalContext;
use crate::app::error::Error;
use crate::db::id::SocketId;
use crate::protocol::ClientEvent;

///////////////////////////////////////////////////////////////////////////////

/// One handler per inbound wire event, with a typed payload.
#[async_trait]
pub(crate) trait EventHandler {
    type Payload: Send;

    async fn handle<C: GlobalContext>(
        context: &C,
        socket_id: SocketId,
        payload: Self::Payload,
    ) -> Result<(), Error>;
}

/// The decoded event fans out to its handler here. Unknown events never get
/// this far; they fail decoding and are answered with an `error` frame.
pub(crate) async fn route_event<C: GlobalContext>(
    context: &C,
    socket_id: SocketId,
    event: ClientEvent,
) -> Result<(), Error> {
    match event {
        ClientEvent::JoinRoom(payload) => {
            room::JoinHandler::handle(context, socket_id, payload).await
        }
        ClientEvent::LeaveRoom(payload) => {
            room::LeaveHandler::handle(context, socket_id, payload).await
        }
        ClientEvent::SendMessage(payload) => {
            message::SendHandler::handle(context, socket_id, payload).await
        }
        ClientEvent::StartStream(payload) => {
            stream::StartHandler::handle(context, socket_id, payload).await
        }
        ClientEvent::StopStream(payload) => {
            stream::StopHandler::handle(context, socket_id, payload).await
        }
        ClientEvent::WebrtcOffer(payload) => {
            signal::OfferHandler::handle(context, socket_id, payload).await
        }
        ClientEvent::WebrtcAnswer(payload) => {
            signal::AnswerHandler::handle(context, socket_id, payload).await
        }
        ClientEvent::WebrtcIceCandidate(payload) => {
            signal::IceCandidateHandler::handle(context, socket_id, payload).await
        }
        ClientEvent::RecordingStarted(payload) => {
            recording::StartedHandler::handle(context, socket_id, payload).await
        }
        ClientEvent::RecordingStopped(payload) => {
            recording::StoppedHandler::handle(context, socket_id, payload).await
        }
        ClientEvent::RaiseHand(payload) => {
            hand::RaiseHandler::handle(context, socket_id, payload).await
        }
        ClientEvent::LowerHand(payload) => {
            hand::LowerHandler::handle(context, socket_id, payload).await
        }
    }
}

pub(crate) mod hand;
pub(crate) mod lecture;
pub(crate) mod message;
pub(crate) mod recording;
pub(crate) mod room;
pub(crate) mod signal;
pub(crate) mod stream;

///////////////////////////////////////////////////////////////////////////////
