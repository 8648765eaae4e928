//! WebRTC signaling relay. The server forwards SDP and ICE payloads between
//! two named sockets and never looks inside them.

use async_trait::async_trait;
use tracing_attributes::instrument;

use crate::app::context::GlobalContext;
use crate::app::endpoint::EventHandler;
use crate::app::error::Error;
use crate::db::id::SocketId;
use crate::protocol::{client, server, ServerEvent};

///////////////////////////////////////////////////////////////////////////////

pub(crate) struct OfferHandler;

#[async_trait]
impl EventHandler for OfferHandler {
    type Payload = client::WebrtcOffer;

    #[instrument(skip(context, payload), fields(peer_id = %payload.peer_id))]
    async fn handle<C: GlobalContext>(
        context: &C,
        socket_id: SocketId,
        payload: Self::Payload,
    ) -> Result<(), Error> {
        context.rtc().relay(
            payload.peer_id,
            &ServerEvent::WebrtcOffer(server::WebrtcOffer {
                from_peer_id: socket_id,
                offer: payload.offer,
            }),
        )
    }
}

pub(crate) struct AnswerHandler;

#[async_trait]
impl EventHandler for AnswerHandler {
    type Payload = client::WebrtcAnswer;

    #[instrument(skip(context, payload), fields(peer_id = %payload.peer_id))]
    async fn handle<C: GlobalContext>(
        context: &C,
        socket_id: SocketId,
        payload: Self::Payload,
    ) -> Result<(), Error> {
        context.rtc().relay(
            payload.peer_id,
            &ServerEvent::WebrtcAnswer(server::WebrtcAnswer {
                from_peer_id: socket_id,
                answer: payload.answer,
            }),
        )
    }
}

pub(crate) struct IceCandidateHandler;

#[async_trait]
impl EventHandler for IceCandidateHandler {
    type Payload = client::WebrtcIceCandidate;

    #[instrument(skip(context, payload), fields(peer_id = %payload.peer_id))]
    async fn handle<C: GlobalContext>(
        context: &C,
        socket_id: SocketId,
        payload: Self::Payload,
    ) -> Result<(), Error> {
        context.rtc().relay(
            payload.peer_id,
            &ServerEvent::WebrtcIceCandidate(server::WebrtcIceCandidate {
                from_peer_id: socket_id,
                candidate: payload.candidate,
            }),
        )
    }
}
