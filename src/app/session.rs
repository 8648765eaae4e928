use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{sink::SinkExt, stream::StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::context::GlobalContext;
use crate::app::endpoint;
use crate::app::error::ErrorKind;
use crate::db::id::SocketId;
use crate::protocol::{server, ClientEvent, ServerEvent};
use crate::rtc::Outbound;

////////////////////////////////////////////////////////////////////////////////

pub(crate) const PING_INTERVAL: Duration = Duration::from_secs(5);
pub(crate) const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs one WebSocket connection to completion: a writer task drains the
/// connection's outbox and pings on a timer, while this task reads, decodes
/// and dispatches frames. A connection silent for [`PING_TIMEOUT`] is
/// dropped. On exit the socket leaves every room it was in.
pub(crate) async fn handle_socket<C: GlobalContext>(context: Arc<C>, socket: WebSocket) {
    let socket_id = SocketId::random();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    context.rtc().register_connection(socket_id, tx.clone());
    info!(socket_id = %socket_id, "connection established");

    let writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(PING_INTERVAL);

        loop {
            tokio::select! {
                frame = rx.recv() => match frame {
                    Some(Outbound::Event(raw)) => {
                        if sink.send(Message::Text(raw)).await.is_err() {
                            break;
                        }
                    }
                    Some(Outbound::Close) => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    None => break,
                },
                _ = ping.tick() => {
                    if sink.send(Message::Ping(Vec::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    loop {
        match tokio::time::timeout(PING_TIMEOUT, stream.next()).await {
            Err(_) => {
                warn!(socket_id = %socket_id, "ping timeout, dropping connection");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(err))) => {
                debug!(socket_id = %socket_id, "socket error: {}", err);
                break;
            }
            Ok(Some(Ok(Message::Text(raw)))) => {
                handle_frame(context.as_ref(), socket_id, &tx, &raw).await;
            }
            Ok(Some(Ok(Message::Close(_)))) => break,
            // Pings, pongs and binary noise only refresh the liveness timer.
            Ok(Some(Ok(_))) => {}
        }
    }

    context.rtc().disconnect(socket_id);
    writer.abort();
    info!(socket_id = %socket_id, "connection closed");
}

/// A malformed or failing frame answers the offender with an `error` event
/// and never takes the process down. Unauthorized operations are dropped
/// without any reply so the wire does not leak permissions.
async fn handle_frame<C: GlobalContext>(
    context: &C,
    socket_id: SocketId,
    tx: &mpsc::UnboundedSender<Outbound>,
    raw: &str,
) {
    let event = match ClientEvent::parse(raw) {
        Ok(event) => event,
        Err(err) => {
            warn!(socket_id = %socket_id, "malformed message: {}", err);

            let frame = ServerEvent::Error(server::ErrorPayload {
                message: "Malformed message".to_owned(),
            });

            let _ = tx.send(Outbound::Event(frame.encode()));
            return;
        }
    };

    debug!(socket_id = %socket_id, event = event.name(), "event received");

    if let Err(err) = endpoint::route_event(context, socket_id, event).await {
        if err.kind() == ErrorKind::Unauthorized {
            warn!(socket_id = %socket_id, "unauthorized operation ignored: {}", err);
            return;
        }

        error!(socket_id = %socket_id, "event handling failed: {}", err);

        let frame = ServerEvent::Error(server::ErrorPayload {
            message: err.title().to_owned(),
        });

        let _ = tx.send(Outbound::Event(frame.encode()));
    }
}
