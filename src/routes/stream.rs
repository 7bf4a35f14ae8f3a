use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::context::AppContext;
use crate::message::{StreamMessage, PING_LITERAL};

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    pub subject_id: Option<String>,
}

/// GET /transactions/stream
///
/// Observer stream, optionally scoped to one subject. The server pushes
/// `transaction_update` events; the client may send the `ping` literal and
/// gets a `pong` back. On persistent failure the socket is simply closed,
/// never fed an error object.
///
/// Every event is delivered on the broadcast path and again on the
/// subject-scoped path, so a connection opened with `subject_id` receives
/// each matching update twice. Consumers that need exact-once should leave
/// the scope off or deduplicate on `(data.id, data.status)`.
pub async fn transaction_stream(
    ws: WebSocketUpgrade,
    Query(params): Query<StreamParams>,
    State(ctx): State<Arc<AppContext>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, params.subject_id, ctx))
}

async fn handle_socket(socket: WebSocket, subject_id: Option<String>, ctx: Arc<AppContext>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<StreamMessage>();

    let connection_id = ctx.fanout.register(tx, subject_id.clone()).await;
    tracing::info!(
        connection_id = %connection_id,
        subject_id = ?subject_id,
        "Observer connected"
    );

    let greeting = StreamMessage::established(subject_id);
    if send_json(&mut ws_sender, &greeting).await.is_err() {
        ctx.fanout.unregister(connection_id).await;
        return;
    }

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        if text.trim() == PING_LITERAL
                            && send_json(&mut ws_sender, &StreamMessage::pong()).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        let _ = ws_sender.send(WsMessage::Pong(data)).await;
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket error");
                        break;
                    }
                    _ => {}
                }
            }

            outgoing = rx.recv() => {
                match outgoing {
                    Some(message) => {
                        if send_json(&mut ws_sender, &message).await.is_err() {
                            break;
                        }
                    }
                    // The fan-out manager pruned this connection
                    None => break,
                }
            }
        }
    }

    ctx.fanout.unregister(connection_id).await;
    tracing::info!(connection_id = %connection_id, "Observer disconnected");
}

async fn send_json(
    ws_sender: &mut SplitSink<WebSocket, WsMessage>,
    message: &StreamMessage,
) -> Result<(), axum::Error> {
    let json = serde_json::to_string(message).map_err(axum::Error::new)?;
    ws_sender.send(WsMessage::Text(json)).await
}
