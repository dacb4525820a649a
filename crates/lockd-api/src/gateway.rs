//! Device gateway — the WebSocket endpoint locks connect to.
//!
//! Each socket gets a writer task draining its outbound queue and a reader
//! loop feeding text frames to a [`DeviceSession`].

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use lockd_core::SharedClock;
use lockd_services::{ConnectionRegistry, DeviceSession, Outbound, SharedDirectory};

#[derive(Clone)]
pub struct GatewayState {
    pub directory: SharedDirectory,
    pub registry: ConnectionRegistry,
    pub clock: SharedClock,
}

pub async fn handle_upgrade(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: GatewayState) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();
    let conn = state.registry.register(tx);
    let connection = conn.id();
    tracing::info!(connection, "device socket opened");

    let writer = tokio::spawn(async move {
        while let Some(out) = rx.recv().await {
            match out {
                Outbound::Message(msg) => {
                    let text = match msg.encode() {
                        Ok(t) => t,
                        Err(e) => {
                            tracing::warn!(connection, error = %e, "outbound message not encodable");
                            continue;
                        }
                    };
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        tracing::debug!(connection, target = msg.target(), "socket gone, message dropped");
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let mut session = DeviceSession::new(conn, state.directory, state.registry, state.clock);
    session.open();

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => session.on_text(text.as_str()),
            Ok(Message::Binary(data)) => session.on_binary(data.len()),
            Ok(Message::Close(_)) => break,
            // ping/pong are answered by the websocket layer
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(connection, error = %e, "device socket error");
                break;
            }
        }
    }

    session.close();
    // The session still holds a sender, so the writer would never see the
    // queue drain on its own.
    writer.abort();
}
