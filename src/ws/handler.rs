//! WebSocket transport adapter.
//!
//! Each connection gets a transport-assigned player id, a reader loop that
//! decodes binary frames into packets for the tick task, and a writer task
//! that forwards the outbound stream, filtering targeted sends for this
//! connection.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::net::protocol::Packet;
use crate::server::{ConnectionEvent, Outbound, ServerHandle};
use crate::sim::state::PlayerId;
use crate::util::rate_limit::ConnectionRateLimiter;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.server.clone()))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, server: ServerHandle) {
    let player_id = server.allocate_player_id();
    info!(player_id, "new WebSocket connection");

    let outbound_rx = server.subscribe();

    if server
        .event_tx
        .send(ConnectionEvent::Connected { player_id })
        .await
        .is_err()
    {
        error!(player_id, "tick task is gone, closing connection");
        return;
    }

    run_session(player_id, socket, &server, outbound_rx).await;

    // cleanup on disconnect; the session synthesizes the Leave event
    let _ = server
        .event_tx
        .send(ConnectionEvent::Disconnected { player_id })
        .await;

    info!(player_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player_id: PlayerId,
    socket: WebSocket,
    server: &ServerHandle,
    mut outbound_rx: broadcast::Receiver<Outbound>,
) {
    let (mut ws_sink, mut ws_stream) = socket.split();
    let rate_limiter = ConnectionRateLimiter::new();

    // Writer task: outbound stream -> WebSocket, keeping only frames
    // addressed to this connection
    let writer_handle = tokio::spawn(async move {
        loop {
            match outbound_rx.recv().await {
                Ok(outbound) => {
                    let packet = match outbound {
                        Outbound::To(to, packet) if to == player_id => packet,
                        Outbound::To(..) => continue,
                        Outbound::Broadcast(packet) => packet,
                    };

                    let bytes = match packet.encode() {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            error!(player_id, error = %e, "failed to encode outbound packet");
                            continue;
                        }
                    };

                    if ws_sink.send(Message::Binary(bytes.to_vec())).await.is_err() {
                        debug!(player_id, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        player_id,
                        lagged_count = n,
                        "client lagged, skipping {} packets", n
                    );
                    // Continue - don't disconnect for lag
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(player_id, "outbound channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> tick task
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Binary(data)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id, "rate limited input message");
                    continue;
                }

                match Packet::decode(&data) {
                    Ok(packet) => {
                        let event = ConnectionEvent::Packet { player_id, packet };
                        if server.event_tx.send(event).await.is_err() {
                            debug!(player_id, "event channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(player_id, error = %e, "failed to decode client packet");
                    }
                }
            }
            Ok(Message::Text(_)) => {
                warn!(player_id, "received text message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id, "client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Abort writer task
    writer_handle.abort();
}
