use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::protocol::{ClientMessage, ErrorCode, PlayerHandle, ServerMessage};
use crate::server::GameServer;

pub(super) async fn handle_socket(
    socket: WebSocket,
    server: Arc<GameServer>,
    handle: PlayerHandle,
) {
    let (mut sender, mut receiver) = socket.split();
    let queue_capacity = server.config().message_queue_capacity.max(1);
    let (tx, mut rx) = mpsc::channel::<Arc<ServerMessage>>(queue_capacity);

    // The server cancels this token to force-close the transport, e.g. when
    // a newer connection replaces this one.
    let closer = CancellationToken::new();
    let generation = server.on_connect(handle.clone(), tx, closer.clone()).await;
    tracing::info!(%handle, "WebSocket connection established");

    // Outgoing messages: drain the per-connection queue onto the socket.
    let send_handle = handle.clone();
    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                () = closer.cancelled() => {
                    let _ = sender.close().await;
                    break;
                }
                message = rx.recv() => {
                    let Some(message) = message else { break };
                    let json = match serde_json::to_string(&*message) {
                        Ok(json) => json,
                        Err(err) => {
                            tracing::error!(handle = %send_handle, error = %err, "Failed to serialize server message");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // Incoming messages: parse and dispatch to the orchestrator. Malformed
    // frames answer this sender only; the connection stays open.
    let receive_server = server.clone();
    let receive_handle = handle.clone();
    let receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let msg = match msg {
                Ok(msg) => msg,
                Err(err) => {
                    tracing::warn!(handle = %receive_handle, "WebSocket error: {}", err);
                    break;
                }
            };

            match msg {
                Message::Text(text) => {
                    let max_size = receive_server.config().max_message_size;
                    if text.len() > max_size {
                        tracing::warn!(
                            handle = %receive_handle,
                            size = text.len(),
                            max = max_size,
                            "Message exceeds size limit"
                        );
                        receive_server
                            .handle_oversized_message(&receive_handle, text.len(), max_size);
                        continue;
                    }

                    match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_message) => {
                            receive_server
                                .handle_client_message(&receive_handle, client_message)
                                .await;
                        }
                        Err(err) => {
                            tracing::warn!(
                                handle = %receive_handle,
                                error = %err,
                                "Rejected unparseable client frame"
                            );
                            receive_server
                                .handle_malformed_message(&receive_handle, ErrorCode::InvalidMessage);
                        }
                    }
                }
                Message::Close(_) => {
                    tracing::info!(handle = %receive_handle, "WebSocket connection closed");
                    break;
                }
                // Binary frames are not part of the protocol; control frames
                // are handled by the transport.
                _ => {}
            }
        }
    });

    // Wait for either direction to finish
    tokio::select! {
        _ = send_task => {
            tracing::debug!(%handle, "Send task completed");
        }
        _ = receive_task => {
            tracing::debug!(%handle, "Receive task completed");
        }
    }

    server.on_disconnect(&handle, generation).await;
}
