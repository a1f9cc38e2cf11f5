use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use std::sync::Arc;

use crate::protocol::PlayerHandle;
use crate::server::GameServer;

use super::connection::handle_socket;

/// Query parameters on the WebSocket upgrade request.
///
/// Authentication terminates upstream (reverse proxy / gateway); the handle
/// arriving here is already verified and unique per player.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    handle: String,
}

/// WebSocket handler for the game protocol
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(server): State<Arc<GameServer>>,
) -> Response {
    let handle = params.handle.trim();
    if handle.is_empty() {
        return (StatusCode::BAD_REQUEST, "handle must not be blank").into_response();
    }

    let handle = PlayerHandle::new(handle);
    ws.on_upgrade(move |socket| handle_socket(socket, server, handle))
}
