// WebSocket module
//
// Provides the WebSocket handler and HTTP endpoints for the pairing server:
//
// - handler: WebSocket upgrade handler (entry point)
// - connection: Main WebSocket connection handling logic
// - routes: HTTP route setup (health, metrics)

mod connection;
mod handler;
mod routes;

pub use handler::websocket_handler;
pub use routes::{create_router, metrics_handler};
