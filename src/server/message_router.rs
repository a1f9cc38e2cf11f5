use crate::protocol::{ClientMessage, PlayerHandle};

use super::GameServer;

impl GameServer {
    /// Route one inbound client message to the owning component.
    ///
    /// Unroutable or invalid input answers the sender only; nothing here can
    /// fail another connection or another game.
    pub async fn handle_client_message(&self, handle: &PlayerHandle, message: ClientMessage) {
        match message {
            ClientMessage::MatchRequest {
                preferred_color,
                time_control,
            } => {
                self.handle_match_request(handle, preferred_color, time_control)
                    .await;
            }
            ClientMessage::Move {
                from,
                to,
                promotion,
            } => {
                self.handle_move(handle, &from, &to, promotion).await;
            }
            ClientMessage::ChatText { body } => {
                self.handle_chat(handle, body).await;
            }
            ClientMessage::Ping => {
                self.handle_ping(handle);
            }
        }
    }
}
