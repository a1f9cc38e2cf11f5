mod test_helpers;

use pawn_fish_server::protocol::{
    ClientMessage, Color, ErrorCode, ServerMessage, TerminationReason, TimeControl,
};
use pawn_fish_server::publisher::{
    GAME_RESULT_TOPIC, PARTNER_SUGGESTION_TOPIC, PUZZLE_RESULT_TOPIC,
};
use test_helpers::{create_test_server, create_test_server_with_config, test_server_config, TestClient};

fn match_request(color: Option<Color>, time_control: TimeControl) -> ClientMessage {
    ClientMessage::MatchRequest {
        preferred_color: color,
        time_control,
    }
}

fn chess_move(from: &str, to: &str) -> ClientMessage {
    ClientMessage::Move {
        from: from.to_string(),
        to: to.to_string(),
        promotion: None,
    }
}

/// Let spawned fire-and-forget work (publisher tasks, completion events)
/// drain before asserting.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_opposite_preferences_pair_and_start_a_game() {
    let (server, _transport) = create_test_server();
    let mut alice = TestClient::connect(&server, "alice").await;
    let mut bob = TestClient::connect(&server, "bob").await;

    server
        .handle_client_message(&alice.handle, match_request(Some(Color::White), TimeControl::Blitz))
        .await;
    assert!(matches!(
        alice.expect_message().await,
        ServerMessage::MatchQueued
    ));

    server
        .handle_client_message(&bob.handle, match_request(Some(Color::Black), TimeControl::Blitz))
        .await;

    let alice_started = match alice.expect_message().await {
        ServerMessage::GameStarted(payload) => payload,
        other => panic!("unexpected message: {other:?}"),
    };
    let bob_started = match bob.expect_message().await {
        ServerMessage::GameStarted(payload) => payload,
        other => panic!("unexpected message: {other:?}"),
    };

    assert_eq!(alice_started.color, Color::White);
    assert_eq!(bob_started.color, Color::Black);
    assert_eq!(alice_started.game_id, bob_started.game_id);
    assert_eq!(alice_started.opponent, bob.handle);
    assert_eq!(bob_started.opponent, alice.handle);
    assert_eq!(alice_started.time_control, TimeControl::Blitz);

    // The starter game is persisted immediately.
    let stored = server
        .store()
        .find_by_id(&alice_started.game_id)
        .await
        .unwrap()
        .expect("starter game saved");
    assert!(stored.result.is_none());
    assert_eq!(server.live_game_count(), 1);
}

#[tokio::test]
async fn test_moves_broadcast_and_game_completes_with_fanout() {
    let (server, transport) = create_test_server();
    let mut alice = TestClient::connect(&server, "alice").await;
    let mut bob = TestClient::connect(&server, "bob").await;

    server
        .handle_client_message(&alice.handle, match_request(Some(Color::White), TimeControl::Blitz))
        .await;
    server
        .handle_client_message(&bob.handle, match_request(Some(Color::Black), TimeControl::Blitz))
        .await;
    alice.expect_message().await; // MatchQueued
    let game_id = match alice.expect_message().await {
        ServerMessage::GameStarted(payload) => payload.game_id,
        other => panic!("unexpected message: {other:?}"),
    };
    bob.expect_message().await; // GameStarted

    // Fool's mate: 1. f3 e5 2. g4 Qh4#
    server
        .handle_client_message(&alice.handle, chess_move("f2", "f3"))
        .await;
    for client in [&mut alice, &mut bob] {
        match client.expect_message().await {
            ServerMessage::MoveAccepted { next_to_move, .. } => {
                assert_eq!(next_to_move, Color::Black);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    server
        .handle_client_message(&bob.handle, chess_move("e7", "e5"))
        .await;
    alice.expect_message().await;
    bob.expect_message().await;

    server
        .handle_client_message(&alice.handle, chess_move("g2", "g4"))
        .await;
    alice.expect_message().await;
    bob.expect_message().await;

    server
        .handle_client_message(&bob.handle, chess_move("d8", "h4"))
        .await;

    for client in [&mut alice, &mut bob] {
        match client.expect_message().await {
            ServerMessage::GameEnded { result } => {
                assert_eq!(result.game_id, game_id);
                assert_eq!(result.reason, TerminationReason::Checkmate);
                assert_eq!(result.winner, Some(Color::Black));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    settle().await;

    // Persisted with full history.
    let stored = server.store().find_by_id(&game_id).await.unwrap().unwrap();
    assert_eq!(stored.moves.len(), 4);
    assert!(stored.result.is_some());
    assert!(stored.completed_at.is_some());

    // Downstream fan-out: result, puzzle (checkmate), and both partner
    // suggestions.
    let results = transport.deliveries_for(GAME_RESULT_TOPIC);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["moves"].as_array().unwrap().len(), 4);

    let puzzles = transport.deliveries_for(PUZZLE_RESULT_TOPIC);
    assert_eq!(puzzles.len(), 1);
    assert_eq!(puzzles[0]["mating_move"], "d8h4");

    let suggestions = transport.deliveries_for(PARTNER_SUGGESTION_TOPIC);
    assert_eq!(suggestions.len(), 2);

    // Indexes are cleared; both players could queue again.
    assert_eq!(server.live_game_count(), 0);
    assert!(server.active_game_of(&alice.handle).is_none());
}

#[tokio::test]
async fn test_duplicate_requests_are_rejected() {
    let (server, _transport) = create_test_server();
    let mut alice = TestClient::connect(&server, "alice").await;

    server
        .handle_client_message(&alice.handle, match_request(None, TimeControl::Rapid))
        .await;
    assert!(matches!(
        alice.expect_message().await,
        ServerMessage::MatchQueued
    ));

    // Second request while waiting.
    server
        .handle_client_message(&alice.handle, match_request(None, TimeControl::Rapid))
        .await;
    match alice.expect_message().await {
        ServerMessage::Error { error_code, .. } => {
            assert_eq!(error_code, Some(ErrorCode::DuplicateRequest));
        }
        other => panic!("unexpected message: {other:?}"),
    }
    assert_eq!(server.waiting_count(), 1);

    // Pair alice into a game, then request again while playing.
    let mut bob = TestClient::connect(&server, "bob").await;
    server
        .handle_client_message(&bob.handle, match_request(None, TimeControl::Rapid))
        .await;
    alice.expect_message().await; // GameStarted
    bob.expect_message().await;

    server
        .handle_client_message(&alice.handle, match_request(None, TimeControl::Rapid))
        .await;
    match alice.expect_message().await {
        ServerMessage::Error { error_code, .. } => {
            assert_eq!(error_code, Some(ErrorCode::DuplicateRequest));
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[tokio::test]
async fn test_same_color_tickets_wait_for_a_compatible_third() {
    let (server, _transport) = create_test_server();
    let mut alice = TestClient::connect(&server, "alice").await;
    let mut bob = TestClient::connect(&server, "bob").await;
    let mut carol = TestClient::connect(&server, "carol").await;

    server
        .handle_client_message(&alice.handle, match_request(Some(Color::White), TimeControl::Blitz))
        .await;
    server
        .handle_client_message(&bob.handle, match_request(Some(Color::White), TimeControl::Blitz))
        .await;
    assert!(matches!(alice.expect_message().await, ServerMessage::MatchQueued));
    assert!(matches!(bob.expect_message().await, ServerMessage::MatchQueued));
    assert_eq!(server.waiting_count(), 2);

    // Carol takes black; the oldest compatible waiter (alice) is chosen.
    server
        .handle_client_message(&carol.handle, match_request(Some(Color::Black), TimeControl::Blitz))
        .await;
    match alice.expect_message().await {
        ServerMessage::GameStarted(payload) => {
            assert_eq!(payload.color, Color::White);
            assert_eq!(payload.opponent, carol.handle);
        }
        other => panic!("unexpected message: {other:?}"),
    }
    carol.expect_message().await;
    assert_eq!(server.waiting_count(), 1);
    bob.expect_silence();
}

#[tokio::test]
async fn test_move_without_game_and_out_of_turn_are_rejected() {
    let (server, _transport) = create_test_server();
    let mut alice = TestClient::connect(&server, "alice").await;

    server
        .handle_client_message(&alice.handle, chess_move("e2", "e4"))
        .await;
    match alice.expect_message().await {
        ServerMessage::MoveRejected { error_code, .. } => {
            assert_eq!(error_code, ErrorCode::NoActiveGame);
        }
        other => panic!("unexpected message: {other:?}"),
    }

    let mut bob = TestClient::connect(&server, "bob").await;
    server
        .handle_client_message(&alice.handle, match_request(Some(Color::White), TimeControl::Blitz))
        .await;
    server
        .handle_client_message(&bob.handle, match_request(Some(Color::Black), TimeControl::Blitz))
        .await;
    alice.expect_message().await; // MatchQueued
    alice.expect_message().await; // GameStarted
    bob.expect_message().await;

    // Black tries to open.
    server
        .handle_client_message(&bob.handle, chess_move("e7", "e5"))
        .await;
    match bob.expect_message().await {
        ServerMessage::MoveRejected { error_code, .. } => {
            assert_eq!(error_code, ErrorCode::NotYourTurn);
        }
        other => panic!("unexpected message: {other:?}"),
    }
    alice.expect_silence();
}

#[tokio::test]
async fn test_chat_relays_to_opponent_and_rejects_blank() {
    let (server, _transport) = create_test_server();
    let mut alice = TestClient::connect(&server, "alice").await;
    let mut bob = TestClient::connect(&server, "bob").await;

    server
        .handle_client_message(&alice.handle, match_request(Some(Color::White), TimeControl::Blitz))
        .await;
    server
        .handle_client_message(&bob.handle, match_request(Some(Color::Black), TimeControl::Blitz))
        .await;
    alice.expect_message().await;
    alice.expect_message().await;
    bob.expect_message().await;

    server
        .handle_client_message(
            &alice.handle,
            ClientMessage::ChatText {
                body: "good luck!".to_string(),
            },
        )
        .await;
    match bob.expect_message().await {
        ServerMessage::ChatText { from, body } => {
            assert_eq!(from, alice.handle);
            assert_eq!(body, "good luck!");
        }
        other => panic!("unexpected message: {other:?}"),
    }
    // The sender gets no echo.
    alice.expect_silence();

    server
        .handle_client_message(
            &alice.handle,
            ClientMessage::ChatText {
                body: "   ".to_string(),
            },
        )
        .await;
    match alice.expect_message().await {
        ServerMessage::Error { error_code, .. } => {
            assert_eq!(error_code, Some(ErrorCode::BlankChatText));
        }
        other => panic!("unexpected message: {other:?}"),
    }
    bob.expect_silence();
}

#[tokio::test]
async fn test_disconnect_cancels_waiting_ticket() {
    let (server, _transport) = create_test_server();
    let alice = TestClient::connect(&server, "alice").await;

    server
        .handle_client_message(&alice.handle, match_request(None, TimeControl::Blitz))
        .await;
    assert_eq!(server.waiting_count(), 1);

    server.on_disconnect(&alice.handle, alice.generation).await;
    assert_eq!(server.waiting_count(), 0);

    // A later compatible request queues instead of pairing with the ghost.
    let mut bob = TestClient::connect(&server, "bob").await;
    server
        .handle_client_message(&bob.handle, match_request(None, TimeControl::Blitz))
        .await;
    assert!(matches!(bob.expect_message().await, ServerMessage::MatchQueued));
}

#[tokio::test(start_paused = true)]
async fn test_expired_wait_is_surfaced_and_ticket_dropped() {
    let (server, _transport) = create_test_server();
    let mut alice = TestClient::connect(&server, "alice").await;

    server
        .handle_client_message(&alice.handle, match_request(None, TimeControl::Classic))
        .await;
    assert!(matches!(alice.expect_message().await, ServerMessage::MatchQueued));

    // Past the wait bound plus a sweep tick.
    tokio::time::sleep(std::time::Duration::from_secs(122)).await;

    match alice.expect_message().await {
        ServerMessage::WaitExpired => {}
        other => panic!("unexpected message: {other:?}"),
    }
    assert_eq!(server.waiting_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_white_flag_ends_game_for_both_players() {
    let (server, transport) = create_test_server();
    let mut alice = TestClient::connect(&server, "alice").await;
    let mut bob = TestClient::connect(&server, "bob").await;

    server
        .handle_client_message(&alice.handle, match_request(Some(Color::White), TimeControl::Bullet))
        .await;
    server
        .handle_client_message(&bob.handle, match_request(Some(Color::Black), TimeControl::Bullet))
        .await;
    alice.expect_message().await;
    alice.expect_message().await;
    bob.expect_message().await;

    // White never moves; the bullet budget lapses.
    tokio::time::sleep(std::time::Duration::from_secs(61)).await;

    for client in [&mut alice, &mut bob] {
        match client.expect_message().await {
            ServerMessage::GameEnded { result } => {
                assert_eq!(result.reason, TerminationReason::TimeForfeit);
                assert_eq!(result.winner, Some(Color::Black));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    settle().await;
    assert_eq!(transport.deliveries_for(GAME_RESULT_TOPIC).len(), 1);
    // No puzzle from a time forfeit.
    assert!(transport.deliveries_for(PUZZLE_RESULT_TOPIC).is_empty());
    assert_eq!(server.live_game_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_resumes_game_and_replaces_connection() {
    let (server, _transport) = create_test_server();
    let mut alice = TestClient::connect(&server, "alice").await;
    let mut bob = TestClient::connect(&server, "bob").await;

    server
        .handle_client_message(&alice.handle, match_request(Some(Color::White), TimeControl::Blitz))
        .await;
    server
        .handle_client_message(&bob.handle, match_request(Some(Color::Black), TimeControl::Blitz))
        .await;
    alice.expect_message().await;
    alice.expect_message().await;
    bob.expect_message().await;

    server
        .handle_client_message(&alice.handle, chess_move("e2", "e4"))
        .await;
    alice.expect_message().await;
    bob.expect_message().await;

    // Bob drops and comes back on a fresh connection.
    server.on_disconnect(&bob.handle, bob.generation).await;
    let mut bob2 = TestClient::connect(&server, "bob").await;

    match bob2.expect_message().await {
        ServerMessage::GameResumed(payload) => {
            assert_eq!(payload.color, Color::Black);
            assert_eq!(payload.opponent, alice.handle);
            assert_eq!(payload.next_to_move, Color::Black);
            // Position after 1. e4.
            assert!(payload.board.contains("4P3"));
        }
        other => panic!("unexpected message: {other:?}"),
    }

    // The game survived the disconnect and play continues.
    server
        .handle_client_message(&bob2.handle, chess_move("e7", "e5"))
        .await;
    assert!(matches!(
        bob2.expect_message().await,
        ServerMessage::MoveAccepted { .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_replaced_connection_is_told_to_close() {
    let (server, _transport) = create_test_server();
    let alice = TestClient::connect(&server, "alice").await;
    assert!(!alice.closer.is_cancelled());

    let _alice2 = TestClient::connect(&server, "alice").await;
    assert!(alice.closer.is_cancelled());

    // The old transport's disconnect must not tear down the new session.
    server.on_disconnect(&alice.handle, alice.generation).await;
    let mut alice3 = TestClient::connect(&server, "alice").await;
    server
        .handle_client_message(&alice3.handle, match_request(None, TimeControl::Blitz))
        .await;
    assert!(matches!(
        alice3.expect_message().await,
        ServerMessage::MatchQueued
    ));
}

#[tokio::test(start_paused = true)]
async fn test_prolonged_disconnection_becomes_abandonment() {
    let (server, _transport) = create_test_server_with_config(test_server_config());
    let mut alice = TestClient::connect(&server, "alice").await;
    let bob = TestClient::connect(&server, "bob").await;

    server
        .handle_client_message(&alice.handle, match_request(Some(Color::White), TimeControl::Classic))
        .await;
    server
        .handle_client_message(&bob.handle, match_request(Some(Color::Black), TimeControl::Classic))
        .await;
    alice.expect_message().await;
    alice.expect_message().await;

    server.on_disconnect(&bob.handle, bob.generation).await;
    // Grace window in the test config is 30s.
    tokio::time::sleep(std::time::Duration::from_secs(31)).await;

    match alice.expect_message().await {
        ServerMessage::GameEnded { result } => {
            assert_eq!(result.reason, TerminationReason::Abandonment);
            assert_eq!(result.winner, Some(Color::White));
        }
        other => panic!("unexpected message: {other:?}"),
    }
}
