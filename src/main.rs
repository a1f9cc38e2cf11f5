#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use pawn_fish_server::config;
use pawn_fish_server::logging;
use pawn_fish_server::publisher::LoggingTransport;
use pawn_fish_server::server::{GameServer, ServerConfig};
use pawn_fish_server::storage::InMemoryGameStore;
use pawn_fish_server::websocket;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Pawn Fish -- lightweight WebSocket pairing server for live chess games
#[derive(Parser, Debug)]
#[command(name = "pawn-fish-server")]
#[command(about = "A lightweight, in-memory WebSocket pairing server for live chess games")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from config.json if present; otherwise use code defaults.
    let cfg = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    if cli.validate_config {
        println!("Configuration validation passed");
        println!();
        println!("Configuration summary:");
        println!("  Port: {}", cfg.port);
        println!("  Storage backend: InMemory");
        println!("  CORS origins: {}", cfg.cors_origins);
        println!(
            "  Abandonment grace: {}s",
            cfg.server.abandonment_grace_secs
        );
        println!(
            "  Matchmaking wait bound: {}s",
            cfg.server.matchmaking_wait_bound_secs
        );
        println!("  Publish attempts: {}", cfg.publisher.max_attempts);
        return Ok(());
    }

    // Initialize logging from config.
    logging::init_with_config(&cfg.logging);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));
    tracing::info!(%addr, "Starting Pawn Fish server");

    let server_config = ServerConfig {
        max_message_size: cfg.server.max_message_size,
        chat_max_length: cfg.server.chat_max_length,
        abandonment_grace: Duration::from_secs(cfg.server.abandonment_grace_secs),
        matchmaking_wait_bound: Duration::from_secs(cfg.server.matchmaking_wait_bound_secs),
        ping_timeout: Duration::from_secs(cfg.server.ping_timeout_secs),
        sweep_interval: Duration::from_secs(cfg.server.sweep_interval_secs.max(1)),
        message_queue_capacity: cfg.server.message_queue_capacity,
        retry: cfg.publisher.to_retry_schedule(),
    };

    // In-memory storage and a log-backed result transport; swap these for
    // real collaborators at the composition root.
    let store = Arc::new(InMemoryGameStore::new());
    let transport = Arc::new(LoggingTransport);

    let game_server = GameServer::new(server_config, store, transport);

    let app = websocket::create_router(&cfg.cors_origins).with_state(game_server);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        cors_origins = %cfg.cors_origins,
        "Server started - WebSocket protocol: /ws, Metrics: /metrics"
    );

    axum::serve(listener, app).await?;

    Ok(())
}
