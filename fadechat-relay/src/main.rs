//! `FadeChat` relay server: password-protected rooms that fan out frames.
//!
//! An axum WebSocket server that forwards sealed packets between the
//! members of a room. The relay never sees plaintext.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:8080 with the stock rooms
//! cargo run --bin fadechat-relay
//!
//! # Custom address and an extra room
//! cargo run --bin fadechat-relay -- --bind 127.0.0.1:9100 --room ops=hunter2
//!
//! # Or via environment variable
//! FADECHAT_RELAY_ADDR=127.0.0.1:9100 cargo run --bin fadechat-relay
//! ```

use std::sync::Arc;

use clap::Parser;
use fadechat_relay::config::{RelayCliArgs, RelayConfig};
use fadechat_relay::relay::{self, RelayState};

#[tokio::main]
async fn main() {
    let cli = RelayCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match RelayConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(
        addr = %config.bind_addr,
        rooms = config.rooms.len(),
        echo_to_sender = config.echo_to_sender,
        "starting fadechat relay server"
    );

    let state = Arc::new(RelayState::from_config(&config));

    match relay::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "relay server listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "relay server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start relay server");
            std::process::exit(1);
        }
    }
}
