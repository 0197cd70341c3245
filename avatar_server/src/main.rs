//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p avatar_server -- [--addr 127.0.0.1:3000] [--tick-hz 60]
//!
//! The server accepts players and forwards pose updates between them.
//!
//! Console commands:
//!   status         - Show server status
//!   quit           - Shutdown server

use std::env;
use std::io::{BufRead, Write};

use anyhow::Context;
use avatar_server::server::{RelayServer, ServerState};
use avatar_shared::config::AppConfig;
use tokio::sync::mpsc;
use tracing::{info, warn};

fn parse_args() -> AppConfig {
    let mut cfg = AppConfig::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().unwrap_or(60);
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args();
    info!(addr = %cfg.server_addr, tick_hz = cfg.tick_hz, "Starting relay");

    let mut server = RelayServer::new(cfg.clone()).await.context("create server")?;
    let local = server.local_addr()?;
    info!(%local, "Relay listening");

    // Set up console input channel.
    let (console_tx, console_rx) = mpsc::channel::<String>(32);
    server.set_console_input(console_rx);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            if stdin.lock().read_line(&mut line).is_err() {
                break;
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Relay ready. Type 'status' for info, 'quit' to exit.");
    println!();

    let tick_interval = std::time::Duration::from_secs_f32(cfg.tick_secs());
    let mut next_tick = tokio::time::Instant::now();

    while *server.state() == ServerState::Running {
        // A failed handshake only loses that one connection.
        match server.try_accept(std::time::Duration::from_millis(1)).await {
            Ok(Some(id)) => info!(player_id = ?id, "New player accepted"),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Handshake failed"),
        }

        server.step().await?;

        next_tick += tick_interval;
        tokio::time::sleep_until(next_tick).await;
    }

    Ok(())
}
