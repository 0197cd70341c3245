//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p avatar_client -- [--addr 127.0.0.1:3000] [--tick-hz 60]
//!       [--name "Player 1"] [--offline]
//!
//! The client joins the relay, spawns the rig for its role (the monster plays
//! the velociraptor, everyone else the fox), runs the frame loop headlessly
//! and broadcasts its pose every frame.
//!
//! Console commands stand in for the keyboard:
//!   +w / -w         - press / release a key (w a s d space)
//!   shift           - toggle walk/run
//!   orbit <degrees> - swing the camera around the avatar
//!   status          - show avatar and roster status
//!   quit            - exit client

use std::env;
use std::io::{BufRead, Write};
use std::time::Duration;

use anyhow::Context;
use avatar_client::{
    client::{ClientState, GameClient},
    mixer::BlendMixer,
    profile::CharacterProfile,
    session::LocalSession,
    ControllerError,
};
use avatar_shared::config::AppConfig;
use tokio::{sync::mpsc, time::Instant};
use tracing::{error, info, warn};

struct Args {
    cfg: AppConfig,
    offline: bool,
}

fn parse_args() -> Args {
    let mut cfg = AppConfig::default();
    let mut offline = false;
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
            "--name" if i + 1 < args.len() => {
                cfg.player_name = args[i + 1].clone();
                i += 2;
            }
            "--offline" => {
                offline = true;
                i += 1;
            }
            _ => i += 1,
        }
    }
    Args { cfg, offline }
}

enum Console {
    Output(Vec<String>),
    Quit,
}

fn exec_console(
    session: &mut LocalSession<BlendMixer>,
    client: Option<&GameClient>,
    line: &str,
) -> Console {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(&first) = tokens.first() else {
        return Console::Output(Vec::new());
    };

    if let Some(symbol) = first.strip_prefix('+') {
        session.key_down(symbol, false);
        return Console::Output(Vec::new());
    }
    if let Some(symbol) = first.strip_prefix('-') {
        session.key_up(symbol);
        return Console::Output(Vec::new());
    }

    match first {
        "shift" => {
            session.controller.switch_run_toggle();
            Console::Output(vec![format!("Running: {}", session.controller.run_toggle())])
        }
        "orbit" => match tokens.get(1).and_then(|d| d.parse::<f32>().ok()) {
            Some(deg) => {
                session.camera.orbit(deg.to_radians());
                Console::Output(Vec::new())
            }
            None => Console::Output(vec!["Usage: orbit <degrees>".to_string()]),
        },
        "status" => {
            let mut out = Vec::new();
            out.push(format!("State: {}", session.controller.state()));
            out.push(format!("Running: {}", session.controller.run_toggle()));
            out.push(format!("Model: {:?}", session.avatar.model.position));
            out.push(format!("Body velocity: {:?}", session.avatar.body.velocity));
            if session.controller.is_animation_halted() {
                out.push("Animation: halted (missing clip)".to_string());
            }
            if let Some(client) = client {
                out.push(format!("Player: {:?} monster={}", client.player_id, client.is_monster));
                out.push(format!("Frames sent: {}", client.frames_sent()));
                for p in client.remotes.iter() {
                    out.push(format!(
                        "  {:?}: monster={} pos={:?} updates={}",
                        p.info.id, p.info.is_monster, p.model.position, p.updates
                    ));
                }
            }
            Console::Output(out)
        }
        "quit" | "exit" => Console::Quit,
        other => Console::Output(vec![format!("Unknown command: {other}")]),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let Args { cfg, offline } = parse_args();
    info!(server = %cfg.server_addr, offline, "Starting client");

    let mut client = if offline {
        None
    } else {
        Some(GameClient::connect(&cfg).await.context("connect")?)
    };

    let is_monster = client.as_ref().map(|c| c.is_monster).unwrap_or(false);
    let profile = CharacterProfile::for_role(is_monster);
    let mut session =
        LocalSession::spawn(&profile, &cfg.player_name).context("spawn local avatar")?;

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

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

    println!("Playing as {}. Type '+w' to walk, 'status' for info, 'quit' to exit.", profile.rig);
    println!();

    let tick_interval = Duration::from_secs_f32(cfg.tick_secs());
    let mut last = Instant::now();
    let mut next_tick = last;

    loop {
        while let Ok(line) = console_rx.try_recv() {
            match exec_console(&mut session, client.as_ref(), &line) {
                Console::Output(lines) => {
                    for line in lines {
                        println!("{}", line);
                    }
                }
                Console::Quit => return Ok(()),
            }
        }

        let now = Instant::now();
        let delta = now.duration_since(last).as_secs_f32();
        last = now;

        match session.frame(delta) {
            Ok(_) => {}
            Err(e @ ControllerError::ClipNotFound { .. }) => {
                error!(rig = %profile.rig, error = %e, "Animation stopped")
            }
            Err(e) => warn!(error = %e, "Frame skipped"),
        }

        if let Some(client) = client.as_mut() {
            let pose = session.pose(client.player_id);
            if let Err(e) = client.emit(pose).await {
                warn!(error = %e, "Pose emit failed");
            }
            client.poll_reliable();
            if let Err(e) = client.recv_updates() {
                warn!(error = %e, "Pose receive failed");
            }
            if client.state == ClientState::Disconnected {
                println!("Disconnected from relay.");
                break;
            }
        }

        next_tick += tick_interval;
        tokio::time::sleep_until(next_tick).await;
    }

    Ok(())
}
