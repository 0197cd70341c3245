//! Configuration system.
//!
//! Loads application configuration from JSON strings/files (file IO left to app).

use serde::{Deserialize, Serialize};

/// Root configuration shared by client/server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Relay listen/connect address, e.g. `127.0.0.1:3000`.
    pub server_addr: String,
    /// Frame/tick rate of the update loop.
    pub tick_hz: u32,
    /// Text shown on the name label above the avatar (client only).
    #[serde(default = "default_player_name")]
    pub player_name: String,
}

fn default_player_name() -> String {
    "Player 1".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:3000".to_string(),
            tick_hz: 60,
            player_name: default_player_name(),
        }
    }
}

impl AppConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Seconds per tick; a zero tick rate is treated as 1 Hz.
    pub fn tick_secs(&self) -> f32 {
        1.0 / self.tick_hz.max(1) as f32
    }
}
