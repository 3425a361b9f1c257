//! Server configuration and its environment surface.

use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use jigsync_room::RoomConfig;
use jigsync_session::SessionConfig;

use crate::JigsyncError;

/// Everything needed to build a [`JigsyncServer`](crate::JigsyncServer).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,
    pub room: RoomConfig,
    pub session: SessionConfig,
    /// Send progress updates back to their sender as well.
    pub echo_progress: bool,
    /// How often the sweeper expires sessions and reaps idle rooms.
    pub sweep_interval: Duration,
    /// How long a new socket may take to complete its WebSocket upgrade.
    pub handshake_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            room: RoomConfig::default(),
            session: SessionConfig::default(),
            echo_progress: false,
            sweep_interval: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Reads `JIGSYNC_*` variables from the process environment.
    pub fn from_env() -> Result<Self, JigsyncError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from a key lookup, starting from the defaults.
    ///
    /// | Key | Meaning |
    /// |-----|---------|
    /// | `JIGSYNC_BIND` | listen address |
    /// | `JIGSYNC_MIN_PLAYERS` | start threshold |
    /// | `JIGSYNC_ROOM_IDLE_TTL_SECS` | idle room TTL, 0 disables |
    /// | `JIGSYNC_RESUME_GRACE_SECS` | session resume window |
    /// | `JIGSYNC_ECHO_PROGRESS` | `true` / `false` |
    /// | `JIGSYNC_SWEEP_INTERVAL_SECS` | sweeper period, must be > 0 |
    /// | `JIGSYNC_HANDSHAKE_TIMEOUT_SECS` | upgrade deadline, must be > 0 |
    ///
    /// # Errors
    /// [`JigsyncError::Config`] naming the first key that fails to parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, JigsyncError> {
        let mut config = Self::default();

        if let Some(addr) = lookup("JIGSYNC_BIND") {
            config.bind_addr = addr;
        }
        if let Some(raw) = lookup("JIGSYNC_MIN_PLAYERS") {
            config.room.min_players = parse("JIGSYNC_MIN_PLAYERS", &raw)?;
        }
        if let Some(raw) = lookup("JIGSYNC_ROOM_IDLE_TTL_SECS") {
            let secs: u64 = parse("JIGSYNC_ROOM_IDLE_TTL_SECS", &raw)?;
            config.room.idle_ttl = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(raw) = lookup("JIGSYNC_RESUME_GRACE_SECS") {
            config.session.resume_grace_secs = parse("JIGSYNC_RESUME_GRACE_SECS", &raw)?;
        }
        if let Some(raw) = lookup("JIGSYNC_ECHO_PROGRESS") {
            config.echo_progress = parse("JIGSYNC_ECHO_PROGRESS", &raw)?;
        }
        if let Some(raw) = lookup("JIGSYNC_SWEEP_INTERVAL_SECS") {
            config.sweep_interval = parse_positive_secs("JIGSYNC_SWEEP_INTERVAL_SECS", &raw)?;
        }
        if let Some(raw) = lookup("JIGSYNC_HANDSHAKE_TIMEOUT_SECS") {
            config.handshake_timeout =
                parse_positive_secs("JIGSYNC_HANDSHAKE_TIMEOUT_SECS", &raw)?;
        }

        Ok(config)
    }
}

fn parse_positive_secs(key: &str, raw: &str) -> Result<Duration, JigsyncError> {
    match parse::<u64>(key, raw)? {
        0 => Err(JigsyncError::Config(format!("{key} must be greater than 0"))),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn parse<T>(key: &str, raw: &str) -> Result<T, JigsyncError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim()
        .parse()
        .map_err(|e| JigsyncError::Config(format!("{key}={raw:?}: {e}")))
}
