use std::time::Duration;

use clap::Parser;

use crate::errors::{GameError, Result};
use crate::models::game::GameRules;

/// Upper bound for the quorum wait and the heartbeat interval.
pub const MAX_WAIT_SECS: u64 = 24 * 60 * 60;

/// Startup settings for the guessing server. Every flag can also come from
/// a `GUESS_*` environment variable.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "guess-server")]
#[command(about = "Multiplayer number guessing game over websockets")]
pub struct ServerConfig {
    /// Interface to listen on
    #[arg(long, env = "GUESS_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on (0 picks a free one)
    #[arg(long, env = "GUESS_PORT", default_value_t = 61995)]
    pub port: u16,

    /// Players needed before a round starts without waiting
    #[arg(long, env = "GUESS_MIN_PLAYERS", default_value_t = 3)]
    pub min_players: usize,

    /// Sign-ups beyond this are turned away
    #[arg(long, env = "GUESS_MAX_PLAYERS", default_value_t = 6)]
    pub max_players: usize,

    /// Guesses each player gets per round
    #[arg(long, env = "GUESS_MAX_ATTEMPTS", default_value_t = 4)]
    pub max_attempts: usize,

    /// How long to wait for quorum before starting anyway
    #[arg(long, env = "GUESS_QUORUM_TIMEOUT_SECS", default_value_t = 20)]
    pub quorum_timeout_secs: u64,

    /// Interval between websocket pings
    #[arg(long, env = "GUESS_HEARTBEAT_SECS", default_value_t = 10)]
    pub heartbeat_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let rules = GameRules::default();
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 61995,
            min_players: rules.min_players,
            max_players: rules.max_players,
            max_attempts: rules.max_attempts,
            quorum_timeout_secs: rules.quorum_timeout.as_secs(),
            heartbeat_secs: 10,
        }
    }
}

impl ServerConfig {
    pub fn rules(&self) -> GameRules {
        GameRules {
            min_players: self.min_players,
            max_players: self.max_players,
            max_attempts: self.max_attempts,
            quorum_timeout: Duration::from_secs(self.quorum_timeout_secs),
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.clamp(1, MAX_WAIT_SECS))
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_players == 0 {
            return Err(GameError::InvalidConfig(
                "min-players must be at least 1".to_string(),
            ));
        }
        if self.max_players < self.min_players {
            return Err(GameError::InvalidConfig(format!(
                "max-players ({}) is below min-players ({})",
                self.max_players, self.min_players
            )));
        }
        if self.max_attempts == 0 {
            return Err(GameError::InvalidConfig(
                "max-attempts must be at least 1".to_string(),
            ));
        }
        if self.quorum_timeout_secs > MAX_WAIT_SECS {
            return Err(GameError::InvalidConfig(format!(
                "quorum-timeout-secs ({}) exceeds {}",
                self.quorum_timeout_secs, MAX_WAIT_SECS
            )));
        }
        if self.heartbeat_secs == 0 || self.heartbeat_secs > MAX_WAIT_SECS {
            return Err(GameError::InvalidConfig(format!(
                "heartbeat-secs must be between 1 and {}",
                MAX_WAIT_SECS
            )));
        }
        Ok(())
    }
}
