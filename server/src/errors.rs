//! Error type shared by the game model, the coordinator and the socket layer.

use thiserror::Error;

use crate::models::player::PlayerId;

pub type Result<T> = std::result::Result<T, GameError>;

#[derive(Debug, Error)]
pub enum GameError {
    /// Guess was not a whole number (or was empty).
    #[error("invalid guess format: {0:?}")]
    InvalidGuessFormat(String),

    #[error("current round has not yet ended")]
    RoundStillOpen,

    #[error("there are currently no players available")]
    NoPlayers,

    #[error("player already signed up on this connection")]
    AlreadySignedUp,

    #[error("player has not signed up yet")]
    NotSignedUp,

    #[error("cannot add more than {max} players")]
    GameFull { max: usize },

    #[error("no round has been started")]
    NoCurrentRound,

    #[error("round has already ended")]
    RoundClosed,

    #[error("player {0} is not part of this game")]
    UnknownPlayer(PlayerId),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("client disconnected")]
    Disconnected,

    #[error("websocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GameError {
    /// Errors the session answers with a re-prompt instead of a teardown.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, GameError::InvalidGuessFormat(_))
    }
}
