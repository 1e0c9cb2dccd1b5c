use core::fmt;

use serde::{Deserialize, Serialize};

/// Stable handle for a signed-up player, assigned by the game in sign-up order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerStatus {
    NotStarted,
    Started,
    Playing,
    Won,
    Lost,
    Forfeited,
    ChosenToContinue,
    Quited,
}

impl PlayerStatus {
    /// Won, lost or forfeited: no further guesses this round.
    pub fn is_terminal(self) -> bool {
        matches!(self, PlayerStatus::Won | PlayerStatus::Lost | PlayerStatus::Forfeited)
    }

    /// Answered the continue/quit question for the last round.
    pub fn is_resolved(self) -> bool {
        matches!(self, PlayerStatus::ChosenToContinue | PlayerStatus::Quited)
    }
}

impl fmt::Display for PlayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let status = match *self {
            PlayerStatus::NotStarted => "NOT_STARTED",
            PlayerStatus::Started => "STARTED",
            PlayerStatus::Playing => "PLAYING",
            PlayerStatus::Won => "WON",
            PlayerStatus::Lost => "LOST",
            PlayerStatus::Forfeited => "FORFEITED",
            PlayerStatus::ChosenToContinue => "CHOSEN_TO_CONTINUE",
            PlayerStatus::Quited => "QUITED",
        };
        write!(f, "{}", status)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub guesses: Vec<String>, // attempt order
    pub status: PlayerStatus,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Player {
            id,
            name: name.into(),
            guesses: Vec::new(),
            status: PlayerStatus::NotStarted,
        }
    }

    pub fn num_guesses(&self) -> usize {
        self.guesses.len()
    }

    pub fn clear_guesses(&mut self) {
        self.guesses.clear();
    }
}
