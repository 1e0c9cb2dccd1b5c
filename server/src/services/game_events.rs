//! Domain events and the sinks that observe them.
//!
//! Sinks run synchronously, in registration order, while the game lock is
//! held. They must not call back into the coordinator.

use std::fmt::Write as _;

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;
use tracing::info;
use uuid::Uuid;

use crate::models::game_round::{Participant, RoundSummary};
use crate::models::player::PlayerId;
use crate::models::response::Response;

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    Started,
    SecretCodeCreated { round: usize, code: String },
    RoundStarted { round: usize, players: Vec<Participant>, player: PlayerId },
    PlayerSignedUp { player: PlayerId, name: String },
    GuessAdded { player: PlayerId, name: String, guess: String },
    GuessTooHigh { player: PlayerId, name: String, guess: String },
    GuessTooLow { player: PlayerId, name: String, guess: String },
    GuessOutOfRange { player: PlayerId, name: String, guess: String },
    PlayerWon { player: PlayerId, name: String, attempts: usize },
    PlayerLost { player: PlayerId, name: String, code: String },
    RoundEnded { round: usize, summary: RoundSummary },
    PlayerForfeited { player: PlayerId, name: String },
    PlayerQuit { player: PlayerId, name: String },
    SessionFailed { player: Option<PlayerId>, reason: String },
}

impl GameEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GameEvent::Started => "GAME STARTED",
            GameEvent::SecretCodeCreated { .. } => "SECRET CODE GENERATED",
            GameEvent::RoundStarted { .. } => "ROUND STARTED",
            GameEvent::PlayerSignedUp { .. } => "PLAYER SIGNED UP",
            GameEvent::GuessAdded { .. } => "GUESS ADDED",
            GameEvent::GuessTooHigh { .. }
            | GameEvent::GuessTooLow { .. }
            | GameEvent::GuessOutOfRange { .. } => "INCORRECT GUESS",
            GameEvent::PlayerWon { .. } => "PLAYER WON",
            GameEvent::PlayerLost { .. } => "PLAYER LOST",
            GameEvent::RoundEnded { .. } => "ROUND ENDED",
            GameEvent::PlayerForfeited { .. } => "PLAYER FORFEITED",
            GameEvent::PlayerQuit { .. } => "PLAYER QUITED",
            GameEvent::SessionFailed { .. } => "EXCEPTION",
        }
    }
}

pub trait EventSink: Send + Sync {
    fn on_event(&self, event: &GameEvent);
}

/// Turns events into frames for one connection.
pub struct ResponseSink {
    tx: UnboundedSender<Response>,
}

impl ResponseSink {
    pub fn new(tx: UnboundedSender<Response>) -> Self {
        ResponseSink { tx }
    }

    pub fn render(event: &GameEvent) -> Response {
        match event {
            GameEvent::Started => Response::message("**GAME STARTED**"),
            GameEvent::SecretCodeCreated { .. } => {
                Response::message("A new secret number between 0 and 9 has been chosen.")
            }
            GameEvent::RoundStarted { players, player, .. } => {
                let mut text = String::from("----------------ROUND STARTED----------------\n");
                for p in players {
                    let _ = write!(text, " - {}", p.name);
                    if p.id == *player {
                        text.push_str("(you)");
                    }
                    text.push('\n');
                }
                Response::message(text)
            }
            GameEvent::PlayerSignedUp { name, .. } => {
                Response::message(format!("Player \"{}\" successfully registered.", name))
            }
            GameEvent::GuessAdded { guess, .. } => Response::message(format!("You guessed {}", guess)),
            GameEvent::GuessTooHigh { guess, .. } => Response::message(format!(
                "Your guess {} is bigger than the generated number",
                guess
            )),
            GameEvent::GuessTooLow { guess, .. } => Response::message(format!(
                "Your guess {} is smaller than the generated number",
                guess
            )),
            GameEvent::GuessOutOfRange { .. } => {
                Response::message("Please enter a number between 0 and 9")
            }
            GameEvent::PlayerWon { attempts, .. } => {
                Response::message(format!("YOU WIN. Number of guesses made: {}", attempts))
            }
            GameEvent::PlayerLost { code, .. } => {
                Response::message(format!("You lose. Answer is {}.", code))
            }
            GameEvent::RoundEnded { summary, .. } => Response::message(format!(
                "----------------ROUND ENDED----------------\n{}",
                render_summary(summary)
            )),
            GameEvent::PlayerForfeited { .. } => Response::message("You have forfeited this round."),
            GameEvent::PlayerQuit { .. } => Response::quit("You have chosen to quit the game"),
            GameEvent::SessionFailed { reason, .. } => Response::quit(format!("ERROR: {}", reason)),
        }
    }
}

impl EventSink for ResponseSink {
    fn on_event(&self, event: &GameEvent) {
        // A closed channel means the connection is already being torn down.
        let _ = self.tx.send(Self::render(event));
    }
}

/// Server-side game log.
pub struct TracingSink {
    game_id: Uuid,
}

impl TracingSink {
    pub fn new(game_id: Uuid) -> Self {
        TracingSink { game_id }
    }

    fn describe(event: &GameEvent) -> String {
        match event {
            GameEvent::Started => "Game started".to_string(),
            GameEvent::SecretCodeCreated { code, .. } => format!("Generated secret code is {}", code),
            GameEvent::RoundStarted { players, .. } => {
                let names: Vec<&str> = players.iter().map(|p| p.name.as_str()).collect();
                format!("New round started. Players: {}", names.join(", "))
            }
            GameEvent::PlayerSignedUp { name, .. } => format!("Player {} signed up.", name),
            GameEvent::GuessAdded { name, guess, .. } => format!("Player {} guessed {}", name, guess),
            GameEvent::GuessTooHigh { name, .. } => {
                format!("Player {} guesses higher than generated number", name)
            }
            GameEvent::GuessTooLow { name, .. } => {
                format!("Player {} guesses lower than generated number", name)
            }
            GameEvent::GuessOutOfRange { name, .. } => format!("Player {} guesses not between 0-9", name),
            GameEvent::PlayerWon { name, attempts, .. } => {
                format!("Player {} won with {} attempts", name, attempts)
            }
            GameEvent::PlayerLost { name, code, .. } => {
                format!("Player {} lost the round. The secret code was {}", name, code)
            }
            GameEvent::RoundEnded { summary, .. } => format!("Round ended.\n{}", render_summary(summary)),
            GameEvent::PlayerForfeited { name, .. } => format!("Player {} forfeited the round.", name),
            GameEvent::PlayerQuit { name, .. } => format!("Player {} chosen to quit the game.", name),
            GameEvent::SessionFailed { player: Some(id), reason } => {
                format!("Session of player {} failed: {}", id, reason)
            }
            GameEvent::SessionFailed { player: None, reason } => {
                format!("Session failed before sign-up: {}", reason)
            }
        }
    }
}

impl EventSink for TracingSink {
    fn on_event(&self, event: &GameEvent) {
        let payload = serde_json::to_string(event).unwrap_or_default();
        info!(
            game_id = %self.game_id,
            event = %payload,
            "{} - {}",
            event.name(),
            Self::describe(event)
        );
    }
}

pub fn render_summary(summary: &RoundSummary) -> String {
    let mut text = String::from("WINNERS: \n");
    if summary.winners.is_empty() {
        text.push_str(" * There are no winners for this round *\n");
    }
    for (i, (name, attempts)) in summary.winners.iter().enumerate() {
        let _ = writeln!(text, " {}. {} ({} guesses)", i + 1, name, attempts);
    }

    text.push_str("LOSERS: \n");
    if summary.losers.is_empty() {
        text.push_str(" * There are no losers for this round *\n");
    }
    for name in &summary.losers {
        let _ = writeln!(text, " - {}", name);
    }

    text.push_str("FORFEITED: \n");
    if summary.forfeited.is_empty() {
        text.push_str(" * There are no players forfeited for this round *\n");
    }
    for name in &summary.forfeited {
        let _ = writeln!(text, " - {}", name);
    }
    text
}
