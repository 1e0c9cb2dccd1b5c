//! The conversation with one connected player, round after round.

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tracing::debug;

use crate::errors::{GameError, Result};
use crate::models::response::Response;
use crate::services::game_manager::{GameManager, GuessOutcome};
use crate::services::round_coordinator::QuorumOutcome;

pub const NAME_PROMPT: &str = "Enter your name: ";
pub const GUESS_PROMPT: &str = "Enter your guess: ";
pub const CONTINUE_PROMPT: &str = "Press (p) to continue to play, or (q) to quit: ";
pub const QUORUM_WAIT: &str = "Waiting for other players...";
pub const QUORUM_MET: &str = "minimum number of players needed fulfilled";
pub const COMPLETION_WAIT: &str = "Wait for other players to finish...";
pub const RESOLUTION_WAIT: &str = "Please wait for other players to finish before next round begins...";

const EMPTY_INPUT: &str = "Please enter non empty input.";
const BAD_GUESS: &str = "Please enter a whole number, or 'f' to forfeit.";
const BAD_CHOICE: &str = "Please enter 'p' or 'q'.";

pub struct Session {
    manager: GameManager,
    outbound: UnboundedSender<Response>,
    lines: UnboundedReceiver<String>,
}

impl Session {
    pub fn new(
        manager: GameManager,
        outbound: UnboundedSender<Response>,
        lines: UnboundedReceiver<String>,
    ) -> Self {
        Session {
            manager,
            outbound,
            lines,
        }
    }

    pub fn manager(&self) -> &GameManager {
        &self.manager
    }

    /// Plays rounds until the player quits. Returns `Disconnected` when the
    /// input side closes.
    pub async fn run(&mut self) -> Result<()> {
        self.manager.start();
        let name = self.read_line(NAME_PROMPT, true).await?;
        self.manager.sign_up(&name).await?;

        loop {
            self.play_round().await?;

            if !self.continue_or_quit().await? {
                self.manager.quit_player().await?;
                return Ok(());
            }

            self.manager.choose_to_continue().await?;
            let outbound = &self.outbound;
            self.manager
                .await_resolution(|| notice(outbound, RESOLUTION_WAIT))
                .await?;
        }
    }

    /// Reports how the session broke off, if it did, then takes the player
    /// out of the game.
    pub async fn finish(&mut self, failure: Option<&GameError>) {
        if let Some(error) = failure {
            self.manager.report_failure(error).await;
        }
        if self.manager.leave().await {
            debug!(game_id = %self.manager.coordinator().game_id(), "player left mid-session");
        }
    }

    async fn play_round(&mut self) -> Result<()> {
        let outbound = &self.outbound;
        let quorum = self
            .manager
            .await_quorum(|| notice(outbound, QUORUM_WAIT))
            .await;
        if quorum != QuorumOutcome::TimedOut {
            self.send(Response::message(QUORUM_MET))?;
        }

        self.manager.start_next_round().await?;

        loop {
            let input = self.read_line(GUESS_PROMPT, false).await?;
            match self.manager.add_guess(&input).await {
                Ok(GuessOutcome::Pending) => {}
                Ok(_) | Err(GameError::RoundClosed) => break,
                Err(e) if e.is_recoverable() => self.send(Response::error(BAD_GUESS))?,
                Err(e) => return Err(e),
            }
        }

        let outbound = &self.outbound;
        self.manager
            .await_completion(|| notice(outbound, COMPLETION_WAIT))
            .await?;
        self.manager.end_current_round().await?;
        Ok(())
    }

    async fn continue_or_quit(&mut self) -> Result<bool> {
        loop {
            let answer = self.read_line(CONTINUE_PROMPT, true).await?;
            match answer.to_lowercase().as_str() {
                "p" => return Ok(true),
                "q" => return Ok(false),
                _ => self.send(Response::error(BAD_CHOICE))?,
            }
        }
    }

    async fn read_line(&mut self, prompt: &str, required: bool) -> Result<String> {
        loop {
            self.send(Response::read_line(prompt))?;
            let line = self.lines.recv().await.ok_or(GameError::Disconnected)?;
            let line = line.trim();
            if required && line.is_empty() {
                self.send(Response::error(EMPTY_INPUT))?;
                continue;
            }
            return Ok(line.to_string());
        }
    }

    fn send(&self, frame: Response) -> Result<()> {
        self.outbound.send(frame).map_err(|_| GameError::Disconnected)
    }
}

fn notice(outbound: &UnboundedSender<Response>, text: &str) {
    let _ = outbound.send(Response::message(text));
}
