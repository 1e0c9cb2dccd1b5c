use serde::{Deserialize, Serialize};

use crate::errors::{GameError, Result};
use crate::models::player::{Player, PlayerId};

/// Guesses whose numeric value is above this are reported as out of range.
pub const MAX_GUESS_VALUE: i64 = 10;

/// A round's own record of someone who took part in it. Survives the player
/// leaving the roster so the round can still be summarised.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub id: PlayerId,
    pub name: String,
    pub attempts: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RoundSummary {
    pub code: String,
    pub winners: Vec<(String, usize)>, // fewest attempts first
    pub losers: Vec<String>,
    pub forfeited: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct GameRound {
    code: String,
    max_attempts: usize,
    participants: Vec<Participant>,
    winners: Vec<PlayerId>,
    losers: Vec<PlayerId>,
    forfeited: Vec<PlayerId>,
    ended: bool,
}

impl GameRound {
    pub fn new(code: impl Into<String>, max_attempts: usize) -> Self {
        GameRound {
            code: code.into(),
            max_attempts,
            participants: Vec::new(),
            winners: Vec::new(),
            losers: Vec::new(),
            forfeited: Vec::new(),
            ended: false,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn winners(&self) -> &[PlayerId] {
        &self.winners
    }

    pub fn losers(&self) -> &[PlayerId] {
        &self.losers
    }

    pub fn forfeited(&self) -> &[PlayerId] {
        &self.forfeited
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    pub fn is_participant(&self, id: PlayerId) -> bool {
        self.participants.iter().any(|p| p.id == id)
    }

    pub fn has_winner(&self, id: PlayerId) -> bool {
        self.winners.contains(&id)
    }

    pub fn has_loser(&self, id: PlayerId) -> bool {
        self.losers.contains(&id)
    }

    pub fn has_forfeited(&self, id: PlayerId) -> bool {
        self.forfeited.contains(&id)
    }

    /// Won, lost or forfeited in this round.
    pub fn is_terminal(&self, id: PlayerId) -> bool {
        self.has_winner(id) || self.has_loser(id) || self.has_forfeited(id)
    }

    pub fn all_terminal(&self) -> bool {
        self.participants.iter().all(|p| self.is_terminal(p.id))
    }

    /// Enrolls `player`, wiping whatever guesses they carried over.
    pub fn add_player(&mut self, player: &mut Player) -> Result<()> {
        if self.ended {
            return Err(GameError::RoundClosed);
        }

        player.clear_guesses();
        match self.participants.iter_mut().find(|p| p.id == player.id) {
            Some(existing) => existing.attempts = 0,
            None => self.participants.push(Participant {
                id: player.id,
                name: player.name.clone(),
                attempts: 0,
            }),
        }
        Ok(())
    }

    /// Records and classifies a guess.
    ///
    /// Only the first `max_attempts` guesses are recorded, but every guess is
    /// still checked: a match makes the player a winner, and a miss once the
    /// player holds `max_attempts` guesses makes them a loser.
    pub fn add_guess(&mut self, player: &mut Player, guess: &str) {
        if self.has_winner(player.id) || self.has_loser(player.id) {
            return;
        }

        if self.is_participant(player.id) && player.num_guesses() < self.max_attempts {
            player.guesses.push(guess.to_string());
            self.sync_attempts(player);
        }

        if self.is_guess_match(guess) {
            self.add_winner(player.id);
            return;
        }

        if player.num_guesses() >= self.max_attempts {
            self.add_loser(player.id);
        }
    }

    /// Pads the player's guesses with blanks up to `max_attempts + 1` and
    /// marks them forfeited.
    pub fn forfeit(&mut self, player: &mut Player) {
        while player.num_guesses() < self.max_attempts + 1 {
            player.guesses.push(String::new());
        }
        self.sync_attempts(player);
        self.add_forfeiter(player.id);
    }

    /// Every participant without an outcome loses, then the round closes.
    pub fn end(&mut self) {
        let pending: Vec<PlayerId> = self
            .participants
            .iter()
            .map(|p| p.id)
            .filter(|id| !self.is_terminal(*id))
            .collect();
        self.losers.extend(pending);
        self.ended = true;
    }

    pub fn is_guess_match(&self, guess: &str) -> bool {
        self.code == guess
    }

    pub fn is_higher_guess(&self, guess: &str) -> Result<bool> {
        Ok(parse_guess(guess)? > self.code_value()?)
    }

    pub fn is_lower_guess(&self, guess: &str) -> Result<bool> {
        Ok(parse_guess(guess)? < self.code_value()?)
    }

    /// Only the upper bound matters; generated codes are never negative.
    pub fn is_invalid_range_guess(&self, guess: &str) -> Result<bool> {
        Ok(parse_guess(guess)? > MAX_GUESS_VALUE)
    }

    pub fn summary(&self) -> RoundSummary {
        let name_of = |id: &PlayerId| {
            self.participants
                .iter()
                .find(|p| p.id == *id)
                .map(|p| p.name.clone())
                .unwrap_or_else(|| id.to_string())
        };
        let attempts_of = |id: &PlayerId| {
            self.participants
                .iter()
                .find(|p| p.id == *id)
                .map(|p| p.attempts)
                .unwrap_or(0)
        };

        let mut winners: Vec<(String, usize)> = self
            .winners
            .iter()
            .map(|id| (name_of(id), attempts_of(id)))
            .collect();
        winners.sort_by_key(|(_, attempts)| *attempts);

        RoundSummary {
            code: self.code.clone(),
            winners,
            losers: self.losers.iter().map(name_of).collect(),
            forfeited: self.forfeited.iter().map(name_of).collect(),
        }
    }

    fn code_value(&self) -> Result<i64> {
        parse_guess(&self.code)
    }

    fn sync_attempts(&mut self, player: &Player) {
        if let Some(p) = self.participants.iter_mut().find(|p| p.id == player.id) {
            p.attempts = player.num_guesses();
        }
    }

    fn add_winner(&mut self, id: PlayerId) {
        if self.is_participant(id) && !self.is_terminal(id) {
            self.winners.push(id);
        }
    }

    fn add_loser(&mut self, id: PlayerId) {
        if self.is_participant(id) && !self.is_terminal(id) {
            self.losers.push(id);
        }
    }

    fn add_forfeiter(&mut self, id: PlayerId) {
        if self.is_participant(id) && !self.is_terminal(id) {
            self.forfeited.push(id);
        }
    }
}

/// Parses a guess as a base-10 integer.
pub fn parse_guess(guess: &str) -> Result<i64> {
    guess
        .trim()
        .parse::<i64>()
        .map_err(|_| GameError::InvalidGuessFormat(guess.to_string()))
}
