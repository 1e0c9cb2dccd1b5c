use std::time::Duration;

use rand::Rng;
use uuid::Uuid;

use crate::errors::{GameError, Result};
use crate::models::game_round::GameRound;
use crate::models::player::{Player, PlayerId, PlayerStatus};

/// Limits a game is played under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRules {
    pub min_players: usize,
    pub max_players: usize,
    pub max_attempts: usize,
    pub quorum_timeout: Duration,
}

impl Default for GameRules {
    fn default() -> Self {
        GameRules {
            min_players: 3,
            max_players: 6,
            max_attempts: 4,
            quorum_timeout: Duration::from_secs(20),
        }
    }
}

/// Source of secret codes for new rounds.
pub trait CodeGenerator: Send {
    fn next_code(&mut self) -> String;
}

/// Uniform random digit `0..=9`.
#[derive(Debug, Default)]
pub struct RandomCode;

impl CodeGenerator for RandomCode {
    fn next_code(&mut self) -> String {
        rand::thread_rng().gen_range(0..=9).to_string()
    }
}

/// Roster plus round history. Holds no locks itself; sharing between
/// connections goes through the round coordinator.
pub struct Game {
    id: Uuid,
    rules: GameRules,
    roster: Vec<Player>,
    rounds: Vec<GameRound>,
    next_player_id: u64,
    codes: Box<dyn CodeGenerator>,
}

impl Game {
    pub fn new(rules: GameRules) -> Self {
        Self::with_code_generator(rules, Box::new(RandomCode))
    }

    pub fn with_code_generator(rules: GameRules, codes: Box<dyn CodeGenerator>) -> Self {
        Game {
            id: Uuid::new_v4(),
            rules,
            roster: Vec::new(),
            rounds: Vec::new(),
            next_player_id: 1,
            codes,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn rules(&self) -> &GameRules {
        &self.rules
    }

    pub fn num_players(&self) -> usize {
        self.roster.len()
    }

    pub fn has_quorum(&self) -> bool {
        self.roster.len() >= self.rules.min_players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.roster.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.roster.iter_mut().find(|p| p.id == id)
    }

    pub fn round(&self, index: usize) -> Option<&GameRound> {
        self.rounds.get(index)
    }

    pub fn round_mut(&mut self, index: usize) -> Option<&mut GameRound> {
        self.rounds.get_mut(index)
    }

    pub fn current_round(&self) -> Option<&GameRound> {
        self.rounds.last()
    }

    pub fn current_round_index(&self) -> Option<usize> {
        self.rounds.len().checked_sub(1)
    }

    /// True when there is no round yet or the latest one has ended.
    pub fn needs_new_round(&self) -> bool {
        self.current_round().map_or(true, GameRound::has_ended)
    }

    pub fn sign_up_player(&mut self, name: &str) -> Result<PlayerId> {
        if self.roster.len() >= self.rules.max_players {
            return Err(GameError::GameFull {
                max: self.rules.max_players,
            });
        }

        let id = PlayerId(self.next_player_id);
        self.next_player_id += 1;
        self.roster.push(Player::new(id, name));
        Ok(id)
    }

    /// Opens a new round with a fresh code and every roster member enrolled.
    pub fn start_next_round(&mut self) -> Result<usize> {
        if !self.needs_new_round() {
            return Err(GameError::RoundStillOpen);
        }
        if self.roster.is_empty() {
            return Err(GameError::NoPlayers);
        }

        let mut round = GameRound::new(self.codes.next_code(), self.rules.max_attempts);
        for player in self.roster.iter_mut() {
            round.add_player(player)?;
            player.status = PlayerStatus::Started;
        }
        self.rounds.push(round);

        Ok(self.rounds.len() - 1)
    }

    /// Enrolls `id` in the open round unless already there.
    pub fn join_current_round(&mut self, id: PlayerId) -> Result<usize> {
        let index = self.current_round_index().ok_or(GameError::NoCurrentRound)?;
        let player = self
            .roster
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(GameError::UnknownPlayer(id))?;
        let round = &mut self.rounds[index];

        if !round.is_participant(id) {
            round.add_player(player)?;
        } else if round.has_ended() {
            return Err(GameError::RoundClosed);
        }
        Ok(index)
    }

    /// Runs `f` against the open round and the player's roster entry.
    pub fn with_round_and_player<T>(
        &mut self,
        id: PlayerId,
        f: impl FnOnce(&mut GameRound, &mut Player) -> T,
    ) -> Result<T> {
        let round = self.rounds.last_mut().ok_or(GameError::NoCurrentRound)?;
        let player = self
            .roster
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(GameError::UnknownPlayer(id))?;
        Ok(f(round, player))
    }

    /// Ends the open round once every participant has an outcome.
    /// Returns whether the round is (now) ended.
    pub fn end_round_if_complete(&mut self) -> bool {
        match self.rounds.last_mut() {
            Some(round) if round.has_ended() => true,
            Some(round) if round.all_terminal() => {
                round.end();
                true
            }
            _ => false,
        }
    }

    /// Every roster member apart from `id` has chosen to continue or quit.
    pub fn all_others_resolved(&self, id: PlayerId) -> bool {
        self.roster
            .iter()
            .filter(|p| p.id != id)
            .all(|p| p.status.is_resolved())
    }

    /// Takes the player off the roster. A player leaving mid-round forfeits
    /// it so the rest of the round can still complete.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let position = self.roster.iter().position(|p| p.id == id)?;
        let mut player = self.roster.remove(position);

        if let Some(round) = self.rounds.last_mut() {
            if !round.has_ended() && round.is_participant(id) && !round.is_terminal(id) {
                round.forfeit(&mut player);
                player.status = PlayerStatus::Forfeited;
            }
        }
        Some(player)
    }
}
