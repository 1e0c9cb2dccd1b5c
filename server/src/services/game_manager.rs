//! Per-connection facade over the shared game.
//!
//! Every state change happens inside one coordinator critical section and
//! reports what happened to this connection's sinks before returning.

use std::sync::Arc;

use crate::errors::{GameError, Result};
use crate::models::game::Game;
use crate::models::game_round::{parse_guess, GameRound, RoundSummary};
use crate::models::player::{PlayerId, PlayerStatus};
use crate::services::game_events::{EventSink, GameEvent};
use crate::services::round_coordinator::{QuorumOutcome, RoundCoordinator};

/// Where a player stands after a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessOutcome {
    Pending,
    Won,
    Lost,
    Forfeited,
}

pub struct GameManager {
    coordinator: Arc<RoundCoordinator>,
    player: Option<PlayerId>,
    round: Option<usize>,
    sinks: Vec<Box<dyn EventSink>>,
}

impl GameManager {
    pub fn new(coordinator: Arc<RoundCoordinator>) -> Self {
        GameManager {
            coordinator,
            player: None,
            round: None,
            sinks: Vec::new(),
        }
    }

    /// Sinks are called in the order they were added.
    pub fn add_sink(&mut self, sink: Box<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn coordinator(&self) -> &Arc<RoundCoordinator> {
        &self.coordinator
    }

    pub fn player_id(&self) -> Option<PlayerId> {
        self.player
    }

    pub async fn player_status(&self) -> Option<PlayerStatus> {
        let id = self.player?;
        self.coordinator
            .with_game(|game| game.player(id).map(|p| p.status))
            .await
    }

    pub async fn roster_len(&self) -> usize {
        self.coordinator.with_game(|game| game.num_players()).await
    }

    pub async fn current_round_index(&self) -> Option<usize> {
        self.coordinator.with_game(|game| game.current_round_index()).await
    }

    pub fn start(&self) {
        self.emit(&GameEvent::Started);
    }

    pub async fn sign_up(&mut self, name: &str) -> Result<PlayerId> {
        if self.player.is_some() {
            return Err(GameError::AlreadySignedUp);
        }

        let sinks = &self.sinks;
        let id = self
            .coordinator
            .with_game(|game| {
                let id = game.sign_up_player(name)?;
                emit_to(
                    sinks,
                    &GameEvent::PlayerSignedUp {
                        player: id,
                        name: name.to_string(),
                    },
                );
                Ok::<_, GameError>(id)
            })
            .await?;

        self.player = Some(id);
        self.coordinator.notify_quorum();
        Ok(id)
    }

    /// Opens a new round unless one is already running, then makes sure this
    /// player is in it.
    pub async fn start_next_round(&mut self) -> Result<usize> {
        let id = self.require_player()?;
        let sinks = &self.sinks;

        let index = self
            .coordinator
            .with_game(|game| {
                if game.needs_new_round() {
                    let index = game.start_next_round()?;
                    if let Some(round) = game.round(index) {
                        emit_to(
                            sinks,
                            &GameEvent::SecretCodeCreated {
                                round: index,
                                code: round.code().to_string(),
                            },
                        );
                    }
                }

                let index = game.join_current_round(id)?;
                if let Some(player) = game.player_mut(id) {
                    player.status = PlayerStatus::Started;
                }
                if let Some(round) = game.round(index) {
                    emit_to(
                        sinks,
                        &GameEvent::RoundStarted {
                            round: index,
                            players: round.participants().to_vec(),
                            player: id,
                        },
                    );
                }
                Ok::<_, GameError>(index)
            })
            .await?;

        self.round = Some(index);
        self.coordinator.notify_resolution();
        Ok(index)
    }

    /// Handles one line of guess input. `f` forfeits; anything else must be
    /// a whole number.
    pub async fn add_guess(&mut self, input: &str) -> Result<GuessOutcome> {
        let input = input.trim();
        if input.eq_ignore_ascii_case("f") {
            return self.forfeit().await;
        }

        let id = self.require_player()?;
        let guess = parse_guess(input)?.to_string();
        let sinks = &self.sinks;

        let (outcome, ended) = self
            .coordinator
            .with_game(|game| {
                let outcome = game.with_round_and_player(id, |round, player| -> Result<GuessOutcome> {
                    if let Some(outcome) = settled_outcome(round, id) {
                        return Ok(outcome);
                    }
                    if round.has_ended() {
                        return Err(GameError::RoundClosed);
                    }

                    player.status = PlayerStatus::Playing;
                    round.add_guess(player, &guess);
                    emit_to(
                        sinks,
                        &GameEvent::GuessAdded {
                            player: id,
                            name: player.name.clone(),
                            guess: guess.clone(),
                        },
                    );

                    let hint = if round.is_invalid_range_guess(&guess)? {
                        Some(GameEvent::GuessOutOfRange {
                            player: id,
                            name: player.name.clone(),
                            guess: guess.clone(),
                        })
                    } else if round.is_guess_match(&guess) {
                        None
                    } else if round.is_higher_guess(&guess)? {
                        Some(GameEvent::GuessTooHigh {
                            player: id,
                            name: player.name.clone(),
                            guess: guess.clone(),
                        })
                    } else {
                        Some(GameEvent::GuessTooLow {
                            player: id,
                            name: player.name.clone(),
                            guess: guess.clone(),
                        })
                    };
                    if let Some(hint) = hint {
                        emit_to(sinks, &hint);
                    }

                    if round.has_winner(id) {
                        player.status = PlayerStatus::Won;
                        emit_to(
                            sinks,
                            &GameEvent::PlayerWon {
                                player: id,
                                name: player.name.clone(),
                                attempts: player.num_guesses(),
                            },
                        );
                        return Ok(GuessOutcome::Won);
                    }
                    if round.has_loser(id) {
                        player.status = PlayerStatus::Lost;
                        emit_to(
                            sinks,
                            &GameEvent::PlayerLost {
                                player: id,
                                name: player.name.clone(),
                                code: round.code().to_string(),
                            },
                        );
                        return Ok(GuessOutcome::Lost);
                    }
                    Ok(GuessOutcome::Pending)
                })??;
                Ok::<_, GameError>((outcome, game.end_round_if_complete()))
            })
            .await?;

        if outcome != GuessOutcome::Pending || ended {
            self.coordinator.notify_completion();
        }
        Ok(outcome)
    }

    pub async fn forfeit(&mut self) -> Result<GuessOutcome> {
        let id = self.require_player()?;
        let sinks = &self.sinks;

        let outcome = self
            .coordinator
            .with_game(|game| {
                let outcome = game.with_round_and_player(id, |round, player| -> Result<GuessOutcome> {
                    if let Some(outcome) = settled_outcome(round, id) {
                        return Ok(outcome);
                    }
                    if round.has_ended() {
                        return Err(GameError::RoundClosed);
                    }
                    round.forfeit(player);
                    player.status = PlayerStatus::Forfeited;
                    emit_to(
                        sinks,
                        &GameEvent::PlayerForfeited {
                            player: id,
                            name: player.name.clone(),
                        },
                    );
                    Ok(GuessOutcome::Forfeited)
                })??;
                game.end_round_if_complete();
                Ok::<_, GameError>(outcome)
            })
            .await?;

        self.coordinator.notify_completion();
        Ok(outcome)
    }

    /// Closes this player's round (idempotent) and reports the results.
    pub async fn end_current_round(&self) -> Result<RoundSummary> {
        let index = self.round.ok_or(GameError::NoCurrentRound)?;
        let sinks = &self.sinks;

        let summary = self
            .coordinator
            .with_game(|game| {
                let round = game.round_mut(index).ok_or(GameError::NoCurrentRound)?;
                if !round.has_ended() {
                    round.end();
                }
                let summary = round.summary();
                emit_to(
                    sinks,
                    &GameEvent::RoundEnded {
                        round: index,
                        summary: summary.clone(),
                    },
                );
                Ok::<_, GameError>(summary)
            })
            .await?;

        self.coordinator.notify_completion();
        Ok(summary)
    }

    pub async fn choose_to_continue(&self) -> Result<()> {
        let id = self.require_player()?;
        self.coordinator
            .with_game(|game| {
                let player = game.player_mut(id).ok_or(GameError::UnknownPlayer(id))?;
                player.status = PlayerStatus::ChosenToContinue;
                Ok::<_, GameError>(())
            })
            .await?;

        self.coordinator.notify_resolution();
        Ok(())
    }

    /// Marks the player as quit, tells the sinks, and takes them off the roster.
    pub async fn quit_player(&mut self) -> Result<()> {
        let id = self.require_player()?;
        let sinks = &self.sinks;

        self.coordinator
            .with_game(|game| {
                let player = game.player_mut(id).ok_or(GameError::UnknownPlayer(id))?;
                player.status = PlayerStatus::Quited;
                emit_to(
                    sinks,
                    &GameEvent::PlayerQuit {
                        player: id,
                        name: player.name.clone(),
                    },
                );
                game.remove_player(id);
                game.end_round_if_complete();
                Ok::<_, GameError>(())
            })
            .await?;

        self.player = None;
        self.coordinator.notify_all();
        Ok(())
    }

    /// Silent removal for a connection that is going away. A player still in
    /// a round forfeits it. Safe to call more than once.
    pub async fn leave(&mut self) -> bool {
        let Some(id) = self.player.take() else {
            return false;
        };

        let removed = self
            .coordinator
            .with_game(|game: &mut Game| {
                let removed = game.remove_player(id).is_some();
                game.end_round_if_complete();
                removed
            })
            .await;

        self.coordinator.notify_all();
        removed
    }

    /// Tells the sinks that this connection's session broke off with `error`.
    pub async fn report_failure(&self, error: &GameError) {
        let event = GameEvent::SessionFailed {
            player: self.player,
            reason: error.to_string(),
        };
        let sinks = &self.sinks;
        self.coordinator.with_game(|_| emit_to(sinks, &event)).await;
    }

    pub async fn await_quorum(&self, on_wait: impl FnOnce()) -> QuorumOutcome {
        self.coordinator.await_quorum(on_wait).await
    }

    pub async fn await_completion(&self, on_wait: impl FnOnce()) -> Result<()> {
        let index = self.round.ok_or(GameError::NoCurrentRound)?;
        self.coordinator.await_completion(index, on_wait).await;
        Ok(())
    }

    pub async fn await_resolution(&self, on_wait: impl FnOnce()) -> Result<()> {
        let id = self.require_player()?;
        let index = self.round.ok_or(GameError::NoCurrentRound)?;
        self.coordinator.await_resolution(id, index, on_wait).await;
        Ok(())
    }

    fn require_player(&self) -> Result<PlayerId> {
        self.player.ok_or(GameError::NotSignedUp)
    }

    fn emit(&self, event: &GameEvent) {
        emit_to(&self.sinks, event);
    }
}

/// The player's outcome if they already have one in `round`.
fn settled_outcome(round: &GameRound, id: PlayerId) -> Option<GuessOutcome> {
    if round.has_winner(id) {
        Some(GuessOutcome::Won)
    } else if round.has_loser(id) {
        Some(GuessOutcome::Lost)
    } else if round.has_forfeited(id) {
        Some(GuessOutcome::Forfeited)
    } else {
        None
    }
}

fn emit_to(sinks: &[Box<dyn EventSink>], event: &GameEvent) {
    for sink in sinks {
        sink.on_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::game::tests::fixed_game;
    use crate::models::game::GameRules;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<GameEvent>>>);

    impl Recorder {
        fn take(&self) -> Vec<GameEvent> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    impl EventSink for Recorder {
        fn on_event(&self, event: &GameEvent) {
            self.0.lock().unwrap().push(event.clone());
        }
    }

    fn names(events: &[GameEvent]) -> Vec<&'static str> {
        events
            .iter()
            .map(|e| match e {
                GameEvent::Started => "Started",
                GameEvent::SecretCodeCreated { .. } => "SecretCodeCreated",
                GameEvent::RoundStarted { .. } => "RoundStarted",
                GameEvent::PlayerSignedUp { .. } => "PlayerSignedUp",
                GameEvent::GuessAdded { .. } => "GuessAdded",
                GameEvent::GuessTooHigh { .. } => "GuessTooHigh",
                GameEvent::GuessTooLow { .. } => "GuessTooLow",
                GameEvent::GuessOutOfRange { .. } => "GuessOutOfRange",
                GameEvent::PlayerWon { .. } => "PlayerWon",
                GameEvent::PlayerLost { .. } => "PlayerLost",
                GameEvent::RoundEnded { .. } => "RoundEnded",
                GameEvent::PlayerForfeited { .. } => "PlayerForfeited",
                GameEvent::PlayerQuit { .. } => "PlayerQuit",
                GameEvent::SessionFailed { .. } => "SessionFailed",
            })
            .collect()
    }

    async fn manager_in_round(code: &'static str) -> (GameManager, Recorder) {
        let coordinator = RoundCoordinator::new(fixed_game(GameRules::default(), vec![code]));
        let recorder = Recorder::default();
        let mut manager = GameManager::new(coordinator);
        manager.add_sink(Box::new(recorder.clone()));
        manager.sign_up("ada").await.unwrap();
        manager.start_next_round().await.unwrap();
        recorder.take();
        (manager, recorder)
    }

    #[tokio::test]
    async fn sign_up_and_round_start_events() {
        let coordinator = RoundCoordinator::new(fixed_game(GameRules::default(), vec!["5"]));
        let recorder = Recorder::default();
        let mut manager = GameManager::new(coordinator);
        manager.add_sink(Box::new(recorder.clone()));

        manager.start();
        manager.sign_up("ada").await.unwrap();
        manager.start_next_round().await.unwrap();

        assert_eq!(
            names(&recorder.take()),
            vec!["Started", "PlayerSignedUp", "SecretCodeCreated", "RoundStarted"]
        );
        assert_eq!(manager.player_status().await, Some(PlayerStatus::Started));
    }

    #[tokio::test]
    async fn second_sign_up_is_rejected() {
        let (mut manager, _) = manager_in_round("5").await;
        assert!(matches!(manager.sign_up("again").await, Err(GameError::AlreadySignedUp)));
    }

    #[tokio::test]
    async fn guess_before_sign_up_is_rejected() {
        let coordinator = RoundCoordinator::new(fixed_game(GameRules::default(), vec!["5"]));
        let mut manager = GameManager::new(coordinator);
        assert!(matches!(manager.add_guess("3").await, Err(GameError::NotSignedUp)));
    }

    #[tokio::test]
    async fn matching_guess_wins_without_hint() {
        let (mut manager, recorder) = manager_in_round("5").await;
        assert_eq!(manager.add_guess("5").await.unwrap(), GuessOutcome::Won);
        assert_eq!(names(&recorder.take()), vec!["GuessAdded", "PlayerWon"]);
        assert_eq!(manager.player_status().await, Some(PlayerStatus::Won));
    }

    #[tokio::test]
    async fn high_and_low_hints() {
        let (mut manager, recorder) = manager_in_round("5").await;
        manager.add_guess("7").await.unwrap();
        assert_eq!(names(&recorder.take()), vec!["GuessAdded", "GuessTooHigh"]);
        manager.add_guess("2").await.unwrap();
        assert_eq!(names(&recorder.take()), vec!["GuessAdded", "GuessTooLow"]);
        assert_eq!(manager.player_status().await, Some(PlayerStatus::Playing));
    }

    #[tokio::test]
    async fn out_of_range_hint() {
        let (mut manager, recorder) = manager_in_round("5").await;
        manager.add_guess("15").await.unwrap();
        assert_eq!(names(&recorder.take()), vec!["GuessAdded", "GuessOutOfRange"]);
    }

    #[tokio::test]
    async fn four_misses_lose_once() {
        let (mut manager, recorder) = manager_in_round("9").await;
        let mut outcomes = Vec::new();
        for guess in ["1", "2", "3", "4"] {
            outcomes.push(manager.add_guess(guess).await.unwrap());
        }
        assert_eq!(
            outcomes,
            vec![
                GuessOutcome::Pending,
                GuessOutcome::Pending,
                GuessOutcome::Pending,
                GuessOutcome::Lost
            ]
        );

        let events = recorder.take();
        let lost: Vec<_> = names(&events).into_iter().filter(|n| *n == "PlayerLost").collect();
        assert_eq!(lost.len(), 1);
        assert!(matches!(events.last(), Some(GameEvent::PlayerLost { code, .. }) if code == "9"));

        let guesses = manager
            .coordinator()
            .with_game(|g| g.player(PlayerId(1)).map(|p| p.num_guesses()))
            .await;
        assert_eq!(guesses, Some(4));
    }

    #[tokio::test]
    async fn guessing_after_a_win_is_a_no_op() {
        let (mut manager, recorder) = manager_in_round("5").await;
        manager.add_guess("5").await.unwrap();
        recorder.take();
        // Sole participant won, so the round has already closed itself.
        assert!(manager.coordinator().with_game(|g| g.needs_new_round()).await);

        assert_eq!(manager.add_guess("3").await.unwrap(), GuessOutcome::Won);
        assert!(recorder.take().is_empty());
        let guesses = manager
            .coordinator()
            .with_game(|g| g.player(PlayerId(1)).map(|p| p.num_guesses()))
            .await;
        assert_eq!(guesses, Some(1));
    }

    #[tokio::test]
    async fn forfeiting_after_losing_a_closed_round_keeps_the_loss() {
        let (mut manager, recorder) = manager_in_round("9").await;
        for guess in ["1", "2", "3", "4"] {
            manager.add_guess(guess).await.unwrap();
        }
        recorder.take();
        assert!(manager.coordinator().with_game(|g| g.needs_new_round()).await);

        assert_eq!(manager.forfeit().await.unwrap(), GuessOutcome::Lost);
        assert_eq!(manager.add_guess("f").await.unwrap(), GuessOutcome::Lost);
        assert_eq!(manager.add_guess("9").await.unwrap(), GuessOutcome::Lost);
        assert!(recorder.take().is_empty());

        let forfeited = manager
            .coordinator()
            .with_game(|g| g.current_round().map(|r| r.forfeited().len()))
            .await;
        assert_eq!(forfeited, Some(0));
    }

    #[tokio::test]
    async fn malformed_guess_is_rejected_without_events() {
        let (mut manager, recorder) = manager_in_round("5").await;
        for bad in ["abc", "", "  ", "4.5"] {
            assert!(matches!(
                manager.add_guess(bad).await,
                Err(GameError::InvalidGuessFormat(_))
            ));
        }
        assert!(recorder.take().is_empty());
    }

    #[tokio::test]
    async fn f_forfeits_the_round() {
        let (mut manager, recorder) = manager_in_round("5").await;
        manager.add_guess("1").await.unwrap();
        recorder.take();

        assert_eq!(manager.add_guess(" F ").await.unwrap(), GuessOutcome::Forfeited);
        assert_eq!(names(&recorder.take()), vec!["PlayerForfeited"]);

        let guesses = manager
            .coordinator()
            .with_game(|g| g.player(PlayerId(1)).map(|p| p.guesses.clone()))
            .await
            .unwrap();
        assert_eq!(guesses, vec!["1", "", "", "", ""]);
        // Sole participant forfeited, so the round closed itself.
        assert!(manager.coordinator().with_game(|g| g.needs_new_round()).await);
    }

    #[tokio::test]
    async fn end_current_round_reports_summary() {
        let (mut manager, recorder) = manager_in_round("5").await;
        manager.add_guess("5").await.unwrap();
        recorder.take();

        let summary = manager.end_current_round().await.unwrap();
        assert_eq!(summary.winners, vec![("ada".to_string(), 1)]);
        assert_eq!(names(&recorder.take()), vec!["RoundEnded"]);
    }

    #[tokio::test]
    async fn second_player_joins_the_open_round() {
        let coordinator = RoundCoordinator::new(fixed_game(GameRules::default(), vec!["5"]));
        let mut first = GameManager::new(coordinator.clone());
        first.sign_up("ada").await.unwrap();
        let round = first.start_next_round().await.unwrap();

        let recorder = Recorder::default();
        let mut second = GameManager::new(coordinator.clone());
        second.add_sink(Box::new(recorder.clone()));
        second.sign_up("bob").await.unwrap();
        assert_eq!(second.start_next_round().await.unwrap(), round);

        // Joining an existing round does not create a new code.
        assert_eq!(names(&recorder.take()), vec!["PlayerSignedUp", "RoundStarted"]);
    }

    #[tokio::test]
    async fn quit_removes_player_and_emits_quit() {
        let (mut manager, recorder) = manager_in_round("5").await;
        manager.add_guess("5").await.unwrap();
        manager.end_current_round().await.unwrap();
        recorder.take();

        manager.quit_player().await.unwrap();
        assert_eq!(names(&recorder.take()), vec!["PlayerQuit"]);
        assert_eq!(manager.roster_len().await, 0);
        assert!(!manager.leave().await);
    }

    #[tokio::test]
    async fn failures_reach_every_sink() {
        let (manager, recorder) = manager_in_round("5").await;
        manager.report_failure(&GameError::Disconnected).await;

        let events = recorder.take();
        assert_eq!(
            events,
            vec![GameEvent::SessionFailed {
                player: Some(PlayerId(1)),
                reason: "client disconnected".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn leaving_mid_round_forfeits_silently() {
        let coordinator = RoundCoordinator::new(fixed_game(GameRules::default(), vec!["5"]));
        let mut first = GameManager::new(coordinator.clone());
        first.sign_up("ada").await.unwrap();
        first.start_next_round().await.unwrap();

        let recorder = Recorder::default();
        let mut second = GameManager::new(coordinator.clone());
        second.add_sink(Box::new(recorder.clone()));
        second.sign_up("bob").await.unwrap();
        second.start_next_round().await.unwrap();
        recorder.take();

        first.add_guess("5").await.unwrap();
        assert!(second.leave().await);
        assert!(recorder.take().is_empty());

        let (ended, forfeited) = coordinator
            .with_game(|g| {
                let round = g.current_round().unwrap();
                (round.has_ended(), round.forfeited().to_vec())
            })
            .await;
        assert!(ended);
        assert_eq!(forfeited, vec![PlayerId(2)]);
    }
}
