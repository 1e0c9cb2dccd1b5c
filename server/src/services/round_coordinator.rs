//! Rendezvous points shared by every connection playing the same game.
//!
//! One lock guards the game. Each phase has its own wake-up signal, and every
//! wait re-checks its own predicate under the lock after waking, so a wake-up
//! meant for another phase only costs a re-check.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::models::game::Game;
use crate::models::player::PlayerId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuorumOutcome {
    /// Enough players were already signed up.
    Met,
    /// Had to wait, and enough players arrived.
    Reached,
    /// Gave up waiting; the round starts under-quorum.
    TimedOut,
}

pub struct RoundCoordinator {
    game: Mutex<Game>,
    game_id: Uuid,
    quorum_timeout: Duration,
    quorum: Notify,
    completion: Notify,
    resolution: Notify,
}

impl RoundCoordinator {
    pub fn new(game: Game) -> Arc<Self> {
        Arc::new(RoundCoordinator {
            game_id: game.id(),
            quorum_timeout: game.rules().quorum_timeout,
            game: Mutex::new(game),
            quorum: Notify::new(),
            completion: Notify::new(),
            resolution: Notify::new(),
        })
    }

    pub fn game_id(&self) -> Uuid {
        self.game_id
    }

    /// Runs a critical section against the game. `f` must not block.
    pub async fn with_game<T>(&self, f: impl FnOnce(&mut Game) -> T) -> T {
        let mut game = self.game.lock().await;
        f(&mut game)
    }

    pub fn notify_quorum(&self) {
        self.quorum.notify_waiters();
    }

    pub fn notify_completion(&self) {
        self.completion.notify_waiters();
    }

    pub fn notify_resolution(&self) {
        self.resolution.notify_waiters();
    }

    pub fn notify_all(&self) {
        self.notify_quorum();
        self.notify_completion();
        self.notify_resolution();
    }

    /// Phase A: wait, at most `quorum_timeout`, for `min_players` sign-ups.
    pub async fn await_quorum(&self, on_wait: impl FnOnce()) -> QuorumOutcome {
        // A timeout past the clock's range waits without a deadline.
        let deadline = Instant::now().checked_add(self.quorum_timeout);
        let mut waited = false;
        let met = self
            .wait_until(
                &self.quorum,
                deadline,
                || {
                    waited = true;
                    on_wait()
                },
                |game| game.has_quorum(),
            )
            .await;

        if !met {
            debug!(game_id = %self.game_id, "quorum wait timed out");
            return QuorumOutcome::TimedOut;
        }

        self.notify_quorum();
        if waited {
            QuorumOutcome::Reached
        } else {
            QuorumOutcome::Met
        }
    }

    /// Phase C: wait until every participant of `round` has an outcome.
    pub async fn await_completion(&self, round: usize, on_wait: impl FnOnce()) {
        self.wait_until(&self.completion, None, on_wait, |game| {
            game.round(round)
                .map_or(true, |r| r.has_ended() || r.all_terminal())
        })
        .await;
    }

    /// Phase D: wait until everyone else has chosen to continue or quit, or
    /// until someone has already opened a round after `round`.
    pub async fn await_resolution(&self, player: PlayerId, round: usize, on_wait: impl FnOnce()) {
        self.wait_until(&self.resolution, None, on_wait, |game| {
            game.current_round_index() != Some(round) || game.all_others_resolved(player)
        })
        .await;
        self.notify_resolution();
    }

    /// Returns whether `ready` held; `false` only when `deadline` passed.
    async fn wait_until<P>(
        &self,
        signal: &Notify,
        deadline: Option<Instant>,
        on_wait: impl FnOnce(),
        mut ready: P,
    ) -> bool
    where
        P: FnMut(&Game) -> bool,
    {
        let mut on_wait = Some(on_wait);
        loop {
            // Register before checking so a broadcast between the check and
            // the await is not lost.
            let notified = signal.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if ready(&*self.game.lock().await) {
                return true;
            }

            if let Some(f) = on_wait.take() {
                f();
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return ready(&*self.game.lock().await);
                    }
                }
                None => notified.await,
            }
        }
    }
}
