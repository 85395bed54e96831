//! Folds mutations into a current snapshot.

use std::sync::Arc;

use tavern_state::mutator::GameStateMutator;
use tavern_state::state::GameState;
use tracing::trace;

/// Holds the latest snapshot and applies mutations to it in order.
///
/// [`apply`](Self::apply) reports a new snapshot only when the mutation
/// produced a different instance, so every returned snapshot is worth
/// writing to a timeline.
#[derive(Debug, Clone)]
pub struct GameStateTracker {
    state: Arc<GameState>,
    applied: u64,
}

impl Default for GameStateTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl GameStateTracker {
    /// Start from an empty, untimed snapshot.
    pub fn new() -> Self {
        Self::from_state(Arc::new(GameState::new()))
    }

    pub fn from_state(state: Arc<GameState>) -> Self {
        Self { state, applied: 0 }
    }

    /// Apply one mutation. Returns the new snapshot if it changed anything.
    pub fn apply(&mut self, mutator: &dyn GameStateMutator) -> Option<Arc<GameState>> {
        self.applied += 1;
        let next = mutator.apply_to(&self.state);
        if Arc::ptr_eq(&next, &self.state) {
            trace!(applied = self.applied, "tracker: mutation was a no-op");
            return None;
        }
        self.state = Arc::clone(&next);
        Some(next)
    }

    pub fn state(&self) -> &Arc<GameState> {
        &self.state
    }

    /// Number of mutations applied, including no-ops.
    pub fn applied(&self) -> u64 {
        self.applied
    }
}
