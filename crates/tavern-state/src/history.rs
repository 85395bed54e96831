//! Time-ordered, turn-indexed store of every snapshot seen in a session.
//!
//! [`GameStateHistory`] is append-only. Producers push snapshots in
//! non-decreasing time order and the history never re-sorts, so lookups by
//! time are a binary search over the entry list. A secondary [`TurnMap`]
//! remembers the first snapshot observed for each turn number.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use tavern_state::prelude::*;
//!
//! let mut history = GameStateHistory::new();
//! assert!(history.latest(10.0).is_none());
//!
//! let mut state = Arc::new(GameState::new());
//! for _ in 0..3 {
//!     state = IncrementTime::default().apply_to(&state);
//!     history.push(Arc::clone(&state));
//! }
//!
//! // times are 0, 1, 2
//! assert_eq!(history.latest(1.5).and_then(|s| s.time()), Some(1.0));
//! assert_eq!(history.latest(-4.0).and_then(|s| s.time()), Some(0.0));
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::state::GameState;

// ---------------------------------------------------------------------------
// HistoryEntry
// ---------------------------------------------------------------------------

/// A snapshot together with the time it was recorded at.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub time: f64,
    pub state: Arc<GameState>,
}

// ---------------------------------------------------------------------------
// TurnMap
// ---------------------------------------------------------------------------

/// Turn number -> first snapshot observed during that turn.
#[derive(Debug, Clone, Default)]
pub struct TurnMap {
    turns: BTreeMap<i64, HistoryEntry>,
}

impl TurnMap {
    pub fn has(&self, turn: i64) -> bool {
        self.turns.contains_key(&turn)
    }

    pub fn get(&self, turn: i64) -> Option<&HistoryEntry> {
        self.turns.get(&turn)
    }

    /// Entry of the lowest indexed turn.
    pub fn first(&self) -> Option<&HistoryEntry> {
        self.turns.values().next()
    }

    /// Number of distinct turns indexed.
    pub fn count(&self) -> usize {
        self.turns.len()
    }

    /// Highest indexed turn number.
    pub fn last_turn(&self) -> Option<i64> {
        self.turns.keys().next_back().copied()
    }

    /// The nearest indexed turn strictly after `turn`, skipping gaps.
    pub fn next_after(&self, turn: i64) -> Option<(i64, &HistoryEntry)> {
        let start = turn.checked_add(1)?;
        self.turns.range(start..).next().map(|(t, e)| (*t, e))
    }

    /// The nearest indexed turn strictly before `turn`, never below zero.
    pub fn previous_before(&self, turn: i64) -> Option<(i64, &HistoryEntry)> {
        if turn <= 0 {
            return None;
        }
        self.turns.range(0..turn).next_back().map(|(t, e)| (*t, e))
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &HistoryEntry)> {
        self.turns.iter().map(|(t, e)| (*t, e))
    }

    fn record(&mut self, turn: i64, entry: &HistoryEntry) -> bool {
        if self.turns.contains_key(&turn) {
            return false;
        }
        self.turns.insert(turn, entry.clone());
        true
    }
}

// ---------------------------------------------------------------------------
// GameStateHistory
// ---------------------------------------------------------------------------

/// Append-only history of timed snapshots.
#[derive(Debug, Clone, Default)]
pub struct GameStateHistory {
    entries: Vec<HistoryEntry>,
    turn_map: TurnMap,
}

impl GameStateHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a snapshot.
    ///
    /// Snapshots without a time cannot be placed on the timeline and are
    /// skipped; the return value says whether the snapshot was recorded.
    /// Pushing out of time order is logged but still appended, since the
    /// history never re-sorts.
    pub fn push(&mut self, state: Arc<GameState>) -> bool {
        let Some(time) = state.time() else {
            debug!("history: skipping untimed snapshot");
            return false;
        };

        if let Some(last) = self.entries.last() {
            if time < last.time {
                warn!(time, last = last.time, "history: snapshot pushed out of time order");
            }
        }

        let entry = HistoryEntry { time, state };
        if let Some(turn) = entry.state.turn() {
            if self.turn_map.record(turn, &entry) {
                debug!(turn, time, "history: indexed turn");
            }
        }
        self.entries.push(entry);
        true
    }

    /// The latest snapshot recorded at or before `time`.
    ///
    /// Returns the earliest snapshot when `time` precedes everything, and
    /// `None` only when the history is empty.
    pub fn latest(&self, time: f64) -> Option<&Arc<GameState>> {
        let after = self.entries.partition_point(|entry| entry.time <= time);
        let index = after.saturating_sub(1);
        self.entries.get(index).map(|entry| &entry.state)
    }

    pub fn turn_map(&self) -> &TurnMap {
        &self.turn_map
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first(&self) -> Option<&HistoryEntry> {
        self.entries.first()
    }

    pub fn last(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
