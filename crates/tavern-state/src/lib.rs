//! Tavern State -- immutable game-state snapshots for replay reconstruction.
//!
//! A replay arrives as an ordered stream of small edits. This crate folds
//! those edits into a sequence of immutable [`GameState`](state::GameState)
//! snapshots and keeps them in a time-ordered, turn-indexed
//! [`GameStateHistory`](history::GameStateHistory).
//!
//! # Modules
//!
//! - [`entity`]: entity ids, player ids, tags, zones.
//! - [`choice`]: pending choices, playable options, block descriptors.
//! - [`state`]: the [`GameState`](state::GameState) snapshot.
//! - [`mutator`]: pure snapshot transforms and the serializable
//!   [`Mutation`](mutator::Mutation) enum.
//! - [`history`]: the snapshot history with its turn index.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use tavern_state::prelude::*;
//!
//! let mut state = Arc::new(GameState::new());
//! let mut history = GameStateHistory::new();
//!
//! let feed: Vec<Mutation> = vec![
//!     AddEntity { entity: Entity::new(EntityId::GAME).with_tag(GameTag::TURN, 1) }.into(),
//!     IncrementTime::default().into(),
//!     TagChange { entity: EntityId::GAME, tag: GameTag::TURN, value: 2 }.into(),
//!     IncrementTime::new(4.0).into(),
//! ];
//! for mutation in &feed {
//!     let next = mutation.apply_to(&state);
//!     if !Arc::ptr_eq(&next, &state) {
//!         history.push(Arc::clone(&next));
//!         state = next;
//!     }
//! }
//!
//! assert_eq!(history.turn_map().count(), 2);
//! assert_eq!(history.latest(10.0).and_then(|s| s.turn()), Some(2));
//! ```

#![deny(unsafe_code)]

pub mod choice;
pub mod entity;
pub mod history;
pub mod mutator;
pub mod state;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::choice::{ChoiceKind, Choices, Descriptor, GameOption, OptionKind};
    pub use crate::entity::{Entity, EntityId, GameTag, PlayerId, Zone};
    pub use crate::history::{GameStateHistory, HistoryEntry, TurnMap};
    pub use crate::mutator::{
        AddEntity, ClearChoices, ClearOptions, GameStateMutator, IncrementTime, Mutation,
        PopDescriptor, PushDescriptor, RemoveEntity, SetChoices, SetOptions, ShowEntity,
        TagChange,
    };
    pub use crate::state::{EntityTree, GameState, GameStateDiff};
}
