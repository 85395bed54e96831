//! Tavern Timeline -- replay playback over a growing snapshot history.
//!
//! This crate builds on [`tavern_state`] to turn a stream of game-state
//! snapshots into a scrubbable timeline: a virtual clock that can play,
//! pause, seek, change speed and jump between turns while snapshots are
//! still arriving.
//!
//! # Modules
//!
//! - [`scrubber`]: the playback controller.
//! - [`clock`], [`schedule`]: time source and recurring tick.
//! - [`inhibitor`]: external capability that freezes virtual time.
//! - [`events`]: event and snapshot fan-out to subscribers.
//! - [`tracker`], [`feed`], [`pipeline`]: folding mutations into snapshots
//!   and wiring an upstream source into a scrubber.
//! - [`config`]: scrubber and playback settings.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use tavern_timeline::prelude::*;
//!
//! let clock = ManualClock::new();
//! let mut scrubber = Scrubber::new(
//!     ScrubberConfig::default(),
//!     Arc::new(clock.clone()),
//!     Box::new(ManualScheduler::new()),
//! );
//! let mut tracker = GameStateTracker::new();
//!
//! let feed: Vec<Mutation> = vec![
//!     AddEntity { entity: Entity::new(EntityId::GAME).with_tag(GameTag::TURN, 1) }.into(),
//!     IncrementTime::default().into(),
//!     IncrementTime::new(30.0).into(),
//!     TagChange { entity: EntityId::GAME, tag: GameTag::TURN, value: 2 }.into(),
//! ];
//! for mutation in &feed {
//!     if let Some(state) = tracker.apply(mutation) {
//!         scrubber.write(state);
//!     }
//! }
//! scrubber.end();
//!
//! assert_eq!(scrubber.current_turn(), Some(1));
//! scrubber.next_turn();
//! assert_eq!(scrubber.current_time(), 30.0);
//! assert_eq!(scrubber.current_turn(), Some(2));
//! ```

#![deny(unsafe_code)]

pub mod clock;
pub mod config;
pub mod events;
pub mod feed;
pub mod inhibitor;
pub mod pipeline;
pub mod schedule;
pub mod scrubber;
pub mod tracker;

/// Re-export the state crate for convenience.
pub use tavern_state;

pub use scrubber::SharedScrubber;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced while feeding or configuring a timeline.
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    /// A line of a mutation log could not be decoded.
    #[error("malformed mutation on line {line}: {source}")]
    MalformedMutation {
        /// 1-based line number in the log.
        line: usize,
        source: serde_json::Error,
    },

    /// The upstream snapshot source failed.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// A configuration value is out of range or could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common timeline usage.
pub mod prelude {
    pub use tavern_state::prelude::*;

    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::{PlaybackOptions, ScrubberConfig};
    pub use crate::events::{ScrubberEvent, Subscribers};
    pub use crate::feed::read_mutation_log;
    pub use crate::inhibitor::{InhibitGuard, Inhibitor, InhibitorLocks};
    pub use crate::pipeline::{FeedItem, ReplayPipeline};
    pub use crate::schedule::{ManualScheduler, Scheduler, TokioScheduler};
    pub use crate::scrubber::{Scrubber, SharedScrubber};
    pub use crate::tracker::GameStateTracker;
    pub use crate::TimelineError;
}
