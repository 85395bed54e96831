//! Upstream wiring.
//!
//! A [`ReplayPipeline`] sits between whatever produces the replay (a log
//! reader, a network stream, a parser task) and a shared [`Scrubber`]. It
//! folds mutations through a [`GameStateTracker`], writes every changed
//! snapshot, relays upstream failures, and on end of input applies the
//! configured autoplay behavior.
//!
//! [`Scrubber`]: crate::scrubber::Scrubber

use std::sync::Arc;

use tavern_state::mutator::Mutation;
use tavern_state::state::GameState;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use crate::config::PlaybackOptions;
use crate::scrubber::SharedScrubber;
use crate::tracker::GameStateTracker;
use crate::TimelineError;

/// One message from upstream.
#[derive(Debug)]
pub enum FeedItem {
    /// An edit to fold into the tracked snapshot.
    Mutation(Mutation),
    /// A snapshot built elsewhere, written as is.
    Snapshot(Arc<GameState>),
    /// The source failed. The timeline keeps what it has.
    Error(TimelineError),
}

impl From<Mutation> for FeedItem {
    fn from(mutation: Mutation) -> Self {
        FeedItem::Mutation(mutation)
    }
}

impl From<Result<Mutation, TimelineError>> for FeedItem {
    fn from(result: Result<Mutation, TimelineError>) -> Self {
        match result {
            Ok(mutation) => FeedItem::Mutation(mutation),
            Err(err) => FeedItem::Error(err),
        }
    }
}

/// Feeds a shared scrubber from an upstream source.
pub struct ReplayPipeline {
    tracker: GameStateTracker,
    scrubber: SharedScrubber,
    options: PlaybackOptions,
    written: usize,
}

impl ReplayPipeline {
    pub fn new(scrubber: SharedScrubber, options: PlaybackOptions) -> Self {
        Self {
            tracker: GameStateTracker::new(),
            scrubber,
            options,
            written: 0,
        }
    }

    pub fn scrubber(&self) -> &SharedScrubber {
        &self.scrubber
    }

    /// Snapshots written to the scrubber so far.
    pub fn written(&self) -> usize {
        self.written
    }

    /// Handle one upstream message.
    pub fn feed(&mut self, item: FeedItem) {
        let snapshot = match item {
            FeedItem::Mutation(mutation) => self.tracker.apply(&mutation),
            FeedItem::Snapshot(state) => Some(state),
            FeedItem::Error(err) => {
                self.scrubber.lock().report_error(err);
                None
            }
        };
        if let Some(state) = snapshot {
            self.written += 1;
            self.scrubber.lock().write(state);
        }
    }

    /// Signal end of input and apply autoplay.
    ///
    /// With autoplay, playback starts once; if it should be held paused
    /// (explicitly, or implicitly because a start turn was requested) it is
    /// paused again right away, leaving the scrubber interactive.
    pub fn finish(&mut self) {
        let mut scrubber = self.scrubber.lock();
        scrubber.end();
        info!(
            snapshots = self.written,
            duration = scrubber.duration(),
            turns = scrubber.history().turn_map().count(),
            "pipeline: input ended"
        );

        if self.options.autoplay {
            let hold = self.options.hold_paused(scrubber.config().start_from_turn);
            debug!(hold, "pipeline: autoplay");
            scrubber.play();
            if hold {
                scrubber.pause();
            }
        }
    }

    /// Drain `rx` until the sender hangs up, then [`finish`](Self::finish).
    pub async fn run(mut self, mut rx: UnboundedReceiver<FeedItem>) -> SharedScrubber {
        while let Some(item) = rx.recv().await {
            self.feed(item);
        }
        self.finish();
        self.scrubber
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::ScrubberConfig;
    use crate::events::ScrubberEvent;
    use crate::schedule::ManualScheduler;
    use crate::scrubber::Scrubber;
    use parking_lot::Mutex;
    use tavern_state::prelude::*;

    fn shared(config: ScrubberConfig) -> SharedScrubber {
        Arc::new(Mutex::new(Scrubber::new(
            config,
            Arc::new(ManualClock::new()),
            Box::new(ManualScheduler::new()),
        )))
    }

    #[test]
    fn only_changed_snapshots_are_written() {
        let mut pipeline =
            ReplayPipeline::new(shared(ScrubberConfig::default()), PlaybackOptions::default());
        pipeline.feed(FeedItem::Mutation(IncrementTime::default().into()));
        pipeline.feed(FeedItem::Mutation(IncrementTime::new(0.0).into()));
        pipeline.feed(FeedItem::Mutation(IncrementTime::new(3.0).into()));
        assert_eq!(pipeline.written(), 2);
        assert_eq!(pipeline.scrubber().lock().history().len(), 2);
    }

    #[test]
    fn upstream_errors_are_relayed() {
        let scrubber = shared(ScrubberConfig::default());
        let mut events = scrubber.lock().subscribe();
        let mut pipeline = ReplayPipeline::new(Arc::clone(&scrubber), PlaybackOptions::default());
        pipeline.feed(FeedItem::Error(TimelineError::Upstream("eof".into())));
        assert!(matches!(events.try_recv(), Ok(ScrubberEvent::Error(_))));
    }

    #[test]
    fn finish_without_autoplay_stays_paused() {
        let scrubber = shared(ScrubberConfig::default());
        let mut pipeline = ReplayPipeline::new(Arc::clone(&scrubber), PlaybackOptions::default());
        pipeline.feed(FeedItem::Mutation(IncrementTime::default().into()));
        pipeline.finish();
        let scrubber = scrubber.lock();
        assert!(scrubber.input_ended());
        assert!(!scrubber.can_interact());
    }
}
