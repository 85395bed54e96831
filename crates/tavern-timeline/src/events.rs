//! Event fan-out from the scrubber to its subscribers.
//!
//! The scrubber has two outbound channels: the forwarded snapshot stream and
//! the control-event stream. Each is a [`Subscribers`] list of unbounded
//! tokio senders. Sending never blocks and does not need a runtime, so the
//! scrubber stays synchronous; subscribers that dropped their receiver are
//! pruned on the next emit.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::TimelineError;

// ---------------------------------------------------------------------------
// ScrubberEvent
// ---------------------------------------------------------------------------

/// Control signal emitted by a [`Scrubber`](crate::scrubber::Scrubber).
#[derive(Debug, Clone)]
pub enum ScrubberEvent {
    /// The timeline has enough data to be shown.
    Ready,
    Play,
    Pause,
    /// The active turn changed. `None` when no snapshot carries a turn.
    Turn(Option<i64>),
    /// Emitted at the end of every tick, whether or not anything changed.
    Update,
    /// An upstream failure. The timeline keeps accepting input.
    Error(Arc<TimelineError>),
}

// ---------------------------------------------------------------------------
// Subscribers
// ---------------------------------------------------------------------------

/// A list of live subscribers for one kind of message.
#[derive(Debug)]
pub struct Subscribers<T> {
    senders: Vec<UnboundedSender<T>>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self {
            senders: Vec::new(),
        }
    }
}

impl<T: Clone> Subscribers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber.
    pub fn subscribe(&mut self) -> UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        rx
    }

    /// Deliver `message` to every live subscriber.
    pub fn emit(&mut self, message: T) {
        self.senders.retain(|tx| tx.send(message.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_reaches_every_subscriber() {
        let mut subs = Subscribers::new();
        let mut a = subs.subscribe();
        let mut b = subs.subscribe();
        subs.emit(7u32);
        assert_eq!(a.try_recv().unwrap(), 7);
        assert_eq!(b.try_recv().unwrap(), 7);
    }

    #[test]
    fn dropped_receivers_are_pruned() {
        let mut subs = Subscribers::new();
        let keep = subs.subscribe();
        drop(subs.subscribe());
        subs.emit(1u8);
        assert_eq!(subs.len(), 1);
        drop(keep);
        subs.emit(2u8);
        assert!(subs.is_empty());
    }
}
