//! Playback inhibition.
//!
//! An [`Inhibitor`] lets code outside the scrubber freeze virtual time
//! without stopping the tick loop: a modal dialog, a card being inspected,
//! an animation that must finish. While inhibited, ticks still resolve and
//! forward snapshots and still emit events; only the clock stands still.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Capability polled once per tick.
pub trait Inhibitor: Send + Sync {
    fn is_inhibiting(&self) -> bool;
}

impl<F> Inhibitor for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_inhibiting(&self) -> bool {
        self()
    }
}

// ---------------------------------------------------------------------------
// InhibitorLocks
// ---------------------------------------------------------------------------

/// A counted set of pause locks.
///
/// Any number of independent holders may take a lock; playback is inhibited
/// while at least one [`InhibitGuard`] is alive. Clones share the same count.
///
/// ```
/// use tavern_timeline::inhibitor::{Inhibitor, InhibitorLocks};
///
/// let locks = InhibitorLocks::new();
/// assert!(!locks.is_inhibiting());
/// let dialog = locks.hold();
/// let tooltip = locks.hold();
/// drop(dialog);
/// assert!(locks.is_inhibiting());
/// drop(tooltip);
/// assert!(!locks.is_inhibiting());
/// ```
#[derive(Debug, Clone, Default)]
pub struct InhibitorLocks {
    held: Arc<AtomicUsize>,
}

impl InhibitorLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a lock; it is released when the guard drops.
    #[must_use = "the lock is released as soon as the guard is dropped"]
    pub fn hold(&self) -> InhibitGuard {
        self.held.fetch_add(1, Ordering::SeqCst);
        InhibitGuard {
            held: Arc::clone(&self.held),
        }
    }

    /// Number of locks currently held.
    pub fn held(&self) -> usize {
        self.held.load(Ordering::SeqCst)
    }
}

impl Inhibitor for InhibitorLocks {
    fn is_inhibiting(&self) -> bool {
        self.held() > 0
    }
}

/// RAII handle for one lock taken from [`InhibitorLocks`].
#[derive(Debug)]
pub struct InhibitGuard {
    held: Arc<AtomicUsize>,
}

impl Drop for InhibitGuard {
    fn drop(&mut self) {
        self.held.fetch_sub(1, Ordering::SeqCst);
    }
}
