//! Recurring tick scheduling.
//!
//! While playing, a [`Scrubber`] needs its [`update`](Scrubber::update)
//! called on a fixed period. The scrubber owns a [`Scheduler`] and is the
//! only thing that starts or stops it; dropping the scrubber stops it too, so
//! a periodic callback can never outlive its owner.
//!
//! - [`ManualScheduler`] does no scheduling of its own. The host (or a test)
//!   calls `update()` itself; the scheduler just records whether ticking is
//!   currently requested.
//! - [`TokioScheduler`] spawns a tokio task running an interval. The task holds
//!   only a [`Weak`] reference to the scrubber and exits once the scrubber is
//!   gone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::trace;

use crate::scrubber::Scrubber;

/// A cancellable recurring tick owned by one scrubber.
pub trait Scheduler: Send {
    /// Start ticking every `period`, replacing any running schedule.
    fn start(&mut self, period: Duration);
    /// Stop ticking. Safe to call when not running.
    fn stop(&mut self);
    fn is_running(&self) -> bool;
}

// ---------------------------------------------------------------------------
// ManualScheduler
// ---------------------------------------------------------------------------

/// Host-driven ticking. Clones observe the same running flag.
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    running: Arc<AtomicBool>,
    period: Arc<Mutex<Option<Duration>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Period requested by the last `start`, if still running.
    pub fn period(&self) -> Option<Duration> {
        if self.is_running() {
            *self.period.lock()
        } else {
            None
        }
    }
}

impl Scheduler for ManualScheduler {
    fn start(&mut self, period: Duration) {
        *self.period.lock() = Some(period);
        self.running.store(true, Ordering::SeqCst);
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// TokioScheduler
// ---------------------------------------------------------------------------

/// Interval-driven ticking on a tokio runtime.
pub struct TokioScheduler {
    runtime: Handle,
    target: Weak<Mutex<Scrubber>>,
    task: Option<JoinHandle<()>>,
}

impl TokioScheduler {
    pub fn new(runtime: Handle, target: Weak<Mutex<Scrubber>>) -> Self {
        Self {
            runtime,
            target,
            task: None,
        }
    }
}

impl Scheduler for TokioScheduler {
    fn start(&mut self, period: Duration) {
        self.stop();
        let target = self.target.clone();
        self.task = Some(self.runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately; play() already updated.
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(scrubber) = target.upgrade() else {
                    trace!("scheduler: scrubber dropped, stopping tick task");
                    break;
                };
                scrubber.lock().update();
            }
        }));
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_scheduler_tracks_running_state() {
        let mut scheduler = ManualScheduler::new();
        let observer = scheduler.clone();
        assert!(!observer.is_running());

        scheduler.start(Duration::from_millis(100));
        assert!(observer.is_running());
        assert_eq!(observer.period(), Some(Duration::from_millis(100)));

        scheduler.stop();
        assert!(!observer.is_running());
        assert_eq!(observer.period(), None);
    }
}
