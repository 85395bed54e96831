//! The timeline controller.
//!
//! A [`Scrubber`] consumes timed snapshots in order, indexes them in a
//! [`GameStateHistory`], and runs a virtual playback clock over them. Each
//! tick maps the clock to the latest indexed snapshot and forwards it to
//! subscribers when it differs (by identity) from the last one forwarded.
//!
//! # Lifecycle
//!
//! 1. **Priming** -- no timed snapshot written yet; every control is a no-op.
//! 2. **Ready** -- the first timed snapshot arrived (or the requested start
//!    turn was indexed, or input ended). [`ScrubberEvent::Ready`] fires once.
//! 3. **Playing / paused** -- `play()` starts the recurring tick, `pause()`
//!    stops it.
//! 4. **Ended** -- virtual time reached the last known snapshot time; the
//!    clock clamps there and playback pauses.
//!
//! # Tick
//!
//! Every [`update`](Scrubber::update) runs the same fixed sequence: advance
//! the clock (when playing, speed is non-zero and no inhibitor holds it),
//! resolve the snapshot for the clock, forward it if it changed, emit
//! [`ScrubberEvent::Turn`] if the active turn changed, and finally emit
//! [`ScrubberEvent::Update`] unconditionally.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tavern_timeline::prelude::*;
//!
//! let clock = ManualClock::new();
//! let mut scrubber = Scrubber::new(
//!     ScrubberConfig { speed: 1.0, ..Default::default() },
//!     Arc::new(clock.clone()),
//!     Box::new(ManualScheduler::new()),
//! );
//!
//! let mut state = IncrementTime::default().apply_to(&Arc::new(GameState::new()));
//! scrubber.write(Arc::clone(&state));
//! state = IncrementTime::new(10.0).apply_to(&state);
//! scrubber.write(state);
//! scrubber.end();
//!
//! scrubber.play();
//! clock.advance(Duration::from_millis(2500));
//! scrubber.update();
//! assert_eq!(scrubber.current_time(), 2.5);
//! assert_eq!(scrubber.duration(), 10.0);
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tavern_state::history::GameStateHistory;
use tavern_state::state::GameState;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, error};

use crate::clock::Clock;
use crate::config::ScrubberConfig;
use crate::events::{ScrubberEvent, Subscribers};
use crate::inhibitor::Inhibitor;
use crate::schedule::{Scheduler, TokioScheduler};
use crate::TimelineError;

/// A scrubber behind a single lock, for hosts that tick from another task.
pub type SharedScrubber = Arc<Mutex<Scrubber>>;

// ---------------------------------------------------------------------------
// Scrubber
// ---------------------------------------------------------------------------

/// Playback controller over a growing snapshot history.
///
/// All times handled by the public API are *offsets* in seconds from the
/// first observed snapshot time, so `0.0` is always the start of the replay.
pub struct Scrubber {
    config: ScrubberConfig,
    history: GameStateHistory,
    clock: Arc<dyn Clock>,
    scheduler: Box<dyn Scheduler>,
    inhibitor: Option<Arc<dyn Inhibitor>>,

    /// Time of the first timed snapshot. `None` while priming.
    initial_time: Option<f64>,
    /// Virtual seconds since `initial_time`.
    current_time: f64,
    /// Largest snapshot time seen so far.
    end_time: Option<f64>,
    speed: f64,
    playing: bool,
    has_started: bool,
    has_emitted_ready: bool,
    input_ended: bool,
    /// Pending "start at turn N" request, consumed once.
    start_from_turn: Option<i64>,
    /// Clock reading at the previous tick.
    last_update: Duration,
    /// Last snapshot forwarded to subscribers.
    last_state: Option<Arc<GameState>>,
    seconds_watched: f64,

    states: Subscribers<Arc<GameState>>,
    events: Subscribers<ScrubberEvent>,
}

impl Scrubber {
    /// Create a scrubber with its own clock and scheduler.
    ///
    /// # Panics
    ///
    /// Panics if `config` fails [`ScrubberConfig::validate`].
    pub fn new(config: ScrubberConfig, clock: Arc<dyn Clock>, scheduler: Box<dyn Scheduler>) -> Self {
        if let Err(e) = config.validate() {
            panic!("invalid scrubber config: {e}");
        }
        let last_update = clock.now();
        Self {
            speed: config.speed,
            start_from_turn: config.start_from_turn,
            config,
            history: GameStateHistory::new(),
            clock,
            scheduler,
            inhibitor: None,
            initial_time: None,
            current_time: 0.0,
            end_time: None,
            playing: false,
            has_started: false,
            has_emitted_ready: false,
            input_ended: false,
            last_update,
            last_state: None,
            seconds_watched: 0.0,
            states: Subscribers::new(),
            events: Subscribers::new(),
        }
    }

    /// Create a scrubber ticked by a tokio interval on `runtime`.
    ///
    /// The tick task holds only a weak reference, so dropping the last
    /// [`SharedScrubber`] also ends the task.
    pub fn shared(config: ScrubberConfig, clock: Arc<dyn Clock>, runtime: Handle) -> SharedScrubber {
        Arc::new_cyclic(|weak| {
            let scheduler = TokioScheduler::new(runtime, weak.clone());
            Mutex::new(Scrubber::new(config, clock, Box::new(scheduler)))
        })
    }

    /// Put a host-ticked scrubber behind a lock.
    pub fn into_shared(self) -> SharedScrubber {
        Arc::new(Mutex::new(self))
    }

    // -- subscriptions ------------------------------------------------------

    /// Subscribe to control events.
    pub fn subscribe(&mut self) -> UnboundedReceiver<ScrubberEvent> {
        self.events.subscribe()
    }

    /// Subscribe to forwarded snapshots.
    pub fn subscribe_states(&mut self) -> UnboundedReceiver<Arc<GameState>> {
        self.states.subscribe()
    }

    // -- input --------------------------------------------------------------

    /// Accept the next snapshot from upstream.
    ///
    /// Snapshots must arrive in non-decreasing time order. Untimed snapshots
    /// are accepted but cannot be placed on the timeline.
    pub fn write(&mut self, state: Arc<GameState>) {
        let mut ready = false;

        if let Some(time) = state.time() {
            if self.initial_time.is_none() {
                self.initial_time = Some(time);
                ready = true;
            }
            self.history.push(Arc::clone(&state));
            if self.end_time.map_or(true, |end| time > end) {
                self.end_time = Some(time);
            }
        }

        if let Some(turn) = self.start_from_turn {
            ready = false;
            let start = self
                .history
                .turn_map()
                .get(turn)
                .zip(self.initial_time)
                .map(|(entry, initial)| entry.time - initial);
            if let Some(offset) = start {
                debug!(turn, offset, "scrubber: requested start turn indexed");
                self.current_time = offset;
                self.start_from_turn = None;
                ready = true;
            }
        }

        if ready {
            self.signal_ready();
        }
    }

    /// Upstream signalled that no more snapshots will arrive.
    ///
    /// Signals readiness if that never happened, e.g. because the requested
    /// start turn was never indexed.
    pub fn end(&mut self) {
        self.input_ended = true;
        if let Some(turn) = self.start_from_turn.take() {
            debug!(turn, "scrubber: requested start turn never appeared");
        }
        if !self.has_emitted_ready {
            self.signal_ready();
        }
    }

    /// Surface an upstream failure to subscribers. The timeline is left as is.
    pub fn report_error(&mut self, err: TimelineError) {
        error!(error = %err, "scrubber: upstream error");
        self.events.emit(ScrubberEvent::Error(Arc::new(err)));
    }

    fn signal_ready(&mut self) {
        if !self.has_emitted_ready {
            self.has_emitted_ready = true;
            debug!("scrubber: ready");
            self.events.emit(ScrubberEvent::Ready);
        }
        self.update();
    }

    // -- playback -----------------------------------------------------------

    pub fn play(&mut self) {
        if let Some(turn) = self.start_from_turn.take() {
            debug!(turn, "scrubber: playback started before start turn was indexed");
        }
        self.last_update = self.clock.now();
        self.scheduler.start(self.config.tick_interval());
        self.playing = true;
        self.has_started = true;
        debug!(time = self.current_time, speed = self.speed, "scrubber: play");
        self.events.emit(ScrubberEvent::Play);
        self.last_state = None;
        self.update();
    }

    pub fn pause(&mut self) {
        self.scheduler.stop();
        self.playing = false;
        debug!(time = self.current_time, "scrubber: pause");
        self.events.emit(ScrubberEvent::Pause);
        self.update();
    }

    pub fn toggle(&mut self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Run one tick. Called by the scheduler while playing, and after every
    /// explicit control change.
    pub fn update(&mut self) {
        let Some(initial_time) = self.initial_time else {
            return;
        };
        let last_turn = self.current_turn();

        if self.playing {
            let now = self.clock.now();
            let elapsed = now.saturating_sub(self.last_update);
            self.last_update = now;

            if self.speed != 0.0 && !self.is_inhibited() {
                let before = self.current_time;
                self.current_time += elapsed.as_secs_f64() * self.speed;

                if self.has_ended() {
                    self.current_time = self.end_offset();
                    self.seconds_watched += (self.current_time - before).abs();
                    debug!(time = self.current_time, "scrubber: reached end");
                    self.pause();
                    return;
                }
                if self.current_time < 0.0 {
                    self.current_time = 0.0;
                    self.seconds_watched += before;
                    debug!("scrubber: rewound to start");
                    self.pause();
                    return;
                }
                self.seconds_watched += (self.current_time - before).abs();
            }
        }

        let latest = self
            .history
            .latest(self.current_time + initial_time)
            .cloned();
        if let Some(latest) = latest {
            let unchanged = self
                .last_state
                .as_ref()
                .is_some_and(|last| Arc::ptr_eq(last, &latest));
            if !unchanged {
                self.last_state = Some(Arc::clone(&latest));
                self.states.emit(latest);
            }
        }

        let turn = self.current_turn();
        if turn != last_turn {
            self.events.emit(ScrubberEvent::Turn(turn));
        }

        self.events.emit(ScrubberEvent::Update);
    }

    /// Jump to `time` seconds from the start.
    pub fn seek(&mut self, time: f64) {
        if time == self.current_time {
            return;
        }
        self.current_time = time;
        self.update();
    }

    pub fn rewind(&mut self) {
        self.current_time = 0.0;
        self.update();
    }

    /// Jump to the end and stop playback.
    pub fn fast_forward(&mut self) {
        self.current_time = self.end_offset();
        self.pause();
    }

    /// Change the playback multiplier. Negative values play backwards.
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = speed;
        self.update();
    }

    // -- turn navigation ----------------------------------------------------

    /// Jump to the start of the next indexed turn, or to the end if there is
    /// none.
    pub fn next_turn(&mut self) {
        let mut target = self.end_offset();

        if let (Some(initial), Some(mut turn)) = (self.initial_time, self.current_turn()) {
            let turns = self.history.turn_map();
            // Before the first indexed turn begins we are still "in" the
            // turn before it.
            if turns
                .first()
                .is_some_and(|first| self.current_time < first.time - initial)
            {
                turn -= 1;
            }
            if let Some((_, entry)) = turns.next_after(turn) {
                target = entry.time - initial;
            }
        }

        self.current_time = target;
        self.update();
    }

    /// Jump to the start of the previous indexed turn, or to the start of
    /// the replay if there is none.
    pub fn previous_turn(&mut self) {
        let mut target = 0.0;

        if let (Some(initial), Some(turn)) = (self.initial_time, self.current_turn()) {
            if let Some((_, entry)) = self.history.turn_map().previous_before(turn) {
                target = entry.time - initial;
            }
        }

        self.current_time = target;
        self.update();
    }

    /// Restart the current turn if enough of it has played, otherwise go to
    /// the previous turn.
    pub fn skip_back(&mut self) {
        let turn_start = self
            .current_turn()
            .zip(self.initial_time)
            .and_then(|(turn, initial)| {
                self.history
                    .turn_map()
                    .get(turn)
                    .map(|entry| entry.time - initial)
            });

        if let Some(start) = turn_start {
            let elapsed = self.current_time - start;
            if elapsed > self.config.skip_back_factor * self.speed.abs() {
                self.current_time = start;
                self.update();
                return;
            }
        }
        self.previous_turn();
    }

    // -- inhibition ---------------------------------------------------------

    /// Install a capability that can hold virtual time still.
    pub fn set_inhibitor(&mut self, inhibitor: Arc<dyn Inhibitor>) {
        self.inhibitor = Some(inhibitor);
    }

    pub fn clear_inhibitor(&mut self) {
        self.inhibitor = None;
    }

    fn is_inhibited(&self) -> bool {
        self.inhibitor
            .as_ref()
            .is_some_and(|inhibitor| inhibitor.is_inhibiting())
    }

    // -- queries ------------------------------------------------------------

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_paused(&self) -> bool {
        !self.is_playing()
    }

    /// Whether playback has ever been started.
    pub fn can_interact(&self) -> bool {
        self.has_started
    }

    pub fn can_rewind(&self) -> bool {
        self.current_time > 0.0 || self.is_playing()
    }

    /// Whether virtual time has reached the last known snapshot time.
    pub fn has_ended(&self) -> bool {
        match (self.initial_time, self.end_time) {
            (Some(initial), Some(end)) => self.current_time + initial >= end,
            _ => false,
        }
    }

    pub fn can_play(&self) -> bool {
        !self.has_ended() && self.can_interact()
    }

    /// Length of the replay known so far, in seconds.
    pub fn duration(&self) -> f64 {
        self.end_offset().max(0.0)
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Turn of the last forwarded snapshot.
    pub fn current_turn(&self) -> Option<i64> {
        self.last_state.as_ref().and_then(|state| state.turn())
    }

    /// Last snapshot forwarded to subscribers.
    pub fn current_state(&self) -> Option<&Arc<GameState>> {
        self.last_state.as_ref()
    }

    pub fn config(&self) -> &ScrubberConfig {
        &self.config
    }

    pub fn history(&self) -> &GameStateHistory {
        &self.history
    }

    pub fn is_ready(&self) -> bool {
        self.has_emitted_ready
    }

    /// Whether upstream has called [`end`](Self::end).
    pub fn input_ended(&self) -> bool {
        self.input_ended
    }

    /// Virtual seconds covered by playback so far.
    pub fn seconds_watched(&self) -> f64 {
        self.seconds_watched
    }

    /// `seconds_watched` relative to the duration, capped at 100.
    pub fn percentage_watched(&self) -> f64 {
        let duration = self.duration();
        if duration <= 0.0 {
            return 0.0;
        }
        (self.seconds_watched * 100.0 / duration).min(100.0)
    }

    fn end_offset(&self) -> f64 {
        match (self.initial_time, self.end_time) {
            (Some(initial), Some(end)) => end - initial,
            _ => 0.0,
        }
    }
}

impl Drop for Scrubber {
    fn drop(&mut self) {
        self.scheduler.stop();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
