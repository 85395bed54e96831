//! Scrubber and playback configuration.
//!
//! Both structs deserialize from JSON with every field optional, so a host
//! can ship a partial config file and let the rest default.
//!
//! ```
//! use tavern_timeline::config::ScrubberConfig;
//!
//! let config = ScrubberConfig::from_json(r#"{ "speed": 4.0, "start_from_turn": 3 }"#).unwrap();
//! assert_eq!(config.speed, 4.0);
//! assert_eq!(config.tick_interval_ms, 100);
//! assert_eq!(config.start_from_turn, Some(3));
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::TimelineError;

// ---------------------------------------------------------------------------
// ScrubberConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Scrubber`](crate::scrubber::Scrubber).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrubberConfig {
    /// Initial playback multiplier. Negative values play backwards.
    pub speed: f64,
    /// Period of the recurring playback tick, in milliseconds. Must be positive.
    pub tick_interval_ms: u64,
    /// `skip_back` snaps to the start of the current turn when more than
    /// `skip_back_factor * |speed|` seconds of the turn have played.
    pub skip_back_factor: f64,
    /// Turn to jump to as soon as it has been indexed, before playback starts.
    pub start_from_turn: Option<i64>,
}

impl Default for ScrubberConfig {
    /// 2x speed, 100ms ticks, 1.5 skip-back factor, start at the beginning.
    fn default() -> Self {
        Self {
            speed: 2.0,
            tick_interval_ms: 100,
            skip_back_factor: 1.5,
            start_from_turn: None,
        }
    }
}

impl ScrubberConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, TimelineError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TimelineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants [`Scrubber::new`](crate::scrubber::Scrubber::new)
    /// asserts.
    pub fn validate(&self) -> Result<(), TimelineError> {
        if self.tick_interval_ms == 0 {
            return Err(TimelineError::InvalidConfig(
                "tick_interval_ms must be positive".to_owned(),
            ));
        }
        if !self.speed.is_finite() {
            return Err(TimelineError::InvalidConfig(format!(
                "speed must be finite, got {}",
                self.speed
            )));
        }
        if !(self.skip_back_factor > 0.0 && self.skip_back_factor.is_finite()) {
            return Err(TimelineError::InvalidConfig(format!(
                "skip_back_factor must be positive and finite, got {}",
                self.skip_back_factor
            )));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

// ---------------------------------------------------------------------------
// PlaybackOptions
// ---------------------------------------------------------------------------

/// How a [`ReplayPipeline`](crate::pipeline::ReplayPipeline) starts playback
/// once the input has been fully consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackOptions {
    /// Start playing automatically after the input ends.
    pub autoplay: bool,
    /// `Some(true)` holds playback paused after autoplay, `Some(false)` keeps
    /// it running. When unset, playback is held paused only if a start turn
    /// was requested.
    pub start_paused: Option<bool>,
}

impl PlaybackOptions {
    /// Whether playback should be held paused after the first `play()`.
    pub fn hold_paused(&self, start_from_turn: Option<i64>) -> bool {
        self.start_paused.unwrap_or(start_from_turn.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_playback() {
        let config = ScrubberConfig::default();
        assert_eq!(config.speed, 2.0);
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.skip_back_factor, 1.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let err = ScrubberConfig::from_json(r#"{ "tick_interval_ms": 0 }"#).unwrap_err();
        assert!(matches!(err, TimelineError::InvalidConfig(_)));
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(ScrubberConfig::from_json("{ speed: fast }").is_err());
    }

    #[test]
    fn hold_paused_follows_start_turn_when_unset() {
        let options = PlaybackOptions::default();
        assert!(!options.hold_paused(None));
        assert!(options.hold_paused(Some(4)));

        let forced = PlaybackOptions { autoplay: true, start_paused: Some(false) };
        assert!(!forced.hold_paused(Some(4)));
    }
}
