//! Per-call synthesis parameters.
//!
//! ```
//! use orca_tts::SynthesizeParams;
//!
//! let params = SynthesizeParams::builder()
//!     .speech_rate(1.2)
//!     .random_state(42)
//!     .build()
//!     .unwrap();
//! assert_eq!(params.speech_rate(), 1.2);
//!
//! assert!(SynthesizeParams::builder().speech_rate(2.0).build().is_err());
//! ```

use crate::error::{OrcaError, Result};

/// Slowest accepted speech rate.
pub const MIN_SPEECH_RATE: f32 = 0.7;

/// Fastest accepted speech rate.
pub const MAX_SPEECH_RATE: f32 = 1.3;

/// Speech rate used when none is set.
pub const DEFAULT_SPEECH_RATE: f32 = 1.0;

/// Value passed to the engine when no random state is set.
/// Any negative value means "unspecified" to the engine.
pub const RANDOM_STATE_UNSET: i64 = -1;

/// Validated synthesis parameters.  Build with [`SynthesizeParams::builder`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesizeParams {
    speech_rate: f32,
    random_state: Option<i64>,
}

impl Default for SynthesizeParams {
    fn default() -> Self {
        Self { speech_rate: DEFAULT_SPEECH_RATE, random_state: None }
    }
}

impl SynthesizeParams {
    pub fn builder() -> SynthesizeParamsBuilder {
        SynthesizeParamsBuilder::default()
    }

    pub fn speech_rate(&self) -> f32 {
        self.speech_rate
    }

    /// The random state, or `None` when synthesis is nondeterministic.
    pub fn random_state(&self) -> Option<i64> {
        self.random_state
    }

    /// Random state as sent across the native boundary.
    pub(crate) fn native_random_state(&self) -> i64 {
        self.random_state.unwrap_or(RANDOM_STATE_UNSET)
    }
}

/// Builder for [`SynthesizeParams`]; validation happens in [`build`](Self::build).
#[derive(Debug, Clone, Copy)]
pub struct SynthesizeParamsBuilder {
    speech_rate: f32,
    random_state: Option<i64>,
}

impl Default for SynthesizeParamsBuilder {
    fn default() -> Self {
        Self { speech_rate: DEFAULT_SPEECH_RATE, random_state: None }
    }
}

impl SynthesizeParamsBuilder {
    pub fn speech_rate(mut self, speech_rate: f32) -> Self {
        self.speech_rate = speech_rate;
        self
    }

    /// Fix the random seed.  Negative values are treated as "unset".
    pub fn random_state(mut self, random_state: i64) -> Self {
        self.random_state = (random_state >= 0).then_some(random_state);
        self
    }

    pub fn build(self) -> Result<SynthesizeParams> {
        // NaN fails the range check as well.
        if !(MIN_SPEECH_RATE..=MAX_SPEECH_RATE).contains(&self.speech_rate) {
            return Err(OrcaError::invalid_argument(format!(
                "Speech rate must be within [{MIN_SPEECH_RATE}, {MAX_SPEECH_RATE}], got {}",
                self.speech_rate
            )));
        }
        Ok(SynthesizeParams { speech_rate: self.speech_rate, random_state: self.random_state })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = SynthesizeParams::builder().build().unwrap();
        assert_eq!(p, SynthesizeParams::default());
        assert_eq!(p.speech_rate(), 1.0);
        assert_eq!(p.random_state(), None);
        assert_eq!(p.native_random_state(), RANDOM_STATE_UNSET);
    }

    #[test]
    fn test_speech_rate_bounds_are_inclusive() {
        for rate in [0.7, 0.85, 1.0, 1.15, 1.3] {
            assert!(SynthesizeParams::builder().speech_rate(rate).build().is_ok(), "{rate}");
        }
    }

    #[test]
    fn test_speech_rate_out_of_range() {
        for rate in [0.0, 0.69, 1.31, 9999.0, -1.0, f32::NAN, f32::INFINITY] {
            let err = SynthesizeParams::builder().speech_rate(rate).build().unwrap_err();
            assert!(matches!(err, OrcaError::InvalidArgument(_)), "{rate}: {err}");
        }
    }

    #[test]
    fn test_random_state() {
        let p = SynthesizeParams::builder().random_state(42).build().unwrap();
        assert_eq!(p.random_state(), Some(42));
        assert_eq!(p.native_random_state(), 42);

        let p = SynthesizeParams::builder().random_state(i64::MAX).build().unwrap();
        assert_eq!(p.native_random_state(), i64::MAX);
    }

    #[test]
    fn test_negative_random_state_is_unset() {
        let p = SynthesizeParams::builder().random_state(-5).build().unwrap();
        assert_eq!(p.random_state(), None);
        assert_eq!(p.native_random_state(), RANDOM_STATE_UNSET);
    }
}
