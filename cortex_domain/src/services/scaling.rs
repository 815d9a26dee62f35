// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Min-Max Scaling
//!
//! The shared scaling helper of the weigher plugins: maps a feature value
//! from a configured input range `[lo, hi]` onto an activation range
//! `[a, b]`. Values outside the input range clamp to the nearest edge so a
//! noisy feature can never fling a subject outside the configured
//! activation band.
//!
//! `lo == hi` is rejected at option-validation time; a degenerate input
//! range would divide by zero on every run.

use crate::error::SchedulerError;
use serde::{Deserialize, Serialize};

/// A validated mapping from an input range onto an activation range.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MinMaxScale {
    /// Input range `[lo, hi]`.
    pub input: (f64, f64),
    /// Activation range `[a, b]`. `a > b` is allowed and inverts the slope.
    pub activation: (f64, f64),
}

impl MinMaxScale {
    /// Validates the configured ranges. Must be called at stage init so a
    /// degenerate range is a configuration error, not a runtime surprise.
    pub fn validate(&self) -> Result<(), SchedulerError> {
        let (lo, hi) = self.input;
        if lo == hi {
            return Err(SchedulerError::invalid_config(format!(
                "min-max input range is degenerate: lo == hi == {lo}"
            )));
        }
        if !lo.is_finite() || !hi.is_finite() {
            return Err(SchedulerError::invalid_config("min-max input range must be finite"));
        }
        Ok(())
    }

    /// Scales `x` into the activation range, clamping at the edges.
    pub fn scale(&self, x: f64) -> f64 {
        let (lo, hi) = self.input;
        let (a, b) = self.activation;
        let t = ((x - lo) / (hi - lo)).clamp(0.0, 1.0);
        a + t * (b - a)
    }
}

impl Default for MinMaxScale {
    fn default() -> Self {
        Self {
            input: (0.0, 100.0),
            activation: (0.0, 1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale_maps_linearly() {
        let s = MinMaxScale {
            input: (0.0, 100.0),
            activation: (0.0, 1.0),
        };
        assert_eq!(s.scale(25.0), 0.25);
        assert_eq!(s.scale(100.0), 1.0);
    }

    #[test]
    fn test_scale_clamps_outside_input_range() {
        let s = MinMaxScale {
            input: (0.0, 100.0),
            activation: (0.0, 1.0),
        };
        assert_eq!(s.scale(-10.0), 0.0);
        assert_eq!(s.scale(250.0), 1.0);
    }

    #[test]
    fn test_inverted_activation_range() {
        let s = MinMaxScale {
            input: (0.0, 100.0),
            activation: (1.0, 0.0),
        };
        assert_eq!(s.scale(75.0), 0.25);
    }

    #[test]
    fn test_degenerate_input_range_rejected() {
        let s = MinMaxScale {
            input: (5.0, 5.0),
            activation: (0.0, 1.0),
        };
        let err = s.validate().unwrap_err();
        assert!(matches!(err, SchedulerError::InvalidConfiguration(_)));
    }

    proptest::proptest! {
        #[test]
        fn prop_scaled_values_stay_inside_the_activation_band(
            x in -1e6f64..1e6,
            lo in -1e3f64..1e3,
            span in 1e-3f64..1e3,
            a in -10.0f64..10.0,
            b in -10.0f64..10.0,
        ) {
            let s = MinMaxScale { input: (lo, lo + span), activation: (a, b) };
            s.validate().unwrap();
            let y = s.scale(x);
            let (min, max) = if a <= b { (a, b) } else { (b, a) };
            proptest::prop_assert!(y >= min - 1e-9 && y <= max + 1e-9);
        }
    }
}
