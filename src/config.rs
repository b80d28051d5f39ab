//! Policy constants
//!
//! The BILBO protocol is driven by a handful of fixed numbers. They are
//! collected here so a host application can surface them as settings, but the
//! engine always starts from the defaults below.

use crate::error::EngineError;
use crate::one_rm::round_to_increment;
use serde::{Deserialize, Serialize};

/// Plate increment used to snap training weights (kg)
pub const DEFAULT_ROUNDING_INCREMENT: f64 = 1.25;

/// Reps that must be exceeded before the training weight is increased
pub const DEFAULT_PROGRESSION_REP_THRESHOLD: u32 = 15;

/// Flat weight increase applied after a successful session (kg)
pub const DEFAULT_PROGRESSION_INCREMENT: f64 = 2.5;

/// Days after which an auto-calculated 1RM should be recalculated
pub const DEFAULT_RECALC_STALENESS_DAYS: i64 = 7;

/// Window used when looking for a recent, reliable 1RM estimate
pub const DEFAULT_RECENT_WINDOW_DAYS: i64 = 30;

/// Weight gain over the first session that counts as 100% progress (kg)
pub const DEFAULT_TARGET_PROGRESS_WINDOW_KG: f64 = 10.0;

/// Fraction of the 1RM used as the BILBO training weight
pub const BILBO_PERCENTAGE: f64 = 0.5;

/// Upper end of the BILBO target rep range
pub const TARGET_REP_CEILING: u32 = 50;

/// Longest accepted day window (roughly a century)
pub const MAX_WINDOW_DAYS: i64 = 36_500;

/// Named policy values for the BILBO protocol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub rounding_increment: f64,
    pub progression_rep_threshold: u32,
    pub progression_increment: f64,
    pub recalc_staleness_days: i64,
    pub recent_window_days: i64,
    pub target_progress_window_kg: f64,
    /// Fraction of the 1RM prescribed as training weight
    pub bilbo_percentage: f64,
    /// Inclusive band (percent of 1RM) considered healthy for BILBO work
    pub correct_range_pct: (f64, f64),
    /// Relative 1RM change required before a history recalculation is proposed
    pub recalc_change_threshold: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            rounding_increment: DEFAULT_ROUNDING_INCREMENT,
            progression_rep_threshold: DEFAULT_PROGRESSION_REP_THRESHOLD,
            progression_increment: DEFAULT_PROGRESSION_INCREMENT,
            recalc_staleness_days: DEFAULT_RECALC_STALENESS_DAYS,
            recent_window_days: DEFAULT_RECENT_WINDOW_DAYS,
            target_progress_window_kg: DEFAULT_TARGET_PROGRESS_WINDOW_KG,
            bilbo_percentage: BILBO_PERCENTAGE,
            correct_range_pct: (45.0, 55.0),
            recalc_change_threshold: 0.05,
        }
    }
}

impl PolicyConfig {
    /// Check that the values describe a usable policy
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.progression_increment.is_nan() || self.progression_increment < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "progression_increment must be non-negative, got {}",
                self.progression_increment
            )));
        }
        if self.target_progress_window_kg <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "target_progress_window_kg must be positive, got {}",
                self.target_progress_window_kg
            )));
        }
        for (name, days) in [
            ("recent_window_days", self.recent_window_days),
            ("recalc_staleness_days", self.recalc_staleness_days),
        ] {
            if !(0..=MAX_WINDOW_DAYS).contains(&days) {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be between 0 and {MAX_WINDOW_DAYS}, got {days}"
                )));
            }
        }
        let (low, high) = self.correct_range_pct;
        if low > high {
            return Err(EngineError::InvalidConfig(format!(
                "correct_range_pct is inverted: ({low}, {high})"
            )));
        }
        Ok(())
    }

    /// Training weight this policy prescribes for `one_rm`, snapped to the plate increment
    pub fn bilbo_weight(&self, one_rm: f64) -> f64 {
        round_to_increment(one_rm * self.bilbo_percentage, self.rounding_increment)
    }

    /// Load a policy from JSON; missing fields fall back to defaults
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the policy to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
