//! Core types for the Bilbo engine
//!
//! This module defines the data that flows through the engine: logged sets
//! used as 1RM evidence, the mutable progression record of a tracked
//! exercise, append-only BILBO session records, and the read-only aggregates
//! produced for reporting. All weights are canonical kilograms.

use crate::config::{DEFAULT_PROGRESSION_REP_THRESHOLD, TARGET_REP_CEILING};
use crate::error::ValidationError;
use crate::formulas::Formula;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Heaviest single set accepted as plausible input (kg)
pub const MAX_PLAUSIBLE_WEIGHT_KG: f64 = 200.0;

/// Most repetitions accepted as plausible input
pub const MAX_PLAUSIBLE_REPS: u32 = 50;

/// One completed set, used as evidence for 1RM estimation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSample {
    /// Weight lifted (kg)
    pub weight: f64,
    /// Repetitions completed
    pub reps: u32,
    /// When the set was performed
    pub performed_at: DateTime<Utc>,
}

impl WorkoutSample {
    pub fn new(weight: f64, reps: u32, performed_at: DateTime<Utc>) -> Self {
        Self {
            weight,
            reps,
            performed_at,
        }
    }

    /// Work-volume proxy: weight × reps
    pub fn volume(&self) -> f64 {
        self.weight * self.reps as f64
    }

    /// Whether the sample can feed an estimate at all
    pub fn is_usable(&self) -> bool {
        self.weight > 0.0 && self.reps > 0
    }

    /// Minimum requirement for a logged session: a finite positive weight
    /// and at least one rep
    pub fn validate_loggable(&self) -> Result<(), ValidationError> {
        if !self.weight.is_finite() || self.weight <= 0.0 {
            return Err(ValidationError::NonPositiveWeight(self.weight));
        }
        if self.reps == 0 {
            return Err(ValidationError::ZeroReps);
        }
        Ok(())
    }

    /// Check the sample against the plausibility limits
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_loggable()?;
        if self.reps > MAX_PLAUSIBLE_REPS {
            return Err(ValidationError::TooManyReps {
                max: MAX_PLAUSIBLE_REPS,
                actual: self.reps,
            });
        }
        if self.weight > MAX_PLAUSIBLE_WEIGHT_KG {
            return Err(ValidationError::ImplausibleWeight {
                max: MAX_PLAUSIBLE_WEIGHT_KG,
                actual: self.weight,
            });
        }
        Ok(())
    }
}

/// Inclusive rep range targeted by a BILBO session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepRange {
    pub low: u32,
    pub high: u32,
}

impl Default for RepRange {
    fn default() -> Self {
        Self {
            low: DEFAULT_PROGRESSION_REP_THRESHOLD,
            high: TARGET_REP_CEILING,
        }
    }
}

impl RepRange {
    pub fn contains(&self, reps: u32) -> bool {
        reps >= self.low && reps <= self.high
    }
}

/// Outcome of the most recent BILBO session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub reps_completed: u32,
    pub performed_at: DateTime<Utc>,
}

/// Where the current 1RM came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OneRmSource {
    /// Entered or tested by the user
    Manual,
    /// Computed from logged history
    AutoCalculated {
        at: DateTime<Utc>,
        formula: Formula,
    },
}

impl OneRmSource {
    pub fn is_auto_calculated(&self) -> bool {
        matches!(self, OneRmSource::AutoCalculated { .. })
    }
}

/// Mutable progression record for one exercise tracked under BILBO
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedExerciseState {
    /// Current best estimate of the 1RM (kg)
    pub one_rep_max: f64,
    /// Weight prescribed for the next session (kg)
    pub training_weight: f64,
    /// Target rep range (fixed policy)
    pub target_rep_range: RepRange,
    /// Outcome of the last logged session, if any
    pub last_session_outcome: Option<SessionOutcome>,
    /// Provenance of `one_rep_max`
    pub one_rep_max_source: OneRmSource,
    /// Formula last used to derive or record the 1RM
    #[serde(default)]
    pub formula: Formula,
    /// Free-form notes
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Phase of a tracked exercise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingPhase {
    /// Initialized, no session logged yet
    AwaitingFirstSession,
    /// At least one session logged
    Active,
}

/// One logged BILBO session (append-only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BilboSessionRecord {
    pub id: Uuid,
    pub performed_at: DateTime<Utc>,
    /// Weight used (kg)
    pub weight_used: f64,
    pub reps_completed: u32,
    #[serde(default)]
    pub notes: String,
}

impl BilboSessionRecord {
    pub fn new(
        performed_at: DateTime<Utc>,
        weight_used: f64,
        reps_completed: u32,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            performed_at,
            weight_used,
            reps_completed,
            notes: notes.into(),
        }
    }

    /// Session volume: weight × reps
    pub fn volume(&self) -> f64 {
        self.weight_used * self.reps_completed as f64
    }

    /// View the session as 1RM evidence
    pub fn as_sample(&self) -> WorkoutSample {
        WorkoutSample::new(self.weight_used, self.reps_completed, self.performed_at)
    }
}

/// Simple reduction over a set of workout samples
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkoutStats {
    pub max_weight: f64,
    pub max_reps: u32,
    pub session_count: usize,
    pub last_session_at: Option<DateTime<Utc>>,
}

/// Aggregate statistics over a BILBO session history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BilboStats {
    pub total_sessions: usize,
    pub avg_weight: f64,
    pub max_weight: f64,
    pub avg_reps: f64,
    pub max_reps: u32,
    /// Σ weight × reps
    pub total_volume: f64,
    /// Session count keyed by ISO week start (Monday)
    pub sessions_by_week: BTreeMap<NaiveDate, u32>,
}

/// Change between the first and last session of a history
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Improvement {
    pub weight_increase: f64,
    pub reps_increase: i64,
    pub volume_increase: f64,
    /// Volume change relative to the first session (percent)
    pub percentage_improvement: f64,
}

/// Chronological series for progression charts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressSeries {
    pub weight: Vec<(DateTime<Utc>, f64)>,
    pub reps: Vec<(DateTime<Utc>, u32)>,
    pub volume: Vec<(DateTime<Utc>, f64)>,
}

/// Estimate with an explicit "no data" case.
///
/// The numeric engine reports missing input as `0.0`; this wrapper lets a
/// caller tell that apart from a real value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Estimate {
    NoData,
    Value(f64),
}

impl Estimate {
    /// Interpret a zero-sentinel engine result
    pub fn from_sentinel(value: f64) -> Self {
        if value == 0.0 {
            Estimate::NoData
        } else {
            Estimate::Value(value)
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Estimate::Value(_))
    }

    pub fn value(&self) -> Option<f64> {
        match self {
            Estimate::NoData => None,
            Estimate::Value(v) => Some(*v),
        }
    }

    /// Collapse back to the engine's zero sentinel
    pub fn value_or_zero(&self) -> f64 {
        self.value().unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_sample_validation() {
        assert!(WorkoutSample::new(60.0, 10, at(1)).validate().is_ok());
        assert_eq!(
            WorkoutSample::new(0.0, 10, at(1)).validate(),
            Err(ValidationError::NonPositiveWeight(0.0))
        );
        assert_eq!(
            WorkoutSample::new(60.0, 0, at(1)).validate(),
            Err(ValidationError::ZeroReps)
        );
        assert_eq!(
            WorkoutSample::new(60.0, 51, at(1)).validate(),
            Err(ValidationError::TooManyReps { max: 50, actual: 51 })
        );
        assert!(matches!(
            WorkoutSample::new(250.0, 3, at(1)).validate(),
            Err(ValidationError::ImplausibleWeight { .. })
        ));
    }

    #[test]
    fn test_loggable_ignores_plausibility_limits() {
        assert!(WorkoutSample::new(250.0, 20, at(1)).validate_loggable().is_ok());
        assert!(WorkoutSample::new(50.0, 100, at(1)).validate_loggable().is_ok());
        assert_eq!(
            WorkoutSample::new(50.0, 0, at(1)).validate_loggable(),
            Err(ValidationError::ZeroReps)
        );
        assert!(WorkoutSample::new(f64::INFINITY, 5, at(1)).validate_loggable().is_err());
    }

    #[test]
    fn test_nan_weight_is_rejected() {
        assert!(WorkoutSample::new(f64::NAN, 5, at(1)).validate().is_err());
    }

    #[test]
    fn test_default_rep_range() {
        let range = RepRange::default();
        assert_eq!(range, RepRange { low: 15, high: 50 });
        assert!(range.contains(15));
        assert!(range.contains(50));
        assert!(!range.contains(14));
    }

    #[test]
    fn test_session_volume_and_sample() {
        let session = BilboSessionRecord::new(at(2), 40.0, 20, "felt easy");
        assert_eq!(session.volume(), 800.0);
        assert_eq!(session.as_sample(), WorkoutSample::new(40.0, 20, at(2)));
    }

    #[test]
    fn test_one_rm_source_serde() {
        let source = OneRmSource::AutoCalculated {
            at: at(3),
            formula: Formula::Brzycki,
        };
        let json = serde_json::to_value(source).unwrap();
        assert_eq!(json["kind"], "auto_calculated");
        assert_eq!(json["formula"], "brzycki");

        let manual: OneRmSource = serde_json::from_str(r#"{"kind":"manual"}"#).unwrap();
        assert_eq!(manual, OneRmSource::Manual);
        assert!(!manual.is_auto_calculated());
    }

    #[test]
    fn test_estimate_sentinel() {
        assert_eq!(Estimate::from_sentinel(0.0), Estimate::NoData);
        assert_eq!(Estimate::from_sentinel(112.5), Estimate::Value(112.5));
        assert_eq!(Estimate::NoData.value_or_zero(), 0.0);
        assert!(Estimate::Value(1.0).is_available());
    }
}
