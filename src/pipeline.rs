//! Host-facing orchestration
//!
//! [`BilboProcessor`] bundles a [`ProgressionTracker`] with the session
//! history the host has persisted, so one object can be loaded from JSON, fed
//! sessions, asked for a report and saved again. The free functions cover the
//! stateless cases: estimating from a batch of logged sets and reporting on a
//! saved state.

use crate::config::PolicyConfig;
use crate::error::EngineError;
use crate::formulas::{estimate_average_one_rm, Formula};
use crate::one_rm::{
    aggregate_stats, find_best_one_rm_checked, find_recent_reliable_one_rm_checked, usable_samples,
    validate_workout_data,
};
use crate::progression::ProgressionTracker;
use crate::stats::{bilbo_stats, improvement, progress_percentage_with_window};
use crate::types::{
    BilboSessionRecord, BilboStats, Estimate, Improvement, OneRmSource, TrackedExerciseState,
    TrackingPhase, WorkoutSample, WorkoutStats,
};
use crate::ENGINE_VERSION;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Seed 1RM for a new exercise from its default working weight (twice the weight)
pub fn seed_one_rm_from_default_weight(default_weight: f64) -> f64 {
    (default_weight * 2.0).max(0.0)
}

/// Persisted form of a [`BilboProcessor`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorState {
    pub exercise: TrackedExerciseState,
    #[serde(default)]
    pub history: Vec<BilboSessionRecord>,
    #[serde(default)]
    pub policy: PolicyConfig,
}

/// One line of an NDJSON session stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionEntry {
    /// Weight used (kg)
    pub weight: f64,
    pub reps: u32,
    #[serde(default)]
    pub notes: String,
    /// Defaults to the processing time when absent
    #[serde(default)]
    pub performed_at: Option<DateTime<Utc>>,
}

/// A stream line that was not applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedEntry {
    /// 1-based line number in the input
    pub line: usize,
    pub reason: String,
}

/// Outcome of [`BilboProcessor::apply_entries`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApplySummary {
    pub applied: Vec<BilboSessionRecord>,
    pub rejected: Vec<RejectedEntry>,
}

/// Snapshot of a tracked exercise for reporting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub engine_version: String,
    pub generated_at: DateTime<Utc>,
    pub phase: TrackingPhase,
    pub one_rep_max: f64,
    pub one_rep_max_source: OneRmSource,
    pub formula: Formula,
    pub training_weight: f64,
    pub suggested_next_weight: f64,
    pub current_percentage: f64,
    pub in_correct_range: bool,
    pub should_progress: bool,
    pub estimated_reps_in_reserve: u32,
    pub should_recalculate_one_rm: bool,
    /// New 1RM suggested by the logged history, if it moved by more than 5%
    pub proposed_one_rep_max: Option<f64>,
    pub progress_percentage: f64,
    pub stats: BilboStats,
    pub improvement: Improvement,
}

/// 1RM estimates computed from a batch of logged sets
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleEstimate {
    pub formula: Formula,
    pub best: Estimate,
    pub recent_reliable: Estimate,
    /// Mean of all formulas for the heaviest usable set
    pub average_of_formulas: Estimate,
    pub rejected_samples: usize,
    pub stats: WorkoutStats,
}

/// Stateful processor for one tracked exercise and its history
#[derive(Debug, Clone, PartialEq)]
pub struct BilboProcessor {
    tracker: ProgressionTracker,
    history: Vec<BilboSessionRecord>,
}

impl BilboProcessor {
    /// Start tracking from a seed 1RM with the default policy
    pub fn new(one_rm: f64, source: OneRmSource) -> Self {
        Self::with_policy(one_rm, source, PolicyConfig::default(), Utc::now())
    }

    pub fn with_policy(
        one_rm: f64,
        source: OneRmSource,
        policy: PolicyConfig,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            tracker: ProgressionTracker::initialize_at(one_rm, source, policy, now),
            history: Vec::new(),
        }
    }

    /// Build a processor from a saved state JSON
    pub fn from_state_json(json: &str) -> Result<Self, EngineError> {
        let state: ProcessorState =
            serde_json::from_str(json).map_err(|e| EngineError::ParseError(e.to_string()))?;
        state.policy.validate()?;
        Ok(Self {
            tracker: ProgressionTracker::from_state_with_policy(state.exercise, state.policy),
            history: state.history,
        })
    }

    /// Replace this processor's state with a saved state JSON
    pub fn load_state(&mut self, json: &str) -> Result<(), EngineError> {
        *self = Self::from_state_json(json)?;
        Ok(())
    }

    /// Save the processor state to JSON
    pub fn save_state(&self) -> Result<String, EngineError> {
        let state = ProcessorState {
            exercise: self.tracker.state().clone(),
            history: self.history.clone(),
            policy: self.tracker.policy().clone(),
        };
        serde_json::to_string_pretty(&state).map_err(|e| EngineError::EncodingError(e.to_string()))
    }

    pub fn tracker(&self) -> &ProgressionTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut ProgressionTracker {
        &mut self.tracker
    }

    pub fn history(&self) -> &[BilboSessionRecord] {
        &self.history
    }

    /// Record a session and append it to the history.
    ///
    /// Only a non-positive or non-finite weight and zero reps are rejected.
    /// Sets outside the plausibility limits are recorded with a warning.
    pub fn log_session(
        &mut self,
        weight_used: f64,
        reps_completed: u32,
        notes: &str,
        now: DateTime<Utc>,
    ) -> Result<BilboSessionRecord, EngineError> {
        WorkoutSample::new(weight_used, reps_completed, now).validate_loggable()?;
        if !validate_workout_data(weight_used, reps_completed) {
            warn!(weight_used, reps_completed, "session outside plausible limits");
        }
        let record = self
            .tracker
            .record_session_at(weight_used, reps_completed, notes, now);
        self.history.push(record.clone());
        Ok(record)
    }

    /// Apply one [`SessionEntry`]; entries without a timestamp use `now`
    pub fn apply_entry(
        &mut self,
        entry: &SessionEntry,
        now: DateTime<Utc>,
    ) -> Result<BilboSessionRecord, EngineError> {
        let performed_at = entry.performed_at.unwrap_or(now);
        self.log_session(entry.weight, entry.reps, &entry.notes, performed_at)
    }

    /// Apply newline-delimited [`SessionEntry`] JSON in order.
    ///
    /// Blank lines are skipped. Lines that fail to parse or that
    /// [`log_session`](Self::log_session) rejects are reported in the
    /// summary and do not touch the state.
    pub fn apply_entries(&mut self, ndjson: &str, now: DateTime<Utc>) -> ApplySummary {
        let mut summary = ApplySummary::default();

        for (index, line) in ndjson.lines().enumerate() {
            let line_no = index + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let result = serde_json::from_str::<SessionEntry>(line)
                .map_err(EngineError::from)
                .and_then(|entry| self.apply_entry(&entry, now));

            match result {
                Ok(record) => summary.applied.push(record),
                Err(e) => {
                    warn!(line = line_no, error = %e, "rejected session entry");
                    summary.rejected.push(RejectedEntry {
                        line: line_no,
                        reason: e.to_string(),
                    });
                }
            }
        }

        debug!(
            applied = summary.applied.len(),
            rejected = summary.rejected.len(),
            "session entries applied"
        );
        summary
    }

    /// Propose a 1RM from the logged history (see [`ProgressionTracker::recalculate_from_history`])
    pub fn proposed_one_rm(&self, now: DateTime<Utc>) -> Option<f64> {
        let samples: Vec<WorkoutSample> = self.history.iter().map(|s| s.as_sample()).collect();
        self.tracker
            .recalculate_from_history(&samples, self.tracker.state().formula, now)
    }

    /// Recalculate the 1RM from history and apply it when it moved enough
    pub fn recalculate_one_rm(&mut self, now: DateTime<Utc>) -> Option<f64> {
        let proposed = self.proposed_one_rm(now)?;
        let formula = self.tracker.state().formula;
        self.tracker.update_one_rm_at(proposed, formula, true, now);
        Some(proposed)
    }

    pub fn report(&self, now: DateTime<Utc>) -> ProgressReport {
        let state = self.tracker.state();
        ProgressReport {
            engine_version: ENGINE_VERSION.to_string(),
            generated_at: now,
            phase: self.tracker.phase(),
            one_rep_max: state.one_rep_max,
            one_rep_max_source: state.one_rep_max_source,
            formula: state.formula,
            training_weight: state.training_weight,
            suggested_next_weight: self.tracker.suggested_next_weight(),
            current_percentage: self.tracker.current_percentage(),
            in_correct_range: self.tracker.is_in_correct_range(),
            should_progress: self.tracker.should_progress(),
            estimated_reps_in_reserve: self.tracker.estimated_reps_in_reserve(),
            should_recalculate_one_rm: self.tracker.should_recalculate_one_rm_at(now),
            proposed_one_rep_max: self.proposed_one_rm(now),
            progress_percentage: progress_percentage_with_window(
                &self.history,
                state.training_weight,
                self.tracker.policy().target_progress_window_kg,
            ),
            stats: bilbo_stats(&self.history),
            improvement: improvement(&self.history),
        }
    }

    pub fn report_json(&self, now: DateTime<Utc>) -> Result<String, EngineError> {
        serde_json::to_string(&self.report(now)).map_err(|e| EngineError::EncodingError(e.to_string()))
    }
}

/// Estimate a 1RM from a JSON array of [`WorkoutSample`]s.
///
/// Unusable samples (non-positive weight, zero reps) are dropped and counted.
pub fn estimate_from_samples_json(
    json: &str,
    formula: Formula,
    recent_window_days: i64,
    now: DateTime<Utc>,
) -> Result<SampleEstimate, EngineError> {
    let samples: Vec<WorkoutSample> = serde_json::from_str(json)?;
    let usable = usable_samples(&samples);
    let rejected_samples = samples.len() - usable.len();
    if rejected_samples > 0 {
        warn!(rejected_samples, "dropped unusable samples");
    }

    let heaviest = usable
        .iter()
        .max_by(|a, b| a.weight.total_cmp(&b.weight));
    let average_of_formulas = match heaviest {
        Some(s) => Estimate::from_sentinel(estimate_average_one_rm(s.weight, s.reps)),
        None => Estimate::NoData,
    };

    Ok(SampleEstimate {
        formula,
        best: find_best_one_rm_checked(&usable, formula),
        recent_reliable: find_recent_reliable_one_rm_checked(
            &usable,
            formula,
            recent_window_days,
            now,
        ),
        average_of_formulas,
        rejected_samples,
        stats: aggregate_stats(&usable),
    })
}

/// Produce a [`ProgressReport`] JSON from a saved processor state
pub fn report_from_json(state_json: &str, now: DateTime<Utc>) -> Result<String, EngineError> {
    BilboProcessor::from_state_json(state_json)?.report_json(now)
}
