//! BILBO progression tracking
//!
//! [`ProgressionTracker`] owns the progression record of one exercise and
//! applies the BILBO advancement rule after each logged session:
//!
//! - the weight actually used becomes the new baseline;
//! - completing more reps than the low end of the target range (15) earns a
//!   flat 2.5 kg increase, snapped to the 1.25 kg plate increment;
//! - anything else holds the weight. There is no deload rule.
//!
//! The tracker never owns the session history. Recording a session returns
//! the new [`BilboSessionRecord`] for the caller to persist.

use crate::config::PolicyConfig;
use crate::formulas::Formula;
use crate::one_rm::{compute_percentage, find_recent_reliable_one_rm, round_to_increment, usable_samples};
use crate::types::{
    BilboSessionRecord, OneRmSource, RepRange, SessionOutcome, TrackedExerciseState,
    TrackingPhase, WorkoutSample,
};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Upper bound for the reps-in-reserve heuristic
const MAX_REPS_IN_RESERVE: u32 = 3;

/// Rep count at which reps-in-reserve reaches its floor of 1
const REPS_IN_RESERVE_ANCHOR: u32 = 20;

/// Stateful BILBO tracker for a single exercise
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressionTracker {
    state: TrackedExerciseState,
    policy: PolicyConfig,
}

impl ProgressionTracker {
    /// Start tracking an exercise from a seed 1RM.
    ///
    /// The training weight is set to half the 1RM without rounding; only
    /// [`update_one_rm`](Self::update_one_rm) snaps it to the plate increment.
    pub fn initialize(one_rm: f64, source: OneRmSource) -> Self {
        Self::initialize_at(one_rm, source, PolicyConfig::default(), Utc::now())
    }

    /// [`initialize`](Self::initialize) with an explicit policy and clock
    pub fn initialize_at(
        one_rm: f64,
        source: OneRmSource,
        policy: PolicyConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let formula = match source {
            OneRmSource::AutoCalculated { formula, .. } => formula,
            OneRmSource::Manual => Formula::default(),
        };

        let state = TrackedExerciseState {
            one_rep_max: one_rm,
            training_weight: one_rm * policy.bilbo_percentage,
            target_rep_range: RepRange::default(),
            last_session_outcome: None,
            one_rep_max_source: source,
            formula,
            notes: String::new(),
            created_at: now,
            updated_at: now,
        };

        debug!(
            one_rep_max = one_rm,
            training_weight = state.training_weight,
            "started tracking exercise"
        );

        Self { state, policy }
    }

    /// Resume tracking from a persisted state with the default policy
    pub fn from_state(state: TrackedExerciseState) -> Self {
        Self::from_state_with_policy(state, PolicyConfig::default())
    }

    pub fn from_state_with_policy(state: TrackedExerciseState, policy: PolicyConfig) -> Self {
        Self { state, policy }
    }

    pub fn state(&self) -> &TrackedExerciseState {
        &self.state
    }

    pub fn into_state(self) -> TrackedExerciseState {
        self.state
    }

    pub fn policy(&self) -> &PolicyConfig {
        &self.policy
    }

    pub fn phase(&self) -> TrackingPhase {
        match self.state.last_session_outcome {
            Some(_) => TrackingPhase::Active,
            None => TrackingPhase::AwaitingFirstSession,
        }
    }

    /// Log a session performed now. See [`record_session_at`](Self::record_session_at).
    pub fn record_session(
        &mut self,
        weight_used: f64,
        reps_completed: u32,
        notes: &str,
    ) -> BilboSessionRecord {
        self.record_session_at(weight_used, reps_completed, notes, Utc::now())
    }

    /// Log a session and apply the progression rule.
    ///
    /// The weight used becomes the training weight; if more than 15 reps were
    /// completed it is immediately replaced by the progressed weight.
    pub fn record_session_at(
        &mut self,
        weight_used: f64,
        reps_completed: u32,
        notes: &str,
        now: DateTime<Utc>,
    ) -> BilboSessionRecord {
        let record = BilboSessionRecord::new(now, weight_used, reps_completed, notes);

        self.state.last_session_outcome = Some(SessionOutcome {
            reps_completed,
            performed_at: now,
        });
        self.state.training_weight = weight_used;
        self.state.updated_at = now;

        if reps_completed > self.policy.progression_rep_threshold {
            self.state.training_weight = self.suggested_next_weight();
            debug!(
                weight_used,
                reps_completed,
                next_weight = self.state.training_weight,
                "progression applied"
            );
        } else {
            debug!(weight_used, reps_completed, "weight held");
        }

        record
    }

    /// Weight to prescribe for the next session
    pub fn suggested_next_weight(&self) -> f64 {
        match self.state.last_session_outcome {
            Some(outcome) if outcome.reps_completed > self.policy.progression_rep_threshold => {
                round_to_increment(
                    self.state.training_weight + self.policy.progression_increment,
                    self.policy.rounding_increment,
                )
            }
            _ => self.state.training_weight,
        }
    }

    /// Whether the last session earned a weight increase
    pub fn should_progress(&self) -> bool {
        self.state
            .last_session_outcome
            .is_some_and(|o| o.reps_completed > self.policy.progression_rep_threshold)
    }

    /// Training weight as a percentage of the 1RM (0 when the 1RM is not positive)
    pub fn current_percentage(&self) -> f64 {
        compute_percentage(self.state.training_weight, self.state.one_rep_max)
    }

    /// Whether the training weight sits in the 45–55% band of the 1RM
    pub fn is_in_correct_range(&self) -> bool {
        let (low, high) = self.policy.correct_range_pct;
        let percentage = self.current_percentage();
        percentage >= low && percentage <= high
    }

    /// Rough reps-in-reserve estimate from the last session: 1–3 once the
    /// session reached 15 reps, otherwise 0. Informational only.
    pub fn estimated_reps_in_reserve(&self) -> u32 {
        match self.state.last_session_outcome {
            Some(outcome) if outcome.reps_completed >= self.state.target_rep_range.low => {
                REPS_IN_RESERVE_ANCHOR
                    .saturating_sub(outcome.reps_completed)
                    .clamp(1, MAX_REPS_IN_RESERVE)
            }
            _ => 0,
        }
    }

    /// Replace the 1RM now. See [`update_one_rm_at`](Self::update_one_rm_at).
    pub fn update_one_rm(&mut self, new_one_rm: f64, formula: Formula, is_auto_calculated: bool) {
        self.update_one_rm_at(new_one_rm, formula, is_auto_calculated, Utc::now());
    }

    /// Replace the 1RM and reset the training weight to its rounded BILBO weight
    pub fn update_one_rm_at(
        &mut self,
        new_one_rm: f64,
        formula: Formula,
        is_auto_calculated: bool,
        now: DateTime<Utc>,
    ) {
        self.state.one_rep_max = new_one_rm;
        self.state.training_weight = self.policy.bilbo_weight(new_one_rm);
        self.state.formula = formula;
        self.state.one_rep_max_source = if is_auto_calculated {
            OneRmSource::AutoCalculated { at: now, formula }
        } else {
            OneRmSource::Manual
        };
        self.state.updated_at = now;

        debug!(
            one_rep_max = new_one_rm,
            training_weight = self.state.training_weight,
            formula = formula.as_str(),
            is_auto_calculated,
            "one-rep max updated"
        );
    }

    /// Override the training weight directly (host-side manual edit)
    pub fn set_training_weight(&mut self, weight: f64, now: DateTime<Utc>) {
        self.state.training_weight = weight.max(0.0);
        self.state.updated_at = now;
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.state.notes = notes.into();
    }

    pub fn should_recalculate_one_rm(&self) -> bool {
        self.should_recalculate_one_rm_at(Utc::now())
    }

    /// True when the 1RM was auto-calculated at least 7 whole days before `now`
    pub fn should_recalculate_one_rm_at(&self, now: DateTime<Utc>) -> bool {
        match self.state.one_rep_max_source {
            OneRmSource::AutoCalculated { at, .. } => {
                (now - at).num_days() >= self.policy.recalc_staleness_days
            }
            OneRmSource::Manual => false,
        }
    }

    /// Propose a new 1RM from logged sets.
    ///
    /// Returns the most recent reliable estimate only when it differs from
    /// the current 1RM by more than 5%. Does not modify the tracker.
    pub fn recalculate_from_history(
        &self,
        samples: &[WorkoutSample],
        formula: Formula,
        now: DateTime<Utc>,
    ) -> Option<f64> {
        let usable = usable_samples(samples);
        if usable.is_empty() {
            return None;
        }

        let candidate =
            find_recent_reliable_one_rm(&usable, formula, self.policy.recent_window_days, now);

        let current = self.state.one_rep_max;
        if current <= 0.0 {
            return (candidate > 0.0).then_some(candidate);
        }

        let difference = (candidate - current).abs() / current;
        if difference > self.policy.recalc_change_threshold {
            debug!(current, candidate, difference, "history recalculation proposed");
            Some(candidate)
        } else {
            debug!(current, candidate, difference, "history recalculation within threshold");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap()
    }

    fn tracker(one_rm: f64) -> ProgressionTracker {
        ProgressionTracker::initialize_at(one_rm, OneRmSource::Manual, PolicyConfig::default(), t0())
    }

    #[test]
    fn test_initialize_leaves_weight_unrounded() {
        let tracker = tracker(81.0);
        assert_eq!(tracker.state().training_weight, 40.5);
        assert_eq!(tracker.state().target_rep_range, RepRange { low: 15, high: 50 });
        assert_eq!(tracker.state().last_session_outcome, None);
        assert_eq!(tracker.phase(), TrackingPhase::AwaitingFirstSession);
    }

    #[test]
    fn test_state_round_trips_through_tracker() {
        let mut original = tracker(100.0);
        original.record_session_at(50.0, 18, "", t0());
        original.set_notes("paused reps");

        let state = original.clone().into_state();
        assert_eq!(state.notes, "paused reps");
        assert_eq!(state.training_weight, 52.5);

        let resumed = ProgressionTracker::from_state(state);
        assert_eq!(resumed, original);
        assert_eq!(resumed.policy(), &PolicyConfig::default());
        assert_eq!(resumed.phase(), TrackingPhase::Active);
    }

    #[test]
    fn test_progression_above_threshold() {
        let mut tracker = tracker(100.0);
        assert_eq!(tracker.state().training_weight, 50.0);

        tracker.record_session_at(52.5, 16, "", t0());
        assert_eq!(tracker.state().training_weight, 55.0);
        assert_eq!(
            tracker.state().last_session_outcome.map(|o| o.reps_completed),
            Some(16)
        );
        assert_eq!(tracker.phase(), TrackingPhase::Active);
    }

    #[test]
    fn test_no_progression_at_threshold() {
        let mut tracker = tracker(100.0);
        tracker.record_session_at(50.0, 15, "", t0());
        assert_eq!(tracker.state().training_weight, 50.0);
        assert!(!tracker.should_progress());
    }

    #[test]
    fn test_low_reps_never_decrease_weight() {
        let mut tracker = tracker(100.0);
        tracker.record_session_at(50.0, 4, "", t0());
        assert_eq!(tracker.state().training_weight, 50.0);
        assert_eq!(tracker.suggested_next_weight(), 50.0);
    }

    #[test]
    fn test_progression_snaps_to_increment() {
        let mut tracker = tracker(100.0);
        // 41 + 2.5 = 43.5 -> 43.75
        tracker.record_session_at(41.0, 22, "", t0());
        assert_eq!(tracker.state().training_weight, 43.75);
    }

    #[test]
    fn test_returned_record() {
        let mut tracker = tracker(100.0);
        let record = tracker.record_session_at(50.0, 18, "smooth", t0());
        assert_eq!(record.performed_at, t0());
        assert_eq!(record.weight_used, 50.0);
        assert_eq!(record.reps_completed, 18);
        assert_eq!(record.notes, "smooth");
    }

    #[test]
    fn test_suggested_weight_without_sessions() {
        let tracker = tracker(90.0);
        assert_eq!(tracker.suggested_next_weight(), 45.0);
    }

    #[test]
    fn test_end_to_end_scenario() {
        let mut tracker = tracker(80.0);
        assert_eq!(tracker.state().training_weight, 40.0);

        tracker.record_session_at(40.0, 20, "", t0());
        assert_eq!(tracker.state().training_weight, 42.5);
        assert_eq!(
            tracker.state().last_session_outcome,
            Some(SessionOutcome {
                reps_completed: 20,
                performed_at: t0()
            })
        );

        tracker.record_session_at(42.5, 10, "", t0() + Duration::days(2));
        assert_eq!(tracker.state().training_weight, 42.5);
    }

    #[test]
    fn test_correct_range() {
        let mut tracker = tracker(100.0);
        assert_eq!(tracker.current_percentage(), 50.0);
        assert!(tracker.is_in_correct_range());

        tracker.set_training_weight(60.0, t0());
        assert_eq!(tracker.current_percentage(), 60.0);
        assert!(!tracker.is_in_correct_range());

        tracker.set_training_weight(45.0, t0());
        assert!(tracker.is_in_correct_range());
    }

    #[test]
    fn test_zero_one_rm_percentage() {
        let tracker = tracker(0.0);
        assert_eq!(tracker.current_percentage(), 0.0);
        assert!(!tracker.is_in_correct_range());
    }

    #[test]
    fn test_update_one_rm_rounds() {
        let mut tracker = tracker(80.0);
        tracker.update_one_rm_at(87.0, Formula::Brzycki, false, t0());
        // 43.5 -> 43.75
        assert_eq!(tracker.state().training_weight, 43.75);
        assert_eq!(tracker.state().one_rep_max, 87.0);
        assert_eq!(tracker.state().formula, Formula::Brzycki);
        assert_eq!(tracker.state().one_rep_max_source, OneRmSource::Manual);
    }

    #[test]
    fn test_recalculation_staleness() {
        let mut tracker = tracker(80.0);
        assert!(!tracker.should_recalculate_one_rm_at(t0() + Duration::days(30)));

        tracker.update_one_rm_at(90.0, Formula::Epley, true, t0());
        assert_eq!(
            tracker.state().one_rep_max_source,
            OneRmSource::AutoCalculated {
                at: t0(),
                formula: Formula::Epley
            }
        );
        assert!(!tracker.should_recalculate_one_rm_at(t0() + Duration::days(6)));
        assert!(!tracker.should_recalculate_one_rm_at(t0() + Duration::days(7) - Duration::minutes(1)));
        assert!(tracker.should_recalculate_one_rm_at(t0() + Duration::days(7)));
    }

    #[test]
    fn test_reps_in_reserve() {
        let mut tracker = tracker(100.0);
        assert_eq!(tracker.estimated_reps_in_reserve(), 0);

        tracker.record_session_at(50.0, 15, "", t0());
        assert_eq!(tracker.estimated_reps_in_reserve(), 3);

        tracker.record_session_at(50.0, 19, "", t0());
        assert_eq!(tracker.estimated_reps_in_reserve(), 1);

        tracker.record_session_at(50.0, 30, "", t0());
        assert_eq!(tracker.estimated_reps_in_reserve(), 1);

        tracker.record_session_at(50.0, 10, "", t0());
        assert_eq!(tracker.estimated_reps_in_reserve(), 0);
    }

    #[test]
    fn test_recalculate_from_history_threshold() {
        let tracker = tracker(100.0);
        let now = t0();

        // 80 × 10 Epley = 106.67, a 6.7% change
        let samples = vec![WorkoutSample::new(80.0, 10, now - Duration::days(2))];
        let proposed = tracker.recalculate_from_history(&samples, Formula::Epley, now);
        assert!(proposed.is_some_and(|v| (v - 106.6667).abs() < 0.01));

        // 75 × 10 Epley = 100, no meaningful change
        let samples = vec![WorkoutSample::new(75.0, 10, now - Duration::days(2))];
        assert_eq!(tracker.recalculate_from_history(&samples, Formula::Epley, now), None);
    }

    #[test]
    fn test_recalculate_from_history_ignores_unusable() {
        let tracker = tracker(100.0);
        let samples = vec![
            WorkoutSample::new(0.0, 10, t0()),
            WorkoutSample::new(60.0, 0, t0()),
        ];
        assert_eq!(tracker.recalculate_from_history(&samples, Formula::Epley, t0()), None);
        assert_eq!(tracker.recalculate_from_history(&[], Formula::Epley, t0()), None);
    }

    #[test]
    fn test_custom_policy_threshold() {
        let policy = PolicyConfig {
            progression_rep_threshold: 20,
            ..PolicyConfig::default()
        };
        let mut tracker = ProgressionTracker::initialize_at(100.0, OneRmSource::Manual, policy, t0());
        tracker.record_session_at(50.0, 18, "", t0());
        assert_eq!(tracker.state().training_weight, 50.0);
        tracker.record_session_at(50.0, 21, "", t0());
        assert_eq!(tracker.state().training_weight, 52.5);
    }

    #[test]
    fn test_auto_calculated_seed_records_formula() {
        let source = OneRmSource::AutoCalculated {
            at: t0(),
            formula: Formula::Wathan,
        };
        let tracker = ProgressionTracker::initialize_at(120.0, source, PolicyConfig::default(), t0());
        assert_eq!(tracker.state().formula, Formula::Wathan);
        assert!(tracker.should_recalculate_one_rm_at(t0() + Duration::days(8)));
    }
}
