//! One-rep-max selection and shared arithmetic
//!
//! This module picks a 1RM estimate out of a history of logged sets and
//! provides the rounding and percentage helpers the progression engine uses.
//! Every function is total: degenerate input yields `0.0` (or an empty
//! aggregate), never an error. The `*_checked` variants wrap that sentinel in
//! an [`Estimate`] for callers that need to tell "no data" apart.

use crate::config::{BILBO_PERCENTAGE, DEFAULT_RECENT_WINDOW_DAYS, DEFAULT_ROUNDING_INCREMENT};
use crate::formulas::{estimate_one_rm, Formula};
use crate::types::{Estimate, WorkoutSample, WorkoutStats, MAX_PLAUSIBLE_REPS, MAX_PLAUSIBLE_WEIGHT_KG};
use chrono::{DateTime, Duration, Utc};

/// Tolerance around the BILBO weight, as a fraction of it
const BILBO_WEIGHT_TOLERANCE: f64 = 0.1;

/// Highest single-set estimate across all samples; 0 for an empty history
pub fn find_best_one_rm(samples: &[WorkoutSample], formula: Formula) -> f64 {
    samples
        .iter()
        .map(|s| estimate_one_rm(s.weight, s.reps, formula))
        .fold(0.0, f64::max)
}

/// Most recent reliable 1RM estimate.
///
/// Samples performed within `max_days_back` days of `now` are trusted first:
/// the one with the highest `weight × reps` is used for the estimate (the
/// earliest in input order wins a tie). When no sample is recent, falls back
/// to [`find_best_one_rm`] over the whole history so an old record still
/// reports a value.
pub fn find_recent_reliable_one_rm(
    samples: &[WorkoutSample],
    formula: Formula,
    max_days_back: i64,
    now: DateTime<Utc>,
) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    // A window reaching past the representable range covers every sample
    let cutoff = Duration::try_days(max_days_back).and_then(|d| now.checked_sub_signed(d));
    let best_recent = samples
        .iter()
        .filter(|s| cutoff.map_or(true, |c| s.performed_at >= c))
        .fold(None::<&WorkoutSample>, |best, s| match best {
            Some(b) if b.volume() >= s.volume() => Some(b),
            _ => Some(s),
        });

    match best_recent {
        Some(sample) => estimate_one_rm(sample.weight, sample.reps, formula),
        None => find_best_one_rm(samples, formula),
    }
}

/// [`find_recent_reliable_one_rm`] against the wall clock with the default window
pub fn find_recent_reliable_one_rm_now(samples: &[WorkoutSample], formula: Formula) -> f64 {
    find_recent_reliable_one_rm(samples, formula, DEFAULT_RECENT_WINDOW_DAYS, Utc::now())
}

/// Round to the nearest multiple of `increment`; `increment <= 0` is a passthrough
pub fn round_to_increment(value: f64, increment: f64) -> f64 {
    if increment <= 0.0 {
        return value;
    }
    (value / increment).round() * increment
}

/// BILBO training weight: 50% of the 1RM snapped to 1.25 kg
pub fn calculate_bilbo_weight(one_rm: f64) -> f64 {
    round_to_increment(one_rm * BILBO_PERCENTAGE, DEFAULT_ROUNDING_INCREMENT)
}

/// Whether `weight` is within 10% of the BILBO weight for `one_rm`
pub fn is_appropriate_bilbo_weight(weight: f64, one_rm: f64) -> bool {
    is_within_bilbo_tolerance(weight, calculate_bilbo_weight(one_rm))
}

/// Whether `weight` is within 10% of an already computed BILBO weight
pub fn is_within_bilbo_tolerance(weight: f64, bilbo_weight: f64) -> bool {
    (weight - bilbo_weight).abs() <= bilbo_weight * BILBO_WEIGHT_TOLERANCE
}

/// `weight` as a percentage of `one_rm`; 0 when the 1RM is not positive
pub fn compute_percentage(weight: f64, one_rm: f64) -> f64 {
    if one_rm <= 0.0 {
        return 0.0;
    }
    (weight / one_rm) * 100.0
}

/// Plausibility check for a logged set
pub fn validate_workout_data(weight: f64, reps: u32) -> bool {
    weight > 0.0 && reps > 0 && reps <= MAX_PLAUSIBLE_REPS && weight <= MAX_PLAUSIBLE_WEIGHT_KG
}

/// Max weight, max reps, count and latest timestamp over a set of samples
pub fn aggregate_stats(samples: &[WorkoutSample]) -> WorkoutStats {
    if samples.is_empty() {
        return WorkoutStats::default();
    }

    WorkoutStats {
        max_weight: samples.iter().map(|s| s.weight).fold(0.0, f64::max),
        max_reps: samples.iter().map(|s| s.reps).max().unwrap_or(0),
        session_count: samples.len(),
        last_session_at: samples.iter().map(|s| s.performed_at).max(),
    }
}

/// Keep only samples that can feed an estimate
pub fn usable_samples(samples: &[WorkoutSample]) -> Vec<WorkoutSample> {
    samples.iter().filter(|s| s.is_usable()).cloned().collect()
}

pub fn estimate_one_rm_checked(weight: f64, reps: u32, formula: Formula) -> Estimate {
    Estimate::from_sentinel(estimate_one_rm(weight, reps, formula))
}

pub fn find_best_one_rm_checked(samples: &[WorkoutSample], formula: Formula) -> Estimate {
    Estimate::from_sentinel(find_best_one_rm(samples, formula))
}

pub fn find_recent_reliable_one_rm_checked(
    samples: &[WorkoutSample],
    formula: Formula,
    max_days_back: i64,
    now: DateTime<Utc>,
) -> Estimate {
    Estimate::from_sentinel(find_recent_reliable_one_rm(
        samples,
        formula,
        max_days_back,
        now,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 18, 0, 0).unwrap()
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        now() - Duration::days(days)
    }

    fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    #[test]
    fn test_best_one_rm_picks_max() {
        let samples = vec![
            WorkoutSample::new(100.0, 5, days_ago(40)),
            WorkoutSample::new(90.0, 10, days_ago(2)),
            WorkoutSample::new(60.0, 20, days_ago(1)),
        ];
        // Epley: 116.67, 120.0, 100.0
        assert!(approx_eq(find_best_one_rm(&samples, Formula::Epley), 120.0, 1e-9));
    }

    #[test]
    fn test_empty_history_is_zero() {
        assert_eq!(find_best_one_rm(&[], Formula::Epley), 0.0);
        assert_eq!(
            find_recent_reliable_one_rm(&[], Formula::Epley, 30, now()),
            0.0
        );
        assert_eq!(find_best_one_rm_checked(&[], Formula::Wathan), Estimate::NoData);
    }

    #[test]
    fn test_recent_uses_highest_volume_not_highest_estimate() {
        let samples = vec![
            // Old personal record
            WorkoutSample::new(140.0, 3, days_ago(90)),
            // Recent: 80×5 = 400 volume, 60×12 = 720 volume
            WorkoutSample::new(80.0, 5, days_ago(10)),
            WorkoutSample::new(60.0, 12, days_ago(3)),
        ];
        let result = find_recent_reliable_one_rm(&samples, Formula::Epley, 30, now());
        // 60 × (1 + 12/30) = 84
        assert!(approx_eq(result, 84.0, 1e-9));
    }

    #[test]
    fn test_recent_falls_back_to_best_ever() {
        let samples = vec![
            WorkoutSample::new(100.0, 5, days_ago(60)),
            WorkoutSample::new(110.0, 3, days_ago(45)),
        ];
        let recent = find_recent_reliable_one_rm(&samples, Formula::Brzycki, 30, now());
        let best = find_best_one_rm(&samples, Formula::Brzycki);
        assert_eq!(recent, best);
        assert!(recent > 0.0);
    }

    #[test]
    fn test_recent_window_boundary_is_inclusive() {
        let samples = vec![
            WorkoutSample::new(50.0, 10, days_ago(30)),
            WorkoutSample::new(200.0, 1, days_ago(31)),
        ];
        // The 30-day-old sample is still recent, so the heavy old single is ignored
        let result = find_recent_reliable_one_rm(&samples, Formula::OConnor, 30, now());
        assert!(approx_eq(result, 62.5, 1e-9));
    }

    #[test]
    fn test_recent_tie_keeps_first() {
        let samples = vec![
            WorkoutSample::new(50.0, 10, days_ago(5)),
            WorkoutSample::new(100.0, 5, days_ago(2)),
        ];
        // Both have volume 500; the first one is used
        let result = find_recent_reliable_one_rm(&samples, Formula::Epley, 30, now());
        assert!(approx_eq(result, 50.0 * (1.0 + 10.0 / 30.0), 1e-9));
    }

    #[test]
    fn test_recent_window_beyond_range_covers_everything() {
        let samples = vec![
            WorkoutSample::new(140.0, 3, days_ago(3000)),
            WorkoutSample::new(60.0, 12, days_ago(3)),
        ];
        // 60×12 has the highest volume once both samples count as recent
        let result = find_recent_reliable_one_rm(&samples, Formula::Epley, i64::MAX, now());
        assert!(approx_eq(result, 84.0, 1e-9));
        let result = find_recent_reliable_one_rm(&samples, Formula::Epley, i64::MIN, now());
        assert!(result > 0.0);
    }

    #[test]
    fn test_recent_against_wall_clock() {
        let samples = vec![
            WorkoutSample::new(140.0, 3, Utc::now() - Duration::days(400)),
            WorkoutSample::new(60.0, 12, Utc::now()),
        ];
        let result = find_recent_reliable_one_rm_now(&samples, Formula::Epley);
        assert!(approx_eq(result, 84.0, 1e-9));
    }

    #[test]
    fn test_round_to_increment() {
        assert_eq!(round_to_increment(51.0, 1.25), 51.25);
        assert_eq!(round_to_increment(50.6, 1.25), 50.0);
        assert_eq!(round_to_increment(42.5, 2.5), 42.5);
        assert_eq!(round_to_increment(43.0, 0.0), 43.0);
        assert_eq!(round_to_increment(43.0, -1.0), 43.0);
    }

    #[test]
    fn test_round_to_increment_idempotent() {
        for i in 0..400 {
            let x = i as f64 * 0.37;
            for inc in [1.25, 2.5, 0.5] {
                let once = round_to_increment(x, inc);
                assert_eq!(round_to_increment(once, inc), once);
            }
        }
    }

    #[test]
    fn test_bilbo_weight_multiple_of_increment() {
        for i in 0..500 {
            let one_rm = i as f64 * 0.83;
            let weight = calculate_bilbo_weight(one_rm);
            let steps = weight / 1.25;
            assert!(approx_eq(steps, steps.round(), 1e-9), "{one_rm} -> {weight}");
            assert!(weight >= 0.0);
        }
        assert_eq!(calculate_bilbo_weight(100.0), 50.0);
        assert_eq!(calculate_bilbo_weight(85.0), 42.5);
    }

    #[test]
    fn test_appropriate_bilbo_weight() {
        // BILBO weight for 100 is 50, tolerance 5
        assert!(is_appropriate_bilbo_weight(50.0, 100.0));
        assert!(is_appropriate_bilbo_weight(55.0, 100.0));
        assert!(!is_appropriate_bilbo_weight(56.0, 100.0));
    }

    #[test]
    fn test_compute_percentage() {
        assert_eq!(compute_percentage(50.0, 100.0), 50.0);
        assert_eq!(compute_percentage(50.0, 0.0), 0.0);
        assert_eq!(compute_percentage(50.0, -10.0), 0.0);
    }

    #[test]
    fn test_validate_workout_data() {
        assert!(validate_workout_data(60.0, 12));
        assert!(!validate_workout_data(0.0, 12));
        assert!(!validate_workout_data(60.0, 0));
        assert!(!validate_workout_data(60.0, 51));
        assert!(!validate_workout_data(201.0, 1));
    }

    #[test]
    fn test_aggregate_stats() {
        let samples = vec![
            WorkoutSample::new(60.0, 12, days_ago(3)),
            WorkoutSample::new(80.0, 5, days_ago(1)),
            WorkoutSample::new(70.0, 8, days_ago(7)),
        ];
        let stats = aggregate_stats(&samples);
        assert_eq!(
            stats,
            WorkoutStats {
                max_weight: 80.0,
                max_reps: 12,
                session_count: 3,
                last_session_at: Some(days_ago(1)),
            }
        );
        assert_eq!(aggregate_stats(&[]), WorkoutStats::default());
    }

    #[test]
    fn test_usable_samples_filters_degenerate_rows() {
        let samples = vec![
            WorkoutSample::new(60.0, 12, days_ago(3)),
            WorkoutSample::new(0.0, 5, days_ago(2)),
            WorkoutSample::new(40.0, 0, days_ago(1)),
        ];
        assert_eq!(usable_samples(&samples).len(), 1);
    }

    #[test]
    fn test_checked_variants() {
        assert_eq!(estimate_one_rm_checked(0.0, 5, Formula::Epley), Estimate::NoData);
        assert!(estimate_one_rm_checked(100.0, 5, Formula::Epley).is_available());
        let samples = vec![WorkoutSample::new(100.0, 1, days_ago(1))];
        assert_eq!(
            find_recent_reliable_one_rm_checked(&samples, Formula::Brzycki, 30, now()),
            Estimate::Value(100.0)
        );
    }
}
