//! Derived statistics over a BILBO session history
//!
//! Histories are caller-owned and may arrive in any order. Every function
//! sorts a copy by `performed_at` and returns a fresh value.

use crate::config::DEFAULT_TARGET_PROGRESS_WINDOW_KG;
use crate::types::{BilboSessionRecord, BilboStats, Improvement, ProgressSeries};
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use std::collections::BTreeMap;

fn chronological(history: &[BilboSessionRecord]) -> Vec<&BilboSessionRecord> {
    let mut sorted: Vec<&BilboSessionRecord> = history.iter().collect();
    sorted.sort_by_key(|s| s.performed_at);
    sorted
}

/// Monday of the ISO week containing `at` (UTC date)
pub fn week_start(at: DateTime<Utc>) -> NaiveDate {
    let date = at.date_naive();
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Totals, averages, maxima and a per-week session count
pub fn bilbo_stats(history: &[BilboSessionRecord]) -> BilboStats {
    if history.is_empty() {
        return BilboStats::default();
    }

    let count = history.len() as f64;
    let mut sessions_by_week: BTreeMap<NaiveDate, u32> = BTreeMap::new();
    for session in history {
        *sessions_by_week.entry(week_start(session.performed_at)).or_insert(0) += 1;
    }

    BilboStats {
        total_sessions: history.len(),
        avg_weight: history.iter().map(|s| s.weight_used).sum::<f64>() / count,
        max_weight: history.iter().map(|s| s.weight_used).fold(0.0, f64::max),
        avg_reps: history.iter().map(|s| s.reps_completed as f64).sum::<f64>() / count,
        max_reps: history.iter().map(|s| s.reps_completed).max().unwrap_or(0),
        total_volume: history.iter().map(BilboSessionRecord::volume).sum(),
        sessions_by_week,
    }
}

/// Progress toward the default 10 kg target over the first session's weight, in [0, 100]
pub fn progress_percentage(history: &[BilboSessionRecord], current_weight: f64) -> f64 {
    progress_percentage_with_window(history, current_weight, DEFAULT_TARGET_PROGRESS_WINDOW_KG)
}

pub fn progress_percentage_with_window(
    history: &[BilboSessionRecord],
    current_weight: f64,
    window_kg: f64,
) -> f64 {
    if window_kg <= 0.0 {
        return 0.0;
    }
    match chronological(history).first() {
        Some(first) => ((current_weight - first.weight_used) / window_kg * 100.0).clamp(0.0, 100.0),
        None => 0.0,
    }
}

/// Change from the first to the last chronological session
pub fn improvement(history: &[BilboSessionRecord]) -> Improvement {
    let sorted = chronological(history);
    let (Some(first), Some(last)) = (sorted.first(), sorted.last()) else {
        return Improvement::default();
    };

    let first_volume = first.volume();
    let volume_increase = last.volume() - first_volume;
    let percentage_improvement = if first_volume > 0.0 {
        volume_increase / first_volume * 100.0
    } else {
        0.0
    };

    Improvement {
        weight_increase: last.weight_used - first.weight_used,
        reps_increase: last.reps_completed as i64 - first.reps_completed as i64,
        volume_increase,
        percentage_improvement,
    }
}

/// Chronological weight, reps and volume points for charting
pub fn progress_series(history: &[BilboSessionRecord]) -> ProgressSeries {
    let sorted = chronological(history);
    ProgressSeries {
        weight: sorted.iter().map(|s| (s.performed_at, s.weight_used)).collect(),
        reps: sorted.iter().map(|s| (s.performed_at, s.reps_completed)).collect(),
        volume: sorted.iter().map(|s| (s.performed_at, s.volume())).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    // 2024-01-01 is a Monday
    fn day(offset: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 7, 30, 0).unwrap() + Duration::days(offset)
    }

    fn session(offset: i64, weight: f64, reps: u32) -> BilboSessionRecord {
        BilboSessionRecord::new(day(offset), weight, reps, "")
    }

    fn approx_eq(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() < tolerance
    }

    #[test]
    fn test_improvement_example() {
        // Out of order on purpose
        let history = vec![session(10, 50.0, 20), session(0, 40.0, 15)];
        let result = improvement(&history);
        assert_eq!(result.weight_increase, 10.0);
        assert_eq!(result.reps_increase, 5);
        assert_eq!(result.volume_increase, 400.0);
        assert!(approx_eq(result.percentage_improvement, 66.6667, 0.001));
    }

    #[test]
    fn test_improvement_single_and_empty() {
        assert_eq!(improvement(&[]), Improvement::default());
        let single = improvement(&[session(0, 40.0, 15)]);
        assert_eq!(single, Improvement::default());
    }

    #[test]
    fn test_improvement_negative_reps() {
        let history = vec![session(0, 40.0, 25), session(3, 42.5, 12)];
        assert_eq!(improvement(&history).reps_increase, -13);
    }

    #[test]
    fn test_improvement_from_zero_volume_start() {
        let history = vec![
            BilboSessionRecord::new(day(0), 0.0, 10, ""),
            session(5, 40.0, 15),
        ];
        let result = improvement(&history);
        assert_eq!(result.percentage_improvement, 0.0);
        assert_eq!(result.volume_increase, 600.0);
        assert!(result.volume_increase.is_finite());
        assert_eq!(result.weight_increase, 40.0);
    }

    #[test]
    fn test_bilbo_stats() {
        let history = vec![
            session(0, 40.0, 20),
            session(2, 42.5, 18),
            session(7, 45.0, 14),
        ];
        let stats = bilbo_stats(&history);
        assert_eq!(stats.total_sessions, 3);
        assert!(approx_eq(stats.avg_weight, 42.5, 1e-9));
        assert_eq!(stats.max_weight, 45.0);
        assert!(approx_eq(stats.avg_reps, 52.0 / 3.0, 1e-9));
        assert_eq!(stats.max_reps, 20);
        assert_eq!(stats.total_volume, 800.0 + 765.0 + 630.0);

        let week1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let week2 = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        assert_eq!(stats.sessions_by_week.get(&week1), Some(&2));
        assert_eq!(stats.sessions_by_week.get(&week2), Some(&1));
    }

    #[test]
    fn test_bilbo_stats_empty() {
        assert_eq!(bilbo_stats(&[]), BilboStats::default());
    }

    #[test]
    fn test_week_start_sunday_belongs_to_previous_monday() {
        // 2024-01-07 is a Sunday
        assert_eq!(week_start(day(6)), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(week_start(day(7)), NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
    }

    #[test]
    fn test_progress_percentage_clamped() {
        let history = vec![session(5, 45.0, 16), session(0, 40.0, 20)];
        assert_eq!(progress_percentage(&history, 45.0), 50.0);
        assert_eq!(progress_percentage(&history, 60.0), 100.0);
        assert_eq!(progress_percentage(&history, 35.0), 0.0);
        assert_eq!(progress_percentage(&[], 45.0), 0.0);
    }

    #[test]
    fn test_progress_percentage_non_positive_window() {
        let history = vec![session(0, 40.0, 20)];
        assert_eq!(progress_percentage_with_window(&history, 45.0, 0.0), 0.0);
        assert_eq!(progress_percentage_with_window(&history, 45.0, -5.0), 0.0);
        assert_eq!(progress_percentage_with_window(&history, 45.0, 20.0), 25.0);
    }

    #[test]
    fn test_progress_series_sorted() {
        let history = vec![session(4, 42.5, 16), session(0, 40.0, 20)];
        let series = progress_series(&history);
        assert_eq!(series.weight, vec![(day(0), 40.0), (day(4), 42.5)]);
        assert_eq!(series.reps, vec![(day(0), 20), (day(4), 16)]);
        assert_eq!(series.volume, vec![(day(0), 800.0), (day(4), 680.0)]);
    }
}
