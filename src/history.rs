//! Read-only access to a user's completed-set history
//!
//! Storage and querying of workouts belong to the surrounding application;
//! the engine only sees this trait. `InMemoryStore` and `SqliteStore`
//! provide implementations.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::error::Result;
use crate::models::{SessionAggregate, SetRecord};

/// Supplier of logged sets for a user
pub trait SetHistoryProvider {
    /// All logged sets of one exercise dated on or after `since` (all history when `None`)
    fn exercise_sets(
        &self,
        user_id: &str,
        exercise_id: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<SetRecord>>;

    /// Distinct exercises with at least one completed set on or after `since`
    fn exercises_trained_since(&self, user_id: &str, since: NaiveDate) -> Result<Vec<String>>;
}

/// Group completed, weighted sets into per-date sessions, oldest first
///
/// Sets that are not completed or carry no load are ignored; a date with no
/// qualifying set produces no session.
pub fn aggregate_sessions(sets: &[SetRecord]) -> Vec<SessionAggregate> {
    let mut by_date: BTreeMap<NaiveDate, Vec<&SetRecord>> = BTreeMap::new();

    for set in sets.iter().filter(|s| s.is_completed_weighted()) {
        by_date.entry(set.session_date).or_default().push(set);
    }

    by_date
        .into_iter()
        .map(|(date, day_sets)| {
            let count = day_sets.len() as f64;
            let total_weight: f64 = day_sets.iter().map(|s| s.weight).sum();
            let total_reps: f64 = day_sets.iter().map(|s| f64::from(s.reps)).sum();
            let max_weight = day_sets.iter().map(|s| s.weight).fold(0.0, f64::max);

            SessionAggregate {
                exercise_id: day_sets[0].exercise_id.clone(),
                date,
                avg_weight: total_weight / count,
                max_weight,
                avg_reps: total_reps / count,
                total_volume: day_sets.iter().map(|s| s.volume()).sum(),
                set_count: day_sets.len(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(date: (i32, u32, u32), weight: f64, reps: u32, completed: bool) -> SetRecord {
        SetRecord {
            exercise_id: "squat".to_string(),
            session_date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            weight,
            reps,
            completed,
        }
    }

    #[test]
    fn test_sessions_grouped_by_date_oldest_first() {
        let sets = vec![
            set((2024, 5, 3), 100.0, 5, true),
            set((2024, 5, 1), 90.0, 8, true),
            set((2024, 5, 1), 95.0, 6, true),
        ];

        let sessions = aggregate_sessions(&sets);
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(sessions[0].max_weight, 95.0);
        assert_eq!(sessions[0].avg_weight, 92.5);
        assert_eq!(sessions[0].avg_reps, 7.0);
        assert_eq!(sessions[0].total_volume, 90.0 * 8.0 + 95.0 * 6.0);
        assert_eq!(sessions[0].set_count, 2);
        assert_eq!(sessions[1].total_volume, 500.0);
    }

    #[test]
    fn test_incomplete_and_unloaded_sets_ignored() {
        let sets = vec![
            set((2024, 5, 1), 100.0, 5, false),
            set((2024, 5, 2), 0.0, 20, true),
            set((2024, 5, 3), 60.0, 10, true),
        ];

        let sessions = aggregate_sessions(&sets);
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].date, NaiveDate::from_ymd_opt(2024, 5, 3).unwrap());
    }

    #[test]
    fn test_no_sets_no_sessions() {
        assert!(aggregate_sessions(&[]).is_empty());
    }
}
