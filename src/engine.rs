//! Training engine facade
//!
//! Wires the four analyzers to one store. A workout-completed event drives
//! recovery and achievement updates; suggestions and predictions are pulled
//! on demand and read history directly.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::achievements::{AchievementEngine, LevelSummary, UserStats, WorkoutTotals};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::forecast::{PrPrediction, StrengthTrendForecaster};
use crate::models::CompletedWorkout;
use crate::overload::{ProgressionSuggestion, ProgressiveOverloadAnalyzer};
use crate::recovery::{MuscleRecoveryReport, MuscleRecoveryState, MuscleRecoveryTracker};
use crate::store::TrainingStore;

/// Result of processing a completed workout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutCompletion {
    pub workout_id: String,

    /// Recovery state written for each trained muscle group
    pub recovery: Vec<MuscleRecoveryState>,

    /// Lifetime stats after the workout and any unlock XP
    pub stats: UserStats,

    /// Names of achievements unlocked by this workout
    pub unlocked: Vec<String>,
}

/// The four training analyzers bound to one store
pub struct TrainingEngine<S: TrainingStore> {
    store: S,
    recovery: MuscleRecoveryTracker,
    overload: ProgressiveOverloadAnalyzer,
    forecast: StrengthTrendForecaster,
    achievements: AchievementEngine,
}

impl<S: TrainingStore> TrainingEngine<S> {
    /// Create engine with default tunables
    pub fn new(store: S) -> Self {
        Self::with_config(store, &EngineConfig::default())
    }

    pub fn with_config(store: S, config: &EngineConfig) -> Self {
        TrainingEngine {
            store,
            recovery: MuscleRecoveryTracker::with_config(config.recovery.clone()),
            overload: ProgressiveOverloadAnalyzer::with_config(config.overload.clone()),
            forecast: StrengthTrendForecaster::with_config(config.forecast.clone()),
            achievements: AchievementEngine::with_curve(config.achievements.clone()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Handle a workout-completed event
    ///
    /// The workout's sets are expected to be in the store's history already;
    /// the engine never writes history.
    pub fn complete_workout(
        &mut self,
        user_id: &str,
        workout: &CompletedWorkout,
    ) -> Result<WorkoutCompletion> {
        let now = workout.completed_at;

        let recovery = self.recovery.update(&mut self.store, user_id, workout, now)?;

        let totals = WorkoutTotals::from_workout(workout);
        let recorded = self
            .achievements
            .record_workout(&mut self.store, user_id, &totals, now.date_naive())?;

        let unlocked = self
            .achievements
            .check_and_unlock_achievements(&mut self.store, user_id, now)?;

        let stats = if unlocked.is_empty() {
            recorded
        } else {
            self.store.user_stats(user_id)?.unwrap_or(recorded)
        };

        info!(
            user_id,
            workout_id = %workout.id,
            unlocked = unlocked.len(),
            level = stats.current_level,
            "Workout completion processed"
        );

        Ok(WorkoutCompletion {
            workout_id: workout.id.clone(),
            recovery,
            stats,
            unlocked,
        })
    }

    /// Recovery of every muscle group at `now`
    pub fn recovery_status(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<MuscleRecoveryReport>> {
        self.recovery.get_status(&self.store, user_id, now)
    }

    /// Muscle groups ready to train at `now`
    pub fn suggested_muscles(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<MuscleRecoveryReport>> {
        let statuses = self.recovery_status(user_id, now)?;
        Ok(MuscleRecoveryTracker::get_suggested_muscles(&statuses))
    }

    pub fn suggestion(&self, user_id: &str, exercise_id: &str) -> Result<Option<ProgressionSuggestion>> {
        self.overload.suggest(&self.store, user_id, exercise_id)
    }

    pub fn suggestions(&self, user_id: &str, today: NaiveDate) -> Result<Vec<ProgressionSuggestion>> {
        self.overload.get_all_suggestions(&self.store, user_id, today)
    }

    pub fn prediction(
        &mut self,
        user_id: &str,
        exercise_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PrPrediction>> {
        self.forecast.predict(&mut self.store, user_id, exercise_id, now)
    }

    pub fn predictions(&mut self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<PrPrediction>> {
        self.forecast.predict_all(&mut self.store, user_id, now)
    }

    pub fn stats(&self, user_id: &str) -> Result<Option<UserStats>> {
        self.store.user_stats(user_id)
    }

    /// Level, title and progress; `None` before the first workout
    pub fn level_summary(&self, user_id: &str) -> Result<Option<LevelSummary>> {
        Ok(self
            .stats(user_id)?
            .map(|stats| self.achievements.level_summary(&stats)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MuscleGroup, SetRecord, Trend, WorkoutSet};
    use crate::recovery::RecoveryStatus;
    use crate::store::InMemoryStore;
    use chrono::{Duration, TimeZone};

    fn leg_day(id: &str, at: DateTime<Utc>, sets: usize) -> CompletedWorkout {
        CompletedWorkout {
            id: id.to_string(),
            completed_at: at,
            duration_minutes: 60,
            personal_records: 0,
            sets: (0..sets)
                .map(|_| WorkoutSet {
                    exercise_id: "squat".to_string(),
                    muscle_group: MuscleGroup::Legs,
                    weight: 100.0,
                    reps: 5,
                    completed: true,
                })
                .collect(),
        }
    }

    #[test]
    fn test_complete_workout_updates_recovery_and_stats() {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 18, 0, 0).unwrap();
        let workout = leg_day("w1", at, 12);

        let mut store = InMemoryStore::new();
        store.add_workout("u1", &workout);
        let mut engine = TrainingEngine::new(store);

        let completion = engine.complete_workout("u1", &workout).unwrap();
        assert_eq!(completion.recovery.len(), 1);
        assert_eq!(completion.recovery[0].muscle_group, MuscleGroup::Legs);
        assert_eq!(completion.stats.total_workouts, 1);
        assert_eq!(completion.stats.total_sets, 12);
        assert_eq!(completion.unlocked, vec!["First Steps".to_string()]);
        assert_eq!(completion.stats.total_xp, 50);

        let statuses = engine.recovery_status("u1", at + Duration::hours(1)).unwrap();
        let legs = statuses
            .iter()
            .find(|s| s.muscle_group == MuscleGroup::Legs)
            .unwrap();
        assert_eq!(legs.status, RecoveryStatus::Fatigued);
        assert!(!legs.ready_to_train);

        let ready = engine.suggested_muscles("u1", at + Duration::hours(1)).unwrap();
        assert!(ready.iter().all(|s| s.muscle_group != MuscleGroup::Legs));
    }

    #[test]
    fn test_custom_config_reaches_every_analyzer() {
        let mut config = EngineConfig::default();
        config.forecast.slope_threshold = 10.0;
        config.recovery.base_hours.legs = 24.0;
        config.achievements.scale = 10.0;

        let mut store = InMemoryStore::new();
        store.add_sets(
            "u1",
            (0..5u32).map(|i| SetRecord {
                exercise_id: "squat".to_string(),
                session_date: NaiveDate::from_ymd_opt(2024, 6, 1 + i * 3).unwrap(),
                weight: 100.0 + 5.0 * f64::from(i),
                reps: 1,
                completed: true,
            }),
        );

        let mut stock = TrainingEngine::new(store.clone());
        let mut tuned = TrainingEngine::with_config(store, &config);
        let now = Utc.with_ymd_and_hms(2024, 6, 20, 12, 0, 0).unwrap();

        let improving = stock.prediction("u1", "squat", now).unwrap().unwrap();
        assert_eq!(improving.trend, Trend::Improving);
        assert!(improving.ready_for_pr);

        let flat = tuned.prediction("u1", "squat", now).unwrap().unwrap();
        assert_eq!(flat.trend, Trend::Plateau);
        assert!(!flat.ready_for_pr);

        let at = Utc.with_ymd_and_hms(2024, 6, 20, 18, 0, 0).unwrap();
        let completion = tuned.complete_workout("u1", &leg_day("w1", at, 12)).unwrap();
        assert_eq!(completion.recovery[0].recovery_hours, 24.0);
        assert_eq!(completion.stats.total_xp, 50);
        assert_eq!(completion.stats.current_level, 3);
    }

    #[test]
    fn test_level_summary_absent_before_first_workout() {
        let engine = TrainingEngine::new(InMemoryStore::new());
        assert_eq!(engine.level_summary("nobody").unwrap(), None);
        assert!(engine.stats("nobody").unwrap().is_none());
    }
}
