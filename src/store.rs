//! Persistence boundary for engine-owned state
//!
//! The engine owns only a small amount of state: recovery windows, cached
//! PR predictions, lifetime stats and achievement unlocks. Writes are
//! upserts keyed per user so a double-submitted workout completion is
//! last-writer-wins rather than a duplicate.

use chrono::NaiveDate;
use std::collections::HashMap;

use crate::achievements::{default_catalog, AchievementDefinition, UnlockedAchievement, UserStats};
use crate::error::Result;
use crate::forecast::PrPrediction;
use crate::history::SetHistoryProvider;
use crate::models::{CompletedWorkout, MuscleGroup, SetRecord};
use crate::recovery::MuscleRecoveryState;

/// Storage for the state the engine upserts
pub trait EngineStore {
    /// Every stored recovery state of a user
    fn recovery_states(&self, user_id: &str) -> Result<Vec<MuscleRecoveryState>>;

    /// Insert or replace the state keyed on (user, muscle group)
    fn upsert_recovery_state(&mut self, user_id: &str, state: &MuscleRecoveryState) -> Result<()>;

    fn cached_prediction(&self, user_id: &str, exercise_id: &str) -> Result<Option<PrPrediction>>;

    /// Insert or replace the prediction keyed on (user, exercise)
    fn upsert_prediction(&mut self, user_id: &str, prediction: &PrPrediction) -> Result<()>;

    fn user_stats(&self, user_id: &str) -> Result<Option<UserStats>>;

    fn save_user_stats(&mut self, user_id: &str, stats: &UserStats) -> Result<()>;

    fn achievement_definitions(&self) -> Result<Vec<AchievementDefinition>>;

    fn unlocked_achievements(&self, user_id: &str) -> Result<Vec<UnlockedAchievement>>;

    /// Store an unlock; returns false when the user already holds that achievement
    fn record_unlock(&mut self, unlock: &UnlockedAchievement) -> Result<bool>;
}

/// A collaborator that serves both set history and engine state
pub trait TrainingStore: SetHistoryProvider + EngineStore {}

impl<T: SetHistoryProvider + EngineStore> TrainingStore for T {}

/// In-process store, used by tests and by applications that keep their own persistence
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    sets: HashMap<String, Vec<SetRecord>>,
    recovery: HashMap<(String, MuscleGroup), MuscleRecoveryState>,
    predictions: HashMap<(String, String), PrPrediction>,
    stats: HashMap<String, UserStats>,
    definitions: Vec<AchievementDefinition>,
    unlocks: Vec<UnlockedAchievement>,
}

impl InMemoryStore {
    /// Empty store seeded with the default achievement catalog
    pub fn new() -> Self {
        Self::with_definitions(default_catalog())
    }

    pub fn with_definitions(definitions: Vec<AchievementDefinition>) -> Self {
        InMemoryStore {
            sets: HashMap::new(),
            recovery: HashMap::new(),
            predictions: HashMap::new(),
            stats: HashMap::new(),
            definitions,
            unlocks: Vec::new(),
        }
    }

    /// Append raw set records to a user's history
    pub fn add_sets(&mut self, user_id: &str, sets: impl IntoIterator<Item = SetRecord>) {
        self.sets.entry(user_id.to_string()).or_default().extend(sets);
    }

    /// Append every set of a workout to a user's history
    pub fn add_workout(&mut self, user_id: &str, workout: &CompletedWorkout) {
        self.add_sets(user_id, workout.set_records());
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SetHistoryProvider for InMemoryStore {
    fn exercise_sets(
        &self,
        user_id: &str,
        exercise_id: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<SetRecord>> {
        Ok(self
            .sets
            .get(user_id)
            .map(|sets| {
                sets.iter()
                    .filter(|s| s.exercise_id == exercise_id)
                    .filter(|s| since.map_or(true, |since| s.session_date >= since))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn exercises_trained_since(&self, user_id: &str, since: NaiveDate) -> Result<Vec<String>> {
        let mut exercises: Vec<String> = self
            .sets
            .get(user_id)
            .map(|sets| {
                sets.iter()
                    .filter(|s| s.completed && s.session_date >= since)
                    .map(|s| s.exercise_id.clone())
                    .collect()
            })
            .unwrap_or_default();

        exercises.sort();
        exercises.dedup();
        Ok(exercises)
    }
}

impl EngineStore for InMemoryStore {
    fn recovery_states(&self, user_id: &str) -> Result<Vec<MuscleRecoveryState>> {
        let mut states: Vec<MuscleRecoveryState> = self
            .recovery
            .iter()
            .filter(|((user, _), _)| user == user_id)
            .map(|(_, state)| state.clone())
            .collect();
        states.sort_by_key(|s| s.muscle_group);
        Ok(states)
    }

    fn upsert_recovery_state(&mut self, user_id: &str, state: &MuscleRecoveryState) -> Result<()> {
        self.recovery
            .insert((user_id.to_string(), state.muscle_group), state.clone());
        Ok(())
    }

    fn cached_prediction(&self, user_id: &str, exercise_id: &str) -> Result<Option<PrPrediction>> {
        Ok(self
            .predictions
            .get(&(user_id.to_string(), exercise_id.to_string()))
            .cloned())
    }

    fn upsert_prediction(&mut self, user_id: &str, prediction: &PrPrediction) -> Result<()> {
        self.predictions.insert(
            (user_id.to_string(), prediction.exercise_id.clone()),
            prediction.clone(),
        );
        Ok(())
    }

    fn user_stats(&self, user_id: &str) -> Result<Option<UserStats>> {
        Ok(self.stats.get(user_id).cloned())
    }

    fn save_user_stats(&mut self, user_id: &str, stats: &UserStats) -> Result<()> {
        self.stats.insert(user_id.to_string(), stats.clone());
        Ok(())
    }

    fn achievement_definitions(&self) -> Result<Vec<AchievementDefinition>> {
        Ok(self.definitions.clone())
    }

    fn unlocked_achievements(&self, user_id: &str) -> Result<Vec<UnlockedAchievement>> {
        Ok(self
            .unlocks
            .iter()
            .filter(|u| u.user_id == user_id)
            .cloned()
            .collect())
    }

    fn record_unlock(&mut self, unlock: &UnlockedAchievement) -> Result<bool> {
        let exists = self.unlocks.iter().any(|u| {
            u.user_id == unlock.user_id && u.achievement_id == unlock.achievement_id
        });
        if exists {
            return Ok(false);
        }
        self.unlocks.push(unlock.clone());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(exercise: &str, day: u32, completed: bool) -> SetRecord {
        SetRecord {
            exercise_id: exercise.to_string(),
            session_date: NaiveDate::from_ymd_opt(2024, 7, day).unwrap(),
            weight: 50.0,
            reps: 10,
            completed,
        }
    }

    #[test]
    fn test_history_is_scoped_per_user() {
        let mut store = InMemoryStore::new();
        store.add_sets("a", vec![record("row", 1, true)]);
        store.add_sets("b", vec![record("row", 2, true), record("curl", 2, true)]);

        assert_eq!(store.exercise_sets("a", "row", None).unwrap().len(), 1);
        assert!(store.exercise_sets("a", "curl", None).unwrap().is_empty());
        assert_eq!(
            store
                .exercises_trained_since("b", NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())
                .unwrap(),
            vec!["curl".to_string(), "row".to_string()]
        );
    }

    #[test]
    fn test_trained_since_ignores_incomplete_and_old_sets() {
        let mut store = InMemoryStore::new();
        store.add_sets(
            "a",
            vec![record("row", 1, true), record("press", 20, false), record("dip", 20, true)],
        );

        let since = NaiveDate::from_ymd_opt(2024, 7, 10).unwrap();
        assert_eq!(store.exercises_trained_since("a", since).unwrap(), vec!["dip".to_string()]);
        assert_eq!(store.exercise_sets("a", "row", Some(since)).unwrap().len(), 0);
    }

    #[test]
    fn test_recovery_upsert_is_idempotent() {
        let mut store = InMemoryStore::new();
        let state = MuscleRecoveryState {
            muscle_group: MuscleGroup::Back,
            last_trained_at: Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap(),
            total_sets: 12,
            total_volume: 5000.0,
            recovery_hours: 72.0,
        };

        store.upsert_recovery_state("a", &state).unwrap();
        store.upsert_recovery_state("a", &state).unwrap();
        assert_eq!(store.recovery_states("a").unwrap(), vec![state]);
        assert!(store.recovery_states("b").unwrap().is_empty());
    }

    #[test]
    fn test_unlock_recorded_once() {
        let mut store = InMemoryStore::new();
        let unlock = UnlockedAchievement::new(
            "a",
            "first_workout",
            Utc.with_ymd_and_hms(2024, 7, 1, 9, 0, 0).unwrap(),
        );

        assert!(store.record_unlock(&unlock).unwrap());
        assert!(!store.record_unlock(&unlock).unwrap());
        assert_eq!(store.unlocked_achievements("a").unwrap().len(), 1);
    }
}
