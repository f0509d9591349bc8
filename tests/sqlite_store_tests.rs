use chrono::{DateTime, Duration, TimeZone, Utc};
use liftrs::models::{CompletedWorkout, MuscleGroup, WorkoutSet};
use liftrs::store::EngineStore;
use liftrs::{SqliteStore, TrainingEngine};
use tempfile::TempDir;

/// Engine flows persisted to an on-disk SQLite database

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, day, 17, 30, 0).unwrap()
}

fn deadlift_day(id: &str, completed_at: DateTime<Utc>, weight: f64) -> CompletedWorkout {
    CompletedWorkout {
        id: id.to_string(),
        completed_at,
        duration_minutes: 45,
        personal_records: 1,
        sets: (0..3)
            .map(|_| WorkoutSet {
                exercise_id: "deadlift".to_string(),
                muscle_group: MuscleGroup::Back,
                weight,
                reps: 3,
                completed: true,
            })
            .collect(),
    }
}

fn open(dir: &TempDir) -> SqliteStore {
    SqliteStore::open(dir.path().join("liftrs.db")).unwrap()
}

#[test]
fn test_engine_state_survives_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let mut engine = TrainingEngine::new(open(&dir));
        for (i, weight) in [160.0, 165.0, 170.0, 175.0].into_iter().enumerate() {
            let workout = deadlift_day(&format!("w{i}"), at(2 + 3 * i as u32), weight);
            engine.store_mut().insert_workout("u1", &workout).unwrap();
            engine.complete_workout("u1", &workout).unwrap();
        }
    }

    let mut engine = TrainingEngine::new(open(&dir));
    let stats = engine.stats("u1").unwrap().unwrap();
    assert_eq!(stats.total_workouts, 4);
    assert_eq!(stats.total_sets, 12);
    assert_eq!(stats.total_prs, 4);
    assert_eq!(stats.current_streak, 1);

    let unlocked = engine.store().unlocked_achievements("u1").unwrap();
    let ids: Vec<&str> = unlocked.iter().map(|u| u.achievement_id.as_str()).collect();
    assert!(ids.contains(&"first_workout"));
    assert!(ids.contains(&"first_pr"));

    let statuses = engine.recovery_status("u1", at(11) + Duration::hours(1)).unwrap();
    let back = statuses
        .iter()
        .find(|s| s.muscle_group == MuscleGroup::Back)
        .unwrap();
    assert!(back.last_trained_at.is_some());
    assert!(!back.ready_to_train);

    let prediction = engine.prediction("u1", "deadlift", at(12)).unwrap().unwrap();
    assert_eq!(prediction.data_points, 4);
    assert!(prediction.slope > 0.0);
    assert_eq!(
        engine.store().cached_prediction("u1", "deadlift").unwrap(),
        Some(prediction)
    );
}

#[test]
fn test_duplicate_completion_keeps_single_recovery_row() {
    let dir = TempDir::new().unwrap();
    let mut engine = TrainingEngine::new(open(&dir));

    let workout = deadlift_day("w1", at(5), 150.0);
    engine.complete_workout("u1", &workout).unwrap();
    engine.complete_workout("u1", &workout).unwrap();

    let states = engine.store().recovery_states("u1").unwrap();
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].total_sets, 3);

    let unlocked = engine.store().unlocked_achievements("u1").unwrap();
    assert_eq!(
        unlocked
            .iter()
            .filter(|u| u.achievement_id == "first_workout")
            .count(),
        1
    );
}
