//! SQLite-backed training store
//!
//! Holds the set history the analyzers read and the engine state they
//! upsert. Every engine table is keyed per user so repeated writes replace
//! rather than duplicate.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

use crate::achievements::{
    default_catalog, AchievementDefinition, Requirement, UnlockedAchievement, UserStats,
};
use crate::error::Result;
use crate::forecast::PrPrediction;
use crate::history::SetHistoryProvider;
use crate::models::{CompletedWorkout, SetRecord};
use crate::recovery::MuscleRecoveryState;
use crate::store::EngineStore;

const SCHEMA: &str = r#"
    PRAGMA journal_mode=WAL;
    PRAGMA synchronous=NORMAL;

    CREATE TABLE IF NOT EXISTS workout_sets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        workout_id TEXT,
        exercise_id TEXT NOT NULL,
        session_date DATE NOT NULL,
        weight REAL NOT NULL,
        reps INTEGER NOT NULL,
        completed BOOLEAN NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_sets_user_exercise_date
        ON workout_sets (user_id, exercise_id, session_date);

    CREATE TABLE IF NOT EXISTS muscle_recovery (
        user_id TEXT NOT NULL,
        muscle_group TEXT NOT NULL,
        last_trained_at DATETIME NOT NULL,
        total_sets INTEGER NOT NULL,
        total_volume REAL NOT NULL,
        recovery_hours REAL NOT NULL,
        PRIMARY KEY (user_id, muscle_group)
    );

    CREATE TABLE IF NOT EXISTS pr_predictions (
        user_id TEXT NOT NULL,
        exercise_id TEXT NOT NULL,
        current_max REAL NOT NULL,
        predicted_max REAL NOT NULL,
        suggested_weight REAL NOT NULL,
        confidence REAL NOT NULL,
        trend TEXT NOT NULL,
        ready_for_pr BOOLEAN NOT NULL,
        data_points INTEGER NOT NULL,
        slope REAL NOT NULL,
        calculated_at DATETIME NOT NULL,
        PRIMARY KEY (user_id, exercise_id)
    );

    CREATE TABLE IF NOT EXISTS user_stats (
        user_id TEXT PRIMARY KEY,
        total_workouts INTEGER NOT NULL,
        total_sets INTEGER NOT NULL,
        total_reps INTEGER NOT NULL,
        total_weight REAL NOT NULL,
        total_prs INTEGER NOT NULL,
        total_duration_minutes INTEGER NOT NULL,
        current_streak INTEGER NOT NULL,
        longest_streak INTEGER NOT NULL,
        last_workout_date DATE NOT NULL,
        total_xp INTEGER NOT NULL,
        current_level INTEGER NOT NULL,
        updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );

    CREATE TABLE IF NOT EXISTS achievements (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL,
        requirement_type TEXT NOT NULL,
        threshold REAL NOT NULL,
        xp_reward INTEGER NOT NULL,
        rarity TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS user_achievements (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        achievement_id TEXT NOT NULL,
        unlocked_at DATETIME NOT NULL,
        UNIQUE (user_id, achievement_id),
        FOREIGN KEY (achievement_id) REFERENCES achievements (id)
    );
"#;

/// Parse a text column through the model type's `FromStr`
fn parse_column<T: FromStr<Err = String>>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Training store persisted in a SQLite database
///
/// Opening a store creates the schema and seeds the default achievement
/// catalog, so a fresh database can unlock achievements straight away.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Create or open a database at the specified path
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path.as_ref())?;
        let store = Self::with_connection(conn)?;
        info!(path = %db_path.as_ref().display(), "Opened training database");
        Ok(store)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        let mut store = SqliteStore { conn };
        store.seed_achievements(&default_catalog())?;
        Ok(store)
    }

    /// Add definitions that are not stored yet; existing ids are left alone
    pub fn seed_achievements(&mut self, definitions: &[AchievementDefinition]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT OR IGNORE INTO achievements (
                    id, name, description, requirement_type, threshold, xp_reward, rarity
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            for def in definitions {
                inserted += stmt.execute(params![
                    def.id,
                    def.name,
                    def.description,
                    def.requirement.kind.as_str(),
                    def.requirement.threshold,
                    def.xp_reward as i64,
                    def.rarity.to_string(),
                ])?;
            }
        }
        tx.commit()?;

        debug!(inserted, "Seeded achievement catalog");
        Ok(inserted)
    }

    /// Append set records to a user's history
    pub fn insert_sets(
        &mut self,
        user_id: &str,
        workout_id: Option<&str>,
        sets: &[SetRecord],
    ) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO workout_sets (
                    user_id, workout_id, exercise_id, session_date, weight, reps, completed
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            for set in sets {
                stmt.execute(params![
                    user_id,
                    workout_id,
                    set.exercise_id,
                    set.session_date,
                    set.weight,
                    set.reps,
                    set.completed,
                ])?;
            }
        }
        tx.commit()?;

        Ok(sets.len())
    }

    /// Append every set of a completed workout to the user's history
    pub fn insert_workout(&mut self, user_id: &str, workout: &CompletedWorkout) -> Result<usize> {
        self.insert_sets(user_id, Some(&workout.id), &workout.set_records())
    }

    /// Number of stored sets for a user
    pub fn set_count(&self, user_id: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM workout_sets WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn set_from_row(row: &Row) -> rusqlite::Result<SetRecord> {
        Ok(SetRecord {
            exercise_id: row.get(0)?,
            session_date: row.get(1)?,
            weight: row.get(2)?,
            reps: row.get(3)?,
            completed: row.get(4)?,
        })
    }

    fn recovery_from_row(row: &Row) -> rusqlite::Result<MuscleRecoveryState> {
        Ok(MuscleRecoveryState {
            muscle_group: parse_column(row, 0)?,
            last_trained_at: row.get(1)?,
            total_sets: row.get(2)?,
            total_volume: row.get(3)?,
            recovery_hours: row.get(4)?,
        })
    }

    fn prediction_from_row(row: &Row) -> rusqlite::Result<PrPrediction> {
        Ok(PrPrediction {
            exercise_id: row.get(0)?,
            current_max: row.get(1)?,
            predicted_max: row.get(2)?,
            suggested_weight: row.get(3)?,
            confidence: row.get(4)?,
            trend: parse_column(row, 5)?,
            ready_for_pr: row.get(6)?,
            data_points: row.get::<_, i64>(7)? as usize,
            slope: row.get(8)?,
            calculated_at: row.get(9)?,
        })
    }

    fn stats_from_row(row: &Row) -> rusqlite::Result<UserStats> {
        Ok(UserStats {
            total_workouts: row.get(0)?,
            total_sets: row.get::<_, i64>(1)? as u64,
            total_reps: row.get::<_, i64>(2)? as u64,
            total_weight: row.get(3)?,
            total_prs: row.get(4)?,
            total_duration_minutes: row.get::<_, i64>(5)? as u64,
            current_streak: row.get(6)?,
            longest_streak: row.get(7)?,
            last_workout_date: row.get(8)?,
            total_xp: row.get::<_, i64>(9)? as u64,
            current_level: row.get(10)?,
        })
    }

    fn definition_from_row(row: &Row) -> rusqlite::Result<AchievementDefinition> {
        Ok(AchievementDefinition {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            requirement: Requirement {
                kind: parse_column(row, 3)?,
                threshold: row.get(4)?,
            },
            xp_reward: row.get::<_, i64>(5)? as u64,
            rarity: parse_column(row, 6)?,
        })
    }
}

impl SetHistoryProvider for SqliteStore {
    fn exercise_sets(
        &self,
        user_id: &str,
        exercise_id: &str,
        since: Option<NaiveDate>,
    ) -> Result<Vec<SetRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT exercise_id, session_date, weight, reps, completed
            FROM workout_sets
            WHERE user_id = ?1 AND exercise_id = ?2 AND (?3 IS NULL OR session_date >= ?3)
            ORDER BY session_date, id
            "#,
        )?;

        let sets = stmt
            .query_map(params![user_id, exercise_id, since], Self::set_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sets)
    }

    fn exercises_trained_since(&self, user_id: &str, since: NaiveDate) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT DISTINCT exercise_id FROM workout_sets
            WHERE user_id = ?1 AND completed = 1 AND session_date >= ?2
            ORDER BY exercise_id
            "#,
        )?;

        let exercises = stmt
            .query_map(params![user_id, since], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(exercises)
    }
}

impl EngineStore for SqliteStore {
    fn recovery_states(&self, user_id: &str) -> Result<Vec<MuscleRecoveryState>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT muscle_group, last_trained_at, total_sets, total_volume, recovery_hours
            FROM muscle_recovery WHERE user_id = ?1
            "#,
        )?;

        let mut states = stmt
            .query_map(params![user_id], Self::recovery_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        states.sort_by_key(|s| s.muscle_group);
        Ok(states)
    }

    fn upsert_recovery_state(&mut self, user_id: &str, state: &MuscleRecoveryState) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO muscle_recovery (
                user_id, muscle_group, last_trained_at, total_sets, total_volume, recovery_hours
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (user_id, muscle_group) DO UPDATE SET
                last_trained_at = excluded.last_trained_at,
                total_sets = excluded.total_sets,
                total_volume = excluded.total_volume,
                recovery_hours = excluded.recovery_hours
            "#,
            params![
                user_id,
                state.muscle_group.as_str(),
                state.last_trained_at,
                state.total_sets,
                state.total_volume,
                state.recovery_hours,
            ],
        )?;
        Ok(())
    }

    fn cached_prediction(&self, user_id: &str, exercise_id: &str) -> Result<Option<PrPrediction>> {
        let prediction = self
            .conn
            .query_row(
                r#"
                SELECT exercise_id, current_max, predicted_max, suggested_weight, confidence,
                       trend, ready_for_pr, data_points, slope, calculated_at
                FROM pr_predictions WHERE user_id = ?1 AND exercise_id = ?2
                "#,
                params![user_id, exercise_id],
                Self::prediction_from_row,
            )
            .optional()?;
        Ok(prediction)
    }

    fn upsert_prediction(&mut self, user_id: &str, prediction: &PrPrediction) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO pr_predictions (
                user_id, exercise_id, current_max, predicted_max, suggested_weight, confidence,
                trend, ready_for_pr, data_points, slope, calculated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT (user_id, exercise_id) DO UPDATE SET
                current_max = excluded.current_max,
                predicted_max = excluded.predicted_max,
                suggested_weight = excluded.suggested_weight,
                confidence = excluded.confidence,
                trend = excluded.trend,
                ready_for_pr = excluded.ready_for_pr,
                data_points = excluded.data_points,
                slope = excluded.slope,
                calculated_at = excluded.calculated_at
            "#,
            params![
                user_id,
                prediction.exercise_id,
                prediction.current_max,
                prediction.predicted_max,
                prediction.suggested_weight,
                prediction.confidence,
                prediction.trend.to_string(),
                prediction.ready_for_pr,
                prediction.data_points as i64,
                prediction.slope,
                prediction.calculated_at,
            ],
        )?;
        Ok(())
    }

    fn user_stats(&self, user_id: &str) -> Result<Option<UserStats>> {
        let stats = self
            .conn
            .query_row(
                r#"
                SELECT total_workouts, total_sets, total_reps, total_weight, total_prs,
                       total_duration_minutes, current_streak, longest_streak,
                       last_workout_date, total_xp, current_level
                FROM user_stats WHERE user_id = ?1
                "#,
                params![user_id],
                Self::stats_from_row,
            )
            .optional()?;
        Ok(stats)
    }

    fn save_user_stats(&mut self, user_id: &str, stats: &UserStats) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT OR REPLACE INTO user_stats (
                user_id, total_workouts, total_sets, total_reps, total_weight, total_prs,
                total_duration_minutes, current_streak, longest_streak, last_workout_date,
                total_xp, current_level, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, CURRENT_TIMESTAMP)
            "#,
            params![
                user_id,
                stats.total_workouts,
                stats.total_sets as i64,
                stats.total_reps as i64,
                stats.total_weight,
                stats.total_prs,
                stats.total_duration_minutes as i64,
                stats.current_streak,
                stats.longest_streak,
                stats.last_workout_date,
                stats.total_xp as i64,
                stats.current_level,
            ],
        )?;
        Ok(())
    }

    fn achievement_definitions(&self) -> Result<Vec<AchievementDefinition>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name, description, requirement_type, threshold, xp_reward, rarity
            FROM achievements ORDER BY rowid
            "#,
        )?;

        let definitions = stmt
            .query_map([], Self::definition_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(definitions)
    }

    fn unlocked_achievements(&self, user_id: &str) -> Result<Vec<UnlockedAchievement>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, achievement_id, user_id, unlocked_at
            FROM user_achievements WHERE user_id = ?1 ORDER BY unlocked_at
            "#,
        )?;

        let unlocks = stmt
            .query_map(params![user_id], |row| {
                Ok(UnlockedAchievement {
                    id: row.get(0)?,
                    achievement_id: row.get(1)?,
                    user_id: row.get(2)?,
                    unlocked_at: row.get::<_, DateTime<Utc>>(3)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(unlocks)
    }

    fn record_unlock(&mut self, unlock: &UnlockedAchievement) -> Result<bool> {
        let inserted = self.conn.execute(
            r#"
            INSERT OR IGNORE INTO user_achievements (id, user_id, achievement_id, unlocked_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![unlock.id, unlock.user_id, unlock.achievement_id, unlock.unlocked_at],
        )?;
        Ok(inserted == 1)
    }
}
