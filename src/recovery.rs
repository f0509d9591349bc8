//! Muscle group recovery tracking
//!
//! Each muscle group carries a recovery window in hours. Finishing a workout
//! resets the window for every group it trained, sized by how many completed
//! sets hit that group. Reading the state is lazy: recovery percent is the
//! elapsed share of the window at read time, so no background decay job is
//! needed.
//!
//! # Volume adjustment
//!
//! | Completed sets | Recovery window        |
//! |----------------|------------------------|
//! | ≥ 20           | base + 24 h            |
//! | ≥ 15           | base + 12 h            |
//! | ≥ 10           | base                   |
//! | < 10           | base − 12 h            |
//!
//! A group with no stored state is reported fully recovered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::Result;
use crate::formulas::round_dp;
use crate::models::{CompletedWorkout, MuscleGroup};
use crate::store::EngineStore;

/// Recovery status bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecoveryStatus {
    /// Window fully elapsed
    Recovered,
    /// At least half the window elapsed
    Recovering,
    /// Less than half the window elapsed
    Fatigued,
}

impl fmt::Display for RecoveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryStatus::Recovered => write!(f, "recovered"),
            RecoveryStatus::Recovering => write!(f, "recovering"),
            RecoveryStatus::Fatigued => write!(f, "fatigued"),
        }
    }
}

/// Stored per-user, per-group recovery state (upserted on workout completion)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuscleRecoveryState {
    pub muscle_group: MuscleGroup,

    /// When the group was last trained
    pub last_trained_at: DateTime<Utc>,

    /// Completed sets in the most recent session that trained the group
    pub total_sets: u32,

    /// Σ weight × reps over those sets
    pub total_volume: f64,

    /// Recovery window derived from the session's set count
    pub recovery_hours: f64,
}

/// Read-time view of a muscle group's recovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuscleRecoveryReport {
    pub muscle_group: MuscleGroup,

    /// None when the group has never been trained
    pub last_trained_at: Option<DateTime<Utc>>,

    pub total_sets: u32,
    pub total_volume: f64,
    pub recovery_hours: f64,

    /// Elapsed share of the recovery window, 0-100
    pub recovery_percent: u8,

    /// Hours until fully recovered, never negative
    pub hours_remaining: f64,

    pub status: RecoveryStatus,
    pub ready_to_train: bool,
}

/// Base recovery window per muscle group, in hours
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseRecoveryHours {
    pub chest: f64,
    pub back: f64,
    pub shoulders: f64,
    pub biceps: f64,
    pub triceps: f64,
    pub legs: f64,
    pub core: f64,
    pub cardio: f64,
    pub full_body: f64,
}

impl Default for BaseRecoveryHours {
    fn default() -> Self {
        BaseRecoveryHours {
            chest: 48.0,
            back: 72.0,
            shoulders: 48.0,
            biceps: 48.0,
            triceps: 48.0,
            legs: 72.0,
            core: 24.0,
            cardio: 24.0,
            full_body: 48.0,
        }
    }
}

impl BaseRecoveryHours {
    pub fn hours_for(&self, group: MuscleGroup) -> f64 {
        match group {
            MuscleGroup::Chest => self.chest,
            MuscleGroup::Back => self.back,
            MuscleGroup::Shoulders => self.shoulders,
            MuscleGroup::Biceps => self.biceps,
            MuscleGroup::Triceps => self.triceps,
            MuscleGroup::Legs => self.legs,
            MuscleGroup::Core => self.core,
            MuscleGroup::Cardio => self.cardio,
            MuscleGroup::FullBody => self.full_body,
        }
    }
}

/// One row of the volume adjustment table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeAdjustment {
    /// Minimum completed sets for this row to apply
    pub min_sets: u32,

    /// Hours added to (or removed from) the base window
    pub delta_hours: f64,
}

/// Recovery model configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Adjustment for sessions below every table row
    pub light_session_delta_hours: f64,

    /// Percent at or above which a group counts as recovering
    pub recovering_percent: u8,

    /// Percent at or above which a group is ready to train
    pub ready_percent: u8,

    pub base_hours: BaseRecoveryHours,

    /// First matching row wins; rows are matched from the highest `min_sets` down
    pub volume_adjustments: Vec<VolumeAdjustment>,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        RecoveryConfig {
            light_session_delta_hours: -12.0,
            recovering_percent: 50,
            ready_percent: 80,
            base_hours: BaseRecoveryHours::default(),
            volume_adjustments: vec![
                VolumeAdjustment { min_sets: 20, delta_hours: 24.0 },
                VolumeAdjustment { min_sets: 15, delta_hours: 12.0 },
                VolumeAdjustment { min_sets: 10, delta_hours: 0.0 },
            ],
        }
    }
}

/// Completed-set load a single workout put on one muscle group
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionLoad {
    pub sets: u32,
    pub volume: f64,
}

/// Tracks decaying fatigue per muscle group
pub struct MuscleRecoveryTracker {
    config: RecoveryConfig,
}

impl MuscleRecoveryTracker {
    /// Create tracker with default configuration
    pub fn new() -> Self {
        Self::with_config(RecoveryConfig::default())
    }

    /// Create tracker with custom configuration
    pub fn with_config(mut config: RecoveryConfig) -> Self {
        config
            .volume_adjustments
            .sort_by_key(|row| Reverse(row.min_sets));
        MuscleRecoveryTracker { config }
    }

    pub fn config(&self) -> &RecoveryConfig {
        &self.config
    }

    /// Recovery window for a session of `completed_sets` on `group`
    pub fn recovery_hours_for(&self, group: MuscleGroup, completed_sets: u32) -> f64 {
        let base = self.config.base_hours.hours_for(group);
        let delta = self
            .config
            .volume_adjustments
            .iter()
            .find(|row| completed_sets >= row.min_sets)
            .map(|row| row.delta_hours)
            .unwrap_or(self.config.light_session_delta_hours);

        base + delta
    }

    /// Completed sets and volume per muscle group
    ///
    /// Every completed set counts toward fatigue, loaded or not.
    pub fn session_load(workout: &CompletedWorkout) -> BTreeMap<MuscleGroup, SessionLoad> {
        let mut load: BTreeMap<MuscleGroup, SessionLoad> = BTreeMap::new();

        for set in workout.sets.iter().filter(|s| s.completed) {
            let entry = load.entry(set.muscle_group).or_default();
            entry.sets += 1;
            entry.volume += set.volume();
        }

        load
    }

    /// New state for every group the workout trained
    pub fn states_for_workout(
        &self,
        workout: &CompletedWorkout,
        now: DateTime<Utc>,
    ) -> Vec<MuscleRecoveryState> {
        Self::session_load(workout)
            .into_iter()
            .map(|(group, load)| MuscleRecoveryState {
                muscle_group: group,
                last_trained_at: now,
                total_sets: load.sets,
                total_volume: load.volume,
                recovery_hours: self.recovery_hours_for(group, load.sets),
            })
            .collect()
    }

    /// Record a completed workout, replacing the stored state of each trained group
    pub fn update<S: EngineStore + ?Sized>(
        &self,
        store: &mut S,
        user_id: &str,
        workout: &CompletedWorkout,
        now: DateTime<Utc>,
    ) -> Result<Vec<MuscleRecoveryState>> {
        let states = self.states_for_workout(workout, now);

        for state in &states {
            store.upsert_recovery_state(user_id, state)?;
        }

        info!(
            user_id,
            workout_id = %workout.id,
            groups = states.len(),
            "Muscle recovery updated"
        );

        Ok(states)
    }

    /// Derive the read-time report for a stored state
    pub fn report(&self, state: &MuscleRecoveryState, now: DateTime<Utc>) -> MuscleRecoveryReport {
        let hours_since = ((now - state.last_trained_at).num_seconds() as f64 / 3600.0).max(0.0);

        let raw_percent = if state.recovery_hours > 0.0 {
            (hours_since / state.recovery_hours * 100.0).clamp(0.0, 100.0)
        } else {
            100.0
        };
        let recovery_percent = raw_percent.round() as u8;
        let hours_remaining = round_dp((state.recovery_hours - hours_since).max(0.0), 1);

        MuscleRecoveryReport {
            muscle_group: state.muscle_group,
            last_trained_at: Some(state.last_trained_at),
            total_sets: state.total_sets,
            total_volume: state.total_volume,
            recovery_hours: state.recovery_hours,
            recovery_percent,
            hours_remaining,
            status: self.status_for(recovery_percent),
            ready_to_train: recovery_percent >= self.config.ready_percent,
        }
    }

    /// Report for a group with no stored state
    pub fn cold_start(&self, group: MuscleGroup) -> MuscleRecoveryReport {
        MuscleRecoveryReport {
            muscle_group: group,
            last_trained_at: None,
            total_sets: 0,
            total_volume: 0.0,
            recovery_hours: self.config.base_hours.hours_for(group),
            recovery_percent: 100,
            hours_remaining: 0.0,
            status: RecoveryStatus::Recovered,
            ready_to_train: true,
        }
    }

    fn status_for(&self, percent: u8) -> RecoveryStatus {
        if percent >= 100 {
            RecoveryStatus::Recovered
        } else if percent >= self.config.recovering_percent {
            RecoveryStatus::Recovering
        } else {
            RecoveryStatus::Fatigued
        }
    }

    /// Recovery report for every tracked muscle group
    pub fn get_status<S: EngineStore + ?Sized>(
        &self,
        store: &S,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<MuscleRecoveryReport>> {
        let stored: BTreeMap<MuscleGroup, MuscleRecoveryState> = store
            .recovery_states(user_id)?
            .into_iter()
            .map(|state| (state.muscle_group, state))
            .collect();

        debug!(user_id, stored = stored.len(), "Computing recovery status");

        Ok(MuscleGroup::ALL
            .iter()
            .map(|group| match stored.get(group) {
                Some(state) => self.report(state, now),
                None => self.cold_start(*group),
            })
            .collect())
    }

    /// Groups ready to train, fully recovered first, then by recovery percent
    pub fn get_suggested_muscles(statuses: &[MuscleRecoveryReport]) -> Vec<MuscleRecoveryReport> {
        let mut ready: Vec<MuscleRecoveryReport> = statuses
            .iter()
            .filter(|s| s.ready_to_train)
            .cloned()
            .collect();

        ready.sort_by_key(|s| (s.recovery_percent < 100, Reverse(s.recovery_percent)));
        ready
    }
}

impl Default for MuscleRecoveryTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for RecoveryStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "recovered" => Ok(RecoveryStatus::Recovered),
            "recovering" => Ok(RecoveryStatus::Recovering),
            "fatigued" => Ok(RecoveryStatus::Fatigued),
            _ => Err(format!("Unknown recovery status: {}", s)),
        }
    }
}
