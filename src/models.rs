use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Muscle groups tracked by the recovery model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MuscleGroup {
    Chest,
    Back,
    Shoulders,
    Biceps,
    Triceps,
    Legs,
    Core,
    Cardio,
    FullBody,
}

impl MuscleGroup {
    /// Every tracked group, in reporting order
    pub const ALL: [MuscleGroup; 9] = [
        MuscleGroup::Chest,
        MuscleGroup::Back,
        MuscleGroup::Shoulders,
        MuscleGroup::Biceps,
        MuscleGroup::Triceps,
        MuscleGroup::Legs,
        MuscleGroup::Core,
        MuscleGroup::Cardio,
        MuscleGroup::FullBody,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MuscleGroup::Chest => "chest",
            MuscleGroup::Back => "back",
            MuscleGroup::Shoulders => "shoulders",
            MuscleGroup::Biceps => "biceps",
            MuscleGroup::Triceps => "triceps",
            MuscleGroup::Legs => "legs",
            MuscleGroup::Core => "core",
            MuscleGroup::Cardio => "cardio",
            MuscleGroup::FullBody => "full_body",
        }
    }
}

impl fmt::Display for MuscleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MuscleGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "chest" => Ok(MuscleGroup::Chest),
            "back" => Ok(MuscleGroup::Back),
            "shoulders" => Ok(MuscleGroup::Shoulders),
            "biceps" => Ok(MuscleGroup::Biceps),
            "triceps" => Ok(MuscleGroup::Triceps),
            "legs" => Ok(MuscleGroup::Legs),
            "core" => Ok(MuscleGroup::Core),
            "cardio" => Ok(MuscleGroup::Cardio),
            "full_body" | "fullbody" => Ok(MuscleGroup::FullBody),
            _ => Err(format!("Unknown muscle group: {}", s)),
        }
    }
}

/// A single logged set as supplied by the history provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetRecord {
    /// Exercise the set belongs to
    pub exercise_id: String,

    /// Calendar date of the session the set was performed in
    pub session_date: NaiveDate,

    /// Load in kilograms (0 for bodyweight / cardio)
    pub weight: f64,

    /// Repetitions performed
    pub reps: u32,

    /// Whether the set was marked completed
    pub completed: bool,
}

impl SetRecord {
    /// Completed and loaded; the filter shared by the overload analyzer and forecaster
    pub fn is_completed_weighted(&self) -> bool {
        self.completed && self.weight > 0.0
    }

    pub fn volume(&self) -> f64 {
        self.weight * f64::from(self.reps)
    }
}

/// A set inside a workout, already resolved to its exercise's muscle group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSet {
    pub exercise_id: String,
    pub muscle_group: MuscleGroup,
    pub weight: f64,
    pub reps: u32,
    pub completed: bool,
}

impl WorkoutSet {
    pub fn volume(&self) -> f64 {
        self.weight * f64::from(self.reps)
    }
}

/// A finished workout, the payload of the workout-completed event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedWorkout {
    /// Unique identifier for the workout
    pub id: String,

    /// When the workout was completed
    pub completed_at: DateTime<Utc>,

    /// Duration of the workout in minutes
    pub duration_minutes: u32,

    /// Personal records set during the workout, as detected by the caller
    pub personal_records: u32,

    /// All logged sets, completed or not
    pub sets: Vec<WorkoutSet>,
}

impl CompletedWorkout {
    /// Flatten into history records dated on the completion day
    pub fn set_records(&self) -> Vec<SetRecord> {
        let date = self.completed_at.date_naive();
        self.sets
            .iter()
            .map(|set| SetRecord {
                exercise_id: set.exercise_id.clone(),
                session_date: date,
                weight: set.weight,
                reps: set.reps,
                completed: set.completed,
            })
            .collect()
    }
}

/// Per exercise, per date aggregate over completed weighted sets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAggregate {
    pub exercise_id: String,
    pub date: NaiveDate,
    pub avg_weight: f64,
    pub max_weight: f64,
    pub avg_reps: f64,
    pub total_volume: f64,
    pub set_count: usize,
}

/// Direction of performance change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Plateau,
    Declining,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Improving => write!(f, "improving"),
            Trend::Plateau => write!(f, "plateau"),
            Trend::Declining => write!(f, "declining"),
        }
    }
}

impl FromStr for Trend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "improving" => Ok(Trend::Improving),
            "plateau" => Ok(Trend::Plateau),
            "declining" => Ok(Trend::Declining),
            _ => Err(format!("Unknown trend: {}", s)),
        }
    }
}

/// Qualitative confidence of a progression suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Sort key, lower ranks first
    pub fn rank(&self) -> u8 {
        match self {
            Confidence::High => 0,
            Confidence::Medium => 1,
            Confidence::Low => 2,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::High => write!(f, "high"),
            Confidence::Medium => write!(f, "medium"),
            Confidence::Low => write!(f, "low"),
        }
    }
}
