//! Lifetime stats, streaks, XP and achievement unlocks
//!
//! ## Streak rule
//! - workout on the same calendar day as the last one: streak unchanged
//! - exactly one day later: streak + 1
//! - any larger gap: streak resets to 1
//!
//! ## XP curve
//! `level = floor((xp / scale)^(1 / exponent)) + 1`, with scale 100 and
//! exponent 2 by default, so reaching level `L + 1` takes `L² × 100` XP.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::formulas::round_dp;
use crate::models::CompletedWorkout;
use crate::store::EngineStore;

/// Lifetime training statistics of one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_workouts: u32,
    pub total_sets: u64,
    pub total_reps: u64,

    /// Σ weight × reps lifted (kg)
    pub total_weight: f64,

    pub total_prs: u32,
    pub total_duration_minutes: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_workout_date: NaiveDate,
    pub total_xp: u64,
    pub current_level: u32,
}

/// Contribution of one workout to lifetime stats
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkoutTotals {
    pub sets: u32,
    pub reps: u32,
    pub weight: f64,
    pub prs: u32,
    pub duration_minutes: u32,
}

impl WorkoutTotals {
    /// Totals over the completed sets of a workout
    pub fn from_workout(workout: &CompletedWorkout) -> Self {
        let completed = workout.sets.iter().filter(|s| s.completed);

        let mut totals = WorkoutTotals {
            prs: workout.personal_records,
            duration_minutes: workout.duration_minutes,
            ..WorkoutTotals::default()
        };
        for set in completed {
            totals.sets += 1;
            totals.reps += set.reps;
            totals.weight += set.volume();
        }
        totals
    }
}

/// Stat an achievement threshold is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementType {
    WorkoutCount,
    PrCount,
    /// Met by either the current or the longest streak
    Streak,
    TotalWeight,
    TotalReps,
    TotalSets,
}

impl RequirementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementType::WorkoutCount => "workout_count",
            RequirementType::PrCount => "pr_count",
            RequirementType::Streak => "streak",
            RequirementType::TotalWeight => "total_weight",
            RequirementType::TotalReps => "total_reps",
            RequirementType::TotalSets => "total_sets",
        }
    }
}

impl FromStr for RequirementType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "workout_count" => Ok(RequirementType::WorkoutCount),
            "pr_count" => Ok(RequirementType::PrCount),
            "streak" => Ok(RequirementType::Streak),
            "total_weight" => Ok(RequirementType::TotalWeight),
            "total_reps" => Ok(RequirementType::TotalReps),
            "total_sets" => Ok(RequirementType::TotalSets),
            _ => Err(format!("Unknown requirement type: {}", s)),
        }
    }
}

/// Threshold that unlocks an achievement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    #[serde(rename = "type")]
    pub kind: RequirementType,
    pub threshold: f64,
}

impl Requirement {
    /// Whether `stats` meets or exceeds the threshold
    pub fn is_met(&self, stats: &UserStats) -> bool {
        let value = match self.kind {
            RequirementType::WorkoutCount => f64::from(stats.total_workouts),
            RequirementType::PrCount => f64::from(stats.total_prs),
            RequirementType::Streak => f64::from(stats.current_streak.max(stats.longest_streak)),
            RequirementType::TotalWeight => stats.total_weight,
            RequirementType::TotalReps => stats.total_reps as f64,
            RequirementType::TotalSets => stats.total_sets as f64,
        };
        value >= self.threshold
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rarity::Common => write!(f, "common"),
            Rarity::Rare => write!(f, "rare"),
            Rarity::Epic => write!(f, "epic"),
            Rarity::Legendary => write!(f, "legendary"),
        }
    }
}

impl FromStr for Rarity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "common" => Ok(Rarity::Common),
            "rare" => Ok(Rarity::Rare),
            "epic" => Ok(Rarity::Epic),
            "legendary" => Ok(Rarity::Legendary),
            _ => Err(format!("Unknown rarity: {}", s)),
        }
    }
}

/// A one-time achievement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub requirement: Requirement,
    pub xp_reward: u64,
    pub rarity: Rarity,
}

/// Record of a user unlocking an achievement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnlockedAchievement {
    pub id: String,
    pub achievement_id: String,
    pub user_id: String,
    pub unlocked_at: DateTime<Utc>,
}

impl UnlockedAchievement {
    pub fn new(user_id: &str, achievement_id: &str, unlocked_at: DateTime<Utc>) -> Self {
        UnlockedAchievement {
            id: Uuid::new_v4().to_string(),
            achievement_id: achievement_id.to_string(),
            user_id: user_id.to_string(),
            unlocked_at,
        }
    }
}

fn definition(
    id: &str,
    name: &str,
    description: &str,
    kind: RequirementType,
    threshold: f64,
    xp_reward: u64,
    rarity: Rarity,
) -> AchievementDefinition {
    AchievementDefinition {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        requirement: Requirement { kind, threshold },
        xp_reward,
        rarity,
    }
}

/// Built-in achievement catalog
pub fn default_catalog() -> Vec<AchievementDefinition> {
    use RequirementType::*;

    vec![
        definition("first_workout", "First Steps", "Complete your first workout", WorkoutCount, 1.0, 50, Rarity::Common),
        definition("workouts_10", "Getting Consistent", "Complete 10 workouts", WorkoutCount, 10.0, 100, Rarity::Common),
        definition("workouts_50", "Dedicated", "Complete 50 workouts", WorkoutCount, 50.0, 250, Rarity::Rare),
        definition("workouts_100", "Centurion", "Complete 100 workouts", WorkoutCount, 100.0, 500, Rarity::Epic),
        definition("first_pr", "New Heights", "Set your first personal record", PrCount, 1.0, 50, Rarity::Common),
        definition("prs_10", "Record Breaker", "Set 10 personal records", PrCount, 10.0, 200, Rarity::Rare),
        definition("streak_3", "On a Roll", "Train 3 days in a row", Streak, 3.0, 75, Rarity::Common),
        definition("streak_7", "Week Warrior", "Train 7 days in a row", Streak, 7.0, 150, Rarity::Rare),
        definition("streak_30", "Unstoppable", "Train 30 days in a row", Streak, 30.0, 750, Rarity::Legendary),
        definition("weight_10k", "Ten Tonnes", "Lift 10,000 kg in total", TotalWeight, 10_000.0, 150, Rarity::Rare),
        definition("weight_100k", "Heavy Lifter", "Lift 100,000 kg in total", TotalWeight, 100_000.0, 500, Rarity::Epic),
        definition("reps_1000", "Rep Machine", "Perform 1,000 reps", TotalReps, 1_000.0, 100, Rarity::Common),
        definition("sets_500", "Set Collector", "Complete 500 sets", TotalSets, 500.0, 250, Rarity::Rare),
    ]
}

/// Highest level the curve reports; a degenerate curve stops here instead of climbing forever
pub const MAX_LEVEL: u32 = 100_000;

/// XP curve parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XpCurve {
    pub exponent: f64,
    pub scale: f64,
}

impl Default for XpCurve {
    fn default() -> Self {
        XpCurve {
            exponent: 2.0,
            scale: 100.0,
        }
    }
}

impl XpCurve {
    /// Total XP needed to leave `level` (reach `level + 1`)
    pub fn xp_for_level(&self, level: u32) -> u64 {
        (f64::from(level).powf(self.exponent) * self.scale).round() as u64
    }

    /// XP threshold of the next level up from `level`
    pub fn xp_for_next_level(&self, level: u32) -> u64 {
        self.xp_for_level(level)
    }

    /// Level reached with `xp` total experience
    pub fn level_for_xp(&self, xp: u64) -> u32 {
        let estimate = (xp as f64 / self.scale).powf(1.0 / self.exponent).floor() as u32;

        // settle float error at exact thresholds against the integer curve
        let mut level = estimate.saturating_add(1).clamp(1, MAX_LEVEL);
        while level > 1 && xp < self.xp_for_level(level - 1) {
            level -= 1;
        }
        while level < MAX_LEVEL && xp >= self.xp_for_level(level) {
            level += 1;
        }
        level
    }

    /// Percent of the way through `level`, 0-100
    pub fn xp_progress(&self, total_xp: u64, level: u32) -> f64 {
        let floor = self.xp_for_level(level.saturating_sub(1));
        let ceiling = self.xp_for_level(level);
        if ceiling <= floor {
            return 100.0;
        }

        let progress = (total_xp as f64 - floor as f64) / (ceiling - floor) as f64 * 100.0;
        round_dp(progress.clamp(0.0, 100.0), 1)
    }
}

/// Title for a level band
pub fn level_title(level: u32) -> &'static str {
    match level {
        0..=10 => "Beginner",
        11..=25 => "Intermediate",
        26..=50 => "Advanced",
        51..=75 => "Elite",
        _ => "Legend",
    }
}

/// Presentation summary of a user's level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSummary {
    pub level: u32,
    pub title: String,
    pub total_xp: u64,
    pub xp_for_next_level: u64,
    pub progress_percent: f64,
}

/// Maintains stats and streaks and awards achievements
pub struct AchievementEngine {
    curve: XpCurve,
}

impl AchievementEngine {
    /// Create engine with the default XP curve
    pub fn new() -> Self {
        Self::with_curve(XpCurve::default())
    }

    pub fn with_curve(curve: XpCurve) -> Self {
        AchievementEngine { curve }
    }

    pub fn curve(&self) -> &XpCurve {
        &self.curve
    }

    /// Fold one workout into existing stats (or start them)
    pub fn apply_workout(
        existing: Option<UserStats>,
        totals: &WorkoutTotals,
        today: NaiveDate,
    ) -> UserStats {
        let Some(mut stats) = existing else {
            return UserStats {
                total_workouts: 1,
                total_sets: u64::from(totals.sets),
                total_reps: u64::from(totals.reps),
                total_weight: totals.weight,
                total_prs: totals.prs,
                total_duration_minutes: u64::from(totals.duration_minutes),
                current_streak: 1,
                longest_streak: 1,
                last_workout_date: today,
                total_xp: 0,
                current_level: 1,
            };
        };

        let gap_days = (today - stats.last_workout_date).num_days();
        if gap_days == 1 {
            stats.current_streak += 1;
        } else if gap_days > 1 {
            stats.current_streak = 1;
        }
        stats.longest_streak = stats.longest_streak.max(stats.current_streak);

        stats.total_workouts += 1;
        stats.total_sets += u64::from(totals.sets);
        stats.total_reps += u64::from(totals.reps);
        stats.total_weight += totals.weight;
        stats.total_prs += totals.prs;
        stats.total_duration_minutes += u64::from(totals.duration_minutes);
        stats.last_workout_date = stats.last_workout_date.max(today);

        stats
    }

    /// Record a completed workout into the user's lifetime stats
    pub fn record_workout<S: EngineStore + ?Sized>(
        &self,
        store: &mut S,
        user_id: &str,
        totals: &WorkoutTotals,
        today: NaiveDate,
    ) -> Result<UserStats> {
        let existing = store.user_stats(user_id)?;
        let stats = Self::apply_workout(existing, totals, today);
        store.save_user_stats(user_id, &stats)?;

        debug!(
            user_id,
            total_workouts = stats.total_workouts,
            current_streak = stats.current_streak,
            "Workout recorded"
        );

        Ok(stats)
    }

    /// Unlock every newly met achievement; returns the unlocked names
    pub fn check_and_unlock_achievements<S: EngineStore + ?Sized>(
        &self,
        store: &mut S,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let Some(mut stats) = store.user_stats(user_id)? else {
            return Ok(Vec::new());
        };

        let already: HashSet<String> = store
            .unlocked_achievements(user_id)?
            .into_iter()
            .map(|u| u.achievement_id)
            .collect();

        let mut unlocked = Vec::new();
        for def in store.achievement_definitions()? {
            if already.contains(&def.id) || !def.requirement.is_met(&stats) {
                continue;
            }

            let unlock = UnlockedAchievement::new(user_id, &def.id, now);
            if store.record_unlock(&unlock)? {
                stats.total_xp += def.xp_reward;
                info!(user_id, achievement = %def.id, xp = def.xp_reward, "Achievement unlocked");
                unlocked.push(def.name);
            }
        }

        if !unlocked.is_empty() {
            stats.current_level = self.curve.level_for_xp(stats.total_xp);
            store.save_user_stats(user_id, &stats)?;
        }

        Ok(unlocked)
    }

    pub fn level_summary(&self, stats: &UserStats) -> LevelSummary {
        let level = self.curve.level_for_xp(stats.total_xp);
        LevelSummary {
            level,
            title: level_title(level).to_string(),
            total_xp: stats.total_xp,
            xp_for_next_level: self.curve.xp_for_next_level(level),
            progress_percent: self.curve.xp_progress(stats.total_xp, level),
        }
    }
}

impl Default for AchievementEngine {
    fn default() -> Self {
        Self::new()
    }
}
