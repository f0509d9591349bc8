//! Progressive overload suggestions
//!
//! Looks at the most recent sessions of one exercise and decides whether the
//! lifter should add weight, deload, or hold. The decision is an ordered
//! table of (predicate, outcome) rules evaluated first-match-wins, so the
//! thresholds can be tuned through [`OverloadConfig`] and the rule order
//! swapped through [`ProgressiveOverloadAnalyzer::with_rules`] without
//! touching the evaluation loop.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::formulas::{round_to_increment, IncrementRule};
use crate::history::{aggregate_sessions, SetHistoryProvider};
use crate::models::{Confidence, SessionAggregate, SetRecord, Trend};

/// Weight adjustment suggestion for one exercise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressionSuggestion {
    pub exercise_id: String,

    /// Heaviest load of the latest session
    pub current_weight: f64,

    pub suggested_weight: f64,
    pub confidence: Confidence,
    pub reason: String,
    pub trend: Trend,

    /// Date of the latest qualifying session
    pub last_performed: NaiveDate,

    /// Mean reps per set across the recent-session window
    pub avg_reps_recent: f64,
}

impl ProgressionSuggestion {
    pub fn is_increase(&self) -> bool {
        self.suggested_weight > self.current_weight
    }
}

/// Overload analyzer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverloadConfig {
    /// Most recent sessions considered
    pub lookback_sessions: usize,

    /// Fewer qualifying sessions than this yields no suggestion
    pub min_sessions: usize,

    /// Sessions averaged for the recent rep count
    pub recent_sessions: usize,

    /// Volume change (percent) beyond which the trend is not a plateau
    pub trend_threshold_pct: f64,

    /// Average reps at which adding weight is suggested
    pub increase_reps: f64,

    /// Average reps at which an increase is high confidence
    pub high_confidence_reps: f64,

    /// Average reps below which a declining lifter is told to deload
    pub deload_reps: f64,

    /// Absolute deload step (kg)
    pub deload_step: f64,

    /// Relative deload floor (fraction of current max)
    pub deload_factor: f64,

    /// Increment deloaded weights are rounded to
    pub rounding_increment: f64,

    /// Exercises trained within this many days are analyzed by `get_all_suggestions`
    pub suggestion_window_days: u64,

    /// Load increment when progressing
    pub increments: IncrementRule,
}

impl Default for OverloadConfig {
    fn default() -> Self {
        OverloadConfig {
            lookback_sessions: 5,
            min_sessions: 2,
            recent_sessions: 3,
            trend_threshold_pct: 5.0,
            increase_reps: 10.0,
            high_confidence_reps: 12.0,
            deload_reps: 6.0,
            deload_step: 5.0,
            deload_factor: 0.9,
            rounding_increment: 2.5,
            suggestion_window_days: 30,
            increments: IncrementRule::default(),
        }
    }
}

/// Inputs every rule sees
#[derive(Debug, Clone)]
pub struct RuleContext<'a> {
    pub latest: &'a SessionAggregate,
    pub trend: Trend,
    pub avg_reps_recent: f64,
}

/// What a matching rule produces
#[derive(Debug, Clone, PartialEq)]
pub struct RuleOutcome {
    pub suggested_weight: f64,
    pub confidence: Confidence,
    pub reason: String,
}

/// One row of the decision table
#[derive(Clone, Copy)]
pub struct OverloadRule {
    pub name: &'static str,
    pub applies: fn(&RuleContext<'_>, &OverloadConfig) -> bool,
    pub outcome: fn(&RuleContext<'_>, &OverloadConfig) -> RuleOutcome,
}

impl std::fmt::Debug for OverloadRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverloadRule").field("name", &self.name).finish()
    }
}

fn increase_applies(ctx: &RuleContext<'_>, config: &OverloadConfig) -> bool {
    ctx.avg_reps_recent >= config.increase_reps && ctx.trend != Trend::Declining
}

fn increase_outcome(ctx: &RuleContext<'_>, config: &OverloadConfig) -> RuleOutcome {
    let max_weight = ctx.latest.max_weight;
    RuleOutcome {
        suggested_weight: max_weight + config.increments.increment_for(max_weight),
        confidence: if ctx.avg_reps_recent >= config.high_confidence_reps {
            Confidence::High
        } else {
            Confidence::Medium
        },
        reason: format!(
            "Averaging {:.1} reps per set, ready to increase weight",
            ctx.avg_reps_recent
        ),
    }
}

fn deload_applies(ctx: &RuleContext<'_>, config: &OverloadConfig) -> bool {
    ctx.avg_reps_recent < config.deload_reps && ctx.trend == Trend::Declining
}

fn deload_outcome(ctx: &RuleContext<'_>, config: &OverloadConfig) -> RuleOutcome {
    let max_weight = ctx.latest.max_weight;
    let target = (max_weight - config.deload_step).max(max_weight * config.deload_factor);
    RuleOutcome {
        suggested_weight: round_to_increment(target, config.rounding_increment),
        confidence: Confidence::Medium,
        reason: format!(
            "Reps down to {:.1} with declining volume, consider a deload",
            ctx.avg_reps_recent
        ),
    }
}

fn plateau_applies(ctx: &RuleContext<'_>, _config: &OverloadConfig) -> bool {
    ctx.trend == Trend::Plateau
}

fn plateau_outcome(ctx: &RuleContext<'_>, _config: &OverloadConfig) -> RuleOutcome {
    RuleOutcome {
        suggested_weight: ctx.latest.max_weight,
        confidence: Confidence::Medium,
        reason: "Volume has plateaued, focus on reps before increasing weight".to_string(),
    }
}

/// Default decision table, highest priority first
pub const DEFAULT_RULES: [OverloadRule; 3] = [
    OverloadRule {
        name: "increase",
        applies: increase_applies,
        outcome: increase_outcome,
    },
    OverloadRule {
        name: "deload",
        applies: deload_applies,
        outcome: deload_outcome,
    },
    OverloadRule {
        name: "plateau",
        applies: plateau_applies,
        outcome: plateau_outcome,
    },
];

/// Suggests weight changes from recent session trend
pub struct ProgressiveOverloadAnalyzer {
    config: OverloadConfig,
    rules: Vec<OverloadRule>,
}

impl ProgressiveOverloadAnalyzer {
    /// Create analyzer with default configuration
    pub fn new() -> Self {
        Self::with_config(OverloadConfig::default())
    }

    /// Create analyzer with custom configuration
    pub fn with_config(config: OverloadConfig) -> Self {
        ProgressiveOverloadAnalyzer {
            config,
            rules: DEFAULT_RULES.to_vec(),
        }
    }

    /// Replace the decision table
    pub fn with_rules(mut self, rules: Vec<OverloadRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn config(&self) -> &OverloadConfig {
        &self.config
    }

    /// Classify the latest session's volume against the previous one
    pub fn classify_trend(&self, latest_volume: f64, previous_volume: f64) -> Trend {
        if previous_volume <= 0.0 {
            return if latest_volume > 0.0 {
                Trend::Improving
            } else {
                Trend::Plateau
            };
        }

        let change_pct = (latest_volume - previous_volume) / previous_volume * 100.0;
        if change_pct > self.config.trend_threshold_pct {
            Trend::Improving
        } else if change_pct < -self.config.trend_threshold_pct {
            Trend::Declining
        } else {
            Trend::Plateau
        }
    }

    /// Suggestion from an exercise's raw sets (any order, unfiltered)
    pub fn analyze_sets(&self, exercise_id: &str, sets: &[SetRecord]) -> Option<ProgressionSuggestion> {
        use statrs::statistics::Statistics;

        let mut sessions = aggregate_sessions(sets);
        let keep_from = sessions.len().saturating_sub(self.config.lookback_sessions);
        let mut recent: Vec<SessionAggregate> = sessions.split_off(keep_from);
        recent.reverse();

        if recent.len() < self.config.min_sessions.max(2) {
            debug!(exercise_id, sessions = recent.len(), "Not enough sessions for overload analysis");
            return None;
        }

        let latest = &recent[0];
        let trend = self.classify_trend(latest.total_volume, recent[1].total_volume);
        let avg_reps_recent = recent
            .iter()
            .take(self.config.recent_sessions.max(1))
            .map(|s| s.avg_reps)
            .collect::<Vec<f64>>()
            .mean();

        let ctx = RuleContext {
            latest,
            trend,
            avg_reps_recent,
        };

        let rule = self.rules.iter().find(|rule| (rule.applies)(&ctx, &self.config))?;
        let outcome = (rule.outcome)(&ctx, &self.config);

        debug!(exercise_id, rule = rule.name, %trend, avg_reps_recent, "Overload rule matched");

        Some(ProgressionSuggestion {
            exercise_id: exercise_id.to_string(),
            current_weight: latest.max_weight,
            suggested_weight: outcome.suggested_weight,
            confidence: outcome.confidence,
            reason: outcome.reason,
            trend,
            last_performed: latest.date,
            avg_reps_recent,
        })
    }

    /// Suggestion for one exercise of a user
    pub fn suggest<H: SetHistoryProvider + ?Sized>(
        &self,
        history: &H,
        user_id: &str,
        exercise_id: &str,
    ) -> Result<Option<ProgressionSuggestion>> {
        let sets = history.exercise_sets(user_id, exercise_id, None)?;
        Ok(self.analyze_sets(exercise_id, &sets))
    }

    /// Suggestions for every exercise trained in the suggestion window
    ///
    /// Increases come first, then higher confidence.
    pub fn get_all_suggestions<H: SetHistoryProvider + ?Sized>(
        &self,
        history: &H,
        user_id: &str,
        today: NaiveDate,
    ) -> Result<Vec<ProgressionSuggestion>> {
        let since = today
            .checked_sub_days(Days::new(self.config.suggestion_window_days))
            .unwrap_or(today);

        let mut suggestions = Vec::new();
        for exercise_id in history.exercises_trained_since(user_id, since)? {
            if let Some(suggestion) = self.suggest(history, user_id, &exercise_id)? {
                suggestions.push(suggestion);
            }
        }

        suggestions.sort_by_key(|s| (!s.is_increase(), s.confidence.rank()));
        Ok(suggestions)
    }
}

impl Default for ProgressiveOverloadAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
