//! Strength trend forecasting and PR readiness
//!
//! For each exercise the best Brzycki estimated one-rep max of every session
//! in the lookback window forms a series. An ordinary least squares line is
//! fitted against session index, projected one session ahead, and its R² is
//! reported as the confidence of the forecast.
//!
//! Predictions are memoized per (user, exercise) and revalidated at read
//! time: an entry older than the TTL is recomputed synchronously on the
//! next access.

use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::error::Result;
use crate::formulas::{estimated_one_rep_max, round_dp, round_to_increment, BRZYCKI_MAX_REPS};
use crate::models::{SetRecord, Trend};
use crate::store::TrainingStore;

/// Below this total sum of squares a series counts as flat
const FLAT_SERIES_TOLERANCE: f64 = 1e-9;

/// Forecast of an exercise's next estimated one-rep max
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrPrediction {
    pub exercise_id: String,

    /// Best session estimated 1RM in the window
    pub current_max: f64,

    /// Trend line value one session past the last observed one
    pub predicted_max: f64,

    /// Weight to attempt for a new PR
    pub suggested_weight: f64,

    /// R² of the fit, 0-1, two decimals
    pub confidence: f64,

    pub trend: Trend,
    pub ready_for_pr: bool,

    /// Sessions in the regression
    pub data_points: usize,

    /// Estimated 1RM change per session
    pub slope: f64,

    /// When the prediction was computed; drives cache staleness
    pub calculated_at: DateTime<Utc>,
}

/// Least squares line over an indexed series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl LinearFit {
    /// Fit `values[i]` against `i`; None for fewer than two points
    pub fn fit(values: &[f64]) -> Option<Self> {
        if values.len() < 2 {
            return None;
        }

        let n = values.len() as f64;
        let mean_x = (n - 1.0) / 2.0;
        let mean_y = values.iter().sum::<f64>() / n;

        let (mut sxx, mut sxy) = (0.0, 0.0);
        for (i, y) in values.iter().enumerate() {
            let dx = i as f64 - mean_x;
            sxx += dx * dx;
            sxy += dx * (y - mean_y);
        }

        let slope = sxy / sxx;
        let intercept = mean_y - slope * mean_x;

        let ss_total: f64 = values.iter().map(|y| (y - mean_y).powi(2)).sum();
        let ss_residual: f64 = values
            .iter()
            .enumerate()
            .map(|(i, y)| (y - (slope * i as f64 + intercept)).powi(2))
            .sum();

        let r_squared = if ss_total <= FLAT_SERIES_TOLERANCE {
            0.0
        } else {
            1.0 - ss_residual / ss_total
        };

        Some(LinearFit {
            slope,
            intercept,
            r_squared,
        })
    }

    /// Value of the line at index `x`
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Forecaster configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Days of history considered
    pub lookback_days: u64,

    /// Minimum completed weighted sets in the window
    pub min_sets: usize,

    /// Minimum distinct sessions in the window
    pub min_sessions: usize,

    /// |slope| above which the trend is not a plateau (kg per session)
    pub slope_threshold: f64,

    /// R² a fit must exceed before a PR is flagged
    pub min_r_squared: f64,

    /// Predicted max must exceed current max by this factor
    pub pr_margin: f64,

    /// Suggested PR attempt as a multiple of current max
    pub suggested_weight_factor: f64,

    pub rounding_increment: f64,

    /// Prediction cache validity in hours
    pub cache_ttl_hours: i64,

    /// Rep cap for the Brzycki estimate (never above 36)
    pub rep_cap: u32,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        ForecastConfig {
            lookback_days: 60,
            min_sets: 4,
            min_sessions: 3,
            slope_threshold: 0.5,
            min_r_squared: 0.5,
            pr_margin: 1.01,
            suggested_weight_factor: 1.025,
            rounding_increment: 2.5,
            cache_ttl_hours: 24,
            rep_cap: BRZYCKI_MAX_REPS,
        }
    }
}

/// Whether a cached prediction has outlived its validity window
pub fn is_stale(prediction: &PrPrediction, now: DateTime<Utc>, ttl: Duration) -> bool {
    now - prediction.calculated_at >= ttl
}

/// Forecasts estimated one-rep max and flags PR readiness
pub struct StrengthTrendForecaster {
    config: ForecastConfig,
}

impl StrengthTrendForecaster {
    /// Create forecaster with default configuration
    pub fn new() -> Self {
        Self::with_config(ForecastConfig::default())
    }

    /// Create forecaster with custom configuration
    pub fn with_config(config: ForecastConfig) -> Self {
        StrengthTrendForecaster { config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::hours(self.config.cache_ttl_hours)
    }

    /// Best estimated 1RM per session date, oldest first
    pub fn session_maxima(&self, sets: &[SetRecord]) -> Vec<(NaiveDate, f64)> {
        let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();

        for set in sets.iter().filter(|s| s.is_completed_weighted()) {
            let estimate = estimated_one_rep_max(set.weight, set.reps, self.config.rep_cap);
            by_date
                .entry(set.session_date)
                .and_modify(|best| *best = best.max(estimate))
                .or_insert(estimate);
        }

        by_date.into_iter().collect()
    }

    /// Classify a regression slope
    pub fn classify_trend(&self, slope: f64) -> Trend {
        if slope > self.config.slope_threshold {
            Trend::Improving
        } else if slope < -self.config.slope_threshold {
            Trend::Declining
        } else {
            Trend::Plateau
        }
    }

    /// Forecast from an exercise's raw sets; None when data is insufficient
    pub fn forecast_sets(
        &self,
        exercise_id: &str,
        sets: &[SetRecord],
        now: DateTime<Utc>,
    ) -> Option<PrPrediction> {
        let qualifying = sets.iter().filter(|s| s.is_completed_weighted()).count();
        let sessions = self.session_maxima(sets);

        if qualifying < self.config.min_sets || sessions.len() < self.config.min_sessions.max(2) {
            debug!(
                exercise_id,
                sets = qualifying,
                sessions = sessions.len(),
                "Skipping PR forecast, not enough data"
            );
            return None;
        }

        let series: Vec<f64> = sessions.iter().map(|(_, estimate)| *estimate).collect();
        let fit = LinearFit::fit(&series)?;

        let current_max = series.iter().copied().fold(f64::MIN, f64::max);
        let predicted_max = fit.at(series.len() as f64);
        let trend = self.classify_trend(fit.slope);

        let ready_for_pr = trend == Trend::Improving
            && fit.r_squared > self.config.min_r_squared
            && predicted_max > current_max * self.config.pr_margin;

        Some(PrPrediction {
            exercise_id: exercise_id.to_string(),
            current_max: round_dp(current_max, 1),
            predicted_max: round_dp(predicted_max, 1),
            suggested_weight: round_to_increment(
                current_max * self.config.suggested_weight_factor,
                self.config.rounding_increment,
            ),
            confidence: round_dp(fit.r_squared.clamp(0.0, 1.0), 2),
            trend,
            ready_for_pr,
            data_points: series.len(),
            slope: round_dp(fit.slope, 2),
            calculated_at: now,
        })
    }

    /// Prediction for one exercise, served from cache while fresh
    pub fn predict<S: TrainingStore + ?Sized>(
        &self,
        store: &mut S,
        user_id: &str,
        exercise_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<PrPrediction>> {
        if let Some(cached) = store.cached_prediction(user_id, exercise_id)? {
            if !is_stale(&cached, now, self.cache_ttl()) {
                debug!(user_id, exercise_id, "PR prediction served from cache");
                return Ok(Some(cached));
            }
        }

        let since = self.window_start(now);
        let sets = store.exercise_sets(user_id, exercise_id, Some(since))?;

        match self.forecast_sets(exercise_id, &sets, now) {
            Some(prediction) => {
                store.upsert_prediction(user_id, &prediction)?;
                Ok(Some(prediction))
            }
            None => Ok(None),
        }
    }

    /// Predictions for every exercise trained in the window
    ///
    /// PR-ready exercises first, then by descending confidence.
    pub fn predict_all<S: TrainingStore + ?Sized>(
        &self,
        store: &mut S,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<PrPrediction>> {
        let since = self.window_start(now);

        let mut predictions = Vec::new();
        for exercise_id in store.exercises_trained_since(user_id, since)? {
            if let Some(prediction) = self.predict(&mut *store, user_id, &exercise_id, now)? {
                predictions.push(prediction);
            }
        }

        predictions.sort_by(|a, b| {
            b.ready_for_pr
                .cmp(&a.ready_for_pr)
                .then(b.confidence.total_cmp(&a.confidence))
        });
        Ok(predictions)
    }

    fn window_start(&self, now: DateTime<Utc>) -> NaiveDate {
        let today = now.date_naive();
        today
            .checked_sub_days(Days::new(self.config.lookback_days))
            .unwrap_or(today)
    }
}

impl Default for StrengthTrendForecaster {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{EngineStore, InMemoryStore};
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 31, 8, 0, 0).unwrap()
    }

    fn sets(exercise: &str, sessions: &[(u32, f64, u32)]) -> Vec<SetRecord> {
        sessions
            .iter()
            .map(|&(d, weight, reps)| SetRecord {
                exercise_id: exercise.to_string(),
                session_date: NaiveDate::from_ymd_opt(2024, 8, d).unwrap(),
                weight,
                reps,
                completed: true,
            })
            .collect()
    }

    #[test]
    fn test_constant_step_series_is_pr_ready() {
        let forecaster = StrengthTrendForecaster::new();
        let history = sets(
            "deadlift",
            &[(1, 100.0, 1), (5, 105.0, 1), (9, 110.0, 1), (13, 115.0, 1), (17, 120.0, 1)],
        );

        let prediction = forecaster.forecast_sets("deadlift", &history, now()).unwrap();
        assert_eq!(prediction.confidence, 1.0);
        assert_eq!(prediction.trend, Trend::Improving);
        assert_eq!(prediction.current_max, 120.0);
        assert_eq!(prediction.predicted_max, 125.0);
        assert_eq!(prediction.suggested_weight, 122.5);
        assert_eq!(prediction.slope, 5.0);
        assert_eq!(prediction.data_points, 5);
        assert!(prediction.ready_for_pr);
    }

    #[test]
    fn test_flat_series_has_zero_confidence() {
        let forecaster = StrengthTrendForecaster::new();
        let history = sets("bench", &[(1, 100.0, 1), (3, 100.0, 1), (5, 100.0, 1), (7, 100.0, 1)]);

        let prediction = forecaster.forecast_sets("bench", &history, now()).unwrap();
        assert_eq!(prediction.confidence, 0.0);
        assert_eq!(prediction.trend, Trend::Plateau);
        assert!(!prediction.ready_for_pr);
    }

    #[test]
    fn test_declining_series() {
        let forecaster = StrengthTrendForecaster::new();
        let history = sets("press", &[(1, 60.0, 1), (3, 58.0, 1), (5, 55.0, 1), (7, 54.0, 1)]);

        let prediction = forecaster.forecast_sets("press", &history, now()).unwrap();
        assert_eq!(prediction.trend, Trend::Declining);
        assert_eq!(prediction.current_max, 60.0);
        assert!(!prediction.ready_for_pr);
    }

    #[test]
    fn test_session_max_uses_best_estimate() {
        let forecaster = StrengthTrendForecaster::new();
        // 100 x 1 = 100, 90 x 6 = 90 * 36 / 31 ≈ 104.5
        let history = sets("squat", &[(1, 100.0, 1), (1, 90.0, 6)]);

        let maxima = forecaster.session_maxima(&history);
        assert_eq!(maxima.len(), 1);
        assert!((maxima[0].1 - 90.0 * 36.0 / 31.0).abs() < 1e-9);
    }

    #[test]
    fn test_insufficient_data_skipped() {
        let forecaster = StrengthTrendForecaster::new();

        // three sessions but only three sets
        let few_sets = sets("row", &[(1, 60.0, 5), (3, 62.5, 5), (5, 65.0, 5)]);
        assert!(forecaster.forecast_sets("row", &few_sets, now()).is_none());

        // enough sets but only two sessions
        let few_sessions = sets("row", &[(1, 60.0, 5), (1, 60.0, 5), (3, 62.5, 5), (3, 62.5, 5)]);
        assert!(forecaster.forecast_sets("row", &few_sessions, now()).is_none());

        assert!(forecaster.forecast_sets("row", &[], now()).is_none());
    }

    #[test]
    fn test_regression_is_deterministic() {
        let series = [101.3, 99.8, 104.2, 106.0, 105.1];
        let first = LinearFit::fit(&series).unwrap();
        let second = LinearFit::fit(&series).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.at(5.0), second.at(5.0));
        assert!(LinearFit::fit(&[1.0]).is_none());
    }

    #[test]
    fn test_staleness_window() {
        let forecaster = StrengthTrendForecaster::new();
        let history = sets("bench", &[(1, 100.0, 1), (3, 100.0, 1), (5, 100.0, 1), (7, 100.0, 1)]);
        let prediction = forecaster.forecast_sets("bench", &history, now()).unwrap();

        let ttl = forecaster.cache_ttl();
        assert!(!is_stale(&prediction, now() + Duration::hours(23), ttl));
        assert!(is_stale(&prediction, now() + Duration::hours(24), ttl));
    }

    #[test]
    fn test_cached_prediction_reused_until_stale() {
        let forecaster = StrengthTrendForecaster::new();
        let mut store = InMemoryStore::new();
        store.add_sets("u1", sets("bench", &[(1, 100.0, 1), (3, 100.0, 1), (5, 100.0, 1), (7, 100.0, 1)]));

        let first = forecaster.predict(&mut store, "u1", "bench", now()).unwrap().unwrap();
        assert_eq!(first.trend, Trend::Plateau);

        store.add_sets("u1", sets("bench", &[(9, 110.0, 1), (11, 120.0, 1), (13, 130.0, 1)]));

        let cached = forecaster
            .predict(&mut store, "u1", "bench", now() + Duration::hours(2))
            .unwrap()
            .unwrap();
        assert_eq!(cached, first);

        let refreshed = forecaster
            .predict(&mut store, "u1", "bench", now() + Duration::hours(25))
            .unwrap()
            .unwrap();
        assert_eq!(refreshed.trend, Trend::Improving);
        assert_eq!(refreshed.calculated_at, now() + Duration::hours(25));
        assert_eq!(store.cached_prediction("u1", "bench").unwrap(), Some(refreshed));
    }

    #[test]
    fn test_lookback_window_excludes_old_sessions() {
        let forecaster = StrengthTrendForecaster::new();
        let mut store = InMemoryStore::new();
        let old = SetRecord {
            exercise_id: "bench".to_string(),
            session_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            weight: 200.0,
            reps: 1,
            completed: true,
        };
        store.add_sets("u1", vec![old]);
        store.add_sets("u1", sets("bench", &[(1, 100.0, 1), (3, 102.5, 1), (5, 105.0, 1), (7, 107.5, 1)]));

        let prediction = forecaster.predict(&mut store, "u1", "bench", now()).unwrap().unwrap();
        assert_eq!(prediction.data_points, 4);
        assert_eq!(prediction.current_max, 107.5);
    }

    #[test]
    fn test_predict_all_orders_ready_first() {
        let forecaster = StrengthTrendForecaster::new();
        let mut store = InMemoryStore::new();
        store.add_sets("u1", sets("bench", &[(1, 100.0, 1), (3, 100.0, 1), (5, 100.0, 1), (7, 100.0, 1)]));
        store.add_sets(
            "u1",
            sets("deadlift", &[(2, 150.0, 1), (6, 155.0, 1), (10, 160.0, 1), (14, 165.0, 1)]),
        );
        store.add_sets("u1", sets("curl", &[(2, 20.0, 10)]));

        let all = forecaster.predict_all(&mut store, "u1", now()).unwrap();
        let order: Vec<&str> = all.iter().map(|p| p.exercise_id.as_str()).collect();
        assert_eq!(order, vec!["deadlift", "bench"]);
    }

    proptest! {
        #[test]
        fn test_confidence_always_in_unit_range(
            weights in proptest::collection::vec(20.0f64..300.0, 4..12),
            reps in 1u32..15
        ) {
            let forecaster = StrengthTrendForecaster::new();
            let sessions: Vec<(u32, f64, u32)> = weights
                .iter()
                .enumerate()
                .map(|(i, w)| (i as u32 + 1, *w, reps))
                .collect();

            let prediction = forecaster.forecast_sets("lift", &sets("lift", &sessions), now()).unwrap();
            prop_assert!((0.0..=1.0).contains(&prediction.confidence));
            prop_assert_eq!(prediction.data_points, weights.len());
        }
    }
}
