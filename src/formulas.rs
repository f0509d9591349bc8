//! Shared strength formulas
//!
//! Estimated one-rep max and weight rounding live here so the overload
//! analyzer and the PR forecaster cannot drift apart on either rule.
//! Rounding goes through `rust_decimal` so increments such as 2.5 kg land
//! exactly (82.5, not 82.49999999).

use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Highest rep count the Brzycki denominator accepts (37 - 36 = 1)
pub const BRZYCKI_MAX_REPS: u32 = 36;

/// Estimated one-rep max using the Brzycki formula
///
/// `weight × 36 / (37 − min(reps, cap))`, with the cap never above 36 so the
/// denominator stays positive.
pub fn estimated_one_rep_max(weight: f64, reps: u32, rep_cap: u32) -> f64 {
    let reps = reps.min(rep_cap).min(BRZYCKI_MAX_REPS);
    weight * 36.0 / (37.0 - f64::from(reps))
}

/// Round `value` to the nearest multiple of `increment`
///
/// Non-positive increments and non-finite values are returned unchanged.
pub fn round_to_increment(value: f64, increment: f64) -> f64 {
    if increment <= 0.0 || !value.is_finite() || !increment.is_finite() {
        return value;
    }

    let (Some(value_dec), Some(increment_dec)) =
        (Decimal::from_f64(value), Decimal::from_f64(increment))
    else {
        return value;
    };

    let steps = (value_dec / increment_dec)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    (steps * increment_dec).to_f64().unwrap_or(value)
}

/// Round to a fixed number of decimal places (half away from zero)
pub fn round_dp(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    Decimal::from_f64(value)
        .map(|d| d.round_dp_with_strategy(places, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(value)
}

/// Practical plate increment chosen by load magnitude
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementRule {
    /// Increment for loads at or below `magnitude_ceiling` (kg)
    pub small: f64,

    /// Increment for heavier loads (kg)
    pub large: f64,

    /// Load at which the large increment takes over
    pub magnitude_ceiling: f64,
}

impl Default for IncrementRule {
    fn default() -> Self {
        IncrementRule {
            small: 2.5,
            large: 5.0,
            magnitude_ceiling: 20.0,
        }
    }
}

impl IncrementRule {
    /// Increment appropriate for a load of `weight`
    pub fn increment_for(&self, weight: f64) -> f64 {
        if weight <= self.magnitude_ceiling {
            self.small
        } else {
            self.large
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn as_decimal(value: f64) -> Decimal {
        Decimal::from_f64(value).unwrap()
    }

    #[test]
    fn test_brzycki_single_rep_identity() {
        assert_eq!(estimated_one_rep_max(100.0, 1, 36), 100.0);
    }

    #[test]
    fn test_brzycki_caps_reps() {
        // 36 reps and beyond share the smallest positive denominator
        let capped = estimated_one_rep_max(20.0, 36, 36);
        assert_eq!(capped, 720.0);
        assert_eq!(estimated_one_rep_max(20.0, 50, 36), capped);
        // a misconfigured cap above 36 is still clamped
        assert_eq!(estimated_one_rep_max(20.0, 50, 60), capped);
    }

    #[test]
    fn test_round_to_increment() {
        assert_eq!(as_decimal(round_to_increment(83.7, 2.5)), dec!(82.5));
        assert_eq!(as_decimal(round_to_increment(76.5, 2.5)), dec!(77.5));
        assert_eq!(as_decimal(round_to_increment(102.5, 5.0)), dec!(105));
        assert_eq!(round_to_increment(42.0, 0.0), 42.0);
    }

    #[test]
    fn test_round_dp() {
        assert_eq!(as_decimal(round_dp(0.98765, 2)), dec!(0.99));
        assert_eq!(as_decimal(round_dp(12.25, 1)), dec!(12.3));
    }

    #[test]
    fn test_increment_rule() {
        let rule = IncrementRule::default();
        assert_eq!(rule.increment_for(20.0), 2.5);
        assert_eq!(rule.increment_for(20.5), 5.0);
    }

    proptest! {
        #[test]
        fn test_one_rep_max_never_below_working_weight(
            weight in 1.0f64..400.0,
            reps in 1u32..100
        ) {
            let estimate = estimated_one_rep_max(weight, reps, BRZYCKI_MAX_REPS);
            prop_assert!(estimate.is_finite());
            prop_assert!(estimate >= weight - 1e-9);
        }

        #[test]
        fn test_rounded_value_is_multiple_of_increment(value in 0.0f64..500.0) {
            let rounded = as_decimal(round_to_increment(value, 2.5));
            prop_assert_eq!(rounded % dec!(2.5), Decimal::ZERO);
            prop_assert!((rounded.to_f64().unwrap() - value).abs() <= 1.25 + 1e-9);
        }
    }
}
