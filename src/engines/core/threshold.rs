// Threshold Engine: per-budget threshold evaluation with first-trigger semantics.

use chrono::{DateTime, Utc};

use crate::engines::shared::models::{Budget, BudgetThreshold, ThresholdType};

const APPROACHING_BUFFER_PCT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApproachState {
    Ok,
    Approaching,
    Exceeded,
}

/// `[percentage >= threshold] -> Exceeded; [threshold > 5 && percentage >= threshold - 5] -> Approaching; else Ok`.
pub fn approach_state(percentage: f64, threshold: f64) -> ApproachState {
    if percentage >= threshold {
        ApproachState::Exceeded
    } else if threshold > APPROACHING_BUFFER_PCT && percentage >= threshold - APPROACHING_BUFFER_PCT {
        ApproachState::Approaching
    } else {
        ApproachState::Ok
    }
}

/// Applies the default threshold set (50/80/100, all Actual) when `budget`
/// carries none.
pub fn thresholds_or_default(budget: &Budget) -> Vec<BudgetThreshold> {
    if budget.thresholds.is_empty() {
        BudgetThreshold::defaults()
    } else {
        budget.thresholds.clone()
    }
}

/// Evaluates a single threshold without mutating the input. On a false->true
/// transition, `triggered_at` becomes `now` unless the input already carries
/// `triggered=true` with a non-zero timestamp, in which case it is preserved.
pub fn evaluate_threshold(
    threshold: &BudgetThreshold,
    current_spend: f64,
    forecasted_spend: f64,
    limit: f64,
    now: DateTime<Utc>,
) -> BudgetThreshold {
    let relevant_spend = match threshold.threshold_type {
        ThresholdType::Actual => current_spend,
        ThresholdType::Forecasted => forecasted_spend,
    };
    let percentage = if limit > 0.0 { relevant_spend / limit * 100.0 } else { 0.0 };
    let is_triggered = percentage >= threshold.percentage;

    let triggered_at = if is_triggered {
        match (threshold.triggered, threshold.triggered_at) {
            (true, Some(ts)) => Some(ts),
            _ => Some(now),
        }
    } else {
        None
    };

    BudgetThreshold {
        percentage: threshold.percentage,
        threshold_type: threshold.threshold_type,
        triggered: is_triggered,
        triggered_at,
    }
}
