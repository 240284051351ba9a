// Forecaster & Drift: two deliberately distinct forecast clocks plus drift.

use chrono::{DateTime, Duration, Utc};

use crate::engines::shared::error_model::{EngineError, Result};
use crate::engines::shared::models::{CostDriftData, DateRange, DRIFT_WARNING_THRESHOLD_PCT};

/// Continuous, duration-fractional extrapolation of month-to-date spend to
/// period end. Used by the protocol-bound enricher (event-time clock).
pub fn forecast_linear(
    current_spend: f64,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> f64 {
    if current_spend == 0.0 {
        return 0.0;
    }
    if now < period_start {
        return current_spend;
    }
    let elapsed = (now - period_start).num_milliseconds();
    let total = (period_end - period_start).num_milliseconds();
    if elapsed <= 0 || elapsed >= total {
        return current_spend;
    }
    current_spend * (total as f64) / (elapsed as f64)
}

/// Day-aligned extrapolation used by the standalone budget evaluator
/// (calendar-day clock). `current_day` is clamped to at least 1.
pub fn forecast_by_day(current_spend: f64, current_day: u32, days_in_month: u32) -> f64 {
    let day = current_day.max(1) as f64;
    (current_spend / day) * (days_in_month as f64)
}

/// Drift between extrapolated actual spend and projected monthly cost.
/// Extrapolation runs on the event-time clock (`forecast_linear`) over the
/// month-to-date `period`, widened to a full `days_in_month`-day month.
/// Fails with `EngineError::Validation` when `day_of_month < 3` (insufficient
/// data); returns `Ok(None)` when drift is not actionable.
pub fn calculate_drift(
    actual_mtd: f64,
    projected: f64,
    day_of_month: u32,
    days_in_month: u32,
    period: DateRange,
) -> Result<Option<CostDriftData>> {
    if day_of_month < 3 {
        return Err(EngineError::Validation("insufficient data: day_of_month < 3".into()));
    }
    if (actual_mtd == 0.0 && projected == 0.0) || (actual_mtd == 0.0) != (projected == 0.0) {
        return Ok(None);
    }

    let month_end = period.start + Duration::days(i64::from(days_in_month));
    let extrapolated = forecast_linear(actual_mtd, period.start, month_end, period.end);
    let delta = extrapolated - projected;
    let percent_drift = delta / projected * 100.0;

    if percent_drift.abs() <= DRIFT_WARNING_THRESHOLD_PCT {
        return Ok(None);
    }

    Ok(Some(CostDriftData {
        extrapolated_monthly: extrapolated,
        projected,
        delta,
        percent_drift,
        is_warning: true,
    }))
}
