// Budget Health: utilization ladder and worst-wins aggregation.

use crate::engines::shared::models::HealthStatus;

/// `[0, 80) -> Ok, [80, 90) -> Warning, [90, 100) -> Critical, [100, inf) -> Exceeded`.
/// Negative inputs clamp to `Ok`.
pub fn health_from_percentage(percentage_used: f64) -> HealthStatus {
    let p = percentage_used.max(0.0);
    if p >= 100.0 {
        HealthStatus::Exceeded
    } else if p >= 90.0 {
        HealthStatus::Critical
    } else if p >= 80.0 {
        HealthStatus::Warning
    } else {
        HealthStatus::Ok
    }
}

/// Worst-wins aggregation over a set of health statuses. An empty set yields
/// `Unspecified`.
pub fn aggregate_health<I: IntoIterator<Item = HealthStatus>>(statuses: I) -> HealthStatus {
    statuses.into_iter().max().unwrap_or(HealthStatus::Unspecified)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_boundaries() {
        assert_eq!(health_from_percentage(79.99), HealthStatus::Ok);
        assert_eq!(health_from_percentage(80.0), HealthStatus::Warning);
        assert_eq!(health_from_percentage(89.99), HealthStatus::Warning);
        assert_eq!(health_from_percentage(90.0), HealthStatus::Critical);
        assert_eq!(health_from_percentage(99.99), HealthStatus::Critical);
        assert_eq!(health_from_percentage(100.0), HealthStatus::Exceeded);
        assert_eq!(health_from_percentage(-5.0), HealthStatus::Ok);
    }

    #[test]
    fn aggregate_is_worst_wins_and_monotone() {
        let agg = aggregate_health([HealthStatus::Ok, HealthStatus::Warning, HealthStatus::Critical]);
        assert_eq!(agg, HealthStatus::Critical);

        let agg2 = aggregate_health([HealthStatus::Ok, HealthStatus::Warning, HealthStatus::Critical, HealthStatus::Unspecified]);
        assert_eq!(agg2, HealthStatus::Critical);

        let agg3 = aggregate_health([
            HealthStatus::Ok,
            HealthStatus::Warning,
            HealthStatus::Critical,
            HealthStatus::Unspecified,
            HealthStatus::Ok,
        ]);
        assert_eq!(agg3, HealthStatus::Critical);
    }

    #[test]
    fn aggregate_empty_is_unspecified() {
        assert_eq!(aggregate_health(std::iter::empty()), HealthStatus::Unspecified);
    }
}
