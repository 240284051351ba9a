// Output Renderer: table, structured document, and line-delimited formats.

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engines::shared::models::{OverviewRow, OverviewRowError, ResourceStatus};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("resources carry mixed currencies")]
    MixedCurrencies,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackContext {
    pub stack_name: String,
    pub region: String,
    pub time_window: String,
    pub has_changes: bool,
    pub total_resources: usize,
    pub pending_changes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverviewSummary {
    pub total_actual_mtd: f64,
    pub projected_monthly: f64,
    pub projected_delta: f64,
    pub potential_savings: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverviewDocument {
    pub metadata: StackContext,
    pub resources: Vec<OverviewRow>,
    pub summary: OverviewSummary,
    pub errors: Vec<OverviewRowError>,
}

fn single_non_empty_currency(rows: &[OverviewRow]) -> Result<String, RenderError> {
    let mut currency: Option<String> = None;
    for row in rows {
        for c in [row.actual_cost.as_ref().map(|a| &a.currency), row.projected_cost.as_ref().map(|p| &p.currency)].into_iter().flatten() {
            if c.is_empty() {
                continue;
            }
            match &currency {
                None => currency = Some(c.clone()),
                Some(existing) if existing != c => return Err(RenderError::MixedCurrencies),
                _ => {}
            }
        }
    }
    Ok(currency.unwrap_or_else(|| "USD".to_string()))
}

pub fn summarize(rows: &[OverviewRow]) -> Result<OverviewSummary, RenderError> {
    let currency = single_non_empty_currency(rows)?;
    let total_actual_mtd: f64 = rows.iter().filter_map(|r| r.actual_cost.as_ref()).map(|a| a.mtd_cost).sum();
    let projected_monthly: f64 = rows.iter().filter_map(|r| r.projected_cost.as_ref()).map(|p| p.monthly_cost).sum();
    let potential_savings: f64 = rows.iter().flat_map(|r| r.recommendations.iter()).map(|rec| rec.estimated_savings).sum();

    Ok(OverviewSummary {
        total_actual_mtd,
        projected_monthly,
        projected_delta: projected_monthly - total_actual_mtd,
        potential_savings,
        currency,
    })
}

pub fn build_document(stack_name: &str, region: &str, time_window: &str, rows: Vec<OverviewRow>) -> Result<OverviewDocument, RenderError> {
    let summary = summarize(&rows)?;
    let errors: Vec<OverviewRowError> = rows.iter().filter_map(|r| r.error.clone()).collect();
    let pending_changes = rows.iter().filter(|r| !matches!(r.status, ResourceStatus::Active)).count();
    let metadata = StackContext {
        stack_name: stack_name.to_string(),
        region: region.to_string(),
        time_window: time_window.to_string(),
        has_changes: pending_changes > 0,
        total_resources: rows.len(),
        pending_changes,
        generated_at: Some(Utc::now()),
    };
    Ok(OverviewDocument { metadata, resources: rows, summary, errors })
}

/// Inserts a comma every three digits from the right: `"1234" -> "1,234"`.
fn group_thousands(digits: &str) -> String {
    let bytes = digits.as_bytes();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 && (bytes.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(*b as char);
    }
    grouped
}

fn format_money(amount: f64) -> String {
    let formatted = format!("{:.2}", amount.abs());
    let (whole, cents) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));
    format!("{}.{cents}", group_thousands(whole))
}

fn format_currency(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    format!("{sign}${}", format_money(amount))
}

fn format_delta(delta: f64) -> String {
    if delta > 0.0 {
        format!("+${}", format_money(delta))
    } else if delta < 0.0 {
        format!("-${}", format_money(delta))
    } else {
        "$0.00".to_string()
    }
}

fn format_drift(percent: f64, is_warning: bool) -> String {
    let sign = if percent >= 0.0 { "+" } else { "-" };
    let base = format!("{sign}{:.0}%", percent.abs());
    if is_warning {
        format!("{base} ⚠")
    } else {
        base
    }
}

fn truncate_col(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        format!("{s:<width$}")
    } else {
        let truncated: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}

/// Fixed-width columns: resource 34, type 24, status 12, actual 14,
/// projected 14, delta 14, drift 10, recs 6.
pub fn render_table(rows: &[OverviewRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<34} {:<24} {:<12} {:>14} {:>14} {:>14} {:>10} {:>6}\n",
        "RESOURCE", "TYPE", "STATUS", "ACTUAL", "PROJECTED", "DELTA", "DRIFT", "RECS"
    ));

    for row in rows {
        let actual = row.actual_cost.as_ref().map(|a| format_currency(a.mtd_cost)).unwrap_or_else(|| "-".to_string());
        let projected = row.projected_cost.as_ref().map(|p| format_currency(p.monthly_cost)).unwrap_or_else(|| "-".to_string());
        let delta = row
            .cost_drift
            .as_ref()
            .map(|d| format_delta(d.delta))
            .unwrap_or_else(|| "-".to_string());
        let drift = row.cost_drift.as_ref().map(|d| format_drift(d.percent_drift, d.is_warning)).unwrap_or_else(|| "-".to_string());
        let status_str = format!("{:?}", row.status).to_lowercase();
        let status_colored = match row.status {
            ResourceStatus::Deleting => status_str.red().to_string(),
            ResourceStatus::Creating => status_str.green().to_string(),
            _ => status_str,
        };

        out.push_str(&format!(
            "{} {} {:<12} {:>14} {:>14} {:>14} {:>10} {:>6}\n",
            truncate_col(&row.urn, 34),
            truncate_col(&row.resource_type, 24),
            status_colored,
            actual,
            projected,
            delta,
            drift,
            row.recommendations.len(),
        ));
    }

    out
}

/// One row per line, no wrapper.
pub fn render_line_delimited(rows: &[OverviewRow]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for row in rows {
        out.push_str(&serde_json::to_string(row)?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::shared::models::{ActualCostData, DateRange, ProjectedCostData};
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn row_with_currency(urn: &str, currency: &str) -> OverviewRow {
        let mut row = OverviewRow::skeleton(urn, "aws:ec2:instance", ResourceStatus::Active);
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap();
        row.actual_cost = Some(ActualCostData { mtd_cost: 100.0, currency: currency.to_string(), period: DateRange::new(start, end).unwrap(), breakdown: HashMap::new() });
        row.projected_cost = Some(ProjectedCostData { monthly_cost: 300.0, currency: currency.to_string(), breakdown: HashMap::new() });
        row
    }

    #[test]
    fn summary_sums_actual_and_projected() {
        let rows = vec![row_with_currency("a", "USD"), row_with_currency("b", "USD")];
        let summary = summarize(&rows).unwrap();
        assert_eq!(summary.total_actual_mtd, 200.0);
        assert_eq!(summary.projected_monthly, 600.0);
    }

    #[test]
    fn mixed_currencies_is_an_error() {
        let rows = vec![row_with_currency("a", "USD"), row_with_currency("b", "EUR")];
        assert!(matches!(summarize(&rows), Err(RenderError::MixedCurrencies)));
    }

    #[test]
    fn currency_formatting() {
        assert_eq!(format_currency(1234.5), "$1,234.50");
        assert_eq!(format_currency(-50.0), "-$50.00");
        assert_eq!(format_currency(1_234_567.89), "$1,234,567.89");
        assert_eq!(format_delta(0.0), "$0.00");
        assert_eq!(format_delta(12.3), "+$12.30");
        assert_eq!(format_delta(-12.3), "-$12.30");
        assert_eq!(format_delta(1234.5), "+$1,234.50");
    }

    #[test]
    fn line_delimited_emits_one_row_per_line() {
        let rows = vec![row_with_currency("a", "USD"), row_with_currency("b", "USD")];
        let out = render_line_delimited(&rows).unwrap();
        assert_eq!(out.lines().count(), 2);
    }
}
