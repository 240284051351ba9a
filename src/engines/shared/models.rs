// Core data model: resource descriptors, cost results, overview rows, and budgets.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error_model::{EngineError, ErrorType, Result};

pub const MAX_RESOURCE_TYPE_LEN: usize = 256;
pub const MAX_RESOURCE_ID_LEN: usize = 512;
pub const MAX_MESSAGE_LEN: usize = 1024;
pub const DRIFT_WARNING_THRESHOLD_PCT: f64 = 10.0;
pub const OVERVIEW_CONCURRENCY_LIMIT: usize = 10;

/// An immutable reference to an infrastructure resource, as handed to a plugin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceDescriptor {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub id: String,
    pub provider: String,
    pub properties: HashMap<String, Value>,
}

impl ResourceDescriptor {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        let resource_type = resource_type.into();
        let provider = derive_provider(&resource_type);
        Self {
            resource_type,
            id: id.into(),
            provider,
            properties: HashMap::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.resource_type.is_empty() {
            return Err(EngineError::Validation("resource type must not be empty".into()));
        }
        if self.resource_type.len() > MAX_RESOURCE_TYPE_LEN {
            return Err(EngineError::Validation(format!(
                "resource type exceeds {MAX_RESOURCE_TYPE_LEN} bytes"
            )));
        }
        if self.id.len() > MAX_RESOURCE_ID_LEN {
            return Err(EngineError::Validation(format!(
                "resource id exceeds {MAX_RESOURCE_ID_LEN} bytes"
            )));
        }
        Ok(())
    }
}

/// Lowercased prefix of `resource_type` before the first `:`, or the whole
/// string when there is no separator.
pub fn derive_provider(resource_type: &str) -> String {
    resource_type
        .split(':')
        .next()
        .unwrap_or(resource_type)
        .to_lowercase()
}

#[derive(Debug, Default, Clone)]
pub struct ResourceDescriptorBuilder {
    resource_type: String,
    id: String,
    provider: Option<String>,
    properties: HashMap<String, Value>,
}

impl ResourceDescriptorBuilder {
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn properties(mut self, properties: HashMap<String, Value>) -> Self {
        self.properties = properties;
        self
    }

    pub fn build(self) -> ResourceDescriptor {
        let provider = self.provider.unwrap_or_else(|| derive_provider(&self.resource_type));
        ResourceDescriptor {
            resource_type: self.resource_type,
            id: self.id,
            provider,
            properties: self.properties,
        }
    }
}

/// Per-resource projected monthly cost as returned by a plugin.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CostResult {
    pub resource_type: String,
    pub resource_id: String,
    pub adapter: String,
    pub currency: String,
    pub monthly: f64,
    pub hourly: f64,
    pub total_cost: f64,
    pub breakdown: HashMap<String, f64>,
    pub daily_costs: Vec<f64>,
    pub cost_period: String,
    pub notes: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendations: Option<Vec<Recommendation>>,
}

impl CostResult {
    /// The sentinel result for "no information available for this resource".
    pub fn none_sentinel(resource_type: impl Into<String>, resource_id: impl Into<String>, note: impl Into<String>) -> Self {
        CostResultBuilder::new(resource_type, resource_id)
            .adapter("none")
            .currency("USD")
            .notes(note)
            .build()
    }
}

#[derive(Debug, Clone)]
pub struct CostResultBuilder {
    resource_type: String,
    resource_id: String,
    adapter: String,
    currency: String,
    monthly: f64,
    hourly: f64,
    total_cost: f64,
    breakdown: HashMap<String, f64>,
    daily_costs: Vec<f64>,
    cost_period: String,
    notes: Option<String>,
    start_date: Option<DateTime<Utc>>,
    end_date: Option<DateTime<Utc>>,
    recommendations: Option<Vec<Recommendation>>,
}

impl CostResultBuilder {
    pub fn new(resource_type: impl Into<String>, resource_id: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_id: resource_id.into(),
            adapter: "none".to_string(),
            currency: "USD".to_string(),
            monthly: 0.0,
            hourly: 0.0,
            total_cost: 0.0,
            breakdown: HashMap::new(),
            daily_costs: Vec::new(),
            cost_period: "monthly".to_string(),
            notes: None,
            start_date: None,
            end_date: None,
            recommendations: None,
        }
    }

    pub fn adapter(mut self, adapter: impl Into<String>) -> Self {
        self.adapter = adapter.into();
        self
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn monthly(mut self, monthly: f64) -> Self {
        self.monthly = monthly;
        self.total_cost = monthly;
        self
    }

    pub fn hourly(mut self, hourly: f64) -> Self {
        self.hourly = hourly;
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn recommendations(mut self, recs: Vec<Recommendation>) -> Self {
        self.recommendations = Some(recs);
        self
    }

    pub fn build(self) -> CostResult {
        CostResult {
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            adapter: self.adapter,
            currency: self.currency,
            monthly: self.monthly,
            hourly: self.hourly,
            total_cost: self.total_cost,
            breakdown: self.breakdown,
            daily_costs: self.daily_costs,
            cost_period: self.cost_period,
            notes: self.notes,
            start_date: self.start_date,
            end_date: self.end_date,
            recommendations: self.recommendations,
        }
    }
}

/// A half-open date range `[start, end)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if end <= start {
            return Err(EngineError::Validation("date range end must be strictly after start".into()));
        }
        Ok(Self { start, end })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActualCostData {
    pub mtd_cost: f64,
    pub currency: String,
    pub period: DateRange,
    pub breakdown: HashMap<String, f64>,
}

impl ActualCostData {
    pub fn validate(&self) -> Result<()> {
        if self.mtd_cost < 0.0 {
            return Err(EngineError::Validation("mtd_cost must be >= 0".into()));
        }
        if self.currency.len() != 3 {
            return Err(EngineError::Validation("currency must be exactly 3 characters".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProjectedCostData {
    pub monthly_cost: f64,
    pub currency: String,
    pub breakdown: HashMap<String, f64>,
}

impl ProjectedCostData {
    pub fn validate(&self) -> Result<()> {
        if self.monthly_cost < 0.0 {
            return Err(EngineError::Validation("monthly_cost must be >= 0".into()));
        }
        if self.currency.len() != 3 {
            return Err(EngineError::Validation("currency must be exactly 3 characters".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct CostDriftData {
    pub extrapolated_monthly: f64,
    pub projected: f64,
    pub delta: f64,
    pub percent_drift: f64,
    pub is_warning: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Active,
    Creating,
    Updating,
    Deleting,
    Replacing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverviewRowError {
    pub message: String,
    pub error_type: ErrorType,
    pub retryable: bool,
}

impl OverviewRowError {
    pub fn new(message: impl Into<String>) -> Self {
        let message = super::error_model::truncate_message(&message.into(), MAX_MESSAGE_LEN);
        let error_type = ErrorType::classify(&message);
        Self {
            message,
            retryable: error_type.retryable(),
            error_type,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub id: String,
    pub resource_id: String,
    pub description: String,
    pub estimated_savings: f64,
    pub currency: String,
}

/// A single row in the merged overview: skeleton fields set by the merger,
/// cost/drift/error fields set only by the enricher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverviewRow {
    pub urn: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub resource_id: String,
    pub status: ResourceStatus,
    pub properties: HashMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual_cost: Option<ActualCostData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projected_cost: Option<ProjectedCostData>,
    pub recommendations: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_drift: Option<CostDriftData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OverviewRowError>,
}

impl OverviewRow {
    pub fn skeleton(urn: impl Into<String>, resource_type: impl Into<String>, status: ResourceStatus) -> Self {
        Self {
            urn: urn.into(),
            resource_type: resource_type.into(),
            resource_id: String::new(),
            status,
            properties: HashMap::new(),
            actual_cost: None,
            projected_cost: None,
            recommendations: Vec::new(),
            cost_drift: None,
            error: None,
        }
    }

    pub fn descriptor(&self) -> ResourceDescriptor {
        ResourceDescriptorBuilder::new(self.resource_type.clone(), self.urn.clone())
            .properties(self.properties.clone())
            .build()
    }
}

// --- Budgets -------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Unspecified = 0,
    Ok = 1,
    Warning = 2,
    Critical = 3,
    Exceeded = 4,
}

impl HealthStatus {
    pub fn severity(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BudgetAmount {
    pub limit: f64,
    pub currency: String,
}

impl Default for BudgetAmount {
    fn default() -> Self {
        Self { limit: 0.0, currency: "USD".to_string() }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BudgetStatus {
    pub health: HealthStatus,
    pub current_spend: f64,
    pub percentage_used: f64,
    pub percentage_forecasted: f64,
    pub forecasted_spend: f64,
}

impl Default for BudgetStatus {
    fn default() -> Self {
        Self {
            health: HealthStatus::Unspecified,
            current_spend: 0.0,
            percentage_used: 0.0,
            percentage_forecasted: 0.0,
            forecasted_spend: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdType {
    Actual,
    Forecasted,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BudgetThreshold {
    pub percentage: f64,
    #[serde(rename = "type")]
    pub threshold_type: ThresholdType,
    pub triggered: bool,
    pub triggered_at: Option<DateTime<Utc>>,
}

impl BudgetThreshold {
    pub fn new(percentage: f64, threshold_type: ThresholdType) -> Self {
        Self {
            percentage,
            threshold_type,
            triggered: false,
            triggered_at: None,
        }
    }

    /// The three defaults applied when a budget carries no thresholds of its own.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new(50.0, ThresholdType::Actual),
            Self::new(80.0, ThresholdType::Actual),
            Self::new(100.0, ThresholdType::Actual),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Budget {
    pub id: String,
    pub name: String,
    pub source: String,
    pub amount: BudgetAmount,
    pub status: BudgetStatus,
    pub thresholds: Vec<BudgetThreshold>,
    pub metadata: HashMap<String, String>,
}

impl Budget {
    pub fn validate_currency(currency: &str) -> Result<()> {
        if currency.is_empty() {
            return Ok(());
        }
        if currency.len() == 3 && currency.chars().all(|c| c.is_ascii_uppercase()) {
            Ok(())
        } else {
            Err(EngineError::Validation(format!("invalid currency code: {currency}")))
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.amount.limit < 0.0 {
            return Err(EngineError::Validation("budget limit must be >= 0".into()));
        }
        Budget::validate_currency(&self.amount.currency)
    }
}

#[derive(Debug, Default, Clone)]
pub struct BudgetBuilder {
    id: String,
    name: String,
    source: String,
    amount: BudgetAmount,
    thresholds: Vec<BudgetThreshold>,
    metadata: HashMap<String, String>,
}

impl BudgetBuilder {
    pub fn new(id: impl Into<String>, limit: f64) -> Self {
        Self {
            id: id.into(),
            amount: BudgetAmount { limit, currency: "USD".to_string() },
            ..Default::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.amount.currency = currency.into();
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn threshold(mut self, threshold: BudgetThreshold) -> Self {
        self.thresholds.push(threshold);
        self
    }

    pub fn build(self) -> Budget {
        Budget {
            id: self.id,
            name: self.name,
            source: self.source,
            amount: self.amount,
            status: BudgetStatus::default(),
            thresholds: self.thresholds,
            metadata: self.metadata,
        }
    }
}

/// A priority-ranked tag selector budget, per §4.H tag scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TagBudget {
    pub selector: String,
    pub priority: i64,
    pub amount: BudgetAmount,
}

/// The configured tree of scoped budgets: global, per-provider, tag, per-type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScopedBudgetSet {
    pub global: Option<BudgetAmount>,
    pub provider: HashMap<String, BudgetAmount>,
    pub tag_budgets: Vec<TagBudget>,
    pub resource_type: HashMap<String, BudgetAmount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScopeResult {
    pub scope_id: String,
    pub amount: BudgetAmount,
    pub status: BudgetStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BudgetAllocation {
    pub resource_type: String,
    pub provider: String,
    pub cost: f64,
    pub allocated_scopes: Vec<String>,
    pub matched_tags: Vec<String>,
    pub selected_tag_budget: Option<String>,
    pub warnings: Vec<String>,
}

// --- Dismissal -------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DismissalStatus {
    Active,
    Dismissed,
    Snoozed,
}

/// Closed set of dismissal reason codes.
pub const DISMISSAL_REASONS: [&str; 7] = [
    "not-applicable",
    "already-implemented",
    "business-constraint",
    "technical-constraint",
    "deferred",
    "inaccurate",
    "other",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LifecycleEvent {
    pub action: DismissalStatus,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DismissalRecord {
    pub recommendation_id: String,
    pub status: DismissalStatus,
    pub reason: String,
    pub custom_reason: Option<String>,
    pub dismissed_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_known: Option<Recommendation>,
    pub history: Vec<LifecycleEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_provider_from_type_prefix() {
        assert_eq!(derive_provider("AWS:EC2:Instance"), "aws");
        assert_eq!(derive_provider("noprefix"), "noprefix");
    }

    #[test]
    fn resource_descriptor_validate_rejects_empty_type() {
        let d = ResourceDescriptorBuilder::new("", "id").build();
        assert!(d.validate().is_err());
    }

    #[test]
    fn budget_currency_validation() {
        assert!(Budget::validate_currency("USD").is_ok());
        assert!(Budget::validate_currency("usd").is_err());
        assert!(Budget::validate_currency("").is_ok());
    }

    #[test]
    fn date_range_rejects_non_increasing_bounds() {
        let t = Utc::now();
        assert!(DateRange::new(t, t).is_err());
    }
}
