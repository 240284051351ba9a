// Plugin Host Façade: uniform invocation of external cost sources.

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::timeout;

use crate::engines::shared::error_model::{EngineError, Result};
use crate::engines::shared::models::{
    Budget, CostResult, DateRange, Recommendation, ResourceDescriptor,
};

/// Usage assumptions supplied to a what-if estimate; the plugin decides how to
/// interpret them (e.g. expected monthly requests, traffic shape).
#[derive(Debug, Clone, Default)]
pub struct UsageProfile {
    pub assumptions: std::collections::HashMap<String, String>,
}

/// Every cost source implements the same logical interface. A plugin that
/// lacks an operation returns `EngineError::Unimplemented` rather than being
/// queried for capability up front — capability discovery is runtime.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    async fn get_projected_cost(&self, descriptors: &[ResourceDescriptor]) -> Result<Vec<CostResult>>;

    async fn get_actual_cost(
        &self,
        descriptors: &[ResourceDescriptor],
        period: DateRange,
    ) -> Result<Vec<CostResult>>;

    async fn get_recommendations(
        &self,
        descriptors: &[ResourceDescriptor],
        excluded_ids: &[String],
    ) -> Result<Vec<Recommendation>>;

    async fn get_budgets(&self) -> Result<Vec<Budget>>;

    /// May return `EngineError::Unimplemented` to signal the estimator should
    /// fall back to the double-baseline strategy.
    async fn estimate_cost(
        &self,
        descriptor: &ResourceDescriptor,
        overrides: &std::collections::HashMap<String, String>,
        usage_profile: &UsageProfile,
    ) -> Result<CostResult>;
}

/// Wraps any plugin call with a per-resource deadline, translating a runtime
/// timeout into `EngineError::Deadline`. The façade never retries.
pub async fn with_deadline<F, T>(plugin_name: &str, timeout_ms: u64, fut: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match timeout(Duration::from_millis(timeout_ms), fut).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Deadline {
            plugin: plugin_name.to_string(),
            timeout_ms,
        }),
    }
}
