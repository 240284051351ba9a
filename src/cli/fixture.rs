// In-process plugin fixture. Plugin processes and their wire protocol are
// out of scope for the engine core; this is the one concrete `Plugin` this
// repo ships to exercise the CLI end to end without a live subprocess.

use async_trait::async_trait;
use std::collections::HashMap;

use crate::engines::core::plugin::{Plugin, UsageProfile};
use crate::engines::shared::error_model::{EngineError, Result};
use crate::engines::shared::models::{
    Budget, BudgetBuilder, CostResult, CostResultBuilder, DateRange, Recommendation,
    ResourceDescriptor,
};

pub struct FixturePlugin {
    name: String,
}

impl FixturePlugin {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    fn monthly_for(descriptor: &ResourceDescriptor) -> f64 {
        match descriptor.properties.get("instanceType").and_then(|v| v.as_str()) {
            Some("m5.large") => 200.0,
            Some("t3.micro") => 50.0,
            _ => 100.0,
        }
    }
}

#[async_trait]
impl Plugin for FixturePlugin {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_projected_cost(&self, descriptors: &[ResourceDescriptor]) -> Result<Vec<CostResult>> {
        Ok(descriptors
            .iter()
            .map(|d| {
                CostResultBuilder::new(d.resource_type.clone(), d.id.clone())
                    .adapter(self.name.clone())
                    .currency("USD")
                    .monthly(Self::monthly_for(d))
                    .build()
            })
            .collect())
    }

    async fn get_actual_cost(&self, descriptors: &[ResourceDescriptor], _period: DateRange) -> Result<Vec<CostResult>> {
        Ok(descriptors
            .iter()
            .map(|d| {
                CostResultBuilder::new(d.resource_type.clone(), d.id.clone())
                    .adapter(self.name.clone())
                    .currency("USD")
                    .monthly(Self::monthly_for(d) * 0.5)
                    .build()
            })
            .collect())
    }

    async fn get_recommendations(&self, _descriptors: &[ResourceDescriptor], _excluded_ids: &[String]) -> Result<Vec<Recommendation>> {
        Ok(Vec::new())
    }

    async fn get_budgets(&self) -> Result<Vec<Budget>> {
        Ok(vec![BudgetBuilder::new("default", 1000.0).name("default").source(self.name.clone()).build()])
    }

    async fn estimate_cost(
        &self,
        _descriptor: &ResourceDescriptor,
        _overrides: &HashMap<String, String>,
        _usage_profile: &UsageProfile,
    ) -> Result<CostResult> {
        Err(EngineError::Unimplemented {
            plugin: self.name.clone(),
            operation: "estimate_cost".to_string(),
        })
    }
}
