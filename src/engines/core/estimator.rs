// What-If Estimator: native RPC attempt loop with a double-baseline fallback.

use std::collections::HashMap;
use std::sync::Arc;

use crate::engines::core::plugin::{with_deadline, Plugin, UsageProfile};
use crate::engines::shared::error_model::{EngineError, Result};
use crate::engines::shared::models::{CostResult, CostResultBuilder, ResourceDescriptor, ResourceDescriptorBuilder};

#[derive(Debug, Clone)]
pub struct CostDelta {
    pub property: String,
    pub original_value: String,
    pub new_value: String,
    pub cost_change: f64,
}

#[derive(Debug, Clone)]
pub struct EstimateResult {
    pub used_fallback: bool,
    pub total_change: f64,
    pub deltas: Vec<CostDelta>,
}

pub struct EstimateRequest {
    pub resource: ResourceDescriptor,
    pub property_overrides: HashMap<String, String>,
    pub usage_profile: UsageProfile,
}

fn validate_request(request: &EstimateRequest) -> Result<()> {
    if request.resource.resource_type.is_empty() {
        return Err(EngineError::Validation("resource type must not be empty".into()));
    }
    request.resource.validate()
}

pub async fn estimate_cost(
    request: EstimateRequest,
    plugins: &[Arc<dyn Plugin>],
    per_resource_timeout_ms: u64,
) -> Result<EstimateResult> {
    validate_request(&request)?;

    for plugin in plugins {
        let call = with_deadline(
            plugin.name(),
            per_resource_timeout_ms,
            plugin.estimate_cost(&request.resource, &request.property_overrides, &request.usage_profile),
        );
        match call.await {
            Ok(result) => {
                // `estimate_cost` reports the resource's monthly cost under the
                // overrides, not a delta; diff it against the unmodified baseline
                // the same way the fallback path does, so a cost-reducing change
                // can surface as a negative total_change.
                let baseline = project_first(plugins, &request.resource, per_resource_timeout_ms)
                    .await
                    .unwrap_or_else(|| zero_cost_sentinel(&request.resource, "no plugin returned a baseline"));
                let total_change = result.monthly - baseline.monthly;
                return Ok(native_result_to_estimate(&request, total_change));
            }
            Err(EngineError::Unimplemented { .. }) => continue,
            Err(EngineError::Cancellation) => return Err(EngineError::Cancellation),
            Err(EngineError::Deadline { .. }) => continue,
            Err(_) => continue,
        }
    }

    fallback_estimate(request, plugins, per_resource_timeout_ms).await
}

fn native_result_to_estimate(request: &EstimateRequest, total_change: f64) -> EstimateResult {
    EstimateResult {
        used_fallback: false,
        total_change,
        deltas: deltas_for_overrides(request, total_change),
    }
}

async fn fallback_estimate(
    request: EstimateRequest,
    plugins: &[Arc<dyn Plugin>],
    per_resource_timeout_ms: u64,
) -> Result<EstimateResult> {
    let baseline = project_first(plugins, &request.resource, per_resource_timeout_ms)
        .await
        .unwrap_or_else(|| zero_cost_sentinel(&request.resource, "no plugin returned a baseline"));

    let mut modified_properties = request.resource.properties.clone();
    for (key, value) in &request.property_overrides {
        modified_properties.insert(key.clone(), serde_json::Value::String(value.clone()));
    }
    let modified_descriptor = ResourceDescriptorBuilder::new(request.resource.resource_type.clone(), request.resource.id.clone())
        .properties(modified_properties)
        .build();
    modified_descriptor.validate()?;

    let modified = project_first(plugins, &modified_descriptor, per_resource_timeout_ms)
        .await
        .unwrap_or_else(|| zero_cost_sentinel(&modified_descriptor, "no plugin returned a modified estimate"));

    let total_change = modified.monthly - baseline.monthly;

    Ok(EstimateResult {
        used_fallback: true,
        total_change,
        deltas: deltas_for_overrides(&request, total_change),
    })
}

async fn project_first(plugins: &[Arc<dyn Plugin>], descriptor: &ResourceDescriptor, timeout_ms: u64) -> Option<CostResult> {
    for plugin in plugins {
        if let Ok(mut results) = with_deadline(plugin.name(), timeout_ms, plugin.get_projected_cost(std::slice::from_ref(descriptor))).await {
            if let Some(r) = results.drain(..).next() {
                return Some(r);
            }
        }
    }
    None
}

fn zero_cost_sentinel(descriptor: &ResourceDescriptor, note: &str) -> CostResult {
    CostResultBuilder::new(descriptor.resource_type.clone(), descriptor.id.clone())
        .adapter("none")
        .notes(note)
        .build()
}

fn deltas_for_overrides(request: &EstimateRequest, total_change: f64) -> Vec<CostDelta> {
    match request.property_overrides.len() {
        0 => vec![],
        1 => {
            let (property, new_value) = request.property_overrides.iter().next().unwrap();
            let original_value = request
                .resource
                .properties
                .get(property)
                .map(|v| v.as_str().map(|s| s.to_string()).unwrap_or_else(|| v.to_string()))
                .unwrap_or_default();
            vec![CostDelta { property: property.clone(), original_value, new_value: new_value.clone(), cost_change: total_change }]
        }
        _ => vec![CostDelta {
            property: "combined".to_string(),
            original_value: String::new(),
            new_value: String::new(),
            cost_change: total_change,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::shared::models::{Budget, DateRange, Recommendation};
    use async_trait::async_trait;
    use serde_json::json;

    struct NoEstimatePlugin;

    #[async_trait]
    impl Plugin for NoEstimatePlugin {
        fn name(&self) -> &str {
            "no-estimate"
        }
        async fn get_projected_cost(&self, descriptors: &[ResourceDescriptor]) -> Result<Vec<CostResult>> {
            Ok(descriptors
                .iter()
                .map(|d| {
                    let monthly = if d.properties.get("instanceType").and_then(|v| v.as_str()) == Some("m5.large") {
                        200.0
                    } else {
                        50.0
                    };
                    CostResultBuilder::new(d.resource_type.clone(), d.id.clone()).adapter("fixture").monthly(monthly).build()
                })
                .collect())
        }
        async fn get_actual_cost(&self, _d: &[ResourceDescriptor], _p: DateRange) -> Result<Vec<CostResult>> {
            Ok(vec![])
        }
        async fn get_recommendations(&self, _d: &[ResourceDescriptor], _e: &[String]) -> Result<Vec<Recommendation>> {
            Ok(vec![])
        }
        async fn get_budgets(&self) -> Result<Vec<Budget>> {
            Ok(vec![])
        }
        async fn estimate_cost(
            &self,
            _d: &ResourceDescriptor,
            _o: &HashMap<String, String>,
            _u: &UsageProfile,
        ) -> Result<CostResult> {
            Err(EngineError::Unimplemented { plugin: self.name().to_string(), operation: "EstimateCost".to_string() })
        }
    }

    struct NativeEstimatePlugin;

    #[async_trait]
    impl Plugin for NativeEstimatePlugin {
        fn name(&self) -> &str {
            "native-estimate"
        }
        async fn get_projected_cost(&self, descriptors: &[ResourceDescriptor]) -> Result<Vec<CostResult>> {
            Ok(descriptors.iter().map(|d| CostResultBuilder::new(d.resource_type.clone(), d.id.clone()).adapter("fixture").monthly(200.0).build()).collect())
        }
        async fn get_actual_cost(&self, _d: &[ResourceDescriptor], _p: DateRange) -> Result<Vec<CostResult>> {
            Ok(vec![])
        }
        async fn get_recommendations(&self, _d: &[ResourceDescriptor], _e: &[String]) -> Result<Vec<Recommendation>> {
            Ok(vec![])
        }
        async fn get_budgets(&self) -> Result<Vec<Budget>> {
            Ok(vec![])
        }
        async fn estimate_cost(
            &self,
            d: &ResourceDescriptor,
            _o: &HashMap<String, String>,
            _u: &UsageProfile,
        ) -> Result<CostResult> {
            Ok(CostResultBuilder::new(d.resource_type.clone(), d.id.clone()).adapter(self.name().to_string()).monthly(75.0).build())
        }
    }

    #[tokio::test]
    async fn native_estimate_can_produce_a_negative_delta() {
        let resource = ResourceDescriptor::new("aws:ec2:instance", "urn:1");
        let request = EstimateRequest {
            resource,
            property_overrides: HashMap::from([("instanceType".to_string(), "t3.micro".to_string())]),
            usage_profile: UsageProfile::default(),
        };
        let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(NativeEstimatePlugin)];
        let result = estimate_cost(request, &plugins, 5000).await.unwrap();

        assert!(!result.used_fallback);
        // baseline (projected) 200.0, native estimate 75.0 -> delta is negative.
        assert!((result.total_change - (-125.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn falls_back_to_double_baseline_when_unimplemented() {
        let mut resource = ResourceDescriptor::new("aws:ec2:instance", "urn:1");
        resource.properties.insert("instanceType".to_string(), json!("t3.micro"));

        let request = EstimateRequest {
            resource,
            property_overrides: HashMap::from([("instanceType".to_string(), "m5.large".to_string())]),
            usage_profile: UsageProfile::default(),
        };

        let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(NoEstimatePlugin)];
        let result = estimate_cost(request, &plugins, 5000).await.unwrap();

        assert!(result.used_fallback);
        assert_eq!(result.deltas.len(), 1);
        assert_eq!(result.deltas[0].property, "instanceType");
        assert_eq!(result.deltas[0].original_value, "t3.micro");
        assert_eq!(result.deltas[0].new_value, "m5.large");
        assert!((result.total_change - 150.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn zero_overrides_yields_no_deltas() {
        let resource = ResourceDescriptor::new("aws:ec2:instance", "urn:1");
        let request = EstimateRequest { resource, property_overrides: HashMap::new(), usage_profile: UsageProfile::default() };
        let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(NoEstimatePlugin)];
        let result = estimate_cost(request, &plugins, 5000).await.unwrap();
        assert!(result.deltas.is_empty());
        assert_eq!(result.total_change, 0.0);
    }

    #[tokio::test]
    async fn multiple_overrides_yield_a_single_combined_delta() {
        let resource = ResourceDescriptor::new("aws:ec2:instance", "urn:1");
        let request = EstimateRequest {
            resource,
            property_overrides: HashMap::from([
                ("instanceType".to_string(), "m5.large".to_string()),
                ("region".to_string(), "us-west-2".to_string()),
            ]),
            usage_profile: UsageProfile::default(),
        };
        let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(NoEstimatePlugin)];
        let result = estimate_cost(request, &plugins, 5000).await.unwrap();
        assert_eq!(result.deltas.len(), 1);
        assert_eq!(result.deltas[0].property, "combined");
    }
}
