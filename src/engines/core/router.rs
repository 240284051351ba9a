// Router: selects an ordered set of plugins for a resource/feature pair.

use std::sync::Arc;

use crate::engines::core::plugin::Plugin;
use crate::engines::shared::models::ResourceDescriptor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    ProjectedCosts,
    ActualCosts,
    Recommendations,
    Budgets,
}

#[derive(Clone)]
pub struct PluginMatch {
    pub client: Arc<dyn Plugin>,
    pub priority: i64,
    pub fallback: bool,
    pub match_reason: String,
    pub source: String,
}

/// A routing rule binds a resource-type prefix and feature to a preferred
/// plugin name with a priority; the router is otherwise pure data plus
/// selection logic — no side effects, no blocking.
#[derive(Debug, Clone)]
pub struct RoutingRule {
    pub resource_type_prefix: String,
    pub feature: Feature,
    pub plugin_name: String,
    pub priority: i64,
    pub veto_fallback: bool,
}

pub struct Router {
    plugins: Vec<Arc<dyn Plugin>>,
    rules: Vec<RoutingRule>,
}

impl Router {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>, rules: Vec<RoutingRule>) -> Self {
        Self { plugins, rules }
    }

    pub fn should_fallback(&self, plugin_name: &str) -> bool {
        !self.rules.iter().any(|r| r.plugin_name == plugin_name && r.veto_fallback)
    }

    /// Selection is pure: matches are computed from the rule table and the
    /// registered plugin list only. If no rule matches, the caller falls back
    /// to every registered plugin in registration order.
    pub fn route(&self, descriptor: &ResourceDescriptor, feature: Feature) -> Vec<PluginMatch> {
        let mut matches: Vec<PluginMatch> = self
            .rules
            .iter()
            .filter(|r| r.feature == feature && descriptor.resource_type.starts_with(&r.resource_type_prefix))
            .filter_map(|r| {
                self.plugins
                    .iter()
                    .find(|p| p.name() == r.plugin_name)
                    .map(|p| PluginMatch {
                        client: p.clone(),
                        priority: r.priority,
                        fallback: !r.veto_fallback,
                        match_reason: format!("type prefix '{}'", r.resource_type_prefix),
                        source: r.plugin_name.clone(),
                    })
            })
            .collect();

        if matches.is_empty() {
            return self
                .plugins
                .iter()
                .map(|p| PluginMatch {
                    client: p.clone(),
                    priority: 0,
                    fallback: true,
                    match_reason: "no routing rule matched, falling back to all plugins".to_string(),
                    source: p.name().to_string(),
                })
                .collect();
        }

        matches.sort_by(|a, b| b.priority.cmp(&a.priority));
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::core::plugin::UsageProfile;
    use crate::engines::shared::error_model::Result;
    use crate::engines::shared::models::{Budget, CostResult, DateRange, Recommendation};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct NamedPlugin(&'static str);

    #[async_trait]
    impl Plugin for NamedPlugin {
        fn name(&self) -> &str {
            self.0
        }
        async fn get_projected_cost(&self, _d: &[ResourceDescriptor]) -> Result<Vec<CostResult>> {
            Ok(vec![])
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
            unimplemented!()
        }
    }

    #[test]
    fn falls_back_to_all_plugins_when_no_rule_matches() {
        let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(NamedPlugin("aws-pricing")), Arc::new(NamedPlugin("gcp-pricing"))];
        let router = Router::new(plugins, vec![]);
        let descriptor = ResourceDescriptor::new("aws:ec2:instance", "urn:1");
        let matches = router.route(&descriptor, Feature::ProjectedCosts);
        assert_eq!(matches.len(), 2);
        assert!(matches.iter().all(|m| m.fallback));
    }

    #[test]
    fn rule_match_sorted_by_descending_priority() {
        let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(NamedPlugin("a")), Arc::new(NamedPlugin("b"))];
        let rules = vec![
            RoutingRule { resource_type_prefix: "aws:".into(), feature: Feature::ProjectedCosts, plugin_name: "a".into(), priority: 1, veto_fallback: false },
            RoutingRule { resource_type_prefix: "aws:".into(), feature: Feature::ProjectedCosts, plugin_name: "b".into(), priority: 5, veto_fallback: false },
        ];
        let router = Router::new(plugins, rules);
        let descriptor = ResourceDescriptor::new("aws:ec2:instance", "urn:1");
        let matches = router.route(&descriptor, Feature::ProjectedCosts);
        assert_eq!(matches[0].source, "b");
        assert_eq!(matches[1].source, "a");
    }

    #[test]
    fn should_fallback_respects_veto() {
        let plugins: Vec<Arc<dyn Plugin>> = vec![Arc::new(NamedPlugin("authoritative"))];
        let rules = vec![RoutingRule {
            resource_type_prefix: "aws:".into(),
            feature: Feature::Budgets,
            plugin_name: "authoritative".into(),
            priority: 10,
            veto_fallback: true,
        }];
        let router = Router::new(plugins, rules);
        assert!(!router.should_fallback("authoritative"));
        assert!(router.should_fallback("unrelated"));
    }
}
