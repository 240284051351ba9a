// Scoped Budget Evaluator: allocates a resource's cost across global/provider/tag/type.

use std::collections::HashMap;

use crate::engines::core::budget_health::{aggregate_health, health_from_percentage};
use crate::engines::shared::models::{
    BudgetAllocation, BudgetAmount, BudgetStatus, HealthStatus, ScopeResult, ScopedBudgetSet,
};

/// Opaque selector predicate: `key=value`, optionally compound as
/// `k1=v1,k2=v2` where every clause must match.
pub fn selector_matches(selector: &str, tags: &HashMap<String, String>) -> bool {
    selector.split(',').all(|clause| {
        let clause = clause.trim();
        match clause.split_once('=') {
            Some((k, v)) => tags.get(k.trim()).map(|actual| actual == v.trim()).unwrap_or(false),
            None => false,
        }
    })
}

fn status_for(current_spend: f64, amount: f64) -> BudgetStatus {
    let percentage = if amount != 0.0 { current_spend / amount * 100.0 } else { 0.0 };
    BudgetStatus {
        health: health_from_percentage(percentage),
        current_spend,
        percentage_used: percentage,
        percentage_forecasted: 0.0,
        forecasted_spend: 0.0,
    }
}

pub struct ScopedEvaluation {
    pub allocation: BudgetAllocation,
    pub global: Option<ScopeResult>,
    pub provider: Option<ScopeResult>,
    pub tag: Option<ScopeResult>,
    pub resource_type: Option<ScopeResult>,
    pub overall_health: HealthStatus,
    pub critical_scopes: Vec<String>,
}

/// Evaluates one resource's allocation across all configured scopes. Checks
/// cancellation before running and returns `None` on cancel, per §5.
pub fn evaluate_allocation(
    resource_type: &str,
    provider: &str,
    tags: &HashMap<String, String>,
    cost: f64,
    config: &ScopedBudgetSet,
    cancelled: &dyn Fn() -> bool,
) -> Option<ScopedEvaluation> {
    if cancelled() {
        return None;
    }

    let mut allocation = BudgetAllocation {
        resource_type: resource_type.to_string(),
        provider: provider.to_string(),
        cost,
        ..Default::default()
    };

    let global = config.global.map(|amount| {
        allocation.allocated_scopes.push("global".to_string());
        ScopeResult { scope_id: "global".to_string(), amount, status: status_for(cost, amount.limit) }
    });

    let provider_key = provider.to_lowercase();
    let provider_scope = config.provider.get(&provider_key).map(|amount| {
        let scope_id = format!("provider:{provider_key}");
        allocation.allocated_scopes.push(scope_id.clone());
        ScopeResult { scope_id, amount: *amount, status: status_for(cost, amount.limit) }
    });

    let tag_scope = select_tag_budget(config, tags).map(|(selector, amount, warning)| {
        let scope_id = format!("tag:{selector}");
        allocation.allocated_scopes.push(scope_id.clone());
        allocation.matched_tags = tags.keys().cloned().collect();
        allocation.selected_tag_budget = Some(selector.clone());
        if let Some(w) = warning {
            allocation.warnings.push(w);
        }
        ScopeResult { scope_id, amount, status: status_for(cost, amount.limit) }
    });

    let type_scope = config.resource_type.get(resource_type).map(|amount| {
        let scope_id = format!("type:{resource_type}");
        allocation.allocated_scopes.push(scope_id.clone());
        ScopeResult { scope_id, amount: *amount, status: status_for(cost, amount.limit) }
    });

    let mut all_health: Vec<HealthStatus> = vec![];
    if let Some(s) = &global { all_health.push(s.status.health) }
    if let Some(s) = &provider_scope { all_health.push(s.status.health) }
    if let Some(s) = &tag_scope { all_health.push(s.status.health) }
    if let Some(s) = &type_scope { all_health.push(s.status.health) }
    let overall_health = aggregate_health(all_health);

    let mut critical_scopes = vec![];
    for s in [&global, &provider_scope, &tag_scope, &type_scope].into_iter().flatten() {
        if matches!(s.status.health, HealthStatus::Critical | HealthStatus::Exceeded) {
            critical_scopes.push(s.scope_id.clone());
        }
    }

    Some(ScopedEvaluation {
        allocation,
        global,
        provider: provider_scope,
        tag: tag_scope,
        resource_type: type_scope,
        overall_health,
        critical_scopes,
    })
}

/// Pre-sorts by descending priority, keeps the highest-priority matches, and
/// breaks ties lexicographically while emitting a conflict warning.
fn select_tag_budget(
    config: &ScopedBudgetSet,
    tags: &HashMap<String, String>,
) -> Option<(String, BudgetAmount, Option<String>)> {
    let mut candidates: Vec<_> = config.tag_budgets.iter().filter(|tb| selector_matches(&tb.selector, tags)).collect();
    if candidates.is_empty() {
        return None;
    }
    candidates.sort_by(|a, b| b.priority.cmp(&a.priority));

    let top_priority = candidates[0].priority;
    let mut tied: Vec<_> = candidates.into_iter().filter(|c| c.priority == top_priority).collect();

    if tied.len() == 1 {
        let tb = tied[0];
        return Some((tb.selector.clone(), tb.amount, None));
    }

    tied.sort_by(|a, b| a.selector.cmp(&b.selector));
    let chosen = tied[0];
    let warning = Some(format!(
        "tag budget conflict at priority {top_priority}: selected '{}' over {} other candidate(s)",
        chosen.selector,
        tied.len() - 1
    ));
    Some((chosen.selector.clone(), chosen.amount, warning))
}
