// Budget Filtering: conjunctive-across-fields, disjunctive-within-field filter.

use std::collections::HashMap;

use glob::Pattern;

use crate::engines::shared::models::Budget;

#[derive(Debug, Clone, Default)]
pub struct BudgetFilter {
    pub providers: Vec<String>,
    pub regions: Vec<String>,
    pub resource_types: Vec<String>,
    pub tags: HashMap<String, String>,
}

fn any_case_insensitive_eq(candidates: &[String], value: &str) -> bool {
    candidates.iter().any(|c| c.eq_ignore_ascii_case(value))
}

fn metadata_eq_any(metadata: &HashMap<String, String>, key: &str, candidates: &[String]) -> bool {
    if candidates.is_empty() {
        return true;
    }
    match metadata.get(key) {
        Some(v) => any_case_insensitive_eq(candidates, v),
        None => false,
    }
}

/// Stored-value glob match: case-sensitive, empty pattern matches only empty
/// values, an invalid pattern is treated as non-match.
fn glob_match(pattern: &str, value: &str) -> bool {
    if pattern.is_empty() {
        return value.is_empty();
    }
    match Pattern::new(pattern) {
        Ok(p) => p.matches(value),
        Err(_) => false,
    }
}

fn tag_value<'a>(metadata: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    metadata
        .get(key)
        .or_else(|| metadata.get(&format!("tag:{key}")))
        .map(|s| s.as_str())
}

fn matches(budget: &Budget, filter: &BudgetFilter) -> bool {
    if !metadata_eq_any(&budget.metadata, "region", &filter.regions) {
        return false;
    }
    if !metadata_eq_any(&budget.metadata, "resourceType", &filter.resource_types) {
        return false;
    }
    if !filter.providers.is_empty() && !any_case_insensitive_eq(&filter.providers, &budget.source) {
        return false;
    }
    for (key, pattern) in &filter.tags {
        match tag_value(&budget.metadata, key) {
            Some(value) if glob_match(pattern, value) => {}
            _ => return false,
        }
    }
    true
}

/// A `None` filter returns the input unchanged, order preserved. `None`
/// budgets in the slice are silently skipped.
pub fn filter_budgets<'a>(budgets: &'a [Option<Budget>], filter: Option<&BudgetFilter>) -> Vec<&'a Budget> {
    let present = budgets.iter().filter_map(|b| b.as_ref());
    match filter {
        None => present.collect(),
        Some(f) => present.filter(|b| matches(b, f)).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::shared::models::BudgetBuilder;

    fn budget(id: &str, provider: &str, tags: &[(&str, &str)]) -> Budget {
        let mut b = BudgetBuilder::new(id, 1000.0).source(provider);
        for (k, v) in tags {
            b = b.metadata(format!("tag:{k}"), *v);
        }
        b.build()
    }

    #[test]
    fn and_or_filter_scenario() {
        let a = budget("A", "aws", &[("env", "prod"), ("team", "platform")]);
        let b = budget("B", "aws", &[("env", "dev")]);
        let c = budget("C", "gcp", &[("env", "prod"), ("team", "platform")]);
        let budgets = vec![Some(a), Some(b), Some(c)];

        let filter = BudgetFilter {
            providers: vec!["aws".to_string()],
            tags: HashMap::from([("env".to_string(), "prod".to_string()), ("team".to_string(), "platform".to_string())]),
            ..Default::default()
        };

        let result = filter_budgets(&budgets, Some(&filter));
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "A");
    }

    #[test]
    fn none_filter_returns_input_unchanged() {
        let budgets = vec![Some(budget("A", "aws", &[])), None, Some(budget("B", "gcp", &[]))];
        let result = filter_budgets(&budgets, None);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn glob_tag_matching_is_case_sensitive_and_handles_invalid_patterns() {
        assert!(glob_match("prod*", "production"));
        assert!(!glob_match("Prod*", "production"));
        assert!(glob_match("", ""));
        assert!(!glob_match("", "x"));
        assert!(!glob_match("[", "anything"));
    }

    #[test]
    fn missing_tag_key_is_non_match() {
        let a = budget("A", "aws", &[]);
        let filter = BudgetFilter {
            tags: HashMap::from([("env".to_string(), "prod".to_string())]),
            ..Default::default()
        };
        assert_eq!(filter_budgets(&[Some(a)], Some(&filter)).len(), 0);
    }
}
