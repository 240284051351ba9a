pub mod budget_filter;
pub mod budget_health;
pub mod enricher;
pub mod estimator;
pub mod forecast;
pub mod merger;
pub mod plugin;
pub mod router;
pub mod scoped_budget;
pub mod threshold;
