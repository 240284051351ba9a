// CLI surface: clap-derived command tree dispatching into the engine core.

use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::{mpsc, watch};

use crate::cli::fixture::FixturePlugin;
use crate::config::{load_config, AppConfig};
use crate::dismissal::DismissalService;
use crate::engines::core::budget_filter::{filter_budgets, BudgetFilter};
use crate::engines::core::budget_health::{aggregate_health, health_from_percentage};
use crate::engines::core::enricher::{calendar_fields, enrich_rows, EnrichOptions};
use crate::engines::core::estimator;
use crate::engines::core::forecast::forecast_by_day;
use crate::engines::core::merger::{merge_overview, PlanStep, StateResource};
use crate::engines::core::plugin::{with_deadline, Plugin, UsageProfile};
use crate::engines::core::router::{Feature, Router};
use crate::engines::core::scoped_budget::evaluate_allocation;
use crate::engines::core::threshold::{evaluate_threshold, thresholds_or_default};
use crate::engines::shared::models::{Budget, BudgetStatus, DateRange, HealthStatus, ResourceDescriptorBuilder};
use crate::errors::CliError;
use crate::kvstore::JsonFileStore;
use crate::manifest::load_manifest;
use crate::render::{render_line_delimited, render_table};

#[derive(Parser, Debug)]
#[command(name = "finfocus", version, about = "Infrastructure cost visibility for your stack")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output format for commands that render resource rows.
    #[arg(long, global = true, default_value = "table")]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Lines,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Merge stack state with the pending plan and show cost per resource.
    ///
    /// Examples:
    ///   finfocus overview
    Overview,

    /// Query cost data for the current stack.
    Cost {
        #[command(subcommand)]
        action: CostAction,
    },

    /// Inspect configured budgets.
    Budget {
        #[command(subcommand)]
        action: BudgetAction,
    },

    /// List outstanding recommendations.
    ///
    /// Examples:
    ///   finfocus recommend
    Recommend,

    /// Dismiss a recommendation permanently.
    ///
    /// Examples:
    ///   finfocus dismiss rec-123 --reason not-applicable
    Dismiss {
        recommendation_id: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        note: Option<String>,
    },

    /// Reverse a prior dismiss or snooze.
    Undismiss { recommendation_id: String },

    /// Print the lifecycle history for a recommendation.
    History { recommendation_id: String },
}

#[derive(Subcommand, Debug)]
pub enum CostAction {
    /// Projected monthly cost for the stack's resources.
    Projected,
    /// Actual month-to-date cost for the stack's resources.
    Actual,
    /// What-if estimate for a single resource under property overrides.
    ///
    /// Examples:
    ///   finfocus cost estimate aws:ec2:instance --set instanceType=m5.large
    Estimate {
        resource_type: String,
        #[arg(long = "set", value_parser = parse_key_val)]
        overrides: Vec<(String, String)>,
    },
}

#[derive(Subcommand, Debug)]
pub enum BudgetAction {
    /// List every configured budget and its current health.
    List,
    /// Print an aggregate health summary across all budgets.
    Summary,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (k, v) = s.split_once('=').ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;
    Ok((k.to_string(), v.to_string()))
}

fn default_store() -> Result<Arc<JsonFileStore>, CliError> {
    Ok(Arc::new(JsonFileStore::open(JsonFileStore::default_path())?))
}

async fn registered_plugins(config: &AppConfig) -> Vec<Arc<dyn Plugin>> {
    let descriptors = load_manifest(&config.plugin_manifest_path).unwrap_or_default();
    if descriptors.is_empty() {
        vec![Arc::new(FixturePlugin::new("fixture")) as Arc<dyn Plugin>]
    } else {
        descriptors
            .into_iter()
            .map(|d| Arc::new(FixturePlugin::new(d.name)) as Arc<dyn Plugin>)
            .collect()
    }
}

pub async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = load_config().unwrap_or_default();
    let plugins = registered_plugins(&config).await;

    match cli.command {
        Command::Overview => cmd_overview(&plugins, &config, &cli.format).await,
        Command::Cost { action } => match action {
            CostAction::Projected => cmd_cost_projected(&plugins).await,
            CostAction::Actual => cmd_cost_actual(&plugins).await,
            CostAction::Estimate { resource_type, overrides } => {
                cmd_cost_estimate(&plugins, &config, &resource_type, overrides).await
            }
        },
        Command::Budget { action } => match action {
            BudgetAction::List => cmd_budget_list(&plugins, &config).await,
            BudgetAction::Summary => cmd_budget_summary(&plugins, &config).await,
        },
        Command::Recommend => cmd_recommend(&plugins).await,
        Command::Dismiss { recommendation_id, reason, note } => cmd_dismiss(&recommendation_id, &reason, note),
        Command::Undismiss { recommendation_id } => cmd_undismiss(&recommendation_id),
        Command::History { recommendation_id } => cmd_history(&recommendation_id),
    }
}

fn demo_stack() -> (Vec<StateResource>, Vec<PlanStep>) {
    let state = vec![
        StateResource {
            urn: "urn:pulumi:prod::stack::aws:ec2/instance:Instance::web".to_string(),
            resource_type: "aws:ec2:instance".to_string(),
            id: "i-0123456789abcdef0".to_string(),
            custom: true,
            properties: Default::default(),
        },
        StateResource {
            urn: "urn:pulumi:prod::stack::aws:rds/instance:Instance::db".to_string(),
            resource_type: "aws:rds:instance".to_string(),
            id: "db-prod-01".to_string(),
            custom: true,
            properties: Default::default(),
        },
    ];
    let plan = vec![PlanStep {
        urn: "urn:pulumi:prod::stack::aws:ec2/instance:Instance::cache".to_string(),
        resource_type: "aws:ec2:instance".to_string(),
        op: "create".to_string(),
    }];
    (state, plan)
}

async fn cmd_overview(plugins: &[Arc<dyn Plugin>], config: &AppConfig, format: &OutputFormat) -> Result<ExitCode, CliError> {
    let (state, plan) = demo_stack();
    let skeleton_rows = merge_overview(&state, &plan);

    let now = Utc::now();
    let (day_of_month, days_in_month) = calendar_fields(now);
    let options = Arc::new(EnrichOptions {
        per_resource_timeout_ms: config.per_resource_timeout_ms,
        day_of_month,
        days_in_month,
        actual_period: DateRange::new(now - chrono::Duration::days(i64::from(day_of_month)), now).map_err(CliError::Engine)?,
        concurrency_limit: config.overview_concurrency_limit,
    });

    let (_cancel_tx, cancel_rx) = watch::channel(false);
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();

    let bar = ProgressBar::new(skeleton_rows.len() as u64);
    bar.set_style(ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}").unwrap_or_else(|_| ProgressStyle::default_bar()));

    let enrich_task = tokio::spawn(enrich_rows(skeleton_rows, plugins.to_vec(), options, cancel_rx, Some(progress_tx)));
    while let Some(event) = progress_rx.recv().await {
        bar.set_message(event.urn);
        bar.inc(1);
    }
    bar.finish_and_clear();
    let rows = enrich_task.await.unwrap_or_default();

    match format {
        OutputFormat::Table => print!("{}", render_table(&rows)),
        OutputFormat::Lines => print!("{}", render_line_delimited(&rows)?),
        OutputFormat::Json => {
            let doc = crate::render::build_document("stack", "us-east-1", "month-to-date", rows)?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_cost_projected(plugins: &[Arc<dyn Plugin>]) -> Result<ExitCode, CliError> {
    let descriptor = ResourceDescriptorBuilder::new("aws:ec2:instance", "i-example").build();
    for plugin in plugins {
        if let Ok(results) = plugin.get_projected_cost(std::slice::from_ref(&descriptor)).await {
            for result in results {
                println!("{}: ${:.2}/mo ({})", result.resource_id, result.monthly, result.adapter);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_cost_actual(plugins: &[Arc<dyn Plugin>]) -> Result<ExitCode, CliError> {
    let descriptor = ResourceDescriptorBuilder::new("aws:ec2:instance", "i-example").build();
    let period = DateRange::new(Utc::now() - chrono::Duration::days(15), Utc::now())
        .map_err(CliError::Engine)?;
    for plugin in plugins {
        if let Ok(results) = plugin.get_actual_cost(std::slice::from_ref(&descriptor), period).await {
            for result in results {
                println!("{}: ${:.2} MTD ({})", result.resource_id, result.monthly, result.adapter);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_cost_estimate(
    plugins: &[Arc<dyn Plugin>],
    config: &AppConfig,
    resource_type: &str,
    overrides: Vec<(String, String)>,
) -> Result<ExitCode, CliError> {
    let descriptor = ResourceDescriptorBuilder::new(resource_type, "i-example")
        .property("instanceType", serde_json::Value::String("t3.micro".to_string()))
        .build();
    let request = estimator::EstimateRequest {
        resource: descriptor,
        property_overrides: overrides.into_iter().collect::<HashMap<_, _>>(),
        usage_profile: UsageProfile::default(),
    };
    let result = estimator::estimate_cost(request, plugins, config.per_resource_timeout_ms).await?;
    println!("estimated monthly change: {}", format_signed(result.total_change));
    for delta in result.deltas {
        println!("  {}: {} -> {} ({})", delta.property, delta.original_value, delta.new_value, format_signed(delta.cost_change));
    }
    Ok(ExitCode::SUCCESS)
}

fn format_signed(v: f64) -> String {
    if v >= 0.0 {
        format!("+${v:.2}")
    } else {
        format!("-${:.2}", v.abs())
    }
}

/// Routes plugins per resource/feature, fetches live actual spend for the
/// stack, and recomputes each returned budget's health/thresholds against
/// that spend rather than trusting whatever the plugin reports at rest.
/// Also allocates each resource's live spend across the configured scoped
/// budgets and folds their worst health into the returned aggregate. A
/// `filter` narrows the plugin-reported budgets the way `finfocus budget
/// list` would if invoked with selection criteria; `None` returns every
/// budget unchanged.
async fn live_budgets(plugins: &[Arc<dyn Plugin>], config: &AppConfig, filter: Option<&BudgetFilter>) -> Result<(Vec<Budget>, HealthStatus), CliError> {
    let (state, _plan) = demo_stack();
    let now = Utc::now();
    let (day_of_month, days_in_month) = calendar_fields(now);
    let period = DateRange::new(now - chrono::Duration::days(i64::from(day_of_month.max(1))), now).map_err(CliError::Engine)?;

    let router = Router::new(plugins.to_vec(), Vec::new());

    // Budgets are reported per plugin (`Budget::source` is the issuing
    // plugin's name, not a cloud provider), so live spend is attributed the
    // same way: by whichever plugin actually served the resource's actual cost.
    let mut spend_by_plugin: HashMap<String, f64> = HashMap::new();
    let mut spend_by_resource: Vec<(String, String, f64)> = Vec::new();
    for resource in &state {
        let descriptor = ResourceDescriptorBuilder::new(resource.resource_type.clone(), resource.id.clone()).build();
        let mut resource_spend = 0.0;
        for plugin_match in router.route(&descriptor, Feature::ActualCosts) {
            let call = with_deadline(
                plugin_match.client.name(),
                config.per_resource_timeout_ms,
                plugin_match.client.get_actual_cost(std::slice::from_ref(&descriptor), period),
            );
            if let Ok(results) = call.await {
                if let Some(result) = results.into_iter().next() {
                    resource_spend = result.total_cost;
                    *spend_by_plugin.entry(plugin_match.client.name().to_string()).or_insert(0.0) += resource_spend;
                    break;
                }
            }
        }
        spend_by_resource.push((descriptor.resource_type.clone(), descriptor.provider.clone(), resource_spend));
    }

    let scoped_health = aggregate_health(spend_by_resource.iter().filter_map(|(resource_type, provider, cost)| {
        evaluate_allocation(resource_type, provider, &HashMap::new(), *cost, &config.scoped_budgets, &|| false).map(|e| e.overall_health)
    }));

    let mut raw_budgets = Vec::new();
    for plugin_match in router.route(&ResourceDescriptorBuilder::new("budget:any", "n/a").build(), Feature::Budgets) {
        if let Ok(budgets) = plugin_match.client.get_budgets().await {
            raw_budgets.extend(budgets);
        }
    }

    let boxed: Vec<Option<Budget>> = raw_budgets.into_iter().map(Some).collect();
    let filtered = filter_budgets(&boxed, filter);

    let budgets = filtered
        .into_iter()
        .cloned()
        .map(|mut budget| {
            let current_spend = spend_by_plugin.get(&budget.source).copied().unwrap_or(budget.status.current_spend);
            let forecasted_spend = forecast_by_day(current_spend, day_of_month, days_in_month);
            let (percentage_used, percentage_forecasted, health) = if budget.amount.limit > 0.0 {
                let used = current_spend / budget.amount.limit * 100.0;
                let forecasted = forecasted_spend / budget.amount.limit * 100.0;
                (used, forecasted, health_from_percentage(used))
            } else {
                (0.0, 0.0, HealthStatus::Unspecified)
            };

            budget.status = BudgetStatus { health, current_spend, percentage_used, percentage_forecasted, forecasted_spend };
            budget.thresholds = thresholds_or_default(&budget)
                .into_iter()
                .map(|t| evaluate_threshold(&t, current_spend, forecasted_spend, budget.amount.limit, now))
                .collect();
            budget
        })
        .collect();

    Ok((budgets, scoped_health))
}

async fn cmd_budget_list(plugins: &[Arc<dyn Plugin>], config: &AppConfig) -> Result<ExitCode, CliError> {
    let (budgets, _scoped_health) = live_budgets(plugins, config, None).await?;
    for budget in budgets {
        let label = format!("{:?}", budget.status.health);
        let colored = match budget.status.health {
            HealthStatus::Exceeded | HealthStatus::Critical => label.red().to_string(),
            HealthStatus::Warning => label.yellow().to_string(),
            _ => label.green().to_string(),
        };
        println!(
            "{} [{}] {:.2}/{:.2} {} ({:.1}% used, {colored})",
            budget.name, budget.source, budget.status.current_spend, budget.amount.limit, budget.amount.currency, budget.status.percentage_used
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn cmd_budget_summary(plugins: &[Arc<dyn Plugin>], config: &AppConfig) -> Result<ExitCode, CliError> {
    let (budgets, scoped_health) = live_budgets(plugins, config, None).await?;
    let worst = aggregate_health(budgets.iter().map(|b| b.status.health).chain(std::iter::once(scoped_health)));
    let label = format!("{worst:?}");
    let colored = match worst {
        HealthStatus::Exceeded | HealthStatus::Critical => label.red().to_string(),
        HealthStatus::Warning => label.yellow().to_string(),
        _ => label.green().to_string(),
    };
    println!("aggregate health: {colored}");
    if worst == HealthStatus::Exceeded {
        Ok(ExitCode::FAILURE)
    } else {
        Ok(ExitCode::SUCCESS)
    }
}

async fn cmd_recommend(plugins: &[Arc<dyn Plugin>]) -> Result<ExitCode, CliError> {
    let descriptor = ResourceDescriptorBuilder::new("aws:ec2:instance", "i-example").build();
    for plugin in plugins {
        if let Ok(recs) = plugin.get_recommendations(std::slice::from_ref(&descriptor), &[]).await {
            for rec in recs {
                println!("{}: {} (saves ${:.2}/mo)", rec.id, rec.description, rec.estimated_savings);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_dismiss(recommendation_id: &str, reason: &str, note: Option<String>) -> Result<ExitCode, CliError> {
    let service = DismissalService::new(default_store()?);
    let record = service.dismiss(recommendation_id, reason, note)?;
    println!("{} {} dismissed ({})", "ok:".green(), record.recommendation_id, record.reason);
    Ok(ExitCode::SUCCESS)
}

fn cmd_undismiss(recommendation_id: &str) -> Result<ExitCode, CliError> {
    let service = DismissalService::new(default_store()?);
    let record = service.undismiss(recommendation_id)?;
    println!("{} {} restored", "ok:".green(), record.recommendation_id);
    Ok(ExitCode::SUCCESS)
}

fn cmd_history(recommendation_id: &str) -> Result<ExitCode, CliError> {
    let service = DismissalService::new(default_store()?);
    for event in service.history(recommendation_id)? {
        println!("{:?} at {} ({:?})", event.action, event.timestamp, event.reason);
    }
    Ok(ExitCode::SUCCESS)
}
