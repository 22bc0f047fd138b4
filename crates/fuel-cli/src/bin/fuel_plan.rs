//! Fuel planner.
//!
//! Loads a scenario, runs the fuel pipeline and the fuel-stop optimizer, and
//! prints the result as JSON on stdout. Logs go to stderr.
//!
//! Usage:
//!   cargo run -p fuel-cli --bin fuel_plan -- --scenario crates/fuel-cli/scenarios/north_sea.json

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use fuel_cli::{create_north_sea_scenario, run_scenario, Scenario};
use fuel_core::EngineConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Offshore helicopter fuel planner
#[derive(Parser, Debug)]
#[command(author, version, about = "Plan fuel and fuel stops for an offshore helicopter route")]
struct Args {
    /// Scenario JSON file (built-in North Sea scenario when omitted)
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Engine configuration JSON (environment when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print only the fuel summary of this landing stop
    #[arg(long)]
    stop: Option<usize>,

    /// Pretty-print the JSON output
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::from_env());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("fuel_cli=info".parse()?))
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_ref())?;
    let scenario = match &args.scenario {
        Some(path) => Scenario::load(path)?,
        None => create_north_sea_scenario(),
    };

    let report = run_scenario(&scenario, &config).await?;

    let output = match args.stop {
        Some(stop) => {
            let summary = report
                .stop_summaries
                .iter()
                .find(|s| s.stop_index == stop)
                .with_context(|| format!("no landing stop {stop} in '{}'", scenario.name))?;
            serde_json::to_value(summary)?
        }
        None => serde_json::to_value(&report)?,
    };

    if let Some(outcome) = &report.optimization {
        match outcome.failure_reason() {
            Some(reason) => tracing::info!("No fuel stop suggested: {}", reason),
            None => {
                for suggestion in &outcome.suggestions {
                    tracing::info!("#{} {}", suggestion.rank, suggestion.description);
                }
            }
        }
    }

    let text = if args.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{text}");
    Ok(())
}
