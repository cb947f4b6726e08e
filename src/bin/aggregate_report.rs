//! Offline aggregation over a JSON file of enriched customers.
//!
//! Prints the aggregation result, the detected assumption gaps and their
//! markdown rendering as one JSON document.

use anyhow::Context;
use brandintel_api::aggregation::Aggregator;
use brandintel_api::comparison::{render_comparisons, ComparisonEngine};
use brandintel_api::fallbacks::fallback_variables;
use brandintel_api::models::{BusinessContext, CustomerRecord, Variable};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "aggregate-report")]
#[command(about = "Aggregate enriched customers and detect assumption gaps")]
struct Args {
    /// JSON array of enriched customer records
    customers: PathBuf,

    /// JSON array of variables; defaults to the fallback selection for the business
    #[arg(short, long)]
    variables: Option<PathBuf>,

    /// JSON business context used by the comparison rules
    #[arg(short, long)]
    business: Option<PathBuf>,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &PathBuf) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let customers: Vec<CustomerRecord> = read_json(&args.customers)?;
    let business: BusinessContext = match &args.business {
        Some(path) => read_json(path)?,
        None => BusinessContext::default(),
    };
    let variables: Vec<Variable> = match &args.variables {
        Some(path) => read_json(path)?,
        None => fallback_variables(&business),
    };

    tracing::info!(
        "Aggregating {} customers across {} variables",
        customers.len(),
        variables.len()
    );

    let aggregation = Aggregator::new().aggregate(&customers, &variables)?;
    let comparisons = ComparisonEngine::default().compare(&aggregation, &business);

    let report = json!({
        "aggregatedData": aggregation,
        "comparisons": comparisons,
        "findings": render_comparisons(&comparisons),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
