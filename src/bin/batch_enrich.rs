//! Enrich a CSV customer list against the identity provider.
//!
//! Reads the identity credentials and pacing from the same environment as the
//! server and prints the enriched records and stats as JSON.

use anyhow::Context;
use brandintel_api::config::Config;
use brandintel_api::enrichment::{enrich_batch, MAX_BATCH_LIMIT};
use brandintel_api::identity_client::IdentityClient;
use brandintel_api::ingest::parse_csv;
use brandintel_api::models::{EnrichResponse, Variable};
use brandintel_api::{catalog, fallbacks};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "batch-enrich")]
#[command(about = "Enrich a CSV customer list against the identity provider")]
struct Args {
    /// CSV file with a header row
    input: PathBuf,

    /// Catalog variable names to request (repeatable); defaults to the base selection
    #[arg(short, long = "variable")]
    variables: Vec<String>,

    /// Override ENRICHMENT_BATCH_LIMIT
    #[arg(short, long)]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let identity = config
        .identity
        .as_ref()
        .context("AA_ORIGIN, AA_KEY_ID and AA_SECRET are required")?;
    let client = IdentityClient::new(
        identity.origin.clone(),
        identity.key_id.clone(),
        identity.secret.clone(),
        config.http_timeout(),
    )?;

    let variables: Vec<Variable> = if args.variables.is_empty() {
        fallbacks::fallback_variables(&Default::default())
    } else {
        args.variables
            .iter()
            .map(|name| {
                catalog::find(name)
                    .map(|entry| entry.to_variable(""))
                    .with_context(|| format!("unknown variable '{}'", name))
            })
            .collect::<anyhow::Result<_>>()?
    };

    let mut settings = config.batch_settings();
    if let Some(limit) = args.limit {
        if !(1..=MAX_BATCH_LIMIT).contains(&limit) {
            anyhow::bail!("--limit must be between 1 and {}", MAX_BATCH_LIMIT);
        }
        settings.limit = limit;
    }

    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read {}", args.input.display()))?;
    let parsed = parse_csv(&raw)?;
    if parsed.truncated {
        tracing::warn!("Input truncated to {} rows", parsed.customers.len());
    }

    let (enriched_customers, stats) =
        enrich_batch(Some(&client), parsed.customers, &variables, settings).await;

    let output = EnrichResponse {
        enriched_customers,
        stats,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
