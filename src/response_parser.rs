//! Tolerant parsing of LLM completions.
//!
//! Nothing in here panics. Malformed input becomes `AppError::ParseFailure`,
//! which the orchestration layer swaps for a canned fallback.

use crate::aggregation::{AnalysisGuidance, GuidanceMap};
use crate::catalog;
use crate::errors::AppError;
use crate::models::{QueryBucket, QuerySuggestions, Variable};
use serde::Deserialize;
use std::collections::HashMap;

/// Removes a leading ```` ```json ```` or ```` ``` ```` fence and the trailing fence.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string ("json") up to the first newline
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest.trim_start_matches("json"),
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Markdown report: trimmed, non-empty.
pub fn parse_report(raw: &str) -> Result<String, AppError> {
    let report = raw.trim();
    if report.is_empty() {
        return Err(AppError::ParseFailure("empty report".to_string()));
    }
    Ok(report.to_string())
}

#[derive(Deserialize)]
struct SelectionPayload {
    variables: Vec<SelectedVariable>,
}

#[derive(Deserialize)]
struct SelectedVariable {
    #[serde(alias = "name")]
    variable: String,
    #[serde(default)]
    rationale: String,
}

/// `{ "variables": [...] }` filtered to catalog names. The category comes from
/// the catalog, not the model. Duplicates keep their first occurrence.
pub fn parse_variable_selection(raw: &str) -> Result<Vec<Variable>, AppError> {
    let payload: SelectionPayload = serde_json::from_str(strip_code_fences(raw))?;

    let mut selected: Vec<Variable> = Vec::new();
    for candidate in payload.variables {
        let Some(entry) = catalog::find(candidate.variable.trim()) else {
            tracing::debug!("Dropping unknown variable '{}'", candidate.variable);
            continue;
        };
        if selected.iter().any(|v| v.name == entry.name) {
            continue;
        }
        selected.push(entry.to_variable(&candidate.rationale));
    }

    if selected.is_empty() {
        return Err(AppError::ParseFailure(
            "no selected variable exists in the catalog".to_string(),
        ));
    }
    Ok(selected)
}

/// Both buckets must carry at least one non-blank query.
pub fn parse_query_suggestions(raw: &str) -> Result<QuerySuggestions, AppError> {
    let mut parsed: QuerySuggestions = serde_json::from_str(strip_code_fences(raw))?;

    for bucket in [&mut parsed.market_intelligence, &mut parsed.growth_audiences] {
        clean_bucket(bucket)?;
    }
    Ok(parsed)
}

fn clean_bucket(bucket: &mut QueryBucket) -> Result<(), AppError> {
    bucket.queries.retain(|q| !q.trim().is_empty());
    if bucket.queries.is_empty() {
        return Err(AppError::ParseFailure(format!(
            "query bucket '{}' has no queries",
            bucket.category
        )));
    }
    Ok(())
}

/// `{ VAR: { threshold, label } }`. Entries with a non-finite or negative
/// threshold are dropped.
pub fn parse_guidance(raw: &str) -> Result<GuidanceMap, AppError> {
    let parsed: HashMap<String, AnalysisGuidance> = serde_json::from_str(strip_code_fences(raw))?;

    Ok(parsed
        .into_iter()
        .filter(|(_, g)| g.threshold.is_finite() && g.threshold >= 0.0)
        .collect())
}
