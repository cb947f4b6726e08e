//! Prompt builders for the narrative LLM calls.
//!
//! Every builder is a pure function of its inputs: the same context, variables
//! and aggregation always produce byte-identical prompts.

use crate::aggregation::AggregationResult;
use crate::catalog::CatalogEntry;
use crate::comparison::render_comparisons;
use crate::models::{AssumptionComparison, BusinessContext, Variable, VariableCategory};
use std::fmt::Write;

/// Characters of the insights report carried into the query prompt.
pub const INSIGHTS_EXCERPT_CHARS: usize = 1000;

const NO_PATTERNS: &str = "No enriched data available";

fn context_block(ctx: &BusinessContext) -> String {
    let additional = if ctx.additional_context.trim().is_empty() {
        "None"
    } else {
        ctx.additional_context.as_str()
    };

    format!(
        "BUSINESS CONTEXT:\n\
         - Business: {}\n\
         - Industry: {}\n\
         - Business Model: {}\n\
         - Target Customer Assumption: {}\n\
         - Brand Positioning: {}\n\
         - Goals: {}\n\
         - Additional Context: {}\n",
        ctx.business_name,
        ctx.industry,
        ctx.business_model,
        ctx.target_customer,
        ctx.brand_positioning,
        ctx.goals.join(", "),
        additional
    )
}

fn data_patterns(aggregation: Option<&AggregationResult>) -> String {
    let patterns: Vec<String> = aggregation
        .map(|agg| {
            agg.variable_analysis
                .iter()
                .map(|(name, analysis)| format!("- {}: {}", name, analysis.summary))
                .collect()
        })
        .unwrap_or_default();

    if patterns.is_empty() {
        NO_PATTERNS.to_string()
    } else {
        patterns.join("\n")
    }
}

fn excerpt(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn variable_selection_prompt(ctx: &BusinessContext, catalog: &[CatalogEntry]) -> String {
    let available = catalog
        .iter()
        .map(|e| format!("- {}: {} ({})", e.name, e.description, e.category))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are a strategic data analyst selecting customer intelligence variables for brand strategy.\n\n\
         {context}\n\
         AVAILABLE VARIABLES:\n{available}\n\n\
         YOUR TASK: Select 6-8 variables that will provide the most strategic value for this business context.\n\n\
         SELECTION CRITERIA:\n\
         1. Choose variables that directly relate to this business and industry\n\
         2. Prioritize variables that can challenge current customer assumptions\n\
         3. Include a strategic mix across different categories\n\
         4. Focus on variables that inform brand positioning decisions\n\
         5. Consider variables that reveal unexpected customer segments\n\n\
         RESPOND WITH VALID JSON ONLY (no markdown formatting):\n\
         {{\n  \"variables\": [\n    {{\n      \"variable\": \"VARIABLE_NAME\",\n      \"category\": \"category_name\",\n      \"rationale\": \"Why this variable matters for this business\"\n    }}\n  ]\n}}",
        context = context_block(ctx),
        available = available
    )
}

/// Asks for a threshold and label per economic or interests variable.
/// Returns `None` when no selected variable needs guidance.
pub fn guidance_prompt(ctx: &BusinessContext, variables: &[Variable]) -> Option<String> {
    let targets: Vec<&Variable> = variables
        .iter()
        .filter(|v| {
            matches!(
                v.category,
                VariableCategory::Economic | VariableCategory::Interests
            )
        })
        .collect();
    if targets.is_empty() {
        return None;
    }

    let listed = targets
        .iter()
        .map(|v| format!("- {} ({})", v.name, v.category))
        .collect::<Vec<_>>()
        .join("\n");

    Some(format!(
        "You are calibrating customer analysis thresholds for a specific business.\n\n\
         {context}\n\
         VARIABLES NEEDING A THRESHOLD:\n{listed}\n\n\
         For economic variables give the household income (in dollars) that counts as \"high\" for this business. \
         For interests variables give the affinity score on a 1-5 scale that counts as \"high\". \
         Give each a short human-readable label.\n\n\
         RESPOND WITH VALID JSON ONLY:\n\
         {{\n  \"VARIABLE_NAME\": {{ \"threshold\": 100000, \"label\": \"$100K+\" }}\n}}",
        context = context_block(ctx),
        listed = listed
    ))
}

pub fn insights_prompt(
    ctx: &BusinessContext,
    variables: &[Variable],
    aggregation: Option<&AggregationResult>,
    comparisons: &[AssumptionComparison],
) -> String {
    let mut prompt = String::from(
        "You are a strategic brand consultant analyzing customer data to generate actionable insights.\n\n",
    );
    prompt.push_str(&context_block(ctx));

    prompt.push_str("\nSELECTED DATA VARIABLES:\n");
    for v in variables {
        let _ = writeln!(prompt, "- {} ({}): {}", v.name, v.category, v.rationale);
    }

    prompt.push_str("\nDATA OVERVIEW:\n");
    match aggregation {
        Some(agg) => {
            let _ = writeln!(prompt, "- Records analyzed: {}", agg.total_records);
            let _ = writeln!(prompt, "- Records enriched: {}", agg.enriched_records);
            let _ = writeln!(prompt, "- Match rate: {}%", agg.match_rate);
        }
        None => prompt.push_str("- No enriched customer data was supplied\n"),
    }

    let _ = write!(
        prompt,
        "\nCUSTOMER DATA PATTERNS:\n{}\n\nASSUMPTIONS VS DATA:\n{}\n\n",
        data_patterns(aggregation),
        render_comparisons(comparisons)
    );

    prompt.push_str(
        "YOUR TASK: Generate a strategic brand intelligence report in markdown format that includes:\n\n\
         1. Executive Summary (2-3 sentences of key findings)\n\
         2. Customer Reality vs Assumptions table comparing what they assumed vs what data shows\n\
         3. Strategic Recommendations (3-4 actionable recommendations)\n\
         4. Most Surprising Discovery (1 key insight that challenges assumptions)\n\
         5. Immediate Action Items (5 specific next steps)\n\n\
         Ground every claim in the data patterns above. Use a professional consulting tone with \
         markdown headers, tables, and bullet points.",
    );
    prompt
}

pub fn query_prompt(
    ctx: &BusinessContext,
    variables: &[Variable],
    insights: &str,
    aggregation: Option<&AggregationResult>,
) -> String {
    let analyzed = variables
        .iter()
        .map(|v| format!("{} ({})", v.name, v.category))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are a business intelligence analyst writing natural language audience queries based on actual customer data patterns.\n\n\
         {context}\n\
         SELECTED VARIABLES ANALYZED: {analyzed}\n\n\
         ACTUAL CUSTOMER DATA PATTERNS DISCOVERED:\n{patterns}\n\n\
         STRATEGIC INSIGHTS:\n{insights}...\n\n\
         YOUR TASK: Generate natural language queries a senior analyst will run against an identity data graph.\n\n\
         BUCKET 1: MARKET ANALYSIS QUERIES\n\
         Generate 3-4 queries that explore market dynamics using the demographic and economic patterns found.\n\n\
         BUCKET 2: LOOKALIKE AUDIENCE QUERIES\n\
         Generate 3-4 queries that find and size audiences matching the discovered customer profile.\n\n\
         Reference the specific patterns above and use plain business language.\n\n\
         RESPOND IN JSON FORMAT:\n\
         {{\n  \"marketIntelligence\": {{\n    \"category\": \"Market Analysis\",\n    \"description\": \"Queries to understand market size and landscape\",\n    \"queries\": [\"query1\", \"query2\", \"query3\"]\n  }},\n  \
         \"growthAudiences\": {{\n    \"category\": \"Lookalike Audience\",\n    \"description\": \"Find prospects matching discovered customer patterns\",\n    \"queries\": [\"query1\", \"query2\", \"query3\"]\n  }}\n}}",
        context = context_block(ctx),
        analyzed = analyzed,
        patterns = data_patterns(aggregation),
        insights = excerpt(insights, INSIGHTS_EXCERPT_CHARS)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("héllo", 2), "hé");
        assert_eq!(excerpt("short", 100), "short");
    }

    #[test]
    fn test_guidance_prompt_skips_categorical_only() {
        let ctx = BusinessContext::default();
        let vars = vec![Variable::new("AGE", VariableCategory::Demographics, "")];
        assert!(guidance_prompt(&ctx, &vars).is_none());

        let vars = vec![Variable::new("INCOME_HH", VariableCategory::Economic, "")];
        let prompt = guidance_prompt(&ctx, &vars).unwrap();
        assert!(prompt.contains("- INCOME_HH (economic)"));
    }
}
