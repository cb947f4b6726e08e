use crate::aggregation::{AggregationResult, Aggregator, GuidanceMap};
use crate::catalog;
use crate::comparison::ComparisonEngine;
use crate::errors::{AppError, ResultExt};
use crate::fallbacks::{fallback_insights, fallback_queries, fallback_variables};
use crate::llm_client::LlmClient;
use crate::models::*;
use crate::prompts;
use crate::response_parser;

const SELECTION_MAX_TOKENS: u32 = 4096;
const SELECTION_TEMPERATURE: f32 = 0.3;
const GUIDANCE_MAX_TOKENS: u32 = 1024;
const GUIDANCE_TEMPERATURE: f32 = 0.2;
const INSIGHTS_MAX_TOKENS: u32 = 4096;
const INSIGHTS_TEMPERATURE: f32 = 0.7;
const QUERIES_MAX_TOKENS: u32 = 2048;
const QUERIES_TEMPERATURE: f32 = 0.5;

/// Drives the LLM-backed wizard steps.
///
/// Each public method returns a usable value: any upstream or parse failure is
/// logged and replaced by the matching canned fallback. Only malformed input
/// is returned as an error.
pub struct NarrativeService<'a> {
    llm: Option<&'a LlmClient>,
    comparisons: ComparisonEngine,
}

impl<'a> NarrativeService<'a> {
    pub fn new(llm: Option<&'a LlmClient>) -> Self {
        Self {
            llm,
            comparisons: ComparisonEngine::default(),
        }
    }

    pub fn with_comparisons(mut self, engine: ComparisonEngine) -> Self {
        self.comparisons = engine;
        self
    }

    async fn complete(&self, prompt: &str, max_tokens: u32, temperature: f32) -> Result<String, AppError> {
        let llm = self.llm.ok_or_else(|| {
            AppError::UpstreamUnavailable("ANTHROPIC_API_KEY is not configured".to_string())
        })?;
        llm.complete(prompt, max_tokens, temperature).await
    }

    async fn try_select(&self, ctx: &BusinessContext) -> Result<Vec<Variable>, AppError> {
        let prompt = prompts::variable_selection_prompt(ctx, catalog::all());
        let raw = self
            .complete(&prompt, SELECTION_MAX_TOKENS, SELECTION_TEMPERATURE)
            .await
            .context("variable selection")?;
        response_parser::parse_variable_selection(&raw).context("variable selection")
    }

    pub async fn select_variables(&self, ctx: &BusinessContext) -> Vec<Variable> {
        match self.try_select(ctx).await {
            Ok(variables) => {
                tracing::info!("✓ Selected {} variables", variables.len());
                variables
            }
            Err(e) => {
                tracing::warn!("Using fallback variables: {}", e);
                fallback_variables(ctx)
            }
        }
    }

    /// Per-variable thresholds for economic and interests variables.
    /// Empty on any failure, which leaves the aggregation defaults in place.
    pub async fn derive_guidance(&self, ctx: &BusinessContext, variables: &[Variable]) -> GuidanceMap {
        let Some(prompt) = prompts::guidance_prompt(ctx, variables) else {
            return GuidanceMap::new();
        };
        if self.llm.is_none() {
            return GuidanceMap::new();
        }

        let result = self
            .complete(&prompt, GUIDANCE_MAX_TOKENS, GUIDANCE_TEMPERATURE)
            .await
            .and_then(|raw| response_parser::parse_guidance(&raw))
            .context("analysis guidance");

        match result {
            Ok(guidance) => {
                tracing::debug!("Received guidance for {} variables", guidance.len());
                guidance
            }
            Err(e) => {
                tracing::warn!("Using default thresholds: {}", e);
                GuidanceMap::new()
            }
        }
    }

    /// Aggregates the enriched customers (when any), runs the comparison rules
    /// and narrates the report.
    pub async fn generate_insights(
        &self,
        ctx: &BusinessContext,
        variables: &[Variable],
        enriched: &[CustomerRecord],
    ) -> Result<InsightsResponse, AppError> {
        let aggregation = if enriched.is_empty() {
            tracing::info!("No enriched customers supplied; skipping aggregation");
            None
        } else {
            let guidance = self.derive_guidance(ctx, variables).await;
            Some(Aggregator::with_guidance(guidance).aggregate(enriched, variables)?)
        };

        let comparisons = aggregation
            .as_ref()
            .map(|agg| self.comparisons.compare(agg, ctx))
            .unwrap_or_default();

        let prompt = prompts::insights_prompt(ctx, variables, aggregation.as_ref(), &comparisons);
        let insights = match self
            .complete(&prompt, INSIGHTS_MAX_TOKENS, INSIGHTS_TEMPERATURE)
            .await
            .and_then(|raw| response_parser::parse_report(&raw))
            .context("insights report")
        {
            Ok(report) => {
                tracing::info!("✓ Insights report generated ({} chars)", report.len());
                report
            }
            Err(e) => {
                tracing::warn!("Using fallback insights: {}", e);
                fallback_insights(ctx, variables, &comparisons)
            }
        };

        Ok(InsightsResponse {
            insights,
            aggregated_data: aggregation,
            comparisons,
        })
    }

    pub async fn generate_queries(
        &self,
        ctx: &BusinessContext,
        variables: &[Variable],
        insights: &str,
        aggregation: Option<&AggregationResult>,
    ) -> QuerySuggestions {
        let prompt = prompts::query_prompt(ctx, variables, insights, aggregation);

        self.complete(&prompt, QUERIES_MAX_TOKENS, QUERIES_TEMPERATURE)
            .await
            .and_then(|raw| response_parser::parse_query_suggestions(&raw))
            .context("query suggestions")
            .unwrap_or_else(|e| {
                tracing::warn!("Using fallback queries: {}", e);
                fallback_queries(ctx)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> BusinessContext {
        BusinessContext {
            business_name: "Roasted Bean Coffee Co.".to_string(),
            industry: "Food & Beverage".to_string(),
            target_customer: "Young urban professionals".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_without_llm_everything_falls_back() {
        let service = NarrativeService::new(None);

        let vars = service.select_variables(&ctx()).await;
        assert_eq!(vars, fallback_variables(&ctx()));

        let queries = service.generate_queries(&ctx(), &vars, "report", None).await;
        assert_eq!(queries, fallback_queries(&ctx()));

        let insights = service.generate_insights(&ctx(), &vars, &[]).await.unwrap();
        assert!(insights.aggregated_data.is_none());
        assert!(insights.comparisons.is_empty());
        assert!(insights.insights.starts_with("# Customer Intelligence Report"));
    }

    #[tokio::test]
    async fn test_blank_variable_name_is_rejected() {
        let mut record = CustomerRecord::new();
        record.tag(EnrichmentSource::Email);
        let vars = vec![Variable::new(" ", VariableCategory::Demographics, "")];

        let result = NarrativeService::new(None)
            .generate_insights(&ctx(), &vars, &[record])
            .await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
