//! Assumption-comparison engine.
//!
//! Each rule inspects one variable's analysis and the business's stated target
//! customer, emitting at most one [`AssumptionComparison`]. Rules run in
//! registration order and never suppress each other.

use crate::aggregation::{AggregationResult, AnalysisDetail, VariableAnalysis};
use crate::models::{AssumptionComparison, BusinessContext};
use regex::Regex;
use std::sync::OnceLock;

/// Rendered when no rule fires.
pub const WELL_ALIGNED_MESSAGE: &str = "Current assumptions appear well-aligned with the customer data.";

/// A single assumption check keyed by variable name.
pub trait ComparisonRule: Send + Sync {
    /// Short rule identifier used in logs.
    fn name(&self) -> &'static str;

    /// Variable names this rule reads, matched case-insensitively.
    fn variables(&self) -> &[&'static str];

    fn evaluate(
        &self,
        analysis: &VariableAnalysis,
        context: &BusinessContext,
    ) -> Option<AssumptionComparison>;
}

pub struct ComparisonEngine {
    rules: Vec<Box<dyn ComparisonRule>>,
}

impl Default for ComparisonEngine {
    /// Generation, income, and urbanicity rules, in that order.
    fn default() -> Self {
        Self::empty()
            .register(GenerationRule)
            .register(IncomeRule)
            .register(UrbanicityRule)
    }
}

impl ComparisonEngine {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Appends a rule after the ones already registered.
    pub fn register<R: ComparisonRule + 'static>(mut self, rule: R) -> Self {
        self.rules.push(Box::new(rule));
        self
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn compare(
        &self,
        aggregation: &AggregationResult,
        context: &BusinessContext,
    ) -> Vec<AssumptionComparison> {
        self.rules
            .iter()
            .filter_map(|rule| {
                let analysis = find_analysis(aggregation, rule.variables())?;
                let comparison = rule.evaluate(analysis, context)?;
                tracing::debug!("Comparison rule '{}' fired", rule.name());
                Some(comparison)
            })
            .collect()
    }
}

fn find_analysis<'a>(
    aggregation: &'a AggregationResult,
    aliases: &[&str],
) -> Option<&'a VariableAnalysis> {
    aliases.iter().find_map(|alias| {
        aggregation
            .variable_analysis
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(alias))
            .map(|(_, analysis)| analysis)
    })
}

/// Markdown rendering of the comparisons, or the well-aligned finding.
pub fn render_comparisons(comparisons: &[AssumptionComparison]) -> String {
    if comparisons.is_empty() {
        return WELL_ALIGNED_MESSAGE.to_string();
    }

    comparisons
        .iter()
        .map(|c| {
            format!(
                "- Assumption: {}\n  Reality: {}\n  Insight: {}",
                c.assumption, c.reality, c.insight
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn mentions_word(text: &str, pattern: &'static OnceLock<Regex>, word: &str) -> bool {
    pattern
        .get_or_init(|| Regex::new(&format!(r"(?i)\b{}\b", word)).expect("valid word pattern"))
        .is_match(text)
}

// ============ Default Rules ============

/// Stated target is "young" but Gen Z and Millennials are a minority.
pub struct GenerationRule;

impl GenerationRule {
    fn is_young_cohort(bucket: &str) -> bool {
        let bucket = bucket.to_ascii_lowercase();
        ["gen z", "genz", "generation z", "millennial", "gen y", "generation y"]
            .iter()
            .any(|marker| bucket.contains(marker))
    }
}

impl ComparisonRule for GenerationRule {
    fn name(&self) -> &'static str {
        "generation"
    }

    fn variables(&self) -> &[&'static str] {
        &["generation"]
    }

    fn evaluate(
        &self,
        analysis: &VariableAnalysis,
        context: &BusinessContext,
    ) -> Option<AssumptionComparison> {
        static YOUNG: OnceLock<Regex> = OnceLock::new();
        if !mentions_word(&context.target_customer, &YOUNG, "young") {
            return None;
        }

        let distribution = analysis.distribution()?;
        let young = distribution.share_where(Self::is_young_cohort);
        if young >= 50 {
            return None;
        }
        let older = distribution.total().saturating_sub(young);

        Some(AssumptionComparison {
            assumption: format!("Target customers are young: \"{}\"", context.target_customer),
            reality: format!(
                "Only {}% of matched customers are Millennials or Gen Z; {}% belong to older generations",
                young, older
            ),
            insight: "The customer base skews older than assumed. Messaging built only for young audiences risks missing the majority of actual buyers.".to_string(),
        })
    }
}

/// A majority of high-income households signals a premium market.
pub struct IncomeRule;

impl ComparisonRule for IncomeRule {
    fn name(&self) -> &'static str {
        "income"
    }

    fn variables(&self) -> &[&'static str] {
        &["householdIncome", "INCOME_HH", "income"]
    }

    fn evaluate(
        &self,
        analysis: &VariableAnalysis,
        context: &BusinessContext,
    ) -> Option<AssumptionComparison> {
        let AnalysisDetail::IncomeRanges {
            high_income_percentage,
            threshold_label,
            ..
        } = analysis.detail.as_ref()?
        else {
            return None;
        };
        if *high_income_percentage <= 60 {
            return None;
        }

        Some(AssumptionComparison {
            assumption: format!(
                "Positioning: \"{}\" for \"{}\"",
                context.brand_positioning, context.target_customer
            ),
            reality: format!(
                "{}% of matched customers have household income in the {} bracket",
                high_income_percentage, threshold_label
            ),
            insight: "This is a premium market. There is room for premium positioning and pricing.".to_string(),
        })
    }
}

/// Stated target is urban but a large share lives in the suburbs.
pub struct UrbanicityRule;

impl ComparisonRule for UrbanicityRule {
    fn name(&self) -> &'static str {
        "urbanicity"
    }

    fn variables(&self) -> &[&'static str] {
        &["urbanicity"]
    }

    fn evaluate(
        &self,
        analysis: &VariableAnalysis,
        context: &BusinessContext,
    ) -> Option<AssumptionComparison> {
        static URBAN: OnceLock<Regex> = OnceLock::new();
        if !mentions_word(&context.target_customer, &URBAN, "urban") {
            return None;
        }

        let suburban = analysis
            .distribution()?
            .share_where(|bucket| bucket.eq_ignore_ascii_case("suburban"));
        if suburban <= 40 {
            return None;
        }

        Some(AssumptionComparison {
            assumption: "Customers are primarily urban".to_string(),
            reality: format!("{}% of matched customers live in suburban areas", suburban),
            insight: "There is a geographic mismatch. Suburban locations and suburban-focused messaging deserve attention.".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregation::Distribution;
    use crate::models::VariableCategory;
    use std::collections::BTreeMap;

    fn analysis(distribution: Vec<(&str, u32)>) -> VariableAnalysis {
        let distribution = Distribution::from_entries(
            distribution
                .into_iter()
                .map(|(k, p)| (k.to_string(), p))
                .collect(),
        );
        let top_value = distribution.top().map(|(k, _)| k.to_string()).unwrap_or_default();
        VariableAnalysis {
            category: VariableCategory::Lifestyle,
            coverage: 100,
            summary: String::new(),
            guidance: None,
            detail: Some(AnalysisDetail::Categorical {
                distribution,
                top_value,
            }),
        }
    }

    fn context(target: &str) -> BusinessContext {
        BusinessContext {
            business_name: "Roasted Bean Coffee Co.".to_string(),
            target_customer: target.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_suburban_does_not_count_as_urban() {
        let rule = UrbanicityRule;
        let a = analysis(vec![("Suburban", 70), ("Urban", 30)]);

        assert!(rule.evaluate(&a, &context("Suburban families")).is_none());
        assert!(rule.evaluate(&a, &context("Busy URBAN professionals")).is_some());
    }

    #[test]
    fn test_urbanicity_threshold_is_strict() {
        let rule = UrbanicityRule;
        let a = analysis(vec![("Urban", 60), ("Suburban", 40)]);
        assert!(rule.evaluate(&a, &context("urban")).is_none());
    }

    #[test]
    fn test_generation_counts_all_young_buckets() {
        let rule = GenerationRule;
        let a = analysis(vec![
            ("Gen X", 40),
            ("Millennials", 30),
            ("Gen Z", 25),
            ("Baby Boomers", 5),
        ]);
        // 55% young: no gap
        assert!(rule.evaluate(&a, &context("Young professionals")).is_none());

        let skewed = analysis(vec![("Gen X", 50), ("Millennials", 30), ("Baby Boomers", 20)]);
        let c = rule.evaluate(&skewed, &context("Young professionals")).unwrap();
        assert!(c.reality.contains("30%"));
        assert!(c.reality.contains("70%"));
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let mut variable_analysis = BTreeMap::new();
        variable_analysis.insert("URBANICITY".to_string(), analysis(vec![("Suburban", 80)]));
        let aggregation = AggregationResult {
            total_records: 5,
            enriched_records: 5,
            match_rate: 100,
            variable_analysis,
        };

        let found = ComparisonEngine::default().compare(&aggregation, &context("urban"));
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_render_well_aligned() {
        assert_eq!(render_comparisons(&[]), WELL_ALIGNED_MESSAGE);
    }
}
