/// Comparison engine extension: rules registered alongside the defaults
use brandintel_api::aggregation::{aggregate, AnalysisDetail, VariableAnalysis};
use brandintel_api::comparison::{ComparisonEngine, ComparisonRule};
use brandintel_api::fallbacks::fallback_insights;
use brandintel_api::models::{
    AssumptionComparison, BusinessContext, CustomerRecord, EnrichmentSource, FieldValue,
    Variable, VariableCategory,
};

/// Flags a fitness-focused brand whose customers show little fitness affinity.
struct FitnessRule;

impl ComparisonRule for FitnessRule {
    fn name(&self) -> &'static str {
        "fitness"
    }

    fn variables(&self) -> &[&'static str] {
        &["FITNESS_AFFINITY"]
    }

    fn evaluate(
        &self,
        analysis: &VariableAnalysis,
        context: &BusinessContext,
    ) -> Option<AssumptionComparison> {
        if !context.brand_positioning.to_lowercase().contains("healthy") {
            return None;
        }
        let AnalysisDetail::AffinityScore {
            high_affinity_percentage,
            ..
        } = analysis.detail.as_ref()?
        else {
            return None;
        };
        (*high_affinity_percentage < 30).then(|| AssumptionComparison {
            assumption: "Customers choose us for healthy options".to_string(),
            reality: format!("{}% show strong fitness affinity", high_affinity_percentage),
            insight: "Health messaging is not what brings customers in.".to_string(),
        })
    }
}

fn context() -> BusinessContext {
    BusinessContext {
        business_name: "Green Bowl".to_string(),
        industry: "Food & Beverage".to_string(),
        target_customer: "Urban office workers".to_string(),
        brand_positioning: "Healthy lunches with premium ingredients".to_string(),
        ..Default::default()
    }
}

fn customers() -> Vec<CustomerRecord> {
    [
        (1i64, "Suburban", "$150K to $174K"),
        (2, "Suburban", "$200K to $249K"),
        (1, "Urban", "$100K to $149K"),
        (4, "Suburban", "$125K to $149K"),
    ]
    .iter()
    .map(|(fitness, urbanicity, income)| {
        let mut r = CustomerRecord::new();
        r.insert("FITNESS_AFFINITY", *fitness);
        r.insert("URBANICITY", *urbanicity);
        r.insert("INCOME_HH", FieldValue::from(*income));
        r.tag(EnrichmentSource::Email);
        r
    })
    .collect()
}

fn variables() -> Vec<Variable> {
    vec![
        Variable::new("INCOME_HH", VariableCategory::Economic, ""),
        Variable::new("URBANICITY", VariableCategory::Lifestyle, ""),
        Variable::new("FITNESS_AFFINITY", VariableCategory::Interests, ""),
    ]
}

#[test]
fn test_custom_rule_runs_after_defaults() {
    let engine = ComparisonEngine::default().register(FitnessRule);
    assert_eq!(engine.len(), 4);

    let result = aggregate(&customers(), &variables()).unwrap();
    let comparisons = engine.compare(&result, &context());

    let realities: Vec<&str> = comparisons.iter().map(|c| c.reality.as_str()).collect();
    assert_eq!(
        realities,
        vec![
            "100% of matched customers have household income in the $100K+ bracket",
            "75% of matched customers live in suburban areas",
            "25% show strong fitness affinity",
        ]
    );
}

#[test]
fn test_empty_engine_finds_nothing() {
    let engine = ComparisonEngine::empty();
    assert!(engine.is_empty());

    let result = aggregate(&customers(), &variables()).unwrap();
    assert!(engine.compare(&result, &context()).is_empty());
}

#[test]
fn test_fallback_report_lists_detected_gaps() {
    let result = aggregate(&customers(), &variables()).unwrap();
    let comparisons = ComparisonEngine::default().compare(&result, &context());

    let report = fallback_insights(&context(), &variables(), &comparisons);
    assert!(report.contains("Detected Gaps"));
    assert!(report.contains("premium market"));
    assert!(report
        .trim_end()
        .ends_with("*Report generated from 3 strategic variables*"));
}
