//! Canned outputs used whenever the LLM is unavailable or unparseable.
//! Deterministic: the same business context always yields the same output.

use crate::comparison::render_comparisons;
use crate::models::{
    AssumptionComparison, BusinessContext, QueryBucket, QuerySuggestions, Variable,
    VariableCategory,
};

pub fn fallback_variables(ctx: &BusinessContext) -> Vec<Variable> {
    use VariableCategory::*;

    let mut variables = vec![
        Variable::new(
            "AGE",
            Demographics,
            "Core demographic for market segmentation and age-appropriate messaging",
        ),
        Variable::new(
            "INCOME_HH",
            Economic,
            "Essential for pricing strategy and premium positioning decisions",
        ),
        Variable::new(
            "EDUCATION",
            Lifestyle,
            "Indicates customer sophistication and preferred communication style",
        ),
        Variable::new(
            "URBANICITY",
            Lifestyle,
            "Geographic preferences affect brand positioning and distribution strategy",
        ),
        Variable::new(
            "MARITAL_STATUS",
            Demographics,
            "Life stage affects purchasing behavior and product usage patterns",
        ),
        Variable::new(
            "OCCUPATION_TYPE",
            Lifestyle,
            "Professional vs blue-collar preferences inform messaging approach",
        ),
    ];

    match ctx.industry.trim() {
        "Food & Beverage" => variables.extend([
            Variable::new(
                "GOURMET_AFFINITY",
                Interests,
                "Quality appreciation aligns with premium food and beverage positioning",
            ),
            Variable::new(
                "FITNESS_AFFINITY",
                Interests,
                "Health consciousness affects food and beverage preferences",
            ),
        ]),
        "Technology" => variables.extend([
            Variable::new(
                "HIGH_TECH_AFFINITY",
                Interests,
                "Technology adoption patterns are crucial for tech product positioning",
            ),
            Variable::new(
                "BUSINESS_AFFINITY",
                Interests,
                "B2B technology adoption correlates with business interest",
            ),
        ]),
        _ => {}
    }

    variables
}

pub fn fallback_insights(
    ctx: &BusinessContext,
    variables: &[Variable],
    comparisons: &[AssumptionComparison],
) -> String {
    let mut report = format!(
        "# Customer Intelligence Report\n\
         ## {name}\n\n\
         ### Executive Summary\n\n\
         Analysis of your customer data points to opportunities to refine brand positioning and targeting. \
         The findings below compare your stated assumptions with what the enriched data shows.\n\n\
         ### Assumptions vs Data\n\n{findings}\n\n\
         ### Strategic Recommendations\n\n\
         #### 1. Brand Positioning Review\n\
         **Current:** \"{positioning}\"\n\
         **Consider:** A premium {industry} experience for customers who value quality.\n\n\
         #### 2. Target Audience Refinement\n\
         Validate the stated target customer (\"{target}\") against the strongest segments in the data.\n\n\
         #### 3. Messaging Strategy\n\
         Lead with the attributes your highest-coverage variables describe best.\n\n\
         ### Immediate Action Items\n\n\
         1. Review website copy against the customer profile above\n\
         2. Test premium pricing on select products or services\n\
         3. Build lookalike audiences from your best-matched customers\n\
         4. Re-run this analysis on a larger customer sample\n\
         5. Share the comparison table with your marketing team\n",
        name = ctx.business_name,
        findings = render_comparisons(comparisons),
        positioning = ctx.brand_positioning,
        industry = ctx.industry.to_lowercase(),
        target = ctx.target_customer,
    );

    if !comparisons.is_empty() {
        report.push_str(
            "\n### Detected Gaps\n\n| Assumption | Data Reality | Insight |\n|---|---|---|\n",
        );
        for c in comparisons {
            report.push_str(&format!(
                "| {} | {} | {} |\n",
                table_cell(&c.assumption),
                table_cell(&c.reality),
                table_cell(&c.insight)
            ));
        }
    }

    report.push_str(&format!(
        "\n---\n**BrandIntel Customer Intelligence Analysis**\n*Report generated from {} strategic variables*\n",
        variables.len()
    ));
    report
}

fn table_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

pub fn fallback_queries(ctx: &BusinessContext) -> QuerySuggestions {
    let industry = ctx.industry.to_lowercase();

    let mut market = vec![
        format!(
            "Analyze demographic composition and income distribution in the top 3 markets for {}",
            ctx.business_name
        ),
        "Compare lifestyle preferences and purchasing behaviors across different age groups in our target geography".to_string(),
        "Show education levels, professional occupations, and family status patterns among high-value customer segments".to_string(),
        "Identify market segments with the highest concentration of customers matching our ideal profile".to_string(),
    ];
    let mut growth = vec![
        "Count prospects matching our best customer profile: similar demographics, income levels, and lifestyle interests".to_string(),
        "Size the addressable market for customers with high disposable income and interests aligned with our positioning".to_string(),
        "Quantify growth opportunities in adjacent zip codes with similar demographic patterns to our current customer base".to_string(),
        "Estimate market potential for premium segments that match our most profitable customer characteristics".to_string(),
    ];

    if industry.contains("food") || industry.contains("retail") {
        market[1] = "Compare shopping behaviors, brand preferences, and spending patterns across different demographic segments".to_string();
        growth[0] = "Count prospects with high disposable income, premium product affinity, and shopping behaviors matching our best customers".to_string();
    } else if industry.contains("real estate") {
        market[0] = "Analyze homeownership rates, property values, and investment behavior across target neighborhoods".to_string();
        growth[0] = "Count high-net-worth prospects with investment experience and property ownership in target markets".to_string();
    } else if industry.contains("professional") || industry.contains("services") {
        market[1] = "Compare business ownership, professional occupations, and service purchasing patterns across market segments".to_string();
        growth[0] = "Count business owners and professionals with characteristics matching our most engaged clients".to_string();
    }

    QuerySuggestions {
        market_intelligence: QueryBucket {
            category: "Market Analysis".to_string(),
            description: "Queries to understand market size and landscape".to_string(),
            queries: market,
        },
        growth_audiences: QueryBucket {
            category: "Growth Audience Discovery".to_string(),
            description: "Find prospects matching discovered customer patterns".to_string(),
            queries: growth,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(industry: &str) -> BusinessContext {
        BusinessContext {
            business_name: "Roasted Bean Coffee Co.".to_string(),
            industry: industry.to_string(),
            brand_positioning: "Fast, affordable coffee".to_string(),
            target_customer: "Young urban professionals".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_industry_extras() {
        assert_eq!(fallback_variables(&ctx("Food & Beverage")).len(), 8);
        assert_eq!(fallback_variables(&ctx("Technology")).len(), 8);
        assert_eq!(fallback_variables(&ctx("Healthcare")).len(), 6);
    }

    #[test]
    fn test_insights_name_business_and_variable_count() {
        let report = fallback_insights(&ctx("Food & Beverage"), &fallback_variables(&ctx("x")), &[]);
        assert!(report.starts_with("# Customer Intelligence Report\n## Roasted Bean Coffee Co."));
        assert!(report.contains("\"Fast, affordable coffee\""));
        assert!(report.contains("premium food & beverage experience"));
        assert!(report.contains("Report generated from 6 strategic variables"));
        assert!(!report.contains("Detected Gaps"));
    }

    #[test]
    fn test_queries_customised_by_industry() {
        let food = fallback_queries(&ctx("Food & Beverage"));
        assert!(food.growth_audiences.queries[0].contains("premium product affinity"));

        let realty = fallback_queries(&ctx("Real Estate"));
        assert!(realty.market_intelligence.queries[0].contains("homeownership"));

        let plain = fallback_queries(&ctx("Healthcare"));
        assert!(plain.market_intelligence.queries[0].contains("Roasted Bean Coffee Co."));
        assert_eq!(plain.growth_audiences.category, "Growth Audience Discovery");
    }

    #[test]
    fn test_fallbacks_are_deterministic() {
        let c = ctx("Technology");
        assert_eq!(fallback_queries(&c), fallback_queries(&c));
        assert_eq!(fallback_insights(&c, &[], &[]), fallback_insights(&c, &[], &[]));
    }
}
