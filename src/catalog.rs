//! Fixed list of identity-graph variables the selection step may choose from.

use crate::models::{Variable, VariableCategory};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub name: &'static str,
    pub category: VariableCategory,
    pub description: &'static str,
}

const fn entry(name: &'static str, category: VariableCategory, description: &'static str) -> CatalogEntry {
    CatalogEntry {
        name,
        category,
        description,
    }
}

use VariableCategory::*;

pub static CATALOG: [CatalogEntry; 22] = [
    entry("AGE", Demographics, "Customer age for segmentation"),
    entry("GENDER", Demographics, "Gender identification"),
    entry("MARITAL_STATUS", Demographics, "Married/Single status"),
    entry("CHILDREN_HH", Demographics, "Number of children in household"),
    entry("GENERATION", Demographics, "Generational cohort"),
    entry("INCOME_HH", Economic, "Household income levels"),
    entry("NET_WORTH_HH", Economic, "Household net worth"),
    entry("OWNS_INVESTMENTS", Economic, "Investment ownership"),
    entry("CREDIT_CARD", Economic, "Credit card usage patterns"),
    entry("EDUCATION", Lifestyle, "Educational attainment"),
    entry("OCCUPATION_TYPE", Lifestyle, "White collar vs blue collar"),
    entry("URBANICITY", Lifestyle, "Urban/suburban/rural residence"),
    entry("DWELLING_TYPE", Lifestyle, "Housing type"),
    entry("GOURMET_AFFINITY", Interests, "Interest in gourmet/premium products"),
    entry("FITNESS_AFFINITY", Interests, "Health and fitness interest"),
    entry("HIGH_TECH_AFFINITY", Interests, "Technology adoption"),
    entry("TRAVEL_AFFINITY", Interests, "Travel and leisure interest"),
    entry("COOKING_AFFINITY", Interests, "Cooking and culinary interest"),
    entry("BUSINESS_AFFINITY", Interests, "Business and entrepreneurship interest"),
    entry("READING_MAGAZINES", Behavioral, "Magazine reading behavior"),
    entry("LIKELY_CHARITABLE_DONOR", Behavioral, "Charitable giving tendency"),
    entry(
        "RECENT_CATALOG_PURCHASES_TOTAL_ORDERS",
        Behavioral,
        "Catalog shopping behavior",
    ),
];

pub fn all() -> &'static [CatalogEntry] {
    &CATALOG
}

/// Exact-name lookup.
pub fn find(name: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|e| e.name == name)
}

impl CatalogEntry {
    pub fn to_variable(&self, rationale: &str) -> Variable {
        Variable::new(self.name, self.category, rationale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let names: HashSet<&str> = all().iter().map(|e| e.name).collect();
        assert_eq!(names.len(), CATALOG.len());
    }

    #[test]
    fn test_find_is_exact() {
        assert_eq!(find("INCOME_HH").map(|e| e.category), Some(Economic));
        assert!(find("income_hh").is_none());
        assert!(find("ASTROLOGY_SIGN").is_none());
    }
}
