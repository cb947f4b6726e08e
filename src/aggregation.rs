//! Variable aggregation engine.
//!
//! Reduces a list of enriched customer records and the selected variable
//! manifest into per-variable coverage, distributions, and category-specific
//! statistics. Pure computation: no I/O, no guidance fetching. Thresholds can be
//! overridden per variable through [`AnalysisGuidance`].

use crate::errors::AppError;
use crate::models::{CustomerRecord, FieldValue, Variable, VariableCategory};
use regex::Regex;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::OnceLock;

pub const DEFAULT_INCOME_THRESHOLD: f64 = 100_000.0;
pub const DEFAULT_INCOME_LABEL: &str = "$100K+";
pub const DEFAULT_AFFINITY_THRESHOLD: f64 = 3.0;
pub const DEFAULT_AFFINITY_LABEL: &str = "score 3+";
pub const NO_DATA_SUMMARY: &str = "No data available";

/// `round(100 * part / whole)`, or 0 when `whole` is 0.
pub fn percentage(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((part as f64 * 100.0) / whole as f64).round() as u32
}

// ============ Result Types ============

/// Aggregated view of an enriched customer list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationResult {
    pub total_records: usize,
    /// Records tagged `email` or `pii`.
    pub enriched_records: usize,
    pub match_rate: u32,
    pub variable_analysis: BTreeMap<String, VariableAnalysis>,
}

/// Per-variable statistics. The category-specific detail is flattened onto the
/// object with a `type` tag; a variable without data has no detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableAnalysis {
    pub category: VariableCategory,
    /// Percentage of enriched records carrying a value for this variable.
    pub coverage: u32,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
    #[serde(flatten)]
    pub detail: Option<AnalysisDetail>,
}

impl VariableAnalysis {
    fn no_data(category: VariableCategory) -> Self {
        Self {
            category,
            coverage: 0,
            summary: NO_DATA_SUMMARY.to_string(),
            guidance: None,
            detail: None,
        }
    }

    /// Distribution of the analysis, when its shape has one.
    pub fn distribution(&self) -> Option<&Distribution> {
        match self.detail.as_ref()? {
            AnalysisDetail::Categorical { distribution, .. }
            | AnalysisDetail::IncomeRanges { distribution, .. }
            | AnalysisDetail::Mixed { distribution } => Some(distribution),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisDetail {
    #[serde(rename_all = "camelCase")]
    Categorical {
        distribution: Distribution,
        top_value: String,
    },
    #[serde(rename_all = "camelCase")]
    IncomeRanges {
        distribution: Distribution,
        high_income_percentage: u32,
        threshold: f64,
        threshold_label: String,
    },
    Numeric {
        average: f64,
        range: ValueRange,
    },
    Mixed {
        distribution: Distribution,
    },
    #[serde(rename_all = "camelCase")]
    AffinityScore {
        average_score: f64,
        high_affinity_percentage: u32,
        threshold: f64,
    },
    #[serde(rename_all = "camelCase")]
    BooleanFlag { positive_percentage: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

/// Value → percentage, ordered by descending frequency with ties kept in
/// first-seen order. Serialized as a JSON object in that order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Distribution(Vec<(String, u32)>);

impl Distribution {
    pub fn from_values(values: &[&FieldValue]) -> Self {
        let mut counts: Vec<(String, usize)> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for value in values {
            let key = value.to_string();
            match index.get(&key) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    index.insert(key.clone(), counts.len());
                    counts.push((key, 1));
                }
            }
        }

        // sort_by is stable, so equal counts keep insertion order
        counts.sort_by(|a, b| b.1.cmp(&a.1));

        let total = values.len();
        Self(
            counts
                .into_iter()
                .map(|(key, count)| (key, percentage(count, total)))
                .collect(),
        )
    }

    pub fn from_entries(entries: Vec<(String, u32)>) -> Self {
        Self(entries)
    }

    pub fn entries(&self) -> &[(String, u32)] {
        &self.0
    }

    pub fn top(&self) -> Option<(&str, u32)> {
        self.0.first().map(|(k, p)| (k.as_str(), *p))
    }

    pub fn get(&self, key: &str) -> Option<u32> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, p)| *p)
    }

    /// Sum of the buckets whose key matches `predicate`.
    pub fn share_where<F>(&self, predicate: F) -> u32
    where
        F: Fn(&str) -> bool,
    {
        self.0
            .iter()
            .filter(|(k, _)| predicate(k))
            .map(|(_, p)| *p)
            .sum()
    }

    pub fn total(&self) -> u32 {
        self.0.iter().map(|(_, p)| *p).sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for Distribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, pct) in &self.0 {
            map.serialize_entry(key, pct)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Distribution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DistributionVisitor;

        impl<'de> Visitor<'de> for DistributionVisitor {
            type Value = Distribution;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of value to percentage")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, pct)) = access.next_entry::<String, u32>()? {
                    entries.push((key, pct));
                }
                Ok(Distribution(entries))
            }
        }

        deserializer.deserialize_map(DistributionVisitor)
    }
}

// ============ Guidance ============

/// Externally supplied threshold and label for one economic or interests variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisGuidance {
    pub threshold: f64,
    pub label: String,
}

/// Guidance keyed by variable name.
pub type GuidanceMap = HashMap<String, AnalysisGuidance>;

// ============ Engine ============

/// Aggregates with default thresholds.
pub fn aggregate(
    records: &[CustomerRecord],
    variables: &[Variable],
) -> Result<AggregationResult, AppError> {
    Aggregator::new().aggregate(records, variables)
}

#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    guidance: GuidanceMap,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_guidance(guidance: GuidanceMap) -> Self {
        Self { guidance }
    }

    /// Reduces `records` into per-variable statistics.
    ///
    /// Values are projected from the enriched subset only, so coverage never
    /// exceeds 100. Fails with `InvalidInput` on an empty record list or a
    /// variable with a blank name; no partial result is produced.
    pub fn aggregate(
        &self,
        records: &[CustomerRecord],
        variables: &[Variable],
    ) -> Result<AggregationResult, AppError> {
        if records.is_empty() {
            return Err(AppError::InvalidInput(
                "at least one customer record is required for aggregation".to_string(),
            ));
        }
        if let Some(pos) = variables.iter().position(|v| v.name.trim().is_empty()) {
            return Err(AppError::InvalidInput(format!(
                "variable at position {} has a blank name",
                pos
            )));
        }

        let enriched: Vec<&CustomerRecord> = records.iter().filter(|r| r.is_enriched()).collect();

        let mut variable_analysis = BTreeMap::new();
        for variable in variables {
            let analysis = self.analyze(variable, &enriched);
            variable_analysis.insert(variable.name.clone(), analysis);
        }

        let result = AggregationResult {
            total_records: records.len(),
            enriched_records: enriched.len(),
            match_rate: percentage(enriched.len(), records.len()),
            variable_analysis,
        };

        tracing::debug!(
            "Aggregated {} records ({} enriched, {}% match) across {} variables",
            result.total_records,
            result.enriched_records,
            result.match_rate,
            result.variable_analysis.len()
        );

        Ok(result)
    }

    fn analyze(&self, variable: &Variable, enriched: &[&CustomerRecord]) -> VariableAnalysis {
        let values: Vec<&FieldValue> = enriched
            .iter()
            .filter_map(|record| record.present(&variable.name))
            .collect();

        if values.is_empty() {
            return VariableAnalysis::no_data(variable.category);
        }

        // only thresholded categories consume guidance
        let (detail, summary, guidance) = match variable.category {
            VariableCategory::Demographics
            | VariableCategory::Lifestyle
            | VariableCategory::Behavioral => {
                let (detail, summary) = categorical(&values);
                (detail, summary, None)
            }
            VariableCategory::Economic => {
                let guidance = self.guidance_for(&variable.name);
                let (detail, summary) = economic(&values, guidance);
                (detail, summary, guidance)
            }
            VariableCategory::Interests => {
                let guidance = self.guidance_for(&variable.name);
                let (detail, summary) = interests(&values, guidance);
                (detail, summary, guidance)
            }
        };

        VariableAnalysis {
            category: variable.category,
            coverage: percentage(values.len(), enriched.len()),
            summary,
            guidance: guidance.map(|g| g.label.clone()),
            detail: Some(detail),
        }
    }

    fn guidance_for(&self, name: &str) -> Option<&AnalysisGuidance> {
        self.guidance.get(name).or_else(|| {
            self.guidance
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, g)| g)
        })
    }
}

fn categorical(values: &[&FieldValue]) -> (AnalysisDetail, String) {
    let distribution = Distribution::from_values(values);
    let (top_value, top_pct) = distribution
        .top()
        .map(|(k, p)| (k.to_string(), p))
        .unwrap_or_default();

    let summary = format!(
        "Most common: {} ({}%) across {} distinct values",
        top_value,
        top_pct,
        distribution.len()
    );

    (
        AnalysisDetail::Categorical {
            distribution,
            top_value,
        },
        summary,
    )
}

fn economic(values: &[&FieldValue], guidance: Option<&AnalysisGuidance>) -> (AnalysisDetail, String) {
    let currency: Vec<&str> = values
        .iter()
        .filter_map(|v| v.as_str())
        .filter(|s| s.contains('$'))
        .collect();
    let numeric: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();

    if currency.len() * 2 > values.len() {
        let threshold = guidance
            .map(|g| g.threshold)
            .unwrap_or(DEFAULT_INCOME_THRESHOLD);
        let label = guidance
            .map(|g| g.label.clone())
            .unwrap_or_else(|| DEFAULT_INCOME_LABEL.to_string());

        let floors: Vec<f64> = currency.iter().filter_map(|s| income_floor(s)).collect();
        let high = floors.iter().filter(|f| **f >= threshold).count();
        let high_income_percentage = percentage(high, floors.len());

        let summary = format!(
            "{}% of customers report household income in the {} bracket",
            high_income_percentage, label
        );
        return (
            AnalysisDetail::IncomeRanges {
                distribution: Distribution::from_values(values),
                high_income_percentage,
                threshold,
                threshold_label: label,
            },
            summary,
        );
    }

    if numeric.len() == values.len() {
        let average = numeric.iter().sum::<f64>() / numeric.len() as f64;
        let min = numeric.iter().copied().fold(f64::INFINITY, f64::min);
        let max = numeric.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let summary = format!(
            "Average {}, ranging from {} to {}",
            FieldValue::Number(average.round()),
            FieldValue::Number(min),
            FieldValue::Number(max)
        );
        return (
            AnalysisDetail::Numeric {
                average,
                range: ValueRange { min, max },
            },
            summary,
        );
    }

    let distribution = Distribution::from_values(values);
    let summary = match distribution.top() {
        Some((top, pct)) => format!("Mixed formats; most common: {} ({}%)", top, pct),
        None => NO_DATA_SUMMARY.to_string(),
    };
    (AnalysisDetail::Mixed { distribution }, summary)
}

fn interests(values: &[&FieldValue], guidance: Option<&AnalysisGuidance>) -> (AnalysisDetail, String) {
    let scores: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
    if scores.len() == values.len() {
        let threshold = guidance
            .map(|g| g.threshold)
            .unwrap_or(DEFAULT_AFFINITY_THRESHOLD);
        let label = guidance
            .map(|g| g.label.as_str())
            .unwrap_or(DEFAULT_AFFINITY_LABEL);

        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let average_score = (mean * 10.0).round() / 10.0;
        let high = scores.iter().filter(|s| **s >= threshold).count();
        let high_affinity_percentage = percentage(high, scores.len());

        let summary = format!(
            "Average affinity {:.1}/5; {}% at {}",
            average_score, high_affinity_percentage, label
        );
        return (
            AnalysisDetail::AffinityScore {
                average_score,
                high_affinity_percentage,
                threshold,
            },
            summary,
        );
    }

    let flags: Vec<bool> = values.iter().filter_map(|v| v.as_bool()).collect();
    if flags.len() == values.len() {
        let positive = flags.iter().filter(|f| **f).count();
        let positive_percentage = percentage(positive, flags.len());
        return (
            AnalysisDetail::BooleanFlag { positive_percentage },
            format!("{}% flagged positive", positive_percentage),
        );
    }

    categorical(values)
}

/// Representative numeric floor of an income string.
///
/// `"$100K to $149K"` → 100000, `"$1.5M+"` → 1500000, `"$75,000-$99,999"` → 75000.
pub fn income_floor(raw: &str) -> Option<f64> {
    static SUFFIXED: OnceLock<Regex> = OnceLock::new();
    static PLAIN: OnceLock<Regex> = OnceLock::new();

    let suffixed = SUFFIXED
        .get_or_init(|| Regex::new(r"(?i)\$\s*(\d[\d,]*(?:\.\d+)?)\s*([KM])").expect("valid income pattern"));
    if let Some(caps) = suffixed.captures(raw) {
        let amount = parse_amount(&caps[1])?;
        let multiplier = if caps[2].eq_ignore_ascii_case("m") {
            1_000_000.0
        } else {
            1_000.0
        };
        return Some(amount * multiplier);
    }

    let plain = PLAIN.get_or_init(|| Regex::new(r"\$\s*(\d[\d,]*(?:\.\d+)?)").expect("valid income pattern"));
    plain.captures(raw).and_then(|caps| parse_amount(&caps[1]))
}

fn parse_amount(digits: &str) -> Option<f64> {
    digits.replace(',', "").parse::<f64>().ok()
}
