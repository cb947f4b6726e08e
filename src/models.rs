use crate::aggregation::{percentage, AggregationResult};
use crate::identity_client::{EndpointProbe, StructureComparison};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Field that records how a customer record was matched.
pub const ENRICHMENT_SOURCE_FIELD: &str = "enrichment_source";

/// Sentinel the identity provider and CSV exports use for "no value".
pub const MISSING_SENTINEL: &str = "N/A";

// ============ Business Context ============

/// The business's self-description collected by the first wizard step.
/// Every field is optional on the wire; a partial context still drives the
/// later steps and their fallbacks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BusinessContext {
    pub business_name: String,
    pub industry: String,
    pub business_model: String,
    /// Free-text description of who the business believes its customers are.
    pub target_customer: String,
    pub brand_positioning: String,
    pub goals: Vec<String>,
    pub additional_context: String,
}

// ============ Variables ============

/// Closed set of identity-graph variable categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableCategory {
    Demographics,
    Economic,
    Lifestyle,
    Interests,
    Behavioral,
}

impl VariableCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariableCategory::Demographics => "demographics",
            VariableCategory::Economic => "economic",
            VariableCategory::Lifestyle => "lifestyle",
            VariableCategory::Interests => "interests",
            VariableCategory::Behavioral => "behavioral",
        }
    }
}

impl fmt::Display for VariableCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VariableCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "demographics" => Ok(VariableCategory::Demographics),
            "economic" => Ok(VariableCategory::Economic),
            "lifestyle" => Ok(VariableCategory::Lifestyle),
            "interests" => Ok(VariableCategory::Interests),
            "behavioral" => Ok(VariableCategory::Behavioral),
            other => Err(format!("unknown variable category '{}'", other)),
        }
    }
}

/// A selected identity-graph attribute.
///
/// Doubles as the enrichment allow-list entry and the aggregation manifest entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    #[serde(rename = "variable", alias = "name")]
    pub name: String,
    pub category: VariableCategory,
    #[serde(default)]
    pub rationale: String,
}

impl Variable {
    pub fn new(name: &str, category: VariableCategory, rationale: &str) -> Self {
        Self {
            name: name.to_string(),
            category,
            rationale: rationale.to_string(),
        }
    }
}

// ============ Customer Records ============

/// Scalar value held by a customer record field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Converts an arbitrary JSON value coming back from the identity provider.
    /// Nested arrays and objects are kept as their JSON text.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => FieldValue::Null,
            serde_json::Value::Bool(b) => FieldValue::Bool(*b),
            serde_json::Value::Number(n) => n
                .as_f64()
                .map(FieldValue::Number)
                .unwrap_or_else(|| FieldValue::Text(n.to_string())),
            serde_json::Value::String(s) => FieldValue::Text(s.clone()),
            other => FieldValue::Text(other.to_string()),
        }
    }

    /// Null and the `"N/A"` sentinel count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::Text(s) => s == MISSING_SENTINEL,
            _ => false,
        }
    }

    /// Numeric view: real numbers and strings that parse as numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) if n.is_finite() => Some(*n),
            FieldValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// Boolean view: real booleans and common yes/no spellings.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            FieldValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" => Some(true),
                "false" | "no" | "n" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl Serialize for FieldValue {
    /// Integral numbers are written as JSON integers so `30` stays `30`.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_unit(),
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            FieldValue::Number(n) => match integral(*n) {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(*n),
            },
            FieldValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Number(n) => match integral(*n) {
                Some(i) => write!(f, "{}", i),
                None => write!(f, "{}", n),
            },
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Number(value as f64)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

fn integral(n: f64) -> Option<i64> {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 9.0e15 {
        Some(n as i64)
    } else {
        None
    }
}

/// How (or whether) a record was matched against the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentSource {
    Email,
    Pii,
    NoMatch,
    Error,
}

impl EnrichmentSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrichmentSource::Email => "email",
            EnrichmentSource::Pii => "pii",
            EnrichmentSource::NoMatch => "no_match",
            EnrichmentSource::Error => "error",
        }
    }

    /// `email` and `pii` matches count as successfully enriched.
    pub fn is_enriched(&self) -> bool {
        matches!(self, EnrichmentSource::Email | EnrichmentSource::Pii)
    }
}

impl FromStr for EnrichmentSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "email" => Ok(EnrichmentSource::Email),
            "pii" => Ok(EnrichmentSource::Pii),
            "no_match" => Ok(EnrichmentSource::NoMatch),
            "error" => Ok(EnrichmentSource::Error),
            other => Err(format!("unknown enrichment source '{}'", other)),
        }
    }
}

/// Open-ended customer record: any field may later be requested as a variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerRecord(BTreeMap<String, FieldValue>);

impl CustomerRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    /// Value for `key` unless it is absent, null, or `"N/A"`.
    pub fn present(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key).filter(|v| !v.is_missing())
    }

    /// Non-blank text value for `key`.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.present(key)
            .and_then(FieldValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `customer_id`, falling back to `id`.
    pub fn identifier(&self) -> Option<String> {
        ["customer_id", "id"]
            .iter()
            .find_map(|key| self.present(key).map(|v| v.to_string()))
    }

    /// Assigns a random `customer_id` when the record carries no identifier.
    pub fn ensure_identifier(&mut self) {
        if self.identifier().is_none() {
            self.insert("customer_id", Uuid::new_v4().to_string());
        }
    }

    pub fn enrichment_source(&self) -> Option<EnrichmentSource> {
        self.0
            .get(ENRICHMENT_SOURCE_FIELD)
            .and_then(FieldValue::as_str)
            .and_then(|s| s.parse().ok())
    }

    /// Stores the enrichment tag. The field is a map key, so a record can
    /// only ever carry one tag.
    pub fn tag(&mut self, source: EnrichmentSource) {
        self.insert(ENRICHMENT_SOURCE_FIELD, source.as_str());
    }

    pub fn is_enriched(&self) -> bool {
        self.enrichment_source()
            .map(|s| s.is_enriched())
            .unwrap_or(false)
    }
}

impl FromIterator<(String, FieldValue)> for CustomerRecord {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<(String, FieldValue)> for CustomerRecord {
    fn extend<I: IntoIterator<Item = (String, FieldValue)>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

/// Batch-level enrichment counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentStats {
    pub total: usize,
    pub enhanced: usize,
    pub match_rate: u32,
}

impl EnrichmentStats {
    pub fn from_records(records: &[CustomerRecord]) -> Self {
        let total = records.len();
        let enhanced = records.iter().filter(|r| r.is_enriched()).count();
        Self {
            total,
            enhanced,
            match_rate: percentage(enhanced, total),
        }
    }
}

// ============ Insights & Queries ============

/// A detected gap between a stated assumption and the aggregated data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssumptionComparison {
    pub assumption: String,
    pub reality: String,
    pub insight: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryBucket {
    pub category: String,
    pub description: String,
    pub queries: Vec<String>,
}

/// The two query buckets produced for the final wizard step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySuggestions {
    pub market_intelligence: QueryBucket,
    pub growth_audiences: QueryBucket,
}

// ============ API Request/Response Models ============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectVariablesRequest {
    pub business_context: BusinessContext,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SelectVariablesResponse {
    pub variables: Vec<Variable>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichRequest {
    pub customer_data: Vec<CustomerRecord>,
    #[serde(default)]
    pub selected_variables: Vec<Variable>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichResponse {
    pub enriched_customers: Vec<CustomerRecord>,
    pub stats: EnrichmentStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsRequest {
    pub business_context: BusinessContext,
    pub selected_variables: Vec<Variable>,
    #[serde(default)]
    pub enriched_customers: Vec<CustomerRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsightsResponse {
    /// Markdown report.
    pub insights: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregated_data: Option<AggregationResult>,
    pub comparisons: Vec<AssumptionComparison>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueriesRequest {
    pub business_context: BusinessContext,
    pub selected_variables: Vec<Variable>,
    pub insights: String,
    #[serde(default)]
    pub aggregated_data: Option<AggregationResult>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CustomerListResponse {
    pub customers: Vec<CustomerRecord>,
    /// Whether rows beyond the ingest cap were dropped.
    #[serde(default)]
    pub truncated: bool,
}

/// Which lookup endpoints a diagnostics request exercises.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticTest {
    Email,
    Sha256,
    #[default]
    Both,
}

impl DiagnosticTest {
    pub fn includes_email(&self) -> bool {
        matches!(self, DiagnosticTest::Email | DiagnosticTest::Both)
    }

    pub fn includes_sha256(&self) -> bool {
        matches!(self, DiagnosticTest::Sha256 | DiagnosticTest::Both)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsRequest {
    pub email: String,
    #[serde(default)]
    pub test_type: DiagnosticTest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsResponse {
    pub email: String,
    pub test_type: DiagnosticTest,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_endpoint: Option<EndpointProbe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256_endpoint: Option<EndpointProbe>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<StructureComparison>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_value_stringification() {
        assert_eq!(FieldValue::Number(30.0).to_string(), "30");
        assert_eq!(FieldValue::Number(3.5).to_string(), "3.5");
        assert_eq!(FieldValue::Bool(true).to_string(), "true");
        assert_eq!(FieldValue::from("Suburban").to_string(), "Suburban");
    }

    #[test]
    fn test_field_value_serializes_integers_as_integers() {
        let record: CustomerRecord = [
            ("AGE".to_string(), FieldValue::Number(42.0)),
            ("score".to_string(), FieldValue::Number(3.5)),
            ("flag".to_string(), FieldValue::Null),
        ]
        .into_iter()
        .collect();

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"AGE": 42, "flag": null, "score": 3.5}));
    }

    #[test]
    fn test_record_deserializes_open_shape() {
        let record: CustomerRecord = serde_json::from_value(json!({
            "customer_id": "CUST_0001",
            "email": "sarah.johnson@gmail.com",
            "age": 34,
            "vip": false,
            "notes": null
        }))
        .unwrap();

        assert_eq!(record.identifier().as_deref(), Some("CUST_0001"));
        assert_eq!(record.get("age"), Some(&FieldValue::Number(34.0)));
        assert_eq!(record.get("vip"), Some(&FieldValue::Bool(false)));
        assert!(record.present("notes").is_none());
    }

    #[test]
    fn test_missing_values() {
        assert!(FieldValue::Null.is_missing());
        assert!(FieldValue::from("N/A").is_missing());
        assert!(!FieldValue::from("").is_missing());
        assert!(!FieldValue::Number(0.0).is_missing());
    }

    #[test]
    fn test_partial_business_context_defaults() {
        let ctx: BusinessContext =
            serde_json::from_value(json!({"businessName": "Roasted Bean Coffee Co."})).unwrap();
        assert_eq!(ctx.business_name, "Roasted Bean Coffee Co.");
        assert!(ctx.industry.is_empty());
        assert!(ctx.target_customer.is_empty());
        assert!(ctx.goals.is_empty());
    }

    #[test]
    fn test_single_enrichment_tag() {
        let mut record = CustomerRecord::new();
        record.tag(EnrichmentSource::NoMatch);
        record.tag(EnrichmentSource::Email);

        assert_eq!(record.enrichment_source(), Some(EnrichmentSource::Email));
        assert!(record.is_enriched());
        assert_eq!(
            record.fields().filter(|(k, _)| *k == ENRICHMENT_SOURCE_FIELD).count(),
            1
        );
    }

    #[test]
    fn test_ensure_identifier() {
        let mut record = CustomerRecord::new();
        record.insert("email", "a@example.com");
        record.ensure_identifier();
        assert!(record.identifier().is_some());

        let mut existing = CustomerRecord::new();
        existing.insert("id", 7i64);
        existing.ensure_identifier();
        assert_eq!(existing.identifier().as_deref(), Some("7"));
        assert!(existing.get("customer_id").is_none());
    }

    #[test]
    fn test_variable_wire_names() {
        let v: Variable = serde_json::from_value(json!({
            "variable": "INCOME_HH",
            "category": "economic",
            "rationale": "pricing"
        }))
        .unwrap();
        assert_eq!(v.name, "INCOME_HH");
        assert_eq!(v.category, VariableCategory::Economic);

        let alias: Variable =
            serde_json::from_value(json!({"name": "AGE", "category": "demographics"})).unwrap();
        assert_eq!(alias.name, "AGE");
        assert!(alias.rationale.is_empty());

        assert!(serde_json::from_value::<Variable>(
            json!({"variable": "AGE", "category": "astrology"})
        )
        .is_err());
    }

    #[test]
    fn test_stats_from_records() {
        let records: Vec<CustomerRecord> = [
            EnrichmentSource::Email,
            EnrichmentSource::Pii,
            EnrichmentSource::NoMatch,
        ]
        .into_iter()
        .map(|s| {
            let mut r = CustomerRecord::new();
            r.tag(s);
            r
        })
        .collect();

        let stats = EnrichmentStats::from_records(&records);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.enhanced, 2);
        assert_eq!(stats.match_rate, 67);
    }
}
