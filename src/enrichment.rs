/// Customer enrichment against the identity provider
///
/// Workflow per record:
/// 1. Email lookup (skipped for malformed or placeholder emails)
/// 2. Name + location lookup when the email lookup finds nothing
/// 3. Merge the requested fields and tag the record with its source
///
/// Batches run strictly sequentially with a fixed pause between records.
use crate::errors::AppError;
use crate::identity_client::{extract_fields, IdentityClient, PiiQuery};
use crate::models::{CustomerRecord, EnrichmentSource, EnrichmentStats, FieldValue, Variable};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

pub const DEFAULT_BATCH_LIMIT: usize = 10;
pub const MAX_BATCH_LIMIT: usize = 250;
pub const DEFAULT_DELAY: Duration = Duration::from_millis(200);

/// Pacing and cap for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub limit: usize,
    pub delay: Duration,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            limit: DEFAULT_BATCH_LIMIT,
            delay: DEFAULT_DELAY,
        }
    }
}

/// Validate email address
///
/// Checks for:
/// - Basic shape (contains @ and .)
/// - Placeholder patterns (repeated or sequential digits)
/// - Simplified RFC 5322 structure
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    let fake_patterns = ["999999", "111111", "000000", "123456789"];
    if let Some(pattern) = fake_patterns.iter().find(|p| email.contains(*p)) {
        tracing::warn!("❌ Placeholder email skipped (pattern '{}')", pattern);
        return false;
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let email_regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
        )
        .expect("valid email pattern")
    });

    if !email_regex.is_match(email) {
        tracing::warn!("❌ Malformed email skipped");
        return false;
    }

    true
}

/// Builds the PII query when the record has first and last name plus a city
/// or state.
pub fn pii_query(record: &CustomerRecord) -> Option<PiiQuery> {
    let first_name = record.text("first_name")?;
    let last_name = record.text("last_name")?;
    let city = record.text("city").map(str::to_string);
    let state = record.text("state").map(str::to_string);
    if city.is_none() && state.is_none() {
        return None;
    }

    Some(PiiQuery {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        city,
        state,
    })
}

async fn lookup(
    client: &IdentityClient,
    record: &CustomerRecord,
    requested: &[String],
) -> Result<Option<(EnrichmentSource, Vec<(String, FieldValue)>)>, AppError> {
    if let Some(email) = record.text("email").filter(|e| is_valid_email(e)) {
        if let Some(identity) = client.lookup_by_email(email).await? {
            return Ok(Some((
                EnrichmentSource::Email,
                extract_fields(&identity, requested),
            )));
        }
    }

    if let Some(query) = pii_query(record) {
        if let Some(identity) = client.lookup_by_pii(&query).await? {
            return Ok(Some((
                EnrichmentSource::Pii,
                extract_fields(&identity, requested),
            )));
        }
    }

    Ok(None)
}

/// Enriches one record. Never fails: lookup errors tag the record `error`.
pub async fn enrich_record(
    client: &IdentityClient,
    mut record: CustomerRecord,
    requested: &[String],
) -> CustomerRecord {
    let id = record.identifier().unwrap_or_else(|| "<unknown>".to_string());

    match lookup(client, &record, requested).await {
        Ok(Some((source, fields))) => {
            tracing::debug!(
                "Record {} matched by {} ({} fields)",
                id,
                source.as_str(),
                fields.len()
            );
            record.extend(fields);
            record.tag(source);
        }
        Ok(None) => {
            tracing::debug!("Record {} has no identity match", id);
            record.tag(EnrichmentSource::NoMatch);
        }
        Err(e) => {
            tracing::warn!("Enrichment failed for record {}: {}", id, e);
            record.tag(EnrichmentSource::Error);
        }
    }
    record
}

/// Enriches up to `settings.limit` records, one at a time.
///
/// Records past the cap are dropped. Without a client every processed record
/// is tagged `error`.
pub async fn enrich_batch(
    client: Option<&IdentityClient>,
    records: Vec<CustomerRecord>,
    variables: &[Variable],
    settings: BatchSettings,
) -> (Vec<CustomerRecord>, EnrichmentStats) {
    let requested: Vec<String> = variables.iter().map(|v| v.name.clone()).collect();
    let received = records.len();
    let to_process: Vec<CustomerRecord> = records.into_iter().take(settings.limit).collect();
    let count = to_process.len();

    if received > count {
        tracing::info!(
            "Batch capped at {} of {} records",
            settings.limit,
            received
        );
    }

    let Some(client) = client else {
        tracing::warn!("Identity provider not configured; tagging {} records as error", count);
        let tagged: Vec<CustomerRecord> = to_process
            .into_iter()
            .map(|mut r| {
                r.tag(EnrichmentSource::Error);
                r
            })
            .collect();
        let stats = EnrichmentStats::from_records(&tagged);
        return (tagged, stats);
    };

    tracing::info!(
        "Starting enrichment for {} customers ({} variables)",
        count,
        requested.len()
    );

    let mut results = Vec::with_capacity(count);
    for (index, record) in to_process.into_iter().enumerate() {
        results.push(enrich_record(client, record, &requested).await);

        if index + 1 < count && !settings.delay.is_zero() {
            tokio::time::sleep(settings.delay).await;
        }
    }

    let stats = EnrichmentStats::from_records(&results);
    tracing::info!(
        "✓ Enrichment complete: {}/{} records enhanced ({}%)",
        stats.enhanced,
        stats.total,
        stats.match_rate
    );
    (results, stats)
}
