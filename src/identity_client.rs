use crate::errors::AppError;
use crate::models::FieldValue;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::Sha256;
use std::time::Duration;

/// Sections of an identity searched for a requested field, in priority order.
const SECTIONS: [Section; 5] = [
    Section::FirstOf("data"),
    Section::Root,
    Section::Object("finances"),
    Section::FirstOf("properties"),
    Section::FirstOf("vehicles"),
];

#[derive(Clone, Copy)]
enum Section {
    Root,
    Object(&'static str),
    FirstOf(&'static str),
}

impl Section {
    fn resolve<'a>(&self, identity: &'a Value) -> Option<&'a serde_json::Map<String, Value>> {
        match self {
            Section::Root => identity.as_object(),
            Section::Object(key) => identity.get(key)?.as_object(),
            Section::FirstOf(key) => identity.get(key)?.as_array()?.first()?.as_object(),
        }
    }
}

/// Name + location query for the PII lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PiiQuery {
    pub first_name: String,
    pub last_name: String,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl PiiQuery {
    fn params(&self) -> Vec<(&'static str, &str)> {
        let mut params = vec![
            ("firstName", self.first_name.as_str()),
            ("lastName", self.last_name.as_str()),
        ];
        if let Some(city) = &self.city {
            params.push(("city", city.as_str()));
        }
        if let Some(state) = &self.state {
            params.push(("state", state.as_str()));
        }
        params
    }
}

#[derive(Debug, Deserialize)]
struct IdentitiesEnvelope {
    #[serde(default)]
    identities: Vec<Value>,
}

/// Key layout of an identity response, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityStructure {
    pub identities_count: usize,
    pub data_fields: Vec<String>,
    pub property_fields: Vec<String>,
    pub vehicle_fields: Vec<String>,
    pub finance_fields: Vec<String>,
}

impl IdentityStructure {
    pub fn of(identities: &[Value]) -> Self {
        let keys = |section: Section| -> Vec<String> {
            identities
                .first()
                .and_then(|identity| section.resolve(identity))
                .map(|obj| obj.keys().cloned().collect())
                .unwrap_or_default()
        };

        Self {
            identities_count: identities.len(),
            data_fields: keys(Section::FirstOf("data")),
            property_fields: keys(Section::FirstOf("properties")),
            vehicle_fields: keys(Section::FirstOf("vehicles")),
            finance_fields: keys(Section::Object("finances")),
        }
    }
}

/// Outcome of one diagnostic call against a lookup endpoint.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointProbe {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure: Option<IdentityStructure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Data-field differences between the email and hashed-email responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StructureComparison {
    pub identical: bool,
    pub missing_in_sha256: Vec<String>,
    pub extra_in_sha256: Vec<String>,
    pub common_fields: Vec<String>,
}

impl StructureComparison {
    pub fn between(email: &IdentityStructure, sha256: &IdentityStructure) -> Self {
        let missing_in_sha256: Vec<String> = email
            .data_fields
            .iter()
            .filter(|f| !sha256.data_fields.contains(f))
            .cloned()
            .collect();
        let extra_in_sha256: Vec<String> = sha256
            .data_fields
            .iter()
            .filter(|f| !email.data_fields.contains(f))
            .cloned()
            .collect();
        let common_fields: Vec<String> = email
            .data_fields
            .iter()
            .filter(|f| sha256.data_fields.contains(f))
            .cloned()
            .collect();

        Self {
            identical: email == sha256,
            missing_in_sha256,
            extra_in_sha256,
            common_fields,
        }
    }
}

/// Client for the identity-resolution provider.
///
/// Every request carries a freshly signed `Authorization` header.
#[derive(Clone)]
pub struct IdentityClient {
    client: reqwest::Client,
    origin: String,
    key_id: String,
    secret: String,
}

impl IdentityClient {
    /// Creates a new `IdentityClient`.
    ///
    /// # Arguments
    ///
    /// * `origin` - Provider origin, e.g. `https://identity.example.com`.
    /// * `key_id` - Key identifier prefixed to every signature.
    /// * `secret` - Shared secret mixed into the signature hash. Never logged.
    /// * `timeout` - Per-request timeout.
    pub fn new(
        origin: String,
        key_id: String,
        secret: String,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                AppError::UpstreamUnavailable(format!("Failed to create identity client: {}", e))
            })?;

        Ok(Self {
            client,
            origin: origin.trim_end_matches('/').to_string(),
            key_id,
            secret,
        })
    }

    /// `{keyId}{millis}{md5hex(millis + secret)}`
    pub fn auth_header_at(&self, timestamp_millis: i64) -> String {
        let timestamp = timestamp_millis.to_string();
        let mut hasher = Md5::new();
        hasher.update(timestamp.as_bytes());
        hasher.update(self.secret.as_bytes());
        let hash = hex::encode(hasher.finalize());
        format!("{}{}{}", self.key_id, timestamp, hash)
    }

    pub fn auth_header(&self) -> String {
        self.auth_header_at(chrono::Utc::now().timestamp_millis())
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<reqwest::Url, AppError> {
        reqwest::Url::parse_with_params(&format!("{}{}", self.origin, path), params)
            .map_err(|e| AppError::InternalError(format!("Failed to build identity URL: {}", e)))
    }

    async fn send(&self, url: reqwest::Url) -> Result<reqwest::Response, AppError> {
        self.client
            .get(url)
            .header("Authorization", self.auth_header())
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(format!("Identity request failed: {}", e)))
    }

    /// Returns the first identity, or `None` on a non-2xx status or an empty
    /// identity list. Transport and decoding failures are errors.
    async fn first_identity(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<Option<Value>, AppError> {
        let url = self.endpoint(path, params)?;
        let response = self.send(url).await?;

        if !response.status().is_success() {
            tracing::warn!("Identity lookup {} returned {}", path, response.status());
            return Ok(None);
        }

        let envelope: IdentitiesEnvelope = response.json().await.map_err(|e| {
            AppError::UpstreamUnavailable(format!("Failed to decode identity response: {}", e))
        })?;

        Ok(envelope.identities.into_iter().next())
    }

    pub async fn lookup_by_email(&self, email: &str) -> Result<Option<Value>, AppError> {
        tracing::debug!("Identity lookup by email");
        self.first_identity("/v2/identities/byEmail", &[("email", email)])
            .await
    }

    pub async fn lookup_by_pii(&self, query: &PiiQuery) -> Result<Option<Value>, AppError> {
        tracing::debug!("Identity lookup by name and location");
        self.first_identity("/v2/identities/byPii", &query.params())
            .await
    }

    pub async fn lookup_by_sha256(&self, email: &str) -> Result<Option<Value>, AppError> {
        let hash = email_sha256(email);
        self.first_identity("/v2/identities/bySha256", &[("sha256", hash.as_str())])
            .await
    }

    /// Calls the email endpoint and reports status plus response structure.
    pub async fn probe_email(&self, email: &str) -> EndpointProbe {
        self.probe("/v2/identities/byEmail", &[("email", email)], None)
            .await
    }

    /// Calls the hashed-email endpoint and reports status plus response structure.
    pub async fn probe_sha256(&self, email: &str) -> EndpointProbe {
        let hash = email_sha256(email);
        self.probe(
            "/v2/identities/bySha256",
            &[("sha256", hash.as_str())],
            Some(hash.clone()),
        )
        .await
    }

    async fn probe(
        &self,
        path: &str,
        params: &[(&str, &str)],
        hash_used: Option<String>,
    ) -> EndpointProbe {
        let mut probe = EndpointProbe {
            hash_used,
            ..Default::default()
        };

        let response = match self.endpoint(path, params) {
            Ok(url) => self.send(url).await,
            Err(e) => Err(e),
        };
        let response = match response {
            Ok(r) => r,
            Err(e) => {
                probe.error = Some(e.to_string());
                return probe;
            }
        };

        probe.status = Some(response.status().as_u16());
        probe.ok = response.status().is_success();

        if !probe.ok {
            probe.error = Some(
                response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string()),
            );
            return probe;
        }

        match response.json::<IdentitiesEnvelope>().await {
            Ok(envelope) => probe.structure = Some(IdentityStructure::of(&envelope.identities)),
            Err(e) => probe.error = Some(format!("Failed to decode identity response: {}", e)),
        }
        probe
    }
}

/// Hex SHA-256 of the trimmed, lowercased email.
pub fn email_sha256(email: &str) -> String {
    let normalized = email.trim().to_lowercase();
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

/// Pulls the requested fields out of one identity.
///
/// Each field is looked up by exact key across the sections in priority order,
/// then case-insensitively in the same order. Null values count as absent.
pub fn extract_fields(identity: &Value, requested: &[String]) -> Vec<(String, FieldValue)> {
    let sections: Vec<&serde_json::Map<String, Value>> =
        SECTIONS.iter().filter_map(|s| s.resolve(identity)).collect();

    requested
        .iter()
        .filter_map(|field| {
            let exact = sections
                .iter()
                .find_map(|obj| obj.get(field).filter(|v| !v.is_null()));
            let value = exact.or_else(|| {
                sections.iter().find_map(|obj| {
                    obj.iter()
                        .find(|(k, v)| k.eq_ignore_ascii_case(field) && !v.is_null())
                        .map(|(_, v)| v)
                })
            })?;
            Some((field.clone(), FieldValue::from_json(value)))
        })
        .collect()
}
