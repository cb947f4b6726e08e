use crate::catalog::{self, CatalogEntry};
use crate::config::Config;
use crate::devlog::DevLogger;
use crate::enrichment::enrich_batch;
use crate::errors::AppError;
use crate::identity_client::{IdentityClient, StructureComparison};
use crate::ingest;
use crate::llm_client::LlmClient;
use crate::models::*;
use crate::services::NarrativeService;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Identity provider client; `None` when credentials are not configured.
    pub identity: Option<IdentityClient>,
    /// LLM client; `None` without an API key, in which case narrative steps use fallbacks.
    pub llm: Option<LlmClient>,
    /// Development file logger (disabled outside development).
    pub dev_log: DevLogger,
}

impl AppState {
    /// Builds the outbound clients from configuration.
    pub fn from_config(config: Config) -> Result<Self, AppError> {
        let identity = config
            .identity
            .as_ref()
            .map(|id| {
                IdentityClient::new(
                    id.origin.clone(),
                    id.key_id.clone(),
                    id.secret.clone(),
                    config.http_timeout(),
                )
            })
            .transpose()?;
        if let Some(id) = &config.identity {
            tracing::info!("✓ Identity client initialized: {}", id.origin);
        }

        let llm = config
            .anthropic_api_key
            .as_ref()
            .map(|key| {
                LlmClient::new(
                    config.llm_base_url.clone(),
                    key.clone(),
                    config.llm_model.clone(),
                    config.http_timeout(),
                )
            })
            .transpose()?;
        if llm.is_some() {
            tracing::info!("✓ LLM client initialized: {}", config.llm_model);
        }

        let dev_log = if config.is_development() {
            tracing::info!("Development logging to {}", config.dev_log_dir.display());
            DevLogger::new(config.dev_log_dir.clone())
        } else {
            DevLogger::disabled()
        };

        Ok(Self {
            config,
            identity,
            llm,
            dev_log,
        })
    }

    fn narrative(&self) -> NarrativeService<'_> {
        NarrativeService::new(self.llm.as_ref())
    }
}

/// All `/api/v1` routes, without middleware or state.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/variables", get(list_variables))
        .route("/api/v1/sample-customers", get(sample_customers))
        .route("/api/v1/customers/csv", post(upload_customers_csv))
        .route("/api/v1/select-variables", post(select_variables))
        .route("/api/v1/enrich-data", post(enrich_data))
        .route("/api/v1/generate-insights", post(generate_insights))
        .route("/api/v1/generate-queries", post(generate_queries))
        .route("/api/v1/identity/diagnostics", post(identity_diagnostics))
}

/// Health check endpoint.
///
/// Returns the service status and which upstream integrations are configured.
pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "brandintel-api",
            "version": env!("CARGO_PKG_VERSION"),
            "identityConfigured": state.identity.is_some(),
            "llmConfigured": state.llm.is_some(),
        })),
    )
}

#[derive(Serialize)]
pub struct CatalogResponse {
    pub variables: &'static [CatalogEntry],
}

/// GET /api/v1/variables
pub async fn list_variables() -> Json<CatalogResponse> {
    Json(CatalogResponse {
        variables: catalog::all(),
    })
}

/// GET /api/v1/sample-customers
pub async fn sample_customers() -> Json<CustomerListResponse> {
    Json(CustomerListResponse {
        customers: ingest::sample_customers(),
        truncated: false,
    })
}

/// POST /api/v1/customers/csv
///
/// Body is the raw CSV text with a header row.
pub async fn upload_customers_csv(body: String) -> Result<Json<CustomerListResponse>, AppError> {
    if body.trim().is_empty() {
        return Err(AppError::InvalidInput("CSV body is empty".to_string()));
    }
    Ok(Json(ingest::parse_csv(&body)?))
}

/// POST /api/v1/select-variables
pub async fn select_variables(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SelectVariablesRequest>, JsonRejection>,
) -> Result<Json<SelectVariablesResponse>, AppError> {
    let Json(req) = payload?;
    tracing::info!("POST /select-variables - business: {}", req.business_context.business_name);

    let variables = state.narrative().select_variables(&req.business_context).await;
    Ok(Json(SelectVariablesResponse { variables }))
}

/// POST /api/v1/enrich-data
///
/// Enriches the first `ENRICHMENT_BATCH_LIMIT` customers sequentially.
pub async fn enrich_data(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<EnrichRequest>, JsonRejection>,
) -> Result<Json<EnrichResponse>, AppError> {
    let Json(req) = payload?;
    if req.customer_data.is_empty() {
        return Err(AppError::InvalidInput(
            "customerData must contain at least one record".to_string(),
        ));
    }
    tracing::info!(
        "POST /enrich-data - {} customers, variables: {:?}",
        req.customer_data.len(),
        req.selected_variables.iter().map(|v| v.name.as_str()).collect::<Vec<_>>()
    );

    let (enriched_customers, stats) = enrich_batch(
        state.identity.as_ref(),
        req.customer_data,
        &req.selected_variables,
        state.config.batch_settings(),
    )
    .await;

    state.dev_log.log("enrichment_stats", &stats);

    Ok(Json(EnrichResponse {
        enriched_customers,
        stats,
    }))
}

/// POST /api/v1/generate-insights
pub async fn generate_insights(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InsightsRequest>, JsonRejection>,
) -> Result<Json<InsightsResponse>, AppError> {
    let Json(req) = payload?;
    tracing::info!(
        "POST /generate-insights - {} variables, {} enriched customers",
        req.selected_variables.len(),
        req.enriched_customers.len()
    );

    let response = state
        .narrative()
        .generate_insights(
            &req.business_context,
            &req.selected_variables,
            &req.enriched_customers,
        )
        .await?;

    if let Some(aggregation) = &response.aggregated_data {
        state.dev_log.log("aggregated_data", aggregation);
    }
    if !response.comparisons.is_empty() {
        state.dev_log.log("assumption_comparisons", &response.comparisons);
    }

    Ok(Json(response))
}

/// POST /api/v1/generate-queries
pub async fn generate_queries(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueriesRequest>, JsonRejection>,
) -> Result<Json<QuerySuggestions>, AppError> {
    let Json(req) = payload?;
    if req.insights.trim().is_empty() {
        return Err(AppError::InvalidInput("insights must not be empty".to_string()));
    }
    tracing::info!("POST /generate-queries - business: {}", req.business_context.business_name);

    let queries = state
        .narrative()
        .generate_queries(
            &req.business_context,
            &req.selected_variables,
            &req.insights,
            req.aggregated_data.as_ref(),
        )
        .await;

    Ok(Json(queries))
}

/// POST /api/v1/identity/diagnostics
///
/// Compares the email and hashed-email lookup endpoints for one address.
pub async fn identity_diagnostics(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<DiagnosticsRequest>, JsonRejection>,
) -> Result<Json<DiagnosticsResponse>, AppError> {
    let Json(req) = payload?;
    if req.email.trim().is_empty() {
        return Err(AppError::InvalidInput("email is required".to_string()));
    }
    let client = state.identity.as_ref().ok_or_else(|| {
        AppError::UpstreamUnavailable("identity provider is not configured".to_string())
    })?;

    let email_endpoint = if req.test_type.includes_email() {
        Some(client.probe_email(&req.email).await)
    } else {
        None
    };
    let sha256_endpoint = if req.test_type.includes_sha256() {
        Some(client.probe_sha256(&req.email).await)
    } else {
        None
    };

    let comparison = match (&email_endpoint, &sha256_endpoint) {
        (Some(by_email), Some(by_hash)) => by_email
            .structure
            .as_ref()
            .zip(by_hash.structure.as_ref())
            .map(|(a, b)| StructureComparison::between(a, b)),
        _ => None,
    };

    Ok(Json(DiagnosticsResponse {
        email: req.email,
        test_type: req.test_type,
        timestamp: chrono::Utc::now().to_rfc3339(),
        email_endpoint,
        sha256_endpoint,
        comparison,
    }))
}
