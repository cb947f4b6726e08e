use crate::enrichment::{BatchSettings, DEFAULT_BATCH_LIMIT, MAX_BATCH_LIMIT};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_LLM_MODEL: &str = "claude-sonnet-4-20250514";

/// Identity provider credentials. Present only when all three variables are set.
#[derive(Clone)]
pub struct IdentityConfig {
    pub origin: String,
    pub key_id: String,
    pub secret: String,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("origin", &self.origin)
            .field("key_id", &"[REDACTED]")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub identity: Option<IdentityConfig>,
    pub anthropic_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub enrichment_batch_limit: usize,
    pub enrichment_delay_ms: u64,
    pub http_timeout_secs: u64,
    pub app_env: String,
    pub dev_log_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let identity = match (var("AA_ORIGIN"), var("AA_KEY_ID"), var("AA_SECRET")) {
            (Some(origin), Some(key_id), Some(secret)) => Some(IdentityConfig {
                origin: validate_url("AA_ORIGIN", origin)?,
                key_id,
                secret,
            }),
            (None, None, None) => None,
            _ => anyhow::bail!("AA_ORIGIN, AA_KEY_ID and AA_SECRET must be set together"),
        };

        let config = Self {
            port: var("PORT")
                .unwrap_or_else(|| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            identity,
            anthropic_api_key: var("ANTHROPIC_API_KEY"),
            llm_base_url: validate_url(
                "LLM_BASE_URL",
                var("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_string()),
            )?,
            llm_model: var("LLM_MODEL").unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            enrichment_batch_limit: var("ENRICHMENT_BATCH_LIMIT")
                .map(|v| v.parse::<usize>())
                .transpose()
                .map_err(|_| anyhow::anyhow!("ENRICHMENT_BATCH_LIMIT must be a positive integer"))?
                .map(|limit| {
                    if !(1..=MAX_BATCH_LIMIT).contains(&limit) {
                        anyhow::bail!("ENRICHMENT_BATCH_LIMIT must be between 1 and {}", MAX_BATCH_LIMIT);
                    }
                    Ok(limit)
                })
                .transpose()?
                .unwrap_or(DEFAULT_BATCH_LIMIT),
            enrichment_delay_ms: var("ENRICHMENT_DELAY_MS")
                .unwrap_or_else(|| "200".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("ENRICHMENT_DELAY_MS must be a non-negative integer"))?,
            http_timeout_secs: var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|| "30".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("HTTP_TIMEOUT_SECS must be a positive integer"))
                .and_then(|secs: u64| {
                    if secs == 0 {
                        anyhow::bail!("HTTP_TIMEOUT_SECS cannot be zero");
                    }
                    Ok(secs)
                })?,
            app_env: var("APP_ENV").unwrap_or_else(|| "production".to_string()),
            dev_log_dir: var("DEV_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("logs")),
        };

        // Log the loaded configuration without credentials
        tracing::info!("Configuration loaded successfully");
        match &config.identity {
            Some(identity) => tracing::debug!("Identity origin: {}", identity.origin),
            None => tracing::warn!("Identity provider not configured; enrichment will tag records as error"),
        }
        if config.anthropic_api_key.is_none() {
            tracing::warn!("ANTHROPIC_API_KEY not set; narrative steps will use canned fallbacks");
        }
        tracing::debug!("LLM: {} ({})", config.llm_base_url, config.llm_model);
        tracing::debug!(
            "Enrichment batch limit {} with {}ms delay",
            config.enrichment_batch_limit,
            config.enrichment_delay_ms
        );
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            limit: self.enrichment_batch_limit,
            delay: Duration::from_millis(self.enrichment_delay_ms),
        }
    }

    pub fn is_development(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("development")
    }
}

fn validate_url(name: &str, value: String) -> anyhow::Result<String> {
    let parsed = url::Url::parse(&value)
        .map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        anyhow::bail!("{} must start with http:// or https://", name);
    }
    Ok(value.trim_end_matches('/').to_string())
}
