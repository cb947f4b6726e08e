use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Application-specific error types.
#[derive(Debug, Clone)]
pub enum AppError {
    /// Malformed request shape (missing records, blank variable names, bad CSV).
    InvalidInput(String),
    /// Identity or LLM provider unreachable, misconfigured, or returned non-2xx.
    UpstreamUnavailable(String),
    /// The LLM returned something we could not parse into the expected structure.
    ParseFailure(String),
    /// Internal server error.
    InternalError(String),
    /// Error with context chain for better debugging.
    WithContext {
        /// The underlying source of the error.
        source: Box<AppError>,
        /// Additional context message.
        context: String,
    },
}

impl AppError {
    /// Returns the innermost error, skipping any context wrappers.
    pub fn root(&self) -> &AppError {
        match self {
            AppError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether the error belongs to the recoverable family that the
    /// orchestration layer replaces with a canned fallback.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.root(),
            AppError::UpstreamUnavailable(_) | AppError::ParseFailure(_)
        )
    }
}

impl fmt::Display for AppError {
    /// Formats the error for display.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::UpstreamUnavailable(msg) => write!(f, "Upstream unavailable: {}", msg),
            AppError::ParseFailure(msg) => write!(f, "Parse failure: {}", msg),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::WithContext { source, context } => {
                write!(f, "{}: {}", context, source)
            }
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    /// Converts the error into an HTTP response.
    ///
    /// Maps each error variant to an appropriate HTTP status code and JSON body.
    /// Only `InvalidInput` is expected to reach clients; the other variants are
    /// normally absorbed into fallbacks before the handler returns.
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::UpstreamUnavailable(msg) => {
                tracing::error!("Upstream unavailable: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "External service error".to_string(),
                )
            }
            AppError::ParseFailure(msg) => {
                tracing::error!("Parse failure: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "Unexpected response from external service".to_string(),
                )
            }
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::WithContext { source, context } => {
                tracing::error!("Error with context: {} -> {}", context, source);
                return source.as_ref().clone().into_response();
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    /// Converts a `reqwest::Error` into an `AppError`.
    fn from(err: reqwest::Error) -> Self {
        AppError::UpstreamUnavailable(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    /// A request body that is not JSON or has the wrong shape is a client error.
    fn from(rejection: JsonRejection) -> Self {
        AppError::InvalidInput(rejection.body_text())
    }
}

impl From<serde_json::Error> for AppError {
    /// LLM output that fails to deserialize is a parse failure.
    fn from(err: serde_json::Error) -> Self {
        AppError::ParseFailure(err.to_string())
    }
}

/// Extension trait for adding context to errors.
/// Similar to `anyhow::Context` but for our `AppError` type.
pub trait ResultExt<T> {
    /// Add context to an error.
    fn context(self, context: impl Into<String>) -> Result<T, AppError>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T, AppError> {
    fn context(self, context: impl Into<String>) -> Result<T, AppError> {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: context.into(),
        })
    }

    fn with_context<F>(self, f: F) -> Result<T, AppError>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| AppError::WithContext {
            source: Box::new(e),
            context: f(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_keeps_root() {
        let err = Err::<(), AppError>(AppError::ParseFailure("bad json".to_string()))
            .context("query buckets")
            .unwrap_err();

        assert!(matches!(err.root(), AppError::ParseFailure(_)));
        assert!(err.is_recoverable());
        assert_eq!(
            err.to_string(),
            "query buckets: Parse failure: bad json"
        );
    }

    #[test]
    fn test_invalid_input_is_not_recoverable() {
        let err = AppError::InvalidInput("records must not be empty".to_string());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_status_codes() {
        let resp = AppError::InvalidInput("x".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let wrapped = AppError::WithContext {
            source: Box::new(AppError::UpstreamUnavailable("x".to_string())),
            context: "identity lookup".to_string(),
        };
        assert_eq!(wrapped.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
