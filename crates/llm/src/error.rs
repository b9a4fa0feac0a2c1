//! The gateway's error taxonomy and its mapping onto HTTP responses.

use axum::{Json, response::IntoResponse};
use http::StatusCode;
use serde_json::json;

/// Every failure mode the request pipeline can surface.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Ingress could not produce a valid `UnifiedRequest`.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The router could not resolve the requested model name.
    #[error("unknown model: {0}")]
    UnknownModel(String),

    /// `auto` was requested but `auto` is unconfigured, or a referenced alias is missing.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Every routing candidate was disabled or on cooldown.
    #[error("no eligible provider for model `{0}`")]
    NoEligibleProvider(String),

    /// Network error, upstream 5xx, or timeout. Retryable against the next candidate.
    #[error("upstream transient error: {0}")]
    UpstreamTransient(String),

    /// Upstream responded 429. Retryable against the next candidate, after cooldown.
    #[error("upstream rate limited")]
    UpstreamRateLimited { retry_after: Option<std::time::Duration> },

    /// Upstream responded 401/403. Not retryable.
    #[error("upstream authentication error: {0}")]
    UpstreamAuth(String),

    /// Upstream responded 400. Not retryable; surfaced to the client.
    #[error("upstream rejected request: {0}")]
    UpstreamInvalid(String),

    /// Client disconnected or the request deadline elapsed.
    #[error("request cancelled")]
    Cancelled,

    /// Every candidate was attempted and all failed.
    #[error("all providers failed: {0}")]
    AllProvidersFailed(String),

    /// Anything unexpected.
    #[error("internal error: {0}")]
    Internal(String),
}

impl LlmError {
    /// The classification used by the dispatcher's retry loop.
    pub fn class(&self) -> ErrorClass {
        match self {
            LlmError::UpstreamTransient(_) => ErrorClass::Retryable,
            LlmError::UpstreamRateLimited { .. } => ErrorClass::RateLimited,
            LlmError::UpstreamAuth(_) => ErrorClass::Fatal,
            LlmError::UpstreamInvalid(_) => ErrorClass::Fatal,
            _ => ErrorClass::Fatal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            LlmError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            LlmError::UnknownModel(_) => StatusCode::NOT_FOUND,
            LlmError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            LlmError::NoEligibleProvider(_) => StatusCode::SERVICE_UNAVAILABLE,
            LlmError::UpstreamTransient(_) => StatusCode::BAD_GATEWAY,
            LlmError::UpstreamRateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            LlmError::UpstreamAuth(_) => StatusCode::BAD_GATEWAY,
            LlmError::UpstreamInvalid(_) => StatusCode::BAD_REQUEST,
            LlmError::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
            LlmError::AllProvidersFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            LlmError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            LlmError::InvalidRequest(_) => "invalid_request_error",
            LlmError::UnknownModel(_) => "unknown_model",
            LlmError::ConfigError(_) => "config_error",
            LlmError::NoEligibleProvider(_) => "no_eligible_provider",
            LlmError::UpstreamTransient(_) => "upstream_transient",
            LlmError::UpstreamRateLimited { .. } => "rate_limit_error",
            LlmError::UpstreamAuth(_) => "upstream_auth_error",
            LlmError::UpstreamInvalid(_) => "upstream_invalid",
            LlmError::Cancelled => "cancelled",
            LlmError::AllProvidersFailed(_) => "all_providers_failed",
            LlmError::Internal(_) => "internal_error",
        }
    }
}

/// How the dispatcher should react to a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Continue to the next candidate after a short cooldown.
    Retryable,
    /// Continue to the next candidate after a longer cooldown, honoring `Retry-After`.
    RateLimited,
    /// Stop: no further candidates should be tried.
    Fatal,
}

impl IntoResponse for LlmError {
    fn into_response(self) -> axum::response::Response {
        if matches!(self, LlmError::Internal(_)) {
            log::error!("internal error: {self}");
        }

        let status = self.status_code();
        let error_type = self.error_type();
        let message = self.to_string();

        let body = json!({
            "error": {
                "message": message,
                "type": error_type,
            }
        });

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;
