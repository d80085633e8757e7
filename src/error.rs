use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types that can occur when calling completion backends through the resilience layer.
#[derive(Debug, Error)]
pub enum LLMError {
    /// HTTP request/response errors (connection reset, DNS, ...)
    #[error("HTTP error: {0}")]
    HttpError(String),
    /// Backend asked the caller to slow down
    #[error("Rate limited: {0}")]
    RateLimited(String),
    /// Errors returned by the backend itself (5xx-equivalent)
    #[error("Provider error: {0}")]
    ProviderError(String),
    /// The backend did not answer in time
    #[error("Timeout: {0}")]
    Timeout(String),
    /// Authentication and authorization errors
    #[error("Auth error: {0}")]
    AuthError(String),
    /// Invalid request parameters or format
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// The caller abandoned the request
    #[error("Request cancelled")]
    Cancelled,
    /// The backend's circuit breaker rejected the call
    #[error("Circuit open for backend '{backend}'")]
    CircuitOpen { backend: String },
    /// Invalid thresholds, durations or capacities
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    /// Generic error
    #[error("Generic error: {0}")]
    Generic(String),
    /// JSON serialization/deserialization errors
    #[error("JSON parse error: {0}")]
    JsonError(String),
    /// Retry attempts exceeded
    #[error("Retry attempts exceeded after {attempts} tries: {last_error}")]
    RetryExceeded { attempts: u32, last_error: String },
}

/// Failure classes the fallback chain routes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network blip, rate limit, 5xx. Retried within a backend's attempt budget.
    Transient,
    /// Retried, but counted against the same attempt budget.
    Timeout,
    /// Bad credentials or malformed request. Never retried.
    Auth,
    /// Caller gave up. Counted as a breaker failure, never retried.
    Cancelled,
    /// Invalid configuration. Raised at construction time only.
    Configuration,
}

impl ErrorKind {
    /// Only transient failures and timeouts are worth another attempt.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient | ErrorKind::Timeout)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Auth => "auth",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Configuration => "configuration",
        };
        write!(f, "{name}")
    }
}

impl LLMError {
    /// Classifies the error for retry and fallback decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LLMError::HttpError(_)
            | LLMError::RateLimited(_)
            | LLMError::ProviderError(_)
            | LLMError::JsonError(_)
            | LLMError::Generic(_)
            | LLMError::CircuitOpen { .. }
            | LLMError::RetryExceeded { .. } => ErrorKind::Transient,
            LLMError::Timeout(_) => ErrorKind::Timeout,
            LLMError::AuthError(_) | LLMError::InvalidRequest(_) => ErrorKind::Auth,
            LLMError::Cancelled => ErrorKind::Cancelled,
            LLMError::ConfigurationError(_) => ErrorKind::Configuration,
        }
    }

    /// Whether another attempt on the same backend may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            // An open breaker means "go elsewhere", not "try again here".
            LLMError::CircuitOpen { .. } | LLMError::RetryExceeded { .. } => false,
            _ => self.kind().is_retryable(),
        }
    }

    /// Network, rate-limit or 5xx-style failure.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// The backend did not answer in time.
    pub fn is_timeout(&self) -> bool {
        self.kind() == ErrorKind::Timeout
    }

    /// Credentials or request shape were rejected; retrying will not help.
    pub fn is_auth_error(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }

    /// The caller abandoned the request.
    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        LLMError::ConfigurationError(message.into())
    }
}

impl From<serde_json::Error> for LLMError {
    fn from(err: serde_json::Error) -> Self {
        LLMError::JsonError(format!(
            "{} at line {} column {}",
            err,
            err.line(),
            err.column()
        ))
    }
}

impl From<toml::de::Error> for LLMError {
    fn from(err: toml::de::Error) -> Self {
        LLMError::ConfigurationError(format!("invalid TOML: {err}"))
    }
}

impl From<serde_yaml::Error> for LLMError {
    fn from(err: serde_yaml::Error) -> Self {
        LLMError::ConfigurationError(format!("invalid YAML: {err}"))
    }
}

impl From<std::io::Error> for LLMError {
    fn from(err: std::io::Error) -> Self {
        LLMError::ConfigurationError(format!("config IO error: {err}"))
    }
}
