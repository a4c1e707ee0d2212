//! Unified error types for Weathergate.
//!
//! Defines [`WeathergateError`] (startup and CLI failures),
//! [`ValidationError`] for environment config problems, and
//! [`WeatherError`], the classified taxonomy every provider call
//! resolves to. All use `thiserror` for `Display` and `Error` derives.

use hyper::StatusCode;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub variable: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ValidationError {
    pub fn new(variable: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}: {}", self.variable, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum WeathergateError {
    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Invalid WeatherKit signing key: {source}")]
    Signing {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(StatusCode),

    #[error("Weather service initialization failed: {0}")]
    ServiceInit(String),
}

/// Classified failure of a weather lookup.
///
/// Providers produce these from upstream HTTP status codes and transport
/// failures; the resilience layer inspects but never reclassifies them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WeatherError {
    /// Caller or credential problem the upstream rejected. Not retried.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Upstream throttled the call (HTTP 429).
    #[error("rate limited: {0}")]
    RateLimit(String),

    /// Network failure, timeout, 5xx, or no usable cached data.
    #[error("upstream error: {0}")]
    Upstream(String),
}

impl WeatherError {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::RateLimit(_) => "RATE_LIMIT",
            Self::Upstream(_) => "UPSTREAM_ERROR",
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m) | Self::RateLimit(m) | Self::Upstream(m) => m,
        }
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::BadRequest(_))
    }

    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::RateLimit(_) => StatusCode::TOO_MANY_REQUESTS,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
        }
    }
}
