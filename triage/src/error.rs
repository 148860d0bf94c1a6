//! Error taxonomy for the analysis path
//!
//! Fatal errors (`NotConfigured`, `Auth`, `Config`) halt the conversation and
//! are surfaced verbatim. Everything else is recoverable: the orchestrator turns
//! it into a failed escalation turn and the patient only ever sees one of the
//! fixed escalation messages.

use thiserror::Error;

/// Result type alias for analysis operations
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Errors raised by [`crate::client::AnalysisClient`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// No credential configured; the caller skipped the capability probe
    #[error("analysis API key is required but not configured")]
    NotConfigured,

    /// Upstream rejected the credential (HTTP 401)
    #[error("invalid API key: {message}")]
    Auth { message: String },

    /// Endpoint or deployment missing (HTTP 404)
    #[error("deployment not found: {message}")]
    Config { message: String },

    /// Rate limited, timed out or the connection failed
    #[error("transient upstream failure: {message}")]
    Transient { message: String },

    /// Upstream content policy filtered the patient's message
    #[error("message filtered by content policy: {message}")]
    ContentFiltered { message: String },

    /// Upstream rejected the request shape (HTTP 400)
    #[error("bad request: {message}")]
    BadRequest { message: String },

    /// Any other non-success status
    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },
}

impl AnalysisError {
    /// Configuration problems stop the conversation instead of escalating it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NotConfigured | Self::Auth { .. } | Self::Config { .. }
        )
    }

    /// Whether the caller may usefully retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Stable machine-readable code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConfigured => "NOT_CONFIGURED",
            Self::Auth { .. } => "AUTH",
            Self::Config { .. } => "CONFIG",
            Self::Transient { .. } => "TRANSIENT",
            Self::ContentFiltered { .. } => "CONTENT_FILTERED",
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::Upstream { .. } => "UPSTREAM",
        }
    }

    pub(crate) fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }
}

/// Errors from loading [`crate::config::TriageConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}
