//! Error types for quarry.
//!
//! [`ToolError`] is what the conversation engine sees for a failed tool
//! call. Each variant carries a stable error code (SCREAMING_SNAKE_CASE)
//! that is included in the Display output and accessible via
//! [`ToolError::code()`]. Codes are part of the public API contract.

use quarry_search::{ProviderErrorKind, ProviderId, SearchError};
use serde::Serialize;

/// Stable error codes for programmatic error handling.
pub mod error_codes {
    /// Arguments failed schema validation.
    pub const INVALID_ARGUMENTS: &str = "INVALID_ARGUMENTS";

    /// One or more required credentials are absent.
    pub const MISSING_CREDENTIALS: &str = "MISSING_CREDENTIALS";

    /// Every selected search provider failed.
    pub const ALL_PROVIDERS_FAILED: &str = "ALL_PROVIDERS_FAILED";

    /// No tool is registered under the requested capability name.
    pub const UNKNOWN_CAPABILITY: &str = "UNKNOWN_CAPABILITY";

    /// The capability exists but the active group does not enable it.
    pub const CAPABILITY_DISABLED: &str = "CAPABILITY_DISABLED";

    /// The call was cancelled, usually by a client disconnect.
    pub const CANCELLED: &str = "CANCELLED";

    /// The call exceeded the dispatch timeout.
    pub const TIMEOUT: &str = "TIMEOUT";

    /// Search failed for a reason other than provider failures.
    pub const SEARCH_FAILED: &str = "SEARCH_FAILED";
}

/// Per-provider failure detail carried by [`ToolError::AllProvidersFailed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderFailure {
    /// Failed provider.
    pub provider: ProviderId,
    /// Failure classification.
    pub kind: ProviderErrorKind,
    /// Detail message.
    pub message: String,
}

/// Errors surfaced to the conversation engine by the tool dispatcher.
///
/// The Display impl formats as `[CODE] message`.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Caller-supplied arguments failed schema validation. No I/O was done.
    #[error("[{}] {}", error_codes::INVALID_ARGUMENTS, .0)]
    InvalidArguments(String),

    /// Required credentials are absent. No I/O was done.
    #[error("[{}] missing credentials: {}", error_codes::MISSING_CREDENTIALS, join_names(.names))]
    MissingCredentials {
        /// Exactly the absent credential names, sorted.
        names: Vec<String>,
    },

    /// Every selected provider failed.
    #[error("[{}] {}", error_codes::ALL_PROVIDERS_FAILED, summarize(.failures))]
    AllProvidersFailed {
        /// One entry per failed provider, in priority order.
        failures: Vec<ProviderFailure>,
    },

    /// No tool registered under this name.
    #[error("[{}] unknown capability '{}'", error_codes::UNKNOWN_CAPABILITY, .0)]
    UnknownCapability(String),

    /// The tool exists but is not enabled for the active group.
    #[error("[{}] capability '{}' is not enabled for this group", error_codes::CAPABILITY_DISABLED, .0)]
    CapabilityDisabled(String),

    /// Cancelled before completion.
    #[error("[{}] {}", error_codes::CANCELLED, .0)]
    Cancelled(String),

    /// Dispatch timeout elapsed.
    #[error("[{}] {}", error_codes::TIMEOUT, .0)]
    Timeout(String),

    /// Any other search failure (configuration, client construction).
    #[error("[{}] {}", error_codes::SEARCH_FAILED, .0)]
    SearchFailed(String),
}

impl ToolError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) => error_codes::INVALID_ARGUMENTS,
            Self::MissingCredentials { .. } => error_codes::MISSING_CREDENTIALS,
            Self::AllProvidersFailed { .. } => error_codes::ALL_PROVIDERS_FAILED,
            Self::UnknownCapability(_) => error_codes::UNKNOWN_CAPABILITY,
            Self::CapabilityDisabled(_) => error_codes::CAPABILITY_DISABLED,
            Self::Cancelled(_) => error_codes::CANCELLED,
            Self::Timeout(_) => error_codes::TIMEOUT,
            Self::SearchFailed(_) => error_codes::SEARCH_FAILED,
        }
    }

    /// Returns the message without the code prefix.
    pub fn message(&self) -> String {
        match self {
            Self::InvalidArguments(m)
            | Self::Cancelled(m)
            | Self::Timeout(m)
            | Self::SearchFailed(m) => m.clone(),
            Self::MissingCredentials { names } => format!("missing credentials: {}", names.join(", ")),
            Self::AllProvidersFailed { failures } => summarize(failures),
            Self::UnknownCapability(name) => format!("unknown capability '{name}'"),
            Self::CapabilityDisabled(name) => {
                format!("capability '{name}' is not enabled for this group")
            }
        }
    }

    /// Structured form sent to the conversation engine.
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "code": self.code(),
            "message": self.message(),
        });
        match self {
            Self::MissingCredentials { names } => {
                body["names"] = serde_json::json!(names);
            }
            Self::AllProvidersFailed { failures } => {
                body["failures"] = serde_json::json!(failures);
            }
            _ => {}
        }
        body
    }
}

impl From<SearchError> for ToolError {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::AllProvidersFailed { failures } => Self::AllProvidersFailed {
                failures: failures
                    .into_iter()
                    .map(|f| ProviderFailure {
                        provider: f.provider,
                        kind: f.kind,
                        message: f.message,
                    })
                    .collect(),
            },
            SearchError::InvalidQuery(m) => Self::InvalidArguments(m),
            SearchError::Cancelled(m) => Self::Cancelled(m),
            other => Self::SearchFailed(other.to_string()),
        }
    }
}

fn join_names(names: &[String]) -> String {
    names.join(", ")
}

fn summarize(failures: &[ProviderFailure]) -> String {
    let parts: Vec<String> = failures
        .iter()
        .map(|f| format!("{} {}: {}", f.provider, f.kind, f.message))
        .collect();
    format!("all search providers failed: {}", parts.join("; "))
}

/// Process-level errors: configuration, I/O and server startup.
#[derive(Debug, thiserror::Error)]
pub enum QuarryError {
    /// Invalid or unreadable configuration.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP server error (bind, address lookup).
    #[error("server error: {0}")]
    Server(String),
}

impl From<SearchError> for QuarryError {
    fn from(err: SearchError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, QuarryError>;
