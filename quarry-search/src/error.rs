//! Error types for the quarry-search crate.
//!
//! Provider failures are scoped to a single provider and carried as
//! [`ProviderError`]; they only surface as a top-level [`SearchError`]
//! when every selected provider failed. No API keys appear in messages.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::ProviderId;

/// Classification of a single provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// The provider did not answer within its time budget.
    Timeout,
    /// The credential is missing or was rejected (401/403).
    AuthMissing,
    /// The provider is throttling requests (429).
    RateLimited,
    /// The provider answered with an error status or an undecodable body.
    BadResponse,
    /// Any other transport failure.
    Unknown,
}

impl ProviderErrorKind {
    /// Stable snake_case name, matching the serialised form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::AuthMissing => "auth_missing",
            Self::RateLimited => "rate_limited",
            Self::BadResponse => "bad_response",
            Self::Unknown => "unknown",
        }
    }

    /// Classify an HTTP error status returned by a provider.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::AuthMissing,
            429 => Self::RateLimited,
            _ => Self::BadResponse,
        }
    }
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure of exactly one provider call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{provider} {kind}: {message}")]
pub struct ProviderError {
    /// Which provider failed.
    pub provider: ProviderId,
    /// What kind of failure it was.
    pub kind: ProviderErrorKind,
    /// Human-readable detail, never containing credentials.
    pub message: String,
}

impl ProviderError {
    /// Create a provider error.
    pub fn new(provider: ProviderId, kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            provider,
            kind,
            message: message.into(),
        }
    }

    /// Convert a transport-level `reqwest` failure.
    pub fn from_reqwest(provider: ProviderId, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ProviderErrorKind::Timeout
        } else if let Some(status) = err.status() {
            ProviderErrorKind::from_status(status.as_u16())
        } else if err.is_decode() {
            ProviderErrorKind::BadResponse
        } else {
            ProviderErrorKind::Unknown
        };
        // Strip the URL: some providers carry keys in query strings.
        let message = err.without_url().to_string();
        Self::new(provider, kind, message)
    }
}

/// Errors that can occur during a search aggregation.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// Every selected provider failed. Carries each provider's error.
    #[error("all search providers failed: {}", summarize(.failures))]
    AllProvidersFailed {
        /// One entry per failed provider, in priority order.
        failures: Vec<ProviderError>,
    },

    /// The query itself is unusable (e.g. empty text).
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Invalid search configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The aggregation was cancelled before all providers settled.
    #[error("search cancelled: {0}")]
    Cancelled(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP error: {0}")]
    Http(String),
}

impl SearchError {
    /// Error kinds of every failed provider, for [`SearchError::AllProvidersFailed`].
    pub fn failure_kinds(&self) -> Vec<(ProviderId, ProviderErrorKind)> {
        match self {
            Self::AllProvidersFailed { failures } => {
                failures.iter().map(|f| (f.provider, f.kind)).collect()
            }
            _ => Vec::new(),
        }
    }
}

fn summarize(failures: &[ProviderError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Convenience type alias for quarry-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
