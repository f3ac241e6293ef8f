//! Search configuration with sensible defaults.
//!
//! [`SearchConfig`] controls which providers are queried and in what
//! priority order, per-provider timeouts, result limits, and provider
//! endpoints. It deserialises from the `[search]` table of the Quarry
//! config file; missing keys fall back to [`Default`].

use serde::{Deserialize, Serialize};

use crate::error::SearchError;
use crate::types::ProviderId;

/// Default Tavily search endpoint.
pub const DEFAULT_TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// Default Exa search endpoint.
pub const DEFAULT_EXA_ENDPOINT: &str = "https://api.exa.ai/search";

/// Scholarly domains the academic provider is restricted to.
pub const DEFAULT_ACADEMIC_DOMAINS: &[&str] = &[
    "arxiv.org",
    "scholar.google.com",
    "researchgate.net",
    "academia.edu",
];

/// Configuration for a search aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Providers to query, in merge priority order.
    pub providers: Vec<ProviderId>,
    /// Items requested from each provider.
    pub max_results_per_provider: usize,
    /// Upper bound on merged items after deduplication.
    pub max_merged_results: usize,
    /// Per-provider timeout in seconds.
    pub timeout_seconds: u64,
    /// Domains the academic provider may return.
    pub academic_domains: Vec<String>,
    /// Whether merged items' images are validated after merging.
    pub validate_media: bool,
    /// Tavily endpoint URL.
    pub tavily_endpoint: String,
    /// Exa endpoint URL.
    pub exa_endpoint: String,
    /// Custom User-Agent for provider requests. `None` uses the crate default.
    pub user_agent: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            providers: ProviderId::all().to_vec(),
            max_results_per_provider: 5,
            max_merged_results: 20,
            timeout_seconds: 8,
            academic_domains: DEFAULT_ACADEMIC_DOMAINS
                .iter()
                .map(|d| (*d).to_owned())
                .collect(),
            validate_media: false,
            tavily_endpoint: DEFAULT_TAVILY_ENDPOINT.to_owned(),
            exa_endpoint: DEFAULT_EXA_ENDPOINT.to_owned(),
            user_agent: None,
        }
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `providers` must not be empty or contain duplicates
    /// - `max_results_per_provider` and `max_merged_results` must be > 0
    /// - `timeout_seconds` must be > 0
    /// - both endpoints must be absolute http(s) URLs
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.providers.is_empty() {
            return Err(SearchError::Config(
                "at least one provider must be enabled".into(),
            ));
        }
        for (i, provider) in self.providers.iter().enumerate() {
            if self.providers[..i].contains(provider) {
                return Err(SearchError::Config(format!(
                    "provider '{provider}' listed more than once"
                )));
            }
        }
        if self.max_results_per_provider == 0 {
            return Err(SearchError::Config(
                "max_results_per_provider must be greater than 0".into(),
            ));
        }
        if self.max_merged_results == 0 {
            return Err(SearchError::Config(
                "max_merged_results must be greater than 0".into(),
            ));
        }
        if self.timeout_seconds == 0 {
            return Err(SearchError::Config(
                "timeout_seconds must be greater than 0".into(),
            ));
        }
        for (name, endpoint) in [
            ("tavily_endpoint", &self.tavily_endpoint),
            ("exa_endpoint", &self.exa_endpoint),
        ] {
            let parsed = url::Url::parse(endpoint)
                .map_err(|e| SearchError::Config(format!("{name} is not a valid URL: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(SearchError::Config(format!("{name} must use http or https")));
            }
        }
        Ok(())
    }

    /// Per-provider timeout as a [`std::time::Duration`].
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_seconds)
    }
}
