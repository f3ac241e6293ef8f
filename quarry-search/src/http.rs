//! Shared HTTP clients for provider calls and media probes.
//!
//! Provider clients identify themselves with a descriptive User-Agent and
//! carry the per-provider timeout. The media client follows redirects
//! (so the final URL can be reported) but leaves timeouts to each probe.

use std::time::Duration;

use crate::config::SearchConfig;
use crate::error::SearchError;

/// User-Agent sent to provider APIs unless overridden in config.
pub const DEFAULT_USER_AGENT: &str = concat!("quarry-search/", env!("CARGO_PKG_VERSION"));

/// User-Agent sent when probing media URLs.
pub const MEDIA_USER_AGENT: &str = "Mozilla/5.0 (compatible; ImageValidator/1.0)";

/// Maximum redirects followed by either client.
const MAX_REDIRECTS: usize = 10;

/// Build a [`reqwest::Client`] for provider API calls.
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed.
pub fn build_client(config: &SearchConfig) -> Result<reqwest::Client, SearchError> {
    let ua = config
        .user_agent
        .clone()
        .unwrap_or_else(|| DEFAULT_USER_AGENT.to_owned());

    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))
}

/// Build a [`reqwest::Client`] for metadata-only media probes.
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed.
pub fn build_media_client() -> Result<reqwest::Client, SearchError> {
    reqwest::Client::builder()
        .user_agent(MEDIA_USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build media client: {e}")))
}
