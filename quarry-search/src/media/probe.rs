//! Metadata-only probes of media URLs.
//!
//! A probe issues a `HEAD` request, follows redirects, and reports the
//! status, declared content type and final URL. Failures are classified by
//! signal, never by matching error text.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::SearchError;
use crate::http;

/// Header a relay uses to report the target's final URL after redirects.
pub const FINAL_URL_HEADER: &str = "x-final-url";

/// Response header by which a resource restricts cross-origin embedding.
const CORP_HEADER: &str = "cross-origin-resource-policy";

/// What a successful probe observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResponse {
    /// HTTP status of the final response.
    pub status: u16,
    /// Declared `Content-Type`, if any.
    pub content_type: Option<String>,
    /// URL of the final response after redirects.
    pub final_url: String,
    /// Whether any redirect was followed.
    pub redirected: bool,
    /// Value of [`FINAL_URL_HEADER`], as supplied by a relay.
    pub relay_final_url: Option<String>,
}

impl ProbeResponse {
    /// Whether the declared content type is `image/*`.
    pub fn is_image(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.trim_start().to_ascii_lowercase().starts_with("image/"))
            .unwrap_or(false)
    }
}

/// Why a probe produced no response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeFailure {
    /// The target refuses cross-origin use.
    #[error("cross-origin restriction: {0}")]
    CrossOrigin(String),
    /// The probe exceeded its time budget.
    #[error("probe timed out")]
    Timeout,
    /// Any other transport failure.
    #[error("network error: {0}")]
    Network(String),
}

/// Something that can probe a URL's metadata.
#[async_trait]
pub trait MediaProbe: Send + Sync {
    /// Probe `url` with a hard `timeout`.
    ///
    /// # Errors
    ///
    /// Returns a [`ProbeFailure`] when no usable response was obtained.
    async fn head(&self, url: &str, timeout: Duration) -> Result<ProbeResponse, ProbeFailure>;
}

/// Probe backed by `reqwest`.
///
/// Reports [`ProbeFailure::CrossOrigin`] when a successful response carries
/// `Cross-Origin-Resource-Policy: same-origin` or `same-site`, which a
/// browser would enforce when embedding the image.
#[derive(Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
}

impl HttpProbe {
    /// Wrap an existing client.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// A probe using [`http::build_media_client`].
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the client cannot be constructed.
    pub fn with_default_client() -> Result<Self, SearchError> {
        Ok(Self::new(http::build_media_client()?))
    }
}

#[async_trait]
impl MediaProbe for HttpProbe {
    async fn head(&self, url: &str, timeout: Duration) -> Result<ProbeResponse, ProbeFailure> {
        let requested = reqwest::Url::parse(url).map_err(|e| ProbeFailure::Network(format!("invalid URL: {e}")))?;

        let response = self
            .client
            .head(requested.clone())
            .header(reqwest::header::ACCEPT, "image/*")
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeFailure::Timeout
                } else {
                    ProbeFailure::Network(e.to_string())
                }
            })?;

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned)
        };

        let status = response.status();
        if status.is_success() {
            if let Some(policy) = header(CORP_HEADER) {
                let policy = policy.trim().to_ascii_lowercase();
                if policy == "same-origin" || policy == "same-site" {
                    return Err(ProbeFailure::CrossOrigin(format!("{CORP_HEADER}: {policy}")));
                }
            }
        }

        let final_url = response.url().clone();
        let probe = ProbeResponse {
            status: status.as_u16(),
            content_type: header(reqwest::header::CONTENT_TYPE.as_str()),
            redirected: final_url != requested,
            final_url: final_url.to_string(),
            relay_final_url: header(FINAL_URL_HEADER).filter(|v| !v.is_empty()),
        };

        tracing::trace!(
            url,
            status = probe.status,
            content_type = probe.content_type.as_deref().unwrap_or(""),
            redirected = probe.redirected,
            "media probe response"
        );

        Ok(probe)
    }
}
