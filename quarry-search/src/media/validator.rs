//! Two-step media validation state machine.
//!
//! ```text
//! DirectProbe ──404──────────────▶ invalid(NotFound)
//!     │ ──other ≥400─────────────▶ invalid(HttpError)
//!     │ ──transport failure──────▶ invalid(NetworkError)
//!     │ ──2xx, not image/*───────▶ invalid(NotAnImage)
//!     │ ──2xx, image/*───────────▶ valid(direct)
//!     │ ──403 | cross-origin─────▶ ProxyProbe
//! ProxyProbe ──2xx, image/*──────▶ valid(proxy)
//!     └──anything else───────────▶ invalid(ProxyFailed)
//! ```
//!
//! The relay is contacted at most once per call, and never for 404 or
//! other HTTP errors.

use std::sync::Arc;
use std::time::Duration;

use super::probe::{HttpProbe, MediaProbe, ProbeFailure};
use super::{MediaConfig, MediaReason, MediaValidation, ProbeMethod};
use crate::error::SearchError;

/// Outcome of the direct step.
enum DirectVerdict {
    Done(MediaValidation),
    NeedsProxy { redirect: Option<String> },
}

/// Validates media URLs via direct and relay probes.
#[derive(Clone)]
pub struct MediaValidator {
    direct: Arc<dyn MediaProbe>,
    relay: Arc<dyn MediaProbe>,
    config: MediaConfig,
}

impl MediaValidator {
    /// Validator using HTTP probes for both steps.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for invalid settings or
    /// [`SearchError::Http`] if the client cannot be built.
    pub fn new(config: MediaConfig) -> Result<Self, SearchError> {
        config.validate()?;
        let probe: Arc<dyn MediaProbe> = Arc::new(HttpProbe::with_default_client()?);
        Ok(Self {
            direct: Arc::clone(&probe),
            relay: probe,
            config,
        })
    }

    /// Validator with explicit probes for each step.
    pub fn with_probes(
        config: MediaConfig,
        direct: Arc<dyn MediaProbe>,
        relay: Arc<dyn MediaProbe>,
    ) -> Self {
        Self {
            direct,
            relay,
            config,
        }
    }

    /// Replace only the direct probe.
    pub fn with_direct_probe(mut self, direct: Arc<dyn MediaProbe>) -> Self {
        self.direct = direct;
        self
    }

    /// Settings in use.
    pub fn config(&self) -> &MediaConfig {
        &self.config
    }

    /// Validate one URL.
    pub async fn validate(&self, url: &str) -> MediaValidation {
        let target = sanitize_url(url);

        match self.direct_step(url, &target).await {
            DirectVerdict::Done(verdict) => verdict,
            DirectVerdict::NeedsProxy { redirect } => self.proxy_step(url, &target, redirect).await,
        }
    }

    /// Validate many URLs concurrently; results follow input order.
    pub async fn validate_many(&self, urls: &[String]) -> Vec<MediaValidation> {
        futures::future::join_all(urls.iter().map(|u| self.validate(u))).await
    }

    async fn direct_step(&self, requested: &str, target: &str) -> DirectVerdict {
        let timeout = Duration::from_millis(self.config.direct_timeout_ms);
        let invalid = |reason| DirectVerdict::Done(MediaValidation::invalid(requested, ProbeMethod::Direct, reason));

        let response = match self.direct.head(target, timeout).await {
            Ok(response) => response,
            Err(ProbeFailure::CrossOrigin(signal)) => {
                tracing::debug!(url = target, %signal, "direct probe blocked cross-origin, trying relay");
                return DirectVerdict::NeedsProxy { redirect: None };
            }
            Err(failure) => {
                tracing::debug!(url = target, error = %failure, "direct probe failed");
                return invalid(MediaReason::NetworkError);
            }
        };

        let redirect = response.redirected.then(|| response.final_url.clone());
        if let Some(to) = &redirect {
            tracing::trace!(from = target, to = %to, "media URL redirected");
        }

        match response.status {
            404 => invalid(MediaReason::NotFound),
            403 => {
                tracing::debug!(url = target, "direct probe forbidden, trying relay");
                DirectVerdict::NeedsProxy { redirect }
            }
            status if status >= 400 => {
                tracing::debug!(url = target, status, "direct probe HTTP error");
                invalid(MediaReason::HttpError)
            }
            _ if !response.is_image() => invalid(MediaReason::NotAnImage),
            _ => DirectVerdict::Done(MediaValidation::valid(requested, ProbeMethod::Direct, redirect)),
        }
    }

    async fn proxy_step(&self, requested: &str, target: &str, redirect: Option<String>) -> MediaValidation {
        let failed = || MediaValidation::invalid(requested, ProbeMethod::Proxy, MediaReason::ProxyFailed);

        let Some(base) = self.config.relay_base_url.as_deref() else {
            tracing::debug!(url = target, "no relay configured");
            return failed();
        };
        let Some(relay) = relay_url(base, target) else {
            tracing::warn!(base, "relay base URL is unusable");
            return failed();
        };

        let timeout = Duration::from_millis(self.config.proxy_timeout_ms);
        match self.relay.head(&relay, timeout).await {
            Ok(response) if (200..300).contains(&response.status) && response.is_image() => {
                tracing::debug!(url = target, "relay probe confirmed image");
                let resolved = response.relay_final_url.or(redirect);
                MediaValidation::valid(requested, ProbeMethod::Proxy, resolved)
            }
            Ok(response) => {
                tracing::debug!(url = target, status = response.status, "relay probe rejected");
                failed()
            }
            Err(failure) => {
                tracing::debug!(url = target, error = %failure, "relay probe failed");
                failed()
            }
        }
    }
}

/// Replace each run of whitespace with `%20`.
pub fn sanitize_url(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    let mut in_space = false;
    for c in url.chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push_str("%20");
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

/// Build `{base}/relay?url=<encoded target>`, keeping any path prefix of `base`.
pub fn relay_url(base: &str, target: &str) -> Option<String> {
    let mut url = url::Url::parse(base).ok()?;
    url.path_segments_mut().ok()?.pop_if_empty().push("relay");
    url.query_pairs_mut().clear().append_pair("url", target);
    Some(url.to_string())
}
