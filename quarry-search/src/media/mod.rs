//! Media URL validation with direct and relay (proxy) probes.
//!
//! A candidate image URL is first probed directly with a metadata-only
//! request. Only when the direct probe reports an origin restriction
//! (HTTP 403, or a cross-origin policy signal) is the same probe retried
//! once through the relay endpoint, which fetches server-side.

pub mod probe;
pub mod validator;

use serde::{Deserialize, Serialize};

use crate::error::SearchError;

pub use probe::{HttpProbe, MediaProbe, ProbeFailure, ProbeResponse};
pub use validator::{sanitize_url, MediaValidator};

/// Which path produced a validation verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMethod {
    /// The URL was probed directly.
    Direct,
    /// The URL was probed through the relay endpoint.
    Proxy,
}

/// Why a media URL was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaReason {
    /// The target answered 404. Never retried through the relay.
    NotFound,
    /// The target answered with another error status.
    HttpError,
    /// The direct probe failed in transport (network error or timeout).
    NetworkError,
    /// The target is reachable but its content type is not `image/*`.
    NotAnImage,
    /// The relay probe failed or did not confirm an image.
    ProxyFailed,
}

/// Verdict for one media URL.
///
/// `reason` is always set when `valid` is false, and `resolved_url` is only
/// set when a redirect occurred. Build with [`MediaValidation::valid`] and
/// [`MediaValidation::invalid`] so both always hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaValidation {
    /// The URL as requested by the caller.
    pub requested_url: String,
    /// Whether the URL points at a displayable image.
    pub valid: bool,
    /// Final URL after redirects, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_url: Option<String>,
    /// Which probe produced the verdict.
    pub method: ProbeMethod,
    /// Why the URL was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<MediaReason>,
}

impl MediaValidation {
    /// A positive verdict.
    pub fn valid(requested_url: &str, method: ProbeMethod, resolved_url: Option<String>) -> Self {
        Self {
            requested_url: requested_url.to_owned(),
            valid: true,
            resolved_url,
            method,
            reason_code: None,
        }
    }

    /// A negative verdict with its reason.
    pub fn invalid(requested_url: &str, method: ProbeMethod, reason: MediaReason) -> Self {
        Self {
            requested_url: requested_url.to_owned(),
            valid: false,
            resolved_url: None,
            method,
            reason_code: Some(reason),
        }
    }

    /// The URL callers should display: the resolved URL if redirected.
    pub fn display_url(&self) -> &str {
        self.resolved_url.as_deref().unwrap_or(&self.requested_url)
    }
}

/// Media validation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Timeout of the direct probe in milliseconds.
    pub direct_timeout_ms: u64,
    /// Timeout of the relay probe in milliseconds. Must not exceed the direct budget.
    pub proxy_timeout_ms: u64,
    /// Base URL of the relay endpoint (e.g. `http://127.0.0.1:8787`).
    /// `None` disables the proxy path.
    pub relay_base_url: Option<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            direct_timeout_ms: 5_000,
            proxy_timeout_ms: 5_000,
            relay_base_url: None,
        }
    }
}

impl MediaConfig {
    /// Validates this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Config`] for zero timeouts, a proxy budget
    /// larger than the direct budget, or an unparseable relay URL.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.direct_timeout_ms == 0 || self.proxy_timeout_ms == 0 {
            return Err(SearchError::Config(
                "media probe timeouts must be greater than 0".into(),
            ));
        }
        if self.proxy_timeout_ms > self.direct_timeout_ms {
            return Err(SearchError::Config(
                "proxy_timeout_ms must not exceed direct_timeout_ms".into(),
            ));
        }
        if let Some(base) = &self.relay_base_url {
            url::Url::parse(base)
                .map_err(|e| SearchError::Config(format!("relay_base_url is not a valid URL: {e}")))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_always_carries_reason() {
        let v = MediaValidation::invalid("https://a.com/x.png", ProbeMethod::Direct, MediaReason::NotFound);
        assert!(!v.valid);
        assert_eq!(v.reason_code, Some(MediaReason::NotFound));
        assert!(v.resolved_url.is_none());
    }

    #[test]
    fn display_url_prefers_resolved() {
        let v = MediaValidation::valid(
            "https://a.com/x.png",
            ProbeMethod::Direct,
            Some("https://cdn.a.com/x.png".into()),
        );
        assert_eq!(v.display_url(), "https://cdn.a.com/x.png");
        let v = MediaValidation::valid("https://a.com/x.png", ProbeMethod::Proxy, None);
        assert_eq!(v.display_url(), "https://a.com/x.png");
    }

    #[test]
    fn default_config_is_valid() {
        let config = MediaConfig::default();
        assert_eq!(config.direct_timeout_ms, 5_000);
        assert!(config.proxy_timeout_ms <= config.direct_timeout_ms);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn proxy_budget_above_direct_rejected() {
        let config = MediaConfig {
            proxy_timeout_ms: 6_000,
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().to_string().contains("proxy_timeout_ms"));
    }

    #[test]
    fn bad_relay_url_rejected() {
        let config = MediaConfig {
            relay_base_url: Some("::not a url".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validation_serializes_camel_case() {
        let v = MediaValidation::invalid("u", ProbeMethod::Proxy, MediaReason::ProxyFailed);
        let json = serde_json::to_value(&v).expect("serialize");
        assert_eq!(json["requestedUrl"], "u");
        assert_eq!(json["method"], "proxy");
        assert_eq!(json["reasonCode"], "proxy_failed");
    }
}
