//! Exa: keyword search restricted to scholarly domains.
//!
//! Exa is asked to search only the configured academic domains, and the
//! response is filtered against the same allow-list so a misbehaving
//! upstream cannot leak general web pages into the academic list.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{ProviderError, ProviderErrorKind};
use crate::provider::SearchProvider;
use crate::types::{ProviderId, ProviderResult, SearchQuery};

/// Exa academic search client.
pub struct ExaProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    domains: Vec<String>,
}

impl ExaProvider {
    /// Create a client for `endpoint` restricted to `domains`.
    pub fn new(
        client: reqwest::Client,
        api_key: impl Into<String>,
        endpoint: impl Into<String>,
        domains: Vec<String>,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
            domains,
        }
    }
}

#[async_trait]
impl SearchProvider for ExaProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Exa
    }

    async fn fetch(&self, query: &SearchQuery) -> Result<Vec<ProviderResult>, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::new(
                ProviderId::Exa,
                ProviderErrorKind::AuthMissing,
                "no API key configured",
            ));
        }

        tracing::trace!(query = query.text(), "Exa search");

        let body = serde_json::json!({
            "query": query.text(),
            "type": "keyword",
            "numResults": query.max_results_per_provider(),
            "includeDomains": self.domains,
            "contents": { "text": true },
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(ProviderId::Exa, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::new(
                ProviderId::Exa,
                ProviderErrorKind::from_status(status.as_u16()),
                format!("Exa HTTP {status}"),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(ProviderId::Exa, e))?;

        tracing::trace!(bytes = text.len(), "Exa response received");

        parse_exa_response(&text, &self.domains, query.max_results_per_provider())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExaResponse {
    results: Option<Vec<ExaItem>>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExaItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    image: Option<String>,
}

/// Whether `raw_url`'s host is one of `domains` or a subdomain of one.
///
/// An empty allow-list admits everything.
pub fn host_allowed(raw_url: &str, domains: &[String]) -> bool {
    if domains.is_empty() {
        return true;
    }
    let Ok(parsed) = url::Url::parse(raw_url) else {
        return false;
    };
    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    domains.iter().any(|domain| {
        let domain = domain.trim().to_ascii_lowercase();
        host == domain || host.ends_with(&format!(".{domain}"))
    })
}

fn parse_exa_response(
    body: &str,
    domains: &[String],
    max_results: usize,
) -> Result<Vec<ProviderResult>, ProviderError> {
    let parsed: ExaResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::new(
            ProviderId::Exa,
            ProviderErrorKind::BadResponse,
            format!("invalid Exa JSON: {e}"),
        )
    })?;

    if let Some(error) = parsed.error {
        return Err(ProviderError::new(
            ProviderId::Exa,
            ProviderErrorKind::BadResponse,
            format!("Exa error payload: {error}"),
        ));
    }

    let items = parsed.results.ok_or_else(|| {
        ProviderError::new(
            ProviderId::Exa,
            ProviderErrorKind::BadResponse,
            "Exa response has no results field",
        )
    })?;

    let results = items
        .into_iter()
        .filter_map(|item| {
            let url = item.url.filter(|u| !u.trim().is_empty())?;
            if !host_allowed(&url, domains) {
                tracing::debug!(%url, "dropping Exa result outside academic allow-list");
                return None;
            }
            Some(ProviderResult {
                provider_id: ProviderId::Exa,
                title: item.title.unwrap_or_default(),
                url,
                content: item.text.unwrap_or_default(),
                published_date: item.published_date,
                score: item.score,
                image: item.image.filter(|i| !i.trim().is_empty()),
            })
        })
        .take(max_results)
        .collect();

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ACADEMIC_DOMAINS;

    fn domains() -> Vec<String> {
        DEFAULT_ACADEMIC_DOMAINS.iter().map(|d| (*d).to_owned()).collect()
    }

    const SAMPLE: &str = r#"{
        "requestId": "abc",
        "results": [
            {"title": "Attention Is All You Need", "url": "https://arxiv.org/abs/1706.03762", "text": "The dominant sequence transduction models", "publishedDate": "2017-06-12", "score": 0.42, "image": "https://arxiv.org/static/thumb.png"},
            {"title": "Blog post", "url": "https://medium.com/some-post", "text": "not scholarly"},
            {"title": "Profile", "url": "https://www.researchgate.net/profile/x", "text": "", "image": ""}
        ]
    }"#;

    #[test]
    fn maps_fields_and_filters_allow_list() {
        let results = parse_exa_response(SAMPLE, &domains(), 10).expect("parse");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Attention Is All You Need");
        assert_eq!(results[0].content, "The dominant sequence transduction models");
        assert_eq!(results[0].published_date.as_deref(), Some("2017-06-12"));
        assert_eq!(results[0].image.as_deref(), Some("https://arxiv.org/static/thumb.png"));
        assert_eq!(results[1].url, "https://www.researchgate.net/profile/x");
        assert!(results[1].image.is_none());
    }

    #[test]
    fn host_allowed_matches_subdomains_only() {
        let d = domains();
        assert!(host_allowed("https://arxiv.org/abs/1", &d));
        assert!(host_allowed("https://export.arxiv.org/abs/1", &d));
        assert!(host_allowed("https://ARXIV.ORG/abs/1", &d));
        assert!(!host_allowed("https://notarxiv.org/abs/1", &d));
        assert!(!host_allowed("not a url", &d));
        assert!(host_allowed("https://anything.example", &[]));
    }

    #[test]
    fn missing_results_field_is_bad_response() {
        let err = parse_exa_response(r#"{"requestId": "x"}"#, &domains(), 5).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::BadResponse);
    }

    #[test]
    fn error_payload_is_bad_response() {
        let err = parse_exa_response(r#"{"error": "invalid key"}"#, &domains(), 5).unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::BadResponse);
        assert!(err.message.contains("invalid key"));
    }

    #[test]
    fn respects_max_results() {
        let results = parse_exa_response(SAMPLE, &domains(), 1).expect("parse");
        assert_eq!(results.len(), 1);
    }
}
