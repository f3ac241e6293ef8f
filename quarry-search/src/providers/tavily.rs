//! Tavily: general web search API.
//!
//! Tavily takes the API key in the JSON body and returns ranked results
//! with extracted page content. Search depth maps directly onto Tavily's
//! `search_depth` parameter.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{ProviderError, ProviderErrorKind};
use crate::provider::SearchProvider;
use crate::types::{ProviderId, ProviderResult, SearchQuery};

/// Tavily web search client.
///
/// Priority 1 provider: general web coverage.
pub struct TavilyProvider {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl TavilyProvider {
    /// Create a client for `endpoint` authenticated with `api_key`.
    pub fn new(client: reqwest::Client, api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn id(&self) -> ProviderId {
        ProviderId::Tavily
    }

    async fn fetch(&self, query: &SearchQuery) -> Result<Vec<ProviderResult>, ProviderError> {
        if self.api_key.trim().is_empty() {
            return Err(ProviderError::new(
                ProviderId::Tavily,
                ProviderErrorKind::AuthMissing,
                "no API key configured",
            ));
        }

        tracing::trace!(query = query.text(), depth = query.depth().as_str(), "Tavily search");

        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query.text(),
            "search_depth": query.depth().as_str(),
            "max_results": query.max_results_per_provider(),
            "include_answer": true,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(ProviderId::Tavily, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::new(
                ProviderId::Tavily,
                ProviderErrorKind::from_status(status.as_u16()),
                format!("Tavily HTTP {status}"),
            ));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::from_reqwest(ProviderId::Tavily, e))?;

        tracing::trace!(bytes = text.len(), "Tavily response received");

        parse_tavily_response(&text, query.max_results_per_provider())
    }
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyItem>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TavilyItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

/// Parse a Tavily JSON body into results.
///
/// Extracted as a separate function for testability with canned bodies.
fn parse_tavily_response(
    body: &str,
    max_results: usize,
) -> Result<Vec<ProviderResult>, ProviderError> {
    let parsed: TavilyResponse = serde_json::from_str(body).map_err(|e| {
        ProviderError::new(
            ProviderId::Tavily,
            ProviderErrorKind::BadResponse,
            format!("invalid Tavily JSON: {e}"),
        )
    })?;

    if let Some(error) = parsed.error {
        return Err(ProviderError::new(
            ProviderId::Tavily,
            ProviderErrorKind::BadResponse,
            format!("Tavily error payload: {error}"),
        ));
    }

    let results = parsed
        .results
        .into_iter()
        .filter_map(|item| {
            let url = item.url.filter(|u| !u.trim().is_empty())?;
            Some(ProviderResult {
                provider_id: ProviderId::Tavily,
                title: item.title.unwrap_or_default(),
                url,
                content: item.content.unwrap_or_default(),
                published_date: item.published_date,
                score: item.score,
                image: None,
            })
        })
        .take(max_results)
        .collect();

    Ok(results)
}
