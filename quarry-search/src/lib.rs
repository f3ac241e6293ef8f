//! # quarry-search
//!
//! Multi-provider search aggregation and media URL validation for Quarry.
//!
//! ## Design
//!
//! - Each external backend (Tavily web search, Exa academic search)
//!   implements [`SearchProvider`]; all failures become [`ProviderError`]s
//! - [`Aggregator`] queries every selected provider concurrently under
//!   per-provider timeouts, then merges in priority order and deduplicates
//!   by URL and domain
//! - Graceful degradation: one failing provider never fails the search;
//!   only when all fail is [`SearchError::AllProvidersFailed`] returned
//! - [`MediaValidator`] checks image URLs with a direct probe and, only
//!   on an origin restriction, one probe through a server-side relay
//!
//! ## Security
//!
//! - Credentials are passed in by the caller and never logged
//! - Query text is logged only at trace level
//! - Provider error messages are stripped of request URLs

pub mod config;
pub mod error;
pub mod http;
pub mod media;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod types;

pub use config::SearchConfig;
pub use error::{ProviderError, ProviderErrorKind, Result, SearchError};
pub use media::{MediaConfig, MediaValidation, MediaValidator};
pub use orchestrator::{dedupe, extract_domain, Aggregator};
pub use provider::{ProviderFactory, SearchProvider};
pub use providers::HttpProviderFactory;
pub use types::{
    AggregatedResult, HasUrl, ProviderId, ProviderKind, ProviderOutcome, ProviderResult,
    SearchDepth, SearchQuery,
};

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

/// Run `query` across providers built by `factory` from `api_keys`.
///
/// Providers are created for every entry of `config.providers` in order;
/// `api_keys` supplies each provider's key by [`ProviderId`].
///
/// # Errors
///
/// Returns [`SearchError::Config`] for invalid configuration, and otherwise
/// the errors of [`Aggregator::run`].
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> quarry_search::Result<()> {
/// use quarry_search::{HttpProviderFactory, ProviderId, SearchConfig, SearchDepth, SearchQuery};
///
/// let config = SearchConfig::default();
/// let factory = HttpProviderFactory::new(config.clone())?;
/// let query = SearchQuery::new("rust ownership", SearchDepth::Basic, 5)?;
/// let keys = |id: ProviderId| std::env::var(id.credential_name()).unwrap_or_default();
/// let result = quarry_search::aggregate(&query, &config, &factory, keys).await?;
/// for item in &result.merged_items {
///     println!("{}: {}", item.title, item.url);
/// }
/// # Ok(())
/// # }
/// ```
pub async fn aggregate<F>(
    query: &SearchQuery,
    config: &SearchConfig,
    factory: &dyn ProviderFactory,
    api_keys: F,
) -> Result<AggregatedResult>
where
    F: Fn(ProviderId) -> String,
{
    config.validate()?;
    let providers: Vec<Arc<dyn SearchProvider>> = config
        .providers
        .iter()
        .map(|id| factory.create(*id, &api_keys(*id)))
        .collect();
    Aggregator::new(config.clone())
        .run(query, &providers, &CancellationToken::new())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct EchoProvider(ProviderId);

    #[async_trait]
    impl SearchProvider for EchoProvider {
        fn id(&self) -> ProviderId {
            self.0
        }

        async fn fetch(&self, query: &SearchQuery) -> std::result::Result<Vec<ProviderResult>, ProviderError> {
            Ok(vec![ProviderResult {
                provider_id: self.0,
                title: query.text().to_owned(),
                url: format!("https://{}.example/", self.0),
                content: String::new(),
                published_date: None,
                score: None,
                image: None,
            }])
        }
    }

    #[derive(Default)]
    struct RecordingFactory {
        keys: Mutex<Vec<(ProviderId, String)>>,
    }

    impl ProviderFactory for RecordingFactory {
        fn create(&self, id: ProviderId, api_key: &str) -> Arc<dyn SearchProvider> {
            self.keys.lock().expect("lock").push((id, api_key.to_owned()));
            Arc::new(EchoProvider(id))
        }
    }

    #[tokio::test]
    async fn aggregate_builds_providers_in_config_order() {
        let factory = RecordingFactory::default();
        let config = SearchConfig::default();
        let query = SearchQuery::new("q", SearchDepth::Basic, 3).expect("query");
        let result = aggregate(&query, &config, &factory, |id| format!("key-{id}"))
            .await
            .expect("aggregate");

        let keys = factory.keys.lock().expect("lock").clone();
        assert_eq!(
            keys,
            vec![
                (ProviderId::Tavily, "key-tavily".to_owned()),
                (ProviderId::Exa, "key-exa".to_owned()),
            ]
        );
        assert_eq!(result.merged_items.len(), 2);
        assert_eq!(result.merged_items[0].provider_id, ProviderId::Tavily);
    }

    #[tokio::test]
    async fn aggregate_rejects_invalid_config() {
        let factory = RecordingFactory::default();
        let config = SearchConfig {
            providers: vec![],
            ..Default::default()
        };
        let query = SearchQuery::new("q", SearchDepth::Basic, 3).expect("query");
        let err = aggregate(&query, &config, &factory, |_| String::new()).await.unwrap_err();
        assert!(matches!(err, SearchError::Config(_)));
        assert!(factory.keys.lock().expect("lock").is_empty());
    }

    #[test]
    fn public_types_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Aggregator>();
        assert_send_sync::<MediaValidator>();
        assert_send_sync::<SearchError>();
    }
}
