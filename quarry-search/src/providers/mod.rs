//! Search provider implementations.
//!
//! Each module provides a struct implementing [`crate::provider::SearchProvider`]
//! for one external search API. [`HttpProviderFactory`] builds them from
//! resolved credentials using one shared HTTP client.

pub mod exa;
pub mod tavily;

pub use exa::ExaProvider;
pub use tavily::TavilyProvider;

use std::sync::Arc;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::http;
use crate::provider::{ProviderFactory, SearchProvider};
use crate::types::ProviderId;

/// Builds real HTTP-backed providers.
pub struct HttpProviderFactory {
    client: reqwest::Client,
    config: SearchConfig,
}

impl HttpProviderFactory {
    /// Create a factory whose providers share one client configured from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Http`] if the client cannot be constructed.
    pub fn new(config: SearchConfig) -> Result<Self, SearchError> {
        let client = http::build_client(&config)?;
        Ok(Self { client, config })
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn create(&self, id: ProviderId, api_key: &str) -> Arc<dyn SearchProvider> {
        match id {
            ProviderId::Tavily => Arc::new(TavilyProvider::new(
                self.client.clone(),
                api_key,
                self.config.tavily_endpoint.clone(),
            )),
            ProviderId::Exa => Arc::new(ExaProvider::new(
                self.client.clone(),
                api_key,
                self.config.exa_endpoint.clone(),
                self.config.academic_domains.clone(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn factory_builds_each_provider() {
        let factory = HttpProviderFactory::new(SearchConfig::default()).expect("factory");
        for id in ProviderId::all() {
            assert_eq!(factory.create(*id, "key").id(), *id);
        }
    }

    #[test]
    fn providers_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TavilyProvider>();
        assert_send_sync::<ExaProvider>();
        assert_send_sync::<HttpProviderFactory>();
    }
}
