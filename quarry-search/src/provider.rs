//! Trait definitions for pluggable search providers.
//!
//! Each backend (Tavily, Exa) implements [`SearchProvider`] so the
//! aggregator can fan out to any mix of providers, including test doubles,
//! through one interface.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::types::{ProviderId, ProviderResult, SearchQuery};

/// A uniform client over one external search backend.
///
/// Implementations never panic past this boundary: every failure mode
/// (transport error, error status, malformed body, missing credential) is
/// converted into a [`ProviderError`]. They hold no shared mutable state,
/// so concurrent calls are independent.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Which provider this is.
    fn id(&self) -> ProviderId;

    /// Run one search and map the response into [`ProviderResult`]s,
    /// preserving the provider's order.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] classified by
    /// [`ProviderErrorKind`](crate::error::ProviderErrorKind).
    async fn fetch(&self, query: &SearchQuery) -> Result<Vec<ProviderResult>, ProviderError>;
}

/// Builds provider clients from resolved credentials.
///
/// Constructed once at process start and handed to whoever dispatches
/// searches, so tests can substitute mock providers.
pub trait ProviderFactory: Send + Sync {
    /// Create the client for `id` authenticated with `api_key`.
    fn create(&self, id: ProviderId, api_key: &str) -> Arc<dyn SearchProvider>;
}
