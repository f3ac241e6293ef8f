//! Concurrent multi-provider aggregation.
//!
//! Every selected provider is queried concurrently, each under its own
//! timeout. Merging starts only after all calls have settled, so the merged
//! list always follows the declared provider order regardless of which
//! provider answered first.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::SearchConfig;
use crate::error::{ProviderError, ProviderErrorKind, SearchError};
use crate::media::{MediaValidation, MediaValidator};
use crate::provider::SearchProvider;
use crate::types::{AggregatedResult, ProviderOutcome, ProviderResult, SearchQuery};

use super::dedup::dedupe;

/// Runs one query across a set of providers.
#[derive(Clone)]
pub struct Aggregator {
    config: SearchConfig,
    media: Option<MediaValidator>,
}

impl Aggregator {
    /// Create an aggregator using `config` for timeouts and limits.
    pub fn new(config: SearchConfig) -> Self {
        Self {
            config,
            media: None,
        }
    }

    /// Attach a media validator, used when `validate_media` is enabled.
    pub fn with_media_validator(mut self, validator: MediaValidator) -> Self {
        self.media = Some(validator);
        self
    }

    /// Configuration in use.
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Aggregate `query` across `providers`, given in priority order.
    ///
    /// # Pipeline
    ///
    /// 1. Fan out one call per provider, each bounded by `timeout_seconds`
    /// 2. Wait for all calls to settle, recording each outcome
    /// 3. Fail with [`SearchError::AllProvidersFailed`] if none succeeded
    /// 4. Concatenate successful items in provider order and deduplicate
    /// 5. Truncate to `max_merged_results`
    /// 6. Optionally validate item images into [`AggregatedResult::media`]
    ///
    /// # Errors
    ///
    /// - [`SearchError::Config`] if `providers` is empty
    /// - [`SearchError::Cancelled`] if `cancel` fires first; pending
    ///   provider calls are dropped
    /// - [`SearchError::AllProvidersFailed`] if every provider failed
    pub async fn run(
        &self,
        query: &SearchQuery,
        providers: &[Arc<dyn SearchProvider>],
        cancel: &CancellationToken,
    ) -> Result<AggregatedResult, SearchError> {
        if providers.is_empty() {
            return Err(SearchError::Config("no providers selected".into()));
        }
        tracing::trace!(query = query.text(), providers = providers.len(), "aggregating search");

        let timeout = self.config.timeout();
        let calls = providers.iter().map(|provider| async move {
            let id = provider.id();
            let result = match tokio::time::timeout(timeout, provider.fetch(query)).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::new(
                    id,
                    ProviderErrorKind::Timeout,
                    format!("no response within {}s", timeout.as_secs()),
                )),
            };
            (id, result)
        });

        let settled = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(SearchError::Cancelled("search cancelled before all providers settled".into()));
            }
            settled = futures::future::join_all(calls) => settled,
        };

        let mut per_provider_outcomes = BTreeMap::new();
        let mut failures: Vec<ProviderError> = Vec::new();
        let mut merged: Vec<ProviderResult> = Vec::new();

        for (id, result) in settled {
            match result {
                Ok(items) => {
                    tracing::debug!(provider = %id, count = items.len(), "provider returned results");
                    merged.extend(items.iter().cloned());
                    per_provider_outcomes.insert(id, ProviderOutcome::Ok { items });
                }
                Err(err) => {
                    tracing::warn!(provider = %id, kind = %err.kind, error = %err.message, "provider call failed");
                    per_provider_outcomes.insert(
                        id,
                        ProviderOutcome::Failed {
                            kind: err.kind,
                            message: err.message.clone(),
                        },
                    );
                    failures.push(err);
                }
            }
        }

        if failures.len() == providers.len() {
            return Err(SearchError::AllProvidersFailed { failures });
        }

        let before = merged.len();
        let mut merged_items = dedupe(merged);
        merged_items.truncate(self.config.max_merged_results);
        tracing::debug!(before, after = merged_items.len(), "merged provider results");

        let mut media = BTreeMap::new();
        if self.config.validate_media {
            if let Some(validator) = &self.media {
                media = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        return Err(SearchError::Cancelled("search cancelled during media validation".into()));
                    }
                    verdicts = validate_images(validator, &merged_items) => verdicts,
                };
            }
        }

        Ok(AggregatedResult {
            query: query.clone(),
            per_provider_outcomes,
            merged_items,
            media,
        })
    }
}

/// Validate the distinct images of `items` concurrently, keyed by image URL.
async fn validate_images(
    validator: &MediaValidator,
    items: &[ProviderResult],
) -> BTreeMap<String, MediaValidation> {
    let mut urls: Vec<String> = Vec::new();
    for image in items.iter().filter_map(|item| item.image.as_deref()) {
        if !urls.iter().any(|seen| seen == image) {
            urls.push(image.to_owned());
        }
    }
    if urls.is_empty() {
        return BTreeMap::new();
    }

    let verdicts = validator.validate_many(&urls).await;
    urls.into_iter()
        .zip(verdicts)
        .inspect(|(_, verdict)| {
            if !verdict.valid {
                tracing::warn!(
                    url = %verdict.requested_url,
                    reason = ?verdict.reason_code,
                    "image failed validation"
                );
            }
        })
        .collect()
}
