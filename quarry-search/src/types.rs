//! Core types: queries, provider identity, results and aggregation outcomes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ProviderError, ProviderErrorKind, SearchError};
use crate::media::MediaValidation;

/// How thoroughly providers should search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchDepth {
    /// Fast, shallow search.
    Basic,
    /// Slower, more thorough search.
    #[default]
    Advanced,
}

impl SearchDepth {
    /// Wire name used by provider APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Advanced => "advanced",
        }
    }
}

/// An immutable search request.
///
/// Construct with [`SearchQuery::new`], which rejects blank text.
/// Deserialization applies the same checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSearchQuery")]
pub struct SearchQuery {
    text: String,
    depth: SearchDepth,
    max_results_per_provider: usize,
}

#[derive(Deserialize)]
struct RawSearchQuery {
    text: String,
    #[serde(default)]
    depth: SearchDepth,
    max_results_per_provider: usize,
}

impl TryFrom<RawSearchQuery> for SearchQuery {
    type Error = SearchError;

    fn try_from(raw: RawSearchQuery) -> Result<Self, Self::Error> {
        Self::new(raw.text, raw.depth, raw.max_results_per_provider)
    }
}

impl SearchQuery {
    /// Create a query.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidQuery`] if `text` is empty or only
    /// whitespace, or if `max_results_per_provider` is zero.
    pub fn new(
        text: impl Into<String>,
        depth: SearchDepth,
        max_results_per_provider: usize,
    ) -> Result<Self, SearchError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(SearchError::InvalidQuery("query text must not be empty".into()));
        }
        if max_results_per_provider == 0 {
            return Err(SearchError::InvalidQuery(
                "max_results_per_provider must be greater than 0".into(),
            ));
        }
        Ok(Self {
            text,
            depth,
            max_results_per_provider,
        })
    }

    /// The query text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Requested search depth.
    pub fn depth(&self) -> SearchDepth {
        self.depth
    }

    /// Upper bound on items requested from each provider.
    pub fn max_results_per_provider(&self) -> usize {
        self.max_results_per_provider
    }
}

/// Whether a provider searches the general web or scholarly sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// General web search.
    Web,
    /// Academic search restricted to scholarly domains.
    Academic,
}

/// Supported search providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderId {
    /// Tavily: general web search API.
    Tavily,
    /// Exa: keyword search restricted to academic domains.
    Exa,
}

impl ProviderId {
    /// Returns the lowercase name of this provider.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Tavily => "tavily",
            Self::Exa => "exa",
        }
    }

    /// Which result list this provider contributes to.
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::Tavily => ProviderKind::Web,
            Self::Exa => ProviderKind::Academic,
        }
    }

    /// Name of the secret this provider needs.
    pub fn credential_name(&self) -> &'static str {
        match self {
            Self::Tavily => "TAVILY_API_KEY",
            Self::Exa => "EXA_API_KEY",
        }
    }

    /// Returns all provider variants in default priority order.
    pub fn all() -> &'static [ProviderId] {
        &[Self::Tavily, Self::Exa]
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single item returned by one provider call. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderResult {
    /// Which provider produced this item.
    pub provider_id: ProviderId,
    /// Page title.
    pub title: String,
    /// Page URL.
    pub url: String,
    /// Snippet or extracted page content.
    pub content: String,
    /// Publication date as reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    /// Provider relevance score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Representative image URL, if the provider supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Anything that can be deduplicated by URL.
pub trait HasUrl {
    /// The item's URL.
    fn url(&self) -> &str;
}

impl HasUrl for ProviderResult {
    fn url(&self) -> &str {
        &self.url
    }
}

/// Settled outcome of one provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProviderOutcome {
    /// The provider answered; `items` is its result list in original order.
    Ok {
        /// Items as returned by the provider.
        items: Vec<ProviderResult>,
    },
    /// The provider failed.
    Failed {
        /// Failure classification.
        kind: ProviderErrorKind,
        /// Failure detail.
        message: String,
    },
}

impl ProviderOutcome {
    /// Whether this outcome is a success.
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok { .. })
    }
}

impl From<Result<Vec<ProviderResult>, ProviderError>> for ProviderOutcome {
    fn from(result: Result<Vec<ProviderResult>, ProviderError>) -> Self {
        match result {
            Ok(items) => Self::Ok { items },
            Err(err) => Self::Failed {
                kind: err.kind,
                message: err.message,
            },
        }
    }
}

/// Result of one aggregation.
///
/// Every item in `merged_items` appeared verbatim in some provider's
/// successful outcome, and no URL or domain appears twice. Media verdicts
/// live beside the items in `media`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedResult {
    /// The query that was run.
    pub query: SearchQuery,
    /// Per-provider outcome, keyed by provider.
    pub per_provider_outcomes: BTreeMap<ProviderId, ProviderOutcome>,
    /// Deduplicated items in provider-priority order.
    pub merged_items: Vec<ProviderResult>,
    /// Image verdicts keyed by the requested image URL. Empty unless media
    /// validation ran.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub media: BTreeMap<String, MediaValidation>,
}

impl AggregatedResult {
    /// The image to show for `item`.
    ///
    /// A valid verdict yields its display URL and an invalid one yields
    /// nothing. Without a verdict the provider's own image URL is returned.
    pub fn display_image<'a>(&'a self, item: &'a ProviderResult) -> Option<&'a str> {
        let image = item.image.as_deref()?;
        match self.media.get(image) {
            Some(verdict) if verdict.valid => Some(verdict.display_url()),
            Some(_) => None,
            None => Some(image),
        }
    }

    /// Merged items contributed by providers of the given kind.
    pub fn items_of_kind(&self, kind: ProviderKind) -> impl Iterator<Item = &ProviderResult> {
        self.merged_items
            .iter()
            .filter(move |item| item.provider_id.kind() == kind)
    }
}
