//! The `extreme_search` tool: multi-provider web and academic search.

use std::sync::Arc;

use async_trait::async_trait;
use quarry_search::{
    Aggregator, AggregatedResult, ProviderFactory, ProviderKind, SearchDepth, SearchProvider,
    SearchQuery,
};
use tokio_util::sync::CancellationToken;

use super::types::{Tool, ToolInvocation, ToolResult};
use crate::config::EXTREME_SEARCH;
use crate::credentials::CredentialStore;
use crate::error::ToolError;

/// Search tool backed by the provider aggregator.
///
/// Credentials for every configured provider (plus any extra required
/// names) are resolved before any provider is built, so a missing key
/// fails the call without network traffic.
pub struct ExtremeSearchTool {
    aggregator: Aggregator,
    factory: Arc<dyn ProviderFactory>,
    credentials: CredentialStore,
    extra_required: Vec<String>,
}

impl ExtremeSearchTool {
    /// Create the tool.
    pub fn new(
        aggregator: Aggregator,
        factory: Arc<dyn ProviderFactory>,
        credentials: CredentialStore,
    ) -> Self {
        Self {
            aggregator,
            factory,
            credentials,
            extra_required: Vec::new(),
        }
    }

    /// Require these credentials in addition to the providers' own.
    pub fn with_extra_required(mut self, names: Vec<String>) -> Self {
        self.extra_required = names;
        self
    }

    fn required_credentials(&self) -> Vec<String> {
        self.aggregator
            .config()
            .providers
            .iter()
            .map(|id| id.credential_name().to_owned())
            .chain(self.extra_required.iter().cloned())
            .collect()
    }

    fn build_query(&self, invocation: &ToolInvocation) -> Result<SearchQuery, ToolError> {
        let text = invocation.str_arg("query").unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ToolError::InvalidArguments(
                "tool 'extreme_search': query must not be blank".into(),
            ));
        }
        let depth = match invocation.str_arg("depth") {
            Some("basic") => SearchDepth::Basic,
            _ => SearchDepth::Advanced,
        };
        Ok(SearchQuery::new(
            text,
            depth,
            self.aggregator.config().max_results_per_provider,
        )?)
    }
}

#[async_trait]
impl Tool for ExtremeSearchTool {
    fn name(&self) -> &str {
        EXTREME_SEARCH
    }

    fn description(&self) -> &str {
        "Search the web and academic sources concurrently. Returns deduplicated \
         general-web and academic results, each with title, url and content."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "minLength": 1,
                    "description": "Search query"
                },
                "depth": {
                    "type": "string",
                    "enum": ["basic", "advanced"],
                    "default": "advanced",
                    "description": "How thoroughly providers should search"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(
        &self,
        invocation: &ToolInvocation,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        let query = self.build_query(invocation)?;

        let resolved = self
            .credentials
            .resolve(&self.required_credentials())
            .map_err(|names| ToolError::MissingCredentials { names })?;

        let providers: Vec<Arc<dyn SearchProvider>> = self
            .aggregator
            .config()
            .providers
            .iter()
            .map(|id| {
                let key = resolved
                    .get(id.credential_name())
                    .map(|s| s.expose())
                    .unwrap_or_default();
                self.factory.create(*id, key)
            })
            .collect();

        tracing::trace!(query = query.text(), "running extreme_search");
        let result = self.aggregator.run(&query, &providers, cancel).await?;
        tracing::debug!(
            merged = result.merged_items.len(),
            providers = result.per_provider_outcomes.len(),
            "extreme_search complete"
        );

        Ok(ToolResult::new(EXTREME_SEARCH, payload(&result)))
    }
}

/// Two labelled lists of `{title, url, content}`; provider-specific fields stay behind.
fn payload(result: &AggregatedResult) -> serde_json::Value {
    let items = |kind: ProviderKind| -> Vec<serde_json::Value> {
        result
            .items_of_kind(kind)
            .map(|item| {
                let mut entry = serde_json::json!({
                    "title": item.title,
                    "url": item.url,
                    "content": item.content,
                });
                if let Some(image) = result.display_image(item) {
                    entry["image"] = serde_json::Value::from(image);
                }
                entry
            })
            .collect()
    };
    serde_json::json!({
        "web": items(ProviderKind::Web),
        "academic": items(ProviderKind::Academic),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::EnvSource;
    use quarry_search::media::MediaReason;
    use quarry_search::{
        MediaValidation, ProviderError, ProviderErrorKind, ProviderId, ProviderOutcome, ProviderResult,
        SearchConfig,
    };
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProvider {
        id: ProviderId,
        fail: bool,
    }

    #[async_trait]
    impl SearchProvider for FixedProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        async fn fetch(&self, _query: &SearchQuery) -> Result<Vec<ProviderResult>, ProviderError> {
            if self.fail {
                return Err(ProviderError::new(self.id, ProviderErrorKind::RateLimited, "429"));
            }
            Ok(vec![ProviderResult {
                provider_id: self.id,
                title: format!("{} hit", self.id),
                url: format!("https://{}.example/page", self.id),
                content: "body".into(),
                published_date: Some("2024-05-01".into()),
                score: Some(0.5),
                image: None,
            }])
        }
    }

    #[derive(Default)]
    struct CountingFactory {
        created: AtomicUsize,
        fail_all: bool,
    }

    impl ProviderFactory for CountingFactory {
        fn create(&self, id: ProviderId, api_key: &str) -> Arc<dyn SearchProvider> {
            assert!(!api_key.is_empty());
            self.created.fetch_add(1, Ordering::SeqCst);
            Arc::new(FixedProvider {
                id,
                fail: self.fail_all,
            })
        }
    }

    fn env_of(pairs: &[(&'static str, &'static str)]) -> EnvSource {
        let map: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Arc::new(move |name| map.get(name).cloned())
    }

    fn tool(factory: Arc<CountingFactory>, env: EnvSource) -> ExtremeSearchTool {
        ExtremeSearchTool::new(
            Aggregator::new(SearchConfig::default()),
            factory,
            CredentialStore::from_env_only().with_env(env),
        )
    }

    fn invocation(args: serde_json::Value) -> ToolInvocation {
        ToolInvocation {
            capability_name: EXTREME_SEARCH.into(),
            raw_arguments: args.to_string(),
            parsed_arguments: args,
        }
    }

    #[tokio::test]
    async fn payload_splits_web_and_academic() {
        let factory = Arc::new(CountingFactory::default());
        let tool = tool(
            Arc::clone(&factory),
            env_of(&[("TAVILY_API_KEY", "t"), ("EXA_API_KEY", "e")]),
        );
        let result = tool
            .execute(
                &invocation(serde_json::json!({"query": "rust", "depth": "basic"})),
                &CancellationToken::new(),
            )
            .await
            .expect("search");

        assert_eq!(result.capability_name, EXTREME_SEARCH);
        let web = result.content["web"].as_array().expect("web");
        let academic = result.content["academic"].as_array().expect("academic");
        assert_eq!(web.len(), 1);
        assert_eq!(academic.len(), 1);
        assert_eq!(web[0]["url"], "https://tavily.example/page");
        assert_eq!(academic[0]["title"], "exa hit");
        assert!(web[0].get("score").is_none());
        assert!(web[0].get("publishedDate").is_none());
        assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_credential_builds_no_provider() {
        let factory = Arc::new(CountingFactory::default());
        let tool = tool(Arc::clone(&factory), env_of(&[("TAVILY_API_KEY", "t")]));
        let err = tool
            .execute(
                &invocation(serde_json::json!({"query": "rust"})),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        match err {
            ToolError::MissingCredentials { names } => {
                assert_eq!(names, vec!["EXA_API_KEY".to_owned()]);
            }
            other => panic!("expected MissingCredentials, got {other:?}"),
        }
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn extra_required_credentials_are_checked() {
        let factory = Arc::new(CountingFactory::default());
        let tool = tool(
            Arc::clone(&factory),
            env_of(&[("TAVILY_API_KEY", "t"), ("EXA_API_KEY", "e")]),
        )
        .with_extra_required(vec!["XAI_API_KEY".into()]);
        let err = tool
            .execute(
                &invocation(serde_json::json!({"query": "rust"})),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "MISSING_CREDENTIALS");
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn blank_query_rejected_before_credentials() {
        let factory = Arc::new(CountingFactory::default());
        let tool = tool(Arc::clone(&factory), env_of(&[]));
        let err = tool
            .execute(
                &invocation(serde_json::json!({"query": "   "})),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert_eq!(factory.created.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn all_failures_surface_kinds() {
        let factory = Arc::new(CountingFactory {
            fail_all: true,
            ..Default::default()
        });
        let tool = tool(factory, env_of(&[("TAVILY_API_KEY", "t"), ("EXA_API_KEY", "e")]));
        let err = tool
            .execute(
                &invocation(serde_json::json!({"query": "rust"})),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        match err {
            ToolError::AllProvidersFailed { failures } => {
                assert_eq!(failures.len(), 2);
                assert!(failures.iter().all(|f| f.kind == ProviderErrorKind::RateLimited));
            }
            other => panic!("expected AllProvidersFailed, got {other:?}"),
        }
    }

    #[test]
    fn schema_declares_query_and_depth() {
        let tool = tool(Arc::new(CountingFactory::default()), env_of(&[]));
        let schema = tool.schema();
        assert_eq!(schema["required"][0], "query");
        assert_eq!(schema["properties"]["depth"]["default"], "advanced");
        assert_eq!(tool.name(), "extreme_search");
    }

    #[test]
    fn payload_applies_media_verdicts() {
        use quarry_search::media::ProbeMethod;

        let hit = |url: &str, image: &str| ProviderResult {
            provider_id: ProviderId::Exa,
            title: "paper".into(),
            url: url.into(),
            content: "abstract".into(),
            published_date: None,
            score: None,
            image: Some(image.into()),
        };
        let items = vec![
            hit("https://arxiv.org/abs/1", "https://img.example/moved.png"),
            hit("https://www.academia.edu/2", "https://img.example/gone.png"),
            hit("https://www.researchgate.net/3", "https://img.example/unchecked.png"),
        ];
        let mut media = BTreeMap::new();
        media.insert(
            "https://img.example/moved.png".to_owned(),
            MediaValidation::valid(
                "https://img.example/moved.png",
                ProbeMethod::Direct,
                Some("https://cdn.example/final.png".into()),
            ),
        );
        media.insert(
            "https://img.example/gone.png".to_owned(),
            MediaValidation::invalid("https://img.example/gone.png", ProbeMethod::Direct, MediaReason::NotFound),
        );
        let result = AggregatedResult {
            query: SearchQuery::new("papers", SearchDepth::Basic, 5).expect("query"),
            per_provider_outcomes: BTreeMap::from([(ProviderId::Exa, ProviderOutcome::Ok { items: items.clone() })]),
            merged_items: items,
            media,
        };

        let academic = payload(&result)["academic"].clone();
        assert_eq!(academic[0]["image"], "https://cdn.example/final.png");
        assert!(academic[1].get("image").is_none());
        assert_eq!(academic[2]["image"], "https://img.example/unchecked.png");
        assert_eq!(result.merged_items[0].image.as_deref(), Some("https://img.example/moved.png"));
    }
}
