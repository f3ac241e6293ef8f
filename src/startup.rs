//! Startup wiring: builds the tool registry, dispatcher and server state
//! from a validated [`QuarryConfig`].
//!
//! Call [`start`] to bind the listener, point media validation at this
//! process's own relay endpoint, and begin serving.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use quarry_search::{Aggregator, HttpProviderFactory, MediaValidator, ProviderFactory};
use tracing::info;

use crate::config::QuarryConfig;
use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::groups::StaticGroups;
use crate::server::{QuarryServer, ServerState, relay_client};
use crate::stream::{NoUpstream, UpstreamModel};
use crate::tools::{ExtremeSearchTool, ToolRegistry};

/// Register every tool the configuration enables.
///
/// # Errors
///
/// Returns an error if the media validator cannot be built.
pub fn build_registry(config: &QuarryConfig, factory: Arc<dyn ProviderFactory>) -> Result<ToolRegistry> {
    let mut aggregator = Aggregator::new(config.search.clone());
    if config.search.validate_media {
        aggregator = aggregator.with_media_validator(MediaValidator::new(config.media.clone())?);
    }

    let search = ExtremeSearchTool::new(aggregator, factory, config.credential_store())
        .with_extra_required(config.dispatch.extra_required_credentials.clone());

    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(search));
    Ok(registry)
}

/// Assemble handler state from configuration and collaborators.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or an HTTP client
/// cannot be built.
pub fn build_state(
    config: &QuarryConfig,
    factory: Arc<dyn ProviderFactory>,
    upstream: Arc<dyn UpstreamModel>,
) -> Result<ServerState> {
    config.validate()?;
    let registry = build_registry(config, factory)?;
    let dispatcher = Dispatcher::new(
        Arc::new(registry),
        Duration::from_secs(config.dispatch.tool_timeout_secs),
    );
    Ok(ServerState::new(
        dispatcher,
        Arc::new(StaticGroups::new(config.groups.clone())),
        upstream,
        relay_client(config.server.relay_allow_internal)?,
        Duration::from_millis(config.media.proxy_timeout_ms),
    )
    .with_internal_relay_targets(config.server.relay_allow_internal))
}

/// Base URL a local client should use to reach `addr`.
pub fn local_base_url(addr: SocketAddr) -> String {
    let ip = if addr.ip().is_unspecified() {
        IpAddr::V4(Ipv4Addr::LOCALHOST)
    } else {
        addr.ip()
    };
    format!("http://{}", SocketAddr::new(ip, addr.port()))
}

/// Bind, wire the relay base URL, and serve with HTTP providers.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the listener cannot
/// bind, or an HTTP client cannot be built.
pub async fn start(mut config: QuarryConfig) -> Result<QuarryServer> {
    config.validate()?;
    let listener = QuarryServer::bind(&config.server).await?;

    if config.media.relay_base_url.is_none() {
        let addr = listener.local_addr()?;
        let base = local_base_url(addr);
        info!(relay = %base, "media relay served by this process");
        config.media.relay_base_url = Some(base);
    }

    let factory: Arc<dyn ProviderFactory> = Arc::new(HttpProviderFactory::new(config.search.clone())?);
    let state = build_state(&config, factory, Arc::new(NoUpstream))?;
    QuarryServer::serve(listener, state)
}
