//! HTTP surface for the conversation engine and the media relay.
//!
//! Endpoints:
//! - `GET /relay?url=<target>`: metadata-only relay used by media validation
//! - `GET /api/tools?group=<group>`: schemas of the tools a group enables
//! - `POST /api/search`: dispatch a tool and stream the response as NDJSON

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use quarry_search::http::MEDIA_USER_AGENT;
use quarry_search::media::probe::FINAL_URL_HEADER;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::error::{QuarryError, Result};
use crate::groups::CapabilityLookup;
use crate::stream::{UpstreamModel, relay_channel, run_relay};

/// NDJSON content type of the search stream.
pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Chunks buffered between the relay writer and the HTTP body.
const STREAM_BUFFER: usize = 64;

/// Group used when a search request names none.
const DEFAULT_GROUP: &str = "web";

/// Redirects followed by the relay client.
const RELAY_MAX_REDIRECTS: usize = 10;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body of `POST /api/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Conversation group; selects the enabled capabilities.
    #[serde(default = "default_group")]
    pub group: String,
    /// Capability to run. Defaults to the group's first tool.
    #[serde(default)]
    pub capability: Option<String>,
    /// Tool arguments, as a JSON object or a JSON-encoded string.
    #[serde(default)]
    pub arguments: serde_json::Value,
}

fn default_group() -> String {
    DEFAULT_GROUP.to_owned()
}

impl SearchRequest {
    /// Arguments as the raw JSON text handed to validation.
    fn raw_arguments(&self) -> String {
        match &self.arguments {
            serde_json::Value::String(raw) => raw.clone(),
            serde_json::Value::Null => "{}".to_owned(),
            other => other.to_string(),
        }
    }
}

/// Error body for non-streaming failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Short error summary.
    pub error: String,
    /// Detail.
    pub details: String,
}

fn error_response(status: StatusCode, error: &str, details: impl Into<String>) -> Response {
    let body = ErrorResponse {
        error: error.to_owned(),
        details: details.into(),
    };
    (status, Json(body)).into_response()
}

#[derive(Debug, Deserialize)]
struct RelayParams {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ToolsParams {
    #[serde(default = "default_group")]
    group: String,
}

// ---------------------------------------------------------------------------
// Shared application state
// ---------------------------------------------------------------------------

/// Shared state for axum handlers.
#[derive(Clone)]
pub struct ServerState {
    dispatcher: Dispatcher,
    groups: Arc<dyn CapabilityLookup>,
    upstream: Arc<dyn UpstreamModel>,
    relay_client: reqwest::Client,
    relay_timeout: Duration,
    relay_allow_internal: bool,
}

impl ServerState {
    /// Assemble handler state.
    ///
    /// `relay_client` should follow redirects so the relay can report the
    /// final URL; `relay_timeout` bounds each relayed probe.
    pub fn new(
        dispatcher: Dispatcher,
        groups: Arc<dyn CapabilityLookup>,
        upstream: Arc<dyn UpstreamModel>,
        relay_client: reqwest::Client,
        relay_timeout: Duration,
    ) -> Self {
        Self {
            dispatcher,
            groups,
            upstream,
            relay_client,
            relay_timeout,
            relay_allow_internal: false,
        }
    }

    /// Let the relay reach loopback, private and link-local hosts.
    pub fn with_internal_relay_targets(mut self, allow: bool) -> Self {
        self.relay_allow_internal = allow;
        self
    }
}

/// Build the client used by `/relay`.
///
/// Unless `allow_internal` is set, redirects to loopback, private or
/// link-local hosts are not followed.
///
/// # Errors
///
/// Returns [`QuarryError::Server`] if the client cannot be constructed.
pub fn relay_client(allow_internal: bool) -> Result<reqwest::Client> {
    let policy = reqwest::redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= RELAY_MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else if !allow_internal && attempt.url().host().is_some_and(|h| is_internal_host(&h)) {
            attempt.stop()
        } else {
            attempt.follow()
        }
    });
    reqwest::Client::builder()
        .user_agent(MEDIA_USER_AGENT)
        .redirect(policy)
        .build()
        .map_err(|e| QuarryError::Server(format!("failed to build relay client: {e}")))
}

/// Loopback, private, link-local, unspecified and broadcast addresses.
fn is_internal_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_internal_ip(IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80
        }
    }
}

fn is_internal_host(host: &url::Host<&str>) -> bool {
    match host {
        url::Host::Ipv4(ip) => is_internal_ip(IpAddr::V4(*ip)),
        url::Host::Ipv6(ip) => is_internal_ip(IpAddr::V6(*ip)),
        url::Host::Domain(name) => {
            let name = name.trim_end_matches('.').to_ascii_lowercase();
            name == "localhost" || name.ends_with(".localhost")
        }
    }
}

/// Whether `target` names, or resolves to, an internal address.
///
/// Resolution failures are left to the relayed request itself.
async fn targets_internal_host(target: &url::Url) -> bool {
    let Some(host) = target.host() else {
        return true;
    };
    if is_internal_host(&host) {
        return true;
    }
    let url::Host::Domain(name) = host else {
        return false;
    };
    let port = target.port_or_known_default().unwrap_or(80);
    match tokio::net::lookup_host((name, port)).await {
        Ok(mut addrs) => addrs.any(|addr| is_internal_ip(addr.ip())),
        Err(_) => false,
    }
}

// ---------------------------------------------------------------------------
// QuarryServer
// ---------------------------------------------------------------------------

/// The HTTP server, serving in a background task.
pub struct QuarryServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl QuarryServer {
    /// Bind `{host}:{port}` (port `0` picks a free port).
    ///
    /// Split from [`serve`](Self::serve) so the bound address can be
    /// configured as the media relay base before the tools are built.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Server`] if the listener cannot bind.
    pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
        let bind_addr = format!("{}:{}", config.host, config.port);
        TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| QuarryError::Server(format!("bind {bind_addr} failed: {e}")))
    }

    /// Start serving on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`QuarryError::Server`] if the local address cannot be read.
    pub fn serve(listener: TcpListener, state: ServerState) -> Result<Self> {
        let addr = listener
            .local_addr()
            .map_err(|e| QuarryError::Server(format!("failed to get local addr: {e}")))?;

        let app = router(state);
        info!("quarry listening on http://{addr}");

        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("quarry server error: {e}");
            }
        });

        Ok(Self { addr, handle })
    }

    /// Bind and serve.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot bind.
    pub async fn start(config: &ServerConfig, state: ServerState) -> Result<Self> {
        let listener = Self::bind(config).await?;
        Self::serve(listener, state)
    }

    /// Returns the address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Base URL, e.g. `http://127.0.0.1:8787`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Abort the server task.
    pub fn shutdown(&self) {
        self.handle.abort();
    }
}

impl Drop for QuarryServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Routes over `state`.
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/relay", get(handle_relay))
        .route("/api/tools", get(handle_tools))
        .route("/api/search", post(handle_search))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /relay?url=`: server-side `HEAD` of the target.
///
/// Echoes the target's status and `Content-Type`, plus the final URL in
/// `X-Final-Url` when redirected.
async fn handle_relay(
    State(state): State<ServerState>,
    Query(params): Query<RelayParams>,
) -> Response {
    let Some(target) = params.url.filter(|u| !u.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "missing url", "query parameter 'url' is required");
    };

    let requested = match url::Url::parse(&target) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url,
        Ok(url) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "unsupported scheme",
                format!("only http and https targets are relayed, got '{}'", url.scheme()),
            );
        }
        Err(e) => return error_response(StatusCode::BAD_REQUEST, "invalid url", e.to_string()),
    };

    if !state.relay_allow_internal && targets_internal_host(&requested).await {
        tracing::warn!(target = %requested, "refusing to relay to internal host");
        return error_response(
            StatusCode::FORBIDDEN,
            "forbidden target",
            "relaying to loopback, private or link-local hosts is disabled",
        );
    }

    let response = match state
        .relay_client
        .head(requested.clone())
        .timeout(state.relay_timeout)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) if e.is_timeout() => {
            tracing::warn!(target = %requested, "relay target timed out");
            return error_response(StatusCode::GATEWAY_TIMEOUT, "relay timeout", "target did not answer in time");
        }
        Err(e) => {
            tracing::warn!(target = %requested, error = %e.without_url(), "relay target unreachable");
            return error_response(StatusCode::BAD_GATEWAY, "relay failed", "target unreachable");
        }
    };

    let mut headers = HeaderMap::new();
    if let Some(content_type) = response.headers().get(header::CONTENT_TYPE) {
        headers.insert(header::CONTENT_TYPE, content_type.clone());
    }
    if response.url() != &requested
        && let Ok(value) = HeaderValue::from_str(response.url().as_str())
    {
        headers.insert(FINAL_URL_HEADER, value);
    }

    tracing::debug!(
        target = %requested,
        status = response.status().as_u16(),
        "relayed probe"
    );
    (response.status(), headers).into_response()
}

/// `GET /api/tools?group=`: schemas for the group's tools.
async fn handle_tools(
    State(state): State<ServerState>,
    Query(params): Query<ToolsParams>,
) -> Response {
    let Some(tools) = state.groups.tools_for(&params.group) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "unknown group",
            format!("group '{}' is not configured", params.group),
        );
    };
    let schemas = state.dispatcher.registry().schemas_for_api(Some(tools.as_slice()));
    Json(serde_json::json!({ "group": params.group, "tools": schemas })).into_response()
}

/// `POST /api/search`: dispatch inside a streaming relay.
async fn handle_search(
    State(state): State<ServerState>,
    payload: std::result::Result<Json<SearchRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            return error_response(StatusCode::BAD_REQUEST, "invalid request body", rejection.body_text());
        }
    };

    let tools = match state.groups.tools_for(&request.group) {
        Some(tools) if !tools.is_empty() => tools,
        Some(_) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "no tools enabled",
                format!("group '{}' enables no capabilities", request.group),
            );
        }
        None => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "unknown group",
                format!("group '{}' is not configured", request.group),
            );
        }
    };

    let raw_arguments = request.raw_arguments();
    let capability = request
        .capability
        .clone()
        .unwrap_or_else(|| tools[0].clone());

    let (writer, reader, _monitor) = relay_channel(STREAM_BUFFER);
    let dispatcher = state.dispatcher.clone();
    let upstream = Arc::clone(&state.upstream);
    let group = request.group;

    tokio::spawn(async move {
        let cancel = writer.cancellation();
        let tool_call = dispatcher.dispatch_in_group(&tools, &capability, &raw_arguments, &cancel);
        match run_relay(writer, &capability, tool_call, upstream.as_ref()).await {
            Ok(()) => tracing::debug!(group = %group, capability = %capability, "search stream completed"),
            Err(reason) => tracing::warn!(group = %group, capability = %capability, reason = %reason, "search stream aborted"),
        }
    });

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)],
        Body::from_stream(reader),
    )
        .into_response()
}
