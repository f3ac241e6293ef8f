//! Quarry: search aggregation and resilient retrieval for a conversation engine.
//!
//! The conversation engine calls one capability (`extreme_search`) by name
//! with JSON arguments. Quarry validates the arguments, resolves provider
//! credentials, fans the query out to every configured provider, and
//! streams the tool result followed by the model's output back as NDJSON.
//!
//! # Architecture
//!
//! - **Search** (`quarry-search`): provider clients, aggregation with
//!   graceful degradation, deduplication, media validation
//! - **Tools**: schema-described capabilities and their registry
//! - **Dispatch**: validation, credential gating, timeout and cancellation
//! - **Stream**: the outbound relay that closes once or aborts
//! - **Server**: `POST /api/search`, `GET /api/tools` and the `GET /relay`
//!   endpoint used by media validation

pub mod config;
pub mod credentials;
pub mod dispatch;
pub mod error;
pub mod groups;
pub mod server;
pub mod startup;
pub mod stream;
pub mod tools;

pub use config::QuarryConfig;
pub use dispatch::Dispatcher;
pub use error::{QuarryError, Result, ToolError};
pub use server::{QuarryServer, ServerState};
pub use stream::{Frame, RelayState, StreamAborted, UpstreamModel};
pub use tools::{Tool, ToolRegistry, ToolResult};
