//! Core tool types.
//!
//! Defines the [`Tool`] trait every capability implements, the
//! [`ToolInvocation`] built for one call, and the [`ToolResult`] returned
//! to the conversation engine.

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;

/// One validated call of a capability.
///
/// Created per conversation turn, validated once against the tool's
/// declared schema, and discarded after the tool returns.
#[derive(Debug, Clone)]
pub struct ToolInvocation {
    /// Capability requested by the conversation engine.
    pub capability_name: String,
    /// Arguments exactly as received.
    pub raw_arguments: String,
    /// Arguments after validation, with schema defaults applied.
    pub parsed_arguments: serde_json::Value,
}

impl ToolInvocation {
    /// String argument `key`, if present.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.parsed_arguments.get(key).and_then(|v| v.as_str())
    }
}

/// Normalized output of a successful tool call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    /// Capability that produced this result.
    pub capability_name: String,
    /// Structured payload handed to the conversation engine.
    pub content: serde_json::Value,
}

impl ToolResult {
    /// Create a result for `capability_name`.
    pub fn new(capability_name: impl Into<String>, content: serde_json::Value) -> Self {
        Self {
            capability_name: capability_name.into(),
            content,
        }
    }
}

/// A named, schema-described capability.
///
/// All tools must be `Send + Sync` for use across tasks.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the capability name (e.g. `"extreme_search"`).
    fn name(&self) -> &str;

    /// Returns a human-readable description of what the tool does.
    fn description(&self) -> &str;

    /// Returns the JSON Schema for the tool's arguments.
    fn schema(&self) -> serde_json::Value;

    /// Execute one validated invocation.
    ///
    /// Implementations must stop promptly once `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolError`] describing why the call failed.
    async fn execute(
        &self,
        invocation: &ToolInvocation,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, ToolError>;
}
