//! Tool dispatcher with timeout and cancellation support.
//!
//! The [`Dispatcher`] wraps a [`ToolRegistry`] and runs one capability call:
//! lookup, schema validation, then execution under a timeout and the
//! caller's cancellation token. Every failure comes back as a structured
//! [`ToolError`] rather than a crash.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::ToolError;
use crate::tools::{ToolInvocation, ToolRegistry, ToolResult, validate_tool_args};

/// Runs capability calls against a [`ToolRegistry`].
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher.
    ///
    /// # Arguments
    ///
    /// * `registry`: Tools available to the conversation engine
    /// * `timeout`: Upper bound on one tool call
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Dispatch `capability` with `raw_arguments`, regardless of group.
    ///
    /// # Errors
    ///
    /// - [`ToolError::UnknownCapability`] if no tool has this name
    /// - [`ToolError::InvalidArguments`] if arguments fail the tool's schema
    /// - [`ToolError::Cancelled`] if `cancel` fires first
    /// - [`ToolError::Timeout`] if the call exceeds the dispatch timeout
    /// - Any error returned by the tool itself
    pub async fn dispatch(
        &self,
        capability: &str,
        raw_arguments: &str,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        let span = tracing::info_span!(
            "tool.dispatch",
            capability = %capability,
            request_id = %uuid::Uuid::new_v4(),
        );
        self.run(capability, raw_arguments, cancel)
            .instrument(span)
            .await
    }

    /// Dispatch `capability` only if it is among `enabled`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::CapabilityDisabled`] for a registered tool the
    /// group does not enable, and otherwise the errors of [`Self::dispatch`].
    pub async fn dispatch_in_group(
        &self,
        enabled: &[String],
        capability: &str,
        raw_arguments: &str,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        if !enabled.iter().any(|name| name == capability) {
            if self.registry.exists(capability) {
                tracing::warn!(capability, "capability not enabled for group");
                return Err(ToolError::CapabilityDisabled(capability.to_owned()));
            }
            return Err(ToolError::UnknownCapability(capability.to_owned()));
        }
        self.dispatch(capability, raw_arguments, cancel).await
    }

    async fn run(
        &self,
        capability: &str,
        raw_arguments: &str,
        cancel: &CancellationToken,
    ) -> Result<ToolResult, ToolError> {
        if cancel.is_cancelled() {
            tracing::warn!("dispatch cancelled before start");
            return Err(ToolError::Cancelled(format!(
                "tool '{capability}': cancelled before execution"
            )));
        }

        let tool = self.registry.get(capability).ok_or_else(|| {
            tracing::error!("capability not found in registry");
            ToolError::UnknownCapability(capability.to_owned())
        })?;

        let parsed_arguments = validate_tool_args(capability, raw_arguments, &tool.schema())
            .inspect_err(|e| tracing::warn!(error = %e, "arguments rejected"))?;
        let invocation = ToolInvocation {
            capability_name: capability.to_owned(),
            raw_arguments: raw_arguments.to_owned(),
            parsed_arguments,
        };

        // Child token so a timeout also stops in-flight provider calls.
        let call_cancel = cancel.child_token();
        let _guard = call_cancel.clone().drop_guard();
        let start = Instant::now();

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::warn!("dispatch cancelled during execution");
                Err(ToolError::Cancelled(format!(
                    "tool '{capability}': cancelled during execution"
                )))
            }
            outcome = tokio::time::timeout(self.timeout, tool.execute(&invocation, &call_cancel)) => {
                match outcome {
                    Ok(result) => result,
                    Err(_elapsed) => {
                        tracing::error!(timeout_ms = millis(self.timeout), "tool execution timed out");
                        Err(ToolError::Timeout(format!(
                            "tool '{capability}': execution timed out after {}ms",
                            self.timeout.as_millis()
                        )))
                    }
                }
            }
        };

        let duration_ms = millis(start.elapsed());
        match &result {
            Ok(_) => tracing::info!(duration_ms, "tool call completed"),
            Err(e) => tracing::error!(code = e.code(), error = %e, duration_ms, "tool call failed"),
        }
        result
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
