//! Streaming response relay.
//!
//! Combines a tool-dispatch result and the upstream model's token stream
//! into one outbound NDJSON byte stream. The writer half is fed by
//! [`run_relay`]; the reader half becomes the HTTP response body.
//!
//! The outbound stream ends in exactly one of two ways:
//! - **closed** after a `finish` frame on normal completion, or
//! - **aborted** with an error item, so the client can tell truncation
//!   from success.
//!
//! Dropping the reader (client disconnect) marks the relay aborted and
//! cancels the request's token, which stops pending provider calls and
//! the upstream model stream.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{BoxStream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::error::ToolError;
use crate::tools::ToolResult;

/// Why an outbound stream was aborted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StreamAborted {
    /// Upstream generation failed.
    #[error("upstream failed: {0}")]
    Upstream(String),
    /// The client went away mid-stream.
    #[error("client disconnected")]
    ClientDisconnected,
}

/// Lifecycle of one relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayState {
    /// Still streaming.
    Open,
    /// Completed normally.
    Closed,
    /// Terminated early.
    Aborted(StreamAborted),
}

/// One NDJSON line of the outbound stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// Successful tool call.
    ToolResult {
        /// Capability that ran.
        capability: String,
        /// Tool payload.
        content: serde_json::Value,
    },
    /// Failed tool call, with the structured error.
    ToolError {
        /// Capability that was requested.
        capability: String,
        /// `{code, message, ...}` from [`ToolError::to_json`].
        error: serde_json::Value,
    },
    /// A chunk of model output.
    Text {
        /// Token text.
        delta: String,
    },
    /// Normal end of stream.
    Finish {
        /// Finish reason.
        reason: String,
    },
}

impl Frame {
    /// Frame for a settled tool call.
    pub fn from_tool(capability: &str, result: &Result<ToolResult, ToolError>) -> Self {
        match result {
            Ok(result) => Self::ToolResult {
                capability: result.capability_name.clone(),
                content: result.content.clone(),
            },
            Err(err) => Self::ToolError {
                capability: capability.to_owned(),
                error: err.to_json(),
            },
        }
    }

    /// Serialize as one newline-terminated JSON line.
    pub fn to_line(&self) -> Result<Bytes, StreamAborted> {
        let mut line =
            serde_json::to_vec(self).map_err(|e| StreamAborted::Upstream(e.to_string()))?;
        line.push(b'\n');
        Ok(Bytes::from(line))
    }
}

type Item = Result<Bytes, StreamAborted>;

/// Move the relay out of `Open`. Returns `false` if it had already ended.
fn transition(state: &watch::Sender<RelayState>, next: RelayState) -> bool {
    state.send_if_modified(|current| {
        if *current == RelayState::Open {
            *current = next;
            true
        } else {
            false
        }
    })
}

/// Create a relay with room for `buffer` pending chunks.
pub fn relay_channel(buffer: usize) -> (RelayWriter, RelayReader, RelayMonitor) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    let (state_tx, state_rx) = watch::channel(RelayState::Open);
    let state = Arc::new(state_tx);
    let cancel = CancellationToken::new();

    let writer = RelayWriter {
        tx,
        state: Arc::clone(&state),
        cancel: cancel.clone(),
    };
    let reader = RelayReader {
        inner: ReceiverStream::new(rx),
        state,
        cancel,
    };
    (writer, reader, RelayMonitor { rx: state_rx })
}

/// Producer half. Ends the stream exactly once via [`close`](Self::close)
/// or [`abort`](Self::abort); dropping it while open counts as an upstream abort.
pub struct RelayWriter {
    tx: mpsc::Sender<Item>,
    state: Arc<watch::Sender<RelayState>>,
    cancel: CancellationToken,
}

impl RelayWriter {
    /// Token cancelled when the client disconnects.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Send raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StreamAborted::ClientDisconnected`] if the reader is gone.
    pub async fn write(&self, chunk: Bytes) -> Result<(), StreamAborted> {
        self.tx.send(Ok(chunk)).await.map_err(|_| {
            transition(&self.state, RelayState::Aborted(StreamAborted::ClientDisconnected));
            StreamAborted::ClientDisconnected
        })
    }

    /// Send one frame as an NDJSON line.
    ///
    /// # Errors
    ///
    /// Returns [`StreamAborted::ClientDisconnected`] if the reader is gone.
    pub async fn write_frame(&self, frame: &Frame) -> Result<(), StreamAborted> {
        self.write(frame.to_line()?).await
    }

    /// Complete the stream normally. Returns `false` if it had already ended.
    pub fn close(self) -> bool {
        transition(&self.state, RelayState::Closed)
    }

    /// Abort the stream; the reader yields `reason` as its final item.
    /// Returns `false` if it had already ended.
    pub async fn abort(self, reason: StreamAborted) -> bool {
        if !transition(&self.state, RelayState::Aborted(reason.clone())) {
            return false;
        }
        tracing::warn!(reason = %reason, "outbound stream aborted");
        let _ = self.tx.send(Err(reason)).await;
        true
    }
}

impl Drop for RelayWriter {
    fn drop(&mut self) {
        let reason = StreamAborted::Upstream("relay writer dropped before completion".into());
        if transition(&self.state, RelayState::Aborted(reason.clone())) {
            tracing::warn!("outbound stream writer dropped while open");
            let _ = self.tx.try_send(Err(reason));
        }
    }
}

/// Consumer half, used as the HTTP response body.
pub struct RelayReader {
    inner: ReceiverStream<Item>,
    state: Arc<watch::Sender<RelayState>>,
    cancel: CancellationToken,
}

impl Stream for RelayReader {
    type Item = Item;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl Drop for RelayReader {
    fn drop(&mut self) {
        if transition(&self.state, RelayState::Aborted(StreamAborted::ClientDisconnected)) {
            tracing::info!("client disconnected mid-stream");
        }
        self.cancel.cancel();
    }
}

/// Observes a relay's lifecycle.
#[derive(Clone)]
pub struct RelayMonitor {
    rx: watch::Receiver<RelayState>,
}

impl RelayMonitor {
    /// Current state.
    pub fn state(&self) -> RelayState {
        self.rx.borrow().clone()
    }

    /// Wait until the relay is closed or aborted.
    pub async fn finished(&self) -> RelayState {
        let mut rx = self.rx.clone();
        let waited = rx
            .wait_for(|s| *s != RelayState::Open)
            .await
            .map(|state| state.clone());
        match waited {
            Ok(state) => state,
            Err(_) => rx.borrow().clone(),
        }
    }
}

/// Error reported by an upstream model stream.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct UpstreamError(pub String);

/// Token stream from an upstream model.
pub type TokenStream = BoxStream<'static, Result<String, UpstreamError>>;

/// The conversation model whose output follows the tool frame.
#[async_trait]
pub trait UpstreamModel: Send + Sync {
    /// Start generating, given the tool frame already sent to the client.
    ///
    /// # Errors
    ///
    /// Returns an [`UpstreamError`] if generation cannot start.
    async fn generate(&self, tool_frame: &Frame) -> Result<TokenStream, UpstreamError>;
}

/// Upstream that produces no text.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoUpstream;

#[async_trait]
impl UpstreamModel for NoUpstream {
    async fn generate(&self, _tool_frame: &Frame) -> Result<TokenStream, UpstreamError> {
        Ok(futures_util::stream::empty().boxed())
    }
}

/// Drive one relay: the tool frame, then model text, then `finish`.
///
/// `tool_call` should observe [`RelayWriter::cancellation`] so a client
/// disconnect stops it. Upstream errors abort the stream.
///
/// # Errors
///
/// Returns the [`StreamAborted`] reason if the stream did not complete.
pub async fn run_relay<F>(
    writer: RelayWriter,
    capability: &str,
    tool_call: F,
    model: &dyn UpstreamModel,
) -> Result<(), StreamAborted>
where
    F: Future<Output = Result<ToolResult, ToolError>>,
{
    let cancel = writer.cancellation();

    let tool_result = tokio::select! {
        biased;
        _ = cancel.cancelled() => return fail(writer, StreamAborted::ClientDisconnected).await,
        result = tool_call => result,
    };
    let tool_frame = Frame::from_tool(capability, &tool_result);
    if let Err(reason) = writer.write_frame(&tool_frame).await {
        return fail(writer, reason).await;
    }

    let generated = tokio::select! {
        biased;
        _ = cancel.cancelled() => return fail(writer, StreamAborted::ClientDisconnected).await,
        generated = model.generate(&tool_frame) => generated,
    };
    let mut tokens = match generated {
        Ok(tokens) => tokens,
        Err(e) => return fail(writer, StreamAborted::Upstream(e.0)).await,
    };

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return fail(writer, StreamAborted::ClientDisconnected).await,
            next = tokens.next() => next,
        };
        match next {
            Some(Ok(delta)) => {
                if delta.is_empty() {
                    continue;
                }
                if let Err(reason) = writer.write_frame(&Frame::Text { delta }).await {
                    return fail(writer, reason).await;
                }
            }
            Some(Err(e)) => return fail(writer, StreamAborted::Upstream(e.0)).await,
            None => break,
        }
    }

    let finish = Frame::Finish {
        reason: "stop".to_owned(),
    };
    if let Err(reason) = writer.write_frame(&finish).await {
        return fail(writer, reason).await;
    }
    writer.close();
    Ok(())
}

async fn fail(writer: RelayWriter, reason: StreamAborted) -> Result<(), StreamAborted> {
    writer.abort(reason.clone()).await;
    Err(reason)
}
