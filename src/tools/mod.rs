//! Tools exposed to the conversation engine.
//!
//! Each capability implements [`Tool`] and is registered in a
//! [`ToolRegistry`]. Arguments are checked with [`validate_tool_args`]
//! before a tool ever runs.

pub mod registry;
pub mod search;
pub mod types;
pub mod validation;

pub use registry::ToolRegistry;
pub use search::ExtremeSearchTool;
pub use types::{Tool, ToolInvocation, ToolResult};
pub use validation::validate_tool_args;
