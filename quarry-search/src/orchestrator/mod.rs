//! Search orchestration: concurrent provider fan-out, merge, deduplicate.
//!
//! - [`aggregate`]: runs every selected provider under its own timeout and
//!   merges the settled outcomes in priority order
//! - [`dedup`]: URL and domain based result deduplication

pub mod aggregate;
pub mod dedup;

pub use aggregate::Aggregator;
pub use dedup::{dedupe, extract_domain};
