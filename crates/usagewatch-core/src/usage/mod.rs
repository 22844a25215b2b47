//! Usage extraction: parse the dashboard's rendered text into a record.
//!
//! The page text comes from a [`crate::source::PageSource`]; this module only
//! deals with the text itself and has no I/O.

pub mod parser;
pub mod types;

pub use parser::{extract_usage, extract_usage_at};
pub use types::UsageRecord;
