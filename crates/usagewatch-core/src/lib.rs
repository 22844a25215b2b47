//! Core library for usagewatch.
//!
//! Extracts session and weekly usage percentages from the usage dashboard's
//! rendered text and relays them to local consumers.
//!
//! - [`usage`]: the record type and the text extractor
//! - [`source`]: where page text comes from
//! - [`monitor`]: the orchestrator running extraction cycles
//! - [`state`]: the last known status, shared with readers
//! - [`sink`]: downstream consumers of each new record
//! - [`presentation`]: indicator and detail view model
//! - [`alerts`]: session threshold alerts

pub mod alerts;
pub mod error;
pub mod monitor;
pub mod presentation;
pub mod sink;
pub mod source;
pub mod state;
pub mod usage;

pub use error::{CycleError, ExtractionError, SinkError, SourceError};
