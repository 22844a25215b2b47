//! Scheduling of extraction cycles.

mod orchestrator;

pub use orchestrator::{MonitorHandle, Orchestrator, DEFAULT_LOAD_TIMEOUT};
