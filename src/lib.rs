//! usagewatch: relay Claude usage dashboard percentages to local consumers.
//!
//! The extraction, scheduling and status logic lives in `usagewatch-core`;
//! this crate adds configuration, the headless commands and the terminal
//! popup.

pub mod config;
pub mod runner;
pub mod ui;
