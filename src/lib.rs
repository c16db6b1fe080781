//! Terminal client for the Majin analysis backend: submit a dataset, follow
//! the job, then view and export the resulting report.

pub mod chart;
pub mod cli;
pub mod engine;
pub mod error;
pub mod export;
pub mod format;
pub mod logging;
pub mod markdown;
pub mod model;
pub mod orchestrator;
pub mod report;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;
pub mod view;
