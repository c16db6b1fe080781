//! Application-level orchestration.
//!
//! The controller owns the session lifecycle (start, reset, retry, quit),
//! `SessionView` folds its messages into presentation state, and
//! post-processing runs the exports requested for a finished report.

mod controller;
mod post_process;
mod session;

pub use controller::{run_controller, SessionCommand};
pub use post_process::{process_report, ProcessedReport};
pub use session::{SessionPhase, SessionView};
