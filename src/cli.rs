use crate::engine::{AnalysisEngine, CancelHandle, HttpBackend, RunRequest};
use crate::export::{ExportKind, MultiFormatExporter};
use crate::logging::{self, LogTarget};
use crate::model::{SessionConfig, SessionEvent};
use crate::orchestrator::process_report;
use crate::view::LayoutMode;
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            let _ = match line {
                OutputLine::Stdout(msg) => writeln!(out, "{msg}"),
                OutputLine::Stderr(msg) => writeln!(err, "{msg}"),
            };
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "majin-analyzer",
    version,
    about = "Analyze a CSV dataset with the Majin backend and export the report"
)]
pub struct Cli {
    /// Dataset to analyze. The TUI can also prompt for one.
    pub file: Option<PathBuf>,

    /// Base URL of the analysis backend
    #[arg(long, default_value = "http://127.0.0.1:3000")]
    pub base_url: String,

    /// Content type sent with the dataset upload
    #[arg(long, default_value = "text/csv")]
    pub content_type: String,

    /// Delay between job status queries
    #[arg(long, default_value = "3s")]
    pub poll_interval: humantime::Duration,

    /// Timeout of each backend request
    #[arg(long, default_value = "30s")]
    pub request_timeout: humantime::Duration,

    /// Directory exports are written to
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Export automatically when the report is ready (repeatable)
    #[arg(long = "export", value_enum)]
    pub exports: Vec<ExportKind>,

    /// Report layout
    #[arg(long, value_enum, default_value_t = LayoutMode::Stacked)]
    pub layout: LayoutMode,

    /// Render width in columns for PDF capture outside the TUI
    #[arg(long, default_value_t = 100)]
    pub width: u16,

    /// Print a text summary and exit (no TUI)
    #[arg(long, conflicts_with = "json")]
    pub text: bool,

    /// Print the raw report JSON and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Log level; RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Log file. Interactive sessions default to the user cache directory.
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn is_interactive(&self) -> bool {
        cfg!(feature = "tui") && !self.text && !self.json
    }
}

pub async fn run(args: Cli) -> Result<()> {
    let target = match (&args.log_file, args.is_interactive()) {
        (Some(path), _) => LogTarget::File(path.clone()),
        (None, true) => LogTarget::File(logging::default_log_file()),
        (None, false) => LogTarget::Stderr,
    };
    let _log_guard = logging::init(&args.log_level, &target)?;

    if args.is_interactive() {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
    }

    if args.json {
        return run_json(args).await;
    }
    run_text(args).await
}

/// Build a `SessionConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> SessionConfig {
    SessionConfig {
        base_url: args.base_url.clone(),
        upload_content_type: args.content_type.clone(),
        poll_interval: Duration::from(args.poll_interval),
        request_timeout: Duration::from(args.request_timeout),
        output_dir: args.output_dir.clone(),
        ..SessionConfig::default()
    }
}

pub fn build_exporter(args: &Cli) -> MultiFormatExporter {
    MultiFormatExporter::new(args.output_dir.clone(), args.width, args.layout)
}

fn required_file(args: &Cli) -> Result<PathBuf> {
    match &args.file {
        Some(f) => Ok(f.clone()),
        None => bail!("a dataset FILE is required with --text or --json"),
    }
}

/// Progress text for one run event; `None` for events with nothing to say.
fn progress_line(event: &SessionEvent) -> Option<String> {
    match event {
        SessionEvent::Started { file } => Some(format!("Uploading {}", file.display())),
        SessionEvent::Submitted { job } => Some(format!("Job {} submitted", job.id)),
        SessionEvent::StatusChanged { job_id, status } => {
            Some(format!("Job {job_id}: {}", status.as_str()))
        }
        SessionEvent::PollFailed { message, .. } => Some(format!("Status query failed: {message}")),
        SessionEvent::Fetching { .. } => Some("Fetching result".to_string()),
        SessionEvent::Info(info) => Some(info.clone()),
        SessionEvent::ReportReady { .. } | SessionEvent::Failed(_) => None,
    }
}

/// Run one analysis to completion, relaying progress to `progress` when set.
async fn analyze(
    args: &Cli,
    progress: Option<mpsc::UnboundedSender<OutputLine>>,
) -> Result<std::sync::Arc<crate::report::ReportModel>> {
    let file = required_file(args)?;
    let cfg = build_config(args);
    let backend = HttpBackend::new(&cfg)?;
    let engine = AnalysisEngine::new(backend, cfg);

    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let _ = evt_tx.send(SessionEvent::Started { file: file.clone() });
    let relay = tokio::spawn(async move {
        while let Some(ev) = evt_rx.recv().await {
            if let (Some(tx), Some(line)) = (progress.as_ref(), progress_line(&ev)) {
                let _ = tx.send(OutputLine::Stderr(line));
            }
        }
    });

    let result = engine
        .run(RunRequest::Analyze { file }, evt_tx, CancelHandle::default())
        .await;
    // The engine dropped its sender; wait for the relay to drain.
    let _ = relay.await;
    result.context("analysis failed")
}

async fn export_requested(
    args: &Cli,
    report: &std::sync::Arc<crate::report::ReportModel>,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    if args.exports.is_empty() {
        return Ok(());
    }
    let exporter = build_exporter(args);
    let done = process_report(&exporter, report, &args.exports).await;
    for msg in done.export_messages {
        let _ = out_tx.send(OutputLine::Stderr(msg));
    }
    if done.failures > 0 {
        bail!("{} export(s) failed", done.failures);
    }
    Ok(())
}

async fn run_json(args: Cli) -> Result<()> {
    let (out_tx, out_handle) = spawn_output_writer();
    let outcome = json_mode(&args, &out_tx).await;
    drop(out_tx);
    let _ = out_handle.await;
    outcome
}

async fn json_mode(args: &Cli, out_tx: &mpsc::UnboundedSender<OutputLine>) -> Result<()> {
    let report = analyze(args, None).await?;
    let out = crate::export::render_json(&report)?;
    let _ = out_tx.send(OutputLine::Stdout(out.trim_end().to_string()));
    export_requested(args, &report, out_tx).await
}

async fn run_text(args: Cli) -> Result<()> {
    let (out_tx, out_handle) = spawn_output_writer();
    let outcome = text_mode(&args, &out_tx).await;
    drop(out_tx);
    let _ = out_handle.await;
    outcome
}

async fn text_mode(args: &Cli, out_tx: &mpsc::UnboundedSender<OutputLine>) -> Result<()> {
    let report = analyze(args, Some(out_tx.clone())).await?;
    let summary = crate::text_summary::build_text_summary(&report, args.width);
    for line in summary.lines {
        let _ = out_tx.send(OutputLine::Stdout(line));
    }
    export_requested(args, &report, out_tx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Job, JobStatus};

    #[test]
    fn defaults_match_backend_contract() {
        let args = Cli::parse_from(["majin-analyzer", "data.csv"]);
        let cfg = build_config(&args);
        assert_eq!(cfg.base_url, "http://127.0.0.1:3000");
        assert_eq!(cfg.upload_content_type, "text/csv");
        assert_eq!(cfg.poll_interval, Duration::from_secs(3));
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
        assert_eq!(args.layout, LayoutMode::Stacked);
        assert_eq!(args.file.as_deref(), Some(std::path::Path::new("data.csv")));
    }

    #[test]
    fn exports_are_repeatable() {
        let args = Cli::parse_from([
            "majin-analyzer",
            "--export",
            "pdf",
            "--export",
            "json",
            "--poll-interval",
            "500ms",
            "--text",
            "d.csv",
        ]);
        assert_eq!(args.exports, [ExportKind::Pdf, ExportKind::Json]);
        assert_eq!(build_config(&args).poll_interval, Duration::from_millis(500));
        assert!(!args.is_interactive());
    }

    #[test]
    fn text_and_json_conflict() {
        assert!(Cli::try_parse_from(["majin-analyzer", "--text", "--json"]).is_err());
    }

    #[test]
    fn non_interactive_modes_need_a_file() {
        let args = Cli::parse_from(["majin-analyzer", "--json"]);
        assert!(required_file(&args).is_err());
    }

    #[test]
    fn progress_lines_describe_the_job() {
        let ev = SessionEvent::Submitted {
            job: Job::pending("j1"),
        };
        assert_eq!(progress_line(&ev).as_deref(), Some("Job j1 submitted"));
        let ev = SessionEvent::StatusChanged {
            job_id: "j1".into(),
            status: JobStatus::Processing,
        };
        assert_eq!(progress_line(&ev).as_deref(), Some("Job j1: PROCESSING"));
    }
}
