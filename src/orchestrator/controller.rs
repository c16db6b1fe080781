//! Session lifecycle controller.
//!
//! Owns the single active analysis run and forwards its events, tagged with
//! the session they belong to, to presentation layers.

use crate::engine::{AnalysisBackend, AnalysisEngine, CancelHandle, RunRequest};
use crate::model::{SessionConfig, SessionEvent, SessionFailure, SessionId, SessionMessage};
use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Commands emitted by UI layers to control the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    /// Discard the current session and analyze a new file.
    NewAnalysis(PathBuf),
    /// Re-run only the fetch step after a fetch failure.
    RetryFetch,
    Quit,
}

/// Internal handle for a running analysis task.
struct RunCtx {
    session: SessionId,
    cancel: CancelHandle,
    events: UnboundedReceiver<SessionEvent>,
    handle: JoinHandle<()>,
}

impl RunCtx {
    /// Stop the run and drop its event channel. Consumes the context; the
    /// shared [`CancelHandle`] it flips is idempotent, so the engine may see
    /// the flag already set.
    fn cancel(self) {
        self.cancel.cancel();
        self.handle.abort();
        debug!(session = self.session, "run cancelled");
        // `events` is dropped here; anything still queued never reaches the UI.
    }
}

fn start_run<B>(
    backend: &B,
    cfg: &SessionConfig,
    session: SessionId,
    request: RunRequest,
) -> RunCtx
where
    B: AnalysisBackend + Clone + 'static,
{
    let (run_tx, events) = mpsc::unbounded_channel::<SessionEvent>();
    let cancel = CancelHandle::default();
    let engine = AnalysisEngine::new(backend.clone(), cfg.clone());
    let run_cancel = cancel.clone();

    let handle = tokio::spawn(async move {
        if let RunRequest::Analyze { file } = &request {
            let _ = run_tx.send(SessionEvent::Started { file: file.clone() });
        }
        let terminal = match engine.run(request, run_tx.clone(), run_cancel).await {
            Ok(report) => SessionEvent::ReportReady { report },
            Err(e) => {
                error!(session, error = %e, "analysis failed");
                SessionEvent::Failed(SessionFailure::from(&e))
            }
        };
        let _ = run_tx.send(terminal);
    });

    RunCtx {
        session,
        cancel,
        events,
        handle,
    }
}

/// Orchestrate analysis runs based on UI commands and emit tagged events back
/// to presentation layers. Returns when the UI quits or hangs up.
pub async fn run_controller<B>(
    backend: B,
    cfg: SessionConfig,
    initial: Option<PathBuf>,
    out_tx: UnboundedSender<SessionMessage>,
    mut cmd_rx: UnboundedReceiver<SessionCommand>,
) -> Result<()>
where
    B: AnalysisBackend + Clone + 'static,
{
    let mut session: SessionId = 0;
    let mut run_ctx: Option<RunCtx> = None;
    // Location of the last failed fetch in the current session.
    let mut retry_location: Option<String> = None;

    let emit = |session: SessionId, event: SessionEvent| {
        let _ = out_tx.send(SessionMessage { session, event });
    };

    if let Some(file) = initial {
        session += 1;
        info!(session, file = %file.display(), "starting analysis");
        run_ctx = Some(start_run(&backend, &cfg, session, RunRequest::Analyze { file }));
    }

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCommand::NewAnalysis(file)) => {
                        // Reset is serialized: the old run is cancelled and its channel
                        // dropped before the new session id is handed out.
                        if let Some(ctx) = run_ctx.take() {
                            ctx.cancel();
                        }
                        retry_location = None;
                        session += 1;
                        info!(session, file = %file.display(), "starting analysis");
                        run_ctx = Some(start_run(&backend, &cfg, session, RunRequest::Analyze { file }));
                    }
                    Some(SessionCommand::RetryFetch) => {
                        if run_ctx.is_some() {
                            emit(session, SessionEvent::Info("Analysis still running".into()));
                        } else if let Some(location) = retry_location.take() {
                            info!(session, %location, "retrying result fetch");
                            run_ctx = Some(start_run(&backend, &cfg, session, RunRequest::Fetch { location }));
                        } else {
                            emit(session, SessionEvent::Info("Nothing to retry".into()));
                        }
                    }
                    Some(SessionCommand::Quit) | None => {
                        if let Some(ctx) = run_ctx.take() {
                            ctx.cancel();
                        }
                        break;
                    }
                }
            }
            maybe_event = async {
                match run_ctx.as_mut() {
                    Some(ctx) => ctx.events.recv().await,
                    None => futures::future::pending().await,
                }
            } => {
                match maybe_event {
                    Some(event) => {
                        let terminal = matches!(
                            event,
                            SessionEvent::ReportReady { .. } | SessionEvent::Failed(_)
                        );
                        if let SessionEvent::Failed(failure) = &event {
                            retry_location = failure.retry_location.clone();
                        }
                        emit(session, event);
                        // The terminal event is the run's last word.
                        if terminal {
                            run_ctx = None;
                        }
                    }
                    // Sender side is gone: the run task finished.
                    None => run_ctx = None,
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{Scripted, ScriptedBackend};
    use crate::model::{FailureKind, JobStatus};
    use crate::report::fixtures::SAMPLE_REPORT;
    use std::io::Write;
    use std::sync::Arc;
    use std::time::Duration;

    fn dataset() -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "a,b\n1,2").unwrap();
        f
    }

    async fn next_terminal(rx: &mut UnboundedReceiver<SessionMessage>) -> SessionMessage {
        loop {
            let msg = rx.recv().await.expect("controller hung up");
            if matches!(
                msg.event,
                SessionEvent::ReportReady { .. } | SessionEvent::Failed(_)
            ) {
                return msg;
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn initial_file_runs_to_report() {
        let backend = Arc::new(ScriptedBackend {
            result: Some(SAMPLE_REPORT.into()),
            ..ScriptedBackend::with_statuses(vec![Scripted::Status(
                JobStatus::Completed,
                Some("https://r/job-1.json"),
            )])
        });
        let file = dataset();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let ctrl = tokio::spawn(run_controller(
            backend,
            SessionConfig::default(),
            Some(file.path().to_path_buf()),
            out_tx,
            cmd_rx,
        ));

        let first = out_rx.recv().await.unwrap();
        assert_eq!(first.session, 1);
        assert!(matches!(first.event, SessionEvent::Started { .. }));

        let done = next_terminal(&mut out_rx).await;
        assert_eq!(done.session, 1);
        assert!(matches!(done.event, SessionEvent::ReportReady { .. }));

        cmd_tx.send(SessionCommand::Quit).unwrap();
        ctrl.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn new_analysis_supersedes_running_session() {
        // The first job never completes; the second one does.
        let backend = Arc::new(ScriptedBackend {
            result: Some(SAMPLE_REPORT.into()),
            ..Default::default()
        });
        let file = dataset();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let ctrl = tokio::spawn(run_controller(
            backend.clone(),
            SessionConfig::default(),
            Some(file.path().to_path_buf()),
            out_tx,
            cmd_rx,
        ));

        tokio::time::sleep(Duration::from_secs(10)).await;
        backend.statuses.lock().unwrap().push_back(Scripted::Status(
            JobStatus::Completed,
            Some("https://r/job-1.json"),
        ));
        cmd_tx
            .send(SessionCommand::NewAnalysis(file.path().to_path_buf()))
            .unwrap();

        let done = next_terminal(&mut out_rx).await;
        assert_eq!(done.session, 2);
        assert!(matches!(done.event, SessionEvent::ReportReady { .. }));

        cmd_tx.send(SessionCommand::Quit).unwrap();
        ctrl.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn retry_fetch_reuses_location() {
        let backend = Arc::new(ScriptedBackend::with_statuses(vec![Scripted::Status(
            JobStatus::Completed,
            Some("https://r/job-1.json"),
        )]));
        let file = dataset();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let ctrl = tokio::spawn(run_controller(
            backend.clone(),
            SessionConfig::default(),
            Some(file.path().to_path_buf()),
            out_tx,
            cmd_rx,
        ));

        let failed = next_terminal(&mut out_rx).await;
        match &failed.event {
            SessionEvent::Failed(f) => {
                assert_eq!(f.kind, FailureKind::Fetch);
                assert_eq!(f.retry_location.as_deref(), Some("https://r/job-1.json"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(backend.fetch_calls(), 1);

        cmd_tx.send(SessionCommand::RetryFetch).unwrap();
        // Still failing: the scripted backend has no result body.
        let again = next_terminal(&mut out_rx).await;
        assert_eq!(again.session, 1);
        assert_eq!(backend.fetch_calls(), 2);
        assert_eq!(backend.status_calls(), 1);

        cmd_tx.send(SessionCommand::Quit).unwrap();
        ctrl.await.unwrap().unwrap();
    }
}
