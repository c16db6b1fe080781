use crate::export::{ExportKind, MultiFormatExporter};
use crate::report::ReportModel;
use crate::view::LayoutMode;
use anyhow::Result;
use std::path::PathBuf;
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

// Global clipboard manager channel - initialized once on first use
static CLIPBOARD_SENDER: OnceLock<std_mpsc::Sender<String>> = OnceLock::new();

/// Export requested from the UI thread.
pub struct ExportRequest {
    pub report: Arc<ReportModel>,
    pub kind: ExportKind,
    pub width: u16,
    pub layout: LayoutMode,
}

/// Result of one export, sent back to the UI thread.
pub struct ExportDone {
    pub kind: ExportKind,
    pub result: Result<PathBuf, String>,
}

/// Serve export requests until the UI hangs up. Each request runs as its own
/// task so a slow PDF capture does not hold up HTML or JSON exports; a second
/// PDF while one is capturing is refused by the exporter.
pub async fn run_export_worker(
    exporter: MultiFormatExporter,
    mut req_rx: UnboundedReceiver<ExportRequest>,
    done_tx: UnboundedSender<ExportDone>,
) {
    let exporter = Arc::new(exporter);
    while let Some(req) = req_rx.recv().await {
        let exporter = Arc::clone(&exporter);
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            let result = exporter
                .export_with(&req.report, req.kind, req.width, req.layout)
                .await
                .map_err(|e| e.to_string());
            let _ = done_tx.send(ExportDone {
                kind: req.kind,
                result,
            });
        });
    }
}

/// Initialize the clipboard manager thread if not already initialized.
/// Each copy gets a fresh clipboard instance that stays alive long enough for
/// clipboard managers on Linux to read it.
fn init_clipboard_manager() -> Result<&'static std_mpsc::Sender<String>> {
    CLIPBOARD_SENDER.get_or_init(|| {
        let (tx, rx) = std_mpsc::channel::<String>();

        std::thread::spawn(move || {
            for text in rx {
                if let Ok(mut clipboard) = arboard::Clipboard::new() {
                    if clipboard.set_text(&text).is_ok() {
                        std::thread::sleep(Duration::from_secs(2));
                    }
                }
            }
        });

        tx
    });

    CLIPBOARD_SENDER
        .get()
        .ok_or_else(|| anyhow::anyhow!("Failed to initialize clipboard manager"))
}

/// Queue `text` for the clipboard without blocking the UI thread.
pub fn copy_to_clipboard(text: &str) -> Result<()> {
    let sender = init_clipboard_manager()?;
    sender
        .send(text.to_string())
        .map_err(|_| anyhow::anyhow!("Clipboard manager channel closed"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::SAMPLE_REPORT;

    #[tokio::test]
    async fn worker_reports_each_export() {
        let dir = tempfile::tempdir().unwrap();
        let exporter = MultiFormatExporter::new(dir.path(), 80, LayoutMode::Stacked);
        let (req_tx, req_rx) = tokio::sync::mpsc::unbounded_channel();
        let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();
        let worker = tokio::spawn(run_export_worker(exporter, req_rx, done_tx));

        let report = Arc::new(ReportModel::from_json(SAMPLE_REPORT.as_bytes()).unwrap());
        for kind in [ExportKind::Json, ExportKind::Html] {
            req_tx
                .send(ExportRequest {
                    report: Arc::clone(&report),
                    kind,
                    width: 80,
                    layout: LayoutMode::Grid,
                })
                .ok()
                .unwrap();
        }
        drop(req_tx);

        let mut kinds = Vec::new();
        for _ in 0..2 {
            let done = done_rx.recv().await.unwrap();
            assert!(done.result.unwrap().exists());
            kinds.push(done.kind);
        }
        kinds.sort_by_key(|k| k.extension());
        assert_eq!(kinds, [ExportKind::Html, ExportKind::Json]);
        worker.await.unwrap();
    }
}
