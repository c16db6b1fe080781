//! Work done once a report is ready: the automatic exports requested on the
//! command line.

use crate::export::{ExportKind, MultiFormatExporter};
use crate::report::ReportModel;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

/// Outcome of post-report processing, ready for presentation layers.
#[derive(Debug, Default)]
pub struct ProcessedReport {
    pub exported: Vec<PathBuf>,
    pub export_messages: Vec<String>,
    pub failures: usize,
}

/// Run every requested export in order. A failed export is reported and the
/// remaining ones still run.
pub async fn process_report(
    exporter: &MultiFormatExporter,
    report: &Arc<ReportModel>,
    kinds: &[ExportKind],
) -> ProcessedReport {
    let mut out = ProcessedReport::default();
    let mut seen = Vec::with_capacity(kinds.len());
    for &kind in kinds {
        if seen.contains(&kind) {
            continue;
        }
        seen.push(kind);
        match exporter.export(report, kind).await {
            Ok(path) => {
                out.export_messages
                    .push(format!("Exported {}: {}", kind.label(), path.display()));
                out.exported.push(path);
            }
            Err(e) => {
                warn!(kind = kind.label(), error = %e, "export failed");
                out.export_messages
                    .push(format!("Export {} failed: {e}", kind.label()));
                out.failures += 1;
            }
        }
    }
    out
}
