//! Report exports: paginated PDF capture, standalone HTML and raw JSON.
//!
//! All three read the same immutable [`ReportModel`]. Files land in the
//! configured output directory as `Majin_Analysis_<jobId>.<ext>`.

mod paginated;
mod raw;
mod standalone;

pub use paginated::{encode_jpeg, render_pdf, PageGeometry, A4_PORTRAIT, JPEG_QUALITY};
pub use raw::render_json;
pub use standalone::render_html;

use crate::error::ExportError;
use crate::report::ReportModel;
use crate::view::{self, raster, LayoutMode};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ExportKind {
    Pdf,
    Html,
    Json,
}

impl ExportKind {
    pub fn extension(self) -> &'static str {
        match self {
            ExportKind::Pdf => "pdf",
            ExportKind::Html => "html",
            ExportKind::Json => "json",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ExportKind::Pdf => "PDF",
            ExportKind::Html => "HTML",
            ExportKind::Json => "JSON",
        }
    }
}

pub fn file_name(report: &ReportModel, kind: ExportKind) -> String {
    let id = report
        .job_id()
        .map(sanitize_file_part)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "report".to_string());
    format!("Majin_Analysis_{id}.{}", kind.extension())
}

/// Keep job ids from escaping the output directory.
fn sanitize_file_part(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

/// Writes exports of a report into one directory.
#[derive(Debug)]
pub struct MultiFormatExporter {
    output_dir: PathBuf,
    width: u16,
    layout: LayoutMode,
    capturing: AtomicBool,
}

/// Held while a capture runs; releases the busy flag on drop, error paths
/// included.
struct CaptureGuard<'a>(&'a AtomicBool);

impl<'a> CaptureGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, ExportError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ExportError::CaptureBusy)?;
        Ok(Self(flag))
    }
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl MultiFormatExporter {
    /// `width` is the column count the report is rendered at for capture.
    pub fn new(output_dir: impl Into<PathBuf>, width: u16, layout: LayoutMode) -> Self {
        Self {
            output_dir: output_dir.into(),
            width: width.max(view::MIN_WIDTH),
            layout,
            capturing: AtomicBool::new(false),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn path_for(&self, report: &ReportModel, kind: ExportKind) -> PathBuf {
        self.output_dir.join(file_name(report, kind))
    }

    /// Export `report` as `kind` with the configured render settings;
    /// returns the written path.
    pub async fn export(
        &self,
        report: &Arc<ReportModel>,
        kind: ExportKind,
    ) -> Result<PathBuf, ExportError> {
        self.export_with(report, kind, self.width, self.layout).await
    }

    /// Like [`export`](Self::export), capturing at `width` columns in `layout`.
    pub async fn export_with(
        &self,
        report: &Arc<ReportModel>,
        kind: ExportKind,
        width: u16,
        layout: LayoutMode,
    ) -> Result<PathBuf, ExportError> {
        let bytes = match kind {
            ExportKind::Pdf => self.capture_pdf(report, width, layout).await?,
            ExportKind::Html => render_html(report).into_bytes(),
            ExportKind::Json => render_json(report)?.into_bytes(),
        };
        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.path_for(report, kind);
        tokio::fs::write(&path, &bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "exported {}", kind.label());
        Ok(path)
    }

    pub async fn export_pdf(&self, report: &Arc<ReportModel>) -> Result<PathBuf, ExportError> {
        self.export(report, ExportKind::Pdf).await
    }

    pub async fn export_html(&self, report: &Arc<ReportModel>) -> Result<PathBuf, ExportError> {
        self.export(report, ExportKind::Html).await
    }

    pub async fn export_json(&self, report: &Arc<ReportModel>) -> Result<PathBuf, ExportError> {
        self.export(report, ExportKind::Json).await
    }

    /// Render, rasterize and paginate off the async thread.
    async fn capture_pdf(
        &self,
        report: &Arc<ReportModel>,
        width: u16,
        layout: LayoutMode,
    ) -> Result<Vec<u8>, ExportError> {
        let _guard = CaptureGuard::acquire(&self.capturing)?;
        let report = Arc::clone(report);
        let width = width.max(view::MIN_WIDTH);
        tokio::task::spawn_blocking(move || capture_pdf_blocking(&report, width, layout))
            .await
            .map_err(|e| ExportError::Io(std::io::Error::other(e)))?
    }
}

pub fn capture_pdf_blocking(
    report: &ReportModel,
    width: u16,
    layout: LayoutMode,
) -> Result<Vec<u8>, ExportError> {
    let buf = view::render_report(report, width, layout);
    if buf.area.is_empty() {
        return Err(ExportError::EmptyCapture);
    }
    let img = raster::rasterize(&buf, raster::CAPTURE_SCALE);
    debug!(
        width = img.width(),
        height = img.height(),
        "captured report image"
    );
    let jpeg = encode_jpeg(&img, JPEG_QUALITY)?;
    render_pdf(&jpeg, img.width(), img.height(), A4_PORTRAIT)
}
