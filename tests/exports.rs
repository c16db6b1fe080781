use majin_analyzer::export::{file_name, render_html, render_json, ExportKind, MultiFormatExporter, A4_PORTRAIT};
use majin_analyzer::orchestrator::process_report;
use majin_analyzer::report::ReportModel;
use majin_analyzer::view::{self, raster, LayoutMode};
use std::sync::Arc;

const SAMPLE_REPORT: &str = include_str!("fixtures/sample_report.json");

fn sample() -> Arc<ReportModel> {
    Arc::new(ReportModel::from_json(SAMPLE_REPORT.as_bytes()).unwrap())
}

#[tokio::test]
async fn pdf_pages_cover_the_whole_capture() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = MultiFormatExporter::new(dir.path(), 60, LayoutMode::Stacked);
    let report = sample();

    let path = exporter.export_pdf(&report).await.unwrap();
    assert_eq!(path, dir.path().join("Majin_Analysis_job-42.pdf"));
    let bytes = std::fs::read(&path).unwrap();
    assert!(bytes.starts_with(b"%PDF"));

    let rows = u32::from(view::report_height(&report, 60, LayoutMode::Stacked));
    let px_w = 60 * raster::CELL_WIDTH * raster::CAPTURE_SCALE;
    let px_h = rows * raster::CELL_HEIGHT * raster::CAPTURE_SCALE;
    let expected = A4_PORTRAIT.page_count(A4_PORTRAIT.image_height_mm(px_w, px_h));

    let doc = lopdf::Document::load_mem(&bytes).unwrap();
    assert_eq!(doc.get_pages().len(), expected);
    assert!(expected > 1, "the sample report should span several pages at 60 columns");
}

#[tokio::test]
async fn html_is_self_contained_and_names_every_chart() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = MultiFormatExporter::new(dir.path(), 80, LayoutMode::Grid);
    let report = sample();

    let path = exporter.export_html(&report).await.unwrap();
    let html = std::fs::read_to_string(path).unwrap();
    assert_eq!(html, render_html(&report));
    for spec in report.chart_specs() {
        assert!(html.contains(&spec.title), "missing chart {}", spec.title);
    }
    assert!(html.contains("Tokyo leads."));
    assert!(html.contains("<strong>up</strong>"));
}

#[tokio::test]
async fn json_export_reparses_to_the_same_report() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = MultiFormatExporter::new(dir.path(), 80, LayoutMode::Stacked);
    let report = sample();

    let path = exporter.export_json(&report).await.unwrap();
    let written = std::fs::read(&path).unwrap();
    assert_eq!(written, render_json(&report).unwrap().into_bytes());
    let reparsed = ReportModel::from_json(&written).unwrap();
    assert_eq!(&reparsed, report.as_ref());
}

#[tokio::test]
async fn post_processing_exports_each_kind_once() {
    let dir = tempfile::tempdir().unwrap();
    let exporter = MultiFormatExporter::new(dir.path(), 80, LayoutMode::Stacked);
    let report = sample();

    let done = process_report(
        &exporter,
        &report,
        &[ExportKind::Json, ExportKind::Html, ExportKind::Json],
    )
    .await;
    assert_eq!(done.failures, 0);
    assert_eq!(done.exported.len(), 2);
    for kind in [ExportKind::Json, ExportKind::Html] {
        assert!(dir.path().join(file_name(&report, kind)).exists());
    }
}
