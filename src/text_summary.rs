//! Text summary builder for CLI output.
//!
//! Flattens a report into plain lines for text mode: header, metrics, one
//! block per chart and the AI report with its markdown styling removed.

use crate::chart;
use crate::format::{format_compact, format_grouped, report_date};
use crate::report::ReportModel;
use crate::view::text::{display_width, markdown_lines, truncate, wrap};

/// Categories listed per chart before the rest are summarized.
const MAX_CATEGORIES: usize = 10;
const LABEL_COLUMNS: usize = 24;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

pub(crate) fn build_text_summary(report: &ReportModel, width: u16) -> TextSummary {
    let mut lines = Vec::new();

    lines.push(format!(
        "MAJIN STRATEGIC REPORT  ID: {}  DATE: {}",
        report.job_id().unwrap_or("-"),
        report_date(report.processed_at())
    ));
    lines.push(String::new());
    lines.push(format!("Rows: {}", format_grouped(report.total_rows() as f64)));
    for (key, value) in report.metrics() {
        lines.push(format!(
            "{}: ¥{}",
            report.metric_label(key),
            format_compact(Some(value))
        ));
    }

    for entry in report.charts() {
        let spec = chart::resolve(entry.spec, entry.data);
        lines.push(String::new());
        lines.push(format!("[{}] {}", spec.kind.as_str(), spec.title));
        let total = spec.total();
        let radial = !spec.has_axes();
        let rows = spec.labels.iter().zip(&spec.value_labels).zip(&spec.values);
        for ((label, value_text), value) in rows.take(MAX_CATEGORIES) {
            let label = truncate(label, LABEL_COLUMNS);
            let pad = LABEL_COLUMNS.saturating_sub(display_width(&label));
            let mut row = format!("  {label}{}  {value_text}", " ".repeat(pad));
            if radial && total > 0.0 && value.is_finite() {
                row.push_str(&format!(" ({:.1}%)", value / total * 100.0));
            }
            lines.push(row);
        }
        if spec.labels.len() > MAX_CATEGORIES {
            lines.push(format!("  +{} more", spec.labels.len() - MAX_CATEGORIES));
        }
        if let Some(insight) = entry.insight {
            for line in wrap(&markdown_lines(insight), width.saturating_sub(4)) {
                lines.push(format!("  » {}", plain(&line)));
            }
        }
    }

    if !report.ai_report().trim().is_empty() {
        lines.push(String::new());
        lines.push("AI STRATEGIC INSIGHT REPORT".to_string());
        lines.push(String::new());
        for line in wrap(&markdown_lines(report.ai_report()), width) {
            lines.push(plain(&line));
        }
    }

    TextSummary { lines }
}

fn plain(line: &ratatui::text::Line<'_>) -> String {
    line.spans.iter().map(|s| s.content.as_ref()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::SAMPLE_REPORT;

    #[test]
    fn summary_lists_metrics_charts_and_report() {
        let report = ReportModel::from_json(SAMPLE_REPORT.as_bytes()).unwrap();
        let summary = build_text_summary(&report, 80);
        let text = summary.lines.join("\n");

        assert!(text.starts_with("MAJIN STRATEGIC REPORT  ID: job-42  DATE: 2024-05-01"));
        assert!(text.contains("Rows: 12,840"));
        assert!(text.contains("Sales: ¥1.5億"));
        assert!(text.contains("qty: ¥3万"));
        assert!(text.contains("[bar] Sales by city"));
        assert!(text.contains("  » Tokyo leads."));
        assert!(text.contains("[doughnut] Share"));
        assert!(text.contains("(55.6%)"));
        assert!(text.contains("• point one"));
    }
}
