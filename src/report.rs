//! Normalized analysis result.
//!
//! `ReportDocument` is the typed view of the backend payload (unknown keys
//! are kept in `extra`), `ReportModel` is the validated, read-only wrapper the
//! rest of the crate works with. The model also keeps the payload exactly as
//! parsed, so the raw dump reproduces key order and number formatting.

use crate::error::{FetchError, MalformedReason, MalformedResultError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// Category label -> value, in display order.
pub type SeriesData = IndexMap<String, f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
    Doughnut,
}

impl ChartKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Pie => "pie",
            ChartKind::Doughnut => "doughnut",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: ChartKind,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_rows: u64,
    #[serde(default)]
    pub metrics_summary: IndexMap<String, f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisPlan {
    #[serde(default)]
    pub column_mapping: IndexMap<String, ColumnInfo>,
    #[serde(default)]
    pub chart_specs: Vec<ChartSpec>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Wire shape of a completed analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub summary: Summary,
    #[serde(rename = "analysisPlan")]
    pub analysis_plan: AnalysisPlan,
    #[serde(default)]
    pub charts: IndexMap<String, SeriesData>,
    #[serde(default)]
    pub micro_insights: IndexMap<String, String>,
    #[serde(default)]
    pub ai_report: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Validated, immutable report. Construct with [`ReportModel::from_json`] or
/// `TryFrom<ReportDocument>`. Serializes as the payload it was parsed from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ReportModel {
    #[serde(skip)]
    doc: ReportDocument,
    raw: Value,
}

/// One chart with its data resolved; only produced for validated reports.
#[derive(Debug, Clone, Copy)]
pub struct ChartEntry<'a> {
    pub spec: &'a ChartSpec,
    pub data: &'a SeriesData,
    pub insight: Option<&'a str>,
}

impl TryFrom<ReportDocument> for ReportModel {
    type Error = MalformedResultError;

    fn try_from(doc: ReportDocument) -> Result<Self, Self::Error> {
        // Every map in the document is string-keyed, so this cannot fail.
        let raw = serde_json::to_value(&doc).unwrap_or_default();
        Self::validated(doc, raw)
    }
}

impl ReportModel {
    fn validated(doc: ReportDocument, raw: Value) -> Result<Self, MalformedResultError> {
        let mut seen = HashSet::new();
        for spec in &doc.analysis_plan.chart_specs {
            if !seen.insert(spec.id.as_str()) {
                return Err(MalformedResultError {
                    chart_id: spec.id.clone(),
                    reason: MalformedReason::DuplicateChartId,
                });
            }
            if !doc.charts.contains_key(&spec.id) {
                return Err(MalformedResultError {
                    chart_id: spec.id.clone(),
                    reason: MalformedReason::MissingChartData,
                });
            }
        }
        Ok(Self { doc, raw })
    }
}

/// Parse outcome that keeps payload and invariant failures apart.
#[derive(Debug)]
pub enum ParseReportError {
    Payload(FetchError),
    Malformed(MalformedResultError),
}

impl ReportModel {
    pub fn from_json(bytes: &[u8]) -> Result<Self, ParseReportError> {
        let payload = |e| ParseReportError::Payload(FetchError::Parse(e));
        let raw: Value = serde_json::from_slice(bytes).map_err(payload)?;
        let doc = ReportDocument::deserialize(&raw).map_err(payload)?;
        Self::validated(doc, raw).map_err(ParseReportError::Malformed)
    }

    pub fn document(&self) -> &ReportDocument {
        &self.doc
    }

    /// The payload as parsed: original key order, integers left as integers.
    pub fn payload(&self) -> &Value {
        &self.raw
    }

    /// Job id recorded by the backend in the payload, if any.
    pub fn job_id(&self) -> Option<&str> {
        self.doc.extra.get("jobId").and_then(Value::as_str)
    }

    /// Backend processing timestamp, as sent.
    pub fn processed_at(&self) -> Option<&str> {
        self.doc.extra.get("processedAt").and_then(Value::as_str)
    }

    pub fn total_rows(&self) -> u64 {
        self.doc.summary.total_rows
    }

    /// Metrics in payload order as `(key, value)`.
    pub fn metrics(&self) -> impl Iterator<Item = (&str, f64)> {
        self.doc
            .summary
            .metrics_summary
            .iter()
            .map(|(k, v)| (k.as_str(), *v))
    }

    /// Human label for a metric key; missing or empty labels fall back to the key.
    pub fn metric_label<'a>(&'a self, key: &'a str) -> &'a str {
        self.doc
            .analysis_plan
            .column_mapping
            .get(key)
            .and_then(|c| c.label.as_deref())
            .filter(|l| !l.is_empty())
            .unwrap_or(key)
    }

    pub fn chart_specs(&self) -> &[ChartSpec] {
        &self.doc.analysis_plan.chart_specs
    }

    pub fn chart_data(&self, chart_id: &str) -> Option<&SeriesData> {
        self.doc.charts.get(chart_id)
    }

    pub fn insight(&self, chart_id: &str) -> Option<&str> {
        self.doc
            .micro_insights
            .get(chart_id)
            .map(String::as_str)
            .filter(|s| !s.trim().is_empty())
    }

    /// Charts in spec order with their data attached.
    pub fn charts(&self) -> impl Iterator<Item = ChartEntry<'_>> {
        self.doc.analysis_plan.chart_specs.iter().filter_map(|spec| {
            // Presence is checked at construction; filter_map only satisfies the types.
            self.doc.charts.get(&spec.id).map(|data| ChartEntry {
                spec,
                data,
                insight: self.insight(&spec.id),
            })
        })
    }

    pub fn ai_report(&self) -> &str {
        &self.doc.ai_report
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Payload shaped like the backend output, with fields this crate never reads.
    pub const SAMPLE_REPORT: &str = r##"{
  "jobId": "job-42",
  "summary": {
    "total_rows": 12840,
    "metrics_summary": { "sales": 152000000.0, "qty": 25000.0, "cycle_time": 12.5 }
  },
  "charts": {
    "g1": { "Tokyo": 1200.0, "Osaka": 800.0, "Nagoya": 450.0 },
    "g2": { "2024-01": 10.0, "2024-02": 14.5, "2024-03": 9.0 },
    "g3": { "A": 5.0, "B": 3.0, "C": 1.0 }
  },
  "ai_report": "# Summary\n\nSales are **up**.\n\n- point one\n- point two",
  "micro_insights": { "g1": "Tokyo leads." },
  "analysisPlan": {
    "column_mapping": {
      "sales": { "role": "metric", "label": "Sales" },
      "qty": { "role": "metric", "label": "" }
    },
    "chart_specs": [
      { "id": "g1", "title": "Sales by city", "type": "bar", "dimension": "city", "metric": "sales", "aggregation": "sum", "limit": 10 },
      { "id": "g2", "title": "Monthly trend", "type": "line", "dimension": "month", "metric": "sales" },
      { "id": "g3", "title": "Share", "type": "doughnut", "dimension": "grade", "metric": "qty" }
    ]
  },
  "processedAt": "2024-05-01T00:00:00"
}"##;
}
