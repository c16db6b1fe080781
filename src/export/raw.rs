use crate::error::ExportError;
use crate::report::ReportModel;

/// The fetched payload pretty-printed with two-space indentation. Keys keep
/// payload order and numbers keep their written form.
pub fn render_json(report: &ReportModel) -> Result<String, ExportError> {
    let mut out = serde_json::to_string_pretty(report.payload())?;
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::fixtures::SAMPLE_REPORT;

    #[test]
    fn dump_reparses_to_the_same_model() {
        let report = ReportModel::from_json(SAMPLE_REPORT.as_bytes()).unwrap();
        let dumped = render_json(&report).unwrap();
        let again = ReportModel::from_json(dumped.as_bytes()).unwrap();
        assert_eq!(again, report);
    }

    #[test]
    fn dump_keeps_key_order_and_unknown_fields() {
        let report = ReportModel::from_json(SAMPLE_REPORT.as_bytes()).unwrap();
        let dumped = render_json(&report).unwrap();
        let tokyo = dumped.find("\"Tokyo\"").unwrap();
        let osaka = dumped.find("\"Osaka\"").unwrap();
        assert!(tokyo < osaka);
        assert!(dumped.contains("\"aggregation\": \"sum\""));
        assert!(dumped.contains("\n  \"summary\": {"));
    }

    #[test]
    fn pretty_payload_is_reproduced_verbatim() {
        let payload = r#"{
  "jobId": "job-7",
  "summary": {
    "total_rows": 3,
    "metrics_summary": {
      "sales": 1200,
      "margin": 0.25
    }
  },
  "analysisPlan": {
    "column_mapping": {
      "sales": {
        "role": "metric",
        "label": "Sales"
      }
    },
    "chart_specs": [
      {
        "dimension": "city",
        "id": "g1",
        "title": "Sales by city",
        "type": "bar"
      }
    ]
  },
  "charts": {
    "g1": {
      "Tokyo": 12,
      "Osaka": 7.5
    }
  },
  "ai_report": "",
  "processedAt": "2024-05-01T00:00:00"
}
"#;
        let report = ReportModel::from_json(payload.as_bytes()).unwrap();
        assert_eq!(report.chart_data("g1").unwrap()["Tokyo"], 12.0);
        assert_eq!(render_json(&report).unwrap(), payload);
    }
}
