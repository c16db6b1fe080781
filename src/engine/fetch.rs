use crate::engine::AnalysisBackend;
use crate::error::{FetchError, SessionError};
use crate::report::{ParseReportError, ReportModel};
use tracing::info;

/// Download and validate the result document at `location`.
pub async fn fetch_report<B: AnalysisBackend + ?Sized>(
    backend: &B,
    location: &str,
) -> Result<ReportModel, SessionError> {
    let failed = |source: FetchError| SessionError::Fetch {
        location: Some(location.to_string()),
        source,
    };

    let body = backend
        .fetch_result(location)
        .await
        .map_err(|e| failed(FetchError::Backend(e)))?;

    let report = ReportModel::from_json(&body).map_err(|e| match e {
        ParseReportError::Payload(source) => failed(source),
        ParseReportError::Malformed(err) => SessionError::Malformed(err),
    })?;

    info!(
        bytes = body.len(),
        charts = report.chart_specs().len(),
        rows = report.total_rows(),
        "report loaded"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::ScriptedBackend;
    use crate::error::MalformedReason;
    use crate::report::fixtures::SAMPLE_REPORT;

    const LOCATION: &str = "https://storage/results/job-1.json";

    #[tokio::test]
    async fn parses_valid_payload() {
        let backend = ScriptedBackend {
            result: Some(SAMPLE_REPORT.to_string()),
            ..Default::default()
        };
        let report = fetch_report(&backend, LOCATION).await.unwrap();
        assert_eq!(report.chart_specs().len(), 3);
        assert_eq!(backend.fetch_calls(), 1);
    }

    #[tokio::test]
    async fn transport_failure_keeps_location() {
        let backend = ScriptedBackend::default();
        let err = fetch_report(&backend, LOCATION).await.unwrap_err();
        match err {
            SessionError::Fetch {
                location,
                source: FetchError::Backend(_),
            } => assert_eq!(location.as_deref(), Some(LOCATION)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_is_a_parse_error() {
        let backend = ScriptedBackend {
            result: Some("<html>not json</html>".into()),
            ..Default::default()
        };
        let err = fetch_report(&backend, LOCATION).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Fetch {
                source: FetchError::Parse(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn missing_chart_data_is_malformed() {
        let body = SAMPLE_REPORT.replace(
            r#""g3": { "A": 5.0, "B": 3.0, "C": 1.0 }"#,
            r#""other": {}"#,
        );
        let backend = ScriptedBackend {
            result: Some(body),
            ..Default::default()
        };
        match fetch_report(&backend, LOCATION).await.unwrap_err() {
            SessionError::Malformed(e) => {
                assert_eq!(e.chart_id, "g3");
                assert_eq!(e.reason, MalformedReason::MissingChartData);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
