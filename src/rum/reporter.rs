//! Report fan-out
//!
//! One payload, one query string, one GET per collector. Collectors succeed
//! or fail independently; the summary says how many of each.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::RumError;
use super::prober::ProbeResult;
use super::stats::RumStats;
use super::transport::{Transport, TransportError, TransportRequest};

const MONITOR_ID: &str = "atm";
const REPORT_PROTOCOL: &str = "https";
const REPORT_VERSION: &str = "2017061301";

/// Aggregate result across all report endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportOutcome {
    AllSucceeded,
    AllFailed,
    Partial,
}

impl ReportOutcome {
    fn from_counts(succeeded: usize, failed: usize) -> Self {
        match (succeeded, failed) {
            (_, 0) => Self::AllSucceeded,
            (0, _) => Self::AllFailed,
            _ => Self::Partial,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub report_id: String,
    pub outcome: ReportOutcome,
    pub succeeded: usize,
    pub failed: usize,
    /// Probe entries carried in the payload
    pub entries: usize,
}

pub struct Reporter {
    transport: Arc<dyn Transport>,
    stats: Arc<RumStats>,
}

impl Reporter {
    pub fn new(transport: Arc<dyn Transport>, stats: Arc<RumStats>) -> Self {
        Self { transport, stats }
    }

    /// Send the successful results to every report endpoint, in list order
    pub async fn report(
        &self,
        results: &[ProbeResult],
        report_endpoint_ids: &[String],
        rum_key: &str,
        cancel: &CancellationToken,
    ) -> Result<ReportSummary, RumError> {
        if report_endpoint_ids.is_empty() {
            return Err(RumError::config("no report endpoints configured"));
        }

        let report_id = Uuid::new_v4().to_string();
        let entries = results.iter().filter(|r| r.succeeded()).count();
        let query = build_query(results, &report_id, rum_key)?;

        let mut succeeded = 0usize;
        let mut failed = 0usize;

        for endpoint in report_endpoint_ids {
            if cancel.is_cancelled() {
                return Err(RumError::Canceled);
            }

            let url = format!("http://{}{}", endpoint, query);
            match self.transport.send(TransportRequest::get(url), cancel).await {
                Ok(_) => {
                    succeeded += 1;
                    RumStats::incr(&self.stats.reports_succeeded);
                    debug!(endpoint = %endpoint, report_id = %report_id, "report delivered");
                }
                Err(TransportError::Canceled) => return Err(RumError::Canceled),
                Err(source) => {
                    failed += 1;
                    RumStats::incr(&self.stats.reports_failed);
                    let err = RumError::Report {
                        endpoint: endpoint.clone(),
                        source,
                    };
                    warn!("{}", err);
                }
            }
        }

        let summary = ReportSummary {
            outcome: ReportOutcome::from_counts(succeeded, failed),
            report_id,
            succeeded,
            failed,
            entries,
        };
        info!(
            outcome = ?summary.outcome,
            succeeded,
            failed,
            entries,
            "report fan-out finished"
        );

        Ok(summary)
    }
}

/// `?MonitorID=...&DATA=...` with the URL-escaped JSON array of successful probes
pub fn build_query(
    results: &[ProbeResult],
    report_id: &str,
    rum_key: &str,
) -> Result<String, RumError> {
    let payload: Vec<&ProbeResult> = results.iter().filter(|r| r.succeeded()).collect();
    let json = serde_json::to_string(&payload)
        .map_err(|e| RumError::config(format!("cannot serialize report payload: {}", e)))?;

    Ok(format!(
        "?MonitorID={}&rid={}&w3c=false&prot={}&v={}&tag={}&DATA={}",
        MONITOR_ID,
        report_id,
        REPORT_PROTOCOL,
        REPORT_VERSION,
        urlencoding::encode(rum_key),
        urlencoding::encode(&json)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rum::transport::testing::{Reply, ScriptedTransport};
    use crate::rum::url_builder::{ConnState, ProbeSpec};

    const KEY: &str = "0123456789abcdef0123456789abcdef";

    fn result(id: &str, elapsed: Option<u64>) -> ProbeResult {
        ProbeResult {
            spec: ProbeSpec {
                url: format!("http://{}.test/apc/trans.gif?x", id),
                request_id: id.to_string(),
                object_name: "trans.gif".into(),
                conn_state: ConnState::Warm,
            },
            elapsed_millis: elapsed,
        }
    }

    fn endpoints(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_one_failure_is_partial_and_others_still_called() {
        let transport = Arc::new(ScriptedTransport::new().rule("r2.test", Reply::Fail));
        let reporter = Reporter::new(transport.clone(), Arc::new(RumStats::new()));

        let summary = reporter
            .report(
                &[result("a", Some(12))],
                &endpoints(&["r1.test", "r2.test", "r3.test"]),
                KEY,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(summary.outcome, ReportOutcome::Partial);
        assert_eq!((summary.succeeded, summary.failed), (2, 1));

        let urls = transport.urls();
        assert_eq!(urls.len(), 3);
        assert!(urls[0].starts_with("http://r1.test?MonitorID=atm&rid="));
        assert!(urls[1].starts_with("http://r2.test?"));
        assert!(urls[2].starts_with("http://r3.test?"));
    }

    #[tokio::test]
    async fn test_all_and_none() {
        let ok = Reporter::new(Arc::new(ScriptedTransport::new()), Arc::new(RumStats::new()));
        let summary = ok
            .report(&[], &endpoints(&["r1.test", "r2.test"]), KEY, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.outcome, ReportOutcome::AllSucceeded);

        let down = Reporter::new(
            Arc::new(ScriptedTransport::new().rule(".test", Reply::Fail)),
            Arc::new(RumStats::new()),
        );
        let summary = down
            .report(&[], &endpoints(&["r1.test", "r2.test"]), KEY, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(summary.outcome, ReportOutcome::AllFailed);
        assert_eq!(summary.failed, 2);
    }

    #[tokio::test]
    async fn test_every_endpoint_gets_same_report() {
        let transport = Arc::new(ScriptedTransport::new());
        let reporter = Reporter::new(transport.clone(), Arc::new(RumStats::new()));
        reporter
            .report(
                &[result("a", Some(5))],
                &endpoints(&["r1.test/path", "r2.test"]),
                KEY,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let urls = transport.urls();
        let q1 = urls[0].split_once('?').unwrap().1;
        let q2 = urls[1].split_once('?').unwrap().1;
        assert_eq!(q1, q2);
        assert!(urls[0].starts_with("http://r1.test/path?"));
    }

    #[tokio::test]
    async fn test_cancel_skips_unstarted_calls() {
        let transport = Arc::new(ScriptedTransport::new().on_call(|index, _, cancel| {
            if index == 0 {
                cancel.cancel();
            }
        }));
        let reporter = Reporter::new(transport.clone(), Arc::new(RumStats::new()));

        let outcome = reporter
            .report(
                &[result("a", Some(1))],
                &endpoints(&["r1.test", "r2.test", "r3.test"]),
                KEY,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome, Err(RumError::Canceled));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_no_endpoints_is_config_error() {
        let transport = Arc::new(ScriptedTransport::new());
        let reporter = Reporter::new(transport.clone(), Arc::new(RumStats::new()));
        let outcome = reporter
            .report(&[result("a", Some(1))], &[], KEY, &CancellationToken::new())
            .await;

        assert!(matches!(outcome, Err(RumError::Config(_))));
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn test_query_layout() {
        let query = build_query(&[result("a", Some(42))], "rid-1", KEY).unwrap();
        let prefix = format!(
            "?MonitorID=atm&rid=rid-1&w3c=false&prot=https&v=2017061301&tag={}&DATA=",
            KEY
        );
        assert!(query.starts_with(&prefix), "{}", query);

        let data = &query[prefix.len()..];
        assert!(!data.contains('"') && !data.contains('{'));
        let decoded = urlencoding::decode(data).unwrap();
        let payload: serde_json::Value = serde_json::from_str(&decoded).unwrap();
        assert_eq!(
            payload,
            serde_json::json!([{
                "url": "http://a.test/apc/trans.gif?x",
                "requestId": "a",
                "objectName": "trans.gif",
                "connState": "warm",
                "elapsedMillis": 42
            }])
        );
    }

    #[test]
    fn test_payload_excludes_failed_probes() {
        let query = build_query(
            &[result("a", Some(3)), result("b", None), result("c", Some(9))],
            "rid",
            KEY,
        )
        .unwrap();
        let data = query.split("&DATA=").nth(1).unwrap();
        let payload: Vec<serde_json::Value> =
            serde_json::from_str(&urlencoding::decode(data).unwrap()).unwrap();

        let ids: Vec<_> = payload.iter().map(|p| p["requestId"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }
}
