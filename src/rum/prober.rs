//! Probe execution
//!
//! Probes run one at a time, in the order given, so each timing covers a
//! single request. A failed probe is dropped and the run moves on;
//! cancellation abandons the whole batch.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::error::RumError;
use super::stats::RumStats;
use super::transport::{Transport, TransportError, TransportRequest};
use super::url_builder::ProbeSpec;

/// Outcome of one probe; `elapsed_millis` is `None` for a failed probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    #[serde(flatten)]
    pub spec: ProbeSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_millis: Option<u64>,
}

impl ProbeResult {
    #[inline]
    pub fn succeeded(&self) -> bool {
        self.elapsed_millis.is_some()
    }
}

pub struct Prober {
    transport: Arc<dyn Transport>,
    stats: Arc<RumStats>,
}

impl Prober {
    pub fn new(transport: Arc<dyn Transport>, stats: Arc<RumStats>) -> Self {
        Self { transport, stats }
    }

    /// Time every spec in order. Returns only successful probes.
    pub async fn probe_all(
        &self,
        specs: Vec<ProbeSpec>,
        cancel: &CancellationToken,
    ) -> Result<Vec<ProbeResult>, RumError> {
        let mut results = Vec::with_capacity(specs.len());

        for spec in specs {
            if cancel.is_cancelled() {
                return Err(RumError::Canceled);
            }

            match self.probe(&spec, cancel).await {
                Ok(elapsed_millis) => {
                    RumStats::incr(&self.stats.probes_succeeded);
                    debug!(
                        url = %spec.url,
                        conn = ?spec.conn_state,
                        elapsed_ms = elapsed_millis,
                        "probe ok"
                    );
                    results.push(ProbeResult {
                        spec,
                        elapsed_millis: Some(elapsed_millis),
                    });
                }
                Err(TransportError::Canceled) => return Err(RumError::Canceled),
                Err(source) => {
                    RumStats::incr(&self.stats.probes_failed);
                    let err = RumError::Probe {
                        url: spec.url,
                        source,
                    };
                    warn!("{}", err);
                }
            }
        }

        Ok(results)
    }

    async fn probe(
        &self,
        spec: &ProbeSpec,
        cancel: &CancellationToken,
    ) -> Result<u64, TransportError> {
        let start = Instant::now();
        self.transport
            .send(TransportRequest::get(spec.url.as_str()), cancel)
            .await?;
        Ok(start.elapsed().as_millis() as u64)
    }
}
