//! Measurement run controller
//!
//! [`RumEngine`] owns the enable/disable state machine. Enabling spawns a run
//! on the tokio runtime the engine was built on; disabling cancels it. All
//! shared state sits behind one mutex, and the setters never wait on a run.
//!
//! ```text
//! Disabled -> Enabling -> Running -> Completed | Canceled | Failed
//!                            ^                      |
//!                            +---- repeat interval -+--> Disabled
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::RumSettings;
use super::error::RumError;
use super::fetcher::ConfigurationFetcher;
use super::prober::Prober;
use super::reporter::{ReportSummary, Reporter};
use super::sampler;
use super::stats::{RumStats, RumStatsSnapshot};
use super::transport::Transport;
use super::url_builder::{self, ProbeSpec, SelectedEndpoint};

/// Required key length after trimming
pub const RUM_KEY_LEN: usize = 32;

/// Lifecycle phase of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Disabled,
    Enabling,
    Running,
    Completed,
    Canceled,
    Failed,
}

impl RunPhase {
    /// A run has ended (the engine may still be enabled)
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Canceled | Self::Failed)
    }
}

struct ActiveRun {
    id: u64,
    cancel: CancellationToken,
}

struct RunState {
    enabled: bool,
    rum_key: Option<String>,
    active: Option<ActiveRun>,
    next_run_id: u64,
}

struct EngineInner {
    settings: RumSettings,
    transport: Arc<dyn Transport>,
    stats: Arc<RumStats>,
    state: Mutex<RunState>,
    phase_tx: watch::Sender<RunPhase>,
    runtime: Handle,
}

/// Real-user latency measurement engine
#[derive(Clone)]
pub struct RumEngine {
    inner: Arc<EngineInner>,
}

impl RumEngine {
    /// Build an engine bound to the current tokio runtime
    pub fn new(settings: RumSettings, transport: Arc<dyn Transport>) -> Result<Self, RumError> {
        let runtime = Handle::try_current().map_err(|_| RumError::NoRuntime)?;
        Ok(Self::with_runtime(settings, transport, runtime))
    }

    pub fn with_runtime(
        settings: RumSettings,
        transport: Arc<dyn Transport>,
        runtime: Handle,
    ) -> Self {
        let (phase_tx, _) = watch::channel(RunPhase::Disabled);

        Self {
            inner: Arc::new(EngineInner {
                settings,
                transport,
                stats: Arc::new(RumStats::new()),
                state: Mutex::new(RunState {
                    enabled: false,
                    rum_key: None,
                    active: None,
                    next_run_id: 0,
                }),
                phase_tx,
                runtime,
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.state.lock().enabled
    }

    pub fn phase(&self) -> RunPhase {
        *self.inner.phase_tx.borrow()
    }

    /// Watch phase transitions
    pub fn subscribe(&self) -> watch::Receiver<RunPhase> {
        self.inner.phase_tx.subscribe()
    }

    pub fn stats(&self) -> RumStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Store the key used to tag reports. Surrounding whitespace is ignored;
    /// anything but exactly 32 characters is rejected and the old key kept.
    pub fn set_key(&self, key: &str) -> Result<(), RumError> {
        let trimmed = key.trim();
        let len = trimmed.chars().count();
        if len != RUM_KEY_LEN {
            let err = RumError::InvalidKey(len);
            warn!("{}", err);
            return Err(err);
        }

        self.inner.state.lock().rum_key = Some(trimmed.to_string());
        info!("RUM key updated");
        Ok(())
    }

    /// Turn measurement on or off. Enabling an enabled engine (or disabling a
    /// disabled one) does nothing. Enabling without a key fails.
    pub fn set_enabled(&self, enabled: bool) -> Result<(), RumError> {
        if enabled {
            self.enable()
        } else {
            self.disable();
            Ok(())
        }
    }

    fn enable(&self) -> Result<(), RumError> {
        let (run_id, key, cancel) = {
            let mut state = self.inner.state.lock();
            if state.enabled {
                debug!("already enabled");
                return Ok(());
            }

            let Some(key) = state.rum_key.clone() else {
                let err = RumError::MissingKey;
                warn!("{}", err);
                return Err(err);
            };

            self.inner.publish(RunPhase::Enabling);
            state.enabled = true;
            state.next_run_id += 1;

            // A canceled predecessor may still be winding down; its token is
            // already fired, so replacing it leaves one live handle.
            let cancel = CancellationToken::new();
            state.active = Some(ActiveRun {
                id: state.next_run_id,
                cancel: cancel.clone(),
            });

            (state.next_run_id, key, cancel)
        };

        info!(run_id, "RUM measurement enabled");
        let inner = self.inner.clone();
        self.inner
            .runtime
            .spawn(async move { inner.run_loop(run_id, key, cancel).await });

        Ok(())
    }

    fn disable(&self) {
        let mut state = self.inner.state.lock();
        if !state.enabled {
            debug!("already disabled");
            return;
        }
        state.enabled = false;

        match &state.active {
            // The run clears its own handle once it observes the cancel
            Some(active) => {
                info!(run_id = active.id, "RUM measurement disabled, canceling run");
                active.cancel.cancel();
            }
            None => {
                info!("RUM measurement disabled");
                self.inner.publish(RunPhase::Disabled);
            }
        }
    }
}

impl EngineInner {
    fn publish(&self, phase: RunPhase) {
        self.phase_tx.send_replace(phase);
    }

    async fn run_loop(self: Arc<Self>, run_id: u64, mut key: String, cancel: CancellationToken) {
        loop {
            let phase = self.run_once(run_id, &key, &cancel).await;

            let repeat = self
                .settings
                .repeat_interval
                .filter(|_| phase != RunPhase::Canceled);
            let Some(next_key) = self.settle(run_id, phase, repeat.is_some()) else {
                return;
            };
            let Some(interval) = repeat else {
                return;
            };

            debug!(run_id, ?interval, "waiting for next cycle");
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.settle(run_id, RunPhase::Disabled, false);
                    return;
                }
                _ = tokio::time::sleep(interval) => {}
            }
            key = next_key;
        }
    }

    /// Record the end of a cycle. Returns the key for the next cycle when the
    /// run still owns the active handle and should keep going.
    fn settle(&self, run_id: u64, phase: RunPhase, keep_going: bool) -> Option<String> {
        let mut state = self.state.lock();
        let owns = state.active.as_ref().is_some_and(|a| a.id == run_id);
        if !owns {
            return None;
        }

        self.publish(phase);
        if keep_going && state.enabled {
            if let Some(key) = state.rum_key.clone() {
                return Some(key);
            }
        }

        state.active = None;
        if !state.enabled && phase != RunPhase::Disabled {
            self.publish(RunPhase::Disabled);
        }
        None
    }

    async fn run_once(&self, run_id: u64, key: &str, cancel: &CancellationToken) -> RunPhase {
        if self.state.lock().active.as_ref().is_some_and(|a| a.id == run_id) {
            self.publish(RunPhase::Running);
        }
        RumStats::incr(&self.stats.runs_started);
        info!(run_id, "RUM run started");

        let phase = match self.execute(key, cancel).await {
            Ok(summary) => {
                RumStats::incr(&self.stats.runs_completed);
                info!(
                    run_id,
                    report_id = %summary.report_id,
                    outcome = ?summary.outcome,
                    entries = summary.entries,
                    "RUM run completed"
                );
                RunPhase::Completed
            }
            Err(RumError::Canceled) => {
                RumStats::incr(&self.stats.runs_canceled);
                debug!(run_id, "RUM run canceled");
                RunPhase::Canceled
            }
            Err(e) => {
                RumStats::incr(&self.stats.runs_failed);
                error!(run_id, "RUM run failed: {}", e);
                RunPhase::Failed
            }
        };

        self.stats.mark_run_finished();
        phase
    }

    /// fetch -> sample -> build -> probe -> report
    async fn execute(
        &self,
        key: &str,
        cancel: &CancellationToken,
    ) -> Result<ReportSummary, RumError> {
        if cancel.is_cancelled() {
            return Err(RumError::Canceled);
        }

        let fetcher =
            ConfigurationFetcher::new(self.transport.clone(), self.settings.config_url.as_str());
        let config = fetcher.fetch(cancel).await?;

        let count = config.clamped_sample_count();
        let mut rng = StdRng::from_entropy();
        let selected: Vec<SelectedEndpoint> = sampler::sample(&config.endpoints, count, &mut rng)
            .into_iter()
            .map(|endpoint| SelectedEndpoint::derive(endpoint, &self.settings.root_domain))
            .collect();
        debug!(
            requested = config.sample_count,
            selected = selected.len(),
            "endpoints sampled"
        );

        let specs: Vec<ProbeSpec> = selected
            .iter()
            .flat_map(|endpoint| {
                let (cold, warm) = url_builder::build(endpoint);
                [cold, warm]
            })
            .collect();

        let results = Prober::new(self.transport.clone(), self.stats.clone())
            .probe_all(specs, cancel)
            .await?;

        if cancel.is_cancelled() {
            return Err(RumError::Canceled);
        }
        if config.report_endpoint_ids.is_empty() {
            return Err(RumError::config("catalog declares no report endpoints"));
        }

        Reporter::new(self.transport.clone(), self.stats.clone())
            .report(&results, &config.report_endpoint_ids, key, cancel)
            .await
    }
}
