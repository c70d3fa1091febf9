//! Real User Measurement engine
//!
//! Measures client-observed HTTP latency to a remotely configured, weighted
//! set of endpoints and reports the timings to one or more collectors.
//!
//! Features:
//! - Weighted sampling without replacement over the remote catalog
//! - Cold/warm probe pairs with legacy and wildcard domain rules
//! - Per-probe and per-collector failure isolation
//! - Enable/disable lifecycle with cooperative cancellation of in-flight runs
//! - Pluggable transport (reqwest by default)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rum_latency::rum::{HttpTransport, RumEngine, RumSettings};
//!
//! let settings = RumSettings::from_env();
//! let transport = Arc::new(HttpTransport::new(&settings)?);
//! let engine = RumEngine::new(settings, transport)?;
//!
//! engine.set_key("0123456789abcdef0123456789abcdef")?;
//! engine.set_enabled(true)?;   // app resumed
//! // ...
//! engine.set_enabled(false)?;  // app suspended, in-flight run is canceled
//! ```

pub mod catalog;
pub mod config;
pub mod controller;
pub mod error;
pub mod fetcher;
pub mod prober;
pub mod reporter;
pub mod sampler;
pub mod stats;
pub mod transport;
pub mod url_builder;

pub use catalog::{Configuration, Endpoint};
pub use config::RumSettings;
pub use controller::{RumEngine, RunPhase};
pub use error::RumError;
pub use fetcher::ConfigurationFetcher;
pub use prober::{ProbeResult, Prober};
pub use reporter::{ReportOutcome, ReportSummary, Reporter};
pub use stats::{RumStats, RumStatsSnapshot};
pub use transport::{HttpTransport, Transport, TransportError, TransportRequest};
pub use url_builder::{ConnState, ProbeSpec, SelectedEndpoint};
