//! Remote endpoint catalog
//!
//! Wire schema of the JSON document served at the configuration URL, plus the
//! validated [`Configuration`] the run pipeline works with. Keys are single
//! letters on the wire:
//!
//! ```text
//! { "e": [ { "e": "<requestId>", "w": <weight>, "m": <flags> }, ... ],
//!   "n": <sampleCount>,
//!   "r": [ "<reportEndpointId>", ... ] }
//! ```

use serde::{Deserialize, Serialize};

use super::error::RumError;

/// Measurement flag: probe over HTTPS
pub const FLAG_HTTPS: i64 = 1;

/// Measurement flag: warm probe downloads the heavy image
pub const FLAG_HEAVY_WARM: i64 = 12;

/// A measurable endpoint from the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(rename = "e")]
    pub request_id: String,
    #[serde(rename = "w")]
    pub weight: i64,
    #[serde(rename = "m", default)]
    pub measurement_flags: i64,
}

impl Endpoint {
    pub fn new(request_id: impl Into<String>, weight: i64, measurement_flags: i64) -> Self {
        Self {
            request_id: request_id.into(),
            weight,
            measurement_flags,
        }
    }

    /// Only positively weighted endpoints take part in sampling
    #[inline]
    pub fn is_eligible(&self) -> bool {
        self.weight > 0
    }

    #[inline]
    pub fn uses_https(&self) -> bool {
        self.measurement_flags & FLAG_HTTPS != 0
    }

    #[inline]
    pub fn uses_heavy_warm_probe(&self) -> bool {
        self.measurement_flags & FLAG_HEAVY_WARM != 0
    }
}

/// One run's worth of remote configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(rename = "e")]
    pub endpoints: Vec<Endpoint>,
    #[serde(rename = "n")]
    pub sample_count: i64,
    #[serde(rename = "r", default)]
    pub report_endpoint_ids: Vec<String>,
}

impl Configuration {
    /// Parse a catalog document; any schema violation is a config error
    pub fn from_json(body: &str) -> Result<Self, RumError> {
        serde_json::from_str(body)
            .map_err(|e| RumError::config(format!("malformed endpoint catalog: {}", e)))
    }

    pub fn eligible_count(&self) -> usize {
        self.endpoints.iter().filter(|e| e.is_eligible()).count()
    }

    /// `sample_count` bounded to `0..=eligible_count()`
    pub fn clamped_sample_count(&self) -> usize {
        let requested = usize::try_from(self.sample_count.max(0)).unwrap_or(usize::MAX);
        requested.min(self.eligible_count())
    }
}
