//! Probe URL construction
//!
//! Turns a sampled endpoint into a cold and a warm probe against
//! `http[s]://{base}/apc/{image}?{cache buster}`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::catalog::Endpoint;

/// Lightweight probe image
pub const LIGHT_IMAGE: &str = "trans.gif";

/// Heavier warm-probe image
pub const HEAVY_IMAGE: &str = "17k.gif";

const WILDCARD_PREFIX: &str = "*.";

/// Connection state a probe is meant to measure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnState {
    Cold,
    Warm,
}

/// A single probe to execute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeSpec {
    pub url: String,
    pub request_id: String,
    pub object_name: String,
    pub conn_state: ConnState,
}

/// An endpoint chosen for this run, with its derived addressing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedEndpoint {
    pub endpoint: Endpoint,
    /// `"s"` when probing over HTTPS, empty otherwise
    pub protocol_suffix: &'static str,
    pub base_domain: String,
    /// Request id as it will appear in the report
    pub request_id: String,
}

impl SelectedEndpoint {
    /// Apply the domain rules:
    /// - no dot: `{id}.{root}`
    /// - `*.{domain}`: `{fresh}.{domain}`, reported as `{fresh}` when `domain`
    ///   is the root domain, else as `{domain}`
    /// - anything else is used verbatim
    pub fn derive(endpoint: &Endpoint, root_domain: &str) -> Self {
        let protocol_suffix = if endpoint.uses_https() { "s" } else { "" };
        let id = endpoint.request_id.as_str();

        let (base_domain, request_id) = if !id.contains('.') {
            (format!("{}.{}", id, root_domain), id.to_string())
        } else if id.starts_with(WILDCARD_PREFIX) && id.len() > WILDCARD_PREFIX.len() {
            let domain = &id[WILDCARD_PREFIX.len()..];
            let fresh = opaque_id();
            let reported = if domain.eq_ignore_ascii_case(root_domain) {
                fresh.clone()
            } else {
                domain.to_string()
            };
            (format!("{}.{}", fresh, domain), reported)
        } else {
            (id.to_string(), id.to_string())
        };

        Self {
            endpoint: endpoint.clone(),
            protocol_suffix,
            base_domain,
            request_id,
        }
    }

    pub fn scheme(&self) -> String {
        format!("http{}", self.protocol_suffix)
    }
}

/// Cold and warm probe specs for one endpoint
pub fn build(selected: &SelectedEndpoint) -> (ProbeSpec, ProbeSpec) {
    let warm_image = if selected.endpoint.uses_heavy_warm_probe() {
        HEAVY_IMAGE
    } else {
        LIGHT_IMAGE
    };

    (
        probe_spec(selected, LIGHT_IMAGE, ConnState::Cold),
        probe_spec(selected, warm_image, ConnState::Warm),
    )
}

fn probe_spec(selected: &SelectedEndpoint, image: &str, conn_state: ConnState) -> ProbeSpec {
    ProbeSpec {
        url: format!(
            "{}://{}/apc/{}?{}",
            selected.scheme(),
            selected.base_domain,
            image,
            opaque_id()
        ),
        request_id: selected.request_id.clone(),
        object_name: image.to_string(),
        conn_state,
    }
}

/// Fresh DNS-label-safe identifier (32 lowercase hex chars)
fn opaque_id() -> String {
    Uuid::new_v4().simple().to_string()
}
