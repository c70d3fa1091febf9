//! Error taxonomy for the measurement engine

use super::transport::TransportError;

/// Errors raised by the engine and its run pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RumError {
    /// Enable requested before a valid key was set
    MissingKey,
    /// Key rejected by validation (length after trimming)
    InvalidKey(usize),
    /// Remote configuration unusable
    Config(String),
    /// A single probe failed
    Probe { url: String, source: TransportError },
    /// A single report endpoint failed
    Report { endpoint: String, source: TransportError },
    /// Run canceled by a disable; not a failure
    Canceled,
    /// Engine constructed outside a tokio runtime
    NoRuntime,
}

impl RumError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}

impl std::fmt::Display for RumError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingKey => write!(f, "no RUM key set, cannot enable"),
            Self::InvalidKey(len) => write!(f, "invalid RUM key: length {} (expected 32)", len),
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
            Self::Probe { url, source } => write!(f, "probe {} failed: {}", url, source),
            Self::Report { endpoint, source } => {
                write!(f, "report to {} failed: {}", endpoint, source)
            }
            Self::Canceled => write!(f, "run canceled"),
            Self::NoRuntime => write!(f, "no tokio runtime available"),
        }
    }
}

impl std::error::Error for RumError {}

