//! RUM Latency Library
//!
//! Real-user latency measurement engine for embedding in a host SDK.
//! The `rum_probe` binary drives it from the command line.

pub mod rum;

pub use rum::{RumEngine, RumError, RumSettings};
