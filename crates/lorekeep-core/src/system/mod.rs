//! # System Module
//!
//! Registry-wide metrics.

mod metrics;

pub use metrics::*;
