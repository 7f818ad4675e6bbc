//! Observability: structured logging and metrics.
//!
//! - Logging goes through `tracing` everywhere; [`init_tracing`] installs a
//!   subscriber for hosts that don't bring their own (feature `subscriber`)
//! - Prune counters go through the `metrics` facade (feature `prometheus`)

pub mod metrics;
#[cfg(feature = "subscriber")]
mod tracing_init;

#[cfg(feature = "subscriber")]
pub use tracing_init::*;
