//! # Adaptive Integration
//!
//! Numerical integration over `[0, ∞)` ([`integrate`], [`integrate_with`]),
//! configured through a hierarchy of [`IntegrationSettings`], with
//! process-wide statistics ([`integration_statistics`]).
//!
//! Integrals are typically evaluated on a cache miss inside a
//! [`CachedFunction`](crate::CachedFunction). After changing the global
//! defaults, call [`clear_caches`](crate::clear_caches) so that no result
//! computed under the old settings survives.

mod maq;
mod settings;
mod stats;

pub use maq::{integrate, integrate_with, IntegrationOutcome};
pub use settings::{IntegrationSettings, DEFAULT_MAX_EVALS, DEFAULT_TOLERANCE};
pub use stats::{integration_statistics, reset_integration_statistics, IntegrationStatistics};
