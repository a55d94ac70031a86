//! # Memoquad Core
//!
//! Concurrent memoization, dependency invalidation and adaptive integration
//! over `[0, ∞)`.
//!
//! ## Features
//!
//! - **Single-flight caches**: [`CachedFunction`] and [`CachedValue`] run the
//!   wrapped computation at most once per key, however many threads ask
//! - **Global clearing**: every live cache registers with the
//!   [`CacheRegistry`], and [`clear_caches`] empties all of them at once
//! - **Dependency nodes**: objects embedding a [`DependencyNode`] notify their
//!   dependents of changes and hand them over to a replacement object
//! - **Adaptive quadrature**: [`integrate`] evaluates integrals over the
//!   half-line to a tolerance within an evaluation budget
//! - **Hierarchical settings**: [`IntegrationSettings`] nodes override or
//!   inherit tolerance and budget from their parents
//!
//! ## Module Organization
//!
//! - [`keys`] - Conversion of arguments into cache keys
//! - [`error`] - Rejected configuration
//! - [`registry`] - Process-wide registry of live caches
//! - [`replaceable`] - Change and replacement notifications
//! - [`integration`] - Integrator, settings and statistics
//!
//! ## Example
//!
//! ```
//! use memoquad_core::{clear_caches, CachedFunction, IntegrationSettings};
//!
//! // Probability that a lognormal variable with median `m` exceeds 1.
//! let exceedance = CachedFunction::new("exceedance", |m: f64| {
//!     IntegrationSettings::global()
//!         .integrate(|x: f64| {
//!             if x <= 1.0 || x.is_infinite() {
//!                 return 0.0;
//!             }
//!             let z = (x / m).ln();
//!             (-z * z / 2.0).exp() / (x * (2.0 * std::f64::consts::PI).sqrt())
//!         })
//!         .integral
//! });
//!
//! let p = exceedance.call(1.0);
//! assert!((p - 0.5).abs() < 1e-4);
//! assert!(exceedance.contains(&1.0));
//!
//! clear_caches();
//! assert!(exceedance.is_empty());
//! ```

mod cached_function;
mod cached_value;
mod upstream;

pub mod error;
pub mod integration;
pub mod keys;
pub mod registry;
pub mod replaceable;

#[cfg(feature = "stats")]
mod stats;

pub use cached_function::CachedFunction;
pub use cached_value::CachedValue;
pub use error::SettingsError;
pub use integration::{
    integrate, integrate_with, integration_statistics, reset_integration_statistics,
    IntegrationOutcome, IntegrationSettings, IntegrationStatistics,
};
pub use keys::{CacheableKey, DefaultCacheableKey};
pub use registry::{clear_caches, CacheId, CacheRegistry, Clearable};
pub use replaceable::{DependencyNode, Replaceable, SubscriptionId};
pub use upstream::Upstream;

#[cfg(feature = "stats")]
pub use stats::CacheStats;
