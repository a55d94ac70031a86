//! # Memoquad
//!
//! Thread-safe memoization for expensive, deterministic computations, with
//! invalidation that follows a live graph of replaceable inputs, and the
//! adaptive integrator those computations usually wrap.
//!
//! ## Features
//!
//! - **Single-flight**: concurrent callers asking for the same uncached key
//!   share one computation
//! - **Lock-free computation**: a cache's lock is only held for bookkeeping,
//!   so other keys stay available while a value is being computed
//! - **One-call invalidation**: [`clear_caches`] empties every live cache
//! - **Replaceable inputs**: dependents follow an input object when it is
//!   swapped for another one, and clear their caches when it changes
//! - **Integration over `[0, ∞)`**: adaptive Simpson's rule with a domain
//!   transform, a tolerance and an evaluation budget
//!
//! ## Quick Start
//!
//! ```rust
//! use memoquad::CachedFunction;
//!
//! let slow_square = CachedFunction::new("slow_square", |x: f64| {
//!     std::thread::sleep(std::time::Duration::from_millis(10));
//!     x * x
//! });
//!
//! // First call computes the result
//! assert_eq!(slow_square.call(4.0), 16.0);
//! // Second call returns the cached result
//! assert_eq!(slow_square.call(4.0), 16.0);
//! ```
//!
//! ## Custom Cache Keys
//!
//! Floating-point and the common primitive argument types work out of the
//! box. Other types opt in through [`DefaultCacheableKey`], or implement
//! [`CacheableKey`] directly when the argument is not its own key:
//!
//! ```rust
//! use memoquad::{CacheableKey, CachedFunction, DefaultCacheableKey};
//!
//! #[derive(Debug, Clone, PartialEq, Eq, Hash)]
//! struct Storey(u8);
//!
//! impl DefaultCacheableKey for Storey {}
//!
//! /// Intensity measure in g, cached by its value in milli-g.
//! #[derive(Debug, Clone, Copy)]
//! struct Intensity(f64);
//!
//! impl CacheableKey for Intensity {
//!     type Key = i64;
//!
//!     fn cache_key(&self) -> Option<i64> {
//!         self.0.is_finite().then(|| (self.0 * 1000.0).round() as i64)
//!     }
//! }
//!
//! let drift = CachedFunction::new("drift", |storey: Storey| 0.01 * storey.0 as f64);
//! let demand = CachedFunction::new("demand", |im: Intensity| im.0 * 2.5);
//!
//! assert_eq!(drift.call(Storey(3)), 0.03);
//! assert_eq!(demand.call(Intensity(0.2)), 0.5);
//! assert!(demand.contains(&Intensity(0.2001)));
//! ```
//!
//! ## Replaceable Inputs
//!
//! A dependent object holds an [`Upstream`] link to its input and clears its
//! own caches whenever the input changes or is replaced:
//!
//! ```rust
//! use memoquad::{CachedValue, DependencyNode, Replaceable, Upstream};
//! use std::sync::{Arc, Weak};
//!
//! struct Hazard {
//!     rate: f64,
//!     node: DependencyNode<Hazard>,
//! }
//!
//! impl Replaceable for Hazard {
//!     fn dependency_node(&self) -> &DependencyNode<Hazard> {
//!         &self.node
//!     }
//! }
//!
//! struct Loss {
//!     hazard: Upstream<Hazard>,
//!     annual: CachedValue<f64>,
//! }
//!
//! impl Loss {
//!     fn new(hazard: Arc<Hazard>) -> Arc<Self> {
//!         Arc::new_cyclic(|this: &Weak<Loss>| {
//!             let reader = this.clone();
//!             let annual = CachedValue::new("annual_loss", move || {
//!                 reader
//!                     .upgrade()
//!                     .map_or(f64::NAN, |loss| loss.hazard.get().rate * 1000.0)
//!             });
//!             let owner = this.clone();
//!             let hazard = Upstream::new(hazard, move || {
//!                 if let Some(loss) = owner.upgrade() {
//!                     loss.annual.clear_cache();
//!                 }
//!             });
//!             Loss { hazard, annual }
//!         })
//!     }
//! }
//!
//! let low = Arc::new(Hazard { rate: 0.01, node: DependencyNode::new() });
//! let high = Arc::new(Hazard { rate: 0.05, node: DependencyNode::new() });
//!
//! let loss = Loss::new(Arc::clone(&low));
//! assert_eq!(loss.annual.get(), 10.0);
//!
//! low.node.replace(&high);
//! assert_eq!(loss.annual.get(), 50.0);
//! ```
//!
//! See `tests/dependency_tests.rs` for a complete chain of dependent objects.
//!
//! ## Integration
//!
//! ```rust
//! use memoquad::{integrate, IntegrationSettings};
//!
//! let outcome = integrate(|x: f64| (-x).exp());
//! assert!(outcome.successful);
//!
//! // A tighter budget for one family of integrals only.
//! let cheap = IntegrationSettings::global().derive();
//! cheap.override_max_evals(16).unwrap();
//! let rough = cheap.integrate(|x: f64| (-x).exp());
//! assert!(rough.evaluations <= 17);
//! ```
//!
//! ## Statistics
//!
//! With the `stats` feature (enabled by default) every cache counts hits,
//! misses, coalesced waits and bypasses:
//!
//! ```rust
//! # #[cfg(feature = "stats")]
//! # {
//! use memoquad::CachedFunction;
//!
//! let f = CachedFunction::new("stats_demo", |x: u32| x + 1);
//! f.call(1);
//! f.call(1);
//! assert_eq!(f.stats().hits(), 1);
//! assert_eq!(f.stats().misses(), 1);
//! # }
//! ```

pub use memoquad_core::*;
