use once_cell::sync::Lazy;
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use super::maq::{integrate_with, IntegrationOutcome};
use crate::error::{Result, SettingsError};

/// Tolerance used by the global settings until changed.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Evaluation budget used by the global settings until changed.
pub const DEFAULT_MAX_EVALS: u32 = 1024;

/// Marks a value as "ask the parent". It is the bit pattern of `0.0`, which is
/// never a valid tolerance, and `0`, which is never a valid budget.
const UNSPECIFIED: u64 = 0;
const UNSPECIFIED_EVALS: u32 = 0;

static GLOBAL: Lazy<Arc<IntegrationSettings>> =
    Lazy::new(|| Arc::new(IntegrationSettings::new_root()));

/// Tolerance and evaluation budget for [`integrate_with`], resolved through a
/// chain of parents.
///
/// A node either overrides a value or leaves it unspecified, in which case it
/// inherits whatever its parent resolves to *at the time of use*. The chain
/// ends at a root node whose values are always concrete. The usual shape is
/// global settings, then per-class settings, then per-instance settings, and
/// sometimes a short-lived node for a single call:
///
/// ```
/// use memoquad_core::IntegrationSettings;
///
/// let class = IntegrationSettings::new_root().into_shared();
/// let instance = class.derive();
///
/// class.override_tolerance(1e-4).unwrap();
/// assert_eq!(instance.effective_tolerance(), 1e-4);
///
/// instance.override_tolerance(1e-8).unwrap();
/// class.override_tolerance(1e-3).unwrap();
/// assert_eq!(instance.effective_tolerance(), 1e-8);
///
/// instance.use_default_tolerance();
/// assert_eq!(instance.effective_tolerance(), 1e-3);
/// ```
///
/// Values are stored in atomics, so nodes can be shared between threads and
/// changed while other threads integrate with them.
pub struct IntegrationSettings {
    /// `f64` bit pattern, or `UNSPECIFIED`
    tolerance: AtomicU64,
    max_evals: AtomicU32,
    parent: Option<Arc<IntegrationSettings>>,
}

impl IntegrationSettings {
    /// Creates a root node holding the default tolerance and budget.
    ///
    /// Most callers want [`global`](Self::global) instead. A separate root is
    /// useful when a subsystem must not follow changes to the global defaults.
    pub fn new_root() -> Self {
        Self {
            tolerance: AtomicU64::new(DEFAULT_TOLERANCE.to_bits()),
            max_evals: AtomicU32::new(DEFAULT_MAX_EVALS),
            parent: None,
        }
    }

    /// Creates a node that inherits both values from `parent`.
    pub fn with_parent(parent: Arc<IntegrationSettings>) -> Self {
        Self {
            tolerance: AtomicU64::new(UNSPECIFIED),
            max_evals: AtomicU32::new(UNSPECIFIED_EVALS),
            parent: Some(parent),
        }
    }

    /// The process-wide root settings.
    pub fn global() -> Arc<IntegrationSettings> {
        Arc::clone(&GLOBAL)
    }

    /// Creates a child of `self` that inherits both values.
    pub fn derive(self: &Arc<Self>) -> Arc<IntegrationSettings> {
        Arc::new(Self::with_parent(Arc::clone(self)))
    }

    pub fn into_shared(self) -> Arc<IntegrationSettings> {
        Arc::new(self)
    }

    pub fn parent(&self) -> Option<&Arc<IntegrationSettings>> {
        self.parent.as_ref()
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Sets this node's own tolerance.
    ///
    /// # Errors
    ///
    /// [`SettingsError::NonPositiveTolerance`] unless `tolerance > 0`. The
    /// previous value is kept.
    pub fn override_tolerance(&self, tolerance: f64) -> Result<()> {
        if !(tolerance > 0.0) {
            tracing::warn!(tolerance, "can't set tolerance; must be > 0.0");
            return Err(SettingsError::NonPositiveTolerance(tolerance));
        }
        self.tolerance.store(tolerance.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    /// Sets this node's own evaluation budget.
    ///
    /// # Errors
    ///
    /// [`SettingsError::ZeroEvaluations`] if `max_evals` is zero. The previous
    /// value is kept.
    pub fn override_max_evals(&self, max_evals: u32) -> Result<()> {
        if max_evals == 0 {
            tracing::warn!(max_evals, "can't set maximum evaluations; must be > 0");
            return Err(SettingsError::ZeroEvaluations);
        }
        self.max_evals.store(max_evals, Ordering::Relaxed);
        Ok(())
    }

    /// Drops this node's tolerance override. A root node goes back to
    /// [`DEFAULT_TOLERANCE`].
    pub fn use_default_tolerance(&self) {
        let value = if self.is_root() {
            DEFAULT_TOLERANCE.to_bits()
        } else {
            UNSPECIFIED
        };
        self.tolerance.store(value, Ordering::Relaxed);
    }

    /// Drops this node's budget override. A root node goes back to
    /// [`DEFAULT_MAX_EVALS`].
    pub fn use_default_max_evals(&self) {
        let value = if self.is_root() {
            DEFAULT_MAX_EVALS
        } else {
            UNSPECIFIED_EVALS
        };
        self.max_evals.store(value, Ordering::Relaxed);
    }

    /// This node's own tolerance, if it overrides one.
    pub fn tolerance_override(&self) -> Option<f64> {
        match self.tolerance.load(Ordering::Relaxed) {
            UNSPECIFIED => None,
            bits => Some(f64::from_bits(bits)),
        }
    }

    /// This node's own evaluation budget, if it overrides one.
    pub fn max_evals_override(&self) -> Option<u32> {
        match self.max_evals.load(Ordering::Relaxed) {
            UNSPECIFIED_EVALS => None,
            evals => Some(evals),
        }
    }

    /// The tolerance of the nearest node, starting at `self`, that sets one.
    pub fn effective_tolerance(&self) -> f64 {
        self.ancestors()
            .find_map(IntegrationSettings::tolerance_override)
            .unwrap_or(DEFAULT_TOLERANCE)
    }

    /// The budget of the nearest node, starting at `self`, that sets one.
    pub fn effective_max_evals(&self) -> u32 {
        self.ancestors()
            .find_map(IntegrationSettings::max_evals_override)
            .unwrap_or(DEFAULT_MAX_EVALS)
    }

    /// `self`, its parent, its parent's parent and so on.
    fn ancestors(&self) -> impl Iterator<Item = &IntegrationSettings> {
        std::iter::successors(Some(self), |node| node.parent.as_deref())
    }

    /// Integrates `f` over `[0, ∞)` with these settings.
    pub fn integrate<F>(&self, f: F) -> IntegrationOutcome
    where
        F: Fn(f64) -> f64,
    {
        integrate_with(f, self)
    }

    /// Sets the global default tolerance.
    ///
    /// Cached results computed with the old tolerance are not invalidated;
    /// call [`clear_caches`](crate::clear_caches) for that.
    ///
    /// # Errors
    ///
    /// Rejects non-positive values, leaving the current default in effect.
    pub fn set_default_tolerance(tolerance: f64) -> Result<()> {
        GLOBAL.override_tolerance(tolerance)
    }

    /// Sets the global default evaluation budget.
    ///
    /// # Errors
    ///
    /// Rejects zero, leaving the current default in effect.
    pub fn set_default_max_evals(max_evals: u32) -> Result<()> {
        GLOBAL.override_max_evals(max_evals)
    }

    /// Restores the global defaults to [`DEFAULT_TOLERANCE`] and
    /// [`DEFAULT_MAX_EVALS`].
    pub fn reset() {
        GLOBAL.use_default_tolerance();
        GLOBAL.use_default_max_evals();
    }
}

impl Default for IntegrationSettings {
    fn default() -> Self {
        Self::with_parent(Self::global())
    }
}

impl fmt::Debug for IntegrationSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntegrationSettings")
            .field("tolerance", &self.tolerance_override())
            .field("max_evals", &self.max_evals_override())
            .field("effective_tolerance", &self.effective_tolerance())
            .field("effective_max_evals", &self.effective_max_evals())
            .field("depth", &(self.ancestors().count() - 1))
            .finish()
    }
}
