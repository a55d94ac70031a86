use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// How an integration call ended. Every call ends in exactly one way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    Converged,
    BudgetExhausted,
    NotANumber,
    NothingFound,
}

struct Counters {
    calls: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    nans: AtomicU64,
    empty_searches: AtomicU64,
    evaluations: AtomicU64,
    max_evaluations: AtomicU64,
}

static COUNTERS: Counters = Counters {
    calls: AtomicU64::new(0),
    successes: AtomicU64::new(0),
    failures: AtomicU64::new(0),
    nans: AtomicU64::new(0),
    empty_searches: AtomicU64::new(0),
    evaluations: AtomicU64::new(0),
    max_evaluations: AtomicU64::new(0),
};

pub(crate) fn record(completion: Completion, evaluations: u32) {
    let evaluations = u64::from(evaluations);
    COUNTERS.calls.fetch_add(1, Ordering::Relaxed);
    COUNTERS.evaluations.fetch_add(evaluations, Ordering::Relaxed);
    COUNTERS
        .max_evaluations
        .fetch_max(evaluations, Ordering::Relaxed);

    let bucket = match completion {
        Completion::Converged => &COUNTERS.successes,
        Completion::BudgetExhausted => &COUNTERS.failures,
        Completion::NotANumber => &COUNTERS.nans,
        Completion::NothingFound => &COUNTERS.empty_searches,
    };
    bucket.fetch_add(1, Ordering::Relaxed);
}

/// Snapshot of the process-wide integration counters.
///
/// `calls` is the sum of `successes`, `failures` (evaluation budget
/// exhausted), `nans` and `empty_searches` (nothing but negligible values
/// found, integral reported as zero).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegrationStatistics {
    pub calls: u64,
    pub successes: u64,
    pub failures: u64,
    pub nans: u64,
    pub empty_searches: u64,
    /// Integrand evaluations over all calls.
    pub evaluations: u64,
    /// Most evaluations used by a single call.
    pub max_evaluations: u64,
}

impl IntegrationStatistics {
    /// Mean number of evaluations per call, or 0.0 before the first call.
    pub fn mean_evaluations(&self) -> f64 {
        if self.calls == 0 {
            0.0
        } else {
            self.evaluations as f64 / self.calls as f64
        }
    }
}

impl fmt::Display for IntegrationStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Calls:            {}", self.calls)?;
        writeln!(f, "Successes:        {}", self.successes)?;
        writeln!(f, "Failures:         {}", self.failures)?;
        writeln!(f, "NaNs:             {}", self.nans)?;
        writeln!(f, "Empty searches:   {}", self.empty_searches)?;
        writeln!(f, "Evaluations:      {}", self.evaluations)?;
        write!(f, "Max evaluations:  {}", self.max_evaluations)
    }
}

/// Returns the integration counters accumulated since start-up or the last
/// [`reset_integration_statistics`].
pub fn integration_statistics() -> IntegrationStatistics {
    IntegrationStatistics {
        calls: COUNTERS.calls.load(Ordering::Relaxed),
        successes: COUNTERS.successes.load(Ordering::Relaxed),
        failures: COUNTERS.failures.load(Ordering::Relaxed),
        nans: COUNTERS.nans.load(Ordering::Relaxed),
        empty_searches: COUNTERS.empty_searches.load(Ordering::Relaxed),
        evaluations: COUNTERS.evaluations.load(Ordering::Relaxed),
        max_evaluations: COUNTERS.max_evaluations.load(Ordering::Relaxed),
    }
}

pub fn reset_integration_statistics() {
    for counter in [
        &COUNTERS.calls,
        &COUNTERS.successes,
        &COUNTERS.failures,
        &COUNTERS.nans,
        &COUNTERS.empty_searches,
        &COUNTERS.evaluations,
        &COUNTERS.max_evaluations,
    ] {
        counter.store(0, Ordering::Relaxed);
    }
}
