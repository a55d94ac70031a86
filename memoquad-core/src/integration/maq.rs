use std::fmt;

use super::settings::IntegrationSettings;
use super::stats::{self, Completion};

/// Result of integrating a function over `[0, ∞)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegrationOutcome {
    /// The integral, or the best estimate available when `successful` is false.
    /// NaN if the integrand produced NaN.
    pub integral: f64,
    /// Whether the requested tolerance was met.
    pub successful: bool,
    /// Number of times the integrand was evaluated.
    pub evaluations: u32,
}

impl IntegrationOutcome {
    /// The integral, if the requested tolerance was met.
    pub fn converged(&self) -> Option<f64> {
        self.successful.then_some(self.integral)
    }
}

impl fmt::Display for IntegrationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {} evaluations)",
            self.integral,
            if self.successful { "converged" } else { "failed" },
            self.evaluations
        )
    }
}

/// Integrates `f` over `[0, ∞)` using the global [`IntegrationSettings`].
///
/// # Examples
///
/// ```
/// use memoquad_core::integrate;
///
/// let outcome = integrate(|x: f64| (-x).exp());
/// assert!(outcome.successful);
/// assert!((outcome.integral - 1.0).abs() < 1e-6);
/// ```
pub fn integrate<F>(f: F) -> IntegrationOutcome
where
    F: Fn(f64) -> f64,
{
    integrate_with(f, &IntegrationSettings::global())
}

/// Integrates `f` over `[0, ∞)` with the tolerance and evaluation budget
/// resolved from `settings`.
///
/// The domain is mapped onto `(0, 1]` by `t = 1/(1+x)`, where `t = 0` stands
/// for `x = ∞`, so `f` must accept `f64::INFINITY`. The integration has two
/// phases:
///
/// 1. **Search.** Probe `t = 1` and `t = 0.5`. If the transformed integrand is
///    negligible (no larger than `f64::EPSILON` in magnitude) at both, probe
///    the odd points of ever finer partitions of `[0, 1]` until a
///    non-negligible value turns up or a quarter of the budget is spent. If
///    nothing turns up, the integral is reported as `0` and the call as
///    successful.
/// 2. **Refinement.** Adaptive Simpson's rule over the bracketed interval,
///    driven by an explicit work stack. An interval is accepted, with a
///    Richardson correction, once halving it changes its estimate by less than
///    the tolerance relative to either the refined estimate or the running
///    total.
///
/// When the budget runs out with work left, the outcome carries the running
/// total plus the unrefined estimate of every pending interval, and
/// `successful` is false. A NaN from `f` stops the integration at once with a
/// NaN integral.
///
/// The evaluation count includes the search phase and may exceed the budget
/// by one, since refinement evaluates in pairs.
pub fn integrate_with<F>(f: F, settings: &IntegrationSettings) -> IntegrationOutcome
where
    F: Fn(f64) -> f64,
{
    let tolerance = settings.effective_tolerance();
    let max_evals = settings.effective_max_evals();

    let mut integrand = Integrand {
        f: &f,
        evaluations: 0,
    };

    let (integral, completion) = match adaptive_simpson(&mut integrand, tolerance, max_evals) {
        Ok(result) => result,
        Err(NotANumber { t }) => {
            tracing::debug!(
                x = x_from_t(t),
                evaluations = integrand.evaluations,
                "integrand is NaN"
            );
            (f64::NAN, Completion::NotANumber)
        }
    };

    let evaluations = integrand.evaluations;
    match completion {
        Completion::BudgetExhausted => tracing::debug!(
            integral,
            evaluations,
            tolerance,
            "evaluation budget exhausted before reaching tolerance"
        ),
        Completion::NothingFound => {
            tracing::debug!(evaluations, "search found nothing to integrate")
        }
        Completion::Converged | Completion::NotANumber => {}
    }
    stats::record(completion, evaluations);

    IntegrationOutcome {
        integral,
        successful: matches!(completion, Completion::Converged | Completion::NothingFound),
        evaluations,
    }
}

fn x_from_t(t: f64) -> f64 {
    if t == 0.0 {
        f64::INFINITY
    } else {
        1.0 / t - 1.0
    }
}

fn simpson(a: f64, b: f64, fa: f64, fb: f64, fc: f64) -> f64 {
    (b - a) / 6.0 * (fa + 4.0 * fc + fb)
}

#[derive(Debug, Clone, Copy)]
struct NotANumber {
    t: f64,
}

/// The integrand in the `t` domain, counting evaluations.
struct Integrand<'f, F> {
    f: &'f F,
    evaluations: u32,
}

impl<F: Fn(f64) -> f64> Integrand<'_, F> {
    fn eval(&mut self, t: f64) -> Result<f64, NotANumber> {
        self.evaluations += 1;
        let y = (self.f)(x_from_t(t));
        let value = if t == 0.0 { y } else { y / (t * t) };
        if value.is_nan() {
            Err(NotANumber { t })
        } else {
            Ok(value)
        }
    }
}

fn negligible(value: f64) -> bool {
    value.abs() <= f64::EPSILON
}

/// An interval `[a, b]` with midpoint `c`, the integrand at all three points
/// and the Simpson estimate over it.
#[derive(Debug, Clone, Copy)]
struct Region {
    a: f64,
    b: f64,
    c: f64,
    fa: f64,
    fb: f64,
    fc: f64,
    estimate: f64,
}

impl Region {
    fn new(a: f64, b: f64, c: f64, fa: f64, fb: f64, fc: f64) -> Self {
        Self {
            a,
            b,
            c,
            fa,
            fb,
            fc,
            estimate: simpson(a, b, fa, fb, fc),
        }
    }
}

/// Finds an interval in `[0, 1]` where the integrand is not negligible.
fn search<F: Fn(f64) -> f64>(
    integrand: &mut Integrand<'_, F>,
    max_evals: u32,
) -> Result<Option<Region>, NotANumber> {
    let f1 = integrand.eval(1.0)?;
    let f_half = integrand.eval(0.5)?;
    if !negligible(f1) || !negligible(f_half) {
        let f0 = integrand.eval(0.0)?;
        return Ok(Some(Region::new(0.0, 1.0, 0.5, f0, f1, f_half)));
    }

    let budget = (max_evals / 4).max(2);
    let mut intervals: u64 = 4;
    while integrand.evaluations < budget {
        for i in (1..intervals).step_by(2) {
            if integrand.evaluations >= budget {
                break;
            }
            let c = i as f64 / intervals as f64;
            let fc = integrand.eval(c)?;
            if !negligible(fc) {
                let a = (i - 1) as f64 / intervals as f64;
                let b = (i + 1) as f64 / intervals as f64;
                let fa = integrand.eval(a)?;
                let fb = integrand.eval(b)?;
                return Ok(Some(Region::new(a, b, c, fa, fb, fc)));
            }
        }
        intervals *= 2;
    }
    Ok(None)
}

fn adaptive_simpson<F: Fn(f64) -> f64>(
    integrand: &mut Integrand<'_, F>,
    tolerance: f64,
    max_evals: u32,
) -> Result<(f64, Completion), NotANumber> {
    let Some(first) = search(integrand, max_evals)? else {
        return Ok((0.0, Completion::NothingFound));
    };

    let mut integral = 0.0;
    let mut stack = vec![first];

    while let Some(region) = stack.pop() {
        if integrand.evaluations >= max_evals {
            let pending: f64 = stack.iter().map(|r| r.estimate).sum();
            return Ok((
                integral + region.estimate + pending,
                Completion::BudgetExhausted,
            ));
        }

        let Region {
            a,
            b,
            c,
            fa,
            fb,
            fc,
            estimate: coarse,
        } = region;
        let d = (a + c) / 2.0;
        let e = (c + b) / 2.0;
        let fd = integrand.eval(d)?;
        let fe = integrand.eval(e)?;

        let left = Region::new(a, c, d, fa, fc, fd);
        let right = Region::new(c, b, e, fc, fb, fe);
        let refined = left.estimate + right.estimate;

        let error = (refined - coarse).abs();
        if error <= (tolerance * refined).abs() || error <= (tolerance * integral).abs() {
            integral += refined + (refined - coarse) / 15.0;
        } else if left.estimate.abs() > right.estimate.abs() {
            stack.push(right);
            stack.push(left);
        } else {
            stack.push(left);
            stack.push(right);
        }
    }

    Ok((integral, Completion::Converged))
}
