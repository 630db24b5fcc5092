/*!
# Unbiased marginal histograms

Estimates the marginal distribution of one coordinate of the target by
applying the unbiased estimator to a per-bin indicator function,
`h_bin(x) = 1[lo <= x[component] < hi]`, across a collection of independent
trajectories. Each bin's mass is the average of the per-trajectory estimates,
with a normal-approximation 95% confidence interval from their sample
standard error.

The intervals are *independent per bin*, not a simultaneous confidence band:
statements about many bins at once (e.g. "the whole density lies inside the
envelope") need a multiplicity correction that this module does not apply.
Unlike a histogram of raw samples, per-bin masses here are unbiased but not
constrained to be non-negative or to sum to one.
*/

use ndarray::Array1;
use ndarray_stats::QuantileExt;
use num_traits::Float;

use crate::core::{SamplerError, Trajectory};
use crate::estimators::unbiased_estimates;

/// Bin layout for [`histogram`].
#[derive(Debug, Clone, PartialEq)]
pub enum Bins<T> {
    /// `n` equal-width bins spanning the range of the recorded positions in
    /// the estimation window `[k, m]`.
    Count(usize),
    /// Explicit bin edges, strictly increasing; `edges.len() - 1` bins.
    Edges(Vec<T>),
}

/// One bin of an estimated marginal: `[lo, hi)` with estimated probability
/// mass and a 95% confidence interval around it.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramBin<T> {
    pub lo: T,
    pub hi: T,
    pub mass: T,
    pub ci_lo: T,
    pub ci_hi: T,
}

impl<T: Float> HistogramBin<T> {
    pub fn midpoint(&self) -> T {
        (self.lo + self.hi) / T::from(2.0).unwrap()
    }

    pub fn width(&self) -> T {
        self.hi - self.lo
    }
}

fn bin_edges<T: Float>(
    trajectories: &[Trajectory<T>],
    component: usize,
    k: usize,
    m: usize,
    bins: Bins<T>,
) -> Result<Vec<T>, SamplerError> {
    match bins {
        Bins::Edges(edges) => {
            if edges.len() < 2 || edges.windows(2).any(|w| w[1] <= w[0]) {
                return Err(SamplerError::PreconditionViolation(
                    "bin edges must be strictly increasing with at least two entries".into(),
                ));
            }
            Ok(edges)
        }
        Bins::Count(n) => {
            if n == 0 {
                return Err(SamplerError::PreconditionViolation(
                    "bin count must be positive".into(),
                ));
            }
            let values: Array1<T> = trajectories
                .iter()
                .flat_map(|traj| (k..=m).map(|t| traj.history1[t][component]))
                .collect();
            let lo = *values.min().map_err(|_| {
                SamplerError::PreconditionViolation("non-finite positions in trajectories".into())
            })?;
            let hi = *values.max().map_err(|_| {
                SamplerError::PreconditionViolation("non-finite positions in trajectories".into())
            })?;
            let width = (hi - lo) / T::from(n).unwrap();
            if width <= T::zero() {
                return Err(SamplerError::PreconditionViolation(
                    "degenerate value range for bin inference".into(),
                ));
            }
            Ok((0..=n).map(|i| lo + width * T::from(i).unwrap()).collect())
        }
    }
}

/// Estimates the marginal histogram of `component` from independent
/// trajectories, using burn-in `k` and horizon `m` for every bin.
///
/// # Errors
/// [`SamplerError::PreconditionViolation`] for an empty trajectory
/// collection, an out-of-range component index, malformed bins, or invalid
/// `(k, m)`.
///
/// # Examples
///
/// ```rust
/// use coupled_mcmc::coupled_metropolis::CoupledMetropolis;
/// use coupled_mcmc::coupling::MaximalCoupling;
/// use coupled_mcmc::core::sample_trajectories;
/// use coupled_mcmc::distributions::{GaussianInit, IsotropicGaussian};
/// use coupled_mcmc::histogram::{histogram, Bins};
///
/// let factory = || {
///     CoupledMetropolis::new(
///         IsotropicGaussian::new(1.0),
///         IsotropicGaussian::new(0.5),
///         MaximalCoupling::new(IsotropicGaussian::new(0.5), IsotropicGaussian::new(0.5)),
///         GaussianInit::standard(1),
///         1,
///     )
/// };
/// let trajectories = sample_trajectories(factory, 20, 42, 50, 100_000).unwrap();
/// let bins = histogram(&trajectories, 0, 5, 50, Bins::Count(10)).unwrap();
/// assert_eq!(bins.len(), 10);
/// ```
pub fn histogram<T: Float>(
    trajectories: &[Trajectory<T>],
    component: usize,
    k: usize,
    m: usize,
    bins: Bins<T>,
) -> Result<Vec<HistogramBin<T>>, SamplerError> {
    if trajectories.is_empty() {
        return Err(SamplerError::PreconditionViolation(
            "empty trajectory collection".into(),
        ));
    }
    let dim = trajectories[0].dim();
    if component >= dim {
        return Err(SamplerError::PreconditionViolation(format!(
            "component {component} out of range for dimension {dim}"
        )));
    }
    if k > m {
        return Err(SamplerError::PreconditionViolation(format!(
            "k = {k} must not exceed m = {m}"
        )));
    }
    if let Some(short) = trajectories.iter().find(|t| t.horizon() < m) {
        return Err(SamplerError::PreconditionViolation(format!(
            "m = {m} exceeds the recorded horizon {}",
            short.horizon()
        )));
    }

    let edges = bin_edges(trajectories, component, k, m, bins)?;
    let z = T::from(1.959963984540054).unwrap();
    let n = T::from(trajectories.len()).unwrap();

    edges
        .windows(2)
        .map(|edge| {
            let (lo, hi) = (edge[0], edge[1]);
            let indicator = |x: &[T]| {
                if lo <= x[component] && x[component] < hi {
                    T::one()
                } else {
                    T::zero()
                }
            };
            let estimates = unbiased_estimates(trajectories, indicator, k, m)?;
            let mean = estimates
                .iter()
                .fold(T::zero(), |acc, e| acc + e.value)
                / n;
            let sum_sq = estimates.iter().fold(T::zero(), |acc, e| {
                let d = e.value - mean;
                acc + d * d
            });
            let std_err = if estimates.len() > 1 {
                (sum_sq / (n - T::one()) / n).sqrt()
            } else {
                T::zero()
            };
            Ok(HistogramBin {
                lo,
                hi,
                mass: mean,
                ci_lo: mean - z * std_err,
                ci_hi: mean + z * std_err,
            })
        })
        .collect()
}
