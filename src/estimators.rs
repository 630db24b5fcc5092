/*!
# Unbiased estimators from coupled trajectories

Turns a recorded [`Trajectory`] into an unbiased sample of the stationary
expectation `E_pi[h(X)]`. For a chain pair with lag `L`, meeting time `tau`,
burn-in `k`, and horizon `m` (`0 <= k <= m`), the estimator is

```text
H = (1/(m-k+1)) * [ sum_{t=k}^{m} h(X_t)
    + sum_{t=k+L}^{tau-1} c_t * ( h(X_t) - h(Y_{t-L}) ) ]
c_t = floor((t-k)/L) - ceil(max(L, t-m)/L) + 1
```

The leading term is the usual ergodic average; the weighted sum of
differences cancels the burn-in bias exactly. For `L = 1` the weights reduce
to `min(1, (t-k)/(m-k+1))` scaled into the average. Terms with `t >= tau`
vanish identically (the chains have met, so `X_t = Y_{t-L}` bit-exactly),
which is why the sum stops at the meeting time.

`E[H] = E_pi[h(X)]` holds for any valid `(k, m)` provided the meeting time of
the underlying kernel has a finite moment of sufficiently high order; that is
a property of the supplied kernel and is not verified here.

One trajectory can be re-consumed for as many test functions `h` and
parameter choices `(k, m)` as desired; see
[`CoupledMetropolis::estimate_online`](crate::coupled_metropolis::CoupledMetropolis::estimate_online)
for the O(1)-memory alternative.
*/

use num_traits::Float;

use crate::core::{SamplerError, Trajectory, UnbiasedEstimate};

/// Weight of the bias-correction difference at time `t`, for burn-in `k`,
/// horizon `m`, and lag `lag`. Zero weights are possible when `lag > 1`.
pub(crate) fn correction_coefficient(t: usize, k: usize, m: usize, lag: usize) -> usize {
    let base = (t - k) / lag;
    let over = t.saturating_sub(m).max(lag);
    let ceil_over = (over + lag - 1) / lag;
    (base + 1).saturating_sub(ceil_over)
}

/// Computes the unbiased estimate of `E_pi[h(X)]` from one recorded
/// trajectory.
///
/// # Errors
/// [`SamplerError::PreconditionViolation`] if `k > m`, if `m` lies beyond the
/// recorded horizon, or if the trajectory was produced without a lag.
///
/// # Examples
///
/// ```rust
/// use coupled_mcmc::coupled_metropolis::CoupledMetropolis;
/// use coupled_mcmc::coupling::MaximalCoupling;
/// use coupled_mcmc::distributions::{GaussianInit, IsotropicGaussian};
/// use coupled_mcmc::estimators::unbiased_estimate;
///
/// let mut sampler = CoupledMetropolis::new(
///     IsotropicGaussian::new(1.0),
///     IsotropicGaussian::new(0.5),
///     MaximalCoupling::new(IsotropicGaussian::new(0.5), IsotropicGaussian::new(0.5)),
///     GaussianInit::standard(1),
///     1,
/// )
/// .set_seed(42);
/// let trajectory = sampler.trajectory(100, 100_000).unwrap();
///
/// // Same trajectory, two different test functions.
/// let mean = unbiased_estimate(&trajectory, |x: &[f64]| x[0], 10, 100).unwrap();
/// let second_moment = unbiased_estimate(&trajectory, |x| x[0] * x[0], 10, 100).unwrap();
/// assert!(mean.value.is_finite() && second_moment.value.is_finite());
/// ```
pub fn unbiased_estimate<T, H>(
    trajectory: &Trajectory<T>,
    h: H,
    k: usize,
    m: usize,
) -> Result<UnbiasedEstimate<T>, SamplerError>
where
    T: Float,
    H: Fn(&[T]) -> T,
{
    if k > m {
        return Err(SamplerError::PreconditionViolation(format!(
            "k = {k} must not exceed m = {m}"
        )));
    }
    if m > trajectory.horizon() {
        return Err(SamplerError::PreconditionViolation(format!(
            "m = {m} exceeds the recorded horizon {}",
            trajectory.horizon()
        )));
    }
    if trajectory.lag == 0 {
        return Err(SamplerError::PreconditionViolation(
            "estimation requires a trajectory with lag >= 1".into(),
        ));
    }

    let lag = trajectory.lag;
    let span = T::from(m - k + 1).unwrap();

    let mut sum_h = T::zero();
    for t in k..=m {
        sum_h = sum_h + h(&trajectory.history1[t]);
    }

    let mut correction = T::zero();
    for t in (k + lag)..trajectory.meeting_time {
        let coeff = correction_coefficient(t, k, m, lag);
        if coeff > 0 {
            let delta = h(&trajectory.history1[t]) - h(&trajectory.history2[t - lag]);
            correction = correction + T::from(coeff).unwrap() * delta;
        }
    }

    Ok(UnbiasedEstimate {
        value: (sum_h + correction) / span,
        cost: trajectory.cost,
    })
}

/// Applies [`unbiased_estimate`] to every trajectory in a collection.
pub fn unbiased_estimates<T, H>(
    trajectories: &[Trajectory<T>],
    h: H,
    k: usize,
    m: usize,
) -> Result<Vec<UnbiasedEstimate<T>>, SamplerError>
where
    T: Float,
    H: Fn(&[T]) -> T,
{
    if trajectories.is_empty() {
        return Err(SamplerError::PreconditionViolation(
            "empty trajectory collection".into(),
        ));
    }
    trajectories
        .iter()
        .map(|trajectory| unbiased_estimate(trajectory, &h, k, m))
        .collect()
}

/// Averages a batch of independent unbiased estimates, returning the mean and
/// its standard error. Averaging is all that is needed to combine replicates:
/// each estimate is exactly unbiased, so the mean is too.
pub fn average<T: Float>(estimates: &[UnbiasedEstimate<T>]) -> Result<(T, T), SamplerError> {
    if estimates.is_empty() {
        return Err(SamplerError::PreconditionViolation(
            "empty estimate collection".into(),
        ));
    }
    let n = T::from(estimates.len()).unwrap();
    let mean = estimates
        .iter()
        .fold(T::zero(), |acc, e| acc + e.value)
        / n;
    if estimates.len() == 1 {
        return Ok((mean, T::zero()));
    }
    let sum_sq = estimates.iter().fold(T::zero(), |acc, e| {
        let d = e.value - mean;
        acc + d * d
    });
    let std_err = (sum_sq / (n - T::one()) / n).sqrt();
    Ok((mean, std_err))
}
