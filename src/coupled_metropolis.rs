/*!
# Coupled Metropolis sampler

Runs a *lagged pair* of random-walk Metropolis chains with a coupled
transition kernel until both chains occupy exactly the same state. The leading
chain is first advanced `lag` steps alone; from then on both chains move
jointly: their proposals come from one [`ProposalCoupling`] draw and the
accept/reject tests share a single uniform variable. Whenever the coupled
proposal is identical and both chains accept, the pair has *met* — and because
every later coupled transition is applied to the shared pair, the chains stay
equal forever afterwards.

The meeting time `tau = inf{t >= lag : X_t = Y_{t-lag}}` is the quantity the
debiasing estimators in [`estimators`](crate::estimators) are built from;
[`CoupledMetropolis`] exposes it directly ([`meeting_time`]), as a full
recorded path ([`trajectory`]), and fused with the estimator itself
([`estimate_online`]).

[`meeting_time`]: CoupledMetropolis::meeting_time
[`trajectory`]: CoupledMetropolis::trajectory
[`estimate_online`]: CoupledMetropolis::estimate_online

# Example

```rust
use coupled_mcmc::coupled_metropolis::CoupledMetropolis;
use coupled_mcmc::coupling::MaximalCoupling;
use coupled_mcmc::distributions::{GaussianInit, IsotropicGaussian};

let mut sampler = CoupledMetropolis::new(
    IsotropicGaussian::new(1.0),
    IsotropicGaussian::new(0.5),
    MaximalCoupling::new(IsotropicGaussian::new(0.5), IsotropicGaussian::new(0.5)),
    GaussianInit::standard(1),
    1,
)
.set_seed(42);

let record = sampler.meeting_time(100_000).unwrap();
assert!(record.meeting_time > 1);
```
*/

use num_traits::Float;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::Distribution;

use crate::core::{
    ChainState, CoupledSampler, MarkovChain, MeetingRecord, SamplerError, Trajectory,
    UnbiasedEstimate,
};
use crate::coupling::ProposalCoupling;
use crate::distributions::{InitialDistribution, ProposalDistribution, TargetDistribution};
use crate::estimators::correction_coefficient;
use crate::metropolis::MetropolisChain;

/**
A lagged pair of Metropolis chains sharing a coupled transition kernel.

# Type Parameters
- `T`: The floating-point type (e.g. `f32` or `f64`).
- `D`: The target distribution type. Must implement [`TargetDistribution`].
- `Q`: The proposal distribution type. Must implement [`ProposalDistribution`]
  and be symmetric (random walk); the coupled accept test applies no proposal
  correction.
- `C`: The proposal coupling. Must implement [`ProposalCoupling`] with the
  same marginals as `Q`.
- `I`: The starting distribution. Must implement [`InitialDistribution`].

Every run ([`meeting_time`](Self::meeting_time),
[`trajectory`](Self::trajectory), [`estimate_online`](Self::estimate_online))
starts a fresh replicate: both chains re-draw their starting positions
independently from `I`. Replicates therefore share no state, and a sampler
re-seeded via [`set_seed`](Self::set_seed) reproduces its runs exactly.
*/
#[derive(Debug, Clone)]
pub struct CoupledMetropolis<T, D, Q, C, I> {
    /// The leading chain (runs `lag` steps ahead).
    pub chain1: MetropolisChain<T, D, Q>,
    /// The lagged chain.
    pub chain2: MetropolisChain<T, D, Q>,
    /// Joint proposal sampler for the coupled phase.
    pub coupling: C,
    /// Starting distribution, drawn independently per chain per run.
    pub init: I,
    /// Number of steps the leading chain runs alone.
    pub lag: usize,
    /// Whether the pair has met. Monotone: once true it stays true.
    pub identical: bool,
    /// The global random seed.
    pub seed: u64,
    rng: SmallRng,
}

impl<T, D, Q, C, I> CoupledMetropolis<T, D, Q, C, I>
where
    T: Float,
    D: TargetDistribution<T> + Clone,
    Q: ProposalDistribution<T> + Clone,
    C: ProposalCoupling<T>,
    I: InitialDistribution<T>,
    rand_distr::Standard: Distribution<T>,
{
    /// Constructs a coupled sampler. Each chain gets its own copy of the
    /// target and proposal, as with the single-chain samplers.
    pub fn new(target: D, proposal: Q, coupling: C, mut init: I, lag: usize) -> Self {
        let seed = rand::thread_rng().gen::<u64>();
        let start1 = init.draw();
        let start2 = init.draw();
        Self {
            chain1: MetropolisChain::new(target.clone(), proposal.clone(), &start1),
            chain2: MetropolisChain::new(target, proposal, &start2),
            coupling,
            init,
            lag,
            identical: false,
            seed,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Re-seeds every internal random stream from `seed`. Sub-seeds are drawn
    /// from a generator keyed on `seed`, so samplers built with distinct
    /// seeds have non-overlapping streams.
    pub fn set_seed(mut self, seed: u64) -> Self {
        let mut root = SmallRng::seed_from_u64(seed);
        self.chain1 = self.chain1.set_seed(root.gen::<u64>());
        self.chain2 = self.chain2.set_seed(root.gen::<u64>());
        self.coupling = self.coupling.set_seed(root.gen::<u64>());
        self.init = self.init.set_seed(root.gen::<u64>());
        self.seed = seed;
        self.rng = SmallRng::seed_from_u64(root.gen::<u64>());
        self
    }

    /// Starts a fresh replicate: independent starting draws for both chains.
    fn reset(&mut self) {
        self.chain1.reset_position(self.init.draw());
        self.chain2.reset_position(self.init.draw());
        self.identical = false;
    }

    /// One coupled transition of the pair.
    ///
    /// The proposals come from a single coupling draw applied to the two
    /// current positions; the target log-density is evaluated at the first
    /// proposal always and reused for the second when the proposals are
    /// identical. One shared uniform drives both accept tests, and a proposal
    /// with non-finite log-density is rejected unconditionally.
    pub fn coupled_step(&mut self) -> bool {
        let (prop1, prop2, same_prop) = self
            .coupling
            .couple(&self.chain1.state.position, &self.chain2.state.position);
        let lp1 = self.chain1.target.unnorm_log_prob(&prop1);
        let lp2 = if same_prop {
            lp1
        } else {
            self.chain2.target.unnorm_log_prob(&prop2)
        };

        let u: T = self.rng.gen();
        let log_u = u.ln();
        let accept1 = lp1.is_finite() && log_u < lp1 - self.chain1.state.log_prob;
        let accept2 = lp2.is_finite() && log_u < lp2 - self.chain2.state.log_prob;
        if accept1 {
            self.chain1.state = ChainState {
                position: prop1,
                log_prob: lp1,
            };
        }
        if accept2 {
            self.chain2.state = ChainState {
                position: prop2,
                log_prob: lp2,
            };
        }
        self.identical = self.identical || (same_prop && accept1 && accept2);
        self.identical
    }

    /// Runs a fresh pair until it meets, returning the meeting time and the
    /// number of target-density evaluations spent.
    ///
    /// Fails with [`SamplerError::NonConvergence`] if the step counter
    /// reaches `max_iterations` before the chains meet.
    pub fn meeting_time(&mut self, max_iterations: usize) -> Result<MeetingRecord, SamplerError> {
        self.reset();
        for _ in 0..self.lag {
            self.chain1.step();
        }
        let mut t = self.lag;
        let mut cost = self.lag;
        while !self.identical {
            if t >= max_iterations {
                return Err(SamplerError::NonConvergence { max_iterations });
            }
            self.coupled_step();
            t += 1;
            cost += 2;
        }
        Ok(MeetingRecord {
            meeting_time: t,
            cost,
        })
    }

    /// Runs a fresh pair until `max(meeting_time, m)` steps, recording every
    /// visited position of both chains.
    ///
    /// After the meeting only one chain is advanced and its positions are
    /// mirrored into both histories; both chains would take identical
    /// transitions anyway, so the recorded paths are unchanged and the
    /// post-meeting equality invariant holds bit-exactly.
    pub fn trajectory(
        &mut self,
        m: usize,
        max_iterations: usize,
    ) -> Result<Trajectory<T>, SamplerError> {
        if m < self.lag {
            return Err(SamplerError::PreconditionViolation(format!(
                "horizon m = {m} must be at least the lag {}",
                self.lag
            )));
        }
        self.reset();
        let mut history1 = Vec::with_capacity(m + 1);
        let mut history2 = Vec::with_capacity(m + 1 - self.lag);
        history1.push(self.chain1.state.position.clone());
        history2.push(self.chain2.state.position.clone());
        for _ in 0..self.lag {
            history1.push(self.chain1.step().position.clone());
        }

        let mut t = self.lag;
        let mut cost = self.lag;
        while !self.identical {
            if t >= max_iterations {
                return Err(SamplerError::NonConvergence { max_iterations });
            }
            self.coupled_step();
            t += 1;
            cost += 2;
            history1.push(self.chain1.state.position.clone());
            history2.push(self.chain2.state.position.clone());
        }
        let meeting_time = t;

        while t < m {
            let position = self.chain1.step().position.clone();
            t += 1;
            cost += 1;
            history1.push(position.clone());
            history2.push(position);
        }

        Ok(Trajectory {
            history1,
            history2,
            meeting_time,
            lag: self.lag,
            cost,
        })
    }

    /// Runs a fresh pair and folds the unbiased estimator for `h` into
    /// accumulators as it goes, keeping O(1) memory instead of a recorded
    /// trajectory.
    ///
    /// Produces the same value as
    /// [`unbiased_estimate`](crate::estimators::unbiased_estimate) applied to
    /// the trajectory this run would have recorded; the trade-off is that the
    /// run cannot be reused for a second test function.
    pub fn estimate_online<H>(
        &mut self,
        h: H,
        k: usize,
        m: usize,
        max_iterations: usize,
    ) -> Result<UnbiasedEstimate<T>, SamplerError>
    where
        H: Fn(&[T]) -> T,
    {
        if k > m {
            return Err(SamplerError::PreconditionViolation(format!(
                "k = {k} must not exceed m = {m}"
            )));
        }
        if self.lag == 0 {
            return Err(SamplerError::PreconditionViolation(
                "estimation requires lag >= 1".into(),
            ));
        }
        if m < self.lag {
            return Err(SamplerError::PreconditionViolation(format!(
                "horizon m = {m} must be at least the lag {}",
                self.lag
            )));
        }

        self.reset();
        let span = T::from(m - k + 1).unwrap();
        let mut sum_h = T::zero();
        let mut correction = T::zero();

        if k == 0 {
            sum_h = sum_h + h(&self.chain1.state.position);
        }
        for t in 1..=self.lag {
            self.chain1.step();
            if t >= k && t <= m {
                sum_h = sum_h + h(&self.chain1.state.position);
            }
        }

        let mut t = self.lag;
        let mut cost = self.lag;
        while !self.identical || t < m {
            if !self.identical {
                if t >= max_iterations {
                    return Err(SamplerError::NonConvergence { max_iterations });
                }
                self.coupled_step();
                t += 1;
                cost += 2;
                if t >= k && t <= m {
                    sum_h = sum_h + h(&self.chain1.state.position);
                }
                // Bias-correction term for time t; once the pair has met the
                // difference is exactly zero, so met pairs contribute nothing.
                if !self.identical && t >= k + self.lag {
                    let coeff = correction_coefficient(t, k, m, self.lag);
                    if coeff > 0 {
                        let delta =
                            h(&self.chain1.state.position) - h(&self.chain2.state.position);
                        correction = correction + T::from(coeff).unwrap() * delta;
                    }
                }
            } else {
                self.chain1.step();
                t += 1;
                cost += 1;
                if t >= k && t <= m {
                    sum_h = sum_h + h(&self.chain1.state.position);
                }
            }
        }

        Ok(UnbiasedEstimate {
            value: (sum_h + correction) / span,
            cost,
        })
    }
}

impl<T, D, Q, C, I> CoupledSampler<T> for CoupledMetropolis<T, D, Q, C, I>
where
    T: Float,
    D: TargetDistribution<T> + Clone,
    Q: ProposalDistribution<T> + Clone,
    C: ProposalCoupling<T>,
    I: InitialDistribution<T>,
    rand_distr::Standard: Distribution<T>,
{
    fn set_seed(self, seed: u64) -> Self {
        CoupledMetropolis::set_seed(self, seed)
    }

    fn meeting_time(&mut self, max_iterations: usize) -> Result<MeetingRecord, SamplerError> {
        CoupledMetropolis::meeting_time(self, max_iterations)
    }

    fn trajectory(
        &mut self,
        m: usize,
        max_iterations: usize,
    ) -> Result<Trajectory<T>, SamplerError> {
        CoupledMetropolis::trajectory(self, m, max_iterations)
    }
}
