/*!
Single-chain random-walk Metropolis–Hastings kernel.

This is the plain (uncoupled) transition the lagged chain pair falls back to:
the leading chain is advanced with it during the initial lag phase, and once
the pair has met only one chain needs stepping. The chain caches the target
log-density of its current position so each transition evaluates the target
exactly once.

# Examples

```rust
use coupled_mcmc::core::MarkovChain;
use coupled_mcmc::distributions::IsotropicGaussian;
use coupled_mcmc::metropolis::MetropolisChain;

let target = IsotropicGaussian::new(1.0);
let proposal = IsotropicGaussian::new(0.5);
let mut chain = MetropolisChain::new(target, proposal, &[0.0, 0.0]).set_seed(42);
let state = chain.step();
assert_eq!(state.position.len(), 2);
```
*/

use num_traits::Float;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::Distribution;

use crate::core::{ChainState, MarkovChain};
use crate::distributions::{ProposalDistribution, TargetDistribution};

/// A single Markov chain for the Metropolis–Hastings algorithm.
///
/// The chain stores its own copies of the target and proposal distributions,
/// its current [`ChainState`], and a chain-specific random number generator.
#[derive(Debug, Clone)]
pub struct MetropolisChain<T, D, Q> {
    /// The target distribution to sample from.
    pub target: D,
    /// The proposal distribution used to generate candidate states.
    pub proposal: Q,
    /// The current state, with the target log-density cached.
    pub state: ChainState<T>,
    /// The chain-specific random seed.
    pub seed: u64,
    /// The random number generator for this chain.
    pub rng: SmallRng,
}

impl<T, D, Q> MetropolisChain<T, D, Q>
where
    T: Float,
    D: TargetDistribution<T>,
    Q: ProposalDistribution<T>,
{
    pub fn new(target: D, proposal: Q, initial_position: &[T]) -> Self {
        let seed = rand::thread_rng().gen::<u64>();
        let log_prob = target.unnorm_log_prob(initial_position);
        Self {
            target,
            proposal,
            state: ChainState {
                position: initial_position.to_vec(),
                log_prob,
            },
            seed,
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Returns a re-seeded copy of this chain; the proposal's stream is
    /// derived from the same seed.
    pub fn set_seed(mut self, seed: u64) -> Self {
        let mut root = SmallRng::seed_from_u64(seed);
        self.proposal = self.proposal.set_seed(root.gen());
        self.seed = seed;
        self.rng = SmallRng::seed_from_u64(root.gen());
        self
    }

    /// Moves the chain to `position`, recomputing the cached log-density.
    /// Used when a fresh replicate re-draws its starting point.
    pub fn reset_position(&mut self, position: Vec<T>) {
        self.state.log_prob = self.target.unnorm_log_prob(&position);
        self.state.position = position;
    }
}

impl<T, D, Q> MarkovChain<T> for MetropolisChain<T, D, Q>
where
    T: Float,
    D: TargetDistribution<T>,
    Q: ProposalDistribution<T>,
    rand_distr::Standard: Distribution<T>,
{
    /// Performs one Metropolis–Hastings update.
    ///
    /// A candidate is proposed, the log acceptance ratio
    /// `[log p(prop) + log q(cur|prop)] - [log p(cur) + log q(prop|cur)]`
    /// is compared against the log of a uniform draw, and the candidate
    /// replaces the current state on acceptance. A candidate with non-finite
    /// target log-density is rejected unconditionally.
    fn step(&mut self) -> &ChainState<T> {
        let proposed = self.proposal.sample(&self.state.position);
        let proposed_lp = self.target.unnorm_log_prob(&proposed);
        if proposed_lp.is_finite() {
            let log_q_forward = self.proposal.log_prob(&self.state.position, &proposed);
            let log_q_backward = self.proposal.log_prob(&proposed, &self.state.position);
            let log_accept_ratio =
                (proposed_lp + log_q_backward) - (self.state.log_prob + log_q_forward);
            let u: T = self.rng.gen();
            if log_accept_ratio > u.ln() {
                self.state = ChainState {
                    position: proposed,
                    log_prob: proposed_lp,
                };
            }
        }
        &self.state
    }

    fn current_state(&self) -> &ChainState<T> {
        &self.state
    }
}
