/*!
Maximal coupling of two proposal distributions.

A coupling of distributions `p` and `q` is a joint draw `(X, Y)` whose
marginals are exactly `p` and `q`. A *maximal* coupling additionally returns
`X == Y` with the largest achievable probability, namely `1 - TV(p, q)` where
`TV` is the total-variation distance. Meeting of the coupled chains is driven
entirely by this event, so the coupling quality directly controls how fast the
debiasing machinery terminates.

[`MaximalCoupling`] implements the standard rejection construction: draw
`X ~ p` and accept it as `Y` too with probability `min(1, q(X)/p(X))`;
otherwise draw `Y ~ q` repeatedly until a draw lands in the part of `q` not
covered by `p`.

# Examples

```rust
use coupled_mcmc::coupling::{MaximalCoupling, ProposalCoupling};
use coupled_mcmc::distributions::IsotropicGaussian;

let mut coupling = MaximalCoupling::new(
    IsotropicGaussian::new(1.0),
    IsotropicGaussian::new(1.0),
)
.set_seed(42);

let (x, y, identical) = coupling.couple(&[0.0], &[1.0]);
assert_eq!(x.len(), 1);
assert_eq!(y.len(), 1);
if identical {
    assert_eq!(x, y);
}
```
*/

use num_traits::Float;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::Distribution;

use crate::distributions::ProposalDistribution;

/// A joint draw from a pair of proposal distributions centered at two (in
/// general different) points.
pub trait ProposalCoupling<T: Float> {
    /// Draws `(x, y, identical)` where `x` has the first proposal's
    /// distribution given `from1`, `y` has the second proposal's distribution
    /// given `from2`, and `identical` reports whether `x == y` as realized
    /// values (not merely numerically equal by accident).
    fn couple(&mut self, from1: &[T], from2: &[T]) -> (Vec<T>, Vec<T>, bool);

    /// Returns a new instance seeded with `seed`.
    fn set_seed(self, seed: u64) -> Self;
}

/**
Rejection-sampler maximal coupling of two proposal distributions from the same
family.

Both component distributions must report *normalized* log-densities through
[`ProposalDistribution::log_prob`]; the acceptance tests compare densities
across the two distributions, so unnormalized values would bias the coupling.

The rejection loop in [`couple`](ProposalCoupling::couple) is deliberately
left without an iteration cap: capping it would change the marginal law of the
second coordinate and void the exactness guarantee the debiasing estimators
rest on. The expected number of iterations is `1 / TV(p, q)`-ish and grows
when the two densities are poorly matched (e.g. very different scales), which
shows up as latency, never as an incorrect sample.
*/
#[derive(Debug, Clone)]
pub struct MaximalCoupling<Q> {
    /// Proposal distribution of the first (leading) chain.
    pub first: Q,
    /// Proposal distribution of the second (lagged) chain.
    pub second: Q,
    /// Seed of the shared accept/reject stream.
    pub seed: u64,
    rng: SmallRng,
}

impl<Q> MaximalCoupling<Q> {
    pub fn new(first: Q, second: Q) -> Self {
        let seed = rand::thread_rng().gen::<u64>();
        Self {
            first,
            second,
            seed,
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl<T, Q> ProposalCoupling<T> for MaximalCoupling<Q>
where
    T: Float,
    Q: ProposalDistribution<T>,
    rand_distr::Standard: Distribution<T>,
{
    fn couple(&mut self, from1: &[T], from2: &[T]) -> (Vec<T>, Vec<T>, bool) {
        let x = self.first.sample(from1);
        let lp_first = self.first.log_prob(from1, &x);
        let lp_second = self.second.log_prob(from2, &x);

        // Accept x for both coordinates with probability min(1, q(x)/p(x)).
        let u: T = self.rng.gen();
        if u.ln() + lp_first <= lp_second {
            return (x.clone(), x, true);
        }

        // Residual part of q: resample until a draw falls outside p.
        loop {
            let y = self.second.sample(from2);
            let w: T = self.rng.gen();
            if w.ln() + self.second.log_prob(from2, &y) > self.first.log_prob(from1, &y) {
                return (x, y, false);
            }
        }
    }

    fn set_seed(mut self, seed: u64) -> Self {
        // Derive distinct sub-seeds so the three streams never overlap.
        let mut root = SmallRng::seed_from_u64(seed);
        self.first = self.first.set_seed(root.gen::<u64>());
        self.second = self.second.set_seed(root.gen::<u64>());
        self.seed = seed;
        self.rng = SmallRng::seed_from_u64(root.gen::<u64>());
        self
    }
}
