/*!
Unbiased MCMC estimation with coupled Markov chains.

This crate implements the coupled-chain debiasing technique for Markov chain
Monte Carlo: a lagged pair of chains is run with a coupled transition kernel
until both chains occupy exactly the same state, and the recorded pair of
trajectories yields estimators of stationary expectations with *zero* bias and
finite variance. Because the bias is removed exactly, estimates from
independent replicates can be averaged trivially, which makes the method
embarrassingly parallel.

The crate ships a Normal random-walk Metropolis kernel and a maximal coupling
of its proposals, but all of the coupling and estimation machinery is generic
over the traits in [`distributions`] and [`coupling`].

# Example

```rust
use coupled_mcmc::coupled_metropolis::CoupledMetropolis;
use coupled_mcmc::coupling::MaximalCoupling;
use coupled_mcmc::distributions::{GaussianInit, IsotropicGaussian};
use coupled_mcmc::estimators::unbiased_estimate;

// Target: standard Normal in one dimension (up to a constant).
let target = IsotropicGaussian::new(1.0);
let proposal = IsotropicGaussian::new(0.5);
let coupling = MaximalCoupling::new(
    IsotropicGaussian::new(0.5),
    IsotropicGaussian::new(0.5),
);
let init = GaussianInit::standard(1);

let mut sampler =
    CoupledMetropolis::new(target, proposal, coupling, init, 1).set_seed(42);
let trajectory = sampler.trajectory(100, 100_000).unwrap();
let estimate = unbiased_estimate(&trajectory, |x: &[f64]| x[0], 10, 100).unwrap();
assert!(estimate.value.is_finite());
```
*/

pub mod core;
pub mod coupled_metropolis;
pub mod coupling;
pub mod distributions;
pub mod estimators;
pub mod histogram;
pub mod ks_test;
pub mod metropolis;
