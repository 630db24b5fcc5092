/*!
Target, proposal, and initial distributions for the coupled samplers, plus the
traits they implement.

The traits are the seams of the crate: the coupling machinery in
[`coupled_metropolis`](crate::coupled_metropolis) only ever sees a
[`TargetDistribution`], a [`ProposalDistribution`], and an
[`InitialDistribution`], so any kernel family satisfying the contracts can be
plugged in. The module is generic over the floating-point precision via
[`num_traits::Float`].

# Examples

```rust
use coupled_mcmc::distributions::{IsotropicGaussian, ProposalDistribution, TargetDistribution};

let mut proposal: IsotropicGaussian<f64> = IsotropicGaussian::new(1.0).set_seed(7);
let current = vec![0.0, 0.0];
let candidate = proposal.sample(&current);
assert_eq!(candidate.len(), 2);

// The same struct also serves as a zero-mean Gaussian target.
let target = IsotropicGaussian::new(1.0);
assert!(target.unnorm_log_prob(&[0.5, -0.5]) < 0.0);
```
*/

use ndarray::{Array1, Array2};
use num_traits::Float;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, StandardNormal};
use std::f64::consts::PI;

/// A trait for generating proposals in Metropolis–Hastings style algorithms.
///
/// The coupled kernel additionally assumes the proposal is *symmetric*
/// (`log_prob(a, b) == log_prob(b, a)`), which holds for the random-walk
/// proposals defined here.
pub trait ProposalDistribution<T: Float> {
    /// Samples a new point from q(x' | x).
    fn sample(&mut self, current: &[T]) -> Vec<T>;

    /// Evaluates log q(x' | x), normalized. The coupling rejection sampler
    /// compares densities of *different* proposal distributions, so unlike a
    /// plain Metropolis–Hastings correction the normalizing constant must be
    /// included here.
    fn log_prob(&self, from: &[T], to: &[T]) -> T;

    /// Returns a new instance of this proposal distribution seeded with `seed`.
    fn set_seed(self, seed: u64) -> Self;
}

/// A trait for continuous target distributions from which we want to sample.
pub trait TargetDistribution<T: Float> {
    /// Returns the log of the unnormalized density at `theta`.
    fn unnorm_log_prob(&self, theta: &[T]) -> T;
}

/// A trait for distributions that provide a normalized log-density (e.g., for
/// diagnostics and tests).
pub trait Normalized<T: Float> {
    /// Returns the normalized log-density at `theta`.
    fn log_prob(&self, theta: &[T]) -> T;
}

/// A trait for the distribution of a chain's starting position. Each chain of
/// a coupled pair draws its own independent starting point.
pub trait InitialDistribution<T: Float> {
    /// Draws one starting position.
    fn draw(&mut self) -> Vec<T>;

    /// Returns a new instance seeded with `seed`.
    fn set_seed(self, seed: u64) -> Self;
}

/**
An isotropic Gaussian, usable both as a random-walk proposal distribution and
as a zero-mean target.

As a proposal it adds independent Gaussian noise (mean 0, standard deviation
`std`) to each coordinate of the current state; as a target it is the
unnormalized density of `N(0, std^2 I)`.

# Examples

```rust
use coupled_mcmc::distributions::{IsotropicGaussian, ProposalDistribution};

let mut proposal: IsotropicGaussian<f64> = IsotropicGaussian::new(1.0);
let candidate = proposal.sample(&[0.0, 0.0]);
assert_eq!(candidate.len(), 2);
```
*/
#[derive(Debug, Clone)]
pub struct IsotropicGaussian<T: Float> {
    pub std: T,
    rng: SmallRng,
}

impl<T: Float> IsotropicGaussian<T> {
    /// Creates a new isotropic Gaussian with the given standard deviation.
    pub fn new(std: T) -> Self {
        Self {
            std,
            rng: SmallRng::from_entropy(),
        }
    }
}

impl<T: Float> ProposalDistribution<T> for IsotropicGaussian<T>
where
    StandardNormal: Distribution<T>,
{
    fn sample(&mut self, current: &[T]) -> Vec<T> {
        let normal = Normal::new(T::zero(), self.std)
            .expect("Expecting creation of normal distribution to succeed.");
        normal
            .sample_iter(&mut self.rng)
            .zip(current)
            .map(|(eps, &x)| x + eps)
            .collect()
    }

    fn log_prob(&self, from: &[T], to: &[T]) -> T {
        let d = T::from(from.len()).unwrap();
        let two = T::from(2.0).unwrap();
        let var = self.std * self.std;
        let mut lp = -d * T::from(0.5).unwrap() * (two * T::from(PI).unwrap() * var).ln();
        for (&f, &t) in from.iter().zip(to.iter()) {
            let diff = t - f;
            lp = lp - diff * diff / (two * var);
        }
        lp
    }

    fn set_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }
}

impl<T: Float> TargetDistribution<T> for IsotropicGaussian<T> {
    fn unnorm_log_prob(&self, theta: &[T]) -> T {
        let mut sum = T::zero();
        for &x in theta.iter() {
            sum = sum + x * x;
        }
        -T::from(0.5).unwrap() * sum / (self.std * self.std)
    }
}

/**
A 2D Gaussian target parameterized by a mean vector and a 2×2 covariance
matrix.

# Examples

```rust
use coupled_mcmc::distributions::{Gaussian2D, Normalized};
use ndarray::{arr1, arr2};

let gauss: Gaussian2D<f64> = Gaussian2D {
    mean: arr1(&[0.0, 0.0]),
    cov: arr2(&[[1.0, 0.0], [0.0, 1.0]]),
};
let lp = gauss.log_prob(&[0.5, -0.5]);
assert!(lp < 0.0);
```
*/
#[derive(Debug, Clone)]
pub struct Gaussian2D<T: Float> {
    pub mean: Array1<T>,
    pub cov: Array2<T>,
}

impl<T: Float> Gaussian2D<T> {
    fn quad_form(&self, theta: &[T]) -> (T, T) {
        let (a, b, c, d) = (
            self.cov[(0, 0)],
            self.cov[(0, 1)],
            self.cov[(1, 0)],
            self.cov[(1, 1)],
        );
        let det = a * d - b * c;
        let dx = theta[0] - self.mean[0];
        let dy = theta[1] - self.mean[1];
        // diff' * inv(cov) * diff, with the 2x2 inverse written out.
        let quad = (d * dx * dx - (b + c) * dx * dy + a * dy * dy) / det;
        (quad, det)
    }
}

impl<T: Float> TargetDistribution<T> for Gaussian2D<T> {
    fn unnorm_log_prob(&self, theta: &[T]) -> T {
        let (quad, _) = self.quad_form(theta);
        -T::from(0.5).unwrap() * quad
    }
}

impl<T: Float> Normalized<T> for Gaussian2D<T> {
    /// Computes the fully normalized log-density of the 2D Gaussian.
    fn log_prob(&self, theta: &[T]) -> T {
        let (quad, det) = self.quad_form(theta);
        let half = T::from(0.5).unwrap();
        let two_pi = T::from(2.0 * PI).unwrap();
        -two_pi.ln() - half * det.abs().ln() - half * quad
    }
}

/**
The distribution of a chain's starting position: independent Gaussian noise
with standard deviation `std` around a fixed mean vector.

# Examples

```rust
use coupled_mcmc::distributions::{GaussianInit, InitialDistribution};

let mut init: GaussianInit<f64> = GaussianInit::standard(2).set_seed(3);
let start = init.draw();
assert_eq!(start.len(), 2);
```
*/
#[derive(Debug, Clone)]
pub struct GaussianInit<T: Float> {
    pub mean: Vec<T>,
    pub std: T,
    rng: SmallRng,
}

impl<T: Float> GaussianInit<T> {
    pub fn new(mean: Vec<T>, std: T) -> Self {
        Self {
            mean,
            std,
            rng: SmallRng::from_entropy(),
        }
    }

    /// Standard Normal starting distribution in `dim` dimensions.
    pub fn standard(dim: usize) -> Self {
        Self::new(vec![T::zero(); dim], T::one())
    }
}

impl<T: Float> InitialDistribution<T> for GaussianInit<T>
where
    StandardNormal: Distribution<T>,
{
    fn draw(&mut self) -> Vec<T> {
        self.mean
            .iter()
            .map(|&m| m + self.std * self.rng.sample(StandardNormal))
            .collect()
    }

    fn set_seed(mut self, seed: u64) -> Self {
        self.rng = SmallRng::seed_from_u64(seed);
        self
    }
}
