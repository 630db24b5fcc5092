//! End-to-end checks of the unbiased-estimation pipeline on a standard
//! Normal target: unbiasedness of the averaged estimator, invariance to the
//! choice of (k, m), and reconstruction of the marginal density by the
//! histogram aggregator.

use coupled_mcmc::core::{sample_meeting_times, sample_trajectories, SamplerError};
use coupled_mcmc::coupled_metropolis::CoupledMetropolis;
use coupled_mcmc::coupling::MaximalCoupling;
use coupled_mcmc::distributions::{GaussianInit, IsotropicGaussian};
use coupled_mcmc::estimators::{average, unbiased_estimates};
use coupled_mcmc::histogram::{histogram, Bins};

type StandardSampler = CoupledMetropolis<
    f64,
    IsotropicGaussian<f64>,
    IsotropicGaussian<f64>,
    MaximalCoupling<IsotropicGaussian<f64>>,
    GaussianInit<f64>,
>;

const PROPOSAL_STD: f64 = 0.5;
const MAX_ITERATIONS: usize = 1_000_000;

fn standard_factory() -> StandardSampler {
    CoupledMetropolis::new(
        IsotropicGaussian::new(1.0),
        IsotropicGaussian::new(PROPOSAL_STD),
        MaximalCoupling::new(
            IsotropicGaussian::new(PROPOSAL_STD),
            IsotropicGaussian::new(PROPOSAL_STD),
        ),
        GaussianInit::standard(1),
        1,
    )
}

/// Standard Normal density.
fn normal_density(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * std::f64::consts::PI).sqrt()
}

#[test]
fn test_unbiased_mean_and_second_moment() {
    const N_REPLICATES: usize = 1_000;
    const K: usize = 50;
    const M: usize = 250;

    let trajectories =
        sample_trajectories(standard_factory, N_REPLICATES, 42, M, MAX_ITERATIONS).unwrap();

    let (mean, mean_se) =
        average(&unbiased_estimates(&trajectories, |x| x[0], K, M).unwrap()).unwrap();
    assert!(
        mean.abs() < 0.1,
        "averaged estimate {mean} too far from E[x] = 0 (se {mean_se})"
    );
    assert!(mean_se.is_finite() && mean_se < 0.05, "se {mean_se} too large");

    let (second, second_se) =
        average(&unbiased_estimates(&trajectories, |x| x[0] * x[0], K, M).unwrap()).unwrap();
    assert!(
        (second - 1.0).abs() < 0.1,
        "averaged estimate {second} too far from E[x^2] = 1 (se {second_se})"
    );
}

#[test]
fn test_standard_error_shrinks_with_replicates() {
    const K: usize = 20;
    const M: usize = 120;

    let trajectories =
        sample_trajectories(standard_factory, 800, 7, M, MAX_ITERATIONS).unwrap();
    let estimates = unbiased_estimates(&trajectories, |x| x[0], K, M).unwrap();
    let (_, se_small) = average(&estimates[..200]).unwrap();
    let (_, se_full) = average(&estimates).unwrap();
    // Quadrupling the batch should halve the standard error, give or take.
    assert!(
        se_full < se_small,
        "standard error did not shrink: {se_small} -> {se_full}"
    );
}

#[test]
fn test_estimate_invariant_to_k_m_choice() {
    const N_REPLICATES: usize = 600;

    let trajectories =
        sample_trajectories(standard_factory, N_REPLICATES, 11, 250, MAX_ITERATIONS).unwrap();
    let (mean_a, se_a) =
        average(&unbiased_estimates(&trajectories, |x| x[0], 50, 250).unwrap()).unwrap();
    let (mean_b, se_b) =
        average(&unbiased_estimates(&trajectories, |x| x[0], 100, 200).unwrap()).unwrap();
    // Both target E[x] = 0; they may differ only by Monte Carlo noise.
    let tolerance = 4.0 * (se_a + se_b) + 0.02;
    assert!(
        (mean_a - mean_b).abs() < tolerance,
        "estimates {mean_a} and {mean_b} differ beyond noise ({se_a}, {se_b})"
    );
}

#[test]
fn test_histogram_reconstructs_normal_density() {
    const N_REPLICATES: usize = 2_000;
    const K: usize = 50;
    const M: usize = 250;
    const N_BINS: usize = 50;

    let trajectories =
        sample_trajectories(standard_factory, N_REPLICATES, 3, M, MAX_ITERATIONS).unwrap();
    let edges: Vec<f64> = (0..=N_BINS)
        .map(|i| -4.0 + 8.0 * i as f64 / N_BINS as f64)
        .collect();
    let bins = histogram(&trajectories, 0, K, M, Bins::Edges(edges)).unwrap();
    assert_eq!(bins.len(), N_BINS);

    let covered = bins
        .iter()
        .filter(|bin| {
            let truth = normal_density(bin.midpoint()) * bin.width();
            bin.ci_lo <= truth && truth <= bin.ci_hi
        })
        .count();
    assert!(
        covered * 100 >= N_BINS * 85,
        "only {covered}/{N_BINS} bins cover the true density"
    );

    // The recovered masses should add up to roughly all of the probability.
    let total: f64 = bins.iter().map(|b| b.mass).sum();
    assert!(
        (total - 1.0).abs() < 0.05,
        "total recovered mass {total} far from 1"
    );
}

#[test]
fn test_meeting_times_have_light_tail() {
    let records = sample_meeting_times(standard_factory, 500, 23, MAX_ITERATIONS).unwrap();
    assert!(records.iter().all(|r| r.meeting_time >= 2));
    let mean_tau =
        records.iter().map(|r| r.meeting_time as f64).sum::<f64>() / records.len() as f64;
    // Standard Normal target with sigma = 0.5 proposals meets in tens of
    // steps; anything much larger signals a broken coupling.
    assert!(mean_tau < 200.0, "mean meeting time {mean_tau} suspiciously large");
}

#[test]
fn test_replicate_runs_are_deterministic() {
    let a = sample_trajectories(standard_factory, 20, 99, 60, MAX_ITERATIONS).unwrap();
    let b = sample_trajectories(standard_factory, 20, 99, 60, MAX_ITERATIONS).unwrap();
    assert_eq!(a, b);
    assert!(a.iter().all(|t| t.coalesced()));
}

#[test]
fn test_runner_propagates_non_convergence() {
    let result = sample_trajectories(standard_factory, 10, 1, 60, 3);
    assert!(matches!(
        result,
        Err(SamplerError::NonConvergence { max_iterations: 3 })
    ));
}
