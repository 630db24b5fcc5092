use indicatif::{ProgressBar, ProgressStyle};
use num_traits::Float;
use rayon::prelude::*;
use thiserror::Error;

/// Errors surfaced by the samplers and estimators.
///
/// The two variants are deliberately distinct: a precondition violation means
/// the caller passed arguments that can never be valid, while non-convergence
/// means a run hit its iteration cap before the chains met.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SamplerError {
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    #[error("chains failed to meet within {max_iterations} iterations")]
    NonConvergence { max_iterations: usize },
}

/// The state of one Markov chain: a position plus the cached target
/// log-density at that position, so a transition never re-evaluates the
/// density of the state it starts from.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainState<T> {
    pub position: Vec<T>,
    pub log_prob: T,
}

/// The outcome of one meeting-time run.
///
/// `cost` counts target-density evaluations: one per single-chain step, two
/// per coupled step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingRecord {
    pub meeting_time: usize,
    pub cost: usize,
}

/// One unbiased sample of a stationary expectation, together with the number
/// of kernel evaluations spent producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct UnbiasedEstimate<T> {
    pub value: T,
    pub cost: usize,
}

/// The recorded path of a lagged chain pair.
///
/// `history1[t]` is the position of the leading chain at time `t`, for
/// `t = 0..=max(m, meeting_time)`; `history2[s]` is the position of the
/// lagged chain at time `s`, for `s = 0..=max(m, meeting_time) - lag`.
/// For all `t >= meeting_time` the two chains have coalesced and
/// `history1[t] == history2[t - lag]` holds bit-exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory<T> {
    pub history1: Vec<Vec<T>>,
    pub history2: Vec<Vec<T>>,
    pub meeting_time: usize,
    pub lag: usize,
    pub cost: usize,
}

impl<T: Float> Trajectory<T> {
    /// Dimension of the sampled positions.
    pub fn dim(&self) -> usize {
        self.history1.first().map_or(0, |p| p.len())
    }

    /// Largest time index recorded for the leading chain.
    pub fn horizon(&self) -> usize {
        self.history1.len().saturating_sub(1)
    }

    /// Checks the post-meeting collapse invariant: from the meeting time
    /// onward both histories describe the same realized path, so equality is
    /// exact rather than approximate.
    pub fn coalesced(&self) -> bool {
        (self.meeting_time..self.history1.len()).all(|t| {
            self.history2
                .get(t - self.lag)
                .is_some_and(|y| *y == self.history1[t])
        })
    }
}

/// A single Markov chain that can be advanced one transition at a time.
pub trait MarkovChain<T> {
    /// Does one iteration of the chain, returning the new current state.
    fn step(&mut self) -> &ChainState<T>;

    /// Get the current state without stepping.
    fn current_state(&self) -> &ChainState<T>;
}

/// Anything that can run a lagged chain pair to coalescence. Implemented by
/// [`CoupledMetropolis`](crate::coupled_metropolis::CoupledMetropolis); the
/// replicate runners below only rely on this trait.
pub trait CoupledSampler<T> {
    /// Returns a re-seeded copy; every internal random stream must be derived
    /// from `seed` so that replicates with distinct seeds are independent.
    fn set_seed(self, seed: u64) -> Self
    where
        Self: Sized;

    /// Runs a fresh chain pair until it meets, at the stopping time
    /// `tau = inf{t >= lag : X_t = Y_{t-lag}}`.
    fn meeting_time(&mut self, max_iterations: usize) -> Result<MeetingRecord, SamplerError>;

    /// Runs a fresh chain pair until `max(meeting_time, m)` and records both
    /// paths.
    fn trajectory(&mut self, m: usize, max_iterations: usize)
        -> Result<Trajectory<T>, SamplerError>;
}

fn check_replicates(n_replicates: usize) -> Result<(), SamplerError> {
    if n_replicates == 0 {
        return Err(SamplerError::PreconditionViolation(
            "n_replicates must be positive".into(),
        ));
    }
    Ok(())
}

fn replicate_bar(n_replicates: usize) -> ProgressBar {
    let pb = ProgressBar::new(n_replicates as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{prefix} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("##-"),
    );
    pb.set_prefix("Replicates");
    pb
}

/// Runs `n_replicates` independent trajectory samplers in parallel, one per
/// rayon task. Replicate `i` is seeded with `seed + i`.
pub fn sample_trajectories<T, S, F>(
    factory: F,
    n_replicates: usize,
    seed: u64,
    m: usize,
    max_iterations: usize,
) -> Result<Vec<Trajectory<T>>, SamplerError>
where
    T: Float + Send,
    S: CoupledSampler<T>,
    F: Fn() -> S + Sync,
{
    check_replicates(n_replicates)?;
    (0..n_replicates)
        .into_par_iter()
        .map(|i| {
            let mut sampler = factory().set_seed(seed + i as u64);
            sampler.trajectory(m, max_iterations)
        })
        .collect()
}

/// Like [`sample_trajectories`], with a progress bar over replicates.
pub fn sample_trajectories_progress<T, S, F>(
    factory: F,
    n_replicates: usize,
    seed: u64,
    m: usize,
    max_iterations: usize,
) -> Result<Vec<Trajectory<T>>, SamplerError>
where
    T: Float + Send,
    S: CoupledSampler<T>,
    F: Fn() -> S + Sync,
{
    check_replicates(n_replicates)?;
    let pb = replicate_bar(n_replicates);
    let out = (0..n_replicates)
        .into_par_iter()
        .map(|i| {
            let mut sampler = factory().set_seed(seed + i as u64);
            let result = sampler.trajectory(m, max_iterations);
            pb.inc(1);
            result
        })
        .collect();
    pb.finish_with_message("Done!");
    out
}

/// Samples `n_replicates` independent meeting times in parallel. The
/// empirical meeting-time distribution is what guides the choice of the
/// burn-in `k` and horizon `m` passed to the estimators.
pub fn sample_meeting_times<T, S, F>(
    factory: F,
    n_replicates: usize,
    seed: u64,
    max_iterations: usize,
) -> Result<Vec<MeetingRecord>, SamplerError>
where
    T: Float + Send,
    S: CoupledSampler<T>,
    F: Fn() -> S + Sync,
{
    check_replicates(n_replicates)?;
    (0..n_replicates)
        .into_par_iter()
        .map(|i| {
            let mut sampler = factory().set_seed(seed + i as u64);
            sampler.meeting_time(max_iterations)
        })
        .collect()
}

/// Like [`sample_meeting_times`], with a progress bar over replicates.
pub fn sample_meeting_times_progress<T, S, F>(
    factory: F,
    n_replicates: usize,
    seed: u64,
    max_iterations: usize,
) -> Result<Vec<MeetingRecord>, SamplerError>
where
    T: Float + Send,
    S: CoupledSampler<T>,
    F: Fn() -> S + Sync,
{
    check_replicates(n_replicates)?;
    let pb = replicate_bar(n_replicates);
    let out = (0..n_replicates)
        .into_par_iter()
        .map(|i| {
            let mut sampler = factory().set_seed(seed + i as u64);
            let result = sampler.meeting_time(max_iterations);
            pb.inc(1);
            result
        })
        .collect();
    pb.finish_with_message("Done!");
    out
}
