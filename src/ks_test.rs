//! A minimal two-sample Kolmogorov–Smirnov test, used by the coupling tests
//! to check that the coupled draws keep their prescribed marginals.

use std::cmp::Ordering;

/// Stores the result of a two-sample KS test: whether the null hypothesis
/// (same distribution) is rejected at `level`, along with the statistic and
/// p-value.
#[derive(Debug)]
pub struct TestResult {
    pub is_rejected: bool,
    pub statistic: f64,
    pub p_value: f64,
    pub level: f64,
}

/// Performs a two-sample KS test at the given significance level. Sorts both
/// slices in place.
pub fn two_sample_ks_test(
    sample_1: &mut [f64],
    sample_2: &mut [f64],
    level: f64,
) -> Result<TestResult, String> {
    let statistic = ks_statistic(sample_1, sample_2)?;
    let p_value = ks_p_value(statistic, sample_1.len(), sample_2.len())?;
    Ok(TestResult {
        is_rejected: p_value < level,
        statistic,
        p_value,
        level,
    })
}

/// Computes the two-sample KS statistic: the maximum distance between the two
/// empirical distribution functions.
fn ks_statistic(sample_1: &mut [f64], sample_2: &mut [f64]) -> Result<f64, String> {
    if sample_1.is_empty() || sample_2.is_empty() {
        return Err("Expected both samples to be non-empty.".into());
    }
    sample_1.sort_unstable_by(cmp_f64);
    sample_2.sort_unstable_by(cmp_f64);

    let (n, m) = (sample_1.len() as f64, sample_2.len() as f64);
    let (mut i, mut j) = (0usize, 0usize);
    let mut max_diff = 0.0f64;
    while i < sample_1.len() && j < sample_2.len() {
        let x = sample_1[i].min(sample_2[j]);
        // Step both ECDFs past every observation equal to x, so ties move
        // the two curves together before the gap is measured.
        while i < sample_1.len() && sample_1[i] <= x {
            i += 1;
        }
        while j < sample_2.len() && sample_2[j] <= x {
            j += 1;
        }
        let diff = (i as f64 / n - j as f64 / m).abs();
        max_diff = max_diff.max(diff);
    }
    Ok(max_diff)
}

/// Asymptotic p-value for the two-sample case; requires both sample sizes to
/// exceed 7 for accuracy.
fn ks_p_value(statistic: f64, n1: usize, n2: usize) -> Result<f64, String> {
    if n1 <= 7 || n2 <= 7 {
        return Err("Requires sample sizes > 7 for accuracy.".into());
    }
    let factor = ((n1 as f64 * n2 as f64) / (n1 as f64 + n2 as f64)).sqrt();
    let p_value = qks(factor * statistic)?;
    Ok(p_value.clamp(0.0, 1.0))
}

/// CDF of the Kolmogorov–Smirnov distribution, per the series expansions in
/// *Numerical Recipes* (Third Edition).
fn pks(z: f64) -> Result<f64, String> {
    if z < 0.0 {
        return Err("Bad z for KS distribution function.".into());
    }
    if z == 0.0 {
        return Ok(0.0);
    }
    if z < 1.18 {
        let y = (-1.233_700_550_136_169_7 / z.powi(2)).exp();
        return Ok(2.256_758_334_191_025
            * (-y.ln()).sqrt()
            * (y + y.powf(9.) + y.powf(25.) + y.powf(49.)));
    }
    let x = (-2. * z.powi(2)).exp();
    Ok(1. - 2. * (x - x.powf(4.) + x.powf(9.)))
}

/// Complementary CDF of the Kolmogorov–Smirnov distribution.
fn qks(z: f64) -> Result<f64, String> {
    if z < 0.0 {
        return Err("Bad z for KS distribution function.".into());
    }
    if z == 0.0 {
        return Ok(1.0);
    }
    if z < 1.18 {
        return Ok(1. - pks(z)?);
    }
    let x = (-2. * z.powi(2)).exp();
    Ok(2. * (x - x.powf(4.) + x.powf(9.)))
}

/// Total order on f64 that sorts NaN after every real value.
fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    if a.is_nan() {
        return Ordering::Greater;
    }
    if b.is_nan() {
        return Ordering::Less;
    }
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ks_simple_case() {
        let mut s1 = [1.0, 2.0, 3.0];
        let mut s2 = [2.0, 3.0, 4.0];
        let d = ks_statistic(&mut s1, &mut s2).unwrap();
        assert!((d - 1.0 / 3.0).abs() < 1e-9, "Expected D ~ 1/3, got {}", d);
    }

    #[test]
    fn test_ks_identical_samples() {
        let mut s1 = [1.0, 2.0, 3.0];
        let mut s2 = [1.0, 2.0, 3.0];
        assert_eq!(ks_statistic(&mut s1, &mut s2).unwrap(), 0.0);
    }

    #[test]
    fn test_ks_non_overlapping() {
        let mut s1 = [1.0, 2.0, 3.0];
        let mut s2 = [10.0, 11.0, 12.0];
        assert_eq!(ks_statistic(&mut s1, &mut s2).unwrap(), 1.0);
    }

    #[test]
    fn test_ks_repeated_values() {
        let mut s1 = [1.0, 1.0, 1.0, 2.0, 2.0];
        let mut s2 = [1.0, 1.0, 2.0, 2.0, 2.0];
        let d = ks_statistic(&mut s1, &mut s2).unwrap();
        assert!((d - 0.2).abs() < 1e-6, "Expected ~0.2, got {}", d);
    }

    #[test]
    fn test_ks_rep_similar() {
        let mut s1: Vec<f64> = [0.12, 0.25, 0.25, 0.78, 0.99, 0.33, 0.15, 0.5]
            .iter()
            .cycle()
            .take(8 * 20)
            .copied()
            .collect();
        let mut s2: Vec<f64> = [0.12, 0.25, 0.25, 0.78, 0.99, 0.33, 0.15, 0.51]
            .iter()
            .cycle()
            .take(8 * 20)
            .copied()
            .collect();
        let result = two_sample_ks_test(&mut s1, &mut s2, 0.05).unwrap();
        assert!((result.statistic - 0.125).abs() < 1e-9, "D mismatch");
        assert!((result.p_value - 0.1641).abs() < 1e-4, "p-value mismatch");
    }

    #[test]
    fn test_ks_empty_sample_errors() {
        let mut s1 = [];
        let mut s2 = [1.0, 2.0, 3.0, 4.0];
        assert!(ks_statistic(&mut s1, &mut s2).is_err());
    }

    #[test]
    fn test_small_samples_rejected_for_p_value() {
        let mut s1 = [1.0; 5];
        let mut s2 = [2.0; 5];
        assert!(two_sample_ks_test(&mut s1, &mut s2, 0.05).is_err());
    }

    #[test]
    fn test_pks_values() {
        assert_eq!(pks(0.0).unwrap(), 0.0);
        assert!((pks(1.23).unwrap() - 0.9029731024047791).abs() < 1e-8);
        assert!((pks(3.45).unwrap() - 1.0).abs() < 1e-8);
        assert!(pks(-1.0).is_err());
    }

    #[test]
    fn test_qks_zero() {
        assert_eq!(qks(0.0).unwrap(), 1.0);
    }

    #[test]
    fn test_cmp_f64_sorts_nan_last() {
        let mut s = [f64::NAN, 2.0, f64::NAN];
        s.sort_by(cmp_f64);
        assert!(s[0] == 2.0 && s[1].is_nan() && s[2].is_nan());
    }
}
