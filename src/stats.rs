//! Log-space tail probabilities for the score machines.
//!
//! Every function returns a natural-log probability. Tails that are still
//! representable come from the regularized incomplete gamma function;
//! smaller ones are evaluated as `ln pmf(k) + ln(series)` so that extreme
//! counts give large negative, finite log p-values instead of 0.

use statrs::function::factorial::ln_factorial;
use statrs::function::gamma::checked_gamma_lr;

/// Below this the exact tail is recomputed in log space.
const TAIL_EXACT_MIN: f64 = 1e-280;

/// Upper bound on series / convolution terms.
const MAX_SERIES_TERMS: u64 = 100_000;

/// Convolution terms this far (in nats) below the running sum are dropped.
const CONVERGENCE_LN: f64 = 40.0;

/// ln P(X = n) for X ~ Poisson(lambda).
#[inline]
pub fn ln_poisson_pmf(n: u64, lambda: f64) -> f64 {
    if lambda == 0.0 {
        return if n == 0 { 0.0 } else { f64::NEG_INFINITY };
    }
    n as f64 * lambda.ln() - lambda - ln_factorial(n)
}

/// ln P(X >= k) for X ~ Poisson(lambda).
pub fn ln_poisson_upper_tail(k: u64, lambda: f64) -> f64 {
    if k == 0 {
        return 0.0;
    }
    if lambda.is_nan() || lambda < 0.0 {
        return f64::NAN;
    }
    if lambda == 0.0 {
        return f64::NEG_INFINITY;
    }

    // P(X >= k) = P(k, lambda), the regularized lower incomplete gamma
    if let Ok(p) = checked_gamma_lr(k as f64, lambda) {
        if p > TAIL_EXACT_MIN {
            return p.ln();
        }
    }

    // P(X >= k) = pmf(k) * sum_j prod_{i=1..j} lambda / (k + i)
    let kf = k as f64;
    let mut term = 1.0;
    let mut sum = 1.0;
    for j in 1..MAX_SERIES_TERMS {
        term *= lambda / (kf + j as f64);
        sum += term;
        if term < sum * f64::EPSILON {
            break;
        }
    }
    ln_poisson_pmf(k, lambda) + sum.ln()
}

/// ln P(K >= d) for K = N1 - N2, N1 ~ Poisson(mu1), N2 ~ Poisson(mu2).
///
/// Evaluated as the convolution `sum_n P(N2 = n) P(N1 >= d + n)` with a
/// log-sum-exp accumulator.
pub fn ln_skellam_upper_tail(d: i64, mu1: f64, mu2: f64) -> f64 {
    if mu1.is_nan() || mu2.is_nan() || mu1 < 0.0 || mu2 < 0.0 {
        return f64::NAN;
    }
    if mu2 == 0.0 {
        return ln_poisson_upper_tail(d.max(0) as u64, mu1);
    }
    if mu1 == 0.0 {
        // K = -N2, so K >= d iff N2 <= -d
        if d > 0 {
            return f64::NEG_INFINITY;
        }
        return ln_one_minus_exp(ln_poisson_upper_tail(d.unsigned_abs() + 1, mu2));
    }

    let mut acc = f64::NEG_INFINITY;
    for n in 0..MAX_SERIES_TERMS {
        let k = d.saturating_add(n as i64);
        let ln_tail = if k <= 0 {
            0.0
        } else {
            ln_poisson_upper_tail(k as u64, mu1)
        };
        let term = ln_poisson_pmf(n, mu2) + ln_tail;
        acc = log_add_exp(acc, term);
        if n as f64 > mu2 && term < acc - CONVERGENCE_LN {
            break;
        }
    }
    acc
}

/// ln(exp(a) + exp(b)) without overflow.
#[inline]
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    if a == f64::NEG_INFINITY {
        return b;
    }
    if b == f64::NEG_INFINITY {
        return a;
    }
    let (hi, lo) = if a > b { (a, b) } else { (b, a) };
    hi + (lo - hi).exp().ln_1p()
}

/// ln(1 - exp(x)) for x <= 0.
#[inline]
fn ln_one_minus_exp(x: f64) -> f64 {
    if x > -std::f64::consts::LN_2 {
        (-x.exp_m1()).ln()
    } else {
        (-x.exp()).ln_1p()
    }
}

/// The larger (less significant) of two log p-values, propagating NaN.
#[inline]
pub fn stricter(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.max(b)
    }
}

/// The smaller (more significant) of two log p-values, propagating NaN.
#[inline]
pub fn most_significant(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else {
        a.min(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() <= tol * b.abs().max(1e-300)
    }

    /// Direct summation of the Poisson tail for small arguments.
    fn naive_tail(k: u64, lambda: f64) -> f64 {
        let below: f64 = (0..k).map(|n| ln_poisson_pmf(n, lambda).exp()).sum();
        1.0 - below
    }

    #[test]
    fn test_poisson_pmf() {
        assert!(close(ln_poisson_pmf(0, 0.5).exp(), (-0.5f64).exp(), 1e-12));
        assert!(close(ln_poisson_pmf(2, 3.0).exp(), 4.5 * (-3.0f64).exp(), 1e-12));
        assert_eq!(ln_poisson_pmf(0, 0.0), 0.0);
        assert_eq!(ln_poisson_pmf(1, 0.0), f64::NEG_INFINITY);
    }

    #[test]
    fn test_poisson_tail_matches_summation() {
        for &(k, lambda) in &[(1u64, 0.5), (3, 0.5), (5, 0.5), (4, 2.0), (10, 7.5)] {
            let got = ln_poisson_upper_tail(k, lambda).exp();
            assert!(close(got, naive_tail(k, lambda), 1e-9), "k={} lambda={}", k, lambda);
        }
    }

    #[test]
    fn test_poisson_tail_edges() {
        assert_eq!(ln_poisson_upper_tail(0, 3.0), 0.0);
        assert_eq!(ln_poisson_upper_tail(0, 0.0), 0.0);
        assert_eq!(ln_poisson_upper_tail(2, 0.0), f64::NEG_INFINITY);
        assert!(ln_poisson_upper_tail(2, -1.0).is_nan());
    }

    #[test]
    fn test_poisson_tail_extreme_is_finite() {
        let lp = ln_poisson_upper_tail(5_000, 0.5);
        assert!(lp.is_finite());
        assert!(lp < -20_000.0);
        // monotone in k
        assert!(ln_poisson_upper_tail(5_001, 0.5) < lp);
    }

    #[test]
    fn test_poisson_tail_continuity_at_switch() {
        // values on both sides of the exact/series switch agree with the pmf bound
        let lambda = 1.0;
        for k in [100u64, 150, 200] {
            let lp = ln_poisson_upper_tail(k, lambda);
            let head = ln_poisson_pmf(k, lambda);
            assert!(lp >= head - 1e-9);
            assert!(lp <= head + 0.05);
        }
    }

    #[test]
    fn test_skellam_reduces_to_poisson() {
        let a = ln_skellam_upper_tail(4, 2.0, 0.0);
        assert!(close(a, ln_poisson_upper_tail(4, 2.0), 1e-12));
    }

    #[test]
    fn test_skellam_against_summation() {
        let (mu1, mu2) = (1.5, 0.7);
        for d in [-2i64, 0, 1, 3, 6] {
            let mut expected = 0.0;
            for n2 in 0..60u64 {
                for n1 in 0..80u64 {
                    if n1 as i64 - n2 as i64 >= d {
                        expected += (ln_poisson_pmf(n1, mu1) + ln_poisson_pmf(n2, mu2)).exp();
                    }
                }
            }
            let got = ln_skellam_upper_tail(d, mu1, mu2).exp();
            assert!(close(got, expected, 1e-8), "d={} got={} expected={}", d, got, expected);
        }
    }

    #[test]
    fn test_skellam_zero_case_rate() {
        assert_eq!(ln_skellam_upper_tail(1, 0.0, 2.0), f64::NEG_INFINITY);
        // P(-N2 >= -1) = P(N2 <= 1)
        let expected = (ln_poisson_pmf(0, 2.0).exp() + ln_poisson_pmf(1, 2.0).exp()).ln();
        assert!(close(ln_skellam_upper_tail(-1, 0.0, 2.0), expected, 1e-10));
    }

    #[test]
    fn test_log_add_exp() {
        let v = log_add_exp(2f64.ln(), 3f64.ln());
        assert!(close(v, 5f64.ln(), 1e-12));
        assert_eq!(log_add_exp(f64::NEG_INFINITY, 1.0), 1.0);
    }

    #[test]
    fn test_nan_propagation() {
        assert!(stricter(f64::NAN, -1.0).is_nan());
        assert!(most_significant(-1.0, f64::NAN).is_nan());
        assert_eq!(stricter(-5.0, -1.0), -1.0);
        assert_eq!(most_significant(-5.0, -1.0), -5.0);
    }
}
