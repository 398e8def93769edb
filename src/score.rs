//! Score machines: count vector + baselines -> log p-value and pass flag.
//!
//! A machine is chosen once per run and used as a generic parameter of the
//! factory, so the per-position call is statically dispatched.

use crate::stats::{
    ln_poisson_upper_tail, ln_skellam_upper_tail, most_significant, stricter,
};
use std::fmt;
use thiserror::Error;

/// Per-track expected counts at the current scan coordinate.
#[derive(Debug, Clone, Copy)]
pub struct Baseline<'a> {
    /// Global lambda per track.
    pub global: &'a [f64],
    /// Local (environment) lambda per track; `None` when disabled.
    pub local: &'a [Option<f64>],
}

impl<'a> Baseline<'a> {
    pub fn new(global: &'a [f64], local: &'a [Option<f64>]) -> Self {
        Self { global, local }
    }

    /// Baseline without local lambdas.
    pub fn global_only(global: &'a [f64]) -> Self {
        Self { global, local: &[] }
    }

    #[inline]
    fn local(&self, track: usize) -> Option<f64> {
        self.local.get(track).copied().flatten()
    }
}

/// Result of scoring one coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Score {
    /// Natural log of the p-value.
    pub log_pvalue: f64,
    /// Whether the p-value is at or below the threshold.
    pub passes: bool,
}

impl Score {
    #[inline]
    pub fn pvalue(&self) -> f64 {
        self.log_pvalue.exp()
    }

    /// -log10 of the p-value, the reported score column.
    #[inline]
    pub fn neg_log10(&self) -> f64 {
        -self.log_pvalue / std::f64::consts::LN_10
    }
}

/// A coordinate whose p-value could not be represented.
///
/// Recoverable: the factory counts it and treats the coordinate as
/// non-significant.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("statistical underflow for counts {counts:?} (log p-value {log_pvalue})")]
pub struct StatisticalUnderflow {
    pub counts: Vec<u32>,
    pub log_pvalue: f64,
}

/// Pure function from a count vector and baselines to a [`Score`].
pub trait ScoreMachine {
    /// Number of tracks the machine expects, in input order.
    fn track_count(&self) -> usize;

    /// Natural log of the significance threshold.
    fn log_threshold(&self) -> f64;

    /// Log p-value of a count vector; may be non-finite.
    fn log_pvalue(&self, counts: &[u32], baseline: &Baseline<'_>) -> f64;

    /// Score a count vector.
    fn score(
        &self,
        counts: &[u32],
        baseline: &Baseline<'_>,
    ) -> Result<Score, StatisticalUnderflow> {
        let log_pvalue = self.log_pvalue(counts, baseline);
        if !log_pvalue.is_finite() {
            return Err(StatisticalUnderflow {
                counts: counts.to_vec(),
                log_pvalue,
            });
        }
        Ok(Score {
            log_pvalue,
            passes: log_pvalue <= self.log_threshold(),
        })
    }
}

/// Single-track Poisson right tail `P(X >= count)`.
#[derive(Debug, Clone)]
pub struct PoissonScoreMachine {
    log_threshold: f64,
}

impl PoissonScoreMachine {
    pub fn new(threshold: f64) -> Self {
        Self {
            log_threshold: threshold.ln(),
        }
    }
}

impl ScoreMachine for PoissonScoreMachine {
    fn track_count(&self) -> usize {
        1
    }

    fn log_threshold(&self) -> f64 {
        self.log_threshold
    }

    fn log_pvalue(&self, counts: &[u32], baseline: &Baseline<'_>) -> f64 {
        let k = counts[0] as u64;
        let global = ln_poisson_upper_tail(k, baseline.global[0]);
        match baseline.local(0) {
            Some(local) => stricter(global, ln_poisson_upper_tail(k, local)),
            None => global,
        }
    }
}

/// One Skellam comparison: summed case tracks against summed control tracks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hypothesis {
    pub cases: Vec<usize>,
    pub controls: Vec<usize>,
}

impl Hypothesis {
    pub fn new(cases: Vec<usize>, controls: Vec<usize>) -> Self {
        Self { cases, controls }
    }

    fn tracks(&self) -> impl Iterator<Item = usize> + '_ {
        self.cases.iter().chain(self.controls.iter()).copied()
    }

    /// `ln P(K >= case - control)`, K ~ Skellam(lambda_case, lambda_control),
    /// the larger of the global and local evaluations.
    ///
    /// Only an excess of case reads is tested: when `case <= control` the
    /// coordinate is not enriched and the log p-value is 0.
    pub fn log_pvalue(&self, counts: &[u32], baseline: &Baseline<'_>) -> f64 {
        let case: i64 = self.cases.iter().map(|&t| counts[t] as i64).sum();
        let control: i64 = self.controls.iter().map(|&t| counts[t] as i64).sum();
        let d = case - control;
        if d <= 0 {
            return 0.0;
        }

        let global = ln_skellam_upper_tail(
            d,
            self.cases.iter().map(|&t| baseline.global[t]).sum(),
            self.controls.iter().map(|&t| baseline.global[t]).sum(),
        );

        if self.tracks().any(|t| baseline.local(t).is_none()) {
            return global;
        }
        let local_sum = |tracks: &[usize]| -> f64 {
            tracks.iter().filter_map(|&t| baseline.local(t)).sum()
        };
        let local = ln_skellam_upper_tail(d, local_sum(&self.cases), local_sum(&self.controls));
        stricter(global, local)
    }
}

impl fmt::Display for Hypothesis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} vs {:?}", self.cases, self.controls)
    }
}

/// Skellam difference test over one or more hypotheses; the most
/// significant hypothesis decides the coordinate.
#[derive(Debug, Clone)]
pub struct SkellamScoreMachine {
    hypotheses: Vec<Hypothesis>,
    track_count: usize,
    log_threshold: f64,
}

impl SkellamScoreMachine {
    pub fn new(hypotheses: Vec<Hypothesis>, threshold: f64) -> Self {
        let track_count = hypotheses
            .iter()
            .flat_map(|h| h.tracks())
            .max()
            .map_or(0, |t| t + 1);
        Self {
            hypotheses,
            track_count,
            log_threshold: threshold.ln(),
        }
    }

    /// Tracks `[case, control]`.
    pub fn case_control(threshold: f64) -> Self {
        Self::new(vec![Hypothesis::new(vec![0], vec![1])], threshold)
    }

    /// Tracks `[caseA, controlA, caseB, controlB]`: A vs its control, B vs
    /// its control, and both cases against both controls.
    pub fn differential(threshold: f64) -> Self {
        Self::new(
            vec![
                Hypothesis::new(vec![0], vec![1]),
                Hypothesis::new(vec![2], vec![3]),
                Hypothesis::new(vec![0, 2], vec![1, 3]),
            ],
            threshold,
        )
    }

    pub fn hypotheses(&self) -> &[Hypothesis] {
        &self.hypotheses
    }
}

impl ScoreMachine for SkellamScoreMachine {
    fn track_count(&self) -> usize {
        self.track_count
    }

    fn log_threshold(&self) -> f64 {
        self.log_threshold
    }

    fn log_pvalue(&self, counts: &[u32], baseline: &Baseline<'_>) -> f64 {
        self.hypotheses
            .iter()
            .map(|h| h.log_pvalue(counts, baseline))
            .fold(f64::INFINITY, most_significant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poisson_threshold_tie_passes() {
        let machine = PoissonScoreMachine::new(1.0);
        let global = [0.5];
        let score = machine.score(&[0], &Baseline::global_only(&global)).unwrap();
        assert_eq!(score.log_pvalue, 0.0);
        assert!(score.passes);
    }

    #[test]
    fn test_poisson_scenario_counts() {
        let machine = PoissonScoreMachine::new(0.01);
        let global = [0.5];
        let baseline = Baseline::global_only(&global);

        assert!(!machine.score(&[0], &baseline).unwrap().passes);
        // P(X >= 5 | 0.5) ~ 1.7e-4
        let score = machine.score(&[5], &baseline).unwrap();
        assert!(score.passes);
        assert!(score.pvalue() > 1e-4 && score.pvalue() < 2e-4);
        assert!(score.neg_log10() > 3.7 && score.neg_log10() < 4.0);
    }

    #[test]
    fn test_poisson_local_lambda_is_stricter() {
        let machine = PoissonScoreMachine::new(0.01);
        let global = [0.5];
        let local = [Some(5.0)];
        let score = machine.score(&[5], &Baseline::new(&global, &local)).unwrap();
        // P(X >= 5 | 5) ~ 0.56
        assert!(!score.passes);
    }

    #[test]
    fn test_poisson_zero_lambda_underflows() {
        let machine = PoissonScoreMachine::new(0.01);
        let global = [0.0];
        let err = machine.score(&[3], &Baseline::global_only(&global)).unwrap_err();
        assert_eq!(err.counts, vec![3]);
        assert_eq!(err.log_pvalue, f64::NEG_INFINITY);
    }

    #[test]
    fn test_skellam_global_only_significance_not_flagged() {
        let machine = SkellamScoreMachine::case_control(1e-3);
        let global = [0.5, 0.5];

        let score = machine.score(&[6, 0], &Baseline::global_only(&global)).unwrap();
        assert!(score.passes);

        let local = [Some(5.0), Some(0.5)];
        let score = machine.score(&[6, 0], &Baseline::new(&global, &local)).unwrap();
        assert!(!score.passes);
    }

    #[test]
    fn test_skellam_depleted_control_not_enriched() {
        let machine = SkellamScoreMachine::case_control(1e-8);
        let global = [0.0, 25.0];
        let baseline = Baseline::global_only(&global);

        let score = machine.score(&[0, 1], &baseline).unwrap();
        assert_eq!(score.log_pvalue, 0.0);
        assert!(!score.passes);

        // equal counts are never enriched
        let global = [0.5, 25.0];
        let local = [Some(0.5), Some(25.0)];
        let score = machine.score(&[3, 3], &Baseline::new(&global, &local)).unwrap();
        assert!(!score.passes);
    }

    #[test]
    fn test_differential_needs_case_excess() {
        let machine = SkellamScoreMachine::differential(1e-8);
        let global = [0.01, 30.0, 0.01, 30.0];
        let score = machine
            .score(&[1, 2, 0, 4], &Baseline::global_only(&global))
            .unwrap();
        assert_eq!(score.log_pvalue, 0.0);
    }

    #[test]
    fn test_skellam_min_over_hypotheses() {
        let machine = SkellamScoreMachine::differential(1e-3);
        assert_eq!(machine.track_count(), 4);
        assert_eq!(machine.hypotheses().len(), 3);

        let global = [0.5, 0.5, 0.5, 0.5];
        let baseline = Baseline::global_only(&global);
        // only sample A is enriched
        let score = machine.score(&[8, 0, 0, 0], &baseline).unwrap();
        let a = machine.hypotheses()[0].log_pvalue(&[8, 0, 0, 0], &baseline);
        assert!(score.passes);
        assert_eq!(score.log_pvalue, a);

        let quiet = machine.score(&[1, 1, 1, 1], &baseline).unwrap();
        assert!(!quiet.passes);
    }

    #[test]
    fn test_combined_hypothesis_sums_tracks() {
        let h = Hypothesis::new(vec![0, 2], vec![1, 3]);
        let global = [0.5, 0.25, 0.5, 0.25];
        let baseline = Baseline::global_only(&global);
        let combined = h.log_pvalue(&[3, 1, 2, 0], &baseline);
        let expected = ln_skellam_upper_tail(4, 1.0, 0.5);
        assert!((combined - expected).abs() < 1e-12);
        assert_eq!(h.to_string(), "[0, 2] vs [1, 3]");
    }

    #[test]
    fn test_case_control_track_count() {
        assert_eq!(SkellamScoreMachine::case_control(0.01).track_count(), 2);
        assert_eq!(PoissonScoreMachine::new(0.01).track_count(), 1);
    }
}
