//! Reporting layer: per-peak derived values and run summaries.
//!
//! Fold changes are computed from normalized scores (average / global
//! lambda) and floored at 1.0, so they never divide by zero and their log
//! ratio is always finite.

use crate::lambda::GlobalLambdas;
use crate::peak::Peak;
use std::fmt;
use tracing::info;

/// Peaks between two progress log lines.
pub const PROGRESS_INTERVAL: u64 = 1000;

/// `max(1, max(1, case) / max(1, control))` on normalized scores.
#[inline]
pub fn fold_change(case: f64, control: f64) -> f64 {
    (case.max(1.0) / control.max(1.0)).max(1.0)
}

/// `log2(a / b)`.
#[inline]
pub fn log_ratio(a: f64, b: f64) -> f64 {
    (a / b).log2()
}

/// Running count, extremes, mean and variance (Welford's algorithm).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogRatioSummary {
    n: u64,
    min: f64,
    max: f64,
    mean: f64,
    m2: f64,
}

impl LogRatioSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: f64) {
        if self.n == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.n += 1;
        let delta = value - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.n
    }

    pub fn min(&self) -> Option<f64> {
        (self.n > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.n > 0).then_some(self.max)
    }

    pub fn mean(&self) -> Option<f64> {
        (self.n > 0).then_some(self.mean)
    }

    /// Sample variance (n - 1 denominator); 0 for a single value.
    pub fn variance(&self) -> Option<f64> {
        match self.n {
            0 => None,
            1 => Some(0.0),
            n => Some(self.m2 / (n - 1) as f64),
        }
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }
}

impl fmt::Display for LogRatioSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.min(), self.max(), self.mean(), self.variance(), self.std_dev()) {
            (Some(min), Some(max), Some(mean), Some(variance), Some(sd)) => write!(
                f,
                "n: {}, min: {:.4}, max: {:.4}, mean: {:.4}, variance: {:.4}, std dev: {:.4}",
                self.n, min, max, mean, variance, sd
            ),
            _ => write!(f, "n: 0"),
        }
    }
}

/// Column layout of the peak table, fixed for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLayout {
    /// One track: `chr start end id score average normalized`.
    Single,
    /// `[case, control]`: `chr start end id score case control foldChange`.
    CaseControl,
    /// `[caseA, controlA, caseB, controlB]`.
    Differential,
}

impl ReportLayout {
    pub fn track_count(self) -> usize {
        match self {
            ReportLayout::Single => 1,
            ReportLayout::CaseControl => 2,
            ReportLayout::Differential => 4,
        }
    }

    /// Column names, in output order.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            ReportLayout::Single => &["chr", "start", "end", "id", "score", "average", "normalized"],
            ReportLayout::CaseControl => &[
                "chr",
                "start",
                "end",
                "id",
                "score",
                "case",
                "control",
                "foldChange",
            ],
            ReportLayout::Differential => &[
                "chr",
                "beg",
                "end",
                "id",
                "score",
                "(A+B)",
                "A/(A+B)",
                "CaseA",
                "CtrlA",
                "CaseB",
                "CtrlB",
                "FoldChangeA",
                "FoldChangeB",
                "log2(FoldChangeA/FoldChangeB)",
            ],
        }
    }
}

/// Layout-specific values of one row.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportValues {
    Single {
        average: f64,
        normalized: f64,
    },
    CaseControl {
        case: f64,
        control: f64,
        fold_change: f64,
    },
    Differential {
        /// caseA + caseB averages.
        sum: f64,
        /// caseA / (caseA + caseB); `None` when both are 0.
        proportion: Option<f64>,
        averages: [f64; 4],
        fold_change_a: f64,
        fold_change_b: f64,
        log_ratio: f64,
    },
}

/// One row of the peak table.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakReport<'p> {
    pub peak: &'p Peak,
    /// -log10 of the best p-value.
    pub score: f64,
    pub values: ReportValues,
}

impl<'p> PeakReport<'p> {
    pub fn new(layout: ReportLayout, peak: &'p Peak, lambdas: &GlobalLambdas) -> Self {
        let averages = peak.averages();
        let normalized = peak.normalized_scores(lambdas);
        let values = match layout {
            ReportLayout::Single => ReportValues::Single {
                average: averages[0],
                normalized: normalized[0],
            },
            ReportLayout::CaseControl => ReportValues::CaseControl {
                case: averages[0],
                control: averages[1],
                fold_change: fold_change(normalized[0], normalized[1]),
            },
            ReportLayout::Differential => {
                let sum = averages[0] + averages[2];
                let fold_change_a = fold_change(normalized[0], normalized[1]);
                let fold_change_b = fold_change(normalized[2], normalized[3]);
                ReportValues::Differential {
                    sum,
                    proportion: (sum > 0.0).then(|| averages[0] / sum),
                    averages: [averages[0], averages[1], averages[2], averages[3]],
                    fold_change_a,
                    fold_change_b,
                    log_ratio: log_ratio(fold_change_a, fold_change_b),
                }
            }
        };
        Self {
            peak,
            score: peak.score(),
            values,
        }
    }
}

/// Builds rows for a stream of peaks and keeps the run summary.
#[derive(Debug)]
pub struct Reporter<'a> {
    layout: ReportLayout,
    lambdas: &'a GlobalLambdas,
    peaks: u64,
    summary: LogRatioSummary,
}

impl<'a> Reporter<'a> {
    pub fn new(layout: ReportLayout, lambdas: &'a GlobalLambdas) -> Self {
        Self {
            layout,
            lambdas,
            peaks: 0,
            summary: LogRatioSummary::new(),
        }
    }

    pub fn layout(&self) -> ReportLayout {
        self.layout
    }

    /// Row for the next peak.
    pub fn report<'p>(&mut self, peak: &'p Peak) -> PeakReport<'p> {
        let report = PeakReport::new(self.layout, peak, self.lambdas);
        if let ReportValues::Differential { log_ratio, .. } = report.values {
            self.summary.add(log_ratio);
        }
        self.peaks += 1;
        if self.peaks % PROGRESS_INTERVAL == 0 {
            info!("{} peaks", self.peaks);
        }
        report
    }

    pub fn peaks(&self) -> u64 {
        self.peaks
    }

    /// Summary of log2 fold-change ratios (differential layout only).
    pub fn summary(&self) -> &LogRatioSummary {
        &self.summary
    }
}

/// Input track as shown in the table header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderTrack {
    pub label: String,
    pub path: String,
    pub paired: bool,
}

/// Table header: provenance and the column line.
#[derive(Debug, Clone)]
pub struct ReportHeader<'a> {
    pub program: &'a str,
    pub version: &'a str,
    pub tracks: Vec<HeaderTrack>,
    pub lambdas: &'a GlobalLambdas,
    pub genome_size: u64,
    pub command_line: String,
    pub layout: ReportLayout,
}

impl ReportHeader<'_> {
    /// Header lines without the leading `# ` and trailing newline.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "Table Generated by Program {} {}",
            self.program, self.version
        )];
        for track in &self.tracks {
            let mode = if track.paired { "paired" } else { "single" };
            lines.push(format!(
                "{} : {} ({})",
                track.label.to_uppercase(),
                track.path,
                mode
            ));
        }
        lines.push(format!("GLOBAL AVERAGE COVERAGE : {}", self.lambdas));
        lines.push(format!("GENOME SIZE: {}", self.genome_size));
        lines.push(format!("COMMAND LINE: {}", self.command_line));
        if self.layout != ReportLayout::Single {
            lines.push("FoldChange is defined as below:".to_string());
            lines.push(
                "FoldChange = max ( 1.0, (CASE/caseGlobalLambda))/max(1.0,(CONTROL/controlGlobalLambda))"
                    .to_string(),
            );
            lines.push("FoldChange always >= 1.0".to_string());
        }
        lines.push(self.layout.columns().join("\t"));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak(sums: Vec<u64>, start: u64, end: u64) -> Peak {
        Peak {
            chrom: "chr1".to_string(),
            start,
            end,
            id: "Peak1".to_string(),
            sums,
            best_log_pvalue: -(10f64.ln()) * 12.0,
            significant: 1,
        }
    }

    #[test]
    fn test_fold_change_floor() {
        assert_eq!(fold_change(0.0, 0.0), 1.0);
        assert_eq!(fold_change(0.5, 3.0), 1.0);
        assert_eq!(fold_change(6.0, 0.2), 6.0);
        assert_eq!(fold_change(6.0, 2.0), 3.0);
        for case in [0.0, 0.3, 1.0, 7.5] {
            for control in [0.0, 0.9, 2.0, 100.0] {
                assert!(fold_change(case, control) >= 1.0);
            }
        }
    }

    #[test]
    fn test_log_ratio() {
        assert_eq!(log_ratio(4.0, 1.0), 2.0);
        assert_eq!(log_ratio(1.0, 4.0), -2.0);
        assert_eq!(log_ratio(1.0, 1.0), 0.0);
    }

    #[test]
    fn test_summary_welford() {
        let mut summary = LogRatioSummary::new();
        assert_eq!(summary.mean(), None);
        assert_eq!(summary.to_string(), "n: 0");

        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            summary.add(v);
        }
        assert_eq!(summary.count(), 8);
        assert_eq!(summary.min(), Some(2.0));
        assert_eq!(summary.max(), Some(9.0));
        assert!((summary.mean().unwrap() - 5.0).abs() < 1e-12);
        assert!((summary.variance().unwrap() - 32.0 / 7.0).abs() < 1e-12);
        assert!(summary.to_string().starts_with("n: 8, min: 2.0000"));
    }

    #[test]
    fn test_case_control_report() {
        let p = peak(vec![20, 2], 10, 20);
        let lambdas = GlobalLambdas::from_values(vec![0.5, 0.1], 1000);
        let report = PeakReport::new(ReportLayout::CaseControl, &p, &lambdas);
        assert!((report.score - 12.0).abs() < 1e-9);
        match report.values {
            ReportValues::CaseControl {
                case,
                control,
                fold_change,
            } => {
                assert_eq!(case, 2.0);
                assert_eq!(control, 0.2);
                // normalized 4.0 / 2.0
                assert!((fold_change - 2.0).abs() < 1e-12);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_differential_report() {
        let p = peak(vec![40, 0, 10, 0], 0, 10);
        let lambdas = GlobalLambdas::from_values(vec![1.0, 1.0, 1.0, 1.0], 1000);
        let mut reporter = Reporter::new(ReportLayout::Differential, &lambdas);
        let report = reporter.report(&p);
        match report.values {
            ReportValues::Differential {
                sum,
                proportion,
                fold_change_a,
                fold_change_b,
                log_ratio,
                ..
            } => {
                assert_eq!(sum, 5.0);
                assert_eq!(proportion, Some(0.8));
                assert_eq!(fold_change_a, 4.0);
                assert_eq!(fold_change_b, 1.0);
                assert_eq!(log_ratio, 2.0);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(reporter.summary().count(), 1);
        assert_eq!(reporter.peaks(), 1);
    }

    #[test]
    fn test_differential_zero_cases() {
        let p = peak(vec![0, 5, 0, 5], 0, 10);
        let lambdas = GlobalLambdas::from_values(vec![1.0; 4], 1000);
        let report = PeakReport::new(ReportLayout::Differential, &p, &lambdas);
        match report.values {
            ReportValues::Differential {
                proportion,
                log_ratio,
                ..
            } => {
                assert_eq!(proportion, None);
                assert!(log_ratio.is_finite());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_header_lines() {
        let lambdas = GlobalLambdas::from_values(vec![0.5, 0.25], 1000);
        let header = ReportHeader {
            program: "grit-peaks",
            version: "0.1.0",
            tracks: vec![
                HeaderTrack {
                    label: "case".to_string(),
                    path: "a.bed".to_string(),
                    paired: false,
                },
                HeaderTrack {
                    label: "control".to_string(),
                    path: "b.bed".to_string(),
                    paired: true,
                },
            ],
            lambdas: &lambdas,
            genome_size: 1000,
            command_line: "grit-peaks enrich".to_string(),
            layout: ReportLayout::CaseControl,
        };
        let lines = header.lines();
        assert_eq!(lines[0], "Table Generated by Program grit-peaks 0.1.0");
        assert_eq!(lines[1], "CASE : a.bed (single)");
        assert_eq!(lines[2], "CONTROL : b.bed (paired)");
        assert_eq!(lines[3], "GLOBAL AVERAGE COVERAGE : [0.5, 0.25]");
        assert_eq!(
            lines.last().unwrap(),
            "chr\tstart\tend\tid\tscore\tcase\tcontrol\tfoldChange"
        );
    }
}
