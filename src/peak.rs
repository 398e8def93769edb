//! Peaks: sealed runs of significant coordinates.

use crate::lambda::GlobalLambdas;
use std::fmt;

/// A sealed peak region `[start, end)`.
///
/// Per-track sums hold count-vector values accumulated at the significant
/// coordinates of the peak.
#[derive(Debug, Clone, PartialEq)]
pub struct Peak {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub id: String,
    pub sums: Vec<u64>,
    /// Natural log of the smallest p-value inside the peak.
    pub best_log_pvalue: f64,
    /// Number of significant coordinates.
    pub significant: u64,
}

impl Peak {
    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Number of tracks.
    #[inline]
    pub fn tracks(&self) -> usize {
        self.sums.len()
    }

    /// Average count of one track over the peak span.
    #[inline]
    pub fn average(&self, track: usize) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.sums[track] as f64 / self.len() as f64
    }

    pub fn averages(&self) -> Vec<f64> {
        (0..self.tracks()).map(|t| self.average(t)).collect()
    }

    /// Per-track average divided by the track's global lambda (0 when the
    /// lambda is 0).
    pub fn normalized_scores(&self, lambdas: &GlobalLambdas) -> Vec<f64> {
        (0..self.tracks())
            .map(|t| {
                let lambda = lambdas.get(t);
                if lambda > 0.0 {
                    self.average(t) / lambda
                } else {
                    0.0
                }
            })
            .collect()
    }

    /// -log10 of the best p-value.
    #[inline]
    pub fn score(&self) -> f64 {
        -self.best_log_pvalue / std::f64::consts::LN_10
    }

    /// Same peak under a new id.
    pub fn with_id(self, id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..self
        }
    }
}

impl fmt::Display for Peak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}\t{}", self.chrom, self.start, self.end, self.id)
    }
}

/// Open peak being extended by the factory.
#[derive(Debug, Clone)]
pub(crate) struct PeakBuilder {
    chrom: String,
    start: u64,
    last: u64,
    sums: Vec<u64>,
    best_log_pvalue: f64,
    significant: u64,
}

impl PeakBuilder {
    /// Open a peak at significant coordinate `p`.
    pub fn open(chrom: &str, p: u64, counts: &[u32], log_pvalue: f64) -> Self {
        Self {
            chrom: chrom.to_string(),
            start: p,
            last: p,
            sums: counts.iter().map(|&c| c as u64).collect(),
            best_log_pvalue: log_pvalue,
            significant: 1,
        }
    }

    /// Last significant coordinate.
    #[inline]
    pub fn last(&self) -> u64 {
        self.last
    }

    /// Extend the peak to significant coordinate `p`.
    pub fn extend(&mut self, p: u64, counts: &[u32], log_pvalue: f64) {
        debug_assert!(p > self.last);
        self.last = p;
        for (sum, &c) in self.sums.iter_mut().zip(counts) {
            *sum += c as u64;
        }
        self.best_log_pvalue = self.best_log_pvalue.min(log_pvalue);
        self.significant += 1;
    }

    pub fn seal(self, id: String) -> Peak {
        Peak {
            chrom: self.chrom,
            start: self.start,
            end: self.last + 1,
            id,
            sums: self.sums,
            best_log_pvalue: self.best_log_pvalue,
            significant: self.significant,
        }
    }
}
