//! Run configuration for peak calling.
//!
//! A [`PeakConfig`] is built once (from the CLI or by library callers),
//! validated, and then shared read-only by every factory of the run.

use crate::error::{PeakError, Result};
use crate::genome::GenomeSpace;

/// Default significance threshold on the p-value.
pub const DEFAULT_THRESHOLD: f64 = 1e-8;

/// Default maximum distance between two significant coordinates of one peak.
pub const DEFAULT_MAX_GAP: u64 = 200;

/// Default flank of the environment window used for the local lambda.
pub const DEFAULT_LOCAL_WINDOW: u64 = 5_000;

/// Default peak id prefix.
pub const DEFAULT_PREFIX: &str = "Peak";

/// Space over which the global lambdas are averaged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LambdaScope {
    /// Whole genome: every chromosome of the genome file is scanned.
    #[default]
    Genome,
    /// A single chromosome: only that chromosome is scanned.
    Chromosome(String),
}

impl LambdaScope {
    /// Length of the scanned space, used as the global lambda denominator.
    pub fn effective_length(&self, genome: &GenomeSpace) -> Result<u64> {
        let length = match self {
            LambdaScope::Genome => genome.total_length(),
            LambdaScope::Chromosome(chrom) => {
                genome
                    .chrom_size(chrom)
                    .ok_or_else(|| PeakError::UnknownChromosome {
                        track: "genome".to_string(),
                        chrom: chrom.clone(),
                    })?
            }
        };
        if length == 0 {
            return Err(PeakError::ZeroEffectiveLength {
                scope: self.to_string(),
            });
        }
        Ok(length)
    }

    /// Whether a chromosome belongs to the scanned space.
    #[inline]
    pub fn includes(&self, chrom: &str) -> bool {
        match self {
            LambdaScope::Genome => true,
            LambdaScope::Chromosome(c) => c == chrom,
        }
    }
}

impl std::fmt::Display for LambdaScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LambdaScope::Genome => write!(f, "genome"),
            LambdaScope::Chromosome(c) => write!(f, "chromosome {}", c),
        }
    }
}

/// Peak-calling configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct PeakConfig {
    /// Reads within this many bases of a position count towards it (0 = exact overlap)
    pub window: u64,
    /// Flank of the environment window for the local lambda (0 = global only)
    pub local_window: u64,
    /// p-value threshold; a position passes when its p-value is <= threshold
    pub threshold: f64,
    /// Maximum distance between significant coordinates merged into one peak
    pub max_gap: u64,
    /// Peak id prefix
    pub prefix: String,
    /// Space used for the global lambda
    pub scope: LambdaScope,
}

impl Default for PeakConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PeakConfig {
    pub fn new() -> Self {
        Self {
            window: 0,
            local_window: DEFAULT_LOCAL_WINDOW,
            threshold: DEFAULT_THRESHOLD,
            max_gap: DEFAULT_MAX_GAP,
            prefix: DEFAULT_PREFIX.to_string(),
            scope: LambdaScope::Genome,
        }
    }

    /// Set the counting window (builder pattern).
    pub fn with_window(mut self, window: u64) -> Self {
        self.window = window;
        self
    }

    /// Set the environment window flank (builder pattern).
    pub fn with_local_window(mut self, local_window: u64) -> Self {
        self.local_window = local_window;
        self
    }

    /// Set the p-value threshold (builder pattern).
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set the threshold from a -log10 p-value score (builder pattern).
    pub fn with_score_threshold(mut self, score: f64) -> Self {
        self.threshold = 10f64.powf(-score);
        self
    }

    /// Set the maximum merge gap (builder pattern).
    pub fn with_max_gap(mut self, max_gap: u64) -> Self {
        self.max_gap = max_gap;
        self
    }

    /// Set the peak id prefix (builder pattern).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the lambda scope (builder pattern).
    pub fn with_scope(mut self, scope: LambdaScope) -> Self {
        self.scope = scope;
        self
    }

    /// Natural log of the threshold, compared against log p-values.
    #[inline]
    pub fn log_threshold(&self) -> f64 {
        self.threshold.ln()
    }

    /// Check the configuration before any track is opened.
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(PeakError::InvalidConfig(format!(
                "threshold must be in (0, 1], got {}",
                self.threshold
            )));
        }
        if self.local_window > 0 && self.local_window < self.window {
            return Err(PeakError::InvalidConfig(format!(
                "local window ({}) must not be smaller than the counting window ({})",
                self.local_window, self.window
            )));
        }
        Ok(())
    }
}
