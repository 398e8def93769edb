//! Global lambda table: one average read density per track.
//!
//! The table is computed once, before scanning starts, from per-track
//! totals over the scanned space, and is shared read-only afterwards.

use crate::bed::BedError;
use crate::config::LambdaScope;
use crate::error::{PeakError, Result};
use crate::genome::GenomeSpace;
use crate::interval::Interval;
use crate::streaming::validation::GenomeOrderValidator;
use std::fmt;
use tracing::debug;

/// Interval count and covered bases of one track over the scanned space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrackTotals {
    pub intervals: u64,
    pub bases: u64,
}

impl TrackTotals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one interval, clipped to its chromosome length.
    #[inline]
    pub fn add(&mut self, interval: &Interval, chrom_len: u64) {
        let bases = interval.clipped_len(chrom_len);
        if bases > 0 {
            self.intervals += 1;
            self.bases += bases;
        }
    }

    /// Collect totals from a sorted track, validating its order on the way.
    ///
    /// Intervals outside `scope` are validated but not counted.
    pub fn from_reader<I>(
        reader: I,
        genome: &GenomeSpace,
        scope: &LambdaScope,
        track: &str,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = std::result::Result<Interval, BedError>>,
    {
        let mut totals = Self::new();
        let mut validator = GenomeOrderValidator::new(genome, track);

        for result in reader {
            let interval = result.map_err(|e| PeakError::track(track, e))?;
            let rank = validator.validate(&interval.chrom, interval.start)?;
            if !scope.includes(&interval.chrom) {
                continue;
            }
            let chrom_len = genome.get(rank).map(|(_, len)| len).unwrap_or(0);
            totals.add(&interval, chrom_len);
        }

        debug!(
            "track {}: {} intervals, {} bases in {}",
            track, totals.intervals, totals.bases, scope
        );
        Ok(totals)
    }

    /// Collect totals from in-memory intervals (no order validation).
    pub fn from_intervals<'a, I>(intervals: I, genome: &GenomeSpace, scope: &LambdaScope) -> Self
    where
        I: IntoIterator<Item = &'a Interval>,
    {
        let mut totals = Self::new();
        for interval in intervals {
            if !scope.includes(&interval.chrom) {
                continue;
            }
            if let Some(len) = genome.chrom_size(&interval.chrom) {
                totals.add(interval, len);
            }
        }
        totals
    }
}

/// Per-track expected count at a scan position.
///
/// `lambda[t] = (bases[t] + 2W * intervals[t]) / effective_length`, the mean
/// of the track's count-vector entry over the scanned space. With W = 0 it is
/// the mean per-base depth.
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalLambdas {
    values: Vec<f64>,
    effective_length: u64,
}

impl GlobalLambdas {
    /// Build the table from track totals.
    pub fn from_totals(totals: &[TrackTotals], effective_length: u64, window: u64) -> Result<Self> {
        if effective_length == 0 {
            return Err(PeakError::ZeroEffectiveLength {
                scope: "scanned space".to_string(),
            });
        }
        let length = effective_length as f64;
        let values = totals
            .iter()
            .map(|t| window_mass(t.bases, t.intervals, window) / length)
            .collect();
        Ok(Self {
            values,
            effective_length,
        })
    }

    /// Build a table from known values.
    pub fn from_values(values: Vec<f64>, effective_length: u64) -> Self {
        Self {
            values,
            effective_length,
        }
    }

    /// Lambda of one track.
    #[inline]
    pub fn get(&self, track: usize) -> f64 {
        self.values[track]
    }

    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Number of tracks.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Denominator used for every track.
    pub fn effective_length(&self) -> u64 {
        self.effective_length
    }
}

impl fmt::Display for GlobalLambdas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, "]")
    }
}

/// Sum of count-vector entries contributed by `intervals` reads covering
/// `bases` bases when every read is widened by `window` on both sides.
#[inline]
pub(crate) fn window_mass(bases: u64, intervals: u64, window: u64) -> f64 {
    bases as f64 + 2.0 * window as f64 * intervals as f64
}
