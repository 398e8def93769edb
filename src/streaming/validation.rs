//! Sort validation for streaming operations.
//!
//! The scan advances every track monotonically, so each track must be
//! sorted by genome order. Validation checks that:
//! 1. All chromosomes exist in the genome file
//! 2. Chromosomes appear in genome file order (which makes them contiguous)
//! 3. Within a chromosome, start positions are non-decreasing

use crate::error::PeakError;
use crate::genome::GenomeSpace;

/// Inline genome-order validator for use within streaming loops.
#[derive(Debug)]
pub struct GenomeOrderValidator<'a> {
    genome: &'a GenomeSpace,
    track: String,
    prev_rank: Option<usize>,
    prev_start: u64,
    record_count: usize,
}

impl<'a> GenomeOrderValidator<'a> {
    /// Create a new genome-order validator for one track.
    pub fn new(genome: &'a GenomeSpace, track: impl Into<String>) -> Self {
        Self {
            genome,
            track: track.into(),
            prev_rank: None,
            prev_start: 0,
            record_count: 0,
        }
    }

    /// Validate that the given record maintains genome order.
    ///
    /// Returns the genome rank of the record's chromosome.
    #[inline]
    pub fn validate(&mut self, chrom: &str, start: u64) -> Result<usize, PeakError> {
        self.record_count += 1;

        let rank = self
            .genome
            .rank(chrom)
            .ok_or_else(|| PeakError::UnknownChromosome {
                track: self.track.clone(),
                chrom: chrom.to_string(),
            })?;

        if let Some(prev_rank) = self.prev_rank {
            if rank < prev_rank {
                let prev = self.genome.get(prev_rank).map(|(c, _)| c).unwrap_or("?");
                return Err(PeakError::ChromosomeOrder {
                    track: self.track.clone(),
                    chrom: chrom.to_string(),
                    reason: format!(
                        "at record {} should come before '{}'",
                        self.record_count, prev
                    ),
                });
            }
            if rank == prev_rank && start < self.prev_start {
                return Err(PeakError::OutOfOrderInput {
                    track: self.track.clone(),
                    chrom: chrom.to_string(),
                    start,
                    previous: self.prev_start,
                });
            }
        }

        self.prev_rank = Some(rank);
        self.prev_start = start;

        Ok(rank)
    }

    /// Label of the validated track.
    pub fn track(&self) -> &str {
        &self.track
    }

    /// Get the number of records validated.
    pub fn record_count(&self) -> usize {
        self.record_count
    }
}
