//! Track cursor: one sorted interval stream seen through sweep edges.
//!
//! The cursor is bound to one chromosome at a time. For a scan coordinate
//! `p` it reports how many intervals overlap the count window
//! `[p - W, p + W]` and, when enabled, the local lambda over the environment
//! window `[p - E, p + E]` clipped to the chromosome.

use crate::bed::BedError;
use crate::error::{PeakError, Result};
use crate::genome::GenomeSpace;
use crate::interval::Interval;
use crate::lambda::window_mass;
use crate::streaming::sweep::{ActiveInterval, IntervalBuffer, SweepEdge};
use crate::streaming::validation::GenomeOrderValidator;

/// Per-track values at one scan coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSample {
    /// Intervals overlapping the count window.
    pub count: u32,
    /// Expected count from the environment window, if enabled.
    pub local_lambda: Option<f64>,
}

/// A validated record that has not been buffered yet.
#[derive(Debug, Clone, Copy)]
struct PendingRecord {
    rank: usize,
    start: u64,
    end: u64,
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    rank: usize,
    chrom_len: u64,
}

/// Sorted track reader with incremental window counts.
pub struct TrackCursor<'g, I> {
    label: String,
    source: I,
    exhausted: bool,
    pending: Option<PendingRecord>,
    validator: GenomeOrderValidator<'g>,
    window: u64,
    flank: u64,
    binding: Option<Binding>,
    buffer: IntervalBuffer,
    count_lead: SweepEdge,
    count_trail: SweepEdge,
    env_lead: SweepEdge,
    env_trail: SweepEdge,
    consumed: u64,
}

impl<'g, I> TrackCursor<'g, I>
where
    I: Iterator<Item = std::result::Result<Interval, BedError>>,
{
    /// Create a cursor over `source` with count window `window` and
    /// environment flank `flank` (0 disables the local lambda).
    pub fn new(
        label: impl Into<String>,
        source: I,
        genome: &'g GenomeSpace,
        window: u64,
        flank: u64,
    ) -> Self {
        let label = label.into();
        Self {
            validator: GenomeOrderValidator::new(genome, label.clone()),
            label,
            source,
            exhausted: false,
            pending: None,
            window,
            flank,
            binding: None,
            buffer: IntervalBuffer::new(),
            count_lead: SweepEdge::new(0, 0),
            count_trail: SweepEdge::new(0, 0),
            env_lead: SweepEdge::new(0, 0),
            env_trail: SweepEdge::new(0, 0),
            consumed: 0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Records read from the source so far.
    pub fn consumed(&self) -> u64 {
        self.consumed
    }

    /// Largest number of intervals buffered at once.
    pub fn max_buffered(&self) -> usize {
        self.buffer.max_buffered()
    }

    /// Read and validate the next record if none is pending.
    fn pull(&mut self) -> Result<()> {
        if self.pending.is_some() || self.exhausted {
            return Ok(());
        }
        match self.source.next() {
            None => self.exhausted = true,
            Some(result) => {
                let interval = result.map_err(|e| PeakError::track(&self.label, e))?;
                let rank = self.validator.validate(&interval.chrom, interval.start)?;
                self.consumed += 1;
                self.pending = Some(PendingRecord {
                    rank,
                    start: interval.start,
                    end: interval.end,
                });
            }
        }
        Ok(())
    }

    /// Genome rank of the next unread record, or `None` at end of input.
    pub fn head_rank(&mut self) -> Result<Option<usize>> {
        self.pull()?;
        Ok(self.pending.map(|r| r.rank))
    }

    /// Discard records of chromosomes ranked before `rank`.
    fn skip_before(&mut self, rank: usize) -> Result<u64> {
        let mut skipped = 0;
        loop {
            self.pull()?;
            match self.pending {
                Some(record) if record.rank < rank => {
                    self.pending = None;
                    skipped += 1;
                }
                _ => return Ok(skipped),
            }
        }
    }

    /// Start scanning the chromosome with genome rank `rank`.
    ///
    /// Records of earlier chromosomes still unread are discarded.
    pub fn bind(&mut self, rank: usize, chrom_len: u64) -> Result<()> {
        self.skip_before(rank)?;
        self.buffer.clear();
        let seq = self.buffer.end_seq();
        self.count_lead = SweepEdge::new(0, seq);
        self.count_trail = SweepEdge::new(0, seq);
        self.env_lead = SweepEdge::new(0, seq);
        self.env_trail = SweepEdge::new(0, seq);
        self.binding = Some(Binding { rank, chrom_len });
        Ok(())
    }

    /// Move the pending record into the buffer if it lies on the bound
    /// chromosome and starts before `limit`. Returns whether one was taken.
    fn buffer_next(&mut self, limit: u64) -> Result<bool> {
        let Some(binding) = self.binding else {
            return Ok(false);
        };
        self.pull()?;
        match self.pending {
            Some(record) if record.rank == binding.rank && record.start < limit => {
                self.pending = None;
                let end = record.end.min(binding.chrom_len);
                // zero-length (or clipped away) records carry no bases
                if end > record.start {
                    self.buffer.push(ActiveInterval::new(record.start, end));
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn fill(&mut self, limit: u64) -> Result<()> {
        while self.buffer_next(limit)? {}
        Ok(())
    }

    /// Start of the first interval the count window has not reached yet.
    fn next_unstarted(&mut self) -> Result<Option<u64>> {
        loop {
            if let Some(iv) = self.buffer.get(self.count_lead.next_seq()) {
                return Ok(Some(iv.start));
            }
            if !self.buffer_next(u64::MAX)? {
                return Ok(None);
            }
        }
    }

    /// Smallest coordinate `>= from` whose count window overlaps an
    /// interval of this track, or `None` if the chromosome has no more.
    pub fn next_active(&mut self, from: u64) -> Result<Option<u64>> {
        if self.binding.is_none() {
            return Ok(None);
        }
        if self.count_lead.reach().saturating_add(self.window) > from
            && self.count_lead.started() > self.count_trail.ended()
        {
            return Ok(Some(from));
        }
        Ok(self
            .next_unstarted()?
            .map(|start| start.saturating_sub(self.window).max(from)))
    }

    /// Advance every edge to coordinate `p` and sample the track.
    ///
    /// Coordinates must be non-decreasing while bound to one chromosome.
    pub fn advance_to(&mut self, p: u64) -> Result<TrackSample> {
        let Some(binding) = self.binding else {
            return Ok(TrackSample {
                count: 0,
                local_lambda: None,
            });
        };

        let count_hi = p.saturating_add(self.window).saturating_add(1);
        let count_lo = p.saturating_sub(self.window);
        let env = (self.flank > 0).then(|| {
            let hi = p
                .saturating_add(self.flank)
                .saturating_add(1)
                .min(binding.chrom_len)
                .max(p + 1);
            (p.saturating_sub(self.flank), hi)
        });

        let limit = env.map_or(count_hi, |(_, hi)| hi.max(count_hi));
        self.fill(limit)?;

        self.count_lead.advance(count_hi, &self.buffer);
        self.count_trail.advance(count_lo, &self.buffer);
        let count = self.count_lead.started() - self.count_trail.ended();

        let local_lambda = match env {
            Some((lo, hi)) => {
                self.env_lead.advance(hi, &self.buffer);
                self.env_trail.advance(lo, &self.buffer);
                let bases = self.env_lead.covered() - self.env_trail.covered();
                let intervals = self.env_lead.started() - self.env_trail.ended();
                Some(window_mass(bases, intervals, self.window) / (hi - lo) as f64)
            }
            None => None,
        };

        let oldest = if env.is_some() {
            self.env_trail.next_seq().min(self.count_trail.next_seq())
        } else {
            self.count_trail.next_seq()
        };
        self.buffer.release_before(oldest);

        Ok(TrackSample {
            count: count.min(u32::MAX as u64) as u32,
            local_lambda,
        })
    }

    /// Discard the unread records of the bound chromosome and unbind.
    ///
    /// Returns the number of records discarded.
    pub fn finish_chromosome(&mut self) -> Result<u64> {
        let mut drained = 0;
        while self.buffer_next(u64::MAX)? {
            drained += 1;
        }
        self.buffer.clear();
        self.binding = None;
        Ok(drained)
    }
}
