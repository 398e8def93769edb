//! Peak factory: the scanning engine.
//!
//! Chromosomes are visited in genome order. On each one the factory jumps
//! from one active coordinate to the next (a coordinate where at least one
//! track has an interval in its count window), scores the count vector, and
//! runs the peak state machine:
//!
//! - IDLE, significant `p`: open a peak at `p`
//! - OPEN, significant `p`, `p - last <= max_gap`: extend to `p + 1`
//! - OPEN, significant `p`, gap too large: seal and emit, open at `p`
//! - chromosome or input end: seal and emit the open peak
//!
//! Peaks are produced lazily through [`Iterator`].

use crate::bed::BedError;
use crate::config::{LambdaScope, PeakConfig};
use crate::cursor::TrackCursor;
use crate::error::{PeakError, Result};
use crate::genome::GenomeSpace;
use crate::interval::Interval;
use crate::lambda::GlobalLambdas;
use crate::peak::{Peak, PeakBuilder};
use crate::score::{Baseline, ScoreMachine};
use std::fmt;
use tracing::{debug, trace};

/// Counters collected while scanning.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanDiagnostics {
    pub chromosomes_scanned: u64,
    pub positions_scanned: u64,
    pub significant_positions: u64,
    pub underflows: u64,
    /// Tracks without a single interval on a scanned chromosome.
    pub empty_track_events: u64,
    pub peaks_emitted: u64,
    /// Records read per track.
    pub intervals_per_track: Vec<u64>,
    /// Most intervals a track held in its window buffer at once.
    pub max_buffered_per_track: Vec<usize>,
}

impl ScanDiagnostics {
    /// Fold the counters of another run (e.g. a chromosome shard) into this one.
    pub fn merge(&mut self, other: &ScanDiagnostics) {
        self.chromosomes_scanned += other.chromosomes_scanned;
        self.positions_scanned += other.positions_scanned;
        self.significant_positions += other.significant_positions;
        self.underflows += other.underflows;
        self.empty_track_events += other.empty_track_events;
        self.peaks_emitted += other.peaks_emitted;
        if self.intervals_per_track.len() < other.intervals_per_track.len() {
            self.intervals_per_track
                .resize(other.intervals_per_track.len(), 0);
        }
        for (total, n) in self
            .intervals_per_track
            .iter_mut()
            .zip(&other.intervals_per_track)
        {
            *total += n;
        }
        if self.max_buffered_per_track.len() < other.max_buffered_per_track.len() {
            self.max_buffered_per_track
                .resize(other.max_buffered_per_track.len(), 0);
        }
        for (peak, &n) in self
            .max_buffered_per_track
            .iter_mut()
            .zip(&other.max_buffered_per_track)
        {
            *peak = (*peak).max(n);
        }
    }
}

impl fmt::Display for ScanDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Chromosomes: {}, Positions: {}, Significant: {}, Underflows: {}, Empty tracks: {}, Peaks: {}, Intervals: {:?}, Max buffered: {:?}",
            self.chromosomes_scanned,
            self.positions_scanned,
            self.significant_positions,
            self.underflows,
            self.empty_track_events,
            self.peaks_emitted,
            self.intervals_per_track,
            self.max_buffered_per_track
        )
    }
}

#[derive(Debug, Clone)]
struct ChromState {
    name: String,
    len: u64,
}

/// Scans a set of tracks and yields peaks in genome order.
pub struct PeakFactory<'a, I, S> {
    genome: &'a GenomeSpace,
    lambdas: &'a GlobalLambdas,
    config: &'a PeakConfig,
    machine: S,
    cursors: Vec<TrackCursor<'a, I>>,
    counts: Vec<u32>,
    locals: Vec<Option<f64>>,
    current: Option<ChromState>,
    pos: u64,
    open: Option<PeakBuilder>,
    next_ordinal: u64,
    scope_visited: bool,
    done: bool,
    diagnostics: ScanDiagnostics,
}

impl<'a, I, S> PeakFactory<'a, I, S>
where
    I: Iterator<Item = std::result::Result<Interval, BedError>>,
    S: ScoreMachine,
{
    /// Create a factory over labeled tracks, in the order the score
    /// machine expects them.
    pub fn new(
        tracks: Vec<(String, I)>,
        genome: &'a GenomeSpace,
        lambdas: &'a GlobalLambdas,
        config: &'a PeakConfig,
        machine: S,
    ) -> Result<Self> {
        config.validate()?;
        if tracks.len() != machine.track_count() || tracks.len() != lambdas.len() {
            return Err(PeakError::InvalidConfig(format!(
                "score machine expects {} tracks, got {} tracks and {} lambdas",
                machine.track_count(),
                tracks.len(),
                lambdas.len()
            )));
        }

        let n = tracks.len();
        let cursors = tracks
            .into_iter()
            .map(|(label, source)| {
                TrackCursor::new(label, source, genome, config.window, config.local_window)
            })
            .collect();

        Ok(Self {
            genome,
            lambdas,
            config,
            machine,
            cursors,
            counts: vec![0; n],
            locals: vec![None; n],
            current: None,
            pos: 0,
            open: None,
            next_ordinal: 1,
            scope_visited: false,
            done: false,
            diagnostics: ScanDiagnostics::default(),
        })
    }

    /// Counters so far, including records read per track.
    pub fn diagnostics(&self) -> ScanDiagnostics {
        let mut diagnostics = self.diagnostics.clone();
        diagnostics.intervals_per_track = self.cursors.iter().map(|c| c.consumed()).collect();
        diagnostics.max_buffered_per_track =
            self.cursors.iter().map(|c| c.max_buffered()).collect();
        diagnostics
    }

    /// Pick the next chromosome and bind every cursor to it.
    ///
    /// Returns false when there is nothing left to scan.
    fn start_next_chromosome(&mut self) -> Result<bool> {
        let config = self.config;
        let genome = self.genome;
        let rank = match &config.scope {
            LambdaScope::Genome => {
                let mut next: Option<usize> = None;
                for cursor in &mut self.cursors {
                    if let Some(rank) = cursor.head_rank()? {
                        next = Some(next.map_or(rank, |n| n.min(rank)));
                    }
                }
                match next {
                    Some(rank) => rank,
                    None => return Ok(false),
                }
            }
            LambdaScope::Chromosome(name) => {
                if self.scope_visited {
                    return Ok(false);
                }
                self.scope_visited = true;
                genome
                    .rank(name)
                    .ok_or_else(|| PeakError::UnknownChromosome {
                        track: "genome".to_string(),
                        chrom: name.clone(),
                    })?
            }
        };

        let (name, len) = genome
            .get(rank)
            .ok_or_else(|| PeakError::InvalidConfig(format!("no chromosome with rank {}", rank)))?;

        for cursor in &mut self.cursors {
            cursor.bind(rank, len)?;
            if cursor.head_rank()? != Some(rank) {
                self.diagnostics.empty_track_events += 1;
                debug!("track {} has no intervals on {}", cursor.label(), name);
            }
        }

        debug!("scanning {} ({} bp)", name, len);
        self.diagnostics.chromosomes_scanned += 1;
        self.current = Some(ChromState {
            name: name.to_string(),
            len,
        });
        self.pos = 0;
        Ok(true)
    }

    /// Smallest active coordinate `>= from` over all tracks.
    fn next_coordinate(&mut self, from: u64) -> Result<Option<u64>> {
        let mut next: Option<u64> = None;
        for cursor in &mut self.cursors {
            if let Some(p) = cursor.next_active(from)? {
                next = Some(next.map_or(p, |n| n.min(p)));
                if p == from {
                    break;
                }
            }
        }
        Ok(next)
    }

    /// Fill the count vector and local lambdas at `p`.
    fn sample(&mut self, p: u64) -> Result<()> {
        for (t, cursor) in self.cursors.iter_mut().enumerate() {
            let sample = cursor.advance_to(p)?;
            self.counts[t] = sample.count;
            self.locals[t] = sample.local_lambda;
        }
        Ok(())
    }

    /// Seal the open peak, if any, under the next ordinal id.
    fn seal(&mut self) -> Option<Peak> {
        let builder = self.open.take()?;
        let id = format!("{}{}", self.config.prefix, self.next_ordinal);
        self.next_ordinal += 1;
        self.diagnostics.peaks_emitted += 1;
        Some(builder.seal(id))
    }

    /// Feed a significant coordinate to the state machine.
    fn accept(&mut self, chrom: &str, p: u64, log_pvalue: f64) -> Option<Peak> {
        if let Some(builder) = self.open.as_mut() {
            if p - builder.last() <= self.config.max_gap {
                builder.extend(p, &self.counts, log_pvalue);
                return None;
            }
        }
        let sealed = self.seal();
        self.open = Some(PeakBuilder::open(chrom, p, &self.counts, log_pvalue));
        sealed
    }

    /// Scan the current chromosome until a peak is sealed or the
    /// chromosome is exhausted.
    fn scan(&mut self) -> Result<Option<Peak>> {
        let Some(chrom) = self.current.clone() else {
            return Ok(None);
        };

        while self.pos < chrom.len {
            let Some(p) = self.next_coordinate(self.pos)? else {
                break;
            };
            if p >= chrom.len {
                break;
            }
            self.pos = p + 1;
            self.sample(p)?;
            self.diagnostics.positions_scanned += 1;

            let baseline = Baseline::new(self.lambdas.as_slice(), &self.locals);
            let score = match self.machine.score(&self.counts, &baseline) {
                Ok(score) => score,
                Err(underflow) => {
                    self.diagnostics.underflows += 1;
                    trace!("{}:{} {}", chrom.name, p, underflow);
                    continue;
                }
            };
            if !score.passes {
                continue;
            }

            self.diagnostics.significant_positions += 1;
            if let Some(peak) = self.accept(&chrom.name, p, score.log_pvalue) {
                return Ok(Some(peak));
            }
        }
        Ok(None)
    }

    /// Drain the current chromosome and seal its open peak.
    fn end_chromosome(&mut self) -> Result<Option<Peak>> {
        for cursor in &mut self.cursors {
            cursor.finish_chromosome()?;
        }
        self.current = None;
        Ok(self.seal())
    }

    fn step(&mut self) -> Result<Option<Peak>> {
        loop {
            if self.current.is_none() && !self.start_next_chromosome()? {
                return Ok(None);
            }
            if let Some(peak) = self.scan()? {
                return Ok(Some(peak));
            }
            if let Some(peak) = self.end_chromosome()? {
                return Ok(Some(peak));
            }
        }
    }
}

impl<'a, I, S> Iterator for PeakFactory<'a, I, S>
where
    I: Iterator<Item = std::result::Result<Interval, BedError>>,
    S: ScoreMachine,
{
    type Item = Result<Peak>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(peak)) => Some(Ok(peak)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
