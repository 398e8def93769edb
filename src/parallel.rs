//! Parallel peak calling using Rayon, one shard per chromosome.
//!
//! Tracks are loaded into memory and grouped by chromosome. Every shard
//! gets private cursors and a private factory; only the genome, the global
//! lambdas and the configuration are shared.

use crate::bed::BedError;
use crate::config::PeakConfig;
use crate::error::PeakError;
use crate::factory::{PeakFactory, ScanDiagnostics};
use crate::genome::GenomeSpace;
use crate::interval::Interval;
use crate::lambda::GlobalLambdas;
use crate::peak::Peak;
use crate::score::ScoreMachine;
use crate::streaming::validation::GenomeOrderValidator;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::{iter, vec};
use tracing::{debug, warn};

/// Interval source fed to a shard's cursors.
pub type ShardSource =
    iter::Map<vec::IntoIter<Interval>, fn(Interval) -> std::result::Result<Interval, BedError>>;

/// All tracks' intervals on one chromosome.
#[derive(Debug)]
pub struct ChromosomeShard {
    pub rank: usize,
    pub chrom: String,
    /// One interval list per track, in track order.
    pub tracks: Vec<Vec<Interval>>,
    /// Ordering error found while grouping; the shard is not scanned.
    pub error: Option<PeakError>,
}

impl ChromosomeShard {
    fn new(rank: usize, chrom: &str, track_count: usize) -> Self {
        Self {
            rank,
            chrom: chrom.to_string(),
            tracks: vec![Vec::new(); track_count],
            error: None,
        }
    }

    /// Drop the shard's intervals and keep its first error.
    fn poison(&mut self, error: PeakError) {
        if self.error.is_none() {
            warn!("chromosome {} will not be scanned: {}", self.chrom, error);
            self.tracks.iter_mut().for_each(Vec::clear);
            self.error = Some(error);
        }
    }
}

/// Result of scanning one shard.
#[derive(Debug)]
pub struct ShardOutcome {
    pub rank: usize,
    pub chrom: String,
    pub peaks: Vec<Peak>,
    pub diagnostics: ScanDiagnostics,
    /// Fatal error that stopped this shard; earlier peaks are kept.
    pub error: Option<PeakError>,
}

/// Tracks split into chromosome shards.
#[derive(Debug, Default)]
pub struct ShardPlan {
    /// Shards in genome order.
    pub shards: Vec<ChromosomeShard>,
    /// Records on chromosomes missing from the genome file, one error per
    /// track and chromosome.
    pub unplaced: Vec<PeakError>,
}

/// Group sorted tracks by chromosome, validating genome order.
///
/// An ordering error poisons the shard of the chromosome it was found on;
/// the other shards are unaffected. Chromosomes outside `keep` are dropped
/// after validation.
pub fn group_by_chromosome<F>(
    tracks: Vec<(String, Vec<Interval>)>,
    genome: &GenomeSpace,
    keep: F,
) -> ShardPlan
where
    F: Fn(&str) -> bool,
{
    let n = tracks.len();
    let mut shards: FxHashMap<usize, ChromosomeShard> = FxHashMap::default();
    let mut unplaced = Vec::new();

    for (t, (label, intervals)) in tracks.into_iter().enumerate() {
        let mut validator = GenomeOrderValidator::new(genome, label);
        let mut unknown: FxHashSet<String> = FxHashSet::default();

        for interval in intervals {
            let validated = validator.validate(&interval.chrom, interval.start);
            let Some(rank) = genome.rank(&interval.chrom) else {
                if let Err(e) = validated {
                    if unknown.insert(interval.chrom.clone()) {
                        unplaced.push(e);
                    }
                }
                continue;
            };
            if !keep(&interval.chrom) {
                continue;
            }
            let shard = shards
                .entry(rank)
                .or_insert_with(|| ChromosomeShard::new(rank, &interval.chrom, n));
            match validated {
                Ok(_) if shard.error.is_none() => shard.tracks[t].push(interval),
                Ok(_) => {}
                Err(e) => shard.poison(e),
            }
        }
    }

    let mut shards: Vec<ChromosomeShard> = shards.into_values().collect();
    shards.sort_unstable_by_key(|s| s.rank);
    ShardPlan { shards, unplaced }
}

fn shard_source(intervals: Vec<Interval>) -> ShardSource {
    intervals
        .into_iter()
        .map(Ok as fn(Interval) -> std::result::Result<Interval, BedError>)
}

/// Scan one shard to completion (or to its first error).
pub fn scan_shard<S>(
    shard: ChromosomeShard,
    labels: &[String],
    genome: &GenomeSpace,
    lambdas: &GlobalLambdas,
    config: &PeakConfig,
    machine: S,
) -> ShardOutcome
where
    S: ScoreMachine,
{
    let ChromosomeShard {
        rank,
        chrom,
        tracks,
        error,
    } = shard;

    let mut outcome = ShardOutcome {
        rank,
        chrom,
        peaks: Vec::new(),
        diagnostics: ScanDiagnostics::default(),
        error,
    };
    if outcome.error.is_some() {
        return outcome;
    }

    let sources: Vec<(String, ShardSource)> = labels
        .iter()
        .cloned()
        .zip(tracks.into_iter().map(shard_source))
        .collect();

    let mut factory = match PeakFactory::new(sources, genome, lambdas, config, machine) {
        Ok(factory) => factory,
        Err(e) => {
            outcome.error = Some(e);
            return outcome;
        }
    };
    for result in factory.by_ref() {
        match result {
            Ok(peak) => outcome.peaks.push(peak),
            Err(e) => {
                warn!("shard {} failed: {}", outcome.chrom, e);
                outcome.error = Some(e);
                break;
            }
        }
    }
    outcome.diagnostics = factory.diagnostics();
    debug!(
        "shard {}: {} peaks, {}",
        outcome.chrom,
        outcome.peaks.len(),
        outcome.diagnostics
    );
    outcome
}

/// Scan every shard in parallel. Outcomes are returned in genome order.
pub fn scan_shards<S>(
    shards: Vec<ChromosomeShard>,
    labels: &[String],
    genome: &GenomeSpace,
    lambdas: &GlobalLambdas,
    config: &PeakConfig,
    machine: &S,
) -> Vec<ShardOutcome>
where
    S: ScoreMachine + Clone + Sync + Send,
{
    let mut outcomes: Vec<ShardOutcome> = shards
        .into_par_iter()
        .map(|shard| scan_shard(shard, labels, genome, lambdas, config, machine.clone()))
        .collect();
    outcomes.sort_unstable_by_key(|o| o.rank);
    outcomes
}

/// Concatenate shard peaks in genome order and assign ids `prefix1..`.
pub fn renumber(outcomes: &mut [ShardOutcome], prefix: &str) -> Vec<Peak> {
    outcomes
        .iter_mut()
        .flat_map(|o| o.peaks.drain(..))
        .enumerate()
        .map(|(i, peak)| peak.with_id(format!("{}{}", prefix, i + 1)))
        .collect()
}
