//! Peak calling command: lambdas, scan, report.
//!
//! # Algorithm
//!
//! 1. Pre-pass over every track: validate genome order and collect totals
//! 2. Global lambdas from the totals over the scanned space
//! 3. Scan with a [`PeakFactory`] (streaming) or one factory per
//!    chromosome (sharded)
//! 4. Write the header and one row per peak
//!
//! # Memory Complexity
//!
//! Streaming: O(k) per track, k = intervals inside the environment window.
//! Sharded: every track is loaded into memory.
//!
//! # Requirements
//!
//! Every track MUST be sorted by chromosome (genome file order), then by
//! start position.

use crate::bed::{read_intervals, BedTrackReader};
use crate::config::PeakConfig;
use crate::error::{PeakError, Result};
use crate::factory::{PeakFactory, ScanDiagnostics};
use crate::genome::GenomeSpace;
use crate::lambda::{GlobalLambdas, TrackTotals};
use crate::parallel::{group_by_chromosome, renumber, scan_shards};
use crate::report::{HeaderTrack, LogRatioSummary, ReportHeader, ReportLayout, Reporter};
use crate::score::{PoissonScoreMachine, ScoreMachine, SkellamScoreMachine};
use crate::streaming::PeakWriter;
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Which test is run and how many tracks it takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    /// One track against its own global lambda (Poisson).
    Poisson,
    /// Case against control (Skellam).
    Enrich,
    /// Two case/control pairs (Skellam, three hypotheses).
    Diff,
}

impl CallMode {
    /// Track labels, in the order the score machine expects them.
    pub fn labels(self) -> &'static [&'static str] {
        match self {
            CallMode::Poisson => &["case"],
            CallMode::Enrich => &["case", "control"],
            CallMode::Diff => &["caseA", "controlA", "caseB", "controlB"],
        }
    }

    pub fn layout(self) -> ReportLayout {
        match self {
            CallMode::Poisson => ReportLayout::Single,
            CallMode::Enrich => ReportLayout::CaseControl,
            CallMode::Diff => ReportLayout::Differential,
        }
    }

    fn program(self) -> &'static str {
        match self {
            CallMode::Poisson => "CallPeakPoisson",
            CallMode::Enrich => "CallPeakEnrich",
            CallMode::Diff => "CallPeakDiff",
        }
    }
}

/// One input track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSpec {
    pub path: PathBuf,
    pub label: String,
    /// Paired-end source; only reported in the header.
    pub paired: bool,
}

impl TrackSpec {
    pub fn new(path: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
            paired: false,
        }
    }

    /// Set the paired flag (builder pattern).
    pub fn with_paired(mut self, paired: bool) -> Self {
        self.paired = paired;
        self
    }
}

/// Peak calling command configuration.
#[derive(Debug, Clone)]
pub struct CallPeaksCommand {
    pub mode: CallMode,
    pub tracks: Vec<TrackSpec>,
    pub config: PeakConfig,
    /// Scan chromosomes in parallel shards
    pub parallel: bool,
    /// Command line echoed in the header
    pub command_line: String,
    /// Optional peak-detail table
    pub details: Option<PathBuf>,
}

impl CallPeaksCommand {
    /// Create a command from track paths, labeled in mode order.
    pub fn new<P: AsRef<Path>>(mode: CallMode, paths: &[P]) -> Self {
        let tracks = mode
            .labels()
            .iter()
            .zip(paths)
            .map(|(label, path)| TrackSpec::new(path.as_ref(), *label))
            .collect();
        Self {
            mode,
            tracks,
            config: PeakConfig::new(),
            parallel: false,
            command_line: String::new(),
            details: None,
        }
    }

    /// Set the peak configuration (builder pattern).
    pub fn with_config(mut self, config: PeakConfig) -> Self {
        self.config = config;
        self
    }

    /// Mark tracks as paired-end, in track order (builder pattern).
    pub fn with_paired(mut self, paired: &[bool]) -> Self {
        for (track, &p) in self.tracks.iter_mut().zip(paired) {
            track.paired = p;
        }
        self
    }

    /// Enable chromosome-sharded parallel scanning.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set the command line shown in the header.
    pub fn with_command_line(mut self, command_line: impl Into<String>) -> Self {
        self.command_line = command_line.into();
        self
    }

    /// Also write a peak-detail table to `path` (builder pattern).
    pub fn with_details(mut self, path: impl Into<PathBuf>) -> Self {
        self.details = Some(path.into());
        self
    }

    fn validate(&self) -> Result<()> {
        self.config.validate()?;
        let expected = self.mode.labels().len();
        if self.tracks.len() != expected {
            return Err(PeakError::InvalidConfig(format!(
                "{:?} mode takes {} tracks, got {}",
                self.mode,
                expected,
                self.tracks.len()
            )));
        }
        Ok(())
    }

    /// Call peaks and write the table to `output`.
    pub fn run<W: Write>(&self, genome: &GenomeSpace, output: &mut W) -> Result<CallPeaksStats> {
        self.validate()?;
        let threshold = self.config.threshold;
        match self.mode {
            CallMode::Poisson => self.execute(genome, PoissonScoreMachine::new(threshold), output),
            CallMode::Enrich => {
                self.execute(genome, SkellamScoreMachine::case_control(threshold), output)
            }
            CallMode::Diff => {
                self.execute(genome, SkellamScoreMachine::differential(threshold), output)
            }
        }
    }

    fn execute<S, W>(&self, genome: &GenomeSpace, machine: S, output: &mut W) -> Result<CallPeaksStats>
    where
        S: ScoreMachine + Clone + Sync + Send,
        W: Write,
    {
        let stats = if self.parallel {
            self.run_sharded(genome, &machine, output)?
        } else {
            self.run_streaming(genome, machine, output)?
        };

        if stats.diagnostics.underflows > 0 {
            warn!(
                "{} positions could not be scored and were treated as not significant",
                stats.diagnostics.underflows
            );
        }
        if self.mode == CallMode::Diff {
            info!("log2(FoldChangeA/FoldChangeB): {}", stats.log_ratios);
        }
        info!("{}", stats);
        Ok(stats)
    }

    fn labels(&self) -> Vec<String> {
        self.tracks.iter().map(|t| t.label.clone()).collect()
    }

    fn header<'a>(&'a self, genome: &GenomeSpace, lambdas: &'a GlobalLambdas) -> ReportHeader<'a> {
        ReportHeader {
            program: self.mode.program(),
            version: env!("CARGO_PKG_VERSION"),
            tracks: self
                .tracks
                .iter()
                .map(|t| HeaderTrack {
                    label: t.label.clone(),
                    path: t.path.display().to_string(),
                    paired: t.paired,
                })
                .collect(),
            lambdas,
            genome_size: genome.total_length(),
            command_line: self.command_line.clone(),
            layout: self.mode.layout(),
        }
    }

    fn detail_writer(&self) -> Result<Option<PeakWriter<File>>> {
        let Some(path) = &self.details else {
            return Ok(None);
        };
        let mut writer = PeakWriter::new(File::create(path)?);
        writer.write_detail_header(&self.labels())?;
        Ok(Some(writer))
    }

    fn global_lambdas(&self, genome: &GenomeSpace, totals: &[TrackTotals]) -> Result<GlobalLambdas> {
        let effective_length = self.config.scope.effective_length(genome)?;
        let lambdas = GlobalLambdas::from_totals(totals, effective_length, self.config.window)?;
        info!(
            "global lambdas {} over {} bp ({})",
            lambdas, effective_length, self.config.scope
        );
        Ok(lambdas)
    }

    /// Single pass per track for totals, then one streaming scan.
    fn run_streaming<S, W>(&self, genome: &GenomeSpace, machine: S, output: &mut W) -> Result<CallPeaksStats>
    where
        S: ScoreMachine,
        W: Write,
    {
        let mut totals = Vec::with_capacity(self.tracks.len());
        for track in &self.tracks {
            let reader = BedTrackReader::from_path(&track.path)
                .map_err(|e| PeakError::track(&track.label, e))?;
            totals.push(TrackTotals::from_reader(reader, genome, &self.config.scope, &track.label)?);
        }
        let lambdas = self.global_lambdas(genome, &totals)?;

        let mut sources = Vec::with_capacity(self.tracks.len());
        for track in &self.tracks {
            let reader = BedTrackReader::from_path(&track.path)
                .map_err(|e| PeakError::track(&track.label, e))?;
            sources.push((track.label.clone(), reader));
        }

        let mut writer = PeakWriter::new(output);
        writer.write_header(&self.header(genome, &lambdas))?;

        let mut details = self.detail_writer()?;

        let mut factory = PeakFactory::new(sources, genome, &lambdas, &self.config, machine)?;
        let mut reporter = Reporter::new(self.mode.layout(), &lambdas);
        let mut failure = None;
        for result in factory.by_ref() {
            let peak = match result {
                Ok(peak) => peak,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            };
            writer.write_report(&reporter.report(&peak))?;
            if let Some(details) = details.as_mut() {
                details.write_detail(&peak)?;
            }
        }
        writer.flush()?;
        if let Some(details) = details.as_mut() {
            details.flush()?;
        }
        if let Some(e) = failure {
            return Err(e);
        }

        Ok(CallPeaksStats {
            peaks: reporter.peaks(),
            diagnostics: factory.diagnostics(),
            log_ratios: reporter.summary().clone(),
            failed_shards: 0,
        })
    }

    /// Load every track, then scan chromosomes in parallel.
    fn run_sharded<S, W>(&self, genome: &GenomeSpace, machine: &S, output: &mut W) -> Result<CallPeaksStats>
    where
        S: ScoreMachine + Clone + Sync + Send,
        W: Write,
    {
        let mut loaded = Vec::with_capacity(self.tracks.len());
        for track in &self.tracks {
            let intervals =
                read_intervals(&track.path).map_err(|e| PeakError::track(&track.label, e))?;
            loaded.push((track.label.clone(), intervals));
        }

        let scope = &self.config.scope;
        let totals: Vec<TrackTotals> = loaded
            .iter()
            .map(|(_, intervals)| TrackTotals::from_intervals(intervals, genome, scope))
            .collect();
        let lambdas = self.global_lambdas(genome, &totals)?;

        let plan = group_by_chromosome(loaded, genome, |chrom| scope.includes(chrom));
        let mut first_error = None;
        for e in plan.unplaced {
            warn!("{}", e);
            first_error.get_or_insert(e);
        }

        info!("scanning {} chromosomes in parallel", plan.shards.len());
        let labels = self.labels();
        let mut outcomes = scan_shards(plan.shards, &labels, genome, &lambdas, &self.config, machine);

        let mut diagnostics = ScanDiagnostics::default();
        let mut failed_shards = 0;
        for outcome in &mut outcomes {
            diagnostics.merge(&outcome.diagnostics);
            if let Some(e) = outcome.error.take() {
                warn!("chromosome {} failed: {}", outcome.chrom, e);
                failed_shards += 1;
                first_error.get_or_insert(e);
            }
        }
        let peaks = renumber(&mut outcomes, &self.config.prefix);

        let mut writer = PeakWriter::new(output);
        writer.write_header(&self.header(genome, &lambdas))?;
        let mut details = self.detail_writer()?;
        let mut reporter = Reporter::new(self.mode.layout(), &lambdas);
        for peak in &peaks {
            writer.write_report(&reporter.report(peak))?;
            if let Some(details) = details.as_mut() {
                details.write_detail(peak)?;
            }
        }
        writer.flush()?;
        if let Some(details) = details.as_mut() {
            details.flush()?;
        }

        if let Some(e) = first_error {
            warn!(
                "{} of {} chromosomes failed, {} peaks written from the others",
                failed_shards,
                outcomes.len(),
                reporter.peaks()
            );
            return Err(e);
        }
        Ok(CallPeaksStats {
            peaks: reporter.peaks(),
            diagnostics,
            log_ratios: reporter.summary().clone(),
            failed_shards,
        })
    }
}

/// Statistics from a peak calling run.
#[derive(Debug, Clone, Default)]
pub struct CallPeaksStats {
    pub peaks: u64,
    pub diagnostics: ScanDiagnostics,
    /// log2 fold-change ratios (diff mode only).
    pub log_ratios: LogRatioSummary,
    pub failed_shards: usize,
}

impl fmt::Display for CallPeaksStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peaks written: {}, {}", self.peaks, self.diagnostics)
    }
}
