//! GRIT peaks: multi-track peak calling over sorted BED tracks
//!
//! Usage: grit-peaks <COMMAND> [OPTIONS]

use clap::{Args, Parser, Subcommand};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing::error;
use tracing_subscriber::EnvFilter;

use grit_peaks::commands::{CallMode, CallPeaksCommand};
use grit_peaks::config::{
    LambdaScope, PeakConfig, DEFAULT_LOCAL_WINDOW, DEFAULT_MAX_GAP, DEFAULT_PREFIX,
};
use grit_peaks::error::PeakError;
use grit_peaks::genome::GenomeSpace;

#[derive(Parser)]
#[command(name = "grit-peaks")]
#[command(author = "Manish Kumar Bobbili")]
#[command(version)]
#[command(about = "GRIT peaks: streaming multi-track peak calling over sorted BED tracks", long_about = None)]
struct Cli {
    /// Number of threads; more than one scans chromosomes in parallel
    #[arg(long, short = 't', global = true)]
    threads: Option<usize>,

    /// Log per-chromosome progress to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call peaks on one track against its global lambda (Poisson)
    Poisson {
        /// Case track (sorted BED)
        #[arg(long)]
        case: PathBuf,

        /// Case track comes from paired-end reads
        #[arg(long)]
        paired_case: bool,

        #[command(flatten)]
        options: PeakArgs,
    },

    /// Call peaks enriched in a case track over a control track (Skellam)
    Enrich {
        /// Case track (sorted BED)
        #[arg(long)]
        case: PathBuf,

        /// Control track (sorted BED)
        #[arg(long)]
        control: PathBuf,

        /// Case track comes from paired-end reads
        #[arg(long)]
        paired_case: bool,

        /// Control track comes from paired-end reads
        #[arg(long)]
        paired_control: bool,

        #[command(flatten)]
        options: PeakArgs,
    },

    /// Call differential peaks between two case/control pairs (Skellam)
    Diff {
        /// Case track of sample A
        #[arg(long = "case-a")]
        case_a: PathBuf,

        /// Control track of sample A
        #[arg(long = "control-a")]
        control_a: PathBuf,

        /// Case track of sample B
        #[arg(long = "case-b")]
        case_b: PathBuf,

        /// Control track of sample B
        #[arg(long = "control-b")]
        control_b: PathBuf,

        /// Case track of sample A comes from paired-end reads
        #[arg(long = "paired-case-a")]
        paired_case_a: bool,

        /// Control track of sample A comes from paired-end reads
        #[arg(long = "paired-control-a")]
        paired_control_a: bool,

        /// Case track of sample B comes from paired-end reads
        #[arg(long = "paired-case-b")]
        paired_case_b: bool,

        /// Control track of sample B comes from paired-end reads
        #[arg(long = "paired-control-b")]
        paired_control_b: bool,

        #[command(flatten)]
        options: PeakArgs,
    },
}

/// Options shared by every peak calling command.
#[derive(Args)]
struct PeakArgs {
    /// Genome file (chrom<TAB>size) defining chromosome order and lengths
    #[arg(short = 'g', long)]
    genome: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write per-peak details (significant positions, per-track sums)
    #[arg(short = 'd', long)]
    details: Option<PathBuf>,

    /// Reads within this many bases of a position count towards it
    #[arg(short, long, default_value = "0")]
    window: u64,

    /// Flank of the environment window for the local lambda (0 = global only)
    #[arg(long, default_value_t = DEFAULT_LOCAL_WINDOW)]
    local_window: u64,

    /// Significance threshold as -log10(p-value)
    #[arg(short, long, default_value = "8")]
    score_threshold: f64,

    /// Maximum gap between significant positions merged into one peak
    #[arg(long, default_value_t = DEFAULT_MAX_GAP)]
    max_gap: u64,

    /// Peak id prefix
    #[arg(long, default_value = DEFAULT_PREFIX)]
    prefix: String,

    /// Scan a single chromosome; lambdas are averaged over it
    #[arg(long)]
    chrom: Option<String>,

    /// Every track comes from paired-end reads (recorded in the header)
    #[arg(long)]
    paired: bool,
}

impl PeakArgs {
    fn config(&self) -> PeakConfig {
        let scope = match &self.chrom {
            Some(chrom) => LambdaScope::Chromosome(chrom.clone()),
            None => LambdaScope::Genome,
        };
        PeakConfig::new()
            .with_window(self.window)
            .with_local_window(self.local_window)
            .with_score_threshold(self.score_threshold)
            .with_max_gap(self.max_gap)
            .with_prefix(self.prefix.clone())
            .with_scope(scope)
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("grit_peaks=debug,info")
        } else {
            EnvFilter::new("grit_peaks=info,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    // Configure thread pool if --threads specified
    if let Some(n) = cli.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
        {
            error!("failed to initialize thread pool: {}", e);
            process::exit(1);
        }
    }
    let parallel = cli.threads.is_some_and(|n| n > 1);

    let (mode, paths, paired, options) = match cli.command {
        Commands::Poisson {
            case,
            paired_case,
            options,
        } => (CallMode::Poisson, vec![case], vec![paired_case], options),
        Commands::Enrich {
            case,
            control,
            paired_case,
            paired_control,
            options,
        } => (
            CallMode::Enrich,
            vec![case, control],
            vec![paired_case, paired_control],
            options,
        ),
        Commands::Diff {
            case_a,
            control_a,
            case_b,
            control_b,
            paired_case_a,
            paired_control_a,
            paired_case_b,
            paired_control_b,
            options,
        } => (
            CallMode::Diff,
            vec![case_a, control_a, case_b, control_b],
            vec![
                paired_case_a,
                paired_control_a,
                paired_case_b,
                paired_control_b,
            ],
            options,
        ),
    };
    let paired: Vec<bool> = paired.into_iter().map(|p| p || options.paired).collect();

    if let Err(e) = run_call(mode, &paths, &paired, &options, parallel) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_call(
    mode: CallMode,
    paths: &[PathBuf],
    paired: &[bool],
    options: &PeakArgs,
    parallel: bool,
) -> Result<(), PeakError> {
    let genome = load_genome(&options.genome)?;
    let command_line = std::env::args().collect::<Vec<_>>().join(" ");

    let mut command = CallPeaksCommand::new(mode, paths)
        .with_config(options.config())
        .with_paired(paired)
        .with_parallel(parallel)
        .with_command_line(command_line);
    if let Some(path) = &options.details {
        command = command.with_details(path);
    }

    match &options.output {
        Some(path) => {
            let mut file = File::create(path)?;
            command.run(&genome, &mut file)?;
            file.flush()?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            command.run(&genome, &mut handle)?;
        }
    }
    Ok(())
}

fn load_genome(path: &Path) -> Result<GenomeSpace, PeakError> {
    GenomeSpace::from_file(path)
        .map_err(|e| PeakError::InvalidConfig(format!("Failed to load genome file: {}", e)))
}
