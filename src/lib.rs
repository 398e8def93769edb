// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

//! GRIT peaks: multi-track peak calling over sorted genomic intervals.
//!
//! Several sorted interval tracks (e.g. case and control reads) are scanned
//! left to right in lock step. At every covered coordinate a score machine
//! turns the per-track read counts into a p-value; runs of significant
//! coordinates, allowing small gaps, are merged into peaks.
//!
//! # Features
//!
//! - **Streaming**: one pass per track, memory bounded by the window sizes
//! - **Pluggable statistics**: Poisson or Skellam score machines
//! - **Parallel processing**: optional chromosome shards on Rayon
//!
//! # Example
//!
//! ```rust,no_run
//! use grit_peaks::{bed, genome::GenomeSpace, prelude::*};
//!
//! let genome = GenomeSpace::from_file("hg38.genome").unwrap();
//! let case = bed::read_intervals("case.bed").unwrap();
//!
//! let config = PeakConfig::new().with_score_threshold(8.0);
//! let totals = TrackTotals::from_intervals(&case, &genome, &config.scope);
//! let length = config.scope.effective_length(&genome).unwrap();
//! let lambdas = GlobalLambdas::from_totals(&[totals], length, config.window).unwrap();
//!
//! let source = case.into_iter().map(Ok);
//! let machine = PoissonScoreMachine::new(config.threshold);
//! let factory = PeakFactory::new(
//!     vec![("case".to_string(), source)],
//!     &genome,
//!     &lambdas,
//!     &config,
//!     machine,
//! )
//! .unwrap();
//! for peak in factory {
//!     println!("{}", peak.unwrap());
//! }
//! ```

pub mod bed;
pub mod commands;
pub mod config;
pub mod cursor;
pub mod error;
pub mod factory;
pub mod genome;
pub mod interval;
pub mod lambda;
pub mod parallel;
pub mod peak;
pub mod report;
pub mod score;
pub mod stats;
pub mod streaming;

// Re-export commonly used types
pub use bed::{read_intervals, BedError, BedTrackReader};
pub use error::PeakError;
pub use interval::{Interval, Strand};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bed::{read_intervals, BedTrackReader};
    pub use crate::commands::{CallMode, CallPeaksCommand, TrackSpec};
    pub use crate::config::{LambdaScope, PeakConfig};
    pub use crate::factory::{PeakFactory, ScanDiagnostics};
    pub use crate::lambda::{GlobalLambdas, TrackTotals};
    pub use crate::peak::Peak;
    pub use crate::score::{PoissonScoreMachine, ScoreMachine, SkellamScoreMachine};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_basic_workflow() {
        use crate::bed::{parse_intervals, BedError};
        use crate::prelude::*;

        let genome: crate::genome::GenomeSpace =
            [("chr1".to_string(), 1000)].into_iter().collect();
        let content = "chr1\t100\t101\n".repeat(6);
        let intervals = parse_intervals(&content).unwrap();

        let config = PeakConfig::new().with_threshold(1e-3).with_local_window(0);
        let totals = TrackTotals::from_intervals(&intervals, &genome, &config.scope);
        let lambdas = GlobalLambdas::from_totals(&[totals], 1000, 0).unwrap();
        let source = intervals.into_iter().map(Ok::<_, BedError>);

        let peaks: Vec<Peak> = PeakFactory::new(
            vec![("case".to_string(), source)],
            &genome,
            &lambdas,
            &config,
            PoissonScoreMachine::new(config.threshold),
        )
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].start, 100);
        assert_eq!(peaks[0].end, 101);
    }
}
