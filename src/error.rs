//! Errors raised while scanning tracks for peaks.

use crate::bed::BedError;
use std::io;
use thiserror::Error;

/// Fatal errors for a peak-calling run (or for one chromosome shard).
#[derive(Error, Debug)]
pub enum PeakError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("track {track}: {source}")]
    Track {
        track: String,
        #[source]
        source: BedError,
    },

    #[error(
        "track {track} not sorted: {chrom}:{start} comes after position {previous}\n\n\
         Fix: sort the input by chromosome (genome file order) and start position."
    )]
    OutOfOrderInput {
        track: String,
        chrom: String,
        start: u64,
        previous: u64,
    },

    #[error(
        "track {track} not sorted by genome order: chromosome '{chrom}' {reason}\n\n\
         Fix: sort the input so chromosomes follow the genome file order."
    )]
    ChromosomeOrder {
        track: String,
        chrom: String,
        reason: String,
    },

    #[error("track {track}: chromosome '{chrom}' not found in genome file")]
    UnknownChromosome { track: String, chrom: String },

    #[error("effective length of {scope} is zero, cannot compute global lambda")]
    ZeroEffectiveLength { scope: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PeakError {
    /// Wrap a reader error with the label of the track it came from.
    pub fn track(track: impl Into<String>, source: BedError) -> Self {
        PeakError::Track {
            track: track.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, PeakError>;
