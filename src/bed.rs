//! Streaming BED track reader.
//!
//! Reads aligned reads (or fragments) stored as sorted BED3/BED6 records and
//! yields them one at a time as [`Interval`]s. Only the coordinate columns
//! and the strand are interpreted.

use crate::interval::Interval;
use crate::streaming::parsing::{parse_bed_fields, should_skip_line};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;

/// Default input buffer size (256 KB).
/// Good balance for reading sorted BED files.
pub const DEFAULT_INPUT_BUFFER: usize = 256 * 1024;

/// Errors that can occur during BED parsing.
#[derive(Error, Debug)]
pub enum BedError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, BedError>;

/// A streaming BED reader producing one interval per record.
pub struct BedTrackReader<R: Read> {
    reader: BufReader<R>,
    line_number: usize,
    buffer: Vec<u8>,
}

impl BedTrackReader<File> {
    /// Open a BED file from a path.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::with_capacity(file, DEFAULT_INPUT_BUFFER))
    }
}

impl<R: Read> BedTrackReader<R> {
    /// Create a new BED reader from any readable source.
    pub fn new(reader: R) -> Self {
        Self::with_capacity(reader, 8 * 1024)
    }

    /// Create a BED reader with custom buffer capacity.
    pub fn with_capacity(reader: R, capacity: usize) -> Self {
        Self {
            reader: BufReader::with_capacity(capacity, reader),
            line_number: 0,
            buffer: Vec::with_capacity(1024),
        }
    }

    /// Read the next interval, skipping comments and header lines.
    pub fn read_interval(&mut self) -> Result<Option<Interval>> {
        loop {
            self.buffer.clear();
            let bytes_read = self.reader.read_until(b'\n', &mut self.buffer)?;
            if bytes_read == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let line = self.buffer.trim_ascii();
            if should_skip_line(line) {
                continue;
            }

            let fields = parse_bed_fields(line).ok_or_else(|| BedError::Parse {
                line: self.line_number,
                message: format!(
                    "Expected chrom, start and end columns, got '{}'",
                    String::from_utf8_lossy(line)
                ),
            })?;

            if fields.start > fields.end {
                return Err(BedError::Parse {
                    line: self.line_number,
                    message: format!("Start ({}) > end ({})", fields.start, fields.end),
                });
            }

            let chrom = std::str::from_utf8(fields.chrom).map_err(|_| BedError::Parse {
                line: self.line_number,
                message: "Chromosome name is not valid UTF-8".to_string(),
            })?;

            return Ok(Some(
                Interval::new(chrom, fields.start, fields.end).with_strand(fields.strand),
            ));
        }
    }

    /// Number of lines consumed so far.
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl<R: Read> Iterator for BedTrackReader<R> {
    type Item = Result<Interval>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_interval().transpose()
    }
}

/// Read all intervals from a BED file.
pub fn read_intervals<P: AsRef<Path>>(path: P) -> Result<Vec<Interval>> {
    BedTrackReader::from_path(path)?.collect()
}

/// Parse intervals from a string (useful for testing).
pub fn parse_intervals(content: &str) -> Result<Vec<Interval>> {
    BedTrackReader::new(content.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Strand;

    #[test]
    fn test_parse_bed3() {
        let content = "chr1\t100\t200\nchr1\t300\t400\n";
        let intervals = parse_intervals(content).unwrap();

        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].chrom, "chr1");
        assert_eq!(intervals[0].start, 100);
        assert_eq!(intervals[0].end, 200);
    }

    #[test]
    fn test_parse_bed6() {
        let content = "chr1\t100\t200\tread1\t60\t+\nchr1\t120\t220\tread2\t60\t-\n";
        let intervals = parse_intervals(content).unwrap();

        assert_eq!(intervals.len(), 2);
        assert_eq!(intervals[0].strand, Strand::Plus);
        assert_eq!(intervals[1].strand, Strand::Minus);
    }

    #[test]
    fn test_skip_comments_and_track_lines() {
        let content = "# comment\ntrack name=test\nbrowser position chr1:1-1000\n\nchr1\t100\t200\n";
        let intervals = parse_intervals(content).unwrap();

        assert_eq!(intervals.len(), 1);
    }

    #[test]
    fn test_invalid_bed() {
        let content = "chr1\t100\n";
        let err = parse_intervals(content).unwrap_err();
        assert!(matches!(err, BedError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_malformed_records_are_parse_errors() {
        for content in ["chr1\t100\n", "chr1\tx\t5\n", "chr1\t5\ty\n"] {
            match parse_intervals(content).unwrap_err() {
                BedError::Parse { line, message } => {
                    assert_eq!(line, 1);
                    assert!(message.contains("Expected chrom"), "{}", message);
                }
                BedError::Io(e) => panic!("unexpected I/O error: {}", e),
            }
        }
    }

    #[test]
    fn test_start_after_end() {
        let content = "chr1\t10\t20\nchr1\t300\t200\n";
        let err = parse_intervals(content).unwrap_err();
        assert!(matches!(err, BedError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_reader_is_lazy() {
        let content = "chr1\t1\t2\nnot a record\n";
        let mut reader = BedTrackReader::new(content.as_bytes());

        assert!(reader.next().unwrap().is_ok());
        assert_eq!(reader.line_number(), 1);
        assert!(reader.next().unwrap().is_err());
    }
}
