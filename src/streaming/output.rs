//! Efficient output formatting for the peak table.
//!
//! Uses itoa for integer formatting and ryu for float formatting
//! to avoid allocation in the hot path.

use crate::error::Result;
use crate::peak::Peak;
use crate::report::{PeakReport, ReportHeader, ReportValues};
use std::io::{BufWriter, Write};

/// Buffer size for PeakWriter (1MB default).
const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Buffered writer for peak tables.
pub struct PeakWriter<W: Write> {
    writer: BufWriter<W>,
    itoa_buf: itoa::Buffer,
    ryu_buf: ryu::Buffer,
}

impl<W: Write> PeakWriter<W> {
    /// Create a new PeakWriter with default 1MB buffer.
    pub fn new(output: W) -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE, output)
    }

    /// Create a new PeakWriter with specified buffer size.
    pub fn with_capacity(capacity: usize, output: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, output),
            itoa_buf: itoa::Buffer::new(),
            ryu_buf: ryu::Buffer::new(),
        }
    }

    /// Write the `#`-prefixed header block.
    pub fn write_header(&mut self, header: &ReportHeader<'_>) -> Result<()> {
        for line in header.lines() {
            self.writer.write_all(b"# ")?;
            self.writer.write_all(line.as_bytes())?;
            self.writer.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Write one peak row.
    pub fn write_report(&mut self, report: &PeakReport<'_>) -> Result<()> {
        let peak = report.peak;
        self.writer.write_all(peak.chrom.as_bytes())?;
        self.write_tab()?;
        self.write_int(peak.start)?;
        self.write_tab()?;
        self.write_int(peak.end)?;
        self.write_tab()?;
        self.writer.write_all(peak.id.as_bytes())?;
        self.write_tab()?;
        self.write_fixed(report.score, 2)?;

        match &report.values {
            ReportValues::Single {
                average,
                normalized,
            } => {
                self.write_tab()?;
                self.write_fixed(*average, 4)?;
                self.write_tab()?;
                self.write_float(*normalized)?;
            }
            ReportValues::CaseControl {
                case,
                control,
                fold_change,
            } => {
                for v in [*case, *control, *fold_change] {
                    self.write_tab()?;
                    self.write_fixed(v, 4)?;
                }
            }
            ReportValues::Differential {
                sum,
                proportion,
                averages,
                fold_change_a,
                fold_change_b,
                log_ratio,
            } => {
                self.write_tab()?;
                self.write_fixed(*sum, 2)?;
                self.write_tab()?;
                match proportion {
                    Some(p) => self.write_fixed(*p, 4)?,
                    None => self.writer.write_all(b"NA")?,
                }
                for v in averages
                    .iter()
                    .chain([fold_change_a, fold_change_b, log_ratio])
                {
                    self.write_tab()?;
                    self.write_fixed(*v, 4)?;
                }
            }
        }
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Write the column header of the peak-detail table.
    pub fn write_detail_header(&mut self, labels: &[String]) -> Result<()> {
        self.writer
            .write_all(b"# id\tchr\tstart\tend\tsignificant\tscore")?;
        for label in labels {
            self.write_tab()?;
            self.writer.write_all(label.as_bytes())?;
            self.writer.write_all(b"_sum")?;
        }
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Write one peak-detail row: significant coordinates, best score and
    /// raw per-track sums.
    pub fn write_detail(&mut self, peak: &Peak) -> Result<()> {
        self.writer.write_all(peak.id.as_bytes())?;
        self.write_tab()?;
        self.writer.write_all(peak.chrom.as_bytes())?;
        self.write_tab()?;
        self.write_int(peak.start)?;
        self.write_tab()?;
        self.write_int(peak.end)?;
        self.write_tab()?;
        self.write_int(peak.significant)?;
        self.write_tab()?;
        self.write_fixed(peak.score(), 2)?;
        for &sum in &peak.sums {
            self.write_tab()?;
            self.write_int(sum)?;
        }
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    /// Write a tab character.
    #[inline]
    fn write_tab(&mut self) -> Result<()> {
        self.writer.write_all(b"\t")?;
        Ok(())
    }

    /// Write an integer using itoa.
    #[inline]
    fn write_int<I: itoa::Integer>(&mut self, n: I) -> Result<()> {
        self.writer.write_all(self.itoa_buf.format(n).as_bytes())?;
        Ok(())
    }

    /// Write a float using ryu (shortest round-trip form).
    #[inline]
    fn write_float(&mut self, f: f64) -> Result<()> {
        self.writer.write_all(self.ryu_buf.format(f).as_bytes())?;
        Ok(())
    }

    /// Write a float with a fixed number of decimal places.
    #[inline]
    fn write_fixed(&mut self, f: f64, decimals: usize) -> Result<()> {
        write!(self.writer, "{:.*}", decimals, f)?;
        Ok(())
    }

    /// Flush the output buffer.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
