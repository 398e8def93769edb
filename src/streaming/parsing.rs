//! Zero-allocation BED parsing utilities.
//!
//! These functions provide high-performance parsing of BED records
//! without any heap allocation in the hot path.

use crate::interval::Strand;
use memchr::memchr;

/// Fast u64 parsing - no allocation, no error formatting.
///
/// Returns None if the input is empty or contains non-digit characters.
#[inline(always)]
pub fn parse_u64_fast(bytes: &[u8]) -> Option<u64> {
    if bytes.is_empty() {
        return None;
    }
    let mut n: u64 = 0;
    for &b in bytes {
        let d = b.wrapping_sub(b'0');
        if d > 9 {
            return None;
        }
        n = n.wrapping_mul(10).wrapping_add(d as u64);
    }
    Some(n)
}

/// Fields of a read record borrowed from a BED line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BedFields<'a> {
    pub chrom: &'a [u8],
    pub start: u64,
    pub end: u64,
    pub strand: Strand,
}

/// Split the next tab-delimited field off `rest`.
#[inline(always)]
fn next_field<'a>(rest: &mut &'a [u8]) -> Option<&'a [u8]> {
    if rest.is_empty() {
        return None;
    }
    match memchr(b'\t', rest) {
        Some(tab) => {
            let field = &rest[..tab];
            *rest = &rest[tab + 1..];
            Some(field)
        }
        None => {
            let field = *rest;
            *rest = &[];
            Some(field)
        }
    }
}

/// Parse the coordinate columns of a BED line using memchr - zero
/// allocation. The strand comes from column 6 when present; extra columns
/// are ignored.
#[inline(always)]
pub fn parse_bed_fields(line: &[u8]) -> Option<BedFields<'_>> {
    let line = match memchr(b'\n', line) {
        Some(nl) => &line[..nl],
        None => line,
    };
    let line = line.strip_suffix(b"\r").unwrap_or(line);

    let mut rest = line;
    let chrom = next_field(&mut rest)?;
    let start = parse_u64_fast(next_field(&mut rest)?)?;
    let end = parse_u64_fast(next_field(&mut rest)?)?;

    // name, score, strand
    let strand = next_field(&mut rest)
        .and_then(|_| next_field(&mut rest))
        .and_then(|_| next_field(&mut rest))
        .and_then(|s| s.first().copied())
        .map(Strand::from_byte)
        .unwrap_or(Strand::Unknown);

    Some(BedFields {
        chrom,
        start,
        end,
        strand,
    })
}

/// Check if a line should be skipped (empty, comment, or header).
#[inline(always)]
pub fn should_skip_line(line: &[u8]) -> bool {
    line.is_empty() || line[0] == b'#' || line.starts_with(b"track") || line.starts_with(b"browser")
}
