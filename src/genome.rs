//! Genome coordinate space from a chromosome sizes file.
//!
//! Parses .genome files (tab-delimited: chrom\tsize). The file order is the
//! scan order: tracks must list chromosomes in the same order.

use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::bed::BedError;

/// Genome information containing chromosome sizes.
/// Preserves chromosome order from input file.
#[derive(Debug, Clone, Default)]
pub struct GenomeSpace {
    /// Map of chromosome name to its rank in `order`
    ranks: FxHashMap<String, usize>,
    /// Chromosome names and sizes in file order
    order: Vec<(String, u64)>,
}

impl GenomeSpace {
    /// Create an empty genome.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load genome from a file.
    /// Format: tab-delimited with chrom\tsize per line
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, BedError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut genome = Self::new();

        for (line_num, line_result) in reader.lines().enumerate() {
            let line = line_result?;
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 2 {
                return Err(BedError::Parse {
                    line: line_num + 1,
                    message: "Genome file requires two columns: chrom and size".to_string(),
                });
            }

            let size: u64 = fields[1].parse().map_err(|_| BedError::Parse {
                line: line_num + 1,
                message: format!("Invalid chromosome size: {}", fields[1]),
            })?;

            genome.insert(fields[0].to_string(), size);
        }

        Ok(genome)
    }

    /// Get the size of a chromosome.
    #[inline]
    pub fn chrom_size(&self, chrom: &str) -> Option<u64> {
        self.rank(chrom).map(|r| self.order[r].1)
    }

    /// Position of a chromosome in file order.
    #[inline]
    pub fn rank(&self, chrom: &str) -> Option<usize> {
        self.ranks.get(chrom).copied()
    }

    /// Check if a chromosome exists.
    #[inline]
    pub fn has_chrom(&self, chrom: &str) -> bool {
        self.ranks.contains_key(chrom)
    }

    /// Chromosome name and size at a given rank.
    pub fn get(&self, rank: usize) -> Option<(&str, u64)> {
        self.order.get(rank).map(|(c, s)| (c.as_str(), *s))
    }

    /// Get all chromosome names in order.
    pub fn chromosomes(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|(c, _)| c.as_str())
    }

    /// Sum of all chromosome sizes.
    pub fn total_length(&self) -> u64 {
        self.order.iter().map(|(_, s)| *s).sum()
    }

    /// Get number of chromosomes.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Insert a chromosome size (appends to order if new, updates otherwise).
    pub fn insert(&mut self, chrom: String, size: u64) {
        match self.ranks.get(&chrom) {
            Some(&rank) => self.order[rank].1 = size,
            None => {
                self.ranks.insert(chrom.clone(), self.order.len());
                self.order.push((chrom, size));
            }
        }
    }
}

impl FromIterator<(String, u64)> for GenomeSpace {
    fn from_iter<T: IntoIterator<Item = (String, u64)>>(iter: T) -> Self {
        let mut genome = Self::new();
        for (chrom, size) in iter {
            genome.insert(chrom, size);
        }
        genome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_genome_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "chr1\t1000000").unwrap();
        writeln!(file, "chr2\t500000").unwrap();
        writeln!(file, "# comment line").unwrap();
        writeln!(file, "chr3\t250000").unwrap();

        let genome = GenomeSpace::from_file(file.path()).unwrap();

        assert_eq!(genome.chrom_size("chr1"), Some(1000000));
        assert_eq!(genome.chrom_size("chr2"), Some(500000));
        assert_eq!(genome.chrom_size("chr3"), Some(250000));
        assert_eq!(genome.chrom_size("chr4"), None);
        assert_eq!(genome.len(), 3);
        assert_eq!(genome.total_length(), 1_750_000);
    }

    #[test]
    fn test_genome_order_and_rank() {
        let genome: GenomeSpace = [("chr9", 100), ("chr10", 200), ("chr2", 50)]
            .into_iter()
            .map(|(c, s)| (c.to_string(), s))
            .collect();

        let order: Vec<&str> = genome.chromosomes().collect();
        assert_eq!(order, vec!["chr9", "chr10", "chr2"]);
        assert_eq!(genome.rank("chr10"), Some(1));
        assert_eq!(genome.get(2), Some(("chr2", 50)));
        assert!(!genome.has_chrom("chr1"));
    }

    #[test]
    fn test_genome_insert_updates_size() {
        let mut genome = GenomeSpace::new();
        genome.insert("chr1".to_string(), 1000);
        genome.insert("chr1".to_string(), 2000);

        assert_eq!(genome.len(), 1);
        assert_eq!(genome.chrom_size("chr1"), Some(2000));
    }

    #[test]
    fn test_genome_bad_size() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "chr1\tlots").unwrap();

        assert!(GenomeSpace::from_file(file.path()).is_err());
    }
}
