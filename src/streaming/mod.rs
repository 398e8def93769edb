//! Streaming utilities shared by the peak scanner.
//!
//! This module provides:
//! - Zero-allocation BED parsing
//! - Genome-order validation
//! - Sweep edges over buffered intervals
//! - Efficient output formatting
//!
//! Memory stays O(k) per track, k = intervals buffered inside the widest window.

pub mod output;
pub mod parsing;
pub mod sweep;
pub mod validation;

pub use output::PeakWriter;
pub use parsing::{parse_u64_fast, should_skip_line};
pub use sweep::{ActiveInterval, IntervalBuffer, SweepEdge};
pub use validation::GenomeOrderValidator;
