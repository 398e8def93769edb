//! Command implementations for grit-peaks.

pub mod call_peaks;

pub use call_peaks::{CallMode, CallPeaksCommand, CallPeaksStats, TrackSpec};
