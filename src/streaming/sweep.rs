//! Incremental coverage sweeps over one sorted track.
//!
//! An [`IntervalBuffer`] holds the intervals a track cursor has pulled but
//! that not every edge has passed yet. A [`SweepEdge`] is a monotone pointer
//! over that buffer: advancing it to `x` integrates coverage over `[0, x)`
//! and counts intervals that started before `x` or ended at or before `x`.
//! Two edges bracket a window `[a, b)`:
//!
//! - intervals overlapping the window = `lead.started() - trail.ended()`
//! - bases covered inside the window = `lead.covered() - trail.covered()`
//!
//! Each interval is pushed and popped once per edge, so a scan costs
//! O(n log k) for n intervals and k maximum overlap.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Compaction threshold - trigger when head_idx exceeds this value.
const COMPACTION_THRESHOLD: usize = 4096;

/// Buffered interval - coordinates only.
///
/// The chromosome is tracked by the owning cursor to avoid per-interval allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveInterval {
    pub start: u64,
    pub end: u64,
}

impl ActiveInterval {
    #[inline]
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }
}

/// Intervals addressed by a monotonically increasing sequence number.
///
/// Uses Vec + head_idx pattern for better cache locality than VecDeque.
/// Elements before head_idx are logically removed but not deallocated
/// until compaction is triggered.
#[derive(Debug, Default)]
pub struct IntervalBuffer {
    data: Vec<ActiveInterval>,
    /// Index of the first logically active element.
    head_idx: usize,
    /// Sequence number of `data[0]`.
    base_seq: u64,
    /// Maximum observed buffered size (for statistics).
    max_buffered: usize,
}

impl IntervalBuffer {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            head_idx: 0,
            base_seq: 0,
            max_buffered: 0,
        }
    }

    /// Append an interval; it receives the next sequence number.
    #[inline]
    pub fn push(&mut self, interval: ActiveInterval) {
        self.data.push(interval);
        self.max_buffered = self.max_buffered.max(self.len());
    }

    /// Sequence number the next pushed interval will receive.
    #[inline]
    pub fn end_seq(&self) -> u64 {
        self.base_seq + self.data.len() as u64
    }

    /// Get the interval with the given sequence number, if still buffered.
    #[inline]
    pub fn get(&self, seq: u64) -> Option<&ActiveInterval> {
        let idx = seq.checked_sub(self.base_seq)? as usize;
        if idx < self.head_idx {
            return None;
        }
        self.data.get(idx)
    }

    /// Logically drop every interval with a sequence number below `seq`.
    pub fn release_before(&mut self, seq: u64) {
        let idx = (seq.saturating_sub(self.base_seq) as usize).min(self.data.len());
        if idx > self.head_idx {
            self.head_idx = idx;
        }
        self.compact_if_needed();
    }

    /// Compact the internal storage if needed.
    fn compact_if_needed(&mut self) {
        if self.head_idx > COMPACTION_THRESHOLD && self.head_idx * 2 > self.data.len() {
            self.data.drain(0..self.head_idx);
            self.base_seq += self.head_idx as u64;
            self.head_idx = 0;
        }
    }

    /// Number of logically buffered intervals.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() - self.head_idx
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head_idx >= self.data.len()
    }

    /// Clear all elements; sequence numbers keep increasing.
    pub fn clear(&mut self) {
        self.base_seq = self.end_seq();
        self.data.clear();
        self.head_idx = 0;
    }

    /// Get the maximum buffered size observed (for statistics).
    pub fn max_buffered(&self) -> usize {
        self.max_buffered
    }
}

/// A monotone coverage integrator over an [`IntervalBuffer`].
#[derive(Debug, Clone)]
pub struct SweepEdge {
    pos: u64,
    next_seq: u64,
    /// Ends of intervals that started before `pos` and have not ended.
    ends: BinaryHeap<Reverse<u64>>,
    depth: u64,
    covered: u64,
    started: u64,
    ended: u64,
    reach: u64,
}

impl SweepEdge {
    /// Create an edge positioned at `pos`, reading the buffer from `seq` on.
    pub fn new(pos: u64, seq: u64) -> Self {
        Self {
            pos,
            next_seq: seq,
            ends: BinaryHeap::new(),
            depth: 0,
            covered: 0,
            started: 0,
            ended: 0,
            reach: 0,
        }
    }

    /// Move the edge to `target`, consuming buffered interval starts below
    /// `target` and interval ends at or below it.
    ///
    /// The buffer must already hold every interval starting before `target`.
    /// Targets behind the current position are ignored.
    pub fn advance(&mut self, target: u64, buffer: &IntervalBuffer) {
        if target <= self.pos {
            return;
        }
        loop {
            let next_start = buffer
                .get(self.next_seq)
                .map(|iv| iv.start)
                .filter(|&s| s < target);
            let next_end = self.ends.peek().map(|r| r.0).filter(|&e| e <= target);

            let event = match (next_start, next_end) {
                (None, None) => break,
                (Some(s), None) => s,
                (None, Some(e)) => e,
                (Some(s), Some(e)) => s.min(e),
            };
            let event = event.max(self.pos);
            self.covered += self.depth * (event - self.pos);
            self.pos = event;

            if next_end == Some(event) {
                self.ends.pop();
                self.depth -= 1;
                self.ended += 1;
            } else if let Some(iv) = buffer.get(self.next_seq) {
                self.ends.push(Reverse(iv.end));
                self.reach = self.reach.max(iv.end);
                self.depth += 1;
                self.started += 1;
                self.next_seq += 1;
            }
        }
        self.covered += self.depth * (target - self.pos);
        self.pos = target;
    }

    /// Current position of the edge.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// Sequence number of the next interval this edge has not started.
    #[inline]
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Bases covered in `[0, pos)`, counted once per overlapping interval.
    #[inline]
    pub fn covered(&self) -> u64 {
        self.covered
    }

    /// Intervals with start < pos.
    #[inline]
    pub fn started(&self) -> u64 {
        self.started
    }

    /// Intervals with end <= pos.
    #[inline]
    pub fn ended(&self) -> u64 {
        self.ended
    }

    /// Intervals covering `pos`.
    #[inline]
    pub fn depth(&self) -> u64 {
        self.depth
    }

    /// Largest end among started intervals.
    #[inline]
    pub fn reach(&self) -> u64 {
        self.reach
    }
}
