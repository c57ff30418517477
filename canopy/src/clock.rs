//! Clock synchronization state.
//!
//! Once per cycle the border polls every confirmed coordinator for its
//! adjusted clock, averages the replies together with its own raw clock, and
//! broadcasts that average as the new reference. Each receiver (the border
//! included) derives a fresh signed offset from the reference and its raw
//! clock at the moment of receipt.
//!
//! [`ClockSync`] is the per-node side of this: it holds the current offset.
//! [`SyncRound`] is the root side: it accumulates samples for one round.

use alloc::vec::Vec;

use crate::time::{ClockOffset, Timestamp};

/// A node's view of the mesh reference clock.
///
/// Fresh nodes carry a zero offset, so their adjusted clock equals their raw
/// clock until the first synchronization round reaches them.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClockSync {
    offset: ClockOffset,
}

impl ClockSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adjusted clock for a raw reading.
    pub fn adjusted(&self, raw: Timestamp) -> Timestamp {
        raw.offset_by(self.offset)
    }

    /// Raw-clock instant for an adjusted-clock target (timer arming).
    pub fn raw_for(&self, target: Timestamp) -> Timestamp {
        self.offset.raw_for(target)
    }

    /// Adopt a broadcast reference clock, given the raw clock at receipt.
    ///
    /// Returns the new offset.
    pub fn apply_reference(&mut self, reference: Timestamp, raw_now: Timestamp) -> ClockOffset {
        self.offset = ClockOffset::between(reference, raw_now);
        self.offset
    }

    pub fn offset(&self) -> ClockOffset {
        self.offset
    }

    /// Forget the synchronization state (discovery restart).
    pub fn reset(&mut self) {
        self.offset = ClockOffset::ZERO;
    }
}

/// Clock samples collected by the root during one synchronization round.
#[derive(Debug)]
pub struct SyncRound {
    samples: Vec<u64>,
    expected: usize,
}

impl SyncRound {
    /// Start a round expecting one reply per polled coordinator.
    pub fn new(expected: usize) -> Self {
        Self {
            samples: Vec::with_capacity(expected),
            expected,
        }
    }

    /// Record one adjusted-clock sample. Replies beyond the expected count
    /// are dropped; a late straggler must not skew the average.
    pub fn record(&mut self, sample: u64) {
        if self.samples.len() < self.expected {
            self.samples.push(sample);
        }
    }

    /// True once every expected reply arrived.
    pub fn is_complete(&self) -> bool {
        self.samples.len() >= self.expected
    }

    pub fn received(&self) -> usize {
        self.samples.len()
    }

    /// Reference clock: integer mean of the samples and the root's own raw
    /// clock. With no samples this degenerates to the root's clock alone.
    pub fn average(&self, root_raw: Timestamp) -> Timestamp {
        let mut sum: u64 = root_raw.as_ticks();
        for s in &self.samples {
            sum = sum.saturating_add(*s);
        }
        Timestamp::from_ticks(sum / (self.samples.len() as u64 + 1))
    }
}
