//! Timeslot computation for the collection window.
//!
//! After a synchronization round the border divides the collection window
//! into one equal slot per confirmed coordinator. Slots are contiguous and
//! expressed in the adjusted reference clock; the first starts a fixed delay
//! after the reference instant so the plan can reach every coordinator
//! before its slot opens.

use alloc::vec::Vec;

use crate::time::{Duration, Timestamp};

/// One coordinator's share of the collection window, in adjusted time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAssignment {
    /// Slot opening, adjusted clock.
    pub start: Timestamp,
    /// Slot length.
    pub duration: Duration,
}

impl SlotAssignment {
    /// Slot closing, adjusted clock.
    pub fn end(&self) -> Timestamp {
        self.start + self.duration
    }
}

/// The full slot plan for one collection cycle, indexed like the border's
/// confirmed coordinator list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeslotPlan {
    slots: Vec<SlotAssignment>,
}

impl TimeslotPlan {
    /// Partition `window` into `coordinators` equal slots starting at
    /// `reference + delay`. Division truncates, so the tail of the window
    /// past `coordinators * slot` stays unassigned.
    pub fn compute(
        coordinators: usize,
        window: Duration,
        reference: Timestamp,
        delay: Duration,
    ) -> TimeslotPlan {
        let duration = window.div_floor(coordinators as u64);
        let mut slots = Vec::with_capacity(coordinators);
        let mut start = reference + delay;
        for _ in 0..coordinators {
            slots.push(SlotAssignment { start, duration });
            start += duration;
        }
        TimeslotPlan { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<SlotAssignment> {
        self.slots.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SlotAssignment> {
        self.slots.iter()
    }

    /// End of the last slot; the reference start when the plan is empty.
    pub fn window_end(&self, reference: Timestamp) -> Timestamp {
        match self.slots.last() {
            Some(slot) => slot.end(),
            None => reference,
        }
    }
}

/// What the next bare numeric frame from upstream means to a coordinator.
///
/// The wire carries untagged values; a coordinator knows a number is a clock
/// reference or a slot boundary only from what it saw immediately before.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RxState {
    /// No value expected; bare numbers are ignored.
    #[default]
    Idle,
    /// A clock request was answered; the next value is the new reference.
    AwaitingClockReference,
    /// A "window" marker arrived; the next value is the slot start.
    AwaitingSlotStart,
    /// The slot start arrived; the next value is the slot duration.
    AwaitingSlotDuration { start: Timestamp },
}
