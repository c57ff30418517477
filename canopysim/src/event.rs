//! Event types and priority queue for discrete event simulation.

use std::cmp::Ordering;

use canopy::{NodeAddr, Timestamp};

/// Unique sequence number for deterministic event ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Scenario actions that can be scheduled during simulation.
#[derive(Debug, Clone)]
pub enum ScenarioAction {
    /// Disable a specific link.
    DisableLink { a: NodeAddr, b: NodeAddr },
    /// Enable a specific link.
    EnableLink { a: NodeAddr, b: NodeAddr },
    /// Set loss rate on a link.
    SetLossRate { a: NodeAddr, b: NodeAddr, rate: f64 },
    /// Change the reading a sensor reports at its next poll.
    SetReading { node: NodeAddr, value: u64 },
    /// Ask a border to stop at its next cycle boundary.
    RequestStop { node: NodeAddr },
}

/// Events in the discrete event simulation.
#[derive(Debug, Clone)]
pub enum Event {
    /// Deliver a frame to a node.
    MessageDelivery {
        to: NodeAddr,
        from: NodeAddr,
        data: Vec<u8>,
        /// Link-layer destination as sent (`None` for broadcast).
        dest: Option<NodeAddr>,
        rssi: i16,
    },
    /// Fire timer for a node.
    TimerFire { node: NodeAddr },
    /// Boot a node (start its discovery, or a border's setup).
    Boot { node: NodeAddr },
    /// Execute a scenario action.
    ScenarioAction(ScenarioAction),
}

/// A scheduled event with timestamp and sequence number for ordering.
#[derive(Debug, Clone)]
pub struct ScheduledEvent {
    /// When the event should occur.
    pub time: Timestamp,
    /// Sequence number for deterministic ordering of same-time events.
    pub seq: SequenceNumber,
    /// The event to process.
    pub event: Event,
}

impl ScheduledEvent {
    pub fn new(time: Timestamp, seq: SequenceNumber, event: Event) -> Self {
        Self { time, seq, event }
    }
}

// Implement ordering for min-heap (BinaryHeap is max-heap, so we reverse).
impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap. First by time, then by sequence.
        match other.time.as_ticks().cmp(&self.time.as_ticks()) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ord => ord,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ordering() {
        let e1 = ScheduledEvent::new(
            Timestamp::from_secs(10),
            SequenceNumber::new(1),
            Event::TimerFire { node: [0, 0] },
        );
        let e2 = ScheduledEvent::new(
            Timestamp::from_secs(5),
            SequenceNumber::new(2),
            Event::TimerFire { node: [0, 0] },
        );

        // e2 has earlier time, so it should be "greater" in min-heap terms.
        assert!(e2 > e1);
    }

    #[test]
    fn test_same_time_sequence_ordering() {
        let e1 = ScheduledEvent::new(
            Timestamp::from_secs(10),
            SequenceNumber::new(1),
            Event::TimerFire { node: [0, 0] },
        );
        let e2 = ScheduledEvent::new(
            Timestamp::from_secs(10),
            SequenceNumber::new(2),
            Event::TimerFire { node: [0, 0] },
        );

        // Same time: lower sequence first.
        assert!(e1 > e2);
    }
}
