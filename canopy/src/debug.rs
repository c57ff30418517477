//! Trace events for protocol observation.
//!
//! The protocol is `no_std` and emits structured events on a bounded channel
//! instead of formatting log lines; the simulator and the tests drain the
//! channel to assert on protocol flow. Emission is best-effort: when the
//! channel is full events are dropped silently.

use embassy_sync::channel::Channel;

use crate::time::Timestamp;
use crate::traits::{ChannelMutex, TRACE_QUEUE_SIZE};
use crate::types::{NodeAddr, Role};

/// Trace event channel type.
pub type TraceChannel = Channel<ChannelMutex, TraceEvent, TRACE_QUEUE_SIZE>;

/// Events emitted by nodes and the border for protocol tracing.
#[derive(Debug, Clone)]
pub enum TraceEvent {
    /// Discovery window opened; "new" probe broadcast.
    DiscoveryStarted { deadline: Timestamp },
    /// A candidate advertisement was recorded.
    CandidateRecorded {
        addr: NodeAddr,
        role: Role,
        rssi: i16,
    },
    /// A candidate was dropped because its list was full.
    CandidateDropped { addr: NodeAddr, role: Role },
    /// Discovery ended and a parent was selected.
    ParentSelected { parent: NodeAddr, role: Role },
    /// Join request sent to the selected parent.
    JoinRequested { parent: NodeAddr },
    /// Parent acknowledged the join.
    JoinAccepted { parent: NodeAddr },
    /// Parent rejected the join (or the wait timed out).
    JoinRejected { parent: NodeAddr, retry_count: u8 },
    /// Retry budget exhausted; forced coordinator anchored at the border.
    BottomedOut { border: NodeAddr },
    /// Node reset all state and restarted discovery.
    ResetToDiscovery { retry_count: u8 },
    /// A sensor accepted its first child and became a coordinator.
    PromotedToCoordinator,
    /// A child join request was accepted.
    ChildAccepted { child: NodeAddr, children: usize },
    /// A child join request was rejected (table full).
    ChildRejected { child: NodeAddr },
    /// An unresponsive child was evicted for the rest of the cycle.
    ChildEvicted { child: NodeAddr },
    /// Replied to a clock request with the adjusted clock.
    ClockReplySent { adjusted: u64 },
    /// Applied a broadcast reference clock.
    OffsetApplied { offset_ticks: i64 },
    /// Received a complete slot assignment.
    SlotAssigned { start: Timestamp, duration: u64 },
    /// Entered the assigned slot and started polling.
    SlotEntered { children: usize },
    /// Poll sent to a child.
    PollSent { child: NodeAddr },
    /// "done" received from the polled child.
    DoneReceived { child: NodeAddr },

    // Border-side events
    /// A coordinator registered (added to the pending list).
    CoordinatorRegistered { addr: NodeAddr, pending: usize },
    /// A coordinator advertisement was dropped (list full).
    CoordinatorDropped { addr: NodeAddr },
    /// Synchronization round started.
    SyncStarted { coordinators: usize },
    /// A clock sample arrived.
    ClockSampleRecorded { value: u64, received: usize },
    /// Synchronization round finished and the reference was broadcast.
    SyncComplete { average: u64, samples: usize },
    /// Timeslot plan transmitted to all coordinators.
    PlanSent { slots: usize },
    /// A collection slot became active.
    SlotActive { index: usize },
    /// A reading was recorded and attributed.
    ReadingRecorded { sensor: NodeAddr, value: u64 },
    /// Collection window closed; per-slot message counts.
    WindowClosed { messages: usize },
    /// Stop frame received; loop will exit at the cycle boundary.
    StopReceived,
}
