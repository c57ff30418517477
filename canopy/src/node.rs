//! Node implementation for sensors and coordinators.
//!
//! A node boots undecided, broadcasts a discovery probe, and records every
//! advertisement it hears during the discovery window. It then joins the
//! strongest candidate as a child; repeated rejections bottom it out as a
//! coordinator anchored directly at the border. A sensor that accepts a
//! child of its own is promoted to coordinator on the spot.
//!
//! Coordinators answer the border's clock requests, receive a slot
//! assignment, and poll their children inside that slot, relaying each
//! child's frames to the border that assigned it.
//!
//! The node is fully event-driven: frames and timer expiries mutate the
//! state machine through [`Node::handle_frame`] and [`Node::handle_timer`],
//! and [`Node::run`] drives both from the transport channel and the clock.

use alloc::vec::Vec;
use core::marker::PhantomData;

use crate::candidates::CandidateSet;
use crate::children::ChildTable;
use crate::clock::ClockSync;
use crate::config::MeshConfig;
use crate::debug::{TraceChannel, TraceEvent};
use crate::slots::{RxState, SlotAssignment};
use crate::time::{Duration, Timestamp};
use crate::traits::{Clock, Received, Transport};
use crate::types::{NodeAddr, Role, DISCOVERY_WINDOW, JOIN_TIMEOUT, POLL_TIMEOUT};
use crate::wire::Frame;

/// Lifecycle phase of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Collecting advertisements until the deadline.
    Discovery { deadline: Timestamp },
    /// Join request sent; waiting for the parent's verdict.
    Joining { parent: NodeAddr, deadline: Timestamp },
    /// Role decided; reacting to polls, clock requests, and slots.
    Operating,
}

/// Progress through the node's collection slot.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CollectState {
    /// Not inside a slot.
    Idle,
    /// Polling children one at a time.
    Polling {
        /// Children snapshot taken at slot entry, in join order.
        pending: Vec<NodeAddr>,
        /// Index of the child currently being polled.
        index: usize,
        /// Raw-clock end of the whole slot.
        slot_end: Timestamp,
    },
}

/// A mesh node (sensor or coordinator).
///
/// Generic over the transport, the clock, and the capacity configuration.
pub struct Node<T, Clk, Cfg: MeshConfig> {
    transport: T,
    clock: Clk,
    trace: TraceChannel,

    border: NodeAddr,
    phase: Phase,
    role: Role,
    parent: NodeAddr,
    retry_count: u8,

    candidates: CandidateSet<Cfg>,
    children: ChildTable<Cfg>,
    sync: ClockSync,
    rx_state: RxState,
    slot: Option<SlotAssignment>,
    collect: CollectState,
    reading: u64,

    wake_at: Option<Timestamp>,

    _config: PhantomData<Cfg>,
}

/// Signal strength assumed when the radio reports none; weaker than any
/// reported value so measured candidates always win.
const DEFAULT_RSSI: i16 = i16::MIN;

impl<T, Clk, Cfg> Node<T, Clk, Cfg>
where
    T: Transport,
    Clk: Clock,
    Cfg: MeshConfig,
{
    /// Create a node that reports toward the given border.
    pub fn new(transport: T, clock: Clk, border: NodeAddr) -> Self {
        Self {
            transport,
            clock,
            trace: TraceChannel::new(),
            border,
            phase: Phase::Discovery {
                deadline: Timestamp::ZERO,
            },
            role: Role::Undecided,
            parent: border,
            retry_count: 0,
            candidates: CandidateSet::new(),
            children: ChildTable::new(),
            sync: ClockSync::new(),
            rx_state: RxState::Idle,
            slot: None,
            collect: CollectState::Idle,
            reading: 0,
            wake_at: None,
            _config: PhantomData,
        }
    }

    /// This node's link-layer address.
    pub fn address(&self) -> NodeAddr {
        self.transport.address()
    }

    /// Current role.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current parent address (the border until a join succeeds).
    pub fn parent(&self) -> NodeAddr {
        self.parent
    }

    /// Number of joined children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Current clock offset against the mesh reference.
    pub fn clock_sync(&self) -> &ClockSync {
        &self.sync
    }

    /// Trace event channel.
    pub fn trace(&self) -> &TraceChannel {
        &self.trace
    }

    /// Transport reference.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Clock reference.
    pub fn clock(&self) -> &Clk {
        &self.clock
    }

    /// Update the reading reported at the next poll.
    pub fn set_reading(&mut self, value: u64) {
        self.reading = value;
    }

    /// Broadcast the discovery probe and open the discovery window.
    pub fn initialize(&mut self) {
        let now = self.clock.now();
        let deadline = now + DISCOVERY_WINDOW;
        self.send(Frame::New, None);
        self.phase = Phase::Discovery { deadline };
        self.wake_at = Some(deadline);
        self.push_trace(TraceEvent::DiscoveryStarted { deadline });
    }

    /// The next raw-clock instant the node needs a timer callback at.
    pub fn next_wake(&self) -> Option<Timestamp> {
        self.wake_at
    }

    /// Run the node forever: initialize, then react to frames and timers.
    pub async fn run(&mut self) -> ! {
        use embassy_futures::select::{select, Either};

        self.initialize();

        loop {
            // Park far in the future when no timer is armed.
            let wake = self
                .wake_at
                .unwrap_or(self.clock.now() + Duration::from_secs(3600));

            let result = select(
                self.transport.incoming().receive(),
                self.clock.sleep_until(wake),
            )
            .await;

            match result {
                Either::First(msg) => self.handle_frame(&msg),
                Either::Second(()) => {
                    let now = self.clock.now();
                    self.handle_timer(now);
                }
            }
        }
    }

    /// Process one received frame.
    pub fn handle_frame(&mut self, msg: &Received) {
        let frame = match Frame::decode(&msg.data) {
            Ok(f) => f,
            Err(_) => return,
        };
        let now = self.clock.now();

        match self.phase {
            Phase::Discovery { .. } => self.handle_discovery_frame(frame, msg),
            Phase::Joining { parent, .. } => self.handle_joining_frame(frame, msg.src, parent, now),
            Phase::Operating => self.handle_operating_frame(frame, msg.src, now),
        }
    }

    /// Process a timer callback. Stale callbacks (no timer armed, or armed
    /// later than `now`) are ignored.
    pub fn handle_timer(&mut self, now: Timestamp) {
        match self.wake_at {
            Some(at) if now >= at => {}
            _ => return,
        }
        self.wake_at = None;

        match self.phase {
            Phase::Discovery { deadline } if now >= deadline => self.finish_discovery(now),
            Phase::Joining { parent, deadline } if now >= deadline => {
                // No verdict in time counts as a rejection.
                self.handle_rejection(parent, now);
            }
            Phase::Operating => self.handle_operating_timer(now),
            _ => {}
        }
    }

    // --- Discovery ---

    fn handle_discovery_frame(&mut self, frame: Frame, msg: &Received) {
        let role = match frame {
            Frame::Coordinator => Role::Coordinator,
            Frame::Sensor => Role::Sensor,
            _ => return,
        };
        let rssi = msg.rssi.unwrap_or(DEFAULT_RSSI);
        if self.candidates.record(role, msg.src, rssi) {
            self.push_trace(TraceEvent::CandidateRecorded {
                addr: msg.src,
                role,
                rssi,
            });
        } else {
            self.push_trace(TraceEvent::CandidateDropped {
                addr: msg.src,
                role,
            });
        }
    }

    fn finish_discovery(&mut self, now: Timestamp) {
        if self.candidates.is_empty() {
            // Nobody in range: operate as a coordinator anchored at the
            // border, no join handshake involved.
            self.become_coordinator_at_border();
            return;
        }

        let choice = self.candidates.select_parent(self.border);
        self.push_trace(TraceEvent::ParentSelected {
            parent: choice.parent,
            role: choice.parent_role,
        });
        self.send(Frame::Child, Some(choice.parent));
        let deadline = now + JOIN_TIMEOUT;
        self.phase = Phase::Joining {
            parent: choice.parent,
            deadline,
        };
        self.wake_at = Some(deadline);
        self.push_trace(TraceEvent::JoinRequested {
            parent: choice.parent,
        });
    }

    // --- Joining ---

    fn handle_joining_frame(
        &mut self,
        frame: Frame,
        src: NodeAddr,
        parent: NodeAddr,
        now: Timestamp,
    ) {
        if src != parent {
            return;
        }
        match frame {
            Frame::Parent => {
                self.parent = parent;
                self.role = Role::Sensor;
                self.phase = Phase::Operating;
                self.retry_count = 0;
                self.wake_at = None;
                self.push_trace(TraceEvent::JoinAccepted { parent });
            }
            Frame::No => self.handle_rejection(parent, now),
            _ => {}
        }
    }

    fn handle_rejection(&mut self, parent: NodeAddr, now: Timestamp) {
        self.retry_count += 1;
        self.push_trace(TraceEvent::JoinRejected {
            parent,
            retry_count: self.retry_count,
        });
        if self.retry_count >= Cfg::MAX_RETRIES {
            self.become_coordinator_at_border();
        } else {
            self.restart_discovery(now);
        }
    }

    fn restart_discovery(&mut self, now: Timestamp) {
        self.candidates.clear();
        self.children.clear();
        self.sync.reset();
        self.rx_state = RxState::Idle;
        self.slot = None;
        self.collect = CollectState::Idle;
        self.parent = self.border;
        self.role = Role::Undecided;
        self.push_trace(TraceEvent::ResetToDiscovery {
            retry_count: self.retry_count,
        });

        let deadline = now + DISCOVERY_WINDOW;
        self.send(Frame::New, None);
        self.phase = Phase::Discovery { deadline };
        self.wake_at = Some(deadline);
    }

    fn become_coordinator_at_border(&mut self) {
        self.role = Role::Coordinator;
        self.parent = self.border;
        self.phase = Phase::Operating;
        self.retry_count = 0;
        self.wake_at = None;
        self.push_trace(TraceEvent::BottomedOut {
            border: self.border,
        });
        self.announce_coordinator();
    }

    /// Broadcast the coordinator advertisement so the border registers this
    /// node for a slot. The border deduplicates repeats.
    fn announce_coordinator(&mut self) {
        self.send(Frame::Coordinator, None);
    }

    // --- Operating ---

    fn handle_operating_frame(&mut self, frame: Frame, src: NodeAddr, now: Timestamp) {
        // Transparent forwarding of the polled child's frames comes first;
        // its "done" is the only frame of the child's burst we consume.
        if self.polled_child() == Some(src) {
            if frame == Frame::Done {
                self.push_trace(TraceEvent::DoneReceived { child: src });
                self.advance_poll(now);
            } else {
                self.send(frame, Some(self.border));
            }
            return;
        }

        match frame {
            Frame::New => {
                // Answer a booting node's probe with our role. A full
                // coordinator stays silent; it would only reject the join.
                match self.role {
                    Role::Coordinator if self.children.len() < Cfg::MAX_CHILDREN => {
                        self.send(Frame::Coordinator, Some(src))
                    }
                    Role::Sensor => self.send(Frame::Sensor, Some(src)),
                    _ => {}
                }
            }
            Frame::Child => self.handle_join_request(src),
            Frame::ClockRequest => {
                let adjusted = self.sync.adjusted(now).as_ticks();
                self.send(Frame::Value(adjusted), Some(src));
                self.rx_state = RxState::AwaitingClockReference;
                self.push_trace(TraceEvent::ClockReplySent { adjusted });
            }
            Frame::Window => self.rx_state = RxState::AwaitingSlotStart,
            Frame::Value(v) => self.handle_value(v, now),
            Frame::Poll => {
                // Report and terminate; the parent forwards both upward.
                self.send(Frame::Value(self.reading), Some(src));
                self.send(Frame::Done, Some(src));
            }
            _ => {}
        }
    }

    fn handle_join_request(&mut self, src: NodeAddr) {
        if src == self.address() || !self.children.insert(src) {
            self.send(Frame::No, Some(src));
            self.push_trace(TraceEvent::ChildRejected { child: src });
            return;
        }
        self.send(Frame::Parent, Some(src));
        self.push_trace(TraceEvent::ChildAccepted {
            child: src,
            children: self.children.len(),
        });
        if self.role == Role::Sensor {
            self.role = Role::Coordinator;
            self.push_trace(TraceEvent::PromotedToCoordinator);
            self.announce_coordinator();
        }
    }

    /// Bare numeric payloads are positional; dispatch on what we were told
    /// to expect.
    fn handle_value(&mut self, value: u64, now: Timestamp) {
        match self.rx_state {
            RxState::AwaitingClockReference => {
                let offset = self
                    .sync
                    .apply_reference(Timestamp::from_ticks(value), now);
                self.rx_state = RxState::Idle;
                self.push_trace(TraceEvent::OffsetApplied {
                    offset_ticks: offset.as_ticks(),
                });
            }
            RxState::AwaitingSlotStart => {
                self.rx_state = RxState::AwaitingSlotDuration {
                    start: Timestamp::from_ticks(value),
                };
            }
            RxState::AwaitingSlotDuration { start } => {
                let slot = SlotAssignment {
                    start,
                    duration: Duration::from_ticks(value),
                };
                self.rx_state = RxState::Idle;
                self.slot = Some(slot);
                // Arm the wakeup in raw clock terms.
                self.wake_at = Some(self.sync.raw_for(slot.start));
                self.push_trace(TraceEvent::SlotAssigned {
                    start: slot.start,
                    duration: value,
                });
            }
            RxState::Idle => {}
        }
    }

    fn handle_operating_timer(&mut self, now: Timestamp) {
        let slot_end = match &self.collect {
            CollectState::Idle => {
                if let Some(slot) = self.slot {
                    if now >= self.sync.raw_for(slot.start) {
                        self.enter_slot(slot, now);
                    }
                }
                return;
            }
            CollectState::Polling { slot_end, .. } => *slot_end,
        };

        if now >= slot_end {
            self.finish_slot();
            return;
        }

        // The current child ran out of time; drop it from the table so
        // later cycles skip it unless it rejoins.
        if let Some(child) = self.polled_child() {
            self.children.remove(child);
            self.push_trace(TraceEvent::ChildEvicted { child });
        }
        self.advance_poll(now);
    }

    /// Address of the child currently being polled, if any.
    fn polled_child(&self) -> Option<NodeAddr> {
        match &self.collect {
            CollectState::Polling { pending, index, .. } => pending.get(*index).copied(),
            CollectState::Idle => None,
        }
    }

    fn enter_slot(&mut self, slot: SlotAssignment, now: Timestamp) {
        let pending = self.children.snapshot();
        self.push_trace(TraceEvent::SlotEntered {
            children: pending.len(),
        });

        if pending.is_empty() {
            // Nothing to collect; report liveness so the window is not
            // silent.
            self.send(Frame::Ping, Some(self.border));
            self.finish_slot();
            return;
        }

        let slot_end = self.sync.raw_for(slot.end());
        self.collect = CollectState::Polling {
            pending,
            index: 0,
            slot_end,
        };
        self.poll_current(now);
    }

    /// Announce and poll the child at the current index.
    fn poll_current(&mut self, now: Timestamp) {
        let slot_end = match &self.collect {
            CollectState::Polling { slot_end, .. } => *slot_end,
            CollectState::Idle => return,
        };
        let child = match self.polled_child() {
            Some(child) => child,
            None => {
                self.finish_slot();
                return;
            }
        };

        // Slot traffic is addressed to the border that assigned the slot;
        // a promoted coordinator's parent holds no slot state for it.
        self.send(Frame::Sensor, Some(self.border));
        self.send(Frame::addr(child), Some(self.border));
        self.send(Frame::Poll, Some(child));
        self.push_trace(TraceEvent::PollSent { child });

        self.wake_at = Some((now + POLL_TIMEOUT).min(slot_end));
    }

    fn advance_poll(&mut self, now: Timestamp) {
        if let CollectState::Polling { ref mut index, .. } = self.collect {
            *index += 1;
        }
        self.poll_current(now);
    }

    fn finish_slot(&mut self) {
        self.collect = CollectState::Idle;
        self.slot = None;
        self.wake_at = None;
    }

    // --- Helpers ---

    fn send(&self, frame: Frame, dest: Option<NodeAddr>) {
        let _ = self.transport.outgoing().try_send(crate::traits::Outbound {
            data: frame.encode(),
            dest,
        });
    }

    fn push_trace(&self, event: TraceEvent) {
        let _ = self.trace.try_send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SmallConfig;
    use crate::traits::test_impls::{MockClock, MockTransport};
    use crate::traits::Outbound;
    use alloc::vec::Vec;

    const BORDER: NodeAddr = [1, 0];
    const NODE: NodeAddr = [10, 0];

    type TestNode = Node<MockTransport, MockClock, SmallConfig>;

    fn make_node() -> TestNode {
        Node::new(MockTransport::new(NODE), MockClock::new(), BORDER)
    }

    fn inject(node: &mut TestNode, data: Vec<u8>, src: NodeAddr) {
        node.transport().inject_rx(data, src, Some(NODE), Some(-50));
        let msg = node.transport().incoming().try_receive().unwrap();
        node.handle_frame(&msg);
    }

    fn inject_with_rssi(node: &mut TestNode, data: Vec<u8>, src: NodeAddr, rssi: i16) {
        node.transport().inject_rx(data, src, None, Some(rssi));
        let msg = node.transport().incoming().try_receive().unwrap();
        node.handle_frame(&msg);
    }

    fn sent(node: &TestNode) -> Vec<Outbound> {
        node.transport().take_sent()
    }

    fn advance_and_fire(node: &mut TestNode, clock_now: Timestamp) {
        node.clock.set(clock_now);
        node.handle_timer(clock_now);
    }

    /// Boot a node, let discovery expire with no candidates, and drain the
    /// probe and the bottom-out announcement so later assertions start from
    /// an empty queue.
    fn boot_to_anchored_coordinator(node: &mut TestNode) {
        node.initialize();
        let deadline = node.next_wake().unwrap();
        node.transport().take_sent();
        advance_and_fire(node, deadline);
        node.transport().take_sent();
    }

    /// Boot a node and join the given coordinator.
    fn boot_and_join(node: &mut TestNode, parent: NodeAddr) {
        node.initialize();
        node.transport().take_sent();
        inject_with_rssi(node, Frame::Coordinator.encode(), parent, -40);
        let deadline = node.next_wake().unwrap();
        advance_and_fire(node, deadline);
        node.transport().take_sent();
        inject(node, Frame::Parent.encode(), parent);
    }

    #[test]
    fn test_initialize_broadcasts_probe() {
        let mut node = make_node();
        node.initialize();
        let msgs = sent(&node);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].data, Frame::New.encode());
        assert_eq!(msgs[0].dest, None);
        assert!(node.next_wake().is_some());
    }

    #[test]
    fn test_no_candidates_anchors_as_coordinator() {
        let mut node = make_node();
        node.initialize();
        let deadline = node.next_wake().unwrap();
        node.transport().take_sent();
        advance_and_fire(&mut node, deadline);
        assert_eq!(node.role(), Role::Coordinator);
        assert_eq!(node.parent(), BORDER);
        // The coordinator advertisement goes out for the border to register.
        let msgs = sent(&node);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].data, Frame::Coordinator.encode());
        assert_eq!(msgs[0].dest, None);
    }

    #[test]
    fn test_joins_strongest_coordinator() {
        let mut node = make_node();
        node.initialize();
        node.transport().take_sent();
        inject_with_rssi(&mut node, Frame::Coordinator.encode(), [2, 0], -80);
        inject_with_rssi(&mut node, Frame::Coordinator.encode(), [3, 0], -30);
        inject_with_rssi(&mut node, Frame::Sensor.encode(), [4, 0], -10);

        let deadline = node.next_wake().unwrap();
        advance_and_fire(&mut node, deadline);

        let msgs = sent(&node);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].data, Frame::Child.encode());
        assert_eq!(msgs[0].dest, Some([3, 0]));
    }

    #[test]
    fn test_accepted_join_makes_sensor() {
        let mut node = make_node();
        boot_and_join(&mut node, [3, 0]);
        assert_eq!(node.role(), Role::Sensor);
        assert_eq!(node.parent(), [3, 0]);
        assert_eq!(node.next_wake(), None);
    }

    #[test]
    fn test_rejection_restarts_discovery() {
        let mut node = make_node();
        node.initialize();
        node.transport().take_sent();
        inject_with_rssi(&mut node, Frame::Coordinator.encode(), [3, 0], -40);
        let deadline = node.next_wake().unwrap();
        advance_and_fire(&mut node, deadline);
        node.transport().take_sent();

        inject(&mut node, Frame::No.encode(), [3, 0]);
        assert_eq!(node.role(), Role::Undecided);
        let msgs = sent(&node);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].data, Frame::New.encode());
    }

    #[test]
    fn test_join_timeout_counts_as_rejection() {
        let mut node = make_node();
        node.initialize();
        node.transport().take_sent();
        inject_with_rssi(&mut node, Frame::Coordinator.encode(), [3, 0], -40);
        let deadline = node.next_wake().unwrap();
        advance_and_fire(&mut node, deadline);
        node.transport().take_sent();

        // Parent never answers.
        let join_deadline = node.next_wake().unwrap();
        advance_and_fire(&mut node, join_deadline);
        assert_eq!(node.role(), Role::Undecided);
        assert_eq!(sent(&node)[0].data, Frame::New.encode());
    }

    #[test]
    fn test_retry_budget_bottoms_out_at_border() {
        let mut node = make_node();
        node.initialize();
        node.transport().take_sent();

        for _ in 0..SmallConfig::MAX_RETRIES {
            inject_with_rssi(&mut node, Frame::Coordinator.encode(), [3, 0], -40);
            let deadline = node.next_wake().unwrap();
            advance_and_fire(&mut node, deadline);
            node.transport().take_sent();
            inject(&mut node, Frame::No.encode(), [3, 0]);
        }

        assert_eq!(node.role(), Role::Coordinator);
        assert_eq!(node.parent(), BORDER);
        // Final broadcast is the coordinator advertisement, not a probe.
        let msgs = sent(&node);
        assert_eq!(msgs.last().unwrap().data, Frame::Coordinator.encode());
    }

    #[test]
    fn test_coordinator_answers_probe() {
        let mut node = make_node();
        boot_to_anchored_coordinator(&mut node);
        inject(&mut node, Frame::New.encode(), [20, 0]);
        let msgs = sent(&node);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].data, Frame::Coordinator.encode());
        assert_eq!(msgs[0].dest, Some([20, 0]));
    }

    #[test]
    fn test_sensor_answers_probe() {
        let mut node = make_node();
        boot_and_join(&mut node, [3, 0]);
        inject(&mut node, Frame::New.encode(), [20, 0]);
        let msgs = sent(&node);
        assert_eq!(msgs[0].data, Frame::Sensor.encode());
        assert_eq!(msgs[0].dest, Some([20, 0]));
    }

    #[test]
    fn test_full_coordinator_ignores_probe() {
        let mut node = make_node();
        boot_to_anchored_coordinator(&mut node);
        for i in 0..SmallConfig::MAX_CHILDREN {
            inject(&mut node, Frame::Child.encode(), [30 + i as u8, 0]);
        }
        node.transport().take_sent();

        // No capacity left: the probe gets no advertisement at all.
        inject(&mut node, Frame::New.encode(), [99, 0]);
        assert!(sent(&node).is_empty());
        assert_eq!(node.child_count(), SmallConfig::MAX_CHILDREN);
    }

    #[test]
    fn test_sensor_promotes_on_accepted_child() {
        let mut node = make_node();
        boot_and_join(&mut node, [3, 0]);
        inject(&mut node, Frame::Child.encode(), [20, 0]);

        assert_eq!(node.role(), Role::Coordinator);
        assert_eq!(node.child_count(), 1);
        let msgs = sent(&node);
        assert_eq!(msgs[0].data, Frame::Parent.encode());
        assert_eq!(msgs[0].dest, Some([20, 0]));
        // Promotion announce for border registration.
        assert_eq!(msgs[1].data, Frame::Coordinator.encode());
        assert_eq!(msgs[1].dest, None);
    }

    #[test]
    fn test_full_child_table_rejects_join() {
        let mut node = make_node();
        boot_to_anchored_coordinator(&mut node);
        for i in 0..SmallConfig::MAX_CHILDREN {
            inject(&mut node, Frame::Child.encode(), [30 + i as u8, 0]);
        }
        node.transport().take_sent();
        inject(&mut node, Frame::Child.encode(), [99, 0]);
        let msgs = sent(&node);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].data, Frame::No.encode());
        assert_eq!(msgs[0].dest, Some([99, 0]));
        assert_eq!(node.child_count(), SmallConfig::MAX_CHILDREN);
    }

    #[test]
    fn test_clock_request_reply_uses_adjusted_clock() {
        let mut node = make_node();
        boot_to_anchored_coordinator(&mut node);
        node.clock.set(Timestamp::from_ticks(3000));
        inject(&mut node, Frame::ClockRequest.encode(), BORDER);
        let msgs = sent(&node);
        assert_eq!(msgs[0].data, Frame::Value(3000).encode());
        assert_eq!(msgs[0].dest, Some(BORDER));
    }

    #[test]
    fn test_reference_clock_applied_after_request() {
        let mut node = make_node();
        boot_to_anchored_coordinator(&mut node);
        node.clock.set(Timestamp::from_ticks(3000));
        inject(&mut node, Frame::ClockRequest.encode(), BORDER);
        node.transport().take_sent();

        node.clock.set(Timestamp::from_ticks(3100));
        inject(&mut node, Frame::Value(3500).encode(), BORDER);
        assert_eq!(node.clock_sync().offset().as_ticks(), 400);

        // A stray value with no request pending must not re-sync.
        inject(&mut node, Frame::Value(999_999).encode(), BORDER);
        assert_eq!(node.clock_sync().offset().as_ticks(), 400);
    }

    #[test]
    fn test_slot_assignment_arms_timer() {
        let mut node = make_node();
        boot_to_anchored_coordinator(&mut node);
        node.clock.set(Timestamp::from_ticks(3000));
        inject(&mut node, Frame::ClockRequest.encode(), BORDER);
        inject(&mut node, Frame::Value(3500).encode(), BORDER);
        node.transport().take_sent();

        inject(&mut node, Frame::Window.encode(), BORDER);
        inject(&mut node, Frame::Value(4000).encode(), BORDER);
        inject(&mut node, Frame::Value(500).encode(), BORDER);

        // Offset is +500, so adjusted 4000 is raw 3500.
        assert_eq!(node.next_wake(), Some(Timestamp::from_ticks(3500)));
    }

    #[test]
    fn test_slot_with_no_children_pings() {
        let mut node = make_node();
        boot_to_anchored_coordinator(&mut node);
        inject(&mut node, Frame::Window.encode(), BORDER);
        inject(&mut node, Frame::Value(5000).encode(), BORDER);
        inject(&mut node, Frame::Value(500).encode(), BORDER);
        node.transport().take_sent();

        advance_and_fire(&mut node, Timestamp::from_ticks(5000));
        let msgs = sent(&node);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].data, Frame::Ping.encode());
        assert_eq!(msgs[0].dest, Some(BORDER));
        assert_eq!(node.next_wake(), None);
    }

    #[test]
    fn test_slot_polls_and_forwards_readings() {
        let mut node = make_node();
        boot_to_anchored_coordinator(&mut node);
        inject(&mut node, Frame::Child.encode(), [20, 0]);
        inject(&mut node, Frame::Window.encode(), BORDER);
        inject(&mut node, Frame::Value(5000).encode(), BORDER);
        inject(&mut node, Frame::Value(500).encode(), BORDER);
        node.transport().take_sent();

        advance_and_fire(&mut node, Timestamp::from_ticks(5000));
        let msgs = sent(&node);
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].data, Frame::Sensor.encode());
        assert_eq!(msgs[0].dest, Some(BORDER));
        assert_eq!(msgs[1].data, Frame::addr([20, 0]).encode());
        assert_eq!(msgs[2].data, Frame::Poll.encode());
        assert_eq!(msgs[2].dest, Some([20, 0]));

        // Child reports; the value is forwarded verbatim, "done" is consumed.
        inject(&mut node, Frame::Value(42).encode(), [20, 0]);
        inject(&mut node, Frame::Done.encode(), [20, 0]);
        let msgs = sent(&node);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].data, Frame::Value(42).encode());
        assert_eq!(msgs[0].dest, Some(BORDER));

        // Single child, so the slot is finished.
        assert_eq!(node.next_wake(), None);
        assert_eq!(node.child_count(), 1);
    }

    #[test]
    fn test_promoted_coordinator_reports_to_border() {
        // Parent is another coordinator, not the border: the slot traffic
        // must still reach the border that assigned the slot.
        let mut node = make_node();
        boot_and_join(&mut node, [3, 0]);
        inject(&mut node, Frame::Child.encode(), [20, 0]);
        assert_eq!(node.role(), Role::Coordinator);
        inject(&mut node, Frame::Window.encode(), BORDER);
        inject(&mut node, Frame::Value(5000).encode(), BORDER);
        inject(&mut node, Frame::Value(500).encode(), BORDER);
        node.transport().take_sent();

        advance_and_fire(&mut node, Timestamp::from_ticks(5000));
        let msgs = sent(&node);
        assert_eq!(msgs[0].data, Frame::Sensor.encode());
        assert_eq!(msgs[0].dest, Some(BORDER));
        assert_eq!(msgs[1].dest, Some(BORDER));
        assert_eq!(msgs[2].dest, Some([20, 0]));

        // The forwarded reading goes to the border as well.
        inject(&mut node, Frame::Value(9).encode(), [20, 0]);
        let msgs = sent(&node);
        assert_eq!(msgs[0].data, Frame::Value(9).encode());
        assert_eq!(msgs[0].dest, Some(BORDER));
    }

    #[test]
    fn test_unresponsive_child_is_evicted() {
        let mut node = make_node();
        boot_to_anchored_coordinator(&mut node);
        inject(&mut node, Frame::Child.encode(), [20, 0]);
        inject(&mut node, Frame::Child.encode(), [21, 0]);
        inject(&mut node, Frame::Window.encode(), BORDER);
        inject(&mut node, Frame::Value(5000).encode(), BORDER);
        inject(&mut node, Frame::Value(500).encode(), BORDER);
        node.transport().take_sent();

        advance_and_fire(&mut node, Timestamp::from_ticks(5000));
        node.transport().take_sent();

        // First child stays silent past the poll timeout.
        let deadline = node.next_wake().unwrap();
        advance_and_fire(&mut node, deadline);

        assert_eq!(node.child_count(), 1);
        let msgs = sent(&node);
        // Second child's announcement and poll went out.
        assert_eq!(msgs[1].data, Frame::addr([21, 0]).encode());
        assert_eq!(msgs[2].dest, Some([21, 0]));

        inject(&mut node, Frame::Value(7).encode(), [21, 0]);
        inject(&mut node, Frame::Done.encode(), [21, 0]);
        assert_eq!(node.next_wake(), None);
    }

    #[test]
    fn test_sensor_answers_poll_with_reading_and_done() {
        let mut node = make_node();
        boot_and_join(&mut node, [3, 0]);
        node.set_reading(123);
        inject(&mut node, Frame::Poll.encode(), [3, 0]);
        let msgs = sent(&node);
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].data, Frame::Value(123).encode());
        assert_eq!(msgs[0].dest, Some([3, 0]));
        assert_eq!(msgs[1].data, Frame::Done.encode());
    }

    #[test]
    fn test_stale_timer_fire_is_ignored() {
        let mut node = make_node();
        node.initialize();
        let deadline = node.next_wake().unwrap();
        // Fires before the armed deadline must not end discovery.
        node.handle_timer(deadline - Duration::from_ticks(1));
        assert!(matches!(node.next_wake(), Some(d) if d == deadline));
        assert_eq!(node.role(), Role::Undecided);
    }
}
