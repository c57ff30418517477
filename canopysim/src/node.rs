//! SimNode wrapper for simulated canopy endpoints.

use std::cell::Cell;
use std::future::{ready, Ready};

use canopy::config::DefaultConfig;
use canopy::traits::{FrameInChannel, FrameOutChannel};
use canopy::{
    Border, Clock, Node, NodeAddr, Outbound, Received, Role, Timestamp, TraceEvent, Transport,
};
use embassy_sync::channel::Channel;

/// Mock transport for simulation.
pub struct SimTransport {
    address: NodeAddr,
    outgoing: FrameOutChannel,
    incoming: FrameInChannel,
}

impl SimTransport {
    pub fn new(address: NodeAddr) -> Self {
        Self {
            address,
            outgoing: Channel::new(),
            incoming: Channel::new(),
        }
    }

    /// Inject a frame as if received from the radio.
    pub fn inject_rx(&self, data: Vec<u8>, src: NodeAddr, dest: Option<NodeAddr>, rssi: i16) {
        let _ = self.incoming.try_send(Received {
            data,
            src,
            dest,
            rssi: Some(rssi),
        });
    }

    /// Take all queued outbound frames, in send order.
    pub fn take_sent(&self) -> Vec<Outbound> {
        let mut msgs = Vec::new();
        while let Ok(msg) = self.outgoing.try_receive() {
            msgs.push(msg);
        }
        msgs
    }
}

impl Transport for SimTransport {
    fn address(&self) -> NodeAddr {
        self.address
    }

    fn outgoing(&self) -> &FrameOutChannel {
        &self.outgoing
    }

    fn incoming(&self) -> &FrameInChannel {
        &self.incoming
    }
}

/// Mock clock for simulation. Time is controlled by the simulator.
pub struct SimClock {
    current: Cell<Timestamp>,
}

impl SimClock {
    pub fn new() -> Self {
        Self {
            current: Cell::new(Timestamp::ZERO),
        }
    }

    pub fn at(time: Timestamp) -> Self {
        Self {
            current: Cell::new(time),
        }
    }

    pub fn set(&self, time: Timestamp) {
        self.current.set(time);
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SimClock {
    type SleepFuture<'a> = Ready<()>;

    fn now(&self) -> Timestamp {
        self.current.get()
    }

    fn sleep_until(&self, _time: Timestamp) -> Self::SleepFuture<'_> {
        ready(())
    }
}

/// Type alias for simulated mesh nodes.
pub type SimMeshNode = Node<SimTransport, SimClock, DefaultConfig>;
/// Type alias for simulated borders.
pub type SimBorder = Border<SimTransport, SimClock, DefaultConfig>;

/// The protocol endpoint a [`SimNode`] wraps.
pub enum SimEndpoint {
    /// A border orchestrator (root).
    Border(SimBorder),
    /// A sensor/coordinator node.
    Node(SimMeshNode),
}

/// Wrapper around a canopy endpoint for simulation.
///
/// The simulator drives the endpoint through [`SimNode::handle_frame`] and
/// [`SimNode::handle_timer`], setting its clock to simulation time first,
/// and drains its trace channel into a persistent log after every event.
pub struct SimNode {
    inner: SimEndpoint,
    /// When the node was created.
    pub created_at: Timestamp,
    trace_log: Vec<TraceEvent>,
}

impl SimNode {
    /// Create a simulated border at the given address.
    pub fn border(address: NodeAddr, created_at: Timestamp) -> Self {
        let inner = Border::new(SimTransport::new(address), SimClock::at(created_at));
        Self {
            inner: SimEndpoint::Border(inner),
            created_at,
            trace_log: Vec::new(),
        }
    }

    /// Create a simulated node reporting toward `border`.
    pub fn node(address: NodeAddr, border: NodeAddr, created_at: Timestamp) -> Self {
        let inner = Node::new(SimTransport::new(address), SimClock::at(created_at), border);
        Self {
            inner: SimEndpoint::Node(inner),
            created_at,
            trace_log: Vec::new(),
        }
    }

    /// The node's link-layer address.
    pub fn address(&self) -> NodeAddr {
        match &self.inner {
            SimEndpoint::Border(b) => b.address(),
            SimEndpoint::Node(n) => n.address(),
        }
    }

    /// Access the wrapped border, if this is one.
    pub fn as_border(&self) -> Option<&SimBorder> {
        match &self.inner {
            SimEndpoint::Border(b) => Some(b),
            SimEndpoint::Node(_) => None,
        }
    }

    pub fn as_border_mut(&mut self) -> Option<&mut SimBorder> {
        match &mut self.inner {
            SimEndpoint::Border(b) => Some(b),
            SimEndpoint::Node(_) => None,
        }
    }

    /// Access the wrapped mesh node, if this is one.
    pub fn as_node(&self) -> Option<&SimMeshNode> {
        match &self.inner {
            SimEndpoint::Node(n) => Some(n),
            SimEndpoint::Border(_) => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut SimMeshNode> {
        match &mut self.inner {
            SimEndpoint::Node(n) => Some(n),
            SimEndpoint::Border(_) => None,
        }
    }

    /// The node's role (borders report [`Role::Coordinator`]).
    pub fn role(&self) -> Role {
        match &self.inner {
            SimEndpoint::Border(_) => Role::Coordinator,
            SimEndpoint::Node(n) => n.role(),
        }
    }

    /// Boot the endpoint at simulation time `now`.
    pub fn initialize(&mut self, now: Timestamp) {
        self.set_clock(now);
        match &mut self.inner {
            SimEndpoint::Border(b) => b.initialize(),
            SimEndpoint::Node(n) => n.initialize(),
        }
        self.drain_trace();
    }

    /// Deliver a received frame at simulation time `now`.
    pub fn handle_frame(&mut self, msg: &Received, now: Timestamp) {
        self.set_clock(now);
        match &mut self.inner {
            SimEndpoint::Border(b) => b.handle_frame(msg),
            SimEndpoint::Node(n) => n.handle_frame(msg),
        }
        self.drain_trace();
    }

    /// Fire the endpoint's timer at simulation time `now`.
    pub fn handle_timer(&mut self, now: Timestamp) {
        self.set_clock(now);
        match &mut self.inner {
            SimEndpoint::Border(b) => b.handle_timer(now),
            SimEndpoint::Node(n) => n.handle_timer(now),
        }
        self.drain_trace();
    }

    /// The next raw-clock instant the endpoint wants a timer callback at.
    pub fn next_wake(&self) -> Option<Timestamp> {
        match &self.inner {
            SimEndpoint::Border(b) => b.next_wake(),
            SimEndpoint::Node(n) => n.next_wake(),
        }
    }

    /// Take all outbound frames from the transport.
    pub fn take_outgoing(&self) -> Vec<Outbound> {
        match &self.inner {
            SimEndpoint::Border(b) => b.transport().take_sent(),
            SimEndpoint::Node(n) => n.transport().take_sent(),
        }
    }

    /// Every trace event the endpoint has emitted so far.
    pub fn trace_log(&self) -> &[TraceEvent] {
        &self.trace_log
    }

    fn set_clock(&self, now: Timestamp) {
        match &self.inner {
            SimEndpoint::Border(b) => b.clock().set(now),
            SimEndpoint::Node(n) => n.clock().set(now),
        }
    }

    /// Move freshly emitted trace events into the persistent log, so the
    /// bounded channel never overflows under long runs.
    fn drain_trace(&mut self) {
        match &self.inner {
            SimEndpoint::Border(b) => {
                while let Ok(event) = b.trace().try_receive() {
                    self.trace_log.push(event);
                }
            }
            SimEndpoint::Node(n) => {
                while let Ok(event) = n.trace().try_receive() {
                    self.trace_log.push(event);
                }
            }
        }
    }
}
