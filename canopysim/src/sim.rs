//! Discrete event simulator for canopy meshes.

use std::collections::BinaryHeap;

use canopy::{Duration, NodeAddr, Received, Timestamp};
use hashbrown::HashMap;

use crate::event::{Event, ScenarioAction, ScheduledEvent, SequenceNumber};
use crate::metrics::{SimMetrics, SimulationResult};
use crate::node::SimNode;
use crate::topology::Topology;

/// Discrete event simulator for canopy networks.
///
/// Nodes are driven by three event kinds: frame deliveries, timer fires, and
/// boots. After every event that touches a node, the simulator re-reads the
/// node's `next_wake` and schedules a timer fire for it; endpoints treat
/// stale fires as no-ops, so over-scheduling is harmless.
pub struct Simulator {
    /// All nodes in the simulation.
    nodes: HashMap<NodeAddr, SimNode>,
    /// Network topology.
    topology: Topology,
    /// Current simulation time.
    current_time: Timestamp,
    /// Priority queue of scheduled events.
    event_queue: BinaryHeap<ScheduledEvent>,
    /// Collected metrics.
    metrics: SimMetrics,
    /// Next sequence number for event ordering.
    next_seq: u64,
    /// RNG state for packet loss.
    rng_state: u64,
}

impl Simulator {
    /// Create a new simulator with given RNG seed.
    pub fn new(seed: u64) -> Self {
        Self {
            nodes: HashMap::new(),
            topology: Topology::new(),
            current_time: Timestamp::ZERO,
            event_queue: BinaryHeap::new(),
            metrics: SimMetrics::new(),
            next_seq: 0,
            rng_state: seed,
        }
    }

    /// Set the network topology.
    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    /// Add a border that boots immediately.
    pub fn add_border(&mut self, address: NodeAddr) {
        self.nodes
            .insert(address, SimNode::border(address, self.current_time));
        self.schedule(self.current_time, Event::Boot { node: address });
    }

    /// Add a mesh node that boots immediately.
    pub fn add_node(&mut self, address: NodeAddr, border: NodeAddr) {
        self.add_node_at(address, border, self.current_time);
    }

    /// Add a mesh node that boots at the given time.
    pub fn add_node_at(&mut self, address: NodeAddr, border: NodeAddr, boot_time: Timestamp) {
        self.nodes
            .insert(address, SimNode::node(address, border, boot_time));
        self.schedule(boot_time, Event::Boot { node: address });
    }

    /// Get a reference to a node.
    pub fn node(&self, address: NodeAddr) -> Option<&SimNode> {
        self.nodes.get(&address)
    }

    /// Get a mutable reference to a node.
    pub fn node_mut(&mut self, address: NodeAddr) -> Option<&mut SimNode> {
        self.nodes.get_mut(&address)
    }

    /// Get the current simulation time.
    pub fn current_time(&self) -> Timestamp {
        self.current_time
    }

    /// Get the topology.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Get mutable topology.
    pub fn topology_mut(&mut self) -> &mut Topology {
        &mut self.topology
    }

    /// Get collected metrics.
    pub fn metrics(&self) -> &SimMetrics {
        &self.metrics
    }

    /// Schedule an event.
    pub fn schedule(&mut self, time: Timestamp, event: Event) {
        let seq = SequenceNumber::new(self.next_seq);
        self.next_seq += 1;
        self.event_queue.push(ScheduledEvent::new(time, seq, event));
    }

    /// Schedule a scenario action.
    pub fn schedule_action(&mut self, time: Timestamp, action: ScenarioAction) {
        self.schedule(time, Event::ScenarioAction(action));
    }

    /// Run simulation until specified time.
    pub fn run_until(&mut self, end_time: Timestamp) -> SimulationResult {
        while let Some(event) = self.event_queue.peek() {
            if event.time > end_time {
                break;
            }

            let event = self.event_queue.pop().expect("peeked event");
            self.advance_time(event.time);
            self.process_event(event.event);
        }

        // Advance to end_time even if no more events.
        self.advance_time(end_time);

        SimulationResult {
            end_time: self.current_time,
            metrics: self.metrics.clone(),
            queue_exhausted: self.event_queue.peek().is_none(),
        }
    }

    /// Run simulation for specified duration.
    pub fn run_for(&mut self, duration: Duration) -> SimulationResult {
        self.run_until(self.current_time + duration)
    }

    /// Advance simulation time.
    fn advance_time(&mut self, time: Timestamp) {
        if time > self.current_time {
            self.current_time = time;
        }
    }

    /// Process a single event.
    fn process_event(&mut self, event: Event) {
        match event {
            Event::MessageDelivery {
                to,
                from,
                data,
                dest,
                rssi,
            } => self.deliver_message(to, from, data, dest, rssi),
            Event::TimerFire { node } => self.fire_timer(node),
            Event::Boot { node } => self.boot_node(node),
            Event::ScenarioAction(action) => self.execute_action(action),
        }
    }

    /// Deliver a frame to a node.
    fn deliver_message(
        &mut self,
        to: NodeAddr,
        from: NodeAddr,
        data: Vec<u8>,
        dest: Option<NodeAddr>,
        rssi: i16,
    ) {
        let now = self.current_time;
        if let Some(node) = self.nodes.get_mut(&to) {
            let msg = Received {
                data,
                src: from,
                dest,
                rssi: Some(rssi),
            };
            node.handle_frame(&msg, now);
            self.metrics.frames_delivered += 1;
        }
        self.after_node_event(to);
    }

    /// Fire timer for a node.
    fn fire_timer(&mut self, node_id: NodeAddr) {
        self.metrics.timer_fires += 1;
        let now = self.current_time;
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.handle_timer(now);
        }
        self.after_node_event(node_id);
    }

    /// Boot a node.
    fn boot_node(&mut self, node_id: NodeAddr) {
        let now = self.current_time;
        if let Some(node) = self.nodes.get_mut(&node_id) {
            node.initialize(now);
        }
        self.after_node_event(node_id);
    }

    /// Route a node's queued frames and re-arm its timer.
    fn after_node_event(&mut self, node_id: NodeAddr) {
        self.collect_outgoing(node_id);

        if let Some(wake) = self.nodes.get(&node_id).and_then(|n| n.next_wake()) {
            let time = wake.max(self.current_time);
            self.schedule(time, Event::TimerFire { node: node_id });
        }
    }

    /// Collect outgoing frames from a node and route them.
    fn collect_outgoing(&mut self, sender: NodeAddr) {
        let messages = match self.nodes.get(&sender) {
            Some(node) => node.take_outgoing(),
            None => return,
        };

        for msg in messages {
            self.route_frame(sender, msg.data, msg.dest);
        }
    }

    /// Route one frame: unicast to its destination if the link is up,
    /// broadcast to every active neighbor otherwise.
    fn route_frame(&mut self, sender: NodeAddr, data: Vec<u8>, dest: Option<NodeAddr>) {
        self.metrics.frames_sent += 1;
        let current_time = self.current_time;

        let targets: Vec<NodeAddr> = match dest {
            Some(d) => {
                if self.topology.is_connected(sender, d) {
                    vec![d]
                } else {
                    Vec::new()
                }
            }
            None => self.topology.neighbors(sender),
        };

        let mut deliveries = Vec::with_capacity(targets.len());
        let mut dropped = 0u64;
        for target in targets {
            if let Some(link) = self.topology.get_link(sender, target) {
                let loss_rate = link.loss_rate;
                let delay = link.delay;
                let rssi = link.rssi;

                if loss_rate > 0.0 && self.random_f64() < loss_rate {
                    dropped += 1;
                    continue;
                }
                deliveries.push((target, delay, rssi));
            }
        }
        self.metrics.frames_dropped += dropped;

        for (target, delay, rssi) in deliveries {
            self.schedule(
                current_time + delay,
                Event::MessageDelivery {
                    to: target,
                    from: sender,
                    data: data.clone(),
                    dest,
                    rssi,
                },
            );
        }
    }

    /// Execute a scenario action.
    fn execute_action(&mut self, action: ScenarioAction) {
        match action {
            ScenarioAction::DisableLink { a, b } => {
                if let Some(link) = self.topology.get_link_mut(a, b) {
                    link.active = false;
                }
            }
            ScenarioAction::EnableLink { a, b } => {
                if let Some(link) = self.topology.get_link_mut(a, b) {
                    link.active = true;
                }
            }
            ScenarioAction::SetLossRate { a, b, rate } => {
                if let Some(link) = self.topology.get_link_mut(a, b) {
                    link.loss_rate = rate.clamp(0.0, 1.0);
                }
            }
            ScenarioAction::SetReading { node, value } => {
                if let Some(inner) = self.nodes.get_mut(&node).and_then(|n| n.as_node_mut()) {
                    inner.set_reading(value);
                }
            }
            ScenarioAction::RequestStop { node } => {
                if let Some(border) = self.nodes.get_mut(&node).and_then(|n| n.as_border_mut()) {
                    border.request_stop();
                }
            }
        }
    }

    /// Generate a random f64 in [0, 1).
    fn random_f64(&mut self) -> f64 {
        self.rng_state = self
            .rng_state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        (self.rng_state as f64) / (u64::MAX as f64)
    }
}
