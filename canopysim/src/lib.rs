//! Discrete event simulator for the canopy mesh protocol.
//!
//! Drives [`canopy`] borders and nodes through a virtual radio network with
//! configurable topology, per-link signal strength, packet loss, and delay.
//! Time is fully virtual, so multi-minute collection scenarios run in
//! milliseconds and every run with the same seed is deterministic.
//!
//! # Example
//!
//! ```
//! use canopy::{Duration, Role};
//! use canopysim::{Simulator, Topology};
//!
//! let border = [1, 0];
//! let node = [10, 0];
//! let topo = Topology::fully_connected(&[border, node]);
//!
//! let mut sim = Simulator::new(42).with_topology(topo);
//! sim.add_border(border);
//! sim.add_node(node, border);
//! sim.run_for(Duration::from_secs(10));
//!
//! assert_eq!(sim.node(node).unwrap().role(), Role::Coordinator);
//! ```

pub mod event;
pub mod metrics;
pub mod node;
pub mod sim;
pub mod topology;

pub use event::{Event, ScenarioAction, ScheduledEvent, SequenceNumber};
pub use metrics::{SimMetrics, SimulationResult};
pub use node::{SimBorder, SimClock, SimMeshNode, SimNode, SimTransport};
pub use sim::Simulator;
pub use topology::{Link, Topology};

#[cfg(test)]
mod tests {
    use super::*;
    use canopy::{Duration, NodeAddr, Role, Timestamp, TraceEvent};

    const BORDER: NodeAddr = [1, 0];

    fn readings_of(sim: &Simulator) -> Vec<(NodeAddr, u64)> {
        sim.node(BORDER)
            .unwrap()
            .as_border()
            .unwrap()
            .readings()
            .iter()
            .map(|r| (r.sensor, r.value))
            .collect()
    }

    /// Two coordinators anchor at the border, a sensor joins each, and full
    /// collection cycles run: clock sync, slot plan, polling, attribution.
    #[test]
    fn test_two_branch_collection() {
        let c1: NodeAddr = [10, 0];
        let c2: NodeAddr = [11, 0];
        let s1: NodeAddr = [20, 0];
        let s2: NodeAddr = [21, 0];

        let mut topo = Topology::new();
        topo.add_link(BORDER, c1, Link::default());
        topo.add_link(BORDER, c2, Link::default());
        topo.add_link(c1, s1, Link::default());
        topo.add_link(c2, s2, Link::default());

        let mut sim = Simulator::new(7).with_topology(topo);
        sim.add_border(BORDER);
        sim.add_node(c1, BORDER);
        sim.add_node(c2, BORDER);
        // Sensors power up after the coordinators have anchored, so their
        // discovery hears coordinator advertisements.
        sim.add_node_at(s1, BORDER, Timestamp::from_secs(3));
        sim.add_node_at(s2, BORDER, Timestamp::from_secs(3));

        sim.schedule_action(
            Timestamp::from_ticks(4500),
            ScenarioAction::SetReading { node: s1, value: 42 },
        );
        sim.schedule_action(
            Timestamp::from_ticks(4500),
            ScenarioAction::SetReading { node: s2, value: 43 },
        );

        sim.run_until(Timestamp::from_secs(10));

        assert_eq!(sim.node(c1).unwrap().role(), Role::Coordinator);
        assert_eq!(sim.node(c2).unwrap().role(), Role::Coordinator);
        assert_eq!(sim.node(s1).unwrap().role(), Role::Sensor);
        assert_eq!(sim.node(s1).unwrap().as_node().unwrap().parent(), c1);

        let border = sim.node(BORDER).unwrap().as_border().unwrap();
        assert!(border.confirmed().contains(&c1));
        assert!(border.confirmed().contains(&c2));

        let readings = readings_of(&sim);
        assert!(readings.contains(&(s1, 42)));
        assert!(readings.contains(&(s2, 43)));

        // One sensor per branch: every closed slot saw exactly one report.
        let closed: Vec<usize> = sim
            .node(BORDER)
            .unwrap()
            .trace_log()
            .iter()
            .filter_map(|e| match e {
                TraceEvent::WindowClosed { messages } => Some(*messages),
                _ => None,
            })
            .collect();
        assert!(closed.len() >= 2);
        assert!(closed.iter().all(|&m| m == 1));
    }

    /// A child whose link dies stops answering polls and is evicted after
    /// the poll timeout; the remaining children keep reporting.
    #[test]
    fn test_silent_child_is_evicted() {
        let c1: NodeAddr = [10, 0];
        let s1: NodeAddr = [20, 0];
        let s2: NodeAddr = [21, 0];
        let s3: NodeAddr = [22, 0];

        let mut topo = Topology::new();
        topo.add_link(BORDER, c1, Link::default());
        topo.add_link(c1, s1, Link::default());
        topo.add_link(c1, s2, Link::default());
        topo.add_link(c1, s3, Link::default());

        let mut sim = Simulator::new(11).with_topology(topo);
        sim.add_border(BORDER);
        sim.add_node(c1, BORDER);
        sim.add_node_at(s1, BORDER, Timestamp::from_secs(3));
        sim.add_node_at(s2, BORDER, Timestamp::from_secs(3));
        sim.add_node_at(s3, BORDER, Timestamp::from_secs(3));

        for (sensor, value) in [(s1, 100u64), (s2, 200), (s3, 300)] {
            sim.schedule_action(
                Timestamp::from_ticks(4500),
                ScenarioAction::SetReading { node: sensor, value },
            );
        }
        // Cut s2 off after the first collection cycle completed.
        sim.schedule_action(
            Timestamp::from_ticks(6500),
            ScenarioAction::DisableLink { a: c1, b: s2 },
        );

        sim.run_until(Timestamp::from_secs(12));

        let coordinator = sim.node(c1).unwrap();
        assert_eq!(coordinator.as_node().unwrap().child_count(), 2);
        assert!(coordinator
            .trace_log()
            .iter()
            .any(|e| matches!(e, TraceEvent::ChildEvicted { child } if *child == s2)));

        let readings = readings_of(&sim);
        assert!(readings.contains(&(s1, 100)));
        assert!(readings.contains(&(s2, 200)));
        assert!(readings.contains(&(s3, 300)));
    }

    /// A latecomer facing a full coordinator exhausts its retries, then
    /// anchors at the border as a coordinator of its own.
    #[test]
    fn test_rejected_node_bottoms_out_at_border() {
        let c1: NodeAddr = [10, 0];
        let late: NodeAddr = [30, 0];
        let sensors: Vec<NodeAddr> = (0..8).map(|i| [20 + i as u8, 0]).collect();

        let mut topo = Topology::new();
        topo.add_link(BORDER, c1, Link::default());
        topo.add_link(BORDER, late, Link::default());
        topo.add_link(c1, late, Link::default());
        for &sensor in &sensors {
            topo.add_link(c1, sensor, Link::default());
        }

        let mut sim = Simulator::new(3).with_topology(topo);
        sim.add_border(BORDER);
        sim.add_node(c1, BORDER);
        for &sensor in &sensors {
            sim.add_node_at(sensor, BORDER, Timestamp::from_secs(3));
        }
        // Boots just after the eight sensors, so the child table is full
        // by the time its discovery window closes.
        sim.add_node_at(late, BORDER, Timestamp::from_ticks(3050));

        sim.run_until(Timestamp::from_secs(14));

        assert_eq!(sim.node(c1).unwrap().as_node().unwrap().child_count(), 8);

        let latecomer = sim.node(late).unwrap();
        assert_eq!(latecomer.role(), Role::Coordinator);
        assert_eq!(latecomer.as_node().unwrap().parent(), BORDER);
        assert!(latecomer
            .trace_log()
            .iter()
            .any(|e| matches!(e, TraceEvent::BottomedOut { border } if *border == BORDER)));

        let border = sim.node(BORDER).unwrap().as_border().unwrap();
        assert!(border.confirmed().contains(&c1));
        assert!(border.confirmed().contains(&late));
    }

    /// A sensor that accepts a child of its own is promoted to coordinator
    /// mid-flight; its slot traffic goes to the border that assigned the
    /// slot, so the grandchild's reading still arrives attributed.
    #[test]
    fn test_promoted_coordinator_reports_subtree() {
        let c1: NodeAddr = [10, 0];
        let s1: NodeAddr = [20, 0];
        let s2: NodeAddr = [21, 0];

        let mut topo = Topology::new();
        topo.add_link(BORDER, c1, Link::default());
        topo.add_link(BORDER, s1, Link::default());
        topo.add_link(c1, s1, Link::default());
        topo.add_link(s1, s2, Link::default());

        let mut sim = Simulator::new(13).with_topology(topo);
        sim.add_border(BORDER);
        sim.add_node(c1, BORDER);
        // s1 joins c1 as a sensor first; s2 boots later, hears only s1 and
        // joins it, which promotes s1 in place.
        sim.add_node_at(s1, BORDER, Timestamp::from_secs(3));
        sim.add_node_at(s2, BORDER, Timestamp::from_ticks(5500));

        sim.schedule_action(
            Timestamp::from_secs(6),
            ScenarioAction::SetReading { node: s2, value: 777 },
        );

        sim.run_until(Timestamp::from_secs(12));

        assert_eq!(sim.node(s1).unwrap().role(), Role::Coordinator);
        assert_eq!(sim.node(s1).unwrap().as_node().unwrap().parent(), c1);

        let border = sim.node(BORDER).unwrap().as_border().unwrap();
        assert!(border.confirmed().contains(&c1));
        assert!(border.confirmed().contains(&s1));

        // The depth-3 chain delivers: border <- c1 <- s1 <- s2.
        assert!(readings_of(&sim).contains(&(s2, 777)));
    }

    /// A stop request is honored at the cycle boundary, not mid-cycle.
    #[test]
    fn test_stop_at_cycle_boundary() {
        let c1: NodeAddr = [10, 0];
        let topo = Topology::fully_connected(&[BORDER, c1]);

        let mut sim = Simulator::new(5).with_topology(topo);
        sim.add_border(BORDER);
        sim.add_node(c1, BORDER);
        sim.schedule_action(
            Timestamp::from_ticks(5200),
            ScenarioAction::RequestStop { node: BORDER },
        );

        sim.run_until(Timestamp::from_secs(10));

        let border = sim.node(BORDER).unwrap().as_border().unwrap();
        assert!(border.is_stopped());
    }
}
