//! Network topology and link properties.

use canopy::{Duration, NodeAddr};
use hashbrown::HashMap;

/// Properties of a radio link between two nodes.
#[derive(Debug, Clone)]
pub struct Link {
    /// Signal strength in dBm.
    pub rssi: i16,
    /// Packet loss rate (0.0 to 1.0).
    pub loss_rate: f64,
    /// Propagation delay.
    pub delay: Duration,
    /// Whether the link is currently active.
    pub active: bool,
}

impl Default for Link {
    fn default() -> Self {
        Self {
            rssi: -70,
            loss_rate: 0.0,
            delay: Duration::from_ticks(1),
            active: true,
        }
    }
}

impl Link {
    /// Create a new link with default properties.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the RSSI value.
    pub fn with_rssi(mut self, rssi: i16) -> Self {
        self.rssi = rssi;
        self
    }

    /// Set the loss rate.
    pub fn with_loss_rate(mut self, rate: f64) -> Self {
        self.loss_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Set the delay.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Network topology defining connectivity between nodes.
#[derive(Debug, Clone, Default)]
pub struct Topology {
    /// Links between pairs of nodes (bidirectional).
    links: HashMap<(NodeAddr, NodeAddr), Link>,
}

impl Topology {
    /// Create an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fully connected topology for the given nodes.
    pub fn fully_connected(nodes: &[NodeAddr]) -> Self {
        let mut topo = Self::new();
        for (i, &a) in nodes.iter().enumerate() {
            for &b in nodes.iter().skip(i + 1) {
                topo.add_link(a, b, Link::default());
            }
        }
        topo
    }

    /// Create a chain topology (each node connected only to neighbors).
    pub fn chain(nodes: &[NodeAddr]) -> Self {
        let mut topo = Self::new();
        for window in nodes.windows(2) {
            topo.add_link(window[0], window[1], Link::default());
        }
        topo
    }

    /// Create a star topology (first node is hub, connected to all others).
    pub fn star(nodes: &[NodeAddr]) -> Self {
        let mut topo = Self::new();
        if nodes.is_empty() {
            return topo;
        }
        let hub = nodes[0];
        for &spoke in nodes.iter().skip(1) {
            topo.add_link(hub, spoke, Link::default());
        }
        topo
    }

    /// Add a bidirectional link between two nodes.
    pub fn add_link(&mut self, a: NodeAddr, b: NodeAddr, link: Link) {
        self.links.insert(Self::canonical_pair(a, b), link);
    }

    /// Get a link between two nodes.
    pub fn get_link(&self, a: NodeAddr, b: NodeAddr) -> Option<&Link> {
        self.links.get(&Self::canonical_pair(a, b))
    }

    /// Get a mutable link between two nodes.
    pub fn get_link_mut(&mut self, a: NodeAddr, b: NodeAddr) -> Option<&mut Link> {
        self.links.get_mut(&Self::canonical_pair(a, b))
    }

    /// Check if two nodes are connected (link exists and is active).
    pub fn is_connected(&self, a: NodeAddr, b: NodeAddr) -> bool {
        self.get_link(a, b).is_some_and(|link| link.active)
    }

    /// Get all nodes that a given node can reach (active links).
    pub fn neighbors(&self, node: NodeAddr) -> Vec<NodeAddr> {
        let mut result = Vec::new();
        for (&(a, b), link) in &self.links {
            if link.active {
                if a == node {
                    result.push(b);
                } else if b == node {
                    result.push(a);
                }
            }
        }
        result
    }

    /// Canonical pair ordering for consistent link storage.
    fn canonical_pair(a: NodeAddr, b: NodeAddr) -> (NodeAddr, NodeAddr) {
        if a < b {
            (a, b)
        } else {
            (b, a)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_nodes(count: usize) -> Vec<NodeAddr> {
        (0..count).map(|i| [i as u8 + 1, 0]).collect()
    }

    #[test]
    fn test_fully_connected() {
        let nodes = make_nodes(3);
        let topo = Topology::fully_connected(&nodes);

        assert!(topo.is_connected(nodes[0], nodes[1]));
        assert!(topo.is_connected(nodes[0], nodes[2]));
        assert!(topo.is_connected(nodes[1], nodes[2]));
    }

    #[test]
    fn test_chain() {
        let nodes = make_nodes(4);
        let topo = Topology::chain(&nodes);

        assert!(topo.is_connected(nodes[0], nodes[1]));
        assert!(topo.is_connected(nodes[1], nodes[2]));
        assert!(topo.is_connected(nodes[2], nodes[3]));
        assert!(!topo.is_connected(nodes[0], nodes[2]));
        assert!(!topo.is_connected(nodes[0], nodes[3]));
    }

    #[test]
    fn test_star() {
        let nodes = make_nodes(4);
        let topo = Topology::star(&nodes);

        assert!(topo.is_connected(nodes[0], nodes[1]));
        assert!(topo.is_connected(nodes[0], nodes[2]));
        assert!(topo.is_connected(nodes[0], nodes[3]));
        assert!(!topo.is_connected(nodes[1], nodes[2]));
    }

    #[test]
    fn test_disabled_link_is_not_connected() {
        let nodes = make_nodes(2);
        let mut topo = Topology::fully_connected(&nodes);
        topo.get_link_mut(nodes[0], nodes[1]).unwrap().active = false;
        assert!(!topo.is_connected(nodes[0], nodes[1]));
        assert!(topo.neighbors(nodes[0]).is_empty());
    }

    #[test]
    fn test_neighbors() {
        let nodes = make_nodes(4);
        let topo = Topology::star(&nodes);

        assert_eq!(topo.neighbors(nodes[0]).len(), 3);
        let spoke_neighbors = topo.neighbors(nodes[1]);
        assert_eq!(spoke_neighbors, [nodes[0]]);
    }

    #[test]
    fn test_link_lookup_is_direction_agnostic() {
        let mut topo = Topology::new();
        topo.add_link([2, 0], [1, 0], Link::new().with_rssi(-40));
        assert_eq!(topo.get_link([1, 0], [2, 0]).unwrap().rssi, -40);
    }
}
