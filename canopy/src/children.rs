//! Child table for coordinators.
//!
//! A coordinator remembers which nodes joined under it so it can poll them
//! during its timeslot. The table is bounded by `Cfg::MAX_CHILDREN`; a join
//! arriving at a full table is rejected and the joining node retries
//! elsewhere.

use alloc::vec::Vec;
use core::marker::PhantomData;

use crate::config::MeshConfig;
use crate::types::NodeAddr;

/// Bounded set of joined children.
#[derive(Debug)]
pub struct ChildTable<Cfg: MeshConfig> {
    children: Vec<NodeAddr>,
    _config: PhantomData<Cfg>,
}

impl<Cfg: MeshConfig> Default for ChildTable<Cfg> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Cfg: MeshConfig> ChildTable<Cfg> {
    pub fn new() -> Self {
        Self {
            children: Vec::new(),
            _config: PhantomData,
        }
    }

    /// Accept a join request. Returns false when the table is full.
    ///
    /// A child already present is re-accepted without a second entry, so a
    /// retransmitted join request stays idempotent.
    pub fn insert(&mut self, child: NodeAddr) -> bool {
        if self.contains(child) {
            return true;
        }
        if self.children.len() >= Cfg::MAX_CHILDREN {
            return false;
        }
        self.children.push(child);
        true
    }

    /// Remove a child (eviction after a poll timeout).
    pub fn remove(&mut self, child: NodeAddr) -> bool {
        let before = self.children.len();
        self.children.retain(|c| *c != child);
        self.children.len() != before
    }

    pub fn contains(&self, child: NodeAddr) -> bool {
        self.children.contains(&child)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeAddr> {
        self.children.iter()
    }

    /// Snapshot of the membership, in join order.
    pub fn snapshot(&self) -> Vec<NodeAddr> {
        self.children.clone()
    }

    pub fn clear(&mut self) {
        self.children.clear();
    }
}
