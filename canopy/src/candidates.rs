//! Parent candidate tracking during discovery.
//!
//! While its discovery window is open a node records every coordinator and
//! sensor advertisement it hears, together with the reception signal
//! strength. When the window closes, [`CandidateSet::select_parent`] picks
//! the strongest coordinator, falling back to the strongest sensor, and
//! finally to the border itself when the node heard nobody at all.

use alloc::vec::Vec;
use core::marker::PhantomData;

use crate::config::MeshConfig;
use crate::types::{NodeAddr, Role};

/// One advertisement heard during discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateRecord {
    /// Advertising node's address.
    pub addr: NodeAddr,
    /// Signal strength of the advertisement in dBm.
    pub rssi: i16,
}

/// Outcome of parent selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentChoice {
    /// The node to send the join request to.
    pub parent: NodeAddr,
    /// The role the selected parent advertised.
    pub parent_role: Role,
}

/// Candidates recorded during one discovery window.
///
/// Both lists are append-only and bounded by `Cfg::MAX_CANDIDATES`; an
/// advertisement arriving when its list is full is dropped. A node that
/// advertises twice is recorded twice, which is harmless for max selection.
#[derive(Debug)]
pub struct CandidateSet<Cfg: MeshConfig> {
    coordinators: Vec<CandidateRecord>,
    sensors: Vec<CandidateRecord>,
    _config: PhantomData<Cfg>,
}

impl<Cfg: MeshConfig> Default for CandidateSet<Cfg> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Cfg: MeshConfig> CandidateSet<Cfg> {
    pub fn new() -> Self {
        Self {
            coordinators: Vec::new(),
            sensors: Vec::new(),
            _config: PhantomData,
        }
    }

    /// Record an advertisement. Returns false if the list was full.
    pub fn record(&mut self, role: Role, addr: NodeAddr, rssi: i16) -> bool {
        let list = match role {
            Role::Coordinator => &mut self.coordinators,
            Role::Sensor => &mut self.sensors,
            Role::Undecided => return false,
        };
        if list.len() >= Cfg::MAX_CANDIDATES {
            return false;
        }
        list.push(CandidateRecord { addr, rssi });
        true
    }

    /// True if no advertisement of either role was recorded.
    pub fn is_empty(&self) -> bool {
        self.coordinators.is_empty() && self.sensors.is_empty()
    }

    /// Number of recorded coordinator candidates.
    pub fn coordinator_count(&self) -> usize {
        self.coordinators.len()
    }

    /// Number of recorded sensor candidates.
    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// Pick the parent for this node.
    ///
    /// Coordinators always win over sensors regardless of signal strength;
    /// within a list the strongest signal wins and ties go to the earliest
    /// recorded. With no candidates at all the node anchors directly at the
    /// border and will operate as a coordinator itself.
    pub fn select_parent(&self, border: NodeAddr) -> ParentChoice {
        if let Some(best) = strongest(&self.coordinators) {
            return ParentChoice {
                parent: best.addr,
                parent_role: Role::Coordinator,
            };
        }
        if let Some(best) = strongest(&self.sensors) {
            return ParentChoice {
                parent: best.addr,
                parent_role: Role::Sensor,
            };
        }
        ParentChoice {
            parent: border,
            parent_role: Role::Coordinator,
        }
    }

    /// Drop all recorded candidates (used when restarting discovery).
    pub fn clear(&mut self) {
        self.coordinators.clear();
        self.sensors.clear();
    }
}

/// Strictly-greater comparison keeps the earliest record on ties.
fn strongest(list: &[CandidateRecord]) -> Option<&CandidateRecord> {
    let mut best: Option<&CandidateRecord> = None;
    for candidate in list {
        match best {
            Some(b) if candidate.rssi <= b.rssi => {}
            _ => best = Some(candidate),
        }
    }
    best
}
