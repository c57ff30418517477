//! Core types and constants for the canopy protocol.

use core::fmt;

use crate::time::Duration;

/// Link-layer node address, fixed width, equality-comparable.
pub type NodeAddr = [u8; 2];

// Wire limits
/// Maximum frame payload size in bytes.
pub const MAX_FRAME_LEN: usize = 20;

// Timing constants (ticks are milliseconds)
/// Length of the discovery window during which advertisements are collected.
pub const DISCOVERY_WINDOW: Duration = Duration::from_secs(2);
/// Length of one collection window, partitioned into coordinator slots.
pub const WINDOW_SIZE: Duration = Duration::from_secs(1);
/// How long the border waits for clock replies before proceeding with
/// whatever samples arrived.
pub const WAIT_SYNC: Duration = Duration::from_secs(5);
/// How long the border waits in Setup before re-checking for registered
/// coordinators.
pub const SETUP_WINDOW: Duration = Duration::from_secs(5);
/// How long a joining node waits for a "parent" acknowledgment before
/// treating the attempt as rejected.
pub const JOIN_TIMEOUT: Duration = Duration::from_secs(2);
/// Per-child wait for a "done" terminator while polling.
pub const POLL_TIMEOUT: Duration = Duration::from_ticks(200);
/// Gap between the synchronization reference instant and the first slot.
pub const FIXED_DELAY: Duration = Duration::from_ticks(10);

/// Role a node plays in the tree.
///
/// Only a [`Role::Coordinator`] may hold children; a node that bottoms out
/// of the join retry budget is forced into `Coordinator` anchored at the
/// border so the mesh never strands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    /// Booting or reset; discovery has not concluded.
    #[default]
    Undecided,
    /// Leaf node: produces readings, answers polls, holds no children.
    Sensor,
    /// Relay node: polls its children in its slot and forwards upward.
    Coordinator,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Undecided => write!(f, "undecided"),
            Role::Sensor => write!(f, "sensor"),
            Role::Coordinator => write!(f, "coordinator"),
        }
    }
}

/// A collected reading attributed to the sensor that produced it.
///
/// Emitted by the border on its report channel; the serial/UART forwarding
/// path consuming these is outside the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    /// Address of the sensor the reading came from.
    pub sensor: NodeAddr,
    /// The reading value as forwarded.
    pub value: u64,
}
