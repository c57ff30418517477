#![forbid(unsafe_code)]
//! canopy - Self-organizing sensor mesh with time-division collection
//!
//! A protocol for small radio sensor meshes: nodes organize themselves into
//! a shallow tree below a border orchestrator, the border synchronizes every
//! coordinator's clock against a broadcast average, and each coordinator
//! collects its children's readings inside a dedicated slot of the shared
//! collection window.
//!
//! This crate is `no_std` but **requires the `alloc` crate**. Collections
//! are heap-allocated `Vec`s with runtime-enforced capacity limits chosen
//! through the [`MeshConfig`] trait.
//!
//! # Key Properties
//!
//! - Nodes discover parents by signal strength and join exactly one
//! - Rejected nodes retry; exhausted retries anchor them at the border
//! - A sensor that accepts a child becomes a coordinator on the spot
//! - Slot plans are fixed for a whole window; newcomers wait one cycle
//! - Readings arrive at the border attributed to the sensor that made them
//!
//! # Example (basic usage)
//!
//! ```
//! use canopy::{Node, Role, SmallConfig};
//! use canopy::traits::test_impls::{MockClock, MockTransport};
//!
//! let border = [1, 0];
//! let mut node: Node<_, _, SmallConfig> =
//!     Node::new(MockTransport::new([7, 0]), MockClock::new(), border);
//!
//! // A fresh node has no role until discovery concludes.
//! assert_eq!(node.role(), Role::Undecided);
//! node.initialize();
//! assert!(node.next_wake().is_some());
//! ```
//!
//! # Example (integration pattern)
//!
//! ```text
//! use canopy::{Border, Node, Transport, Clock};
//!
//! // Implement Transport and Clock for your platform...
//!
//! // Spawn the run loops
//! // spawn(async move { node.run().await; });
//! // spawn(async move { border.run().await; });
//!
//! // Drain attributed readings at the border
//! // let report = border.reports().receive().await;
//! ```
//!
//! # Module Structure
//!
//! - [`types`] - Addresses, roles, timing constants
//! - [`wire`] - Frame encoding (keywords, bare values)
//! - [`traits`] - Transport and Clock traits
//! - [`time`] - Timestamp, Duration, and clock offsets
//! - [`candidates`] - Discovery candidate lists and parent selection
//! - [`children`] - Coordinator child table
//! - [`clock`] - Synchronization rounds and offsets
//! - [`slots`] - Slot plans and positional receive state
//! - [`node`] - Sensor/coordinator state machine
//! - [`border`] - The border orchestrator (root)
//! - [`debug`] - Structured trace events
//! - [`config`] - Compile-time capacity configuration

#![no_std]

extern crate alloc;

pub mod border;
pub mod candidates;
pub mod children;
pub mod clock;
pub mod config;
pub mod debug;
pub mod node;
pub mod slots;
pub mod time;
pub mod traits;
pub mod types;
pub mod wire;

// Re-export main types at crate root
pub use border::Border;
pub use candidates::{CandidateRecord, CandidateSet, ParentChoice};
pub use children::ChildTable;
pub use clock::{ClockSync, SyncRound};
pub use config::{DefaultConfig, MeshConfig, SmallConfig};
pub use debug::TraceEvent;
pub use node::Node;
pub use slots::{RxState, SlotAssignment, TimeslotPlan};
pub use time::{ClockOffset, Duration, Timestamp};
pub use traits::{Clock, Outbound, Received, Transport};
pub use types::{NodeAddr, Report, Role};
pub use wire::{DecodeError, Frame};

// Re-export constants
pub use types::{
    DISCOVERY_WINDOW, FIXED_DELAY, JOIN_TIMEOUT, MAX_FRAME_LEN, POLL_TIMEOUT, SETUP_WINDOW,
    WAIT_SYNC, WINDOW_SIZE,
};
