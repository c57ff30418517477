//! Compile-time configuration for collection capacities.
//!
//! The [`MeshConfig`] trait tunes the bounded collections for different MCU
//! sizes. All capacity overruns degrade gracefully at runtime (drop or
//! reject), so these bounds cap memory, not correctness.

/// Configuration trait for compile-time capacity tuning.
pub trait MeshConfig {
    /// Maximum candidates recorded per role list during one discovery window.
    const MAX_CANDIDATES: usize;

    /// Maximum children a coordinator accepts.
    const MAX_CHILDREN: usize;

    /// Maximum coordinators the border tracks (confirmed plus pending).
    const MAX_COORDINATORS: usize;

    /// Maximum sensors the border attributes readings to.
    const MAX_SENSORS: usize;

    /// Join rejections tolerated before a node bottoms out as a
    /// coordinator anchored at the border.
    const MAX_RETRIES: u8;
}

/// Default configuration, sized like the reference deployment.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultConfig;

impl MeshConfig for DefaultConfig {
    const MAX_CANDIDATES: usize = 10;
    const MAX_CHILDREN: usize = 8;
    const MAX_COORDINATORS: usize = 10;
    const MAX_SENSORS: usize = 50;
    const MAX_RETRIES: u8 = 3;
}

/// Small configuration for tightly constrained MCUs.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmallConfig;

impl MeshConfig for SmallConfig {
    const MAX_CANDIDATES: usize = 4;
    const MAX_CHILDREN: usize = 3;
    const MAX_COORDINATORS: usize = 4;
    const MAX_SENSORS: usize = 12;
    const MAX_RETRIES: u8 = 2;
}
