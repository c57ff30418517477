//! Metrics collection for simulation runs.

use canopy::Timestamp;

/// Counters collected over a simulation run.
#[derive(Debug, Clone, Default)]
pub struct SimMetrics {
    /// Frames handed to the radio by any node.
    pub frames_sent: u64,
    /// Frame deliveries performed (one per receiving node).
    pub frames_delivered: u64,
    /// Frame deliveries suppressed by link loss.
    pub frames_dropped: u64,
    /// Timer events fired.
    pub timer_fires: u64,
}

impl SimMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fraction of attempted deliveries that were lost.
    pub fn loss_ratio(&self) -> f64 {
        let attempted = self.frames_delivered + self.frames_dropped;
        if attempted == 0 {
            return 0.0;
        }
        self.frames_dropped as f64 / attempted as f64
    }
}

/// Outcome of a simulation run.
#[derive(Debug, Clone)]
pub struct SimulationResult {
    /// Simulation time when the run stopped.
    pub end_time: Timestamp,
    /// Counters at the end of the run.
    pub metrics: SimMetrics,
    /// True when no events remained in the queue.
    pub queue_exhausted: bool,
}
