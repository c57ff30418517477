//! Transport and clock traits abstracting the radio and the scheduler.
//!
//! The protocol never touches a radio driver or a hardware timer directly:
//! - [`Transport`] models a shared broadcast medium with optional unicast
//!   addressing and per-message signal strength reporting.
//! - [`Clock`] models monotonic ticks plus an async `sleep_until`, the only
//!   suspension primitive the protocol uses besides waiting on the incoming
//!   channel.
//!
//! Both are trait seams so the same state machines run against real hardware
//! (embassy on an MCU) or the deterministic simulator.

use alloc::vec::Vec;
use core::future::Future;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;

use crate::time::Timestamp;
use crate::types::NodeAddr;

/// Queue size for transport channels.
pub const FRAME_QUEUE_SIZE: usize = 16;

/// Queue size for the trace event channel.
pub const TRACE_QUEUE_SIZE: usize = 32;

/// Queue size for the border's report channel.
pub const REPORT_QUEUE_SIZE: usize = 16;

/// Mutex type used for channels.
pub type ChannelMutex = CriticalSectionRawMutex;

/// A frame received from the radio.
#[derive(Debug, Clone)]
pub struct Received {
    /// Raw payload bytes.
    pub data: Vec<u8>,
    /// Link-layer source address.
    pub src: NodeAddr,
    /// Link-layer destination (`None` for broadcast).
    pub dest: Option<NodeAddr>,
    /// Signal strength of this reception in dBm, if the radio reports it.
    pub rssi: Option<i16>,
}

/// A frame queued for transmission.
#[derive(Debug, Clone)]
pub struct Outbound {
    /// Raw payload bytes.
    pub data: Vec<u8>,
    /// Destination (`None` broadcasts on the shared medium).
    pub dest: Option<NodeAddr>,
}

/// Incoming frame channel type.
pub type FrameInChannel = Channel<ChannelMutex, Received, FRAME_QUEUE_SIZE>;

/// Outgoing frame channel type.
pub type FrameOutChannel = Channel<ChannelMutex, Outbound, FRAME_QUEUE_SIZE>;

/// Channel the border emits attributed readings on.
pub type ReportChannel = Channel<ChannelMutex, crate::types::Report, REPORT_QUEUE_SIZE>;

/// Transport trait for radio backends.
///
/// The radio ISR (or the simulator) delivers frames with
/// `incoming().try_send(..)`; the transmit task drains `outgoing()`.
/// Sends from the protocol are best-effort `try_send` calls — a full queue
/// drops the frame, which the protocol tolerates the same way it tolerates
/// radio loss.
pub trait Transport {
    /// This node's link-layer address.
    fn address(&self) -> NodeAddr;

    /// Channel of frames queued for transmission.
    fn outgoing(&self) -> &FrameOutChannel;

    /// Channel of received frames.
    fn incoming(&self) -> &FrameInChannel;
}

/// Time source trait for real or simulated time.
///
/// `now()` is the node's *raw* clock; the protocol layers its synchronization
/// offset on top (see [`crate::clock::ClockSync`]).
pub trait Clock {
    /// Future type returned by `sleep_until`.
    type SleepFuture<'a>: Future<Output = ()>
    where
        Self: 'a;

    /// Get the current raw timestamp.
    fn now(&self) -> Timestamp;

    /// Sleep until the given raw timestamp.
    ///
    /// For simulation this completes when the simulator advances time past
    /// the target; it must never busy-wait.
    fn sleep_until(&self, time: Timestamp) -> Self::SleepFuture<'_>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_impls {
    //! Mock implementations of traits for unit testing.

    use core::cell::Cell;
    use core::future::{ready, Ready};

    use super::*;
    use crate::time::Duration;

    /// Mock transport for testing.
    pub struct MockTransport {
        address: NodeAddr,
        outgoing: FrameOutChannel,
        incoming: FrameInChannel,
    }

    impl MockTransport {
        pub fn new(address: NodeAddr) -> Self {
            Self {
                address,
                outgoing: Channel::new(),
                incoming: Channel::new(),
            }
        }

        /// Inject a frame as if it was received.
        pub fn inject_rx(&self, data: Vec<u8>, src: NodeAddr, dest: Option<NodeAddr>, rssi: Option<i16>) {
            let _ = self.incoming.try_send(Received {
                data,
                src,
                dest,
                rssi,
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

    impl Transport for MockTransport {
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

    /// Mock clock for testing (time advances manually).
    pub struct MockClock {
        current: Cell<Timestamp>,
    }

    impl Default for MockClock {
        fn default() -> Self {
            Self {
                current: Cell::new(Timestamp::ZERO),
            }
        }
    }

    impl MockClock {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn at(time: Timestamp) -> Self {
            Self {
                current: Cell::new(time),
            }
        }

        /// Set the clock to a specific time.
        pub fn set(&self, time: Timestamp) {
            self.current.set(time);
        }

        /// Advance the clock by a duration.
        pub fn advance(&self, duration: Duration) {
            self.current.set(self.current.get() + duration);
        }
    }

    impl Clock for MockClock {
        type SleepFuture<'a> = Ready<()>;

        fn now(&self) -> Timestamp {
            self.current.get()
        }

        fn sleep_until(&self, _time: Timestamp) -> Self::SleepFuture<'_> {
            // Synchronous tests advance time manually.
            ready(())
        }
    }
}
