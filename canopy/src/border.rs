//! Border orchestrator: the root of the mesh.
//!
//! The border never produces readings. It registers coordinators as they
//! announce themselves, then runs collection cycles forever: synchronize
//! every confirmed coordinator's clock against a broadcast average, divide
//! the collection window into one slot per coordinator, and account every
//! frame that arrives during a slot to the coordinator that owns it.
//! Attributed readings come out on the report channel; the serial link that
//! drains them is outside this crate.
//!
//! Coordinators heard mid-cycle wait in a pending list and are confirmed at
//! the next synchronization round, so the slot plan never changes under an
//! active window.

use alloc::vec;
use alloc::vec::Vec;
use core::marker::PhantomData;

use crate::clock::{ClockSync, SyncRound};
use crate::config::MeshConfig;
use crate::debug::{TraceChannel, TraceEvent};
use crate::slots::TimeslotPlan;
use crate::time::{Duration, Timestamp};
use crate::traits::{Clock, Received, ReportChannel, Transport};
use crate::types::{NodeAddr, Report, FIXED_DELAY, SETUP_WINDOW, WAIT_SYNC, WINDOW_SIZE};
use crate::wire::Frame;

/// Phase of the border's cycle loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BorderPhase {
    /// No coordinators yet; re-check periodically.
    Setup,
    /// Clock requests sent; collecting replies until complete or deadline.
    Synchronizing { deadline: Timestamp },
    /// Walking the slot boundaries of the collection window.
    ///
    /// `next_boundary` indexes into the boundary list; slot `i` is active
    /// between boundaries `i` and `i + 1`.
    Collecting { next_boundary: usize },
    /// Stop honored at a cycle boundary; the loop is done.
    Stopped,
}

/// Positional decode state for the forwarded-reading burst
/// ("sensor", address, value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum CollectRx {
    /// Nothing pending.
    #[default]
    Idle,
    /// "sensor" seen; the next address frame names the producer.
    AwaitingAddress,
    /// Producer known; bare values are its readings.
    Reading { sensor: NodeAddr },
}

/// The border orchestrator.
pub struct Border<T, Clk, Cfg: MeshConfig> {
    transport: T,
    clock: Clk,
    trace: TraceChannel,
    reports: ReportChannel,

    phase: BorderPhase,
    /// Coordinators heard but not yet part of a slot plan.
    pending: Vec<NodeAddr>,
    /// Coordinators with a slot in the current cycle, in registration order.
    confirmed: Vec<NodeAddr>,

    sync: ClockSync,
    round: Option<SyncRound>,

    /// Raw-clock slot boundaries of the active window (starts of each slot
    /// plus the final end).
    boundaries: Vec<Timestamp>,
    /// Messages accounted to each slot of the active window.
    counters: Vec<u32>,
    collect_rx: CollectRx,
    /// Latest reading per sensor, bounded by `Cfg::MAX_SENSORS`.
    readings: Vec<Report>,

    stop_requested: bool,
    wake_at: Option<Timestamp>,

    _config: PhantomData<Cfg>,
}

impl<T, Clk, Cfg> Border<T, Clk, Cfg>
where
    T: Transport,
    Clk: Clock,
    Cfg: MeshConfig,
{
    pub fn new(transport: T, clock: Clk) -> Self {
        Self {
            transport,
            clock,
            trace: TraceChannel::new(),
            reports: ReportChannel::new(),
            phase: BorderPhase::Setup,
            pending: Vec::new(),
            confirmed: Vec::new(),
            sync: ClockSync::new(),
            round: None,
            boundaries: Vec::new(),
            counters: Vec::new(),
            collect_rx: CollectRx::Idle,
            readings: Vec::new(),
            stop_requested: false,
            wake_at: None,
            _config: PhantomData,
        }
    }

    /// This border's link-layer address.
    pub fn address(&self) -> NodeAddr {
        self.transport.address()
    }

    /// Coordinators holding a slot in the current cycle.
    pub fn confirmed(&self) -> &[NodeAddr] {
        &self.confirmed
    }

    /// Coordinators awaiting confirmation at the next round.
    pub fn pending(&self) -> &[NodeAddr] {
        &self.pending
    }

    /// Per-slot message counts of the window being collected.
    pub fn slot_counters(&self) -> &[u32] {
        &self.counters
    }

    /// Latest reading recorded per sensor.
    pub fn readings(&self) -> &[Report] {
        &self.readings
    }

    /// True once a stop was honored at a cycle boundary.
    pub fn is_stopped(&self) -> bool {
        self.phase == BorderPhase::Stopped
    }

    /// Attributed readings stream.
    pub fn reports(&self) -> &ReportChannel {
        &self.reports
    }

    /// Trace event channel.
    pub fn trace(&self) -> &TraceChannel {
        &self.trace
    }

    /// Transport reference.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Clock reference.
    pub fn clock(&self) -> &Clk {
        &self.clock
    }

    /// Ask the loop to stop at the end of the current cycle. Equivalent to
    /// receiving a "stop" frame.
    pub fn request_stop(&mut self) {
        self.stop_requested = true;
        self.push_trace(TraceEvent::StopReceived);
    }

    /// Enter the setup phase and arm the first re-check.
    pub fn initialize(&mut self) {
        let now = self.clock.now();
        self.phase = BorderPhase::Setup;
        self.wake_at = Some(now + SETUP_WINDOW);
    }

    /// The next raw-clock instant the border needs a timer callback at.
    pub fn next_wake(&self) -> Option<Timestamp> {
        self.wake_at
    }

    /// Run the border until a stop is honored.
    pub async fn run(&mut self) {
        use embassy_futures::select::{select, Either};

        self.initialize();

        while !self.is_stopped() {
            let wake = self
                .wake_at
                .unwrap_or(self.clock.now() + Duration::from_secs(3600));

            let result = select(
                self.transport.incoming().receive(),
                self.clock.sleep_until(wake),
            )
            .await;

            match result {
                Either::First(msg) => self.handle_frame(&msg),
                Either::Second(()) => {
                    let now = self.clock.now();
                    self.handle_timer(now);
                }
            }
        }
    }

    /// Process one received frame.
    pub fn handle_frame(&mut self, msg: &Received) {
        let frame = match Frame::decode(&msg.data) {
            Ok(f) => f,
            Err(_) => return,
        };

        match frame {
            Frame::Stop => {
                self.stop_requested = true;
                self.push_trace(TraceEvent::StopReceived);
            }
            Frame::Coordinator => self.register_coordinator(msg.src),
            _ => match self.phase {
                BorderPhase::Synchronizing { .. } => self.handle_sync_frame(frame),
                BorderPhase::Collecting { next_boundary } => {
                    self.handle_collect_frame(frame, next_boundary)
                }
                BorderPhase::Setup | BorderPhase::Stopped => {}
            },
        }
    }

    /// Process a timer callback. Stale callbacks are ignored.
    pub fn handle_timer(&mut self, now: Timestamp) {
        match self.wake_at {
            Some(at) if now >= at => {}
            _ => return,
        }
        self.wake_at = None;

        match self.phase {
            BorderPhase::Setup => {
                if self.pending.is_empty() {
                    self.wake_at = Some(now + SETUP_WINDOW);
                } else {
                    self.begin_sync(now);
                }
            }
            BorderPhase::Synchronizing { deadline } if now >= deadline => {
                // Proceed with whatever samples arrived.
                self.finish_sync(now);
            }
            BorderPhase::Collecting { next_boundary } => self.advance_boundary(next_boundary, now),
            _ => {}
        }
    }

    // --- Registration ---

    fn register_coordinator(&mut self, addr: NodeAddr) {
        if addr == self.address()
            || self.pending.contains(&addr)
            || self.confirmed.contains(&addr)
        {
            return;
        }
        if self.pending.len() + self.confirmed.len() >= Cfg::MAX_COORDINATORS {
            self.push_trace(TraceEvent::CoordinatorDropped { addr });
            return;
        }
        self.pending.push(addr);
        self.push_trace(TraceEvent::CoordinatorRegistered {
            addr,
            pending: self.pending.len(),
        });
    }

    // --- Synchronization ---

    /// Confirm pending coordinators and poll every confirmed clock. The
    /// promotion happens here, before the plan is computed, so newcomers get
    /// a slot this cycle and the plan stays fixed once sent.
    fn begin_sync(&mut self, now: Timestamp) {
        self.confirmed.append(&mut self.pending);
        if self.confirmed.is_empty() {
            self.phase = BorderPhase::Setup;
            self.wake_at = Some(now + SETUP_WINDOW);
            return;
        }

        self.round = Some(SyncRound::new(self.confirmed.len()));
        for addr in &self.confirmed {
            let _ = self.transport.outgoing().try_send(crate::traits::Outbound {
                data: Frame::ClockRequest.encode(),
                dest: Some(*addr),
            });
        }
        let deadline = now + WAIT_SYNC;
        self.phase = BorderPhase::Synchronizing { deadline };
        self.wake_at = Some(deadline);
        self.push_trace(TraceEvent::SyncStarted {
            coordinators: self.confirmed.len(),
        });
    }

    fn handle_sync_frame(&mut self, frame: Frame) {
        let value = match frame.as_value() {
            Some(v) => v,
            None => return,
        };
        let (complete, received) = match self.round.as_mut() {
            Some(round) => {
                round.record(value);
                (round.is_complete(), round.received())
            }
            None => return,
        };
        self.push_trace(TraceEvent::ClockSampleRecorded { value, received });
        if complete {
            let now = self.clock.now();
            self.finish_sync(now);
        }
    }

    /// Close the round: broadcast the average, re-sync the border's own
    /// clock to it, and send out the slot plan.
    fn finish_sync(&mut self, now: Timestamp) {
        let round = match self.round.take() {
            Some(r) => r,
            None => return,
        };
        let average = round.average(now);
        self.send(Frame::Value(average.as_ticks()), None);
        self.sync.apply_reference(average, now);
        self.push_trace(TraceEvent::SyncComplete {
            average: average.as_ticks(),
            samples: round.received(),
        });

        let plan = TimeslotPlan::compute(self.confirmed.len(), WINDOW_SIZE, average, FIXED_DELAY);
        for (addr, slot) in self.confirmed.iter().zip(plan.iter()) {
            let _ = self.transport.outgoing().try_send(crate::traits::Outbound {
                data: Frame::Window.encode(),
                dest: Some(*addr),
            });
            let _ = self.transport.outgoing().try_send(crate::traits::Outbound {
                data: Frame::Value(slot.start.as_ticks()).encode(),
                dest: Some(*addr),
            });
            let _ = self.transport.outgoing().try_send(crate::traits::Outbound {
                data: Frame::Value(slot.duration.as_ticks()).encode(),
                dest: Some(*addr),
            });
        }
        self.push_trace(TraceEvent::PlanSent { slots: plan.len() });

        // Slot boundaries in the border's raw clock: every slot start plus
        // the final end.
        let mut boundaries = Vec::with_capacity(plan.len() + 1);
        for slot in plan.iter() {
            boundaries.push(self.sync.raw_for(slot.start));
        }
        boundaries.push(self.sync.raw_for(plan.window_end(average)));
        self.boundaries = boundaries;
        self.counters = vec![0; plan.len()];
        self.collect_rx = CollectRx::Idle;
        self.phase = BorderPhase::Collecting { next_boundary: 0 };
        self.wake_at = Some(self.boundaries[0]);
    }

    // --- Collection ---

    /// Index of the slot currently receiving, given the next boundary.
    fn active_slot(&self, next_boundary: usize) -> Option<usize> {
        if next_boundary >= 1 && next_boundary <= self.counters.len() {
            Some(next_boundary - 1)
        } else {
            None
        }
    }

    fn handle_collect_frame(&mut self, frame: Frame, next_boundary: usize) {
        let slot = match self.active_slot(next_boundary) {
            Some(slot) => slot,
            None => return,
        };

        match frame {
            // Only the announcements count toward the slot's activity: one
            // "sensor" per forwarded child, one "ping" per idle coordinator.
            Frame::Ping => self.counters[slot] += 1,
            Frame::Sensor => {
                self.counters[slot] += 1;
                self.collect_rx = CollectRx::AwaitingAddress;
            }
            Frame::Raw(_) => {
                if self.collect_rx == CollectRx::AwaitingAddress {
                    if let Some(sensor) = frame.as_addr() {
                        self.collect_rx = CollectRx::Reading { sensor };
                    }
                }
            }
            Frame::Value(value) => {
                if let CollectRx::Reading { sensor } = self.collect_rx {
                    self.record_reading(sensor, value);
                }
            }
            _ => {}
        }
    }

    fn record_reading(&mut self, sensor: NodeAddr, value: u64) {
        if let Some(entry) = self.readings.iter_mut().find(|r| r.sensor == sensor) {
            entry.value = value;
        } else if self.readings.len() < Cfg::MAX_SENSORS {
            self.readings.push(Report { sensor, value });
        } else {
            return;
        }
        let _ = self.reports.try_send(Report { sensor, value });
        self.push_trace(TraceEvent::ReadingRecorded { sensor, value });
    }

    fn advance_boundary(&mut self, next_boundary: usize, now: Timestamp) {
        if let Some(closed) = self.active_slot(next_boundary) {
            self.push_trace(TraceEvent::WindowClosed {
                messages: self.counters[closed] as usize,
            });
        }

        let next = next_boundary + 1;
        if next >= self.boundaries.len() {
            self.finish_cycle(now);
            return;
        }

        self.collect_rx = CollectRx::Idle;
        self.phase = BorderPhase::Collecting {
            next_boundary: next,
        };
        self.wake_at = Some(self.boundaries[next]);
        if let Some(opened) = self.active_slot(next) {
            self.push_trace(TraceEvent::SlotActive { index: opened });
        }
    }

    fn finish_cycle(&mut self, now: Timestamp) {
        self.boundaries.clear();
        self.counters.clear();
        self.collect_rx = CollectRx::Idle;

        if self.stop_requested {
            self.phase = BorderPhase::Stopped;
            self.wake_at = None;
            return;
        }
        self.begin_sync(now);
    }

    // --- Helpers ---

    fn send(&self, frame: Frame, dest: Option<NodeAddr>) {
        let _ = self.transport.outgoing().try_send(crate::traits::Outbound {
            data: frame.encode(),
            dest,
        });
    }

    fn push_trace(&self, event: TraceEvent) {
        let _ = self.trace.try_send(event);
    }
}
