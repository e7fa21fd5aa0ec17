//! Firmware-side ownership of the link tracker.
//!
//! The monitor task (radio frames and the 100 ms tick) and the console task
//! (operator keys) both touch the tracker. [`SharedTracker`] keeps it behind an
//! embassy blocking mutex so every packet, tick and command runs to completion
//! before the next one starts.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::cell::RefCell;
use core::time::Duration;

use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Instant;
use link_core::clock::MonotonicInstant;
use link_core::config::TrackerConfig;
use link_core::repl::commands::CounterControl;
use link_core::telemetry::LinkReporter;
use link_core::tracker::{FrameOutcome, LinkStats, LinkTracker};

use crate::radio::RadioFrame;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;

#[cfg(target_os = "none")]
type MonitorMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type MonitorMutex = NoopRawMutex;

/// Housekeeping period of the monitor task.
pub const MONITOR_TICK: Duration = Duration::from_millis(100);

/// Embassy instant adapted to the tracker's clock trait.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct FirmwareInstant(Instant);

impl FirmwareInstant {
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn into_embassy(self) -> Instant {
        self.0
    }

    /// Time since boot, used as console uptime.
    pub fn since_boot(self) -> Duration {
        Duration::from_micros(self.0.as_micros())
    }
}

impl From<Instant> for FirmwareInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl MonotonicInstant for FirmwareInstant {
    fn saturating_duration_since(&self, earlier: Self) -> Duration {
        let micros = self.0.as_micros().saturating_sub(earlier.0.as_micros());
        Duration::from_micros(micros)
    }
}

type TrackerCell = RefCell<Option<LinkTracker<FirmwareInstant>>>;

/// Tracker shared between the monitor and console tasks.
pub struct SharedTracker {
    inner: Mutex<MonitorMutex, TrackerCell>,
}

impl SharedTracker {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Installs a fresh tracker; replaces any previous one.
    pub fn start(&self, config: TrackerConfig, now: FirmwareInstant) {
        self.inner.lock(|cell| {
            *cell.borrow_mut() = Some(LinkTracker::new(config, now));
        });
    }

    pub fn config(&self) -> Option<TrackerConfig> {
        self.with(|tracker| *tracker.config())
    }

    /// Hands a radio frame to the tracker; `None` before [`Self::start`].
    pub fn on_frame<R>(
        &self,
        frame: &RadioFrame,
        now: FirmwareInstant,
        reporter: &mut R,
    ) -> Option<FrameOutcome>
    where
        R: LinkReporter<FirmwareInstant>,
    {
        self.with(|tracker| tracker.on_frame(frame.sender, &frame.payload, now, reporter))
    }

    pub fn on_tick<R>(&self, now: FirmwareInstant, reporter: &mut R)
    where
        R: LinkReporter<FirmwareInstant>,
    {
        self.with(|tracker| tracker.on_tick(now, reporter));
    }

    pub fn stats(&self) -> Option<LinkStats> {
        self.with(|tracker| tracker.stats())
    }

    /// Counter access for the console command executor.
    pub fn handle(&self) -> TrackerHandle<'_> {
        TrackerHandle { shared: self }
    }

    fn with<T>(&self, f: impl FnOnce(&mut LinkTracker<FirmwareInstant>) -> T) -> Option<T> {
        self.inner
            .lock(|cell| cell.borrow_mut().as_mut().map(f))
    }
}

impl Default for SharedTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Borrowed view implementing [`CounterControl`] for the command executor.
#[derive(Clone, Copy)]
pub struct TrackerHandle<'a> {
    shared: &'a SharedTracker,
}

impl CounterControl for TrackerHandle<'_> {
    fn snapshot(&self) -> LinkStats {
        self.shared.stats().unwrap_or(EMPTY_STATS)
    }

    fn reset_counters(&mut self) {
        self.shared.with(LinkTracker::reset);
    }
}

const EMPTY_STATS: LinkStats = LinkStats {
    total_received: 0,
    total_missed: 0,
    signal_loss_events: 0,
    signal: link_core::tracker::SignalState::Waiting,
    sender: None,
    last_sequence: 0,
    test: None,
};
