//! Operator console output.
//!
//! Every link event is logged (defmt on the MCU, stdout on host builds) and
//! rendered into text lines queued for the USB CDC console task. Rendering
//! never blocks: when the queue is full the line is dropped and counted.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::fmt::{self, Write};

use embassy_sync::channel::{Channel, Receiver, Sender};
use heapless::String;
use link_core::config::TrackerConfig;
use link_core::repl::commands::CommandOutcome;
use link_core::repl::status::{
    BannerFormatter, EventFormatter, StatsFormatter, write_help, write_reset_ack,
};
use link_core::telemetry::{LinkEvent, LinkReporter};
use link_core::tracker::SuccessRate;
use portable_atomic::{AtomicU32, Ordering};

use crate::monitor::FirmwareInstant;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;

#[cfg(target_os = "none")]
type ConsoleMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type ConsoleMutex = NoopRawMutex;

/// Longest console line in bytes; box-drawing characters take three each.
pub const CONSOLE_LINE_LEN: usize = 192;

/// Lines buffered between the renderer and the USB task.
pub const CONSOLE_QUEUE_DEPTH: usize = 32;

pub type ConsoleLine = String<CONSOLE_LINE_LEN>;

pub type ConsoleChannel = Channel<ConsoleMutex, ConsoleLine, CONSOLE_QUEUE_DEPTH>;

pub type ConsoleSender<'a> = Sender<'a, ConsoleMutex, ConsoleLine, CONSOLE_QUEUE_DEPTH>;

pub type ConsoleReceiver<'a> = Receiver<'a, ConsoleMutex, ConsoleLine, CONSOLE_QUEUE_DEPTH>;

/// Events handed to the console since boot.
static EVENTS_REPORTED: AtomicU32 = AtomicU32::new(0);
/// Lines discarded because the USB side fell behind.
static LINES_DROPPED: AtomicU32 = AtomicU32::new(0);

pub fn events_reported() -> u32 {
    EVENTS_REPORTED.load(Ordering::Relaxed)
}

pub fn lines_dropped() -> u32 {
    LINES_DROPPED.load(Ordering::Relaxed)
}

/// `fmt::Write` sink that splits output on `\n` and queues each line.
pub struct LineWriter<'a> {
    sender: ConsoleSender<'a>,
    current: ConsoleLine,
}

impl<'a> LineWriter<'a> {
    pub fn new(sender: ConsoleSender<'a>) -> Self {
        Self {
            sender,
            current: ConsoleLine::new(),
        }
    }

    fn flush_line(&mut self) {
        let line = core::mem::take(&mut self.current);
        if self.sender.try_send(line).is_err() {
            LINES_DROPPED.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Write for LineWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            if ch == '\n' {
                self.flush_line();
            } else {
                // Overlong lines are truncated rather than split.
                let _ = self.current.push(ch);
            }
        }
        Ok(())
    }
}

impl Drop for LineWriter<'_> {
    fn drop(&mut self) {
        if !self.current.is_empty() {
            self.flush_line();
        }
    }
}

const LINE_END: &[u8] = b"\r\n";

/// Console line being written out in endpoint-sized packets.
///
/// The byte offset outlives any single write, so a line interrupted by an
/// incoming keystroke resumes where it stopped instead of being lost.
#[derive(Debug)]
pub struct PendingLine {
    line: ConsoleLine,
    offset: usize,
}

impl PendingLine {
    pub fn new(line: ConsoleLine) -> Self {
        Self { line, offset: 0 }
    }

    /// Copies the next unsent bytes (text, then CRLF) into `packet`.
    pub fn fill(&self, packet: &mut [u8]) -> usize {
        let remaining = self.line.as_bytes().iter().chain(LINE_END).skip(self.offset);
        let mut len = 0;
        for (slot, byte) in packet.iter_mut().zip(remaining) {
            *slot = *byte;
            len += 1;
        }
        len
    }

    /// Marks `written` bytes as delivered.
    pub fn advance(&mut self, written: usize) {
        self.offset = (self.offset + written).min(self.total_len());
    }

    pub fn is_finished(&self) -> bool {
        self.offset >= self.total_len()
    }

    fn total_len(&self) -> usize {
        self.line.len() + LINE_END.len()
    }
}

/// Reporter used by the monitor task.
pub struct ConsoleReporter<'a> {
    sender: ConsoleSender<'a>,
}

impl<'a> ConsoleReporter<'a> {
    pub fn new(sender: ConsoleSender<'a>) -> Self {
        Self { sender }
    }
}

impl LinkReporter<FirmwareInstant> for ConsoleReporter<'_> {
    fn report(&mut self, timestamp: FirmwareInstant, event: LinkEvent) {
        EVENTS_REPORTED.fetch_add(1, Ordering::Relaxed);
        log_event(timestamp, &event);

        let mut writer = LineWriter::new(self.sender);
        let _ = EventFormatter::new(timestamp.since_boot(), &event).write_lines(&mut writer);
    }
}

/// Queues the startup banner.
pub fn write_banner(sender: ConsoleSender<'_>, config: &TrackerConfig) {
    let mut writer = LineWriter::new(sender);
    let _ = BannerFormatter::new(config).write_banner(&mut writer);
}

/// Queues the text for a console command result.
pub fn write_outcome(sender: ConsoleSender<'_>, outcome: &CommandOutcome, now: FirmwareInstant) {
    let mut writer = LineWriter::new(sender);
    let uptime = now.since_boot();
    let _ = match outcome {
        CommandOutcome::Stats(stats) => StatsFormatter::new(stats, uptime).write_box(&mut writer),
        CommandOutcome::CountersReset { .. } => write_reset_ack(&mut writer, uptime),
        CommandOutcome::Help => write_help(&mut writer),
    };
    log_command(outcome);
}

#[cfg(target_os = "none")]
fn log_event(timestamp: FirmwareInstant, event: &LinkEvent) {
    let kind = event.kind();
    defmt::info!(
        "link: {} code={=u16:#x} t={}ms",
        defmt::Display2Format(&kind),
        kind.to_raw(),
        timestamp.into_embassy().as_millis()
    );
}

#[cfg(not(target_os = "none"))]
fn log_event(timestamp: FirmwareInstant, event: &LinkEvent) {
    let kind = event.kind();
    println!(
        "link: {} code=0x{:04x} t={}ms",
        kind,
        kind.to_raw(),
        timestamp.into_embassy().as_millis()
    );
}

#[cfg(target_os = "none")]
fn log_command(outcome: &CommandOutcome) {
    match outcome {
        CommandOutcome::Stats(stats) => defmt::info!(
            "console: stats rate={}/10000 events={} dropped_lines={}",
            stats.success_rate().map_or(0, SuccessRate::as_hundredths),
            events_reported(),
            lines_dropped()
        ),
        CommandOutcome::CountersReset { before, .. } => defmt::info!(
            "console: counters reset (received={} missed={} losses={})",
            before.total_received,
            before.total_missed,
            before.signal_loss_events
        ),
        CommandOutcome::Help => {}
    }
}

#[cfg(not(target_os = "none"))]
fn log_command(outcome: &CommandOutcome) {
    match outcome {
        CommandOutcome::Stats(stats) => println!(
            "console: stats rate={}/10000 events={} dropped_lines={}",
            stats.success_rate().map_or(0, SuccessRate::as_hundredths),
            events_reported(),
            lines_dropped()
        ),
        CommandOutcome::CountersReset { before, .. } => println!(
            "console: counters reset (received={} missed={} losses={})",
            before.total_received, before.total_missed, before.signal_loss_events
        ),
        CommandOutcome::Help => {}
    }
}
