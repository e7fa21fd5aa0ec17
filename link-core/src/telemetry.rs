//! Link event catalog and telemetry ring shared by firmware and host targets.
//!
//! The tracker never formats text. Every observable transition is handed to a
//! [`LinkReporter`] as a structured [`LinkEvent`]; consoles render them, the
//! [`TelemetryRecorder`] keeps the most recent ones in a fixed-size ring, and
//! [`LinkEventKind`] provides compact numeric codes for diagnostics channels.

use core::fmt;
use core::time::Duration;

use heapless::HistoryBuf;

use crate::ping::{RejectReason, SenderId};
use crate::tracker::{LinkStats, SuccessRate};

/// Identifier assigned to each recorded telemetry entry.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Structured events emitted by the link tracker.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkEvent {
    /// The very first ping was accepted.
    FirstPingReceived { sender: SenderId, sequence: u32 },
    /// A forward jump in sequence numbers (continuous mode only).
    PacketsMissed {
        gap: u32,
        from_sequence: u32,
        to_sequence: u32,
    },
    /// No ping for at least the signal timeout.
    SignalLost { silence: Duration, last_sequence: u32 },
    /// First ping after a loss.
    SignalRestored {
        silence: Duration,
        restoration_gap: u32,
    },
    /// Periodic status in continuous mode.
    Heartbeat(LinkStats),
    /// Periodic status in fixed-test mode.
    Progress(ProgressReport),
    /// Fixed-test run finished.
    TestComplete(TestSummary),
    /// A frame failed validation.
    PacketRejected(RejectReason),
}

impl LinkEvent {
    /// Returns the compact discriminant for this event.
    #[must_use]
    pub const fn kind(&self) -> LinkEventKind {
        match self {
            LinkEvent::FirstPingReceived { .. } => LinkEventKind::FirstPingReceived,
            LinkEvent::PacketsMissed { .. } => LinkEventKind::PacketsMissed,
            LinkEvent::SignalLost { .. } => LinkEventKind::SignalLost,
            LinkEvent::SignalRestored { .. } => LinkEventKind::SignalRestored,
            LinkEvent::Heartbeat(_) => LinkEventKind::Heartbeat,
            LinkEvent::Progress(_) => LinkEventKind::Progress,
            LinkEvent::TestComplete(_) => LinkEventKind::TestComplete,
            LinkEvent::PacketRejected(_) => LinkEventKind::PacketRejected,
        }
    }
}

/// Progress payload emitted on the heartbeat cadence during a test run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ProgressReport {
    pub last_sequence: u32,
    pub target: u32,
    pub total_received: u32,
    pub total_missed: u32,
    pub success_rate: Option<SuccessRate>,
}

/// Why a fixed-test run ended.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CompletionReason {
    /// A ping at or beyond the configured packet count arrived.
    PacketCountReached,
    /// The transmitter went quiet for the test end timeout.
    SilenceTimeout,
}

impl CompletionReason {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            CompletionReason::PacketCountReached => "packet count reached",
            CompletionReason::SilenceTimeout => "transmitter silent",
        }
    }
}

/// Final summary handed over once when a test run completes.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TestSummary {
    pub reason: CompletionReason,
    /// Time since the first accepted ping.
    pub elapsed: Duration,
    pub stats: LinkStats,
}

/// Compact discriminant for [`LinkEvent`] values.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LinkEventKind {
    FirstPingReceived,
    PacketsMissed,
    SignalLost,
    SignalRestored,
    Heartbeat,
    Progress,
    TestComplete,
    PacketRejected,
    Custom(u16),
}

impl LinkEventKind {
    const FIRST_PING_CODE: u16 = 0x0001;
    const PACKETS_MISSED_CODE: u16 = 0x0002;
    const SIGNAL_LOST_CODE: u16 = 0x0003;
    const SIGNAL_RESTORED_CODE: u16 = 0x0004;
    const HEARTBEAT_CODE: u16 = 0x0010;
    const PROGRESS_CODE: u16 = 0x0011;
    const TEST_COMPLETE_CODE: u16 = 0x0012;
    const PACKET_REJECTED_CODE: u16 = 0x0020;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            LinkEventKind::FirstPingReceived => Self::FIRST_PING_CODE,
            LinkEventKind::PacketsMissed => Self::PACKETS_MISSED_CODE,
            LinkEventKind::SignalLost => Self::SIGNAL_LOST_CODE,
            LinkEventKind::SignalRestored => Self::SIGNAL_RESTORED_CODE,
            LinkEventKind::Heartbeat => Self::HEARTBEAT_CODE,
            LinkEventKind::Progress => Self::PROGRESS_CODE,
            LinkEventKind::TestComplete => Self::TEST_COMPLETE_CODE,
            LinkEventKind::PacketRejected => Self::PACKET_REJECTED_CODE,
            LinkEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`LinkEventKind::Custom`].
    #[must_use]
    pub const fn from_raw(code: u16) -> Self {
        match code {
            Self::FIRST_PING_CODE => LinkEventKind::FirstPingReceived,
            Self::PACKETS_MISSED_CODE => LinkEventKind::PacketsMissed,
            Self::SIGNAL_LOST_CODE => LinkEventKind::SignalLost,
            Self::SIGNAL_RESTORED_CODE => LinkEventKind::SignalRestored,
            Self::HEARTBEAT_CODE => LinkEventKind::Heartbeat,
            Self::PROGRESS_CODE => LinkEventKind::Progress,
            Self::TEST_COMPLETE_CODE => LinkEventKind::TestComplete,
            Self::PACKET_REJECTED_CODE => LinkEventKind::PacketRejected,
            other => LinkEventKind::Custom(other),
        }
    }
}

impl fmt::Display for LinkEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkEventKind::FirstPingReceived => f.write_str("first-ping"),
            LinkEventKind::PacketsMissed => f.write_str("packets-missed"),
            LinkEventKind::SignalLost => f.write_str("signal-lost"),
            LinkEventKind::SignalRestored => f.write_str("signal-restored"),
            LinkEventKind::Heartbeat => f.write_str("heartbeat"),
            LinkEventKind::Progress => f.write_str("progress"),
            LinkEventKind::TestComplete => f.write_str("test-complete"),
            LinkEventKind::PacketRejected => f.write_str("packet-rejected"),
            LinkEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

/// Collaborator that receives structured link events.
pub trait LinkReporter<TInstant> {
    fn report(&mut self, timestamp: TInstant, event: LinkEvent);
}

impl<TInstant, R> LinkReporter<TInstant> for &mut R
where
    R: LinkReporter<TInstant> + ?Sized,
{
    fn report(&mut self, timestamp: TInstant, event: LinkEvent) {
        (**self).report(timestamp, event);
    }
}

/// Fans each event out to two reporters, left first.
impl<TInstant, A, B> LinkReporter<TInstant> for (A, B)
where
    TInstant: Copy,
    A: LinkReporter<TInstant>,
    B: LinkReporter<TInstant>,
{
    fn report(&mut self, timestamp: TInstant, event: LinkEvent) {
        self.0.report(timestamp, event);
        self.1.report(timestamp, event);
    }
}

/// Reporter that discards every event.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopReporter;

impl<TInstant> LinkReporter<TInstant> for NoopReporter {
    fn report(&mut self, _: TInstant, _: LinkEvent) {}
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord<TInstant>
where
    TInstant: Copy,
{
    pub id: EventId,
    pub timestamp: TInstant,
    pub event: LinkEvent,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord<TInstant>, CAPACITY>;

/// Records link events into a fixed-size ring buffer.
pub struct TelemetryRecorder<TInstant, const CAPACITY: usize = TELEMETRY_RING_CAPACITY>
where
    TInstant: Copy,
{
    ring: TelemetryRing<TInstant, CAPACITY>,
    next_event_id: EventId,
}

impl<TInstant, const CAPACITY: usize> TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord<TInstant>> + '_ {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord<TInstant>> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.len() == 0
    }

    /// Total number of events ever recorded, including evicted ones.
    pub fn total_recorded(&self) -> EventId {
        self.next_event_id
    }

    /// Counts retained records of the given kind.
    pub fn count_kind(&self, kind: LinkEventKind) -> usize {
        self.oldest_first()
            .filter(|record| record.event.kind() == kind)
            .count()
    }

    /// Records an event and returns its identifier.
    pub fn record(&mut self, event: LinkEvent, timestamp: TInstant) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
        });

        id
    }
}

impl<TInstant, const CAPACITY: usize> Default for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<TInstant, const CAPACITY: usize> LinkReporter<TInstant>
    for TelemetryRecorder<TInstant, CAPACITY>
where
    TInstant: Copy,
{
    fn report(&mut self, timestamp: TInstant, event: LinkEvent) {
        self.record(event, timestamp);
    }
}
