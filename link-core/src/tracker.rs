//! Ping-tracking state machine.
//!
//! [`LinkTracker`] owns all sequence/timing state for the single tracked
//! transmitter. It is driven from exactly two call sites: [`LinkTracker::on_packet`]
//! (or [`LinkTracker::on_frame`]) when a ping arrives, and
//! [`LinkTracker::on_tick`] from the host loop. Neither call blocks; every
//! observable transition is handed to a [`LinkReporter`] as a structured event.
//!
//! ```text
//!   Waiting --first ping--> Ok --silence >= signal_timeout--> Lost
//!                            ^                                  |
//!                            +------------ next ping -----------+
//! ```
//!
//! In fixed-test mode an orthogonal `Running -> Complete` flag freezes the
//! tracker once the configured packet count is reached or the transmitter
//! stays silent for the test end timeout.

use core::fmt;
use core::time::Duration;

use crate::clock::MonotonicInstant;
use crate::config::{MonitorMode, TrackerConfig};
use crate::ping::{self, PingRecord, RejectReason, SenderId};
use crate::telemetry::{CompletionReason, LinkEvent, LinkReporter, ProgressReport, TestSummary};

/// Link health as observed by the receiver.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum SignalState {
    /// No ping accepted yet.
    #[default]
    Waiting,
    Ok,
    /// Silence exceeded the signal timeout.
    Lost,
}

impl SignalState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            SignalState::Waiting => "WAITING",
            SignalState::Ok => "OK",
            SignalState::Lost => "LOST",
        }
    }
}

/// Fixed-test completion flag; one-way.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum TestState {
    #[default]
    Running,
    Complete,
}

impl TestState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            TestState::Running => "RUNNING",
            TestState::Complete => "COMPLETE",
        }
    }
}

/// Success rate in hundredths of a percent (`10_000` = 100%).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct SuccessRate(u32);

impl SuccessRate {
    pub const FULL: Self = Self(10_000);

    /// Computes `received * 100 / (received + missed)`.
    ///
    /// Returns `None` when both counters are zero: that means "no data", not 0%.
    #[must_use]
    pub fn from_counts(received: u32, missed: u32) -> Option<Self> {
        let total = u64::from(received) + u64::from(missed);
        if total == 0 {
            return None;
        }

        let hundredths = u64::from(received) * 10_000 / total;
        Some(u32::try_from(hundredths).map_or(Self::FULL, Self))
    }

    #[must_use]
    pub const fn as_hundredths(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn whole_percent(self) -> u32 {
        self.0 / 100
    }
}

impl fmt::Display for SuccessRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.whole_percent(), self.as_hundredths() % 100)
    }
}

/// Test-mode progress carried in [`LinkStats`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TestProgress {
    pub state: TestState,
    pub target: u32,
}

/// Read-only snapshot of the tracker counters and state.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct LinkStats {
    pub total_received: u32,
    pub total_missed: u32,
    pub signal_loss_events: u32,
    pub signal: SignalState,
    pub sender: Option<SenderId>,
    pub last_sequence: u32,
    /// `None` in continuous mode.
    pub test: Option<TestProgress>,
}

impl LinkStats {
    /// Success rate, or `None` when nothing was received or missed yet.
    #[must_use]
    pub fn success_rate(&self) -> Option<SuccessRate> {
        SuccessRate::from_counts(self.total_received, self.total_missed)
    }

    /// Returns `true` once any ping has ever been accepted.
    #[must_use]
    pub const fn first_ping_received(&self) -> bool {
        !matches!(self.signal, SignalState::Waiting)
    }
}

/// What happened to an inbound frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameOutcome {
    /// Counted by the tracker.
    Accepted,
    /// Valid ping dropped because the test run already completed.
    Ignored,
    /// Failed validation; no state was touched.
    Rejected(RejectReason),
}

/// Single-transmitter link state machine.
#[derive(Clone, Debug)]
pub struct LinkTracker<TInstant> {
    config: TrackerConfig,
    sender: Option<SenderId>,
    last_sequence: u32,
    last_packet_at: Option<TInstant>,
    test_started_at: Option<TInstant>,
    last_heartbeat_at: TInstant,
    total_received: u32,
    total_missed: u32,
    signal_loss_events: u32,
    signal: SignalState,
    test: TestState,
}

impl<TInstant> LinkTracker<TInstant>
where
    TInstant: MonotonicInstant,
{
    /// Creates a tracker in the `Waiting` state; the heartbeat timer starts at `started_at`.
    #[must_use]
    pub fn new(config: TrackerConfig, started_at: TInstant) -> Self {
        Self {
            config,
            sender: None,
            last_sequence: 0,
            last_packet_at: None,
            test_started_at: None,
            last_heartbeat_at: started_at,
            total_received: 0,
            total_missed: 0,
            signal_loss_events: 0,
            signal: SignalState::Waiting,
            test: TestState::Running,
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn signal_state(&self) -> SignalState {
        self.signal
    }

    pub fn test_state(&self) -> TestState {
        self.test
    }

    /// Returns `true` once a fixed-test run has finished.
    pub fn is_complete(&self) -> bool {
        self.test == TestState::Complete
    }

    /// First sender ever accepted; never changes afterwards.
    pub fn sender(&self) -> Option<SenderId> {
        self.sender
    }

    pub fn last_sequence(&self) -> u32 {
        self.last_sequence
    }

    /// Timestamp of the most recent accepted ping.
    pub fn last_packet_at(&self) -> Option<TInstant> {
        self.last_packet_at
    }

    /// Validates a raw frame and feeds it to [`Self::on_packet`].
    ///
    /// Rejected frames never touch tracker state. They are reported as
    /// [`LinkEvent::PacketRejected`] only when the configuration asks for it.
    pub fn on_frame<R>(
        &mut self,
        sender: SenderId,
        frame: &[u8],
        now: TInstant,
        reporter: &mut R,
    ) -> FrameOutcome
    where
        R: LinkReporter<TInstant> + ?Sized,
    {
        match ping::validate(frame) {
            Ok(record) => self.on_packet(sender, record, now, reporter),
            Err(reason) => {
                if self.config.report_rejects {
                    reporter.report(now, LinkEvent::PacketRejected(reason));
                }
                FrameOutcome::Rejected(reason)
            }
        }
    }

    /// Ingests one validated ping.
    pub fn on_packet<R>(
        &mut self,
        sender: SenderId,
        ping: PingRecord,
        now: TInstant,
        reporter: &mut R,
    ) -> FrameOutcome
    where
        R: LinkReporter<TInstant> + ?Sized,
    {
        if self.is_complete() {
            return FrameOutcome::Ignored;
        }

        if self.sender.is_none() {
            self.sender = Some(sender);
        }

        let first_ping = self.signal == SignalState::Waiting;
        let gap = forward_gap(self.last_sequence, ping.sequence);

        if self.signal == SignalState::Lost {
            reporter.report(
                now,
                LinkEvent::SignalRestored {
                    silence: self.silence(now),
                    restoration_gap: gap,
                },
            );
            self.signal = SignalState::Ok;
        }

        if !first_ping && gap > 0 {
            self.total_missed = self.total_missed.saturating_add(gap);
            if !self.config.mode.is_fixed_test() {
                reporter.report(
                    now,
                    LinkEvent::PacketsMissed {
                        gap,
                        from_sequence: self.last_sequence,
                        to_sequence: ping.sequence,
                    },
                );
            }
        }

        self.last_sequence = ping.sequence;
        self.last_packet_at = Some(now);
        self.total_received = self.total_received.saturating_add(1);

        if first_ping {
            self.test_started_at = Some(now);
            self.signal = SignalState::Ok;
            reporter.report(
                now,
                LinkEvent::FirstPingReceived {
                    sender,
                    sequence: ping.sequence,
                },
            );
        }

        if self.config.mode.is_fixed_test() && ping.sequence >= self.config.test_packet_count {
            self.complete(CompletionReason::PacketCountReached, now, reporter);
        }

        FrameOutcome::Accepted
    }

    /// Periodic housekeeping: loss detection, test timeout, heartbeat.
    pub fn on_tick<R>(&mut self, now: TInstant, reporter: &mut R)
    where
        R: LinkReporter<TInstant> + ?Sized,
    {
        if self.is_complete() {
            return;
        }

        let silence = self.silence(now);

        if self.signal == SignalState::Ok && silence >= self.config.signal_timeout {
            self.signal = SignalState::Lost;
            self.signal_loss_events = self.signal_loss_events.saturating_add(1);
            reporter.report(
                now,
                LinkEvent::SignalLost {
                    silence,
                    last_sequence: self.last_sequence,
                },
            );
        }

        if self.config.mode.is_fixed_test()
            && self.signal != SignalState::Waiting
            && silence >= self.config.test_end_timeout
        {
            self.complete(CompletionReason::SilenceTimeout, now, reporter);
            return;
        }

        if now.saturating_duration_since(self.last_heartbeat_at) >= self.config.heartbeat_interval
        {
            self.last_heartbeat_at = now;
            match self.config.mode {
                MonitorMode::Continuous => {
                    reporter.report(now, LinkEvent::Heartbeat(self.stats()));
                }
                MonitorMode::FixedTest if self.signal != SignalState::Waiting => {
                    reporter.report(now, LinkEvent::Progress(self.progress()));
                }
                MonitorMode::FixedTest => {}
            }
        }
    }

    /// Zeroes the volatile counters.
    ///
    /// Sender identity, last sequence, signal state and the test flag are kept so
    /// gap detection continues across a reset.
    pub fn reset(&mut self) {
        self.total_received = 0;
        self.total_missed = 0;
        self.signal_loss_events = 0;
    }

    /// Snapshot of the counters and state.
    pub fn stats(&self) -> LinkStats {
        LinkStats {
            total_received: self.total_received,
            total_missed: self.total_missed,
            signal_loss_events: self.signal_loss_events,
            signal: self.signal,
            sender: self.sender,
            last_sequence: self.last_sequence,
            test: self.config.mode.is_fixed_test().then_some(TestProgress {
                state: self.test,
                target: self.config.test_packet_count,
            }),
        }
    }

    fn progress(&self) -> ProgressReport {
        ProgressReport {
            last_sequence: self.last_sequence,
            target: self.config.test_packet_count,
            total_received: self.total_received,
            total_missed: self.total_missed,
            success_rate: SuccessRate::from_counts(self.total_received, self.total_missed),
        }
    }

    fn complete<R>(&mut self, reason: CompletionReason, now: TInstant, reporter: &mut R)
    where
        R: LinkReporter<TInstant> + ?Sized,
    {
        self.test = TestState::Complete;
        let elapsed = self
            .test_started_at
            .map_or(Duration::ZERO, |start| now.saturating_duration_since(start));

        reporter.report(
            now,
            LinkEvent::TestComplete(TestSummary {
                reason,
                elapsed,
                stats: self.stats(),
            }),
        );
    }

    fn silence(&self, now: TInstant) -> Duration {
        self.last_packet_at
            .map_or(Duration::ZERO, |last| now.saturating_duration_since(last))
    }
}

/// Number of sequence numbers skipped between `last` and `next`.
///
/// Anything not strictly ahead of `last + 1` (duplicates, reordering, the
/// expected successor) counts as zero.
fn forward_gap(last: u32, next: u32) -> u32 {
    let expected = u64::from(last) + 1;
    let gap = u64::from(next).saturating_sub(expected);
    u32::try_from(gap).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Millis;
    use crate::telemetry::{LinkEventKind, TelemetryRecorder};

    const SENDER: SenderId = SenderId::new([0x24, 0x6F, 0x28, 0x0A, 0xBC, 0x01]);

    fn ms(value: u64) -> Millis {
        Millis::from_millis(value)
    }

    fn ping(sequence: u32) -> PingRecord {
        PingRecord::new(sequence, sequence.wrapping_mul(100))
    }

    #[test]
    fn forward_gap_ignores_duplicates_and_reordering() {
        assert_eq!(forward_gap(5, 6), 0);
        assert_eq!(forward_gap(5, 5), 0);
        assert_eq!(forward_gap(5, 2), 0);
        assert_eq!(forward_gap(5, 9), 3);
        assert_eq!(forward_gap(u32::MAX, 0), 0);
        assert_eq!(forward_gap(0, u32::MAX), u32::MAX - 1);
    }

    #[test]
    fn success_rate_handles_no_data() {
        assert_eq!(SuccessRate::from_counts(0, 0), None);
        assert_eq!(SuccessRate::from_counts(10, 0), Some(SuccessRate::FULL));
        assert_eq!(
            SuccessRate::from_counts(199, 1).map(SuccessRate::as_hundredths),
            Some(9_950)
        );
        assert_eq!(
            SuccessRate::from_counts(u32::MAX, u32::MAX).map(SuccessRate::whole_percent),
            Some(50)
        );
    }

    #[test]
    fn first_ping_moves_waiting_to_ok() {
        let mut tracker = LinkTracker::new(TrackerConfig::continuous(), ms(0));
        let mut telemetry = TelemetryRecorder::<Millis>::new();

        assert_eq!(tracker.signal_state(), SignalState::Waiting);
        let outcome = tracker.on_packet(SENDER, ping(42), ms(10), &mut telemetry);

        assert_eq!(outcome, FrameOutcome::Accepted);
        assert_eq!(tracker.signal_state(), SignalState::Ok);
        assert_eq!(tracker.sender(), Some(SENDER));
        assert_eq!(tracker.last_sequence(), 42);
        assert_eq!(tracker.stats().total_missed, 0, "first ping never counts a gap");

        let record = telemetry.latest().copied().unwrap();
        assert_eq!(
            record.event,
            LinkEvent::FirstPingReceived {
                sender: SENDER,
                sequence: 42
            }
        );
    }

    #[test]
    fn gap_is_counted_and_reported_in_continuous_mode() {
        let mut tracker = LinkTracker::new(TrackerConfig::continuous(), ms(0));
        let mut telemetry = TelemetryRecorder::<Millis>::new();

        tracker.on_packet(SENDER, ping(1), ms(0), &mut telemetry);
        tracker.on_packet(SENDER, ping(5), ms(100), &mut telemetry);

        assert_eq!(tracker.stats().total_missed, 3);
        assert_eq!(
            telemetry.latest().unwrap().event,
            LinkEvent::PacketsMissed {
                gap: 3,
                from_sequence: 1,
                to_sequence: 5
            }
        );
    }

    #[test]
    fn gap_is_counted_silently_in_fixed_test_mode() {
        let mut tracker = LinkTracker::new(TrackerConfig::fixed_test(), ms(0));
        let mut telemetry = TelemetryRecorder::<Millis>::new();

        tracker.on_packet(SENDER, ping(1), ms(0), &mut telemetry);
        tracker.on_packet(SENDER, ping(5), ms(100), &mut telemetry);

        assert_eq!(tracker.stats().total_missed, 3);
        assert_eq!(telemetry.count_kind(LinkEventKind::PacketsMissed), 0);
    }

    #[test]
    fn loss_is_declared_once_and_restored_by_next_ping() {
        let mut tracker = LinkTracker::new(TrackerConfig::continuous(), ms(0));
        let mut telemetry = TelemetryRecorder::<Millis>::new();

        tracker.on_packet(SENDER, ping(1), ms(0), &mut telemetry);
        tracker.on_tick(ms(2_999), &mut telemetry);
        assert_eq!(tracker.signal_state(), SignalState::Ok);

        tracker.on_tick(ms(3_000), &mut telemetry);
        tracker.on_tick(ms(3_000), &mut telemetry);
        tracker.on_tick(ms(5_000), &mut telemetry);
        assert_eq!(tracker.signal_state(), SignalState::Lost);
        assert_eq!(tracker.stats().signal_loss_events, 1);
        assert_eq!(telemetry.count_kind(LinkEventKind::SignalLost), 1);

        tracker.on_packet(SENDER, ping(2), ms(6_000), &mut telemetry);
        assert_eq!(tracker.signal_state(), SignalState::Ok);
        assert_eq!(
            telemetry.latest().unwrap().event,
            LinkEvent::SignalRestored {
                silence: Duration::from_millis(6_000),
                restoration_gap: 0
            }
        );
    }

    #[test]
    fn rejected_frames_are_reported_only_when_configured() {
        let mut continuous = LinkTracker::new(TrackerConfig::continuous(), ms(0));
        let mut fixed = LinkTracker::new(TrackerConfig::fixed_test(), ms(0));
        let mut telemetry = TelemetryRecorder::<Millis>::new();

        let reason = RejectReason::SizeMismatch { len: 2 };
        assert_eq!(
            continuous.on_frame(SENDER, &[0xAA, 0x01], ms(5), &mut telemetry),
            FrameOutcome::Rejected(reason)
        );
        assert_eq!(telemetry.len(), 1);
        assert_eq!(
            telemetry.latest().unwrap().event,
            LinkEvent::PacketRejected(reason)
        );

        assert_eq!(
            fixed.on_frame(SENDER, &[0xAA, 0x01], ms(5), &mut telemetry),
            FrameOutcome::Rejected(reason)
        );
        assert_eq!(telemetry.len(), 1);
        assert_eq!(fixed.signal_state(), SignalState::Waiting);
        assert_eq!(fixed.sender(), None);
    }

    #[test]
    fn heartbeat_fires_once_per_interval_even_before_first_ping() {
        let config =
            TrackerConfig::continuous().with_heartbeat_interval(Duration::from_millis(1_000));
        let mut tracker = LinkTracker::new(config, ms(0));
        let mut telemetry = TelemetryRecorder::<Millis>::new();

        tracker.on_tick(ms(999), &mut telemetry);
        assert!(telemetry.is_empty());

        tracker.on_tick(ms(1_000), &mut telemetry);
        tracker.on_tick(ms(1_000), &mut telemetry);
        tracker.on_tick(ms(1_500), &mut telemetry);
        assert_eq!(telemetry.count_kind(LinkEventKind::Heartbeat), 1);

        match telemetry.latest().unwrap().event {
            LinkEvent::Heartbeat(stats) => {
                assert!(!stats.first_ping_received());
                assert_eq!(stats.sender, None);
                assert_eq!(stats.success_rate(), None);
            }
            other => panic!("expected heartbeat, got {other:?}"),
        }

        tracker.on_tick(ms(2_500), &mut telemetry);
        assert_eq!(telemetry.count_kind(LinkEventKind::Heartbeat), 2);
    }

    #[test]
    fn fixed_test_reports_progress_only_after_first_ping() {
        let config =
            TrackerConfig::fixed_test().with_heartbeat_interval(Duration::from_millis(1_000));
        let mut tracker = LinkTracker::new(config, ms(0));
        let mut telemetry = TelemetryRecorder::<Millis>::new();

        tracker.on_tick(ms(1_000), &mut telemetry);
        assert!(telemetry.is_empty());

        tracker.on_packet(SENDER, ping(1), ms(1_100), &mut telemetry);
        tracker.on_packet(SENDER, ping(3), ms(1_300), &mut telemetry);
        tracker.on_tick(ms(2_000), &mut telemetry);

        assert_eq!(
            telemetry.latest().unwrap().event,
            LinkEvent::Progress(ProgressReport {
                last_sequence: 3,
                target: 10_000,
                total_received: 2,
                total_missed: 1,
                success_rate: SuccessRate::from_counts(2, 1),
            })
        );
        assert_eq!(telemetry.count_kind(LinkEventKind::Heartbeat), 0);
    }

    #[test]
    fn reset_keeps_identity_sequence_and_state() {
        let mut tracker = LinkTracker::new(TrackerConfig::continuous(), ms(0));
        let mut telemetry = TelemetryRecorder::<Millis>::new();

        tracker.on_packet(SENDER, ping(1), ms(0), &mut telemetry);
        tracker.on_packet(SENDER, ping(4), ms(100), &mut telemetry);
        tracker.on_tick(ms(3_200), &mut telemetry);

        tracker.reset();
        let stats = tracker.stats();
        assert_eq!(
            (
                stats.total_received,
                stats.total_missed,
                stats.signal_loss_events
            ),
            (0, 0, 0)
        );
        assert_eq!(stats.last_sequence, 4);
        assert_eq!(stats.sender, Some(SENDER));
        assert_eq!(stats.signal, SignalState::Lost);
    }

    #[test]
    fn stats_carry_test_progress_only_in_fixed_test_mode() {
        let continuous = LinkTracker::new(TrackerConfig::continuous(), ms(0));
        assert_eq!(continuous.stats().test, None);

        let fixed = LinkTracker::new(TrackerConfig::fixed_test().with_test_packet_count(50), ms(0));
        assert_eq!(
            fixed.stats().test,
            Some(TestProgress {
                state: TestState::Running,
                target: 50
            })
        );
    }
}
