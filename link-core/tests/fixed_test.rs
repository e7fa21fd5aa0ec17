use core::time::Duration;

use link_core::clock::Millis;
use link_core::config::TrackerConfig;
use link_core::ping::{PingRecord, SenderId};
use link_core::telemetry::{CompletionReason, LinkEvent, LinkEventKind, TelemetryRecorder};
use link_core::tracker::{FrameOutcome, LinkTracker, SignalState, TestState};

const TRANSMITTER: SenderId = SenderId::new([0x24, 0x6F, 0x28, 0x0A, 0xBC, 0x01]);

fn ms(value: u64) -> Millis {
    Millis::from_millis(value)
}

fn short_run() -> LinkTracker<Millis> {
    LinkTracker::new(TrackerConfig::fixed_test().with_test_packet_count(100), ms(0))
}

fn completion(telemetry: &TelemetryRecorder<Millis>) -> Option<LinkEvent> {
    telemetry
        .oldest_first()
        .map(|record| record.event)
        .find(|event| event.kind() == LinkEventKind::TestComplete)
}

#[test]
fn reaching_the_packet_count_completes_the_run() {
    let mut tracker = short_run();
    let mut telemetry = TelemetryRecorder::<Millis>::new();

    for sequence in 1..=99 {
        let at = ms(u64::from(sequence) * 100);
        tracker.on_packet(TRANSMITTER, PingRecord::new(sequence, 0), at, &mut telemetry);
    }
    assert_eq!(tracker.test_state(), TestState::Running);

    tracker.on_packet(
        TRANSMITTER,
        PingRecord::new(100, 0),
        ms(10_000),
        &mut telemetry,
    );
    assert_eq!(tracker.test_state(), TestState::Complete);

    match completion(&telemetry) {
        Some(LinkEvent::TestComplete(summary)) => {
            assert_eq!(summary.reason, CompletionReason::PacketCountReached);
            assert_eq!(summary.elapsed, Duration::from_millis(9_900));
            assert_eq!(summary.stats.total_received, 100);
            assert_eq!(summary.stats.total_missed, 0);
        }
        other => panic!("expected completion, got {other:?}"),
    }
}

#[test]
fn pings_after_completion_are_ignored() {
    let mut tracker = short_run();
    let mut telemetry = TelemetryRecorder::<Millis>::new();

    tracker.on_packet(TRANSMITTER, PingRecord::new(1, 0), ms(0), &mut telemetry);
    tracker.on_packet(TRANSMITTER, PingRecord::new(100, 0), ms(100), &mut telemetry);
    let frozen = tracker.stats();
    let recorded = telemetry.total_recorded();

    assert_eq!(
        tracker.on_frame(
            TRANSMITTER,
            &PingRecord::new(101, 0).encode(),
            ms(200),
            &mut telemetry,
        ),
        FrameOutcome::Ignored
    );
    tracker.on_tick(ms(60_000), &mut telemetry);

    assert_eq!(tracker.stats(), frozen);
    assert_eq!(frozen.total_received, 2);
    assert_eq!(telemetry.total_recorded(), recorded);
}

#[test]
fn silence_ends_the_run_after_the_end_timeout() {
    let mut tracker = short_run();
    let mut telemetry = TelemetryRecorder::<Millis>::new();

    tracker.on_packet(TRANSMITTER, PingRecord::new(1, 0), ms(0), &mut telemetry);
    tracker.on_packet(TRANSMITTER, PingRecord::new(5, 0), ms(100), &mut telemetry);

    let mut now = 100;
    while tracker.test_state() == TestState::Running && now < 20_000 {
        now += 100;
        tracker.on_tick(ms(now), &mut telemetry);
    }

    assert_eq!(now, 10_100);
    assert_eq!(tracker.signal_state(), SignalState::Lost);
    assert_eq!(telemetry.count_kind(LinkEventKind::SignalLost), 1);
    assert_eq!(telemetry.count_kind(LinkEventKind::PacketsMissed), 0);

    match completion(&telemetry) {
        Some(LinkEvent::TestComplete(summary)) => {
            assert_eq!(summary.reason, CompletionReason::SilenceTimeout);
            assert_eq!(summary.stats.total_missed, 3);
            assert_eq!(summary.stats.last_sequence, 5);
        }
        other => panic!("expected completion, got {other:?}"),
    }
}

#[test]
fn waiting_receiver_never_times_out_the_run() {
    let mut tracker = short_run();
    let mut telemetry = TelemetryRecorder::<Millis>::new();

    for tick in 1..=300 {
        tracker.on_tick(ms(tick * 100), &mut telemetry);
    }

    assert_eq!(tracker.signal_state(), SignalState::Waiting);
    assert_eq!(tracker.test_state(), TestState::Running);
    assert!(telemetry.is_empty());
}

#[test]
fn malformed_frames_are_dropped_silently() {
    let mut tracker = short_run();
    let mut telemetry = TelemetryRecorder::<Millis>::new();
    tracker.on_packet(TRANSMITTER, PingRecord::new(1, 0), ms(0), &mut telemetry);
    let before = tracker.stats();
    let recorded = telemetry.total_recorded();

    let outcome = tracker.on_frame(TRANSMITTER, &[0xAA, 0x02], ms(50), &mut telemetry);

    assert!(matches!(outcome, FrameOutcome::Rejected(_)));
    assert_eq!(tracker.stats(), before);
    assert_eq!(telemetry.total_recorded(), recorded);
}
