//! Console rendering for link events and statistics.
//!
//! Nothing in the tracker produces text. The formatters here turn
//! [`LinkEvent`], [`LinkStats`] and [`TrackerConfig`] values into
//! human-readable lines on any [`fmt::Write`] sink, so the firmware console
//! and the emulator print the same thing.

use core::fmt::{self, Write};
use core::time::Duration;

use heapless::String;

use super::commands::{ALL_COMMANDS, OperatorCommand};
use crate::config::{EXPECTED_PING_INTERVAL, MonitorMode, TrackerConfig};
use crate::telemetry::{LinkEvent, ProgressReport, TestSummary};
use crate::tracker::{LinkStats, SuccessRate};

/// Inner width of the boxed reports (between the vertical borders).
pub const BOX_INNER_WIDTH: usize = 56;

const LABEL_WIDTH: usize = 20;
const VALUE_WIDTH: usize = BOX_INNER_WIDTH - LABEL_WIDTH - 2;
const CONTINUATION: &str = "             ";

/// Receiver uptime rendered as `HH:MM:SS`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Uptime(pub Duration);

impl fmt::Display for Uptime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total_secs = self.0.as_secs();
        let hours = total_secs / 3_600;
        let mins = (total_secs % 3_600) / 60;
        let secs = total_secs % 60;
        write!(f, "{hours:02}:{mins:02}:{secs:02}")
    }
}

struct Rate(Option<SuccessRate>);

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(rate) => fmt::Display::fmt(&rate, f),
            None => f.write_str("--"),
        }
    }
}

/// Renders a single [`LinkEvent`] as one or more console lines.
#[derive(Clone, Copy, Debug)]
pub struct EventFormatter<'a> {
    uptime: Uptime,
    event: &'a LinkEvent,
}

impl<'a> EventFormatter<'a> {
    #[must_use]
    pub const fn new(uptime: Duration, event: &'a LinkEvent) -> Self {
        Self {
            uptime: Uptime(uptime),
            event,
        }
    }

    /// Writes the event, each line terminated by `\n`.
    pub fn write_lines<W: Write>(&self, writer: &mut W) -> fmt::Result {
        let stamp = self.uptime;
        match self.event {
            LinkEvent::FirstPingReceived { sender, sequence } => writeln!(
                writer,
                "[{stamp}] First ping received from {sender} (seq={sequence})"
            ),
            LinkEvent::PacketsMissed {
                gap,
                from_sequence,
                to_sequence,
            } => writeln!(
                writer,
                "[{stamp}] MISSED {gap} packet(s) (seq {from_sequence} -> {to_sequence})"
            ),
            LinkEvent::SignalLost {
                silence,
                last_sequence,
            } => writeln!(
                writer,
                "[{stamp}] *** SIGNAL LOST *** No ping for {} ms (last seq={last_sequence})",
                silence.as_millis()
            ),
            LinkEvent::SignalRestored {
                silence,
                restoration_gap,
            } => {
                write!(
                    writer,
                    "[{stamp}] *** SIGNAL RESTORED *** after {} ms",
                    silence.as_millis()
                )?;
                if *restoration_gap > 0 {
                    write!(writer, " (missed {restoration_gap} packets)")?;
                }
                writer.write_char('\n')
            }
            LinkEvent::Heartbeat(stats) => {
                writeln!(writer, "[{stamp}] === HEARTBEAT === Receiver online")?;
                write_heartbeat_body(writer, stats)
            }
            LinkEvent::Progress(progress) => write_progress(writer, stamp, progress),
            LinkEvent::TestComplete(summary) => write_completion(writer, stamp, summary),
            LinkEvent::PacketRejected(reason) => writeln!(writer, "[{stamp}] WARN: {reason}"),
        }
    }
}

fn write_heartbeat_body<W: Write>(writer: &mut W, stats: &LinkStats) -> fmt::Result {
    if !stats.first_ping_received() {
        return writeln!(
            writer,
            "{CONTINUATION}Waiting for first ping from transmitter..."
        );
    }

    write_counters_line(writer, stats)?;
    if let Some(sender) = stats.sender {
        writeln!(
            writer,
            "{CONTINUATION}Transmitter: {sender} | Last seq: {}",
            stats.last_sequence
        )?;
    }
    Ok(())
}

fn write_counters_line<W: Write>(writer: &mut W, stats: &LinkStats) -> fmt::Result {
    writeln!(
        writer,
        "{CONTINUATION}Received: {} | Missed: {} | Loss events: {} | Success: {}",
        stats.total_received,
        stats.total_missed,
        stats.signal_loss_events,
        Rate(stats.success_rate())
    )
}

fn write_progress<W: Write>(
    writer: &mut W,
    stamp: Uptime,
    progress: &ProgressReport,
) -> fmt::Result {
    writeln!(
        writer,
        "[{stamp}] === PROGRESS === seq {}/{} | Received: {} | Missed: {} | Success: {}",
        progress.last_sequence,
        progress.target,
        progress.total_received,
        progress.total_missed,
        Rate(progress.success_rate)
    )
}

fn write_completion<W: Write>(
    writer: &mut W,
    stamp: Uptime,
    summary: &TestSummary,
) -> fmt::Result {
    writeln!(
        writer,
        "[{stamp}] === TEST COMPLETE === {} after {}",
        summary.reason.label(),
        Uptime(summary.elapsed)
    )?;
    write_counters_line(writer, &summary.stats)?;
    writeln!(
        writer,
        "{CONTINUATION}Last seq: {}",
        summary.stats.last_sequence
    )
}

/// Renders the boxed statistics summary printed by the `S` command.
#[derive(Clone, Copy, Debug)]
pub struct StatsFormatter<'a> {
    stats: &'a LinkStats,
    uptime: Uptime,
}

impl<'a> StatsFormatter<'a> {
    #[must_use]
    pub const fn new(stats: &'a LinkStats, uptime: Duration) -> Self {
        Self {
            stats,
            uptime: Uptime(uptime),
        }
    }

    pub fn write_box<W: Write>(&self, writer: &mut W) -> fmt::Result {
        let stats = self.stats;
        writer.write_char('\n')?;
        write_rule(writer, '╔', '╗')?;
        write_title(writer, "DIAGNOSTIC STATISTICS")?;
        write_rule(writer, '╠', '╣')?;
        write_row(writer, "Receiver uptime:", &self.uptime)?;
        write_row(writer, "Pings received:", &stats.total_received)?;
        write_row(writer, "Pings missed:", &stats.total_missed)?;
        write_row(writer, "Signal loss events:", &stats.signal_loss_events)?;
        write_row(writer, "Success rate:", &Rate(stats.success_rate()))?;
        write_rule(writer, '╠', '╣')?;

        match stats.sender {
            Some(sender) => {
                write_row(writer, "Transmitter MAC:", &sender)?;
                write_row(writer, "Last sequence:", &stats.last_sequence)?;
            }
            None => write_row(writer, "Transmitter:", &"Not yet detected")?,
        }
        write_row(writer, "Signal status:", &stats.signal.label())?;

        if let Some(test) = stats.test {
            write_row(writer, "Test status:", &test.state.label())?;
            write_row(
                writer,
                "Test progress:",
                &format_args!("{}/{}", stats.last_sequence, test.target),
            )?;
        }

        write_rule(writer, '╚', '╝')?;
        writer.write_char('\n')
    }
}

/// Renders the startup banner for the configured tracker.
#[derive(Clone, Copy, Debug)]
pub struct BannerFormatter<'a> {
    config: &'a TrackerConfig,
}

impl<'a> BannerFormatter<'a> {
    #[must_use]
    pub const fn new(config: &'a TrackerConfig) -> Self {
        Self { config }
    }

    pub fn write_banner<W: Write>(&self, writer: &mut W) -> fmt::Result {
        let config = self.config;
        let interval = EXPECTED_PING_INTERVAL.as_millis();
        let rate = 1_000 / interval.max(1);

        writer.write_char('\n')?;
        write_rule(writer, '╔', '╗')?;
        write_title(writer, "PING LINK DIAGNOSTIC RECEIVER")?;
        write_rule(writer, '╠', '╣')?;
        write_row(writer, "Mode:", &config.mode)?;
        write_row(
            writer,
            "Expected:",
            &format_args!("{rate} pings/sec ({interval}ms interval)"),
        )?;
        write_row(
            writer,
            "Signal timeout:",
            &format_args!("{} ms", config.signal_timeout.as_millis()),
        )?;
        match config.mode {
            MonitorMode::Continuous => write_row(
                writer,
                "Heartbeat:",
                &format_args!("{} ms", config.heartbeat_interval.as_millis()),
            )?,
            MonitorMode::FixedTest => {
                write_row(
                    writer,
                    "Progress every:",
                    &format_args!("{} ms", config.heartbeat_interval.as_millis()),
                )?;
                write_row(
                    writer,
                    "Test length:",
                    &format_args!("{} packets", config.test_packet_count),
                )?;
                write_row(
                    writer,
                    "Test end timeout:",
                    &format_args!("{} ms", config.test_end_timeout.as_millis()),
                )?;
            }
        }
        write_row(writer, "Commands:", &"S=stats, R=reset, H=help")?;
        write_rule(writer, '╚', '╝')?;
        writer.write_char('\n')?;
        writeln!(writer, "Waiting for first ping from transmitter...")
    }
}

/// Writes the boxed command help.
pub fn write_help<W: Write>(writer: &mut W) -> fmt::Result {
    writer.write_char('\n')?;
    write_rule(writer, '╔', '╗')?;
    write_title(writer, "SERIAL COMMANDS")?;
    write_rule(writer, '╠', '╣')?;
    for command in ALL_COMMANDS {
        let alias = if command == OperatorCommand::PrintHelp {
            "/?"
        } else {
            ""
        };
        write_line(
            writer,
            &format_args!("{}{alias} - {}", command.key(), command.description()),
        )?;
    }
    write_rule(writer, '╚', '╝')?;
    writer.write_char('\n')
}

/// Writes the acknowledgement printed after a counter reset.
pub fn write_reset_ack<W: Write>(writer: &mut W, uptime: Duration) -> fmt::Result {
    writeln!(writer, "[{}] Counters reset", Uptime(uptime))
}

fn write_rule<W: Write>(writer: &mut W, left: char, right: char) -> fmt::Result {
    writer.write_char(left)?;
    for _ in 0..BOX_INNER_WIDTH {
        writer.write_char('═')?;
    }
    writer.write_char(right)?;
    writer.write_char('\n')
}

fn write_title<W: Write>(writer: &mut W, title: &str) -> fmt::Result {
    writeln!(writer, "║{title:^BOX_INNER_WIDTH$}║")
}

fn write_line<W: Write>(writer: &mut W, text: &dyn fmt::Display) -> fmt::Result {
    let text = render_cell(text);
    writeln!(writer, "║  {:<width$}║", text.as_str(), width = BOX_INNER_WIDTH - 2)
}

fn write_row<W: Write>(writer: &mut W, label: &str, value: &dyn fmt::Display) -> fmt::Result {
    let value = render_cell(value);
    writeln!(
        writer,
        "║  {label:<LABEL_WIDTH$}{:<VALUE_WIDTH$}║",
        value.as_str()
    )
}

// Values are rendered into a bounded buffer first so `Display` impls that
// ignore width flags still line up; overlong values are truncated.
fn render_cell(value: &dyn fmt::Display) -> String<BOX_INNER_WIDTH> {
    let mut cell = String::new();
    let _ = write!(Truncating(&mut cell), "{value}");
    cell
}

struct Truncating<'a>(&'a mut String<BOX_INNER_WIDTH>);

impl Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for ch in s.chars() {
            if self.0.push(ch).is_err() {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ping::{RejectReason, SenderId};
    use crate::telemetry::CompletionReason;
    use crate::tracker::{SignalState, TestProgress, TestState};

    type Buffer = String<2048>;

    const SENDER: SenderId = SenderId::new([0x24, 0x6F, 0x28, 0x0A, 0xBC, 0x01]);

    fn stats() -> LinkStats {
        LinkStats {
            total_received: 199,
            total_missed: 1,
            signal_loss_events: 2,
            signal: SignalState::Ok,
            sender: Some(SENDER),
            last_sequence: 200,
            test: None,
        }
    }

    fn render(event: LinkEvent) -> Buffer {
        let mut out = Buffer::new();
        EventFormatter::new(Duration::from_millis(3_723_000), &event)
            .write_lines(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn uptime_is_zero_padded() {
        let mut out = Buffer::new();
        write!(out, "{}", Uptime(Duration::from_secs(59))).unwrap();
        write!(out, " {}", Uptime(Duration::from_secs(100 * 3_600 + 61))).unwrap();
        assert_eq!(out.as_str(), "00:00:59 100:01:01");
    }

    #[test]
    fn loss_and_restore_lines() {
        let lost = render(LinkEvent::SignalLost {
            silence: Duration::from_millis(3_050),
            last_sequence: 17,
        });
        assert_eq!(
            lost.as_str(),
            "[01:02:03] *** SIGNAL LOST *** No ping for 3050 ms (last seq=17)\n"
        );

        let restored = render(LinkEvent::SignalRestored {
            silence: Duration::from_millis(4_000),
            restoration_gap: 8,
        });
        assert_eq!(
            restored.as_str(),
            "[01:02:03] *** SIGNAL RESTORED *** after 4000 ms (missed 8 packets)\n"
        );

        let clean = render(LinkEvent::SignalRestored {
            silence: Duration::from_millis(4_000),
            restoration_gap: 0,
        });
        assert!(!clean.contains("missed"));
    }

    #[test]
    fn gap_and_reject_lines() {
        let gap = render(LinkEvent::PacketsMissed {
            gap: 3,
            from_sequence: 4,
            to_sequence: 8,
        });
        assert_eq!(gap.as_str(), "[01:02:03] MISSED 3 packet(s) (seq 4 -> 8)\n");

        let reject = render(LinkEvent::PacketRejected(RejectReason::SizeMismatch {
            len: 12,
        }));
        assert_eq!(
            reject.as_str(),
            "[01:02:03] WARN: Invalid message size (12 bytes, expected 9)\n"
        );
    }

    #[test]
    fn heartbeat_shows_counters_and_transmitter() {
        let out = render(LinkEvent::Heartbeat(stats()));
        let mut lines = out.lines();
        assert_eq!(
            lines.next(),
            Some("[01:02:03] === HEARTBEAT === Receiver online")
        );
        assert_eq!(
            lines.next().map(str::trim),
            Some("Received: 199 | Missed: 1 | Loss events: 2 | Success: 99.50%")
        );
        assert_eq!(
            lines.next().map(str::trim),
            Some("Transmitter: 24:6F:28:0A:BC:01 | Last seq: 200")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn heartbeat_before_first_ping_says_waiting() {
        let waiting = LinkStats {
            total_received: 0,
            total_missed: 0,
            signal_loss_events: 0,
            signal: SignalState::Waiting,
            sender: None,
            last_sequence: 0,
            test: None,
        };
        let out = render(LinkEvent::Heartbeat(waiting));
        assert!(out.contains("Waiting for first ping from transmitter..."));
        assert!(!out.contains("Received:"));
    }

    #[test]
    fn completion_summary_names_the_reason() {
        let out = render(LinkEvent::TestComplete(TestSummary {
            reason: CompletionReason::SilenceTimeout,
            elapsed: Duration::from_secs(90),
            stats: stats(),
        }));
        assert!(
            out.starts_with("[01:02:03] === TEST COMPLETE === transmitter silent after 00:01:30\n")
        );
        assert!(out.contains("Success: 99.50%"));
    }

    #[test]
    fn stats_box_rows_share_one_width() {
        let mut snapshot = stats();
        snapshot.test = Some(TestProgress {
            state: TestState::Running,
            target: 10_000,
        });

        let mut out = Buffer::new();
        StatsFormatter::new(&snapshot, Duration::from_secs(5))
            .write_box(&mut out)
            .unwrap();

        let rows: heapless::Vec<&str, 32> = out.lines().filter(|line| !line.is_empty()).collect();
        for row in &rows {
            assert_eq!(row.chars().count(), BOX_INNER_WIDTH + 2, "row `{row}`");
        }
        assert!(out.contains("Transmitter MAC:    24:6F:28:0A:BC:01"));
        assert!(out.contains("Success rate:       99.50%"));
        assert!(out.contains("Test progress:      200/10000"));
    }

    #[test]
    fn stats_box_without_data_shows_placeholders() {
        let empty = LinkStats {
            total_received: 0,
            total_missed: 0,
            signal_loss_events: 0,
            signal: SignalState::Waiting,
            sender: None,
            last_sequence: 0,
            test: None,
        };

        let mut out = Buffer::new();
        StatsFormatter::new(&empty, Duration::ZERO)
            .write_box(&mut out)
            .unwrap();
        assert!(out.contains("Not yet detected"));
        assert!(out.contains("WAITING"));
        assert!(out.contains("Success rate:       --"));
    }

    #[test]
    fn help_and_banner_render() {
        let mut out = Buffer::new();
        write_help(&mut out).unwrap();
        assert!(out.contains("S - Print statistics summary"));
        assert!(out.contains("R - Reset all counters"));
        assert!(out.contains("H/? - Print this help message"));

        let mut banner = Buffer::new();
        BannerFormatter::new(&TrackerConfig::fixed_test())
            .write_banner(&mut banner)
            .unwrap();
        assert!(banner.contains("fixed-test"));
        assert!(banner.contains("10000 packets"));
        assert!(banner.ends_with("Waiting for first ping from transmitter...\n"));
    }
}
