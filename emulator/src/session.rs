use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use link_core::clock::{ClockSource, Millis};
use link_core::config::TrackerConfig;
use link_core::ping::SenderId;
use link_core::repl::commands::{CommandExecutor, CommandOutcome};
use link_core::repl::status::{
    BannerFormatter, EventFormatter, StatsFormatter, write_help, write_reset_ack,
};
use link_core::scenario::{self, ScenarioError, ScenarioStep};
use link_core::telemetry::{LinkEvent, LinkReporter, TelemetryRecorder};
use link_core::tracker::{FrameOutcome, LinkTracker};

use crate::transmitter::{Transmitter, VirtualClock};

/// Period of the receiver's housekeeping tick.
pub const TICK_INTERVAL: Duration = Duration::from_millis(100);

const HEALTHY_SCRIPT: &str = "\
# steady 10 Hz link with a couple of short gaps
send 50
drop 3
send 40
drop 1
send 30
key s
";

const OUTAGE_SCRIPT: &str = "\
# link drops for several seconds, then comes back
send 30
key s
drop 40
send 20
raw aa0102
raw 55000000000000000000
key s
key r
send 10
key s
";

const FIXED_TEST_SCRIPT: &str = "\
# 200-packet run with losses, then trailing pings after completion
send 60
drop 5
send 100
drop 10
send 40
key s
";

/// Built-in scenarios replayed by the transcript capture tool.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Healthy,
    Outage,
    FixedTest,
}

impl TranscriptProfile {
    pub const ALL: [TranscriptProfile; 3] = [
        TranscriptProfile::Healthy,
        TranscriptProfile::Outage,
        TranscriptProfile::FixedTest,
    ];

    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Healthy => "evidence/emulator-healthy.log",
            TranscriptProfile::Outage => "evidence/emulator-outage.log",
            TranscriptProfile::FixedTest => "evidence/emulator-fixed-test.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Healthy => "Ping link emulator healthy-link transcript",
            TranscriptProfile::Outage => "Ping link emulator signal-outage transcript",
            TranscriptProfile::FixedTest => "Ping link emulator fixed-test transcript",
        }
    }

    pub fn script(self) -> &'static str {
        match self {
            TranscriptProfile::Healthy => HEALTHY_SCRIPT,
            TranscriptProfile::Outage => OUTAGE_SCRIPT,
            TranscriptProfile::FixedTest => FIXED_TEST_SCRIPT,
        }
    }

    pub fn config(self) -> TrackerConfig {
        match self {
            TranscriptProfile::Healthy => {
                TrackerConfig::continuous().with_heartbeat_interval(Duration::from_secs(5))
            }
            TranscriptProfile::Outage => {
                TrackerConfig::continuous().with_heartbeat_interval(Duration::from_secs(10))
            }
            TranscriptProfile::FixedTest => TrackerConfig::fixed_test()
                .with_test_packet_count(200)
                .with_heartbeat_interval(Duration::from_secs(5)),
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        Self::ALL
            .into_iter()
            .find(|profile| profile.tag().eq_ignore_ascii_case(tag))
            .ok_or_else(|| format!("Unknown transcript profile `{tag}`"))
    }

    fn tag(self) -> &'static str {
        match self {
            TranscriptProfile::Healthy => "healthy",
            TranscriptProfile::Outage => "outage",
            TranscriptProfile::FixedTest => "fixed-test",
        }
    }
}

/// Reporter that renders events into console lines.
#[derive(Default)]
struct ConsoleReporter {
    pending: Vec<String>,
}

impl ConsoleReporter {
    fn push_rendered(&mut self, rendered: &str) {
        self.pending
            .extend(rendered.lines().map(str::to_owned));
    }

    fn drain(&mut self) -> Vec<String> {
        std::mem::take(&mut self.pending)
    }
}

impl LinkReporter<Millis> for ConsoleReporter {
    fn report(&mut self, timestamp: Millis, event: LinkEvent) {
        let mut rendered = String::new();
        // Writing into a `String` cannot fail.
        let _ = EventFormatter::new(timestamp.since_epoch(), &event).write_lines(&mut rendered);
        self.push_rendered(&rendered);
    }
}

/// One receiver plus its console, driven by either a virtual or a wall clock.
pub struct Session<C> {
    executor: CommandExecutor<LinkTracker<Millis>>,
    console: ConsoleReporter,
    telemetry: TelemetryRecorder<Millis>,
    transcript: TranscriptLogger,
    clock: C,
    next_tick: Millis,
    rejected_frames: u32,
}

impl<C> Session<C>
where
    C: ClockSource<Instant = Millis>,
{
    pub fn new(config: TrackerConfig, clock: C, transcript: TranscriptLogger) -> Self {
        let started_at = clock.now();
        Self {
            executor: CommandExecutor::new(LinkTracker::new(config, started_at)),
            console: ConsoleReporter::default(),
            telemetry: TelemetryRecorder::new(),
            transcript,
            clock,
            next_tick: started_at + TICK_INTERVAL,
            rejected_frames: 0,
        }
    }

    pub fn tracker(&self) -> &LinkTracker<Millis> {
        self.executor.counters()
    }

    pub fn telemetry(&self) -> &TelemetryRecorder<Millis> {
        &self.telemetry
    }

    /// Frames that failed validation, whether or not they were reported.
    pub fn rejected_frames(&self) -> u32 {
        self.rejected_frames
    }

    pub fn banner(&mut self) -> io::Result<Vec<String>> {
        let mut rendered = String::new();
        let _ = BannerFormatter::new(self.tracker().config()).write_banner(&mut rendered);
        self.console.push_rendered(&rendered);
        self.flush_console()
    }

    /// Hands a received frame to the tracker at the current clock reading.
    pub fn deliver(&mut self, sender: SenderId, frame: &[u8]) -> io::Result<Vec<String>> {
        let now = self.clock.now();
        let outcome = self.executor.counters_mut().on_frame(
            sender,
            frame,
            now,
            &mut (&mut self.console, &mut self.telemetry),
        );
        if matches!(outcome, FrameOutcome::Rejected(_)) {
            self.rejected_frames = self.rejected_frames.saturating_add(1);
        }
        self.flush_console()
    }

    /// Runs every tick that is due at the current clock reading.
    pub fn poll_ticks(&mut self) -> io::Result<Vec<String>> {
        let now = self.clock.now();
        while self.next_tick <= now {
            let at = self.next_tick;
            self.executor
                .counters_mut()
                .on_tick(at, &mut (&mut self.console, &mut self.telemetry));
            self.next_tick = at + TICK_INTERVAL;
        }
        self.flush_console()
    }

    /// Applies an operator keystroke; unrecognized keys produce no output.
    pub fn press_key(&mut self, key: char) -> io::Result<Vec<String>> {
        let uptime = self.clock.now().since_epoch();
        self.transcript
            .append_line(uptime, TranscriptRole::Operator, &format!("key {key}"))?;

        let mut rendered = String::new();
        match self.executor.execute_key(key) {
            Some(CommandOutcome::Stats(stats)) => {
                let _ = StatsFormatter::new(&stats, uptime).write_box(&mut rendered);
            }
            Some(CommandOutcome::CountersReset { .. }) => {
                let _ = write_reset_ack(&mut rendered, uptime);
            }
            Some(CommandOutcome::Help) => {
                let _ = write_help(&mut rendered);
            }
            None => {}
        }
        self.console.push_rendered(&rendered);
        self.flush_console()
    }

    /// One-line wrap-up written when the session ends.
    pub fn summary(&mut self) -> io::Result<Vec<String>> {
        let stats = self.tracker().stats();
        let mut line = String::new();
        let _ = write!(
            line,
            "Session ended: received={} missed={} loss-events={} rejected={} events={}",
            stats.total_received,
            stats.total_missed,
            stats.signal_loss_events,
            self.rejected_frames,
            self.telemetry.total_recorded()
        );
        self.console.pending.push(line);
        self.flush_console()
    }

    fn flush_console(&mut self) -> io::Result<Vec<String>> {
        let lines = self.console.drain();
        let uptime = self.clock.now().since_epoch();
        for line in &lines {
            self.transcript
                .append_line(uptime, TranscriptRole::Receiver, line)?;
        }
        Ok(lines)
    }
}

impl Session<VirtualClock> {
    /// Replays a scenario script on the virtual clock.
    pub fn run_script(
        &mut self,
        script: &str,
        transmitter: &mut Transmitter,
    ) -> io::Result<Result<Vec<String>, ScenarioError>> {
        let mut output = self.banner()?;
        for step in scenario::steps(script) {
            match step {
                Ok(step) => output.extend(self.run_step(&step, transmitter)?),
                Err(err) => return Ok(Err(err)),
            }
        }
        output.extend(self.summary()?);
        Ok(Ok(output))
    }

    /// Executes one scenario step; time only moves forward here.
    pub fn run_step(
        &mut self,
        step: &ScenarioStep,
        transmitter: &mut Transmitter,
    ) -> io::Result<Vec<String>> {
        let uptime = self.clock.now().since_epoch();
        self.transcript
            .append_line(uptime, TranscriptRole::Script, &describe_step(step))?;

        let mut output = Vec::new();
        match step {
            ScenarioStep::Send(count) => {
                for _ in 0..*count {
                    let now = self.clock.now();
                    if let Some(frame) = transmitter.transmit(now) {
                        output.extend(self.deliver(transmitter.sender(), &frame)?);
                    }
                    output.extend(self.advance(transmitter.interval())?);
                }
            }
            ScenarioStep::Drop(count) => {
                for _ in 0..*count {
                    transmitter.skip(1);
                    output.extend(self.advance(transmitter.interval())?);
                }
            }
            ScenarioStep::Wait(duration) => output.extend(self.advance(*duration)?),
            ScenarioStep::Interval(interval) => transmitter.set_interval(*interval),
            ScenarioStep::Sender(sender) => transmitter.set_sender(*sender),
            ScenarioStep::Ping(sequence) => {
                let frame = transmitter.frame_for(*sequence, self.clock.now());
                output.extend(self.deliver(transmitter.sender(), &frame)?);
            }
            ScenarioStep::Raw(bytes) => {
                output.extend(self.deliver(transmitter.sender(), bytes)?);
            }
            ScenarioStep::Key(key) => output.extend(self.press_key(*key)?),
        }
        Ok(output)
    }

    fn advance(&mut self, duration: Duration) -> io::Result<Vec<String>> {
        let target = self.clock.now() + duration;
        let mut output = Vec::new();
        while self.next_tick <= target {
            self.clock.advance_to(self.next_tick);
            output.extend(self.poll_ticks()?);
        }
        self.clock.advance_to(target);
        Ok(output)
    }
}

fn describe_step(step: &ScenarioStep) -> String {
    match step {
        ScenarioStep::Send(count) => format!("send {count}"),
        ScenarioStep::Drop(count) => format!("drop {count}"),
        ScenarioStep::Wait(duration) => format!("wait {}ms", duration.as_millis()),
        ScenarioStep::Interval(interval) => format!("interval {}ms", interval.as_millis()),
        ScenarioStep::Sender(sender) => format!("sender {sender}"),
        ScenarioStep::Ping(sequence) => format!("ping {sequence}"),
        ScenarioStep::Raw(bytes) => {
            let mut line = String::from("raw ");
            for byte in bytes {
                let _ = write!(line, "{byte:02x}");
            }
            line
        }
        ScenarioStep::Key(key) => format!("key {key}"),
    }
}

/// Mirrors the session into a timestamped log file.
pub struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    pub fn create(path: &Path, header: &str) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        let mut logger = Self {
            writer: BufWriter::new(file),
        };

        logger.write_header(header)?;
        Ok(logger)
    }

    pub fn for_profile(profile: TranscriptProfile) -> io::Result<Self> {
        Self::create(&PathBuf::from(profile.log_path()), profile.header())
    }

    fn write_header(&mut self, header: &str) -> io::Result<()> {
        writeln!(self.writer, "# {header}")?;
        writeln!(
            self.writer,
            "# Timestamps are milliseconds since receiver start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(
        &mut self,
        elapsed: Duration,
        role: TranscriptRole,
        line: &str,
    ) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>8} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Script,
    Operator,
    Receiver,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Script => "TX  >",
            TranscriptRole::Operator => "KEY >",
            TranscriptRole::Receiver => "RX  <",
        }
    }
}
