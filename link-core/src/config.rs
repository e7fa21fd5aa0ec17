//! Tracker thresholds and operating mode.

use core::fmt;
use core::time::Duration;

/// Silence duration before the link is declared lost.
pub const DEFAULT_SIGNAL_TIMEOUT: Duration = Duration::from_millis(3_000);
/// Cadence of periodic heartbeat/progress reports.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_millis(60_000);
/// Sequence value that ends a fixed-length test run.
pub const DEFAULT_TEST_PACKET_COUNT: u32 = 10_000;
/// Silence duration that force-ends a fixed-length test run.
pub const DEFAULT_TEST_END_TIMEOUT: Duration = Duration::from_millis(10_000);
/// Expected transmitter period; informational, shown in the banner.
pub const EXPECTED_PING_INTERVAL: Duration = Duration::from_millis(100);

/// Selects gap-event verbosity and completion behavior.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum MonitorMode {
    /// Long-running monitoring; every gap is reported.
    #[default]
    Continuous,
    /// Counts a fixed number of pings, then freezes.
    FixedTest,
}

impl MonitorMode {
    #[must_use]
    pub const fn is_fixed_test(self) -> bool {
        matches!(self, MonitorMode::FixedTest)
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            MonitorMode::Continuous => "continuous",
            MonitorMode::FixedTest => "fixed-test",
        }
    }

    /// Parses a mode tag (`continuous`/`monitor`, `test`/`fixed-test`), ignoring case.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        if tag.eq_ignore_ascii_case("continuous") || tag.eq_ignore_ascii_case("monitor") {
            Some(MonitorMode::Continuous)
        } else if tag.eq_ignore_ascii_case("test") || tag.eq_ignore_ascii_case("fixed-test") {
            Some(MonitorMode::FixedTest)
        } else {
            None
        }
    }
}

impl fmt::Display for MonitorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Thresholds read once when the tracker is constructed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TrackerConfig {
    pub mode: MonitorMode,
    pub signal_timeout: Duration,
    pub heartbeat_interval: Duration,
    /// Only consulted in [`MonitorMode::FixedTest`].
    pub test_packet_count: u32,
    /// Only consulted in [`MonitorMode::FixedTest`].
    pub test_end_timeout: Duration,
    /// Emit `PacketRejected` events for malformed frames.
    pub report_rejects: bool,
}

impl TrackerConfig {
    /// Defaults for continuous monitoring.
    #[must_use]
    pub const fn continuous() -> Self {
        Self {
            mode: MonitorMode::Continuous,
            signal_timeout: DEFAULT_SIGNAL_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            test_packet_count: DEFAULT_TEST_PACKET_COUNT,
            test_end_timeout: DEFAULT_TEST_END_TIMEOUT,
            report_rejects: true,
        }
    }

    /// Defaults for a fixed-length test run; malformed frames are dropped silently.
    #[must_use]
    pub const fn fixed_test() -> Self {
        Self {
            mode: MonitorMode::FixedTest,
            report_rejects: false,
            ..Self::continuous()
        }
    }

    /// Defaults for the given mode.
    #[must_use]
    pub const fn for_mode(mode: MonitorMode) -> Self {
        match mode {
            MonitorMode::Continuous => Self::continuous(),
            MonitorMode::FixedTest => Self::fixed_test(),
        }
    }

    #[must_use]
    pub const fn with_signal_timeout(mut self, timeout: Duration) -> Self {
        self.signal_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_test_packet_count(mut self, count: u32) -> Self {
        self.test_packet_count = count;
        self
    }

    #[must_use]
    pub const fn with_test_end_timeout(mut self, timeout: Duration) -> Self {
        self.test_end_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_report_rejects(mut self, report: bool) -> Self {
        self.report_rejects = report;
        self
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::continuous()
    }
}
