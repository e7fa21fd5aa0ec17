//! Single-key command dispatcher.
//!
//! The console reads one character at a time. Recognized keys map onto an
//! [`OperatorCommand`], which [`CommandExecutor`] applies to anything that
//! implements [`CounterControl`]. Unrecognized keys are ignored.

use crate::clock::MonotonicInstant;
use crate::tracker::{LinkStats, LinkTracker};

/// Actions available from the operator console.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OperatorCommand {
    PrintStats,
    ResetCounters,
    PrintHelp,
}

/// Every command in help order.
pub const ALL_COMMANDS: [OperatorCommand; 3] = [
    OperatorCommand::PrintStats,
    OperatorCommand::ResetCounters,
    OperatorCommand::PrintHelp,
];

impl OperatorCommand {
    /// Maps a keystroke (case-insensitive) to a command.
    #[must_use]
    pub const fn from_key(key: char) -> Option<Self> {
        match key.to_ascii_uppercase() {
            'S' => Some(OperatorCommand::PrintStats),
            'R' => Some(OperatorCommand::ResetCounters),
            'H' | '?' => Some(OperatorCommand::PrintHelp),
            _ => None,
        }
    }

    /// Raw-byte variant of [`Self::from_key`] for byte-oriented consoles.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        if byte.is_ascii() {
            Self::from_key(byte as char)
        } else {
            None
        }
    }

    /// Primary key shown in help output.
    #[must_use]
    pub const fn key(self) -> char {
        match self {
            OperatorCommand::PrintStats => 'S',
            OperatorCommand::ResetCounters => 'R',
            OperatorCommand::PrintHelp => 'H',
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            OperatorCommand::PrintStats => "Print statistics summary",
            OperatorCommand::ResetCounters => "Reset all counters",
            OperatorCommand::PrintHelp => "Print this help message",
        }
    }
}

/// Surface the dispatcher needs from a tracker.
pub trait CounterControl {
    /// Returns the current counters without mutating anything.
    fn snapshot(&self) -> LinkStats;

    /// Zeroes the volatile counters.
    fn reset_counters(&mut self);
}

impl<TInstant> CounterControl for LinkTracker<TInstant>
where
    TInstant: MonotonicInstant,
{
    fn snapshot(&self) -> LinkStats {
        self.stats()
    }

    fn reset_counters(&mut self) {
        self.reset();
    }
}

/// Result of a dispatched command, ready for rendering.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandOutcome {
    Stats(LinkStats),
    CountersReset { before: LinkStats, after: LinkStats },
    Help,
}

/// Dispatches console commands into the tracker.
pub struct CommandExecutor<C> {
    counters: C,
}

impl<C> CommandExecutor<C> {
    /// Creates a new executor around the provided tracker.
    pub const fn new(counters: C) -> Self {
        Self { counters }
    }

    /// Returns an immutable reference to the underlying tracker.
    pub fn counters(&self) -> &C {
        &self.counters
    }

    /// Returns a mutable reference to the underlying tracker.
    pub fn counters_mut(&mut self) -> &mut C {
        &mut self.counters
    }

    /// Consumes the executor and yields the inner tracker.
    pub fn into_inner(self) -> C {
        self.counters
    }
}

impl<C> CommandExecutor<C>
where
    C: CounterControl,
{
    /// Parses and executes a keystroke; returns `None` for unrecognized keys.
    pub fn execute_key(&mut self, key: char) -> Option<CommandOutcome> {
        OperatorCommand::from_key(key).map(|command| self.execute(command))
    }

    /// Executes an already parsed command.
    pub fn execute(&mut self, command: OperatorCommand) -> CommandOutcome {
        match command {
            OperatorCommand::PrintStats => CommandOutcome::Stats(self.counters.snapshot()),
            OperatorCommand::ResetCounters => {
                let before = self.counters.snapshot();
                self.counters.reset_counters();
                CommandOutcome::CountersReset {
                    before,
                    after: self.counters.snapshot(),
                }
            }
            OperatorCommand::PrintHelp => CommandOutcome::Help,
        }
    }
}
