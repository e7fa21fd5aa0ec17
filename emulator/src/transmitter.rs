use std::time::Duration;

use link_core::clock::{ClockSource, Millis, MonotonicInstant};
use link_core::config::EXPECTED_PING_INTERVAL;
use link_core::ping::{PING_RECORD_LEN, PingRecord, SenderId};

/// Identity the simulated transmitter starts with.
pub const DEFAULT_SENDER: SenderId = SenderId::new([0x24, 0x6F, 0x28, 0x0A, 0xBC, 0x01]);

/// Simulated ping transmitter: numbers packets and stamps its own uptime.
#[derive(Clone, Debug)]
pub struct Transmitter {
    sender: SenderId,
    next_sequence: u32,
    interval: Duration,
    booted_at: Millis,
    drop_every: Option<u32>,
}

impl Transmitter {
    pub fn new(booted_at: Millis) -> Self {
        Self {
            sender: DEFAULT_SENDER,
            next_sequence: 1,
            interval: EXPECTED_PING_INTERVAL,
            booted_at,
            drop_every: None,
        }
    }

    /// Loses every `period`-th packet on the air (live mode).
    pub fn with_drop_every(mut self, period: Option<u32>) -> Self {
        self.drop_every = period.filter(|period| *period > 0);
        self
    }

    pub fn sender(&self) -> SenderId {
        self.sender
    }

    pub fn set_sender(&mut self, sender: SenderId) {
        self.sender = sender;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval.max(Duration::from_millis(1));
    }

    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    /// Burns `count` sequence numbers without emitting anything.
    pub fn skip(&mut self, count: u32) {
        self.next_sequence = self.next_sequence.wrapping_add(count);
    }

    /// Produces the next frame, or `None` when the drop pattern eats it.
    pub fn transmit(&mut self, now: Millis) -> Option<[u8; PING_RECORD_LEN]> {
        let sequence = self.next_sequence;
        self.next_sequence = self.next_sequence.wrapping_add(1);

        if self
            .drop_every
            .is_some_and(|period| sequence % period == 0)
        {
            return None;
        }

        Some(self.frame_for(sequence, now))
    }

    /// Encodes a ping with an explicit sequence number.
    pub fn frame_for(&self, sequence: u32, now: Millis) -> [u8; PING_RECORD_LEN] {
        let uptime = now.saturating_duration_since(self.booted_at).as_millis();
        PingRecord::new(sequence, u32::try_from(uptime).unwrap_or(u32::MAX)).encode()
    }
}

/// Virtual clock advanced explicitly by scripted sessions.
#[derive(Copy, Clone, Debug, Default)]
pub struct VirtualClock {
    now: Millis,
}

impl VirtualClock {
    pub fn advance_to(&mut self, instant: Millis) {
        self.now = self.now.max(instant);
    }
}

impl ClockSource for VirtualClock {
    type Instant = Millis;

    fn now(&self) -> Millis {
        self.now
    }
}

/// Wall clock measured from emulator start.
#[derive(Copy, Clone, Debug)]
pub struct WallClock {
    started: std::time::Instant,
}

impl WallClock {
    pub fn start() -> Self {
        Self {
            started: std::time::Instant::now(),
        }
    }
}

impl ClockSource for WallClock {
    type Instant = Millis;

    fn now(&self) -> Millis {
        let elapsed = self.started.elapsed().as_millis();
        Millis::from_millis(u64::try_from(elapsed).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use link_core::ping;

    #[test]
    fn frames_are_numbered_from_one() {
        let mut transmitter = Transmitter::new(Millis::ZERO);
        let first = transmitter.transmit(Millis::from_millis(250)).unwrap();
        let record = ping::validate(&first).unwrap();

        assert_eq!(record.sequence, 1);
        assert_eq!(record.sender_uptime_ms, 250);
        assert_eq!(transmitter.next_sequence(), 2);
    }

    #[test]
    fn drop_pattern_still_advances_sequence() {
        let mut transmitter = Transmitter::new(Millis::ZERO).with_drop_every(Some(3));
        let delivered: Vec<bool> = (0..6)
            .map(|_| transmitter.transmit(Millis::ZERO).is_some())
            .collect();

        assert_eq!(delivered, [true, true, false, true, true, false]);
        assert_eq!(transmitter.next_sequence(), 7);
    }
}
