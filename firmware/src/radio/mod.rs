//! Radio modem framing and the bounded queue feeding the monitor task.
//!
//! The modem hands every received datagram to the MCU over UART wrapped in a
//! small envelope:
//!
//! ```text
//! [0x7E][len][sender: 6 bytes][payload: len bytes]
//! ```
//!
//! [`FrameAssembler`] reassembles envelopes one byte at a time and resyncs on
//! the next start byte after any malformed header. The payload is passed to the
//! tracker untouched; ping validation happens there.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use embassy_sync::channel::{Channel, Receiver, Sender};
use heapless::Vec;
use link_core::ping::SenderId;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;

#[cfg(target_os = "none")]
type RadioMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type RadioMutex = NoopRawMutex;

/// First byte of every modem envelope.
pub const ENVELOPE_START: u8 = 0x7E;

/// Largest payload the modem forwards in a single envelope.
pub const MAX_RADIO_PAYLOAD: usize = 32;

const SENDER_LEN: usize = 6;

/// Depth of the radio-to-monitor channel.
pub const RADIO_QUEUE_DEPTH: usize = 8;

/// Datagram received over the air.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RadioFrame {
    pub sender: SenderId,
    pub payload: Vec<u8, MAX_RADIO_PAYLOAD>,
}

/// Channel carrying frames from the radio task to the monitor task.
pub type RadioChannel = Channel<RadioMutex, RadioFrame, RADIO_QUEUE_DEPTH>;

pub type RadioSender<'a> = Sender<'a, RadioMutex, RadioFrame, RADIO_QUEUE_DEPTH>;

pub type RadioReceiver<'a> = Receiver<'a, RadioMutex, RadioFrame, RADIO_QUEUE_DEPTH>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum AssemblerState {
    Idle,
    Length,
    Sender { filled: usize },
    Payload { filled: usize },
}

/// Byte-at-a-time envelope decoder.
#[derive(Debug)]
pub struct FrameAssembler {
    state: AssemblerState,
    expected_len: usize,
    sender: [u8; SENDER_LEN],
    payload: Vec<u8, MAX_RADIO_PAYLOAD>,
    oversized: u32,
}

impl FrameAssembler {
    pub const fn new() -> Self {
        Self {
            state: AssemblerState::Idle,
            expected_len: 0,
            sender: [0; SENDER_LEN],
            payload: Vec::new(),
            oversized: 0,
        }
    }

    /// Envelopes discarded because their length exceeded [`MAX_RADIO_PAYLOAD`].
    pub fn oversized(&self) -> u32 {
        self.oversized
    }

    /// Feeds one byte; returns a frame when an envelope completes.
    pub fn push(&mut self, byte: u8) -> Option<RadioFrame> {
        match self.state {
            AssemblerState::Idle => {
                if byte == ENVELOPE_START {
                    self.state = AssemblerState::Length;
                }
                None
            }
            AssemblerState::Length => {
                let len = usize::from(byte);
                if len > MAX_RADIO_PAYLOAD {
                    self.oversized = self.oversized.wrapping_add(1);
                    self.state = AssemblerState::Idle;
                } else {
                    self.expected_len = len;
                    self.payload.clear();
                    self.state = AssemblerState::Sender { filled: 0 };
                }
                None
            }
            AssemblerState::Sender { filled } => {
                self.sender[filled] = byte;
                let filled = filled + 1;
                if filled < SENDER_LEN {
                    self.state = AssemblerState::Sender { filled };
                    None
                } else if self.expected_len == 0 {
                    self.finish()
                } else {
                    self.state = AssemblerState::Payload { filled: 0 };
                    None
                }
            }
            AssemblerState::Payload { filled } => {
                // Capacity is guaranteed by the length check above.
                let _ = self.payload.push(byte);
                let filled = filled + 1;
                if filled < self.expected_len {
                    self.state = AssemblerState::Payload { filled };
                    None
                } else {
                    self.finish()
                }
            }
        }
    }

    fn finish(&mut self) -> Option<RadioFrame> {
        self.state = AssemblerState::Idle;
        Some(RadioFrame {
            sender: SenderId::new(self.sender),
            payload: core::mem::take(&mut self.payload),
        })
    }
}

impl Default for FrameAssembler {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the radio channel and hands out both halves.
pub struct RadioQueue {
    channel: RadioChannel,
}

impl RadioQueue {
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    pub fn sender(&self) -> RadioSender<'_> {
        self.channel.sender()
    }

    pub fn receiver(&self) -> RadioReceiver<'_> {
        self.channel.receiver()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use link_core::ping::PingRecord;

    const SENDER: [u8; 6] = [0x24, 0x6F, 0x28, 0x0A, 0xBC, 0x01];

    fn envelope(payload: &[u8]) -> Vec<u8, 64> {
        let mut bytes = Vec::new();
        bytes.push(ENVELOPE_START).unwrap();
        bytes.push(u8::try_from(payload.len()).unwrap()).unwrap();
        bytes.extend_from_slice(&SENDER).unwrap();
        bytes.extend_from_slice(payload).unwrap();
        bytes
    }

    fn feed(assembler: &mut FrameAssembler, bytes: &[u8]) -> Vec<RadioFrame, 4> {
        let mut frames = Vec::new();
        for byte in bytes {
            if let Some(frame) = assembler.push(*byte) {
                frames.push(frame).unwrap();
            }
        }
        frames
    }

    #[test]
    fn decodes_ping_envelope() {
        let ping = PingRecord::new(42, 1_000).encode();
        let mut assembler = FrameAssembler::new();

        let frames = feed(&mut assembler, &envelope(&ping));

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].sender, SenderId::new(SENDER));
        assert_eq!(frames[0].payload.as_slice(), &ping);
    }

    #[test]
    fn skips_noise_between_envelopes() {
        let mut assembler = FrameAssembler::new();
        let mut stream: Vec<u8, 64> = Vec::new();
        stream.extend_from_slice(&[0x00, 0x13, 0x37]).unwrap();
        stream.extend_from_slice(&envelope(&[0xAA, 1])).unwrap();
        stream.push(0xFF).unwrap();
        stream.extend_from_slice(&envelope(&[])).unwrap();

        let frames = feed(&mut assembler, &stream);

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].payload.as_slice(), &[0xAA, 1]);
        assert!(frames[1].payload.is_empty());
    }

    #[test]
    fn oversized_length_resyncs() {
        let mut assembler = FrameAssembler::new();
        let mut stream: Vec<u8, 64> = Vec::new();
        stream.extend_from_slice(&[ENVELOPE_START, 200]).unwrap();
        stream.extend_from_slice(&envelope(&[0xAA])).unwrap();

        let frames = feed(&mut assembler, &stream);

        assert_eq!(assembler.oversized(), 1);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload.as_slice(), &[0xAA]);
    }
}
