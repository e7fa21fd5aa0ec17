//! Ping record wire format and validation.
//!
//! A ping is a fixed 9-byte little-endian record:
//!
//! | offset | size | field              |
//! |--------|------|--------------------|
//! | 0      | 1    | marker (`0xAA`)    |
//! | 1      | 4    | sequence number    |
//! | 5      | 4    | sender uptime (ms) |
//!
//! Frames are decoded at fixed offsets so the layout never depends on the
//! host's struct packing or endianness.

use core::fmt;

/// Marker byte identifying ping records.
pub const PING_MAGIC: u8 = 0xAA;

/// Exact length of an encoded ping record.
pub const PING_RECORD_LEN: usize = 9;

const SEQUENCE_OFFSET: usize = 1;
const UPTIME_OFFSET: usize = 5;

/// Hardware identifier of the transmitting station (MAC-like).
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct SenderId(pub [u8; 6]);

impl SenderId {
    #[must_use]
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl From<[u8; 6]> for SenderId {
    fn from(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Decoded ping payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PingRecord {
    pub sequence: u32,
    /// Transmitter uptime; informational only.
    pub sender_uptime_ms: u32,
}

impl PingRecord {
    #[must_use]
    pub const fn new(sequence: u32, sender_uptime_ms: u32) -> Self {
        Self {
            sequence,
            sender_uptime_ms,
        }
    }

    /// Encodes the record using the fixed wire layout.
    #[must_use]
    pub fn encode(&self) -> [u8; PING_RECORD_LEN] {
        let mut frame = [0u8; PING_RECORD_LEN];
        frame[0] = PING_MAGIC;
        frame[SEQUENCE_OFFSET..UPTIME_OFFSET].copy_from_slice(&self.sequence.to_le_bytes());
        frame[UPTIME_OFFSET..PING_RECORD_LEN]
            .copy_from_slice(&self.sender_uptime_ms.to_le_bytes());
        frame
    }
}

/// Reason a frame was refused before reaching the tracker.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RejectReason {
    /// Frame length differs from [`PING_RECORD_LEN`].
    SizeMismatch { len: usize },
    /// First byte is not [`PING_MAGIC`].
    BadMarker { found: u8 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::SizeMismatch { len } => write!(
                f,
                "Invalid message size ({len} bytes, expected {PING_RECORD_LEN})"
            ),
            RejectReason::BadMarker { found } => write!(
                f,
                "Invalid magic byte (0x{found:02X}, expected 0x{PING_MAGIC:02X})"
            ),
        }
    }
}

/// Validates and decodes a raw frame.
///
/// # Errors
///
/// Returns [`RejectReason::SizeMismatch`] when the frame is not exactly
/// [`PING_RECORD_LEN`] bytes, or [`RejectReason::BadMarker`] when the first
/// byte is not [`PING_MAGIC`].
pub fn validate(frame: &[u8]) -> Result<PingRecord, RejectReason> {
    let record: &[u8; PING_RECORD_LEN] = frame
        .try_into()
        .map_err(|_| RejectReason::SizeMismatch { len: frame.len() })?;

    if record[0] != PING_MAGIC {
        return Err(RejectReason::BadMarker { found: record[0] });
    }

    Ok(PingRecord {
        sequence: read_u32(record, SEQUENCE_OFFSET),
        sender_uptime_ms: read_u32(record, UPTIME_OFFSET),
    })
}

fn read_u32(record: &[u8; PING_RECORD_LEN], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&record[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}
