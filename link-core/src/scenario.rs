//! Line-oriented grammar for scripted transmitter scenarios.
//!
//! Each non-empty line is one step:
//!
//! ```text
//! send 50          # deliver 50 consecutive pings at the current interval
//! drop 8           # skip eight sequence numbers without delivering them
//! wait 3500ms      # let time pass (ticks keep running)
//! interval 100ms   # change the transmit period
//! sender 24:6F:28:0A:BC:01
//! ping 42          # one ping with an explicit sequence number
//! raw aa0102       # arbitrary (usually malformed) frame bytes
//! key s            # operator keystroke
//! ```
//!
//! Keywords are case-insensitive, durations take an `ms` (default) or `s`
//! suffix, and everything after `#` is ignored.

use core::fmt;
use core::time::Duration;

use heapless::Vec;
use winnow::ascii::{Caseless, dec_uint, space0, space1};
use winnow::combinator::{alt, cut_err, opt, preceded};
use winnow::prelude::*;
use winnow::token::{any, rest, take_while};

use crate::ping::SenderId;

/// Largest frame a `raw` step may carry.
pub const MAX_RAW_FRAME: usize = 32;

/// One parsed scenario instruction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ScenarioStep {
    Send(u32),
    Drop(u32),
    Wait(Duration),
    Interval(Duration),
    Sender(SenderId),
    Ping(u32),
    Raw(Vec<u8, MAX_RAW_FRAME>),
    Key(char),
}

/// Parse failure with its position in the script.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ScenarioError {
    /// One-based line number.
    pub line: usize,
    /// Byte offset into the line where parsing stopped.
    pub offset: usize,
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}: unrecognized scenario step at byte {}",
            self.line, self.offset
        )
    }
}

/// Parses a single line; blank and comment-only lines yield `Ok(None)`.
///
/// The returned error carries `line: 0`; [`steps`] fills in line numbers.
pub fn parse_line(line: &str) -> Result<Option<ScenarioStep>, ScenarioError> {
    script_line
        .parse(line)
        .map_err(|err| ScenarioError {
            line: 0,
            offset: err.offset(),
        })
}

/// Iterates over the steps of a whole script, skipping blank lines.
pub fn steps(script: &str) -> impl Iterator<Item = Result<ScenarioStep, ScenarioError>> + '_ {
    script
        .lines()
        .enumerate()
        .filter_map(|(index, line)| match parse_line(line) {
            Ok(step) => step.map(Ok),
            Err(err) => Some(Err(ScenarioError {
                line: index + 1,
                ..err
            })),
        })
}

fn script_line(input: &mut &str) -> ModalResult<Option<ScenarioStep>> {
    space0.parse_next(input)?;
    let step = opt(step).parse_next(input)?;
    space0.parse_next(input)?;
    opt(('#', rest)).parse_next(input)?;
    Ok(step)
}

fn step(input: &mut &str) -> ModalResult<ScenarioStep> {
    alt((
        preceded((Caseless("send"), space1), cut_err(count)).map(ScenarioStep::Send),
        preceded((Caseless("drop"), space1), cut_err(count)).map(ScenarioStep::Drop),
        preceded((Caseless("wait"), space1), cut_err(duration)).map(ScenarioStep::Wait),
        preceded((Caseless("interval"), space1), cut_err(duration))
            .map(ScenarioStep::Interval),
        preceded((Caseless("sender"), space1), cut_err(mac)).map(ScenarioStep::Sender),
        preceded((Caseless("ping"), space1), cut_err(count)).map(ScenarioStep::Ping),
        preceded((Caseless("raw"), space1), cut_err(hex_frame)).map(ScenarioStep::Raw),
        preceded((Caseless("key"), space1), cut_err(any)).map(ScenarioStep::Key),
    ))
    .parse_next(input)
}

fn count(input: &mut &str) -> ModalResult<u32> {
    dec_uint.parse_next(input)
}

fn duration(input: &mut &str) -> ModalResult<Duration> {
    let value: u64 = dec_uint.parse_next(input)?;
    let scale = opt(alt((Caseless("ms").value(1_u64), Caseless("s").value(1_000_u64))))
        .parse_next(input)?
        .unwrap_or(1);
    Ok(Duration::from_millis(value.saturating_mul(scale)))
}

fn mac(input: &mut &str) -> ModalResult<SenderId> {
    take_while(17..=17, |c: char| c.is_ascii_hexdigit() || c == ':')
        .verify_map(decode_mac)
        .parse_next(input)
}

fn hex_frame(input: &mut &str) -> ModalResult<Vec<u8, MAX_RAW_FRAME>> {
    take_while(2..=MAX_RAW_FRAME * 2, |c: char| c.is_ascii_hexdigit())
        .verify_map(decode_hex)
        .parse_next(input)
}

fn decode_mac(text: &str) -> Option<SenderId> {
    let mut octets = [0_u8; 6];
    let mut parts = text.split(':');
    for octet in &mut octets {
        let part = parts.next()?;
        if part.len() != 2 {
            return None;
        }
        *octet = u8::from_str_radix(part, 16).ok()?;
    }
    parts.next().is_none().then_some(SenderId::new(octets))
}

fn decode_hex(text: &str) -> Option<Vec<u8, MAX_RAW_FRAME>> {
    if text.len() % 2 != 0 {
        return None;
    }

    let mut bytes = Vec::new();
    for pair in text.as_bytes().chunks(2) {
        let pair = core::str::from_utf8(pair).ok()?;
        bytes.push(u8::from_str_radix(pair, 16).ok()?).ok()?;
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(line: &str) -> ScenarioStep {
        parse_line(line)
            .unwrap_or_else(|err| panic!("`{line}` failed: {err}"))
            .unwrap_or_else(|| panic!("`{line}` produced no step"))
    }

    #[test]
    fn keywords_are_case_insensitive() {
        assert_eq!(parsed("send 50"), ScenarioStep::Send(50));
        assert_eq!(parsed("  DROP 8  "), ScenarioStep::Drop(8));
        assert_eq!(parsed("Ping 42 # explicit"), ScenarioStep::Ping(42));
        assert_eq!(parsed("key S"), ScenarioStep::Key('S'));
        assert_eq!(parsed("key ?"), ScenarioStep::Key('?'));
    }

    #[test]
    fn durations_take_optional_suffix() {
        assert_eq!(
            parsed("wait 3500ms"),
            ScenarioStep::Wait(Duration::from_millis(3_500))
        );
        assert_eq!(parsed("wait 4s"), ScenarioStep::Wait(Duration::from_secs(4)));
        assert_eq!(
            parsed("interval 250"),
            ScenarioStep::Interval(Duration::from_millis(250))
        );
    }

    #[test]
    fn sender_and_raw_decode_hex() {
        assert_eq!(
            parsed("sender 24:6f:28:0A:BC:01"),
            ScenarioStep::Sender(SenderId::new([0x24, 0x6F, 0x28, 0x0A, 0xBC, 0x01]))
        );

        match parsed("raw aa0102") {
            ScenarioStep::Raw(bytes) => assert_eq!(bytes.as_slice(), &[0xAA, 0x01, 0x02]),
            other => panic!("expected raw frame, got {other:?}"),
        }
    }

    #[test]
    fn blank_and_comment_lines_are_skipped() {
        assert_eq!(parse_line(""), Ok(None));
        assert_eq!(parse_line("   "), Ok(None));
        assert_eq!(parse_line("# just a note"), Ok(None));
    }

    #[test]
    fn errors_point_at_the_bad_argument() {
        assert_eq!(parse_line("send lots").map_err(|e| e.offset), Err(5));
        assert_eq!(parse_line("raw abc").map_err(|e| e.offset), Err(4));
        assert!(parse_line("sned 5").is_err());
        assert!(parse_line("send 5 extra").is_err());
    }

    #[test]
    fn script_errors_carry_line_numbers() {
        let script = "send 3\n\n# gap\ndrop 2\nbogus\n";
        let mut parsed = steps(script);

        assert_eq!(parsed.next(), Some(Ok(ScenarioStep::Send(3))));
        assert_eq!(parsed.next(), Some(Ok(ScenarioStep::Drop(2))));
        assert_eq!(
            parsed.next(),
            Some(Err(ScenarioError { line: 5, offset: 0 }))
        );
        assert_eq!(parsed.next(), None);
    }
}
