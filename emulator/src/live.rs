use std::io::{self, Write};
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use link_core::clock::{ClockSource, MonotonicInstant};

use crate::session::{Session, TICK_INTERVAL};
use crate::transmitter::{Transmitter, WallClock};

/// Restores cooked mode even when the loop bails out with an error.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

enum Input {
    Command(char),
    ToggleTransmitter,
    Quit,
}

/// Runs the receiver against a wall-clock transmitter until `q`/Esc.
///
/// `S`, `R`, `H`/`?` go to the receiver console; `t` switches the simulated
/// transmitter off and on to provoke signal loss.
pub fn run(
    session: &mut Session<WallClock>,
    transmitter: &mut Transmitter,
    clock: WallClock,
) -> io::Result<()> {
    let stdout = io::stdout();
    let mut writer = stdout.lock();

    emit(&mut writer, &session.banner()?)?;
    writeln!(
        writer,
        "Live mode: t toggles the transmitter, q or Esc quits."
    )?;

    let _raw = RawModeGuard::enable()?;
    let mut transmitting = true;
    let mut next_ping = clock.now();

    loop {
        let now = clock.now();
        if now >= next_ping {
            let frame = if transmitting {
                transmitter.transmit(now)
            } else {
                None
            };
            if let Some(frame) = frame {
                emit(&mut writer, &session.deliver(transmitter.sender(), &frame)?)?;
            }
            next_ping = next_ping + transmitter.interval();
        }
        emit(&mut writer, &session.poll_ticks()?)?;

        let wait = TICK_INTERVAL
            .min(next_ping.saturating_duration_since(clock.now()))
            .max(Duration::from_millis(1));
        if !event::poll(wait)? {
            continue;
        }

        match read_input()? {
            Some(Input::Quit) => break,
            Some(Input::ToggleTransmitter) => {
                transmitting = !transmitting;
                let state = if transmitting { "on" } else { "off" };
                writeln!(writer, "Transmitter {state}\r")?;
                writer.flush()?;
            }
            Some(Input::Command(key)) => emit(&mut writer, &session.press_key(key)?)?,
            None => {}
        }
    }

    emit(&mut writer, &session.summary()?)
}

fn read_input() -> io::Result<Option<Input>> {
    let Event::Key(KeyEvent {
        code,
        modifiers,
        kind,
        ..
    }) = event::read()?
    else {
        return Ok(None);
    };

    if kind != KeyEventKind::Press {
        return Ok(None);
    }

    Ok(match code {
        KeyCode::Esc => Some(Input::Quit),
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => Some(Input::Quit),
        KeyCode::Char('q' | 'Q') => Some(Input::Quit),
        KeyCode::Char('t' | 'T') => Some(Input::ToggleTransmitter),
        KeyCode::Char(key) => Some(Input::Command(key)),
        _ => None,
    })
}

// Raw mode disables output post-processing, so every line needs its own `\r`.
fn emit<W: Write>(writer: &mut W, lines: &[String]) -> io::Result<()> {
    for line in lines {
        write!(writer, "{line}\r\n")?;
    }
    writer.flush()
}

