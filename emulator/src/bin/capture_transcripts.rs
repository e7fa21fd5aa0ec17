use std::io;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;
#[allow(dead_code)]
#[path = "../transmitter.rs"]
mod transmitter;

use link_core::clock::ClockSource;
use session::{Session, TranscriptLogger, TranscriptProfile};
use transmitter::{Transmitter, VirtualClock};

fn main() -> io::Result<()> {
    for profile in TranscriptProfile::ALL {
        record_profile(profile)?;
    }
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let clock = VirtualClock::default();
    let mut transmitter = Transmitter::new(clock.now());
    let transcript = TranscriptLogger::for_profile(profile)?;
    let mut session = Session::new(profile.config(), clock, transcript);

    match session.run_script(profile.script(), &mut transmitter)? {
        Ok(lines) => {
            println!("{} -> {} ({} lines)", profile.header(), profile.log_path(), lines.len());
            Ok(())
        }
        Err(err) => Err(io::Error::new(io::ErrorKind::InvalidData, err.to_string())),
    }
}
