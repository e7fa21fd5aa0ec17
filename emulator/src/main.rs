mod live;
mod session;
mod transmitter;

use std::env;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use link_core::clock::ClockSource;
use link_core::config::{MonitorMode, TrackerConfig};
use session::{Session, TranscriptLogger};
use transmitter::{Transmitter, VirtualClock, WallClock};

const USAGE: &str = "\
Usage: link-emulator [options] [--script <file|->]
       link-emulator [options] --live [--drop-every <n>]

Options:
  --mode <continuous|test>   monitoring mode (default continuous)
  --timeout <ms>             signal loss timeout
  --heartbeat <ms>           heartbeat / progress interval
  --packets <n>              fixed-test packet count
  --test-timeout <ms>        fixed-test silence timeout
  --transcript <path>        transcript file (default evidence/emulator-session.log)";

const DEFAULT_TRANSCRIPT: &str = "evidence/emulator-session.log";

enum RunMode {
    Scripted { script: Option<PathBuf> },
    Live { drop_every: Option<u32> },
}

struct Options {
    config: TrackerConfig,
    run: RunMode,
    transcript: PathBuf,
}

fn main() -> io::Result<()> {
    let options = parse_options(env::args().skip(1)).unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let transcript = TranscriptLogger::create(&options.transcript, "Ping link emulator session")?;

    match options.run {
        RunMode::Scripted { script } => {
            let script = read_script(script.as_ref())?;
            let clock = VirtualClock::default();
            let mut transmitter = Transmitter::new(clock.now());
            let mut session = Session::new(options.config, clock, transcript);

            let stdout = io::stdout();
            let mut writer = stdout.lock();
            match session.run_script(&script, &mut transmitter)? {
                Ok(lines) => {
                    for line in lines {
                        writeln!(writer, "{line}")?;
                    }
                }
                Err(err) => {
                    eprintln!("{err}");
                    process::exit(1);
                }
            }
        }
        RunMode::Live { drop_every } => {
            let clock = WallClock::start();
            let mut transmitter = Transmitter::new(clock.now()).with_drop_every(drop_every);
            let mut session = Session::new(options.config, clock, transcript);
            live::run(&mut session, &mut transmitter, clock)?;
        }
    }

    Ok(())
}

fn read_script(path: Option<&PathBuf>) -> io::Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path),
        _ => {
            let mut script = String::new();
            io::stdin().lock().read_to_string(&mut script)?;
            Ok(script)
        }
    }
}

fn parse_options<I>(args: I) -> Result<Options, String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut mode = MonitorMode::default();
    let mut signal_timeout = None;
    let mut heartbeat = None;
    let mut packets = None;
    let mut test_timeout = None;
    let mut script = None;
    let mut live = false;
    let mut drop_every = None;
    let mut transcript = PathBuf::from(DEFAULT_TRANSCRIPT);

    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        let mut value = || {
            inline
                .clone()
                .or_else(|| args.next())
                .ok_or_else(|| format!("Expected value after {flag}"))
        };

        match flag.as_str() {
            "--mode" => {
                let tag = value()?;
                mode = MonitorMode::from_tag(&tag)
                    .ok_or_else(|| format!("Unknown mode `{tag}`"))?;
            }
            "--timeout" => signal_timeout = Some(parse_millis(&value()?)?),
            "--heartbeat" => heartbeat = Some(parse_millis(&value()?)?),
            "--packets" => packets = Some(parse_number(&value()?)?),
            "--test-timeout" => test_timeout = Some(parse_millis(&value()?)?),
            "--script" => script = Some(PathBuf::from(value()?)),
            "--transcript" => transcript = PathBuf::from(value()?),
            "--drop-every" => drop_every = Some(parse_number(&value()?)?),
            "--live" => live = true,
            "-h" | "--help" => return Err("Ping link emulator".to_string()),
            other => return Err(format!("Unknown argument `{other}`")),
        }
    }

    let mut config = TrackerConfig::for_mode(mode);
    if let Some(timeout) = signal_timeout {
        config = config.with_signal_timeout(timeout);
    }
    if let Some(interval) = heartbeat {
        config = config.with_heartbeat_interval(interval);
    }
    if let Some(count) = packets {
        config = config.with_test_packet_count(count);
    }
    if let Some(timeout) = test_timeout {
        config = config.with_test_end_timeout(timeout);
    }

    let run = if live {
        RunMode::Live { drop_every }
    } else {
        RunMode::Scripted { script }
    };

    Ok(Options {
        config,
        run,
        transcript,
    })
}

fn parse_number(text: &str) -> Result<u32, String> {
    text.parse()
        .map_err(|_| format!("Expected a number, found `{text}`"))
}

fn parse_millis(text: &str) -> Result<Duration, String> {
    let millis = text.strip_suffix("ms").unwrap_or(text);
    millis
        .parse()
        .map(Duration::from_millis)
        .map_err(|_| format!("Expected milliseconds, found `{text}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options, String> {
        parse_options(args.iter().map(|arg| (*arg).to_string()))
    }

    #[test]
    fn defaults_to_continuous_scripted_run() {
        let options = parse(&[]).unwrap();
        assert_eq!(options.config, TrackerConfig::continuous());
        assert!(matches!(options.run, RunMode::Scripted { script: None }));
        assert_eq!(options.transcript, PathBuf::from(DEFAULT_TRANSCRIPT));
    }

    #[test]
    fn overrides_apply_on_top_of_mode_defaults() {
        let options = parse(&[
            "--mode",
            "test",
            "--packets=500",
            "--timeout",
            "1500ms",
            "--test-timeout",
            "4000",
        ])
        .unwrap();

        assert_eq!(
            options.config,
            TrackerConfig::fixed_test()
                .with_test_packet_count(500)
                .with_signal_timeout(Duration::from_millis(1_500))
                .with_test_end_timeout(Duration::from_millis(4_000))
        );
    }

    #[test]
    fn live_mode_takes_drop_period() {
        let options = parse(&["--live", "--drop-every", "7"]).unwrap();
        assert!(matches!(options.run, RunMode::Live { drop_every: Some(7) }));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse(&["--mode", "sometimes"]).is_err());
        assert!(parse(&["--packets"]).is_err());
        assert!(parse(&["--heartbeat", "soon"]).is_err());
        assert!(parse(&["--verbose"]).is_err());
    }
}
