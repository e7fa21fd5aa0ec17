use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Ticker};

use super::{CONSOLE_QUEUE, RADIO_QUEUE, TRACKER};
use crate::console::ConsoleReporter;
use crate::monitor::{FirmwareInstant, MONITOR_TICK};

#[embassy_executor::task]
pub async fn run() -> ! {
    let frames = RADIO_QUEUE.receiver();
    let mut reporter = ConsoleReporter::new(CONSOLE_QUEUE.sender());
    let tick_ms = u64::try_from(MONITOR_TICK.as_millis()).unwrap_or(100);
    let mut ticker = Ticker::every(Duration::from_millis(tick_ms));

    loop {
        match select(frames.receive(), ticker.next()).await {
            Either::First(frame) => {
                TRACKER.on_frame(&frame, FirmwareInstant::now(), &mut reporter);
            }
            Either::Second(()) => {
                TRACKER.on_tick(FirmwareInstant::now(), &mut reporter);
            }
        }
    }
}
