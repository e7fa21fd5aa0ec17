use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use embassy_executor::{SpawnError, Spawner};
use embassy_stm32 as hal;
use link_core::config::TrackerConfig;
use static_cell::StaticCell;

use crate::console::{self, ConsoleChannel};
use crate::monitor::{FirmwareInstant, SharedTracker};
use crate::radio::RadioQueue;
use crate::usb;

mod monitor_task;
mod radio_task;
mod usb_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static RADIO_QUEUE: RadioQueue = RadioQueue::new();
pub(super) static CONSOLE_QUEUE: ConsoleChannel = ConsoleChannel::new();
pub(super) static TRACKER: SharedTracker = SharedTracker::new();
pub(super) static USB_STORAGE: StaticCell<usb::UsbDeviceStorage> = StaticCell::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let hal::Peripherals {
        PB0,
        PB1,
        USB,
        PA11,
        PA12,
        USART5,
        ..
    } = hal::init(hal::Config::default());

    let config = TrackerConfig::default();
    TRACKER.start(config, FirmwareInstant::now());
    console::write_banner(CONSOLE_QUEUE.sender(), &config);
    defmt::info!(
        "monitor: started in {} mode",
        defmt::Display2Format(&config.mode)
    );

    report_spawn("usb", spawner.spawn(usb_task::run(USB, PA12, PA11)));
    report_spawn("monitor", spawner.spawn(monitor_task::run()));
    report_spawn(
        "radio",
        spawner.spawn(radio_task::run(&RADIO_QUEUE, USART5, PB0, PB1)),
    );

    core::future::pending::<()>().await;
}

fn report_spawn(name: &str, result: Result<(), SpawnError>) {
    if result.is_err() {
        defmt::error!("runtime: failed to spawn {} task", name);
    }
}
