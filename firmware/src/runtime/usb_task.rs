use embassy_futures::join::join;
use embassy_futures::select::{Either3, select3};
use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_usb::class::cdc_acm::{ControlChanged, Receiver, Sender};
use embassy_usb::driver::{Driver, EndpointError};
use link_core::repl::commands::{CommandExecutor, OperatorCommand};

use super::{CONSOLE_QUEUE, TRACKER, USB_STORAGE};
use crate::console::{self, PendingLine};
use crate::monitor::FirmwareInstant;
use crate::usb::{self, UsbDeviceStrings};

embassy_stm32::bind_interrupts!(struct UsbIrqs {
    USB_UCPD1_2 => embassy_stm32::usb::InterruptHandler<hal::peripherals::USB>;
});

#[embassy_executor::task]
pub async fn run(
    usb: Peri<'static, hal::peripherals::USB>,
    dp: Peri<'static, hal::peripherals::PA12>,
    dm: Peri<'static, hal::peripherals::PA11>,
) -> ! {
    let storage = USB_STORAGE.init(usb::UsbDeviceStorage::new());
    let driver = embassy_stm32::usb::Driver::new(usb, UsbIrqs, dp, dm);

    let usb::UsbConsole {
        mut device,
        sender,
        receiver,
        control,
    } = usb::UsbConsole::new(driver, storage, UsbDeviceStrings::default());

    join(device.run(), run_console(sender, receiver, control)).await;
    loop {
        core::future::pending::<()>().await;
    }
}

async fn run_console<D>(
    mut sender: Sender<'static, D>,
    mut receiver: Receiver<'static, D>,
    control: ControlChanged<'static>,
) -> !
where
    D: Driver<'static>,
{
    let lines = CONSOLE_QUEUE.receiver();
    let mut ingress = [0u8; usb::MAX_PACKET_SIZE as usize];
    let mut tx_packet = [0u8; usb::MAX_PACKET_SIZE as usize];
    let mut pending: Option<PendingLine> = None;

    loop {
        join(receiver.wait_connection(), sender.wait_connection()).await;
        wait_for_dtr(&control, &mut sender).await;
        pending.take();

        defmt::info!(
            "usb: console connected (events={} dropped_lines={})",
            console::events_reported(),
            console::lines_dropped()
        );

        loop {
            match select3(
                receiver.read_packet(&mut ingress),
                async {
                    if pending.is_none() {
                        pending = Some(PendingLine::new(lines.receive().await));
                    }
                    let Some(line) = pending.as_mut() else {
                        return Ok(());
                    };

                    // One packet per pass; the cursor only moves once it is out.
                    let len = line.fill(&mut tx_packet);
                    sender.write_packet(&tx_packet[..len]).await?;
                    line.advance(len);
                    if line.is_finished() {
                        pending.take();
                    }
                    Ok::<(), EndpointError>(())
                },
                control.control_changed(),
            )
            .await
            {
                Either3::First(Ok(count)) => {
                    for byte in &ingress[..count] {
                        handle_key(*byte);
                    }
                }
                Either3::First(Err(EndpointError::Disabled)) => {
                    defmt::warn!("usb: console interface disabled");
                    break;
                }
                Either3::First(Err(_)) => {
                    defmt::warn!("usb: console read error");
                }
                Either3::Second(Ok(())) => {}
                Either3::Second(Err(EndpointError::Disabled)) => {
                    defmt::warn!("usb: console write disabled");
                    break;
                }
                Either3::Second(Err(_)) => {
                    defmt::warn!("usb: console write error");
                }
                Either3::Third(()) => {
                    if !sender.dtr() {
                        defmt::warn!("usb: host dropped DTR");
                        break;
                    }
                }
            }
        }
    }
}

fn handle_key(byte: u8) {
    // Unknown keys are ignored without output.
    let Some(command) = OperatorCommand::from_byte(byte) else {
        return;
    };
    let outcome = CommandExecutor::new(TRACKER.handle()).execute(command);
    console::write_outcome(CONSOLE_QUEUE.sender(), &outcome, FirmwareInstant::now());
}

async fn wait_for_dtr<D>(control: &ControlChanged<'static>, sender: &mut Sender<'static, D>)
where
    D: Driver<'static>,
{
    while !sender.dtr() {
        control.control_changed().await;
    }
}
