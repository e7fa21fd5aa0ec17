use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embassy_time::{Duration, Timer};
use embedded_io_async::Read;
use static_cell::StaticCell;

use crate::radio::{FrameAssembler, RADIO_QUEUE_DEPTH, RadioQueue};

const MODEM_UART_BAUD: u32 = 115_200;
// Room for a full queue worth of maximum-size envelopes.
const MODEM_UART_BUFFER_SIZE: usize = 40 * RADIO_QUEUE_DEPTH;

static UART_TX_BUFFER: StaticCell<[u8; MODEM_UART_BUFFER_SIZE]> = StaticCell::new();
static UART_RX_BUFFER: StaticCell<[u8; MODEM_UART_BUFFER_SIZE]> = StaticCell::new();

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART3_4_5_6_LPUART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART5>;
});

#[embassy_executor::task]
pub async fn run(
    queue: &'static RadioQueue,
    usart: Peri<'static, hal::peripherals::USART5>,
    tx_pin: Peri<'static, hal::peripherals::PB0>,
    rx_pin: Peri<'static, hal::peripherals::PB1>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = MODEM_UART_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let tx_buffer = UART_TX_BUFFER.init([0; MODEM_UART_BUFFER_SIZE]);
    let rx_buffer = UART_RX_BUFFER.init([0; MODEM_UART_BUFFER_SIZE]);

    let mut uart = match BufferedUart::new(
        usart, rx_pin, tx_pin, tx_buffer, rx_buffer, UartIrqs, config,
    ) {
        Ok(uart) => uart,
        Err(_) => {
            defmt::error!("radio: modem UART configuration rejected");
            loop {
                core::future::pending::<()>().await;
            }
        }
    };

    let frames = queue.sender();
    let mut assembler = FrameAssembler::new();
    let mut chunk = [0u8; 32];
    let mut reported_oversized = 0;

    loop {
        match uart.read(&mut chunk).await {
            Ok(count) => {
                for byte in &chunk[..count] {
                    if let Some(frame) = assembler.push(*byte) {
                        if frames.try_send(frame).is_err() {
                            defmt::warn!("radio: monitor queue full, frame dropped");
                        }
                    }
                }
                if assembler.oversized() != reported_oversized {
                    reported_oversized = assembler.oversized();
                    defmt::warn!("radio: oversized envelopes={}", reported_oversized);
                }
            }
            Err(_) => {
                defmt::warn!("radio: UART read error");
                Timer::after(Duration::from_millis(5)).await;
            }
        }
    }
}
