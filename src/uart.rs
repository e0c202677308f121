//! UART transport for ESP32 using esp-idf-svc

use crate::config::validate_baud_rate;
use crate::transport::ModemTransport;
use crate::types::Safe2Error;
use esp_idf_svc::hal::delay::TickType;
use esp_idf_svc::hal::gpio::{self, InputPin, OutputPin};
use esp_idf_svc::hal::peripheral::Peripheral;
use esp_idf_svc::hal::uart::{self, UartDriver};
use std::time::Duration;

/// Per-byte read timeout used by `read_until`.
const READ_TIMEOUT: Duration = Duration::from_millis(1000);

/// The driver copies writes into its own ring buffer, so a fixed window is reported.
const WRITE_WINDOW: usize = 128;

pub struct UartTransport<'a> {
    uart: UartDriver<'a>,
}

impl<'a> UartTransport<'a> {
    pub fn new(
        uart: impl Peripheral<P = impl uart::Uart> + 'a,
        tx: impl Peripheral<P = impl OutputPin> + 'a,
        rx: impl Peripheral<P = impl InputPin> + 'a,
        baud_rate: u32,
    ) -> Result<Self, Safe2Error> {
        validate_baud_rate(baud_rate)?;

        let config = uart::config::Config::default().baudrate(baud_rate.into());
        let uart = UartDriver::new(
            uart,
            tx,
            rx,
            Option::<gpio::Gpio0>::None,
            Option::<gpio::Gpio0>::None,
            &config,
        )
        .map_err(|e| Safe2Error::Transport(format!("{:?}", e)))?;

        std::thread::sleep(Duration::from_millis(500));
        uart.clear_rx()
            .map_err(|e| Safe2Error::Transport(format!("{:?}", e)))?;

        Ok(Self { uart })
    }
}

impl ModemTransport for UartTransport<'_> {
    type Error = esp_idf_svc::sys::EspError;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        self.uart.write(data)
    }

    fn available_for_write(&mut self) -> Result<usize, Self::Error> {
        Ok(WRITE_WINDOW)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        self.uart.wait_tx_done(TickType::from(READ_TIMEOUT).ticks())
    }

    fn read_until(&mut self, terminator: u8, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let timeout = TickType::from(READ_TIMEOUT).ticks();
        let mut count = 0;
        let mut byte = [0u8; 1];
        while count < buf.len() {
            if self.uart.read(&mut byte, timeout)? == 0 || byte[0] == terminator {
                break;
            }
            buf[count] = byte[0];
            count += 1;
        }
        Ok(count)
    }

    fn bytes_available(&mut self) -> Result<usize, Self::Error> {
        self.uart.remaining_read()
    }
}
