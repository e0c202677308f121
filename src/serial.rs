//! Serial port transport for desktop using serialport crate

use crate::config::validate_baud_rate;
use crate::transport::ModemTransport;
use crate::types::Safe2Error;
use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

/// Size of the output window reported by `available_for_write`.
const WRITE_WINDOW: usize = 64;

pub struct SerialTransport {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialTransport {
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self, Safe2Error> {
        validate_baud_rate(baud_rate)?;

        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_secs(1))
            .open()
            .map_err(|e| Safe2Error::Transport(format!("{:?}", e)))?;
        std::thread::sleep(Duration::from_millis(500));
        port.clear(serialport::ClearBuffer::Input)
            .map_err(|e| Safe2Error::Transport(format!("{:?}", e)))?;

        Ok(Self { port })
    }
}

impl ModemTransport for SerialTransport {
    type Error = std::io::Error;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        Write::write(&mut self.port, data)
    }

    fn available_for_write(&mut self) -> Result<usize, Self::Error> {
        let queued = self.port.bytes_to_write().map_err(std::io::Error::other)? as usize;
        Ok(WRITE_WINDOW.saturating_sub(queued))
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Write::flush(&mut self.port)
    }

    fn read_until(&mut self, terminator: u8, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut count = 0;
        let mut byte = [0u8; 1];
        while count < buf.len() {
            match Read::read(&mut self.port, &mut byte) {
                Ok(0) => break,
                Ok(_) if byte[0] == terminator => break,
                Ok(_) => {
                    buf[count] = byte[0];
                    count += 1;
                }
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) => return Err(e),
            }
        }
        Ok(count)
    }

    fn bytes_available(&mut self) -> Result<usize, Self::Error> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(std::io::Error::other)
    }
}
