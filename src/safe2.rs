use log::{debug, error, warn};
use std::time::{Duration, Instant};

use crate::config::Safe2Config;
use crate::frame::{self, ApduHeader, LEN_APDU_HEADER};
use crate::hex::put_bytes;
use crate::response::{self, CsimReply};
use crate::transport::ModemTransport;
use crate::types::{escape_log, ChannelState, LinkState, Safe2Error};

/// Work buffer size: room for a 5 byte header and 256 data bytes in hex, plus AT framing
pub const LEN_IO_BUFFER: usize = 600;

const _: () = assert!(LEN_IO_BUFFER >= LEN_APDU_HEADER + 2 * 256);

/// SAFE2 protocol engine bound to one modem transport.
///
/// The engine owns a single work buffer that holds the outgoing command and
/// then the incoming response, so only one exchange can be in flight at a time.
pub struct Safe2<T: ModemTransport> {
    pub(crate) transport: T,
    pub(crate) config: Safe2Config,
    pub(crate) buffer: [u8; LEN_IO_BUFFER],
    pub(crate) channel: ChannelState,
    pub(crate) link: LinkState,
}

impl<T: ModemTransport> Safe2<T> {
    /// Create a new engine with the default configuration
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            config: Safe2Config::default(),
            buffer: [0u8; LEN_IO_BUFFER],
            channel: ChannelState::Closed,
            link: LinkState::Probing,
        }
    }

    /// Create a new engine with custom timings
    pub fn with_config(transport: T, config: Safe2Config) -> Result<Self, Safe2Error> {
        config.validate()?;
        let mut safe2 = Self::new(transport);
        safe2.config = config;
        Ok(safe2)
    }

    /// Current logical channel
    pub fn channel(&self) -> ChannelState {
        self.channel
    }

    /// Current bring-up state
    pub fn link_state(&self) -> LinkState {
        self.link
    }

    pub fn config(&self) -> &Safe2Config {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Release the transport, e.g. to reopen it at another baud rate
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Build an `AT+CSIM` frame for `header` and `data` in the work buffer,
    /// stamping the current channel into the class byte. Returns the frame length.
    pub fn build_csim_frame(&mut self, header: &ApduHeader, data: &[u8]) -> Result<usize, Safe2Error> {
        frame::build_csim_frame(&mut self.buffer, header, self.channel.number(), data)
    }

    /// Write the first `len` bytes of the work buffer to the modem
    pub fn send_command(&mut self, len: usize) -> Result<(), Safe2Error> {
        if len > LEN_IO_BUFFER {
            return Err(Safe2Error::BufferOverflow {
                needed: len,
                capacity: LEN_IO_BUFFER,
            });
        }
        debug!("Sending command: {}", escape_log(&self.buffer[..len]));

        let start = Instant::now();
        let mut ofs = 0;
        while ofs < len {
            let room = self.transport.available_for_write().map_err(transport_error)?;
            let written = if room == 0 {
                0
            } else {
                let block = room.min(len - ofs);
                self.transport
                    .write(&self.buffer[ofs..ofs + block])
                    .map_err(transport_error)?
            };
            if written == 0 {
                if start.elapsed() >= self.config.response_timeout {
                    return Err(Safe2Error::Timeout("transport write room"));
                }
                pause(self.config.write_retry_delay);
                continue;
            }
            ofs += written;
        }
        self.transport.flush().map_err(transport_error)
    }

    /// Read lines into the work buffer until an `OK` or `ERROR` line arrives.
    /// Returns the number of bytes accumulated.
    pub fn read_response(&mut self) -> Result<usize, Safe2Error> {
        let start = Instant::now();
        let mut len = 0;

        loop {
            // keep one byte for the line terminator the transport swallows
            let room = LEN_IO_BUFFER.saturating_sub(len + 1);
            if room == 0 {
                warn!("Response overflowed work buffer: {}", escape_log(&self.buffer[..len]));
                return Err(Safe2Error::BufferOverflow {
                    needed: LEN_IO_BUFFER + 1,
                    capacity: LEN_IO_BUFFER,
                });
            }

            let read = self
                .transport
                .read_until(b'\n', &mut self.buffer[len..len + room])
                .map_err(transport_error)?;

            if read > 0 {
                len += read;
                self.buffer[len] = b'\n';
                len += 1;
                if response::has_terminal_marker(&self.buffer[..len]) {
                    debug!("Received {} bytes: {}", len, escape_log(&self.buffer[..len]));
                    return Ok(len);
                }
            } else if start.elapsed() >= self.config.response_timeout {
                warn!("No final result code after {} bytes: {}", len, escape_log(&self.buffer[..len]));
                return Err(Safe2Error::Timeout("modem response"));
            }
        }
    }

    /// Send `header`/`data` as `AT+CSIM` and scan the reply
    pub(crate) fn transmit(&mut self, header: &ApduHeader, data: &[u8]) -> Result<CsimReply, Safe2Error> {
        let len = self.build_csim_frame(header, data)?;
        self.send_command(len)?;
        let len = self.read_response()?;
        Ok(response::scan_csim(&self.buffer[..len]))
    }

    /// Send a plain AT command and wait for its final result code
    pub(crate) fn at_command(&mut self, command: &[u8]) -> Result<usize, Safe2Error> {
        let len = put_bytes(&mut self.buffer, command, 0)?;
        self.send_command(len)?;
        self.read_response()
    }

    /// Send a plain AT command without waiting for a reply
    pub(crate) fn at_write(&mut self, command: &[u8]) -> Result<(), Safe2Error> {
        let len = put_bytes(&mut self.buffer, command, 0)?;
        self.send_command(len)
    }

    /// Discard whatever the modem has sent, giving up after `response_timeout`
    /// if the input never goes quiet
    pub(crate) fn drain_input(&mut self) -> Result<usize, Safe2Error> {
        let start = Instant::now();
        let mut drained = 0;
        loop {
            let available = self.transport.bytes_available().map_err(transport_error)?;
            if available == 0 {
                break;
            }
            if start.elapsed() >= self.config.response_timeout {
                warn!("Modem input still streaming after draining {} bytes", drained);
                return Err(Safe2Error::Timeout("modem drain"));
            }
            let read = self
                .transport
                .read_until(b'\n', &mut self.buffer[..available.min(LEN_IO_BUFFER)])
                .map_err(transport_error)?;
            drained += read;
            pause(self.config.drain_char_delay);
        }
        if drained > 0 {
            debug!("Drained {} bytes", drained);
        }
        Ok(drained)
    }
}

pub(crate) fn transport_error<E: std::fmt::Debug>(e: E) -> Safe2Error {
    error!("Transport error: {:?}", e);
    Safe2Error::Transport(format!("{:?}", e))
}

pub(crate) fn pause(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}
