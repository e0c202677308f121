//! Types for SAFE2 operations

use std::fmt;

/// Receiving state reported when the applet finished a transfer
pub const STATUS_RECEIVE_DONE: u16 = 0x0003;
/// Receiving state reported when configuration data is waiting to be fetched
pub const STATUS_RECEIVE_DATA: u16 = 0x0007;
/// Receiving state reported when the last transfer failed
pub const STATUS_RECEIVE_ERROR: u16 = 0x000F;

/// Errors that can occur during SAFE2 operations
#[derive(Debug, thiserror::Error)]
pub enum Safe2Error {
    /// Transport layer error (UART, serial, etc.)
    #[error("transport error: {0}")]
    Transport(String),
    /// Invalid parameter passed to a function
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    /// Command or response does not fit the work buffer
    #[error("work buffer overflow: {needed} bytes needed, capacity {capacity}")]
    BufferOverflow { needed: usize, capacity: usize },
    /// No usable `+CSIM:` payload in the modem response
    #[error("invalid +CSIM response")]
    InvalidCsimResponse,
    /// MANAGE CHANNEL (open) reply had an unexpected shape
    #[error("invalid open channel response")]
    InvalidOpenChannelResponse,
    /// The card assigned a channel outside 1..=3
    #[error("invalid channel id: {0}")]
    InvalidChannelId(u8),
    /// SELECT of the SAFE2 applet did not answer `9000`
    #[error("invalid select response: {0}")]
    InvalidSelectResponse(String),
    /// GET STATUS reply is not the 6-byte status record
    #[error("unexpected get status response")]
    UnexpectedGetStatusResponse,
    /// GET STATUS record contains non-hex characters
    #[error("invalid get status response")]
    InvalidGetStatusResponse,
    /// GET DATA answered with a bare status word other than success
    #[error("unexpected get data response: {0}")]
    UnexpectedGetDataResponse(StatusWord),
    /// GET DATA payload is empty or contains non-hex characters
    #[error("invalid get data response")]
    InvalidGetDataResponse,
    /// The modem did not answer in time
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
}

impl Safe2Error {
    /// Numeric result code for this error
    pub fn code(&self) -> ResultCode {
        match self {
            Self::InvalidParameter(_) | Self::BufferOverflow { .. } => {
                ResultCode::InvalidParameters
            }
            Self::InvalidCsimResponse => ResultCode::InvalidCsimResponse,
            Self::InvalidOpenChannelResponse => ResultCode::InvalidOpenChannelResponse,
            Self::InvalidChannelId(_) => ResultCode::InvalidChannelId,
            Self::InvalidSelectResponse(_) => ResultCode::InvalidSelectResponse,
            Self::UnexpectedGetStatusResponse => ResultCode::UnexpectedGetStatusResponse,
            Self::InvalidGetStatusResponse => ResultCode::InvalidGetStatusResponse,
            Self::UnexpectedGetDataResponse(_) => ResultCode::UnexpectedGetDataResponse,
            Self::InvalidGetDataResponse => ResultCode::InvalidGetDataResponse,
            Self::Transport(_) => ResultCode::TransportError,
            Self::Timeout(_) => ResultCode::Timeout,
        }
    }
}

/// Numeric result codes, as reported to hosts that expect a single status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResultCode {
    Ok = 0x00,
    InvalidParameters = 0x01,
    InvalidCsimResponse = 0x02,
    InvalidOpenChannelResponse = 0x03,
    InvalidChannelId = 0x04,
    InvalidSelectResponse = 0x05,
    UnexpectedGetStatusResponse = 0x06,
    InvalidGetStatusResponse = 0x07,
    UnexpectedGetDataResponse = 0x08,
    InvalidGetDataResponse = 0x09,
    TransportError = 0x0A,
    Timeout = 0x0B,
}

impl ResultCode {
    /// Collapse an operation result into its result code
    pub fn of<T>(result: &Result<T, Safe2Error>) -> Self {
        match result {
            Ok(_) => Self::Ok,
            Err(e) => e.code(),
        }
    }
}

/// ISO 7816 status word (SW1 SW2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusWord(pub u16);

impl StatusWord {
    pub const SUCCESS: Self = Self(0x9000);

    pub fn from_bytes(sw1: u8, sw2: u8) -> Self {
        Self(u16::from_be_bytes([sw1, sw2]))
    }

    pub fn sw1(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn sw2(self) -> u8 {
        (self.0 & 0xFF) as u8
    }

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// `61xx`: `xx` more response bytes can be fetched with GET RESPONSE
    pub fn more_data(self) -> Option<u8> {
        (self.sw1() == 0x61).then_some(self.sw2())
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.0)
    }
}

/// Result of GET STATUS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivingStatus {
    pub state: u16,
    pub result: u16,
}

impl ReceivingStatus {
    pub fn is_done(&self) -> bool {
        self.state == STATUS_RECEIVE_DONE
    }

    pub fn has_data(&self) -> bool {
        self.state == STATUS_RECEIVE_DATA
    }

    pub fn is_error(&self) -> bool {
        self.state == STATUS_RECEIVE_ERROR
    }
}

/// GET DATA mode (P1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataMode {
    /// Ask the applet to request configuration from the backend
    Request = 0x00,
    /// Fetch configuration data already received by the applet
    Data = 0x01,
}

/// Logical channel tracked by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// No supplementary channel, APDUs go to the basic channel
    #[default]
    Closed,
    /// Supplementary channel 1..=3 with the SAFE2 applet selected
    Open(u8),
}

impl ChannelState {
    /// Channel number stamped into the class byte
    pub fn number(self) -> u8 {
        match self {
            Self::Closed => 0,
            Self::Open(id) => id,
        }
    }

    pub fn is_open(self) -> bool {
        matches!(self, Self::Open(_))
    }
}

/// Modem bring-up progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// Sending `AT` until the modem answers
    #[default]
    Probing,
    /// Modem answered, turning command echo off
    EchoDisabling,
    /// Waiting for network registration
    PollingRegistration,
    /// Registered, ready for SAFE2 traffic
    Ready,
}

/// Convert bytes to uppercase hex string
pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

/// Render modem text on a single log line
pub(crate) fn escape_log(text: &[u8]) -> String {
    let mut out = String::with_capacity(text.len());
    for &b in text {
        match b {
            b'\r' => out.push_str("\\r"),
            b'\n' => out.push_str("\\n"),
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\x{:02X}", b)),
        }
    }
    out
}
