//! Driver for SIM based SAFE2 services, tunnelling ISO 7816 APDUs through a
//! modem's `AT+CSIM` command.
//!
//! # Features
//!
//! - `uart-esp32` - UART transport for ESP32 using esp-idf-svc
//! - `serial` - Serial port transport for desktop using serialport crate
//!
//! # Example
//!
//! ```ignore
//! use safe2::{Safe2, SerialTransport};
//!
//! let transport = SerialTransport::new("/dev/ttyUSB0", 115200)?;
//! let mut safe2 = Safe2::new(transport);
//!
//! safe2.wait_for_modem_start()?;
//! safe2.wait_for_network_registration()?;
//!
//! safe2.device_id_set(b"device-0001")?;
//! safe2.data_send(b"{\"t\":21.5}")?;
//!
//! if safe2.state()?.has_data() {
//!     let config = safe2.config_get()?;
//!     println!("Config: {} bytes", config.len());
//! }
//! safe2.prepare_for_sleep();
//! ```

mod applet;
mod channel;
mod config;
mod frame;
mod hex;
mod link;
mod response;
mod safe2;
mod transport;
mod types;

#[cfg(feature = "uart-esp32")]
mod uart;

#[cfg(feature = "serial")]
mod serial;

// Re-exports
pub use applet::{LEN_DEVICE_ID_MAX, TAG_DEVICE_DATA, TAG_DEVICE_ID};
pub use channel::AID_SAFE2;
pub use config::{validate_baud_rate, Safe2Config, MIN_BAUD_RATE};
pub use frame::{ApduHeader, APDU_DATA_MAX, LEN_APDU_HEADER};
pub use hex::{hex_digit, put_decimal, put_hex_byte};
pub use response::{decode_in_place, parse_creg, scan_csim, CsimField, CsimReply, DecodeError, DecodedApdu};
pub use safe2::{Safe2, LEN_IO_BUFFER};
pub use transport::ModemTransport;
pub use types::{
    ChannelState, DataMode, LinkState, ReceivingStatus, ResultCode, Safe2Error, StatusWord,
    STATUS_RECEIVE_DATA, STATUS_RECEIVE_DONE, STATUS_RECEIVE_ERROR,
};

#[cfg(feature = "uart-esp32")]
pub use uart::UartTransport;

#[cfg(feature = "serial")]
pub use serial::SerialTransport;
