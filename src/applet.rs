//! SAFE2 applet commands: GET STATUS, GET DATA and PUT DATA

use log::{debug, warn};

use crate::frame::ApduHeader;
use crate::hex::hex_u16;
use crate::response::{decode_in_place, CsimField, CsimReply, DecodeError};
use crate::safe2::Safe2;
use crate::transport::ModemTransport;
use crate::types::{bytes_to_hex, DataMode, ReceivingStatus, Safe2Error};

const CLA_ISO: u8 = 0x00;

const INS_PUT_DATA: u8 = 0xDA;
const PUT_DATA_P1: u8 = 0x02;

const INS_GET_DATA: u8 = 0xCA;

const INS_GET_STATUS: u8 = 0xCC;
const GET_STATUS_MODE_GET: u8 = 0x02;
/// Bytes held back by GET STATUS: state and result, two bytes each
const GET_STATUS_LEN: u8 = 0x04;
/// `+CSIM:` length of the status record: 4 bytes plus SW, in hex
const GET_STATUS_HEX_LEN: usize = 12;

const INS_GET_RESPONSE: u8 = 0xC0;

/// PUT DATA tag for the device identifier
pub const TAG_DEVICE_ID: u8 = 0xC0;
/// PUT DATA tag for device data
pub const TAG_DEVICE_DATA: u8 = 0xC1;

/// Longest device identifier the applet stores
pub const LEN_DEVICE_ID_MAX: usize = 16;

/// Progress of a command that may answer `61xx`
enum Fetch {
    /// The card holds this many bytes for GET RESPONSE
    Pending(u8),
    /// Final reply is in the work buffer
    Ready(CsimField),
}

fn csim_field(reply: CsimReply, malformed: Safe2Error) -> Result<CsimField, Safe2Error> {
    match reply {
        CsimReply::Apdu(field) => Ok(field),
        CsimReply::NotFound => Err(Safe2Error::InvalidCsimResponse),
        CsimReply::Malformed => Err(malformed),
    }
}

impl<T: ModemTransport> Safe2<T> {
    /// Read the applet's receiving state and result
    pub fn state(&mut self) -> Result<ReceivingStatus, Safe2Error> {
        self.open_channel()?;

        let header = ApduHeader::new(CLA_ISO, INS_GET_STATUS, GET_STATUS_MODE_GET, 0x00);
        let reply = self.transmit(&header, &[])?;
        let field = csim_field(reply, Safe2Error::UnexpectedGetStatusResponse)?;

        // expected first reply: 4,"6104"
        let fetch = match field.status_only(&self.buffer).and_then(|sw| sw.more_data()) {
            Some(GET_STATUS_LEN) => Fetch::Pending(GET_STATUS_LEN),
            _ => Fetch::Ready(field),
        };
        let field = match fetch {
            Fetch::Pending(len) => csim_field(
                self.get_response(len)?,
                Safe2Error::UnexpectedGetStatusResponse,
            )?,
            Fetch::Ready(field) => field,
        };

        // [state:2][result:2][SW:2]
        if field.declared_len != GET_STATUS_HEX_LEN {
            return Err(Safe2Error::UnexpectedGetStatusResponse);
        }
        let hex = field.hex(&self.buffer);
        let state = hex
            .get(0..4)
            .and_then(hex_u16)
            .ok_or(Safe2Error::InvalidGetStatusResponse)?;
        let result = hex
            .get(4..8)
            .and_then(hex_u16)
            .ok_or(Safe2Error::InvalidGetStatusResponse)?;

        debug!("Receiving state 0x{:04X}, result 0x{:04X}", state, result);
        Ok(ReceivingStatus { state, result })
    }

    /// Issue GET DATA in `mode`.
    ///
    /// In `DataMode::Data` the decoded bytes are left at the front of the work
    /// buffer and their count is returned. `DataMode::Request` only triggers
    /// the applet and returns 0.
    pub fn get_data(&mut self, mode: DataMode) -> Result<usize, Safe2Error> {
        self.open_channel()?;

        let header = ApduHeader::new(CLA_ISO, INS_GET_DATA, mode as u8, 0x00);
        let reply = self.transmit(&header, &[])?;
        if mode == DataMode::Request {
            debug!("GET DATA request answered {:?}", reply);
            return Ok(0);
        }
        let field = csim_field(reply, Safe2Error::InvalidCsimResponse)?;

        // expected first reply: 4,"61xx"
        let fetch = if field.declared_len == 4 {
            let sw = field
                .status_only(&self.buffer)
                .ok_or(Safe2Error::InvalidGetDataResponse)?;
            match sw.more_data() {
                Some(len) => Fetch::Pending(len),
                None if sw.is_success() => Fetch::Ready(field),
                None => return Err(Safe2Error::UnexpectedGetDataResponse(sw)),
            }
        } else {
            Fetch::Ready(field)
        };
        let field = match fetch {
            Fetch::Pending(len) => {
                csim_field(self.get_response(len)?, Safe2Error::InvalidCsimResponse)?
            }
            Fetch::Ready(field) => field,
        };

        let decoded = decode_in_place(&mut self.buffer, &field).map_err(|e| match e {
            DecodeError::NoStatusWord => Safe2Error::InvalidGetDataResponse,
            DecodeError::NotHex | DecodeError::Truncated => Safe2Error::InvalidCsimResponse,
        })?;
        if !decoded.sw.is_success() {
            warn!("GET DATA finished with status word {}", decoded.sw);
        }
        debug!(
            "GET DATA returned {} bytes: {}",
            decoded.data_len,
            bytes_to_hex(&self.buffer[..decoded.data_len])
        );
        Ok(decoded.data_len)
    }

    /// Send `data` to the applet under `tag`
    pub fn put_data(&mut self, tag: u8, data: &[u8]) -> Result<(), Safe2Error> {
        self.open_channel()?;

        let header = ApduHeader::new(CLA_ISO, INS_PUT_DATA, PUT_DATA_P1, tag);
        match self.transmit(&header, data)? {
            CsimReply::Apdu(field) => match field.status_only(&self.buffer) {
                Some(sw) if sw.is_success() => {}
                other => warn!("PUT DATA tag 0x{:02X} answered {:?}", tag, other),
            },
            other => warn!("PUT DATA tag 0x{:02X} answered {:?}", tag, other),
        }
        Ok(())
    }

    /// Ask the applet to request fresh configuration
    pub fn config_request(&mut self) -> Result<(), Safe2Error> {
        self.get_data(DataMode::Request).map(|_| ())
    }

    /// Fetch the configuration received by the applet
    pub fn config_get(&mut self) -> Result<Vec<u8>, Safe2Error> {
        let len = self.get_data(DataMode::Data)?;
        if len == 0 {
            return Err(Safe2Error::InvalidGetDataResponse);
        }
        Ok(self.buffer[..len].to_vec())
    }

    /// Send device data through the applet
    pub fn data_send(&mut self, data: &[u8]) -> Result<(), Safe2Error> {
        self.put_data(TAG_DEVICE_DATA, data)
    }

    /// Store the device identifier in the applet (at most 16 bytes)
    pub fn device_id_set(&mut self, device_id: &[u8]) -> Result<(), Safe2Error> {
        if device_id.len() > LEN_DEVICE_ID_MAX {
            return Err(Safe2Error::InvalidParameter(format!(
                "Device id too long: {} bytes (maximum: {})",
                device_id.len(),
                LEN_DEVICE_ID_MAX
            )));
        }
        self.put_data(TAG_DEVICE_ID, device_id)
    }

    /// GET RESPONSE for `len` bytes announced by a `61xx` status word
    fn get_response(&mut self, len: u8) -> Result<CsimReply, Safe2Error> {
        debug!("Fetching {} extended response bytes", len);
        let header = ApduHeader::new(CLA_ISO, INS_GET_RESPONSE, 0x00, 0x00).with_p3(len);
        self.transmit(&header, &[])
    }
}
