//! Supplementary logical channel lifecycle and SAFE2 applet selection

use log::{info, warn};

use crate::frame::ApduHeader;
use crate::response::{decode_in_place, CsimReply};
use crate::safe2::Safe2;
use crate::transport::ModemTransport;
use crate::types::{bytes_to_hex, ChannelState, Safe2Error};

const INS_MANAGE_CHANNEL: u8 = 0x70;
const INS_SELECT: u8 = 0xA4;

/// MANAGE CHANNEL P1 flag closing the channel given in P2
const MODE_CHANNEL_CLOSE: u8 = 0x80;

/// Highest supplementary channel number a card may assign
const CHANNEL_ID_MAX: u8 = 3;

/// Application identifier of the SAFE2 applet
pub const AID_SAFE2: [u8; 12] = [
    0xF0, 0x70, 0x6F, 0x64, 0x67, 0x73, 0x61, 0x66, 0x65, 0x32, 0x01, 0x01,
];

impl<T: ModemTransport> Safe2<T> {
    /// Open a supplementary logical channel and select the SAFE2 applet on it.
    ///
    /// Does nothing when a channel is already open. If SELECT fails the channel
    /// stays allocated on the card and tracked here; callers should treat the
    /// error as fatal and close it.
    pub fn open_channel(&mut self) -> Result<(), Safe2Error> {
        if self.channel.is_open() {
            return Ok(());
        }

        let open = ApduHeader::new(0x00, INS_MANAGE_CHANNEL, 0x00, 0x00).with_p3(0x01);
        let field = match self.transmit(&open, &[])? {
            CsimReply::Apdu(field) => field,
            CsimReply::NotFound => return Err(Safe2Error::InvalidCsimResponse),
            CsimReply::Malformed => return Err(Safe2Error::InvalidOpenChannelResponse),
        };

        // expected: 6,"0<id>xxxx" -> one data byte holding the channel id
        if field.declared_len != 6 {
            return Err(Safe2Error::InvalidOpenChannelResponse);
        }
        let decoded = decode_in_place(&mut self.buffer, &field)
            .map_err(|_| Safe2Error::InvalidOpenChannelResponse)?;
        let id = self.buffer[0];
        if decoded.data_len != 1 || id > 0x0F {
            return Err(Safe2Error::InvalidOpenChannelResponse);
        }
        if id == 0 || id > CHANNEL_ID_MAX {
            return Err(Safe2Error::InvalidChannelId(id));
        }
        self.channel = ChannelState::Open(id);
        info!("Opened logical channel {}", id);

        self.select_safe2()
    }

    fn select_safe2(&mut self) -> Result<(), Safe2Error> {
        let select = ApduHeader::new(0x00, INS_SELECT, 0x04, 0x0C);
        let reply = self.transmit(&select, &AID_SAFE2)?;
        let field = match reply {
            CsimReply::Apdu(field) => field,
            CsimReply::NotFound => return Err(Safe2Error::InvalidCsimResponse),
            CsimReply::Malformed => {
                return Err(Safe2Error::InvalidSelectResponse("malformed +CSIM line".into()));
            }
        };

        match field.status_only(&self.buffer) {
            Some(sw) if sw.is_success() => {
                info!("Selected SAFE2 applet {}", bytes_to_hex(&AID_SAFE2));
                Ok(())
            }
            Some(sw) => Err(Safe2Error::InvalidSelectResponse(format!(
                "status word {}",
                sw
            ))),
            None => Err(Safe2Error::InvalidSelectResponse(format!(
                "expected 4 hex characters, got {}",
                field.declared_len
            ))),
        }
    }

    /// Close the logical channel. Best effort: the channel is forgotten
    /// whatever the card answers.
    pub fn close_channel(&mut self) {
        let ChannelState::Open(id) = self.channel else {
            return;
        };

        let close = ApduHeader::new(0x00, INS_MANAGE_CHANNEL, MODE_CHANNEL_CLOSE, id);
        match self.transmit(&close, &[]) {
            Ok(CsimReply::Apdu(field)) => match field.status_only(&self.buffer) {
                Some(sw) if sw.is_success() => {}
                other => warn!("Closing channel {} answered {:?}", id, other),
            },
            Ok(other) => warn!("Closing channel {} answered {:?}", id, other),
            Err(e) => warn!("Closing channel {} failed: {}", id, e),
        }

        self.channel = ChannelState::Closed;
        info!("Closed logical channel {}", id);
    }

    /// Release the channel before the host goes to sleep
    pub fn prepare_for_sleep(&mut self) {
        self.close_channel();
    }
}
