//! `AT+CSIM` command framing

use crate::hex::{put_bytes, put_decimal, put_hex_byte};
use crate::types::Safe2Error;

/// Length of an ISO 7816 command header (CLA INS P1 P2 P3)
pub const LEN_APDU_HEADER: usize = 5;

/// Largest APDU body that fits a single-byte Lc
pub const APDU_DATA_MAX: usize = 255;

const AT_CSIM: &[u8] = b"at+csim=";

/// ISO 7816 command header.
///
/// The class byte is given without channel bits; they are added when the
/// frame is built. `p3` is Le for commands without data and is replaced by
/// the data length when data is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApduHeader {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    pub p3: u8,
}

impl ApduHeader {
    pub const fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            p3: 0x00,
        }
    }

    /// Same header with P3 set
    pub const fn with_p3(mut self, p3: u8) -> Self {
        self.p3 = p3;
        self
    }
}

/// Render `at+csim=<N>,"<HEXAPDU>"\r\n` into `buf`, returning the frame length.
///
/// `<N>` counts hex characters: 2 x (5 + data length). The channel number is
/// OR'd into the class byte here, so every APDU carries the active channel.
pub fn build_csim_frame(
    buf: &mut [u8],
    header: &ApduHeader,
    channel: u8,
    data: &[u8],
) -> Result<usize, Safe2Error> {
    if data.len() > APDU_DATA_MAX {
        return Err(Safe2Error::InvalidParameter(format!(
            "APDU data too long: {} bytes (maximum: {})",
            data.len(),
            APDU_DATA_MAX
        )));
    }

    let p3 = if data.is_empty() {
        header.p3
    } else {
        data.len() as u8
    };
    let hex_len = 2 * (LEN_APDU_HEADER + data.len());

    let mut ofs = put_bytes(buf, AT_CSIM, 0)?;
    ofs = put_decimal(buf, hex_len as i32, ofs)?;
    ofs = put_bytes(buf, b",\"", ofs)?;
    for b in [header.cla | channel, header.ins, header.p1, header.p2, p3] {
        ofs = put_hex_byte(buf, b, ofs)?;
    }
    for &b in data {
        ofs = put_hex_byte(buf, b, ofs)?;
    }
    put_bytes(buf, b"\"\r\n", ofs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_frame_lengths() {
        let mut buf = [0u8; 128];
        let header = ApduHeader::new(0x00, 0xA4, 0x04, 0x0C);
        let len = build_csim_frame(&mut buf, &header, 0, &[0x11; 12]).unwrap();
        let text = std::str::from_utf8(&buf[..len]).unwrap();

        assert!(text.starts_with("at+csim=34,\""));
        assert!(text.ends_with("\"\r\n"));
        let body = &text["at+csim=34,\"".len()..text.len() - 3];
        // 5 header bytes and 12 data bytes, two hex characters each
        assert_eq!(body.len(), 34);
        assert!(body.starts_with("00A4040C0C"));
        assert!(body[10..].chars().all(|c| c == '1'));
    }

    #[test]
    fn test_header_only_frame_uses_p3() {
        let mut buf = [0u8; 64];
        let header = ApduHeader::new(0x00, 0x70, 0x00, 0x00).with_p3(0x01);
        let len = build_csim_frame(&mut buf, &header, 0, &[]).unwrap();
        assert_eq!(&buf[..len], b"at+csim=10,\"0070000001\"\r\n");
    }

    #[test]
    fn test_channel_injected_into_class() {
        let mut buf = [0u8; 64];
        let header = ApduHeader::new(0x00, 0xCA, 0x01, 0x00);
        let len = build_csim_frame(&mut buf, &header, 3, &[]).unwrap();
        assert_eq!(&buf[..len], b"at+csim=10,\"03CA010000\"\r\n");
    }

    #[test]
    fn test_data_too_long() {
        let mut buf = [0u8; 600];
        let header = ApduHeader::new(0x00, 0xDA, 0x02, 0xC1);
        assert!(matches!(
            build_csim_frame(&mut buf, &header, 1, &[0u8; 256]),
            Err(Safe2Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_frame_does_not_fit() {
        let mut buf = [0u8; 20];
        let header = ApduHeader::new(0x00, 0xDA, 0x02, 0xC1);
        assert!(matches!(
            build_csim_frame(&mut buf, &header, 1, &[0u8; 8]),
            Err(Safe2Error::BufferOverflow { .. })
        ));
    }
}
