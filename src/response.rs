//! Modem response scanning: terminal markers, `+CSIM:` payloads and `+CREG:` status

use std::ops::Range;

use crate::hex::{hex_pair, hex_u16};
use crate::types::StatusWord;

const MODEM_OK: &[u8] = b"OK\r";
const MODEM_ERROR: &[u8] = b"ERROR\r";
const MODEM_CSIM: &[u8] = b"+CSIM: ";
const MODEM_CREG: &[u8] = b"+CREG: ";

/// A `+CSIM:` length never needs more digits than the work buffer holds
const CSIM_LEN_DIGITS_MAX: usize = 3;

/// CREG `<stat>`: registered, home network
pub const CREG_REGISTERED_HOME: u8 = 1;
/// CREG `<stat>`: registered, roaming
pub const CREG_REGISTERED_ROAMING: u8 = 5;

pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// True once the accumulated text holds a final `OK` or `ERROR` line
pub fn has_terminal_marker(text: &[u8]) -> bool {
    find(text, MODEM_OK).is_some() || find(text, MODEM_ERROR).is_some()
}

/// Location of a `+CSIM: <len>,"<hex>"` payload inside the scanned text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsimField {
    /// Hex character count announced by the modem
    pub declared_len: usize,
    /// Offsets of the characters between the quotes
    pub hex: Range<usize>,
}

impl CsimField {
    pub fn hex<'a>(&self, text: &'a [u8]) -> &'a [u8] {
        &text[self.hex.clone()]
    }

    /// Status word of a reply that carries nothing else (`4,"xxxx"`)
    pub fn status_only(&self, text: &[u8]) -> Option<StatusWord> {
        if self.declared_len != 4 {
            return None;
        }
        hex_u16(self.hex(text)).map(StatusWord)
    }
}

/// Shape of a modem reply to `AT+CSIM`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CsimReply {
    /// Well-formed `+CSIM:` line
    Apdu(CsimField),
    /// No `+CSIM:` marker at all (typically `ERROR`)
    NotFound,
    /// Marker present but the length field or quoting is broken
    Malformed,
}

/// Locate the `+CSIM:` payload in `text`
pub fn scan_csim(text: &[u8]) -> CsimReply {
    let Some(marker) = find(text, MODEM_CSIM) else {
        return CsimReply::NotFound;
    };
    let mut pos = marker + MODEM_CSIM.len();

    let mut declared_len = 0usize;
    let digits_start = pos;
    while let Some(&c) = text.get(pos) {
        if c == b',' {
            break;
        }
        if !c.is_ascii_digit() || pos - digits_start >= CSIM_LEN_DIGITS_MAX {
            return CsimReply::Malformed;
        }
        declared_len = match declared_len
            .checked_mul(10)
            .and_then(|v| v.checked_add((c - b'0') as usize))
        {
            Some(v) => v,
            None => return CsimReply::Malformed,
        };
        pos += 1;
    }
    if pos == digits_start || text.get(pos) != Some(&b',') || text.get(pos + 1) != Some(&b'"') {
        return CsimReply::Malformed;
    }

    let hex_start = pos + 2;
    match text[hex_start..].iter().position(|&c| c == b'"' || c == b'\r' || c == b'\n') {
        Some(end) if text[hex_start + end] == b'"' => CsimReply::Apdu(CsimField {
            declared_len,
            hex: hex_start..hex_start + end,
        }),
        _ => CsimReply::Malformed,
    }
}

/// Why a `+CSIM:` payload could not be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer hex characters than the length field announced
    Truncated,
    /// A character that is not an uppercase hex digit
    NotHex,
    /// Payload too short to hold SW1 SW2
    NoStatusWord,
}

/// Decoded APDU response; the data bytes sit at the front of the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedApdu {
    pub data_len: usize,
    pub sw: StatusWord,
}

/// Decode the payload of `field` in place: data bytes land at `buf[..data_len]`
/// and the trailing SW1 SW2 is returned separately.
pub fn decode_in_place(buf: &mut [u8], field: &CsimField) -> Result<DecodedApdu, DecodeError> {
    let total = field.declared_len / 2;
    if total < 2 {
        return Err(DecodeError::NoStatusWord);
    }
    if field.hex.len() < total * 2 {
        return Err(DecodeError::Truncated);
    }

    let start = field.hex.start;
    let mut sw = [0u8; 2];
    for i in 0..total {
        let b = hex_pair(buf[start + 2 * i], buf[start + 2 * i + 1]).ok_or(DecodeError::NotHex)?;
        // write index i never overtakes read index start + 2i
        match i.checked_sub(total - 2) {
            Some(k) => sw[k] = b,
            None => buf[i] = b,
        }
    }

    Ok(DecodedApdu {
        data_len: total - 2,
        sw: StatusWord::from_bytes(sw[0], sw[1]),
    })
}

/// Registration `<stat>` from a `+CREG: <n>,<stat>[,...]` response
pub fn parse_creg(text: &[u8]) -> Option<u8> {
    let start = find(text, MODEM_CREG)? + MODEM_CREG.len();
    let line = &text[start..];
    let line = &line[..line.iter().position(|&c| c == b'\r' || c == b'\n').unwrap_or(line.len())];

    // unsolicited form carries only <stat>
    let stat = match line.iter().position(|&c| c == b',') {
        Some(comma) => &line[comma + 1..],
        None => line,
    };

    let digits = stat.iter().take(2).take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    Some(
        stat[..digits]
            .iter()
            .fold(0u8, |acc, &c| acc * 10 + (c - b'0')),
    )
}

/// CREG stat codes 1 and 5 mean the modem is registered
pub fn is_registered(stat: u8) -> bool {
    matches!(stat, CREG_REGISTERED_HOME | CREG_REGISTERED_ROAMING)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_markers() {
        assert!(has_terminal_marker(b"\r\nOK\r\n"));
        assert!(has_terminal_marker(b"\r\n+CME ERROR\r\n"));
        assert!(!has_terminal_marker(b"\r\n+CSIM: 4,\"9000\"\r\n"));
        assert!(!has_terminal_marker(b"OK"));
    }

    #[test]
    fn test_status_only_reply() {
        let mut text = b"\r\n+CSIM: 4,\"9000\"\r\nOK\r\n".to_vec();
        let CsimReply::Apdu(field) = scan_csim(&text) else {
            panic!("expected +CSIM payload");
        };
        assert_eq!(field.declared_len, 4);
        assert_eq!(field.hex(&text), b"9000");
        assert_eq!(field.status_only(&text), Some(StatusWord::SUCCESS));

        let decoded = decode_in_place(&mut text, &field).unwrap();
        assert_eq!(decoded.data_len, 0);
        assert_eq!(decoded.sw, StatusWord(0x9000));
    }

    #[test]
    fn test_decode_data_to_front() {
        let mut text = b"+CSIM: 10,\"0102039000\"\r\nOK\r\n".to_vec();
        let CsimReply::Apdu(field) = scan_csim(&text) else {
            panic!("expected +CSIM payload");
        };
        let decoded = decode_in_place(&mut text, &field).unwrap();
        assert_eq!(decoded.data_len, 3);
        assert_eq!(&text[..3], &[0x01, 0x02, 0x03]);
        assert!(decoded.sw.is_success());
    }

    #[test]
    fn test_scan_not_found() {
        assert_eq!(scan_csim(b"\r\nERROR\r\n"), CsimReply::NotFound);
    }

    #[test]
    fn test_scan_malformed() {
        assert_eq!(scan_csim(b"+CSIM: x4,\"9000\"\r\n"), CsimReply::Malformed);
        assert_eq!(scan_csim(b"+CSIM: ,\"9000\"\r\n"), CsimReply::Malformed);
        assert_eq!(scan_csim(b"+CSIM: 4,9000\r\n"), CsimReply::Malformed);
        assert_eq!(scan_csim(b"+CSIM: 4,\"9000\r\n"), CsimReply::Malformed);
        assert_eq!(scan_csim(b"+CSIM: 4"), CsimReply::Malformed);
    }

    #[test]
    fn test_scan_overlong_length_field() {
        assert_eq!(
            scan_csim(b"\r\n+CSIM: 99999999999999999999999,\"9000\"\r\nOK\r\n"),
            CsimReply::Malformed
        );
        assert_eq!(scan_csim(b"+CSIM: 0012,\"000300079000\"\r\n"), CsimReply::Malformed);

        let CsimReply::Apdu(field) = scan_csim(b"+CSIM: 520,\"00\"\r\n") else {
            panic!("expected +CSIM payload");
        };
        assert_eq!(field.declared_len, 520);
    }

    #[test]
    fn test_decode_errors() {
        let mut text = b"+CSIM: 6,\"01G000\"\r\n".to_vec();
        let CsimReply::Apdu(field) = scan_csim(&text) else {
            panic!("expected +CSIM payload");
        };
        assert_eq!(decode_in_place(&mut text, &field), Err(DecodeError::NotHex));

        let mut text = b"+CSIM: 8,\"9000\"\r\n".to_vec();
        let CsimReply::Apdu(field) = scan_csim(&text) else {
            panic!("expected +CSIM payload");
        };
        assert_eq!(decode_in_place(&mut text, &field), Err(DecodeError::Truncated));

        let mut text = b"+CSIM: 2,\"90\"\r\n".to_vec();
        let CsimReply::Apdu(field) = scan_csim(&text) else {
            panic!("expected +CSIM payload");
        };
        assert_eq!(decode_in_place(&mut text, &field), Err(DecodeError::NoStatusWord));
    }

    #[test]
    fn test_parse_creg() {
        assert_eq!(parse_creg(b"\r\n+CREG: 0,1\r\n\r\nOK\r\n"), Some(1));
        assert_eq!(parse_creg(b"\r\n+CREG: 2,5,\"00C3\",\"1234\"\r\nOK\r\n"), Some(5));
        assert_eq!(parse_creg(b"\r\n+CREG: 0,10\r\nOK\r\n"), Some(10));
        assert_eq!(parse_creg(b"\r\n+CREG: 3\r\n"), Some(3));
        assert_eq!(parse_creg(b"\r\nERROR\r\n"), None);
        assert_eq!(parse_creg(b"\r\n+CREG: 0,\r\n"), None);
    }

    #[test]
    fn test_is_registered() {
        assert!(is_registered(1));
        assert!(is_registered(5));
        assert!(!is_registered(0));
        assert!(!is_registered(2));
        assert!(!is_registered(10));
    }
}
