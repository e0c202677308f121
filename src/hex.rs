//! ASCII decimal and hex formatting into the work buffer

use crate::types::Safe2Error;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

/// Largest value `put_decimal` can render
pub const DECIMAL_MAX: i32 = 999;

fn ensure_room(buf: &[u8], offset: usize, len: usize) -> Result<(), Safe2Error> {
    let needed = offset + len;
    if needed > buf.len() {
        return Err(Safe2Error::BufferOverflow {
            needed,
            capacity: buf.len(),
        });
    }
    Ok(())
}

/// Write `value` as 1 to 3 ASCII decimal digits at `offset`, returning the offset after them.
///
/// Negative values are written as `0`; this clamps rather than rejects.
pub fn put_decimal(buf: &mut [u8], value: i32, offset: usize) -> Result<usize, Safe2Error> {
    let mut v = value.max(0);
    if v > DECIMAL_MAX {
        return Err(Safe2Error::InvalidParameter(format!(
            "Decimal value {} exceeds {}",
            v, DECIMAL_MAX
        )));
    }

    let width = match v {
        100.. => 3,
        10.. => 2,
        _ => 1,
    };
    ensure_room(buf, offset, width)?;

    // least significant digit first, placed backwards
    let mut pos = offset + width;
    loop {
        pos -= 1;
        buf[pos] = b'0' + (v % 10) as u8;
        v /= 10;
        if v == 0 {
            break;
        }
    }
    Ok(offset + width)
}

/// Write `byte` as two uppercase hex digits at `offset`
pub fn put_hex_byte(buf: &mut [u8], byte: u8, offset: usize) -> Result<usize, Safe2Error> {
    ensure_room(buf, offset, 2)?;
    buf[offset] = HEX_DIGITS[(byte >> 4) as usize];
    buf[offset + 1] = HEX_DIGITS[(byte & 0x0F) as usize];
    Ok(offset + 2)
}

/// Copy raw bytes into the buffer at `offset`
pub fn put_bytes(buf: &mut [u8], bytes: &[u8], offset: usize) -> Result<usize, Safe2Error> {
    ensure_room(buf, offset, bytes.len())?;
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
    Ok(offset + bytes.len())
}

/// Value of an uppercase hex digit. Lowercase is not produced by modems and is rejected.
pub fn hex_digit(c: u8) -> Option<u8> {
    HEX_DIGITS.iter().position(|&d| d == c).map(|i| i as u8)
}

/// Decode two hex characters into a byte
pub fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    Some((hex_digit(hi)? << 4) | hex_digit(lo)?)
}

/// Decode 4 hex characters into a 16-bit value
pub fn hex_u16(chars: &[u8]) -> Option<u16> {
    if chars.len() != 4 {
        return None;
    }
    chars
        .iter()
        .try_fold(0u16, |acc, &c| Some((acc << 4) | hex_digit(c)? as u16))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_byte_round_trip() {
        let mut buf = [0u8; 2];
        for b in 0..=255u8 {
            assert_eq!(put_hex_byte(&mut buf, b, 0).unwrap(), 2);
            assert_eq!(hex_pair(buf[0], buf[1]), Some(b));
        }
    }

    #[test]
    fn test_decimal_minimal_width() {
        let mut buf = [0u8; 3];
        for v in 0..1000 {
            let end = put_decimal(&mut buf, v, 0).unwrap();
            assert_eq!(&buf[..end], v.to_string().as_bytes());
        }
    }

    #[test]
    fn test_decimal_at_offset() {
        let mut buf = *b"xx____";
        assert_eq!(put_decimal(&mut buf, 34, 2).unwrap(), 4);
        assert_eq!(&buf, b"xx34__");
    }

    #[test]
    fn test_decimal_negative_clamped() {
        let mut buf = [0u8; 3];
        assert_eq!(put_decimal(&mut buf, -12, 0).unwrap(), 1);
        assert_eq!(buf[0], b'0');
    }

    #[test]
    fn test_decimal_too_large() {
        let mut buf = [0u8; 4];
        assert!(matches!(
            put_decimal(&mut buf, 1000, 0),
            Err(Safe2Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_decimal_no_room() {
        let mut buf = [0u8; 4];
        assert!(matches!(
            put_decimal(&mut buf, 123, 2),
            Err(Safe2Error::BufferOverflow { needed: 5, capacity: 4 })
        ));
    }

    #[test]
    fn test_hex_digit_rejects_non_hex() {
        assert_eq!(hex_digit(b'0'), Some(0));
        assert_eq!(hex_digit(b'F'), Some(15));
        assert_eq!(hex_digit(b'f'), None);
        assert_eq!(hex_digit(b'G'), None);
        assert_eq!(hex_digit(b'"'), None);
    }

    #[test]
    fn test_hex_u16() {
        assert_eq!(hex_u16(b"0007"), Some(0x0007));
        assert_eq!(hex_u16(b"90FF"), Some(0x90FF));
        assert_eq!(hex_u16(b"00G7"), None);
        assert_eq!(hex_u16(b"007"), None);
    }
}
