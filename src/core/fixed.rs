//! Fixed-width integer primitives.
//!
//! Offset-aware reads over a byte slice, used for timestamp and header
//! fields. Each read either yields the full value or fails `Truncated`
//! with the byte counts needed to complete the field.

use crate::error::DecodeError;
use bytes::BufMut;

/// Byte order of a fixed-width field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

fn take<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N], DecodeError> {
    let end = offset.checked_add(N).ok_or(DecodeError::Malformed {
        offset,
        detail: "field offset overflow",
    })?;
    if buf.len() < end {
        return Err(DecodeError::Truncated {
            needed: end,
            available: buf.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&buf[offset..end]);
    Ok(out)
}

/// Read one byte at `offset`.
pub fn get_u8(buf: &[u8], offset: usize) -> Result<u8, DecodeError> {
    take::<1>(buf, offset).map(|b| b[0])
}

/// Read a u16 at `offset`.
pub fn get_u16(buf: &[u8], offset: usize, endian: Endian) -> Result<u16, DecodeError> {
    take::<2>(buf, offset).map(|b| match endian {
        Endian::Big => u16::from_be_bytes(b),
        Endian::Little => u16::from_le_bytes(b),
    })
}

/// Read a u32 at `offset`.
pub fn get_u32(buf: &[u8], offset: usize, endian: Endian) -> Result<u32, DecodeError> {
    take::<4>(buf, offset).map(|b| match endian {
        Endian::Big => u32::from_be_bytes(b),
        Endian::Little => u32::from_le_bytes(b),
    })
}

/// Read a u64 at `offset`.
pub fn get_u64(buf: &[u8], offset: usize, endian: Endian) -> Result<u64, DecodeError> {
    take::<8>(buf, offset).map(|b| match endian {
        Endian::Big => u64::from_be_bytes(b),
        Endian::Little => u64::from_le_bytes(b),
    })
}

/// Append a u16 in the given byte order.
pub fn put_u16(out: &mut impl BufMut, value: u16, endian: Endian) {
    match endian {
        Endian::Big => out.put_u16(value),
        Endian::Little => out.put_u16_le(value),
    }
}

/// Append a u32 in the given byte order.
pub fn put_u32(out: &mut impl BufMut, value: u32, endian: Endian) {
    match endian {
        Endian::Big => out.put_u32(value),
        Endian::Little => out.put_u32_le(value),
    }
}

/// Append a u64 in the given byte order.
pub fn put_u64(out: &mut impl BufMut, value: u64, endian: Endian) {
    match endian {
        Endian::Big => out.put_u64(value),
        Endian::Little => out.put_u64_le(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn round_trip_both_endiannesses() {
        let mut buf = BytesMut::new();
        put_u16(&mut buf, 0xBEEF, Endian::Big);
        put_u32(&mut buf, 0xDEADBEEF, Endian::Little);
        put_u64(&mut buf, 0x0102030405060708, Endian::Big);

        assert_eq!(get_u16(&buf, 0, Endian::Big).unwrap(), 0xBEEF);
        assert_eq!(get_u32(&buf, 2, Endian::Little).unwrap(), 0xDEADBEEF);
        assert_eq!(get_u64(&buf, 6, Endian::Big).unwrap(), 0x0102030405060708);
    }

    #[test]
    fn short_buffer_reports_truncated_with_counts() {
        let err = get_u32(&[0x00, 0x01], 0, Endian::Big).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated {
                needed: 4,
                available: 2
            }
        );
    }

    #[test]
    fn offset_past_end_is_truncated() {
        let err = get_u8(&[0xAA], 1).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));
    }
}
