//! Length-prefixed binary framing.
//!
//! A header of `header_len` bytes carries a length field of `len_width`
//! bytes at `len_offset`. The declared length covers either the payload
//! alone or the whole frame (`length_includes_header`), which together cover
//! both plain `[len(4)][payload]` frames and TPKT-style headers where the
//! 16-bit length at offset 2 counts the 4 header bytes too.
//!
//! Length is validated against the ceiling *before* any allocation.

use crate::error::DecodeError;
use crate::core::fixed::{self, Endian};
use bytes::{BufMut, Bytes, BytesMut};

/// Shape of a length-prefixed wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthPrefix {
    /// Total header bytes preceding the payload.
    pub header_len: usize,
    /// Offset of the length field within the header.
    pub len_offset: usize,
    /// Width of the length field in bytes (1, 2, 4, or 8).
    pub len_width: usize,
    /// Byte order of the length field.
    pub endian: Endian,
    /// Whether the declared length counts the header bytes.
    pub length_includes_header: bool,
    /// Ceiling for the payload size; declared lengths above it are rejected.
    pub max_payload: usize,
    /// Fixed header bytes outside the length field (TPKT version octet and
    /// reserved byte, for example). Only the first `header_len` bytes are
    /// used; the length field is written over its slot.
    pub template: [u8; 8],
}

impl LengthPrefix {
    /// The common `[u32 BE length][payload]` shape.
    pub fn u32_be(max_payload: usize) -> Self {
        Self {
            header_len: 4,
            len_offset: 0,
            len_width: 4,
            endian: Endian::Big,
            length_includes_header: false,
            max_payload,
            template: [0; 8],
        }
    }

    /// Read the declared length field out of `buf`.
    fn declared(&self, buf: &[u8]) -> Result<usize, DecodeError> {
        let raw = match self.len_width {
            1 => u64::from(fixed::get_u8(buf, self.len_offset)?),
            2 => u64::from(fixed::get_u16(buf, self.len_offset, self.endian)?),
            4 => u64::from(fixed::get_u32(buf, self.len_offset, self.endian)?),
            8 => fixed::get_u64(buf, self.len_offset, self.endian)?,
            _ => {
                return Err(DecodeError::Malformed {
                    offset: self.len_offset,
                    detail: "unsupported length field width",
                })
            }
        };
        Ok(raw as usize)
    }

    /// Decode one frame: full header, then exactly the declared payload.
    ///
    /// Returns the payload (header stripped) and the total bytes consumed.
    pub fn decode(&self, buf: &[u8]) -> Result<(Bytes, usize), DecodeError> {
        if buf.len() < self.header_len {
            return Err(DecodeError::Truncated {
                needed: self.header_len,
                available: buf.len(),
            });
        }

        let declared = self.declared(buf)?;
        let payload_len = if self.length_includes_header {
            declared
                .checked_sub(self.header_len)
                .ok_or(DecodeError::Malformed {
                    offset: self.len_offset,
                    detail: "declared length shorter than header",
                })?
        } else {
            declared
        };

        if payload_len > self.max_payload {
            return Err(DecodeError::FrameTooLarge {
                declared: payload_len,
                limit: self.max_payload,
            });
        }

        let total = self.header_len + payload_len;
        if buf.len() < total {
            return Err(DecodeError::Truncated {
                needed: total,
                available: buf.len(),
            });
        }

        Ok((
            Bytes::copy_from_slice(&buf[self.header_len..total]),
            total,
        ))
    }

    /// Encode `payload` under this header shape. Header bytes outside the
    /// length field come from `template`.
    pub fn encode(&self, payload: &[u8], out: &mut BytesMut) {
        let declared = if self.length_includes_header {
            self.header_len + payload.len()
        } else {
            payload.len()
        };

        let mut header = self.template[..self.header_len].to_vec();
        let mut field = BytesMut::with_capacity(self.len_width);
        match self.len_width {
            1 => field.put_u8(declared as u8),
            2 => fixed::put_u16(&mut field, declared as u16, self.endian),
            4 => fixed::put_u32(&mut field, declared as u32, self.endian),
            _ => fixed::put_u64(&mut field, declared as u64, self.endian),
        }
        header[self.len_offset..self.len_offset + self.len_width].copy_from_slice(&field);

        out.extend_from_slice(&header);
        out.extend_from_slice(payload);
    }
}
