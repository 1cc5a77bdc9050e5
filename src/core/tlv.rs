//! TLV (type-length-value) framing for STUN/TURN-style binary protocols.
//!
//! Wire shape:
//!
//! ```text
//! [Type(2 BE)] [Length(2 BE)] [Magic(4 BE)] [TransactionId(12)] [Attributes...]
//! ```
//!
//! The declared length covers the attribute section only. Each attribute is
//! `[Type(2)] [Length(2)] [Value(N)]` padded to a 4-byte boundary. The walk
//! stops exactly when the declared message length is consumed; an attribute
//! overrunning the envelope is `Malformed`, never out-of-bounds access.

use crate::core::fixed::{self, Endian};
use crate::error::DecodeError;
use bytes::{BufMut, Bytes, BytesMut};

/// Header bytes before the attribute section.
pub const HEADER_LEN: usize = 20;

/// Attribute alignment boundary.
pub const ATTR_ALIGN: usize = 4;

/// One TLV attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvAttribute {
    pub attr_type: u16,
    pub value: Bytes,
}

impl TlvAttribute {
    pub fn new(attr_type: u16, value: impl Into<Bytes>) -> Self {
        Self {
            attr_type,
            value: value.into(),
        }
    }
}

/// One decoded TLV message: fixed header plus walked attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlvMessage {
    pub msg_type: u16,
    pub magic: u32,
    pub transaction_id: [u8; 12],
    pub attributes: Vec<TlvAttribute>,
}

impl TlvMessage {
    pub fn new(msg_type: u16, magic: u32, transaction_id: [u8; 12]) -> Self {
        Self {
            msg_type,
            magic,
            transaction_id,
            attributes: Vec::new(),
        }
    }

    /// First attribute with the given type, if present.
    pub fn attribute(&self, attr_type: u16) -> Option<&TlvAttribute> {
        self.attributes.iter().find(|a| a.attr_type == attr_type)
    }

    /// Decode one message. Returns the message and total bytes consumed.
    pub fn decode(buf: &[u8], max_body: usize) -> Result<(Self, usize), DecodeError> {
        if buf.len() < HEADER_LEN {
            return Err(DecodeError::Truncated {
                needed: HEADER_LEN,
                available: buf.len(),
            });
        }

        let msg_type = fixed::get_u16(buf, 0, Endian::Big)?;
        let body_len = fixed::get_u16(buf, 2, Endian::Big)? as usize;
        let magic = fixed::get_u32(buf, 4, Endian::Big)?;

        if body_len > max_body {
            return Err(DecodeError::FrameTooLarge {
                declared: body_len,
                limit: max_body,
            });
        }
        if body_len % ATTR_ALIGN != 0 {
            return Err(DecodeError::Malformed {
                offset: 2,
                detail: "message length not aligned to attribute boundary",
            });
        }

        let total = HEADER_LEN + body_len;
        if buf.len() < total {
            return Err(DecodeError::Truncated {
                needed: total,
                available: buf.len(),
            });
        }

        let mut transaction_id = [0u8; 12];
        transaction_id.copy_from_slice(&buf[8..HEADER_LEN]);

        let attributes = decode_attributes(&buf[HEADER_LEN..total], HEADER_LEN)?;

        Ok((
            Self {
                msg_type,
                magic,
                transaction_id,
                attributes,
            },
            total,
        ))
    }

    /// Encode the message, computing the aligned body length.
    ///
    /// Attribute values and the total body must fit the wire's u16 length
    /// fields; adapter-built messages stay far below that.
    pub fn encode(&self) -> Bytes {
        let mut body = BytesMut::new();
        for attr in &self.attributes {
            debug_assert!(
                attr.value.len() <= u16::MAX as usize,
                "attribute value exceeds the u16 length field"
            );
            fixed::put_u16(&mut body, attr.attr_type, Endian::Big);
            fixed::put_u16(&mut body, attr.value.len() as u16, Endian::Big);
            body.extend_from_slice(&attr.value);
            let pad = (ATTR_ALIGN - attr.value.len() % ATTR_ALIGN) % ATTR_ALIGN;
            body.put_bytes(0, pad);
        }

        let mut out = BytesMut::with_capacity(HEADER_LEN + body.len());
        debug_assert!(
            body.len() <= u16::MAX as usize,
            "attribute section exceeds the u16 length field"
        );
        fixed::put_u16(&mut out, self.msg_type, Endian::Big);
        fixed::put_u16(&mut out, body.len() as u16, Endian::Big);
        fixed::put_u32(&mut out, self.magic, Endian::Big);
        out.extend_from_slice(&self.transaction_id);
        out.extend_from_slice(&body);
        out.freeze()
    }
}

/// Walk the attribute section. `base` is the absolute offset of the section
/// within the message, used for error reporting.
fn decode_attributes(body: &[u8], base: usize) -> Result<Vec<TlvAttribute>, DecodeError> {
    let mut attrs = Vec::new();
    let mut pos = 0usize;

    while pos < body.len() {
        let attr_type = fixed::get_u16(body, pos, Endian::Big).map_err(|_| {
            DecodeError::Malformed {
                offset: base + pos,
                detail: "attribute header overruns message envelope",
            }
        })?;
        let value_len = fixed::get_u16(body, pos + 2, Endian::Big).map_err(|_| {
            DecodeError::Malformed {
                offset: base + pos + 2,
                detail: "attribute header overruns message envelope",
            }
        })? as usize;

        let value_start = pos + 4;
        let value_end = value_start + value_len;
        if value_end > body.len() {
            return Err(DecodeError::Malformed {
                offset: base + value_start,
                detail: "attribute value overruns message envelope",
            });
        }

        attrs.push(TlvAttribute {
            attr_type,
            value: Bytes::copy_from_slice(&body[value_start..value_end]),
        });

        let pad = (ATTR_ALIGN - value_len % ATTR_ALIGN) % ATTR_ALIGN;
        pos = value_end + pad;
    }

    Ok(attrs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TlvMessage {
        let mut msg = TlvMessage::new(0x0001, 0x2112_A442, [7u8; 12]);
        msg.attributes.push(TlvAttribute::new(
            0x8022,
            Bytes::from_static(b"probe"), // 5 bytes, forces 3 padding bytes
        ));
        msg.attributes
            .push(TlvAttribute::new(0x0020, Bytes::from_static(&[0, 1, 2, 3])));
        msg
    }

    #[test]
    fn round_trip_with_padded_attribute() {
        let msg = sample();
        let wire = msg.encode();
        let (decoded, consumed) = TlvMessage::decode(&wire, 1024).unwrap();
        assert_eq!(decoded, msg);
        assert_eq!(consumed, wire.len());
    }

    #[test]
    fn attribute_overrunning_envelope_is_malformed() {
        let msg = sample();
        let mut wire = BytesMut::from(msg.encode().as_ref());
        // Inflate the last attribute's declared value length past the body.
        let last_attr_len_offset = wire.len() - 4 - 2;
        wire[last_attr_len_offset] = 0xFF;
        wire[last_attr_len_offset + 1] = 0xFF;

        let err = TlvMessage::decode(&wire, 1024).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }

    #[test]
    fn short_header_is_truncated() {
        let err = TlvMessage::decode(&[0u8; 10], 1024).unwrap_err();
        assert_eq!(
            err,
            DecodeError::Truncated {
                needed: HEADER_LEN,
                available: 10
            }
        );
    }

    #[test]
    fn oversized_body_is_rejected() {
        let mut wire = BytesMut::new();
        fixed::put_u16(&mut wire, 0x0001, Endian::Big);
        fixed::put_u16(&mut wire, 0x1000, Endian::Big); // 4096-byte body
        fixed::put_u32(&mut wire, 0x2112_A442, Endian::Big);
        wire.put_bytes(0, 12);

        let err = TlvMessage::decode(&wire, 64).unwrap_err();
        assert_eq!(
            err,
            DecodeError::FrameTooLarge {
                declared: 4096,
                limit: 64
            }
        );
    }

    #[test]
    #[should_panic(expected = "attribute value exceeds the u16 length field")]
    fn encode_rejects_attribute_over_u16() {
        let mut msg = TlvMessage::new(0x0001, 0x2112_A442, [0u8; 12]);
        msg.attributes
            .push(TlvAttribute::new(0x8022, vec![0u8; u16::MAX as usize + 1]));
        let _ = msg.encode();
    }
}
