//! ASN.1 BER (Basic Encoding Rules) primitives.
//!
//! Just enough BER for directory-protocol envelopes: universal INTEGER,
//! OCTET STRING, ENUMERATED, and BOOLEAN primitives, plus arbitrary
//! constructed elements (SEQUENCE, application- and context-tagged). Lengths
//! may be short form or definite long form up to four octets; indefinite
//! lengths and multi-octet tag numbers are outside the supported subset and
//! decode as `Malformed`.
//!
//! Constructed elements decode recursively with a depth cap, so a hostile
//! peer cannot drive unbounded recursion.

use crate::config::MAX_BER_DEPTH;
use crate::error::DecodeError;
use bytes::{BufMut, Bytes, BytesMut};

/// Universal tags used by the adapters.
pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_ENUMERATED: u8 = 0x0A;
pub const TAG_SEQUENCE: u8 = 0x30;

/// Constructed bit in the identifier octet.
pub const CONSTRUCTED: u8 = 0x20;
/// Application class bits.
pub const CLASS_APPLICATION: u8 = 0x40;
/// Context-specific class bits.
pub const CLASS_CONTEXT: u8 = 0x80;

/// One BER element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BerElement {
    /// Primitive element: identifier octet and raw contents.
    Primitive { tag: u8, value: Bytes },
    /// Constructed element: identifier octet and child elements.
    Constructed { tag: u8, children: Vec<BerElement> },
}

impl BerElement {
    /// Universal INTEGER with minimal two's-complement contents.
    pub fn integer(value: i64) -> Self {
        let bytes = value.to_be_bytes();
        // Trim redundant leading octets while preserving the sign bit.
        let mut start = 0;
        while start < 7 {
            let octet = bytes[start];
            let next_msb = bytes[start + 1] & 0x80;
            if (octet == 0x00 && next_msb == 0) || (octet == 0xFF && next_msb != 0) {
                start += 1;
            } else {
                break;
            }
        }
        BerElement::Primitive {
            tag: TAG_INTEGER,
            value: Bytes::copy_from_slice(&bytes[start..]),
        }
    }

    /// Universal OCTET STRING.
    pub fn octet_string(value: impl Into<Bytes>) -> Self {
        BerElement::Primitive {
            tag: TAG_OCTET_STRING,
            value: value.into(),
        }
    }

    /// Primitive with a context-specific tag (e.g. LDAP simple credentials).
    pub fn context_primitive(tag_number: u8, value: impl Into<Bytes>) -> Self {
        BerElement::Primitive {
            tag: CLASS_CONTEXT | tag_number,
            value: value.into(),
        }
    }

    /// Universal SEQUENCE.
    pub fn sequence(children: Vec<BerElement>) -> Self {
        BerElement::Constructed {
            tag: TAG_SEQUENCE,
            children,
        }
    }

    /// Constructed element with an application tag (e.g. LDAP BindRequest).
    pub fn application(tag_number: u8, children: Vec<BerElement>) -> Self {
        BerElement::Constructed {
            tag: CLASS_APPLICATION | CONSTRUCTED | tag_number,
            children,
        }
    }

    /// The identifier octet.
    pub fn tag(&self) -> u8 {
        match self {
            BerElement::Primitive { tag, .. } | BerElement::Constructed { tag, .. } => *tag,
        }
    }

    /// Children of a constructed element, empty slice for primitives.
    pub fn children(&self) -> &[BerElement] {
        match self {
            BerElement::Constructed { children, .. } => children,
            BerElement::Primitive { .. } => &[],
        }
    }

    /// Interpret a primitive's contents as a BER integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            BerElement::Primitive { value, .. } if !value.is_empty() && value.len() <= 8 => {
                let mut acc: i64 = if value[0] & 0x80 != 0 { -1 } else { 0 };
                for &b in value.iter() {
                    acc = (acc << 8) | i64::from(b);
                }
                Some(acc)
            }
            _ => None,
        }
    }

    /// Interpret a primitive's contents as UTF-8 text.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            BerElement::Primitive { value, .. } => std::str::from_utf8(value).ok(),
            _ => None,
        }
    }

    /// Decode one element. Returns the element and total bytes consumed.
    pub fn decode(buf: &[u8], max_len: usize) -> Result<(Self, usize), DecodeError> {
        decode_at(buf, 0, max_len, 0)
    }

    /// Encode the element, including identifier and length octets.
    pub fn encode(&self, out: &mut BytesMut) {
        match self {
            BerElement::Primitive { tag, value } => {
                out.put_u8(*tag);
                encode_length(value.len(), out);
                out.extend_from_slice(value);
            }
            BerElement::Constructed { tag, children } => {
                let mut inner = BytesMut::new();
                for child in children {
                    child.encode(&mut inner);
                }
                out.put_u8(*tag);
                encode_length(inner.len(), out);
                out.extend_from_slice(&inner);
            }
        }
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut out = BytesMut::new();
        self.encode(&mut out);
        out.freeze()
    }
}

fn encode_length(len: usize, out: &mut BytesMut) {
    if len < 0x80 {
        out.put_u8(len as u8);
    } else {
        let bytes = (len as u32).to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        out.put_u8(0x80 | (4 - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
}

/// Decode the length octets at `offset`. Returns (content length, octets used).
fn decode_length(buf: &[u8], offset: usize) -> Result<(usize, usize), DecodeError> {
    let first = *buf.get(offset).ok_or(DecodeError::Truncated {
        needed: offset + 1,
        available: buf.len(),
    })?;

    if first < 0x80 {
        return Ok((first as usize, 1));
    }
    if first == 0x80 {
        return Err(DecodeError::Malformed {
            offset,
            detail: "indefinite BER length not supported",
        });
    }

    let count = (first & 0x7F) as usize;
    if count > 4 {
        return Err(DecodeError::Malformed {
            offset,
            detail: "BER long-form length wider than 4 octets",
        });
    }
    let end = offset + 1 + count;
    if buf.len() < end {
        return Err(DecodeError::Truncated {
            needed: end,
            available: buf.len(),
        });
    }

    let mut len = 0usize;
    for &b in &buf[offset + 1..end] {
        len = (len << 8) | b as usize;
    }
    Ok((len, 1 + count))
}

fn decode_at(
    buf: &[u8],
    offset: usize,
    max_len: usize,
    depth: usize,
) -> Result<(BerElement, usize), DecodeError> {
    if depth > MAX_BER_DEPTH {
        return Err(DecodeError::Malformed {
            offset,
            detail: "BER nesting exceeds depth limit",
        });
    }

    let tag = *buf.get(offset).ok_or(DecodeError::Truncated {
        needed: offset + 1,
        available: buf.len(),
    })?;
    if tag & 0x1F == 0x1F {
        return Err(DecodeError::Malformed {
            offset,
            detail: "multi-octet BER tag numbers not supported",
        });
    }

    let (len, len_octets) = decode_length(buf, offset + 1)?;
    if len > max_len {
        return Err(DecodeError::FrameTooLarge {
            declared: len,
            limit: max_len,
        });
    }

    let content_start = offset + 1 + len_octets;
    let content_end = content_start + len;
    if buf.len() < content_end {
        return Err(DecodeError::Truncated {
            needed: content_end,
            available: buf.len(),
        });
    }

    let consumed = content_end - offset;
    if tag & CONSTRUCTED == 0 {
        return Ok((
            BerElement::Primitive {
                tag,
                value: Bytes::copy_from_slice(&buf[content_start..content_end]),
            },
            consumed,
        ));
    }

    // Constructed: children must consume exactly the declared content length.
    let mut children = Vec::new();
    let mut pos = content_start;
    while pos < content_end {
        let (child, used) = decode_at(&buf[..content_end], pos, max_len, depth + 1)?;
        children.push(child);
        pos += used;
    }

    Ok((BerElement::Constructed { tag, children }, consumed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_round_trip() {
        for value in [0i64, 1, 127, 128, 255, 256, -1, -128, -129, 65535, -65536] {
            let el = BerElement::integer(value);
            let wire = el.to_bytes();
            let (decoded, consumed) = BerElement::decode(&wire, 1024).unwrap();
            assert_eq!(consumed, wire.len());
            assert_eq!(decoded.as_i64(), Some(value), "value {value}");
        }
    }

    #[test]
    fn nested_constructed_round_trip() {
        let el = BerElement::application(
            0,
            vec![
                BerElement::integer(3),
                BerElement::octet_string(Bytes::from_static(b"cn=probe")),
                BerElement::context_primitive(0, Bytes::from_static(b"secret")),
            ],
        );
        let wire = BerElement::sequence(vec![BerElement::integer(1), el.clone()]).to_bytes();

        let (decoded, consumed) = BerElement::decode(&wire, 4096).unwrap();
        assert_eq!(consumed, wire.len());
        assert_eq!(decoded.children().len(), 2);
        assert_eq!(decoded.children()[1], el);
    }

    #[test]
    fn long_form_length_round_trip() {
        let payload = vec![0x55u8; 300]; // forces 0x82 long form
        let el = BerElement::octet_string(Bytes::from(payload.clone()));
        let wire = el.to_bytes();
        assert_eq!(wire[1], 0x82);

        let (decoded, _) = BerElement::decode(&wire, 4096).unwrap();
        match decoded {
            BerElement::Primitive { value, .. } => assert_eq!(value.as_ref(), &payload[..]),
            _ => panic!("expected primitive"),
        }
    }

    #[test]
    fn truncated_content_is_reported() {
        let wire = BerElement::octet_string(Bytes::from_static(b"abcdef")).to_bytes();
        let err = BerElement::decode(&wire[..4], 1024).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { .. }));
    }

    #[test]
    fn indefinite_length_is_malformed() {
        let err = BerElement::decode(&[0x30, 0x80, 0x00, 0x00], 1024).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Malformed { offset: 1, .. }
        ));
    }

    #[test]
    fn depth_bomb_is_rejected() {
        // MAX_BER_DEPTH+2 nested sequences, innermost empty.
        let mut wire = Vec::new();
        for _ in 0..(MAX_BER_DEPTH + 2) {
            let mut next = vec![0x30, wire.len() as u8];
            next.extend_from_slice(&wire);
            wire = next;
        }
        let err = BerElement::decode(&wire, 4096).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }
}
