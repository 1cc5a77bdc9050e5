//! The decoded protocol message unit.

use crate::core::ber::BerElement;
use crate::core::tlv::TlvMessage;
use bytes::Bytes;

/// One decoded protocol message, tagged by wire-format family.
///
/// Produced by the codec library, consumed by an adapter's pure transition
/// function. Adapters never see raw sockets; they see `Frame`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// One text line, terminator stripped.
    TextLine(String),
    /// A dot-terminated multiline block (or a read-to-close text stream),
    /// terminator stripped and leading-dot lines unstuffed.
    TextBlock(Vec<String>),
    /// The payload of one length-prefixed binary frame, header stripped.
    LengthPrefixed(Bytes),
    /// A STUN/TURN-style TLV message.
    Tlv(TlvMessage),
    /// One BER element (possibly constructed).
    Ber(BerElement),
    /// Exactly N raw bytes of a fixed-width structure.
    FixedWidth(Bytes),
}

impl Frame {
    /// The text line, if this is a `TextLine` frame.
    pub fn as_line(&self) -> Option<&str> {
        match self {
            Frame::TextLine(line) => Some(line),
            _ => None,
        }
    }

    /// The raw payload bytes for binary frame variants.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Frame::LengthPrefixed(b) | Frame::FixedWidth(b) => Some(b),
            _ => None,
        }
    }

    /// The TLV message, if this is a `Tlv` frame.
    pub fn as_tlv(&self) -> Option<&TlvMessage> {
        match self {
            Frame::Tlv(msg) => Some(msg),
            _ => None,
        }
    }

    /// The BER element, if this is a `Ber` frame.
    pub fn as_ber(&self) -> Option<&BerElement> {
        match self {
            Frame::Ber(el) => Some(el),
            _ => None,
        }
    }
}
