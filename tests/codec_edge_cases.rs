#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
//! Edge-case tests for the pure codec library: boundary conditions,
//! truncation handling, ceilings, and malformed input across every framing
//! family.

use netprobe::core::ber::{self, BerElement};
use netprobe::core::codec::WireFormat;
use netprobe::core::frame::Frame;
use netprobe::core::length::LengthPrefix;
use netprobe::core::text::LineTerminator;
use netprobe::core::tlv::TlvMessage;
use netprobe::error::DecodeError;

// ============================================================================
// LENGTH-PREFIXED FRAMES
// ============================================================================

#[test]
fn test_partial_header_reports_truncated_not_error() {
    let prefix = LengthPrefix::u32_be(1024);
    // Three of four header bytes: `00 00 00` of `00 00 00 05`
    let err = prefix.decode(&[0x00, 0x00, 0x00]).unwrap_err();
    assert_eq!(
        err,
        DecodeError::Truncated {
            needed: 4,
            available: 3
        }
    );
}

#[test]
fn test_declared_length_awaits_full_payload() {
    let prefix = LengthPrefix::u32_be(1024);
    // Header declares 5 payload bytes, only 2 present
    let buf = [0x00, 0x00, 0x00, 0x05, 0xAA, 0xBB];
    let err = prefix.decode(&buf).unwrap_err();
    assert_eq!(
        err,
        DecodeError::Truncated {
            needed: 9,
            available: 6
        }
    );

    // With the full payload the frame decodes and consumes exactly 9 bytes
    let buf = [0x00, 0x00, 0x00, 0x05, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0x99];
    let (payload, consumed) = prefix.decode(&buf).unwrap();
    assert_eq!(payload.as_ref(), &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE]);
    assert_eq!(consumed, 9);
}

#[test]
fn test_zero_length_payload_is_valid() {
    let prefix = LengthPrefix::u32_be(1024);
    let (payload, consumed) = prefix.decode(&[0x00, 0x00, 0x00, 0x00]).unwrap();
    assert!(payload.is_empty());
    assert_eq!(consumed, 4);
}

#[test]
fn test_ceiling_enforced_before_buffering() {
    let prefix = LengthPrefix::u32_be(16);
    // Declares 4GB-ish; must be rejected from the header alone
    let buf = [0xFF, 0xFF, 0xFF, 0xF0];
    assert!(matches!(
        prefix.decode(&buf),
        Err(DecodeError::FrameTooLarge { .. })
    ));
}

// ============================================================================
// TEXT LINES AND DOT BLOCKS
// ============================================================================

#[test]
fn test_line_without_terminator_is_incomplete() {
    let wire = WireFormat::Line {
        terminator: LineTerminator::CrlfOrLf,
        max_len: 128,
    };
    assert!(matches!(
        wire.decode_frame(b"220 partial banner"),
        Err(DecodeError::Truncated { .. })
    ));
}

#[test]
fn test_line_over_ceiling_rejected_even_unterminated() {
    let wire = WireFormat::Line {
        terminator: LineTerminator::CrlfOrLf,
        max_len: 8,
    };
    assert!(matches!(
        wire.decode_frame(b"AAAAAAAAAAAAAAAA"),
        Err(DecodeError::FrameTooLarge { .. })
    ));
}

#[test]
fn test_dot_block_unstuffs_leading_dots() {
    let wire = WireFormat::DotBlock {
        terminator: LineTerminator::Crlf,
        max_len: 1024,
    };
    let buf = b"line one\r\n..starts with dot\r\n.\r\n";
    let (frame, consumed) = wire.decode_frame(buf).unwrap();
    assert_eq!(consumed, buf.len());
    match frame {
        Frame::TextBlock(lines) => {
            assert_eq!(lines, vec!["line one", ".starts with dot"]);
        }
        other => panic!("expected TextBlock, got {other:?}"),
    }
}

#[test]
fn test_dot_block_without_terminator_line_is_incomplete() {
    let wire = WireFormat::DotBlock {
        terminator: LineTerminator::Crlf,
        max_len: 1024,
    };
    assert!(matches!(
        wire.decode_frame(b"line one\r\nline two\r\n"),
        Err(DecodeError::Truncated { .. })
    ));
}

// ============================================================================
// TLV MESSAGES
// ============================================================================

#[test]
fn test_tlv_attribute_padding_is_consumed() {
    let mut msg = TlvMessage::new(0x0001, 0x2112_A442, [9; 12]);
    msg.attributes.push(netprobe::core::tlv::TlvAttribute::new(
        0x8022,
        &b"abcde"[..], // 5 bytes, pads to 8
    ));
    let wire = msg.encode();
    let (decoded, consumed) = TlvMessage::decode(&wire, 4096).unwrap();
    assert_eq!(consumed, wire.len());
    assert_eq!(decoded.attribute(0x8022).unwrap().value.as_ref(), b"abcde");
}

#[test]
fn test_tlv_attribute_overrunning_body_is_malformed() {
    let msg = TlvMessage::new(0x0001, 0x2112_A442, [9; 12]);
    let mut wire = msg.encode().to_vec();
    // Claim a 12-byte body holding an attribute whose length overruns it
    wire[2..4].copy_from_slice(&8u16.to_be_bytes());
    wire.extend_from_slice(&0x8022u16.to_be_bytes());
    wire.extend_from_slice(&64u16.to_be_bytes()); // length 64, only 4 left
    wire.extend_from_slice(&[0; 4]);
    assert!(matches!(
        TlvMessage::decode(&wire, 4096),
        Err(DecodeError::Malformed { .. })
    ));
}

#[test]
fn test_tlv_unaligned_body_is_malformed() {
    let msg = TlvMessage::new(0x0001, 0x2112_A442, [9; 12]);
    let mut wire = msg.encode().to_vec();
    wire[2..4].copy_from_slice(&3u16.to_be_bytes()); // not 4-aligned
    wire.extend_from_slice(&[0; 3]);
    assert!(matches!(
        TlvMessage::decode(&wire, 4096),
        Err(DecodeError::Malformed { .. })
    ));
}

// ============================================================================
// BER ELEMENTS
// ============================================================================

#[test]
fn test_ber_nesting_depth_is_capped() {
    // A well-formed sequence-of-sequence bomb deeper than the cap
    let mut wire = vec![ber::TAG_INTEGER, 0x01, 0x00];
    for _ in 0..32 {
        let mut outer = vec![ber::TAG_SEQUENCE, wire.len() as u8];
        outer.extend_from_slice(&wire);
        wire = outer;
    }
    assert!(matches!(
        BerElement::decode(&wire, 4096),
        Err(DecodeError::Malformed { .. })
    ));
}

#[test]
fn test_ber_indefinite_length_rejected() {
    // OCTET STRING with the indefinite-length octet 0x80
    assert!(matches!(
        BerElement::decode(&[ber::TAG_OCTET_STRING, 0x80, 0x01, 0x02], 4096),
        Err(DecodeError::Malformed { .. })
    ));
}

#[test]
fn test_ber_long_form_length_round_trip() {
    let payload = vec![0x55u8; 300]; // needs a two-octet long-form length
    let el = BerElement::octet_string(payload.clone());
    let wire = el.to_bytes();
    let (decoded, consumed) = BerElement::decode(&wire, 4096).unwrap();
    assert_eq!(consumed, wire.len());
    match decoded {
        BerElement::Primitive { value, .. } => assert_eq!(value.as_ref(), &payload[..]),
        other => panic!("expected primitive, got {other:?}"),
    }
}

// ============================================================================
// FIXED-WIDTH AND READ-TO-CLOSE
// ============================================================================

#[test]
fn test_fixed_width_needs_exact_count() {
    let wire = WireFormat::FixedWidth { len: 4 };
    assert!(matches!(
        wire.decode_frame(&[0x83, 0xAA]),
        Err(DecodeError::Truncated { .. })
    ));
    let (frame, consumed) = wire.decode_frame(&[0x83, 0xAA, 0x7E, 0x80, 0xFF]).unwrap();
    assert_eq!(consumed, 4);
    assert!(matches!(frame, Frame::FixedWidth(b) if b.len() == 4));
}

#[test]
fn test_until_close_never_completes_mid_stream() {
    let wire = WireFormat::UntilClose { max_len: 1024 };
    assert!(matches!(
        wire.decode_frame(b"some output\r\nmore\r\n"),
        Err(DecodeError::Truncated { .. })
    ));
}
