#![allow(clippy::expect_used, clippy::unwrap_used)]
//! Property-based tests over the pure codec library.
//!
//! Decoders are the part of the crate directly exposed to attacker-chosen
//! bytes, so the key invariants are checked across random input: decoding
//! never panics, consumed counts never exceed the input, and well-formed
//! frames survive an encode/decode trip.

use netprobe::core::ber::BerElement;
use netprobe::core::codec::WireFormat;
use netprobe::core::length::LengthPrefix;
use netprobe::core::text::LineTerminator;
use netprobe::core::tlv::{TlvAttribute, TlvMessage};
use proptest::prelude::*;

// Property: no framing family panics on arbitrary bytes, and a successful
// decode never claims more bytes than it was given.
proptest! {
    #[test]
    fn prop_decoders_total_on_arbitrary_input(bytes in prop::collection::vec(any::<u8>(), 0..2048)) {
        let formats = [
            WireFormat::crlf_line(),
            WireFormat::DotBlock { terminator: LineTerminator::CrlfOrLf, max_len: 4096 },
            WireFormat::LengthPrefixed(LengthPrefix::u32_be(4096)),
            WireFormat::Tlv { max_body: 4096 },
            WireFormat::Ber { max_len: 4096 },
            WireFormat::FixedWidth { len: 16 },
        ];
        for format in formats {
            if let Ok((_, consumed)) = format.decode_frame(&bytes) {
                prop_assert!(consumed <= bytes.len());
                prop_assert!(consumed > 0 || bytes.is_empty());
            }
        }
    }
}

// Property: length-prefixed payloads round-trip, and the frame is not
// decodable from any strict prefix of its own encoding.
proptest! {
    #[test]
    fn prop_length_prefix_roundtrip(payload in prop::collection::vec(any::<u8>(), 0..512)) {
        let prefix = LengthPrefix::u32_be(1024);
        let mut wire = bytes::BytesMut::new();
        prefix.encode(&payload, &mut wire);

        let (decoded, consumed) = prefix.decode(&wire).expect("complete frame must decode");
        prop_assert_eq!(decoded.as_ref(), &payload[..]);
        prop_assert_eq!(consumed, wire.len());

        if !wire.is_empty() {
            prop_assert!(prefix.decode(&wire[..wire.len() - 1]).is_err());
        }
    }
}

// Property: TLV messages round-trip regardless of attribute value lengths
// (padding must be emitted and consumed consistently).
proptest! {
    #[test]
    fn prop_tlv_roundtrip(
        msg_type in any::<u16>(),
        txn in any::<[u8; 12]>(),
        values in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..8),
    ) {
        let mut msg = TlvMessage::new(msg_type, 0x2112_A442, txn);
        for (i, value) in values.into_iter().enumerate() {
            msg.attributes.push(TlvAttribute::new(i as u16, value));
        }
        let wire = msg.encode();
        let (decoded, consumed) = TlvMessage::decode(&wire, 65536).expect("encoded message must decode");
        prop_assert_eq!(consumed, wire.len());
        prop_assert_eq!(decoded, msg);
    }
}

// Property: BER integers of any value survive the trip with minimal encoding.
proptest! {
    #[test]
    fn prop_ber_integer_roundtrip(value in any::<i64>()) {
        let wire = BerElement::integer(value).to_bytes();
        let (decoded, consumed) = BerElement::decode(&wire, 64).expect("integer must decode");
        prop_assert_eq!(consumed, wire.len());
        prop_assert_eq!(decoded.as_i64(), Some(value));
    }
}

// Property: lines free of newline bytes round-trip under every terminator
// convention that accepts its own output.
proptest! {
    #[test]
    fn prop_text_line_roundtrip(line in "[ -~]{0,200}") {
        for terminator in [LineTerminator::Crlf, LineTerminator::Lf, LineTerminator::CrlfOrLf] {
            let mut wire = Vec::new();
            netprobe::core::text::encode_line(&line, terminator, &mut wire);
            let (decoded, consumed) =
                netprobe::core::text::decode_line(&wire, terminator, 4096).expect("line must decode");
            prop_assert_eq!(&decoded, &line);
            prop_assert_eq!(consumed, wire.len());
        }
    }
}
