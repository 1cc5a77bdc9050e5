//! RDP availability probe: TPKT + X.224 Connection Request with an RDP
//! negotiation request (MS-RDPBCGR 2.2.1.1).
//!
//! One exchange: send CR TPDU asking for TLS security, read the Connection
//! Confirm. A negotiation response reports the selected protocol, a
//! negotiation failure reports the server's failure code, and a bare CC
//! (pre-RDP 5.x) reports that negotiation is unsupported. All three are
//! successful probe outcomes; the service answered as RDP.

use crate::core::fixed::{get_u32, get_u8, Endian};
use crate::core::length::LengthPrefix;
use crate::core::{Frame, WireFormat};
use crate::error::{ProbeError, Result};
use crate::protocol::adapter::{Greeting, Phase, ProbeSpec, Step};
use crate::protocol::auth::AuthStrategy;
use bytes::Bytes;
use serde_json::{Map, Value};
use std::sync::Arc;

const TPKT_VERSION: u8 = 3;
const MAX_TPKT_PAYLOAD: usize = 1024;

const X224_CONNECTION_CONFIRM: u8 = 0xD0;

const NEG_TYPE_RESPONSE: u8 = 0x02;
const NEG_TYPE_FAILURE: u8 = 0x03;

/// Protocol flags of the negotiation request (TLS security).
const REQUEST_PROTOCOL_TLS: u32 = 0x0000_0001;

/// TPKT framing: version, reserved, u16 BE total length including header.
fn tpkt() -> LengthPrefix {
    LengthPrefix {
        header_len: 4,
        len_offset: 2,
        len_width: 2,
        endian: Endian::Big,
        length_includes_header: true,
        max_payload: MAX_TPKT_PAYLOAD,
        template: [TPKT_VERSION, 0, 0, 0, 0, 0, 0, 0],
    }
}

/// X.224 CR TPDU carrying an RDP_NEG_REQ.
fn connection_request() -> Bytes {
    let mut payload = Vec::with_capacity(15);
    // LI counts everything after itself: 6 fixed octets + 8 of RDP_NEG_REQ.
    payload.push(14);
    payload.push(0xE0); // CR, credit 0
    payload.extend_from_slice(&[0, 0]); // DST-REF
    payload.extend_from_slice(&[0, 0]); // SRC-REF
    payload.push(0); // class 0
    payload.push(0x01); // RDP_NEG_REQ
    payload.push(0); // flags
    payload.extend_from_slice(&8u16.to_le_bytes()); // length
    payload.extend_from_slice(&REQUEST_PROTOCOL_TLS.to_le_bytes());
    Bytes::from(payload)
}

fn selected_protocol_name(value: u32) -> &'static str {
    match value {
        0x0000_0000 => "rdp",
        0x0000_0001 => "tls",
        0x0000_0002 => "credssp",
        0x0000_0008 => "rdstls",
        _ => "unknown",
    }
}

fn confirm_fields(payload: &[u8]) -> Result<Step> {
    let tpdu_code = get_u8(payload, 1)? & 0xF0;
    if tpdu_code != X224_CONNECTION_CONFIRM {
        return Err(ProbeError::unexpected_frame());
    }

    let mut fields = Map::new();
    // Fixed CC part ends at offset 7; a negotiation structure follows, if any.
    if payload.len() <= 7 {
        fields.insert("negotiation".into(), Value::from("unsupported"));
        return Ok(Step::Done(fields));
    }

    match get_u8(payload, 7)? {
        NEG_TYPE_RESPONSE => {
            let selected = get_u32(payload, 11, Endian::Little)?;
            fields.insert("negotiation".into(), Value::from("success"));
            fields.insert("selectedProtocol".into(), Value::from(selected));
            fields.insert(
                "selectedProtocolName".into(),
                Value::from(selected_protocol_name(selected)),
            );
        }
        NEG_TYPE_FAILURE => {
            let code = get_u32(payload, 11, Endian::Little)?;
            fields.insert("negotiation".into(), Value::from("failure"));
            fields.insert("failureCode".into(), Value::from(code));
        }
        _ => return Err(ProbeError::unexpected_frame()),
    }
    Ok(Step::Done(fields))
}

pub fn spec() -> ProbeSpec {
    ProbeSpec {
        name: "rdp",
        default_port: 3389,
        wire: WireFormat::LengthPrefixed(tpkt()),
        greeting: Greeting::ClientFirst(Arc::new(|_session| {
            Ok(Frame::LengthPrefixed(connection_request()))
        })),
        auth: AuthStrategy::None,
        transition: Arc::new(|_session, phase, frame| {
            if phase != Phase::AwaitingGreeting {
                return Err(ProbeError::unexpected_frame());
            }
            let payload = frame.as_bytes().ok_or_else(ProbeError::unexpected_frame)?;
            confirm_fields(payload)
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::session::Session;

    fn confirm(neg: &[u8]) -> Frame {
        let mut payload = vec![
            (6 + neg.len()) as u8, // LI
            0xD0,                  // CC
            0,
            0, // DST-REF
            0,
            0, // SRC-REF
            0, // class 0
        ];
        payload.extend_from_slice(neg);
        Frame::LengthPrefixed(Bytes::from(payload))
    }

    #[test]
    fn connection_request_is_well_formed() {
        let req = connection_request();
        assert_eq!(req.len(), 15);
        assert_eq!(req[0], 14); // LI
        assert_eq!(req[1], 0xE0); // CR
        assert_eq!(req[7], 0x01); // RDP_NEG_REQ
        assert_eq!(&req[11..15], &REQUEST_PROTOCOL_TLS.to_le_bytes());
    }

    #[test]
    fn negotiation_response_reports_selected_protocol() {
        let mut session = Session::new(Map::new());
        // type, flags, length 8 LE, PROTOCOL_SSL LE
        let frame = confirm(&[0x02, 0x00, 0x08, 0x00, 0x01, 0x00, 0x00, 0x00]);
        let step = (spec().transition)(&mut session, Phase::AwaitingGreeting, &frame).unwrap();
        match step {
            Step::Done(fields) => {
                assert_eq!(fields["negotiation"], Value::from("success"));
                assert_eq!(fields["selectedProtocol"], Value::from(1u32));
                assert_eq!(fields["selectedProtocolName"], Value::from("tls"));
            }
            _ => panic!("expected Done"),
        }
    }

    #[test]
    fn negotiation_failure_reports_code() {
        let mut session = Session::new(Map::new());
        // SSL_REQUIRED_BY_SERVER (1)
        let frame = confirm(&[0x03, 0x00, 0x08, 0x00, 0x01, 0x00, 0x00, 0x00]);
        let step = (spec().transition)(&mut session, Phase::AwaitingGreeting, &frame).unwrap();
        match step {
            Step::Done(fields) => {
                assert_eq!(fields["negotiation"], Value::from("failure"));
                assert_eq!(fields["failureCode"], Value::from(1u32));
            }
            _ => panic!("expected Done"),
        }
    }

    #[test]
    fn bare_confirm_means_no_negotiation() {
        let mut session = Session::new(Map::new());
        let step = (spec().transition)(&mut session, Phase::AwaitingGreeting, &confirm(&[]))
            .unwrap();
        match step {
            Step::Done(fields) => {
                assert_eq!(fields["negotiation"], Value::from("unsupported"));
            }
            _ => panic!("expected Done"),
        }
    }

    #[test]
    fn non_confirm_tpdu_is_a_protocol_error() {
        let mut session = Session::new(Map::new());
        // 0x80: DR TPDU
        let frame = confirm(&[]);
        let Frame::LengthPrefixed(bytes) = frame else {
            unreachable!()
        };
        let mut payload = bytes.to_vec();
        payload[1] = 0x80;
        let err = (spec().transition)(
            &mut session,
            Phase::AwaitingGreeting,
            &Frame::LengthPrefixed(Bytes::from(payload)),
        )
        .unwrap_err();
        assert!(matches!(err, ProbeError::Protocol(_)));
    }
}
