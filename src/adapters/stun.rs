//! STUN binding probe (RFC 5389) over TCP.
//!
//! Sends a Binding Request and decodes the reflexive transport address from
//! XOR-MAPPED-ADDRESS (falling back to the legacy MAPPED-ADDRESS). A 401
//! error with caller credentials triggers one long-term-credential retry:
//! the request is resent with USERNAME, REALM, NONCE, and a MESSAGE-INTEGRITY
//! HMAC-SHA1 keyed by `MD5(username:realm:password)`. Replies are matched to
//! the outstanding transaction ID; anything else is a protocol violation.

use crate::core::fixed::{get_u16, get_u8, Endian};
use crate::core::tlv::{TlvAttribute, TlvMessage};
use crate::core::{Frame, WireFormat};
use crate::error::{constants, DecodeError, FailureKind, ProbeError, Result};
use crate::protocol::adapter::{Greeting, Phase, ProbeSpec, Step};
use crate::protocol::auth::{hex, hmac_sha1, long_term_key, AuthStrategy, DigestAlgo};
use crate::protocol::session::Session;
use serde_json::{Map, Value};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

pub const MAGIC_COOKIE: u32 = 0x2112_A442;

const BINDING_REQUEST: u16 = 0x0001;
const BINDING_SUCCESS: u16 = 0x0101;
const BINDING_ERROR: u16 = 0x0111;

const ATTR_MAPPED_ADDRESS: u16 = 0x0001;
const ATTR_USERNAME: u16 = 0x0006;
const ATTR_MESSAGE_INTEGRITY: u16 = 0x0008;
const ATTR_ERROR_CODE: u16 = 0x0009;
const ATTR_REALM: u16 = 0x0014;
const ATTR_NONCE: u16 = 0x0015;
const ATTR_XOR_MAPPED_ADDRESS: u16 = 0x0020;
const ATTR_SOFTWARE: u16 = 0x8022;

const MAX_STUN_BODY: usize = 4096;

/// Length of a MESSAGE-INTEGRITY attribute on the wire (header + SHA-1).
const INTEGRITY_ATTR_LEN: u16 = 4 + 20;

fn fresh_request(session: &mut Session) -> TlvMessage {
    let transaction_id: [u8; 12] = rand::random();
    session
        .scratch
        .insert("txn".into(), Value::from(hex(&transaction_id)));
    TlvMessage::new(BINDING_REQUEST, MAGIC_COOKIE, transaction_id)
}

/// Append MESSAGE-INTEGRITY per RFC 5389 section 15.4: the HMAC covers the
/// message with its length field already counting the integrity attribute.
fn seal(mut msg: TlvMessage, key: &[u8]) -> TlvMessage {
    let mut wire = msg.encode().to_vec();
    let patched_len = (wire.len() - crate::core::tlv::HEADER_LEN) as u16 + INTEGRITY_ATTR_LEN;
    wire[2..4].copy_from_slice(&patched_len.to_be_bytes());
    let digest = hmac_sha1(key, &wire);
    msg.attributes
        .push(TlvAttribute::new(ATTR_MESSAGE_INTEGRITY, digest.to_vec()));
    msg
}

/// Decode a (XOR-)MAPPED-ADDRESS value into `(ip, port)`.
fn decode_address(
    value: &[u8],
    xor: bool,
    transaction_id: &[u8; 12],
) -> std::result::Result<(String, u16), DecodeError> {
    let family = get_u8(value, 1)?;
    let mut port = get_u16(value, 2, Endian::Big)?;
    if xor {
        port ^= (MAGIC_COOKIE >> 16) as u16;
    }
    let magic = MAGIC_COOKIE.to_be_bytes();
    match family {
        0x01 => {
            if value.len() < 8 {
                return Err(DecodeError::Truncated {
                    needed: 8,
                    available: value.len(),
                });
            }
            let mut octets = [0u8; 4];
            octets.copy_from_slice(&value[4..8]);
            if xor {
                for (o, m) in octets.iter_mut().zip(magic) {
                    *o ^= m;
                }
            }
            Ok((Ipv4Addr::from(octets).to_string(), port))
        }
        0x02 => {
            if value.len() < 20 {
                return Err(DecodeError::Truncated {
                    needed: 20,
                    available: value.len(),
                });
            }
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&value[4..20]);
            if xor {
                let mut mask = [0u8; 16];
                mask[..4].copy_from_slice(&magic);
                mask[4..].copy_from_slice(transaction_id);
                for (o, m) in octets.iter_mut().zip(mask) {
                    *o ^= m;
                }
            }
            Ok((Ipv6Addr::from(octets).to_string(), port))
        }
        _ => Err(DecodeError::Malformed {
            offset: 1,
            detail: "Unknown address family",
        }),
    }
}

/// ERROR-CODE value: class in the low bits of byte 2, number in byte 3.
fn error_code(value: &[u8]) -> std::result::Result<u16, DecodeError> {
    let class = get_u8(value, 2)? & 0x07;
    let number = get_u8(value, 3)?;
    Ok(u16::from(class) * 100 + u16::from(number))
}

fn expect_transaction(session: &Session, msg: &TlvMessage) -> Result<()> {
    let expected = session.scratch.get("txn").and_then(Value::as_str);
    if msg.magic != MAGIC_COOKIE || expected != Some(hex(&msg.transaction_id).as_str()) {
        return Err(ProbeError::unexpected_frame());
    }
    Ok(())
}

fn success_fields(msg: &TlvMessage) -> Result<Step> {
    let mut fields = Map::new();
    let mapped = if let Some(attr) = msg.attribute(ATTR_XOR_MAPPED_ADDRESS) {
        Some(decode_address(&attr.value, true, &msg.transaction_id)?)
    } else if let Some(attr) = msg.attribute(ATTR_MAPPED_ADDRESS) {
        Some(decode_address(&attr.value, false, &msg.transaction_id)?)
    } else {
        None
    };
    let Some((ip, port)) = mapped else {
        return Err(ProbeError::Protocol(
            "Binding response carries no mapped address".into(),
        ));
    };
    fields.insert("mappedAddress".into(), Value::from(ip));
    fields.insert("mappedPort".into(), Value::from(port));
    if let Some(attr) = msg.attribute(ATTR_SOFTWARE) {
        fields.insert(
            "software".into(),
            Value::from(String::from_utf8_lossy(&attr.value).into_owned()),
        );
    }
    Ok(Step::Done(fields))
}

/// Build the authenticated retry from the 401 challenge.
fn retry_with_credentials(session: &mut Session, challenge: &TlvMessage) -> Result<Step> {
    let creds = session
        .credentials
        .clone()
        .ok_or_else(|| ProbeError::Auth(constants::ERR_CREDENTIALS_MISSING.into()))?;
    let realm_attr = challenge
        .attribute(ATTR_REALM)
        .ok_or_else(|| ProbeError::Protocol("401 challenge without REALM".into()))?;
    let nonce = challenge
        .attribute(ATTR_NONCE)
        .ok_or_else(|| ProbeError::Protocol("401 challenge without NONCE".into()))?
        .value
        .clone();
    let realm = String::from_utf8_lossy(&realm_attr.value).into_owned();
    session.challenge = Some(nonce.to_vec());

    let mut msg = fresh_request(session);
    msg.attributes
        .push(TlvAttribute::new(ATTR_USERNAME, creds.username.clone().into_bytes()));
    msg.attributes
        .push(TlvAttribute::new(ATTR_REALM, realm.clone().into_bytes()));
    msg.attributes.push(TlvAttribute::new(ATTR_NONCE, nonce));

    let key = long_term_key(&creds.username, &realm, &creds.password);
    let sealed = seal(msg, &key);
    session.set_field("realm", realm);
    Ok(Step::send(Phase::Authenticating, Frame::Tlv(sealed)))
}

pub fn spec() -> ProbeSpec {
    ProbeSpec {
        name: "stun",
        default_port: 3478,
        wire: WireFormat::Tlv {
            max_body: MAX_STUN_BODY,
        },
        greeting: Greeting::ClientFirst(Arc::new(|session| {
            Ok(Frame::Tlv(fresh_request(session)))
        })),
        auth: AuthStrategy::ChallengeResponse(DigestAlgo::HmacSha1),
        transition: Arc::new(|session, phase, frame| {
            let msg = frame.as_tlv().ok_or_else(ProbeError::unexpected_frame)?;
            expect_transaction(session, msg)?;

            match (phase, msg.msg_type) {
                (Phase::AwaitingGreeting | Phase::Authenticating, BINDING_SUCCESS) => {
                    success_fields(msg)
                }
                (Phase::AwaitingGreeting, BINDING_ERROR) => {
                    let code = msg
                        .attribute(ATTR_ERROR_CODE)
                        .map(|attr| error_code(&attr.value))
                        .transpose()?
                        .unwrap_or(0);
                    if code == 401 && session.credentials.is_some() {
                        let msg = msg.clone();
                        return retry_with_credentials(session, &msg);
                    }
                    Ok(Step::Refuse {
                        kind: if code == 401 {
                            FailureKind::Auth
                        } else {
                            FailureKind::Protocol
                        },
                        message: format!("Binding request rejected with error {code}"),
                    })
                }
                (Phase::Authenticating, BINDING_ERROR) => Ok(Step::Refuse {
                    kind: FailureKind::Auth,
                    message: constants::ERR_CREDENTIALS_REJECTED.into(),
                }),
                _ => Err(ProbeError::unexpected_frame()),
            }
        }),
    }
}
