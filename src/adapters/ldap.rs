//! LDAP simple-bind probe (RFC 4511) over BER framing.
//!
//! Sends one BindRequest (protocol version 3, simple credentials, with empty
//! strings for an anonymous bind) and decodes the BindResponse. Result code
//! 0 is success, 49 (`invalidCredentials`) is an auth refusal, anything else
//! a protocol refusal. The probe closes the socket in place of an Unbind;
//! the server treats that as an abandoned connection, which is acceptable
//! for a diagnostic.

use crate::config::MAX_STREAM_LEN;
use crate::core::ber::{BerElement, CLASS_APPLICATION, CONSTRUCTED, TAG_SEQUENCE};
use crate::core::{Frame, WireFormat};
use crate::error::{FailureKind, ProbeError, Result};
use crate::protocol::adapter::{Greeting, Phase, ProbeSpec, Step};
use crate::protocol::auth::AuthStrategy;
use serde_json::{Map, Value};
use std::sync::Arc;

const LDAP_VERSION: i64 = 3;
const BIND_REQUEST_TAG: u8 = 0; // [APPLICATION 0]
const BIND_RESPONSE_TAG: u8 = CLASS_APPLICATION | CONSTRUCTED | 1;
const SIMPLE_AUTH_TAG: u8 = 0; // [CONTEXT 0] inside AuthenticationChoice

const RESULT_SUCCESS: i64 = 0;
const RESULT_INVALID_CREDENTIALS: i64 = 49;

fn bind_request(name: &str, password: &str) -> BerElement {
    BerElement::sequence(vec![
        BerElement::integer(1), // messageID
        BerElement::application(
            BIND_REQUEST_TAG,
            vec![
                BerElement::integer(LDAP_VERSION),
                BerElement::octet_string(name.to_string().into_bytes()),
                BerElement::context_primitive(SIMPLE_AUTH_TAG, password.to_string().into_bytes()),
            ],
        ),
    ])
}

/// Pull `(resultCode, diagnosticMessage)` out of an LDAPMessage envelope.
fn bind_response(el: &BerElement) -> Result<(i64, String)> {
    if el.tag() != TAG_SEQUENCE {
        return Err(ProbeError::unexpected_frame());
    }
    let op = el
        .children()
        .get(1)
        .filter(|op| op.tag() == BIND_RESPONSE_TAG)
        .ok_or_else(ProbeError::unexpected_frame)?;
    let result_code = op
        .children()
        .first()
        .and_then(BerElement::as_i64)
        .ok_or_else(ProbeError::unexpected_frame)?;
    let diagnostic = op
        .children()
        .get(2)
        .and_then(BerElement::as_str)
        .unwrap_or("")
        .to_string();
    Ok((result_code, diagnostic))
}

pub fn spec() -> ProbeSpec {
    ProbeSpec {
        name: "ldap",
        default_port: 389,
        wire: WireFormat::Ber {
            max_len: MAX_STREAM_LEN,
        },
        greeting: Greeting::ClientFirst(Arc::new(|session| {
            let (name, password) = match &session.credentials {
                Some(creds) => (creds.username.clone(), creds.password.clone()),
                None => (String::new(), String::new()),
            };
            session.set_field("anonymousBind", session.credentials.is_none());
            Ok(Frame::Ber(bind_request(&name, &password)))
        })),
        auth: AuthStrategy::Plaintext,
        transition: Arc::new(|_session, phase, frame| {
            if phase != Phase::AwaitingGreeting {
                return Err(ProbeError::unexpected_frame());
            }
            let el = frame.as_ber().ok_or_else(ProbeError::unexpected_frame)?;
            let (code, diagnostic) = bind_response(el)?;
            match code {
                RESULT_SUCCESS => {
                    let mut fields = Map::new();
                    fields.insert("resultCode".into(), Value::from(code));
                    if !diagnostic.is_empty() {
                        fields.insert("diagnostic".into(), Value::from(diagnostic));
                    }
                    Ok(Step::Done(fields))
                }
                RESULT_INVALID_CREDENTIALS => Ok(Step::Refuse {
                    kind: FailureKind::Auth,
                    message: "Bind rejected: invalidCredentials".into(),
                }),
                other => Ok(Step::Refuse {
                    kind: FailureKind::Protocol,
                    message: format!("Bind failed with resultCode {other}: {diagnostic}"),
                }),
            }
        }),
    }
}
