//! SMTP banner and extension probe (RFC 5321), with opt-in STARTTLS.
//!
//! Flow: read the `220` banner, send `EHLO`, collect the multiline `250`
//! reply into capabilities, then either upgrade via `STARTTLS` (when the
//! caller asked for a deferred upgrade) and re-EHLO, or `QUIT`. A `554`
//! greeting or a rejected EHLO is reported as a refusal, not an engine
//! error: the server spoke valid SMTP, it just declined us.

use crate::core::{Frame, WireFormat};
use crate::error::{FailureKind, ProbeError, Result};
use crate::protocol::adapter::{Greeting, Phase, ProbeSpec, Step};
use crate::protocol::auth::AuthStrategy;
use crate::protocol::session::Session;
use serde_json::{Map, Value};
use std::sync::Arc;

const EHLO_NAME: &str = "netprobe.invalid";

/// Reply code of an SMTP line, if the line carries one.
fn reply_code(line: &str) -> Option<u16> {
    line.get(..3)?.parse().ok()
}

/// A `250-` continuation has more lines coming; `250 ` (space) is final.
fn is_final(line: &str) -> bool {
    line.as_bytes().get(3) != Some(&b'-')
}

fn ehlo() -> Frame {
    Frame::TextLine(format!("EHLO {EHLO_NAME}"))
}

fn finish_ehlo(session: &mut Session) -> Result<Step> {
    session.set_field(
        "extensions",
        Value::Array(
            session
                .capabilities
                .iter()
                .cloned()
                .map(Value::from)
                .collect(),
        ),
    );
    if session.starttls && !session.tls_active {
        if !session.capabilities.iter().any(|c| c.eq_ignore_ascii_case("STARTTLS")) {
            return Ok(Step::Refuse {
                kind: FailureKind::Protocol,
                message: "Server does not advertise STARTTLS".into(),
            });
        }
        return Ok(Step::send(
            Phase::RequestResponse(0),
            Frame::TextLine("STARTTLS".into()),
        ));
    }
    Ok(Step::send(Phase::Closing, Frame::TextLine("QUIT".into())))
}

pub fn spec() -> ProbeSpec {
    ProbeSpec {
        name: "smtp",
        default_port: 25,
        wire: WireFormat::crlf_line(),
        greeting: Greeting::ServerFirst,
        auth: AuthStrategy::None,
        transition: Arc::new(|session, phase, frame| {
            let line = frame.as_line().ok_or_else(ProbeError::unexpected_frame)?;
            let code = reply_code(line).ok_or_else(ProbeError::unexpected_frame)?;

            match phase {
                Phase::AwaitingGreeting => match code {
                    220 => {
                        if !is_final(line) {
                            // Multiline banner; keep reading.
                            return Ok(Step::await_in(Phase::AwaitingGreeting));
                        }
                        if !session.fields.contains_key("banner") {
                            session.set_field("banner", line[3..].trim().to_string());
                        }
                        Ok(Step::send(Phase::Ready, ehlo()))
                    }
                    _ => Ok(Step::Refuse {
                        kind: FailureKind::Protocol,
                        message: format!("Server refused connection: {line}"),
                    }),
                },
                // Collecting the (possibly multiline) EHLO reply.
                Phase::Ready => match code {
                    250 => {
                        let text = line[3..].trim_start_matches([' ', '-']).to_string();
                        // First 250 line repeats the server name, not an extension.
                        if session.scratch.insert("ehlo_greeted".into(), Value::Bool(true)).is_some()
                        {
                            session.capabilities.push(text);
                        }
                        if is_final(line) {
                            session.scratch.remove("ehlo_greeted");
                            finish_ehlo(session)
                        } else {
                            Ok(Step::await_in(Phase::Ready))
                        }
                    }
                    _ => Ok(Step::Refuse {
                        kind: FailureKind::Protocol,
                        message: format!("EHLO rejected: {line}"),
                    }),
                },
                // Reply to STARTTLS.
                Phase::RequestResponse(0) => match code {
                    220 => {
                        session.capabilities.clear();
                        session.set_field("tlsStarted", true);
                        Ok(Step::UpgradeTls {
                            then: Phase::Ready,
                            reply_after: Some(ehlo()),
                        })
                    }
                    _ => Ok(Step::Refuse {
                        kind: FailureKind::Protocol,
                        message: format!("STARTTLS rejected: {line}"),
                    }),
                },
                Phase::Closing => {
                    // 221 goodbye; anything else is tolerated at this point.
                    Ok(Step::Done(Map::new()))
                }
                _ => Err(ProbeError::unexpected_frame()),
            }
        }),
    }
}
