//! POP3 probe (RFC 1939): greeting, optional login, mailbox stats.
//!
//! When credentials are supplied the adapter prefers APOP if the greeting
//! carries the `<...>` timestamp challenge, falling back to plaintext
//! `USER`/`PASS`. After login it issues `STAT` for mailbox counts. Without
//! credentials the probe records the banner and quits.

use crate::core::{Frame, WireFormat};
use crate::error::{constants, FailureKind, ProbeError, Result};
use crate::protocol::adapter::{Greeting, Phase, ProbeSpec, Step};
use crate::protocol::auth::{apop_digest, AuthStrategy, DigestAlgo};
use crate::protocol::session::Session;
use serde_json::{Map, Value};
use std::sync::Arc;

fn is_ok(line: &str) -> bool {
    line.starts_with("+OK")
}

/// The `<pid.clock@host>` timestamp of an APOP-capable greeting.
fn apop_challenge(line: &str) -> Option<&str> {
    let start = line.find('<')?;
    let end = line[start..].find('>')? + start;
    Some(&line[start..=end])
}

fn quit() -> Step {
    Step::send(Phase::Closing, Frame::TextLine("QUIT".into()))
}

fn greeting_step(session: &mut Session, line: &str) -> Result<Step> {
    session.set_field("banner", line.trim_start_matches("+OK").trim().to_string());

    let Some(creds) = session.credentials.clone() else {
        return Ok(quit());
    };

    if let Some(challenge) = apop_challenge(line) {
        session.challenge = Some(challenge.as_bytes().to_vec());
        let digest = apop_digest(challenge, &creds.password);
        session.set_field("authMethod", "apop");
        return Ok(Step::send(
            Phase::Authenticating,
            Frame::TextLine(format!("APOP {} {digest}", creds.username)),
        ));
    }

    session.scratch.insert("stage".into(), Value::from("user"));
    session.set_field("authMethod", "plaintext");
    Ok(Step::send(
        Phase::Authenticating,
        Frame::TextLine(format!("USER {}", creds.username)),
    ))
}

fn auth_step(session: &mut Session, line: &str) -> Result<Step> {
    if !is_ok(line) {
        return Ok(Step::Refuse {
            kind: FailureKind::Auth,
            message: format!("{}: {line}", constants::ERR_CREDENTIALS_REJECTED),
        });
    }
    if session.scratch.get("stage").and_then(Value::as_str) == Some("user") {
        let creds = session
            .credentials
            .clone()
            .ok_or_else(|| ProbeError::Auth(constants::ERR_CREDENTIALS_MISSING.into()))?;
        session.scratch.insert("stage".into(), Value::from("pass"));
        return Ok(Step::send(
            Phase::Authenticating,
            Frame::TextLine(format!("PASS {}", creds.password)),
        ));
    }
    // Logged in; ask for mailbox stats.
    Ok(Step::send(
        Phase::RequestResponse(0),
        Frame::TextLine("STAT".into()),
    ))
}

fn stat_step(session: &mut Session, line: &str) -> Result<Step> {
    if !is_ok(line) {
        return Ok(Step::Refuse {
            kind: FailureKind::Protocol,
            message: format!("STAT rejected: {line}"),
        });
    }
    // "+OK <count> <octets>"
    let mut parts = line.split_ascii_whitespace().skip(1);
    if let Some(count) = parts.next().and_then(|s| s.parse::<u64>().ok()) {
        session.set_field("messageCount", count);
    }
    if let Some(size) = parts.next().and_then(|s| s.parse::<u64>().ok()) {
        session.set_field("mailboxSize", size);
    }
    Ok(quit())
}

pub fn spec() -> ProbeSpec {
    ProbeSpec {
        name: "pop3",
        default_port: 110,
        wire: WireFormat::crlf_line(),
        greeting: Greeting::ServerFirst,
        auth: AuthStrategy::ChallengeResponse(DigestAlgo::Md5),
        transition: Arc::new(|session, phase, frame| {
            let line = frame.as_line().ok_or_else(ProbeError::unexpected_frame)?;
            match phase {
                Phase::AwaitingGreeting => {
                    if !is_ok(line) {
                        return Ok(Step::Refuse {
                            kind: FailureKind::Protocol,
                            message: format!("Server refused connection: {line}"),
                        });
                    }
                    greeting_step(session, line)
                }
                Phase::Authenticating => auth_step(session, line),
                Phase::RequestResponse(0) => stat_step(session, line),
                Phase::Closing => Ok(Step::Done(Map::new())),
                _ => Err(ProbeError::unexpected_frame()),
            }
        }),
    }
}
