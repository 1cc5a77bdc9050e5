//! Single-exchange classic services: echo, daytime, time, and finger.
//!
//! These four exercise the lightest codec paths. Echo sends a line and
//! checks the reflection, daytime and finger read until the peer closes,
//! and time decodes the four-byte 1900-epoch timestamp of RFC 868.

use crate::config::MAX_STREAM_LEN;
use crate::core::fixed::{get_u32, Endian};
use crate::core::{Frame, WireFormat};
use crate::error::ProbeError;
use crate::protocol::adapter::{Greeting, Phase, ProbeSpec, Step};
use crate::protocol::auth::AuthStrategy;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Offset between the 1900 epoch of RFC 868 and the Unix epoch, seconds.
const EPOCH_1900_OFFSET: i64 = 2_208_988_800;

const DEFAULT_ECHO_PAYLOAD: &str = "netprobe";

/// Echo (RFC 862): send one line, expect it reflected verbatim.
pub fn echo() -> ProbeSpec {
    ProbeSpec {
        name: "echo",
        default_port: 7,
        wire: WireFormat::crlf_line(),
        greeting: Greeting::ClientFirst(Arc::new(|session| {
            let payload = session
                .param_str("message")
                .unwrap_or(DEFAULT_ECHO_PAYLOAD)
                .to_string();
            session.scratch.insert("sent".into(), Value::from(payload.clone()));
            Ok(Frame::TextLine(payload))
        })),
        auth: AuthStrategy::None,
        transition: Arc::new(|session, phase, frame| {
            if phase != Phase::AwaitingGreeting {
                return Err(ProbeError::unexpected_frame());
            }
            let line = frame.as_line().ok_or_else(ProbeError::unexpected_frame)?;
            let sent = session
                .scratch
                .get("sent")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_ECHO_PAYLOAD);
            let mut fields = Map::new();
            fields.insert("echoed".into(), Value::from(line == sent));
            fields.insert("response".into(), Value::from(line));
            Ok(Step::Done(fields))
        }),
    }
}

/// Daytime (RFC 867): the server volunteers a human-readable timestamp and
/// closes. Servers differ on termination, so the whole stream is read.
pub fn daytime() -> ProbeSpec {
    ProbeSpec {
        name: "daytime",
        default_port: 13,
        wire: WireFormat::UntilClose {
            max_len: MAX_STREAM_LEN,
        },
        greeting: Greeting::ServerFirst,
        auth: AuthStrategy::None,
        transition: Arc::new(|_session, phase, frame| {
            if phase != Phase::AwaitingGreeting {
                return Err(ProbeError::unexpected_frame());
            }
            let lines = match frame {
                Frame::TextBlock(lines) => lines,
                _ => return Err(ProbeError::unexpected_frame()),
            };
            let mut fields = Map::new();
            fields.insert("daytime".into(), Value::from(lines.join(" ").trim().to_string()));
            Ok(Step::Done(fields))
        }),
    }
}

/// Time (RFC 868): four big-endian bytes, seconds since 1900-01-01.
pub fn time() -> ProbeSpec {
    ProbeSpec {
        name: "time",
        default_port: 37,
        wire: WireFormat::FixedWidth { len: 4 },
        greeting: Greeting::ServerFirst,
        auth: AuthStrategy::None,
        transition: Arc::new(|_session, phase, frame| {
            if phase != Phase::AwaitingGreeting {
                return Err(ProbeError::unexpected_frame());
            }
            let bytes = frame.as_bytes().ok_or_else(ProbeError::unexpected_frame)?;
            let raw = get_u32(bytes, 0, Endian::Big)?;
            let mut fields = Map::new();
            fields.insert("timeRaw".into(), Value::from(raw));
            fields.insert("unixTime".into(), Value::from(i64::from(raw) - EPOCH_1900_OFFSET));
            Ok(Step::Done(fields))
        }),
    }
}

/// Finger (RFC 1288): send the query line, read everything until close.
pub fn finger() -> ProbeSpec {
    ProbeSpec {
        name: "finger",
        default_port: 79,
        wire: WireFormat::UntilClose {
            max_len: MAX_STREAM_LEN,
        },
        greeting: Greeting::ClientFirst(Arc::new(|session| {
            let query = session.param_str("query").unwrap_or("").to_string();
            Ok(Frame::TextLine(query))
        })),
        auth: AuthStrategy::None,
        transition: Arc::new(|_session, phase, frame| {
            if phase != Phase::AwaitingGreeting {
                return Err(ProbeError::unexpected_frame());
            }
            let lines = match frame {
                Frame::TextBlock(lines) => lines.clone(),
                _ => return Err(ProbeError::unexpected_frame()),
            };
            let mut fields = Map::new();
            fields.insert(
                "response".into(),
                Value::Array(lines.into_iter().map(Value::from).collect()),
            );
            Ok(Step::Done(fields))
        }),
    }
}
