//! Response Envelope Builder.
//!
//! Normalizes an adapter outcome into the uniform JSON contract callers see:
//! `{success, host, port, rtt, connectMs, ...}` on success, `{success:false,
//! error, ...}` on failure, with the HTTP status derived from the failure
//! kind. Every reported field traces to session metrics or a parsed frame;
//! the builder never synthesizes success from partial information.

use crate::error::{FailureKind, ProbeError, Result};
use crate::protocol::engine::ProbeSuccess;
use serde_json::{json, Map, Value};

/// JSON body plus the HTTP status the gateway should answer with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub status: u16,
    pub body: Value,
}

/// Echo of the validated request, reflected into every envelope.
#[derive(Debug, Clone)]
pub struct RequestEcho {
    pub host: String,
    pub port: u16,
}

/// Build the envelope for one finished probe.
pub fn respond(outcome: Result<ProbeSuccess>, echo: &RequestEcho) -> Envelope {
    match outcome {
        Ok(success) => success_envelope(success, echo),
        Err(err) => failure_envelope(&err, echo),
    }
}

fn success_envelope(success: ProbeSuccess, echo: &RequestEcho) -> Envelope {
    let mut body = Map::new();
    body.insert("success".into(), Value::Bool(true));
    body.insert("host".into(), Value::from(echo.host.clone()));
    body.insert("port".into(), Value::from(echo.port));
    body.insert("connectMs".into(), Value::from(success.metrics.connect_ms));
    if let Some(rtt) = success.metrics.rtt_ms {
        body.insert("rtt".into(), Value::from(rtt));
    }

    // Adapter fields are additive; they never override the core contract.
    for (key, value) in success.fields {
        body.entry(key).or_insert(value);
    }

    Envelope {
        status: 200,
        body: Value::Object(body),
    }
}

fn failure_envelope(err: &ProbeError, echo: &RequestEcho) -> Envelope {
    let kind = err.kind();
    let mut body = json!({
        "success": false,
        "error": err.to_string(),
        "host": echo.host,
        "port": echo.port,
    });

    if let ProbeError::SecurityBlock { is_cloudflare, .. } = err {
        body["isCloudflare"] = Value::Bool(*is_cloudflare);
    }
    if kind == FailureKind::Timeout {
        body["timedOut"] = Value::Bool(true);
    }

    Envelope {
        status: kind.http_status(),
        body,
    }
}
