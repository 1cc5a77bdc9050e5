//! Per-request session state.
//!
//! One [`Session`] is created at probe start, threaded through the engine and
//! the adapter's transition function, and dropped at probe end, never
//! persisted, never shared across requests. Partial-frame reassembly bytes
//! live in the connection's framed buffer; everything else a probe
//! accumulates lives here.

use crate::protocol::adapter::Phase;
use crate::protocol::auth::Credentials;
use serde_json::{Map, Value};

/// Latency and exchange counters sampled by the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionMetrics {
    /// Milliseconds to establish the socket (including implicit TLS).
    pub connect_ms: u64,
    /// First observed request/response round trip, milliseconds.
    pub rtt_ms: Option<u64>,
    /// Completed send/receive exchanges.
    pub exchanges: u32,
}

impl SessionMetrics {
    /// Record one completed exchange; the first sample becomes the RTT.
    pub fn note_exchange(&mut self, elapsed_ms: u64) {
        self.exchanges += 1;
        if self.rtt_ms.is_none() {
            self.rtt_ms = Some(elapsed_ms);
        }
    }
}

/// Ephemeral state for one probe.
pub struct Session {
    /// Current automaton phase (engine-owned; adapters read it).
    pub phase: Phase,
    /// Caller-supplied adapter parameters.
    pub params: Map<String, Value>,
    /// Credentials extracted from params, if any.
    pub credentials: Option<Credentials>,
    /// Negotiated capabilities (protocol version, advertised extensions).
    pub capabilities: Vec<String>,
    /// Pending auth challenge issued by the peer.
    pub challenge: Option<Vec<u8>>,
    /// Adapter scratch space surviving across transitions (transaction IDs,
    /// accumulated multiline replies).
    pub scratch: Map<String, Value>,
    /// Domain fields extracted so far; merged into the success payload.
    pub fields: Map<String, Value>,
    /// Latency metrics sampled by the engine.
    pub metrics: SessionMetrics,
    /// Whether the session is currently TLS-wrapped.
    pub tls_active: bool,
    /// Whether the caller asked for a deferred (STARTTLS) upgrade.
    pub starttls: bool,
}

impl Session {
    pub fn new(params: Map<String, Value>) -> Self {
        let credentials = Credentials::from_params(&params);
        Self {
            phase: Phase::Connecting,
            params,
            credentials,
            capabilities: Vec::new(),
            challenge: None,
            scratch: Map::new(),
            fields: Map::new(),
            metrics: SessionMetrics::default(),
            tls_active: false,
            starttls: false,
        }
    }

    /// String-typed adapter parameter.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    /// Record an extracted domain field.
    pub fn set_field(&mut self, key: &str, value: impl Into<Value>) {
        self.fields.insert(key.to_string(), value.into());
    }
}
