//! # netprobe
//!
//! Connection-lifecycle, codec, and handshake core for a multi-protocol
//! network diagnostic gateway.
//!
//! The crate answers one question per call: does the service at `host:port`
//! speak protocol X, and what does it say about itself? One generic
//! [`protocol::engine`] drives every protocol; adapters contribute only a
//! wire format and a pure transition function, so heterogeneous protocols
//! (SMTP, POP3, STUN, LDAP, RDP, the classic RFC toy services) share the
//! same connect/guard/timeout/close machinery.
//!
//! ## Layers
//! - [`security`]: pre-connect SSRF guard (DNS resolution + CIDR screening)
//! - [`transport`]: socket lifecycle, deadline enforcement, TLS (implicit
//!   and deferred STARTTLS)
//! - [`core`]: pure binary/text codec library bridged into `tokio_util`
//!   framing
//! - [`protocol`]: the handshake state machine engine and adapter contract
//! - [`adapters`]: built-in protocol adapters
//! - [`envelope`]: uniform JSON response contract
//!
//! ## Example
//! ```no_run
//! use netprobe::{adapters, probe, ConnectionRequest};
//! use serde_json::Map;
//!
//! # async fn run() {
//! let registry = adapters::builtin();
//! let spec = registry.get("smtp").unwrap();
//! let req = ConnectionRequest::new("mail.example.org", 25);
//! let envelope = probe(&spec, &req, Map::new()).await;
//! assert!(envelope.status == 200 || envelope.status >= 400);
//! # }
//! ```

pub mod adapters;
pub mod config;
pub mod core;
pub mod envelope;
pub mod error;
pub mod protocol;
pub mod security;
pub mod transport;
pub mod utils;

pub use config::GatewayConfig;
pub use envelope::{respond, Envelope, RequestEcho};
pub use error::{DecodeError, FailureKind, ProbeError, Result};
pub use protocol::{run_probe, ProbeSpec, ProbeSuccess, Registry};
pub use transport::{ConnectionRequest, TlsMode};

use serde_json::{Map, Value};

/// Run one probe and fold the outcome into a response envelope.
///
/// This is the whole gateway operation minus HTTP routing: guard, connect,
/// handshake, close, report. It never panics and never returns early with a
/// half-built body; every exit path produces a complete envelope.
pub async fn probe(
    spec: &ProbeSpec,
    req: &ConnectionRequest,
    params: Map<String, Value>,
) -> Envelope {
    let echo = RequestEcho {
        host: req.host.clone(),
        port: req.port,
    };
    respond(run_probe(spec, req, params).await, &echo)
}
