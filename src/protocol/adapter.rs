//! The adapter contract: data-driven strategy records consumed by the engine.
//!
//! An adapter is not a trait object hierarchy; it is a [`ProbeSpec`] value
//! holding a wire format, a greeting expectation, a declared auth strategy,
//! and one pure transition function `(session, phase, frame) -> Step`. The
//! engine stays protocol-agnostic and needs no compile-time knowledge of any
//! concrete adapter.

use crate::core::{Frame, WireFormat};
use crate::error::{FailureKind, Result};
use crate::protocol::auth::AuthStrategy;
use crate::protocol::session::Session;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Handshake automaton phase.
///
/// `Closed` and `Failed` are terminal. `RequestResponse(n)` numbers the
/// post-auth exchanges an adapter drives before closing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connecting,
    TlsUpgrade,
    AwaitingGreeting,
    Authenticating,
    Ready,
    RequestResponse(u16),
    Closing,
    Closed,
    Failed(FailureKind),
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Closed | Phase::Failed(_))
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Connecting => write!(f, "connecting"),
            Phase::TlsUpgrade => write!(f, "tls_upgrade"),
            Phase::AwaitingGreeting => write!(f, "awaiting_greeting"),
            Phase::Authenticating => write!(f, "authenticating"),
            Phase::Ready => write!(f, "ready"),
            Phase::RequestResponse(n) => write!(f, "request_response[{n}]"),
            Phase::Closing => write!(f, "closing"),
            Phase::Closed => write!(f, "closed"),
            Phase::Failed(kind) => write!(f, "failed({kind:?})"),
        }
    }
}

/// Who speaks first once the socket is up.
pub enum Greeting {
    /// The server sends the first frame (SMTP banner, POP3 greeting).
    ServerFirst,
    /// The client opens; the builder produces the opening frame from session
    /// state (STUN binding request, LDAP bind, finger query).
    ClientFirst(OpeningFn),
}

/// Builds the client's opening frame. Pure aside from session state: it may
/// stash what the response must be checked against (a transaction ID), but
/// performs no I/O.
pub type OpeningFn = Arc<dyn Fn(&mut Session) -> Result<Frame> + Send + Sync>;

/// Pure transition: consumes one decoded frame, returns the next step.
/// All I/O stays in the engine.
pub type TransitionFn = Arc<dyn Fn(&mut Session, Phase, &Frame) -> Result<Step> + Send + Sync>;

/// What the engine does after one transition.
#[derive(Debug)]
pub enum Step {
    /// Move to `phase`, optionally sending `reply` first, then await the
    /// next inbound frame. Transitioning into a terminal phase this way is a
    /// contract violation; adapters finish via `Done` or `Refuse`.
    Next { phase: Phase, reply: Option<Frame> },
    /// Perform the deferred STARTTLS upgrade, then continue in `then`,
    /// optionally sending `reply_after` over the fresh TLS session.
    UpgradeTls {
        then: Phase,
        reply_after: Option<Frame>,
    },
    /// Handshake complete: close and report success with these domain fields.
    Done(Map<String, Value>),
    /// Explicit acceptable-alternate failure (e.g. server greets but rejects
    /// auth). Never used for out-of-contract frames; those are errors.
    Refuse {
        kind: FailureKind,
        message: String,
    },
}

impl Step {
    /// Shorthand for `Next` with a reply frame.
    pub fn send(phase: Phase, frame: Frame) -> Self {
        Step::Next {
            phase,
            reply: Some(frame),
        }
    }

    /// Shorthand for `Next` with no outgoing frame.
    pub fn await_in(phase: Phase) -> Self {
        Step::Next { phase, reply: None }
    }
}

/// One protocol adapter, as data.
pub struct ProbeSpec {
    /// Route name (`"smtp"`, `"stun"`, ...).
    pub name: &'static str,
    /// Port used when the caller omits one.
    pub default_port: u16,
    /// Stream framing for this protocol.
    pub wire: WireFormat,
    /// Who speaks first.
    pub greeting: Greeting,
    /// Declared auth scheme (introspection; the transition drives it).
    pub auth: AuthStrategy,
    /// The protocol's semantics.
    pub transition: TransitionFn,
}

impl fmt::Debug for ProbeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeSpec")
            .field("name", &self.name)
            .field("default_port", &self.default_port)
            .field("wire", &self.wire)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_phases() {
        assert!(Phase::Closed.is_terminal());
        assert!(Phase::Failed(FailureKind::Protocol).is_terminal());
        assert!(!Phase::Ready.is_terminal());
        assert!(!Phase::RequestResponse(3).is_terminal());
    }

    #[test]
    fn phase_display_names_are_stable() {
        assert_eq!(Phase::AwaitingGreeting.to_string(), "awaiting_greeting");
        assert_eq!(Phase::RequestResponse(2).to_string(), "request_response[2]");
    }
}
