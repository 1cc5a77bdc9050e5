//! The handshake state machine engine.
//!
//! One loop drives every protocol: send the pending frame, await and decode
//! exactly one inbound frame, hand it to the adapter's pure transition, act
//! on the returned [`Step`]. Frames are processed strictly in request order;
//! every supported protocol is synchronous, so there is no pipelining.
//!
//! Failure policy: an unexpected frame, a decode error, or an unmet
//! precondition ends the session as `Failed`; acceptable alternate paths
//! (server greets but rejects auth) must be explicit `Refuse` transitions
//! from the adapter, never implicit fallbacks. The engine never swallows a
//! transition failure.

use crate::error::{constants, FailureKind, ProbeError, Result};
use crate::protocol::adapter::{Greeting, Phase, ProbeSpec, Step};
use crate::protocol::session::{Session, SessionMetrics};
use crate::security::{guard_host_with, CidrRange};
use crate::transport::{Connection, ConnectionRequest, TlsMode};
use serde_json::{Map, Value};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

/// Successful probe: adapter-extracted fields plus session metrics.
#[derive(Debug, Clone)]
pub struct ProbeSuccess {
    pub fields: Map<String, Value>,
    pub metrics: SessionMetrics,
}

/// Run one probe against the built-in guard table.
pub async fn run_probe(
    spec: &ProbeSpec,
    req: &ConnectionRequest,
    params: Map<String, Value>,
) -> Result<ProbeSuccess> {
    run_probe_guarded(spec, req, params, &[]).await
}

/// Run one probe with deployment-specific extra blocked ranges.
///
/// Flow: security guard → connect (latency stamped) → handshake loop →
/// close. The socket is owned by this call and is closed on every exit path.
#[instrument(skip_all, fields(protocol = spec.name, host = %req.host, port = req.port))]
pub async fn run_probe_guarded(
    spec: &ProbeSpec,
    req: &ConnectionRequest,
    params: Map<String, Value>,
    extra_ranges: &[CidrRange],
) -> Result<ProbeSuccess> {
    let addrs = guard_host_with(&req.host, extra_ranges).await?;

    let mut session = Session::new(params);
    session.phase = Phase::Connecting;

    let mut conn = Connection::open(req, &addrs, spec.wire).await?;
    session.metrics.connect_ms = conn.connect_ms();
    session.tls_active = conn.tls_active();

    session.starttls = req.tls == TlsMode::StartTls;

    let mut pending = match spec.greeting {
        Greeting::ServerFirst => None,
        Greeting::ClientFirst(ref opening) => Some(opening(&mut session)?),
    };
    session.phase = Phase::AwaitingGreeting;

    loop {
        if let Some(frame) = pending.take() {
            conn.send(frame).await?;
        }

        let waited = Instant::now();
        let frame = match conn.recv().await {
            // Many servers hang up right after the client's goodbye instead
            // of sending one of their own. Once the adapter has steered into
            // `Closing` the session already holds every collected field, so
            // peer close is an acceptable ending rather than a failure.
            Err(ProbeError::ConnectionClosed) if session.phase == Phase::Closing => {
                conn.close().await;
                session.phase = Phase::Closed;
                debug!(exchanges = session.metrics.exchanges, "Peer closed during goodbye");
                return Ok(ProbeSuccess {
                    fields: session.fields,
                    metrics: session.metrics,
                });
            }
            Ok(frame) => frame,
            Err(err) => {
                session.phase = Phase::Failed(err.kind());
                warn!(phase = %session.phase, error = %err, "Probe failed awaiting frame");
                return Err(err);
            }
        };
        session
            .metrics
            .note_exchange(waited.elapsed().as_millis() as u64);

        let phase = session.phase;
        let step = match (spec.transition)(&mut session, phase, &frame) {
            Ok(step) => step,
            Err(err) => {
                session.phase = Phase::Failed(err.kind());
                warn!(phase = %phase, error = %err, "Transition failed");
                return Err(err);
            }
        };

        match step {
            Step::Next {
                phase: next,
                reply,
            } => {
                if next.is_terminal() {
                    session.phase = Phase::Failed(FailureKind::Protocol);
                    return Err(ProbeError::Protocol(constants::ERR_UNEXPECTED_STATE.into()));
                }
                debug!(from = %phase, to = %next, "Transition");
                session.phase = next;
                pending = reply;
            }
            Step::UpgradeTls { then, reply_after } => {
                if req.tls != TlsMode::StartTls {
                    session.phase = Phase::Failed(FailureKind::Protocol);
                    return Err(ProbeError::Protocol(
                        constants::ERR_UPGRADE_WITHOUT_STARTTLS.into(),
                    ));
                }
                debug!(from = %phase, "Deferred TLS upgrade");
                session.phase = Phase::TlsUpgrade;
                conn = conn.upgrade_tls().await?;
                session.tls_active = true;
                session.phase = then;
                pending = reply_after;
            }
            Step::Done(fields) => {
                session.phase = Phase::Closing;
                conn.close().await;
                session.phase = Phase::Closed;

                // Adapter's final fields win over incremental ones.
                let mut merged = session.fields;
                merged.extend(fields);
                debug!(exchanges = session.metrics.exchanges, "Probe complete");
                return Ok(ProbeSuccess {
                    fields: merged,
                    metrics: session.metrics,
                });
            }
            Step::Refuse { kind, message } => {
                session.phase = Phase::Failed(kind);
                conn.close().await;
                warn!(?kind, message, "Peer refused probe");
                return Err(refusal(kind, message));
            }
        }
    }
}

fn refusal(kind: FailureKind, message: String) -> ProbeError {
    match kind {
        FailureKind::Auth => ProbeError::Auth(message),
        FailureKind::SecurityBlock => ProbeError::SecurityBlock {
            reason: message,
            is_cloudflare: false,
        },
        _ => ProbeError::Protocol(message),
    }
}
