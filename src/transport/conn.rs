//! Socket Connection Manager.
//!
//! One [`Connection`] is opened per probe, owned exclusively by that probe's
//! session, and closed exactly once on every exit path (success, error,
//! timeout; the socket is RAII-owned, so even an abandoned future releases
//! it). Every awaited operation runs under the single per-session deadline
//! derived from the request's `timeoutMs`; expiry aborts the in-flight I/O
//! and yields `Timeout`. No retries.

use crate::config::{DEFAULT_TIMEOUT_MS, MAX_TIMEOUT_MS};
use crate::core::{Frame, FrameCodec, WireFormat};
use crate::error::{constants, ProbeError, Result};
use crate::transport::tls;
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::{timeout_at, Instant};
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tokio_util::codec::{Framed, FramedParts};
use tracing::{debug, instrument};

/// When TLS is negotiated relative to the protocol handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsMode {
    /// Plain TCP for the whole session.
    #[default]
    None,
    /// TLS before any protocol byte (e.g. SMTPS, LDAPS).
    Implicit,
    /// Plain TCP first; the adapter triggers the upgrade mid-handshake.
    StartTls,
}

/// Validated, immutable description of one probe destination.
///
/// Built once from caller input; owned by exactly one probe.
#[derive(Debug, Clone)]
pub struct ConnectionRequest {
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
    pub tls: TlsMode,
}

impl ConnectionRequest {
    /// Request with the default timeout and no TLS.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            tls: TlsMode::None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }

    /// Build from raw caller values, rejecting out-of-range input before any
    /// network I/O. Port must be 1-65535 (a JSON caller can send 0 or 70000,
    /// hence `i64`); timeout must be 0-600000 ms.
    pub fn from_values(
        host: &str,
        port: Option<i64>,
        timeout_ms: Option<i64>,
        tls: TlsMode,
        default_port: u16,
    ) -> Result<Self> {
        if host.is_empty() {
            return Err(ProbeError::Validation(constants::ERR_EMPTY_HOST.into()));
        }

        let port = match port {
            None => default_port,
            Some(p) if (1..=65535).contains(&p) => p as u16,
            Some(_) => return Err(ProbeError::Validation(constants::ERR_PORT_RANGE.into())),
        };

        let timeout_ms = match timeout_ms {
            None => DEFAULT_TIMEOUT_MS,
            Some(t) if (0..=MAX_TIMEOUT_MS as i64).contains(&t) => t as u64,
            Some(_) => return Err(ProbeError::Validation(constants::ERR_TIMEOUT_RANGE.into())),
        };

        Ok(Self {
            host: host.to_string(),
            port,
            timeout: Duration::from_millis(timeout_ms),
            tls,
        })
    }
}

/// The socket under a probe: plain TCP or TLS-wrapped.
pub enum ProbeStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for ProbeStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            ProbeStream::Plain(s) => Pin::new(s).poll_read(cx, buf),
            ProbeStream::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ProbeStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            ProbeStream::Plain(s) => Pin::new(s).poll_write(cx, buf),
            ProbeStream::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            ProbeStream::Plain(s) => Pin::new(s).poll_flush(cx),
            ProbeStream::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            ProbeStream::Plain(s) => Pin::new(s).poll_shutdown(cx),
            ProbeStream::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// One probe's socket, framed by the adapter's wire format and bounded by
/// the per-session deadline.
pub struct Connection {
    framed: Framed<ProbeStream, FrameCodec>,
    deadline: Instant,
    connect_ms: u64,
    host: String,
    tls_active: bool,
}

impl Connection {
    /// Open a TCP socket to one of the pre-resolved addresses (first to
    /// answer wins, tried in order), negotiating TLS first for
    /// `TlsMode::Implicit`. Records connect latency.
    #[instrument(skip(req, addrs, format), fields(host = %req.host, port = req.port))]
    pub async fn open(
        req: &ConnectionRequest,
        addrs: &[IpAddr],
        format: WireFormat,
    ) -> Result<Self> {
        let deadline = Instant::now() + req.timeout;
        let started = Instant::now();

        let mut last_err: Option<std::io::Error> = None;
        let mut stream = None;
        for &ip in addrs {
            match timeout_at(deadline, TcpStream::connect((ip, req.port))).await {
                Err(_) => return Err(ProbeError::Timeout),
                Ok(Ok(s)) => {
                    stream = Some(s);
                    break;
                }
                Ok(Err(e)) => last_err = Some(e),
            }
        }
        let stream = match stream {
            Some(s) => s,
            None => {
                return Err(match last_err {
                    Some(e) => ProbeError::Connect(format!("{}:{}: {e}", req.host, req.port)),
                    None => ProbeError::Dns(constants::ERR_NO_ADDRESSES.into()),
                })
            }
        };

        let io = match req.tls {
            TlsMode::Implicit => {
                ProbeStream::Tls(Box::new(handshake_tls(&req.host, stream, deadline).await?))
            }
            TlsMode::None | TlsMode::StartTls => ProbeStream::Plain(stream),
        };

        let connect_ms = started.elapsed().as_millis() as u64;
        debug!(connect_ms, "Connection established");

        Ok(Self {
            framed: Framed::new(io, FrameCodec::new(format)),
            deadline,
            connect_ms,
            host: req.host.clone(),
            tls_active: matches!(req.tls, TlsMode::Implicit),
        })
    }

    /// Milliseconds spent establishing the socket (including implicit TLS).
    pub fn connect_ms(&self) -> u64 {
        self.connect_ms
    }

    /// Whether the session is currently TLS-wrapped.
    pub fn tls_active(&self) -> bool {
        self.tls_active
    }

    /// Switch framing mid-session.
    pub fn set_format(&mut self, format: WireFormat) {
        self.framed.codec_mut().set_format(format);
    }

    /// Send one frame under the session deadline.
    pub async fn send(&mut self, frame: Frame) -> Result<()> {
        bounded(self.deadline, self.framed.send(frame)).await?
    }

    /// Await and decode exactly one frame under the session deadline.
    ///
    /// Peer close before a complete frame surfaces as `ConnectionClosed`.
    pub async fn recv(&mut self) -> Result<Frame> {
        match bounded(self.deadline, self.framed.next()).await? {
            Some(frame) => frame,
            None => Err(ProbeError::ConnectionClosed),
        }
    }

    /// Perform the deferred STARTTLS upgrade, preserving the codec and any
    /// buffered plaintext bytes.
    pub async fn upgrade_tls(self) -> Result<Self> {
        let Self {
            framed,
            deadline,
            connect_ms,
            host,
            tls_active,
        } = self;
        let FramedParts {
            io, codec, read_buf, ..
        } = framed.into_parts();
        let tcp = match io {
            ProbeStream::Plain(tcp) if !tls_active => tcp,
            _ => {
                return Err(ProbeError::Protocol(
                    "TLS upgrade requested on an already-encrypted session".into(),
                ))
            }
        };

        let tls_stream = handshake_tls(&host, tcp, deadline).await?;
        let mut parts = FramedParts::new(ProbeStream::Tls(Box::new(tls_stream)), codec);
        parts.read_buf = read_buf;

        Ok(Self {
            framed: Framed::from_parts(parts),
            deadline,
            connect_ms,
            host,
            tls_active: true,
        })
    }

    /// Graceful shutdown; dropping the connection closes the socket anyway.
    pub async fn close(mut self) {
        let _ = timeout_at(self.deadline, self.framed.get_mut().shutdown()).await;
    }
}

async fn handshake_tls(
    host: &str,
    stream: TcpStream,
    deadline: Instant,
) -> Result<TlsStream<TcpStream>> {
    let connector = TlsConnector::from(tls::client_config());
    let name = tls::server_name(host)?;
    bounded(deadline, connector.connect(name, stream))
        .await?
        .map_err(|e| ProbeError::Tls(format!("TLS handshake with {host} failed: {e}")))
}

/// Run `fut` under the session deadline, mapping expiry to `Timeout`.
async fn bounded<F: Future>(deadline: Instant, fut: F) -> Result<F::Output> {
    timeout_at(deadline, fut)
        .await
        .map_err(|_| ProbeError::Timeout)
}
