//! # Transport Layer
//!
//! Socket lifecycle for one probe: deadline-bounded TCP connect, optional
//! implicit or deferred (STARTTLS) TLS, framed I/O, and guaranteed closure on
//! every exit path.

pub mod conn;
pub mod tls;

pub use conn::{Connection, ConnectionRequest, TlsMode};
