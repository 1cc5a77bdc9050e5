//! # Handshake Protocol Layer
//!
//! The generalized handshake state machine and the adapter contract every
//! protocol instantiates.
//!
//! The split that lets ~80 heterogeneous protocols share one execution core:
//! the [`engine`] owns all I/O (connect, send, receive, TLS upgrade, close),
//! while adapters own only protocol semantics, expressed as a data-driven
//! [`adapter::ProbeSpec`] strategy record with a pure transition function.
//! No adapter ever touches a socket.

pub mod adapter;
pub mod auth;
pub mod engine;
pub mod registry;
pub mod session;

pub use adapter::{Greeting, Phase, ProbeSpec, Step};
pub use auth::{AuthStrategy, Credentials, DigestAlgo};
pub use engine::{run_probe, ProbeSuccess};
pub use registry::Registry;
pub use session::{Session, SessionMetrics};
