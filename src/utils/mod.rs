//! # Utility Modules
//!
//! Supporting utilities shared across the probe core.
//!
//! ## Components
//! - **Logging**: Structured logging configuration

pub mod logging;
