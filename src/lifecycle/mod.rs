//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Server::shutdown → trigger → listeners drain → serve returns
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → binary calls Plug::shutdown
//! ```
//!
//! # Design Decisions
//! - A shutdown requested before serving is remembered
//! - Draining is bounded: graceful timeout, then cleanup timeout, then abort

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
