//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (construction at debug, skipped fields at trace,
//!       lifecycle at info)
//!     → logging.rs subscriber (fmt or JSON to stdout)
//!
//! HTTP requests:
//!     → tower-http TraceLayer spans, x-request-id propagated
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - A server log hook, when set, replaces tracing for lifecycle lines only

pub mod logging;
