//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (middleware bindings matching method + path)
//!     → matcher.rs (path pattern evaluation)
//!     → wrapped chain → axum routes → mounted root handler
//! ```
//!
//! # Design Decisions
//! - Routing proper is axum's; this module adds ordered middleware bindings
//! - Bindings are frozen into a handler when serving starts
//! - Deterministic: same request always gets the same chain

pub mod matcher;
pub mod router;

pub use matcher::PathPattern;
pub use router::{lazy_api, MiddlewareBinding, PlugRouter};
