//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP / TLS / unix connection
//!     → axum-server or axum::serve (hyper HTTP/1.1 + HTTP/2)
//!     → server.rs layers (request ID, tracing, request deadline, request cap)
//!     → installed handler (Plug router, or the API entry point)
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - Every listener gets its own layer stack so TLS limits can differ
//! - The handler is swapped atomically; a serve picks it up at start

pub mod error;
pub mod server;

pub use error::ServerError;
pub use server::{ConfigureFn, HttpServer};
