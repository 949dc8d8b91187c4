//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! HttpServer::serve
//!     → listener.rs (bind tcp / unix, per-listener request cap)
//!     → tls.rs (rustls config, optional client certificate check)
//!     → axum-server / axum::serve accept loops
//! ```
//!
//! # Design Decisions
//! - Accept loops belong to axum-server and axum; this layer only prepares
//!   sockets and TLS material
//! - TLS is optional and handled transparently

pub mod listener;
pub mod tls;
