//! REST API implementation hosted by the HTTP server.
//!
//! # Data Flow
//! ```text
//! Request
//!     → axum router (path + method)
//!     → operation middleware
//!     → security schemes (first accepting scheme wins)
//!     → consumer (Content-Type) → operation → producer (Accept)
//!     → Response, or ServeError on any failure
//! ```
//!
//! # Design Decisions
//! - Codecs and authenticators are fields so defaults can be written and
//!   overwritten through options
//! - Payloads travel as `serde_json::Value` between codecs and operations

pub mod errors;
pub mod media;
pub mod rest;
pub mod security;

pub use errors::ApiError;
pub use rest::{Operation, OperationRequest, Reply, RestApi, SecurityRequirement, SecurityScheme};
