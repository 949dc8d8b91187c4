//! Plug a REST API into an HTTP server through configurable options.
//!
//! # Architecture Overview
//!
//! ```text
//!     options (with_port, with_api_defaults, ...)
//!          │
//!          ▼
//!     ┌──────────┐  Api phase   ┌─────────┐
//!     │   Plug   │─────────────▶│ RestApi │
//!     │          │  set_api     └────▲────┘
//!     │          │─────────────▶┌────┴───────┐
//!     │          │ Server phase │ HttpServer │──▶ http / https / unix
//!     │  router  │─────────────▶└────────────┘
//!     └──────────┘  set_handler
//! ```
//!
//! Options name fields through [`field::FieldKey`]; a target that does not
//! expose a field simply ignores the write.

// Core
pub mod contract;
pub mod field;
pub mod option;
pub mod plug;

// Collaborators
pub mod api;
pub mod http;
pub mod net;
pub mod routing;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use api::RestApi;
pub use config::PlugConfig;
pub use contract::{Api, Server, Shared};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use plug::Plug;
