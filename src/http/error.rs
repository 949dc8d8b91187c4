//! Server error type.

use crate::api::ApiError;
use crate::net::{listener::ListenerError, tls::TlsError};

/// Errors reported by [`HttpServer`](super::HttpServer).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("tls: {0}")]
    Tls(#[from] TlsError),

    #[error("listener failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    InvalidApi(ApiError),

    #[error("api configuration failed: {0}")]
    Configure(ApiError),

    #[error("no api is installed")]
    NoApi,

    #[error("no handler to serve: install an api or set a handler")]
    NoHandler,

    #[error("{0} listener is enabled but {1} is not set")]
    MissingSetting(&'static str, &'static str),

    #[error("listener task failed: {0}")]
    Task(String),
}
