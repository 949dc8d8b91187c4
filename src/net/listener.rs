//! Listener binding and request concurrency limits.
//!
//! # Responsibilities
//! - Bind TCP listeners from a host name and port
//! - Turn on TCP keep-alive probes, inherited by accepted connections
//! - Bind unix domain socket listeners, replacing stale socket files
//! - Cap in-flight requests per listener with a semaphore
//!
//! # Design Decisions
//! - Every resolved address is tried in order; the first that binds wins
//! - Over the cap, requests wait for a slot instead of being refused

use std::convert::Infallible;
use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    response::IntoResponse,
};
use socket2::{SockRef, TcpKeepalive};
use tokio::sync::Semaphore;
use tower::{service_fn, ServiceExt};

use crate::contract::{self, Handler};

/// Error type for listener operations.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    #[error("failed to resolve {address}: {source}")]
    Resolve {
        address: String,
        source: std::io::Error,
    },

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
}

/// Bind a non-blocking TCP listener on `host:port`.
///
/// A non-zero `keep_alive` enables TCP keep-alive with that idle period.
pub fn bind_tcp(host: &str, port: u16, keep_alive: Duration) -> Result<TcpListener, ListenerError> {
    let address = format!("{host}:{port}");
    let candidates: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| ListenerError::Resolve {
            address: address.clone(),
            source,
        })?
        .collect();

    let mut last_error = std::io::Error::new(std::io::ErrorKind::AddrNotAvailable, "no addresses resolved");
    for candidate in candidates {
        let bound = TcpListener::bind(candidate).and_then(|listener| {
            listener.set_nonblocking(true)?;
            if !keep_alive.is_zero() {
                let params = TcpKeepalive::new().with_time(keep_alive);
                SockRef::from(&listener).set_tcp_keepalive(&params)?;
            }
            Ok(listener)
        });
        match bound {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                tracing::debug!(address = %candidate, error = %e, "Bind attempt failed");
                last_error = e;
            }
        }
    }
    Err(ListenerError::Bind {
        address,
        source: last_error,
    })
}

/// Bind a unix domain socket listener at `path`.
#[cfg(unix)]
pub fn bind_unix(path: &std::path::Path) -> Result<tokio::net::UnixListener, ListenerError> {
    let bind_error = |source| ListenerError::Bind {
        address: path.display().to_string(),
        source,
    };
    if path.exists() {
        std::fs::remove_file(path).map_err(bind_error)?;
    }
    tokio::net::UnixListener::bind(path).map_err(bind_error)
}

/// Allow at most `max` requests through `handler` at once.
pub fn limit_concurrency(handler: Handler, max: usize) -> Handler {
    let permits = Arc::new(Semaphore::new(max));
    contract::handler(service_fn(move |request: Request<Body>| {
        let permits = permits.clone();
        let handler = handler.clone();
        async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return Ok::<_, Infallible>(StatusCode::SERVICE_UNAVAILABLE.into_response());
            };
            handler.oneshot(request).await
        }
    }))
}
