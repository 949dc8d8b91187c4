//! Capability contract between the Plug and its collaborators.
//!
//! # Data Flow
//! ```text
//! Plug
//!     → Api (field writes, request entry point)
//!     → Server (field writes, install API, handler, serve, shutdown)
//! ```
//!
//! # Design Decisions
//! - The server is owned by the Plug; the API is shared through `Shared`
//!   because both the router mount and the server keep a handle to it
//! - Everything the Plug needs is a trait method; nothing is looked up by name
//!   except configuration fields (see `field`)
//! - Handlers are boxed tower services so axum routers, tower layers and
//!   plain closures compose freely

pub mod hooks;
pub mod media;
pub mod security;

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{body::Body, http::{Method, Request}, response::Response};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tower::{util::BoxCloneSyncService, Layer, Service};

use crate::api::ApiError;
use crate::field::Patchable;

pub use hooks::{ByteSize, CommandLineGroup, ListenerScheme, LogHook, ServeErrorFn, ShutdownHook};
pub use media::{Consumer, Producer};
pub use security::{
    ApiKeyAuthenticatorFactory, ApiKeyLocation, AuthOutcome, Authenticator,
    BasicAuthenticatorFactory, BearerAuthenticatorFactory, Principal,
    ScopedTokenAuthentication, TokenAuthentication, UserPassAuthentication,
};

/// A request-serving entry point.
pub type Handler = BoxCloneSyncService<Request<Body>, Response, Infallible>;

/// Wraps a handler into another handler, e.g. to add logging or auth.
pub type Middleware = Arc<dyn Fn(Handler) -> Handler + Send + Sync>;

/// Box any infallible, cloneable request service as a [`Handler`].
pub fn handler<S>(service: S) -> Handler
where
    S: Service<Request<Body>, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    BoxCloneSyncService::new(service)
}

/// Build a [`Middleware`] from a closure over the wrapped handler.
pub fn middleware<F>(wrap: F) -> Middleware
where
    F: Fn(Handler) -> Handler + Send + Sync + 'static,
{
    Arc::new(wrap)
}

/// Build a [`Middleware`] from a tower layer.
pub fn layer_middleware<L>(layer: L) -> Middleware
where
    L: Layer<Handler> + Send + Sync + 'static,
    L::Service: Service<Request<Body>, Response = Response, Error = Infallible>
        + Clone
        + Send
        + Sync
        + 'static,
    <L::Service as Service<Request<Body>>>::Future: Send + 'static,
{
    Arc::new(move |inner: Handler| BoxCloneSyncService::new(layer.layer(inner)))
}

/// Handle to a target whose field writes are visible to every clone.
pub struct Shared<T>(Arc<RwLock<T>>);

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self(Arc::new(RwLock::new(value)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.0.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.0.write()
    }

    /// True when both handles point at the same target.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<T> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("target", &std::any::type_name::<T>())
            .finish()
    }
}

/// Capabilities the Plug consumes from a server.
#[async_trait]
pub trait Server: Patchable + Send + Sync + 'static {
    /// The API implementation this server can host.
    type Api: Api;
    /// Error reported by configure, serve and shutdown.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Run the server's embedded API setup routine.
    ///
    /// May mutate the bound API; callers must not assume it is pure.
    fn configure_api(&mut self) -> Result<(), Self::Error>;

    /// Make `api` the server's active API implementation.
    fn set_api(&mut self, api: Shared<Self::Api>);

    /// The handler requests are currently dispatched to, if any.
    fn handler(&self) -> Option<Handler>;

    /// Replace the handler requests are dispatched to.
    fn set_handler(&self, handler: Handler);

    /// Accept and serve connections until shut down.
    async fn serve(&self) -> Result<(), Self::Error>;

    /// Ask a running (or future) `serve` to stop.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// Capabilities the Plug consumes from an API.
pub trait Api: Patchable + Send + Sync + 'static {
    /// Build the API's request entry point, optionally wrapped by `wrapper`.
    fn handler(&self, wrapper: Option<Middleware>) -> Handler;

    fn default_produces(&self) -> &str;
    fn set_default_produces(&mut self, media_type: &str);
    fn default_consumes(&self) -> &str;
    fn set_default_consumes(&mut self, media_type: &str);

    fn register_consumer(&mut self, media_type: &str, consumer: Arc<dyn Consumer>);
    fn register_producer(&mut self, media_type: &str, producer: Arc<dyn Producer>);

    /// Wrap the operation served at (`method`, `path`) with `middleware`.
    fn add_middleware_for(&mut self, method: Method, path: &str, middleware: Middleware);

    /// Report whether the API is ready to serve.
    fn validate(&self) -> Result<(), ApiError>;
}
