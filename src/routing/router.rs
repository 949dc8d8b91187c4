//! The Plug's extensible router.
//!
//! # Responsibilities
//! - Mount a root handler that serves everything no explicit route claims
//! - Accept extra axum routes
//! - Record middleware bindings and wrap matching requests in them
//!
//! # Design Decisions
//! - Bindings accumulate; registering the same binding twice wraps twice
//! - For overlapping bindings the first registered runs outermost
//! - Bindings match on method and path pattern before axum routing, so they
//!   also cover the mounted root handler

use std::convert::Infallible;
use std::sync::{Arc, OnceLock};

use axum::{
    body::Body,
    http::{Method, Request},
    routing::MethodRouter,
    Router,
};
use tower::{service_fn, util::BoxCloneSyncService, ServiceExt};

use super::PathPattern;
use crate::contract::{self, Api, Handler, Middleware, Shared};

/// One registered (method, path pattern, middleware) triple.
#[derive(Clone)]
pub struct MiddlewareBinding {
    pub method: Method,
    pub pattern: PathPattern,
    middleware: Middleware,
}

impl MiddlewareBinding {
    pub fn new(method: Method, path: &str, middleware: Middleware) -> Self {
        Self {
            method,
            pattern: PathPattern::parse(path),
            middleware,
        }
    }

    pub fn matches(&self, method: &Method, path: &str) -> bool {
        &self.method == method && self.pattern.is_match(path)
    }

    pub fn wrap(&self, handler: Handler) -> Handler {
        (self.middleware)(handler)
    }
}

impl std::fmt::Debug for MiddlewareBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewareBinding")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// Router owned by a Plug.
#[derive(Default)]
pub struct PlugRouter {
    inner: Router,
    bindings: Vec<MiddlewareBinding>,
}

impl PlugRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `handler` for every request no explicit route claims.
    pub fn mount(&mut self, handler: Handler) -> &mut Self {
        self.inner = std::mem::take(&mut self.inner).fallback_service(handler);
        self
    }

    /// Add an explicit route in front of the mounted handler.
    ///
    /// # Panics
    /// On an invalid or conflicting path, as `axum::Router::route` does.
    pub fn route(&mut self, path: &str, method_router: MethodRouter) -> &mut Self {
        self.inner = std::mem::take(&mut self.inner).route(path, method_router);
        self
    }

    pub fn add_middleware_for(&mut self, method: Method, path: &str, middleware: Middleware) -> &mut Self {
        tracing::debug!(method = %method, path = %path, "Middleware registered");
        self.bindings.push(MiddlewareBinding::new(method, path, middleware));
        self
    }

    /// Registered bindings, in registration order.
    pub fn bindings(&self) -> &[MiddlewareBinding] {
        &self.bindings
    }

    /// Bindings applying to a request, in registration order.
    pub fn matching<'a>(
        &'a self,
        method: &'a Method,
        path: &'a str,
    ) -> impl Iterator<Item = &'a MiddlewareBinding> + 'a {
        self.bindings.iter().filter(move |b| b.matches(method, path))
    }

    /// Freeze the current routes and bindings into a request handler.
    ///
    /// Later changes to the router are not seen by handlers already built.
    pub fn handler(&self) -> Handler {
        let routes = BoxCloneSyncService::new(self.inner.clone());
        if self.bindings.is_empty() {
            return routes;
        }

        let bindings: Arc<[MiddlewareBinding]> = self.bindings.clone().into();
        contract::handler(service_fn(move |request: Request<Body>| {
            let chain = bindings
                .iter()
                .rev()
                .filter(|b| b.matches(request.method(), request.uri().path()))
                .fold(routes.clone(), |inner, binding| binding.wrap(inner));
            chain.oneshot(request)
        }))
    }
}

impl std::fmt::Debug for PlugRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlugRouter")
            .field("bindings", &self.bindings)
            .finish_non_exhaustive()
    }
}

/// A handler that builds the API's entry point on its first request.
///
/// Field writes made to the API after mounting but before traffic arrives
/// are therefore reflected in what gets served.
pub fn lazy_api<A: Api>(api: Shared<A>) -> Handler {
    let resolved: Arc<OnceLock<Handler>> = Arc::new(OnceLock::new());
    contract::handler(service_fn(move |request: Request<Body>| {
        let handler = resolved
            .get_or_init(|| {
                tracing::debug!("Building API handler");
                api.read().handler(None)
            })
            .clone();
        async move { Ok::<_, Infallible>(handler.oneshot(request).await?) }
    }))
}
