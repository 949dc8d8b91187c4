//! The Plug: binds an API to a server and drives their lifecycle.
//!
//! # Data Flow
//! ```text
//! Plug::new(server, api, options)
//!     → router mounts the API entry point at "/"
//!     → Api-phase options → api
//!     → server.set_api(api)
//!     → Server-phase options → server (ConfigureApi → server.configure_api())
//! Plug::serve()
//!     → server.set_handler(router.handler()) → server.serve()
//! ```
//!
//! # Design Decisions
//! - Options are consumed during construction and never retained
//! - Server and API identity are fixed after construction; only fields change
//! - Collaborator errors are returned unmodified
//! - `serve` and `shutdown` borrow immutably so one task can serve while
//!   another shuts down through an `Arc<Plug<_>>`

use crate::contract::{Handler, Middleware, Server, Shared};
use crate::option::{Phase, PlugOption};
use crate::routing::{lazy_api, PlugRouter};

use axum::http::Method;

/// Orchestrates option application, middleware and serving for one server.
pub struct Plug<S: Server> {
    server: S,
    api: Option<Shared<S::Api>>,
    router: Option<PlugRouter>,
}

impl<S: Server> Plug<S> {
    /// Bind `api` to `server`, applying `options` in two phases.
    ///
    /// Api-phase options are applied to the API, in the order given, before
    /// the API is installed into the server. Server-phase options follow, in
    /// order, against the server.
    pub fn new(
        server: S,
        api: Shared<S::Api>,
        options: impl IntoIterator<Item = PlugOption>,
    ) -> Result<Self, S::Error> {
        let mut router = PlugRouter::new();
        router.mount(lazy_api(api.clone()));

        let mut plug = Self {
            server,
            api: Some(api.clone()),
            router: Some(router),
        };

        let (api_options, server_options): (Vec<_>, Vec<_>) = options
            .into_iter()
            .partition(|option| option.phase() == Phase::Api);

        {
            let mut target = api.write();
            for option in api_options {
                let written = option.write_to(&mut *target);
                tracing::trace!(written, "Api option applied");
            }
        }

        plug.server.set_api(api);
        tracing::debug!("Api installed into server");

        for option in server_options {
            plug.apply_to_server(option)?;
        }
        Ok(plug)
    }

    /// A Plug for a server that carries its own API.
    ///
    /// Every option is applied to the server in the order given; no router
    /// exists until middleware or the router is asked for.
    pub fn standalone(
        server: S,
        options: impl IntoIterator<Item = PlugOption>,
    ) -> Result<Self, S::Error> {
        let mut plug = Self {
            server,
            api: None,
            router: None,
        };
        for option in options {
            plug.apply_to_server(option)?;
        }
        Ok(plug)
    }

    fn apply_to_server(&mut self, option: PlugOption) -> Result<(), S::Error> {
        match option {
            PlugOption::ConfigureApi => {
                tracing::debug!("Running embedded api configuration");
                self.server.configure_api()
            }
            option => {
                let key = option.key();
                let written = option.write_to(&mut self.server);
                tracing::trace!(?key, written, "Server option applied");
                Ok(())
            }
        }
    }

    /// Wrap requests to `path` with `middleware`, once per listed method.
    ///
    /// Registrations accumulate; an empty method list registers nothing.
    pub fn set_middleware(&mut self, path: &str, middleware: Middleware, methods: &[Method]) -> &mut Self {
        let router = self.router_mut();
        for method in methods {
            router.add_middleware_for(method.clone(), path, middleware.clone());
        }
        self
    }

    /// The live router, for mounting extra routes before serving.
    pub fn router_mut(&mut self) -> &mut PlugRouter {
        let server = &self.server;
        self.router.get_or_insert_with(|| {
            let mut router = PlugRouter::new();
            if let Some(handler) = server.handler() {
                router.mount(handler);
            }
            router
        })
    }

    pub fn server(&self) -> &S {
        &self.server
    }

    pub fn server_mut(&mut self) -> &mut S {
        &mut self.server
    }

    /// The shared API, when constructed with one.
    pub fn api(&self) -> Option<&Shared<S::Api>> {
        self.api.as_ref()
    }

    /// Install the router as the server's handler, then serve.
    pub async fn serve(&self) -> Result<(), S::Error> {
        if let Some(router) = &self.router {
            let handler: Handler = router.handler();
            self.server.set_handler(handler);
        }
        tracing::debug!("Serving");
        self.server.serve().await
    }

    pub async fn shutdown(&self) -> Result<(), S::Error> {
        tracing::debug!("Shutting down");
        self.server.shutdown().await
    }
}

impl<S: Server + std::fmt::Debug> std::fmt::Debug for Plug<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plug")
            .field("server", &self.server)
            .field("api", &self.api)
            .field("router", &self.router)
            .finish()
    }
}
