//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Expose listener settings, limits and hooks as writable fields
//! - Host one `RestApi` and the handler requests are dispatched to
//! - Bind and run the enabled listeners (http, https, unix)
//! - Wire up middleware (tracing, request deadline, request ID, request cap)
//! - Drain and stop on shutdown

use std::any::Any;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use parking_lot::Mutex;
use tokio::{sync::watch, task::JoinSet};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use super::ServerError;
use crate::api::{ApiError, RestApi};
use crate::contract::{
    Api, ByteSize, CommandLineGroup, Handler, ListenerScheme, LogHook, Server, Shared,
    ShutdownHook,
};
use crate::field::{FieldKey, Patchable};
use crate::lifecycle::Shutdown;
use crate::net::{listener, tls};

/// hyper refuses read buffers smaller than this.
const MIN_BUF_SIZE: usize = 8192;

/// Runs against the installed API when `configure_api` is called.
pub type ConfigureFn = Box<dyn FnMut(&mut RestApi) -> Result<(), ApiError> + Send + Sync>;

/// Per-listener connection and request limits.
#[derive(Debug, Clone, Copy)]
struct Limits {
    listen_limit: usize,
    read_timeout: Duration,
    write_timeout: Duration,
    max_header_size: ByteSize,
}

/// HTTP server hosting a [`RestApi`].
///
/// All public fields can be written through options before serving. A zero
/// duration or limit means "not set".
pub struct HttpServer {
    pub host: String,
    pub port: u16,
    pub enabled_listeners: Vec<ListenerScheme>,
    pub cleanup_timeout: Duration,
    pub graceful_timeout: Duration,
    pub max_header_size: ByteSize,
    pub socket_path: PathBuf,
    pub listen_limit: usize,
    pub keep_alive: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,

    pub tls_host: String,
    pub tls_port: u16,
    pub tls_certificate: Option<PathBuf>,
    pub tls_certificate_key: Option<PathBuf>,
    pub tls_ca_certificate: Option<PathBuf>,
    pub tls_listen_limit: usize,
    pub tls_keep_alive: Duration,
    pub tls_read_timeout: Duration,
    pub tls_write_timeout: Duration,

    pub logger: Option<LogHook>,
    pub pre_server_shutdown: Option<ShutdownHook>,
    pub server_shutdown: Option<ShutdownHook>,
    pub command_line_options_groups: Vec<CommandLineGroup>,

    configure: Option<ConfigureFn>,
    api: Option<Shared<RestApi>>,
    handler: ArcSwapOption<Handler>,
    shutdown: Shutdown,
    bound: Mutex<Vec<(ListenerScheme, SocketAddr)>>,
}

impl HttpServer {
    pub fn new() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 0,
            enabled_listeners: vec![ListenerScheme::Http],
            cleanup_timeout: Duration::ZERO,
            graceful_timeout: Duration::ZERO,
            max_header_size: ByteSize(0),
            socket_path: PathBuf::new(),
            listen_limit: 0,
            keep_alive: Duration::ZERO,
            read_timeout: Duration::ZERO,
            write_timeout: Duration::ZERO,
            tls_host: "localhost".to_string(),
            tls_port: 0,
            tls_certificate: None,
            tls_certificate_key: None,
            tls_ca_certificate: None,
            tls_listen_limit: 0,
            tls_keep_alive: Duration::ZERO,
            tls_read_timeout: Duration::ZERO,
            tls_write_timeout: Duration::ZERO,
            logger: None,
            pre_server_shutdown: None,
            server_shutdown: None,
            command_line_options_groups: Vec::new(),
            configure: None,
            api: None,
            handler: ArcSwapOption::empty(),
            shutdown: Shutdown::new(),
            bound: Mutex::new(Vec::new()),
        }
    }

    /// Set the routine `configure_api` runs against the installed API.
    pub fn with_configure<F>(mut self, configure: F) -> Self
    where
        F: FnMut(&mut RestApi) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        self.configure = Some(Box::new(configure));
        self
    }

    pub fn api(&self) -> Option<&Shared<RestApi>> {
        self.api.as_ref()
    }

    /// Addresses of the TCP listeners of the current (or last) serve.
    pub fn local_addrs(&self) -> Vec<(ListenerScheme, SocketAddr)> {
        self.bound.lock().clone()
    }

    fn log(&self, message: &str) {
        match &self.logger {
            Some(hook) => hook(message),
            None => tracing::info!("{message}"),
        }
    }

    fn plain_limits(&self) -> Limits {
        Limits {
            listen_limit: self.listen_limit,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
            max_header_size: self.max_header_size,
        }
    }

    fn tls_limits(&self) -> Limits {
        Limits {
            listen_limit: self.tls_listen_limit,
            read_timeout: self.tls_read_timeout,
            write_timeout: self.tls_write_timeout,
            max_header_size: self.max_header_size,
        }
    }

    fn active_handler(&self) -> Result<Handler, ServerError> {
        if let Some(handler) = self.handler.load_full() {
            return Ok((*handler).clone());
        }
        self.api
            .as_ref()
            .map(|api| api.read().handler(None))
            .ok_or(ServerError::NoHandler)
    }

    /// Build the service stack of one listener.
    #[allow(deprecated)]
    fn app(handler: Handler, limits: Limits) -> Router {
        let handler = match limits.listen_limit {
            0 => handler,
            max => listener::limit_concurrency(handler, max),
        };

        let mut app = Router::new().fallback_service(handler);
        if !limits.write_timeout.is_zero() {
            app = app.layer(TimeoutLayer::new(limits.write_timeout));
        }
        app.layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    fn tune(builder: &mut Builder<TokioExecutor>, limits: Limits) {
        let mut http1 = builder.http1();
        http1.timer(TokioTimer::new());
        if !limits.max_header_size.is_zero() {
            let size = usize::try_from(limits.max_header_size.bytes()).unwrap_or(usize::MAX);
            http1.max_buf_size(size.max(MIN_BUF_SIZE));
        }
        if !limits.read_timeout.is_zero() {
            http1.header_read_timeout(limits.read_timeout);
        }
    }

    async fn spawn_listeners(
        &self,
        handler: Handler,
        handle: &axum_server::Handle,
        stop: &watch::Receiver<bool>,
        tasks: &mut JoinSet<Result<(), ServerError>>,
    ) -> Result<(), ServerError> {
        let mut schemes: Vec<ListenerScheme> = Vec::new();
        for scheme in &self.enabled_listeners {
            if !schemes.contains(scheme) {
                schemes.push(*scheme);
            }
        }
        self.bound.lock().clear();

        for scheme in schemes {
            match scheme {
                ListenerScheme::Http => {
                    let socket = listener::bind_tcp(&self.host, self.port, self.keep_alive)?;
                    let address = socket.local_addr()?;
                    self.bound.lock().push((scheme, address));
                    self.log(&format!("Serving api at http://{address}"));

                    let limits = self.plain_limits();
                    let mut server = axum_server::from_tcp(socket).handle(handle.clone());
                    Self::tune(server.http_builder(), limits);
                    let app = Self::app(handler.clone(), limits);
                    tasks.spawn(async move {
                        server.serve(app.into_make_service()).await.map_err(ServerError::Io)
                    });
                }
                ListenerScheme::Https => {
                    let cert = self
                        .tls_certificate
                        .as_deref()
                        .ok_or(ServerError::MissingSetting("https", "TLSCertificate"))?;
                    let key = self
                        .tls_certificate_key
                        .as_deref()
                        .ok_or(ServerError::MissingSetting("https", "TLSCertificateKey"))?;
                    let config = tls::load_tls_config(cert, key, self.tls_ca_certificate.as_deref()).await?;

                    let socket = listener::bind_tcp(&self.tls_host, self.tls_port, self.tls_keep_alive)?;
                    let address = socket.local_addr()?;
                    self.bound.lock().push((scheme, address));
                    self.log(&format!("Serving api at https://{address}"));

                    let limits = self.tls_limits();
                    let mut server = axum_server::from_tcp_rustls(socket, config).handle(handle.clone());
                    Self::tune(server.http_builder(), limits);
                    let app = Self::app(handler.clone(), limits);
                    tasks.spawn(async move {
                        server.serve(app.into_make_service()).await.map_err(ServerError::Io)
                    });
                }
                #[cfg(unix)]
                ListenerScheme::Unix => {
                    if self.socket_path.as_os_str().is_empty() {
                        return Err(ServerError::MissingSetting("unix", "SocketPath"));
                    }
                    let socket = listener::bind_unix(&self.socket_path)?;
                    self.log(&format!("Serving api at unix://{}", self.socket_path.display()));

                    let app = Self::app(handler.clone(), self.plain_limits());
                    let mut stop = stop.clone();
                    tasks.spawn(async move {
                        axum::serve(socket, app)
                            .with_graceful_shutdown(async move {
                                let _ = stop.wait_for(|stopping| *stopping).await;
                            })
                            .await
                            .map_err(ServerError::Io)
                    });
                }
                #[cfg(not(unix))]
                ListenerScheme::Unix => {
                    return Err(ServerError::Io(std::io::Error::new(
                        std::io::ErrorKind::Unsupported,
                        "unix sockets are not supported on this platform",
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for HttpServer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HttpServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServer")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("enabled_listeners", &self.enabled_listeners)
            .field("tls_host", &self.tls_host)
            .field("tls_port", &self.tls_port)
            .field("socket_path", &self.socket_path)
            .finish_non_exhaustive()
    }
}

impl Patchable for HttpServer {
    fn field_mut(&mut self, key: FieldKey) -> Option<&mut dyn Any> {
        match key {
            FieldKey::Host => Some(&mut self.host),
            FieldKey::Port => Some(&mut self.port),
            FieldKey::EnabledListeners => Some(&mut self.enabled_listeners),
            FieldKey::CleanupTimeout => Some(&mut self.cleanup_timeout),
            FieldKey::GracefulTimeout => Some(&mut self.graceful_timeout),
            FieldKey::MaxHeaderSize => Some(&mut self.max_header_size),
            FieldKey::SocketPath => Some(&mut self.socket_path),
            FieldKey::ListenLimit => Some(&mut self.listen_limit),
            FieldKey::KeepAlive => Some(&mut self.keep_alive),
            FieldKey::ReadTimeout => Some(&mut self.read_timeout),
            FieldKey::WriteTimeout => Some(&mut self.write_timeout),
            FieldKey::TlsHost => Some(&mut self.tls_host),
            FieldKey::TlsPort => Some(&mut self.tls_port),
            FieldKey::TlsCertificate => Some(&mut self.tls_certificate),
            FieldKey::TlsCertificateKey => Some(&mut self.tls_certificate_key),
            FieldKey::TlsCaCertificate => Some(&mut self.tls_ca_certificate),
            FieldKey::TlsListenLimit => Some(&mut self.tls_listen_limit),
            FieldKey::TlsKeepAlive => Some(&mut self.tls_keep_alive),
            FieldKey::TlsReadTimeout => Some(&mut self.tls_read_timeout),
            FieldKey::TlsWriteTimeout => Some(&mut self.tls_write_timeout),
            FieldKey::Logger => Some(&mut self.logger),
            FieldKey::PreServerShutdown => Some(&mut self.pre_server_shutdown),
            FieldKey::ServerShutdown => Some(&mut self.server_shutdown),
            FieldKey::CommandLineOptionsGroups => Some(&mut self.command_line_options_groups),
            _ => None,
        }
    }
}

#[async_trait]
impl Server for HttpServer {
    type Api = RestApi;
    type Error = ServerError;

    fn configure_api(&mut self) -> Result<(), ServerError> {
        let Some(configure) = self.configure.as_mut() else {
            tracing::debug!("No api configuration routine set");
            return Ok(());
        };
        let api = self.api.as_ref().ok_or(ServerError::NoApi)?;
        let mut api = api.write();
        configure(&mut *api).map_err(ServerError::Configure)
    }

    fn set_api(&mut self, api: Shared<RestApi>) {
        self.api = Some(api);
        self.handler.store(None);
    }

    fn handler(&self) -> Option<Handler> {
        self.handler.load_full().map(|handler| (*handler).clone())
    }

    fn set_handler(&self, handler: Handler) {
        self.handler.store(Some(Arc::new(handler)));
    }

    async fn serve(&self) -> Result<(), ServerError> {
        if self.shutdown.is_triggered() {
            self.log("Shutdown was requested before serving; not starting listeners");
            return Ok(());
        }
        if let Some(api) = &self.api {
            api.read().validate().map_err(ServerError::InvalidApi)?;
        }
        let handler = self.active_handler()?;

        let handle = axum_server::Handle::new();
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();
        if let Err(err) = self.spawn_listeners(handler, &handle, &stop_rx, &mut tasks).await {
            handle.shutdown();
            stop_tx.send_replace(true);
            tasks.shutdown().await;
            return Err(err);
        }

        let graceful = (!self.graceful_timeout.is_zero()).then_some(self.graceful_timeout);
        let mut stopping = false;
        let mut deadline: Option<tokio::time::Instant> = None;
        let mut first_error: Option<ServerError> = None;

        loop {
            let mut begin_stop = false;
            tokio::select! {
                _ = self.shutdown.triggered(), if !stopping => {
                    self.log("Stopping listeners");
                    begin_stop = true;
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(tokio::time::Instant::now)), if deadline.is_some() => {
                    tracing::warn!(remaining = tasks.len(), "Cleanup timeout elapsed, aborting listeners");
                    tasks.abort_all();
                    deadline = None;
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok(Ok(()))) => {}
                    Some(Ok(Err(err))) => {
                        tracing::error!(error = %err, "Listener failed");
                        if first_error.is_none() {
                            first_error = Some(err);
                        }
                        begin_stop = !stopping;
                    }
                    Some(Err(join_error)) if join_error.is_cancelled() => {}
                    Some(Err(join_error)) => {
                        tracing::error!(error = %join_error, "Listener task panicked");
                        if first_error.is_none() {
                            first_error = Some(ServerError::Task(join_error.to_string()));
                        }
                        begin_stop = !stopping;
                    }
                }
            }

            if begin_stop {
                stopping = true;
                handle.graceful_shutdown(graceful);
                stop_tx.send_replace(true);
                if let Some(graceful) = graceful {
                    if !self.cleanup_timeout.is_zero() {
                        deadline = Some(tokio::time::Instant::now() + graceful + self.cleanup_timeout);
                    }
                }
            }
        }

        if let Some(hook) = &self.server_shutdown {
            hook();
        }
        self.log("Stopped serving api");
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn shutdown(&self) -> Result<(), ServerError> {
        if let Some(hook) = &self.pre_server_shutdown {
            hook();
        }
        self.log("Shutting down api server");
        self.shutdown.trigger();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::option::{self, PlugOption};

    #[test]
    fn test_server_defaults_land_on_fields() {
        let mut server = HttpServer::new();
        option::with_server_defaults().write_to(&mut server);

        assert_eq!(server.cleanup_timeout, Duration::from_secs(10));
        assert_eq!(server.graceful_timeout, Duration::from_secs(15));
        assert_eq!(server.max_header_size, ByteSize(ByteSize::MIB));
        assert_eq!(server.socket_path, PathBuf::from("/var/run/api-plugger.sock"));
        assert_eq!(server.keep_alive, Duration::from_secs(180));
        assert_eq!(server.read_timeout, Duration::from_secs(30));
        assert_eq!(server.write_timeout, Duration::from_secs(60));
        // untouched by defaults
        assert_eq!(server.port, 0);
        assert_eq!(server.enabled_listeners, vec![ListenerScheme::Http]);
    }

    #[test]
    fn test_api_options_are_not_server_fields() {
        let mut server = HttpServer::new();
        let written = option::with_default_produces("text/plain").write_to(&mut server);
        assert_eq!(written, 0);
        assert_eq!(PlugOption::Defaults(option::Phase::Api).write_to(&mut server), 0);
    }

    #[test]
    fn test_configure_api_needs_an_api() {
        let mut server = HttpServer::new();
        assert!(server.configure_api().is_ok());

        let mut server = HttpServer::new().with_configure(|api| {
            api.set_default_produces("text/plain");
            Ok(())
        });
        assert!(matches!(server.configure_api(), Err(ServerError::NoApi)));

        let api = Shared::new(RestApi::new("configured"));
        server.set_api(api.clone());
        server.configure_api().unwrap();
        assert_eq!(api.read().default_produces(), "text/plain");
    }

    #[test]
    fn test_configure_error_is_wrapped() {
        let mut server = HttpServer::new()
            .with_configure(|_| Err(ApiError::Internal("broken".into())));
        server.set_api(Shared::new(RestApi::default()));

        let err = server.configure_api().unwrap_err();
        assert_eq!(err.to_string(), "api configuration failed: internal error: broken");
    }

    #[tokio::test]
    async fn test_serve_rejects_invalid_api() {
        let mut server = HttpServer::new();
        server.set_api(Shared::new(RestApi::new("bare")));

        let err = server.serve().await.unwrap_err();
        assert!(matches!(err, ServerError::InvalidApi(ApiError::Validation(_))));
    }

    #[tokio::test]
    async fn test_serve_without_handler() {
        let server = HttpServer::new();
        assert!(matches!(server.serve().await, Err(ServerError::NoHandler)));
    }

    #[tokio::test]
    async fn test_shutdown_before_serve() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut server = HttpServer::new();
        let pre = calls.clone();
        server.pre_server_shutdown = Some(Arc::new(move || pre.lock().push("pre")));
        let post = calls.clone();
        server.server_shutdown = Some(Arc::new(move || post.lock().push("post")));

        server.shutdown().await.unwrap();
        server.shutdown().await.unwrap();
        server.serve().await.unwrap();

        assert_eq!(*calls.lock(), vec!["pre", "pre"]);
    }

    #[tokio::test]
    async fn test_https_requires_certificate() {
        let mut server = HttpServer::new();
        server.enabled_listeners = vec![ListenerScheme::Https];
        server.set_handler(crate::contract::handler(tower::service_fn(
            |_req: axum::http::Request<axum::body::Body>| async {
                Ok::<_, std::convert::Infallible>(axum::response::Response::default())
            },
        )));

        let err = server.serve().await.unwrap_err();
        assert_eq!(err.to_string(), "https listener is enabled but TLSCertificate is not set");
    }

    #[test]
    fn test_log_hook_replaces_tracing() {
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let mut server = HttpServer::new();
        let sink = lines.clone();
        option::with_logger(move |line: &str| sink.lock().push(line.to_string())).write_to(&mut server);

        server.log("hello");
        assert_eq!(*lines.lock(), vec!["hello".to_string()]);
    }
}
