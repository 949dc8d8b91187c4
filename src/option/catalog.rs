//! Builder functions for every recognized configuration field.
//!
//! Each builder returns a [`PlugOption`] carrying the field key, the value
//! in the exact type the field is declared with, and the phase tag.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::http::request::Parts;
use axum::response::Response;

use super::{FieldWrite, Phase, PlugOption};
use crate::api::ApiError;
use crate::contract::{
    ApiKeyAuthenticatorFactory, ApiKeyLocation, Authenticator, BasicAuthenticatorFactory,
    BearerAuthenticatorFactory, ByteSize, CommandLineGroup, Consumer, ListenerScheme, LogHook,
    Producer, ScopedTokenAuthentication, ServeErrorFn, ShutdownHook, TokenAuthentication,
    UserPassAuthentication,
};
use crate::field::FieldKey;

fn server<T: std::any::Any + Send>(key: FieldKey, value: T) -> PlugOption {
    PlugOption::Server(FieldWrite::new(key, value))
}

fn api<T: std::any::Any + Send>(key: FieldKey, value: T) -> PlugOption {
    PlugOption::Api(FieldWrite::new(key, value))
}

/// Run the server's embedded API configuration routine.
///
/// Only needed when the server's own setup code should register handlers or
/// settings; it runs after the API has been installed.
pub fn with_configured_api() -> PlugOption {
    PlugOption::ConfigureApi
}

/// Sane API defaults: stock authenticators, JSON/byte-stream codecs, the
/// stock error serializer and a not-implemented HTML producer.
pub fn with_api_defaults() -> PlugOption {
    PlugOption::Defaults(Phase::Api)
}

/// Sane server timeouts and limits.
pub fn with_server_defaults() -> PlugOption {
    PlugOption::Defaults(Phase::Server)
}

/// The port to listen on for plain connections; 0 picks a free port.
pub fn with_port(port: u16) -> PlugOption {
    server(FieldKey::Port, port)
}

/// The IP or host name to listen on.
pub fn with_host(host: impl Into<String>) -> PlugOption {
    server(FieldKey::Host, host.into())
}

/// The listeners to enable.
pub fn with_enabled_listeners(listeners: impl IntoIterator<Item = ListenerScheme>) -> PlugOption {
    server(
        FieldKey::EnabledListeners,
        listeners.into_iter().collect::<Vec<_>>(),
    )
}

/// Grace period before connections still open after shutdown are killed.
pub fn with_cleanup_timeout(timeout: Duration) -> PlugOption {
    server(FieldKey::CleanupTimeout, timeout)
}

/// Grace period for in-flight requests during shutdown.
pub fn with_graceful_timeout(timeout: Duration) -> PlugOption {
    server(FieldKey::GracefulTimeout, timeout)
}

/// Maximum bytes read while parsing request headers, including the request
/// line. Does not limit the body.
pub fn with_max_header_size(bytes: u64) -> PlugOption {
    server(FieldKey::MaxHeaderSize, ByteSize(bytes))
}

/// The unix socket to listen on.
pub fn with_socket_path(path: impl Into<PathBuf>) -> PlugOption {
    server(FieldKey::SocketPath, path.into())
}

/// Limit the number of outstanding requests.
pub fn with_listen_limit(limit: usize) -> PlugOption {
    server(FieldKey::ListenLimit, limit)
}

/// Keep-alive period for accepted connections.
pub fn with_keep_alive(period: Duration) -> PlugOption {
    server(FieldKey::KeepAlive, period)
}

/// Maximum time to read a request's headers.
pub fn with_read_timeout(timeout: Duration) -> PlugOption {
    server(FieldKey::ReadTimeout, timeout)
}

/// Maximum time to produce a response.
pub fn with_write_timeout(timeout: Duration) -> PlugOption {
    server(FieldKey::WriteTimeout, timeout)
}

/// The IP or host name to listen on for TLS.
pub fn with_tls_host(host: impl Into<String>) -> PlugOption {
    server(FieldKey::TlsHost, host.into())
}

/// The port to listen on for TLS connections; 0 picks a free port.
pub fn with_tls_port(port: u16) -> PlugOption {
    server(FieldKey::TlsPort, port)
}

/// PEM certificate chain for TLS.
pub fn with_tls_certificate(path: impl Into<PathBuf>) -> PlugOption {
    server(FieldKey::TlsCertificate, Some(path.into()))
}

/// PEM private key for TLS.
pub fn with_tls_certificate_key(path: impl Into<PathBuf>) -> PlugOption {
    server(FieldKey::TlsCertificateKey, Some(path.into()))
}

/// PEM certificate authority for mutual TLS.
pub fn with_tls_ca_certificate(path: impl Into<PathBuf>) -> PlugOption {
    server(FieldKey::TlsCaCertificate, Some(path.into()))
}

pub fn with_tls_listen_limit(limit: usize) -> PlugOption {
    server(FieldKey::TlsListenLimit, limit)
}

pub fn with_tls_keep_alive(period: Duration) -> PlugOption {
    server(FieldKey::TlsKeepAlive, period)
}

pub fn with_tls_read_timeout(timeout: Duration) -> PlugOption {
    server(FieldKey::TlsReadTimeout, timeout)
}

pub fn with_tls_write_timeout(timeout: Duration) -> PlugOption {
    server(FieldKey::TlsWriteTimeout, timeout)
}

/// Receive the server's lifecycle log lines instead of `tracing`.
pub fn with_logger<F>(logger: F) -> PlugOption
where
    F: Fn(&str) + Send + Sync + 'static,
{
    let hook: LogHook = Arc::new(logger);
    server(FieldKey::Logger, Some(hook))
}

/// Called before the server stops accepting traffic.
pub fn with_pre_server_shutdown<F>(hook: F) -> PlugOption
where
    F: Fn() + Send + Sync + 'static,
{
    let hook: ShutdownHook = Arc::new(hook);
    server(FieldKey::PreServerShutdown, Some(hook))
}

/// Called once the server is shut down and no connection is left.
pub fn with_server_shutdown<F>(hook: F) -> PlugOption
where
    F: Fn() + Send + Sync + 'static,
{
    let hook: ShutdownHook = Arc::new(hook);
    server(FieldKey::ServerShutdown, Some(hook))
}

/// Extra command line option groups the server advertises.
pub fn with_command_line_options_groups(groups: Vec<CommandLineGroup>) -> PlugOption {
    server(FieldKey::CommandLineOptionsGroups, groups)
}

/// Factory turning a username/password check into an authenticator.
pub fn with_basic_authenticator<F>(factory: F) -> PlugOption
where
    F: Fn(UserPassAuthentication) -> Authenticator + Send + Sync + 'static,
{
    let factory: BasicAuthenticatorFactory = Arc::new(factory);
    api(FieldKey::BasicAuthenticator, Some(factory))
}

/// Factory turning an API key check into an authenticator.
pub fn with_api_key_authenticator<F>(factory: F) -> PlugOption
where
    F: Fn(&str, ApiKeyLocation, TokenAuthentication) -> Authenticator + Send + Sync + 'static,
{
    let factory: ApiKeyAuthenticatorFactory = Arc::new(factory);
    api(FieldKey::ApiKeyAuthenticator, Some(factory))
}

/// Factory turning a scoped bearer token check into an authenticator.
pub fn with_bearer_authenticator<F>(factory: F) -> PlugOption
where
    F: Fn(&str, ScopedTokenAuthentication) -> Authenticator + Send + Sync + 'static,
{
    let factory: BearerAuthenticatorFactory = Arc::new(factory);
    api(FieldKey::BearerAuthenticator, Some(factory))
}

/// Consumer for `application/json` request bodies.
pub fn with_json_consumer(consumer: impl Consumer + 'static) -> PlugOption {
    let consumer: Arc<dyn Consumer> = Arc::new(consumer);
    api(FieldKey::JsonConsumer, Some(consumer))
}

/// Producer for `application/octet-stream` responses.
pub fn with_bin_producer(producer: impl Producer + 'static) -> PlugOption {
    let producer: Arc<dyn Producer> = Arc::new(producer);
    api(FieldKey::BinProducer, Some(producer))
}

/// Producer for `text/html` responses.
pub fn with_html_producer(producer: impl Producer + 'static) -> PlugOption {
    let producer: Arc<dyn Producer> = Arc::new(producer);
    api(FieldKey::HtmlProducer, Some(producer))
}

/// Producer for `application/json` responses.
pub fn with_json_producer(producer: impl Producer + 'static) -> PlugOption {
    let producer: Arc<dyn Producer> = Arc::new(producer);
    api(FieldKey::JsonProducer, Some(producer))
}

/// Render API errors with `serve_error` instead of the stock serializer.
pub fn with_serve_error<F>(serve_error: F) -> PlugOption
where
    F: Fn(&Parts, &ApiError) -> Response + Send + Sync + 'static,
{
    let serve_error: ServeErrorFn = Arc::new(serve_error);
    api(FieldKey::ServeError, Some(serve_error))
}

/// Media type used when a request does not ask for one.
pub fn with_default_produces(media_type: impl Into<String>) -> PlugOption {
    api(FieldKey::DefaultProduces, media_type.into())
}

/// Media type assumed for request bodies without a content type.
pub fn with_default_consumes(media_type: impl Into<String>) -> PlugOption {
    api(FieldKey::DefaultConsumes, media_type.into())
}
