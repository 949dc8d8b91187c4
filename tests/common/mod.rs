//! Shared utilities for integration testing.
//!
//! Recording collaborators log every capability call and field write so
//! tests can assert on the exact order the Plug drives them in.

#![allow(dead_code)]

use std::any::Any;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use api_plugger::api::{media, ApiError, Operation, Reply, RestApi};
use api_plugger::contract::{self, Api, Consumer, Handler, Middleware, Producer, Server, Shared};
use api_plugger::field::{FieldKey, Patchable};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    response::IntoResponse,
};
use parking_lot::Mutex;
use serde_json::json;
use tower::{service_fn, ServiceExt};

/// One observed interaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ApiField(FieldKey),
    ServerField(FieldKey),
    SetApi,
    ConfigureApi,
    SetHandler,
    Serve,
    Shutdown,
}

pub type Journal = Arc<Mutex<Vec<Event>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

/// An API exposing only the media type fields.
pub struct RecordingApi {
    pub default_produces: String,
    pub default_consumes: String,
    journal: Journal,
}

impl RecordingApi {
    pub fn new(journal: Journal) -> Self {
        Self {
            default_produces: String::new(),
            default_consumes: String::new(),
            journal,
        }
    }
}

impl Patchable for RecordingApi {
    fn field_mut(&mut self, key: FieldKey) -> Option<&mut dyn Any> {
        let slot: &mut dyn Any = match key {
            FieldKey::DefaultProduces => &mut self.default_produces,
            FieldKey::DefaultConsumes => &mut self.default_consumes,
            _ => return None,
        };
        self.journal.lock().push(Event::ApiField(key));
        Some(slot)
    }
}

impl Api for RecordingApi {
    /// Answers every request with `api:<default produces>`.
    fn handler(&self, wrapper: Option<Middleware>) -> Handler {
        let produces = self.default_produces.clone();
        let handler = contract::handler(service_fn(move |_req: Request<Body>| {
            let body = format!("api:{produces}");
            async move { Ok::<_, Infallible>(body.into_response()) }
        }));
        match wrapper {
            Some(wrap) => wrap(handler),
            None => handler,
        }
    }

    fn default_produces(&self) -> &str {
        &self.default_produces
    }

    fn set_default_produces(&mut self, media_type: &str) {
        self.default_produces = media_type.to_string();
    }

    fn default_consumes(&self) -> &str {
        &self.default_consumes
    }

    fn set_default_consumes(&mut self, media_type: &str) {
        self.default_consumes = media_type.to_string();
    }

    fn register_consumer(&mut self, _media_type: &str, _consumer: Arc<dyn Consumer>) {}

    fn register_producer(&mut self, _media_type: &str, _producer: Arc<dyn Producer>) {}

    fn add_middleware_for(&mut self, _method: Method, _path: &str, _middleware: Middleware) {}

    fn validate(&self) -> Result<(), ApiError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("recording server: {0}")]
pub struct RecordingError(pub String);

/// A server exposing host, port and graceful timeout; it never binds.
pub struct RecordingServer {
    pub host: String,
    pub port: u16,
    pub graceful_timeout: Duration,
    pub api: Option<Shared<RecordingApi>>,
    pub configure_error: Option<RecordingError>,
    pub serve_error: Option<RecordingError>,
    pub shutdown_error: Option<RecordingError>,
    handler: Mutex<Option<Handler>>,
    journal: Journal,
}

impl RecordingServer {
    pub fn new(journal: Journal) -> Self {
        Self {
            host: String::new(),
            port: 0,
            graceful_timeout: Duration::ZERO,
            api: None,
            configure_error: None,
            serve_error: None,
            shutdown_error: None,
            handler: Mutex::new(None),
            journal,
        }
    }

    fn record(&self, event: Event) {
        self.journal.lock().push(event);
    }
}

impl Patchable for RecordingServer {
    fn field_mut(&mut self, key: FieldKey) -> Option<&mut dyn Any> {
        let slot: &mut dyn Any = match key {
            FieldKey::Host => &mut self.host,
            FieldKey::Port => &mut self.port,
            FieldKey::GracefulTimeout => &mut self.graceful_timeout,
            _ => return None,
        };
        self.journal.lock().push(Event::ServerField(key));
        Some(slot)
    }
}

#[async_trait]
impl Server for RecordingServer {
    type Api = RecordingApi;
    type Error = RecordingError;

    fn configure_api(&mut self) -> Result<(), RecordingError> {
        self.record(Event::ConfigureApi);
        match self.configure_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn set_api(&mut self, api: Shared<RecordingApi>) {
        self.record(Event::SetApi);
        self.api = Some(api);
    }

    fn handler(&self) -> Option<Handler> {
        self.handler.lock().clone()
    }

    fn set_handler(&self, handler: Handler) {
        self.record(Event::SetHandler);
        *self.handler.lock() = Some(handler);
    }

    async fn serve(&self) -> Result<(), RecordingError> {
        self.record(Event::Serve);
        match self.serve_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn shutdown(&self) -> Result<(), RecordingError> {
        self.record(Event::Shutdown);
        match self.shutdown_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Send a bodiless request through `handler` and return status and body text.
pub async fn call(handler: &Handler, method: Method, path: &str) -> (u16, String) {
    use http_body_util::BodyExt;

    let request = Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .unwrap();
    let response = handler.clone().oneshot(request).await.unwrap();
    let status = response.status().as_u16();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

/// Middleware adding `x-tag: <value>` to every response it wraps.
pub fn tag(value: &'static str) -> Middleware {
    contract::middleware(move |next: Handler| {
        contract::handler(service_fn(move |request: Request<Body>| {
            let next = next.clone();
            async move {
                let mut response = next.oneshot(request).await?;
                response.headers_mut().append("x-tag", value.parse().unwrap());
                Ok::<_, Infallible>(response)
            }
        }))
    })
}

/// A small API with a greeting and a slow operation.
pub fn greeting_api() -> RestApi {
    let mut api = RestApi::new("greeter");
    api.add_operation(Operation::new("getGreeting", Method::GET, "/greeting/{name}", |req| async move {
        Reply::ok(json!({ "greeting": format!("hello {}", req.param("name").unwrap_or("?")) }))
    }));
    api.add_operation(Operation::new("slow", Method::GET, "/slow", |_req| async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        Reply::ok("done")
    }));
    api.add_operation(Operation::new("raw", Method::GET, "/raw", |_req| async move {
        Reply::ok("raw bytes")
    }));
    api
}

pub const JSON: &str = media::JSON;

/// Wait until something accepts connections on `addr`.
pub async fn wait_for_port(addr: &str) {
    for _ in 0..50 {
        if tokio::net::TcpStream::connect(addr).await.is_ok() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("nothing is listening on {addr}");
}
