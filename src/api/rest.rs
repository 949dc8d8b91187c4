//! A REST API object: operations, codecs and security behind named fields.
//!
//! # Responsibilities
//! - Hold operation handlers keyed by method and path pattern
//! - Decode request bodies and encode replies by media type
//! - Authenticate operations against registered security schemes
//! - Expose its hook points as named fields for option writes
//!
//! # Design Decisions
//! - Routing is axum's; this type only builds the axum router
//! - Hooks are read when the handler is built, not per request
//! - A missing hook degrades to an error response, `validate` reports it

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, request::Parts, HeaderMap, Method, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{MethodFilter, MethodRouter},
    Router,
};
use http_body_util::LengthLimitError;
use serde::Serialize;
use serde_json::Value;
use tower::{service_fn, util::BoxCloneSyncService};

use super::{errors, media, ApiError};
use crate::contract::{
    self, Api, ApiKeyAuthenticatorFactory, ApiKeyLocation, Authenticator,
    BasicAuthenticatorFactory, BearerAuthenticatorFactory, Consumer, Handler, Middleware,
    Principal, Producer, ScopedTokenAuthentication, ServeErrorFn, TokenAuthentication,
    UserPassAuthentication,
};
use crate::field::{FieldKey, Patchable};
use crate::routing::PathPattern;

/// Request bodies above this size are rejected unless overridden.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// What an operation handler sees.
#[derive(Debug)]
pub struct OperationRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub params: HashMap<String, String>,
    pub body: Option<Value>,
    pub principal: Option<Principal>,
}

impl OperationRequest {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

/// An operation's result, encoded by the negotiated producer.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: StatusCode,
    pub payload: Option<Value>,
}

impl Reply {
    pub fn ok(payload: impl Serialize) -> Result<Self, ApiError> {
        Self::with_status(StatusCode::OK, payload)
    }

    pub fn with_status(status: StatusCode, payload: impl Serialize) -> Result<Self, ApiError> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| ApiError::Internal(format!("reply is not serializable: {e}")))?;
        Ok(Self {
            status,
            payload: Some(payload),
        })
    }

    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            payload: None,
        }
    }
}

type OperationFuture = Pin<Box<dyn Future<Output = Result<Reply, ApiError>> + Send>>;
type OperationFn = Arc<dyn Fn(OperationRequest) -> OperationFuture + Send + Sync>;

/// A named security requirement: scheme plus the scopes it must grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityRequirement {
    pub scheme: String,
    pub scopes: Vec<String>,
}

/// One routed operation.
#[derive(Clone)]
pub struct Operation {
    id: String,
    method: Method,
    pattern: PathPattern,
    security: Vec<SecurityRequirement>,
    handler: OperationFn,
}

impl Operation {
    pub fn new<F, Fut>(id: impl Into<String>, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(OperationRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, ApiError>> + Send + 'static,
    {
        Self {
            id: id.into(),
            method,
            pattern: PathPattern::parse(path),
            security: Vec::new(),
            handler: Arc::new(move |request| Box::pin(handler(request))),
        }
    }

    /// Accept requests authenticated by `scheme` granting `scopes`.
    ///
    /// Several requirements are alternatives: any one passing is enough.
    pub fn secured_by(mut self, scheme: &str, scopes: &[&str]) -> Self {
        self.security.push(SecurityRequirement {
            scheme: scheme.to_string(),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
        });
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        self.pattern.as_str()
    }
}

/// How a named security scheme checks credentials.
#[derive(Clone)]
pub enum SecurityScheme {
    Basic(UserPassAuthentication),
    ApiKey {
        name: String,
        location: ApiKeyLocation,
        check: TokenAuthentication,
    },
    Bearer(ScopedTokenAuthentication),
}

impl SecurityScheme {
    fn kind(&self) -> &'static str {
        match self {
            SecurityScheme::Basic(_) => "basic",
            SecurityScheme::ApiKey { .. } => "api key",
            SecurityScheme::Bearer(_) => "bearer",
        }
    }
}

struct OperationMiddleware {
    method: Method,
    path: String,
    middleware: Middleware,
}

/// A REST API whose hooks are configurable fields.
pub struct RestApi {
    title: String,
    pub basic_authenticator: Option<BasicAuthenticatorFactory>,
    pub api_key_authenticator: Option<ApiKeyAuthenticatorFactory>,
    pub bearer_authenticator: Option<BearerAuthenticatorFactory>,
    pub json_consumer: Option<Arc<dyn Consumer>>,
    pub json_producer: Option<Arc<dyn Producer>>,
    pub bin_producer: Option<Arc<dyn Producer>>,
    pub html_producer: Option<Arc<dyn Producer>>,
    pub serve_error: Option<ServeErrorFn>,
    pub body_limit: usize,
    default_produces: String,
    default_consumes: String,
    consumers: HashMap<String, Arc<dyn Consumer>>,
    producers: HashMap<String, Arc<dyn Producer>>,
    schemes: HashMap<String, SecurityScheme>,
    operations: Vec<Operation>,
    middleware: Vec<OperationMiddleware>,
}

impl RestApi {
    /// An API with no operations and no hooks set.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            basic_authenticator: None,
            api_key_authenticator: None,
            bearer_authenticator: None,
            json_consumer: None,
            json_producer: None,
            bin_producer: None,
            html_producer: None,
            serve_error: None,
            body_limit: DEFAULT_BODY_LIMIT,
            default_produces: media::JSON.to_string(),
            default_consumes: media::JSON.to_string(),
            consumers: HashMap::new(),
            producers: HashMap::new(),
            schemes: HashMap::new(),
            operations: Vec::new(),
            middleware: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn add_operation(&mut self, operation: Operation) -> &mut Self {
        tracing::debug!(
            api = %self.title,
            operation = %operation.id,
            method = %operation.method,
            path = %operation.path(),
            "Operation registered"
        );
        self.operations.push(operation);
        self
    }

    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn add_security_scheme(&mut self, name: impl Into<String>, scheme: SecurityScheme) -> &mut Self {
        self.schemes.insert(name.into(), scheme);
        self
    }

    /// The consumer used for `media_type` bodies.
    pub fn consumer_for(&self, media_type: &str) -> Option<Arc<dyn Consumer>> {
        let media_type = media::essence(media_type);
        if let Some(consumer) = self.consumers.get(&media_type) {
            return Some(consumer.clone());
        }
        match media_type.as_str() {
            media::JSON => self.json_consumer.clone(),
            _ => None,
        }
    }

    /// The producer used for `media_type` replies.
    pub fn producer_for(&self, media_type: &str) -> Option<Arc<dyn Producer>> {
        let media_type = media::essence(media_type);
        if let Some(producer) = self.producers.get(&media_type) {
            return Some(producer.clone());
        }
        match media_type.as_str() {
            media::JSON => self.json_producer.clone(),
            media::OCTET_STREAM => self.bin_producer.clone(),
            media::HTML => self.html_producer.clone(),
            _ => None,
        }
    }

    fn all_producers(&self) -> Vec<(String, Arc<dyn Producer>)> {
        let mut media_types: Vec<String> = vec![media::essence(&self.default_produces)];
        let builtin = [media::JSON, media::OCTET_STREAM, media::HTML];
        let registered = self.producers.keys().map(String::as_str);
        for media_type in builtin.into_iter().chain(registered) {
            if !media_types.iter().any(|known| known == media_type) {
                media_types.push(media_type.to_string());
            }
        }
        media_types
            .into_iter()
            .filter_map(|media_type| {
                let producer = self.producer_for(&media_type)?;
                Some((media_type, producer))
            })
            .collect()
    }

    fn authenticator_for(&self, scheme: &str) -> Result<Authenticator, ApiError> {
        let not_configured = |what: &str| {
            ApiError::Internal(format!("security scheme `{scheme}` has no {what} authenticator"))
        };
        match self.schemes.get(scheme) {
            None => Err(ApiError::Internal(format!(
                "security scheme `{scheme}` is not registered"
            ))),
            Some(SecurityScheme::Basic(check)) => self
                .basic_authenticator
                .as_ref()
                .map(|factory| factory(check.clone()))
                .ok_or_else(|| not_configured("basic")),
            Some(SecurityScheme::ApiKey {
                name,
                location,
                check,
            }) => self
                .api_key_authenticator
                .as_ref()
                .map(|factory| factory(name.as_str(), *location, check.clone()))
                .ok_or_else(|| not_configured("api key")),
            Some(SecurityScheme::Bearer(check)) => self
                .bearer_authenticator
                .as_ref()
                .map(|factory| factory(scheme, check.clone()))
                .ok_or_else(|| not_configured("bearer")),
        }
    }

    fn compile(&self, operation: &Operation) -> Handler {
        let guards = operation
            .security
            .iter()
            .map(|requirement| Guard {
                authenticator: self.authenticator_for(&requirement.scheme),
                scopes: requirement.scopes.clone(),
            })
            .collect();

        let dispatch = Arc::new(Dispatch {
            operation: operation.clone(),
            guards,
            codecs: self.codecs(),
        });

        let mut handler = contract::handler(service_fn(move |request: Request<Body>| {
            let dispatch = dispatch.clone();
            async move { Ok::<_, Infallible>(dispatch.run(request).await) }
        }));

        // first registered runs outermost
        for entry in self.middleware.iter().rev() {
            if entry.method == operation.method && entry.path == operation.pattern.axum_path() {
                handler = (entry.middleware)(handler);
            }
        }
        handler
    }

    fn codecs(&self) -> Arc<Codecs> {
        let mut consumers: HashMap<String, Arc<dyn Consumer>> = self.consumers.clone();
        if let Some(json) = &self.json_consumer {
            consumers.entry(media::JSON.to_string()).or_insert_with(|| json.clone());
        }
        Arc::new(Codecs {
            consumers,
            producers: self.all_producers(),
            default_consumes: media::essence(&self.default_consumes),
            body_limit: self.body_limit,
            serve_error: self
                .serve_error
                .clone()
                .unwrap_or_else(|| Arc::new(errors::serve_error)),
        })
    }
}

impl Default for RestApi {
    fn default() -> Self {
        Self::new("api")
    }
}

impl Patchable for RestApi {
    fn field_mut(&mut self, key: FieldKey) -> Option<&mut dyn Any> {
        match key {
            FieldKey::BasicAuthenticator => Some(&mut self.basic_authenticator),
            FieldKey::ApiKeyAuthenticator => Some(&mut self.api_key_authenticator),
            FieldKey::BearerAuthenticator => Some(&mut self.bearer_authenticator),
            FieldKey::JsonConsumer => Some(&mut self.json_consumer),
            FieldKey::JsonProducer => Some(&mut self.json_producer),
            FieldKey::BinProducer => Some(&mut self.bin_producer),
            FieldKey::HtmlProducer => Some(&mut self.html_producer),
            FieldKey::ServeError => Some(&mut self.serve_error),
            FieldKey::DefaultProduces => Some(&mut self.default_produces),
            FieldKey::DefaultConsumes => Some(&mut self.default_consumes),
            _ => None,
        }
    }
}

impl Api for RestApi {
    fn handler(&self, wrapper: Option<Middleware>) -> Handler {
        let mut paths: BTreeMap<String, MethodRouter> = BTreeMap::new();
        let mut routed = HashSet::new();
        for operation in &self.operations {
            let filter = match MethodFilter::try_from(operation.method.clone()) {
                Ok(filter) => filter,
                Err(_) => {
                    tracing::warn!(
                        operation = %operation.id,
                        method = %operation.method,
                        "Method cannot be routed, operation skipped"
                    );
                    continue;
                }
            };
            let path = operation.pattern.axum_path();
            if !routed.insert((operation.method.clone(), path.clone())) {
                tracing::warn!(
                    operation = %operation.id,
                    method = %operation.method,
                    path = %path,
                    "Operation duplicates an earlier route, skipped"
                );
                continue;
            }
            let route = paths.remove(&path).unwrap_or_default();
            paths.insert(path, route.on_service(filter, self.compile(operation)));
        }

        let codecs = self.codecs();
        let not_found = service_fn(move |request: Request<Body>| {
            let codecs = codecs.clone();
            async move {
                let (parts, _) = request.into_parts();
                let err = ApiError::NotFound(format!("path {} was not found", parts.uri.path()));
                Ok::<_, Infallible>((codecs.serve_error)(&parts, &err))
            }
        });

        let router = paths
            .into_iter()
            .fold(Router::new(), |router, (path, route)| router.route(&path, route))
            .fallback_service(not_found);

        let handler = BoxCloneSyncService::new(router);
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

    fn register_consumer(&mut self, media_type: &str, consumer: Arc<dyn Consumer>) {
        self.consumers.insert(media::essence(media_type), consumer);
    }

    fn register_producer(&mut self, media_type: &str, producer: Arc<dyn Producer>) {
        self.producers.insert(media::essence(media_type), producer);
    }

    fn add_middleware_for(&mut self, method: Method, path: &str, middleware: Middleware) {
        self.middleware.push(OperationMiddleware {
            method,
            path: PathPattern::parse(path).axum_path(),
            middleware,
        });
    }

    fn validate(&self) -> Result<(), ApiError> {
        let mut problems = Vec::new();

        if self.producer_for(&self.default_produces).is_none() {
            problems.push(format!("no producer for default media type {}", self.default_produces));
        }
        if self.consumer_for(&self.default_consumes).is_none() {
            problems.push(format!("no consumer for default media type {}", self.default_consumes));
        }
        if self.serve_error.is_none() {
            problems.push("ServeError is not set".to_string());
        }
        for operation in &self.operations {
            for requirement in &operation.security {
                if let Err(err) = self.authenticator_for(&requirement.scheme) {
                    problems.push(format!("operation {}: {err}", operation.id));
                }
            }
        }
        let mut seen = HashSet::new();
        for operation in &self.operations {
            if !seen.insert((operation.method.clone(), operation.pattern.axum_path())) {
                problems.push(format!(
                    "duplicate operation for {} {}",
                    operation.method,
                    operation.path()
                ));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(problems))
        }
    }
}

struct Guard {
    authenticator: Result<Authenticator, ApiError>,
    scopes: Vec<String>,
}

struct Codecs {
    consumers: HashMap<String, Arc<dyn Consumer>>,
    producers: Vec<(String, Arc<dyn Producer>)>,
    default_consumes: String,
    body_limit: usize,
    serve_error: ServeErrorFn,
}

impl Codecs {
    fn producer(&self, parts: &Parts) -> Result<(String, Arc<dyn Producer>), ApiError> {
        let accept = parts
            .headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .map(media::accepted)
            .unwrap_or_default();

        if accept.is_empty() {
            return self
                .producers
                .first()
                .cloned()
                .ok_or_else(|| ApiError::NotAcceptable("no producer is configured".into()));
        }

        accept
            .iter()
            .find_map(|pattern| {
                self.producers
                    .iter()
                    .find(|(media_type, _)| media::matches(pattern, media_type))
                    .cloned()
            })
            .ok_or_else(|| ApiError::NotAcceptable(format!("cannot produce any of {}", accept.join(", "))))
    }

    fn decode(&self, parts: &Parts, body: &[u8]) -> Result<Option<Value>, ApiError> {
        if body.is_empty() {
            return Ok(None);
        }
        let media_type = parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(media::essence)
            .unwrap_or_else(|| self.default_consumes.clone());
        let consumer = self
            .consumers
            .get(&media_type)
            .ok_or_else(|| ApiError::UnsupportedMediaType(media_type.clone()))?;
        consumer.consume(body).map(Some)
    }
}

struct Dispatch {
    operation: Operation,
    guards: Vec<Guard>,
    codecs: Arc<Codecs>,
}

impl Dispatch {
    fn authenticate(&self, parts: &Parts) -> Result<Option<Principal>, ApiError> {
        if self.guards.is_empty() {
            return Ok(None);
        }
        let mut last_error = None;
        for guard in &self.guards {
            let authenticator = match &guard.authenticator {
                Ok(authenticator) => authenticator,
                Err(err) => {
                    last_error = Some(err.clone());
                    continue;
                }
            };
            match authenticator(parts, &guard.scopes) {
                Ok(Some(principal)) => return Ok(Some(principal)),
                Ok(None) => {}
                Err(err) => last_error = Some(err),
            }
        }
        Err(last_error.unwrap_or_else(|| ApiError::Unauthenticated("no credentials provided".into())))
    }

    async fn run(&self, request: Request<Body>) -> Response {
        let (parts, body) = request.into_parts();
        match self.respond(&parts, body).await {
            Ok(response) => response,
            Err(err) => (self.codecs.serve_error)(&parts, &err),
        }
    }

    async fn respond(&self, parts: &Parts, body: Body) -> Result<Response, ApiError> {
        let principal = self.authenticate(parts)?;
        let (media_type, producer) = self.codecs.producer(parts)?;

        let bytes = to_bytes(body, self.codecs.body_limit)
            .await
            .map_err(|e| body_error(e, self.codecs.body_limit))?;
        let body = self.codecs.decode(parts, &bytes)?;

        let request = OperationRequest {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            params: self
                .operation
                .pattern
                .captures(parts.uri.path())
                .unwrap_or_default(),
            body,
            principal,
        };

        let reply = (self.operation.handler)(request).await?;
        match reply.payload {
            None => Ok(reply.status.into_response()),
            Some(payload) => {
                let encoded = producer.produce(&payload)?;
                Ok((reply.status, [(header::CONTENT_TYPE, media_type)], encoded).into_response())
            }
        }
    }
}

fn body_error(err: axum::Error, limit: usize) -> ApiError {
    let mut cause: Option<&(dyn std::error::Error + 'static)> = Some(&err);
    while let Some(current) = cause {
        if current.is::<LengthLimitError>() {
            return ApiError::PayloadTooLarge(format!("request body exceeds {limit} bytes"));
        }
        cause = current.source();
    }
    ApiError::BadRequest(format!("could not read body: {err}"))
}
