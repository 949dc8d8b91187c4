//! Authentication hook types.
//!
//! An API builds one [`Authenticator`] per security scheme from the factory
//! configured for the scheme's kind. Factories are replaceable fields, so
//! a caller can swap the header parsing while keeping its credential checks.

use std::sync::Arc;

use axum::http::request::Parts;
use serde::{Deserialize, Serialize};

use crate::api::ApiError;

/// The identity an authenticator resolved for a request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Principal {
    pub name: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl Principal {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scopes: Vec::new(),
        }
    }

    pub fn with_scopes(mut self, scopes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }
}

/// `Ok(None)` means the request carries no credentials for this scheme.
pub type AuthOutcome = Result<Option<Principal>, ApiError>;

/// Checks one request against one security scheme and its required scopes.
pub type Authenticator = Arc<dyn Fn(&Parts, &[String]) -> AuthOutcome + Send + Sync>;

/// Validates a username and password.
pub type UserPassAuthentication =
    Arc<dyn Fn(&str, &str) -> Result<Principal, ApiError> + Send + Sync>;

/// Validates an API key.
pub type TokenAuthentication = Arc<dyn Fn(&str) -> Result<Principal, ApiError> + Send + Sync>;

/// Validates a bearer token against the scopes an operation requires.
pub type ScopedTokenAuthentication =
    Arc<dyn Fn(&str, &[String]) -> Result<Principal, ApiError> + Send + Sync>;

/// Where an API key is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    Header,
    Query,
}

pub type BasicAuthenticatorFactory =
    Arc<dyn Fn(UserPassAuthentication) -> Authenticator + Send + Sync>;

/// Arguments: key name, key location, validator.
pub type ApiKeyAuthenticatorFactory =
    Arc<dyn Fn(&str, ApiKeyLocation, TokenAuthentication) -> Authenticator + Send + Sync>;

/// Arguments: scheme name, validator.
pub type BearerAuthenticatorFactory =
    Arc<dyn Fn(&str, ScopedTokenAuthentication) -> Authenticator + Send + Sync>;
