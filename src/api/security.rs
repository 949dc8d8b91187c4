//! Stock authenticator factories for basic, API key and bearer schemes.
//!
//! Each authenticator returns `Ok(None)` when the request carries no
//! credentials for its scheme, so an operation accepting several schemes can
//! try the next one.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Query;
use axum::http::{header::AUTHORIZATION, request::Parts};
use base64::{engine::general_purpose::STANDARD, Engine as _};

use super::ApiError;
use crate::contract::{
    ApiKeyLocation, Authenticator, ScopedTokenAuthentication, TokenAuthentication,
    UserPassAuthentication,
};

/// Query parameter accepted as an alternative to the bearer header.
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

fn authorization<'a>(parts: &'a Parts, scheme: &str) -> Option<&'a str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (kind, credentials) = value.trim().split_once(' ')?;
    kind.eq_ignore_ascii_case(scheme).then(|| credentials.trim())
}

fn query_param(parts: &Parts, name: &str) -> Option<String> {
    let Query(params) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri).ok()?;
    params.get(name).cloned()
}

/// Authenticator for `Authorization: Basic` credentials.
pub fn basic_auth(check: UserPassAuthentication) -> Authenticator {
    Arc::new(move |parts: &Parts, _scopes: &[String]| {
        let Some(encoded) = authorization(parts, "basic") else {
            return Ok(None);
        };
        let malformed = || ApiError::Unauthenticated("malformed basic credentials".into());
        let decoded = STANDARD.decode(encoded).map_err(|_| malformed())?;
        let decoded = String::from_utf8(decoded).map_err(|_| malformed())?;
        let (user, password) = decoded.split_once(':').ok_or_else(malformed)?;
        check(user, password).map(Some)
    })
}

/// Authenticator for an API key carried in a header or query parameter.
pub fn api_key_auth(name: &str, location: ApiKeyLocation, check: TokenAuthentication) -> Authenticator {
    let name = name.to_string();
    Arc::new(move |parts: &Parts, _scopes: &[String]| {
        let key = match location {
            ApiKeyLocation::Header => parts
                .headers
                .get(name.as_str())
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            ApiKeyLocation::Query => query_param(parts, &name),
        };
        match key {
            Some(key) if !key.is_empty() => check(&key).map(Some),
            _ => Ok(None),
        }
    })
}

/// Authenticator for `Authorization: Bearer` tokens (or `access_token`).
pub fn bearer_auth(name: &str, check: ScopedTokenAuthentication) -> Authenticator {
    let name = name.to_string();
    Arc::new(move |parts: &Parts, scopes: &[String]| {
        let token = authorization(parts, "bearer")
            .map(str::to_string)
            .or_else(|| query_param(parts, ACCESS_TOKEN_PARAM));
        match token {
            Some(token) if !token.is_empty() => {
                tracing::trace!(scheme = %name, required_scopes = ?scopes, "Checking bearer token");
                check(&token, scopes).map(Some)
            }
            _ => Ok(None),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Principal;
    use axum::http::Request;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    fn admin_only() -> UserPassAuthentication {
        Arc::new(|user: &str, password: &str| {
            if user == "admin" && password == "secret" {
                Ok(Principal::new(user))
            } else {
                Err(ApiError::Unauthenticated("bad credentials".into()))
            }
        })
    }

    #[test]
    fn test_basic_auth() {
        let auth = basic_auth(admin_only());
        let good = STANDARD.encode("admin:secret");
        let bad = STANDARD.encode("admin:guess");

        let req = parts(Request::builder().header("Authorization", format!("Basic {good}")));
        assert_eq!(auth(&req, &[]).unwrap(), Some(Principal::new("admin")));

        let req = parts(Request::builder().header("Authorization", format!("basic {bad}")));
        assert!(auth(&req, &[]).is_err());

        let req = parts(Request::builder().header("Authorization", "Basic !!!"));
        assert!(auth(&req, &[]).is_err());

        let req = parts(Request::builder());
        assert_eq!(auth(&req, &[]).unwrap(), None);
    }

    #[test]
    fn test_api_key_auth_header_and_query() {
        let check: TokenAuthentication = Arc::new(|key: &str| {
            if key == "k1" {
                Ok(Principal::new("service"))
            } else {
                Err(ApiError::Unauthenticated("unknown key".into()))
            }
        });

        let header = api_key_auth("X-API-Key", ApiKeyLocation::Header, check.clone());
        let req = parts(Request::builder().header("x-api-key", "k1"));
        assert_eq!(header(&req, &[]).unwrap(), Some(Principal::new("service")));

        let query = api_key_auth("api_key", ApiKeyLocation::Query, check);
        let req = parts(Request::builder().uri("/items?api_key=k1"));
        assert_eq!(query(&req, &[]).unwrap(), Some(Principal::new("service")));
        let req = parts(Request::builder().uri("/items?api_key=nope"));
        assert!(query(&req, &[]).is_err());
        let req = parts(Request::builder().uri("/items"));
        assert_eq!(query(&req, &[]).unwrap(), None);
    }

    #[test]
    fn test_bearer_auth_checks_scopes() {
        let check: ScopedTokenAuthentication = Arc::new(|token: &str, scopes: &[String]| {
            let granted = ["read".to_string()];
            if token != "t0k3n" {
                return Err(ApiError::Unauthenticated("invalid token".into()));
            }
            if scopes.iter().all(|s| granted.contains(s)) {
                Ok(Principal::new("bearer").with_scopes(granted.clone()))
            } else {
                Err(ApiError::Forbidden("missing scope".into()))
            }
        });
        let auth = bearer_auth("oauth", check);

        let req = parts(Request::builder().header("Authorization", "Bearer t0k3n"));
        assert!(auth(&req, &["read".to_string()]).unwrap().is_some());
        assert_eq!(
            auth(&req, &["write".to_string()]).unwrap_err(),
            ApiError::Forbidden("missing scope".into())
        );

        let req = parts(Request::builder().uri("/x?access_token=t0k3n"));
        assert!(auth(&req, &[]).unwrap().is_some());
    }
}
