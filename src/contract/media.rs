//! Body codecs the API uses for content negotiation.

use serde_json::Value;

use crate::api::ApiError;

/// Decodes a request body of one media type.
pub trait Consumer: Send + Sync {
    fn consume(&self, body: &[u8]) -> Result<Value, ApiError>;
}

/// Encodes a response payload into one media type.
pub trait Producer: Send + Sync {
    fn produce(&self, payload: &Value) -> Result<Vec<u8>, ApiError>;
}

impl<F> Consumer for F
where
    F: Fn(&[u8]) -> Result<Value, ApiError> + Send + Sync,
{
    fn consume(&self, body: &[u8]) -> Result<Value, ApiError> {
        self(body)
    }
}

impl<F> Producer for F
where
    F: Fn(&Value) -> Result<Vec<u8>, ApiError> + Send + Sync,
{
    fn produce(&self, payload: &Value) -> Result<Vec<u8>, ApiError> {
        self(payload)
    }
}
