//! Stock consumers and producers, and media type helpers.

use serde_json::Value;

use super::ApiError;
use crate::contract::{Consumer, Producer};

pub const JSON: &str = "application/json";
pub const OCTET_STREAM: &str = "application/octet-stream";
pub const HTML: &str = "text/html";

/// Decodes `application/json` bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonConsumer;

impl Consumer for JsonConsumer {
    fn consume(&self, body: &[u8]) -> Result<Value, ApiError> {
        serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid json body: {e}")))
    }
}

/// Encodes payloads as `application/json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonProducer;

impl Producer for JsonProducer {
    fn produce(&self, payload: &Value) -> Result<Vec<u8>, ApiError> {
        serde_json::to_vec(payload).map_err(|e| ApiError::Internal(format!("json encoding failed: {e}")))
    }
}

/// Encodes string payloads (or arrays of bytes) as a raw byte stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteStreamProducer;

impl Producer for ByteStreamProducer {
    fn produce(&self, payload: &Value) -> Result<Vec<u8>, ApiError> {
        match payload {
            Value::Null => Ok(Vec::new()),
            Value::String(s) => Ok(s.as_bytes().to_vec()),
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_u64()
                        .and_then(|b| u8::try_from(b).ok())
                        .ok_or_else(|| ApiError::Internal("byte stream payload must be bytes".into()))
                })
                .collect(),
            _ => Err(ApiError::Internal(
                "byte stream payload must be a string or an array of bytes".into(),
            )),
        }
    }
}

/// A producer that always fails with "not implemented".
#[derive(Debug, Clone)]
pub struct NotImplementedProducer {
    message: String,
}

impl NotImplementedProducer {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Producer for NotImplementedProducer {
    fn produce(&self, _payload: &Value) -> Result<Vec<u8>, ApiError> {
        Err(ApiError::not_implemented(self.message.clone()))
    }
}

/// The `type/subtype` part of a media type, lowercased.
pub fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Media types of an `Accept` header, most preferred first.
///
/// Entries with `q=0` are dropped; ties keep header order.
pub fn accepted(accept: &str) -> Vec<String> {
    let mut ranked: Vec<(u16, String)> = accept
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let media = essence(parts.next()?);
            if media.is_empty() {
                return None;
            }
            let quality = parts
                .filter_map(|param| param.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0);
            let rank = (quality.clamp(0.0, 1.0) * 1000.0) as u16;
            (rank > 0).then_some((rank, media))
        })
        .collect();
    // stable sort keeps header order for equal weights
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked.into_iter().map(|(_, media)| media).collect()
}

/// True if `pattern` (possibly `*/*` or `type/*`) covers `media_type`.
pub fn matches(pattern: &str, media_type: &str) -> bool {
    if pattern == "*/*" || pattern == media_type {
        return true;
    }
    match pattern.strip_suffix("/*") {
        Some(kind) => media_type
            .split('/')
            .next()
            .is_some_and(|candidate| candidate == kind),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_round_trip_through_stock_codecs() {
        let body = JsonProducer.produce(&json!({"greeting": "hi"})).unwrap();
        assert_eq!(JsonConsumer.consume(&body).unwrap(), json!({"greeting": "hi"}));
    }

    #[test]
    fn test_json_consumer_rejects_garbage() {
        let err = JsonConsumer.consume(b"{not json").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn test_byte_stream_producer() {
        assert_eq!(ByteStreamProducer.produce(&json!("abc")).unwrap(), b"abc".to_vec());
        assert_eq!(ByteStreamProducer.produce(&json!([1, 2, 255])).unwrap(), vec![1, 2, 255]);
        assert!(ByteStreamProducer.produce(&json!([256])).is_err());
        assert!(ByteStreamProducer.produce(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_not_implemented_producer() {
        let producer = NotImplementedProducer::new("html producer has not yet been implemented");
        let err = producer.produce(&json!("<p>")).unwrap_err();
        assert_eq!(err, ApiError::not_implemented("html producer has not yet been implemented"));
    }

    #[test]
    fn test_accept_ordering() {
        assert_eq!(
            accepted("text/html;q=0.5, application/json, */*;q=0.1"),
            vec!["application/json", "text/html", "*/*"]
        );
        assert_eq!(accepted("text/plain;q=0, application/json"), vec!["application/json"]);
        assert!(accepted("").is_empty());
    }

    #[test]
    fn test_media_matching() {
        assert!(matches("*/*", JSON));
        assert!(matches("application/*", JSON));
        assert!(!matches("text/*", JSON));
        assert!(matches(JSON, JSON));
        assert_eq!(essence("Application/JSON; charset=utf-8"), JSON);
    }
}
