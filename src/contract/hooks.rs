//! Value types for server configuration fields and hook points.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use axum::http::request::Parts;
use axum::response::Response;
use serde::{Deserialize, Serialize};

use crate::api::ApiError;

/// Renders an API error into a response.
pub type ServeErrorFn = Arc<dyn Fn(&Parts, &ApiError) -> Response + Send + Sync>;

/// Receives the server's lifecycle log lines.
pub type LogHook = Arc<dyn Fn(&str) + Send + Sync>;

/// Called around server shutdown.
pub type ShutdownHook = Arc<dyn Fn() + Send + Sync>;

/// A listener kind a server may enable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ListenerScheme {
    Http,
    Https,
    Unix,
}

impl ListenerScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerScheme::Http => "http",
            ListenerScheme::Https => "https",
            ListenerScheme::Unix => "unix",
        }
    }
}

impl fmt::Display for ListenerScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized listener scheme name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown listener scheme `{0}` (expected http, https or unix)")]
pub struct UnknownScheme(pub String);

impl FromStr for ListenerScheme {
    type Err = UnknownScheme;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(ListenerScheme::Http),
            "https" => Ok(ListenerScheme::Https),
            "unix" => Ok(ListenerScheme::Unix),
            other => Err(UnknownScheme(other.to_string())),
        }
    }
}

/// A size in bytes, parsed from plain numbers or `512KiB`, `1MB` style strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "ByteSizeRepr", into = "u64")]
pub struct ByteSize(pub u64);

impl ByteSize {
    pub const KIB: u64 = 1024;
    pub const MIB: u64 = 1024 * 1024;

    pub fn bytes(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl From<ByteSize> for u64 {
    fn from(size: ByteSize) -> Self {
        size.0
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 != 0 && self.0 % Self::MIB == 0 {
            write!(f, "{}MiB", self.0 / Self::MIB)
        } else if self.0 != 0 && self.0 % Self::KIB == 0 {
            write!(f, "{}KiB", self.0 / Self::KIB)
        } else {
            write!(f, "{}B", self.0)
        }
    }
}

/// Error for a byte size string that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid byte size `{0}`")]
pub struct InvalidByteSize(pub String);

impl FromStr for ByteSize {
    type Err = InvalidByteSize;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, unit) = trimmed.split_at(split);
        let value: u64 = digits
            .parse()
            .map_err(|_| InvalidByteSize(s.to_string()))?;
        let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
            "" | "b" => 1,
            "k" | "kb" => 1000,
            "kib" => Self::KIB,
            "m" | "mb" => 1000 * 1000,
            "mib" => Self::MIB,
            "g" | "gb" => 1000 * 1000 * 1000,
            "gib" => 1024 * Self::MIB,
            _ => return Err(InvalidByteSize(s.to_string())),
        };
        value
            .checked_mul(multiplier)
            .map(ByteSize)
            .ok_or_else(|| InvalidByteSize(s.to_string()))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ByteSizeRepr {
    Bytes(u64),
    Text(String),
}

impl TryFrom<ByteSizeRepr> for ByteSize {
    type Error = InvalidByteSize;

    fn try_from(repr: ByteSizeRepr) -> Result<Self, Self::Error> {
        match repr {
            ByteSizeRepr::Bytes(n) => Ok(ByteSize(n)),
            ByteSizeRepr::Text(s) => s.parse(),
        }
    }
}

/// A described group of extra command line options a server advertises.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct CommandLineGroup {
    pub short_description: String,
    pub long_description: String,
    pub options: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_size_parsing() {
        assert_eq!("1MiB".parse::<ByteSize>().unwrap(), ByteSize(ByteSize::MIB));
        assert_eq!("512 KiB".parse::<ByteSize>().unwrap(), ByteSize(512 * 1024));
        assert_eq!("2kb".parse::<ByteSize>().unwrap(), ByteSize(2000));
        assert_eq!("4096".parse::<ByteSize>().unwrap(), ByteSize(4096));
        assert!("lots".parse::<ByteSize>().is_err());
        assert!("12 parsecs".parse::<ByteSize>().is_err());
    }

    #[test]
    fn test_byte_size_display() {
        assert_eq!(ByteSize(ByteSize::MIB).to_string(), "1MiB");
        assert_eq!(ByteSize(8 * 1024).to_string(), "8KiB");
        assert_eq!(ByteSize(100).to_string(), "100B");
    }

    #[test]
    fn test_listener_scheme_from_str() {
        assert_eq!("HTTPS".parse::<ListenerScheme>().unwrap(), ListenerScheme::Https);
        assert_eq!(" unix ".parse::<ListenerScheme>().unwrap(), ListenerScheme::Unix);
        assert_eq!(
            "ftp".parse::<ListenerScheme>(),
            Err(UnknownScheme("ftp".to_string()))
        );
    }
}
