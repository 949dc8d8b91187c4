//! Configuration schema definitions.
//!
//! This module defines the file configuration for a plugged API server.
//! All types derive Serde traits for deserialization from config files.
//! Every setting is optional: an absent value leaves the target field to the
//! defaults composite (or to the target's own initial value).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::contract::{ByteSize, ListenerScheme};
use crate::option::{self, PlugOption};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PlugConfig {
    /// Plain listeners, limits and timeouts.
    pub server: ServerConfig,

    /// TLS listener settings.
    pub tls: TlsConfig,

    /// API media type settings.
    pub api: ApiConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Write the server defaults before any explicit value.
    pub use_defaults: bool,

    pub host: Option<String>,
    pub port: Option<u16>,

    /// Listeners to enable (`http`, `https`, `unix`).
    pub listeners: Option<Vec<ListenerScheme>>,

    pub socket_path: Option<PathBuf>,

    /// Maximum in-flight requests on the plain listener.
    pub listen_limit: Option<usize>,

    /// Accepts a byte count or a size such as "512KiB".
    pub max_header_size: Option<ByteSize>,

    pub cleanup_timeout_secs: Option<u64>,
    pub graceful_timeout_secs: Option<u64>,
    pub keep_alive_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    pub write_timeout_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            use_defaults: true,
            host: None,
            port: None,
            listeners: None,
            socket_path: None,
            listen_limit: None,
            max_header_size: None,
            cleanup_timeout_secs: None,
            graceful_timeout_secs: None,
            keep_alive_secs: None,
            read_timeout_secs: None,
            write_timeout_secs: None,
        }
    }
}

/// TLS listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TlsConfig {
    pub host: Option<String>,
    pub port: Option<u16>,

    /// Path to certificate file (PEM).
    pub certificate: Option<PathBuf>,

    /// Path to private key file (PEM).
    pub certificate_key: Option<PathBuf>,

    /// CA bundle (PEM); when set, clients must present a certificate.
    pub ca_certificate: Option<PathBuf>,

    pub listen_limit: Option<usize>,
    pub keep_alive_secs: Option<u64>,
    pub read_timeout_secs: Option<u64>,
    pub write_timeout_secs: Option<u64>,
}

/// API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Write the stock codecs, authenticators and error serializer.
    pub use_defaults: bool,

    pub default_produces: Option<String>,
    pub default_consumes: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            use_defaults: true,
            default_produces: None,
            default_consumes: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

fn secs(value: Option<u64>) -> Option<Duration> {
    value.map(Duration::from_secs)
}

impl PlugConfig {
    /// The options this configuration describes, in application order.
    ///
    /// Defaults composites come first so explicit values override them.
    pub fn options(&self) -> Vec<PlugOption> {
        let mut options = Vec::new();

        if self.api.use_defaults {
            options.push(option::with_api_defaults());
        }
        if let Some(media_type) = &self.api.default_produces {
            options.push(option::with_default_produces(media_type.clone()));
        }
        if let Some(media_type) = &self.api.default_consumes {
            options.push(option::with_default_consumes(media_type.clone()));
        }

        let server = &self.server;
        if server.use_defaults {
            options.push(option::with_server_defaults());
        }
        options.extend(server.host.clone().map(option::with_host));
        options.extend(server.port.map(option::with_port));
        options.extend(server.listeners.clone().map(option::with_enabled_listeners));
        options.extend(server.socket_path.clone().map(option::with_socket_path));
        options.extend(server.listen_limit.map(option::with_listen_limit));
        options.extend(server.max_header_size.map(|size| option::with_max_header_size(size.bytes())));
        options.extend(secs(server.cleanup_timeout_secs).map(option::with_cleanup_timeout));
        options.extend(secs(server.graceful_timeout_secs).map(option::with_graceful_timeout));
        options.extend(secs(server.keep_alive_secs).map(option::with_keep_alive));
        options.extend(secs(server.read_timeout_secs).map(option::with_read_timeout));
        options.extend(secs(server.write_timeout_secs).map(option::with_write_timeout));

        let tls = &self.tls;
        options.extend(tls.host.clone().map(option::with_tls_host));
        options.extend(tls.port.map(option::with_tls_port));
        options.extend(tls.certificate.clone().map(option::with_tls_certificate));
        options.extend(tls.certificate_key.clone().map(option::with_tls_certificate_key));
        options.extend(tls.ca_certificate.clone().map(option::with_tls_ca_certificate));
        options.extend(tls.listen_limit.map(option::with_tls_listen_limit));
        options.extend(secs(tls.keep_alive_secs).map(option::with_tls_keep_alive));
        options.extend(secs(tls.read_timeout_secs).map(option::with_tls_read_timeout));
        options.extend(secs(tls.write_timeout_secs).map(option::with_tls_write_timeout));

        options
    }
}
