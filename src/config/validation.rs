//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that enabled listeners have what they need
//! - Validate value ranges and media types
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: PlugConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is turned into options

use crate::config::schema::PlugConfig;
use crate::contract::{ByteSize, ListenerScheme};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("https listener requires tls.{0}")]
    MissingTls(&'static str),

    #[error("tls.ca_certificate requires tls.certificate")]
    CaWithoutCertificate,

    #[error("unix listener requires server.socket_path (or server defaults)")]
    MissingSocketPath,

    #[error("server.listeners must not be empty")]
    NoListeners,

    #[error("server.port and tls.port are both {0}")]
    PortConflict(u16),

    #[error("server.max_header_size must be at least {min}, got {got}")]
    HeaderSizeTooSmall { min: ByteSize, got: ByteSize },

    #[error("{field} `{value}` is not a media type")]
    InvalidMediaType { field: &'static str, value: String },

    #[error("unknown log level `{0}`")]
    InvalidLogLevel(String),
}

/// Validate a loaded configuration.
pub fn validate_config(config: &PlugConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let listeners = config
        .server
        .listeners
        .clone()
        .unwrap_or_else(|| vec![ListenerScheme::Http]);

    if listeners.is_empty() {
        errors.push(ValidationError::NoListeners);
    }

    if listeners.contains(&ListenerScheme::Https) {
        if config.tls.certificate.is_none() {
            errors.push(ValidationError::MissingTls("certificate"));
        }
        if config.tls.certificate_key.is_none() {
            errors.push(ValidationError::MissingTls("certificate_key"));
        }
        if let (Some(port), Some(tls_port)) = (config.server.port, config.tls.port) {
            let same_host = config.server.host == config.tls.host;
            if port != 0 && port == tls_port && same_host && listeners.contains(&ListenerScheme::Http) {
                errors.push(ValidationError::PortConflict(port));
            }
        }
    }
    if config.tls.ca_certificate.is_some() && config.tls.certificate.is_none() {
        errors.push(ValidationError::CaWithoutCertificate);
    }

    if listeners.contains(&ListenerScheme::Unix)
        && config.server.socket_path.is_none()
        && !config.server.use_defaults
    {
        errors.push(ValidationError::MissingSocketPath);
    }

    let min = ByteSize(8 * ByteSize::KIB);
    if let Some(size) = config.server.max_header_size {
        if !size.is_zero() && size < min {
            errors.push(ValidationError::HeaderSizeTooSmall { min, got: size });
        }
    }

    let media_types = [
        ("api.default_produces", &config.api.default_produces),
        ("api.default_consumes", &config.api.default_consumes),
    ];
    for (field, value) in media_types {
        if let Some(value) = value {
            let valid = value
                .split_once('/')
                .is_some_and(|(kind, sub)| !kind.trim().is_empty() && !sub.trim().is_empty());
            if !valid {
                errors.push(ValidationError::InvalidMediaType {
                    field,
                    value: value.clone(),
                });
            }
        }
    }

    let level = config.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::InvalidLogLevel(config.observability.log_level.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> PlugConfig {
        toml::from_str(source).unwrap()
    }

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&PlugConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_every_problem() {
        let config = parse(
            r#"
            [server]
            use_defaults = false
            listeners = ["https", "unix"]
            max_header_size = 1024

            [api]
            default_produces = "json"

            [observability]
            log_level = "loud"
            "#,
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::MissingTls("certificate"),
                ValidationError::MissingTls("certificate_key"),
                ValidationError::MissingSocketPath,
                ValidationError::HeaderSizeTooSmall {
                    min: ByteSize(8 * ByteSize::KIB),
                    got: ByteSize(1024),
                },
                ValidationError::InvalidMediaType {
                    field: "api.default_produces",
                    value: "json".into(),
                },
                ValidationError::InvalidLogLevel("loud".into()),
            ]
        );
    }

    #[test]
    fn test_port_conflict() {
        let config = parse(
            r#"
            [server]
            port = 8443
            listeners = ["http", "https"]

            [tls]
            port = 8443
            certificate = "cert.pem"
            certificate_key = "key.pem"
            "#,
        );

        assert_eq!(validate_config(&config), Err(vec![ValidationError::PortConflict(8443)]));
    }

    #[test]
    fn test_ca_needs_certificate() {
        let config = parse("[tls]\nca_certificate = \"ca.pem\"");
        assert_eq!(validate_config(&config), Err(vec![ValidationError::CaWithoutCertificate]));
    }
}
