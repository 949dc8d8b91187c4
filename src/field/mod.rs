//! Named, type-checked field writes on configuration targets.
//!
//! # Responsibilities
//! - Name every configuration field any known target may expose
//! - Let a target hand out a writable slot for the keys it knows
//! - Write a value into that slot after checking its type
//!
//! # Design Decisions
//! - The key catalog is a superset; each target exposes only a subset and
//!   unknown keys are skipped without error
//! - A value of the wrong type is a programming defect and panics
//! - Targets whose type is known can still be assigned directly; this path
//!   exists for options that must work across target shapes

use std::any::{type_name, Any};
use std::fmt;

/// Every configuration field a target may expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    // Server listeners and limits
    Host,
    Port,
    EnabledListeners,
    CleanupTimeout,
    GracefulTimeout,
    MaxHeaderSize,
    SocketPath,
    ListenLimit,
    KeepAlive,
    ReadTimeout,
    WriteTimeout,
    TlsHost,
    TlsPort,
    TlsCertificate,
    TlsCertificateKey,
    TlsCaCertificate,
    TlsListenLimit,
    TlsKeepAlive,
    TlsReadTimeout,
    TlsWriteTimeout,
    // Server hooks
    Logger,
    PreServerShutdown,
    ServerShutdown,
    CommandLineOptionsGroups,
    // API hooks
    BasicAuthenticator,
    ApiKeyAuthenticator,
    BearerAuthenticator,
    JsonConsumer,
    JsonProducer,
    BinProducer,
    HtmlProducer,
    ServeError,
    DefaultProduces,
    DefaultConsumes,
}

impl FieldKey {
    pub const ALL: [FieldKey; 34] = [
        FieldKey::Host,
        FieldKey::Port,
        FieldKey::EnabledListeners,
        FieldKey::CleanupTimeout,
        FieldKey::GracefulTimeout,
        FieldKey::MaxHeaderSize,
        FieldKey::SocketPath,
        FieldKey::ListenLimit,
        FieldKey::KeepAlive,
        FieldKey::ReadTimeout,
        FieldKey::WriteTimeout,
        FieldKey::TlsHost,
        FieldKey::TlsPort,
        FieldKey::TlsCertificate,
        FieldKey::TlsCertificateKey,
        FieldKey::TlsCaCertificate,
        FieldKey::TlsListenLimit,
        FieldKey::TlsKeepAlive,
        FieldKey::TlsReadTimeout,
        FieldKey::TlsWriteTimeout,
        FieldKey::Logger,
        FieldKey::PreServerShutdown,
        FieldKey::ServerShutdown,
        FieldKey::CommandLineOptionsGroups,
        FieldKey::BasicAuthenticator,
        FieldKey::ApiKeyAuthenticator,
        FieldKey::BearerAuthenticator,
        FieldKey::JsonConsumer,
        FieldKey::JsonProducer,
        FieldKey::BinProducer,
        FieldKey::HtmlProducer,
        FieldKey::ServeError,
        FieldKey::DefaultProduces,
        FieldKey::DefaultConsumes,
    ];

    /// The field's declared name on generated targets.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKey::Host => "Host",
            FieldKey::Port => "Port",
            FieldKey::EnabledListeners => "EnabledListeners",
            FieldKey::CleanupTimeout => "CleanupTimeout",
            FieldKey::GracefulTimeout => "GracefulTimeout",
            FieldKey::MaxHeaderSize => "MaxHeaderSize",
            FieldKey::SocketPath => "SocketPath",
            FieldKey::ListenLimit => "ListenLimit",
            FieldKey::KeepAlive => "KeepAlive",
            FieldKey::ReadTimeout => "ReadTimeout",
            FieldKey::WriteTimeout => "WriteTimeout",
            FieldKey::TlsHost => "TLSHost",
            FieldKey::TlsPort => "TLSPort",
            FieldKey::TlsCertificate => "TLSCertificate",
            FieldKey::TlsCertificateKey => "TLSCertificateKey",
            FieldKey::TlsCaCertificate => "TLSCACertificate",
            FieldKey::TlsListenLimit => "TLSListenLimit",
            FieldKey::TlsKeepAlive => "TLSKeepAlive",
            FieldKey::TlsReadTimeout => "TLSReadTimeout",
            FieldKey::TlsWriteTimeout => "TLSWriteTimeout",
            FieldKey::Logger => "Logger",
            FieldKey::PreServerShutdown => "PreServerShutdown",
            FieldKey::ServerShutdown => "ServerShutdown",
            FieldKey::CommandLineOptionsGroups => "CommandLineOptionsGroups",
            FieldKey::BasicAuthenticator => "BasicAuthenticator",
            FieldKey::ApiKeyAuthenticator => "APIKeyAuthenticator",
            FieldKey::BearerAuthenticator => "BearerAuthenticator",
            FieldKey::JsonConsumer => "JSONConsumer",
            FieldKey::JsonProducer => "JSONProducer",
            FieldKey::BinProducer => "BinProducer",
            FieldKey::HtmlProducer => "HTMLProducer",
            FieldKey::ServeError => "ServeError",
            FieldKey::DefaultProduces => "DefaultProduces",
            FieldKey::DefaultConsumes => "DefaultConsumes",
        }
    }

    /// Look a key up by its declared name.
    pub fn from_name(name: &str) -> Option<FieldKey> {
        Self::ALL.iter().copied().find(|key| key.name() == name)
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A target that exposes named, writable fields.
pub trait Patchable {
    /// Writable slot for `key`, or `None` if the target has no such field.
    fn field_mut(&mut self, key: FieldKey) -> Option<&mut dyn Any>;
}

type AssignFn = fn(&mut dyn Any, Box<dyn Any + Send>) -> bool;

/// A boxed value that remembers its type for a checked write.
pub struct FieldValue {
    value: Box<dyn Any + Send>,
    type_name: &'static str,
    assign: AssignFn,
}

impl FieldValue {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Self {
            value: Box::new(value),
            type_name: type_name::<T>(),
            assign: assign_as::<T>,
        }
    }

    /// Name of the carried value's type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Borrow the carried value if it has type `T`.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldValue")
            .field("type", &self.type_name)
            .finish()
    }
}

fn assign_as<T: Any>(slot: &mut dyn Any, value: Box<dyn Any + Send>) -> bool {
    let Some(slot) = slot.downcast_mut::<T>() else {
        return false;
    };
    match value.downcast::<T>() {
        Ok(value) => {
            *slot = *value;
            true
        }
        Err(_) => false,
    }
}

/// Write `value` into the field named `key` on `target`.
///
/// Returns `false` without touching the target when it has no such field.
///
/// # Panics
///
/// Panics when the field exists but its type differs from the value's type.
pub fn set_field(target: &mut dyn Patchable, key: FieldKey, value: FieldValue) -> bool {
    let Some(slot) = target.field_mut(key) else {
        tracing::trace!(field = %key, "Target has no such field, skipping");
        return false;
    };

    let FieldValue {
        value,
        type_name,
        assign,
    } = value;

    if !assign(slot, value) {
        panic!("field `{key}` cannot be assigned a value of type `{type_name}`");
    }

    tracing::trace!(field = %key, value_type = type_name, "Field written");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Target {
        host: String,
        port: u16,
        read_timeout: Duration,
        // not exposed through `field_mut`
        secret: u32,
    }

    impl Patchable for Target {
        fn field_mut(&mut self, key: FieldKey) -> Option<&mut dyn Any> {
            match key {
                FieldKey::Host => Some(&mut self.host),
                FieldKey::Port => Some(&mut self.port),
                FieldKey::ReadTimeout => Some(&mut self.read_timeout),
                _ => None,
            }
        }
    }

    #[test]
    fn test_set_field_writes_matching_type() {
        let mut target = Target::default();

        assert!(set_field(&mut target, FieldKey::Port, FieldValue::new(8000u16)));
        assert!(set_field(
            &mut target,
            FieldKey::Host,
            FieldValue::new("localhost".to_string())
        ));

        assert_eq!(target.port, 8000);
        assert_eq!(target.host, "localhost");
    }

    #[test]
    fn test_set_field_missing_key_is_noop() {
        let mut target = Target {
            secret: 7,
            ..Target::default()
        };
        let before = target.clone();

        assert!(!set_field(
            &mut target,
            FieldKey::SocketPath,
            FieldValue::new(std::path::PathBuf::from("/tmp/x.sock"))
        ));

        assert_eq!(target, before);
    }

    #[test]
    fn test_set_field_last_write_wins() {
        let mut target = Target::default();

        set_field(&mut target, FieldKey::ReadTimeout, FieldValue::new(Duration::from_secs(1)));
        set_field(&mut target, FieldKey::ReadTimeout, FieldValue::new(Duration::from_secs(9)));

        assert_eq!(target.read_timeout, Duration::from_secs(9));
    }

    #[test]
    #[should_panic(expected = "field `Port` cannot be assigned a value of type `u32`")]
    fn test_set_field_type_mismatch_panics() {
        let mut target = Target::default();
        set_field(&mut target, FieldKey::Port, FieldValue::new(8000u32));
    }

    #[test]
    fn test_key_names_round_trip() {
        for key in FieldKey::ALL {
            assert_eq!(FieldKey::from_name(key.name()), Some(key));
        }
        assert_eq!(FieldKey::from_name("NoSuchField"), None);
    }
}
