//! Fixed default tables written by the defaults composites.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::FieldWrite;
use crate::api::{errors, media, security};
use crate::contract::{
    ApiKeyAuthenticatorFactory, BasicAuthenticatorFactory, BearerAuthenticatorFactory, ByteSize,
    Consumer, Producer, ServeErrorFn,
};
use crate::field::FieldKey;

pub const DEFAULT_CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_GRACEFUL_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_MAX_HEADER_SIZE: ByteSize = ByteSize(ByteSize::MIB);
pub const DEFAULT_SOCKET_PATH: &str = "/var/run/api-plugger.sock";
pub const DEFAULT_KEEP_ALIVE: Duration = Duration::from_secs(3 * 60);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(60);

/// Field writes of `with_server_defaults`.
pub fn server_defaults() -> Vec<FieldWrite> {
    vec![
        FieldWrite::new(FieldKey::CleanupTimeout, DEFAULT_CLEANUP_TIMEOUT),
        FieldWrite::new(FieldKey::GracefulTimeout, DEFAULT_GRACEFUL_TIMEOUT),
        FieldWrite::new(FieldKey::MaxHeaderSize, DEFAULT_MAX_HEADER_SIZE),
        FieldWrite::new(FieldKey::SocketPath, PathBuf::from(DEFAULT_SOCKET_PATH)),
        FieldWrite::new(FieldKey::KeepAlive, DEFAULT_KEEP_ALIVE),
        FieldWrite::new(FieldKey::ReadTimeout, DEFAULT_READ_TIMEOUT),
        FieldWrite::new(FieldKey::WriteTimeout, DEFAULT_WRITE_TIMEOUT),
    ]
}

/// Field writes of `with_api_defaults`.
pub fn api_defaults() -> Vec<FieldWrite> {
    let basic: BasicAuthenticatorFactory = Arc::new(security::basic_auth);
    let api_key: ApiKeyAuthenticatorFactory = Arc::new(security::api_key_auth);
    let bearer: BearerAuthenticatorFactory = Arc::new(security::bearer_auth);
    let json_consumer: Arc<dyn Consumer> = Arc::new(media::JsonConsumer);
    let bin_producer: Arc<dyn Producer> = Arc::new(media::ByteStreamProducer);
    let json_producer: Arc<dyn Producer> = Arc::new(media::JsonProducer);
    let html_producer: Arc<dyn Producer> = Arc::new(media::NotImplementedProducer::new(
        "html producer has not yet been implemented",
    ));
    let serve_error: ServeErrorFn = Arc::new(errors::serve_error);

    vec![
        FieldWrite::new(FieldKey::BasicAuthenticator, Some(basic)),
        FieldWrite::new(FieldKey::ApiKeyAuthenticator, Some(api_key)),
        FieldWrite::new(FieldKey::BearerAuthenticator, Some(bearer)),
        FieldWrite::new(FieldKey::JsonConsumer, Some(json_consumer)),
        FieldWrite::new(FieldKey::BinProducer, Some(bin_producer)),
        FieldWrite::new(FieldKey::JsonProducer, Some(json_producer)),
        FieldWrite::new(FieldKey::ServeError, Some(serve_error)),
        FieldWrite::new(FieldKey::HtmlProducer, Some(html_producer)),
    ]
}
