//! TLS configuration and certificate loading.

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use rustls::{pki_types::CertificateDer, server::WebPkiClientVerifier, RootCertStore, ServerConfig};

#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("{what} not found: {path}")]
    Missing { what: &'static str, path: String },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("no private key in {0}")]
    NoKey(String),

    #[error("invalid tls configuration: {0}")]
    Config(String),
}

async fn read_pem(what: &'static str, path: &Path) -> Result<Vec<u8>, TlsError> {
    if !path.exists() {
        return Err(TlsError::Missing {
            what,
            path: path.display().to_string(),
        });
    }
    tokio::fs::read(path).await.map_err(|source| TlsError::Read {
        path: path.display().to_string(),
        source,
    })
}

fn certificates(pem: &[u8], path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    rustls_pemfile::certs(&mut BufReader::new(pem))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| TlsError::Read {
            path: path.display().to_string(),
            source,
        })
}

/// Load TLS configuration from certificate and key files.
///
/// With a CA certificate, clients must present a certificate signed by it.
pub async fn load_tls_config(
    cert_path: &Path,
    key_path: &Path,
    ca_path: Option<&Path>,
) -> Result<RustlsConfig, TlsError> {
    let cert_pem = read_pem("certificate", cert_path).await?;
    let key_pem = read_pem("private key", key_path).await?;

    let certs = certificates(&cert_pem, cert_path)?;
    let key = rustls_pemfile::private_key(&mut BufReader::new(key_pem.as_slice()))
        .map_err(|source| TlsError::Read {
            path: key_path.display().to_string(),
            source,
        })?
        .ok_or_else(|| TlsError::NoKey(key_path.display().to_string()))?;

    let builder = ServerConfig::builder();
    let builder = match ca_path {
        Some(ca_path) => {
            let ca_pem = read_pem("ca certificate", ca_path).await?;
            let mut roots = RootCertStore::empty();
            for ca in certificates(&ca_pem, ca_path)? {
                roots.add(ca).map_err(|e| TlsError::Config(e.to_string()))?;
            }
            let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
                .build()
                .map_err(|e| TlsError::Config(e.to_string()))?;
            tracing::debug!(ca = %ca_path.display(), "Client certificates required");
            builder.with_client_cert_verifier(verifier)
        }
        None => builder.with_no_client_auth(),
    };

    let mut config = builder
        .with_single_cert(certs, key)
        .map_err(|e| TlsError::Config(e.to_string()))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(RustlsConfig::from_config(Arc::new(config)))
}
