//! TLS configuration from PEM files.

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use solo_core::{Result, SoloError};
use std::path::Path;
use std::sync::Arc;

/// Build a server config from a certificate chain and a private key.
///
/// Both may live in the same PEM file. Only HTTP/1.1 is offered over ALPN
/// since WebSocket upgrades need it.
pub fn load_server_config(cert_path: &Path, key_path: &Path) -> Result<rustls::ServerConfig> {
    let cert_pem = read(cert_path)?;
    let key_pem = read(key_path)?;

    let certs = parse_certificates(&cert_pem)?;
    let key = parse_private_key(&key_pem)?;

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let mut config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| SoloError::Tls {
            message: format!("unsupported protocol versions: {e}"),
        })?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| SoloError::Tls {
            message: format!("server config error: {e}"),
        })?;
    config.alpn_protocols = vec![b"http/1.1".to_vec()];
    Ok(config)
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| SoloError::Io {
        message: format!("failed to read {}: {}", path.display(), e),
        source: Some(e),
    })
}

fn parse_certificates(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let certs = CertificateDer::pem_slice_iter(pem)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| SoloError::Tls {
            message: format!("failed to parse certificates: {e}"),
        })?;
    if certs.is_empty() {
        return Err(SoloError::Tls {
            message: "no certificates found".into(),
        });
    }
    Ok(certs)
}

fn parse_private_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>> {
    PrivateKeyDer::from_pem_slice(pem).map_err(|e| SoloError::Tls {
        message: format!("failed to parse private key: {e}"),
    })
}
