//! TLS acceptor construction.
//!
//! The server authenticates itself with a certificate chain and private key.
//! Clients are not asked for certificates.

use crate::config::TlsConfig;
use crate::error::ServerError;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Loads the configured certificate and key and creates a TLS acceptor.
pub fn create_tls_acceptor(config: &TlsConfig) -> Result<TlsAcceptor, ServerError> {
    let cert_path = config
        .cert_path
        .as_ref()
        .ok_or_else(|| ServerError::TlsConfig("cert_path not set".into()))?;
    let key_path = config
        .key_path
        .as_ref()
        .ok_or_else(|| ServerError::TlsConfig("key_path not set".into()))?;

    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ServerError::TlsConfig(format!("invalid server cert/key: {}", e)))?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ServerError> {
    let file = File::open(path)
        .map_err(|e| ServerError::TlsConfig(format!("cannot open cert file {:?}: {}", path, e)))?;
    let mut reader = BufReader::new(file);

    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ServerError::TlsConfig(format!("invalid cert file {:?}: {}", path, e)))?;

    if certs.is_empty() {
        return Err(ServerError::TlsConfig(format!(
            "no certificates found in {:?}",
            path
        )));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, ServerError> {
    let file = File::open(path)
        .map_err(|e| ServerError::TlsConfig(format!("cannot open key file {:?}: {}", path, e)))?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| ServerError::TlsConfig(format!("invalid key file {:?}: {}", path, e)))?
        .ok_or_else(|| ServerError::TlsConfig(format!("no private key found in {:?}", path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    fn testdata(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("testdata")
            .join(name)
    }

    #[test]
    fn test_load_invalid_cert_path() {
        let result = load_certs(Path::new("/nonexistent/cert.pem"));
        assert!(result.unwrap_err().to_string().contains("cannot open"));
    }

    #[test]
    fn test_load_invalid_key_path() {
        let result = load_private_key(Path::new("/nonexistent/key.pem"));
        assert!(result.unwrap_err().to_string().contains("cannot open"));
    }

    #[test]
    fn test_load_empty_key_file() {
        let mut key_file = NamedTempFile::new().unwrap();
        key_file.write_all(b"not a valid key").unwrap();

        let result = load_private_key(key_file.path());
        assert!(result.unwrap_err().to_string().contains("no private key"));
    }

    #[test]
    fn test_cert_file_without_certificates() {
        // A key file contains no CERTIFICATE blocks
        let result = load_certs(&testdata("key.pem"));
        assert!(result.unwrap_err().to_string().contains("no certificates"));
    }

    #[test]
    fn test_create_acceptor_missing_cert() {
        let config = TlsConfig {
            enabled: true,
            cert_path: None,
            key_path: Some("/some/key.pem".into()),
        };

        match create_tls_acceptor(&config) {
            Err(e) => assert!(e.to_string().contains("cert_path not set")),
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn test_create_acceptor_missing_key() {
        let config = TlsConfig {
            enabled: true,
            cert_path: Some("/some/cert.pem".into()),
            key_path: None,
        };

        match create_tls_acceptor(&config) {
            Err(e) => assert!(e.to_string().contains("key_path not set")),
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn test_create_acceptor_from_testdata() {
        let config = TlsConfig {
            enabled: true,
            cert_path: Some(testdata("cert.pem")),
            key_path: Some(testdata("key.pem")),
        };
        assert!(create_tls_acceptor(&config).is_ok());
    }

    #[test]
    fn test_create_acceptor_swapped_files() {
        let config = TlsConfig {
            enabled: true,
            cert_path: Some(testdata("key.pem")),
            key_path: Some(testdata("cert.pem")),
        };
        match create_tls_acceptor(&config) {
            Err(e) => assert!(e.is_fatal()),
            Ok(_) => panic!("expected error"),
        }
    }
}
