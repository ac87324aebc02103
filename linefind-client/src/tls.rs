//! TLS connector construction for the client.

use crate::connection::TlsClientConfig;
use crate::error::ClientError;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{DigitallySignedStruct, RootCertStore, SignatureScheme};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsConnector;

/// Creates a TLS connector and the server name to present for SNI.
///
/// The server is verified against `ca_cert_path` when set, or the webpki
/// roots otherwise. With `insecure` set, verification is skipped entirely.
pub fn create_tls_connector(
    config: &TlsClientConfig,
    server_host: &str,
) -> Result<(TlsConnector, ServerName<'static>), ClientError> {
    let builder = rustls::ClientConfig::builder();
    let client_config = if config.insecure {
        tracing::warn!("Using insecure TLS (certificate verification disabled)");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(InsecureVerifier))
            .with_no_client_auth()
    } else {
        builder
            .with_root_certificates(root_store(config.ca_cert_path.as_deref())?)
            .with_no_client_auth()
    };

    let name = config.server_name.as_deref().unwrap_or(server_host);
    let server_name = ServerName::try_from(name.to_string())
        .map_err(|_| ClientError::TlsConfig(format!("invalid server name: {}", name)))?;

    Ok((TlsConnector::from(Arc::new(client_config)), server_name))
}

fn root_store(ca_path: Option<&Path>) -> Result<RootCertStore, ClientError> {
    let mut store = RootCertStore::empty();
    match ca_path {
        Some(path) => {
            for cert in load_certs(path)? {
                store
                    .add(cert)
                    .map_err(|e| ClientError::TlsConfig(format!("invalid CA cert: {}", e)))?;
            }
        }
        None => store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned()),
    }
    Ok(store)
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, ClientError> {
    let file = File::open(path)
        .map_err(|e| ClientError::TlsConfig(format!("cannot open cert file {:?}: {}", path, e)))?;
    let mut reader = BufReader::new(file);

    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ClientError::TlsConfig(format!("invalid cert file {:?}: {}", path, e)))?;
    if certs.is_empty() {
        return Err(ClientError::TlsConfig(format!(
            "no certificates found in {:?}",
            path
        )));
    }
    Ok(certs)
}

/// Accepts any server certificate. Development and testing only.
#[derive(Debug)]
struct InsecureVerifier;

impl ServerCertVerifier for InsecureVerifier {
    fn verify_server_cert(
        &self,
        _: &CertificateDer<'_>,
        _: &[CertificateDer<'_>],
        _: &ServerName<'_>,
        _: &[u8],
        _: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _: &[u8],
        _: &CertificateDer<'_>,
        _: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _: &[u8],
        _: &CertificateDer<'_>,
        _: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::RSA_PKCS1_SHA384,
            SignatureScheme::RSA_PKCS1_SHA512,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ECDSA_NISTP384_SHA384,
            SignatureScheme::ECDSA_NISTP521_SHA512,
            SignatureScheme::RSA_PSS_SHA256,
            SignatureScheme::RSA_PSS_SHA384,
            SignatureScheme::RSA_PSS_SHA512,
            SignatureScheme::ED25519,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_cert() -> std::path::PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../linefind-server/testdata/cert.pem")
    }

    #[test]
    fn test_load_invalid_cert_path() {
        let result = load_certs(Path::new("/nonexistent/cert.pem"));
        assert!(result.unwrap_err().to_string().contains("cannot open"));
    }

    #[test]
    fn test_connector_with_custom_ca() {
        let config = TlsClientConfig::new().with_ca_cert(server_cert());
        let (_, name) = create_tls_connector(&config, "127.0.0.1").unwrap();
        assert!(matches!(name, ServerName::IpAddress(_)));
    }

    #[test]
    fn test_connector_with_system_roots() {
        let config = TlsClientConfig::new().with_server_name("localhost");
        let (_, name) = create_tls_connector(&config, "127.0.0.1").unwrap();
        match name {
            ServerName::DnsName(dns) => assert_eq!(dns.as_ref(), "localhost"),
            other => panic!("unexpected server name {:?}", other),
        }
    }

    #[test]
    fn test_connector_rejects_bad_server_name() {
        let config = TlsClientConfig::new()
            .with_insecure()
            .with_server_name("not a host name");
        match create_tls_connector(&config, "127.0.0.1") {
            Err(e) => assert!(e.to_string().contains("invalid server name")),
            Ok(_) => panic!("expected error"),
        }
    }

    #[test]
    fn test_ca_file_without_certificates() {
        let key = Path::new(env!("CARGO_MANIFEST_DIR")).join("../linefind-server/testdata/key.pem");
        let config = TlsClientConfig::new().with_ca_cert(key);
        match create_tls_connector(&config, "127.0.0.1") {
            Err(e) => assert!(e.to_string().contains("no certificates")),
            Ok(_) => panic!("expected error"),
        }
    }
}
