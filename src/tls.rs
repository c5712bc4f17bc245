//! TLS acceptor and connector construction from PEM files

use crate::error::{ColumnKvError, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::{ClientConfig, RootCertStore, ServerConfig};
use tokio_rustls::{TlsAcceptor, TlsConnector};

fn open(path: &Path) -> Result<BufReader<File>> {
    let file = File::open(path)
        .map_err(|e| ColumnKvError::Tls(format!("cannot open {}: {}", path.display(), e)))?;
    Ok(BufReader::new(file))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut open(path)?)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ColumnKvError::Tls(format!("bad certificate in {}: {}", path.display(), e)))?;
    if certs.is_empty() {
        return Err(ColumnKvError::Tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    rustls_pemfile::private_key(&mut open(path)?)
        .map_err(|e| ColumnKvError::Tls(format!("bad private key in {}: {}", path.display(), e)))?
        .ok_or_else(|| ColumnKvError::Tls(format!("no private key found in {}", path.display())))
}

/// Server side: certificate chain plus its private key
pub fn load_acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor> {
    let certs = load_certs(cert_path)?;
    let key = load_key(key_path)?;
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Client side: trust only the certificates in the given CA bundle
pub fn load_connector(ca_path: &Path) -> Result<TlsConnector> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(ca_path)? {
        roots.add(cert)?;
    }
    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    Ok(TlsConnector::from(Arc::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_files_are_tls_errors() {
        let missing = Path::new("/nonexistent/server.pem");
        assert!(matches!(load_acceptor(missing, missing), Err(ColumnKvError::Tls(_))));
        assert!(matches!(load_connector(missing), Err(ColumnKvError::Tls(_))));
    }

    #[test]
    fn test_pem_without_certificates_is_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not a pem file").unwrap();
        assert!(matches!(load_connector(file.path()), Err(ColumnKvError::Tls(_))));
    }
}
