//! TLS certificate/key loading, grounded on `rustls-pemfile`'s documented
//! usage pattern (the teacher's own Cargo.toml already pins `rustls` +
//! `rustls-pemfile`; `platform/unix/transport.c`'s `bssl_*` functions are the
//! origin-language analogue this replaces).

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConfig;

use crate::error::AppError;

pub fn load_server_config(certificate: &Path, private_key: &Path) -> Result<Arc<ServerConfig>, AppError> {
    let certs = load_certs(certificate)?;
    let key = load_private_key(private_key)?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| AppError::Config(format!("invalid certificate/key pair: {e}")))?;

    Ok(Arc::new(config))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, AppError> {
    let file = File::open(path).map_err(|e| AppError::setup("opening certificate file", e))?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::setup("parsing certificate file", e))
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, AppError> {
    let file = File::open(path).map_err(|e| AppError::setup("opening private key file", e))?;
    let mut reader = BufReader::new(file);

    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| AppError::setup("parsing private key file", e))?
        .ok_or_else(|| AppError::Config(format!("no private key found in {path:?}")))
}
