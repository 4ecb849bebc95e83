//! TLS configuration and stream wrapping for FTPS (RFC 2228 / 4217).

use crate::connection::BoxStream;
use crate::error::{FtpError, FtpResult};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use std::sync::Arc;
use tokio_rustls::TlsConnector;

/// TLS parameters shared by the control-channel upgrade and data-channel
/// wrapping.
#[derive(Clone)]
pub struct TlsParams {
    pub config: Arc<ClientConfig>,
    /// Name presented for SNI and certificate validation.
    pub server_name: String,
}

impl TlsParams {
    pub fn new(config: Arc<ClientConfig>, server_name: impl Into<String>) -> Self {
        Self {
            config,
            server_name: server_name.into(),
        }
    }

    /// Build parameters trusting the platform certificate store.
    pub fn with_native_roots(server_name: impl Into<String>) -> FtpResult<Self> {
        let mut roots = RootCertStore::empty();
        for cert in rustls_native_certs::load_native_certs().certs {
            roots
                .add(cert)
                .map_err(|e| FtpError::tls_failed(format!("trust store: {}", e)))?;
        }
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(Self {
            config: Arc::new(config),
            server_name: server_name.into(),
        })
    }
}

/// TLS-wrap a stream (control upgrade after AUTH TLS, implicit FTPS, or a
/// PROT P data channel). The handshake is driven to completion here.
pub(crate) async fn wrap(
    params: &TlsParams,
    stream: BoxStream,
) -> FtpResult<tokio_rustls::client::TlsStream<BoxStream>> {
    let name = ServerName::try_from(params.server_name.clone())
        .map_err(|_| FtpError::tls_failed(format!("invalid TLS server name: {}", params.server_name)))?;
    let connector = TlsConnector::from(params.config.clone());
    connector
        .connect(name, stream)
        .await
        .map_err(|e| FtpError::tls_failed(format!("TLS handshake: {}", e)))
}
