//! Plugin server: binds a local port, prints the go-plugin handshake line
//! and serves the provider over gRPC until Terraform kills the process.

use crate::error::{Result, TfplugError};
use crate::grpc::GrpcProviderServer;
use crate::proto::ProviderServer as ProtoProviderServer;
use crate::provider::Provider;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Identity, Server, ServerTlsConfig};
use tracing::{debug, info};

const CORE_PROTOCOL_VERSION: u32 = 1;
const PLUGIN_PROTOCOL_VERSION: u32 = 6;

/// Server configuration for running a Terraform provider
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// PEM certificate and key; the server runs in plaintext when unset
    pub cert_path: Option<PathBuf>,
    pub key_path: Option<PathBuf>,
    /// Maximum message size in bytes
    pub max_message_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            cert_path: None,
            key_path: None,
            max_message_size: 256 << 20, // 256MB
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `TF_PLUGIN_CERT` and `TF_PLUGIN_KEY`
    pub fn from_env() -> Self {
        Self {
            cert_path: std::env::var_os("TF_PLUGIN_CERT").map(PathBuf::from),
            key_path: std::env::var_os("TF_PLUGIN_KEY").map(PathBuf::from),
            ..Self::default()
        }
    }

    pub fn with_tls(mut self, cert_path: PathBuf, key_path: PathBuf) -> Self {
        self.cert_path = Some(cert_path);
        self.key_path = Some(key_path);
        self
    }

    pub fn with_max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}

pub struct ProviderServer<P: Provider> {
    provider: P,
    config: ServerConfig,
}

impl<P: Provider + 'static> ProviderServer<P> {
    pub fn new(provider: P, config: ServerConfig) -> Self {
        Self { provider, config }
    }

    pub async fn run(self) -> Result<()> {
        let service = ProtoProviderServer::new(GrpcProviderServer::new(self.provider))
            .max_decoding_message_size(self.config.max_message_size)
            .max_encoding_message_size(self.config.max_message_size);

        let mut builder = Server::builder();
        let mut server_cert = None;

        if let (Some(cert_path), Some(key_path)) = (&self.config.cert_path, &self.config.key_path)
        {
            // Already installed when another component got there first
            let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

            let cert = tokio::fs::read(cert_path)
                .await
                .map_err(|e| TfplugError::TlsError(format!("failed to read certificate: {}", e)))?;
            let key = tokio::fs::read(key_path)
                .await
                .map_err(|e| TfplugError::TlsError(format!("failed to read key: {}", e)))?;

            server_cert = Some(handshake_certificate(&cert)?);
            builder = builder
                .tls_config(ServerTlsConfig::new().identity(Identity::from_pem(cert, key)))?;
        }

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let bound_addr = listener.local_addr()?;

        let mut handshake = format!(
            "{}|{}|tcp|{}|grpc",
            CORE_PROTOCOL_VERSION, PLUGIN_PROTOCOL_VERSION, bound_addr
        );
        if let Some(cert) = &server_cert {
            handshake.push('|');
            handshake.push_str(cert);
        }
        println!("{}", handshake);

        info!(port = bound_addr.port(), tls = server_cert.is_some(), "provider server started");

        builder
            .add_service(service)
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await?;

        debug!("provider server stopped");
        Ok(())
    }
}

/// go-plugin expects the server certificate as unpadded base64 DER
fn handshake_certificate(pem: &[u8]) -> Result<String> {
    let text = std::str::from_utf8(pem)
        .map_err(|e| TfplugError::TlsError(format!("certificate is not PEM: {}", e)))?;
    let body: String = text
        .lines()
        .skip_while(|line| !line.starts_with("-----BEGIN CERTIFICATE"))
        .skip(1)
        .take_while(|line| !line.starts_with("-----END"))
        .map(str::trim)
        .collect();
    let der = STANDARD
        .decode(body)
        .map_err(|e| TfplugError::TlsError(format!("invalid certificate body: {}", e)))?;
    if der.is_empty() {
        return Err(TfplugError::TlsError("no certificate found in PEM".to_string()));
    }
    Ok(STANDARD_NO_PAD.encode(der))
}

/// Runs a provider with settings from the environment
pub async fn serve<P: Provider + 'static>(provider: P) -> Result<()> {
    ProviderServer::new(provider, ServerConfig::from_env()).run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_certificate_strips_padding() {
        let der = b"certificate-bytes";
        let pem = format!(
            "-----BEGIN CERTIFICATE-----\n{}\n-----END CERTIFICATE-----\n",
            STANDARD.encode(der)
        );
        let encoded = handshake_certificate(pem.as_bytes()).unwrap();
        assert!(!encoded.ends_with('='));
        assert_eq!(STANDARD_NO_PAD.decode(encoded).unwrap(), der);
    }

    #[test]
    fn handshake_certificate_rejects_missing_block() {
        assert!(handshake_certificate(b"not a certificate").is_err());
    }

    #[test]
    fn plaintext_by_default() {
        let config = ServerConfig::default();
        assert!(config.cert_path.is_none());
        assert_eq!(config.max_message_size, 256 << 20);
    }
}
