//! TLS connector construction for PostgreSQL connections

use dbscope_core::{DbscopeError, Result, TlsConfig, TlsMode};
use native_tls::{Certificate, Identity, TlsConnector, TlsConnectorBuilder};
use postgres_native_tls::MakeTlsConnector;
use std::fs;
use std::path::Path;
use tokio_postgres::config::SslMode;

/// Map a TLS mode onto the negotiation modes tokio-postgres understands.
///
/// Certificate and hostname checks for the verify modes are enforced by the
/// connector itself, see [`build_tls_connector`].
pub(crate) fn ssl_mode(mode: TlsMode) -> SslMode {
    match mode {
        TlsMode::Disable => SslMode::Disable,
        TlsMode::Allow | TlsMode::Prefer => SslMode::Prefer,
        TlsMode::Require | TlsMode::VerifyCa | TlsMode::VerifyFull => SslMode::Require,
    }
}

/// Build a TLS connector for any mode other than `Disable`
pub(crate) fn build_tls_connector(config: &TlsConfig) -> Result<MakeTlsConnector> {
    config.validate()?;

    let mut builder = TlsConnector::builder();
    configure_verification(&mut builder, config);

    if let Some(path) = &config.ca_cert {
        let cert = Certificate::from_pem(&read_pem(path, "CA certificate")?).map_err(|e| {
            DbscopeError::Configuration(format!("Invalid CA certificate: {}", e))
        })?;
        builder.add_root_certificate(cert);
    }

    if let (Some(cert_path), Some(key_path)) = (&config.client_cert, &config.client_key) {
        let cert = read_pem(cert_path, "client certificate")?;
        let key = read_pem(key_path, "client key")?;
        let identity = Identity::from_pkcs8(&cert, &key).map_err(|e| {
            DbscopeError::Configuration(format!("Invalid client identity (cert + key): {}", e))
        })?;
        builder.identity(identity);
    }

    let connector = builder
        .build()
        .map_err(|e| DbscopeError::Connection(format!("Failed to build TLS connector: {}", e)))?;
    tracing::debug!(mode = ?config.mode, "TLS connector built");
    Ok(MakeTlsConnector::new(connector))
}

fn configure_verification(builder: &mut TlsConnectorBuilder, config: &TlsConfig) {
    match config.mode {
        TlsMode::Disable | TlsMode::Allow | TlsMode::Prefer | TlsMode::Require => {
            // Encryption only; without a CA there is nothing to verify against.
            if config.ca_cert.is_none() {
                builder.danger_accept_invalid_certs(true);
            }
            builder.danger_accept_invalid_hostnames(true);
        }
        TlsMode::VerifyCa => {
            builder.danger_accept_invalid_hostnames(true);
        }
        TlsMode::VerifyFull => {}
    }
}

fn read_pem(path: &Path, what: &str) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| {
        DbscopeError::Configuration(format!(
            "Failed to load {} from {}: {}",
            what,
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn verify_modes_require_tls() {
        assert!(matches!(ssl_mode(TlsMode::VerifyFull), SslMode::Require));
        assert!(matches!(ssl_mode(TlsMode::Allow), SslMode::Prefer));
        assert!(matches!(ssl_mode(TlsMode::Disable), SslMode::Disable));
    }

    #[test]
    fn missing_ca_file_is_a_configuration_error() {
        let config = TlsConfig {
            mode: TlsMode::VerifyFull,
            ca_cert: Some(PathBuf::from("/nonexistent/dbscope-ca.pem")),
            ..Default::default()
        };
        let err = build_tls_connector(&config).err().expect("connector should fail");
        assert!(matches!(err, DbscopeError::Configuration(_)));
        assert!(err.to_string().contains("CA certificate"));
    }
}
