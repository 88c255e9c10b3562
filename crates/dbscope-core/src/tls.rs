//! TLS/SSL settings for database connections

use crate::{DbscopeError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// TLS/SSL mode, following PostgreSQL's `sslmode` conventions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TlsMode {
    /// Never use TLS
    Disable,
    /// Try plaintext first, TLS if the server insists
    Allow,
    /// Prefer TLS, but allow unencrypted connections
    #[default]
    Prefer,
    /// Require TLS without verifying the server certificate
    Require,
    /// Require TLS and verify the server certificate against the CA
    VerifyCa,
    /// Require TLS, verify the CA and the server hostname
    VerifyFull,
}

impl TlsMode {
    /// Returns true if this mode requires encryption
    pub fn requires_encryption(&self) -> bool {
        matches!(self, TlsMode::Require | TlsMode::VerifyCa | TlsMode::VerifyFull)
    }

    /// Returns true if this mode requires certificate verification
    pub fn requires_ca_verification(&self) -> bool {
        matches!(self, TlsMode::VerifyCa | TlsMode::VerifyFull)
    }

    /// Returns true if this mode requires hostname verification
    pub fn requires_hostname_verification(&self) -> bool {
        matches!(self, TlsMode::VerifyFull)
    }
}

impl FromStr for TlsMode {
    type Err = DbscopeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "" | "prefer" => Ok(TlsMode::Prefer),
            "disable" => Ok(TlsMode::Disable),
            "allow" => Ok(TlsMode::Allow),
            "require" => Ok(TlsMode::Require),
            "verify-ca" => Ok(TlsMode::VerifyCa),
            "verify-full" => Ok(TlsMode::VerifyFull),
            other => Err(DbscopeError::Configuration(format!(
                "unknown SSL mode: {other}"
            ))),
        }
    }
}

/// TLS settings resolved from a connection configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsConfig {
    pub mode: TlsMode,
    /// CA certificate used to verify the server
    pub ca_cert: Option<PathBuf>,
    /// Client certificate for mutual TLS
    pub client_cert: Option<PathBuf>,
    /// Client private key for mutual TLS
    pub client_key: Option<PathBuf>,
}

impl TlsConfig {
    /// Validate the TLS configuration
    pub fn validate(&self) -> Result<()> {
        if self.client_cert.is_some() != self.client_key.is_some() {
            return Err(DbscopeError::Configuration(
                "client certificate and client key must be provided together".to_string(),
            ));
        }
        for path in [&self.ca_cert, &self.client_cert, &self.client_key]
            .into_iter()
            .flatten()
        {
            if path.as_os_str().is_empty() {
                return Err(DbscopeError::Configuration(
                    "certificate path cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}
