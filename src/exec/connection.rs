//! Connection configuration and TLS setup.

use std::path::Path;

use native_tls::Certificate;
use postgres_native_tls::MakeTlsConnector;
use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub ssl_mode: SslMode,
    /// Accept invalid/self-signed certificates. Only honored for the
    /// non-verifying SSL modes.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    /// Optional path to a custom CA certificate bundle (PEM format). When
    /// unset, the system CA store applies.
    #[serde(default)]
    pub ca_cert_path: Option<String>,
    /// Maximum pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

fn default_pool_size() -> usize {
    8
}

/// SSL/TLS connection modes, matching the standard PostgreSQL `sslmode`
/// parameter:
/// - `Disable`: no SSL (unencrypted)
/// - `Prefer`: try SSL first, fall back to non-SSL (default)
/// - `Require`: require SSL but don't verify the certificate
/// - `VerifyCa`: require SSL and verify the server certificate is signed by a trusted CA
/// - `VerifyFull`: like VerifyCa, but also verify the server hostname matches the certificate
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub enum SslMode {
    Disable,
    #[default]
    Prefer,
    Require,
    VerifyCa,
    VerifyFull,
}

impl ConnectionConfig {
    pub fn connection_string(&self) -> String {
        let sslmode = match self.ssl_mode {
            SslMode::Disable => "disable",
            SslMode::Prefer => "prefer",
            SslMode::Require => "require",
            SslMode::VerifyCa => "verify-ca",
            SslMode::VerifyFull => "verify-full",
        };
        format!(
            "host={} port={} dbname={} user={} password={} sslmode={} connect_timeout=10",
            quote_conn_value(&self.host),
            self.port,
            quote_conn_value(&self.database),
            quote_conn_value(&self.username),
            quote_conn_value(&self.password),
            sslmode
        )
    }

    pub fn display_string(&self) -> String {
        format!(
            "{}@{}:{}/{}",
            self.username, self.host, self.port, self.database
        )
    }

    pub fn load(path: &Path) -> GridResult<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| GridError::Config(format!("invalid connection config: {e}")))
    }

    /// Persist to `path`. The password is never written.
    pub fn save(&self, path: &Path) -> GridResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| GridError::Config(format!("cannot serialize connection config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Build the TLS connector matching this config's SSL mode, `None` for
    /// unencrypted connections.
    pub fn tls(&self) -> GridResult<Option<MakeTlsConnector>> {
        if self.ssl_mode == SslMode::Disable {
            return Ok(None);
        }
        let strict = matches!(self.ssl_mode, SslMode::VerifyCa | SslMode::VerifyFull);
        let mut builder = native_tls::TlsConnector::builder();
        if self.accept_invalid_certs && !strict {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        } else if let Some(ca_path) = &self.ca_cert_path {
            let pem = std::fs::read(ca_path)?;
            for cert in parse_pem_bundle(&pem)? {
                builder.add_root_certificate(cert);
            }
        }
        let connector = builder
            .build()
            .map_err(|e| GridError::Config(format!("cannot build TLS connector: {e}")))?;
        Ok(Some(MakeTlsConnector::new(connector)))
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: 5432,
            database: String::from("postgres"),
            username: String::from("postgres"),
            password: String::new(),
            ssl_mode: SslMode::default(),
            accept_invalid_certs: false,
            ca_cert_path: None,
            pool_size: default_pool_size(),
        }
    }
}

/// Split a PEM bundle into individual certificates. CA bundles commonly
/// concatenate several.
fn parse_pem_bundle(pem: &[u8]) -> GridResult<Vec<Certificate>> {
    let text = std::str::from_utf8(pem)
        .map_err(|_| GridError::Config("CA certificate file is not valid UTF-8".into()))?;
    const BEGIN: &str = "-----BEGIN CERTIFICATE-----";
    const END: &str = "-----END CERTIFICATE-----";

    let mut certs = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(BEGIN) {
        let Some(end) = rest[start..].find(END) else {
            break;
        };
        let block = &rest[start..start + end + END.len()];
        let cert = Certificate::from_pem(block.as_bytes())
            .map_err(|e| GridError::Config(format!("invalid certificate in CA bundle: {e}")))?;
        certs.push(cert);
        rest = &rest[start + end + END.len()..];
    }
    if certs.is_empty() {
        return Err(GridError::Config(
            "no certificates found in CA bundle".into(),
        ));
    }
    Ok(certs)
}

/// Quote a value for use in a libpq key=value connection string.
fn quote_conn_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{}'", escaped)
}
