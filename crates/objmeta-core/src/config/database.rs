//! Database configuration.

use serde::{Deserialize, Serialize};

/// Database connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Driver identifier: `"postgres"` or `"mysql"`.
    pub driver: String,
    /// Data source URI.
    pub dsn: String,
    /// Maximum number of pooled connections. Idle connections never
    /// exceed this bound.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Seconds an idle connection is kept before it is closed.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    /// Seconds to wait when opening or checking out a connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Deadline in seconds for point operations.
    #[serde(default = "default_query_timeout")]
    pub query_timeout_seconds: u64,
    /// Structured TLS options (MySQL only).
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    /// TLS options as a URL query string (MySQL only), e.g.
    /// `root_cert=/ca.pem&client_cert=/c.pem&client_key=/k.pem&tls_mode=1`.
    #[serde(default)]
    pub custom_tls: Option<String>,
}

impl DatabaseConfig {
    /// Configuration for `driver` at `dsn` with default pool settings.
    pub fn new(driver: impl Into<String>, dsn: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            dsn: dsn.into(),
            max_connections: default_max_connections(),
            idle_timeout_seconds: default_idle_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            query_timeout_seconds: default_query_timeout(),
            tls: None,
            custom_tls: None,
        }
    }
}

/// TLS options for the MySQL driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// PEM file with the CA certificate(s) used to verify the server.
    #[serde(default)]
    pub root_cert: Option<String>,
    /// PEM client certificate, used only together with `client_key`.
    #[serde(default)]
    pub client_cert: Option<String>,
    /// PEM client private key, used only together with `client_cert`.
    #[serde(default)]
    pub client_key: Option<String>,
    /// Encrypt without verifying the server certificate.
    #[serde(default)]
    pub insecure_skip_verify: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_idle_timeout() -> u64 {
    180
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_query_timeout() -> u64 {
    20
}
