//! MySQL TLS profile.
//!
//! TLS options come either from the structured `[database.tls]` table or
//! from the legacy query-string form
//! `root_cert=…&client_cert=…&client_key=…&tls_mode=1`. Both are resolved
//! into a [`MySqlTlsProfile`] and applied to the connect options before
//! the pool is opened.

use std::fs;

use sqlx::mysql::{MySqlConnectOptions, MySqlSslMode};
use tracing::debug;

use objmeta_core::config::{DatabaseConfig, TlsConfig};
use objmeta_core::error::{AppError, ErrorKind};
use objmeta_core::result::AppResult;

const PEM_CERTIFICATE_MARKER: &str = "-----BEGIN CERTIFICATE-----";

/// Validated TLS settings ready to be applied to a MySQL connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySqlTlsProfile {
    root_cert: Option<String>,
    client_identity: Option<(String, String)>,
    insecure_skip_verify: bool,
}

impl MySqlTlsProfile {
    /// Build the profile configured for `config`, if any.
    ///
    /// The structured table wins over the legacy string when both are set.
    pub fn from_config(config: &DatabaseConfig) -> AppResult<Option<Self>> {
        let tls = match (&config.tls, config.custom_tls.as_deref()) {
            (Some(tls), _) => tls.clone(),
            (None, Some(raw)) if !raw.trim().is_empty() => parse_custom_tls(raw)?,
            _ => return Ok(None),
        };
        Self::resolve(&tls).map(Some)
    }

    /// Validate the referenced files and build the profile.
    pub fn resolve(tls: &TlsConfig) -> AppResult<Self> {
        let root_cert = non_empty(&tls.root_cert);
        if let Some(path) = &root_cert {
            let pem = fs::read_to_string(path).map_err(|e| {
                AppError::with_source(
                    ErrorKind::InvalidArgument,
                    format!("Unable to load root certificate {path:?}"),
                    e,
                )
            })?;
            if !pem.contains(PEM_CERTIFICATE_MARKER) {
                return Err(AppError::invalid_argument(format!(
                    "Unable to parse root certificate {path:?}"
                )));
            }
        }

        let client_identity = match (non_empty(&tls.client_cert), non_empty(&tls.client_key)) {
            (Some(cert), Some(key)) => {
                for path in [&cert, &key] {
                    fs::metadata(path).map_err(|e| {
                        AppError::with_source(
                            ErrorKind::InvalidArgument,
                            format!("Unable to load key pair {cert:?}, {key:?}"),
                            e,
                        )
                    })?;
                }
                Some((cert, key))
            }
            _ => None,
        };

        Ok(Self {
            root_cert,
            client_identity,
            insecure_skip_verify: tls.insecure_skip_verify,
        })
    }

    /// The SSL mode this profile requires.
    pub fn ssl_mode(&self) -> MySqlSslMode {
        if self.insecure_skip_verify {
            MySqlSslMode::Required
        } else {
            MySqlSslMode::VerifyIdentity
        }
    }

    /// Apply the profile to MySQL connect options.
    pub fn apply(&self, mut options: MySqlConnectOptions) -> MySqlConnectOptions {
        debug!(
            root_cert = self.root_cert.is_some(),
            client_identity = self.client_identity.is_some(),
            insecure_skip_verify = self.insecure_skip_verify,
            "Applying MySQL TLS profile"
        );
        options = options.ssl_mode(self.ssl_mode());
        if let Some(root_cert) = &self.root_cert {
            options = options.ssl_ca(root_cert);
        }
        if let Some((cert, key)) = &self.client_identity {
            options = options.ssl_client_cert(cert).ssl_client_key(key);
        }
        options
    }
}

/// Parse the legacy query-string TLS form.
pub fn parse_custom_tls(raw: &str) -> AppResult<TlsConfig> {
    let mut tls = TlsConfig::default();

    for pair in raw.trim().split('&').filter(|p| !p.is_empty()) {
        if pair.contains(';') {
            return Err(AppError::invalid_argument(
                "Unable to parse tls config: invalid semicolon separator",
            ));
        }
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = decode(key)?;
        let value = decode(value)?;

        match key.as_str() {
            "root_cert" => tls.root_cert = Some(value),
            "client_cert" => tls.client_cert = Some(value),
            "client_key" => tls.client_key = Some(value),
            "tls_mode" => tls.insecure_skip_verify = value == "1",
            _ => {}
        }
    }

    Ok(tls)
}

fn decode(component: &str) -> AppResult<String> {
    let plus_as_space = component.replace('+', " ");
    urlencoding::decode(&plus_as_space)
        .map(|s| s.into_owned())
        .map_err(|e| {
            AppError::with_source(
                ErrorKind::InvalidArgument,
                "Unable to parse tls config",
                e,
            )
        })
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn temp_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("objmeta-tls-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn db_config(tls: Option<TlsConfig>, custom_tls: Option<&str>) -> DatabaseConfig {
        DatabaseConfig {
            driver: "mysql".to_string(),
            dsn: "mysql://root@localhost/meta".to_string(),
            max_connections: 10,
            idle_timeout_seconds: 180,
            connect_timeout_seconds: 10,
            query_timeout_seconds: 20,
            tls,
            custom_tls: custom_tls.map(str::to_string),
        }
    }

    #[test]
    fn test_parse_custom_tls() {
        let tls = parse_custom_tls(
            "root_cert=%2Fetc%2Fca.pem&client_cert=/c.pem&client_key=/k.pem&tls_mode=1",
        )
        .unwrap();
        assert_eq!(tls.root_cert.as_deref(), Some("/etc/ca.pem"));
        assert_eq!(tls.client_cert.as_deref(), Some("/c.pem"));
        assert_eq!(tls.client_key.as_deref(), Some("/k.pem"));
        assert!(tls.insecure_skip_verify);
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        let err = parse_custom_tls("root_cert=/ca.pem;tls_mode=1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        let err = parse_custom_tls("root_cert=%FF%FE").unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_no_tls_configured() {
        assert!(MySqlTlsProfile::from_config(&db_config(None, None)).unwrap().is_none());
        assert!(MySqlTlsProfile::from_config(&db_config(None, Some("  "))).unwrap().is_none());
    }

    #[test]
    fn test_missing_root_cert_is_invalid() {
        let err = MySqlTlsProfile::from_config(&db_config(
            None,
            Some("root_cert=/definitely/not/here.pem"),
        ))
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_root_cert_must_be_pem() {
        let path = temp_file("garbage.pem", "not a certificate");
        let tls = TlsConfig {
            root_cert: Some(path.display().to_string()),
            ..TlsConfig::default()
        };
        let err = MySqlTlsProfile::resolve(&tls).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_resolved_profile() {
        let ca = temp_file(
            "ca.pem",
            "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n",
        );
        let tls = TlsConfig {
            root_cert: Some(ca.display().to_string()),
            client_cert: Some("/only/cert.pem".to_string()),
            client_key: None,
            insecure_skip_verify: false,
        };
        let profile = MySqlTlsProfile::from_config(&db_config(Some(tls), None))
            .unwrap()
            .unwrap();
        assert_eq!(profile.ssl_mode(), MySqlSslMode::VerifyIdentity);
        assert!(profile.client_identity.is_none());
        assert_eq!(profile.root_cert, Some(ca.display().to_string()));
    }

    #[test]
    fn test_insecure_mode() {
        let profile = MySqlTlsProfile::resolve(&TlsConfig {
            insecure_skip_verify: true,
            ..TlsConfig::default()
        })
        .unwrap();
        assert_eq!(profile.ssl_mode(), MySqlSslMode::Required);
    }
}
