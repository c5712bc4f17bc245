//! Server configuration
//!
//! A single `Config` value is built at startup (file + flag overrides) and
//! handed to the listener, dispatcher and persistence layer. Nothing reads
//! configuration from global state.

use crate::error::{ColumnKvError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration, mirroring the sections of the JSON config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerSection,
    pub storage: StorageSection,
    pub logging: LoggingSection,
    pub security: SecuritySection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub tls_cert_file: Option<PathBuf>,
    pub tls_key_file: Option<PathBuf>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            tls: false,
            tls_cert_file: None,
            tls_key_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub file_path: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            file_path: PathBuf::from("data/columnkv.kvc"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SecuritySection {
    pub auth_enabled: bool,
    pub auth_token: String,
}

/// How the dispatcher gates commands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthPolicy {
    Disabled,
    /// Every command must carry this token right after the verb
    Token(String),
}

impl AuthPolicy {
    pub fn token(&self) -> Option<&str> {
        match self {
            AuthPolicy::Disabled => None,
            AuthPolicy::Token(token) => Some(token),
        }
    }
}

impl Config {
    /// Read a JSON config file. Sections missing from the file keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ColumnKvError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field requirements that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.server.tls
            && (self.server.tls_cert_file.is_none() || self.server.tls_key_file.is_none())
        {
            return Err(ColumnKvError::Config(
                "tls is enabled but tls_cert_file or tls_key_file is missing".to_string(),
            ));
        }
        if self.security.auth_enabled && self.security.auth_token.is_empty() {
            return Err(ColumnKvError::Config(
                "auth is enabled but auth_token is empty".to_string(),
            ));
        }
        // The token travels as a single protocol token
        if self.security.auth_enabled && self.security.auth_token.chars().any(char::is_whitespace) {
            return Err(ColumnKvError::Config(
                "auth_token must not contain whitespace".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn auth_policy(&self) -> AuthPolicy {
        if self.security.auth_enabled {
            AuthPolicy::Token(self.security.auth_token.clone())
        } else {
            AuthPolicy::Disabled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"server": {{"port": 9090}}, "security": {{"auth_enabled": true, "auth_token": "secret"}}}}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.auth_policy(), AuthPolicy::Token("secret".to_string()));
        assert_eq!(config.bind_address(), "127.0.0.1:9090");
    }

    #[test]
    fn test_validate_rejects_incomplete_tls_and_auth() {
        let mut config = Config::default();
        config.server.tls = true;
        assert!(matches!(config.validate(), Err(ColumnKvError::Config(_))));

        let mut config = Config::default();
        config.security.auth_enabled = true;
        assert!(matches!(config.validate(), Err(ColumnKvError::Config(_))));

        assert!(Config::default().validate().is_ok());
        assert_eq!(Config::default().auth_policy(), AuthPolicy::Disabled);
    }

    #[test]
    fn test_validate_rejects_token_with_whitespace() {
        for token in ["two words", "tab\there", "trailing\n", "nbsp\u{a0}"] {
            let mut config = Config::default();
            config.security.auth_enabled = true;
            config.security.auth_token = token.to_string();
            assert!(
                matches!(config.validate(), Err(ColumnKvError::Config(_))),
                "token {:?} should be rejected",
                token
            );
        }

        let mut config = Config::default();
        config.security.auth_enabled = true;
        config.security.auth_token = "s3cr3t-token".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let result = Config::from_file("/nonexistent/columnkv.json");
        assert!(matches!(result, Err(ColumnKvError::Config(_))));
    }
}
