use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::HeaderField;

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/mailharvest/config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("No account configured; pass --server and --user or add one to the config file")]
    NoAccount,

    #[error("Default account index {0} is out of bounds")]
    AccountOutOfBounds(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImapSecurity {
    None,
    StartTLS,
    SSL,
}

impl ImapSecurity {
    /// 993 is implicit TLS, anything else is plaintext.
    pub fn for_port(port: u16) -> Self {
        if port == 993 {
            ImapSecurity::SSL
        } else {
            ImapSecurity::None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub imap_server: String,
    pub imap_port: u16,
    pub imap_security: ImapSecurity,
    pub imap_username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imap_password: Option<String>,
}

impl Default for Account {
    fn default() -> Self {
        Self {
            name: "Default Account".to_string(),
            imap_server: "imap.example.com".to_string(),
            imap_port: 993,
            imap_security: ImapSecurity::SSL,
            imap_username: "user@example.com".to_string(),
            imap_password: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanDefaults {
    pub headers: Vec<HeaderField>,
    pub output_dir: String,
}

impl Default for ScanDefaults {
    fn default() -> Self {
        Self {
            headers: HeaderField::defaults(),
            output_dir: ".".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub default_account: usize,
    #[serde(default)]
    pub scan: ScanDefaults,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let path = expand(path);

        // If the file doesn't exist, return default config
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(&path)?;
        let config = serde_json::from_str(&content)?;

        Ok(config)
    }

    pub fn current_account(&self) -> Result<&Account, ConfigError> {
        if self.accounts.is_empty() {
            return Err(ConfigError::NoAccount);
        }

        self.accounts
            .get(self.default_account)
            .ok_or(ConfigError::AccountOutOfBounds(self.default_account))
    }
}

/// Expands `~` and environment variables in a user supplied path.
pub fn expand(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.into_owned()),
        Err(_) => Path::new(path).to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert!(config.accounts.is_empty());
        assert_eq!(config.scan.headers, HeaderField::defaults());
        assert!(matches!(config.current_account(), Err(ConfigError::NoAccount)));
    }

    #[test]
    fn loads_configured_account() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "accounts": [{
                    "name": "work",
                    "imap_server": "mail.example.org",
                    "imap_port": 143,
                    "imap_security": "StartTLS",
                    "imap_username": "jan"
                }],
                "default_account": 0
            }"#,
        )
        .unwrap();

        let loaded = Config::load(path.to_str().unwrap()).unwrap();
        let account = loaded.current_account().unwrap();
        assert_eq!(account.imap_server, "mail.example.org");
        assert_eq!(account.imap_security, ImapSecurity::StartTLS);
        assert!(account.imap_password.is_none());
    }

    #[test]
    fn partial_config_fills_scan_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"accounts": [], "default_account": 0}"#).unwrap();
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.scan.output_dir, ".");
    }

    #[test]
    fn port_picks_security() {
        assert_eq!(ImapSecurity::for_port(993), ImapSecurity::SSL);
        assert_eq!(ImapSecurity::for_port(143), ImapSecurity::None);
    }
}
