use anyhow::{Context, Result};
use keyring::{Entry, Error as KeyringError};

use crate::config::Account;

const SERVICE: &str = "mailharvest-imap";

/// IMAP password storage in the system keyring.
#[derive(Clone)]
pub struct CredentialManager {
    service: String,
}

impl Default for CredentialManager {
    fn default() -> Self {
        Self {
            service: SERVICE.to_string(),
        }
    }
}

impl CredentialManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, account: &Account) -> Result<Entry> {
        let user = format!("{}@{}", account.imap_username, account.imap_server);
        Entry::new(&self.service, &user).context("Failed to create keyring entry")
    }

    /// Store a password securely in the system keyring
    pub fn store_password(&self, account: &Account, password: &str) -> Result<()> {
        self.entry(account)?
            .set_password(password)
            .context("Failed to store password in keyring")?;

        log::debug!("Password stored for {}", account.imap_username);
        Ok(())
    }

    /// Retrieve a password from the system keyring
    pub fn get_password(&self, account: &Account) -> Result<Option<String>> {
        match self.entry(account)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(KeyringError::NoEntry) => Ok(None),
            Err(e) => Err(anyhow::anyhow!("Failed to retrieve password: {}", e)),
        }
    }
}

/// Where a resolved password came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordSource {
    Config,
    Keyring,
    Prompt,
}

/// Config value first, then the keyring, then an interactive prompt.
pub fn resolve_password(
    account: &Account,
    credentials: &CredentialManager,
) -> Result<(String, PasswordSource)> {
    if let Some(password) = &account.imap_password {
        return Ok((password.clone(), PasswordSource::Config));
    }

    match credentials.get_password(account) {
        Ok(Some(password)) => return Ok((password, PasswordSource::Keyring)),
        Ok(None) => {}
        Err(e) => log::warn!("Keyring unavailable: {}", e),
    }

    let prompt = format!("Password for {}: ", account.imap_username);
    let password = rpassword::prompt_password(prompt).context("Failed to read password")?;
    Ok((password, PasswordSource::Prompt))
}
