use std::fmt;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use log::{info, warn};
use thiserror::Error;

use crate::catalog::{list_folders, FolderCatalog};
use crate::config::{Account, ConfigError, ImapSecurity};
use crate::credentials::{resolve_password, CredentialManager, PasswordSource};
use crate::message::HeaderField;
use crate::output::{write_addresses, OutputError};
use crate::scan::{ProgressSink, ScanError, ScanOptions, ScanPlan, ScanSession, ScanState, TraversalEngine};
use crate::selection::{resolve, select_named};
use crate::store::{StoreClient, StoreError};
use crate::ui;

/// Session phases, used to tell the operator where a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Configuration,
    Connection,
    PlainConnection,
    Login,
    Listing,
    Selection,
    Counting,
    Traversal,
    Saving,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Configuration => "Configuration",
            Phase::Connection => "Connection",
            Phase::PlainConnection => "Plaintext connection",
            Phase::Login => "Login",
            Phase::Listing => "Folder listing",
            Phase::Selection => "Selection",
            Phase::Counting => "Message counting",
            Phase::Traversal => "Traversal",
            Phase::Saving => "Saving",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Credential error: {0}")]
    Credentials(anyhow::Error),

    #[error("{phase} failed: {source}")]
    Store {
        phase: Phase,
        #[source]
        source: StoreError,
    },

    #[error("{phase} failed: {source}")]
    Scan {
        phase: Phase,
        #[source]
        source: ScanError,
    },

    #[error("Selection failed: {0}")]
    Selection(String),

    #[error("Saving failed: {0}")]
    Saving(#[from] OutputError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Scan task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type AppResult<T> = std::result::Result<T, AppError>;

impl AppError {
    pub fn scan(phase: Phase, source: ScanError) -> Self {
        AppError::Scan { phase, source }
    }

    pub fn phase(&self) -> Phase {
        match self {
            AppError::Config(_) | AppError::Credentials(_) => Phase::Configuration,
            AppError::Store { phase, .. } | AppError::Scan { phase, .. } => *phase,
            AppError::Selection(_) | AppError::IoError(_) => Phase::Selection,
            AppError::Saving(_) => Phase::Saving,
            AppError::Task(_) => Phase::Traversal,
        }
    }

    pub fn is_interrupt(&self) -> bool {
        matches!(
            self,
            AppError::Scan {
                source: ScanError::Interrupted,
                ..
            }
        )
    }

    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Scan { source, .. } => match source {
                ScanError::NoFoldersFound => 5,
                ScanError::NoMessagesFound => 6,
                ScanError::Interrupted => 130,
                _ => 1,
            },
            _ => match self.phase() {
                Phase::Connection => 2,
                Phase::PlainConnection => 3,
                Phase::Login => 4,
                _ => 1,
            },
        }
    }
}

/// Everything a session needs once config and command line are merged.
#[derive(Debug, Clone)]
pub struct Settings {
    pub account: Account,
    pub output: PathBuf,
    /// Folders named on the command line; empty means all or ask.
    pub folders: Vec<String>,
    pub headers: Vec<HeaderField>,
    /// Whether `headers` came from the command line rather than the config.
    pub headers_explicit: bool,
    pub interactive: bool,
    pub options: ScanOptions,
    pub save_partial: bool,
    pub remember_password: bool,
}

/// Resolves the password and logs in.
pub fn login(settings: &Settings) -> AppResult<Box<dyn StoreClient + Send>> {
    let account = &settings.account;
    let credentials = CredentialManager::new();
    let (password, source) =
        resolve_password(account, &credentials).map_err(AppError::Credentials)?;

    let store = crate::imap_store::connect(account, &password).map_err(|e| AppError::Store {
        phase: connect_phase(&e, account.imap_security),
        source: e,
    })?;
    println!("ⓘ Logged in to {} as {}", account.imap_server, account.imap_username);

    if settings.remember_password && source == PasswordSource::Prompt {
        if let Err(e) = credentials.store_password(account, &password) {
            warn!("Could not remember password: {}", e);
        }
    }
    Ok(store)
}

/// Login failures are told apart from connection failures, and plaintext
/// connections from encrypted ones.
fn connect_phase(error: &StoreError, security: ImapSecurity) -> Phase {
    match (error, security) {
        (StoreError::Login(_), _) => Phase::Login,
        (_, ImapSecurity::None) => Phase::PlainConnection,
        _ => Phase::Connection,
    }
}

pub fn list<S: StoreClient + ?Sized>(store: &mut S) -> AppResult<FolderCatalog> {
    let catalog = list_folders(store).map_err(|e| AppError::scan(Phase::Listing, e))?;
    println!("ⓘ Found {} folders in the mailbox", catalog.count());
    Ok(catalog)
}

/// Picks folders and headers from the command line, or asks the operator.
pub fn plan<R: BufRead, W: Write>(
    catalog: &FolderCatalog,
    settings: &Settings,
    input: &mut R,
    out: &mut W,
) -> AppResult<ScanPlan> {
    let names = catalog.names();
    let folders = if !settings.folders.is_empty() {
        let selection = select_named(names, &settings.folders)
            .map_err(|name| AppError::Selection(format!("unknown folder {:?}", name)))?;
        resolve(names, &selection)
    } else if settings.interactive {
        let selection = ui::choose(
            "Select folders to scan (all selected by default):",
            names,
            input,
            out,
        )?;
        resolve(names, &selection)
    } else {
        names.to_vec()
    };

    let headers = if settings.interactive && !settings.headers_explicit {
        let selection = ui::choose(
            "Select headers to read addresses from (all selected by default):",
            &settings.headers,
            input,
            out,
        )?;
        resolve(&settings.headers, &selection)
    } else {
        settings.headers.clone()
    };

    if headers.is_empty() {
        return Err(AppError::Selection("no header selected".to_string()));
    }

    info!("Scanning {} folders for headers {:?}", folders.len(), headers);
    Ok(ScanPlan { folders, headers })
}

/// Counts, then traverses, tagging failures with the phase they happened in.
pub fn scan<S: StoreClient>(engine: &mut TraversalEngine<S>, sink: &mut dyn ProgressSink) -> AppResult<()> {
    let total = engine
        .count_total()
        .map_err(|e| AppError::scan(Phase::Counting, e))?;
    println!("ⓘ Found {} messages in the selected folders", total);

    engine
        .traverse(sink)
        .map_err(|e| AppError::scan(Phase::Traversal, e))
}

/// Writes the collected addresses. Partial results are only written when the
/// operator asked for them.
pub fn save(settings: &Settings, session: &ScanSession, complete: bool) -> AppResult<Option<PathBuf>> {
    let complete = complete && session.state() == ScanState::Done;
    if !complete && !settings.save_partial {
        info!("Not saving {} addresses from an incomplete scan", session.addresses().len());
        return Ok(None);
    }

    println!("ⓘ Saving addresses to {}", settings.output.display());
    let written = write_addresses(&settings.output, session.addresses())?;
    if complete {
        println!("✅ Saved {} addresses", written);
    } else {
        println!("❗ Saved {} addresses from an incomplete scan", written);
    }
    Ok(Some(settings.output.clone()))
}

pub fn logout<S: StoreClient + ?Sized>(store: &mut S) {
    if let Err(e) = store.logout() {
        warn!("Logout failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            account: Account::default(),
            output: PathBuf::from("addresses.csv"),
            folders: Vec::new(),
            headers: HeaderField::defaults(),
            headers_explicit: false,
            interactive: false,
            options: ScanOptions::default(),
            save_partial: false,
            remember_password: false,
        }
    }

    fn catalog() -> FolderCatalog {
        FolderCatalog::from_listing([r#"() "/" INBOX"#, r#"() "/" Sent"#, r#"() "/" Trash"#])
    }

    #[test]
    fn non_interactive_plan_takes_everything() {
        let mut input = std::io::Cursor::new("");
        let mut out = Vec::new();
        let plan = plan(&catalog(), &settings(), &mut input, &mut out).unwrap();
        assert_eq!(plan.folders, vec!["INBOX", "Sent", "Trash"]);
        assert_eq!(plan.headers, HeaderField::defaults());
        assert!(out.is_empty());
    }

    #[test]
    fn named_folders_must_exist() {
        let mut settings = settings();
        settings.folders = vec!["Sent".to_string()];
        let mut input = std::io::Cursor::new("");
        let mut out = Vec::new();
        let plan = plan(&catalog(), &settings, &mut input, &mut out).unwrap();
        assert_eq!(plan.folders, vec!["Sent"]);

        settings.folders = vec!["Spam".to_string()];
        let err = plan_err(&settings);
        assert_eq!(err.phase(), Phase::Selection);
    }

    fn plan_err(settings: &Settings) -> AppError {
        let mut input = std::io::Cursor::new("");
        let mut out = Vec::new();
        plan(&catalog(), settings, &mut input, &mut out).unwrap_err()
    }

    #[test]
    fn interactive_plan_drives_the_menu() {
        let mut settings = settings();
        settings.interactive = true;
        // drop "Trash", confirm; then drop "Cc", confirm
        let mut input = std::io::Cursor::new("3\n0\n3\n0\n");
        let mut out = Vec::new();
        let plan = plan(&catalog(), &settings, &mut input, &mut out).unwrap();
        assert_eq!(plan.folders, vec!["INBOX", "Sent"]);
        assert_eq!(plan.headers, vec![HeaderField::new("To"), HeaderField::new("From")]);
    }

    #[test]
    fn deselecting_every_header_is_an_error() {
        let mut settings = settings();
        settings.interactive = true;
        settings.folders = vec!["INBOX".to_string()];
        let mut input = std::io::Cursor::new("1\n2\n3\n0\n");
        let mut out = Vec::new();
        let err = plan(&catalog(), &settings, &mut input, &mut out).unwrap_err();
        assert!(matches!(err, AppError::Selection(_)));
    }

    #[test]
    fn exit_codes_follow_the_failed_phase() {
        let login = AppError::Store {
            phase: Phase::Login,
            source: StoreError::Login("bad credentials".to_string()),
        };
        assert_eq!(login.exit_code(), 4);
        let refused = || StoreError::Connect("connection refused".to_string());
        let tls = AppError::Store {
            phase: connect_phase(&refused(), ImapSecurity::SSL),
            source: refused(),
        };
        assert_eq!(tls.exit_code(), 2);
        let plain = AppError::Store {
            phase: connect_phase(&refused(), ImapSecurity::None),
            source: refused(),
        };
        assert_eq!(plain.exit_code(), 3);
        assert_eq!(
            connect_phase(&StoreError::Login("denied".to_string()), ImapSecurity::None),
            Phase::Login
        );
        assert_eq!(AppError::scan(Phase::Listing, ScanError::NoFoldersFound).exit_code(), 5);
        assert_eq!(AppError::scan(Phase::Counting, ScanError::NoMessagesFound).exit_code(), 6);
        let interrupted = AppError::scan(Phase::Traversal, ScanError::Interrupted);
        assert!(interrupted.is_interrupt());
        assert_eq!(interrupted.exit_code(), 130);
    }
}
