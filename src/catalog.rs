use std::collections::BTreeSet;
use std::sync::OnceLock;

use log::{debug, info};
use regex::Regex;

use crate::scan::{ScanError, StoreCall};
use crate::store::StoreClient;

/// `(<flags>) "<delimiter>" <name>`; the name is everything after the quoted delimiter.
const LISTING_PATTERN: &str = r#"\s"(?:\\.|[^"\\])"\s(.*)$"#;

fn listing_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(LISTING_PATTERN).expect("listing pattern is valid"))
}

/// Deduplicated, sorted folder names of a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderCatalog {
    names: Vec<String>,
}

impl FolderCatalog {
    pub fn from_listing<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: BTreeSet<String> = lines
            .into_iter()
            .filter_map(|line| parse_listing_line(line.as_ref()))
            .collect();
        Self {
            names: names.into_iter().collect(),
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn count(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }
}

/// Extracts the folder name from one raw listing line.
///
/// Lines without a quoted hierarchy delimiter (metadata lines, `NIL`
/// delimiters, literals) yield `None`.
pub fn parse_listing_line(line: &str) -> Option<String> {
    let captures = listing_regex().captures(line.trim_end())?;
    let name = captures.get(1)?.as_str().trim();
    let name = unquote(name);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

fn unquote(name: &str) -> String {
    let inner = match name.strip_prefix('"').and_then(|n| n.strip_suffix('"')) {
        Some(inner) => inner,
        None => return name.to_string(),
    };

    let mut unquoted = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                unquoted.push(escaped);
            }
        } else {
            unquoted.push(c);
        }
    }
    unquoted
}

/// Lists the store's folders. An empty catalog ends the session with
/// [`ScanError::NoFoldersFound`].
pub fn list_folders<S: StoreClient + ?Sized>(store: &mut S) -> Result<FolderCatalog, ScanError> {
    let reply = store.list_folders()?;
    if !reply.is_ok() {
        return Err(ScanError::Query {
            call: StoreCall::List,
            status: reply.status,
        });
    }

    debug!("Parsing {} listing lines", reply.payload.len());
    let catalog = FolderCatalog::from_listing(&reply.payload);
    if catalog.is_empty() {
        return Err(ScanError::NoFoldersFound);
    }

    info!("Found {} folders", catalog.count());
    Ok(catalog)
}
