//! The traversal engine.
//!
//! A scan session moves `Idle -> Counted -> Scanning -> Done`. `Failed` and
//! `Interrupted` are terminal as well; whatever was merged into the address set
//! before that point stays in the session.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;

use crate::address::{extract_addresses, AddressSet};
use crate::enumerator::{list_all_message_ids, select_folder};
use crate::message::{parse_message, HeaderField, MessageOutcome, SkipReason};
use crate::store::{MessageId, Status, StoreClient, StoreError};

/// The store call a [`ScanError`] refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List,
    Select(String),
    Search(String),
}

impl fmt::Display for StoreCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreCall::List => write!(f, "LIST"),
            StoreCall::Select(folder) => write!(f, "SELECT {}", folder),
            StoreCall::Search(folder) => write!(f, "SEARCH ALL in {}", folder),
        }
    }
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("{call} failed: {status}")]
    Query { call: StoreCall, status: Status },

    #[error("{call} returned a malformed payload: {payload:?}")]
    MalformedPayload { call: StoreCall, payload: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("No folders found in the mailbox")]
    NoFoldersFound,

    #[error("No messages found in the selected folders")]
    NoMessagesFound,

    #[error("Scan interrupted")]
    Interrupted,

    #[error("Cannot {action} a scan that is {state}")]
    OutOfOrder { action: &'static str, state: ScanState },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Counted,
    Scanning,
    Done,
    Failed,
    Interrupted,
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScanState::Idle => "idle",
            ScanState::Counted => "counted",
            ScanState::Scanning => "scanning",
            ScanState::Done => "done",
            ScanState::Failed => "failed",
            ScanState::Interrupted => "interrupted",
        };
        f.write_str(name)
    }
}

/// Messages visited so far against the total counted before scanning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanProgress {
    pub current: u64,
    pub total: u64,
}

impl ScanProgress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.current as f64 / self.total as f64 * 100.0
        }
    }
}

/// Receives progress once per visited message.
pub trait ProgressSink {
    fn folder_started(&mut self, _folder: &str, _count: u32) {}

    fn update(&mut self, progress: ScanProgress);
}

/// Discards progress.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&mut self, _progress: ScanProgress) {}
}

/// Shared operator-interrupt flag, checked before every store call.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ScanError> {
        if self.is_cancelled() {
            Err(ScanError::Interrupted)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Reuse the counting pass results and skip re-selecting folders counted as
    /// empty. Messages arriving between the two passes are then missed.
    pub cache_counts: bool,
}

/// What to scan: folders in visiting order and the headers to read.
#[derive(Debug, Clone)]
pub struct ScanPlan {
    pub folders: Vec<String>,
    pub headers: Vec<HeaderField>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub folders_scanned: usize,
    pub folders_empty: usize,
    pub messages_skipped: u64,
}

#[derive(Debug, Clone)]
pub struct ScanSession {
    state: ScanState,
    progress: ScanProgress,
    addresses: AddressSet,
    stats: ScanStats,
}

impl ScanSession {
    fn new() -> Self {
        Self {
            state: ScanState::Idle,
            progress: ScanProgress::default(),
            addresses: AddressSet::new(),
            stats: ScanStats::default(),
        }
    }

    pub fn state(&self) -> ScanState {
        self.state
    }

    pub fn progress(&self) -> ScanProgress {
        self.progress
    }

    pub fn addresses(&self) -> &AddressSet {
        &self.addresses
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }
}

pub struct TraversalEngine<S> {
    store: S,
    plan: ScanPlan,
    options: ScanOptions,
    cancel: CancelFlag,
    session: ScanSession,
    counts: HashMap<String, u32>,
}

impl<S: StoreClient> TraversalEngine<S> {
    pub fn new(store: S, plan: ScanPlan) -> Self {
        Self {
            store,
            plan,
            options: ScanOptions::default(),
            cancel: CancelFlag::new(),
            session: ScanSession::new(),
            counts: HashMap::new(),
        }
    }

    pub fn with_options(mut self, options: ScanOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_parts(self) -> (S, ScanSession) {
        (self.store, self.session)
    }

    /// Counts, then traverses.
    pub fn run(&mut self, sink: &mut dyn ProgressSink) -> Result<(), ScanError> {
        self.count_total()?;
        self.traverse(sink)
    }

    /// Selects every planned folder once and sums the counts into the progress total.
    pub fn count_total(&mut self) -> Result<u64, ScanError> {
        self.expect_state(ScanState::Idle, "count")?;

        let result = self.sum_counts();
        let total = self.settle(result)?;
        self.session.progress.total = total;
        if total == 0 {
            self.session.state = ScanState::Done;
            return Err(ScanError::NoMessagesFound);
        }

        info!(
            "Found {} messages in {} selected folders",
            total,
            self.plan.folders.len()
        );
        self.session.state = ScanState::Counted;
        Ok(total)
    }

    /// Visits every message of every planned folder.
    pub fn traverse(&mut self, sink: &mut dyn ProgressSink) -> Result<(), ScanError> {
        self.expect_state(ScanState::Counted, "traverse")?;
        self.session.state = ScanState::Scanning;

        let result = self.visit_folders(sink);
        self.settle(result)?;

        let progress = self.session.progress;
        if progress.current < progress.total {
            warn!(
                "Visited {} of {} counted messages; folders shrank during the scan",
                progress.current, progress.total
            );
        }
        info!(
            "Scan finished: {} addresses, {} messages skipped",
            self.session.addresses.len(),
            self.session.stats.messages_skipped
        );
        self.session.state = ScanState::Done;
        Ok(())
    }

    fn expect_state(&self, expected: ScanState, action: &'static str) -> Result<(), ScanError> {
        if self.session.state == expected {
            Ok(())
        } else {
            Err(ScanError::OutOfOrder {
                action,
                state: self.session.state,
            })
        }
    }

    /// Moves the session to its terminal state when `result` is an error.
    fn settle<T>(&mut self, result: Result<T, ScanError>) -> Result<T, ScanError> {
        if let Err(e) = &result {
            self.session.state = match e {
                ScanError::Interrupted => ScanState::Interrupted,
                ScanError::NoMessagesFound => ScanState::Done,
                _ => ScanState::Failed,
            };
        }
        result
    }

    fn sum_counts(&mut self) -> Result<u64, ScanError> {
        let mut total = 0u64;
        for folder in &self.plan.folders {
            self.cancel.check()?;
            let count = select_folder(&mut self.store, folder)?;
            if self.options.cache_counts {
                self.counts.insert(folder.clone(), count);
            }
            total += u64::from(count);
        }
        Ok(total)
    }

    fn visit_folders(&mut self, sink: &mut dyn ProgressSink) -> Result<(), ScanError> {
        for index in 0..self.plan.folders.len() {
            let folder = self.plan.folders[index].clone();
            self.visit_folder(&folder, sink)?;
        }
        Ok(())
    }

    fn visit_folder(&mut self, folder: &str, sink: &mut dyn ProgressSink) -> Result<(), ScanError> {
        if self.options.cache_counts && self.counts.get(folder) == Some(&0) {
            debug!("Skipping {}: counted empty", folder);
            self.session.stats.folders_empty += 1;
            return Ok(());
        }

        self.cancel.check()?;
        let count = select_folder(&mut self.store, folder)?;
        if count == 0 {
            debug!("Skipping {}: no messages", folder);
            self.session.stats.folders_empty += 1;
            return Ok(());
        }

        info!("Found {} messages in folder {}", count, folder);
        sink.folder_started(folder, count);

        self.cancel.check()?;
        let ids = list_all_message_ids(&mut self.store, folder)?;
        for id in ids {
            let progress = self.session.progress;
            if progress.current >= progress.total {
                warn!("{} grew since it was counted; remaining messages are not visited", folder);
                break;
            }

            self.cancel.check()?;
            self.visit_message(&id)?;

            self.session.progress.current += 1;
            sink.update(self.session.progress);
        }

        self.session.stats.folders_scanned += 1;
        Ok(())
    }

    /// Fetches one message and merges its addresses. A rejected fetch or an
    /// unparseable message is skipped; only transport failures are errors.
    fn visit_message(&mut self, id: &MessageId) -> Result<(), ScanError> {
        let reply = self.store.fetch_message(id)?;
        let outcome = if !reply.is_ok() {
            MessageOutcome::Skipped(SkipReason::FetchRejected(reply.status))
        } else {
            match reply.payload {
                Some(raw) => parse_message(&raw, &self.plan.headers),
                None => MessageOutcome::Skipped(SkipReason::EmptyBody),
            }
        };

        match outcome {
            MessageOutcome::Parsed(message) => {
                for field in &self.plan.headers {
                    if let Some(raw) = message.header(field) {
                        let added = self.session.addresses.merge(extract_addresses(raw));
                        debug!("Message {} {}: {} new addresses", id, field, added);
                    }
                }
            }
            MessageOutcome::Skipped(reason) => {
                warn!("Skipping message {}: {}", id, reason);
                self.session.stats.messages_skipped += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_handles_zero_total() {
        assert_eq!(ScanProgress::default().percent(), 0.0);
        let half = ScanProgress { current: 1, total: 2 };
        assert_eq!(half.percent(), 50.0);
    }

    #[test]
    fn cancel_flag_is_shared_between_clones() {
        let flag = CancelFlag::new();
        let handle = flag.clone();
        assert!(!flag.is_cancelled());
        handle.cancel();
        assert!(flag.is_cancelled());
        assert!(matches!(flag.check(), Err(ScanError::Interrupted)));
    }

    #[test]
    fn query_errors_name_the_call() {
        let rejected = ScanError::Query {
            call: StoreCall::List,
            status: Status::No("denied".to_string()),
        };
        assert_eq!(rejected.to_string(), "LIST failed: NO denied");
    }
}
