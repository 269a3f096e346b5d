pub mod address;
pub mod app;
pub mod catalog;
pub mod config;
pub mod credentials;
pub mod decode;
pub mod enumerator;
pub mod imap_store;
pub mod message;
pub mod output;
pub mod scan;
pub mod selection;
pub mod store;
pub mod ui;

// Re-export commonly used types
pub use address::{extract_addresses, AddressSet};
pub use catalog::FolderCatalog;
pub use config::{Account, Config};
pub use decode::decode;
pub use message::HeaderField;
pub use scan::{CancelFlag, ScanError, ScanPlan, ScanProgress, TraversalEngine};
pub use store::{MessageId, Reply, Status, StoreClient, StoreError};
