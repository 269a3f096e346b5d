use std::fmt;

use thiserror::Error;

/// Status discriminator carried by every store reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Ok,
    No(String),
    Bad(String),
}

impl Status {
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "OK"),
            Status::No(text) => write!(f, "NO {}", text),
            Status::Bad(text) => write!(f, "BAD {}", text),
        }
    }
}

/// A store response: the payload may only be interpreted when `status` is `Ok`.
#[derive(Debug, Clone)]
pub struct Reply<T> {
    pub status: Status,
    pub payload: T,
}

impl<T> Reply<T> {
    pub fn ok(payload: T) -> Self {
        Self { status: Status::Ok, payload }
    }

    pub fn is_ok(&self) -> bool {
        self.status.is_ok()
    }
}

impl<T: Default> Reply<T> {
    pub fn rejected(status: Status) -> Self {
        Self { status, payload: T::default() }
    }
}

/// Opaque identifier of a message inside the currently selected folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connect(String),

    #[error("Login error: {0}")]
    Login(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The four retrieval calls the scanner needs from a mail store.
///
/// Protocol-level rejections (`NO`/`BAD`) come back as a [`Reply`] with a non-`Ok`
/// status; only transport failures are reported through `Err`.
pub trait StoreClient {
    /// Raw folder listing lines, e.g. `(\HasNoChildren) "/" "INBOX"`.
    fn list_folders(&mut self) -> Result<Reply<Vec<String>>, StoreError>;

    /// Selects a folder; the payload is the raw message count.
    fn select_folder(&mut self, name: &str) -> Result<Reply<String>, StoreError>;

    /// Searches the selected folder for every message; the payload is a
    /// whitespace separated id list.
    fn search_all(&mut self) -> Result<Reply<String>, StoreError>;

    /// Fetches the full RFC 822 message.
    fn fetch_message(&mut self, id: &MessageId) -> Result<Reply<Option<Vec<u8>>>, StoreError>;

    fn logout(&mut self) -> Result<(), StoreError>;
}

impl<S: StoreClient + ?Sized> StoreClient for &mut S {
    fn list_folders(&mut self) -> Result<Reply<Vec<String>>, StoreError> {
        (**self).list_folders()
    }

    fn select_folder(&mut self, name: &str) -> Result<Reply<String>, StoreError> {
        (**self).select_folder(name)
    }

    fn search_all(&mut self) -> Result<Reply<String>, StoreError> {
        (**self).search_all()
    }

    fn fetch_message(&mut self, id: &MessageId) -> Result<Reply<Option<Vec<u8>>>, StoreError> {
        (**self).fetch_message(id)
    }

    fn logout(&mut self) -> Result<(), StoreError> {
        (**self).logout()
    }
}

impl<S: StoreClient + ?Sized> StoreClient for Box<S> {
    fn list_folders(&mut self) -> Result<Reply<Vec<String>>, StoreError> {
        (**self).list_folders()
    }

    fn select_folder(&mut self, name: &str) -> Result<Reply<String>, StoreError> {
        (**self).select_folder(name)
    }

    fn search_all(&mut self) -> Result<Reply<String>, StoreError> {
        (**self).search_all()
    }

    fn fetch_message(&mut self, id: &MessageId) -> Result<Reply<Option<Vec<u8>>>, StoreError> {
        (**self).fetch_message(id)
    }

    fn logout(&mut self) -> Result<(), StoreError> {
        (**self).logout()
    }
}
