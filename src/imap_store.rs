use std::io::{Read, Write};
use std::net::TcpStream;

use imap::Session;
use log::{debug, info};
use native_tls::{TlsConnector, TlsStream};

use crate::config::{Account, ImapSecurity};
use crate::store::{MessageId, Reply, Status, StoreClient, StoreError};

const LIST_ALL: &str = "LIST \"\" \"*\"";
const LIST_PREFIX: &str = "* LIST ";

/// [`StoreClient`] over a logged-in IMAP session.
pub struct ImapStore<T: Read + Write> {
    session: Session<T>,
}

/// Connects and logs in according to the account's security setting.
pub fn connect(account: &Account, password: &str) -> Result<Box<dyn StoreClient + Send>, StoreError> {
    info!(
        "Connecting to {}:{} ({:?})",
        account.imap_server, account.imap_port, account.imap_security
    );
    match account.imap_security {
        ImapSecurity::SSL | ImapSecurity::StartTLS => {
            Ok(Box::new(ImapStore::connect_secure(account, password)?))
        }
        ImapSecurity::None => Ok(Box::new(ImapStore::connect_plain(account, password)?)),
    }
}

impl ImapStore<TlsStream<TcpStream>> {
    pub fn connect_secure(account: &Account, password: &str) -> Result<Self, StoreError> {
        let domain = account.imap_server.as_str();
        let port = account.imap_port;

        let tls = TlsConnector::builder().build()?;
        let client = match account.imap_security {
            ImapSecurity::StartTLS => imap::connect_starttls((domain, port), domain, &tls),
            _ => imap::connect((domain, port), domain, &tls),
        }
        .map_err(|e| StoreError::Connect(e.to_string()))?;

        let session = client
            .login(&account.imap_username, password)
            .map_err(|e| StoreError::Login(e.0.to_string()))?;

        Ok(Self { session })
    }
}

impl ImapStore<TcpStream> {
    pub fn connect_plain(account: &Account, password: &str) -> Result<Self, StoreError> {
        let domain = account.imap_server.as_str();
        let tcp_stream = TcpStream::connect((domain, account.imap_port))
            .map_err(|e| StoreError::Connect(e.to_string()))?;

        let client = imap::Client::new(tcp_stream);
        let session = client
            .login(&account.imap_username, password)
            .map_err(|e| StoreError::Login(e.0.to_string()))?;

        Ok(Self { session })
    }
}

/// Maps protocol rejections to a reply status and everything else to a transport error.
fn reply<T: Default>(result: imap::error::Result<T>) -> Result<Reply<T>, StoreError> {
    match result {
        Ok(payload) => Ok(Reply::ok(payload)),
        Err(imap::error::Error::No(text)) => Ok(Reply::rejected(Status::No(text))),
        Err(imap::error::Error::Bad(text)) => Ok(Reply::rejected(Status::Bad(text))),
        Err(e) => Err(StoreError::Transport(e.to_string())),
    }
}

/// Keeps the untagged LIST lines of a raw response, without the `* LIST ` prefix.
fn listing_lines(raw: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(raw)
        .lines()
        .filter_map(|line| line.strip_prefix(LIST_PREFIX))
        .map(|line| line.trim_end().to_string())
        .collect()
}

impl<T: Read + Write> StoreClient for ImapStore<T> {
    fn list_folders(&mut self) -> Result<Reply<Vec<String>>, StoreError> {
        let raw = reply(self.session.run_command_and_read_response(LIST_ALL))?;
        let lines = listing_lines(&raw.payload);
        debug!("LIST returned {} lines", lines.len());
        Ok(Reply { status: raw.status, payload: lines })
    }

    fn select_folder(&mut self, name: &str) -> Result<Reply<String>, StoreError> {
        let mailbox = reply(self.session.select(name).map(Some))?;
        Ok(Reply {
            status: mailbox.status,
            payload: mailbox.payload.map(|m| m.exists.to_string()).unwrap_or_default(),
        })
    }

    fn search_all(&mut self) -> Result<Reply<String>, StoreError> {
        let found = reply(self.session.search("ALL"))?;
        let mut ids: Vec<u32> = found.payload.into_iter().collect();
        ids.sort_unstable();
        let payload = ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        Ok(Reply { status: found.status, payload })
    }

    fn fetch_message(&mut self, id: &MessageId) -> Result<Reply<Option<Vec<u8>>>, StoreError> {
        match self.session.fetch(id.as_str(), "RFC822") {
            Ok(fetches) => Ok(Reply::ok(
                fetches.iter().find_map(|f| f.body()).map(|body| body.to_vec()),
            )),
            Err(imap::error::Error::No(text)) => Ok(Reply::rejected(Status::No(text))),
            Err(imap::error::Error::Bad(text)) => Ok(Reply::rejected(Status::Bad(text))),
            Err(e) => Err(StoreError::Transport(e.to_string())),
        }
    }

    fn logout(&mut self) -> Result<(), StoreError> {
        self.session
            .logout()
            .map_err(|e| StoreError::Transport(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_lines_keep_only_list_responses() {
        let raw = b"* LIST (\\HasNoChildren) \"/\" \"INBOX\"\r\n\
* LIST (\\HasChildren \\Noselect) \"/\" \"[Gmail]\"\r\n\
* CAPABILITY IMAP4rev1\r\n";
        let lines = listing_lines(raw);
        assert_eq!(
            lines,
            vec![
                "(\\HasNoChildren) \"/\" \"INBOX\"".to_string(),
                "(\\HasChildren \\Noselect) \"/\" \"[Gmail]\"".to_string(),
            ]
        );
    }
}
