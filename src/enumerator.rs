use log::debug;

use crate::scan::{ScanError, StoreCall};
use crate::store::{MessageId, StoreClient};

/// Selects `folder` and returns its message count.
pub fn select_folder<S: StoreClient + ?Sized>(store: &mut S, folder: &str) -> Result<u32, ScanError> {
    let reply = store.select_folder(folder)?;
    if !reply.is_ok() {
        return Err(ScanError::Query {
            call: StoreCall::Select(folder.to_string()),
            status: reply.status,
        });
    }

    let count = parse_count(&reply.payload).ok_or_else(|| ScanError::MalformedPayload {
        call: StoreCall::Select(folder.to_string()),
        payload: reply.payload.clone(),
    })?;
    debug!("Selected {} with {} messages", folder, count);
    Ok(count)
}

/// A count payload is exactly one non-negative integer token.
pub fn parse_count(payload: &str) -> Option<u32> {
    let mut tokens = payload.split_whitespace();
    let count = tokens.next()?.parse().ok()?;
    match tokens.next() {
        Some(_) => None,
        None => Some(count),
    }
}

/// Ids of every message in the already selected `folder`.
///
/// Must not be called for a folder whose count is zero.
pub fn list_all_message_ids<S: StoreClient + ?Sized>(
    store: &mut S,
    folder: &str,
) -> Result<Vec<MessageId>, ScanError> {
    let reply = store.search_all()?;
    if !reply.is_ok() {
        return Err(ScanError::Query {
            call: StoreCall::Search(folder.to_string()),
            status: reply.status,
        });
    }

    Ok(reply.payload.split_whitespace().map(MessageId::new).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn count_payload_must_be_a_single_number() {
        assert_eq!(parse_count("42"), Some(42));
        assert_eq!(parse_count(" 0 "), Some(0));
        assert_eq!(parse_count(""), None);
        assert_eq!(parse_count("forty"), None);
        assert_eq!(parse_count("-1"), None);
        assert_eq!(parse_count("4 2"), None);
    }
}
