use std::collections::btree_set;
use std::collections::BTreeSet;

use crate::decode::decode;

const ADDRESS_SEPARATOR: char = ',';
const STRIPPED: [char; 3] = ['<', '>', '"'];

/// Splits a raw header value into normalized address tokens.
///
/// Each comma separated token is decoded on its own, then every `<`, `>` and `"`
/// is removed and the result trimmed. The display name is not separated from the
/// address: `Jan <jan@x.com>` yields `Jan jan@x.com`.
pub fn extract_addresses(raw: &str) -> BTreeSet<String> {
    raw.split(ADDRESS_SEPARATOR)
        .filter_map(normalize_token)
        .collect()
}

/// Normalizes one address token; `None` when nothing is left after trimming.
pub fn normalize_token(token: &str) -> Option<String> {
    let decoded = decode(token);
    let stripped: String = decoded.chars().filter(|c| !STRIPPED.contains(c)).collect();
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Session-wide deduplicated address accumulator, iterated in sorted order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressSet {
    addresses: BTreeSet<String>,
}

impl AddressSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges addresses, returning how many were new.
    pub fn merge<I>(&mut self, addresses: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let before = self.addresses.len();
        self.addresses.extend(addresses);
        self.addresses.len() - before
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, String> {
        self.addresses.iter()
    }
}

impl<'a> IntoIterator for &'a AddressSet {
    type Item = &'a String;
    type IntoIter = btree_set::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.addresses.iter()
    }
}

impl FromIterator<String> for AddressSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            addresses: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::has_encoded_word;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn bare_address_is_unchanged() {
        assert_eq!(extract_addresses("a@x.com"), set(&["a@x.com"]));
    }

    #[test]
    fn normalization_is_idempotent() {
        let first = extract_addresses("\"Jan\" <jan@x.com>, <a@x.com>");
        let again: BTreeSet<String> = first
            .iter()
            .flat_map(|address| extract_addresses(address))
            .collect();
        assert_eq!(first, again);
    }

    #[test]
    fn display_names_are_folded_into_the_entry() {
        assert_eq!(
            extract_addresses("Jan <jan@x.com>, Anna <anna@y.com>"),
            set(&["Jan jan@x.com", "Anna anna@y.com"])
        );
    }

    #[test]
    fn bracket_styles_merge_to_one_entry() {
        let mut accumulated = AddressSet::new();
        accumulated.merge(extract_addresses("<a@x.com>"));
        accumulated.merge(extract_addresses("\"a@x.com\""));
        let entries: Vec<&String> = accumulated.iter().collect();
        assert_eq!(entries, vec!["a@x.com"]);
    }

    #[test]
    fn encoded_display_name_is_decoded_per_token() {
        let addresses = extract_addresses("=?utf-8?B?SmFu?= <jan@x.com>, b@y.com");
        assert_eq!(addresses, set(&["Jan jan@x.com", "b@y.com"]));
        assert!(addresses.iter().all(|a| !has_encoded_word(a)));
    }

    #[test]
    fn empty_tokens_contribute_nothing() {
        assert!(extract_addresses("").is_empty());
        assert!(extract_addresses(" , ,<>").is_empty());
        assert_eq!(extract_addresses("a@x.com,,"), set(&["a@x.com"]));
    }

    #[test]
    fn merge_counts_new_entries() {
        let mut accumulated = AddressSet::new();
        assert_eq!(accumulated.merge(set(&["a@x.com", "b@y.com"])), 2);
        assert_eq!(accumulated.merge(set(&["b@y.com", "c@z.com"])), 1);
        assert_eq!(accumulated.len(), 3);
        assert!(accumulated.contains("c@z.com"));
    }

    #[test]
    fn dedup_is_case_sensitive() {
        let mut accumulated = AddressSet::new();
        accumulated.merge(extract_addresses("A@x.com, a@x.com"));
        assert_eq!(accumulated.len(), 2);
    }
}
