//! MIME header decoding.
//!
//! Header values may mix RFC 2047 encoded-words (`=?charset?B?...?=` or
//! `=?charset?Q?...?=`) with plain text. Decoding keeps the order of the
//! segments; whitespace separating two adjacent encoded-words is not part of the
//! text and is dropped.

use log::debug;
use rfc2047_decoder::{Decoder, RecoverStrategy};

const ENCODED_WORD_START: &str = "=?";

/// Decodes a raw header value into text. Never fails: a value that cannot be
/// decoded is returned unchanged.
///
/// Encoded-words longer than the 75 characters RFC 2047 allows are still
/// decoded; mailers emit them for long display names.
pub fn decode(raw: &str) -> String {
    if !raw.contains(ENCODED_WORD_START) {
        return raw.to_string();
    }

    let decoder = Decoder::new().too_long_encoded_word_strategy(RecoverStrategy::Decode);
    match decoder.decode(raw.as_bytes()) {
        Ok(text) => text,
        Err(e) => {
            debug!("Keeping undecodable header value {:?}: {}", raw, e);
            raw.to_string()
        }
    }
}

/// Whether `text` still carries an encoded-word marker pair.
pub fn has_encoded_word(text: &str) -> bool {
    text.find(ENCODED_WORD_START)
        .map(|start| text[start + 2..].contains("?="))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_verbatim() {
        for raw in ["Jan Kowalski", "  spaced  out ", "a@x.com", "", "odd = ? chars"] {
            assert_eq!(decode(raw), raw);
        }
    }

    #[test]
    fn base64_word_followed_by_plain_text() {
        assert_eq!(decode("=?utf-8?B?SmFu?= Kowalski"), "Jan Kowalski");
    }

    #[test]
    fn quoted_printable_in_another_charset() {
        assert_eq!(decode("=?iso-8859-2?Q?=A3ukasz?="), "Łukasz");
    }

    #[test]
    fn adjacent_words_are_contiguous() {
        // "Jan" + "ek", the separating space belongs to no word
        assert_eq!(decode("=?utf-8?B?SmFu?= =?utf-8?B?ZWs=?="), "Janek");
    }

    #[test]
    fn mixed_segments_keep_order() {
        assert_eq!(
            decode("Dear =?utf-8?Q?J=C3=B3zef?= and friends"),
            "Dear Józef and friends"
        );
    }

    #[test]
    fn overlong_word_is_decoded() {
        let raw = "=?utf-8?B?QmFyZHpvIERsdWdpZSBJbWllIE5hendpc2tvIEZpcm1hIFNwIHogb28gRHppYWwgU3ByemVkYXp5?= <x@y.com>";
        let word_len = raw.find(" <").unwrap();
        assert!(word_len > 75);

        let decoded = decode(raw);
        assert_eq!(
            decoded,
            "Bardzo Dlugie Imie Nazwisko Firma Sp z oo Dzial Sprzedazy <x@y.com>"
        );
        assert!(!has_encoded_word(&decoded));
    }

    #[test]
    fn detects_leftover_encoded_words() {
        assert!(has_encoded_word("=?utf-8?B?SmFu?="));
        assert!(!has_encoded_word("Jan"));
        assert!(!has_encoded_word("x =? y"));
    }
}
