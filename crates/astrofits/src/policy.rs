//! Card validation and value (de)serialization strategy.

use alloc::string::{String, ToString};

use crate::block::CARD_SIZE;
use crate::error::{Error, Result};
use crate::value::{self, Value};

/// Length of the keyword field.
pub const KEYWORD_LEN: usize = 8;

/// Longest value text on a card without a comment.
pub const MAX_VALUE_LEN: usize = 70;

/// Longest value plus comment text when a comment is present.
pub const MAX_VALUE_COMMENT_LEN: usize = 68;

/// Rules a [`Card`](crate::card::Card) consults when it is parsed, built or
/// read back as a typed value.
///
/// The methods are associated functions so a policy is a zero-sized type
/// parameter rather than state carried by every card.
pub trait CardPolicy {
    /// Keywords that never carry a `= ` value indicator.
    fn is_reserved(keyword: &str) -> bool;

    fn is_key_valid(keyword: &str) -> bool {
        keyword.len() <= KEYWORD_LEN
    }

    fn is_key_char(b: u8) -> bool;

    /// Length rule for a value/comment pair.
    fn is_value_valid(value: &str, comment: &str) -> bool {
        if comment.is_empty() {
            value.len() <= MAX_VALUE_LEN
        } else {
            value.len() + comment.len() <= MAX_VALUE_COMMENT_LEN
        }
    }

    /// Structural check of a raw 80-byte card.
    fn is_card_valid(raw: &[u8]) -> bool;

    fn parse_value(text: &str) -> Result<Value>;

    fn serialize_value(value: &Value) -> String;

    /// Validate a keyword for a card under construction.
    fn check_key(keyword: &str) -> Result<()> {
        if !Self::is_key_valid(keyword) {
            return Err(Error::InvalidKeyLength(keyword.to_string()));
        }
        if let Some(b) = keyword.bytes().find(|&b| !Self::is_key_char(b)) {
            return Err(Error::InvalidCard(alloc::format!(
                "keyword `{}` contains illegal character {:?}",
                keyword,
                b as char
            )));
        }
        Ok(())
    }
}

/// FITS 4.0 keyword and value rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StandardCardPolicy;

const RESERVED_KEYWORDS: [&str; 3] = ["COMMENT", "HISTORY", "END"];

impl CardPolicy for StandardCardPolicy {
    fn is_reserved(keyword: &str) -> bool {
        let keyword = keyword.trim_end();
        keyword.is_empty() || RESERVED_KEYWORDS.contains(&keyword)
    }

    fn is_key_char(b: u8) -> bool {
        matches!(b, b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_')
    }

    fn is_card_valid(raw: &[u8]) -> bool {
        if raw.len() != CARD_SIZE || !raw.iter().all(|b| (0x20..=0x7E).contains(b)) {
            return false;
        }
        let keyword = &raw[..KEYWORD_LEN];
        let name_len = keyword
            .iter()
            .position(|&b| b == b' ')
            .unwrap_or(KEYWORD_LEN);
        // Embedded blanks are not allowed: everything after the name is padding.
        if !keyword[..name_len].iter().all(|&b| Self::is_key_char(b))
            || !keyword[name_len..].iter().all(|&b| b == b' ')
        {
            return false;
        }
        let name = core::str::from_utf8(&keyword[..name_len]).unwrap_or("");
        Self::is_reserved(name) || &raw[KEYWORD_LEN..KEYWORD_LEN + 2] == b"= "
    }

    fn parse_value(text: &str) -> Result<Value> {
        value::parse_value(text)
    }

    fn serialize_value(v: &Value) -> String {
        value::format_value(v)
    }
}
