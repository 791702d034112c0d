//! The 80-byte keyword record.

use alloc::format;
use alloc::string::{String, ToString};
use core::cell::OnceCell;
use core::fmt;
use core::marker::PhantomData;

use crate::block::CARD_SIZE;
use crate::error::{Error, Result};
use crate::policy::{CardPolicy, StandardCardPolicy, KEYWORD_LEN, MAX_VALUE_LEN};
use crate::value::{split_value_comment, FromValue, Value};

/// Longest free text on a COMMENT/HISTORY/blank card.
pub const MAX_COMMENTARY_LEN: usize = CARD_SIZE - KEYWORD_LEN;

fn is_printable(text: &str) -> bool {
    text.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// One header card.
///
/// The card keeps its exact 80-character image so that an unmodified header
/// serializes back byte for byte. The typed value is decoded at most once
/// and cached until [`Card::set_value`] replaces it.
pub struct Card<P = StandardCardPolicy> {
    raw: String,
    value: OnceCell<Value>,
    _policy: PhantomData<P>,
}

impl<P: CardPolicy> Card<P> {
    /// Parse one raw card image.
    pub fn parse(raw: &[u8]) -> Result<Self> {
        if raw.len() != CARD_SIZE {
            return Err(Error::InvalidCard(format!(
                "card is {} bytes, expected {}",
                raw.len(),
                CARD_SIZE
            )));
        }
        if !P::is_card_valid(raw) {
            return Err(Error::InvalidCard(format!(
                "`{}`",
                String::from_utf8_lossy(raw).trim_end()
            )));
        }
        let raw = String::from_utf8_lossy(raw).into_owned();
        Ok(Card {
            raw,
            value: OnceCell::new(),
            _policy: PhantomData,
        })
    }

    /// Build a `KEYWORD = value / comment` card.
    pub fn new(keyword: &str, value: impl Into<Value>, comment: &str) -> Result<Self> {
        let value = value.into();
        let raw = Self::layout(keyword, &value, comment)?;
        Ok(Card {
            raw,
            value: OnceCell::from(value),
            _policy: PhantomData,
        })
    }

    /// Build a COMMENT, HISTORY or blank-keyword card.
    pub fn commentary(keyword: &str, text: &str) -> Result<Self> {
        P::check_key(keyword)?;
        if !P::is_reserved(keyword) || keyword == "END" {
            return Err(Error::InvalidCard(format!(
                "`{}` is not a commentary keyword",
                keyword
            )));
        }
        if !is_printable(text) {
            return Err(Error::InvalidCard(format!("non-printable text on `{}`", keyword)));
        }
        if text.len() > MAX_COMMENTARY_LEN {
            return Err(Error::InvalidValueLength {
                keyword: keyword.to_string(),
                len: text.len(),
                max: MAX_COMMENTARY_LEN,
            });
        }
        let raw = format!("{:<8}{:<72}", keyword, text);
        Ok(Card {
            raw,
            value: OnceCell::new(),
            _policy: PhantomData,
        })
    }

    /// The END card.
    pub fn end() -> Self {
        Card {
            raw: format!("{:<80}", "END"),
            value: OnceCell::new(),
            _policy: PhantomData,
        }
    }

    fn layout(keyword: &str, value: &Value, comment: &str) -> Result<String> {
        P::check_key(keyword)?;
        if P::is_reserved(keyword) {
            return Err(Error::InvalidCard(format!(
                "`{}` cannot carry a value",
                keyword
            )));
        }
        let text = P::serialize_value(value);
        if !is_printable(&text) || !is_printable(comment) {
            return Err(Error::InvalidCard(format!("non-printable text on `{}`", keyword)));
        }
        if !P::is_value_valid(&text, comment) {
            let (len, max) = if comment.is_empty() {
                (text.len(), MAX_VALUE_LEN)
            } else {
                (text.len() + comment.len(), crate::policy::MAX_VALUE_COMMENT_LEN)
            };
            return Err(Error::InvalidValueLength {
                keyword: keyword.to_string(),
                len,
                max,
            });
        }
        let mut raw = format!("{:<8}= {}", keyword, text);
        if !comment.is_empty() {
            // " / " when it fits, otherwise the two-character separator.
            if raw.len() + 3 + comment.len() <= CARD_SIZE {
                raw.push_str(" / ");
            } else {
                raw.push_str(" /");
            }
            raw.push_str(comment);
        }
        Ok(format!("{:<80}", raw))
    }

    /// Trimmed keyword.
    pub fn keyword(&self) -> &str {
        self.raw[..KEYWORD_LEN].trim_end()
    }

    /// The keyword field including its trailing blanks.
    pub fn raw_keyword(&self) -> &str {
        &self.raw[..KEYWORD_LEN]
    }

    pub fn is_end(&self) -> bool {
        self.raw_keyword() == "END     "
    }

    pub fn is_blank(&self) -> bool {
        self.keyword().is_empty()
    }

    /// COMMENT, HISTORY and blank-keyword cards.
    pub fn is_commentary(&self) -> bool {
        !self.is_end() && P::is_reserved(self.keyword())
    }

    /// Whether the card carries a `= ` value indicator.
    pub fn has_value(&self) -> bool {
        !P::is_reserved(self.keyword()) && &self.raw[KEYWORD_LEN..KEYWORD_LEN + 2] == "= "
    }

    /// Columns 11-80: the value followed by its comment.
    pub fn value_with_comment(&self) -> &str {
        if self.has_value() {
            &self.raw[KEYWORD_LEN + 2..]
        } else {
            ""
        }
    }

    /// The value text with surrounding blanks and the comment removed.
    pub fn value_text(&self) -> &str {
        split_value_comment(self.value_with_comment()).0.trim()
    }

    /// The comment of a value card, or the free text of a commentary card.
    pub fn comment(&self) -> Option<&str> {
        if self.has_value() {
            split_value_comment(self.value_with_comment())
                .1
                .filter(|c| !c.is_empty())
        } else if self.is_end() {
            None
        } else {
            Some(self.raw[KEYWORD_LEN..].trim_end()).filter(|c| !c.is_empty())
        }
    }

    /// The decoded value, parsed on first use.
    pub fn typed_value(&self) -> Result<&Value> {
        if let Some(v) = self.value.get() {
            return Ok(v);
        }
        if !self.has_value() {
            return Err(Error::cast(self.keyword(), "valued card"));
        }
        let parsed = P::parse_value(self.value_text())?;
        log::trace!("decoded {} = {:?}", self.keyword(), parsed);
        Ok(self.value.get_or_init(|| parsed))
    }

    /// The value converted to `T`.
    pub fn value<T: FromValue>(&self) -> Result<T> {
        T::from_value(self.typed_value()?)
    }

    /// Replace the value, keeping keyword and comment.
    pub fn set_value(&mut self, value: impl Into<Value>) -> Result<()> {
        if !self.has_value() {
            return Err(Error::InvalidCard(format!(
                "`{}` has no value field",
                self.keyword()
            )));
        }
        let value = value.into();
        let comment = self.comment().unwrap_or("").to_string();
        self.raw = Self::layout(self.keyword(), &value, &comment)?;
        self.value = OnceCell::from(value);
        Ok(())
    }

    /// The 80-byte card image.
    pub fn as_bytes(&self) -> &[u8] {
        self.raw.as_bytes()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl<P> Clone for Card<P> {
    fn clone(&self) -> Self {
        Card {
            raw: self.raw.clone(),
            value: self.value.clone(),
            _policy: PhantomData,
        }
    }
}

impl<P> PartialEq for Card<P> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<P> Eq for Card<P> {}

impl<P> fmt::Debug for Card<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Card").field(&self.raw.trim_end()).finish()
    }
}

impl<P> fmt::Display for Card<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw.trim_end())
    }
}
