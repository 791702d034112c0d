//! Ordered, keyword-indexed header with its derived structural fields.

use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::bitpix::Bitpix;
use crate::block::{pad_to_block, SPACE_FILL};
use crate::card::Card;
use crate::error::{Error, Result};
use crate::policy::{CardPolicy, StandardCardPolicy};
use crate::stream::RecordReader;
use crate::value::{FromValue, Value};

/// Name reported by [`Header::hdu_name`] for the primary HDU.
pub const PRIMARY_HDU_NAME: &str = "primary_hdu";

/// Largest `NAXIS` a FITS header may declare.
pub const MAX_AXES: usize = 999;

/// The cards of one HDU header, END card included.
///
/// Every keyword maps to the ordered list of card positions where it
/// occurs, so COMMENT and HISTORY (and any duplicated keyword) keep all of
/// their occurrences. Single-value lookups read the first occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct Header<P = StandardCardPolicy> {
    cards: Vec<Card<P>>,
    index: BTreeMap<String, Vec<usize>>,
    bitpix: Bitpix,
    naxis: Vec<usize>,
}

impl<P: CardPolicy> Header<P> {
    /// Read cards until the END card.
    ///
    /// The reader is left just after END; callers realign to the next
    /// logical record.
    pub fn read(reader: &mut RecordReader<'_>) -> Result<Self> {
        let start = reader.position();
        let mut cards = Vec::with_capacity(crate::block::CARDS_PER_BLOCK);
        loop {
            let raw = reader.read_card().map_err(|_| {
                Error::FitsFormat(format!(
                    "header at offset {} has no END card",
                    start
                ))
            })?;
            let card = Card::parse(raw)?;
            log::trace!("card {}: {}", cards.len(), card);
            let is_end = card.is_end();
            cards.push(card);
            if is_end {
                break;
            }
        }
        Self::with_cards(cards)
    }

    /// Parse a header from the start of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::read(&mut RecordReader::new(bytes))
    }

    /// Build a header from typed cards. An END card is appended when the
    /// list does not end with one.
    pub fn from_cards(mut cards: Vec<Card<P>>) -> Result<Self> {
        if let Some(pos) = cards.iter().position(Card::is_end) {
            cards.truncate(pos);
        }
        cards.push(Card::end());
        Self::with_cards(cards)
    }

    fn with_cards(cards: Vec<Card<P>>) -> Result<Self> {
        let mut header = Header {
            cards,
            index: BTreeMap::new(),
            bitpix: Bitpix::U8,
            naxis: Vec::new(),
        };
        header.reindex();
        header.derive()?;
        Ok(header)
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, card) in self.cards.iter().enumerate() {
            if card.is_end() {
                continue;
            }
            self.index
                .entry(card.keyword().to_string())
                .or_default()
                .push(i);
        }
    }

    fn derive(&mut self) -> Result<()> {
        let bitpix = Bitpix::from_value(self.structural::<i64>("BITPIX")?)?;

        let naxis = self.structural::<usize>("NAXIS")?;
        if naxis > MAX_AXES {
            return Err(Error::FitsFormat(format!(
                "NAXIS = {} exceeds the limit of {}",
                naxis, MAX_AXES
            )));
        }
        let mut dims = Vec::with_capacity(naxis);
        for n in 1..=naxis {
            dims.push(self.structural::<usize>(&format!("NAXIS{}", n))?);
        }
        self.bitpix = bitpix;
        self.naxis = dims;
        Ok(())
    }

    /// Re-derive after a structural edit; on failure the cards go back to
    /// `previous` and the header is left as it was.
    fn rederive_or_restore(&mut self, previous: Vec<Card<P>>) -> Result<()> {
        if let Err(e) = self.derive() {
            self.cards = previous;
            self.reindex();
            return Err(e);
        }
        Ok(())
    }

    /// A mandatory keyword: absence or a bad value is a format error.
    fn structural<T: FromValue>(&self, keyword: &str) -> Result<T> {
        self.value_of(keyword).map_err(|e| match e {
            Error::KeyNotFound(k) => Error::FitsFormat(format!("missing {} keyword", k)),
            Error::InvalidCast { value, .. } => {
                Error::FitsFormat(format!("invalid {} value `{}`", keyword, value))
            }
            other => other,
        })
    }

    // ── Structural fields ──

    pub fn bitpix(&self) -> Bitpix {
        self.bitpix
    }

    /// Dimension sizes `NAXIS1..NAXISn`.
    pub fn all_naxis(&self) -> &[usize] {
        &self.naxis
    }

    /// `NAXISn`, 1-based.
    pub fn naxis(&self, n: usize) -> Option<usize> {
        n.checked_sub(1).and_then(|i| self.naxis.get(i).copied())
    }

    /// The value of `NAXIS`.
    pub fn total_dimensions(&self) -> usize {
        self.naxis.len()
    }

    /// Number of elements in the main data array; zero when `NAXIS = 0`.
    pub fn data_size(&self) -> usize {
        if self.naxis.is_empty() {
            0
        } else {
            self.naxis.iter().product()
        }
    }

    /// `GROUPS = T` with `NAXIS1 = 0`: a random-groups primary array.
    pub fn is_random_groups(&self) -> bool {
        self.is_primary()
            && self.naxis(1) == Some(0)
            && self.optional::<bool>("GROUPS").ok().flatten() == Some(true)
    }

    /// Bytes of data following the header, before record padding:
    /// `|BITPIX|/8 × GCOUNT × (PCOUNT + NAXIS1 × ... × NAXISn)`. Random
    /// groups skip the zero `NAXIS1`.
    pub fn data_byte_len(&self) -> Result<usize> {
        let overflow = || Error::format("data size overflows usize");
        let axes = if self.is_random_groups() {
            &self.naxis[1..]
        } else {
            &self.naxis[..]
        };
        let mut elements: usize = 0;
        if !axes.is_empty() {
            elements = 1;
            for &n in axes {
                elements = elements.checked_mul(n).ok_or_else(overflow)?;
            }
        }
        let pcount = self.optional::<usize>("PCOUNT")?.unwrap_or(0);
        let gcount = self.optional::<usize>("GCOUNT")?.unwrap_or(1);
        if elements == 0 && pcount == 0 {
            return Ok(0);
        }
        elements
            .checked_add(pcount)
            .and_then(|n| n.checked_mul(gcount))
            .and_then(|n| n.checked_mul(self.bitpix.element_size()))
            .ok_or_else(overflow)
    }

    // ── Lookup ──

    pub fn contains_keyword(&self, keyword: &str) -> bool {
        self.index.contains_key(keyword)
    }

    /// First card with this keyword.
    pub fn card(&self, keyword: &str) -> Option<&Card<P>> {
        self.index
            .get(keyword)
            .and_then(|positions| positions.first())
            .map(|&i| &self.cards[i])
    }

    /// Every card with this keyword, in header order.
    pub fn cards_named<'a>(&'a self, keyword: &str) -> impl Iterator<Item = &'a Card<P>> + 'a {
        self.index
            .get(keyword)
            .into_iter()
            .flatten()
            .map(move |&i| &self.cards[i])
    }

    /// The value of the first card with this keyword.
    pub fn value_of<T: FromValue>(&self, keyword: &str) -> Result<T> {
        self.card(keyword)
            .ok_or_else(|| Error::KeyNotFound(keyword.to_string()))?
            .value()
    }

    /// The values of every card with this keyword.
    pub fn values_of<T: FromValue>(&self, keyword: &str) -> Result<Vec<T>> {
        if !self.contains_keyword(keyword) {
            return Err(Error::KeyNotFound(keyword.to_string()));
        }
        self.cards_named(keyword).map(Card::value).collect()
    }

    /// Like [`value_of`](Self::value_of), but an absent keyword is `None`.
    pub fn optional<T: FromValue>(&self, keyword: &str) -> Result<Option<T>> {
        match self.card(keyword) {
            Some(card) => card.value().map(Some),
            None => Ok(None),
        }
    }

    /// Text of every COMMENT, HISTORY or blank-keyword card named `keyword`.
    pub fn commentary<'a>(&'a self, keyword: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.cards_named(keyword)
            .filter(|c| c.is_commentary())
            .map(|c| c.comment().unwrap_or(""))
    }

    /// All cards, END included.
    pub fn cards(&self) -> &[Card<P>] {
        &self.cards
    }

    /// Number of cards before END.
    pub fn card_count(&self) -> usize {
        self.cards.len().saturating_sub(1)
    }

    pub fn is_primary(&self) -> bool {
        self.contains_keyword("SIMPLE")
    }

    /// `"primary_hdu"` for a primary header, otherwise the XTENSION value.
    pub fn hdu_name(&self) -> Result<String> {
        if self.is_primary() {
            return Ok(String::from(PRIMARY_HDU_NAME));
        }
        self.value_of::<String>("XTENSION")
    }

    pub fn extname(&self) -> Option<String> {
        self.optional::<String>("EXTNAME").ok().flatten()
    }

    // ── Mutation ──

    /// Replace the value of the first card named `keyword`, or insert a new
    /// card before END when the keyword is absent.
    pub fn set_value(&mut self, keyword: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let previous = self.cards.clone();
        match self.index.get(keyword).and_then(|p| p.first()).copied() {
            Some(i) => self.cards[i].set_value(value)?,
            None => {
                let card = Card::new(keyword, value, "")?;
                self.insert_before_end(card);
            }
        }
        if keyword == "BITPIX" || keyword.starts_with("NAXIS") {
            self.rederive_or_restore(previous)?;
        }
        Ok(())
    }

    /// Append a card before END.
    pub fn push_card(&mut self, card: Card<P>) -> Result<()> {
        if card.is_end() {
            return Err(Error::InvalidCard("header already ends with END".into()));
        }
        let structural = card.keyword() == "BITPIX" || card.keyword().starts_with("NAXIS");
        let previous = self.cards.clone();
        self.insert_before_end(card);
        if structural {
            self.rederive_or_restore(previous)?;
        }
        Ok(())
    }

    /// Append a COMMENT, HISTORY or blank card before END.
    pub fn add_commentary(&mut self, keyword: &str, text: &str) -> Result<()> {
        let card = Card::commentary(keyword, text)?;
        self.insert_before_end(card);
        Ok(())
    }

    fn insert_before_end(&mut self, card: Card<P>) {
        let at = self.cards.len().saturating_sub(1);
        self.cards.insert(at, card);
        self.reindex();
    }

    // ── Serialization ──

    /// Append every card, then pad with spaces to the record boundary.
    pub fn write(&self, out: &mut Vec<u8>) {
        for card in &self.cards {
            out.extend_from_slice(card.as_bytes());
        }
        pad_to_block(out, SPACE_FILL);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(crate::block::padded_byte_len(
            self.cards.len() * crate::block::CARD_SIZE,
        ));
        self.write(&mut out);
        out
    }
}
