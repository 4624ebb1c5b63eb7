//! FITS header blocks: scanning card sequences up to the END sentinel and
//! typed keyword lookup.

use crate::block::{BLOCK_SIZE, CARDS_PER_BLOCK, CARD_SIZE, HEADER_PAD_BYTE};
use crate::card::{end_card, Card};
use crate::error::{Error, Result};
use crate::value::Value;

/// A parsed FITS header: all cards up to, but not including, END.
///
/// Trailing blank cards (keyword space reserved by the writer) are dropped at
/// parse time, matching how the original service strips reserved space when
/// copying headers.
#[derive(Debug, Clone, Default)]
pub struct Header {
    /// Header cards in file order, END excluded.
    pub cards: Vec<Card>,
}

impl Header {
    /// Parse consecutive 2880-byte blocks until the END card.
    ///
    /// Fails if the data runs out before END is found.
    pub fn parse(data: &[u8]) -> Result<Header> {
        let mut cards = Vec::new();
        let num_blocks = data.len() / BLOCK_SIZE;
        for block in 0..num_blocks {
            for slot in 0..CARDS_PER_BLOCK {
                let start = block * BLOCK_SIZE + slot * CARD_SIZE;
                let image: &[u8; CARD_SIZE] = data[start..start + CARD_SIZE]
                    .try_into()
                    .map_err(|_| Error::internal("short header card"))?;
                let card = Card::parse(image)?;
                if card.is_end() {
                    while cards.last().is_some_and(Card::is_blank) {
                        cards.pop();
                    }
                    return Ok(Header { cards });
                }
                cards.push(card);
            }
        }
        Err(Error::internal("FITS header has no END card"))
    }

    /// Find the first card with the given keyword name.
    pub fn find(&self, name: &str) -> Option<&Card> {
        self.cards.iter().find(|c| c.keyword_str() == name)
    }

    /// Integer value of a keyword, if present and integral.
    pub fn integer(&self, name: &str) -> Option<i64> {
        self.find(name)?.value.as_ref()?.as_i64()
    }

    /// Float value of a keyword; integer values widen.
    pub fn float(&self, name: &str) -> Option<f64> {
        self.find(name)?.value.as_ref()?.as_f64()
    }

    /// String value of a keyword, trimmed.
    pub fn string(&self, name: &str) -> Option<&str> {
        self.find(name)?.value.as_ref()?.as_str().map(str::trim)
    }

    /// Logical value of a keyword.
    pub fn logical(&self, name: &str) -> Option<bool> {
        self.find(name)?.value.as_ref()?.as_bool()
    }

    /// Serialize the header: card images, END, space padding to a whole
    /// number of blocks.
    pub fn serialize(&self) -> Vec<u8> {
        let total_cards = self.cards.len() + 1;
        let total_bytes = total_cards.div_ceil(CARDS_PER_BLOCK) * BLOCK_SIZE;
        let mut buf = vec![HEADER_PAD_BYTE; total_bytes];
        for (i, card) in self.cards.iter().enumerate() {
            buf[i * CARD_SIZE..(i + 1) * CARD_SIZE].copy_from_slice(&card.image);
        }
        let end_at = self.cards.len() * CARD_SIZE;
        buf[end_at..end_at + CARD_SIZE].copy_from_slice(&end_card());
        buf
    }
}

/// Returns `true` if any card slot in this 2880-byte block starts the END
/// sentinel. Used while scanning a stream for the end of a header.
pub fn block_has_end(block: &[u8]) -> bool {
    debug_assert_eq!(block.len(), BLOCK_SIZE);
    (0..CARDS_PER_BLOCK).any(|slot| &block[slot * CARD_SIZE..slot * CARD_SIZE + 8] == b"END     ")
}

/// Look up `PREFIXn` style keywords (NAXIS1, ZNAXIS2, ZTILE1, ...).
pub fn indexed(header: &Header, prefix: &str, index: usize) -> Option<Value> {
    header
        .find(&format!("{prefix}{index}"))
        .and_then(|c| c.value.clone())
}
