//! FITS header cards: fixed-width 80-byte keyword records.
//!
//! A [`Card`] keeps both its parsed form (keyword, value, comment) and the
//! original 80-byte card image, so untouched cards can be copied to the
//! output byte-for-byte.

use core::str;

use crate::block::CARD_SIZE;
use crate::error::{Error, Result};
use crate::value::{format_value, parse_value, Value};

/// Pad a keyword name to 8 bytes with trailing ASCII spaces.
pub const fn kw(name: &[u8]) -> [u8; 8] {
    let mut buf = [b' '; 8];
    let mut i = 0;
    while i < name.len() && i < 8 {
        buf[i] = name[i];
        i += 1;
    }
    buf
}

/// A parsed FITS header card.
#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    /// The 8-byte keyword, ASCII, left-justified, space-padded.
    pub keyword: [u8; 8],
    /// The parsed value, if the card carries the `= ` value indicator.
    pub value: Option<Value>,
    /// Optional comment (or commentary text for COMMENT/HISTORY cards).
    pub comment: Option<String>,
    /// The 80-byte card image this card was parsed from or rendered to.
    pub image: [u8; CARD_SIZE],
}

impl Card {
    /// Parse a single 80-byte card image.
    pub fn parse(image: &[u8; CARD_SIZE]) -> Result<Card> {
        let mut keyword = [b' '; 8];
        keyword.copy_from_slice(&image[..8]);

        for &b in &keyword {
            match b {
                b'A'..=b'Z' | b'0'..=b'9' | b' ' | b'-' | b'_' => {}
                _ => {
                    return Err(Error::internal(format!(
                        "invalid keyword in header card: {:?}",
                        String::from_utf8_lossy(&keyword)
                    )))
                }
            }
        }

        if keyword == *b"END     " {
            return Ok(Card {
                keyword,
                value: None,
                comment: None,
                image: *image,
            });
        }

        if image[8] == b'=' && image[9] == b' ' && !is_commentary_keyword(&keyword) {
            let field = &image[10..CARD_SIZE];
            let (value, comment) = match parse_value(field) {
                Some((v, c)) => (Some(v), c.map(String::from)),
                None => (None, empty_value_comment(field)),
            };
            return Ok(Card {
                keyword,
                value,
                comment,
                image: *image,
            });
        }

        // Commentary and valueless cards: bytes 8..80 are free-form text.
        let text = str::from_utf8(&image[8..])
            .map_err(|_| Error::internal("header card is not ASCII"))?
            .trim_end();
        Ok(Card {
            keyword,
            value: None,
            comment: (!text.is_empty()).then(|| String::from(text)),
            image: *image,
        })
    }

    /// Build a card with an integer value, rendering its image.
    pub fn integer(name: &[u8], value: i64, comment: Option<&str>) -> Card {
        Card::with_value(kw(name), Value::Integer(value), comment)
    }

    /// Build a card with a float value, rendering its image.
    pub fn float(name: &[u8], value: f64, comment: Option<&str>) -> Card {
        Card::with_value(kw(name), Value::Float(value), comment)
    }

    /// Build a card with a logical value, rendering its image.
    pub fn logical(name: &[u8], value: bool, comment: Option<&str>) -> Card {
        Card::with_value(kw(name), Value::Logical(value), comment)
    }

    /// Build a card with a string value, rendering its image.
    pub fn string(name: &[u8], value: &str, comment: Option<&str>) -> Card {
        Card::with_value(kw(name), Value::String(String::from(value)), comment)
    }

    fn with_value(keyword: [u8; 8], value: Value, comment: Option<&str>) -> Card {
        let image = render(&keyword, Some(&value), comment);
        Card {
            keyword,
            value: Some(value),
            comment: comment.map(String::from),
            image,
        }
    }

    /// Return a copy of this card with a new value, re-rendering the image
    /// but keeping the keyword and comment.
    pub fn with_new_value(&self, value: Value) -> Card {
        let image = render(&self.keyword, Some(&value), self.comment.as_deref());
        Card {
            keyword: self.keyword,
            value: Some(value),
            comment: self.comment.clone(),
            image,
        }
    }

    /// The keyword as a trimmed string.
    pub fn keyword_str(&self) -> &str {
        let end = self
            .keyword
            .iter()
            .rposition(|&b| b != b' ')
            .map(|i| i + 1)
            .unwrap_or(0);
        str::from_utf8(&self.keyword[..end]).unwrap_or("")
    }

    /// Returns `true` if this is the END sentinel.
    pub fn is_end(&self) -> bool {
        self.keyword == *b"END     "
    }

    /// Returns `true` if the keyword is all spaces and the card is empty.
    pub fn is_blank(&self) -> bool {
        self.keyword == [b' '; 8] && self.value.is_none() && self.comment.is_none()
    }
}

/// Keywords whose bytes 8..80 are always free-form text.
fn is_commentary_keyword(keyword: &[u8; 8]) -> bool {
    keyword == b"COMMENT " || keyword == b"HISTORY " || keyword == b"        "
}

/// A valueless `KEY     =        / comment` card still carries its comment.
fn empty_value_comment(field: &[u8]) -> Option<String> {
    let text = str::from_utf8(field).ok()?;
    let idx = text.find(" /")?;
    let after = &text[idx + 2..];
    let comment = after.strip_prefix(' ').unwrap_or(after).trim_end();
    (!comment.is_empty()).then(|| String::from(comment))
}

/// Render a card image from its parts.
pub fn render(keyword: &[u8; 8], value: Option<&Value>, comment: Option<&str>) -> [u8; CARD_SIZE] {
    let mut buf = [b' '; CARD_SIZE];
    buf[..8].copy_from_slice(keyword);

    if let Some(value) = value {
        buf[8] = b'=';
        buf[9] = b' ';
        let mut field = format_value(value);
        if let Some(comment) = comment {
            append_comment(&mut field, comment);
        }
        buf[10..].copy_from_slice(&field);
    } else if let Some(comment) = comment {
        let bytes = comment.as_bytes();
        let len = bytes.len().min(72);
        buf[8..8 + len].copy_from_slice(&bytes[..len]);
    }
    buf
}

/// Append ` / comment` after the value content of a 70-byte field.
fn append_comment(field: &mut [u8; 70], comment: &str) {
    let content_end = if field[0] == b'\'' {
        // Scan past the closing quote, honouring doubled quotes.
        let mut i = 1;
        loop {
            match field.get(i) {
                None => break i,
                Some(&b'\'') if field.get(i + 1) == Some(&b'\'') => i += 2,
                Some(&b'\'') => break i + 1,
                Some(_) => i += 1,
            }
        }
    } else {
        20
    };

    let sep = content_end + 1;
    if sep + 3 >= 70 {
        return;
    }
    field[sep] = b'/';
    field[sep + 1] = b' ';
    let start = sep + 2;
    let len = comment.len().min(70 - start);
    field[start..start + len].copy_from_slice(&comment.as_bytes()[..len]);
}

/// The END sentinel as a full card image.
pub fn end_card() -> [u8; CARD_SIZE] {
    let mut buf = [b' '; CARD_SIZE];
    buf[..3].copy_from_slice(b"END");
    buf
}
