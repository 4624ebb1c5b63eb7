//! Header rewriter: copies the cards of an input image unit to a sink,
//! substituting the handful of keywords whose values change when the pixel
//! grid is windowed.
//!
//! | Keyword | Action |
//! |---------|--------|
//! | `NAXIS1`/`NAXIS2` | replaced with the cutout extent |
//! | `LTV1`/`LTV2` | shifted by the window origin |
//! | `CRPIXn`, `CRPIXnA`..`CRPIXnZ` | shifted by the window origin |
//! | `CHECKSUM`/`DATASUM` | dropped, values would be stale |
//! | everything else | copied byte-for-byte |
//!
//! A tile-compressed source arrives here as a converted primary-image
//! header; it is materialised as an IMAGE extension instead (XTENSION
//! marker, no EXTEND or citation comments, canonical PCOUNT/GCOUNT).

use crate::block::{padding_len, CARD_SIZE, HEADER_PAD_BYTE};
use crate::card::Card;
use crate::cutbox::PixBox;
use crate::error::{Error, Result};
use crate::header::Header;
use crate::sink::Sink;
use crate::value::Value;

/// Write the END token and pad the header to the next block boundary.
pub(crate) fn end_header<S: Sink>(
    sink: &mut S,
    num_bytes: &mut u64,
    write_end_token: bool,
) -> Result<()> {
    if write_end_token {
        sink.write(b"END")?;
        *num_bytes += 3;
    }
    let pad = padding_len(*num_bytes);
    if pad > 0 {
        sink.write(&vec![HEADER_PAD_BYTE; pad])?;
        *num_bytes += pad as u64;
    }
    Ok(())
}

fn write_card<S: Sink>(sink: &mut S, num_bytes: &mut u64, image: &[u8; CARD_SIZE]) -> Result<()> {
    sink.write(image)?;
    *num_bytes += CARD_SIZE as u64;
    Ok(())
}

/// Which axis (0 or 1) a `CRPIXn`/`CRPIXnA..Z` keyword refers to, if any.
fn crpix_axis(keyword: &[u8; 8]) -> Option<usize> {
    if &keyword[..5] != b"CRPIX" {
        return None;
    }
    let axis = match keyword[5] {
        b'1' => 0,
        b'2' => 1,
        _ => return None,
    };
    match keyword[6] {
        b' ' => Some(axis),
        b'A'..=b'Z' if keyword[7] == b' ' => Some(axis),
        _ => None,
    }
}

fn float_of(card: &Card) -> Result<f64> {
    card.value
        .as_ref()
        .and_then(Value::as_f64)
        .ok_or_else(|| {
            Error::internal(format!(
                "header card {} has no numeric value",
                card.keyword_str()
            ))
        })
}

/// Copy an image unit's header cards to the sink, rewriting the window
/// geometry, then emit END and pad.
///
/// `compressed_source` marks input that was a tile-compressed image: its
/// converted primary header is turned into an IMAGE extension header on the
/// way through.
pub fn write_subimage_header<S: Sink>(
    header: &Header,
    cutout: &PixBox,
    compressed_source: bool,
    sink: &mut S,
    num_bytes: &mut u64,
) -> Result<()> {
    let mut cards = header.cards.as_slice();
    if compressed_source {
        // The converted header leads with SIMPLE; the output unit is an
        // extension.
        let xtension = Card::string(b"XTENSION", "IMAGE   ", Some("IMAGE extension"));
        write_card(sink, num_bytes, &xtension.image)?;
        cards = &cards[1..];
    }

    for card in cards {
        if compressed_source && skipped_in_materialisation(card) {
            continue;
        }
        let name = card.keyword_str();
        if name == "CHECKSUM" || name == "DATASUM" {
            continue;
        }

        if name == "NAXIS1" || name == "NAXIS2" {
            let axis = (card.keyword[5] - b'1') as usize;
            let rewritten = card.with_new_value(Value::Integer(cutout.extent(axis)));
            write_card(sink, num_bytes, &rewritten.image)?;
            if compressed_source && axis == 1 {
                // PCOUNT and GCOUNT were dropped from the input stream; the
                // materialised extension needs canonical values right here.
                let pcount =
                    Card::integer(b"PCOUNT", 0, Some("number of random group parameters"));
                let gcount = Card::integer(b"GCOUNT", 1, Some("number of random groups"));
                write_card(sink, num_bytes, &pcount.image)?;
                write_card(sink, num_bytes, &gcount.image)?;
            }
        } else if name == "LTV1" || name == "LTV2" {
            let axis = (card.keyword[3] - b'1') as usize;
            let ltv = float_of(card)? + (cutout.min(axis) - 1) as f64;
            let rewritten = card.with_new_value(Value::Float(ltv));
            write_card(sink, num_bytes, &rewritten.image)?;
        } else if let Some(axis) = crpix_axis(&card.keyword) {
            let crpix = float_of(card)? + (1 - cutout.min(axis)) as f64;
            let rewritten = card.with_new_value(Value::Float(crpix));
            write_card(sink, num_bytes, &rewritten.image)?;
        } else {
            write_card(sink, num_bytes, &card.image)?;
        }
    }

    end_header(sink, num_bytes, true)
}

/// Cards dropped when a converted compressed-image header becomes an IMAGE
/// extension: EXTEND, the standard citation comments, and the PCOUNT/GCOUNT
/// pair that is re-synthesised after NAXIS2.
fn skipped_in_materialisation(card: &Card) -> bool {
    let name = card.keyword_str();
    if name == "EXTEND" || name == "PCOUNT" || name == "GCOUNT" {
        return true;
    }
    card.image
        .starts_with(b"COMMENT   FITS (Flexible Image Transport System) format is")
        || card
            .image
            .starts_with(b"COMMENT   and Astrophysics', volume 376, page 3")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BLOCK_SIZE;
    use crate::fits::CITATION_COMMENTS;
    use crate::header::Header;
    use crate::sink::MemorySink;

    fn rewrite(header: &Header, cutout: &PixBox, compressed: bool) -> Vec<u8> {
        let mut sink = MemorySink::new();
        let mut num_bytes = 0u64;
        write_subimage_header(header, cutout, compressed, &mut sink, &mut num_bytes).unwrap();
        assert_eq!(num_bytes, sink.bytes_written());
        sink.into_content()
    }

    fn sample_box() -> PixBox {
        PixBox {
            xmin: 11,
            ymin: 21,
            xmax: 40,
            ymax: 60,
        }
    }

    fn sample_header() -> Header {
        Header {
            cards: vec![
                Card::logical(b"SIMPLE", true, None),
                Card::integer(b"BITPIX", 16, None),
                Card::integer(b"NAXIS", 2, None),
                Card::integer(b"NAXIS1", 100, None),
                Card::integer(b"NAXIS2", 200, None),
                Card::float(b"CRPIX1", 50.5, Some("reference pixel")),
                Card::float(b"CRPIX2", 100.5, None),
                Card::float(b"CRPIX1A", 7.0, None),
                Card::float(b"LTV1", 0.0, None),
                Card::float(b"LTV2", -3.0, None),
                Card::string(b"CHECKSUM", "ABCDEFGH", None),
                Card::string(b"DATASUM", "12345", None),
                Card::string(b"OBJECT", "M31", Some("target")),
            ],
        }
    }

    #[test]
    fn output_is_block_aligned_with_end() {
        let out = rewrite(&sample_header(), &sample_box(), false);
        assert_eq!(out.len() % BLOCK_SIZE, 0);
        let parsed = Header::parse(&out).unwrap();
        assert!(parsed.find("OBJECT").is_some());
    }

    #[test]
    fn naxis_cards_take_window_extents() {
        let out = rewrite(&sample_header(), &sample_box(), false);
        let h = Header::parse(&out).unwrap();
        assert_eq!(h.integer("NAXIS1"), Some(30));
        assert_eq!(h.integer("NAXIS2"), Some(40));
    }

    #[test]
    fn crpix_shifts_by_window_origin() {
        let out = rewrite(&sample_header(), &sample_box(), false);
        let h = Header::parse(&out).unwrap();
        assert_eq!(h.float("CRPIX1"), Some(50.5 + 1.0 - 11.0));
        assert_eq!(h.float("CRPIX2"), Some(100.5 + 1.0 - 21.0));
        // Alternate WCS reference pixels shift too.
        assert_eq!(h.float("CRPIX1A"), Some(7.0 + 1.0 - 11.0));
    }

    #[test]
    fn ltv_shifts_by_window_origin() {
        let out = rewrite(&sample_header(), &sample_box(), false);
        let h = Header::parse(&out).unwrap();
        assert_eq!(h.float("LTV1"), Some(10.0));
        assert_eq!(h.float("LTV2"), Some(-3.0 + 20.0));
    }

    #[test]
    fn checksums_are_dropped() {
        let out = rewrite(&sample_header(), &sample_box(), false);
        let h = Header::parse(&out).unwrap();
        assert!(h.find("CHECKSUM").is_none());
        assert!(h.find("DATASUM").is_none());
    }

    #[test]
    fn untouched_cards_are_byte_identical() {
        let header = sample_header();
        let out = rewrite(&header, &sample_box(), false);
        let object = header.find("OBJECT").unwrap();
        assert!(out
            .chunks_exact(CARD_SIZE)
            .any(|c| c == object.image));
    }

    #[test]
    fn crpix_like_keywords_left_alone() {
        let header = Header {
            cards: vec![
                Card::logical(b"SIMPLE", true, None),
                Card::float(b"CRPIX3", 9.0, None),
                Card::float(b"CRPIX1AB", 9.0, None),
            ],
        };
        let out = rewrite(&header, &sample_box(), false);
        let h = Header::parse(&out).unwrap();
        assert_eq!(h.float("CRPIX3"), Some(9.0));
        assert_eq!(h.float("CRPIX1AB"), Some(9.0));
    }

    fn converted_compressed_header() -> Header {
        let mut cards = vec![
            Card::logical(b"SIMPLE", true, None),
            Card::integer(b"BITPIX", 16, None),
            Card::integer(b"NAXIS", 2, None),
            Card::integer(b"NAXIS1", 100, None),
            Card::integer(b"NAXIS2", 200, None),
            Card::logical(b"EXTEND", true, None),
        ];
        for text in CITATION_COMMENTS {
            cards.push(Card {
                keyword: crate::card::kw(b"COMMENT"),
                value: None,
                comment: Some(String::from(text)),
                image: crate::card::render(&crate::card::kw(b"COMMENT"), None, Some(text)),
            });
        }
        cards.push(Card::float(b"CRPIX1", 50.0, None));
        cards.push(Card::string(b"OBJECT", "M31", None));
        Header { cards }
    }

    #[test]
    fn compressed_source_materialises_extension() {
        let out = rewrite(&converted_compressed_header(), &sample_box(), true);
        let h = Header::parse(&out).unwrap();

        assert_eq!(h.cards[0].keyword_str(), "XTENSION");
        assert_eq!(h.string("XTENSION"), Some("IMAGE"));
        assert!(h.find("SIMPLE").is_none());
        assert!(h.find("EXTEND").is_none());
        assert!(!h
            .cards
            .iter()
            .any(|c| c.image.starts_with(b"COMMENT   FITS (Flexible")));

        // Exactly one PCOUNT and one GCOUNT, right after NAXIS2.
        let keywords: Vec<&str> = h.cards.iter().map(Card::keyword_str).collect();
        let naxis2 = keywords.iter().position(|&k| k == "NAXIS2").unwrap();
        assert_eq!(keywords[naxis2 + 1], "PCOUNT");
        assert_eq!(keywords[naxis2 + 2], "GCOUNT");
        assert_eq!(keywords.iter().filter(|&&k| k == "PCOUNT").count(), 1);
        assert_eq!(keywords.iter().filter(|&&k| k == "GCOUNT").count(), 1);
        assert_eq!(h.integer("PCOUNT"), Some(0));
        assert_eq!(h.integer("GCOUNT"), Some(1));
    }

    #[test]
    fn malformed_crpix_value_is_internal_error() {
        let header = Header {
            cards: vec![Card::string(b"CRPIX1", "oops", None)],
        };
        let mut sink = MemorySink::new();
        let mut n = 0u64;
        assert!(write_subimage_header(&header, &sample_box(), false, &mut sink, &mut n).is_err());
    }
}
