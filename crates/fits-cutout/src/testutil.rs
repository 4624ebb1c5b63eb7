//! Shared fixtures for unit tests.

use crate::card::Card;
use crate::header::Header;

/// A TAN-projection image header centred at `(ra, dec)` degrees with `scale`
/// degrees per pixel and the reference pixel at the image center.
pub(crate) fn tan_header(naxis1: i64, naxis2: i64, ra: f64, dec: f64, scale: f64) -> Header {
    Header {
        cards: vec![
            Card::logical(b"SIMPLE", true, None),
            Card::integer(b"BITPIX", 8, None),
            Card::integer(b"NAXIS", 2, None),
            Card::integer(b"NAXIS1", naxis1, None),
            Card::integer(b"NAXIS2", naxis2, None),
            Card::string(b"CTYPE1", "RA---TAN", None),
            Card::string(b"CTYPE2", "DEC--TAN", None),
            Card::float(b"CRPIX1", (naxis1 as f64 + 1.0) / 2.0, None),
            Card::float(b"CRPIX2", (naxis2 as f64 + 1.0) / 2.0, None),
            Card::float(b"CRVAL1", ra, None),
            Card::float(b"CRVAL2", dec, None),
            Card::float(b"CD1_1", -scale, None),
            Card::float(b"CD1_2", 0.0, None),
            Card::float(b"CD2_1", 0.0, None),
            Card::float(b"CD2_2", scale, None),
        ],
    }
}
