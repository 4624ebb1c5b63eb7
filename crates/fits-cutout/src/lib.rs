//! Streaming FITS image cutout core.
//!
//! Given a FITS file, a celestial (or pixel) center, and a window size,
//! [`stream_subimage`] emits a new standards-conformant FITS stream holding
//! only the pixels the window covers, with the coordinate-system metadata
//! rewritten so the output stays self-describing. Output goes to a
//! composable [`sink::Sink`]; wrap the transport sink in a
//! [`sink::GzipSink`] for compressed responses.
//!
//! Request-style parameters are parsed with [`coords::parse_coords`] and
//! [`coords::parse_bool`]; errors carry HTTP-style classes and can be
//! rendered with [`response::write_error_response`].
#![warn(missing_docs)]

/// FITS 2880-byte block utilities and constants.
pub mod block;
/// Header card parsing and serialization.
pub mod card;
/// Coordinate-pair and boolean request-parameter parsing.
pub mod coords;
/// Pixel-box solver: center + size to a clipped pixel rectangle.
pub mod cutbox;
/// Big-endian byte conversion for FITS pixel data.
pub mod endian;
/// Error taxonomy used throughout the crate.
pub mod error;
/// FITS container gateway: HDU scanning and pixel reads.
pub mod fits;
/// Header-block scanning and typed keyword lookup.
pub mod header;
/// Error-response emission.
pub mod response;
/// Header rewriting for windowed image units.
pub mod rewrite;
/// Byte sinks: memory, HTTP chunked framing, streaming gzip.
pub mod sink;
/// The cutout pipeline.
pub mod stream;
/// Windowed reads from tile-compressed images.
pub mod tiled;
/// FITS header value representation.
pub mod value;
/// Thin adapter over the WCS projection library.
pub mod wcs;

#[cfg(test)]
pub(crate) mod testutil;

pub use coords::{parse_bool, parse_coords, Coords, Units};
pub use error::{Error, ErrorClass, Result};
pub use stream::{stream_subimage, stream_subimage_path};
