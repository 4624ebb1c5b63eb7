//! The cutout pipeline: walk the HDUs of a FITS container, window each image
//! unit, and stream a standards-conformant subimage to a sink.
//!
//! Non-image and data-less units are copied through unchanged; image units
//! are windowed via the pixel-box solver, their headers rewritten, and their
//! pixels re-emitted in big-endian order, zero-padded to whole blocks.

use std::io::{Read, Seek};
use std::path::Path;

use tracing::debug;

use crate::block::{padding_len, BLOCK_SIZE, DATA_PAD_BYTE};
use crate::coords::Coords;
use crate::cutbox::cutout_pixel_box;
use crate::endian::to_big_endian;
use crate::error::{Error, Result};
use crate::fits::FitsFile;
use crate::rewrite::write_subimage_header;
use crate::sink::Sink;

/// Stream a cutout of the FITS file at `path` to `sink`.
pub fn stream_subimage_path<S: Sink>(
    path: impl AsRef<Path>,
    center: Coords,
    size: Coords,
    sink: &mut S,
) -> Result<()> {
    let mut file = FitsFile::open(path)?;
    stream_subimage(&mut file, center, size, sink)
}

/// Stream a cutout of an opened FITS container to `sink`.
///
/// Every image HDU is windowed around `center` with extents `size`; an HDU
/// the window misses entirely fails the whole request. The output is one
/// valid FITS stream: bytes written are always a multiple of 2880.
pub fn stream_subimage<R: Read + Seek, S: Sink>(
    file: &mut FitsFile<R>,
    center: Coords,
    size: Coords,
    sink: &mut S,
) -> Result<()> {
    let mut num_bytes = 0u64;

    for hdunum in 1..=file.hdu_count() {
        file.seek_hdu(hdunum)?;

        if !file.is_image() {
            debug!(hdunum, "copying non-image HDU verbatim");
            copy_header(file, sink, &mut num_bytes)?;
            copy_data(file, sink, &mut num_bytes)?;
            continue;
        }

        let params = file.image_params()?;
        if params.naxes.is_empty() {
            debug!(hdunum, "copying data-less image header");
            copy_header(file, sink, &mut num_bytes)?;
            continue;
        }
        if params.naxes.len() != 2 || params.naxes[0] <= 0 || params.naxes[1] <= 0 {
            return Err(Error::internal(
                "FITS file contains image HDU with NAXIS != 2",
            ));
        }
        if !matches!(params.bitpix, 8 | 16 | 32 | 64 | -32 | -64) {
            return Err(Error::internal("Invalid BITPIX value in image HDU"));
        }
        let naxis = [params.naxes[0], params.naxes[1]];

        let header = file.converted_header()?;
        let cutout = cutout_pixel_box(center, size, &header, naxis)?
            .ok_or_else(|| Error::internal("Cutout does not overlap image"))?;
        let compressed = file.is_compressed_image();
        debug!(
            hdunum,
            xmin = cutout.xmin,
            ymin = cutout.ymin,
            xmax = cutout.xmax,
            ymax = cutout.ymax,
            compressed,
            "streaming subimage"
        );

        write_subimage_header(&header, &cutout, compressed, sink, &mut num_bytes)?;

        if compressed {
            // One call for the whole sub-rectangle: row-by-row reads would
            // decompress every covering tile once per output row.
            let mut buf = file
                .read_compressed_window([cutout.xmin, cutout.ymin], [cutout.xmax, cutout.ymax])?;
            to_big_endian(&mut buf, params.bitpix);
            sink.write(&buf)?;
            num_bytes += buf.len() as u64;
        } else {
            let row_pixels = cutout.width();
            let mut first_pixel = cutout.xmin + naxis[0] * (cutout.ymin - 1);
            for _ in cutout.ymin..=cutout.ymax {
                let mut row = file.read_pixels(first_pixel, row_pixels)?;
                to_big_endian(&mut row, params.bitpix);
                sink.write(&row)?;
                num_bytes += row.len() as u64;
                first_pixel += naxis[0];
            }
        }

        let pad = padding_len(num_bytes);
        if pad > 0 {
            sink.write(&vec![DATA_PAD_BYTE; pad])?;
            num_bytes += pad as u64;
        }
    }

    Ok(())
}

/// Re-emit the current HDU's header cards, END, and space padding.
fn copy_header<R: Read + Seek, S: Sink>(
    file: &FitsFile<R>,
    sink: &mut S,
    num_bytes: &mut u64,
) -> Result<()> {
    let bytes = file.header().serialize();
    sink.write(&bytes)?;
    *num_bytes += bytes.len() as u64;
    Ok(())
}

/// Copy the current HDU's padded data area as raw 2880-byte blocks.
fn copy_data<R: Read + Seek, S: Sink>(
    file: &mut FitsFile<R>,
    sink: &mut S,
    num_bytes: &mut u64,
) -> Result<()> {
    let (start, end) = file.data_block_range();
    let mut block = [0u8; BLOCK_SIZE];
    let mut offset = start;
    while offset < end {
        file.read_at(offset, &mut block)?;
        sink.write(&block)?;
        *num_bytes += BLOCK_SIZE as u64;
        offset += BLOCK_SIZE as u64;
    }
    Ok(())
}
