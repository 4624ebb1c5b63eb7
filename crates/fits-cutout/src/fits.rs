//! FITS container gateway: HDU discovery over any `Read + Seek` source,
//! image metadata, header conversion for tile-compressed images, and pixel
//! reads.
//!
//! Pixel buffers are returned in native byte order; the streamer converts
//! back to big-endian before writing, so compressed and uncompressed
//! transfers share one output path.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use crate::block::{padded_byte_len, BLOCK_SIZE};
use crate::card::Card;
use crate::endian::to_native;
use crate::error::{Error, Result};
use crate::header::{block_has_end, indexed, Header};
use crate::tiled::{self, TileInfo};

/// Shape of an image HDU as declared by its header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageParams {
    /// BITPIX (8, 16, 32, 64, -32, -64).
    pub bitpix: i64,
    /// Axis extents, NAXIS1 first.
    pub naxes: Vec<i64>,
}

/// What a scanned HDU turned out to be.
#[derive(Debug, Clone)]
pub enum HduKind {
    /// Primary HDU or IMAGE extension.
    Image(ImageParams),
    /// Tile-compressed image stored as a binary table (ZIMAGE = T).
    CompressedImage(TileInfo),
    /// Tables, random groups, foreign extensions: copied verbatim.
    Other,
}

#[derive(Debug)]
struct HduEntry {
    data_start: u64,
    data_len: u64,
    header: Header,
    kind: HduKind,
}

/// A FITS container opened for cutout processing.
///
/// All HDUs are scanned once at open time; `seek_hdu` then positions a
/// cursor for the per-HDU accessors and reads.
pub struct FitsFile<R> {
    reader: R,
    hdus: Vec<HduEntry>,
    current: usize,
}

impl FitsFile<BufReader<File>> {
    /// Open an on-disk FITS file.
    pub fn open(path: impl AsRef<Path>) -> Result<FitsFile<BufReader<File>>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::not_found(format!("no such file: {}", path.display()))
            } else {
                Error::internal(format!("failed to open {}: {e}", path.display()))
            }
        })?;
        FitsFile::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> FitsFile<R> {
    /// Scan a FITS byte stream (a file, or an in-memory cursor).
    pub fn from_reader(mut reader: R) -> Result<FitsFile<R>> {
        let mut hdus = Vec::new();
        let mut offset = 0u64;
        loop {
            match scan_hdu(&mut reader, offset, hdus.is_empty())? {
                Some(entry) => {
                    offset = entry.data_start + padded_byte_len(entry.data_len);
                    hdus.push(entry);
                }
                None => break,
            }
        }
        if hdus.is_empty() {
            return Err(Error::internal("empty FITS file"));
        }
        Ok(FitsFile {
            reader,
            hdus,
            current: 0,
        })
    }

    /// Number of HDUs in the container.
    pub fn hdu_count(&self) -> usize {
        self.hdus.len()
    }

    /// Position the cursor on an HDU (1-based, like the FITS convention).
    pub fn seek_hdu(&mut self, hdunum: usize) -> Result<()> {
        if hdunum == 0 || hdunum > self.hdus.len() {
            return Err(Error::internal(format!("no such HDU: {hdunum}")));
        }
        self.current = hdunum - 1;
        Ok(())
    }

    fn entry(&self) -> &HduEntry {
        &self.hdus[self.current]
    }

    /// What the current HDU is.
    pub fn kind(&self) -> &HduKind {
        &self.entry().kind
    }

    /// Returns `true` if the current HDU holds image pixels, compressed or
    /// not.
    pub fn is_image(&self) -> bool {
        !matches!(self.entry().kind, HduKind::Other)
    }

    /// Returns `true` if the current HDU is a tile-compressed image.
    pub fn is_compressed_image(&self) -> bool {
        matches!(self.entry().kind, HduKind::CompressedImage(_))
    }

    /// Image shape of the current HDU. For compressed images this reports
    /// the underlying (uncompressed) shape.
    pub fn image_params(&self) -> Result<ImageParams> {
        match &self.entry().kind {
            HduKind::Image(params) => Ok(params.clone()),
            HduKind::CompressedImage(info) => Ok(ImageParams {
                bitpix: info.zbitpix,
                naxes: info.znaxes.iter().map(|&n| n as i64).collect(),
            }),
            HduKind::Other => Err(Error::internal("current HDU is not an image")),
        }
    }

    /// The header of the current HDU, as stored.
    pub fn header(&self) -> &Header {
        &self.entry().header
    }

    /// The header of the current HDU with tile-compressed image headers
    /// normalised to plain (primary) image headers, ready for the cutout
    /// solver and rewriter.
    pub fn converted_header(&self) -> Result<Header> {
        match &self.entry().kind {
            HduKind::CompressedImage(info) => Ok(convert_compressed_header(&self.entry().header, info)),
            _ => Ok(self.entry().header.clone()),
        }
    }

    /// Byte range `[start, end)` of the current HDU's (padded) data area.
    pub fn data_block_range(&self) -> (u64, u64) {
        let e = self.entry();
        (e.data_start, e.data_start + padded_byte_len(e.data_len))
    }

    /// Read raw bytes at an absolute offset; used for verbatim block copies.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        self.reader.seek(SeekFrom::Start(offset))?;
        self.reader.read_exact(buf)?;
        Ok(())
    }

    /// Read `npix` consecutive pixels of an uncompressed image, starting at
    /// the given 1-based linear pixel index. Returns native-order bytes.
    pub fn read_pixels(&mut self, first_pixel: i64, npix: i64) -> Result<Vec<u8>> {
        let (data_start, bitpix) = match &self.entry().kind {
            HduKind::Image(params) => (self.entry().data_start, params.bitpix),
            _ => return Err(Error::internal("row reads require an uncompressed image HDU")),
        };
        let bpp = (bitpix.unsigned_abs() as usize) / 8;
        let offset = data_start + (first_pixel as u64 - 1) * bpp as u64;
        let mut buf = vec![0u8; npix as usize * bpp];
        self.reader.seek(SeekFrom::Start(offset))?;
        self.reader.read_exact(&mut buf)?;
        to_native(&mut buf, bitpix);
        Ok(buf)
    }

    /// Read the inclusive one-based pixel window `first..=last` of a
    /// tile-compressed image, decompressing each covering tile exactly once.
    /// Returns native-order bytes at the uncompressed bit depth.
    pub fn read_compressed_window(&mut self, first: [i64; 2], last: [i64; 2]) -> Result<Vec<u8>> {
        let entry = &self.hdus[self.current];
        let info = match &entry.kind {
            HduKind::CompressedImage(info) => info,
            _ => return Err(Error::internal("window reads require a compressed image HDU")),
        };
        tiled::read_window(&mut self.reader, entry.data_start, info, first, last)
    }
}

/// Scan one HDU starting at `offset`. Returns `None` at a clean end of file.
fn scan_hdu<R: Read + Seek>(
    reader: &mut R,
    offset: u64,
    is_primary: bool,
) -> Result<Option<HduEntry>> {
    reader.seek(SeekFrom::Start(offset))?;

    let mut raw = Vec::new();
    let mut block = [0u8; BLOCK_SIZE];
    loop {
        match read_block(reader, &mut block)? {
            0 if raw.is_empty() => return Ok(None),
            0 => return Err(Error::internal("premature end of FITS header")),
            n if n < BLOCK_SIZE => {
                return Err(Error::internal("FITS file is not a multiple of 2880 bytes"))
            }
            _ => {}
        }
        raw.extend_from_slice(&block);
        if block_has_end(&block) {
            break;
        }
    }

    let header = Header::parse(&raw)?;
    let leading = header
        .cards
        .first()
        .map(|c| c.keyword_str().to_string())
        .unwrap_or_default();
    if is_primary && leading != "SIMPLE" {
        return Err(Error::internal("not a FITS file: missing SIMPLE card"));
    }
    if !is_primary && leading != "XTENSION" {
        return Err(Error::internal("malformed FITS extension header"));
    }

    let kind = classify(&header, is_primary)?;
    let data_len = data_byte_len(&header, is_primary)?;
    Ok(Some(HduEntry {
        data_start: offset + raw.len() as u64,
        data_len,
        header,
        kind,
    }))
}

/// Read up to one full block, tolerating a clean EOF at a block boundary.
fn read_block<R: Read>(reader: &mut R, block: &mut [u8; BLOCK_SIZE]) -> Result<usize> {
    let mut filled = 0;
    while filled < BLOCK_SIZE {
        let n = reader.read(&mut block[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn classify(header: &Header, is_primary: bool) -> Result<HduKind> {
    if is_primary {
        let params = image_params_from(header)?;
        // Random groups (NAXIS1 = 0, GROUPS = T) are passed through.
        if params.naxes.first() == Some(&0) && header.logical("GROUPS") == Some(true) {
            return Ok(HduKind::Other);
        }
        return Ok(HduKind::Image(params));
    }
    match header.string("XTENSION").unwrap_or_default() {
        "IMAGE" => Ok(HduKind::Image(image_params_from(header)?)),
        "BINTABLE" if header.logical("ZIMAGE") == Some(true) => {
            Ok(HduKind::CompressedImage(TileInfo::from_header(header)?))
        }
        _ => Ok(HduKind::Other),
    }
}

fn image_params_from(header: &Header) -> Result<ImageParams> {
    let bitpix = header
        .integer("BITPIX")
        .ok_or_else(|| Error::internal("header missing BITPIX"))?;
    let naxis = header
        .integer("NAXIS")
        .ok_or_else(|| Error::internal("header missing NAXIS"))? as usize;
    let mut naxes = Vec::with_capacity(naxis);
    for i in 1..=naxis {
        let n = indexed(header, "NAXIS", i)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| Error::internal("header missing NAXISn"))?;
        naxes.push(n);
    }
    Ok(ImageParams { bitpix, naxes })
}

/// Unpadded data-area length implied by a header.
fn data_byte_len(header: &Header, is_primary: bool) -> Result<u64> {
    let overflow = || Error::internal("data size overflow");
    let bitpix = header
        .integer("BITPIX")
        .ok_or_else(|| Error::internal("header missing BITPIX"))?;
    let naxis = header
        .integer("NAXIS")
        .ok_or_else(|| Error::internal("header missing NAXIS"))? as usize;
    if naxis == 0 {
        return Ok(0);
    }
    let bytes_per_value = bitpix.unsigned_abs() / 8;

    let mut dims = Vec::with_capacity(naxis);
    for i in 1..=naxis {
        let dim = indexed(header, "NAXIS", i)
            .and_then(|v| v.as_i64())
            .ok_or_else(|| Error::internal("header missing NAXISn"))? as u64;
        dims.push(dim);
    }

    // Random groups: data = bytes * GCOUNT * (PCOUNT + NAXIS2 * ... * NAXISm)
    if is_primary && dims[0] == 0 && header.logical("GROUPS") == Some(true) {
        let pcount = header.integer("PCOUNT").unwrap_or(0) as u64;
        let gcount = header.integer("GCOUNT").unwrap_or(1) as u64;
        let product = dims[1..]
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(d))
            .ok_or_else(overflow)?;
        return pcount
            .checked_add(product)
            .and_then(|group| group.checked_mul(gcount))
            .and_then(|v| v.checked_mul(bytes_per_value))
            .ok_or_else(overflow);
    }

    let pixels = dims
        .iter()
        .try_fold(1u64, |acc, &d| acc.checked_mul(d))
        .ok_or_else(overflow)?;
    let pcount = if is_primary {
        0
    } else {
        header.integer("PCOUNT").unwrap_or(0) as u64
    };
    let gcount = if is_primary {
        1
    } else {
        header.integer("GCOUNT").unwrap_or(1).max(1) as u64
    };

    pixels
        .checked_mul(bytes_per_value)
        .and_then(|v| v.checked_add(pcount))
        .and_then(|v| v.checked_mul(gcount))
        .ok_or_else(overflow)
}

/// The two citation comments cfitsio adds to converted primary headers.
pub(crate) const CITATION_COMMENTS: [&str; 2] = [
    "  FITS (Flexible Image Transport System) format is defined in 'Astronomy",
    "  and Astrophysics', volume 376, page 359; bibcode: 2001A&A...376..359H",
];

/// Rebuild a tile-compressed binary table header as the header of the plain
/// primary image it encodes, the way `fits_convert_hdr2str` does: mandatory
/// image keywords synthesized from the Z-keywords, table structure and
/// compression bookkeeping dropped, everything else copied.
fn convert_compressed_header(header: &Header, info: &TileInfo) -> Header {
    let mut cards = Vec::with_capacity(header.cards.len());
    cards.push(Card::logical(
        b"SIMPLE",
        true,
        Some("file does conform to FITS standard"),
    ));
    cards.push(Card::integer(
        b"BITPIX",
        info.zbitpix,
        Some("number of bits per data pixel"),
    ));
    cards.push(Card::integer(
        b"NAXIS",
        info.znaxes.len() as i64,
        Some("number of data axes"),
    ));
    for (i, &n) in info.znaxes.iter().enumerate() {
        let name = format!("NAXIS{}", i + 1);
        cards.push(Card::integer(
            name.as_bytes(),
            n as i64,
            Some("length of data axis"),
        ));
    }
    cards.push(Card::logical(
        b"EXTEND",
        true,
        Some("FITS dataset may contain extensions"),
    ));
    for text in CITATION_COMMENTS {
        cards.push(Card {
            keyword: crate::card::kw(b"COMMENT"),
            value: None,
            comment: Some(String::from(text)),
            image: crate::card::render(&crate::card::kw(b"COMMENT"), None, Some(text)),
        });
    }
    for card in &header.cards {
        if !is_compression_bookkeeping(card) {
            cards.push(card.clone());
        }
    }
    Header { cards }
}

/// Cards that describe the binary-table container or the compression itself
/// rather than the image, and so must not survive header conversion.
fn is_compression_bookkeeping(card: &Card) -> bool {
    let name = card.keyword_str();
    match name {
        "XTENSION" | "SIMPLE" | "BITPIX" | "NAXIS" | "PCOUNT" | "GCOUNT" | "TFIELDS"
        | "EXTEND" | "ZIMAGE" | "ZSIMPLE" | "ZTENSION" | "ZBITPIX" | "ZCMPTYPE" | "ZMASKCMP"
        | "ZQUANTIZ" | "ZEXTEND" | "ZPCOUNT" | "ZGCOUNT" | "ZDITHER0" | "ZBLANK" | "ZHECKSUM"
        | "ZDATASUM" => return true,
        _ => {}
    }
    for prefix in ["NAXIS", "ZNAXIS", "ZTILE", "ZNAME", "ZVAL", "TTYPE", "TFORM", "TUNIT",
        "TSCAL", "TZERO", "TNULL", "TDIM"]
    {
        if let Some(rest) = name.strip_prefix(prefix) {
            if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
                return true;
            }
        }
    }
    name == "EXTNAME" && card.value.as_ref().and_then(|v| v.as_str()) == Some("COMPRESSED_IMAGE")
}
