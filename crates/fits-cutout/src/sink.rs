//! Byte sinks: the single write/finish contract the cutout streamer writes
//! through, with in-memory, HTTP-chunked, and gzip-compressing variants.
//!
//! Sinks compose: a [`GzipSink`] owns any inner sink, so streaming →
//! gzip → chunked is a legal stack. No sink knows its downstream framing.

use std::io::{self, Write};

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{Error, Result};

/// Destination for the cutout byte stream.
pub trait Sink {
    /// Append bytes to the stream.
    fn write(&mut self, buf: &[u8]) -> Result<()>;

    /// Signal end-of-stream, flushing anything buffered.
    fn finish(&mut self) -> Result<()>;

    /// Total bytes accepted by `write` so far.
    fn bytes_written(&self) -> u64;
}

// ---------------------------------------------------------------------------
// Memory sink
// ---------------------------------------------------------------------------

/// A sink that buffers everything in memory, for hosts that need the total
/// content length before sending.
#[derive(Debug, Default)]
pub struct MemorySink {
    content: Vec<u8>,
}

impl MemorySink {
    /// An empty memory sink.
    pub fn new() -> MemorySink {
        MemorySink::default()
    }

    /// The buffered content.
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Consume the sink, returning the buffered content.
    pub fn into_content(self) -> Vec<u8> {
        self.content
    }
}

impl Sink for MemorySink {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        if self.content.len().checked_add(buf.len()).is_none() {
            return Err(Error::internal("too much data to buffer in memory"));
        }
        self.content
            .try_reserve(buf.len())
            .map_err(|_| Error::internal("memory allocation failed"))?;
        self.content.extend_from_slice(buf);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.content.len() as u64
    }
}

// ---------------------------------------------------------------------------
// Chunked sink
// ---------------------------------------------------------------------------

/// A sink that frames each write as an HTTP/1.1 chunk: the length in hex,
/// CRLF, the bytes, CRLF. `finish` emits the zero-length final chunk.
#[derive(Debug)]
pub struct ChunkedSink<W: Write> {
    out: W,
    written: u64,
}

impl<W: Write> ChunkedSink<W> {
    /// Wrap a raw byte writer (typically the connection to the client).
    pub fn new(out: W) -> ChunkedSink<W> {
        ChunkedSink { out, written: 0 }
    }

    /// Consume the sink, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Sink for ChunkedSink<W> {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        if buf.is_empty() {
            // A zero-length chunk would terminate the stream early.
            return Ok(());
        }
        write!(self.out, "{:X}\r\n", buf.len())?;
        self.out.write_all(buf)?;
        self.out.write_all(b"\r\n")?;
        self.written += buf.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.write_all(b"0\r\n\r\n")?;
        self.out.flush()?;
        Ok(())
    }

    fn bytes_written(&self) -> u64 {
        self.written
    }
}

// ---------------------------------------------------------------------------
// Gzip sink
// ---------------------------------------------------------------------------

/// Default size of the compressed chunks handed to the inner sink.
pub const GZIP_CHUNK_SIZE: usize = 8 * 1024;

/// A sink that gzip-compresses (RFC 1952) everything written to it and
/// forwards the compressed stream to an owned inner sink in fixed-size
/// chunks.
///
/// The deflate level is fixed at 1: cutout responses are dominated by pixel
/// data that barely compresses, so throughput wins over ratio.
pub struct GzipSink<S: Sink> {
    encoder: GzEncoder<ChunkForward<S>>,
    accepted: u64,
}

impl<S: Sink> GzipSink<S> {
    /// Compress into `inner` with the default chunk size.
    pub fn new(inner: S) -> GzipSink<S> {
        GzipSink::with_chunk_size(inner, GZIP_CHUNK_SIZE)
    }

    /// Compress into `inner`, forwarding `chunk_size`-byte pieces.
    pub fn with_chunk_size(inner: S, chunk_size: usize) -> GzipSink<S> {
        assert!(chunk_size > 0, "chunk size must be positive");
        GzipSink {
            encoder: GzEncoder::new(
                ChunkForward {
                    sink: inner,
                    buf: Vec::with_capacity(chunk_size),
                    chunk_size,
                    error: None,
                },
                Compression::new(1),
            ),
            accepted: 0,
        }
    }

    /// Consume the sink after [`Sink::finish`], returning the inner sink.
    pub fn into_inner(self) -> Result<S> {
        let forward = self
            .encoder
            .finish()
            .map_err(|e| Error::internal(format!("deflate stream error: {e}")))?;
        Ok(forward.sink)
    }

    fn sink_error(&mut self, io: io::Error) -> Error {
        self.encoder
            .get_mut()
            .error
            .take()
            .unwrap_or_else(|| Error::internal(format!("deflate stream error: {io}")))
    }
}

impl<S: Sink> Sink for GzipSink<S> {
    fn write(&mut self, buf: &[u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.encoder.write_all(buf) {
            return Err(self.sink_error(e));
        }
        self.accepted += buf.len() as u64;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        // Drain the deflate state, emit the trailer, then hand leftovers and
        // the finish signal to the inner sink.
        if let Err(e) = self.encoder.try_finish() {
            return Err(self.sink_error(e));
        }
        let forward = self.encoder.get_mut();
        forward.flush_remaining()?;
        forward.sink.finish()
    }

    fn bytes_written(&self) -> u64 {
        self.accepted
    }
}

/// `io::Write` adapter that slices the compressed stream into fixed-size
/// chunks for the inner sink, stashing any sink error so it can be rethrown
/// with its original class and message.
struct ChunkForward<S: Sink> {
    sink: S,
    buf: Vec<u8>,
    chunk_size: usize,
    error: Option<Error>,
}

impl<S: Sink> ChunkForward<S> {
    fn push(&mut self, data: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(data);
        while self.buf.len() >= self.chunk_size {
            let rest = self.buf.split_off(self.chunk_size);
            self.sink.write(&self.buf)?;
            self.buf = rest;
        }
        Ok(())
    }

    fn flush_remaining(&mut self) -> Result<()> {
        if !self.buf.is_empty() {
            let buf = std::mem::take(&mut self.buf);
            self.sink.write(&buf)?;
        }
        Ok(())
    }
}

impl<S: Sink> Write for ChunkForward<S> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        match self.push(data) {
            Ok(()) => Ok(data.len()),
            Err(e) => {
                self.error = Some(e);
                Err(io::Error::other("inner sink failed"))
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
