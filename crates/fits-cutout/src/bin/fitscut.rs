//! Command-line host for the cutout core.
//!
//! Buffers the cutout in memory (so a Content-Length is known), optionally
//! gzip-wrapped, and writes it to a file or stdout. With `--http` the output
//! is a complete HTTP/1.1 response and errors are rendered as error-response
//! documents, matching what a CGI host would emit.

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use fits_cutout::response::write_error_response;
use fits_cutout::sink::{GzipSink, MemorySink, Sink};
use fits_cutout::{parse_bool, parse_coords, stream_subimage_path, Units};

#[derive(Parser)]
#[command(version, about = "Stream a FITS image cutout")]
struct Args {
    /// FITS file to cut from.
    path: PathBuf,

    /// Cutout center: "<ra>,<dec>[ unit]", degrees by default.
    #[arg(long)]
    center: String,

    /// Cutout size: "<w>[,<h>][ unit]", degrees by default; a single value
    /// makes a square window.
    #[arg(long)]
    size: String,

    /// Gzip the output stream (1/0/y/n/t/f/on/off/true/false/yes/no).
    #[arg(long, default_value = "false")]
    gzip: String,

    /// Write the cutout here instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Emit a complete HTTP/1.1 response (headers, then body).
    #[arg(long)]
    http: bool,
}

fn run(args: &Args) -> fits_cutout::Result<(Vec<u8>, bool)> {
    let center = parse_coords("center", &args.center, Units::Deg, true)?;
    let size = parse_coords("size", &args.size, Units::Deg, false)?;
    let gzip = parse_bool("gzip", &args.gzip)?;

    let content = if gzip {
        let mut sink = GzipSink::new(MemorySink::new());
        stream_subimage_path(&args.path, center, size, &mut sink)?;
        sink.finish()?;
        sink.into_inner()?.into_content()
    } else {
        let mut sink = MemorySink::new();
        stream_subimage_path(&args.path, center, size, &mut sink)?;
        sink.finish()?;
        sink.into_content()
    };
    Ok((content, gzip))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    if args.http {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        match run(&args) {
            Ok((content, gzip)) => {
                let mime = if gzip {
                    "application/gzip"
                } else {
                    "application/fits"
                };
                write!(
                    out,
                    "HTTP/1.1 200 OK\r\nContent-Type: {mime}\r\n\
                     Content-Length: {}\r\nCache-Control: no-cache\r\n\r\n",
                    content.len()
                )?;
                out.write_all(&content)?;
            }
            Err(e) => {
                let mut sink = MemorySink::new();
                write_error_response(&mut sink, "HTTP/1.1", &e)
                    .context("rendering error response")?;
                out.write_all(sink.content())?;
            }
        }
        return Ok(());
    }

    let (content, _) = run(&args)?;
    match &args.output {
        Some(path) => std::fs::write(path, &content)
            .with_context(|| format!("writing {}", path.display()))?,
        None => io::stdout().write_all(&content)?,
    }
    Ok(())
}
