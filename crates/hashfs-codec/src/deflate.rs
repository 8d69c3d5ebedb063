//! Raw DEFLATE compress/inflate (no zlib or gzip wrapper).

use anyhow::{Context, Result};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use std::io::{Read, Write};

use crate::COMPRESSION_LEVEL;

/// Compress with raw DEFLATE at the vault's fixed level.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(
        Vec::with_capacity(data.len() / 2 + 64),
        Compression::new(COMPRESSION_LEVEL),
    );
    encoder.write_all(data).context("deflate write")?;
    encoder.finish().context("deflate finish")
}

/// Inflate a raw DEFLATE stream.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).context("raw inflate")?;
    Ok(out)
}
