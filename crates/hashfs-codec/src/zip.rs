//! ZIP pack/unpack for vault export and import.
//!
//! Entries are `path → bytes` with full relative paths preserved. Contents
//! round-trip binary-exact; directory entries are skipped on unpack.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
// `::` disambiguates the zip crate from this module
use ::zip::write::FileOptions;
use ::zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::COMPRESSION_LEVEL;

/// Pack entries into a ZIP archive (deflate at the vault's fixed level).
pub fn zip_pack(entries: &BTreeMap<String, Vec<u8>>) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(COMPRESSION_LEVEL as i32));

    for (path, bytes) in entries {
        writer
            .start_file(path.as_str(), options)
            .with_context(|| format!("starting zip entry: {path}"))?;
        writer
            .write_all(bytes)
            .with_context(|| format!("writing zip entry: {path}"))?;
    }

    let cursor = writer.finish().context("finalizing zip archive")?;
    Ok(cursor.into_inner())
}

/// Unpack a ZIP archive into `path → bytes`.
pub fn zip_unpack(data: &[u8]) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut archive = ZipArchive::new(Cursor::new(data)).context("opening zip archive")?;
    let mut out = BTreeMap::new();

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .with_context(|| format!("reading zip entry {i}"))?;
        if file.is_dir() {
            continue;
        }
        let name = file.name().to_string();
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)
            .with_context(|| format!("inflating zip entry: {name}"))?;
        out.insert(name, bytes);
    }

    Ok(out)
}
