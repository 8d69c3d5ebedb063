//! hashfs-codec: compression and archive codecs
//!
//! Stored payloads are raw-DEFLATE compressed before encryption; vault
//! export/import travels as ordinary ZIP archives.

pub mod deflate;
pub mod zip;

pub use deflate::{compress, inflate};
pub use zip::{zip_pack, zip_unpack};

/// DEFLATE level used for stored payloads and ZIP entries
pub const COMPRESSION_LEVEL: u32 = 6;
