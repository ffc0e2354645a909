//! Gzip+JSON codec for cached crawl results.

use std::io::{Read, Write};

use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::entity::Entity;

/// Encode a crawl result as gzip-compressed JSON.
pub fn serialize_entities(entities: &[Entity]) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(entities)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Inverse of [`serialize_entities`]. Fails on corrupt or
/// schema-incompatible payloads; the cache layer treats that as a miss.
pub fn deserialize_entities(bytes: &[u8]) -> Result<Vec<Entity>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut json = Vec::new();
    decoder
        .read_to_end(&mut json)
        .context("Corrupt entity payload")?;
    serde_json::from_slice(&json).context("Incompatible entity payload")
}
