//! Schema integrity stamping

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};
use sf_math::{Integrity, RgsMathSchema};

/// Digest algorithm recorded in the integrity block
pub const ALGORITHM: &str = "sha256";

/// Hex SHA-256 of the schema's canonical JSON (integrity cleared)
pub fn content_hash(schema: &RgsMathSchema) -> Result<String> {
    let canonical = schema
        .canonical_json()
        .context("Failed to serialize schema for hashing")?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Fill the integrity block with hash, algorithm and timestamp
pub fn seal(mut schema: RgsMathSchema) -> Result<RgsMathSchema> {
    let hash = content_hash(&schema)?;
    schema.integrity = Integrity {
        content_hash: Some(hash),
        algorithm: Some(ALGORITHM.to_string()),
        certified_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)),
    };
    Ok(schema)
}

/// Recompute the hash of a sealed schema and compare
pub fn verify(schema: &RgsMathSchema) -> Result<bool> {
    match &schema.integrity.content_hash {
        Some(stored) => Ok(*stored == content_hash(schema)?),
        None => Ok(false),
    }
}
