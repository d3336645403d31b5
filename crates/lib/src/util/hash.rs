//! Hashing helpers for stable, content-derived file names.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `data`, truncated to `len` characters.
pub fn hash_prefix(data: &[u8], len: usize) -> String {
  let digest = Sha256::digest(data);
  let full = hex::encode(digest);
  full[..len.min(full.len())].to_string()
}
