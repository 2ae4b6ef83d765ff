// rask: Incremental Task Runner
//
// SPDX-FileCopyrightText: 2026 Romeo Ahmed
// SPDX-License-Identifier: GPL-3.0-or-later

//! Content hashing for cache entries.
//!
//! A single SHA-1 pass everywhere: file contents are streamed through a
//! fixed 4 KiB buffer, directory listings hash their sorted child paths
//! behind a `d/` marker so an empty directory never collides with an
//! empty file. Changing any of this breaks the on-disk cache format
//! (see `cache::CACHE_FORMAT_VERSION`).

use std::io::Read;
use std::path::Path;

use anyhow::Context;
use sha1::{Digest as _, Sha1};

use crate::error::Result;

/// Buffer size for streaming file hashing.
const HASH_BUFFER_SIZE: usize = 4096;

/// Marker prefixed to directory-listing hashes ("d/").
const DIR_LISTING_MARKER: [u8; 2] = [0x44, 0x2F];

/// A content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashDigest([u8; 20]);

impl HashDigest {
    /// Returns the raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns the digest as a lowercase hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Reconstructs a digest from raw bytes, e.g. a cache entry read
    /// back from disk. Returns `None` when the length is wrong.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        <[u8; 20]>::try_from(bytes).ok().map(Self)
    }
}

impl std::fmt::Display for HashDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Hashes a string in a single pass.
#[must_use]
pub fn hash_text(text: &str) -> HashDigest {
    hash_bytes(text.as_bytes())
}

/// Hashes a byte slice in a single pass.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> HashDigest {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    HashDigest(hasher.finalize().into())
}

/// Hashes a file's contents through a fixed-size buffer.
///
/// The file is never loaded whole.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn hash_file(path: &Path) -> Result<HashDigest> {
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {} for hashing", path.display()))?;
    let mut hasher = Sha1::new();
    let mut buffer = [0u8; HASH_BUFFER_SIZE];
    loop {
        let read = file
            .read(&mut buffer)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(HashDigest(hasher.finalize().into()))
}

/// Hashes a directory listing structurally.
///
/// Child paths are sorted lexicographically and joined with `\n`; the
/// `d/` marker keeps an empty listing distinct from an empty file.
#[must_use]
pub fn hash_dir_listing<I, S>(children: I) -> HashDigest
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut paths: Vec<String> = children
        .into_iter()
        .map(|c| c.as_ref().to_string())
        .collect();
    paths.sort_unstable();

    let mut hasher = Sha1::new();
    hasher.update(DIR_LISTING_MARKER);
    hasher.update(paths.join("\n").as_bytes());
    HashDigest(hasher.finalize().into())
}
