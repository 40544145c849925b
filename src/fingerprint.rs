//! The fingerprint module derives a content hash from an MP3 file that ignores its metadata. The
//! leading ID3v2 block and the trailing 128-byte ID3v1 block are cut off and only the bytes between
//! them are digested, so retagging a file never changes its hash.
//!
//! This is not a general ID3 parser. The declared ID3v2 size is decoded with plain base-128
//! multipliers and the high bit of each size byte is not masked off. Files written by producers that
//! violate the synchsafe convention get a different left bound than other tools would compute.
use crate::error::{FingerprintError, Result, SmartError};
use sha2::{Digest, Sha256};
use std::fs;
use std::ops::Range;
use std::path::Path;

/// Size of an ID3v1 block, and the minimum size of a file we are willing to hash.
pub const TRAILER_LEN: usize = 128;

const LEADING_MARKER: &[u8] = b"ID3";
const TRAILING_MARKER: &[u8] = b"TAG";
const HEADER_LEN: usize = 10;
const HEADER_WITH_FOOTER_LEN: usize = 20;
const FOOTER_FLAG: u8 = 0x10;

/// Compute the half-open byte range of `bytes` that holds the audio payload.
pub fn content_range(bytes: &[u8]) -> std::result::Result<Range<usize>, FingerprintError> {
    let len = bytes.len();
    if len < TRAILER_LEN {
        return Err(FingerprintError::TooShort { len });
    }

    let mut start = 0;
    if bytes.starts_with(LEADING_MARKER) {
        let header_len = if bytes[5] & FOOTER_FLAG != 0 { HEADER_WITH_FOOTER_LEN } else { HEADER_LEN };
        start = header_len + declared_size(&bytes[6..10]);
    }

    let mut end = len;
    if &bytes[len - TRAILER_LEN..len - TRAILER_LEN + TRAILING_MARKER.len()] == TRAILING_MARKER {
        end = len - TRAILER_LEN;
    }

    // A leading block that claims to run past the end of the file, or into the trailer, means the
    // file is truncated or the header is garbage.
    if start >= end {
        return Err(FingerprintError::InvalidFile { start, len });
    }

    Ok(start..end)
}

fn declared_size(size_bytes: &[u8]) -> usize {
    size_bytes.iter().fold(0usize, |acc, &b| acc * 128 + b as usize)
}

/// Hash the audio payload of an in-memory file and render it as lowercase hex.
pub fn hash_bytes(bytes: &[u8]) -> std::result::Result<String, FingerprintError> {
    let range = content_range(bytes)?;
    let digest = Sha256::digest(&bytes[range]);
    Ok(format!("{digest:x}"))
}

/// Read a file and hash its audio payload.
pub fn hash_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|source| SmartError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(hash_bytes(&bytes)?)
}
