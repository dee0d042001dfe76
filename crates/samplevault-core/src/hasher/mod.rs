//! Content hashing used as File identity.
//!
//! Files are streamed through BLAKE3 in fixed-size chunks so memory use does
//! not depend on file size. The digest is rendered as a 64-character lowercase
//! hex string and stored as `files.content_hash`.

use crate::error::Error;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Hash the full contents of `path`.
///
/// Open and read failures map to [`Error::UnreadableFile`]; callers treat
/// them as per-file errors.
pub fn hash_file(path: &Path, chunk_size: usize) -> Result<String, Error> {
    let file = File::open(path).map_err(|e| Error::unreadable(path, e))?;
    hash_reader(file, chunk_size).map_err(|e| Error::unreadable(path, e))
}

/// Fold a byte stream into a hex digest, reading `chunk_size` bytes at a time.
pub fn hash_reader<R: Read>(mut reader: R, chunk_size: usize) -> io::Result<String> {
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; chunk_size.max(1)];
    loop {
        let bytes_read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}
