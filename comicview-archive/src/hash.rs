//! Content hashing with blake3.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use comicview_core::{ContentHash, ContentHasher, ReaderError, Result};

const CHUNK: usize = 64 * 1024;

/// Hex-encoded blake3 digest of the archive bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Hasher;

impl ContentHasher for Blake3Hasher {
    fn hash(&self, path: &Path) -> Result<ContentHash> {
        let digest = hash_file(path).map_err(|source| ReaderError::Hash {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(ContentHash::new(hex::encode(digest)))
    }
}

fn hash_file(path: &Path) -> io::Result<[u8; 32]> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(CHUNK, file);
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; CHUNK];

    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                hasher.update(&buffer[..n]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(*hasher.finalize().as_bytes())
}
