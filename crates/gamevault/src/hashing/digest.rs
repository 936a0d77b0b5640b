use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::HashError;
use crate::model::{FileDigests, Md5Digest, Sha256Digest};

/// Smallest read buffer accepted by [`compute_digests`].
pub const MIN_CHUNK_SIZE: usize = 4096;

/// Computes MD5 and SHA-256 of a file in one streaming pass.
///
/// Blocking. Callers on an async runtime should run this through
/// `spawn_blocking`.
pub fn compute_digests(path: &Path, chunk_size: usize) -> Result<FileDigests, HashError> {
    let read_err = |e: std::io::Error| HashError::Read {
        path: path.to_path_buf(),
        source: e,
    };

    let mut file = File::open(path).map_err(read_err)?;
    let mut buffer = vec![0u8; chunk_size.max(MIN_CHUNK_SIZE)];
    let mut md5_ctx = md5::Context::new();
    let mut sha = Sha256::new();

    loop {
        let n = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_err(e)),
        };
        md5_ctx.consume(&buffer[..n]);
        sha.update(&buffer[..n]);
    }

    Ok(FileDigests {
        md5: Md5Digest::from_bytes(&md5_ctx.compute().0),
        sha256: Sha256Digest::from_bytes(&sha.finalize()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn temp_file(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_hello_world_vectors() {
        let file = temp_file(b"hello world");
        let digests = compute_digests(file.path(), MIN_CHUNK_SIZE).unwrap();
        assert_eq!(digests.md5.as_str(), "5eb63bbbe01eeed093cb22bb8f5acdc3");
        assert_eq!(
            digests.sha256.as_str(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_empty_file_vectors() {
        let file = temp_file(b"");
        let digests = compute_digests(file.path(), MIN_CHUNK_SIZE).unwrap();
        assert_eq!(digests.md5.as_str(), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            digests.sha256.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_chunk_size_does_not_change_result() {
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let file = temp_file(&data);

        let small = compute_digests(file.path(), MIN_CHUNK_SIZE).unwrap();
        let large = compute_digests(file.path(), 1024 * 1024).unwrap();
        assert_eq!(small, large);
        assert_eq!(small.md5.as_str().len(), Md5Digest::HEX_LEN);
        assert_eq!(small.sha256.as_str().len(), Sha256Digest::HEX_LEN);
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = compute_digests(Path::new("/no/such/file.nsp"), MIN_CHUNK_SIZE);
        assert!(matches!(result, Err(HashError::Read { .. })));
    }
}
