use std::path::Path;

use sha1::{Digest, Sha1};
use tokio::io::AsyncReadExt;

use crate::core::error::{ProvisionError, ProvisionResult};

const READ_CHUNK: usize = 64 * 1024;

/// Lowercase hex SHA-1 of an in-memory buffer.
pub fn sha1_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha1::digest(bytes))
}

/// Lowercase hex SHA-1 of a file, read in fixed-size chunks.
pub async fn sha1_file(path: &Path) -> ProvisionResult<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| ProvisionError::io(path, e))?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| ProvisionError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

pub fn hashes_match(expected: &str, actual: &str) -> bool {
    expected.eq_ignore_ascii_case(actual)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_digest() {
        assert_eq!(
            sha1_bytes(b"hello world"),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
    }

    #[tokio::test]
    async fn file_digest_matches_buffer_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob");
        let payload = vec![7u8; READ_CHUNK * 2 + 13];
        std::fs::write(&path, &payload).unwrap();
        assert_eq!(sha1_file(&path).await.unwrap(), sha1_bytes(&payload));
    }

    #[test]
    fn comparison_ignores_case() {
        assert!(hashes_match(
            "2AAE6C35C94FCFB415DBE95F408B9CE91EE846ED",
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        ));
    }
}
