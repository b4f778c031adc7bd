use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

const DIGEST_PREFIX: &str = "sha256:";

/// Hex sha256 of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Blob location for a digest of the form `sha256:<hex>`
pub fn blob_path(root: &Path, digest: &str) -> Option<PathBuf> {
    let hex = digest.strip_prefix(DIGEST_PREFIX)?;
    if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(root.join("sha256").join(&hex[0..2]).join(&hex[2..4]).join(hex))
}

/// Store `bytes` once under their content hash and return `sha256:<hex>`.
pub fn write_cas(root: &Path, bytes: &[u8]) -> std::io::Result<String> {
    let hex = sha256_hex(bytes);
    let dir = root.join("sha256").join(&hex[0..2]).join(&hex[2..4]);
    fs::create_dir_all(&dir)?;
    let path = dir.join(&hex);
    if !path.exists() {
        // a blob at `path` is always complete
        let tmp = dir.join(format!(".{}.tmp", hex));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &path)?;
    }
    Ok(format!("{}{}", DIGEST_PREFIX, hex))
}
