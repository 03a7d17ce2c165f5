//! Checksum calculation for migration scripts

use sha2::{Digest, Sha256};

/// Calculate the SHA-256 checksum of a script
///
/// Used to report drift between an applied script and its current definition
/// without printing either script in full.
///
/// # Returns
///
/// Returns the hexadecimal SHA-256 hash of the script content
pub fn calculate_checksum(script: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(script.as_bytes());
    let hash = hasher.finalize();

    format!("{:x}", hash)
}

/// The first 12 hex digits of [`calculate_checksum`], for log lines and tables
pub fn short_checksum(script: &str) -> String {
    let mut checksum = calculate_checksum(script);
    checksum.truncate(12);
    checksum
}
