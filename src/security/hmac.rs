//! Keyed hashing primitive (HMAC-SHA256).

use crate::error::SecurityError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Length in bytes of every tag produced here.
pub const TAG_LEN: usize = 32;

type HmacSha256 = Hmac<Sha256>;

/// Compute `HMAC-SHA256(key, message)`.
///
/// Errors only when the MAC cannot be keyed; callers that gate access on the
/// result must treat an error as a rejection.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> Result<[u8; TAG_LEN], SecurityError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| SecurityError::HmacUnavailable(e.to_string()))?;
    mac.update(message);
    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    Ok(tag)
}

/// Lowercase hex rendering of [`hmac_sha256`].
pub fn hmac_sha256_hex(key: &[u8], message: &[u8]) -> Result<String, SecurityError> {
    hmac_sha256(key, message).map(hex::encode)
}
