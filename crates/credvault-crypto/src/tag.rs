//! HMAC-SHA256 integrity tags over ciphertext.
//!
//! The tag covers the ciphertext bytes only. Name, version and encryption
//! context are not bound, so a valid (key, contents, hmac) triple copied to
//! another item still verifies. Existing stored records depend on this scope.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::types::HMAC_TAG_LENGTH;

type HmacSha256 = Hmac<Sha256>;

/// Compute HMAC-SHA256(mac_key, ciphertext).
pub fn compute_tag(mac_key: &[u8], ciphertext: &[u8]) -> [u8; HMAC_TAG_LENGTH] {
    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(mac_key).expect("HMAC accepts keys of any length");
    mac.update(ciphertext);
    let mut tag = [0u8; HMAC_TAG_LENGTH];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    tag
}

/// Recompute the tag and compare against `tag` in constant time.
pub fn verify_tag(mac_key: &[u8], ciphertext: &[u8], tag: &[u8]) -> bool {
    let Ok(mut mac) = <HmacSha256 as Mac>::new_from_slice(mac_key) else {
        return false;
    };
    mac.update(ciphertext);
    mac.verify_slice(tag).is_ok()
}
