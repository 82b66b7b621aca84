/// AES key length in bytes (256 bits). Also the size of the cipher half of a data key.
pub const AES_KEY_LENGTH: usize = 32;

/// AES block length in bytes.
pub const AES_BLOCK_LENGTH: usize = 16;

/// HMAC-SHA256 tag length in bytes.
pub const HMAC_TAG_LENGTH: usize = 32;

/// Default size of a minted data key: 32 bytes cipher key + 32 bytes MAC key.
pub const DEFAULT_DATA_KEY_SIZE: usize = 64;

/// Digest name recorded alongside every tag.
pub const DIGEST_SHA256: &str = "SHA256";

/// Initial AES-CTR counter block: the 128-bit big-endian integer 1.
///
/// Fixed for every encryption. This is only sound because each data key
/// encrypts exactly one plaintext; a key must never be reused.
pub const LEGACY_COUNTER_BLOCK: [u8; AES_BLOCK_LENGTH] =
    [0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
