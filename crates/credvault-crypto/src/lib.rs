//! Leaf primitives for credvault: AES-256-CTR contents codec, HMAC-SHA256
//! integrity tags, and the split data key. No I/O lives here.

pub mod aes_ctr;
pub mod dek;
pub mod envelope;
pub mod error;
pub mod tag;
pub mod types;

pub use aes_ctr::{apply_keystream, decrypt, encrypt};
pub use dek::DataKey;
pub use envelope::{open, seal, SealedSecret};
pub use error::CryptoError;
pub use tag::{compute_tag, verify_tag};
pub use types::{
    AES_BLOCK_LENGTH, AES_KEY_LENGTH, DEFAULT_DATA_KEY_SIZE, DIGEST_SHA256, HMAC_TAG_LENGTH,
    LEGACY_COUNTER_BLOCK,
};
