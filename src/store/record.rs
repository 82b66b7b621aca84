//! Credential record ⇄ item codec.
//!
//! Item layout (attribute names are fixed for compatibility with existing tables):
//! name: S, version: S (19 digits), key: S base64(wrapped key),
//! contents: S base64(ciphertext), hmac: B hex(tag) (S accepted on read),
//! digest: S "SHA256", created_at: N unix seconds.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use credvault_crypto::DIGEST_SHA256;

use super::{AttributeValue, Item, PARTITION_KEY, SORT_KEY};
use crate::error::{Result, SecretError};
use crate::types::CredentialRecord;

const KEY: &str = "key";
const CONTENTS: &str = "contents";
const HMAC: &str = "hmac";
const DIGEST: &str = "digest";
const CREATED_AT: &str = "created_at";

pub fn encode_record(record: &CredentialRecord) -> Item {
    let mut item = Item::new();
    item.insert(PARTITION_KEY.into(), AttributeValue::S(record.name.clone()));
    item.insert(SORT_KEY.into(), AttributeValue::S(record.version.clone()));
    item.insert(KEY.into(), AttributeValue::S(STANDARD.encode(&record.wrapped_key)));
    item.insert(CONTENTS.into(), AttributeValue::S(STANDARD.encode(&record.ciphertext)));
    item.insert(HMAC.into(), AttributeValue::B(hex::encode(&record.mac).into_bytes()));
    item.insert(DIGEST.into(), AttributeValue::S(DIGEST_SHA256.into()));
    item.insert(
        CREATED_AT.into(),
        AttributeValue::N(record.created_at.to_string()),
    );
    item
}

pub fn decode_record(item: &Item) -> Result<CredentialRecord> {
    let name = required_s(item, PARTITION_KEY)?.to_string();
    let version = required_s(item, SORT_KEY)?.to_string();

    let wrapped_key = STANDARD
        .decode(required_s(item, KEY)?)
        .map_err(|e| SecretError::malformed("key", e.to_string()))?;
    let ciphertext = STANDARD
        .decode(required_s(item, CONTENTS)?)
        .map_err(|e| SecretError::malformed("contents", e.to_string()))?;

    if let Some(digest) = item.get(DIGEST) {
        match digest.as_s() {
            Some(DIGEST_SHA256) => {}
            _ => {
                return Err(SecretError::malformed(
                    "digest",
                    format!("unsupported digest {:?}", digest),
                ))
            }
        }
    }

    let hex_tag: &[u8] = match item.get(HMAC) {
        Some(AttributeValue::S(s)) => s.as_bytes(),
        Some(AttributeValue::B(b)) => b.as_slice(),
        Some(AttributeValue::N(_)) => {
            return Err(SecretError::malformed("hmac", "numeric attribute"))
        }
        None => return Err(SecretError::malformed("hmac", "missing")),
    };
    // Stored tags are lowercase hex and compared byte for byte, so anything
    // else (non-hex, or a case change) can never verify.
    let integrity_failure = || SecretError::IntegrityFailure {
        name: name.clone(),
        version: version.clone(),
    };
    let mac = hex::decode(hex_tag).map_err(|_| integrity_failure())?;
    if hex::encode(&mac).as_bytes() != hex_tag {
        return Err(integrity_failure());
    }

    let created_at = match item.get(CREATED_AT) {
        None => 0,
        Some(AttributeValue::N(n)) => n
            .parse()
            .map_err(|_| SecretError::malformed("created_at", format!("not an integer: {}", n)))?,
        Some(other) => {
            return Err(SecretError::malformed(
                "created_at",
                format!("expected number, got {:?}", other),
            ))
        }
    };

    Ok(CredentialRecord {
        name,
        version,
        wrapped_key,
        ciphertext,
        mac,
        created_at,
    })
}

fn required_s<'a>(item: &'a Item, field: &'static str) -> Result<&'a str> {
    match item.get(field) {
        Some(AttributeValue::S(s)) => Ok(s),
        Some(_) => Err(SecretError::malformed(field, "expected a string attribute")),
        None => Err(SecretError::malformed(field, "missing")),
    }
}
