//! Canonical hashing and self-describing binary encodings.
//!
//! Every hash-of-JSON in the `did:webvh` method is computed over the JSON
//! Canonicalization Scheme (JCS) form of the value, digested with SHA-2-256,
//! framed as a multihash, and encoded as multibase base58btc. The helpers
//! here are the only place that pipeline is spelled out.

use multibase::Base;
use multihash::Multihash;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::Error;

/// Multihash code for SHA-2-256.
const SHA2_256: u64 = 0x12;
/// Multihash code for SHA-2-384.
const SHA2_384: u64 = 0x20;
/// Multihash code for SHA-3-256.
const SHA3_256: u64 = 0x16;
/// Multihash code for SHA-3-384.
const SHA3_384: u64 = 0x15;

/// Multicodec prefix for an Ed25519 public key in multikey form.
pub const ED25519_CODEC: [u8; 2] = [0xed, 0x01];

/// Multicodec prefix for an Ed25519 secret key in multikey form.
pub const ED25519_SECRET_CODEC: [u8; 2] = [0x80, 0x26];

/// Digest the JCS canonicalization of a value with SHA-2-256.
///
/// # Errors
///
/// Will fail if the value cannot be canonicalized.
pub fn jcs_sha256<T: Serialize>(value: &T) -> Result<[u8; 32], Error> {
    let jcs = serde_json_canonicalizer::to_string(value)
        .map_err(|e| Error::Format(format!("canonicalization failed: {e}")))?;
    Ok(Sha256::digest(jcs.as_bytes()).into())
}

/// Hash a value into its multibase-base58btc multihash form.
///
/// This is the encoding used for entry hashes, the SCID, and pre-rotation
/// key commitments.
///
/// # Errors
///
/// Will fail if the value cannot be canonicalized.
pub fn derive_hash<T: Serialize>(value: &T) -> Result<String, Error> {
    let digest = jcs_sha256(value)?;
    multihash_base58(&digest)
}

/// Hash a multibase-encoded public key into a pre-rotation commitment.
///
/// The hash is computed over the UTF-8 bytes of the key string, not over the
/// decoded key material.
///
/// # Errors
///
/// Will fail if multihash framing fails.
pub fn derive_next_key_hash(key: &str) -> Result<String, Error> {
    let digest: [u8; 32] = Sha256::digest(key.as_bytes()).into();
    multihash_base58(&digest)
}

fn multihash_base58(digest: &[u8; 32]) -> Result<String, Error> {
    let framed = Multihash::<64>::wrap(SHA2_256, digest)
        .map_err(|e| Error::Format(format!("multihash framing failed: {e}")))?;
    Ok(multibase::encode(Base::Base58Btc, framed.to_bytes()))
}

/// Decode a multibase-base58btc multihash into its algorithm code and digest.
///
/// Accepts SHA-2-256/384 and SHA-3-256/384 digests. The declared digest
/// length must match the number of digest bytes present.
///
/// # Errors
///
/// Will fail if the encoding or framing is malformed, or the algorithm is
/// not supported.
pub fn decode_multihash(encoded: &str) -> Result<(u64, Vec<u8>), Error> {
    let (base, bytes) = multibase::decode(encoded)?;
    if base != Base::Base58Btc {
        return Err(Error::Format(format!("multihash must be base58btc encoded, found {base:?}")));
    }
    let framed = Multihash::<64>::from_bytes(&bytes)
        .map_err(|e| Error::Format(format!("invalid multihash framing: {e}")))?;

    let expected_len = match framed.code() {
        SHA2_256 | SHA3_256 => 32,
        SHA2_384 | SHA3_384 => 48,
        code => {
            return Err(Error::Format(format!("unsupported multihash algorithm: {code:#x}")));
        }
    };
    if usize::from(framed.size()) != framed.digest().len()
        || framed.digest().len() != expected_len
    {
        return Err(Error::Format(format!(
            "multihash digest length {} does not match declared length {}",
            framed.digest().len(),
            framed.size()
        )));
    }
    Ok((framed.code(), framed.digest().to_vec()))
}

/// Encode an Ed25519 public key as a multibase-base58btc multikey.
#[must_use]
pub fn public_multikey(key: &[u8; 32]) -> String {
    let mut bytes = ED25519_CODEC.to_vec();
    bytes.extend_from_slice(key);
    multibase::encode(Base::Base58Btc, bytes)
}

/// Encode an Ed25519 secret key as a multibase-base58btc multikey.
#[must_use]
pub fn secret_multikey(key: &[u8]) -> String {
    let mut bytes = ED25519_SECRET_CODEC.to_vec();
    bytes.extend_from_slice(key);
    multibase::encode(Base::Base58Btc, bytes)
}

/// Decode a multikey into raw Ed25519 public key bytes.
///
/// # Errors
///
/// Will fail if the encoding is not base58btc, the blob is not 34 bytes, or
/// the multicodec prefix is not Ed25519.
pub fn decode_public_multikey(multikey: &str) -> Result<[u8; 32], Error> {
    let (base, bytes) = multibase::decode(multikey)?;
    if base != Base::Base58Btc {
        return Err(Error::Crypto(format!("public key must be base58btc encoded, found {base:?}")));
    }
    if bytes.len() != ED25519_CODEC.len() + 32 {
        return Err(Error::Crypto(format!("unexpected public key length: {}", bytes.len())));
    }
    if bytes[..ED25519_CODEC.len()] != ED25519_CODEC {
        return Err(Error::Crypto("public key does not have an Ed25519 codec prefix".to_string()));
    }
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes[ED25519_CODEC.len()..]);
    Ok(key)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn hash_is_deterministic() {
        // JCS sorts keys, so member order must not matter.
        let a = derive_hash(&json!({"b": 1, "a": "x"})).expect("should hash");
        let b = derive_hash(&json!({"a": "x", "b": 1})).expect("should hash");
        assert_eq!(a, b);
        assert!(a.starts_with('z'));
    }

    #[test]
    fn multihash_round_trip() {
        let encoded = derive_hash(&json!({"hello": "world"})).expect("should hash");
        let (code, digest) = decode_multihash(&encoded).expect("should decode");
        assert_eq!(code, SHA2_256);
        assert_eq!(digest.len(), 32);
    }

    #[test]
    fn rejects_unsupported_algorithm() {
        // SHA-1 (0x11) framing is structurally valid but not accepted.
        let digest = Sha256::digest(b"data");
        let framed = Multihash::<64>::wrap(0x11, &digest[..20]).expect("should wrap");
        let encoded = multibase::encode(Base::Base58Btc, framed.to_bytes());
        let err = decode_multihash(&encoded).expect_err("should reject");
        assert!(err.to_string().contains("unsupported"));
    }

    #[test]
    fn rejects_wrong_base() {
        let digest: [u8; 32] = Sha256::digest(b"data").into();
        let framed = Multihash::<64>::wrap(SHA2_256, &digest).expect("should wrap");
        let encoded = multibase::encode(Base::Base64Url, framed.to_bytes());
        assert!(decode_multihash(&encoded).is_err());
    }

    #[test]
    fn multikey_round_trip() {
        let key = [7u8; 32];
        let multikey = public_multikey(&key);
        assert!(multikey.starts_with('z'));
        let decoded = decode_public_multikey(&multikey).expect("should decode");
        assert_eq!(decoded, key);
    }

    #[test]
    fn multikey_rejects_bad_prefix() {
        let mut bytes = vec![0xec, 0x01];
        bytes.extend_from_slice(&[7u8; 32]);
        let multikey = multibase::encode(Base::Base58Btc, bytes);
        assert!(decode_public_multikey(&multikey).is_err());
    }

    #[test]
    fn next_key_hash_uses_key_text() {
        let key = "z6MkmM42vxfqZQsv4ehtTjFFxQ4sQKS2w6WR7emozFAn5cxu";
        let hash = derive_next_key_hash(key).expect("should hash");
        let (code, digest) = decode_multihash(&hash).expect("should decode");
        assert_eq!(code, SHA2_256);
        assert_eq!(digest.as_slice(), Sha256::digest(key.as_bytes()).as_slice());
    }
}
