//! # Data Integrity Proof
//!
//! [W3C Data Integrity 1.0](https://www.w3.org/TR/vc-data-integrity/)
//! embedded proofs as used by the `eddsa-jcs-2022` cryptosuite: the proof
//! configuration (the proof without its `proofValue`) and the secured
//! document are canonicalized and hashed separately, and the signature is
//! computed over the concatenation of the two hashes.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde::ser::Serializer;

use crate::error::Error;
use crate::hash::jcs_sha256;

/// The proof type produced and accepted by this crate.
pub const PROOF_TYPE: &str = "DataIntegrityProof";

/// The cryptosuite produced and accepted by this crate.
pub const CRYPTOSUITE: &str = "eddsa-jcs-2022";

/// An embedded Data Integrity proof.
///
/// The `proof_value` field is optional because the same structure doubles as
/// the proof configuration object, which is the proof without its
/// `proof_value`.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct Proof {
    /// An optional identifier for the proof, e.g. a UUID as a URN.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The proof type. Always `DataIntegrityProof` here.
    #[serde(rename = "type")]
    pub type_: String,

    /// The cryptosuite securing the proof, e.g. `eddsa-jcs-2022`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cryptosuite: Option<String>,

    /// The DID URL of the key used to verify the proof.
    pub verification_method: String,

    /// The date-time the proof was created.
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_created")]
    pub created: Option<DateTime<Utc>>,

    /// The reason for the proof: `authentication` or `assertionMethod`.
    pub proof_purpose: String,

    /// A challenge to mitigate replay attacks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<String>,

    /// The multibase-encoded signature. Omitted on a proof configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proof_value: Option<String>,
}

// RFC 3339 with seconds precision so canonicalization is stable.
#[allow(clippy::ref_option)]
fn serialize_created<S: Serializer>(
    created: &Option<DateTime<Utc>>, serializer: S,
) -> Result<S::Ok, S::Error> {
    match created {
        Some(dt) => serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Secs, true)),
        None => serializer.serialize_none(),
    }
}

/// Compose the bytes to sign or verify for a proof over a document.
///
/// The result is `sha256(jcs(proof configuration)) || sha256(jcs(document))`
/// where the proof configuration is `proof` with its `proofValue` removed.
///
/// # Errors
///
/// Will fail if either value cannot be canonicalized.
pub fn signing_input<T: Serialize>(proof: &Proof, document: &T) -> Result<Vec<u8>, Error> {
    let mut config = proof.clone();
    config.proof_value = None;
    let proof_hash = jcs_sha256(&config)?;
    let data_hash = jcs_sha256(document)?;
    Ok([proof_hash.as_slice(), data_hash.as_slice()].concat())
}
