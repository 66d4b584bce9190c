//! # DID Web with Verifiable History
//!
//! The `did:webvh` method binds a DID to an append-only log of signed
//! entries published at a web location. This module holds the log data
//! model; the operation and resolution submodules build on it.
//!
//! See: <https://identity.foundation/didwebvh/>

pub mod create;
pub mod deactivate;
pub mod resolve;
pub mod update;
pub mod url;
pub mod verify;

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use serde::de::DeserializeOwned;
use serde::ser::Serializer;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::document::Document;
use crate::error::Error;
use crate::hash::derive_hash;
use crate::proof::{CRYPTOSUITE, PROOF_TYPE, Proof, signing_input};
use crate::provider::Signer;

pub use create::{CreateBuilder, CreateResult};
pub use deactivate::{DeactivateBuilder, DeactivateResult};
pub use resolve::{LogMetadata, ResolveOptions, Resolved, resolve, resolve_log};
pub use update::{UpdateBuilder, UpdateResult};
pub use url::{base_url, default_did, log_url, witness_url};
pub use verify::{VerifyPolicy, validate_witness, verify_proofs, verify_witness};

/// Placeholder for the self-certifying identifier (SCID) in a DID URL.
///
/// Gets replaced by the generated SCID when constructing a DID document and
/// log entry.
pub const SCID_PLACEHOLDER: &str = "{SCID}";

pub(crate) const METHOD: &str = "webvh";

/// The revisions of the method specification this crate can process.
///
/// The first log entry's `method` parameter selects the revision; it is a
/// parameter of every verification call, never global state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SpecVersion {
    /// `did:webvh:0.5` — witness approval is a weighted sum.
    V0_5,

    /// `did:webvh:1.0` — witness approval counts distinct witnesses.
    #[default]
    V1_0,
}

impl FromStr for SpecVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "did:webvh:0.5" => Ok(Self::V0_5),
            "did:webvh:1.0" => Ok(Self::V1_0),
            _ => Err(Error::Format(format!("unsupported method version: {s}"))),
        }
    }
}

impl Display for SpecVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::V0_5 => write!(f, "did:webvh:0.5"),
            Self::V1_0 => write!(f, "did:webvh:1.0"),
        }
    }
}

/// A `DidLog` is the ordered set of log entries for a DID.
pub type DidLog = Vec<LogEntry>;

/// `LogEntry` is an entry in the `did.jsonl` log file denoting one version
/// of a DID document.
///
/// <https://identity.foundation/didwebvh/#the-did-log-file>
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// DID version number starting at 1 and incrementing by one per version,
    /// a literal dash `-`, and the entry hash.
    pub version_id: String,

    /// A UTC timestamp in RFC 3339 format.
    #[serde(serialize_with = "serialize_version_time")]
    pub version_time: DateTime<Utc>,

    /// Transition parameters for this entry.
    pub parameters: Parameters,

    /// The DID document as of this version.
    pub state: Document,

    /// Signed data integrity proofs.
    ///
    /// Required on a published entry but not part of the entry hash, so it
    /// is skippable to support the build and verification algorithms.
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub proof: Vec<Proof>,
}

// RFC 3339 with seconds precision so canonicalization is stable.
fn serialize_version_time<S: Serializer>(
    time: &DateTime<Utc>, serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&time.to_rfc3339_opts(SecondsFormat::Secs, true))
}

impl LogEntry {
    /// Generate the entry hash: the multibase-base58btc multihash of the
    /// canonicalized entry with its proofs stripped.
    ///
    /// # Errors
    ///
    /// Will return an error if the entry fails canonicalization.
    pub fn hash(&self) -> Result<String, Error> {
        let mut unsigned = self.clone();
        unsigned.proof = Vec::new();
        derive_hash(&unsigned)
    }

    /// Split the version number and entry hash out of the `versionId`.
    ///
    /// # Errors
    ///
    /// Will return an error if the `versionId` is not `<n>-<hash>`.
    pub fn version_parts(&self) -> Result<(u64, String), Error> {
        let Some((number, hash)) = self.version_id.split_once('-') else {
            return Err(Error::Format(format!(
                "version id does not match <n>-<hash>: {}",
                self.version_id
            )));
        };
        let number = number.parse::<u64>().map_err(|e| {
            Error::Format(format!("version id does not start with a number: {e}"))
        })?;
        Ok((number, hash.to_string()))
    }

    /// Verify the hash chain for this entry.
    ///
    /// The hash part of `versionId` must equal the hash of this entry with
    /// its `versionId` set to the predecessor's — for the first entry, the
    /// SCID.
    ///
    /// # Errors
    ///
    /// Will return an error if the `versionId` has an unexpected format or
    /// the recomputed hash does not match the stored one.
    pub fn verify_hash(&self, previous_version_id: &str) -> Result<(), Error> {
        let (_, hash) = self.version_parts()?;
        let mut predecessor = self.clone();
        predecessor.version_id = previous_version_id.to_string();
        if predecessor.hash()? != hash {
            return Err(Error::Integrity(format!(
                "hash of entry {} does not match its version id",
                self.version_id
            )));
        }
        Ok(())
    }

    /// Construct a controller's data integrity proof and add it to the
    /// entry.
    ///
    /// # Errors
    ///
    /// Will return an error if the proof cannot be constructed or the signer
    /// fails.
    pub async fn sign(&mut self, signer: &impl Signer) -> Result<(), Error> {
        let proof = self.proof(signer).await?;
        self.proof.push(proof);
        Ok(())
    }

    /// Construct a data integrity proof over this log entry.
    ///
    /// Used for a controller's proof (the `sign` method adds it to the entry
    /// for you) and for `did:webvh:0.5` witness proofs, which are computed
    /// over the log entry itself.
    ///
    /// # Errors
    ///
    /// Will return an error if the proof structure cannot be serialized or
    /// the signer fails.
    pub async fn proof(&self, signer: &impl Signer) -> Result<Proof, Error> {
        let config = proof_config(signer).await?;
        let payload = signing_input(&config, self)?;
        finish_proof(config, &payload, signer).await
    }

    /// Construct a `did:webvh:1.0` witness proof for this entry.
    ///
    /// The proof is computed over `{"versionId": <versionId>}` rather than
    /// the entry itself, so a witness only ever attests to a version having
    /// been published.
    ///
    /// # Errors
    ///
    /// Will return an error if the proof structure cannot be serialized or
    /// the signer fails.
    pub async fn witness_proof(&self, signer: &impl Signer) -> Result<Proof, Error> {
        let config = proof_config(signer).await?;
        let payload = signing_input(&config, &json!({"versionId": self.version_id}))?;
        finish_proof(config, &payload, signer).await
    }
}

// Timestamps are written with whole-second precision, so they are truncated
// at the source to keep serialized entries round-tripping exactly.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().with_nanosecond(0).unwrap_or_else(Utc::now)
}

async fn proof_config(signer: &impl Signer) -> Result<Proof, Error> {
    let verification_method = signer.verification_method().await?;
    Ok(Proof {
        id: Some(format!("urn:uuid:{}", Uuid::new_v4())),
        type_: PROOF_TYPE.to_string(),
        cryptosuite: Some(CRYPTOSUITE.to_string()),
        verification_method,
        created: Some(now()),
        proof_purpose: "assertionMethod".to_string(),
        ..Proof::default()
    })
}

async fn finish_proof(
    config: Proof, payload: &[u8], signer: &impl Signer,
) -> Result<Proof, Error> {
    let signature = signer.sign(payload).await?;
    let mut proof = config;
    proof.proof_value = Some(multibase::encode(multibase::Base::Base58Btc, signature));
    Ok(proof)
}

/// Parameters for a DID log entry.
///
/// All parameters are individually optional per entry: an absent parameter
/// leaves the running value in place. `witness` and `watchers` distinguish
/// absent from explicit JSON `null`, which clears the running value.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Parameters {
    /// The `did:webvh` specification version to use when processing the log.
    /// Required on the first entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// The self-certifying identifier (SCID) for the DID. Required on the
    /// first entry, prohibited afterwards.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scid: Option<String>,

    /// Multibase-encoded public keys authorized to sign log entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_keys: Option<Vec<String>>,

    /// Hashes of public keys that may become update keys in the next entry
    /// (key pre-rotation). An empty list ends pre-rotation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_key_hashes: Option<Vec<String>>,

    /// Whether the DID can be renamed and hosted on a different domain.
    /// Only settable on the first entry; defaults to `false`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub portable: Option<bool>,

    /// Witnesses whose attestation is required for changes to the DID.
    /// `null` disables witnessing.
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub witness: Option<Option<Witness>>,

    /// URLs of watchers tracking the DID. `null` clears the list.
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub watchers: Option<Option<Vec<String>>>,

    /// Indicator of whether the DID has been deactivated. Once `true` the
    /// log is terminal.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated: Option<bool>,

    /// Maximum time in seconds the resolved document may be cached before a
    /// full resolution must be performed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

// Deserialize a present-but-null value as `Some(None)` so it can be told
// apart from an absent member.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// The witnesses for a DID and the approval threshold for changes.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Witness {
    /// The approvals required for a change: at 1.0 a count of distinct
    /// witnesses, at 0.5 a total of witness weights.
    pub threshold: u64,

    /// The declared witnesses.
    pub witnesses: Vec<WitnessWeight>,
}

/// A single declared witness.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct WitnessWeight {
    /// The DID of the witness using the `did:key` method.
    pub id: String,

    /// The weight the witness contributes at 0.5. Ignored at 1.0, where
    /// every witness counts once.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<u64>,
}

/// Entry in the `did-witness.json` file.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WitnessEntry {
    /// Version ID of the DID log entry the witnesses' proofs apply to.
    pub version_id: String,

    /// Witnesses' proofs using the `eddsa-jcs-2022` cryptosuite.
    pub proof: Vec<Proof>,
}

/// Parse the contents of a `did.jsonl` file into log entries.
///
/// Blank lines are ignored; a trailing newline is permitted.
///
/// # Errors
///
/// Will fail with [`Error::NotFound`] if the file holds no entries and with
/// [`Error::Format`] if a line cannot be parsed.
pub fn parse_log(raw: &str) -> Result<DidLog, Error> {
    parse_lines(raw, "log entry")
        .and_then(|entries: DidLog| {
            if entries.is_empty() {
                return Err(Error::NotFound("log contains no entries".to_string()));
            }
            Ok(entries)
        })
}

/// Serialize log entries into `did.jsonl` contents: one JCS-canonical JSON
/// object per line.
///
/// # Errors
///
/// Will fail if an entry cannot be canonicalized.
pub fn serialize_log(entries: &[LogEntry]) -> Result<String, Error> {
    let mut out = String::new();
    for entry in entries {
        let line = serde_json_canonicalizer::to_string(entry)
            .map_err(|e| Error::Format(format!("canonicalization failed: {e}")))?;
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}

/// Parse the contents of a `did-witness.json` file.
///
/// # Errors
///
/// Will fail if the contents are not a JSON array of witness entries.
pub fn parse_witness_proofs(raw: &str) -> Result<Vec<WitnessEntry>, Error> {
    serde_json::from_str(raw)
        .map_err(|e| Error::Format(format!("invalid witness proof file: {e}")))
}

fn parse_lines<T: DeserializeOwned>(raw: &str, what: &str) -> Result<Vec<T>, Error> {
    let mut parsed = vec![];
    for (i, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        parsed.push(serde_json::from_str(line).map_err(|e| {
            Error::Format(format!("invalid {what} on line {}: {e}", i + 1))
        })?);
    }
    Ok(parsed)
}
