//! Verification and validation functions for `did:webvh` log entries and
//! information referenced in the log parameters.

use serde_json::json;
use tracing::{debug, warn};

use crate::core::Kind;
use crate::document::Document;
use crate::error::Error;
use crate::hash::decode_public_multikey;
use crate::proof::{CRYPTOSUITE, PROOF_TYPE, Proof, signing_input};
use crate::provider::Verifier;
use crate::url::{Method, Url};
use crate::webvh::{LogEntry, METHOD, SpecVersion, Witness, WitnessEntry};

/// Which assertions the validator enforces.
///
/// Every check defaults to enforced. Relaxing one is for isolated unit
/// testing of the others — a resolution with any check disabled must never
/// be treated as authoritative. The policy travels with the call, so
/// concurrent resolutions can use different policies.
#[derive(Clone, Copy, Debug)]
pub struct VerifyPolicy {
    /// Require every controller proof to be signed by an authorized key.
    pub key_authorization: bool,

    /// Require rotated update keys to match the pre-rotation commitments.
    pub next_keys: bool,

    /// Require the document state to be internally consistent.
    pub document_state: bool,

    /// Require every entry hash to chain from its predecessor.
    pub hash_chain: bool,

    /// Require the SCID to be derived from the initial log entry.
    pub scid_derivation: bool,

    /// Require witness proofs to come from declared witnesses.
    pub witness_authorization: bool,
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            key_authorization: true,
            next_keys: true,
            document_state: true,
            hash_chain: true,
            scid_derivation: true,
            witness_authorization: true,
        }
    }
}

/// Verify the controller proofs on a log entry.
///
/// Each proof must be produced by one of `authorized_keys` (matched on the
/// did:key identifier, ignoring the fragment) and must verify over the
/// entry with its proofs stripped.
///
/// # Errors
///
/// Will return an error if the entry has no proof or any proof is invalid.
pub async fn verify_proofs(
    entry: &LogEntry, authorized_keys: &[String], verifier: &impl Verifier, policy: VerifyPolicy,
) -> Result<(), Error> {
    if entry.proof.is_empty() {
        return Err(Error::Format(format!("log entry {} has no proof", entry.version_id)));
    }

    let mut unsigned = entry.clone();
    unsigned.proof = Vec::new();

    for proof in &entry.proof {
        check_proof_shape(proof)?;

        let key = proof_key(proof)?;
        if policy.key_authorization && !authorized_keys.contains(&key) {
            return Err(Error::Authorization(format!(
                "proof key {key} is not authorized to sign log entry {}",
                entry.version_id
            )));
        }

        let public_key = decode_public_multikey(&key)?;
        let payload = signing_input(proof, &unsigned)?;
        verify_signature(proof, &payload, &public_key, verifier).await?;
    }
    Ok(())
}

// The update key a proof claims to be signed with: the method-specific id of
// its did:key verification method, fragment ignored.
fn proof_key(proof: &Proof) -> Result<String, Error> {
    let url: Url = proof.verification_method.parse()?;
    if url.method != Method::Key {
        return Err(Error::Authorization(format!(
            "proof verification method is not a did:key: {}",
            proof.verification_method
        )));
    }
    Ok(url.id)
}

fn check_proof_shape(proof: &Proof) -> Result<(), Error> {
    if proof.type_ != PROOF_TYPE {
        return Err(Error::Format(format!(
            "unsupported proof type {} - must be '{PROOF_TYPE}'",
            proof.type_
        )));
    }
    if proof.proof_purpose != "authentication" && proof.proof_purpose != "assertionMethod" {
        return Err(Error::Format(format!(
            "unsupported proof purpose {} - must be 'authentication' or 'assertionMethod'",
            proof.proof_purpose
        )));
    }
    if proof.cryptosuite.as_deref() != Some(CRYPTOSUITE) {
        return Err(Error::Crypto(format!(
            "unsupported cryptosuite {} - must be '{CRYPTOSUITE}'",
            proof.cryptosuite.as_deref().unwrap_or("")
        )));
    }
    Ok(())
}

async fn verify_signature(
    proof: &Proof, payload: &[u8], public_key: &[u8], verifier: &impl Verifier,
) -> Result<(), Error> {
    let Some(value) = &proof.proof_value else {
        return Err(Error::Crypto("proof value is missing".to_string()));
    };
    let (base, signature) = multibase::decode(value)?;
    if base != multibase::Base::Base58Btc {
        return Err(Error::Crypto(format!("proof value must be base58btc encoded, found {base:?}")));
    }
    verifier
        .verify(&signature, payload, public_key)
        .await
        .map_err(|e| Error::Crypto(format!("proof signature verification failed: {e}")))
}

/// Validate the shape of a `witness` parameter.
///
/// Does not verify any witness proofs — see [`verify_witness`] for that.
///
/// # Errors
///
/// Will fail if the witness list is empty, an id is not a `did:key`, the
/// threshold is zero or unreachable, or (at 1.0) ids are duplicated.
pub fn validate_witness(witness: &Witness, version: SpecVersion) -> Result<(), Error> {
    if witness.witnesses.is_empty() {
        return Err(Error::Witness("witness list must not be empty".to_string()));
    }
    if witness.threshold == 0 {
        return Err(Error::Witness("witness threshold must be greater than zero".to_string()));
    }
    for w in &witness.witnesses {
        if !w.id.starts_with("did:key:") {
            return Err(Error::Witness(format!("witness id must be a did:key: {}", w.id)));
        }
    }

    match version {
        SpecVersion::V1_0 => {
            let mut ids: Vec<&str> = witness.witnesses.iter().map(|w| w.id.as_str()).collect();
            ids.sort_unstable();
            ids.dedup();
            if ids.len() != witness.witnesses.len() {
                return Err(Error::Witness("witness ids must be unique".to_string()));
            }
            if witness.threshold > witness.witnesses.len() as u64 {
                return Err(Error::Witness(format!(
                    "witness threshold {} exceeds the number of witnesses {}",
                    witness.threshold,
                    witness.witnesses.len()
                )));
            }
        }
        SpecVersion::V0_5 => {
            let mut total_weight = 0;
            for w in &witness.witnesses {
                let weight = w.weight.unwrap_or_default();
                if weight == 0 {
                    return Err(Error::Witness(format!(
                        "witness weight must be greater than zero: {}",
                        w.id
                    )));
                }
                total_weight += weight;
            }
            if total_weight < witness.threshold {
                return Err(Error::Witness(format!(
                    "total witness weight {total_weight} cannot reach the threshold {}",
                    witness.threshold
                )));
            }
        }
    }
    Ok(())
}

/// Verify the witness attestations for a log entry against its active
/// witness parameter.
///
/// Only proofs filed under the entry's `versionId` are considered. At 1.0
/// each distinct declared witness with a verifying proof counts one
/// approval; at 0.5 approvals are a weighted sum. A witness is never counted
/// twice. Returns the approvals (or total weight) accumulated.
///
/// # Errors
///
/// Will fail if the threshold is not met, a proof uses a cryptosuite other
/// than `eddsa-jcs-2022` (1.0), or a proof is tied to an undeclared witness
/// (1.0).
pub async fn verify_witness(
    entry: &LogEntry, proofs: &[WitnessEntry], witness: &Witness, version: SpecVersion,
    verifier: &impl Verifier, policy: VerifyPolicy,
) -> Result<u64, Error> {
    match version {
        SpecVersion::V1_0 => verify_witness_1_0(entry, proofs, witness, verifier, policy).await,
        SpecVersion::V0_5 => verify_witness_0_5(entry, proofs, witness, verifier).await,
    }
}

async fn verify_witness_1_0(
    entry: &LogEntry, proofs: &[WitnessEntry], witness: &Witness, verifier: &impl Verifier,
    policy: VerifyPolicy,
) -> Result<u64, Error> {
    let signed = json!({"versionId": entry.version_id});
    let mut approved: Vec<&str> = vec![];

    for we in proofs.iter().filter(|we| we.version_id == entry.version_id) {
        for proof in &we.proof {
            if proof.cryptosuite.as_deref() != Some(CRYPTOSUITE) {
                return Err(Error::Witness(format!(
                    "invalid witness proof cryptosuite: {}",
                    proof.cryptosuite.as_deref().unwrap_or("")
                )));
            }
            let Some(declared) = witness
                .witnesses
                .iter()
                .find(|w| proof.verification_method.starts_with(w.id.as_str()))
            else {
                if policy.witness_authorization {
                    return Err(Error::Witness(format!(
                        "proof from undeclared witness: {}",
                        proof.verification_method
                    )));
                }
                continue;
            };
            if approved.contains(&declared.id.as_str()) {
                debug!("skipping duplicate proof from witness {}", declared.id);
                continue;
            }

            let Some(multikey) = declared.id.strip_prefix("did:key:") else {
                return Err(Error::Witness(format!("witness id must be a did:key: {}", declared.id)));
            };
            let public_key = decode_public_multikey(multikey)?;
            let payload = signing_input(proof, &signed)?;
            match verify_signature(proof, &payload, &public_key, verifier).await {
                Ok(()) => approved.push(declared.id.as_str()),
                Err(e) => {
                    warn!("witness proof from {} did not verify: {e}", declared.id);
                }
            }
        }
    }

    let approvals = approved.len() as u64;
    if approvals < witness.threshold {
        return Err(Error::Witness(format!(
            "witness threshold not met: {approvals} of {} required approvals",
            witness.threshold
        )));
    }
    Ok(approvals)
}

async fn verify_witness_0_5(
    entry: &LogEntry, proofs: &[WitnessEntry], witness: &Witness, verifier: &impl Verifier,
) -> Result<u64, Error> {
    let mut counted: Vec<&str> = vec![];
    let mut total_weight = 0;

    for we in proofs.iter().filter(|we| we.version_id == entry.version_id) {
        for proof in &we.proof {
            let Some(declared) = witness
                .witnesses
                .iter()
                .find(|w| proof.verification_method.starts_with(w.id.as_str()))
            else {
                warn!("skipping proof from undeclared witness: {}", proof.verification_method);
                continue;
            };
            if counted.contains(&declared.id.as_str()) {
                continue;
            }
            if let Err(e) = check_proof_shape(proof) {
                warn!("skipping invalid witness proof from {}: {e}", declared.id);
                continue;
            }

            let Some(multikey) = declared.id.strip_prefix("did:key:") else {
                continue;
            };
            let Ok(public_key) = decode_public_multikey(multikey) else {
                warn!("skipping witness with undecodable key: {}", declared.id);
                continue;
            };
            // a 0.5 witness attests to the log entry itself
            let payload = signing_input(proof, entry)?;
            match verify_signature(proof, &payload, &public_key, verifier).await {
                Ok(()) => {
                    counted.push(declared.id.as_str());
                    total_weight += declared.weight.unwrap_or_default();
                }
                Err(e) => {
                    warn!("witness proof from {} did not verify: {e}", declared.id);
                }
            }
        }
    }

    if total_weight < witness.threshold {
        return Err(Error::Witness(format!(
            "total witness weight {total_weight} does not meet the threshold {}",
            witness.threshold
        )));
    }
    Ok(total_weight)
}

// The document must carry the DID it was logged under and must not
// reference verification methods it does not declare.
pub(crate) fn verify_document_state(doc: &Document, scid: &str) -> Result<(), Error> {
    let parts: Vec<&str> = doc.id.split(':').collect();
    if parts.len() < 4 || parts[0] != "did" || parts[1] != METHOD || parts[2] != scid {
        return Err(Error::Policy(format!("document id does not embed the SCID: {}", doc.id)));
    }

    let relationships = [
        &doc.authentication,
        &doc.assertion_method,
        &doc.key_agreement,
        &doc.capability_invocation,
        &doc.capability_delegation,
    ];
    for relationship in relationships {
        for entry in relationship.iter().flatten() {
            if let Kind::String(reference) = entry {
                if reference.starts_with('#') && doc.verification_method(reference).is_none() {
                    return Err(Error::Policy(format!(
                        "relationship references an undeclared verification method: {reference}"
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webvh::WitnessWeight;

    fn witnesses(ids: &[&str]) -> Witness {
        Witness {
            threshold: 1,
            witnesses: ids
                .iter()
                .map(|id| WitnessWeight { id: (*id).to_string(), weight: Some(10) })
                .collect(),
        }
    }

    #[test]
    fn witness_shape_1_0() {
        let mut witness = witnesses(&["did:key:z6MkA", "did:key:z6MkB"]);
        witness.threshold = 2;
        assert!(validate_witness(&witness, SpecVersion::V1_0).is_ok());

        witness.threshold = 3;
        assert!(validate_witness(&witness, SpecVersion::V1_0).is_err());

        witness.threshold = 0;
        assert!(validate_witness(&witness, SpecVersion::V1_0).is_err());

        let duplicated = witnesses(&["did:key:z6MkA", "did:key:z6MkA"]);
        assert!(validate_witness(&duplicated, SpecVersion::V1_0).is_err());

        let not_key = witnesses(&["did:web:example.com"]);
        assert!(validate_witness(&not_key, SpecVersion::V1_0).is_err());

        let empty = Witness { threshold: 1, witnesses: vec![] };
        assert!(validate_witness(&empty, SpecVersion::V1_0).is_err());
    }

    #[test]
    fn witness_shape_0_5() {
        let mut witness = witnesses(&["did:key:z6MkA", "did:key:z6MkB"]);
        witness.threshold = 20;
        assert!(validate_witness(&witness, SpecVersion::V0_5).is_ok());

        // unreachable threshold
        witness.threshold = 21;
        assert!(validate_witness(&witness, SpecVersion::V0_5).is_err());

        // zero weight
        witness.threshold = 10;
        witness.witnesses[0].weight = None;
        assert!(validate_witness(&witness, SpecVersion::V0_5).is_err());
    }

    #[test]
    fn proof_shape() {
        let mut proof = Proof {
            type_: PROOF_TYPE.to_string(),
            cryptosuite: Some(CRYPTOSUITE.to_string()),
            proof_purpose: "assertionMethod".to_string(),
            verification_method: "did:key:z6MkA#z6MkA".to_string(),
            ..Proof::default()
        };
        assert!(check_proof_shape(&proof).is_ok());

        proof.cryptosuite = Some("invalid-suite".to_string());
        assert!(matches!(check_proof_shape(&proof), Err(Error::Crypto(_))));

        proof.cryptosuite = Some(CRYPTOSUITE.to_string());
        proof.proof_purpose = "keyAgreement".to_string();
        assert!(matches!(check_proof_shape(&proof), Err(Error::Format(_))));
    }

    #[test]
    fn proof_key_ignores_fragment() {
        let proof = Proof {
            verification_method: "did:key:z6MkA#z6MkA".to_string(),
            ..Proof::default()
        };
        assert_eq!(proof_key(&proof).expect("should extract"), "z6MkA");

        let proof = Proof {
            verification_method: "did:webvh:scid:example.com#key-0".to_string(),
            ..Proof::default()
        };
        assert!(proof_key(&proof).is_err());
    }
}
