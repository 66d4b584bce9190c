//! # DID Web with Verifiable History Resolver
//!
//! Resolution replays a DID log from genesis, verifying integrity,
//! authorization, and method policy at every entry, and returns the
//! document and metadata as of the requested version.
//!
//! See: <https://identity.foundation/didwebvh/#read-resolve>

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{Document, DocumentMetadata};
use crate::error::Error;
use crate::hash::derive_next_key_hash;
use crate::provider::{LogFetcher, Verifier};
use crate::url::{Method, QueryParams, Url};
use crate::webvh::url::{default_services, log_url, witness_url};
use crate::webvh::verify::{
    VerifyPolicy, validate_witness, verify_document_state, verify_proofs, verify_witness,
};
use crate::webvh::{
    LogEntry, SCID_PLACEHOLDER, SpecVersion, Witness, WitnessEntry, parse_log,
    parse_witness_proofs,
};

/// Which revision of the DID a resolution should return.
///
/// At most one selector may be used: a verification method selector cannot
/// be combined with a version selector. With no selector set, resolution
/// returns the latest version.
#[derive(Clone, Debug, Default)]
pub struct ResolveOptions {
    /// Select the entry with this version number.
    pub version_number: Option<u64>,

    /// Select the entry with this version ID.
    pub version_id: Option<String>,

    /// Select the entry in effect at this time.
    pub version_time: Option<DateTime<Utc>>,

    /// Select the first version whose document declares this verification
    /// method, by full ID or `#fragment`.
    pub verification_method: Option<String>,

    /// The assertions to enforce while replaying. Leave defaulted outside
    /// of tests.
    pub policy: VerifyPolicy,
}

impl TryFrom<&QueryParams> for ResolveOptions {
    type Error = Error;

    fn try_from(params: &QueryParams) -> Result<Self, Self::Error> {
        let version_time =
            params.version_time.as_ref().map(|t| t.parse::<DateTime<Utc>>()).transpose()?;
        Ok(Self {
            version_id: params.version_id.clone(),
            version_time,
            ..Self::default()
        })
    }
}

/// Resolution metadata accumulated while replaying a log.
///
/// A fold over the entry sequence: no field ever travels backwards in time.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LogMetadata {
    /// The version ID of the returned revision.
    pub version_id: String,

    /// The timestamp of the first log entry.
    pub created: DateTime<Utc>,

    /// The timestamp of the returned revision.
    pub updated: DateTime<Utc>,

    /// The method revision processing the log.
    pub method: String,

    /// The self-certifying identifier committed to by the first entry.
    pub scid: String,

    /// The keys authorized to sign the next log entry.
    pub update_keys: Vec<String>,

    /// Active pre-rotation commitments for the next key rotation.
    pub next_key_hashes: Vec<String>,

    /// Whether key pre-rotation is active.
    pub prerotation: bool,

    /// Whether the DID may move between hosts.
    pub portable: bool,

    /// Whether the DID has been deactivated.
    pub deactivated: bool,

    /// The active witness parameter, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub witness: Option<Witness>,

    /// The active watcher URLs, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watchers: Option<Vec<String>>,

    /// The entry hash of the previous log entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_log_entry_hash: Option<String>,

    /// Maximum time in seconds the resolution may be cached.
    pub ttl: u64,
}

/// The outcome of a successful resolution.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Resolved {
    /// The resolved DID.
    pub did: String,

    /// The document as of the requested revision, with implicit services
    /// and document metadata materialized.
    pub document: Document,

    /// Resolution metadata as of the requested revision.
    pub metadata: LogMetadata,
}

/// Resolve a `did:webvh` DID by fetching its published log.
///
/// The log (and, when witnessing is active, the witness proof file) is
/// retrieved through the supplied [`LogFetcher`] and handed to
/// [`resolve_log`]. Pre-fetched and fetched resolution produce identical
/// results for identical file contents.
///
/// # Errors
///
/// Will fail if the DID is malformed, the log cannot be fetched or parsed,
/// or the log does not verify.
pub async fn resolve(
    did: &str, options: Option<&ResolveOptions>, fetcher: &impl LogFetcher,
    verifier: &impl Verifier,
) -> Result<Resolved, Error> {
    let url: Url = did.parse()?;
    if url.method != Method::WebVh {
        return Err(Error::Config(format!("method not supported: {did}")));
    }
    let did = url.did();

    // selectors may arrive as DID query parameters
    let query_options = url.query.as_ref().map(ResolveOptions::try_from).transpose()?;
    let options = options.or(query_options.as_ref());

    let log_url = log_url(&did)?;
    let raw = fetcher
        .fetch_log(&log_url)
        .await
        .map_err(|e| Error::NotFound(format!("could not fetch DID log from {log_url}: {e}")))?;
    let log = parse_log(&raw)?;

    let witness_declared =
        log.iter().any(|entry| matches!(entry.parameters.witness, Some(Some(_))));
    let witness_proofs = if witness_declared {
        let witness_url = witness_url(&did)?;
        match fetcher.fetch_witness_proofs(&witness_url).await? {
            Some(raw) => Some(parse_witness_proofs(&raw)?),
            None => None,
        }
    } else {
        None
    };

    let resolved = resolve_log(&log, witness_proofs.as_deref(), options, verifier).await?;

    if resolved.metadata.witness.is_some() && witness_proofs.is_none() {
        return Err(Error::Witness(
            "witnessing is active but no witness proof file was found".to_string(),
        ));
    }

    // the log must belong to the DID it was resolved for
    let Some(scid) = url.id.split(':').next() else {
        return Err(Error::Format(format!("no SCID in {did}")));
    };
    if resolved.metadata.scid != scid {
        return Err(Error::Integrity(format!(
            "resolved log does not belong to the requested DID: {} != {scid}",
            resolved.metadata.scid
        )));
    }
    Ok(resolved)
}

/// Verify the contents of a `did.jsonl` log and resolve it into a DID
/// document.
///
/// To use this function, read the log file into a vector of [`LogEntry`]
/// structs and pass it here, together with the witness proof entries from
/// the sibling `did-witness.json` file if witnessing is in play. The
/// injected [`Verifier`] checks every data integrity proof; resolution is
/// impossible without one.
///
/// # Errors
///
/// Will fail if any entry breaks the hash chain, carries an unauthorized or
/// non-verifying proof, or violates method policy — or if the requested
/// version does not exist.
#[allow(clippy::too_many_lines)]
pub async fn resolve_log(
    log: &[LogEntry], witness_proofs: Option<&[WitnessEntry]>, options: Option<&ResolveOptions>,
    verifier: &impl Verifier,
) -> Result<Resolved, Error> {
    if log.is_empty() {
        return Err(Error::NotFound("log contains no entries".to_string()));
    }

    let default_options = ResolveOptions::default();
    let options = options.unwrap_or(&default_options);
    if options.verification_method.is_some()
        && (options.version_number.is_some() || options.version_id.is_some())
    {
        return Err(Error::Policy(
            "ambiguous selector: a verification method cannot be combined with a version"
                .to_string(),
        ));
    }
    let policy = options.policy;

    let mut meta = LogMetadata::default();
    let mut version = SpecVersion::default();
    let mut current_location = String::new();
    let mut prev_version_id = String::new();
    let mut prev_time = DateTime::<Utc>::MIN_UTC;

    for (i, entry) in log.iter().enumerate() {
        let n = i as u64 + 1;

        // 1. Version numbering: `<n>-<hash>` with n incrementing from 1.
        let (number, _) = entry.version_parts()?;
        if number != n {
            return Err(Error::Format(format!(
                "log entries are not sequential: expected {n}, found {number}"
            )));
        }

        // 2. Deactivation is terminal.
        if meta.deactivated {
            return Err(Error::Policy(format!(
                "log entry {} follows a deactivation",
                entry.version_id
            )));
        }

        let params = &entry.parameters;
        let prerotation_active = i > 0 && !meta.next_key_hashes.is_empty();

        // 3. Capture genesis parameters / gate later parameters.
        if i == 0 {
            let Some(method) = &params.method else {
                return Err(Error::Config(
                    "the method parameter is required on the first log entry".to_string(),
                ));
            };
            version = method.parse()?;
            meta.method.clone_from(method);

            let Some(scid) = &params.scid else {
                return Err(Error::Config(
                    "the scid parameter is required on the first log entry".to_string(),
                ));
            };
            meta.scid.clone_from(scid);

            let Some(update_keys) = &params.update_keys else {
                return Err(Error::Config(
                    "update keys are required on the first log entry".to_string(),
                ));
            };
            if update_keys.is_empty() {
                return Err(Error::Config("update keys must not be empty".to_string()));
            }
            meta.update_keys.clone_from(update_keys);

            meta.portable = params.portable.unwrap_or_default();
            meta.next_key_hashes = params.next_key_hashes.clone().unwrap_or_default();
            if let Some(Some(witness)) = &params.witness {
                validate_witness(witness, version)?;
                meta.witness = Some(witness.clone());
            }
            if let Some(watchers) = &params.watchers {
                meta.watchers.clone_from(watchers);
            }
            if let Some(ttl) = params.ttl {
                meta.ttl = ttl;
            }
            meta.created = entry.version_time;
            current_location = location(&entry.state.id);
            prev_version_id.clone_from(scid);

            // the SCID must be the hash of the entry in its pre-SCID form
            if policy.scid_derivation {
                verify_scid(entry, scid)?;
            }
        } else {
            if params.scid.is_some() {
                return Err(Error::Policy(
                    "the scid parameter can only be set on the first log entry".to_string(),
                ));
            }
            if params.portable.is_some() {
                return Err(Error::Policy(
                    "the portable parameter can only be set on the first log entry".to_string(),
                ));
            }
            if let Some(method) = &params.method {
                version = method.parse()?;
                meta.method.clone_from(method);
            }

            let new_location = location(&entry.state.id);
            if !meta.portable && new_location != current_location {
                return Err(Error::Policy(format!(
                    "document location has changed for a non-portable DID: \
                     {current_location} -> {new_location}"
                )));
            }
            current_location = new_location;
        }

        // 4. Select the keys allowed to sign this entry: with pre-rotation
        // active they are the keys this entry rotates to, otherwise the
        // running update keys.
        let signing_keys = if prerotation_active {
            params.update_keys.clone().ok_or_else(|| {
                Error::Policy(
                    "pre-rotation is active but the entry declares no update keys".to_string(),
                )
            })?
        } else {
            meta.update_keys.clone()
        };

        // 5. Hash chain.
        if policy.hash_chain {
            entry.verify_hash(&prev_version_id)?;
        }

        // 6. Controller proofs.
        verify_proofs(entry, &signing_keys, verifier, policy).await?;

        // 7. Pre-rotation compliance: every rotated-to key must have been
        // committed to by the previous entry.
        if prerotation_active && policy.next_keys {
            for key in params.update_keys.iter().flatten() {
                if !meta.next_key_hashes.contains(&derive_next_key_hash(key)?) {
                    return Err(Error::Policy(format!(
                        "update key is not committed by pre-rotation: {key}"
                    )));
                }
            }
        }

        // 8. Entry times move strictly forward and never into the future.
        if entry.version_time > Utc::now() {
            return Err(Error::Format(format!(
                "log entry time is in the future: {}",
                entry.version_time
            )));
        }
        if entry.version_time <= prev_time {
            return Err(Error::Format(format!(
                "log entry times are not monotonically increasing: {} -> {}",
                prev_time, entry.version_time
            )));
        }

        // 9. Parameter transitions.
        if i > 0 {
            if let Some(update_keys) = &params.update_keys {
                meta.update_keys.clone_from(update_keys);
            }
            if let Some(hashes) = &params.next_key_hashes {
                meta.next_key_hashes.clone_from(hashes);
            }
            match &params.witness {
                Some(Some(witness)) => {
                    validate_witness(witness, version)?;
                    meta.witness = Some(witness.clone());
                }
                Some(None) => meta.witness = None,
                None => {}
            }
            match &params.watchers {
                Some(Some(watchers)) => meta.watchers = Some(watchers.clone()),
                Some(None) => meta.watchers = None,
                None => {}
            }
            if let Some(ttl) = params.ttl {
                meta.ttl = ttl;
            }
        }
        if params.deactivated == Some(true) {
            meta.deactivated = true;
        }
        meta.prerotation = !meta.next_key_hashes.is_empty();
        meta.previous_log_entry_hash = if i == 0 {
            None
        } else {
            prev_version_id.split_once('-').map(|(_, hash)| hash.to_string())
        };
        meta.version_id.clone_from(&entry.version_id);
        meta.updated = entry.version_time;

        debug!("accepted log entry {}", entry.version_id);

        // 10. Document finalization.
        if policy.document_state {
            verify_document_state(&entry.state, &meta.scid)?;
        }
        let document = finalize_document(entry, &meta)?;
        let did = document.id.clone();

        // 11. Selector.
        if let Some(selector) = &options.verification_method {
            if document.verification_method(selector).is_some() {
                return Ok(Resolved { did, document, metadata: meta });
            }
        } else if matches_version(options, n, entry, log.get(i + 1)) {
            return Ok(Resolved { did, document, metadata: meta });
        }

        // 12. Witness quorum gates the terminal entry.
        if i == log.len() - 1 {
            if let Some(witness) = &meta.witness {
                if let Some(proofs) = witness_proofs {
                    verify_witness(entry, proofs, witness, version, verifier, policy).await?;
                }
            }
            if has_selector(options) {
                return Err(Error::NotFound(
                    "no log entry matches the requested version".to_string(),
                ));
            }
            return Ok(Resolved { did, document, metadata: meta });
        }

        prev_version_id.clone_from(&entry.version_id);
        prev_time = entry.version_time;
    }

    Err(Error::NotFound("no log entry matches the requested version".to_string()))
}

// Replaying the placeholderized first entry must reproduce the SCID.
fn verify_scid(entry: &LogEntry, scid: &str) -> Result<(), Error> {
    let mut unsigned = entry.clone();
    unsigned.proof = Vec::new();

    // substitutions happen on the textual JSON so canonicalization yields
    // the same bytes the creator hashed
    let text = serde_json::to_string(&unsigned)?;
    let replaced = text.replace(scid, SCID_PLACEHOLDER);
    let mut initial: LogEntry = serde_json::from_str(&replaced)?;
    initial.version_id = SCID_PLACEHOLDER.to_string();

    if initial.hash()? != scid {
        return Err(Error::Integrity(
            "the SCID is not derived from the initial log entry".to_string(),
        ));
    }
    Ok(())
}

fn finalize_document(entry: &LogEntry, meta: &LogMetadata) -> Result<Document, Error> {
    let mut document = entry.state.clone();
    for service in default_services(&document.id)? {
        if document.service(&service.id).is_none() {
            document.service.get_or_insert(vec![]).push(service);
        }
    }
    document.did_document_metadata = Some(DocumentMetadata {
        created: meta.created,
        updated: Some(meta.updated),
        deactivated: meta.deactivated.then_some(true),
        version_id: Some(meta.version_id.clone()),
    });
    Ok(document)
}

fn matches_version(
    options: &ResolveOptions, n: u64, entry: &LogEntry, next: Option<&LogEntry>,
) -> bool {
    if options.version_number == Some(n) {
        return true;
    }
    if options.version_id.as_deref() == Some(entry.version_id.as_str()) {
        return true;
    }
    if let Some(time) = options.version_time {
        return time >= entry.version_time && next.map_or(true, |nx| time < nx.version_time);
    }
    false
}

const fn has_selector(options: &ResolveOptions) -> bool {
    options.version_number.is_some()
        || options.version_id.is_some()
        || options.version_time.is_some()
        || options.verification_method.is_some()
}

// The full host-and-path suffix of a document id, past `did:webvh:<scid>:`.
fn location(id: &str) -> String {
    id.splitn(4, ':').nth(3).unwrap_or_default().to_string()
}
