//! Update operation for the `did:webvh` method.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::Error;
use crate::hash::derive_next_key_hash;
use crate::provider::{Signer, Verifier};
use crate::webvh::resolve::{LogMetadata, resolve_log};
use crate::webvh::verify::validate_witness;
use crate::webvh::{
    DidLog, LogEntry, METHOD, Parameters, SpecVersion, Witness, WitnessEntry,
};

/// Builder to update a `did:webvh` document and append the log entry
/// describing the change.
///
/// Use this to construct an [`UpdateResult`].
pub struct UpdateBuilder<S> {
    log: DidLog,
    version: SpecVersion,
    witness_proofs: Option<Vec<WitnessEntry>>,
    document: Option<Document>,
    update_keys: Option<Vec<String>>,
    next_keys: Vec<String>,
    witness: Option<Option<Witness>>,
    watchers: Option<Option<Vec<String>>>,
    ttl: Option<u64>,
    version_time: Option<DateTime<Utc>>,
    signer: S,
}

/// Builder does not have a signer (can't build).
pub struct NoSigner;

/// Builder has a signer (can build).
pub struct WithSigner<'a, S: Signer>(pub &'a S);

impl UpdateBuilder<NoSigner> {
    /// Create an update builder over the current log.
    ///
    /// # Errors
    ///
    /// Will fail if the log is empty or its first entry does not name a
    /// supported method revision.
    pub fn from(log: DidLog) -> Result<Self, Error> {
        let Some(first) = log.first() else {
            return Err(Error::Config("log must not be empty".to_string()));
        };
        let Some(method) = &first.parameters.method else {
            return Err(Error::Config(
                "the method parameter is required on the first log entry".to_string(),
            ));
        };
        let version = method.parse()?;

        Ok(Self {
            log,
            version,
            witness_proofs: None,
            document: None,
            update_keys: None,
            next_keys: vec![],
            witness: None,
            watchers: None,
            ttl: None,
            version_time: None,
            signer: NoSigner,
        })
    }
}

impl<S> UpdateBuilder<S> {
    /// Replace the DID document.
    ///
    /// When not called, the document from the latest log entry is carried
    /// forward unchanged.
    #[must_use]
    pub fn document(mut self, document: Document) -> Self {
        self.document = Some(document);
        self
    }

    /// Witness proofs published for the current log, used to validate it
    /// before the update is applied.
    #[must_use]
    pub fn witness_proofs(mut self, proofs: Vec<WitnessEntry>) -> Self {
        self.witness_proofs = Some(proofs);
        self
    }

    /// Rotate the update keys.
    ///
    /// `update_keys` are the multibase-encoded public keys authorized to
    /// sign log entries from this update on. When pre-rotation is active
    /// each of them, hashed, must match a commitment from the current log —
    /// that is enforced when the new entry is verified.
    ///
    /// `next_keys` are the multibase-encoded public keys committed to for
    /// the rotation after this one (hashed during the build). Leave empty to
    /// end pre-rotation.
    ///
    /// Who signs the rotation entry depends on whether a commitment is
    /// outstanding: with no pre-rotation active, the current update keys
    /// sign it and the new keys only take over from the next entry; while
    /// pre-rotation is active, the entry is signed by the rotated-to keys
    /// it reveals.
    #[must_use]
    pub fn rotate_keys(mut self, update_keys: &[String], next_keys: &[String]) -> Self {
        self.update_keys = Some(update_keys.to_vec());
        self.next_keys = next_keys.to_vec();
        self
    }

    /// Replace the witness parameter for the DID.
    ///
    /// When not called, the witness information from the current log stays
    /// in effect. To stop witnessing, call [`Self::clear_witness`].
    ///
    /// # Errors
    ///
    /// Will fail if the witness parameter is not valid under the log's
    /// method revision.
    pub fn witness(mut self, witness: &Witness) -> Result<Self, Error> {
        validate_witness(witness, self.version)?;
        self.witness = Some(Some(witness.clone()));
        Ok(self)
    }

    /// Stop witnessing from this update on.
    #[must_use]
    pub fn clear_witness(mut self) -> Self {
        self.witness = Some(None);
        self
    }

    /// Replace the watcher list for the DID.
    #[must_use]
    pub fn watchers(mut self, watchers: Vec<String>) -> Self {
        self.watchers = Some(Some(watchers));
        self
    }

    /// Clear the watcher list from this update on.
    #[must_use]
    pub fn clear_watchers(mut self) -> Self {
        self.watchers = Some(None);
        self
    }

    /// Set the permissible cache time in seconds for the DID.
    #[must_use]
    pub const fn ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the timestamp recorded on the new log entry. Defaults to the
    /// time of the build.
    #[must_use]
    pub const fn version_time(mut self, version_time: DateTime<Utc>) -> Self {
        self.version_time = Some(version_time);
        self
    }
}

impl UpdateBuilder<NoSigner> {
    /// Add the signer holding (one of) the currently authorized update
    /// keys.
    #[must_use]
    pub fn signer<S: Signer>(self, signer: &S) -> UpdateBuilder<WithSigner<'_, S>> {
        UpdateBuilder {
            log: self.log,
            version: self.version,
            witness_proofs: self.witness_proofs,
            document: self.document,
            update_keys: self.update_keys,
            next_keys: self.next_keys,
            witness: self.witness,
            watchers: self.watchers,
            ttl: self.ttl,
            version_time: self.version_time,
            signer: WithSigner(signer),
        }
    }
}

impl<S: Signer> UpdateBuilder<WithSigner<'_, S>> {
    /// Build the new log entry and append it to the log.
    ///
    /// The current log is resolved first — an update can only extend a log
    /// that verifies — and the extended log is resolved again before it is
    /// returned.
    ///
    /// # Errors
    ///
    /// Will fail if the current log does not verify, the DID is
    /// deactivated, a policy gate rejects the change, or signing fails.
    pub async fn build(self, verifier: &impl Verifier) -> Result<UpdateResult, Error> {
        // an update can only extend a log that verifies
        let current =
            resolve_log(&self.log, self.witness_proofs.as_deref(), None, verifier).await?;
        if current.metadata.deactivated {
            return Err(Error::Policy("cannot update a deactivated DID".to_string()));
        }

        let Some(last) = self.log.last() else {
            return Err(Error::Config("log must not be empty".to_string()));
        };

        let mut document = self.document.clone().unwrap_or_else(|| last.state.clone());
        // resolution artifacts never land in logged state
        document.did_document_metadata = None;

        if last.state.id != document.id {
            if !current.metadata.portable {
                return Err(Error::Policy(
                    "document location has changed for a non-portable DID".to_string(),
                ));
            }
            let prefix = format!("did:{METHOD}:{}:", current.metadata.scid);
            if !document.id.starts_with(&prefix) {
                return Err(Error::Policy(
                    "the SCID cannot change when a portable DID moves".to_string(),
                ));
            }
        }

        let mut parameters = Parameters::default();
        if let Some(update_keys) = &self.update_keys {
            if update_keys.is_empty() {
                return Err(Error::Config("update keys must not be empty".to_string()));
            }
            parameters.update_keys = Some(update_keys.clone());
            let next_key_hashes = self
                .next_keys
                .iter()
                .map(|key| derive_next_key_hash(key))
                .collect::<Result<Vec<_>, _>>()?;
            // an empty list ends pre-rotation
            parameters.next_key_hashes = Some(next_key_hashes);
        } else if current.metadata.prerotation {
            return Err(Error::Policy(
                "pre-rotation is active: the update must rotate to committed keys".to_string(),
            ));
        }
        parameters.witness.clone_from(&self.witness);
        parameters.watchers.clone_from(&self.watchers);
        parameters.ttl = self.ttl;

        let mut entry = LogEntry {
            version_id: last.version_id.clone(),
            version_time: self.version_time.unwrap_or_else(crate::webvh::now),
            parameters,
            state: document,
            proof: vec![],
        };

        let (number, _) = last.version_parts()?;
        let entry_hash = entry.hash()?;
        entry.version_id = format!("{}-{entry_hash}", number + 1);

        entry.sign(self.signer.0).await?;

        let mut log = self.log;
        log.push(entry);

        // witness proofs for the new entry cannot exist yet, so the
        // self-check runs without the witness quorum gate
        let resolved = resolve_log(&log, None, None, verifier).await?;

        Ok(UpdateResult {
            did: resolved.did,
            document: resolved.document,
            metadata: resolved.metadata,
            log,
        })
    }
}

/// Output of an `update` operation.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct UpdateResult {
    /// The `did:webvh` DID.
    pub did: String,

    /// The resolved document as of the update.
    pub document: Document,

    /// Resolution metadata as of the update.
    pub metadata: LogMetadata,

    /// The original log appended with the entry describing this update.
    pub log: DidLog,
}
