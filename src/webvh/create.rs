//! Create operation for the `did:webvh` method.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::Kind;
use crate::document::{BASE_CONTEXT, Document};
use crate::error::Error;
use crate::hash::derive_next_key_hash;
use crate::provider::{Signer, Verifier};
use crate::webvh::resolve::{LogMetadata, resolve_log};
use crate::webvh::verify::validate_witness;
use crate::webvh::{
    DidLog, LogEntry, METHOD, Parameters, SCID_PLACEHOLDER, SpecVersion, Witness,
};

/// Builder to create a new `did:webvh` document and associated DID URL and
/// log.
///
/// Use this to construct a [`CreateResult`].
pub struct CreateBuilder<D, U, S> {
    version: SpecVersion,
    portable: bool,
    next_keys: Vec<String>,
    witness: Option<Witness>,
    watchers: Option<Vec<String>>,
    ttl: Option<u64>,
    version_time: Option<DateTime<Utc>>,

    doc: D,
    update_keys: U,
    signer: S,
}

/// Builder does not have a document (can't build).
pub struct NoDocument;

/// Builder has a document (can build).
pub struct WithDocument(Document);

/// Builder does not have update keys (can't build).
pub struct NoUpdateKeys;

/// Builder has update keys (can build).
pub struct WithUpdateKeys(Vec<String>);

/// Builder does not have a signer (can't build).
pub struct NoSigner;

/// Builder has a signer (can build).
pub struct WithSigner<'a, S: Signer>(pub &'a S);

impl CreateBuilder<NoDocument, NoUpdateKeys, NoSigner> {
    /// Create a new `CreateBuilder`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            version: SpecVersion::V1_0,
            portable: false,
            next_keys: vec![],
            witness: None,
            watchers: None,
            ttl: None,
            version_time: None,

            doc: NoDocument,
            update_keys: NoUpdateKeys,
            signer: NoSigner,
        }
    }
}

impl Default for CreateBuilder<NoDocument, NoUpdateKeys, NoSigner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U, S> CreateBuilder<NoDocument, U, S> {
    /// Add the genesis document.
    ///
    /// Use a `DocumentBuilder` with a DID constructed by
    /// [`default_did`](crate::webvh::url::default_did), which carries the
    /// `{SCID}` placeholder. This builder calculates the SCID and
    /// substitutes it during the build.
    ///
    /// # Errors
    ///
    /// Will fail if the document ID does not resemble a
    /// `did:webvh:{SCID}:<host_and_path>` string.
    pub fn document(self, document: &Document) -> Result<CreateBuilder<WithDocument, U, S>, Error> {
        if !document.id.starts_with(&format!("did:{METHOD}:{SCID_PLACEHOLDER}:")) {
            return Err(Error::Config(format!(
                "document ID must start with 'did:{METHOD}:{SCID_PLACEHOLDER}:'"
            )));
        }

        // ensure the base context for this DID method is on the document
        let mut doc = document.clone();
        for ctx in &BASE_CONTEXT {
            let c = Kind::String((*ctx).to_string());
            if !doc.context.contains(&c) {
                doc.context.push(c);
            }
        }

        Ok(CreateBuilder {
            version: self.version,
            portable: self.portable,
            next_keys: self.next_keys,
            witness: self.witness,
            watchers: self.watchers,
            ttl: self.ttl,
            version_time: self.version_time,

            doc: WithDocument(doc),
            update_keys: self.update_keys,
            signer: self.signer,
        })
    }
}

impl<D, S> CreateBuilder<D, NoUpdateKeys, S> {
    /// Add update keys: the multibase-encoded public keys authorized to
    /// sign log entries for the DID.
    ///
    /// # Errors
    ///
    /// Will fail if the update keys are empty.
    pub fn update_keys(
        self, update_keys: Vec<String>,
    ) -> Result<CreateBuilder<D, WithUpdateKeys, S>, Error> {
        if update_keys.is_empty() {
            return Err(Error::Config("update keys must not be empty".to_string()));
        }

        Ok(CreateBuilder {
            version: self.version,
            portable: self.portable,
            next_keys: self.next_keys,
            witness: self.witness,
            watchers: self.watchers,
            ttl: self.ttl,
            version_time: self.version_time,

            doc: self.doc,
            update_keys: WithUpdateKeys(update_keys),
            signer: self.signer,
        })
    }
}

impl<D, U> CreateBuilder<D, U, NoSigner> {
    /// Add the signer holding (one of) the update keys.
    #[must_use]
    pub fn signer<S: Signer>(self, signer: &S) -> CreateBuilder<D, U, WithSigner<'_, S>> {
        CreateBuilder {
            version: self.version,
            portable: self.portable,
            next_keys: self.next_keys,
            witness: self.witness,
            watchers: self.watchers,
            ttl: self.ttl,
            version_time: self.version_time,

            doc: self.doc,
            update_keys: self.update_keys,
            signer: WithSigner(signer),
        }
    }
}

impl<U, S> CreateBuilder<WithDocument, U, S> {
    /// The current document ID (DID) from the builder.
    ///
    /// This carries the `{SCID}` placeholder until the build replaces it.
    #[must_use]
    pub fn did(&self) -> String {
        self.doc.0.id.clone()
    }
}

impl<D, U, S> CreateBuilder<D, U, S> {
    /// Process the log under a specific method revision. Defaults to
    /// `did:webvh:1.0`. Set this before adding witnesses so their shape is
    /// validated under the right rules.
    #[must_use]
    pub const fn method_version(mut self, version: SpecVersion) -> Self {
        self.version = version;
        self
    }

    /// Set the DID to be portable or not (defaults to not portable).
    #[must_use]
    pub const fn portable(mut self, portable: bool) -> Self {
        self.portable = portable;
        self
    }

    /// Add a pre-rotation commitment.
    ///
    /// Pass the multibase-encoded public key intended for the next key
    /// rotation; the hashing happens during the build.
    #[must_use]
    pub fn next_key(mut self, next_key_multibase: impl Into<String>) -> Self {
        self.next_keys.push(next_key_multibase.into());
        self
    }

    /// Declare the witnesses for the DID.
    ///
    /// # Errors
    ///
    /// Will fail if the witness parameter is not valid under the method
    /// revision in effect.
    pub fn witness(mut self, witness: &Witness) -> Result<Self, Error> {
        validate_witness(witness, self.version)?;
        self.witness = Some(witness.clone());
        Ok(self)
    }

    /// Add a watcher URL. Chain to add multiple watchers.
    #[must_use]
    pub fn watcher(mut self, watcher: impl Into<String>) -> Self {
        self.watchers.get_or_insert(vec![]).push(watcher.into());
        self
    }

    /// Set the permissible cache time in seconds for the DID.
    #[must_use]
    pub const fn ttl(mut self, ttl: u64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Set the timestamp recorded on the first log entry. Defaults to the
    /// time of the build.
    #[must_use]
    pub const fn version_time(mut self, version_time: DateTime<Utc>) -> Self {
        self.version_time = Some(version_time);
        self
    }
}

impl<S: Signer> CreateBuilder<WithDocument, WithUpdateKeys, WithSigner<'_, S>> {
    /// Build the genesis log entry.
    ///
    /// The entry is hashed in its placeholder form to derive the SCID, the
    /// SCID is substituted throughout, the versioned entry is signed, and
    /// the result is resolved with the supplied verifier to guarantee the
    /// published log will verify.
    ///
    /// # Errors
    ///
    /// Will fail if hashing or signing fails, or if the finished entry does
    /// not resolve.
    pub async fn build(self, verifier: &impl Verifier) -> Result<CreateResult, Error> {
        let next_key_hashes = self
            .next_keys
            .iter()
            .map(|key| derive_next_key_hash(key))
            .collect::<Result<Vec<_>, _>>()?;

        let parameters = Parameters {
            method: Some(self.version.to_string()),
            scid: Some(SCID_PLACEHOLDER.to_string()),
            update_keys: Some(self.update_keys.0.clone()),
            next_key_hashes: if next_key_hashes.is_empty() { None } else { Some(next_key_hashes) },
            portable: Some(self.portable),
            witness: self.witness.clone().map(Some),
            watchers: self.watchers.clone().map(Some),
            deactivated: None,
            ttl: self.ttl,
        };

        // the initial entry, with the SCID placeholder standing in for both
        // the SCID and the version ID
        let initial = LogEntry {
            version_id: SCID_PLACEHOLDER.to_string(),
            version_time: self.version_time.unwrap_or_else(crate::webvh::now),
            parameters,
            state: self.doc.0.clone(),
            proof: vec![],
        };

        // the SCID is the hash of the entry in placeholder form
        let scid = initial.hash()?;

        // substitute the SCID on the textual JSON so canonicalization is
        // reproducible at verification time
        let text = serde_json::to_string(&initial)?;
        let replaced = text.replace(SCID_PLACEHOLDER, &scid);
        let mut entry: LogEntry = serde_json::from_str(&replaced)?;

        let entry_hash = entry.hash()?;
        entry.version_id = format!("1-{entry_hash}");

        entry.sign(self.signer.0).await?;

        // the finished entry must resolve with the same engine that will
        // verify it in the wild
        let log = vec![entry];
        let resolved = resolve_log(&log, None, None, verifier).await?;

        Ok(CreateResult {
            did: resolved.did,
            document: resolved.document,
            metadata: resolved.metadata,
            log,
        })
    }
}

/// Output of a `create` operation.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CreateResult {
    /// The `did:webvh` DID.
    pub did: String,

    /// The resolved genesis document.
    pub document: Document,

    /// Resolution metadata for the genesis version.
    pub metadata: LogMetadata,

    /// Version history log with the single created entry, suitable for
    /// writing to a `did.jsonl` log file.
    pub log: DidLog,
}
