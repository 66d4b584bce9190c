//! Deactivate operation for the `did:webvh` method.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::Error;
use crate::provider::{Signer, Verifier};
use crate::webvh::resolve::{LogMetadata, resolve_log};
use crate::webvh::{DidLog, LogEntry, Parameters};

/// Builder to deactivate a `did:webvh` DID by appending a terminal log
/// entry.
///
/// Use this to construct a [`DeactivateResult`].
pub struct DeactivateBuilder<S> {
    log: DidLog,
    update_keys: Option<Vec<String>>,
    version_time: Option<DateTime<Utc>>,
    signer: S,
}

/// Builder does not have a signer (can't build).
pub struct NoSigner;

/// Builder has a signer (can build).
pub struct WithSigner<'a, S: Signer>(pub &'a S);

impl DeactivateBuilder<NoSigner> {
    /// Create a deactivate builder over the current log.
    ///
    /// # Errors
    ///
    /// Will fail if the log is empty.
    pub fn from(log: DidLog) -> Result<Self, Error> {
        if log.is_empty() {
            return Err(Error::Config("log must not be empty".to_string()));
        }
        Ok(Self {
            log,
            update_keys: None,
            version_time: None,
            signer: NoSigner,
        })
    }

    /// Add the signer holding (one of) the currently authorized update
    /// keys.
    #[must_use]
    pub fn signer<S: Signer>(self, signer: &S) -> DeactivateBuilder<WithSigner<'_, S>> {
        DeactivateBuilder {
            log: self.log,
            update_keys: self.update_keys,
            version_time: self.version_time,
            signer: WithSigner(signer),
        }
    }
}

impl<S> DeactivateBuilder<S> {
    /// Rotate the update keys one final time on the terminal entry.
    ///
    /// Required when pre-rotation is active: the terminal entry must rotate
    /// to keys committed by the current log. No further parameter changes
    /// are possible on or after a deactivation.
    #[must_use]
    pub fn rotate_keys(mut self, update_keys: &[String]) -> Self {
        self.update_keys = Some(update_keys.to_vec());
        self
    }

    /// Set the timestamp recorded on the terminal log entry. Defaults to
    /// the time of the build.
    #[must_use]
    pub const fn version_time(mut self, version_time: DateTime<Utc>) -> Self {
        self.version_time = Some(version_time);
        self
    }
}

impl<S: Signer> DeactivateBuilder<WithSigner<'_, S>> {
    /// Build the terminal log entry and append it to the log.
    ///
    /// # Errors
    ///
    /// Will fail if the current log does not verify, the DID is already
    /// deactivated, or signing fails.
    pub async fn build(self, verifier: &impl Verifier) -> Result<DeactivateResult, Error> {
        let current = resolve_log(&self.log, None, None, verifier).await?;
        if current.metadata.deactivated {
            return Err(Error::Policy("the DID is already deactivated".to_string()));
        }
        if current.metadata.prerotation && self.update_keys.is_none() {
            return Err(Error::Policy(
                "pre-rotation is active: deactivation must rotate to committed keys".to_string(),
            ));
        }

        let Some(last) = self.log.last() else {
            return Err(Error::Config("log must not be empty".to_string()));
        };

        let parameters = Parameters {
            update_keys: self.update_keys.clone(),
            // pre-rotation ends with the DID
            next_key_hashes: Some(vec![]),
            deactivated: Some(true),
            ..Parameters::default()
        };

        let mut entry = LogEntry {
            version_id: last.version_id.clone(),
            version_time: self.version_time.unwrap_or_else(crate::webvh::now),
            parameters,
            state: last.state.clone(),
            proof: vec![],
        };

        let (number, _) = last.version_parts()?;
        let entry_hash = entry.hash()?;
        entry.version_id = format!("{}-{entry_hash}", number + 1);

        entry.sign(self.signer.0).await?;

        let mut log = self.log;
        log.push(entry);

        let resolved = resolve_log(&log, None, None, verifier).await?;

        Ok(DeactivateResult {
            did: resolved.did,
            document: resolved.document,
            metadata: resolved.metadata,
            log,
        })
    }
}

/// Output of a `deactivate` operation.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DeactivateResult {
    /// The `did:webvh` DID.
    pub did: String,

    /// The resolved document as of the deactivation.
    pub document: Document,

    /// Resolution metadata for the terminal version. `deactivated` is
    /// `true`.
    pub metadata: LogMetadata,

    /// The original log appended with the terminal entry.
    pub log: DidLog,
}
