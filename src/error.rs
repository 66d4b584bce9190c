//! Error types raised while building or resolving `did:webvh` logs.
//!
//! Every failure aborts the operation that raised it — there are no partial
//! resolution results. The variants group failures the way a DID resolution
//! host needs to report them, so the mapping to problem details is a single
//! `match`.

use thiserror::Error;

/// Errors raised by log validation, resolution, and the mutator builders.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input: bad multibase/multihash, unparseable JSON line,
    /// unexpected `versionId` format, or an invalid timestamp.
    #[error("malformed input: {0}")]
    Format(String),

    /// A recomputed hash does not match the stored one: broken hash chain or
    /// an SCID that is not derived from the initial log entry.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// A proof was produced by a key that is not authorized to sign the log
    /// entry it is attached to.
    #[error("unauthorized: {0}")]
    Authorization(String),

    /// A method policy was violated: portability, pre-rotation, update after
    /// deactivation, or an ambiguous resolution selector.
    #[error("policy violation: {0}")]
    Policy(String),

    /// Signature verification failed, a public key is malformed, or a proof
    /// uses an unsupported cryptosuite.
    #[error("cryptographic verification failed: {0}")]
    Crypto(String),

    /// Witness attestations do not satisfy the declared witness parameters.
    #[error("witness verification failed: {0}")]
    Witness(String),

    /// The caller has not supplied something the operation requires, such as
    /// update keys on a create operation.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The log (or a requested version within it) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Failure raised by an injected capability (signer, verifier, fetcher).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// The DID resolution problem-details `error` value for this failure.
    ///
    /// Hosts serving DID resolution results can use this to populate
    /// `didResolutionMetadata.error` without matching on variants themselves.
    #[must_use]
    pub const fn problem_type(&self) -> &'static str {
        match self {
            Self::Format(_) => "invalidDid",
            Self::NotFound(_) => "notFound",
            Self::Config(_) => "methodNotSupported",
            Self::Integrity(_)
            | Self::Authorization(_)
            | Self::Policy(_)
            | Self::Crypto(_)
            | Self::Witness(_)
            | Self::Other(_) => "invalidDidDocument",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Format(format!("JSON serialization failed: {e}"))
    }
}

impl From<multibase::Error> for Error {
    fn from(e: multibase::Error) -> Self {
        Self::Format(format!("multibase decoding failed: {e}"))
    }
}

impl From<chrono::ParseError> for Error {
    fn from(e: chrono::ParseError) -> Self {
        Self::Format(format!("invalid timestamp: {e}"))
    }
}
