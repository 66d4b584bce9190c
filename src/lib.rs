//! # DID Web with Verifiable History
//!
//! A log engine for the `did:webvh` method: a DID bound to an append-only
//! log of signed entries published at a web location. The crate creates,
//! updates, and deactivates DID logs, and resolves them by replaying every
//! entry from genesis — verifying the hash chain, the self-certifying
//! identifier, data integrity proofs, key rotation policy, and witness
//! quorum along the way.
//!
//! The engine owns no cryptography and no transport: signing, signature
//! verification, and fetching are injected through the [`Signer`],
//! [`Verifier`], and [`LogFetcher`] capabilities, so any signature scheme
//! a cryptosuite calls for can be plugged in.
//!
//! See: <https://identity.foundation/didwebvh/>

pub mod core;
mod document;
mod error;
pub mod hash;
mod proof;
mod provider;
mod url;
mod verification;
pub mod webvh;

pub use crate::document::{
    BASE_CONTEXT, Document, DocumentBuilder, DocumentMetadata, Service,
};
pub use crate::error::Error;
pub use crate::proof::{CRYPTOSUITE, PROOF_TYPE, Proof, signing_input};
pub use crate::provider::{LogFetcher, Signer, Verifier};
pub use crate::url::{Method, QueryParams, Url};
pub use crate::verification::{KeyPurpose, MethodType, VerificationMethod};

/// Returns method-specific errors.
pub type Result<T> = std::result::Result<T, Error>;
