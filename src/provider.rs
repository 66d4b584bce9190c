//! # Provider Traits
//!
//! Capabilities the host injects into the engine. The engine owns no key
//! material and no transport: signing, signature verification, and fetching
//! are all delegated through these traits.

use std::future::Future;

use anyhow::Result;

/// [`Signer`] produces signatures over bytes the engine composes.
///
/// The engine hashes the canonicalized proof configuration and document,
/// concatenates the hashes, and hands the result to `sign`. The returned
/// signature is stored multibase-encoded as the proof's `proofValue`.
pub trait Signer: Send + Sync {
    /// Sign the payload and return the raw signature bytes.
    fn sign(&self, payload: &[u8]) -> impl Future<Output = Result<Vec<u8>>> + Send;

    /// The verification method the verifier should use to verify this
    /// signer's signatures. A DID URL, typically `did:key:<mb>#<mb>`.
    ///
    /// Async and fallible because the implementer may need to access key
    /// information to construct the method reference.
    fn verification_method(&self) -> impl Future<Output = Result<String>> + Send;
}

/// [`Verifier`] checks signatures produced by a [`Signer`].
///
/// Stateless: the engine resolves the public key from the proof's
/// verification method and composes the message exactly as it does for
/// signing. Implementations return an error when the signature does not
/// verify.
pub trait Verifier: Send + Sync {
    /// Verify `signature` over `message` with the given raw public key.
    fn verify(
        &self, signature: &[u8], message: &[u8], public_key: &[u8],
    ) -> impl Future<Output = Result<()>> + Send;
}

/// [`LogFetcher`] retrieves published DID log artifacts.
///
/// Implementers need only return the raw file contents for the given URL —
/// directly over HTTP, from a local cache, or from a test fixture. The
/// engine accepts pre-fetched data everywhere, so resolution is testable
/// without any fetcher at all.
pub trait LogFetcher: Send + Sync {
    /// Fetch the raw JSON Lines content of a `did.jsonl` file.
    fn fetch_log(&self, url: &str) -> impl Future<Output = Result<String>> + Send;

    /// Fetch the raw JSON content of a sibling `did-witness.json` file.
    ///
    /// Returns `None` when no witness file is published at the URL.
    fn fetch_witness_proofs(
        &self, url: &str,
    ) -> impl Future<Output = Result<Option<String>>> + Send;
}
