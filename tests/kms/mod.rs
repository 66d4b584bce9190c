//! Ed25519 keyring and verifier used by the integration tests.
//!
//! The engine owns no key material, so the tests inject this keyring as the
//! signing capability and its companion verifier as the verification
//! capability.
#![allow(dead_code)]

use anyhow::anyhow;
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;

use didwebvh::hash::public_multikey;

pub struct Keyring {
    signing_key: SigningKey,
}

pub fn new_keyring() -> Keyring {
    Keyring {
        signing_key: SigningKey::generate(&mut OsRng),
    }
}

impl Keyring {
    /// The public key as a multibase-encoded multikey.
    pub fn verifying_multibase(&self) -> String {
        public_multikey(self.signing_key.verifying_key().as_bytes())
    }

    /// The keyring's `did:key` DID.
    pub fn did_key(&self) -> String {
        format!("did:key:{}", self.verifying_multibase())
    }

    /// The keyring's verification method DID URL.
    pub fn verification_method_id(&self) -> String {
        let multibase = self.verifying_multibase();
        format!("did:key:{multibase}#{multibase}")
    }
}

impl didwebvh::Signer for Keyring {
    async fn sign(&self, payload: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(self.signing_key.sign(payload).to_bytes().to_vec())
    }

    async fn verification_method(&self) -> anyhow::Result<String> {
        Ok(self.verification_method_id())
    }
}

/// Stateless Ed25519 verification over raw public key bytes.
pub struct Ed25519Verifier;

impl didwebvh::Verifier for Ed25519Verifier {
    async fn verify(
        &self, signature: &[u8], message: &[u8], public_key: &[u8],
    ) -> anyhow::Result<()> {
        let key: [u8; 32] =
            public_key.try_into().map_err(|_| anyhow!("invalid public key length"))?;
        let verifying_key = VerifyingKey::from_bytes(&key)?;
        let signature = Signature::from_slice(signature)?;
        verifying_key
            .verify(message, &signature)
            .map_err(|e| anyhow!("signature verification failed: {e}"))
    }
}
