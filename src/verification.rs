//! Verification methods: public key descriptors embedded in DID documents.

use serde::{Deserialize, Serialize};

/// The format of a verification method's key material.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum MethodType {
    /// Multibase-encoded key with a multicodec prefix.
    #[default]
    Multikey,
}

/// A public-key descriptor embedded (by value) in a DID document.
///
/// MAY include additional properties as registered in the
/// [DID Specification Registries](https://www.w3.org/TR/did-spec-registries/).
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    /// A DID URL that identifies the verification method.
    ///
    /// May be left empty when handing the method to a `DocumentBuilder`,
    /// which derives an identifier from the key material.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    /// The format of the public key material.
    #[serde(rename = "type")]
    pub type_: MethodType,

    /// The DID of the controller of the verification method.
    pub controller: String,

    /// The public key, multibase encoded with a multicodec prefix.
    pub public_key_multibase: String,

    /// The matching secret key, multibase encoded. Only ever populated on
    /// caller-side key material; stripped before the method is embedded in a
    /// document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key_multibase: Option<String>,

    /// The verification relationship this method should be indexed under
    /// when assembling a document. Not part of the serialized method.
    #[serde(skip)]
    pub purpose: Option<KeyPurpose>,
}

impl VerificationMethod {
    /// Create a `Multikey` verification method for the given public key and
    /// controller, leaving the identifier for document assembly to derive.
    #[must_use]
    pub fn multikey(public_key_multibase: impl Into<String>, controller: impl Into<String>) -> Self {
        Self {
            public_key_multibase: public_key_multibase.into(),
            controller: controller.into(),
            ..Self::default()
        }
    }

    /// Set the method identifier.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the verification relationship the method should be indexed under.
    #[must_use]
    pub fn for_purpose(mut self, purpose: KeyPurpose) -> Self {
        self.purpose = Some(purpose);
        self
    }

    /// Infer the DID from the method identifier.
    #[must_use]
    pub fn did(&self) -> String {
        self.id.split('#').next().unwrap_or_default().to_string()
    }
}

/// The verification relationships a method can be indexed under.
#[derive(Clone, Copy, Debug, Deserialize, Hash, PartialEq, Serialize, Eq)]
pub enum KeyPurpose {
    /// The document's `authentication` field.
    Authentication,

    /// The document's `assertionMethod` field.
    AssertionMethod,

    /// The document's `keyAgreement` field.
    KeyAgreement,

    /// The document's `capabilityInvocation` field.
    CapabilityInvocation,

    /// The document's `capabilityDelegation` field.
    CapabilityDelegation,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multikey_serialization() {
        let vm = VerificationMethod::multikey(
            "z6MkmM42vxfqZQsv4ehtTjFFxQ4sQKS2w6WR7emozFAn5cxu",
            "did:webvh:123:example.com",
        )
        .with_id("did:webvh:123:example.com#ozFAn5cxu");

        let ser = serde_json::to_value(&vm).unwrap();
        let json = serde_json::json!({
            "id": "did:webvh:123:example.com#ozFAn5cxu",
            "type": "Multikey",
            "controller": "did:webvh:123:example.com",
            "publicKeyMultibase": "z6MkmM42vxfqZQsv4ehtTjFFxQ4sQKS2w6WR7emozFAn5cxu"
        });
        assert_eq!(ser, json);
    }

    #[test]
    fn purpose_is_not_serialized() {
        let vm = VerificationMethod::multikey("z6Mk", "did:webvh:123:example.com")
            .with_id("did:webvh:123:example.com#key-0")
            .for_purpose(KeyPurpose::AssertionMethod);
        let ser = serde_json::to_value(&vm).unwrap();
        assert!(ser.get("purpose").is_none());

        let parsed: VerificationMethod = serde_json::from_value(ser).unwrap();
        assert_eq!(parsed.purpose, None);
    }
}
