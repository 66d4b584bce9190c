//! # DID Document
//!
//! Assembly of DID documents from verification methods and services, plus
//! the document metadata attached during resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{Kind, OneMany};
use crate::error::Error;
use crate::verification::{KeyPurpose, VerificationMethod};

/// Base contexts added to every assembled DID document.
pub const BASE_CONTEXT: [&str; 2] =
    ["https://www.w3.org/ns/did/v1", "https://www.w3.org/ns/cid/v1"];

/// DID Document.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// The context of the DID document.
    #[serde(rename = "@context")]
    pub context: Vec<Kind<Value>>,

    /// The DID for the DID subject.
    pub id: String,

    /// The controller(s) of the DID document. Equal to `id` for
    /// self-controlled DIDs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<OneMany<String>>,

    /// Other identifiers for the DID subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub also_known_as: Option<Vec<String>>,

    /// The `authentication` verification relationship.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Vec<Kind<VerificationMethod>>>,

    /// The `assertionMethod` verification relationship.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_method: Option<Vec<Kind<VerificationMethod>>>,

    /// The `keyAgreement` verification relationship.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_agreement: Option<Vec<Kind<VerificationMethod>>>,

    /// The `capabilityInvocation` verification relationship.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability_invocation: Option<Vec<Kind<VerificationMethod>>>,

    /// The `capabilityDelegation` verification relationship.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability_delegation: Option<Vec<Kind<VerificationMethod>>>,

    /// Verification methods for the DID subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<Vec<VerificationMethod>>,

    /// Services expressing ways of communicating with the DID subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<Vec<Service>>,

    /// Metadata about the document, attached during resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_document_metadata: Option<DocumentMetadata>,
}

impl Document {
    /// Retrieve a service by its ID.
    #[must_use]
    pub fn service(&self, id: &str) -> Option<&Service> {
        self.service.as_ref()?.iter().find(|s| s.id == id)
    }

    /// Retrieve a verification method by its full ID or `#fragment`.
    #[must_use]
    pub fn verification_method(&self, id: &str) -> Option<&VerificationMethod> {
        self.verification_method.as_ref()?.iter().find(|vm| {
            vm.id == id
                || id.strip_prefix('#').is_some_and(|frag| {
                    vm.id.split('#').next_back() == Some(frag)
                })
        })
    }
}

/// A service endpoint associated with the DID subject.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// The service identifier, a URI. Typically `<did>#<name>`.
    pub id: String,

    /// The service type.
    #[serde(rename = "type")]
    pub type_: String,

    /// One or more endpoints for the service.
    pub service_endpoint: OneMany<Kind<Value>>,
}

impl Service {
    /// Construct a service with a single string endpoint.
    #[must_use]
    pub fn new(
        id: impl Into<String>, type_: impl Into<String>, endpoint: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            type_: type_.into(),
            service_endpoint: OneMany::One(Kind::String(endpoint.into())),
        }
    }
}

/// DID document builder.
///
/// Verification methods are indexed into relationship arrays by their
/// `purpose`, defaulting to `authentication`. Methods without an ID get one
/// derived from the tail of their public key. Explicitly set relationship
/// arrays override the derived ones.
pub struct DocumentBuilder {
    did: String,
    also_known_as: Option<Vec<String>>,
    controller: Option<OneMany<String>>,
    verification_methods: Vec<VerificationMethod>,
    authentication: Option<Vec<Kind<VerificationMethod>>>,
    assertion_method: Option<Vec<Kind<VerificationMethod>>>,
    key_agreement: Option<Vec<Kind<VerificationMethod>>>,
    capability_invocation: Option<Vec<Kind<VerificationMethod>>>,
    capability_delegation: Option<Vec<Kind<VerificationMethod>>>,
    service: Option<Vec<Service>>,
    context: Vec<Kind<Value>>,
}

impl DocumentBuilder {
    /// Creates a new `DocumentBuilder` for the given DID.
    #[must_use]
    pub fn new(did: impl Into<String>) -> Self {
        Self {
            did: did.into(),
            also_known_as: None,
            controller: None,
            verification_methods: vec![],
            authentication: None,
            assertion_method: None,
            key_agreement: None,
            capability_invocation: None,
            capability_delegation: None,
            service: None,
            context: BASE_CONTEXT.iter().map(|ctx| Kind::String((*ctx).to_string())).collect(),
        }
    }

    /// Add an also-known-as identifier.
    #[must_use]
    pub fn also_known_as(mut self, aka: impl Into<String>) -> Self {
        self.also_known_as.get_or_insert(vec![]).push(aka.into());
        self
    }

    /// Add a controller. Chain to add multiple controllers.
    #[must_use]
    pub fn controller(mut self, controller: impl Into<String>) -> Self {
        match &mut self.controller {
            Some(c) => c.add(controller.into()),
            None => self.controller = Some(OneMany::One(controller.into())),
        }
        self
    }

    /// Add a verification method.
    ///
    /// The method's `purpose` determines which relationship array it is
    /// referenced from; methods without a purpose land in `authentication`.
    #[must_use]
    pub fn verification_method(mut self, vm: VerificationMethod) -> Self {
        self.verification_methods.push(vm);
        self
    }

    /// Set the `authentication` relationship explicitly, overriding any
    /// entries derived from verification method purposes.
    #[must_use]
    pub fn authentication(mut self, entry: Kind<VerificationMethod>) -> Self {
        self.authentication.get_or_insert(vec![]).push(entry);
        self
    }

    /// Set the `assertionMethod` relationship explicitly, overriding any
    /// entries derived from verification method purposes.
    #[must_use]
    pub fn assertion_method(mut self, entry: Kind<VerificationMethod>) -> Self {
        self.assertion_method.get_or_insert(vec![]).push(entry);
        self
    }

    /// Set the `keyAgreement` relationship explicitly, overriding any entries
    /// derived from verification method purposes.
    #[must_use]
    pub fn key_agreement(mut self, entry: Kind<VerificationMethod>) -> Self {
        self.key_agreement.get_or_insert(vec![]).push(entry);
        self
    }

    /// Add an entry to the `capabilityInvocation` relationship.
    #[must_use]
    pub fn capability_invocation(mut self, entry: Kind<VerificationMethod>) -> Self {
        self.capability_invocation.get_or_insert(vec![]).push(entry);
        self
    }

    /// Add an entry to the `capabilityDelegation` relationship.
    #[must_use]
    pub fn capability_delegation(mut self, entry: Kind<VerificationMethod>) -> Self {
        self.capability_delegation.get_or_insert(vec![]).push(entry);
        self
    }

    /// Add a service endpoint. Chain to add multiple services.
    #[must_use]
    pub fn service(mut self, service: Service) -> Self {
        self.service.get_or_insert(vec![]).push(service);
        self
    }

    /// Add a context. Chain to add multiple contexts.
    #[must_use]
    pub fn context(mut self, context: Kind<Value>) -> Self {
        self.context.push(context);
        self
    }

    /// Build the DID document.
    ///
    /// # Errors
    ///
    /// Will fail if a verification method has no public key to derive an
    /// identifier from.
    pub fn build(self) -> Result<Document, Error> {
        let did = self.did;

        let mut methods = vec![];
        let mut derived: [Option<Vec<Kind<VerificationMethod>>>; 5] = Default::default();

        for mut vm in self.verification_methods {
            if vm.id.is_empty() {
                if vm.public_key_multibase.is_empty() {
                    return Err(Error::Config(
                        "verification method has no public key to derive an id from".to_string(),
                    ));
                }
                let tail: String = vm
                    .public_key_multibase
                    .chars()
                    .rev()
                    .take(8)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .rev()
                    .collect();
                vm.id = format!("{did}#{tail}");
            }
            if vm.controller.is_empty() {
                vm.controller.clone_from(&did);
            }

            let purpose = vm.purpose.take().unwrap_or(KeyPurpose::Authentication);
            let fragment =
                vm.id.split('#').next_back().map_or_else(String::new, |f| format!("#{f}"));

            // secrets never travel into a published document
            vm.secret_key_multibase = None;

            let slot = match purpose {
                KeyPurpose::Authentication => 0,
                KeyPurpose::AssertionMethod => 1,
                KeyPurpose::KeyAgreement => 2,
                KeyPurpose::CapabilityInvocation => 3,
                KeyPurpose::CapabilityDelegation => 4,
            };
            derived[slot].get_or_insert(vec![]).push(Kind::String(fragment));
            methods.push(vm);
        }

        let [authentication, assertion_method, key_agreement, capability_invocation, capability_delegation] =
            derived;

        Ok(Document {
            context: self.context,
            id: did,
            controller: self.controller,
            also_known_as: self.also_known_as,
            authentication: self.authentication.or(authentication),
            assertion_method: self.assertion_method.or(assertion_method),
            key_agreement: self.key_agreement.or(key_agreement),
            capability_invocation: self.capability_invocation.or(capability_invocation),
            capability_delegation: self.capability_delegation.or(capability_delegation),
            verification_method: if methods.is_empty() { None } else { Some(methods) },
            service: self.service,
            did_document_metadata: None,
        })
    }
}

/// DID document metadata. Attached to resolved documents; never part of the
/// logged document state.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    /// Timestamp of the create operation (the first log entry).
    pub created: DateTime<Utc>,

    /// Timestamp of the last update operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,

    /// Set to `true` if the DID has been deactivated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deactivated: Option<bool>,

    /// The version of the last update operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,
}
