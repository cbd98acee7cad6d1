//! # DID Document
//!
//! A DID Document is a JSON-LD document that contains information related to a
//! DID.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::verification::{Relationship, VerificationMethod};
use crate::core::{Kind, OneMany};

/// Contexts added to synthesized DID documents.
pub const CONTEXT: [&str; 2] =
    ["https://www.w3.org/ns/did/v1", "https://w3id.org/security/suites/jws-2020/v1"];

/// DID Document
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// The context of the DID document.
    #[serde(rename = "@context")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<OneMany<Kind<Value>>>,

    /// The DID for a particular DID subject.
    pub id: String,

    /// Other identifiers for the subject of the DID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub also_known_as: Option<Vec<String>>,

    /// DIDs authorized to make changes to the document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<OneMany<String>>,

    /// Ways of communicating with the DID subject or related entities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<Vec<Service>>,

    /// If set, MUST be a set of verification methods for the DID subject.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<Vec<VerificationMethod>>,

    /// <https://www.w3.org/TR/did-core/#authentication>
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Vec<Kind<VerificationMethod>>>,

    /// <https://www.w3.org/TR/did-core/#assertion>
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_method: Option<Vec<Kind<VerificationMethod>>>,

    /// <https://www.w3.org/TR/did-core/#key-agreement>
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_agreement: Option<Vec<Kind<VerificationMethod>>>,

    /// <https://www.w3.org/TR/did-core/#capability-invocation>
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability_invocation: Option<Vec<Kind<VerificationMethod>>>,

    /// <https://www.w3.org/TR/did-core/#capability-delegation>
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capability_delegation: Option<Vec<Kind<VerificationMethod>>>,
}

/// A service endpoint.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Service id, a DID URL.
    pub id: String,

    /// Service type.
    #[serde(rename = "type")]
    pub type_: String,

    /// Endpoint URL, map or set.
    pub service_endpoint: Value,
}

impl Document {
    /// Retrieve a service by its ID.
    #[must_use]
    pub fn service(&self, id: &str) -> Option<&Service> {
        let id = self.absolute(id);
        self.service.as_ref()?.iter().find(|s| self.absolute(&s.id) == id)
    }

    /// Retrieve a verification method by its ID. Relative IDs (`#key-1`) are
    /// resolved against the document's DID, and methods embedded in
    /// relationships are found too.
    #[must_use]
    pub fn verification_method(&self, id: &str) -> Option<VerificationMethod> {
        let id = self.absolute(id);
        self.all_methods().into_iter().find(|vm| self.absolute(&vm.id) == id)
    }

    /// Verification methods for a relationship. String references are
    /// resolved against the document's verification methods and dangling
    /// references are skipped. [`Relationship::VerificationMethod`] returns
    /// every method in the document.
    #[must_use]
    pub fn methods(&self, relationship: Relationship) -> Vec<VerificationMethod> {
        let entries = match relationship {
            Relationship::VerificationMethod => return self.all_methods(),
            Relationship::Authentication => &self.authentication,
            Relationship::AssertionMethod => &self.assertion_method,
            Relationship::KeyAgreement => &self.key_agreement,
            Relationship::CapabilityInvocation => &self.capability_invocation,
            Relationship::CapabilityDelegation => &self.capability_delegation,
        };
        entries
            .iter()
            .flatten()
            .filter_map(|entry| match entry {
                Kind::String(id) => self.declared(id),
                Kind::Object(vm) => Some(vm.clone()),
            })
            .collect()
    }

    // declared in `verificationMethod`
    fn declared(&self, id: &str) -> Option<VerificationMethod> {
        let id = self.absolute(id);
        self.verification_method.as_ref()?.iter().find(|vm| self.absolute(&vm.id) == id).cloned()
    }

    fn all_methods(&self) -> Vec<VerificationMethod> {
        let mut methods: Vec<VerificationMethod> =
            self.verification_method.clone().unwrap_or_default();
        let embedded = [
            &self.authentication,
            &self.assertion_method,
            &self.key_agreement,
            &self.capability_invocation,
            &self.capability_delegation,
        ];
        for vm in embedded.into_iter().flatten().flatten().filter_map(Kind::as_object) {
            if !methods.iter().any(|m| self.absolute(&m.id) == self.absolute(&vm.id)) {
                methods.push(vm.clone());
            }
        }
        methods
    }

    /// Expand a relative DID URL (`#key-1`) against the document's DID.
    #[must_use]
    pub fn absolute(&self, id: &str) -> String {
        if id.starts_with('#') { format!("{}{id}", self.id) } else { id.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn document() -> Document {
        serde_json::from_value(json!({
            "@context": "https://www.w3.org/ns/did/v1",
            "id": "did:example:123",
            "verificationMethod": [{
                "id": "#key-1",
                "type": "EcdsaSecp256k1VerificationKey2019",
                "controller": "did:example:123",
                "publicKeyHex": "02b97c30de767f084ce3080168ee293053ba33b235d7116a3263d29f1450936b71"
            }],
            "authentication": ["did:example:123#key-1", "#missing"],
            "keyAgreement": [{
                "id": "did:example:123#key-2",
                "type": "X25519KeyAgreementKey2019",
                "controller": "did:example:123",
                "publicKeyBase58": "JhNWeSVLMYccCk7iopQW4guaSJTojqpMEELgSLhKwRr"
            }]
        }))
        .expect("should deserialize")
    }

    #[test]
    fn relationships() {
        let doc = document();
        let auth = doc.methods(Relationship::Authentication);
        assert_eq!(auth.len(), 1);
        assert_eq!(auth[0].id, "#key-1");

        assert_eq!(doc.methods(Relationship::KeyAgreement).len(), 1);
        assert!(doc.methods(Relationship::AssertionMethod).is_empty());
        assert_eq!(doc.methods(Relationship::VerificationMethod).len(), 2);
    }

    #[test]
    fn lookup_by_id() {
        let doc = document();
        assert!(doc.verification_method("did:example:123#key-1").is_some());
        assert!(doc.verification_method("#key-2").is_some());
        assert!(doc.verification_method("#key-3").is_none());
    }
}
