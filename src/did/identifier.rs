//! Locally managed DID records.

use serde::{Deserialize, Serialize};

use super::document::{Document, Service, CONTEXT};
use super::verification::VerificationMethod;
use crate::core::{Kind, OneMany};
use crate::key::{self, JwkOptions, KeyType, ManagedKey};

/// A DID managed by the local agent: the DID, the keys its private material
/// is held for and the services it advertises.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DidIdentifier {
    /// The DID.
    pub did: String,

    /// Name of the provider that created the DID, for example `did:web`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Human friendly alias.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,

    /// `kid` of the key controlling the DID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller_key_id: Option<String>,

    /// Keys associated with the DID, in registration order.
    #[serde(default)]
    pub keys: Vec<ManagedKey>,

    /// Services advertised by the DID.
    #[serde(default)]
    pub services: Vec<Service>,
}

impl DidIdentifier {
    /// Find a key by `kid`.
    #[must_use]
    pub fn key(&self, kid: &str) -> Option<&ManagedKey> {
        self.keys.iter().find(|k| k.kid == kid)
    }

    /// The key controlling the DID: the key named by `controller_key_id` or,
    /// without one, the first key.
    #[must_use]
    pub fn controller_key(&self) -> Option<&ManagedKey> {
        self.controller_key_id
            .as_deref()
            .and_then(|kid| self.key(kid))
            .or_else(|| self.keys.first())
    }
}

/// Synthesize a DID document from an identifier's own keys.
///
/// Each key becomes a `JsonWebKey2020` verification method. X25519 keys are
/// only referenced from `keyAgreement`; signing keys are referenced from
/// `authentication`, `assertionMethod` and the capability relationships, and
/// secp256k1/P-256 keys from `keyAgreement` as well.
///
/// # Errors
///
/// Returns an error when a key cannot be expressed as a JWK.
pub fn to_did_document(identifier: &DidIdentifier) -> crate::Result<Document> {
    let mut doc = Document {
        context: Some(OneMany::Many(
            CONTEXT.iter().map(|c| Kind::String((*c).to_string())).collect(),
        )),
        id: identifier.did.clone(),
        ..Document::default()
    };

    let mut methods = vec![];
    for key in identifier.keys.iter().filter(|k| k.key_type != KeyType::Bls12381G2) {
        let opts = JwkOptions {
            key: Some(key.clone()),
            ..JwkOptions::default()
        };
        let jwk = key::to_jwk(&key.public_key_hex, key.key_type, &opts)?;
        let id = key
            .verification_method()
            .map_or_else(|| format!("{}#{}", identifier.did, key.kid), ToString::to_string);

        let reference = Kind::String(id.clone());
        match key.key_type {
            KeyType::X25519 => doc.key_agreement.get_or_insert_with(Vec::new).push(reference),
            key_type => {
                for section in [
                    &mut doc.authentication,
                    &mut doc.assertion_method,
                    &mut doc.capability_invocation,
                    &mut doc.capability_delegation,
                ] {
                    section.get_or_insert_with(Vec::new).push(reference.clone());
                }
                if matches!(key_type, KeyType::Secp256k1 | KeyType::Secp256r1) {
                    doc.key_agreement.get_or_insert_with(Vec::new).push(reference);
                }
            }
        }

        methods.push(VerificationMethod {
            id,
            type_: "JsonWebKey2020".to_string(),
            controller: identifier.did.clone(),
            public_key_hex: Some(key.public_key_hex.clone()),
            public_key_jwk: Some(jwk),
            ..VerificationMethod::default()
        });
    }

    doc.verification_method = Some(methods);
    if !identifier.services.is_empty() {
        doc.service = Some(identifier.services.clone());
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::Relationship;

    const ED25519_PUBLIC: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";
    const X25519_PUBLIC: &str = "d85e07ec22b0ad881537c2f44d662d1a143cf830c57aca4305d85c7a90f6b62e";

    fn identifier() -> DidIdentifier {
        DidIdentifier {
            did: "did:example:123".to_string(),
            controller_key_id: Some("ed".to_string()),
            keys: vec![
                ManagedKey {
                    kid: "ed".to_string(),
                    kms: "local".to_string(),
                    key_type: KeyType::Ed25519,
                    public_key_hex: ED25519_PUBLIC.to_string(),
                    meta: None,
                },
                ManagedKey {
                    kid: "x".to_string(),
                    kms: "local".to_string(),
                    key_type: KeyType::X25519,
                    public_key_hex: X25519_PUBLIC.to_string(),
                    meta: None,
                },
            ],
            ..DidIdentifier::default()
        }
    }

    #[test]
    fn synthesized_document() {
        let doc = to_did_document(&identifier()).expect("should build document");
        assert_eq!(doc.methods(Relationship::VerificationMethod).len(), 2);

        let auth = doc.methods(Relationship::Authentication);
        assert_eq!(auth.len(), 1);
        assert_eq!(auth[0].id, "did:example:123#ed");

        let agreement = doc.methods(Relationship::KeyAgreement);
        assert_eq!(agreement.len(), 1);
        assert_eq!(agreement[0].id, "did:example:123#x");
        assert_eq!(
            agreement[0].public_key_hex().expect("should decode"),
            identifier().keys[1].public_key_hex
        );
    }

    #[test]
    fn controller_key() {
        let mut id = identifier();
        assert_eq!(id.controller_key().map(|k| k.kid.as_str()), Some("ed"));
        id.controller_key_id = None;
        assert_eq!(id.controller_key().map(|k| k.kid.as_str()), Some("ed"));
    }
}
