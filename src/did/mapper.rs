//! Map an identifier's managed keys to the verification methods of its DID
//! document.

use serde::{Deserialize, Serialize};

use super::document::Document;
use super::identifier::{to_did_document, DidIdentifier};
use super::resolve::{resolve_document, LayeredResolution};
use super::verification::{Relationship, VerificationMethod};
use crate::error::{Err, Error};
use crate::key::{self, KeyType, ManagedKey};
use crate::provider::Context;

/// Options for [`map_identifier_keys_to_doc`].
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct MapperOptions {
    /// Use this document instead of resolving the DID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_document: Option<Document>,

    /// Fail with [`Err::NoKeyFound`] when no key matches.
    pub error_on_not_found: bool,

    /// Synthesize a document from the identifier's keys when the DID cannot
    /// be resolved.
    pub offline_when_no_did_registered: bool,

    /// Resolution strategies used to fetch the document.
    pub resolution: LayeredResolution,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            did_document: None,
            error_on_not_found: false,
            offline_when_no_did_registered: true,
            resolution: LayeredResolution::default(),
        }
    }
}

/// Find the identifier's keys that appear in the verification methods of
/// `relationship` in its DID document.
///
/// Document key material is normalized to hex (EC keys compressed) and
/// matched against each key's public key hex by exact or prefix equality. For
/// `keyAgreement`, Ed25519 keys also match their X25519 counterpart. Matched
/// keys carry the absolute id of their verification method in
/// `meta.verification_method`; document methods without a matching key are
/// dropped.
///
/// When the first key is RSA and a document is supplied, no mapping is
/// attempted and the result is empty.
///
/// # Errors
///
/// Returns [`Err::NoKeyFound`] if no key matches and `error_on_not_found` is
/// set, or the resolution error when the document cannot be resolved and
/// offline synthesis is disabled.
pub async fn map_identifier_keys_to_doc(
    ctx: &Context, identifier: &DidIdentifier, relationship: Relationship, opts: &MapperOptions,
) -> crate::Result<Vec<ManagedKey>> {
    if let Some(document) = &opts.did_document {
        if identifier.keys.first().is_some_and(|k| k.key_type == KeyType::Rsa) {
            return Ok(vec![]);
        }
        return match_keys(identifier, document, relationship, opts);
    }

    let document = match resolve_document(ctx, &identifier.did, &opts.resolution).await {
        Ok(resolution) => match resolution.did_document {
            Some(document) => document,
            None => offline(identifier, opts, None)?,
        },
        Err(e) => offline(identifier, opts, Some(e))?,
    };
    match_keys(identifier, &document, relationship, opts)
}

fn offline(
    identifier: &DidIdentifier, opts: &MapperOptions, error: Option<Error>,
) -> crate::Result<Document> {
    if !opts.offline_when_no_did_registered {
        return Err(error.unwrap_or_else(|| {
            Error::new(Err::ResolutionFailed, format!("no document for {}", identifier.did))
        }));
    }
    tracing::debug!("using a document synthesized from local keys for {}", identifier.did);
    to_did_document(identifier)
}

fn match_keys(
    identifier: &DidIdentifier, document: &Document, relationship: Relationship,
    opts: &MapperOptions,
) -> crate::Result<Vec<ManagedKey>> {
    let mut matched = vec![];

    for vm in document.methods(relationship) {
        let Some(doc_hex) = method_hex(&vm, relationship) else {
            continue;
        };
        let found = identifier.keys.iter().find(|key| {
            candidates(key, relationship).iter().any(|key_hex| hex_matches(&doc_hex, key_hex))
        });
        if let Some(key) = found {
            let mut key = key.clone();
            key.meta_mut().verification_method = Some(document.absolute(&vm.id));
            matched.push(key);
        }
    }

    if matched.is_empty() && opts.error_on_not_found {
        return Err(Error::new(
            Err::NoKeyFound,
            format!(
                "no key of {} found in the {relationship} section of its DID document",
                identifier.did
            ),
        ));
    }
    Ok(matched)
}

fn method_hex(vm: &VerificationMethod, relationship: Relationship) -> Option<String> {
    let hex_key = match vm.public_key_hex() {
        Ok(hex_key) => hex_key,
        Err(e) => {
            tracing::debug!("skipping verification method {}: {e}", vm.id);
            return None;
        }
    };
    if relationship == Relationship::KeyAgreement && vm.is_ed25519() {
        let bytes = hex::decode(&hex_key).ok()?;
        return key::edwards_to_montgomery(&bytes).ok().map(hex::encode);
    }
    Some(hex_key)
}

// hex forms a key may appear under in the document
fn candidates(key: &ManagedKey, relationship: Relationship) -> Vec<String> {
    let normalized =
        key::normalize_public_key_hex(&key.public_key_hex, key.key_type).to_lowercase();
    let mut hexes = vec![normalized];
    if relationship == Relationship::KeyAgreement && key.key_type == KeyType::Ed25519 {
        let converted =
            hex::decode(&key.public_key_hex).ok().and_then(|b| key::edwards_to_montgomery(&b).ok());
        if let Some(x25519) = converted {
            hexes.push(hex::encode(x25519));
        }
    }
    hexes
}

fn hex_matches(doc_hex: &str, key_hex: &str) -> bool {
    let doc_hex = doc_hex.to_lowercase();
    !doc_hex.is_empty()
        && !key_hex.is_empty()
        && (doc_hex == key_hex || doc_hex.starts_with(key_hex) || key_hex.starts_with(&doc_hex))
}
