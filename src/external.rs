//! # External Identifiers
//!
//! Resolution of identifiers the agent holds no keys for: DIDs resolved
//! through the layered resolvers, X.509 chains validated against trust
//! anchors, OpenID Federation entities and bare public keys. Results carry
//! every public key the identifier stands for.

mod did;
mod oidf;
mod x5c;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::did::{DidUrl, Document, LayeredResolution};
use crate::error::{Err, Error};
use crate::jose::jwk::{Digest, PublicKeyJwk};
use crate::key::CoseKey;
use crate::managed::IdentifierMethod;
use crate::provider::Context;
use crate::x509::{ValidationResult, X509VerificationOptions};

/// An external identifier reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExternalIdentifier {
    /// DID or DID URL.
    Did(String),

    /// Certificate chain, leaf first.
    X5c(Vec<String>),

    /// Public JWK.
    Jwk(PublicKeyJwk),

    /// Public COSE key.
    CoseKey(CoseKey),

    /// OpenID Federation entity identifier.
    EntityId(String),
}

impl ExternalIdentifier {
    /// The identifier's method.
    #[must_use]
    pub const fn method(&self) -> IdentifierMethod {
        match self {
            Self::Did(_) => IdentifierMethod::Did,
            Self::X5c(_) => IdentifierMethod::X5c,
            Self::Jwk(_) => IdentifierMethod::Jwk,
            Self::CoseKey(_) => IdentifierMethod::CoseKey,
            Self::EntityId(_) => IdentifierMethod::EntityId,
        }
    }

    /// Classify an external identifier reference.
    ///
    /// Without an explicit method, strings starting with `did:` are DIDs and
    /// `https://` or `http://` URLs are entity identifiers. Non-empty arrays
    /// of strings are certificate chains; objects are JWKs (string `kty`) or
    /// COSE keys (integer `kty`). An explicit method always decides.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidArgument`] when the reference cannot be
    /// classified or does not have the shape of `method`.
    pub fn classify(value: &Value, method: Option<IdentifierMethod>) -> crate::Result<Self> {
        let method = match method {
            Some(method) => method,
            None => sniff(value).ok_or_else(|| {
                Error::new(
                    Err::InvalidArgument,
                    format!("cannot determine the identifier method of {value}"),
                )
            })?,
        };
        let mismatch =
            || Error::new(Err::InvalidArgument, format!("{value} is not a {method} identifier"));

        match method {
            IdentifierMethod::Did => match value.as_str() {
                Some(did) if did.starts_with("did:") => Ok(Self::Did(did.to_string())),
                _ => Err(mismatch()),
            },
            IdentifierMethod::EntityId => match value.as_str() {
                Some(url) if url.starts_with("https://") || url.starts_with("http://") => {
                    Ok(Self::EntityId(url.to_string()))
                }
                _ => Err(mismatch()),
            },
            IdentifierMethod::X5c => {
                let list = value.as_array().filter(|l| !l.is_empty()).ok_or_else(mismatch)?;
                let x5c = list
                    .iter()
                    .map(|v| v.as_str().map(ToString::to_string))
                    .collect::<Option<Vec<_>>>();
                Ok(Self::X5c(x5c.ok_or_else(mismatch)?))
            }
            IdentifierMethod::Jwk if value.get("kty").is_some_and(Value::is_string) => {
                Ok(Self::Jwk(serde_json::from_value(value.clone()).map_err(|_| mismatch())?))
            }
            IdentifierMethod::CoseKey if value.get("kty").is_some_and(Value::is_i64) => {
                Ok(Self::CoseKey(serde_json::from_value(value.clone()).map_err(|_| mismatch())?))
            }
            IdentifierMethod::Jwk | IdentifierMethod::CoseKey => Err(mismatch()),
            IdentifierMethod::Kid | IdentifierMethod::Key => Err(Error::new(
                Err::InvalidArgument,
                format!("{method} identifiers can only be resolved as managed identifiers"),
            )),
        }
    }
}

fn sniff(value: &Value) -> Option<IdentifierMethod> {
    match value {
        Value::String(s) if s.starts_with("did:") => Some(IdentifierMethod::Did),
        Value::String(s) if s.starts_with("https://") || s.starts_with("http://") => {
            Some(IdentifierMethod::EntityId)
        }
        Value::Array(list) if !list.is_empty() && list.iter().all(Value::is_string) => {
            Some(IdentifierMethod::X5c)
        }
        Value::Object(obj) => match obj.get("kty") {
            Some(Value::String(_)) => Some(IdentifierMethod::Jwk),
            Some(Value::Number(_)) => Some(IdentifierMethod::CoseKey),
            _ => None,
        },
        _ => None,
    }
}

/// Options for external identifier resolution.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ExternalOptions {
    /// DID resolution strategies.
    pub resolution: LayeredResolution,

    /// Validate certificate chains.
    pub verify: bool,

    /// Certificate chain validation options.
    pub x509: X509VerificationOptions,

    /// OpenID Federation trust anchors, as entity identifiers.
    pub trust_anchors: Vec<String>,
}

impl Default for ExternalOptions {
    fn default() -> Self {
        Self {
            resolution: LayeredResolution::default(),
            verify: true,
            x509: X509VerificationOptions::default(),
            trust_anchors: vec![],
        }
    }
}

/// A public key of an external identifier.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JwkInfo {
    /// The key.
    pub jwk: PublicKeyJwk,

    /// SHA-256 thumbprint of `jwk`.
    pub jwk_thumbprint: String,
}

impl JwkInfo {
    /// Wrap a JWK with its thumbprint.
    ///
    /// # Errors
    ///
    /// Returns [`Err::MissingRequiredClaim`] if the JWK lacks a member
    /// required for its thumbprint.
    pub fn new(jwk: PublicKeyJwk) -> crate::Result<Self> {
        let jwk_thumbprint = jwk.thumbprint(Digest::Sha256)?;
        Ok(Self { jwk, jwk_thumbprint })
    }
}

/// A resolved external identifier.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExternalIdentifierResult {
    /// Method the identifier was resolved with.
    pub method: IdentifierMethod,

    /// Public keys of the identifier, without duplicates.
    pub jwks: Vec<JwkInfo>,

    /// Method specific details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ExternalDetails>,
}

impl ExternalIdentifierResult {
    /// The first key, for identifiers standing for a single key.
    #[must_use]
    pub fn first_jwk(&self) -> Option<&PublicKeyJwk> {
        self.jwks.first().map(|info| &info.jwk)
    }

    /// Whether the identifier is trusted: X.509 chains that validated and
    /// federation entities with an established trust chain. Other methods
    /// carry no trust information and are reported as trusted.
    #[must_use]
    pub fn is_trusted(&self) -> bool {
        match &self.details {
            Some(ExternalDetails::X5c {
                verification_result: Some(result),
                ..
            }) => !result.error,
            Some(ExternalDetails::EntityId { trust_established, .. }) => *trust_established,
            _ => true,
        }
    }
}

/// Method specific details of an [`ExternalIdentifierResult`].
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ExternalDetails {
    /// DIDs.
    #[serde(rename_all = "camelCase")]
    Did {
        /// The parsed DID URL.
        did_url: DidUrl,

        /// The resolved document.
        did_document: Box<Document>,

        /// Resolution metadata.
        did_resolution_metadata: Map<String, Value>,

        /// Document metadata.
        did_document_metadata: Map<String, Value>,
    },

    /// X.509 certificate chains.
    #[serde(rename_all = "camelCase")]
    X5c {
        /// The chain as supplied.
        x5c: Vec<String>,

        /// Chain validation outcome, when the chain was validated.
        #[serde(skip_serializing_if = "Option::is_none")]
        verification_result: Option<ValidationResult>,

        /// Public key of the leaf certificate.
        issuer_jwk: PublicKeyJwk,
    },

    /// OpenID Federation entities.
    #[serde(rename_all = "camelCase")]
    EntityId {
        /// The entity identifier.
        entity_id: String,

        /// Trust anchors a chain was established to, with the hex encoded
        /// public key of the anchor.
        trusted_anchors: BTreeMap<String, String>,

        /// Trust anchors no chain could be established to, with the reason.
        error_list: BTreeMap<String, String>,

        /// A chain was established to at least one trust anchor.
        trust_established: bool,
    },
}

/// Resolve an external identifier reference, classifying it first.
///
/// # Errors
///
/// Returns [`Err::InvalidArgument`] when the reference cannot be classified,
/// and otherwise the error of the strategy for its method.
pub async fn resolve_value(
    ctx: &Context, identifier: &Value, method: Option<IdentifierMethod>, opts: &ExternalOptions,
) -> crate::Result<ExternalIdentifierResult> {
    let identifier = ExternalIdentifier::classify(identifier, method)?;
    resolve(ctx, &identifier, opts).await
}

/// Resolve a classified external identifier.
///
/// # Errors
///
/// Returns the error of the strategy for the identifier's method.
pub async fn resolve(
    ctx: &Context, identifier: &ExternalIdentifier, opts: &ExternalOptions,
) -> crate::Result<ExternalIdentifierResult> {
    tracing::debug!("resolving external {} identifier", identifier.method());

    match identifier {
        ExternalIdentifier::Did(did_url) => did::resolve(ctx, did_url, opts).await,
        ExternalIdentifier::X5c(x5c) => x5c::resolve(ctx, x5c, opts).await,
        ExternalIdentifier::EntityId(entity_id) => oidf::resolve(ctx, entity_id, opts).await,
        ExternalIdentifier::Jwk(jwk) => Ok(ExternalIdentifierResult {
            method: IdentifierMethod::Jwk,
            jwks: vec![JwkInfo::new(jwk.to_public())?],
            details: None,
        }),
        ExternalIdentifier::CoseKey(cose) => Ok(ExternalIdentifierResult {
            method: IdentifierMethod::CoseKey,
            jwks: vec![JwkInfo::new(cose.to_jwk()?)?],
            details: None,
        }),
    }
}

// keep the first occurrence of each key
fn dedup(jwks: Vec<JwkInfo>) -> Vec<JwkInfo> {
    let mut unique: Vec<JwkInfo> = vec![];
    for info in jwks {
        if !unique.iter().any(|u| u.jwk_thumbprint == info.jwk_thumbprint) {
            unique.push(info);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn classification() {
        let cases = [
            (json!("did:web:example.com#key-1"), IdentifierMethod::Did),
            (json!("https://agent.example/oid4vci"), IdentifierMethod::EntityId),
            (json!(["MIIB"]), IdentifierMethod::X5c),
            (
                json!({
                    "kty": "OKP",
                    "crv": "Ed25519",
                    "x": "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo"
                }),
                IdentifierMethod::Jwk,
            ),
            (
                json!({"kty": 1, "crv": 6, "x": "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo"}),
                IdentifierMethod::CoseKey,
            ),
        ];
        for (value, method) in cases {
            let identifier = ExternalIdentifier::classify(&value, None).expect("should classify");
            assert_eq!(identifier.method(), method, "{value}");
        }
    }

    #[test]
    fn managed_only_methods() {
        let err = ExternalIdentifier::classify(&json!("key-1"), Some(IdentifierMethod::Kid))
            .expect_err("should fail");
        assert!(err.is(Err::InvalidArgument));
        let err = ExternalIdentifier::classify(&json!("key-1"), None).expect_err("should fail");
        assert!(err.is(Err::InvalidArgument));
    }

    #[tokio::test]
    async fn cose_and_jwk_agree() {
        let jwk = json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo"
        });
        let cose = json!({"kty": 1, "crv": 6, "x": "11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo"});

        let ctx = Context::default();
        let opts = ExternalOptions::default();
        let from_jwk = resolve_value(&ctx, &jwk, None, &opts).await.expect("should resolve");
        let from_cose = resolve_value(&ctx, &cose, None, &opts).await.expect("should resolve");
        assert_eq!(from_jwk.jwks, from_cose.jwks);
        assert!(from_jwk.is_trusted());
    }
}
