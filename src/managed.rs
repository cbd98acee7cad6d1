//! # Managed Identifiers
//!
//! Resolution of identifiers whose private keys are held by one of the
//! agent's key management systems. The identifier reference is classified
//! once into a [`ManagedIdentifier`] and resolved by the strategy for its
//! method into a [`ManagedIdentifierResult`] carrying the key, its JWK and
//! thumbprint, and the reference used to sign with it.
//!
//! Every resolution, including those made through the `by_*` accessors,
//! passes through [`resolve`].

mod classify;
mod strategy;

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use self::classify::{classify, DidReference, ManagedIdentifier};
use crate::did::{DidIdentifier, LayeredResolution, Relationship};
use crate::error::{Err, Error};
use crate::jose::jwk::PublicKeyJwk;
use crate::key::{CoseKey, ManagedKey};
use crate::provider::Context;
use crate::x509::CertificateInfo;

/// Identifier methods.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierMethod {
    /// Key store reference.
    Kid,

    /// DID, optionally with a verification method fragment.
    Did,

    /// JSON Web Key.
    Jwk,

    /// X.509 certificate chain, leaf first.
    X5c,

    /// A key record.
    Key,

    /// COSE key.
    CoseKey,

    /// OpenID Federation entity identifier. External identifiers only.
    EntityId,
}

impl Display for IdentifierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Kid => "kid",
            Self::Did => "did",
            Self::Jwk => "jwk",
            Self::X5c => "x5c",
            Self::Key => "key",
            Self::CoseKey => "cose_key",
            Self::EntityId => "entity_id",
        };
        write!(f, "{s}")
    }
}

/// Options for managed identifier resolution.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ManagedOptions {
    /// Key store reference to use instead of the one derived from the
    /// identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kms_key_ref: Option<String>,

    /// `kid` to report in the result, for example for JWS headers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Issuer to report in the result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Verification relationship keys of a DID are selected from.
    pub vm_relationship: Relationship,

    /// Synthesize the DID document from local keys when the DID cannot be
    /// resolved.
    pub offline_when_no_did_registered: bool,

    /// Resolution strategies used for DID documents.
    pub resolution: LayeredResolution,
}

impl Default for ManagedOptions {
    fn default() -> Self {
        Self {
            kms_key_ref: None,
            kid: None,
            issuer: None,
            vm_relationship: Relationship::default(),
            offline_when_no_did_registered: true,
            resolution: LayeredResolution::default(),
        }
    }
}

/// A resolved managed identifier.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedIdentifierResult {
    /// Method the identifier was resolved with.
    pub method: IdentifierMethod,

    /// The key.
    pub key: ManagedKey,

    /// The key's public JWK.
    pub jwk: PublicKeyJwk,

    /// SHA-256 thumbprint of `jwk`.
    pub jwk_thumbprint: String,

    /// Reference used to sign with the key.
    pub kms_key_ref: String,

    /// `kid` for the key, for example a DID URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Issuer associated with the identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,

    /// Method specific details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ManagedDetails>,
}

/// Method specific details of a [`ManagedIdentifierResult`].
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ManagedDetails {
    /// DID identifiers.
    #[serde(rename_all = "camelCase")]
    Did {
        /// The DID.
        did: String,

        /// The DID record.
        identifier: Box<DidIdentifier>,

        /// Keys of the DID in the requested verification relationship.
        keys: Vec<ManagedKey>,

        /// `kid` of the DID's controller key.
        #[serde(skip_serializing_if = "Option::is_none")]
        controller_key_id: Option<String>,
    },

    /// X.509 identifiers.
    X5c {
        /// The certificate chain as supplied.
        x5c: Vec<String>,

        /// The leaf certificate.
        certificate: Box<CertificateInfo>,
    },
}

/// Resolve a managed identifier reference.
///
/// The reference is classified structurally unless `method` is given, in
/// which case the reference must have the shape of that method.
///
/// # Errors
///
/// Returns [`Err::InvalidArgument`] for references that cannot be classified
/// or do not match `method`, [`Err::KeyNotFound`] when the key store holds no
/// key for the reference and [`Err::IdentifierNotFound`] when resolution
/// yields no key.
pub async fn resolve_value(
    ctx: &Context, identifier: &Value, method: Option<IdentifierMethod>, opts: &ManagedOptions,
) -> crate::Result<ManagedIdentifierResult> {
    let identifier = classify(identifier, method)?;
    resolve(ctx, &identifier, opts).await
}

/// Resolve a classified managed identifier.
///
/// # Errors
///
/// Returns [`Err::IdentifierNotFound`] when resolution yields no key, and
/// otherwise the error of the strategy for the identifier's method.
pub async fn resolve(
    ctx: &Context, identifier: &ManagedIdentifier, opts: &ManagedOptions,
) -> crate::Result<ManagedIdentifierResult> {
    tracing::debug!("resolving managed {} identifier", identifier.method());

    let result = match identifier {
        ManagedIdentifier::Kid(kid) => strategy::kid(ctx, kid, opts).await?,
        ManagedIdentifier::Did(reference) => strategy::did(ctx, reference, opts).await?,
        ManagedIdentifier::Jwk(jwk) => strategy::jwk(ctx, jwk, IdentifierMethod::Jwk, opts).await?,
        ManagedIdentifier::X5c(x5c) => strategy::x5c(ctx, x5c, opts).await?,
        ManagedIdentifier::Key(key) => strategy::key(key, opts)?,
        ManagedIdentifier::CoseKey(cose) => {
            strategy::jwk(ctx, &cose.to_jwk()?, IdentifierMethod::CoseKey, opts).await?
        }
    };

    let has_record = match &result.details {
        Some(ManagedDetails::Did { .. }) => true,
        _ => result.method != IdentifierMethod::Did,
    };
    if result.key.public_key_hex.is_empty() || !has_record {
        return Err(Error::new(
            Err::IdentifierNotFound,
            format!("no managed key found for {identifier}"),
        ));
    }
    Ok(result)
}

/// Resolve a key store reference.
///
/// # Errors
///
/// See [`resolve`].
pub async fn by_kid(
    ctx: &Context, kid: &str, opts: &ManagedOptions,
) -> crate::Result<ManagedIdentifierResult> {
    resolve(ctx, &ManagedIdentifier::Kid(kid.to_string()), opts).await
}

/// Resolve a DID or DID URL held by the DID manager.
///
/// # Errors
///
/// See [`resolve`].
pub async fn by_did(
    ctx: &Context, did: &str, opts: &ManagedOptions,
) -> crate::Result<ManagedIdentifierResult> {
    resolve(ctx, &ManagedIdentifier::Did(DidReference::Url(did.to_string())), opts).await
}

/// Resolve the key held for a JWK.
///
/// # Errors
///
/// See [`resolve`].
pub async fn by_jwk(
    ctx: &Context, jwk: &PublicKeyJwk, opts: &ManagedOptions,
) -> crate::Result<ManagedIdentifierResult> {
    resolve(ctx, &ManagedIdentifier::Jwk(jwk.clone()), opts).await
}

/// Resolve the key held for a certificate chain's leaf certificate.
///
/// # Errors
///
/// See [`resolve`].
pub async fn by_x5c(
    ctx: &Context, x5c: &[String], opts: &ManagedOptions,
) -> crate::Result<ManagedIdentifierResult> {
    resolve(ctx, &ManagedIdentifier::X5c(x5c.to_vec()), opts).await
}

/// Wrap an already resolved key.
///
/// # Errors
///
/// See [`resolve`].
pub async fn by_key(
    ctx: &Context, key: &ManagedKey, opts: &ManagedOptions,
) -> crate::Result<ManagedIdentifierResult> {
    resolve(ctx, &ManagedIdentifier::Key(key.clone()), opts).await
}

/// Resolve the key held for a COSE key.
///
/// # Errors
///
/// See [`resolve`].
pub async fn by_cose_key(
    ctx: &Context, cose_key: &CoseKey, opts: &ManagedOptions,
) -> crate::Result<ManagedIdentifierResult> {
    resolve(ctx, &ManagedIdentifier::CoseKey(cose_key.clone()), opts).await
}
