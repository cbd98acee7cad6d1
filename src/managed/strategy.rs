//! Resolution strategies, one per identifier method.

use super::classify::DidReference;
use super::{IdentifierMethod, ManagedDetails, ManagedIdentifierResult, ManagedOptions};
use crate::did::{self, DidIdentifier, DidUrl, MapperOptions};
use crate::error::{Err, Error};
use crate::jose::jwk::{Digest, PublicKeyJwk};
use crate::key::{self, JwkOptions, ManagedKey};
use crate::provider::Context;
use crate::x509::{self, CertificateInfo};

pub async fn kid(
    ctx: &Context, kid: &str, opts: &ManagedOptions,
) -> crate::Result<ManagedIdentifierResult> {
    let kms_key_ref = opts.kms_key_ref.as_deref().unwrap_or(kid);
    let key = ctx.key_manager()?.get_key(kms_key_ref).await?;
    let (jwk, jwk_thumbprint) = key_jwk(&key)?;

    Ok(ManagedIdentifierResult {
        method: IdentifierMethod::Kid,
        kms_key_ref: kms_key_ref.to_string(),
        kid: Some(opts.kid.clone().unwrap_or_else(|| kid.to_string())),
        issuer: opts.issuer.clone(),
        key,
        jwk,
        jwk_thumbprint,
        details: None,
    })
}

pub async fn did(
    ctx: &Context, reference: &DidReference, opts: &ManagedOptions,
) -> crate::Result<ManagedIdentifierResult> {
    let (identifier, fragment) = match reference {
        DidReference::Url(did_url) => {
            let url: DidUrl = did_url.parse()?;
            let Some(identifier) = ctx.did_manager()?.get(&url.did).await? else {
                return Err(Error::new(
                    Err::IdentifierNotFound,
                    format!("{} is not a managed DID", url.did),
                ));
            };
            (identifier, url.did_with_fragment())
        }
        DidReference::Record(identifier) => (identifier.as_ref().clone(), None),
    };

    let mapper = MapperOptions {
        offline_when_no_did_registered: opts.offline_when_no_did_registered,
        resolution: opts.resolution,
        ..MapperOptions::default()
    };
    let keys =
        did::map_identifier_keys_to_doc(ctx, &identifier, opts.vm_relationship, &mapper).await?;
    let key = select_key(&identifier, &keys, fragment.as_deref(), opts)?;

    let (jwk, jwk_thumbprint) = key_jwk(&key)?;
    let kid = opts
        .kid
        .clone()
        .or_else(|| key.verification_method().map(ToString::to_string))
        .unwrap_or_else(|| format!("{}#{}", identifier.did, key.kid));

    Ok(ManagedIdentifierResult {
        method: IdentifierMethod::Did,
        kms_key_ref: key.kid.clone(),
        kid: Some(kid),
        issuer: Some(opts.issuer.clone().unwrap_or_else(|| identifier.did.clone())),
        key,
        jwk,
        jwk_thumbprint,
        details: Some(ManagedDetails::Did {
            did: identifier.did.clone(),
            controller_key_id: identifier.controller_key_id.clone(),
            keys,
            identifier: Box::new(identifier),
        }),
    })
}

// Explicit key store reference first, then the verification method named by
// the DID URL fragment, then the first key of the relationship.
fn select_key(
    identifier: &DidIdentifier, keys: &[ManagedKey], fragment: Option<&str>, opts: &ManagedOptions,
) -> crate::Result<ManagedKey> {
    let found = if let Some(kms_key_ref) = &opts.kms_key_ref {
        keys.iter().find(|k| &k.kid == kms_key_ref)
    } else if let Some(vm_id) = fragment {
        let kid = vm_id.rsplit_once('#').map_or(vm_id, |(_, f)| f);
        keys.iter().find(|k| k.verification_method() == Some(vm_id) || k.kid == kid)
    } else {
        keys.first()
    };

    found.cloned().ok_or_else(|| {
        let wanted = opts.kms_key_ref.as_deref().or(fragment).unwrap_or("any key");
        Error::new(
            Err::IdentifierNotFound,
            format!("no {} key of {} matches {wanted}", opts.vm_relationship, identifier.did),
        )
    })
}

pub async fn jwk(
    ctx: &Context, jwk: &PublicKeyJwk, method: IdentifierMethod, opts: &ManagedOptions,
) -> crate::Result<ManagedIdentifierResult> {
    let jwk_thumbprint = jwk.thumbprint(Digest::Sha256)?;
    let kms_key_ref = opts.kms_key_ref.clone().unwrap_or_else(|| jwk_thumbprint.clone());
    let key = ctx.key_manager()?.get_key(&kms_key_ref).await?;
    check_key(&key, &jwk_thumbprint)?;

    Ok(ManagedIdentifierResult {
        method,
        kms_key_ref,
        kid: opts.kid.clone().or_else(|| jwk.kid.clone()),
        issuer: opts.issuer.clone(),
        key,
        jwk: jwk.to_public(),
        jwk_thumbprint,
        details: None,
    })
}

pub async fn x5c(
    ctx: &Context, x5c: &[String], opts: &ManagedOptions,
) -> crate::Result<ManagedIdentifierResult> {
    let Some(leaf) = x5c.first() else {
        return Err(Error::new(Err::InvalidArgument, "x5c chain is empty"));
    };
    let certificate = CertificateInfo::from_certificate(&x509::pem_or_der_to_certificate(leaf)?)?;
    let jwk_thumbprint = certificate.public_key_jwk.thumbprint(Digest::Sha256)?;
    let kms_key_ref = opts.kms_key_ref.clone().unwrap_or_else(|| jwk_thumbprint.clone());
    let key = ctx.key_manager()?.get_key(&kms_key_ref).await?;
    check_key(&key, &jwk_thumbprint)?;

    Ok(ManagedIdentifierResult {
        method: IdentifierMethod::X5c,
        kms_key_ref,
        kid: opts.kid.clone(),
        issuer: opts.issuer.clone(),
        key,
        jwk: certificate.public_key_jwk.clone(),
        jwk_thumbprint,
        details: Some(ManagedDetails::X5c {
            x5c: x5c.to_vec(),
            certificate: Box::new(certificate),
        }),
    })
}

pub fn key(key: &ManagedKey, opts: &ManagedOptions) -> crate::Result<ManagedIdentifierResult> {
    if let Some(kms_key_ref) = &opts.kms_key_ref {
        if kms_key_ref != &key.kid {
            return Err(Error::new(
                Err::InvalidArgument,
                format!("key store reference {kms_key_ref} conflicts with key {}", key.kid),
            ));
        }
    }
    let (jwk, jwk_thumbprint) = key_jwk(key)?;

    Ok(ManagedIdentifierResult {
        method: IdentifierMethod::Key,
        kms_key_ref: key.kid.clone(),
        kid: opts.kid.clone().or_else(|| key.verification_method().map(ToString::to_string)),
        issuer: opts.issuer.clone(),
        key: key.clone(),
        jwk,
        jwk_thumbprint,
        details: None,
    })
}

// JWK and thumbprint of a key, checked against any precomputed thumbprint
fn key_jwk(key: &ManagedKey) -> crate::Result<(PublicKeyJwk, String)> {
    let opts = JwkOptions {
        key: Some(key.clone()),
        ..JwkOptions::default()
    };
    let jwk = key::to_jwk(&key.public_key_hex, key.key_type, &opts)?;
    let thumbprint = jwk.thumbprint(Digest::Sha256)?;
    check_thumbprint(key, &thumbprint)?;
    Ok((jwk, thumbprint))
}

// the held key must be the key the identifier names
fn check_key(key: &ManagedKey, jwk_thumbprint: &str) -> crate::Result<()> {
    let (_, held) = key_jwk(key)?;
    if held != jwk_thumbprint {
        return Err(Error::new(
            Err::InvalidArgument,
            format!("key {} does not match the identifier's public key", key.kid),
        ));
    }
    Ok(())
}

fn check_thumbprint(key: &ManagedKey, thumbprint: &str) -> crate::Result<()> {
    match key.meta.as_ref().and_then(|m| m.jwk_thumbprint.as_deref()) {
        Some(precomputed) if precomputed != thumbprint => Err(Error::new(
            Err::InvalidArgument,
            format!(
                "thumbprint {precomputed} stored with key {} does not match {thumbprint}",
                key.kid
            ),
        )),
        _ => Ok(()),
    }
}
