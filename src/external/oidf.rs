//! OpenID Federation entity identifiers.
//!
//! A trust chain is a list of entity statements, leaf first, ending with the
//! trust anchor's entity configuration. Trust is established by walking the
//! chain from the anchor: each statement must be signed by a key published
//! in the statement before it, the anchor's configuration by one of its own
//! keys.

use std::collections::BTreeMap;

use base64ct::{Base64UrlUnpadded, Encoding};
use serde_json::Value;

use super::{dedup, ExternalDetails, ExternalIdentifierResult, ExternalOptions, JwkInfo};
use crate::error::{Err, Error};
use crate::jose::jwk::PublicKeyJwk;
use crate::jose::{Jws, JwsHeader};
use crate::key::{self, HexEncoding};
use crate::managed::IdentifierMethod;
use crate::provider::Context;

const NO_TRUST_CHAIN: &str = "A Trust chain could not be established";

pub async fn resolve(
    ctx: &Context, entity_id: &str, opts: &ExternalOptions,
) -> crate::Result<ExternalIdentifierResult> {
    if opts.trust_anchors.is_empty() {
        return Err(Error::new(Err::InvalidArgument, "no trust anchors to resolve entity against"));
    }
    let federation = ctx.federation()?;

    let mut trusted_anchors = BTreeMap::new();
    let mut error_list = BTreeMap::new();
    let mut entity_keys: Vec<JwkInfo> = vec![];

    for anchor in &opts.trust_anchors {
        let chain = match federation.resolve_trust_chain(entity_id, anchor).await {
            Ok(chain) if !chain.is_empty() => chain,
            Ok(_) => {
                tracing::debug!("empty trust chain from {entity_id} to {anchor}");
                error_list.insert(anchor.clone(), NO_TRUST_CHAIN.to_string());
                continue;
            }
            Err(e) => {
                tracing::debug!("no trust chain from {entity_id} to {anchor}: {e}");
                error_list.insert(anchor.clone(), NO_TRUST_CHAIN.to_string());
                continue;
            }
        };

        match walk(ctx, &chain, entity_id, anchor).await {
            Ok((anchor_key, leaf_keys)) => {
                trusted_anchors.insert(
                    anchor.clone(),
                    key::jwk_to_public_key_hex(&anchor_key, HexEncoding::Compressed)?,
                );
                for jwk in leaf_keys {
                    entity_keys.push(JwkInfo::new(jwk)?);
                }
            }
            Err(e) => {
                tracing::debug!("trust chain from {entity_id} to {anchor} rejected: {e}");
                error_list.insert(anchor.clone(), NO_TRUST_CHAIN.to_string());
            }
        }
    }

    Ok(ExternalIdentifierResult {
        method: IdentifierMethod::EntityId,
        jwks: dedup(entity_keys),
        details: Some(ExternalDetails::EntityId {
            entity_id: entity_id.to_string(),
            trust_established: !trusted_anchors.is_empty(),
            trusted_anchors,
            error_list,
        }),
    })
}

// Walk from the anchor's configuration to the leaf. Returns the anchor key
// that verified the anchor configuration and the keys the leaf publishes.
//
// The chain ends with the anchor's own configuration and leads down to
// `entity_id`. Each statement is issued by the subject of the one above it.
async fn walk(
    ctx: &Context, chain: &[String], entity_id: &str, anchor: &str,
) -> crate::Result<(PublicKeyJwk, Vec<PublicKeyJwk>)> {
    let mut anchor_key = None;
    let mut authority: Vec<PublicKeyJwk> = vec![];
    let mut subject = anchor.to_string();

    for (step, statement) in chain.iter().rev().enumerate() {
        let (header, payload, signature, signing_input) = decode(statement)?;
        let (iss, sub) = (claim(&payload, "iss")?, claim(&payload, "sub")?);

        if step == 0 && (iss != anchor || sub != anchor) {
            return Err(Error::new(
                Err::InvalidJws,
                format!("chain ends at {iss} about {sub}, not at trust anchor {anchor}"),
            ));
        }
        if iss != subject {
            return Err(Error::new(
                Err::InvalidJws,
                format!("statement about {sub} is issued by {iss}, not by {subject}"),
            ));
        }
        let published = published_keys(&payload)?;

        // the anchor's configuration is signed with one of its own keys
        let candidates = if step == 0 { &published } else { &authority };
        let signer = verify(ctx, &header, candidates, &signature, &signing_input).await?;
        if anchor_key.is_none() {
            anchor_key = Some(signer);
        }
        authority = published;
        subject = sub;
    }

    if subject != entity_id {
        return Err(Error::new(
            Err::InvalidJws,
            format!("chain leads to {subject}, not to {entity_id}"),
        ));
    }
    let anchor_key =
        anchor_key.ok_or_else(|| Error::new(Err::InvalidArgument, "empty trust chain"))?;
    Ok((anchor_key, authority))
}

fn claim(payload: &Value, name: &str) -> crate::Result<String> {
    payload.get(name).and_then(Value::as_str).map(ToString::to_string).ok_or_else(|| {
        Error::new(Err::InvalidJws, format!("entity statement has no '{name}' claim"))
    })
}

fn decode(statement: &str) -> crate::Result<(JwsHeader, Value, Vec<u8>, String)> {
    let general = Jws::parse(statement)?.to_general()?;
    let (Some(signature), Some(signing_input)) =
        (general.signatures.first(), general.signing_input(0))
    else {
        return Err(Error::new(Err::InvalidJws, "entity statement has no signature"));
    };
    let header = JwsHeader::decode(&signature.protected)?;
    let payload = serde_json::from_slice(&general.payload_bytes()?)
        .map_err(|e| {
            Error::new(Err::InvalidJws, format!("entity statement payload is not JSON: {e}"))
        })?;
    let signature = Base64UrlUnpadded::decode_vec(&signature.signature)
        .map_err(|e| Error::new(Err::InvalidJws, format!("signature is not base64url: {e}")))?;
    Ok((header, payload, signature, signing_input))
}

fn published_keys(payload: &Value) -> crate::Result<Vec<PublicKeyJwk>> {
    let Some(keys) = payload.pointer("/jwks/keys") else {
        return Ok(vec![]);
    };
    serde_json::from_value(keys.clone())
        .map_err(|e| Error::new(Err::InvalidJws, format!("entity statement jwks are invalid: {e}")))
}

// The key that verifies the statement. Keys named by the header `kid` are
// tried first.
async fn verify(
    ctx: &Context, header: &JwsHeader, candidates: &[PublicKeyJwk], signature: &[u8],
    signing_input: &str,
) -> crate::Result<PublicKeyJwk> {
    let alg =
        header.alg.ok_or_else(|| Error::new(Err::InvalidJws, "entity statement has no alg"))?;
    let (named, others): (Vec<&PublicKeyJwk>, Vec<&PublicKeyJwk>) =
        candidates.iter().partition(|jwk| header.kid.is_some() && jwk.kid == header.kid);

    for jwk in named.into_iter().chain(others) {
        let verified = ctx
            .crypto()
            .verify(alg, jwk, signature, signing_input.as_bytes())
            .await
            .unwrap_or(false);
        if verified {
            return Ok(jwk.clone());
        }
    }
    Err(Error::new(Err::InvalidJws, "entity statement signature could not be verified"))
}
