//! JWS verification.

use base64ct::{Base64UrlUnpadded, Encoding};
use futures::future::join_all;
use serde_json::Value;

use super::{JwsVerifyOptions, JwsVerifyResult, SignatureResult};
use crate::error::{Err, Error};
use crate::external::{self, ExternalIdentifier};
use crate::jose::jwk::PublicKeyJwk;
use crate::jose::{Algorithm, Jws, JwsHeader};
use crate::managed::IdentifierMethod;
use crate::provider::Context;

// Where the signer's key comes from.
enum Signer {
    External(ExternalIdentifier),
    Supplied(PublicKeyJwk),
    Unsecured,
    Unsupported(String),
}

// A signature ready to check.
struct Pending {
    index: usize,
    alg: Option<Algorithm>,
    signer: Signer,
    signing_input: String,
    signature: String,
}

/// Verify every signature of a JWS.
///
/// Each signature's signer is recovered from its header: an `x5c` chain, an
/// embedded `jwk`, or a `kid` holding a DID URL. Without one, the key in
/// `opts` is used. Unsecured (`alg: none`) signatures need no signer and
/// verify when the signature is empty.
///
/// Headers are checked for all signatures before any is verified. Signatures
/// are then verified concurrently; failures are reported in the result.
///
/// # Errors
///
/// Returns [`Err::InvalidJws`] for a malformed JWS and
/// [`Err::UnsupportedVerificationIdentifier`] when a header carries nothing
/// the signer can be recovered from.
pub async fn verify_jws(
    ctx: &Context, jws: &Jws, opts: &JwsVerifyOptions,
) -> crate::Result<JwsVerifyResult> {
    let general = jws.to_general()?;
    if general.signatures.is_empty() {
        return Err(Error::new(Err::InvalidJws, "JWS has no signatures"));
    }

    let mut pending = vec![];
    for (index, signature) in general.signatures.iter().enumerate() {
        let (protected, alg) = protected_header(index, &signature.protected)?;
        let signer = match &alg {
            Ok(alg) => signer(index, *alg, &protected, signature.header.as_ref(), opts)?,
            Err(unsupported) => Signer::Unsupported(unsupported.clone()),
        };
        let alg = alg.ok();
        pending.push(Pending {
            index,
            alg,
            signer,
            signing_input: format!("{}.{}", signature.protected, general.payload),
            signature: signature.signature.clone(),
        });
    }

    let results = join_all(pending.iter().map(|p| check(ctx, p, opts))).await;

    let failed: Vec<String> = results
        .iter()
        .filter(|r| !r.verified)
        .map(|r| format!("signature at index {} could not be verified", r.index))
        .collect();
    let error = !failed.is_empty();
    let message = if error { failed.join("; ") } else { "JWS signatures verified".to_string() };
    if error {
        tracing::debug!("JWS verification failed: {message}");
    }

    Ok(JwsVerifyResult {
        error,
        critical: error,
        message,
        signatures: results,
    })
}

// Decode a protected header. An algorithm this crate cannot verify fails only
// its own signature, so it is returned separately from the header.
fn protected_header(
    index: usize, encoded: &str,
) -> crate::Result<(JwsHeader, Result<Algorithm, String>)> {
    let bytes = Base64UrlUnpadded::decode_vec(encoded).map_err(|e| {
        Error::new(Err::InvalidJws, format!("protected header is not base64url: {e}"))
    })?;
    let mut value: Value = serde_json::from_slice(&bytes).map_err(|e| {
        Error::new(Err::InvalidJws, format!("protected header is not valid JSON: {e}"))
    })?;

    let alg = match value.as_object_mut().and_then(|header| header.remove("alg")) {
        Some(Value::String(alg)) => alg.parse::<Algorithm>().map_err(|e| e.to_string()),
        Some(other) => Err(format!("unsupported algorithm: {other}")),
        None => {
            return Err(Error::new(
                Err::InvalidJws,
                format!("signature at index {index} has no alg"),
            ));
        }
    };
    let mut header: JwsHeader = serde_json::from_value(value)
        .map_err(|e| Error::new(Err::InvalidJws, format!("invalid protected header: {e}")))?;
    header.alg = alg.as_ref().ok().copied();
    Ok((header, alg))
}

fn signer(
    index: usize, alg: Algorithm, protected: &JwsHeader, unprotected: Option<&JwsHeader>,
    opts: &JwsVerifyOptions,
) -> crate::Result<Signer> {
    if alg == Algorithm::None {
        return Ok(Signer::Unsecured);
    }

    for header in std::iter::once(protected).chain(unprotected) {
        if let Some(x5c) = &header.x5c {
            return Ok(Signer::External(ExternalIdentifier::X5c(x5c.clone())));
        }
        if let Some(jwk) = &header.jwk {
            return Ok(Signer::External(ExternalIdentifier::Jwk(jwk.clone())));
        }
        if let Some(kid) = header.kid.as_ref().filter(|kid| kid.starts_with("did:")) {
            return Ok(Signer::External(ExternalIdentifier::Did(kid.clone())));
        }
    }
    if let Some(jwk) = &opts.jwk {
        return Ok(Signer::Supplied(jwk.clone()));
    }
    Err(Error::new(
        Err::UnsupportedVerificationIdentifier,
        format!("signature at index {index} has no x5c, jwk or DID kid header to verify with"),
    ))
}

async fn check(ctx: &Context, pending: &Pending, opts: &JwsVerifyOptions) -> SignatureResult {
    let mut result = SignatureResult {
        index: pending.index,
        verified: false,
        method: None,
        jwk: None,
        message: None,
    };

    let jwk = match &pending.signer {
        Signer::Unsupported(reason) => {
            result.message = Some(reason.clone());
            return result;
        }
        Signer::Unsecured => {
            result.verified = pending.signature.is_empty();
            if !result.verified {
                result.message = Some("unsecured JWS carries a signature".to_string());
            }
            return result;
        }
        Signer::Supplied(jwk) => jwk.clone(),
        Signer::External(identifier) => {
            result.method = Some(identifier.method());
            match external::resolve(ctx, identifier, &opts.external).await {
                Ok(resolved) if !resolved.is_trusted() => {
                    result.message =
                        Some(format!("{} identifier is not trusted", identifier.method()));
                    return result;
                }
                Ok(resolved) => match resolved.first_jwk() {
                    Some(jwk) => jwk.clone(),
                    None => {
                        result.message = Some("identifier has no public key".to_string());
                        return result;
                    }
                },
                Err(e) => {
                    result.message = Some(e.to_string());
                    return result;
                }
            }
        }
    };

    let Some(alg) = pending.alg else {
        return result;
    };
    let verified = match Base64UrlUnpadded::decode_vec(&pending.signature) {
        Ok(signature) => {
            ctx.crypto().verify(alg, &jwk, &signature, pending.signing_input.as_bytes()).await
        }
        Err(e) => Err(anyhow::anyhow!("signature is not base64url: {e}")),
    };
    match verified {
        Ok(true) => result.verified = true,
        Ok(false) => result.message = Some("signature does not match".to_string()),
        Err(e) => result.message = Some(e.to_string()),
    }
    if result.method.is_none() {
        result.method = Some(IdentifierMethod::Jwk);
    }
    result.jwk = Some(jwk);
    result
}
