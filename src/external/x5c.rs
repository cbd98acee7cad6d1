//! X.509 certificate chains.

use x509_cert::der::Encode;

use super::{dedup, ExternalDetails, ExternalIdentifierResult, ExternalOptions, JwkInfo};
use crate::error::{Err, Error};
use crate::managed::IdentifierMethod;
use crate::provider::Context;
use crate::x509;

pub async fn resolve(
    ctx: &Context, x5c: &[String], opts: &ExternalOptions,
) -> crate::Result<ExternalIdentifierResult> {
    if x5c.is_empty() {
        return Err(Error::new(Err::InvalidArgument, "x5c chain is empty"));
    }

    let verification_result =
        if opts.verify { Some(x509::validate_certificate_chain(x5c, &opts.x509)?) } else { None };

    let validated = verification_result
        .as_ref()
        .filter(|r| !r.error)
        .and_then(|r| r.certificate_chain.as_ref());
    let jwks = if let Some(chain) = validated {
        chain
            .iter()
            .map(|info| JwkInfo::new(info.public_key_jwk.clone()))
            .collect::<crate::Result<Vec<_>>>()?
    } else {
        export_keys(ctx, x5c).await?
    };

    let issuer_jwk = jwks
        .first()
        .map(|info| info.jwk.clone())
        .ok_or_else(|| Error::new(Err::InvalidCertificate, "no public key in x5c chain"))?;
    if let Some(result) = verification_result.as_ref().filter(|r| r.error) {
        tracing::debug!("x5c chain not trusted: {}", result.message);
    }

    Ok(ExternalIdentifierResult {
        method: IdentifierMethod::X5c,
        jwks: dedup(jwks),
        details: Some(ExternalDetails::X5c {
            x5c: x5c.to_vec(),
            verification_result,
            issuer_jwk,
        }),
    })
}

// export each supplied certificate's key through the crypto engine
async fn export_keys(ctx: &Context, x5c: &[String]) -> crate::Result<Vec<JwkInfo>> {
    let mut jwks = vec![];
    for pem_or_der in x5c {
        let cert = x509::pem_or_der_to_certificate(pem_or_der)?;
        let spki = cert.tbs_certificate.subject_public_key_info.to_der().map_err(|e| {
            Error::new(
                Err::InvalidCertificate,
                format!("cannot encode certificate public key: {e}"),
            )
        })?;
        let jwk = ctx.crypto().export_jwk(&spki).await?;
        jwks.push(JwkInfo::new(jwk)?);
    }
    Ok(jwks)
}
