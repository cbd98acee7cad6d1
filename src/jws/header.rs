//! Header identifier selection and checks, made before anything is signed.

use super::{JwsCreateOptions, JwsMode};
use crate::error::{Err, Error};
use crate::jose::{Algorithm, JwsHeader};
use crate::managed::{
    self, DidReference, IdentifierMethod, ManagedDetails, ManagedIdentifier,
    ManagedIdentifierResult, ManagedOptions,
};
use crate::provider::Context;
use crate::x509;

/// Build the protected header for signing with `identifier`.
pub async fn protected_header(
    ctx: &Context, identifier: &ManagedIdentifierResult, opts: &JwsCreateOptions,
) -> crate::Result<JwsHeader> {
    let mut header = opts.protected_header.clone();

    let mut members = header.identifier_members();
    if let Some(unprotected) = &opts.unprotected_header {
        members.extend(unprotected.identifier_members());
    }
    if members.len() > 1 {
        return Err(Error::new(
            Err::ConflictingHeaderModes,
            format!("header carries more than one identifier: {}", members.join(", ")),
        ));
    }

    let mode = opts.mode.effective(identifier.method);
    check_mode(mode, identifier)?;

    if let Some(member) = members.first() {
        if *member != mode.member() {
            return Err(Error::new(
                Err::ConflictingHeaderModes,
                format!("{member} header conflicts with {mode:?} mode"),
            ));
        }
        let supplied =
            opts.unprotected_header.as_ref().filter(|h| !h.identifier_members().is_empty());
        check_identifier(ctx, supplied.unwrap_or(&header), identifier).await?;
    } else if !opts.no_identifier_in_header {
        inject(&mut header, mode, identifier)?;
    }

    let alg = match header.alg {
        Some(alg) => alg,
        None => Algorithm::default_for(identifier.key.key_type)?,
    };
    if alg != Algorithm::None && !alg.supports(identifier.key.key_type) {
        return Err(Error::new(
            Err::UnsupportedAlgorithm,
            format!(
                "{alg} cannot be used with {} key {}",
                identifier.key.key_type,
                identifier.kms_key_ref
            ),
        ));
    }
    header.alg = Some(alg);
    Ok(header)
}

fn check_mode(mode: JwsMode, identifier: &ManagedIdentifierResult) -> crate::Result<()> {
    let compatible = match mode {
        JwsMode::X5c => identifier.method == IdentifierMethod::X5c,
        JwsMode::Did => identifier.method == IdentifierMethod::Did,
        JwsMode::Kid | JwsMode::Jwk | JwsMode::Auto => true,
    };
    if !compatible {
        return Err(Error::new(
            Err::ConflictingHeaderModes,
            format!("{mode:?} mode cannot be used with a {} identifier", identifier.method),
        ));
    }
    Ok(())
}

fn inject(
    header: &mut JwsHeader, mode: JwsMode, identifier: &ManagedIdentifierResult,
) -> crate::Result<()> {
    match mode {
        JwsMode::Jwk => header.jwk = Some(identifier.jwk.to_public()),
        JwsMode::X5c => {
            let Some(ManagedDetails::X5c { x5c, .. }) = &identifier.details else {
                return Err(Error::new(
                    Err::ConflictingHeaderModes,
                    "identifier has no certificate chain",
                ));
            };
            let chain = x5c
                .iter()
                .map(|c| {
                    x509::pem_or_der_to_certificate(c)
                        .and_then(|cert| x509::certificate_to_base64(&cert))
                })
                .collect::<crate::Result<Vec<_>>>()?;
            header.x5c = Some(chain);
        }
        JwsMode::Kid | JwsMode::Did | JwsMode::Auto => {
            header.kid = Some(
                identifier.kid.clone().unwrap_or_else(|| identifier.kms_key_ref.clone()),
            );
        }
    }
    Ok(())
}

// The identifier in the header must resolve to the signing key. `kid`
// headers are resolved on their own; `jwk` and `x5c` headers are looked up
// under the signing key's reference, which fails unless the keys match.
async fn check_identifier(
    ctx: &Context, header: &JwsHeader, identifier: &ManagedIdentifierResult,
) -> crate::Result<()> {
    let signing_ref = Some(identifier.kms_key_ref.clone());
    let (claimed, opts) = if let Some(kid) = &header.kid {
        let claimed = if kid.starts_with("did:") {
            ManagedIdentifier::Did(DidReference::Url(kid.clone()))
        } else {
            ManagedIdentifier::Kid(kid.clone())
        };
        (claimed, ManagedOptions::default())
    } else if let Some(jwk) = &header.jwk {
        let opts = ManagedOptions {
            kms_key_ref: signing_ref,
            ..ManagedOptions::default()
        };
        (ManagedIdentifier::Jwk(jwk.clone()), opts)
    } else if let Some(x5c) = &header.x5c {
        let opts = ManagedOptions {
            kms_key_ref: signing_ref,
            ..ManagedOptions::default()
        };
        (ManagedIdentifier::X5c(x5c.clone()), opts)
    } else {
        return Ok(());
    };

    let mismatch = |reason: String| {
        Error::new(
            Err::HeaderIdentifierMismatch,
            format!(
                "header {claimed} does not identify signing key {}: {reason}",
                identifier.kms_key_ref
            ),
        )
    };
    let resolved =
        managed::resolve(ctx, &claimed, &opts).await.map_err(|e| mismatch(e.to_string()))?;
    if resolved.kms_key_ref != identifier.kms_key_ref {
        return Err(mismatch(format!("header resolves to {}", resolved.kms_key_ref)));
    }
    Ok(())
}
