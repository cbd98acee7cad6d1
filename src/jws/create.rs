//! JWS signing.

use base64ct::{Base64UrlUnpadded, Encoding};

use super::header::protected_header;
use super::{JwsCreateOptions, JwsPayload, Serialization};
use crate::error::{Err, Error};
use crate::jose::{Algorithm, Jws, JwsJsonFlattened, JwsJsonGeneral, JwsSignature};
use crate::managed::ManagedIdentifierResult;
use crate::provider::Context;

/// Sign `payload` with a managed identifier.
///
/// The header is settled before signing: see [`JwsMode`](super::JwsMode) for
/// how the identifier member is chosen. The signing input is signed by the
/// key management system holding the identifier's key.
///
/// # Errors
///
/// Returns [`Err::ConflictingHeaderModes`] or [`Err::HeaderIdentifierMismatch`]
/// when the header's identifier members are inconsistent with the mode or
/// the signing key, and [`Err::InvalidArgument`] when an unprotected header is
/// requested with the compact serialization.
pub async fn create_jws(
    ctx: &Context, identifier: &ManagedIdentifierResult, payload: &JwsPayload,
    opts: &JwsCreateOptions,
) -> crate::Result<Jws> {
    if opts.serialization == Serialization::Compact && opts.unprotected_header.is_some() {
        return Err(Error::new(
            Err::InvalidArgument,
            "compact JWS cannot carry an unprotected header",
        ));
    }

    let header = protected_header(ctx, identifier, opts).await?;
    let protected = header.encode()?;
    let payload = payload.encode()?;
    let signing_input = format!("{protected}.{payload}");

    let signature = match header.alg {
        Some(Algorithm::None) | None => String::new(),
        Some(alg) => {
            let key_manager = ctx.key_manager()?;
            let signature =
                key_manager.sign(&identifier.kms_key_ref, alg, signing_input.as_bytes()).await?;
            Base64UrlUnpadded::encode_string(&signature)
        }
    };
    tracing::debug!("signed JWS with {}", identifier.kms_key_ref);

    if opts.serialization == Serialization::Compact {
        return Ok(Jws::Compact(format!("{signing_input}.{signature}")));
    }
    let general = JwsJsonGeneral {
        payload,
        signatures: vec![JwsSignature {
            protected,
            header: opts.unprotected_header.clone(),
            signature,
        }],
    };
    let jws = if opts.serialization == Serialization::Flattened {
        Jws::Flattened(JwsJsonFlattened::try_from(general)?)
    } else {
        Jws::General(general)
    };
    Ok(jws)
}
