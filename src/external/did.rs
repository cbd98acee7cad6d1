//! DIDs resolved through the layered resolvers.

use super::{dedup, ExternalDetails, ExternalIdentifierResult, ExternalOptions, JwkInfo};
use crate::did::{self, DidUrl, Relationship};
use crate::error::{Err, Error};
use crate::managed::IdentifierMethod;
use crate::provider::Context;

pub async fn resolve(
    ctx: &Context, did_url: &str, opts: &ExternalOptions,
) -> crate::Result<ExternalIdentifierResult> {
    let url: DidUrl = did_url.parse()?;
    let resolution = did::resolve_document(ctx, did_url, &opts.resolution).await?;
    let Some(document) = resolution.did_document else {
        return Err(Error::new(Err::ResolutionFailed, format!("no document for {did_url}")));
    };

    // a fragment selects a single verification method
    let methods = if let Some(vm_id) = url.did_with_fragment() {
        let vm = document
            .verification_method(&vm_id)
            .ok_or_else(|| {
                Error::new(Err::IdentifierNotFound, format!("{vm_id} not found in DID document"))
            })?;
        vec![vm]
    } else {
        document.methods(Relationship::VerificationMethod)
    };

    let mut jwks = vec![];
    for vm in methods {
        match vm.to_jwk(&document.absolute(&vm.id)).and_then(JwkInfo::new) {
            Ok(info) => jwks.push(info),
            Err(e) => tracing::warn!("skipping verification method {}: {e}", vm.id),
        }
    }

    Ok(ExternalIdentifierResult {
        method: IdentifierMethod::Did,
        jwks: dedup(jwks),
        details: Some(ExternalDetails::Did {
            did_url: url,
            did_document: Box::new(document),
            did_resolution_metadata: resolution.did_resolution_metadata,
            did_document_metadata: resolution.did_document_metadata,
        }),
    })
}
