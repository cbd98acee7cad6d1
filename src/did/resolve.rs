//! # DID Resolution
//!
//! Layered DID resolution: locally registered identifiers first, then the
//! driver registered for the DID method, then a universal resolver. The first
//! strategy producing a document wins.
//!
//! See [DID resolution](https://www.w3.org/TR/did-core/#did-resolution) for more.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::document::Document;
use super::identifier::to_did_document;
use super::url::DidUrl;
use crate::error::{Err, Error};
use crate::provider::{Context, DidResolver};

/// The result of resolving a DID.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    /// The resolved document. `None` when the resolver does not know the DID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub did_document: Option<Document>,

    /// Resolution metadata, for example `contentType` or `error`.
    #[serde(default)]
    pub did_resolution_metadata: Map<String, Value>,

    /// Document metadata, for example `created` or `deactivated`.
    #[serde(default)]
    pub did_document_metadata: Map<String, Value>,
}

impl Resolution {
    /// A resolution holding `document`.
    #[must_use]
    pub fn from_document(document: Document) -> Self {
        Self {
            did_document: Some(document),
            ..Self::default()
        }
    }
}

/// Strategies enabled for layered resolution.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct LayeredResolution {
    /// Try DIDs held by the local agent.
    pub local: bool,

    /// Try the driver registered for the DID method.
    pub drivers: bool,

    /// Try the universal resolver.
    pub universal: bool,
}

impl Default for LayeredResolution {
    fn default() -> Self {
        Self {
            local: true,
            drivers: true,
            universal: true,
        }
    }
}

/// Resolve a DID URL using the enabled strategies, in order.
///
/// The local strategy uses the context's local resolver or, without one,
/// synthesizes a document from a DID held by the DID manager.
///
/// # Errors
///
/// Returns [`Err::InvalidDid`] for a malformed DID URL and
/// [`Err::MissingPlugin`] when no enabled strategy is configured. When no
/// strategy produces a document, the first strategy error is returned or,
/// without one, [`Err::ResolutionFailed`].
pub async fn resolve_document(
    ctx: &Context, did_url: &str, layers: &LayeredResolution,
) -> crate::Result<Resolution> {
    let url: DidUrl = did_url.parse()?;

    let mut attempted = false;
    let mut first_error: Option<Error> = None;

    if layers.local {
        if let Some(resolver) = ctx.local_resolver() {
            attempted = true;
            if let Some(resolution) = attempt(resolver, did_url, &mut first_error).await {
                return Ok(resolution);
            }
        } else if let Ok(manager) = ctx.did_manager() {
            attempted = true;
            match manager.get(&url.did).await {
                Ok(Some(identifier)) => {
                    tracing::debug!("resolved {} from local identifiers", url.did);
                    return Ok(Resolution::from_document(to_did_document(&identifier)?));
                }
                Ok(None) => {}
                Err(e) => {
                    first_error.get_or_insert(e.into());
                }
            }
        }
    }

    if layers.drivers {
        if let Some(driver) = ctx.driver(&url.method) {
            attempted = true;
            if let Some(resolution) = attempt(driver, did_url, &mut first_error).await {
                return Ok(resolution);
            }
        }
    }

    if layers.universal {
        if let Some(resolver) = ctx.universal_resolver() {
            attempted = true;
            if let Some(resolution) = attempt(resolver, did_url, &mut first_error).await {
                return Ok(resolution);
            }
        }
    }

    if let Some(err) = first_error {
        tracing::warn!("resolution of {did_url} failed: {err}");
        return Err(err);
    }
    if !attempted {
        return Err(Error::new(
            Err::MissingPlugin,
            format!("no DID resolver configured for {}", url.method),
        ));
    }
    Err(Error::new(Err::ResolutionFailed, format!("could not resolve {did_url}")))
}

// Returns the resolution if it holds a document. Errors are recorded and
// resolution continues with the next strategy.
async fn attempt(
    resolver: &dyn DidResolver, did_url: &str, first_error: &mut Option<Error>,
) -> Option<Resolution> {
    match resolver.resolve(did_url).await {
        Ok(resolution) if resolution.did_document.is_some() => Some(resolution),
        Ok(_) => None,
        Err(e) => {
            tracing::debug!("resolver failed for {did_url}: {e}");
            first_error.get_or_insert(e.into());
            None
        }
    }
}
