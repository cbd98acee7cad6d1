//! # Provider Traits
//!
//! Collaborators the resolvers depend on, and the [`Context`] that wires them
//! together. Each collaborator is optional; operations that need a missing
//! one fail with [`Err::MissingPlugin`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::crypto::{CryptoEngine, DefaultCrypto};
use crate::did::{DidIdentifier, Resolution};
use crate::error::{Err, Error};
use crate::kms::KeyManager;

/// [`DidManager`] gives access to DIDs managed by the local agent.
#[async_trait]
pub trait DidManager: Send + Sync {
    /// Get a managed DID by its DID.
    async fn get(&self, did: &str) -> anyhow::Result<Option<DidIdentifier>>;

    /// All managed DIDs.
    async fn list(&self) -> anyhow::Result<Vec<DidIdentifier>>;
}

/// [`DidResolver`] resolves a DID URL to its DID document.
///
/// Implementers might dereference the DID directly, look up a local cache,
/// fetch from a remote resolver or read a ledger.
#[async_trait]
pub trait DidResolver: Send + Sync {
    /// Resolve a DID URL. A resolution without a document means the DID is
    /// unknown to this resolver.
    async fn resolve(&self, did_url: &str) -> anyhow::Result<Resolution>;
}

/// [`FederationClient`] fetches OpenID Federation trust chains.
#[async_trait]
pub trait FederationClient: Send + Sync {
    /// The trust chain from `entity_id` to `trust_anchor` as compact JWS
    /// entity statements, leaf first and trust anchor configuration last.
    async fn resolve_trust_chain(
        &self, entity_id: &str, trust_anchor: &str,
    ) -> anyhow::Result<Vec<String>>;
}

/// Collaborators used by resolution and signing operations.
#[derive(Clone)]
pub struct Context {
    key_manager: Option<KeyManager>,
    did_manager: Option<Arc<dyn DidManager>>,
    local_resolver: Option<Arc<dyn DidResolver>>,
    drivers: HashMap<String, Arc<dyn DidResolver>>,
    universal_resolver: Option<Arc<dyn DidResolver>>,
    federation: Option<Arc<dyn FederationClient>>,
    crypto: Arc<dyn CryptoEngine>,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            key_manager: None,
            did_manager: None,
            local_resolver: None,
            drivers: HashMap::new(),
            universal_resolver: None,
            federation: None,
            crypto: Arc::new(DefaultCrypto),
        }
    }
}

impl Context {
    /// Start building a context.
    #[must_use]
    pub fn builder() -> ContextBuilder {
        ContextBuilder::new()
    }

    /// The key manager.
    ///
    /// # Errors
    ///
    /// Returns [`Err::MissingPlugin`] if none is configured.
    pub fn key_manager(&self) -> crate::Result<&KeyManager> {
        self.key_manager.as_ref().ok_or_else(|| missing("key manager"))
    }

    /// The DID manager.
    ///
    /// # Errors
    ///
    /// Returns [`Err::MissingPlugin`] if none is configured.
    pub fn did_manager(&self) -> crate::Result<&dyn DidManager> {
        self.did_manager.as_deref().ok_or_else(|| missing("DID manager"))
    }

    /// The federation client.
    ///
    /// # Errors
    ///
    /// Returns [`Err::MissingPlugin`] if none is configured.
    pub fn federation(&self) -> crate::Result<&dyn FederationClient> {
        self.federation.as_deref().ok_or_else(|| missing("federation client"))
    }

    /// The local agent's DID resolver, if configured.
    #[must_use]
    pub fn local_resolver(&self) -> Option<&dyn DidResolver> {
        self.local_resolver.as_deref()
    }

    /// The driver registered for a DID method, if any.
    #[must_use]
    pub fn driver(&self, method: &str) -> Option<&dyn DidResolver> {
        self.drivers.get(method).map(AsRef::as_ref)
    }

    /// The universal resolver, if configured.
    #[must_use]
    pub fn universal_resolver(&self) -> Option<&dyn DidResolver> {
        self.universal_resolver.as_deref()
    }

    /// The crypto engine.
    #[must_use]
    pub fn crypto(&self) -> &dyn CryptoEngine {
        self.crypto.as_ref()
    }
}

fn missing(what: &str) -> Error {
    Error::new(Err::MissingPlugin, format!("no {what} configured"))
}

/// Builder for [`Context`].
#[derive(Default)]
pub struct ContextBuilder {
    context: Context,
}

impl ContextBuilder {
    /// Create a builder with no collaborators and the default crypto engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Key manager used for managed identifiers and signing.
    #[must_use]
    pub fn key_manager(mut self, key_manager: KeyManager) -> Self {
        self.context.key_manager = Some(key_manager);
        self
    }

    /// DID manager holding the agent's own DIDs.
    #[must_use]
    pub fn did_manager(mut self, did_manager: Arc<dyn DidManager>) -> Self {
        self.context.did_manager = Some(did_manager);
        self
    }

    /// The local agent's DID resolver.
    #[must_use]
    pub fn local_resolver(mut self, resolver: Arc<dyn DidResolver>) -> Self {
        self.context.local_resolver = Some(resolver);
        self
    }

    /// Register a resolver for one DID method, for example `"web"`.
    #[must_use]
    pub fn driver(mut self, method: impl Into<String>, resolver: Arc<dyn DidResolver>) -> Self {
        self.context.drivers.insert(method.into(), resolver);
        self
    }

    /// Universal resolver, consulted last.
    #[must_use]
    pub fn universal_resolver(mut self, resolver: Arc<dyn DidResolver>) -> Self {
        self.context.universal_resolver = Some(resolver);
        self
    }

    /// OpenID Federation client.
    #[must_use]
    pub fn federation(mut self, client: Arc<dyn FederationClient>) -> Self {
        self.context.federation = Some(client);
        self
    }

    /// Replace the default crypto engine.
    #[must_use]
    pub fn crypto(mut self, crypto: Arc<dyn CryptoEngine>) -> Self {
        self.context.crypto = crypto;
        self
    }

    /// Build the context.
    #[must_use]
    pub fn build(self) -> Context {
        self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_collaborators() {
        let ctx = Context::default();
        assert!(ctx.key_manager().err().is_some_and(|e| e.is(Err::MissingPlugin)));
        assert!(ctx.did_manager().err().is_some_and(|e| e.is(Err::MissingPlugin)));
        assert!(ctx.federation().err().is_some_and(|e| e.is(Err::MissingPlugin)));
        assert!(ctx.driver("web").is_none());
    }
}
