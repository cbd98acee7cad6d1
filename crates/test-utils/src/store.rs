use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use vercre_identifier::did::{DidIdentifier, Document, Resolution};
use vercre_identifier::provider::{DidManager, DidResolver};

/// DID manager holding identifiers in memory.
#[derive(Clone, Default)]
pub struct MemoryDidManager {
    identifiers: Arc<DashMap<String, DidIdentifier>>,
}

impl MemoryDidManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) an identifier.
    pub fn add(&self, identifier: DidIdentifier) {
        self.identifiers.insert(identifier.did.clone(), identifier);
    }
}

#[async_trait]
impl DidManager for MemoryDidManager {
    async fn get(&self, did: &str) -> anyhow::Result<Option<DidIdentifier>> {
        Ok(self.identifiers.get(did).map(|entry| entry.value().clone()))
    }

    async fn list(&self) -> anyhow::Result<Vec<DidIdentifier>> {
        Ok(self.identifiers.iter().map(|entry| entry.value().clone()).collect())
    }
}

/// DID resolver serving a fixed set of documents. Unknown DIDs resolve to a
/// resolution without a document.
#[derive(Clone, Default)]
pub struct StaticResolver {
    documents: Arc<DashMap<String, Document>>,
}

impl StaticResolver {
    /// Create a resolver with no documents.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `document` for its DID.
    #[must_use]
    pub fn with(self, document: Document) -> Self {
        self.documents.insert(document.id.clone(), document);
        self
    }
}

#[async_trait]
impl DidResolver for StaticResolver {
    async fn resolve(&self, did_url: &str) -> anyhow::Result<Resolution> {
        let did = did_url.split(['#', '?', '/']).next().unwrap_or(did_url);
        let mut resolution = Resolution {
            did_document: self.documents.get(did).map(|entry| entry.value().clone()),
            ..Resolution::default()
        };
        resolution
            .did_resolution_metadata
            .insert("contentType".to_string(), "application/did+ld+json".into());
        Ok(resolution)
    }
}
