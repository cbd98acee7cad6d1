//! # Key Management
//!
//! Key management systems hold private keys and sign with them. Backends
//! implement [`KeyManagementSystem`] and are registered, by name, with a
//! [`KeyManager`] which dispatches to them.

mod local;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use self::local::LocalKms;
use crate::error::{Err, Error};
use crate::jose::jwa::Algorithm;
use crate::key::{KeyMetadata, KeyType, ManagedKey};

/// A key management system backend.
#[async_trait]
pub trait KeyManagementSystem: Send + Sync {
    /// Name the backend is registered under. Becomes [`ManagedKey::kms`].
    fn name(&self) -> &str;

    /// Whether the backend can create and use keys of `key_type`.
    fn supports(&self, key_type: KeyType) -> bool;

    /// Generate a new key.
    async fn create_key(
        &self, key_type: KeyType, meta: Option<KeyMetadata>,
    ) -> anyhow::Result<ManagedKey>;

    /// Import an existing private key.
    async fn import_key(&self, import: ImportKey) -> anyhow::Result<ManagedKey>;

    /// Get a key by its identifier.
    async fn get_key(&self, kid: &str) -> anyhow::Result<Option<ManagedKey>>;

    /// Delete a key. Returns `false` if the key did not exist.
    async fn delete_key(&self, kid: &str) -> anyhow::Result<bool>;

    /// List all keys.
    async fn list_keys(&self) -> anyhow::Result<Vec<ManagedKey>>;

    /// Sign `data` with the key. ECDSA signatures are returned as `r || s`.
    async fn sign(&self, kid: &str, algorithm: Algorithm, data: &[u8]) -> anyhow::Result<Vec<u8>>;
}

/// A private key to import.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ImportKey {
    /// Identifier for the key. Defaults to the key's JWK thumbprint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Key type.
    #[serde(rename = "type")]
    pub key_type: KeyType,

    /// Hex encoded private key. EC and OKP keys are raw scalars or seeds,
    /// RSA keys PKCS#8 or PKCS#1 DER.
    pub private_key_hex: String,

    /// Metadata to store with the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<KeyMetadata>,
}

/// Registry of key management systems. Backends are consulted in
/// registration order unless one is named explicitly.
#[derive(Clone, Default)]
pub struct KeyManager {
    backends: Vec<Arc<dyn KeyManagementSystem>>,
}

impl KeyManager {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend.
    #[must_use]
    pub fn with(mut self, kms: Arc<dyn KeyManagementSystem>) -> Self {
        self.backends.push(kms);
        self
    }

    /// The backend registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`Err::MissingPlugin`] if no backend has that name.
    pub fn backend(&self, name: &str) -> crate::Result<&Arc<dyn KeyManagementSystem>> {
        self.backends
            .iter()
            .find(|b| b.name() == name)
            .ok_or_else(|| {
                Error::new(Err::MissingPlugin, format!("no key management system named '{name}'"))
            })
    }

    // named backend, or the first registered backend supporting the type
    fn select(
        &self, name: Option<&str>, key_type: KeyType,
    ) -> crate::Result<&Arc<dyn KeyManagementSystem>> {
        if let Some(name) = name {
            let backend = self.backend(name)?;
            if !backend.supports(key_type) {
                return Err(Error::new(
                    Err::UnsupportedKeyType,
                    format!("key management system '{name}' does not support {key_type} keys"),
                ));
            }
            return Ok(backend);
        }
        if self.backends.is_empty() {
            return Err(Error::new(Err::MissingPlugin, "no key management system registered"));
        }
        self.backends.iter().find(|b| b.supports(key_type)).ok_or_else(|| {
            Error::new(
                Err::UnsupportedKeyType,
                format!("no key management system supports {key_type} keys"),
            )
        })
    }

    /// Generate a key in the named backend or the first one supporting
    /// `key_type`.
    ///
    /// # Errors
    ///
    /// Returns [`Err::UnsupportedKeyType`] if the selected backend cannot
    /// create keys of the type.
    pub async fn create_key(
        &self, kms: Option<&str>, key_type: KeyType, meta: Option<KeyMetadata>,
    ) -> crate::Result<ManagedKey> {
        let backend = self.select(kms, key_type)?;
        Ok(backend.create_key(key_type, meta).await?)
    }

    /// Import a private key into the named backend or the first one
    /// supporting its type.
    ///
    /// # Errors
    ///
    /// Returns [`Err::UnsupportedKeyType`] if the selected backend cannot
    /// hold keys of the type.
    pub async fn import_key(
        &self, kms: Option<&str>, import: ImportKey,
    ) -> crate::Result<ManagedKey> {
        let backend = self.select(kms, import.key_type)?;
        Ok(backend.import_key(import).await?)
    }

    /// Find a key in any backend.
    ///
    /// # Errors
    ///
    /// Returns an error if a backend fails.
    pub async fn find_key(&self, kid: &str) -> crate::Result<Option<ManagedKey>> {
        for backend in &self.backends {
            if let Some(key) = backend.get_key(kid).await? {
                return Ok(Some(key));
            }
        }
        Ok(None)
    }

    /// Get a key from any backend.
    ///
    /// # Errors
    ///
    /// Returns [`Err::KeyNotFound`] if no backend holds the key.
    pub async fn get_key(&self, kid: &str) -> crate::Result<ManagedKey> {
        self.find_key(kid)
            .await?
            .ok_or_else(|| Error::new(Err::KeyNotFound, format!("key '{kid}' not found")))
    }

    /// Keys held by all backends, in registration order.
    ///
    /// # Errors
    ///
    /// Returns an error if a backend fails.
    pub async fn list_keys(&self) -> crate::Result<Vec<ManagedKey>> {
        let mut keys = vec![];
        for backend in &self.backends {
            keys.extend(backend.list_keys().await?);
        }
        Ok(keys)
    }

    /// Delete a key from whichever backend holds it.
    ///
    /// # Errors
    ///
    /// Returns an error if a backend fails.
    pub async fn delete_key(&self, kid: &str) -> crate::Result<bool> {
        for backend in &self.backends {
            if backend.delete_key(kid).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Sign with a key held by any backend.
    ///
    /// # Errors
    ///
    /// Returns [`Err::KeyNotFound`] if no backend holds the key.
    pub async fn sign(
        &self, kid: &str, algorithm: Algorithm, data: &[u8],
    ) -> crate::Result<Vec<u8>> {
        let key = self.get_key(kid).await?;
        let backend = self.backend(&key.kms)?;
        tracing::debug!("signing with key '{kid}' in '{}' using {algorithm}", key.kms);
        Ok(backend.sign(kid, algorithm, data).await?)
    }
}
