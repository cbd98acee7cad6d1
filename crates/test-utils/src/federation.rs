use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use dashmap::DashMap;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use serde_json::{json, Value};
use vercre_identifier::provider::FederationClient;

/// A federation entity with a P-256 signing key, able to issue entity
/// statements.
#[derive(Clone)]
pub struct Entity {
    /// Entity identifier.
    pub id: String,
    signing_key: SigningKey,
}

impl Entity {
    /// Create an entity whose private key is `seed` repeated.
    ///
    /// # Panics
    ///
    /// Panics if `seed` does not produce a valid P-256 scalar.
    #[must_use]
    pub fn new(id: impl Into<String>, seed: u8) -> Self {
        let signing_key =
            SigningKey::from_slice(&[seed; 32]).expect("should be a valid P-256 scalar");
        Self {
            id: id.into(),
            signing_key,
        }
    }

    /// Key identifier used in statement headers.
    #[must_use]
    pub fn kid(&self) -> String {
        format!("{}#key-1", self.id)
    }

    /// Public key as a JWK.
    #[must_use]
    pub fn jwk(&self) -> Value {
        let point = self.signing_key.verifying_key().to_encoded_point(false);
        let x = point.x().map(|x| Base64UrlUnpadded::encode_string(x)).unwrap_or_default();
        let y = point.y().map(|y| Base64UrlUnpadded::encode_string(y)).unwrap_or_default();
        json!({"kty": "EC", "crv": "P-256", "x": x, "y": y, "kid": self.kid()})
    }

    /// The entity's self-signed configuration.
    #[must_use]
    pub fn configuration(&self) -> String {
        self.statement(&self.id, &[self.jwk()])
    }

    /// A statement about `subject` publishing `keys`.
    #[must_use]
    pub fn subordinate(&self, subject: &Self) -> String {
        self.statement(&subject.id, &[subject.jwk()])
    }

    /// Sign a statement about `subject` publishing `keys`.
    #[must_use]
    pub fn statement(&self, subject: &str, keys: &[Value]) -> String {
        let header = json!({"alg": "ES256", "kid": self.kid(), "typ": "entity-statement+jwt"});
        let payload = json!({
            "iss": self.id,
            "sub": subject,
            "iat": 1_735_689_600,
            "exp": 4_102_444_800_i64,
            "jwks": {"keys": keys},
        });
        let signing_input = format!(
            "{}.{}",
            Base64UrlUnpadded::encode_string(header.to_string().as_bytes()),
            Base64UrlUnpadded::encode_string(payload.to_string().as_bytes())
        );
        let signature: Signature = self.signing_key.sign(signing_input.as_bytes());
        format!("{signing_input}.{}", Base64UrlUnpadded::encode_string(&signature.to_bytes()))
    }
}

/// Federation client returning preloaded trust chains.
#[derive(Clone, Default)]
pub struct MockFederation {
    chains: Arc<DashMap<(String, String), Vec<String>>>,
}

impl MockFederation {
    /// Create a client with no chains.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `chain` for `entity_id` under `trust_anchor`.
    #[must_use]
    pub fn with_chain(self, entity_id: &str, trust_anchor: &str, chain: Vec<String>) -> Self {
        self.chains.insert((entity_id.to_string(), trust_anchor.to_string()), chain);
        self
    }
}

#[async_trait]
impl FederationClient for MockFederation {
    async fn resolve_trust_chain(
        &self, entity_id: &str, trust_anchor: &str,
    ) -> anyhow::Result<Vec<String>> {
        self.chains
            .get(&(entity_id.to_string(), trust_anchor.to_string()))
            .map(|chain| chain.value().clone())
            .ok_or_else(|| anyhow!("no trust chain from {entity_id} to {trust_anchor}"))
    }
}
