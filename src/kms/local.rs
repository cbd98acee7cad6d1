//! In-memory key management system. Keys disappear when the store is dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use curve25519_dalek::montgomery::MontgomeryPoint;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePublicKey};
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::{Sha256, Sha384, Sha512};

use super::{ImportKey, KeyManagementSystem};
use crate::jose::jwa::Algorithm;
use crate::jose::jwk::Digest;
use crate::key::{self, JwkOptions, KeyMetadata, KeyType, ManagedKey};

const RSA_BITS: usize = 2048;

enum Secret {
    Secp256k1(k256::ecdsa::SigningKey),
    Secp256r1(p256::ecdsa::SigningKey),
    Ed25519(ed25519_dalek::SigningKey),
    X25519([u8; 32]),
    Rsa(Box<RsaPrivateKey>),
}

impl Secret {
    fn generate(key_type: KeyType) -> anyhow::Result<Self> {
        let secret = match key_type {
            KeyType::Secp256k1 => Self::Secp256k1(k256::ecdsa::SigningKey::random(&mut OsRng)),
            KeyType::Secp256r1 => Self::Secp256r1(p256::ecdsa::SigningKey::random(&mut OsRng)),
            KeyType::Ed25519 => Self::Ed25519(ed25519_dalek::SigningKey::generate(&mut OsRng)),
            KeyType::X25519 => {
                let mut bytes = [0u8; 32];
                OsRng.fill_bytes(&mut bytes);
                Self::X25519(bytes)
            }
            KeyType::Rsa => Self::Rsa(Box::new(RsaPrivateKey::new(&mut OsRng, RSA_BITS)?)),
            KeyType::Bls12381G2 => bail!("{key_type} keys are not supported"),
        };
        Ok(secret)
    }

    fn import(key_type: KeyType, private_key_hex: &str) -> anyhow::Result<Self> {
        let bytes = hex::decode(private_key_hex.trim_start_matches("0x"))?;
        let secret = match key_type {
            KeyType::Secp256k1 => Self::Secp256k1(k256::ecdsa::SigningKey::from_slice(&bytes)?),
            KeyType::Secp256r1 => Self::Secp256r1(p256::ecdsa::SigningKey::from_slice(&bytes)?),
            KeyType::Ed25519 => {
                let seed: [u8; 32] = bytes
                    .get(..32)
                    .and_then(|s| s.try_into().ok())
                    .ok_or_else(|| anyhow!("Ed25519 private key must be at least 32 bytes"))?;
                Self::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed))
            }
            KeyType::X25519 => {
                let seed: [u8; 32] =
                    bytes.try_into().map_err(|_| anyhow!("X25519 private key must be 32 bytes"))?;
                Self::X25519(seed)
            }
            KeyType::Rsa => {
                let key = RsaPrivateKey::from_pkcs8_der(&bytes)
                    .or_else(|_| RsaPrivateKey::from_pkcs1_der(&bytes))?;
                Self::Rsa(Box::new(key))
            }
            KeyType::Bls12381G2 => bail!("{key_type} keys are not supported"),
        };
        Ok(secret)
    }

    const fn key_type(&self) -> KeyType {
        match self {
            Self::Secp256k1(_) => KeyType::Secp256k1,
            Self::Secp256r1(_) => KeyType::Secp256r1,
            Self::Ed25519(_) => KeyType::Ed25519,
            Self::X25519(_) => KeyType::X25519,
            Self::Rsa(_) => KeyType::Rsa,
        }
    }

    // EC keys are stored compressed
    fn public_key_hex(&self) -> anyhow::Result<String> {
        let public = match self {
            Self::Secp256k1(sk) => sk.verifying_key().to_encoded_point(true).as_bytes().to_vec(),
            Self::Secp256r1(sk) => sk.verifying_key().to_encoded_point(true).as_bytes().to_vec(),
            Self::Ed25519(sk) => sk.verifying_key().to_bytes().to_vec(),
            Self::X25519(seed) => MontgomeryPoint::mul_base_clamped(*seed).to_bytes().to_vec(),
            Self::Rsa(sk) => sk.to_public_key().to_public_key_der()?.as_bytes().to_vec(),
        };
        Ok(hex::encode(public))
    }

    fn sign(&self, algorithm: Algorithm, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        if !algorithm.supports(self.key_type()) {
            bail!("algorithm {algorithm} cannot be used with {} keys", self.key_type());
        }
        let signature = match self {
            Self::Secp256k1(sk) => {
                let sig: k256::ecdsa::Signature = sk.sign(data);
                sig.to_bytes().to_vec()
            }
            Self::Secp256r1(sk) => {
                let sig: p256::ecdsa::Signature = sk.sign(data);
                sig.to_bytes().to_vec()
            }
            Self::Ed25519(sk) => sk.sign(data).to_bytes().to_vec(),
            Self::Rsa(sk) => {
                let key = sk.as_ref().clone();
                match algorithm {
                    Algorithm::RS384 => {
                        rsa::pkcs1v15::SigningKey::<Sha384>::new(key).sign(data).to_vec()
                    }
                    Algorithm::RS512 => {
                        rsa::pkcs1v15::SigningKey::<Sha512>::new(key).sign(data).to_vec()
                    }
                    _ => rsa::pkcs1v15::SigningKey::<Sha256>::new(key).sign(data).to_vec(),
                }
            }
            Self::X25519(_) => bail!("X25519 keys cannot sign"),
        };
        Ok(signature)
    }
}

struct Entry {
    key: ManagedKey,
    secret: Secret,
}

/// In-memory key management system for Secp256k1, Secp256r1, Ed25519,
/// X25519 and RSA keys.
#[derive(Clone)]
pub struct LocalKms {
    name: String,
    keys: Arc<Mutex<HashMap<String, Entry>>>,
}

impl LocalKms {
    /// Create an empty store registered under `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn keys(&self) -> anyhow::Result<MutexGuard<'_, HashMap<String, Entry>>> {
        self.keys.lock().map_err(|_| anyhow!("lock on key store poisoned"))
    }

    fn store(
        &self, kid: Option<String>, secret: Secret, meta: Option<KeyMetadata>,
    ) -> anyhow::Result<ManagedKey> {
        let key_type = secret.key_type();
        let public_key_hex = secret.public_key_hex()?;

        let jwk_opts = JwkOptions {
            no_kid: true,
            ..JwkOptions::default()
        };
        let jwk = key::to_jwk(&public_key_hex, key_type, &jwk_opts)?;
        let thumbprint = jwk.thumbprint(Digest::Sha256)?;

        let mut meta = meta.unwrap_or_default();
        meta.jwk_thumbprint = Some(thumbprint.clone());
        if meta.algorithms.is_none() {
            meta.algorithms = Algorithm::default_for(key_type).ok().map(|a| vec![a.to_string()]);
        }

        let key = ManagedKey {
            kid: kid.unwrap_or(thumbprint),
            kms: self.name.clone(),
            key_type,
            public_key_hex,
            meta: Some(meta),
        };
        tracing::debug!("storing {key_type} key '{}' in '{}'", key.kid, self.name);
        self.keys()?.insert(key.kid.clone(), Entry { key: key.clone(), secret });
        Ok(key)
    }
}

#[async_trait]
impl KeyManagementSystem for LocalKms {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports(&self, key_type: KeyType) -> bool {
        key_type != KeyType::Bls12381G2
    }

    async fn create_key(
        &self, key_type: KeyType, meta: Option<KeyMetadata>,
    ) -> anyhow::Result<ManagedKey> {
        let secret = Secret::generate(key_type)?;
        self.store(None, secret, meta)
    }

    async fn import_key(&self, import: ImportKey) -> anyhow::Result<ManagedKey> {
        let secret = Secret::import(import.key_type, &import.private_key_hex)?;
        self.store(import.kid, secret, import.meta)
    }

    async fn get_key(&self, kid: &str) -> anyhow::Result<Option<ManagedKey>> {
        Ok(self.keys()?.get(kid).map(|e| e.key.clone()))
    }

    async fn delete_key(&self, kid: &str) -> anyhow::Result<bool> {
        Ok(self.keys()?.remove(kid).is_some())
    }

    async fn list_keys(&self) -> anyhow::Result<Vec<ManagedKey>> {
        let mut keys: Vec<ManagedKey> = self.keys()?.values().map(|e| e.key.clone()).collect();
        keys.sort_by(|a, b| a.kid.cmp(&b.kid));
        Ok(keys)
    }

    async fn sign(&self, kid: &str, algorithm: Algorithm, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        let keys = self.keys()?;
        let entry = keys.get(kid).ok_or_else(|| anyhow!("key '{kid}' not found"))?;
        entry.secret.sign(algorithm, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::verify_signature;

    const P256_PRIVATE: &str = "8e9b109e719098bbc39ab9d5e7c5df4acc5d9e6e0dbd4d8ab1d15d8e6a7d74b2";

    #[tokio::test]
    async fn import_compresses_ec_keys() {
        let kms = LocalKms::new("local");
        let import = ImportKey {
            key_type: KeyType::Secp256r1,
            private_key_hex: P256_PRIVATE.to_string(),
            ..ImportKey::default()
        };
        let key = kms.import_key(import).await.expect("should import");
        assert_eq!(
            key.public_key_hex,
            "03620b69472dfbbe7244bfb4cc8caf77dae9eff252e74b357de540f6966b0f0415"
        );
        assert_eq!(key.kid, "IfIJ0nIon5W3o_bYEvoVVSsnrhei9XFCMVA2vgX1KrM");
        assert_eq!(
            key.meta.as_ref().and_then(|m| m.jwk_thumbprint.as_deref()),
            Some(key.kid.as_str())
        );
    }

    #[tokio::test]
    async fn sign_and_verify() {
        let kms = LocalKms::new("local");
        for key_type in [KeyType::Secp256k1, KeyType::Secp256r1, KeyType::Ed25519] {
            let key = kms.create_key(key_type, None).await.expect("should create");
            let alg = Algorithm::default_for(key_type).expect("should have default");
            let sig = kms.sign(&key.kid, alg, b"data").await.expect("should sign");

            let jwk = key::to_jwk(&key.public_key_hex, key_type, &JwkOptions::default())
                .expect("should convert");
            assert!(verify_signature(alg, &jwk, &sig, b"data").expect("should verify"));
        }
    }

    #[tokio::test]
    async fn wrong_algorithm() {
        let kms = LocalKms::new("local");
        let key = kms.create_key(KeyType::Ed25519, None).await.expect("should create");
        assert!(kms.sign(&key.kid, Algorithm::ES256, b"data").await.is_err());

        let x25519 = kms.create_key(KeyType::X25519, None).await.expect("should create");
        assert!(kms.sign(&x25519.kid, Algorithm::EdDSA, b"data").await.is_err());
    }
}
