//! # Crypto Engine
//!
//! Signature verification and public key export. Resolvers and the JWS
//! pipeline reach these through the [`CryptoEngine`] held by their
//! [`Context`](crate::Context), so tests can substitute their own.

use async_trait::async_trait;
use base64ct::{Base64UrlUnpadded, Encoding};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::{BigUint, RsaPublicKey};
use sha2::{Sha256, Sha384, Sha512};
use x509_cert::der::{Decode, Encode};
use x509_cert::spki::{ObjectIdentifier, SubjectPublicKeyInfoOwned};

use crate::error::{Err, Error};
use crate::jose::jwa::Algorithm;
use crate::jose::jwk::{Curve, Kty, PublicKeyJwk};
use crate::key::{self, HexEncoding, JwkOptions, KeyType};

/// id-ecPublicKey
pub const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
/// prime256v1
pub const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
/// secp256k1
pub const SECP256K1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.10");
/// rsaEncryption
pub const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
/// id-Ed25519
pub const ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");
/// id-X25519
pub const X25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.110");
/// ecdsa-with-SHA256
pub const ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
/// sha256WithRSAEncryption
pub const SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
/// sha384WithRSAEncryption
pub const SHA384_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
/// sha512WithRSAEncryption
pub const SHA512_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");

/// Cryptographic operations used during resolution and verification.
#[async_trait]
pub trait CryptoEngine: Send + Sync {
    /// Export the public key of a DER encoded `SubjectPublicKeyInfo` as a JWK.
    async fn export_jwk(&self, spki_der: &[u8]) -> anyhow::Result<PublicKeyJwk>;

    /// Verify `signature` over `data` with `jwk`. Returns `false` when the
    /// signature does not verify, and an error when the key cannot be used
    /// with the algorithm.
    async fn verify(
        &self, alg: Algorithm, jwk: &PublicKeyJwk, signature: &[u8], data: &[u8],
    ) -> anyhow::Result<bool>;
}

/// Software implementation of [`CryptoEngine`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultCrypto;

#[async_trait]
impl CryptoEngine for DefaultCrypto {
    async fn export_jwk(&self, spki_der: &[u8]) -> anyhow::Result<PublicKeyJwk> {
        let spki = SubjectPublicKeyInfoOwned::from_der(spki_der)
            .map_err(|e| {
                Error::new(Err::InvalidCertificate, format!("invalid SubjectPublicKeyInfo: {e}"))
            })?;
        Ok(spki_to_jwk(&spki)?)
    }

    async fn verify(
        &self, alg: Algorithm, jwk: &PublicKeyJwk, signature: &[u8], data: &[u8],
    ) -> anyhow::Result<bool> {
        Ok(verify_signature(alg, jwk, signature, data)?)
    }
}

/// Key type and hex encoded public key of a `SubjectPublicKeyInfo`. EC keys
/// are returned as SEC1 points as encoded, RSA keys as the DER encoded
/// `SubjectPublicKeyInfo`.
///
/// # Errors
///
/// Returns [`Err::UnsupportedKeyType`] for algorithms and curves that are not
/// supported.
pub fn spki_public_key(spki: &SubjectPublicKeyInfoOwned) -> crate::Result<(KeyType, String)> {
    let oid = spki.algorithm.oid;
    let raw = spki.subject_public_key.raw_bytes();

    if oid == EC_PUBLIC_KEY {
        let curve = spki
            .algorithm
            .parameters
            .as_ref()
            .and_then(|p| p.decode_as::<ObjectIdentifier>().ok())
            .ok_or_else(|| Error::new(Err::InvalidCertificate, "EC key is missing its curve"))?;
        let key_type = match curve {
            c if c == SECP256R1 => KeyType::Secp256r1,
            c if c == SECP256K1 => KeyType::Secp256k1,
            c => {
                return Err(Error::new(
                    Err::UnsupportedKeyType,
                    format!("unsupported EC curve {c}"),
                ));
            }
        };
        return Ok((key_type, hex::encode(raw)));
    }
    if oid == RSA_ENCRYPTION {
        let der = spki
            .to_der()
            .map_err(|e| {
                Error::new(Err::InvalidCertificate, format!("cannot encode RSA key: {e}"))
            })?;
        return Ok((KeyType::Rsa, hex::encode(der)));
    }
    if oid == ED25519 {
        return Ok((KeyType::Ed25519, hex::encode(raw)));
    }
    if oid == X25519 {
        return Ok((KeyType::X25519, hex::encode(raw)));
    }
    Err(Error::new(Err::UnsupportedKeyType, format!("unsupported public key algorithm {oid}")))
}

/// Public JWK for a `SubjectPublicKeyInfo`.
///
/// # Errors
///
/// Returns [`Err::UnsupportedKeyType`] for algorithms and curves that are not
/// supported.
pub fn spki_to_jwk(spki: &SubjectPublicKeyInfoOwned) -> crate::Result<PublicKeyJwk> {
    let (key_type, public_key_hex) = spki_public_key(spki)?;
    let opts = JwkOptions {
        no_kid: true,
        ..JwkOptions::default()
    };
    key::to_jwk(&public_key_hex, key_type, &opts)
}

/// Verify a JWS signature.
///
/// # Errors
///
/// Returns [`Err::UnsupportedAlgorithm`] when the key cannot be used with
/// `alg`.
pub fn verify_signature(
    alg: Algorithm, jwk: &PublicKeyJwk, signature: &[u8], data: &[u8],
) -> crate::Result<bool> {
    let mismatch = || {
        Error::new(Err::UnsupportedAlgorithm, format!("{alg} cannot be used with {} key", jwk.kty))
    };

    match alg {
        Algorithm::ES256 => {
            if jwk.crv != Some(Curve::P256) {
                return Err(mismatch());
            }
            let point = hex::decode(key::jwk_to_public_key_hex(jwk, HexEncoding::Uncompressed)?)?;
            let vk = p256::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                .map_err(|e| Error::new(Err::InvalidArgument, format!("invalid P-256 key: {e}")))?;
            let Ok(sig) = p256::ecdsa::Signature::from_slice(signature) else {
                return Ok(false);
            };
            Ok(vk.verify(data, &sig).is_ok())
        }
        Algorithm::ES256K => {
            if jwk.crv != Some(Curve::Secp256k1) {
                return Err(mismatch());
            }
            let point = hex::decode(key::jwk_to_public_key_hex(jwk, HexEncoding::Uncompressed)?)?;
            let vk = k256::ecdsa::VerifyingKey::from_sec1_bytes(&point)
                .map_err(|e| {
                    Error::new(Err::InvalidArgument, format!("invalid secp256k1 key: {e}"))
                })?;
            let Ok(sig) = k256::ecdsa::Signature::from_slice(signature) else {
                return Ok(false);
            };
            Ok(vk.verify(data, &sig).is_ok())
        }
        Algorithm::EdDSA => {
            if jwk.kty != Kty::OKP || jwk.crv != Some(Curve::Ed25519) {
                return Err(mismatch());
            }
            let public = hex::decode(key::jwk_to_public_key_hex(jwk, HexEncoding::default())?)?;
            let public: [u8; 32] = public
                .try_into()
                .map_err(|_| Error::new(Err::InvalidKeyLength, "Ed25519 key must be 32 bytes"))?;
            let vk = ed25519_dalek::VerifyingKey::from_bytes(&public)
                .map_err(|e| {
                    Error::new(Err::InvalidArgument, format!("invalid Ed25519 key: {e}"))
                })?;
            let Ok(sig) = ed25519_dalek::Signature::from_slice(signature) else {
                return Ok(false);
            };
            Ok(vk.verify(data, &sig).is_ok())
        }
        Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => {
            if jwk.kty != Kty::RSA {
                return Err(mismatch());
            }
            let (Some(n), Some(e)) = (&jwk.n, &jwk.e) else {
                return Err(Error::new(Err::MissingRequiredClaim, "RSA JWK is missing 'n' or 'e'"));
            };
            let key = RsaPublicKey::new(
                BigUint::from_bytes_be(&Base64UrlUnpadded::decode_vec(n)?),
                BigUint::from_bytes_be(&Base64UrlUnpadded::decode_vec(e)?),
            )
            .map_err(|e| Error::new(Err::InvalidArgument, format!("invalid RSA key: {e}")))?;
            Ok(verify_rsa(alg, key, signature, data))
        }
        Algorithm::None => {
            Err(Error::new(Err::UnsupportedAlgorithm, "unsecured signatures cannot be verified"))
        }
    }
}

fn verify_rsa(alg: Algorithm, key: RsaPublicKey, signature: &[u8], data: &[u8]) -> bool {
    let Ok(sig) = rsa::pkcs1v15::Signature::try_from(signature) else {
        return false;
    };
    match alg {
        Algorithm::RS384 => {
            rsa::pkcs1v15::VerifyingKey::<Sha384>::new(key).verify(data, &sig).is_ok()
        }
        Algorithm::RS512 => {
            rsa::pkcs1v15::VerifyingKey::<Sha512>::new(key).verify(data, &sig).is_ok()
        }
        _ => rsa::pkcs1v15::VerifyingKey::<Sha256>::new(key).verify(data, &sig).is_ok(),
    }
}

/// Verify the signature of a signed X.509 structure, such as a certificate's
/// `TBSCertificate`, with the issuer's public key.
///
/// # Errors
///
/// Returns [`Err::UnsupportedAlgorithm`] for signature algorithms that are
/// not supported and [`Err::InvalidCertificate`] when the issuer key cannot
/// be decoded.
pub fn verify_x509_signature(
    algorithm: ObjectIdentifier, issuer: &SubjectPublicKeyInfoOwned, tbs: &[u8], signature: &[u8],
) -> crate::Result<bool> {
    let (key_type, public_key_hex) = spki_public_key(issuer)?;
    let public_key = hex::decode(&public_key_hex)?;

    if algorithm == ECDSA_WITH_SHA256 {
        return match key_type {
            KeyType::Secp256r1 => {
                let vk = p256::ecdsa::VerifyingKey::from_sec1_bytes(&public_key)
                    .map_err(|e| {
                        Error::new(Err::InvalidCertificate, format!("invalid issuer key: {e}"))
                    })?;
                let Ok(sig) = p256::ecdsa::Signature::from_der(signature) else {
                    return Ok(false);
                };
                Ok(vk.verify(tbs, &sig).is_ok())
            }
            KeyType::Secp256k1 => {
                let vk = k256::ecdsa::VerifyingKey::from_sec1_bytes(&public_key)
                    .map_err(|e| {
                        Error::new(Err::InvalidCertificate, format!("invalid issuer key: {e}"))
                    })?;
                let Ok(sig) = k256::ecdsa::Signature::from_der(signature) else {
                    return Ok(false);
                };
                Ok(vk.verify(tbs, &sig).is_ok())
            }
            _ => Err(Error::new(
                Err::UnsupportedAlgorithm,
                format!("ECDSA with {key_type} issuer key"),
            )),
        };
    }

    let rsa_alg = match algorithm {
        a if a == SHA256_WITH_RSA => Some(Algorithm::RS256),
        a if a == SHA384_WITH_RSA => Some(Algorithm::RS384),
        a if a == SHA512_WITH_RSA => Some(Algorithm::RS512),
        _ => None,
    };
    if let Some(alg) = rsa_alg {
        let key = RsaPublicKey::from_public_key_der(&public_key)
            .map_err(|e| Error::new(Err::InvalidCertificate, format!("invalid issuer key: {e}")))?;
        return Ok(verify_rsa(alg, key, signature, tbs));
    }

    if algorithm == ED25519 {
        let public: [u8; 32] = public_key
            .try_into()
            .map_err(|_| {
                Error::new(Err::InvalidCertificate, "Ed25519 issuer key must be 32 bytes")
            })?;
        let vk = ed25519_dalek::VerifyingKey::from_bytes(&public)
            .map_err(|e| Error::new(Err::InvalidCertificate, format!("invalid issuer key: {e}")))?;
        let Ok(sig) = ed25519_dalek::Signature::from_slice(signature) else {
            return Ok(false);
        };
        return Ok(vk.verify(tbs, &sig).is_ok());
    }

    Err(Error::new(
        Err::UnsupportedAlgorithm,
        format!("unsupported signature algorithm {algorithm}"),
    ))
}

#[cfg(test)]
mod tests {
    use p256::ecdsa::signature::Signer;

    use super::*;

    const P256_PRIVATE: &str = "8e9b109e719098bbc39ab9d5e7c5df4acc5d9e6e0dbd4d8ab1d15d8e6a7d74b2";

    #[tokio::test]
    async fn verify_es256() {
        let bytes = hex::decode(P256_PRIVATE).expect("should decode");
        let signing_key = p256::ecdsa::SigningKey::from_slice(&bytes).expect("should load");
        let sig: p256::ecdsa::Signature = signing_key.sign(b"payload");

        let jwk = key::to_jwk(P256_PRIVATE, KeyType::Secp256r1, &JwkOptions {
            is_private_key: true,
            ..JwkOptions::default()
        })
        .expect("should convert")
        .to_public();

        let crypto = DefaultCrypto;
        let valid = crypto.verify(Algorithm::ES256, &jwk, &sig.to_bytes(), b"payload").await;
        assert!(valid.expect("should verify"));
        let tampered = crypto.verify(Algorithm::ES256, &jwk, &sig.to_bytes(), b"other").await;
        assert!(!tampered.expect("should verify"));
    }

    #[test]
    fn algorithm_key_mismatch() {
        let jwk = PublicKeyJwk {
            kty: Kty::OKP,
            crv: Some(Curve::Ed25519),
            x: Some("11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo".to_string()),
            ..PublicKeyJwk::default()
        };
        let err =
            verify_signature(Algorithm::ES256, &jwk, &[0; 64], b"data").expect_err("should fail");
        assert!(err.is(Err::UnsupportedAlgorithm));
    }

    #[tokio::test]
    async fn export_rsa_spki() {
        let spki = hex::decode(include_str!("../tests/fixtures/rsa_spki.hex").trim())
            .expect("should decode");
        let jwk = DefaultCrypto.export_jwk(&spki).await.expect("should export");
        assert_eq!(jwk.kty, Kty::RSA);
        assert_eq!(jwk.e.as_deref(), Some("AQAB"));
        assert!(jwk.kid.is_none());
    }
}
