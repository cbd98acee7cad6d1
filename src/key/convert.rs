//! Conversions between hex encoded key material and JWKs.

use base64ct::{Base64UrlUnpadded, Encoding};
use curve25519_dalek::edwards::CompressedEdwardsY;
use curve25519_dalek::montgomery::MontgomeryPoint;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{BigUint, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

use super::{KeyType, ManagedKey};
use crate::error::{Err, Error};
use crate::jose::jwk::{Curve, Digest, KeyUse, Kty, PublicKeyJwk};

/// Options for [`to_jwk`].
#[derive(Clone, Debug, Default)]
pub struct JwkOptions {
    /// The hex value is a private key; the JWK will include `d`.
    pub is_private_key: bool,

    /// Value for the JWK `use` member.
    pub use_: Option<KeyUse>,

    /// The managed key the hex value belongs to. Its `kid` becomes the JWK
    /// `kid` and, for RSA keys, its metadata JWK is used when the hex value
    /// cannot be decoded.
    pub key: Option<ManagedKey>,

    /// Do not set `kid`.
    pub no_kid: bool,
}

/// Encoding of EC points produced by [`jwk_to_public_key_hex`].
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HexEncoding {
    /// SEC1 compressed point (33 bytes).
    #[default]
    Compressed,

    /// SEC1 uncompressed point (65 bytes).
    Uncompressed,
}

/// Build a JWK from a hex encoded key.
///
/// EC keys accept 66 (compressed) or 130 (uncompressed) hex characters, or 64
/// for private keys. OKP keys accept 64 hex characters; Ed25519 private keys
/// may also be 128 characters (seed followed by public key). RSA keys are hex
/// encoded DER (`SubjectPublicKeyInfo` or PKCS#1).
///
/// Unless `no_kid` is set, the JWK's `kid` is the managed key's `kid` or,
/// without one, the JWK thumbprint.
///
/// # Errors
///
/// Returns [`Err::InvalidKeyLength`] when the hex value has the wrong length
/// for the key type and [`Err::UnsupportedKeyType`] for key types with no JWK
/// representation.
pub fn to_jwk(
    public_key_hex: &str, key_type: KeyType, opts: &JwkOptions,
) -> crate::Result<PublicKeyJwk> {
    let key_hex = public_key_hex.trim_start_matches("0x");

    let mut jwk = match key_type {
        KeyType::Secp256k1 | KeyType::Secp256r1 => ec_jwk(key_hex, key_type, opts.is_private_key)?,
        KeyType::Ed25519 | KeyType::X25519 => okp_jwk(key_hex, key_type, opts.is_private_key)?,
        KeyType::Rsa => rsa_jwk(key_hex, opts)?,
        KeyType::Bls12381G2 => {
            return Err(Error::new(
                Err::UnsupportedKeyType,
                format!("key type {key_type} has no JWK representation"),
            ));
        }
    };

    jwk.use_.clone_from(&opts.use_);
    if !opts.no_kid {
        jwk.kid = match &opts.key {
            Some(key) if !key.kid.is_empty() => Some(key.kid.clone()),
            _ => Some(jwk.thumbprint(Digest::Sha256)?),
        };
    }
    Ok(jwk)
}

macro_rules! ec_point {
    ($curve:ident, $bytes:expr, $is_private:expr) => {{
        let public_key = if $is_private {
            $curve::SecretKey::from_slice($bytes)
                .map_err(|e| Error::new(Err::InvalidArgument, format!("invalid private key: {e}")))?
                .public_key()
        } else {
            $curve::PublicKey::from_sec1_bytes($bytes)
                .map_err(|e| Error::new(Err::InvalidArgument, format!("invalid public key: {e}")))?
        };
        let point = public_key.to_encoded_point(false);
        match (point.x(), point.y()) {
            (Some(x), Some(y)) => (x.to_vec(), y.to_vec()),
            _ => return Err(Error::new(Err::InvalidArgument, "public key is the identity point")),
        }
    }};
}

fn ec_jwk(key_hex: &str, key_type: KeyType, is_private: bool) -> crate::Result<PublicKeyJwk> {
    let valid = if is_private { key_hex.len() == 64 } else { matches!(key_hex.len(), 66 | 130) };
    if !valid {
        return Err(Error::new(
            Err::InvalidKeyLength,
            format!("{key_type} key has invalid length of {} hex characters", key_hex.len()),
        ));
    }
    let bytes = hex::decode(key_hex)?;

    let (crv, (x, y)) = match key_type {
        KeyType::Secp256k1 => (Curve::Secp256k1, ec_point!(k256, &bytes, is_private)),
        _ => (Curve::P256, ec_point!(p256, &bytes, is_private)),
    };

    Ok(PublicKeyJwk {
        kty: Kty::EC,
        crv: Some(crv),
        x: Some(Base64UrlUnpadded::encode_string(&x)),
        y: Some(Base64UrlUnpadded::encode_string(&y)),
        d: is_private.then(|| Base64UrlUnpadded::encode_string(&bytes)),
        ..PublicKeyJwk::default()
    })
}

fn okp_jwk(key_hex: &str, key_type: KeyType, is_private: bool) -> crate::Result<PublicKeyJwk> {
    let valid =
        key_hex.len() == 64 || (is_private && key_type == KeyType::Ed25519 && key_hex.len() == 128);
    if !valid {
        return Err(Error::new(
            Err::InvalidKeyLength,
            format!("{key_type} key has invalid length of {} hex characters", key_hex.len()),
        ));
    }
    let bytes = hex::decode(key_hex)?;

    let (crv, x, d) = if is_private {
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes[..32]);
        let public = match key_type {
            KeyType::Ed25519 => {
                ed25519_dalek::SigningKey::from_bytes(&seed).verifying_key().to_bytes()
            }
            _ => MontgomeryPoint::mul_base_clamped(seed).to_bytes(),
        };
        (curve_for(key_type), public.to_vec(), Some(seed.to_vec()))
    } else {
        (curve_for(key_type), bytes, None)
    };

    Ok(PublicKeyJwk {
        kty: Kty::OKP,
        crv: Some(crv),
        x: Some(Base64UrlUnpadded::encode_string(&x)),
        d: d.map(|d| Base64UrlUnpadded::encode_string(&d)),
        ..PublicKeyJwk::default()
    })
}

const fn curve_for(key_type: KeyType) -> Curve {
    match key_type {
        KeyType::X25519 => Curve::X25519,
        _ => Curve::Ed25519,
    }
}

fn rsa_jwk(key_hex: &str, opts: &JwkOptions) -> crate::Result<PublicKeyJwk> {
    let decoded = hex::decode(key_hex).ok().and_then(|der| {
        if opts.is_private_key {
            RsaPrivateKey::from_pkcs8_der(&der)
                .or_else(|_| RsaPrivateKey::from_pkcs1_der(&der))
                .ok()
                .map(|key| key.to_public_key())
        } else {
            RsaPublicKey::from_public_key_der(&der)
                .or_else(|_| RsaPublicKey::from_pkcs1_der(&der))
                .ok()
        }
    });

    if let Some(public_key) = decoded {
        return Ok(PublicKeyJwk {
            kty: Kty::RSA,
            n: Some(Base64UrlUnpadded::encode_string(&public_key.n().to_bytes_be())),
            e: Some(Base64UrlUnpadded::encode_string(&public_key.e().to_bytes_be())),
            ..PublicKeyJwk::default()
        });
    }

    // keys imported from elsewhere may only carry their JWK
    opts.key
        .as_ref()
        .and_then(|key| key.meta.as_ref())
        .and_then(|meta| meta.jwk.clone())
        .map(|jwk| jwk.to_public())
        .ok_or_else(|| {
            Error::new(Err::InvalidArgument, "RSA key is neither DER encoded nor carries a JWK")
        })
}

/// Hex encoded public key for a JWK. EC points are encoded as requested, RSA
/// keys as DER `SubjectPublicKeyInfo`.
///
/// # Errors
///
/// Returns [`Err::MissingRequiredClaim`] when a required member is absent and
/// [`Err::UnsupportedKeyType`] for symmetric keys.
pub fn jwk_to_public_key_hex(jwk: &PublicKeyJwk, encoding: HexEncoding) -> crate::Result<String> {
    let member = |name: &str, value: &Option<String>| -> crate::Result<Vec<u8>> {
        let value = value.as_deref().ok_or_else(|| {
            Error::new(Err::MissingRequiredClaim, format!("{} JWK is missing '{name}'", jwk.kty))
        })?;
        Ok(Base64UrlUnpadded::decode_vec(value)?)
    };

    match jwk.kty {
        Kty::EC => {
            let x = member("x", &jwk.x)?;
            let y = member("y", &jwk.y)?;
            let point = match encoding {
                HexEncoding::Uncompressed => [&[0x04], x.as_slice(), y.as_slice()].concat(),
                HexEncoding::Compressed => {
                    let parity = y.last().map_or(0, |b| b & 1);
                    [&[0x02 + parity], x.as_slice()].concat()
                }
            };
            Ok(hex::encode(point))
        }
        Kty::OKP => Ok(hex::encode(member("x", &jwk.x)?)),
        Kty::RSA => {
            let n = BigUint::from_bytes_be(&member("n", &jwk.n)?);
            let e = BigUint::from_bytes_be(&member("e", &jwk.e)?);
            let key = RsaPublicKey::new(n, e)
                .map_err(|e| Error::new(Err::InvalidArgument, format!("invalid RSA key: {e}")))?;
            let der = key
                .to_public_key_der()
                .map_err(|e| {
                    Error::new(Err::InvalidArgument, format!("cannot encode RSA key: {e}"))
                })?;
            Ok(hex::encode(der.as_bytes()))
        }
        Kty::Oct => Err(Error::new(Err::UnsupportedKeyType, "symmetric keys have no public key")),
    }
}

/// The key type of a JWK.
///
/// # Errors
///
/// Returns [`Err::UnsupportedKeyType`] for curves and key types that are not
/// supported.
pub fn jwk_key_type(jwk: &PublicKeyJwk) -> crate::Result<KeyType> {
    match (jwk.kty, jwk.crv) {
        (Kty::EC, Some(Curve::P256)) => Ok(KeyType::Secp256r1),
        (Kty::EC, Some(Curve::Secp256k1)) => Ok(KeyType::Secp256k1),
        (Kty::OKP, Some(Curve::Ed25519)) => Ok(KeyType::Ed25519),
        (Kty::OKP, Some(Curve::X25519)) => Ok(KeyType::X25519),
        (Kty::RSA, _) => Ok(KeyType::Rsa),
        (kty, crv) => Err(Error::new(
            Err::UnsupportedKeyType,
            format!(
                "unsupported JWK: kty {kty}, crv {}",
                crv.map_or_else(String::new, |c| c.to_string())
            ),
        )),
    }
}

/// Normalize a hex encoded public key for comparison: lowercase, no `0x`
/// prefix, and EC points compressed.
#[must_use]
pub fn normalize_public_key_hex(public_key_hex: &str, key_type: KeyType) -> String {
    let key_hex = public_key_hex.trim_start_matches("0x").to_ascii_lowercase();
    if matches!(key_type, KeyType::Secp256k1 | KeyType::Secp256r1)
        && key_hex.len() == 130
        && key_hex.starts_with("04")
    {
        if let Ok(bytes) = hex::decode(&key_hex) {
            let parity = bytes[64] & 1;
            return hex::encode([&[0x02 + parity], &bytes[1..33]].concat());
        }
    }
    key_hex
}

/// Convert an Ed25519 public key to its X25519 equivalent.
///
/// # Errors
///
/// Returns [`Err::InvalidArgument`] if the bytes are not a valid Edwards
/// point.
pub fn edwards_to_montgomery(ed25519: &[u8]) -> crate::Result<[u8; 32]> {
    let compressed = CompressedEdwardsY::from_slice(ed25519)
        .map_err(|e| Error::new(Err::InvalidKeyLength, format!("invalid Ed25519 key: {e}")))?;
    let point = compressed
        .decompress()
        .ok_or_else(|| Error::new(Err::InvalidArgument, "Ed25519 key is not a valid point"))?;
    Ok(point.to_montgomery().to_bytes())
}
