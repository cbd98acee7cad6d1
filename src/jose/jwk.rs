//! # JSON Web Key (JWK)
//!
//! A JWK ([RFC7517]) is a JSON representation of a cryptographic key. Keys are
//! compared and indexed by their [RFC7638] thumbprint.
//!
//! [RFC7517]: https://www.rfc-editor.org/rfc/rfc7517
//! [RFC7638]: https://www.rfc-editor.org/rfc/rfc7638

use std::fmt::{self, Display};

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256, Sha512};

use crate::error::{Err, Error};

/// JSON Web Key. Only `kty` is required; the remaining members depend on the
/// key type.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PublicKeyJwk {
    /// Key type.
    pub kty: Kty,

    /// Cryptographic curve type (EC and OKP keys).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<Curve>,

    /// X coordinate or public key bytes (EC and OKP keys).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// Y coordinate (EC keys).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// Modulus (RSA keys).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// Exponent (RSA keys).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    /// Key value (symmetric keys).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub k: Option<String>,

    /// Private key component. Never included in headers or thumbprints.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub d: Option<String>,

    /// Algorithm intended for use with the key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,

    /// Use of the key.
    #[serde(rename = "use")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_: Option<KeyUse>,

    /// Permitted key operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_ops: Option<Vec<String>>,

    /// Key identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// X.509 certificate chain, standard base64 DER, leaf first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5c: Option<Vec<String>>,

    /// X.509 certificate URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5u: Option<String>,
}

/// Cryptographic key type.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum Kty {
    /// Elliptic curve key pair
    #[default]
    EC,

    /// Octet key pair (Edwards and Montgomery curves)
    OKP,

    /// RSA key pair
    RSA,

    /// Symmetric key
    #[serde(rename = "oct")]
    Oct,
}

impl Display for Kty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::EC => "EC",
            Self::OKP => "OKP",
            Self::RSA => "RSA",
            Self::Oct => "oct",
        };
        write!(f, "{s}")
    }
}

/// Cryptographic curve type.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub enum Curve {
    /// secp256k1 curve
    #[serde(rename = "secp256k1")]
    Secp256k1,

    /// NIST P-256 curve
    #[serde(rename = "P-256")]
    P256,

    /// NIST P-384 curve
    #[serde(rename = "P-384")]
    P384,

    /// NIST P-521 curve
    #[serde(rename = "P-521")]
    P521,

    /// Ed25519 curve
    Ed25519,

    /// X25519 curve
    X25519,
}

impl Display for Curve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Secp256k1 => "secp256k1",
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
            Self::Ed25519 => "Ed25519",
            Self::X25519 => "X25519",
        };
        write!(f, "{s}")
    }
}

/// The intended usage of the public key.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum KeyUse {
    /// Public key is to be used for signature verification
    #[default]
    #[serde(rename = "sig")]
    Signature,

    /// Public key is to be used for encryption
    #[serde(rename = "enc")]
    Encryption,
}

/// Digest used for JWK thumbprints.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum Digest {
    /// SHA-256
    #[default]
    #[serde(rename = "SHA-256")]
    Sha256,

    /// SHA-512
    #[serde(rename = "SHA-512")]
    Sha512,
}

impl PublicKeyJwk {
    /// The RFC 7638 thumbprint of the key.
    ///
    /// The hash input is the JSON object holding only the members required
    /// for the key type, in lexicographic order and without whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`Err::MissingRequiredClaim`] when a required member is absent.
    pub fn thumbprint(&self, digest: Digest) -> crate::Result<String> {
        let input = self.thumbprint_input()?;
        let hash = match digest {
            Digest::Sha256 => Sha256::digest(input.as_bytes()).to_vec(),
            Digest::Sha512 => Sha512::digest(input.as_bytes()).to_vec(),
        };
        Ok(Base64UrlUnpadded::encode_string(&hash))
    }

    fn thumbprint_input(&self) -> crate::Result<String> {
        let kty = self.kty;
        let required = |name: &str, value: &Option<String>| -> crate::Result<String> {
            let value = value.as_deref().ok_or_else(|| {
                Error::new(Err::MissingRequiredClaim, format!("{kty} JWK is missing '{name}'"))
            })?;
            Ok(serde_json::to_string(value)?)
        };
        let curve = |name: &str| -> crate::Result<String> {
            let crv = self.crv.ok_or_else(|| {
                Error::new(Err::MissingRequiredClaim, format!("{name} JWK is missing 'crv'"))
            })?;
            Ok(serde_json::to_string(&crv)?)
        };

        // members in lexicographic order, values as JSON strings
        let input = match self.kty {
            Kty::EC => {
                let crv = curve("EC")?;
                let x = required("x", &self.x)?;
                let y = required("y", &self.y)?;
                format!(r#"{{"crv":{crv},"kty":"EC","x":{x},"y":{y}}}"#)
            }
            Kty::OKP => {
                let crv = curve("OKP")?;
                let x = required("x", &self.x)?;
                format!(r#"{{"crv":{crv},"kty":"OKP","x":{x}}}"#)
            }
            Kty::RSA => {
                let e = required("e", &self.e)?;
                let n = required("n", &self.n)?;
                format!(r#"{{"e":{e},"kty":"RSA","n":{n}}}"#)
            }
            Kty::Oct => {
                let k = required("k", &self.k)?;
                format!(r#"{{"k":{k},"kty":"oct"}}"#)
            }
        };
        Ok(input)
    }

    /// Copy of the key holding only public members.
    #[must_use]
    pub fn to_public(&self) -> Self {
        Self {
            d: None,
            ..self.clone()
        }
    }

    /// Whether both keys hold the same public key material.
    #[must_use]
    pub fn equals_public(&self, other: &Self) -> bool {
        match (self.thumbprint_input(), other.thumbprint_input()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

/// Calculate the RFC 7638 thumbprint of `jwk`, defaulting to SHA-256.
///
/// # Errors
///
/// Returns [`Err::MissingRequiredClaim`] when a required member is absent.
pub fn calculate_jwk_thumbprint(
    jwk: &PublicKeyJwk, digest: Option<Digest>,
) -> crate::Result<String> {
    jwk.thumbprint(digest.unwrap_or_default())
}
