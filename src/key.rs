//! # Managed Keys
//!
//! Key records as held by a key management system, and conversions between
//! their hex encoded public keys and JWKs.

mod convert;
mod cose;

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

pub use self::convert::{
    edwards_to_montgomery, jwk_key_type, jwk_to_public_key_hex, normalize_public_key_hex, to_jwk,
    HexEncoding, JwkOptions,
};
pub use self::cose::CoseKey;
use crate::jose::jwk::PublicKeyJwk;

/// Supported key types.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// Ed25519 signing key.
    #[default]
    Ed25519,

    /// X25519 key agreement key.
    X25519,

    /// secp256k1 ECDSA key.
    Secp256k1,

    /// NIST P-256 ECDSA key.
    Secp256r1,

    /// RSA key.
    #[serde(rename = "RSA")]
    Rsa,

    /// BLS12-381 G2 key. Recognized but not supported for conversion.
    Bls12381G2,
}

impl Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ed25519 => "Ed25519",
            Self::X25519 => "X25519",
            Self::Secp256k1 => "Secp256k1",
            Self::Secp256r1 => "Secp256r1",
            Self::Rsa => "RSA",
            Self::Bls12381G2 => "Bls12381G2",
        };
        write!(f, "{s}")
    }
}

/// A key held by a key management system.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManagedKey {
    /// Identifier of the key within its key management system.
    pub kid: String,

    /// Name of the key management system holding the private key.
    pub kms: String,

    /// Key type.
    #[serde(rename = "type")]
    pub key_type: KeyType,

    /// Hex encoded public key. EC keys are compressed SEC1 points, RSA keys
    /// are DER encoded `SubjectPublicKeyInfo`.
    pub public_key_hex: String,

    /// Additional key information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<KeyMetadata>,
}

impl ManagedKey {
    /// Metadata for the key, creating it if absent.
    pub fn meta_mut(&mut self) -> &mut KeyMetadata {
        self.meta.get_or_insert_with(KeyMetadata::default)
    }

    /// The DID verification method this key was matched to, if any.
    #[must_use]
    pub fn verification_method(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|m| m.verification_method.as_deref())
    }
}

/// Metadata attached to a [`ManagedKey`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct KeyMetadata {
    /// Algorithms the key may be used with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithms: Option<Vec<String>>,

    /// Precomputed public JWK. Used for key types whose hex form does not
    /// carry enough information to rebuild the JWK.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<PublicKeyJwk>,

    /// Precomputed SHA-256 JWK thumbprint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk_thumbprint: Option<String>,

    /// Id of the DID verification method the key was matched to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<String>,
}
