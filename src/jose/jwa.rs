//! # JSON Web Algorithms (JWA)
//!
//! The subset of [RFC7518] signature algorithms supported for JWS signing and
//! verification.
//!
//! [RFC7518]: https://www.rfc-editor.org/rfc/rfc7518

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Err, Error};
use crate::key::KeyType;

/// Signature algorithm.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub enum Algorithm {
    /// ECDSA using P-256 and SHA-256.
    #[default]
    ES256,

    /// ECDSA using secp256k1 and SHA-256.
    ES256K,

    /// `EdDSA` using Ed25519.
    EdDSA,

    /// RSASSA-PKCS1-v1_5 using SHA-256.
    RS256,

    /// RSASSA-PKCS1-v1_5 using SHA-384.
    RS384,

    /// RSASSA-PKCS1-v1_5 using SHA-512.
    RS512,

    /// Unsecured JWS.
    #[serde(rename = "none")]
    None,
}

impl Algorithm {
    /// The algorithm used when a header does not name one.
    ///
    /// # Errors
    ///
    /// Returns [`Err::UnsupportedKeyType`] for key types that cannot sign.
    pub fn default_for(key_type: KeyType) -> crate::Result<Self> {
        match key_type {
            KeyType::Secp256r1 => Ok(Self::ES256),
            KeyType::Secp256k1 => Ok(Self::ES256K),
            KeyType::Ed25519 => Ok(Self::EdDSA),
            KeyType::Rsa => Ok(Self::RS256),
            KeyType::X25519 | KeyType::Bls12381G2 => Err(Error::new(
                Err::UnsupportedKeyType,
                format!("key type {key_type} cannot be used for signing"),
            )),
        }
    }

    /// Whether keys of `key_type` can produce signatures for this algorithm.
    #[must_use]
    pub const fn supports(self, key_type: KeyType) -> bool {
        matches!(
            (self, key_type),
            (Self::ES256, KeyType::Secp256r1)
                | (Self::ES256K, KeyType::Secp256k1)
                | (Self::EdDSA, KeyType::Ed25519)
                | (Self::RS256 | Self::RS384 | Self::RS512, KeyType::Rsa)
        )
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ES256 => "ES256",
            Self::ES256K => "ES256K",
            Self::EdDSA => "EdDSA",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::None => "none",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ES256" => Ok(Self::ES256),
            "ES256K" => Ok(Self::ES256K),
            "EdDSA" | "Ed25519" => Ok(Self::EdDSA),
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "RS512" => Ok(Self::RS512),
            "none" => Ok(Self::None),
            _ => Err(Error::new(Err::UnsupportedAlgorithm, format!("unsupported algorithm: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert_eq!(
            Algorithm::default_for(KeyType::Secp256r1).expect("should map"),
            Algorithm::ES256
        );
        assert_eq!(Algorithm::default_for(KeyType::Ed25519).expect("should map"), Algorithm::EdDSA);
        let err = Algorithm::default_for(KeyType::X25519).expect_err("should not sign");
        assert!(err.is(Err::UnsupportedKeyType));
    }

    #[test]
    fn wire_names() {
        assert_eq!(serde_json::to_string(&Algorithm::None).expect("should serialize"), r#""none""#);
        let alg: Algorithm = "ES256K".parse().expect("should parse");
        assert_eq!(alg, Algorithm::ES256K);
        assert!("HS256".parse::<Algorithm>().is_err());
    }
}
