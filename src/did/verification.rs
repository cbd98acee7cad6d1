//! # Verification Methods
//!
//! A verification method is a public key (or other material) a DID subject
//! uses for a purpose expressed by a verification relationship.

use std::fmt::{self, Display};

use base64ct::{Base64, Encoding};
use serde::{Deserialize, Serialize};

use crate::error::{Err, Error};
use crate::jose::jwk::PublicKeyJwk;
use crate::key::{self, HexEncoding, JwkOptions, KeyType};

// multicodec prefixes (unsigned varint encoded)
const ED25519_CODEC: [u8; 2] = [0xed, 0x01];
const X25519_CODEC: [u8; 2] = [0xec, 0x01];
const SECP256K1_CODEC: [u8; 2] = [0xe7, 0x01];
const P256_CODEC: [u8; 2] = [0x80, 0x24];
const RSA_CODEC: [u8; 2] = [0x85, 0x24];

/// A verification method. Key material may be expressed in any of the
/// registered `publicKey*` forms.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMethod {
    /// A DID URL identifying the verification method.
    pub id: String,

    /// Verification method type, for example `JsonWebKey2020`.
    #[serde(rename = "type")]
    pub type_: String,

    /// The DID of the controller of the verification method.
    pub controller: String,

    /// Hex encoded public key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_hex: Option<String>,

    /// Base58 (bitcoin alphabet) encoded public key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_base58: Option<String>,

    /// Base64 encoded public key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_base64: Option<String>,

    /// Multibase encoded public key, optionally multicodec prefixed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_multibase: Option<String>,

    /// Public key as a JWK.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_jwk: Option<PublicKeyJwk>,
}

impl VerificationMethod {
    /// Infer the DID from the method ID.
    #[must_use]
    pub fn did(&self) -> String {
        self.id.split('#').next().unwrap_or_default().to_string()
    }

    /// Whether the method type denotes an Ed25519 key.
    #[must_use]
    pub fn is_ed25519(&self) -> bool {
        self.type_.starts_with("Ed25519")
            || self
                .public_key_jwk
                .as_ref()
                .is_some_and(|jwk| jwk.crv == Some(crate::jose::Curve::Ed25519))
    }

    /// Hex encoded public key, decoded from whichever form the method uses.
    /// Multicodec prefixes are stripped and EC keys compressed.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidArgument`] if the method holds no key material
    /// or the material cannot be decoded.
    pub fn public_key_hex(&self) -> crate::Result<String> {
        if let Some(jwk) = &self.public_key_jwk {
            return key::jwk_to_public_key_hex(jwk, HexEncoding::Compressed);
        }

        let bytes = if let Some(hex_key) = &self.public_key_hex {
            hex::decode(hex_key.trim_start_matches("0x"))?
        } else if let Some(b58) = &self.public_key_base58 {
            bs58::decode(b58)
                .into_vec()
                .map_err(|e| Error::new(Err::InvalidArgument, format!("invalid base58 key: {e}")))?
        } else if let Some(b64) = &self.public_key_base64 {
            Base64::decode_vec(b64)?
        } else if let Some(mb) = &self.public_key_multibase {
            let (_, decoded) = multibase::decode(mb)
                .map_err(|e| {
                    Error::new(Err::InvalidArgument, format!("invalid multibase key: {e}"))
                })?;
            strip_multicodec(decoded)
        } else {
            return Err(Error::new(
                Err::InvalidArgument,
                format!("verification method {} has no public key", self.id),
            ));
        };

        let key_type = if bytes.len() == 65 && bytes[0] == 0x04 {
            KeyType::Secp256r1
        } else {
            KeyType::Ed25519
        };
        Ok(key::normalize_public_key_hex(&hex::encode(bytes), key_type))
    }
}

impl VerificationMethod {
    /// Key type of the method, from its JWK, multicodec prefix or method
    /// type.
    ///
    /// # Errors
    ///
    /// Returns [`Err::UnsupportedKeyType`] if the key type cannot be
    /// determined.
    pub fn key_type(&self) -> crate::Result<KeyType> {
        if let Some(jwk) = &self.public_key_jwk {
            return key::jwk_key_type(jwk);
        }
        if let Some(mb) = &self.public_key_multibase {
            if let Ok((_, bytes)) = multibase::decode(mb) {
                let codecs = [
                    (ED25519_CODEC, KeyType::Ed25519),
                    (X25519_CODEC, KeyType::X25519),
                    (SECP256K1_CODEC, KeyType::Secp256k1),
                    (P256_CODEC, KeyType::Secp256r1),
                    (RSA_CODEC, KeyType::Rsa),
                ];
                if let Some((_, key_type)) =
                    codecs.iter().find(|(codec, _)| bytes.starts_with(codec))
                {
                    return Ok(*key_type);
                }
            }
        }

        let type_ = self.type_.to_ascii_lowercase();
        let key_type = if type_.starts_with("ed25519") {
            KeyType::Ed25519
        } else if type_.starts_with("x25519") {
            KeyType::X25519
        } else if type_.contains("secp256k1") {
            KeyType::Secp256k1
        } else if type_.contains("secp256r1") || type_.contains("p256") {
            KeyType::Secp256r1
        } else if type_.starts_with("rsa") {
            KeyType::Rsa
        } else {
            return Err(Error::new(
                Err::UnsupportedKeyType,
                format!("cannot determine the key type of verification method {}", self.id),
            ));
        };
        Ok(key_type)
    }

    /// The method's public key as a JWK whose `kid` is `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key material cannot be decoded or its type
    /// has no JWK representation.
    pub fn to_jwk(&self, id: &str) -> crate::Result<PublicKeyJwk> {
        let mut jwk = if let Some(jwk) = &self.public_key_jwk {
            jwk.to_public()
        } else {
            let opts = JwkOptions {
                no_kid: true,
                ..JwkOptions::default()
            };
            key::to_jwk(&self.public_key_hex()?, self.key_type()?, &opts)?
        };
        jwk.kid = Some(id.to_string());
        Ok(jwk)
    }
}

fn strip_multicodec(bytes: Vec<u8>) -> Vec<u8> {
    for codec in [ED25519_CODEC, X25519_CODEC, SECP256K1_CODEC, P256_CODEC, RSA_CODEC] {
        if bytes.len() > 2 && bytes[..2] == codec {
            return bytes[2..].to_vec();
        }
    }
    bytes
}

/// Verification relationships of a DID document.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Relationship {
    /// All verification methods of the document.
    #[default]
    VerificationMethod,

    /// `authentication`
    Authentication,

    /// `assertionMethod`
    AssertionMethod,

    /// `keyAgreement`
    KeyAgreement,

    /// `capabilityInvocation`
    CapabilityInvocation,

    /// `capabilityDelegation`
    CapabilityDelegation,
}

impl Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::VerificationMethod => "verificationMethod",
            Self::Authentication => "authentication",
            Self::AssertionMethod => "assertionMethod",
            Self::KeyAgreement => "keyAgreement",
            Self::CapabilityInvocation => "capabilityInvocation",
            Self::CapabilityDelegation => "capabilityDelegation",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ED25519_PUBLIC: &str = "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";
    const P256_UNCOMPRESSED: &str = "04620b69472dfbbe7244bfb4cc8caf77dae9eff252e74b357de540f6966b0f0415a250aa1b3172a49b6a4efd2c1c29ca834d3278781b34aed1aa0908f92f5caa45";

    fn method() -> VerificationMethod {
        VerificationMethod {
            id: "did:example:123#key-1".to_string(),
            type_: "Ed25519VerificationKey2018".to_string(),
            controller: "did:example:123".to_string(),
            ..VerificationMethod::default()
        }
    }

    #[test]
    fn multibase_with_codec() {
        let bytes = [ED25519_CODEC.as_slice(), &hex::decode(ED25519_PUBLIC).expect("should decode")]
            .concat();
        let vm = VerificationMethod {
            public_key_multibase: Some(multibase::encode(multibase::Base::Base58Btc, bytes)),
            ..method()
        };
        assert_eq!(vm.public_key_hex().expect("should decode"), ED25519_PUBLIC);
    }

    #[test]
    fn base58() {
        let b58 = bs58::encode(hex::decode(ED25519_PUBLIC).expect("should decode")).into_string();
        let vm = VerificationMethod {
            public_key_base58: Some(b58),
            ..method()
        };
        assert_eq!(vm.public_key_hex().expect("should decode"), ED25519_PUBLIC);
        assert!(vm.is_ed25519());
    }

    #[test]
    fn uncompressed_hex() {
        let vm = VerificationMethod {
            type_: "EcdsaSecp256r1VerificationKey2019".to_string(),
            public_key_hex: Some(P256_UNCOMPRESSED.to_string()),
            ..method()
        };
        assert_eq!(
            vm.public_key_hex().expect("should decode"),
            "03620b69472dfbbe7244bfb4cc8caf77dae9eff252e74b357de540f6966b0f0415"
        );
    }

    #[test]
    fn method_jwk() {
        let b58 = bs58::encode(hex::decode(ED25519_PUBLIC).expect("should decode")).into_string();
        let vm = VerificationMethod {
            public_key_base58: Some(b58),
            ..method()
        };
        assert_eq!(vm.key_type().expect("should infer"), KeyType::Ed25519);
        let jwk = vm.to_jwk(&vm.id).expect("should convert");
        assert_eq!(jwk.x.as_deref(), Some("11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo"));
        assert_eq!(jwk.kid.as_deref(), Some("did:example:123#key-1"));
    }

    #[test]
    fn no_material() {
        assert!(method().public_key_hex().expect_err("should fail").is(Err::InvalidArgument));
    }
}
