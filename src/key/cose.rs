//! COSE keys ([RFC 9052](https://www.rfc-editor.org/rfc/rfc9052)) in their
//! JSON form, with integer `kty`, `crv` and `alg` labels and base64url key
//! parameters.

use serde::{Deserialize, Serialize};

use crate::error::{Err, Error};
use crate::jose::jwk::{Curve, Kty, PublicKeyJwk};

const KTY_OKP: i64 = 1;
const KTY_EC2: i64 = 2;
const KTY_RSA: i64 = 3;

const CRV_P256: i64 = 1;
const CRV_P384: i64 = 2;
const CRV_P521: i64 = 3;
const CRV_X25519: i64 = 4;
const CRV_ED25519: i64 = 6;
const CRV_SECP256K1: i64 = 8;

// (COSE alg, JOSE alg)
const ALGORITHMS: [(i64, &str); 6] =
    [(-7, "ES256"), (-8, "EdDSA"), (-47, "ES256K"), (-257, "RS256"), (-258, "RS384"), (
        -259,
        "RS512",
    )];

/// A public COSE key.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CoseKey {
    /// Key type label: 1 (OKP), 2 (EC2) or 3 (RSA).
    pub kty: i64,

    /// Key identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Algorithm label, for example -7 (ES256).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<i64>,

    /// Curve label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<i64>,

    /// x coordinate (EC2) or public key (OKP).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// y coordinate (EC2).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,

    /// RSA modulus.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA public exponent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
}

impl CoseKey {
    /// The equivalent JWK.
    ///
    /// # Errors
    ///
    /// Returns [`Err::UnsupportedKeyType`] for key types or curves with no
    /// JWK equivalent here.
    pub fn to_jwk(&self) -> crate::Result<PublicKeyJwk> {
        let kty = match self.kty {
            KTY_OKP => Kty::OKP,
            KTY_EC2 => Kty::EC,
            KTY_RSA => Kty::RSA,
            other => return Err(Error::new(
                Err::UnsupportedKeyType,
                format!("unsupported COSE kty {other}"),
            )),
        };
        let crv = self
            .crv
            .map(|crv| match crv {
                CRV_P256 => Ok(Curve::P256),
                CRV_P384 => Ok(Curve::P384),
                CRV_P521 => Ok(Curve::P521),
                CRV_X25519 => Ok(Curve::X25519),
                CRV_ED25519 => Ok(Curve::Ed25519),
                CRV_SECP256K1 => Ok(Curve::Secp256k1),
                other => Err(Error::new(
                    Err::UnsupportedKeyType,
                    format!("unsupported COSE curve {other}"),
                )),
            })
            .transpose()?;
        let alg = self.alg.and_then(|alg| {
            ALGORITHMS.iter().find(|(cose, _)| *cose == alg).map(|(_, jose)| (*jose).to_string())
        });

        Ok(PublicKeyJwk {
            kty,
            crv,
            x: self.x.clone(),
            y: self.y.clone(),
            n: self.n.clone(),
            e: self.e.clone(),
            alg,
            kid: self.kid.clone(),
            ..PublicKeyJwk::default()
        })
    }

    /// The COSE form of a public JWK.
    ///
    /// # Errors
    ///
    /// Returns [`Err::UnsupportedKeyType`] for symmetric keys.
    pub fn from_jwk(jwk: &PublicKeyJwk) -> crate::Result<Self> {
        let kty = match jwk.kty {
            Kty::OKP => KTY_OKP,
            Kty::EC => KTY_EC2,
            Kty::RSA => KTY_RSA,
            Kty::Oct => return Err(Error::new(
                Err::UnsupportedKeyType,
                "symmetric keys have no COSE form here",
            )),
        };
        let crv = jwk.crv.map(|crv| match crv {
            Curve::P256 => CRV_P256,
            Curve::P384 => CRV_P384,
            Curve::P521 => CRV_P521,
            Curve::X25519 => CRV_X25519,
            Curve::Ed25519 => CRV_ED25519,
            Curve::Secp256k1 => CRV_SECP256K1,
        });
        let alg = jwk
            .alg
            .as_deref()
            .and_then(|alg| {
                ALGORITHMS.iter().find(|(_, jose)| *jose == alg).map(|(cose, _)| *cose)
            });

        Ok(Self {
            kty,
            kid: jwk.kid.clone(),
            alg,
            crv,
            x: jwk.x.clone(),
            y: jwk.y.clone(),
            n: jwk.n.clone(),
            e: jwk.e.clone(),
        })
    }
}
