//! # JSON Web Signature (JWS)
//!
//! JWS serializations ([RFC7515]): compact, flattened JSON and general JSON.
//! The flattened form is treated as a general JWS with a single signature.
//!
//! [RFC7515]: https://www.rfc-editor.org/rfc/rfc7515

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Err, Error};
use crate::jose::jwa::Algorithm;
use crate::jose::jwk::PublicKeyJwk;

/// JOSE header. Members other than the identifier members are carried
/// through untouched.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct JwsHeader {
    /// Signature algorithm.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alg: Option<Algorithm>,

    /// Key identifier, commonly a DID URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Embedded public key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<PublicKeyJwk>,

    /// Embedded certificate chain, standard base64 DER, leaf first.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x5c: Option<Vec<String>>,

    /// Additional header members.
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl JwsHeader {
    /// Names of the identifier members (`kid`, `jwk`, `x5c`) present.
    #[must_use]
    pub fn identifier_members(&self) -> Vec<&'static str> {
        let mut members = vec![];
        if self.kid.is_some() {
            members.push("kid");
        }
        if self.jwk.is_some() {
            members.push("jwk");
        }
        if self.x5c.is_some() {
            members.push("x5c");
        }
        members
    }

    /// Base64url encoded JSON of the header.
    ///
    /// # Errors
    ///
    /// Returns an error if the header cannot be serialized.
    pub fn encode(&self) -> crate::Result<String> {
        let json = serde_json::to_vec(self)?;
        Ok(Base64UrlUnpadded::encode_string(&json))
    }

    /// Decode a base64url encoded protected header.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidJws`] if the header is not base64url encoded JSON.
    pub fn decode(encoded: &str) -> crate::Result<Self> {
        let bytes = Base64UrlUnpadded::decode_vec(encoded)
            .map_err(|e| {
                Error::new(Err::InvalidJws, format!("protected header is not base64url: {e}"))
            })?;
        serde_json::from_slice(&bytes)
            .map_err(|e| {
                Error::new(Err::InvalidJws, format!("protected header is not valid JSON: {e}"))
            })
    }
}

/// A single signature of a general JWS.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct JwsSignature {
    /// Base64url encoded protected header.
    pub protected: String,

    /// Unprotected header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<JwsHeader>,

    /// Base64url encoded signature.
    pub signature: String,
}

/// General JWS JSON serialization.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct JwsJsonGeneral {
    /// Base64url encoded payload.
    pub payload: String,

    /// Signatures over the payload.
    pub signatures: Vec<JwsSignature>,
}

impl JwsJsonGeneral {
    /// Add a signature over the same payload.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidArgument`] if `other` signs a different payload.
    pub fn add_signature(&mut self, other: Self) -> crate::Result<()> {
        if other.payload != self.payload {
            return Err(Error::new(
                Err::InvalidArgument,
                "cannot merge JWS with different payloads",
            ));
        }
        self.signatures.extend(other.signatures);
        Ok(())
    }

    /// The signing input for the signature at `index`.
    #[must_use]
    pub fn signing_input(&self, index: usize) -> Option<String> {
        self.signatures.get(index).map(|s| format!("{}.{}", s.protected, self.payload))
    }

    /// Decoded payload bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidJws`] if the payload is not base64url encoded.
    pub fn payload_bytes(&self) -> crate::Result<Vec<u8>> {
        Base64UrlUnpadded::decode_vec(&self.payload)
            .map_err(|e| Error::new(Err::InvalidJws, format!("payload is not base64url: {e}")))
    }
}

/// Flattened JWS JSON serialization.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct JwsJsonFlattened {
    /// Base64url encoded payload.
    pub payload: String,

    /// Base64url encoded protected header.
    pub protected: String,

    /// Unprotected header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<JwsHeader>,

    /// Base64url encoded signature.
    pub signature: String,
}

impl From<JwsJsonFlattened> for JwsJsonGeneral {
    fn from(flat: JwsJsonFlattened) -> Self {
        Self {
            payload: flat.payload,
            signatures: vec![JwsSignature {
                protected: flat.protected,
                header: flat.header,
                signature: flat.signature,
            }],
        }
    }
}

impl TryFrom<JwsJsonGeneral> for JwsJsonFlattened {
    type Error = Error;

    fn try_from(general: JwsJsonGeneral) -> Result<Self, Self::Error> {
        let JwsJsonGeneral { payload, mut signatures } = general;
        if signatures.len() != 1 {
            return Err(Error::new(
                Err::InvalidJws,
                format!("flattened JWS needs one signature, found {}", signatures.len()),
            ));
        }
        let JwsSignature { protected, header, signature } = signatures.remove(0);
        Ok(Self { payload, protected, header, signature })
    }
}

/// A JWS in one of its serializations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Jws {
    /// `header.payload.signature`
    Compact(String),

    /// Flattened JSON.
    Flattened(JwsJsonFlattened),

    /// General JSON.
    General(JwsJsonGeneral),
}

impl Jws {
    /// Parse a JWS from its compact form or from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidJws`] if the input is neither.
    pub fn parse(input: &str) -> crate::Result<Self> {
        let trimmed = input.trim();
        if trimmed.starts_with('{') {
            let value: Value = serde_json::from_str(trimmed)
                .map_err(|e| Error::new(Err::InvalidJws, format!("JWS is not valid JSON: {e}")))?;
            return Self::from_json(value);
        }
        if trimmed.split('.').count() != 3 {
            return Err(Error::new(Err::InvalidJws, "compact JWS must have three parts"));
        }
        Ok(Self::Compact(trimmed.to_string()))
    }

    /// Parse a JWS from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidJws`] if the value is not a flattened or general
    /// JWS.
    pub fn from_json(value: Value) -> crate::Result<Self> {
        if value.get("signatures").is_some() {
            let general = serde_json::from_value(value)
                .map_err(|e| Error::new(Err::InvalidJws, format!("invalid general JWS: {e}")))?;
            return Ok(Self::General(general));
        }
        let flattened = serde_json::from_value(value)
            .map_err(|e| Error::new(Err::InvalidJws, format!("invalid flattened JWS: {e}")))?;
        Ok(Self::Flattened(flattened))
    }

    /// Normalize to the general JSON serialization.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidJws`] if a compact JWS is malformed.
    pub fn to_general(&self) -> crate::Result<JwsJsonGeneral> {
        match self {
            Self::Compact(compact) => {
                let mut parts = compact.split('.');
                let (Some(protected), Some(payload), Some(signature), None) =
                    (parts.next(), parts.next(), parts.next(), parts.next())
                else {
                    return Err(Error::new(Err::InvalidJws, "compact JWS must have three parts"));
                };
                Ok(JwsJsonGeneral {
                    payload: payload.to_string(),
                    signatures: vec![JwsSignature {
                        protected: protected.to_string(),
                        header: None,
                        signature: signature.to_string(),
                    }],
                })
            }
            Self::Flattened(flat) => Ok(flat.clone().into()),
            Self::General(general) => Ok(general.clone()),
        }
    }

    /// The compact serialization, if this is a compact JWS.
    #[must_use]
    pub fn as_compact(&self) -> Option<&str> {
        match self {
            Self::Compact(compact) => Some(compact),
            _ => None,
        }
    }
}
