//! # JWS Pipeline
//!
//! Signing with managed identifiers and verification against the identifier
//! recovered from each signature's header.
//!
//! When signing, the header carries at most one of `kid`, `jwk` and `x5c`,
//! chosen by [`JwsMode`]. A caller supplied identifier member must match the
//! mode and name the signing key.

mod create;
mod header;
mod verify;

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use self::create::create_jws;
pub use self::verify::verify_jws;
use crate::error::{Err, Error};
use crate::external::ExternalOptions;
use crate::jose::jwk::PublicKeyJwk;
use crate::jose::JwsHeader;
use crate::managed::IdentifierMethod;

/// Header identifier mode.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JwsMode {
    /// `kid` header.
    Kid,

    /// `jwk` header.
    Jwk,

    /// `x5c` header. The identifier must be an `x5c` identifier.
    X5c,

    /// `kid` header holding a DID URL. The identifier must be a DID.
    Did,

    /// Follow the identifier's method: `x5c` identifiers use `x5c`, `jwk`
    /// identifiers `jwk`, and all others `kid`.
    #[default]
    Auto,
}

impl JwsMode {
    /// The mode `Auto` stands for, given the signing identifier's method.
    #[must_use]
    pub const fn effective(self, method: IdentifierMethod) -> Self {
        match (self, method) {
            (Self::Auto, IdentifierMethod::Did) => Self::Did,
            (Self::Auto, IdentifierMethod::X5c) => Self::X5c,
            (Self::Auto, IdentifierMethod::Jwk) => Self::Jwk,
            (Self::Auto, _) => Self::Kid,
            (mode, _) => mode,
        }
    }

    /// Header member the mode places the identifier in.
    #[must_use]
    pub const fn member(self) -> &'static str {
        match self {
            Self::Jwk => "jwk",
            Self::X5c => "x5c",
            Self::Kid | Self::Did | Self::Auto => "kid",
        }
    }
}

/// JWS serializations.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Serialization {
    /// `header.payload.signature`
    #[default]
    Compact,

    /// Flattened JSON.
    Flattened,

    /// General JSON.
    General,
}

/// Payload to sign.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JwsPayload {
    /// Raw bytes.
    Bytes(Vec<u8>),

    /// Base64url encoded bytes.
    Base64Url(String),

    /// JSON, signed as its UTF-8 serialization.
    Json(Value),
}

impl JwsPayload {
    /// The base64url encoded payload.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidArgument`] if a [`JwsPayload::Base64Url`]
    /// payload is not base64url.
    pub fn encode(&self) -> crate::Result<String> {
        match self {
            Self::Bytes(bytes) => Ok(Base64UrlUnpadded::encode_string(bytes)),
            Self::Base64Url(encoded) => {
                let bytes = Base64UrlUnpadded::decode_vec(encoded)
                    .map_err(|e| {
                        Error::new(Err::InvalidArgument, format!("payload is not base64url: {e}"))
                    })?;
                Ok(Base64UrlUnpadded::encode_string(&bytes))
            }
            Self::Json(value) => Ok(Base64UrlUnpadded::encode_string(&serde_json::to_vec(value)?)),
        }
    }
}

impl From<Vec<u8>> for JwsPayload {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<&[u8]> for JwsPayload {
    fn from(bytes: &[u8]) -> Self {
        Self::Bytes(bytes.to_vec())
    }
}

impl From<Value> for JwsPayload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Options for [`create_jws`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct JwsCreateOptions {
    /// Header identifier mode.
    pub mode: JwsMode,

    /// Output serialization.
    pub serialization: Serialization,

    /// Protected header members.
    pub protected_header: JwsHeader,

    /// Unprotected header. Not available with the compact serialization.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unprotected_header: Option<JwsHeader>,

    /// Do not add an identifier member to the header.
    pub no_identifier_in_header: bool,
}

/// Options for [`verify_jws`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct JwsVerifyOptions {
    /// Key to verify with when a header carries no identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<PublicKeyJwk>,

    /// Options for resolving the identifier found in each header.
    pub external: ExternalOptions,
}

/// Outcome of verifying one signature.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignatureResult {
    /// Zero-based index of the signature.
    pub index: usize,

    /// The signature verified.
    pub verified: bool,

    /// Method the signer's identifier was resolved with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<IdentifierMethod>,

    /// Key the signature was checked with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwk: Option<PublicKeyJwk>,

    /// Why verification failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outcome of verifying a JWS. Failing signatures are reported here rather
/// than as errors.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JwsVerifyResult {
    /// At least one signature failed.
    pub error: bool,

    /// Verification failed, as opposed to an informational outcome.
    pub critical: bool,

    /// Summary naming each failing signature.
    pub message: String,

    /// Per signature outcomes, in signature order.
    pub signatures: Vec<SignatureResult>,
}
