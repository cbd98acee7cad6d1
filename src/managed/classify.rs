//! Classification of managed identifier references.

use std::fmt::{self, Display};

use serde_json::Value;

use super::IdentifierMethod;
use crate::did::DidIdentifier;
use crate::error::{Err, Error};
use crate::jose::jwk::PublicKeyJwk;
use crate::key::{CoseKey, ManagedKey};

/// A managed identifier reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ManagedIdentifier {
    /// Key store reference.
    Kid(String),

    /// A DID held by the DID manager.
    Did(DidReference),

    /// JWK of a held key.
    Jwk(PublicKeyJwk),

    /// Certificate chain whose leaf key is held.
    X5c(Vec<String>),

    /// A key record.
    Key(ManagedKey),

    /// COSE key of a held key.
    CoseKey(CoseKey),
}

/// A DID, by value or as a full record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DidReference {
    /// DID or DID URL.
    Url(String),

    /// A DID record.
    Record(Box<DidIdentifier>),
}

impl ManagedIdentifier {
    /// The identifier's method.
    #[must_use]
    pub const fn method(&self) -> IdentifierMethod {
        match self {
            Self::Kid(_) => IdentifierMethod::Kid,
            Self::Did(_) => IdentifierMethod::Did,
            Self::Jwk(_) => IdentifierMethod::Jwk,
            Self::X5c(_) => IdentifierMethod::X5c,
            Self::Key(_) => IdentifierMethod::Key,
            Self::CoseKey(_) => IdentifierMethod::CoseKey,
        }
    }
}

impl Display for ManagedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kid(kid) => write!(f, "kid {kid}"),
            Self::Did(DidReference::Url(did)) => write!(f, "DID {did}"),
            Self::Did(DidReference::Record(record)) => write!(f, "DID {}", record.did),
            Self::Jwk(jwk) => match &jwk.kid {
                Some(kid) => write!(f, "JWK {kid}"),
                None => write!(f, "{} JWK", jwk.kty),
            },
            Self::X5c(x5c) => write!(f, "x5c chain of {} certificates", x5c.len()),
            Self::Key(key) => write!(f, "key {}", key.kid),
            Self::CoseKey(cose) => {
                write!(f, "COSE key {}", cose.kid.as_deref().unwrap_or("without kid"))
            }
        }
    }
}

impl From<ManagedKey> for ManagedIdentifier {
    fn from(key: ManagedKey) -> Self {
        Self::Key(key)
    }
}

impl From<PublicKeyJwk> for ManagedIdentifier {
    fn from(jwk: PublicKeyJwk) -> Self {
        Self::Jwk(jwk)
    }
}

impl From<DidIdentifier> for ManagedIdentifier {
    fn from(identifier: DidIdentifier) -> Self {
        Self::Did(DidReference::Record(Box::new(identifier)))
    }
}

/// Classify a managed identifier reference.
///
/// Without an explicit method, a string is a DID when it starts with `did:`
/// and otherwise a `kid`; URLs and bare fragments are rejected. A non-empty
/// array of strings is an `x5c` chain. Objects are a JWK (string `kty`), a
/// COSE key (integer `kty`), a DID record (`did` and `keys`) or a key record
/// (`publicKeyHex` and `type`).
///
/// An explicit method always decides; a reference without the shape of that
/// method is rejected.
///
/// # Errors
///
/// Returns [`Err::InvalidArgument`] when the reference cannot be classified
/// or does not match `method`.
pub fn classify(
    value: &Value, method: Option<IdentifierMethod>,
) -> crate::Result<ManagedIdentifier> {
    let method = match method {
        Some(method) => method,
        None => sniff(value).ok_or_else(|| {
            Error::new(
                Err::InvalidArgument,
                format!("cannot determine the identifier method of {value}"),
            )
        })?,
    };
    let mismatch = || Error::new(
        Err::InvalidArgument,
        format!("{value} is not a {method} identifier"),
    );

    let identifier = match method {
        IdentifierMethod::Kid => {
            ManagedIdentifier::Kid(value.as_str().ok_or_else(mismatch)?.to_string())
        }
        IdentifierMethod::Did => match value {
            Value::String(did) if did.starts_with("did:") => {
                ManagedIdentifier::Did(DidReference::Url(did.clone()))
            }
            Value::Object(obj) if obj.contains_key("did") => {
                let record: DidIdentifier =
                    serde_json::from_value(value.clone()).map_err(|_| mismatch())?;
                ManagedIdentifier::from(record)
            }
            _ => return Err(mismatch()),
        },
        IdentifierMethod::Jwk => {
            if !value.get("kty").is_some_and(Value::is_string) {
                return Err(mismatch());
            }
            ManagedIdentifier::Jwk(serde_json::from_value(value.clone()).map_err(|_| mismatch())?)
        }
        IdentifierMethod::X5c => {
            let x5c = certificate_list(value).ok_or_else(mismatch)?;
            ManagedIdentifier::X5c(x5c)
        }
        IdentifierMethod::Key => {
            if !value.get("publicKeyHex").is_some_and(Value::is_string) {
                return Err(mismatch());
            }
            ManagedIdentifier::Key(serde_json::from_value(value.clone()).map_err(|_| mismatch())?)
        }
        IdentifierMethod::CoseKey => {
            if !value.get("kty").is_some_and(Value::is_i64) {
                return Err(mismatch());
            }
            ManagedIdentifier::CoseKey(
                serde_json::from_value(value.clone()).map_err(|_| mismatch())?,
            )
        }
        IdentifierMethod::EntityId => {
            return Err(Error::new(
                Err::InvalidArgument,
                "entity identifiers cannot be managed identifiers",
            ));
        }
    };
    Ok(identifier)
}

fn sniff(value: &Value) -> Option<IdentifierMethod> {
    match value {
        Value::String(s) if s.starts_with("did:") => Some(IdentifierMethod::Did),
        Value::String(s) if s.is_empty() || s.starts_with('#') || s.contains("://") => None,
        Value::String(_) => Some(IdentifierMethod::Kid),
        Value::Array(_) => certificate_list(value).map(|_| IdentifierMethod::X5c),
        Value::Object(obj) => match obj.get("kty") {
            Some(Value::String(_)) => Some(IdentifierMethod::Jwk),
            Some(Value::Number(_)) => Some(IdentifierMethod::CoseKey),
            Some(_) => None,
            None if obj.contains_key("did") && obj.contains_key("keys") => {
                Some(IdentifierMethod::Did)
            }
            None if obj.contains_key("publicKeyHex") && obj.contains_key("type") => {
                Some(IdentifierMethod::Key)
            }
            None => None,
        },
        _ => None,
    }
}

fn certificate_list(value: &Value) -> Option<Vec<String>> {
    let list = value.as_array()?;
    if list.is_empty() {
        return None;
    }
    list.iter().map(|v| v.as_str().map(ToString::to_string)).collect()
}
