//! # Identifier Errors
//!
//! Errors raised while classifying, resolving or using identifiers. Every error
//! carries a stable [`Err`] code together with a human readable message.

use std::fmt::Display;

use thiserror::Error;

/// Log an error with `tracing` and return it from the current function.
///
/// # Example
/// ```
/// use vercre_identifier::error::Err;
/// use vercre_identifier::{tracerr, Result};
///
/// fn with_msg() -> Result<()> {
///     tracerr!(Err::InvalidArgument, "message: {}", "some message")
/// }
///
/// fn no_msg() -> Result<()> {
///     tracerr!(Err::InvalidArgument)
/// }
/// ```
#[macro_export]
macro_rules! tracerr {
    // with context
    ($code:expr, $($msg:tt)*) => {
        {
        tracing::error!($($msg)*);
        return Err($crate::error::Error::new($code, format!($($msg)*)));
        }
    };
    // no context
    ($code:expr) => {
        {
        tracing::error!("{}", $code);
        return Err($code.into());
        }
    }
}

/// Public error type for identifier resolution.
#[derive(Error, Debug)]
#[error(transparent)]
pub struct Error(anyhow::Error);

impl Error {
    /// Create a new error from a code and a message.
    pub fn new(code: Err, message: impl Display + Send + Sync + 'static) -> Self {
        Self(anyhow::Error::new(code).context(message))
    }

    /// The stable code for this error. Errors raised by collaborators that
    /// carry no code report [`Err::Unknown`].
    #[must_use]
    pub fn code(&self) -> Err {
        self.0.downcast_ref::<Err>().copied().unwrap_or(Err::Unknown)
    }

    /// The human readable message for this error.
    #[must_use]
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Transfer the error to `OAuth2` compatible format.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "error": self.code().to_string(),
            "error_description": self.to_string(),
        })
    }

    /// Returns true if `err` is the code held by this error.
    #[must_use]
    pub fn is(&self, err: Err) -> bool {
        self.code() == err
    }
}

/// Typed error codes.
#[derive(Clone, Copy, Error, Debug, PartialEq, Eq)]
pub enum Err {
    /// The caller supplied an argument that cannot be used, for example an
    /// identifier that does not match the requested method.
    #[error("invalid_argument")]
    InvalidArgument,

    /// The key store holds no key for the requested reference.
    #[error("key_not_found")]
    KeyNotFound,

    /// An identifier could not be resolved to key material.
    #[error("identifier_not_found")]
    IdentifierNotFound,

    /// None of the identifier's keys are present in the DID document.
    #[error("no_key_found")]
    NoKeyFound,

    /// The key type is not supported for the requested operation.
    #[error("unsupported_key_type")]
    UnsupportedKeyType,

    /// Key material has an unexpected length.
    #[error("invalid_key_length")]
    InvalidKeyLength,

    /// A JWK is missing a member required by its key type.
    #[error("missing_required_claim")]
    MissingRequiredClaim,

    /// A JWS header carries no identifier that can be used for verification.
    #[error("unsupported_verification_identifier")]
    UnsupportedVerificationIdentifier,

    /// A requested signing algorithm is not supported.
    #[error("unsupported_algorithm")]
    UnsupportedAlgorithm,

    /// The identifier embedded in a JWS header resolves to a different key
    /// than the signing identifier.
    #[error("header_identifier_mismatch")]
    HeaderIdentifierMismatch,

    /// A JWS header carries more than one of `kid`, `jwk` and `x5c`, or one
    /// that does not match the requested mode.
    #[error("conflicting_header_modes")]
    ConflictingHeaderModes,

    /// An X.509 certificate chain could not be validated.
    #[error("chain_validation_failed")]
    ChainValidationFailed,

    /// A required collaborator has not been configured.
    #[error("missing_plugin")]
    MissingPlugin,

    /// A certificate could not be decoded.
    #[error("invalid_certificate")]
    InvalidCertificate,

    /// A JWS could not be parsed.
    #[error("invalid_jws")]
    InvalidJws,

    /// A DID or DID URL is malformed.
    #[error("invalid_did")]
    InvalidDid,

    /// No DID resolution strategy produced a document.
    #[error("resolution_failed")]
    ResolutionFailed,

    /// An unspecified error occurred (see context for information)
    #[error("unknown")]
    Unknown,
}

/// Context is used to decorate errors with a code and message.
pub trait Context<T> {
    /// Replace the error with `code`, keeping the original as the source and
    /// `message` as the display text.
    ///
    /// # Errors
    ///
    /// Original error wrapped with the code and message.
    fn context<C>(self, code: Err, message: C) -> Result<T, Error>
    where
        C: Display + Send + Sync + 'static;
}

impl<T, E> Context<T> for core::result::Result<T, E>
where
    E: Display,
{
    fn context<C>(self, code: Err, message: C) -> Result<T, Error>
    where
        C: Display + Send + Sync + 'static,
    {
        self.map_err(|e| {
            tracing::debug!("{message}: {e}");
            Error::new(code, format!("{message}: {e}"))
        })
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        // collaborators may hand back an error raised by this crate
        match err.downcast::<Self>() {
            Ok(inner) => inner,
            Err(other) => Self(other),
        }
    }
}

impl From<Err> for Error {
    fn from(error: Err) -> Self {
        Self(error.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::new(Err::InvalidArgument, err.to_string())
    }
}

impl From<base64ct::Error> for Error {
    fn from(err: base64ct::Error) -> Self {
        Self::new(Err::InvalidArgument, format!("invalid base64: {err}"))
    }
}

impl From<hex::FromHexError> for Error {
    fn from(err: hex::FromHexError) -> Self {
        Self::new(Err::InvalidArgument, format!("invalid hex: {err}"))
    }
}

#[cfg(test)]
mod test {
    use tracing::Level;
    use tracing_subscriber::FmtSubscriber;

    use super::*;
    use crate::Result;

    #[test]
    fn code_only() {
        let err: Error = Err::NoKeyFound.into();
        assert!(err.is(Err::NoKeyFound));
        assert_eq!(
            err.to_json(),
            serde_json::json!({"error": "no_key_found", "error_description": "no_key_found"})
        );
    }

    #[test]
    fn code_and_message() {
        let err = Error::new(Err::IdentifierNotFound, "no key found for did:example:123");
        assert_eq!(err.code(), Err::IdentifierNotFound);
        assert_eq!(err.message(), "no key found for did:example:123");
    }

    #[test]
    fn foreign_error() {
        let err: Error = anyhow::anyhow!("backend unavailable").into();
        assert_eq!(err.code(), Err::Unknown);
        assert_eq!(err.message(), "backend unavailable");
    }

    #[test]
    fn traced() {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::ERROR).finish();
        tracing::subscriber::set_global_default(subscriber).expect("should set subscriber");

        fn fail() -> Result<()> {
            tracerr!(Err::ConflictingHeaderModes, "header contains {} and {}", "kid", "jwk")
        }
        let err = fail().expect_err("should fail");
        assert!(err.is(Err::ConflictingHeaderModes));
        assert_eq!(err.to_string(), "header contains kid and jwk");
    }
}
