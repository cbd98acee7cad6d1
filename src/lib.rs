//! # Identifier Resolution
//!
//! Normalizes references to signers and verifiers into fully resolved
//! identities. A reference may be a key store `kid`, a DID or DID URL, a
//! JWK, an X.509 certificate chain, a key record or a COSE key.
//!
//! - [`managed`] resolves identifiers whose keys the agent holds, producing
//!   the key, its JWK and thumbprint, and the reference to sign with.
//! - [`external`] resolves identifiers of other parties: DIDs through layered
//!   resolution, X.509 chains against trust anchors, and OpenID Federation
//!   entities through their trust chains.
//! - [`jws`] signs with managed identifiers and verifies against the
//!   identifier recovered from each signature's header.
//!
//! Collaborators (key management systems, DID manager, DID resolvers,
//! federation client and crypto engine) are provided through a
//! [`provider::Context`].

pub mod config;
pub mod core;
pub mod crypto;
pub mod did;
pub mod error;
pub mod external;
pub mod jose;
pub mod jws;
pub mod key;
pub mod kms;
pub mod managed;
pub mod provider;
pub mod x509;

pub use self::config::Config;
pub use self::error::{Context as ErrorContext, Error};
pub use self::external::{ExternalIdentifier, ExternalIdentifierResult, ExternalOptions};
pub use self::jws::{
    create_jws, verify_jws, JwsCreateOptions, JwsMode, JwsPayload, JwsVerifyOptions,
};
pub use self::key::{KeyType, ManagedKey};
pub use self::managed::{
    IdentifierMethod, ManagedIdentifier, ManagedIdentifierResult, ManagedOptions,
};
pub use self::provider::{Context, ContextBuilder};

/// Result type for identifier operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
