//! # Decentralized Identifiers
//!
//! DID documents, DID URLs, locally managed DID records, layered DID
//! resolution and the mapping between an identifier's managed keys and the
//! verification methods of its DID document.
//!
//! See [DID Core](https://www.w3.org/TR/did-core) for more.

mod document;
mod identifier;
mod mapper;
mod resolve;
mod url;
mod verification;

pub use self::document::{Document, Service, CONTEXT};
pub use self::identifier::{to_did_document, DidIdentifier};
pub use self::mapper::{map_identifier_keys_to_doc, MapperOptions};
pub use self::resolve::{resolve_document, LayeredResolution, Resolution};
pub use self::url::DidUrl;
pub use self::verification::{Relationship, VerificationMethod};
