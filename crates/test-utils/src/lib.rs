//! In-memory collaborators and fixtures for identifier resolution tests.

mod federation;
mod store;

pub use crate::federation::{Entity, MockFederation};
pub use crate::store::{MemoryDidManager, StaticResolver};

/// Test root CA certificate.
pub const ROOT_PEM: &str = include_str!("../../../tests/fixtures/root.pem");

/// Test intermediate CA certificate, issued by [`ROOT_PEM`].
pub const INTERMEDIATE_PEM: &str = include_str!("../../../tests/fixtures/intermediate.pem");

/// Test leaf certificate, issued by [`INTERMEDIATE_PEM`].
pub const LEAF_PEM: &str = include_str!("../../../tests/fixtures/leaf.pem");

/// P-256 private key of [`LEAF_PEM`].
pub const LEAF_PRIVATE_HEX: &str =
    "3333333333333333333333333333333333333333333333333333333333333333";

/// SHA-256 JWK thumbprint of the [`LEAF_PEM`] key.
pub const LEAF_THUMBPRINT: &str = "iAzi3C-OjPVWNyPopGebSBzQGxyqWSYHSp2clxH5mSI";

/// P-256 private key used for end-to-end signing.
pub const P256_PRIVATE_HEX: &str =
    "8e9b109e719098bbc39ab9d5e7c5df4acc5d9e6e0dbd4d8ab1d15d8e6a7d74b2";

/// Compressed public key of [`P256_PRIVATE_HEX`].
pub const P256_PUBLIC_HEX: &str =
    "03620b69472dfbbe7244bfb4cc8caf77dae9eff252e74b357de540f6966b0f0415";

/// SHA-256 JWK thumbprint of the [`P256_PRIVATE_HEX`] key.
pub const P256_THUMBPRINT: &str = "IfIJ0nIon5W3o_bYEvoVVSsnrhei9XFCMVA2vgX1KrM";

/// Ed25519 seed (RFC 8032, test 1).
pub const ED25519_SEED_HEX: &str =
    "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";

/// Public key of [`ED25519_SEED_HEX`].
pub const ED25519_PUBLIC_HEX: &str =
    "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a";
