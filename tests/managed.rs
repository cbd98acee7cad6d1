//! Tests for resolving managed identifiers against a local key store.

use std::sync::Arc;

use serde_json::json;
use test_utils::{
    MemoryDidManager, LEAF_PEM, LEAF_PRIVATE_HEX, LEAF_THUMBPRINT, P256_PRIVATE_HEX,
    P256_THUMBPRINT,
};
use vercre_identifier::did::DidIdentifier;
use vercre_identifier::error::Err;
use vercre_identifier::jose::Digest;
use vercre_identifier::key::CoseKey;
use vercre_identifier::kms::{ImportKey, KeyManager, LocalKms};
use vercre_identifier::managed::{self, ManagedDetails};
use vercre_identifier::{Context, IdentifierMethod, KeyType, ManagedKey, ManagedOptions};

const DID: &str = "did:example:123";

async fn setup() -> (Context, ManagedKey) {
    let kms = LocalKms::new("local");
    let key_manager = KeyManager::new().with(Arc::new(kms));
    let key = key_manager
        .import_key(None, ImportKey {
            key_type: KeyType::Secp256r1,
            private_key_hex: P256_PRIVATE_HEX.to_string(),
            ..ImportKey::default()
        })
        .await
        .expect("should import key");
    key_manager
        .import_key(None, ImportKey {
            key_type: KeyType::Secp256r1,
            private_key_hex: LEAF_PRIVATE_HEX.to_string(),
            ..ImportKey::default()
        })
        .await
        .expect("should import leaf key");

    let did_manager = MemoryDidManager::new();
    did_manager.add(DidIdentifier {
        did: DID.to_string(),
        controller_key_id: Some(key.kid.clone()),
        keys: vec![key.clone()],
        ..DidIdentifier::default()
    });

    let ctx =
        Context::builder().key_manager(key_manager).did_manager(Arc::new(did_manager)).build();
    (ctx, key)
}

#[tokio::test]
async fn by_kid() {
    let (ctx, _) = setup().await;
    let result = managed::by_kid(&ctx, P256_THUMBPRINT, &ManagedOptions::default())
        .await
        .expect("should resolve");

    assert_eq!(result.method, IdentifierMethod::Kid);
    assert_eq!(result.kms_key_ref, P256_THUMBPRINT);
    assert_eq!(result.jwk_thumbprint, P256_THUMBPRINT);
    assert_eq!(result.kid.as_deref(), Some(P256_THUMBPRINT));
}

#[tokio::test]
async fn unknown_kid() {
    let (ctx, _) = setup().await;
    let err = managed::by_kid(&ctx, "missing", &ManagedOptions::default())
        .await
        .expect_err("should fail");
    assert!(err.is(Err::KeyNotFound), "{err}");
}

#[tokio::test]
async fn by_did() {
    let (ctx, _) = setup().await;
    let result =
        managed::by_did(&ctx, DID, &ManagedOptions::default()).await.expect("should resolve");

    assert_eq!(result.method, IdentifierMethod::Did);
    assert_eq!(result.kms_key_ref, P256_THUMBPRINT);
    assert_eq!(result.issuer.as_deref(), Some(DID));
    assert_eq!(result.kid, Some(format!("{DID}#{P256_THUMBPRINT}")));

    let Some(ManagedDetails::Did { did, keys, controller_key_id, .. }) = &result.details else {
        panic!("should have DID details");
    };
    assert_eq!(did, DID);
    assert_eq!(keys.len(), 1);
    assert_eq!(controller_key_id.as_deref(), Some(P256_THUMBPRINT));
}

#[tokio::test]
async fn did_url_fragment() {
    let (ctx, _) = setup().await;

    let url = format!("{DID}#{P256_THUMBPRINT}");
    let result =
        managed::by_did(&ctx, &url, &ManagedOptions::default()).await.expect("should resolve");
    assert_eq!(result.kid, Some(url));

    let err = managed::by_did(&ctx, &format!("{DID}#other"), &ManagedOptions::default())
        .await
        .expect_err("should fail");
    assert!(err.is(Err::IdentifierNotFound), "{err}");
}

#[tokio::test]
async fn unmanaged_did() {
    let (ctx, _) = setup().await;
    let err = managed::by_did(&ctx, "did:example:456", &ManagedOptions::default())
        .await
        .expect_err("should fail");
    assert!(err.is(Err::IdentifierNotFound), "{err}");
}

#[tokio::test]
async fn by_jwk() {
    let (ctx, key) = setup().await;
    let jwk =
        managed::by_key(&ctx, &key, &ManagedOptions::default()).await.expect("should resolve").jwk;

    let result =
        managed::by_jwk(&ctx, &jwk, &ManagedOptions::default()).await.expect("should resolve");
    assert_eq!(result.method, IdentifierMethod::Jwk);
    assert_eq!(result.kms_key_ref, P256_THUMBPRINT);
    assert_eq!(result.jwk.thumbprint(Digest::Sha256).expect("should hash"), P256_THUMBPRINT);

    // classified structurally from JSON
    let value = serde_json::to_value(&jwk).expect("should serialize");
    let result = managed::resolve_value(&ctx, &value, None, &ManagedOptions::default())
        .await
        .expect("should resolve");
    assert_eq!(result.method, IdentifierMethod::Jwk);
}

#[tokio::test]
async fn jwk_conflicts_with_key_ref() {
    let (ctx, key) = setup().await;
    let jwk =
        managed::by_key(&ctx, &key, &ManagedOptions::default()).await.expect("should resolve").jwk;

    let opts = ManagedOptions {
        kms_key_ref: Some(LEAF_THUMBPRINT.to_string()),
        ..ManagedOptions::default()
    };
    let err = managed::by_jwk(&ctx, &jwk, &opts).await.expect_err("should fail");
    assert!(err.is(Err::InvalidArgument), "{err}");
}

#[tokio::test]
async fn by_x5c() {
    let (ctx, _) = setup().await;
    let x5c = vec![LEAF_PEM.to_string()];
    let result =
        managed::by_x5c(&ctx, &x5c, &ManagedOptions::default()).await.expect("should resolve");

    assert_eq!(result.method, IdentifierMethod::X5c);
    assert_eq!(result.kms_key_ref, LEAF_THUMBPRINT);
    let Some(ManagedDetails::X5c { certificate, .. }) = &result.details else {
        panic!("should have x5c details");
    };
    assert_eq!(certificate.subject_dn, "C=NL,O=Sphinx Labs,CN=test.example.com");
    assert_eq!(certificate.subject.get("CN").map(String::as_str), Some("test.example.com"));
}

#[tokio::test]
async fn by_key() {
    let (ctx, key) = setup().await;
    let result =
        managed::by_key(&ctx, &key, &ManagedOptions::default()).await.expect("should resolve");
    assert_eq!(result.method, IdentifierMethod::Key);
    assert_eq!(result.kms_key_ref, key.kid);

    let opts = ManagedOptions {
        kms_key_ref: Some("other".to_string()),
        ..ManagedOptions::default()
    };
    let err = managed::by_key(&ctx, &key, &opts).await.expect_err("should fail");
    assert!(err.is(Err::InvalidArgument), "{err}");
}

#[tokio::test]
async fn by_cose_key() {
    let (ctx, key) = setup().await;
    let jwk =
        managed::by_key(&ctx, &key, &ManagedOptions::default()).await.expect("should resolve").jwk;
    let cose = CoseKey::from_jwk(&jwk).expect("should convert");

    let result = managed::by_cose_key(&ctx, &cose, &ManagedOptions::default())
        .await
        .expect("should resolve");
    assert_eq!(result.method, IdentifierMethod::CoseKey);
    assert_eq!(result.jwk_thumbprint, P256_THUMBPRINT);
}

#[tokio::test]
async fn explicit_method() {
    let (ctx, _) = setup().await;

    let opts = ManagedOptions::default();

    let value = json!(P256_THUMBPRINT);
    let result = managed::resolve_value(&ctx, &value, Some(IdentifierMethod::Kid), &opts)
        .await
        .expect("should resolve");
    assert_eq!(result.method, IdentifierMethod::Kid);

    let err = managed::resolve_value(&ctx, &value, Some(IdentifierMethod::Jwk), &opts)
        .await
        .expect_err("should fail");
    assert!(err.is(Err::InvalidArgument), "{err}");
}

#[tokio::test]
async fn no_key_manager() {
    let ctx = Context::default();
    let err = managed::by_kid(&ctx, P256_THUMBPRINT, &ManagedOptions::default())
        .await
        .expect_err("should fail");
    assert!(err.is(Err::MissingPlugin), "{err}");
}
