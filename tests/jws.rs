//! Tests for signing with managed identifiers and verifying against the
//! identifiers carried in JWS headers.

use std::sync::Arc;

use serde_json::json;
use test_utils::{
    MemoryDidManager, ED25519_SEED_HEX, INTERMEDIATE_PEM, LEAF_PEM, LEAF_PRIVATE_HEX,
    P256_PRIVATE_HEX, P256_THUMBPRINT, ROOT_PEM,
};
use vercre_identifier::did::DidIdentifier;
use vercre_identifier::error::Err;
use vercre_identifier::jose::{Algorithm, Jws, JwsHeader};
use vercre_identifier::jws::Serialization;
use vercre_identifier::kms::{ImportKey, KeyManager, LocalKms};
use vercre_identifier::managed;
use vercre_identifier::x509::X509VerificationOptions;
use vercre_identifier::{
    create_jws, verify_jws, Context, ExternalOptions, IdentifierMethod, JwsCreateOptions, JwsMode,
    JwsPayload, JwsVerifyOptions, KeyType, ManagedKey, ManagedOptions,
};

const DID: &str = "did:example:123";

struct Agent {
    ctx: Context,
    p256: ManagedKey,
    ed25519: ManagedKey,
}

async fn agent() -> Agent {
    let key_manager = KeyManager::new().with(Arc::new(LocalKms::new("local")));
    let import = |key_type, private_key_hex: &str| ImportKey {
        key_type,
        private_key_hex: private_key_hex.to_string(),
        ..ImportKey::default()
    };
    let p256 = key_manager
        .import_key(None, import(KeyType::Secp256r1, P256_PRIVATE_HEX))
        .await
        .expect("should import key");
    let ed25519 = key_manager
        .import_key(None, import(KeyType::Ed25519, ED25519_SEED_HEX))
        .await
        .expect("should import key");
    key_manager
        .import_key(None, import(KeyType::Secp256r1, LEAF_PRIVATE_HEX))
        .await
        .expect("should import key");

    let did_manager = MemoryDidManager::new();
    did_manager.add(DidIdentifier {
        did: DID.to_string(),
        keys: vec![p256.clone()],
        ..DidIdentifier::default()
    });

    let ctx =
        Context::builder().key_manager(key_manager).did_manager(Arc::new(did_manager)).build();
    Agent { ctx, p256, ed25519 }
}

fn trusting_root() -> JwsVerifyOptions {
    JwsVerifyOptions {
        external: ExternalOptions {
            x509: X509VerificationOptions {
                trust_anchors: vec![ROOT_PEM.to_string()],
                ..X509VerificationOptions::default()
            },
            ..ExternalOptions::default()
        },
        ..JwsVerifyOptions::default()
    }
}

// Sign without an identifier in the header and verify with a supplied key.
#[tokio::test]
async fn compact_without_identifier() {
    let agent = agent().await;
    let identifier = managed::by_kid(&agent.ctx, P256_THUMBPRINT, &ManagedOptions::default())
        .await
        .expect("should resolve");

    let opts = JwsCreateOptions {
        mode: JwsMode::Kid,
        no_identifier_in_header: true,
        ..JwsCreateOptions::default()
    };
    let jws = create_jws(&agent.ctx, &identifier, &JwsPayload::from(b"test".as_slice()), &opts)
        .await
        .expect("should sign");

    let compact = jws.as_compact().expect("should be compact");
    assert!(compact.starts_with("eyJhbGciOiJFUzI1NiJ9.dGVzdA."), "{compact}");

    let parsed = Jws::parse(compact).expect("should parse");
    let opts = JwsVerifyOptions {
        jwk: Some(identifier.jwk.clone()),
        ..JwsVerifyOptions::default()
    };
    let result = verify_jws(&agent.ctx, &parsed, &opts).await.expect("should verify");
    assert!(!result.error, "{}", result.message);
    assert_eq!(result.message, "JWS signatures verified");

    // without a key there is nothing to verify with
    let err = verify_jws(&agent.ctx, &parsed, &JwsVerifyOptions::default())
        .await
        .expect_err("should fail");
    assert!(err.is(Err::UnsupportedVerificationIdentifier), "{err}");
}

#[tokio::test]
async fn kid_header() {
    let agent = agent().await;
    let identifier = managed::by_kid(&agent.ctx, P256_THUMBPRINT, &ManagedOptions::default())
        .await
        .expect("should resolve");

    let jws = create_jws(
        &agent.ctx,
        &identifier,
        &json!({"hello": "world"}).into(),
        &JwsCreateOptions::default(),
    )
        .await
        .expect("should sign");
    let general = jws.to_general().expect("should convert");
    let header = JwsHeader::decode(&general.signatures[0].protected).expect("should decode");
    assert_eq!(header.kid.as_deref(), Some(P256_THUMBPRINT));
    assert_eq!(header.alg, Some(Algorithm::ES256));
}

#[tokio::test]
async fn embedded_jwk() {
    let agent = agent().await;
    let identifier = managed::by_key(&agent.ctx, &agent.ed25519, &ManagedOptions::default())
        .await
        .expect("should resolve");

    let opts = JwsCreateOptions {
        mode: JwsMode::Jwk,
        serialization: Serialization::Flattened,
        ..JwsCreateOptions::default()
    };
    let jws = create_jws(&agent.ctx, &identifier, &JwsPayload::from(b"payload".to_vec()), &opts)
        .await
        .expect("should sign");

    let result =
        verify_jws(&agent.ctx, &jws, &JwsVerifyOptions::default()).await.expect("should verify");
    assert!(!result.error, "{}", result.message);
    assert_eq!(result.signatures[0].method, Some(IdentifierMethod::Jwk));
    assert_eq!(
        result.signatures[0].jwk.as_ref().map(|jwk| jwk.x.clone()),
        Some(identifier.jwk.x.clone())
    );
}

#[tokio::test]
async fn did_kid() {
    let agent = agent().await;
    let identifier =
        managed::by_did(&agent.ctx, DID, &ManagedOptions::default()).await.expect("should resolve");

    let jws = create_jws(
        &agent.ctx,
        &identifier,
        &JwsPayload::from(b"payload".to_vec()),
        &JwsCreateOptions::default(),
    )
        .await
        .expect("should sign");
    let general = jws.to_general().expect("should convert");
    let header = JwsHeader::decode(&general.signatures[0].protected).expect("should decode");
    assert_eq!(header.kid, Some(format!("{DID}#{P256_THUMBPRINT}")));

    let result =
        verify_jws(&agent.ctx, &jws, &JwsVerifyOptions::default()).await.expect("should verify");
    assert!(!result.error, "{}", result.message);
    assert_eq!(result.signatures[0].method, Some(IdentifierMethod::Did));
}

#[tokio::test]
async fn x5c_chain() {
    let agent = agent().await;
    let x5c = vec![LEAF_PEM.to_string(), INTERMEDIATE_PEM.to_string()];
    let identifier = managed::by_x5c(&agent.ctx, &x5c, &ManagedOptions::default())
        .await
        .expect("should resolve");

    let jws = create_jws(
        &agent.ctx,
        &identifier,
        &JwsPayload::from(b"payload".to_vec()),
        &JwsCreateOptions::default(),
    )
        .await
        .expect("should sign");
    let general = jws.to_general().expect("should convert");
    let header = JwsHeader::decode(&general.signatures[0].protected).expect("should decode");
    assert_eq!(header.x5c.as_ref().map(Vec::len), Some(2));

    let result = verify_jws(&agent.ctx, &jws, &trusting_root()).await.expect("should verify");
    assert!(!result.error, "{}", result.message);
    assert_eq!(result.signatures[0].method, Some(IdentifierMethod::X5c));

    // an untrusted chain fails verification
    let result =
        verify_jws(&agent.ctx, &jws, &JwsVerifyOptions::default()).await.expect("should verify");
    assert!(result.error);
    assert_eq!(result.message, "signature at index 0 could not be verified");
}

#[tokio::test]
async fn conflicting_headers() {
    let agent = agent().await;
    let identifier = managed::by_kid(&agent.ctx, P256_THUMBPRINT, &ManagedOptions::default())
        .await
        .expect("should resolve");

    let opts = JwsCreateOptions {
        serialization: Serialization::General,
        protected_header: JwsHeader {
            jwk: Some(identifier.jwk.clone()),
            ..JwsHeader::default()
        },
        unprotected_header: Some(JwsHeader {
            x5c: Some(vec![LEAF_PEM.to_string()]),
            ..JwsHeader::default()
        }),
        ..JwsCreateOptions::default()
    };
    let err = create_jws(&agent.ctx, &identifier, &JwsPayload::from(b"payload".to_vec()), &opts)
        .await
        .expect_err("should fail");
    assert!(err.is(Err::ConflictingHeaderModes), "{err}");

    // x5c mode needs a certificate chain
    let opts = JwsCreateOptions {
        mode: JwsMode::X5c,
        ..JwsCreateOptions::default()
    };
    let err = create_jws(&agent.ctx, &identifier, &JwsPayload::from(b"payload".to_vec()), &opts)
        .await
        .expect_err("should fail");
    assert!(err.is(Err::ConflictingHeaderModes), "{err}");
}

#[tokio::test]
async fn header_names_another_key() {
    let agent = agent().await;
    let identifier = managed::by_kid(&agent.ctx, P256_THUMBPRINT, &ManagedOptions::default())
        .await
        .expect("should resolve");

    let opts = JwsCreateOptions {
        protected_header: JwsHeader {
            kid: Some(agent.ed25519.kid.clone()),
            ..JwsHeader::default()
        },
        ..JwsCreateOptions::default()
    };
    let err = create_jws(&agent.ctx, &identifier, &JwsPayload::from(b"payload".to_vec()), &opts)
        .await
        .expect_err("should fail");
    assert!(err.is(Err::HeaderIdentifierMismatch), "{err}");

    let opts = JwsCreateOptions {
        protected_header: JwsHeader {
            alg: Some(Algorithm::EdDSA),
            ..JwsHeader::default()
        },
        ..JwsCreateOptions::default()
    };
    let err = create_jws(&agent.ctx, &identifier, &JwsPayload::from(b"payload".to_vec()), &opts)
        .await
        .expect_err("should fail");
    assert!(err.is(Err::UnsupportedAlgorithm), "{err}");
}

#[tokio::test]
async fn compact_rejects_unprotected_header() {
    let agent = agent().await;
    let identifier = managed::by_key(&agent.ctx, &agent.p256, &ManagedOptions::default())
        .await
        .expect("should resolve");

    let opts = JwsCreateOptions {
        unprotected_header: Some(JwsHeader::default()),
        ..JwsCreateOptions::default()
    };
    let err = create_jws(&agent.ctx, &identifier, &JwsPayload::from(b"payload".to_vec()), &opts)
        .await
        .expect_err("should fail");
    assert!(err.is(Err::InvalidArgument), "{err}");
}

// Three signatures over one payload, the second corrupted.
#[tokio::test]
async fn general_with_bad_signature() {
    let agent = agent().await;
    let payload = JwsPayload::from(json!({"iss": DID}));
    let opts = JwsCreateOptions {
        mode: JwsMode::Jwk,
        serialization: Serialization::General,
        ..JwsCreateOptions::default()
    };

    let mut signed = vec![];
    for key in [&agent.p256, &agent.ed25519, &agent.p256] {
        let identifier = managed::by_key(&agent.ctx, key, &ManagedOptions::default())
            .await
            .expect("should resolve");
        let jws = create_jws(&agent.ctx, &identifier, &payload, &opts).await.expect("should sign");
        signed.push(jws.to_general().expect("should convert"));
    }
    let mut general = signed.remove(0);
    for other in signed {
        general.add_signature(other).expect("should merge");
    }
    assert_eq!(general.signatures.len(), 3);
    general.signatures[1].signature = general.signatures[0].signature.clone();

    let result = verify_jws(&agent.ctx, &Jws::General(general), &JwsVerifyOptions::default())
        .await
        .expect("should verify");
    assert!(result.error);
    assert!(result.critical);
    assert_eq!(result.message, "signature at index 1 could not be verified");
    let verified: Vec<bool> = result.signatures.iter().map(|s| s.verified).collect();
    assert_eq!(verified, vec![true, false, true]);
}

#[tokio::test]
async fn unsecured() {
    let jws = Jws::parse("eyJhbGciOiJub25lIn0.dGVzdA.").expect("should parse");
    let result = verify_jws(&Context::default(), &jws, &JwsVerifyOptions::default())
        .await
        .expect("should verify");
    assert!(!result.error, "{}", result.message);
}

// An algorithm that cannot be verified fails its own signature only.
#[tokio::test]
async fn unknown_algorithm_fails_one_signature() {
    let agent = agent().await;
    let opts = JwsCreateOptions {
        mode: JwsMode::Jwk,
        serialization: Serialization::General,
        ..JwsCreateOptions::default()
    };
    let identifier =
        managed::by_key(&agent.ctx, &agent.p256, &ManagedOptions::default())
            .await
            .expect("should resolve");
    let jws = create_jws(&agent.ctx, &identifier, &JwsPayload::from(b"test".as_slice()), &opts)
        .await
        .expect("should sign");

    let mut general = jws.to_general().expect("should convert");
    let mut hs256 = general.signatures[0].clone();
    hs256.protected = "eyJhbGciOiJIUzI1NiJ9".to_string();
    general.signatures.push(hs256);

    let result = verify_jws(&agent.ctx, &Jws::General(general), &JwsVerifyOptions::default())
        .await
        .expect("should verify");
    assert!(result.error);
    assert_eq!(result.message, "signature at index 1 could not be verified");
    assert!(result.signatures[0].verified);
    assert!(!result.signatures[1].verified);
    assert!(
        result.signatures[1].message.as_deref().is_some_and(|m| m.contains("HS256")),
        "{:?}",
        result.signatures[1].message
    );
}
