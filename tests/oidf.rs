//! Tests for establishing trust in OpenID Federation entities.

use std::sync::Arc;

use serde_json::json;
use test_utils::{Entity, MockFederation};
use vercre_identifier::error::Err;
use vercre_identifier::external::{self, ExternalDetails};
use vercre_identifier::{Context, ExternalOptions, IdentifierMethod};

const LEAF: &str = "https://rp.example";
const ANCHOR_A: &str = "https://anchor-a.example";
const ANCHOR_B: &str = "https://anchor-b.example";

fn options() -> ExternalOptions {
    ExternalOptions {
        trust_anchors: vec![ANCHOR_A.to_string(), ANCHOR_B.to_string()],
        ..ExternalOptions::default()
    }
}

// Anchor A vouches for the leaf. Anchor B's chain carries a statement signed
// by a key B never published.
fn federation() -> MockFederation {
    let leaf = Entity::new(LEAF, 0x41);
    let anchor_a = Entity::new(ANCHOR_A, 0x42);
    let anchor_b = Entity::new(ANCHOR_B, 0x43);
    let impostor = Entity::new(ANCHOR_B, 0x44);

    let chain_a = vec![leaf.configuration(), anchor_a.subordinate(&leaf), anchor_a.configuration()];
    let chain_b = vec![leaf.configuration(), impostor.subordinate(&leaf), anchor_b.configuration()];

    MockFederation::new().with_chain(LEAF, ANCHOR_A, chain_a).with_chain(LEAF, ANCHOR_B, chain_b)
}

#[tokio::test]
async fn one_anchor_trusted() {
    let ctx = Context::builder().federation(Arc::new(federation())).build();
    let result = external::resolve_value(&ctx, &json!(LEAF), None, &options())
        .await
        .expect("should resolve");

    assert_eq!(result.method, IdentifierMethod::EntityId);
    assert!(result.is_trusted());
    assert_eq!(result.jwks.len(), 1);
    assert_eq!(result.jwks[0].jwk.kid.as_deref(), Some("https://rp.example#key-1"));

    let Some(ExternalDetails::EntityId { trusted_anchors, error_list, trust_established, .. }) =
        &result.details
    else {
        panic!("should have entity details");
    };
    assert!(trust_established);
    assert!(trusted_anchors.contains_key(ANCHOR_A));
    assert_eq!(trusted_anchors.len(), 1);
    assert_eq!(
        error_list.get(ANCHOR_B).map(String::as_str),
        Some("A Trust chain could not be established")
    );
}

#[tokio::test]
async fn no_chain() {
    let ctx = Context::builder().federation(Arc::new(MockFederation::new())).build();
    let result = external::resolve_value(&ctx, &json!(LEAF), None, &options())
        .await
        .expect("should resolve");

    assert!(!result.is_trusted());
    assert!(result.jwks.is_empty());
    let Some(ExternalDetails::EntityId { error_list, .. }) = &result.details else {
        panic!("should have entity details");
    };
    assert_eq!(error_list.len(), 2);
}

#[tokio::test]
async fn requires_anchors_and_client() {
    let ctx = Context::builder().federation(Arc::new(federation())).build();
    let err = external::resolve_value(&ctx, &json!(LEAF), None, &ExternalOptions::default())
        .await
        .expect_err("should fail");
    assert!(err.is(Err::InvalidArgument), "{err}");

    let err = external::resolve_value(&Context::default(), &json!(LEAF), None, &options())
        .await
        .expect_err("should fail");
    assert!(err.is(Err::MissingPlugin), "{err}");
}

// A chain that ends at a self-signed configuration of some other entity must
// not make the requested anchor trusted.
#[tokio::test]
async fn chain_ends_at_foreign_entity() {
    let leaf = Entity::new(LEAF, 0x41);
    let other = Entity::new("https://other.example", 0x45);
    let chain = vec![leaf.configuration(), other.subordinate(&leaf), other.configuration()];
    let federation = MockFederation::new().with_chain(LEAF, ANCHOR_B, chain);

    let ctx = Context::builder().federation(Arc::new(federation)).build();
    let opts = ExternalOptions {
        trust_anchors: vec![ANCHOR_B.to_string()],
        ..ExternalOptions::default()
    };
    let result =
        external::resolve_value(&ctx, &json!(LEAF), None, &opts).await.expect("should resolve");

    assert!(!result.is_trusted());
    assert!(result.jwks.is_empty());
    let Some(ExternalDetails::EntityId { trusted_anchors, error_list, trust_established, .. }) =
        &result.details
    else {
        panic!("should have entity details");
    };
    assert!(!trust_established);
    assert!(trusted_anchors.is_empty());
    assert_eq!(
        error_list.get(ANCHOR_B).map(String::as_str),
        Some("A Trust chain could not be established")
    );
}

// A valid chain for a different leaf does not vouch for the requested entity.
#[tokio::test]
async fn chain_for_another_entity() {
    let stranger = Entity::new("https://stranger.example", 0x46);
    let anchor_a = Entity::new(ANCHOR_A, 0x42);
    let chain =
        vec![stranger.configuration(), anchor_a.subordinate(&stranger), anchor_a.configuration()];
    let federation = MockFederation::new().with_chain(LEAF, ANCHOR_A, chain);

    let ctx = Context::builder().federation(Arc::new(federation)).build();
    let opts = ExternalOptions {
        trust_anchors: vec![ANCHOR_A.to_string()],
        ..ExternalOptions::default()
    };
    let result =
        external::resolve_value(&ctx, &json!(LEAF), None, &opts).await.expect("should resolve");

    assert!(!result.is_trusted());
    assert!(result.jwks.is_empty());
}

// Statements that do not link issuer to subject are rejected even when every
// signature verifies.
#[tokio::test]
async fn broken_issuer_link() {
    let leaf = Entity::new(LEAF, 0x41);
    let anchor_a = Entity::new(ANCHOR_A, 0x42);
    let intermediate = Entity::new("https://intermediate.example", 0x47);

    // the anchor publishes the intermediate's key under the leaf's name
    let statement = anchor_a.statement(LEAF, &[intermediate.jwk()]);
    let chain = vec![intermediate.subordinate(&leaf), statement, anchor_a.configuration()];
    let federation = MockFederation::new().with_chain(LEAF, ANCHOR_A, chain);

    let ctx = Context::builder().federation(Arc::new(federation)).build();
    let opts = ExternalOptions {
        trust_anchors: vec![ANCHOR_A.to_string()],
        ..ExternalOptions::default()
    };
    let result =
        external::resolve_value(&ctx, &json!(LEAF), None, &opts).await.expect("should resolve");

    assert!(!result.is_trusted());
}
