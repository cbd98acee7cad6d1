//! Tests for X.509 certificate chain validation.

use base64ct::{Base64, Encoding};
use test_utils::{INTERMEDIATE_PEM, LEAF_PEM, ROOT_PEM};
use vercre_identifier::x509::{self, X509VerificationOptions};

fn to_base64(pem: &str) -> String {
    let cert = x509::pem_or_der_to_certificate(pem).expect("should parse");
    x509::certificate_to_base64(&cert).expect("should encode")
}

fn anchored() -> X509VerificationOptions {
    X509VerificationOptions {
        trust_anchors: vec![ROOT_PEM.to_string()],
        ..X509VerificationOptions::default()
    }
}

#[test]
fn base64_chain() {
    let chain = vec![to_base64(LEAF_PEM), to_base64(INTERMEDIATE_PEM), to_base64(ROOT_PEM)];
    let result = x509::validate_certificate_chain(&chain, &anchored()).expect("should validate");

    assert!(!result.error, "{}", result.message);
    let subjects: Vec<String> = result
        .certificate_chain
        .expect("should have chain")
        .into_iter()
        .map(|c| c.subject_dn)
        .collect();
    assert_eq!(subjects, vec![
        "C=NL,O=Sphinx Labs,CN=test.example.com",
        "C=NL,O=Sphinx Labs,CN=Test Intermediate CA",
        "C=NL,O=Sphinx Labs,CN=Test Root CA",
    ]);
}

#[test]
fn no_anchors() {
    let chain = vec![LEAF_PEM.to_string(), INTERMEDIATE_PEM.to_string(), ROOT_PEM.to_string()];
    let result =
        x509::validate_certificate_chain(&chain, &X509VerificationOptions::default())
            .expect("should validate");

    assert!(result.error);
    assert!(!result.critical);
    assert_eq!(result.message, "Certificate chain is not trusted: no trust anchors configured");

    let opts = X509VerificationOptions {
        trust_root_when_no_anchors: true,
        ..X509VerificationOptions::default()
    };
    let result = x509::validate_certificate_chain(&chain, &opts).expect("should validate");
    assert!(!result.error, "{}", result.message);
}

#[test]
fn wrong_anchor() {
    let opts = X509VerificationOptions {
        trust_anchors: vec![LEAF_PEM.to_string()],
        ..X509VerificationOptions::default()
    };
    let chain = vec![INTERMEDIATE_PEM.to_string(), ROOT_PEM.to_string()];
    let result = x509::validate_certificate_chain(&chain, &opts).expect("should validate");

    assert!(result.error);
    assert!(!result.critical);
    assert_eq!(result.message, "Certificate chain is not trusted: no trust anchor found");
}

// Flip the last byte of the intermediate's signature.
#[test]
fn corrupted_signature() {
    let mut der = Base64::decode_vec(&to_base64(INTERMEDIATE_PEM)).expect("should decode");
    let last = der.len() - 1;
    der[last] ^= 0x01;
    let corrupted = Base64::encode_string(&der);

    let chain = vec![to_base64(LEAF_PEM), corrupted, to_base64(ROOT_PEM)];
    let result = x509::validate_certificate_chain(&chain, &anchored()).expect("should validate");

    assert!(result.error);
    assert!(result.critical);
    assert!(
        result.message.contains("C=NL,O=Sphinx Labs,CN=Test Intermediate CA"),
        "{}",
        result.message
    );
}

#[test]
fn malformed_certificate() {
    let chain = vec!["not a certificate".to_string()];
    x509::validate_certificate_chain(&chain, &anchored()).expect_err("should fail");
}
