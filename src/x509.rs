//! # X.509 Certificates
//!
//! Decoding of certificates supplied as PEM or base64 DER (`x5c` entries),
//! distinguished name rendering, and certificate chain validation.

mod chain;
mod name;

use std::collections::BTreeMap;

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use x509_cert::der::{Decode, DecodePem, Encode};
use x509_cert::time::Time;
pub use x509_cert::Certificate;

pub use self::chain::{validate_certificate_chain, ValidationResult, X509VerificationOptions};
pub use self::name::{dn_to_map, dn_to_string};
use crate::crypto;
use crate::error::{Err, Error};
use crate::jose::jwk::PublicKeyJwk;

/// Decode a certificate from PEM, or from standard (or url-safe) base64 DER.
///
/// # Errors
///
/// Returns [`Err::InvalidCertificate`] if the input cannot be decoded.
pub fn pem_or_der_to_certificate(input: &str) -> crate::Result<Certificate> {
    let input = input.trim();
    if input.starts_with("-----BEGIN") {
        return Certificate::from_pem(input)
            .map_err(|e| {
                Error::new(Err::InvalidCertificate, format!("invalid PEM certificate: {e}"))
            });
    }

    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    let der = Base64::decode_vec(&compact)
        .or_else(|_| base64ct::Base64UrlUnpadded::decode_vec(compact.trim_end_matches('=')))
        .map_err(|e| {
            Error::new(Err::InvalidCertificate, format!("certificate is not base64 DER: {e}"))
        })?;
    Certificate::from_der(&der)
        .map_err(|e| Error::new(Err::InvalidCertificate, format!("invalid DER certificate: {e}")))
}

/// Standard base64 DER encoding of a certificate, as used in `x5c`.
///
/// # Errors
///
/// Returns [`Err::InvalidCertificate`] if the certificate cannot be encoded.
pub fn certificate_to_base64(cert: &Certificate) -> crate::Result<String> {
    let der = cert
        .to_der()
        .map_err(|e| {
            Error::new(Err::InvalidCertificate, format!("cannot encode certificate: {e}"))
        })?;
    Ok(Base64::encode_string(&der))
}

/// Summary of a certificate, as reported in chain validation results.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInfo {
    /// Subject DN as `key=value,key=value`.
    pub subject_dn: String,

    /// Issuer DN as `key=value,key=value`.
    pub issuer_dn: String,

    /// Subject DN attributes.
    pub subject: BTreeMap<String, String>,

    /// Issuer DN attributes.
    pub issuer: BTreeMap<String, String>,

    /// Hex encoded serial number.
    pub serial_number: String,

    /// Start of the validity window.
    pub not_before: DateTime<Utc>,

    /// End of the validity window.
    pub not_after: DateTime<Utc>,

    /// The certificate's public key.
    pub public_key_jwk: PublicKeyJwk,

    /// Standard base64 DER encoding of the certificate.
    pub certificate: String,
}

impl CertificateInfo {
    /// Summarize a certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate's public key is not supported.
    pub fn from_certificate(cert: &Certificate) -> crate::Result<Self> {
        let tbs = &cert.tbs_certificate;
        Ok(Self {
            subject_dn: dn_to_string(&tbs.subject),
            issuer_dn: dn_to_string(&tbs.issuer),
            subject: dn_to_map(&tbs.subject),
            issuer: dn_to_map(&tbs.issuer),
            serial_number: hex::encode(tbs.serial_number.as_bytes()),
            not_before: to_datetime(tbs.validity.not_before),
            not_after: to_datetime(tbs.validity.not_after),
            public_key_jwk: crypto::spki_to_jwk(&tbs.subject_public_key_info)?,
            certificate: certificate_to_base64(cert)?,
        })
    }
}

pub(crate) fn to_datetime(time: Time) -> DateTime<Utc> {
    let secs = i64::try_from(time.to_unix_duration().as_secs()).unwrap_or(i64::MAX);
    DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEAF: &str = include_str!("../tests/fixtures/leaf.pem");

    #[test]
    fn pem_and_der_agree() {
        let from_pem = pem_or_der_to_certificate(LEAF).expect("should decode PEM");
        let b64 = certificate_to_base64(&from_pem).expect("should encode");
        let from_der = pem_or_der_to_certificate(&b64).expect("should decode DER");
        assert_eq!(from_pem, from_der);
    }

    #[test]
    fn leaf_info() {
        let cert = pem_or_der_to_certificate(LEAF).expect("should decode");
        let info = CertificateInfo::from_certificate(&cert).expect("should summarize");

        assert_eq!(info.subject_dn, "C=NL,O=Sphinx Labs,CN=test.example.com");
        assert_eq!(info.issuer_dn, "C=NL,O=Sphinx Labs,CN=Test Intermediate CA");
        assert_eq!(info.subject.get("CN").map(String::as_str), Some("test.example.com"));
        assert_eq!(
            info.public_key_jwk.thumbprint(crate::jose::Digest::Sha256).expect("should calculate"),
            "iAzi3C-OjPVWNyPopGebSBzQGxyqWSYHSp2clxH5mSI"
        );
    }

    #[test]
    fn garbage() {
        let err = pem_or_der_to_certificate("not a certificate").expect_err("should fail");
        assert!(err.is(Err::InvalidCertificate));
    }
}
