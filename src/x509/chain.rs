//! Certificate chain validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use x509_cert::der::Encode;
use x509_cert::ext::pkix::BasicConstraints;
use x509_cert::Certificate;

use super::{dn_to_string, pem_or_der_to_certificate, to_datetime, CertificateInfo};
use crate::crypto;
use crate::error::{Err, Error};

/// Options for [`validate_certificate_chain`].
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct X509VerificationOptions {
    /// Trusted certificates, PEM or base64 DER.
    pub trust_anchors: Vec<String>,

    /// Time at which the chain must be valid. Defaults to now.
    pub verification_time: Option<DateTime<Utc>>,

    /// Reject chains whose validated path differs in length from the chain
    /// supplied (the chain must end with the trust anchor itself).
    pub exact_chain_required: bool,

    /// With no trust anchors configured, trust the last certificate of the
    /// chain.
    pub trust_root_when_no_anchors: bool,
}

/// Outcome of chain validation. Failures are reported here rather than as
/// errors.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// Validation failed.
    pub error: bool,

    /// The failure is structural or cryptographic, rather than a lack of
    /// trust in an otherwise sound chain.
    pub critical: bool,

    /// Summary of the outcome.
    pub message: String,

    /// Additional detail on a failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail_message: Option<String>,

    /// Time the chain was validated against.
    pub verification_time: DateTime<Utc>,

    /// The validated path, leaf first. Present on success and for untrusted
    /// but otherwise sound chains.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_chain: Option<Vec<CertificateInfo>>,
}

impl ValidationResult {
    fn failed(time: DateTime<Utc>, message: String, detail: Option<String>) -> Self {
        tracing::debug!("certificate chain rejected: {message}");
        Self {
            error: true,
            critical: true,
            message,
            detail_message: detail,
            verification_time: time,
            certificate_chain: None,
        }
    }
}

/// Validate a leaf-first certificate chain.
///
/// Each certificate must be within its validity window, name the next
/// certificate's subject as its issuer and carry a signature made with that
/// certificate's key; issuing certificates must be CAs. The path ends at the
/// first certificate that is a trust anchor, or is extended with an anchor
/// that issued the last certificate.
///
/// # Errors
///
/// Returns an error only for malformed input: an empty chain, or a
/// certificate or trust anchor that cannot be decoded.
pub fn validate_certificate_chain(
    chain: &[String], opts: &X509VerificationOptions,
) -> crate::Result<ValidationResult> {
    if chain.is_empty() {
        return Err(Error::new(Err::InvalidArgument, "certificate chain is empty"));
    }
    let certs =
        chain.iter().map(|c| pem_or_der_to_certificate(c)).collect::<crate::Result<Vec<_>>>()?;
    let anchors =
        opts.trust_anchors
            .iter()
            .map(|a| pem_or_der_to_certificate(a)).collect::<crate::Result<Vec<_>>>()?;
    let time = opts.verification_time.unwrap_or_else(Utc::now);

    // path ends at the first anchor in the chain
    let mut path: Vec<&Certificate> = vec![];
    let mut anchored = false;
    for cert in &certs {
        path.push(cert);
        if anchors.contains(cert) {
            anchored = true;
            break;
        }
    }
    if !anchored {
        let last = path[path.len() - 1];
        if let Some(anchor) = anchors.iter().find(|a| signed_by(last, a).unwrap_or(false)) {
            path.push(anchor);
            anchored = true;
        }
    }

    if opts.exact_chain_required && path.len() != certs.len() {
        return Ok(ValidationResult::failed(
            time,
            "Certificate chain does not match the trusted path".to_string(),
            Some(format!(
                "chain has {} certificates, trusted path has {}",
                certs.len(),
                path.len()
            )),
        ));
    }

    for (i, cert) in path.iter().enumerate() {
        let subject = dn_to_string(&cert.tbs_certificate.subject);
        let validity = &cert.tbs_certificate.validity;
        if time < to_datetime(validity.not_before) || time > to_datetime(validity.not_after) {
            return Ok(ValidationResult::failed(
                time,
                format!("Certificate '{subject}' is not valid at {time}"),
                None,
            ));
        }

        let Some(issuer) = path.get(i + 1) else {
            break;
        };
        let issuer_subject = dn_to_string(&issuer.tbs_certificate.subject);
        if cert.tbs_certificate.issuer != issuer.tbs_certificate.subject {
            return Ok(ValidationResult::failed(
                time,
                format!("Certificate '{subject}' was not issued by '{issuer_subject}'"),
                None,
            ));
        }
        if !is_ca(issuer) {
            return Ok(ValidationResult::failed(
                time,
                format!("Certificate '{issuer_subject}' is not a CA certificate"),
                None,
            ));
        }
        match signed_by(cert, issuer) {
            Ok(true) => {}
            Ok(false) => {
                return Ok(ValidationResult::failed(
                    time,
                    format!("Signature of certificate '{subject}' could not be verified"),
                    None,
                ));
            }
            Err(e) => {
                return Ok(ValidationResult::failed(
                    time,
                    format!("Signature of certificate '{subject}' could not be verified"),
                    Some(e.to_string()),
                ));
            }
        }
    }

    // the path's root is trusted by configuration alone
    let root = path[path.len() - 1];
    if !anchored && anchors.is_empty() && opts.trust_root_when_no_anchors {
        let self_issued = root.tbs_certificate.issuer == root.tbs_certificate.subject;
        if self_issued && !signed_by(root, root).unwrap_or(false) {
            return Ok(ValidationResult::failed(
                time,
                format!(
                    "Signature of certificate '{}' could not be verified",
                    dn_to_string(&root.tbs_certificate.subject)
                ),
                None,
            ));
        }
        anchored = true;
    }

    let certificate_chain =
        path.iter()
            .map(|c| CertificateInfo::from_certificate(c)).collect::<crate::Result<Vec<_>>>()?;

    if !anchored {
        let message = if anchors.is_empty() {
            "Certificate chain is not trusted: no trust anchors configured"
        } else {
            "Certificate chain is not trusted: no trust anchor found"
        };
        tracing::debug!("{message}");
        return Ok(ValidationResult {
            error: true,
            critical: false,
            message: message.to_string(),
            detail_message: None,
            verification_time: time,
            certificate_chain: Some(certificate_chain),
        });
    }

    Ok(ValidationResult {
        error: false,
        critical: false,
        message: "Certificate chain was valid".to_string(),
        detail_message: None,
        verification_time: time,
        certificate_chain: Some(certificate_chain),
    })
}

fn signed_by(cert: &Certificate, issuer: &Certificate) -> crate::Result<bool> {
    let tbs = cert
        .tbs_certificate
        .to_der()
        .map_err(|e| {
            Error::new(Err::InvalidCertificate, format!("cannot encode certificate: {e}"))
        })?;
    let signature = cert
        .signature
        .as_bytes()
        .ok_or_else(|| {
            Error::new(Err::InvalidCertificate, "certificate signature has unused bits")
        })?;
    crypto::verify_x509_signature(
        cert.signature_algorithm.oid,
        &issuer.tbs_certificate.subject_public_key_info,
        &tbs,
        signature,
    )
}

fn is_ca(cert: &Certificate) -> bool {
    matches!(cert.tbs_certificate.get::<BasicConstraints>(), Ok(Some((_, bc))) if bc.ca)
}
