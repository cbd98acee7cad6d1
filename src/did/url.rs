//! Destructure DID URLs into their components.
//!
//! A DID URL is of the form
//!
//! `did:<method>:<method-specific-id>[/<path>][?<query>][#<fragment>]`.

use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Err, Error};

static DID_REGEX: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^did:([a-z0-9]+):((?:[A-Za-z0-9._%-]*:)*[A-Za-z0-9._%-]+)$"));

/// Structure of a DID URL.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DidUrl {
    /// The DID, without path, query or fragment.
    pub did: String,

    /// DID method.
    pub method: String,

    /// Method-specific ID.
    pub id: String,

    /// Path, without the leading `/`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Query parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<BTreeMap<String, String>>,

    /// Fragment, typically naming a verification method or service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
}

impl DidUrl {
    /// The DID URL with the fragment expanded, for example
    /// `did:example:123#key-1`.
    #[must_use]
    pub fn did_with_fragment(&self) -> Option<String> {
        self.fragment.as_ref().map(|f| format!("{}#{f}", self.did))
    }
}

impl Display for DidUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.did)?;
        if let Some(path) = &self.path {
            write!(f, "/{path}")?;
        }
        if let Some(query) = &self.query {
            let encoded =
                url::form_urlencoded::Serializer::new(String::new()).extend_pairs(query).finish();
            write!(f, "?{encoded}")?;
        }
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

impl FromStr for DidUrl {
    type Err = Error;

    /// Parse a DID URL.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidDid`] if the DID part is not valid DID syntax.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (rest, fragment) = match s.split_once('#') {
            Some((rest, fragment)) => (rest, Some(fragment.to_string())),
            None => (s, None),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => {
                let params = url::form_urlencoded::parse(query.as_bytes()).into_owned().collect();
                (rest, Some(params))
            }
            None => (rest, None),
        };
        let (did, path) = match rest.split_once('/') {
            Some((did, path)) => (did, Some(path.to_string())),
            None => (rest, None),
        };

        let regex = DID_REGEX
            .as_ref()
            .map_err(|e| Error::new(Err::Unknown, format!("DID pattern failed to compile: {e}")))?;
        let captures =
            regex
                .captures(did)
                .ok_or_else(|| Error::new(Err::InvalidDid, format!("invalid DID: {s}")))?;

        Ok(Self {
            did: did.to_string(),
            method: captures[1].to_string(),
            id: captures[2].to_string(),
            path,
            query,
            fragment: fragment.filter(|f| !f.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_url() {
        let url: DidUrl =
            "did:web:example.com:user:alice/path?versionId=2#key-1".parse().expect("should parse");
        assert_eq!(url.did, "did:web:example.com:user:alice");
        assert_eq!(url.method, "web");
        assert_eq!(url.id, "example.com:user:alice");
        assert_eq!(url.path.as_deref(), Some("path"));
        assert_eq!(
            url.query.as_ref().and_then(|q| q.get("versionId")).map(String::as_str),
            Some("2")
        );
        assert_eq!(
            url.did_with_fragment().as_deref(),
            Some("did:web:example.com:user:alice#key-1")
        );
        assert_eq!(url.to_string(), "did:web:example.com:user:alice/path?versionId=2#key-1");
    }

    #[test]
    fn bare_did() {
        let url: DidUrl = "did:example:123".parse().expect("should parse");
        assert!(url.fragment.is_none());
        assert_eq!(url.to_string(), "did:example:123");
    }

    #[test]
    fn invalid() {
        for s in ["did:example", "did:Example:123", "urn:example:123", "did::123"] {
            let err = s.parse::<DidUrl>().expect_err("should fail");
            assert!(err.is(Err::InvalidDid), "{s}");
        }
    }
}
