//! # Configuration
//!
//! Resolver behavior is configured through option structs. [`Config`] groups
//! them so they can be loaded together from JSON; every member is optional
//! and falls back to its default.

use serde::{Deserialize, Serialize};

use crate::error::{Err, Error};
use crate::external::ExternalOptions;
use crate::jws::{JwsCreateOptions, JwsVerifyOptions};
use crate::managed::ManagedOptions;

/// Options for all resolvers and the JWS pipeline.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Managed identifier resolution.
    pub managed: ManagedOptions,

    /// External identifier resolution, including X.509 validation and
    /// federation trust anchors.
    pub external: ExternalOptions,

    /// JWS signing.
    pub jws_create: JwsCreateOptions,

    /// JWS verification.
    pub jws_verify: JwsVerifyOptions,
}

impl Config {
    /// Load configuration from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`Err::InvalidArgument`] if the text is not valid
    /// configuration.
    pub fn from_json(json: &str) -> crate::Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::new(Err::InvalidArgument, format!("invalid configuration: {e}")))
    }

    /// Verification options with the external resolution settings applied.
    #[must_use]
    pub fn verify_options(&self) -> JwsVerifyOptions {
        JwsVerifyOptions {
            external: self.external.clone(),
            ..self.jws_verify.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_json_snapshot as assert_snapshot;

    use super::*;
    use crate::did::Relationship;
    use crate::jws::{JwsMode, Serialization};

    #[test]
    fn partial_json() {
        let config = Config::from_json(
            r#"{
                "managed": {
                    "vmRelationship": "assertionMethod",
                    "offlineWhenNoDidRegistered": false
                },
                "external": {
                    "x509": {"trustRootWhenNoAnchors": true},
                    "trustAnchors": ["https://anchor.example"]
                },
                "jwsCreate": {"mode": "jwk", "serialization": "general"}
            }"#,
        )
        .expect("should load");

        assert_eq!(config.managed.vm_relationship, Relationship::AssertionMethod);
        assert!(!config.managed.offline_when_no_did_registered);
        assert!(config.external.verify);
        assert!(config.external.resolution.universal);
        assert!(config.external.x509.trust_root_when_no_anchors);
        assert_eq!(config.jws_create.mode, JwsMode::Jwk);
        assert_eq!(config.jws_create.serialization, Serialization::General);
        assert_eq!(config.verify_options().external.trust_anchors, vec!["https://anchor.example"]);
    }

    #[test]
    fn defaults() {
        assert_snapshot!(Config::default(), @r###"
        {
          "managed": {
            "vmRelationship": "verificationMethod",
            "offlineWhenNoDidRegistered": true,
            "resolution": {
              "local": true,
              "drivers": true,
              "universal": true
            }
          },
          "external": {
            "resolution": {
              "local": true,
              "drivers": true,
              "universal": true
            },
            "verify": true,
            "x509": {
              "trustAnchors": [],
              "verificationTime": null,
              "exactChainRequired": false,
              "trustRootWhenNoAnchors": false
            },
            "trustAnchors": []
          },
          "jwsCreate": {
            "mode": "auto",
            "serialization": "compact",
            "protectedHeader": {},
            "noIdentifierInHeader": false
          },
          "jwsVerify": {
            "external": {
              "resolution": {
                "local": true,
                "drivers": true,
                "universal": true
              },
              "verify": true,
              "x509": {
                "trustAnchors": [],
                "verificationTime": null,
                "exactChainRequired": false,
                "trustRootWhenNoAnchors": false
              },
              "trustAnchors": []
            }
          }
        }
        "###);
    }

    #[test]
    fn invalid() {
        let err = Config::from_json(r#"{"managed": {"vmRelationship": "nope"}}"#)
            .expect_err("should fail");
        assert!(err.is(Err::InvalidArgument));
    }
}
