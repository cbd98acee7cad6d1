//! # JOSE
//!
//! JSON Object Signing and Encryption structures used by the resolvers and
//! the JWS pipeline: algorithms ([RFC7518]), keys ([RFC7517]) with
//! thumbprints ([RFC7638]) and signatures ([RFC7515]).
//!
//! [RFC7515]: https://www.rfc-editor.org/rfc/rfc7515
//! [RFC7517]: https://www.rfc-editor.org/rfc/rfc7517
//! [RFC7518]: https://www.rfc-editor.org/rfc/rfc7518
//! [RFC7638]: https://www.rfc-editor.org/rfc/rfc7638

pub mod jwa;
pub mod jwk;
pub mod jws;

pub use self::jwa::Algorithm;
pub use self::jwk::{calculate_jwk_thumbprint, Curve, Digest, KeyUse, Kty, PublicKeyJwk};
pub use self::jws::{Jws, JwsHeader, JwsJsonFlattened, JwsJsonGeneral, JwsSignature};
