// Copyright (C) 2020-2026  The Blockhouse Technology Limited (TBTL).
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// This program is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU Affero General Public
// License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Signature checks of signed assertions.

use bherror::{traits::ForeignError as _, Result};
use ob_assertion::jws::CompactJws;
use openssl::{hash::MessageDigest, pkey::PKey, sign::Verifier};

use crate::error::SignatureError;

/// The only algorithm Open Badges signs assertions with.
pub const RS256: &str = "RS256";

/// Verifies the `RS256` signature of the `jws` with the PEM encoded
/// `public_key_pem`.
///
/// Returns `Ok(false)` for a well-formed but wrong signature.
pub fn verify_jws(jws: &CompactJws, public_key_pem: &[u8]) -> Result<bool, SignatureError> {
    match jws.algorithm() {
        Some(RS256) => {}
        other => {
            return Err(bherror::Error::root(SignatureError::UnsupportedAlgorithm(
                other.unwrap_or_default().to_owned(),
            )))
        }
    }

    let public_key =
        PKey::public_key_from_pem(public_key_pem).foreign_err(|| SignatureError::InvalidKey)?;

    let mut verifier = Verifier::new(MessageDigest::sha256(), &public_key)
        .foreign_err(|| SignatureError::CryptoBackend)?;
    verifier
        .update(jws.signing_input.as_bytes())
        .foreign_err(|| SignatureError::CryptoBackend)?;

    // OpenSSL reports a malformed signature as an error rather than a mismatch
    Ok(verifier.verify(&jws.signature).unwrap_or(false))
}

#[cfg(test)]
pub(crate) mod tests {
    use assert_matches::assert_matches;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    use openssl::{
        pkey::{PKey, Private},
        rsa::Rsa,
        sign::Signer,
    };
    use serde_json::{json, Value};

    use super::*;

    /// Generates an RSA key pair, returning the private key and the PEM
    /// encoded public key.
    pub(crate) fn generate_key() -> (PKey<Private>, String) {
        let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();
        let pem = String::from_utf8(key.public_key_to_pem().unwrap()).unwrap();
        (key, pem)
    }

    /// Signs `payload` into a compact JWS with the given `alg` header.
    pub(crate) fn sign(key: &PKey<Private>, alg: &str, payload: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(json!({"alg": alg}).to_string());
        let payload = URL_SAFE_NO_PAD.encode(payload.to_string());
        let signing_input = format!("{header}.{payload}");

        let mut signer = Signer::new(MessageDigest::sha256(), key).unwrap();
        signer.update(signing_input.as_bytes()).unwrap();
        let signature = URL_SAFE_NO_PAD.encode(signer.sign_to_vec().unwrap());

        format!("{signing_input}.{signature}")
    }

    #[test]
    fn test_valid_signature() {
        let (key, pem) = generate_key();
        let jws = CompactJws::parse(&sign(&key, RS256, &json!({"uid": "1"}))).unwrap();

        assert!(verify_jws(&jws, pem.as_bytes()).unwrap());
    }

    #[test]
    fn test_wrong_key() {
        let (key, _) = generate_key();
        let (_, other_pem) = generate_key();
        let jws = CompactJws::parse(&sign(&key, RS256, &json!({"uid": "1"}))).unwrap();

        assert!(!verify_jws(&jws, other_pem.as_bytes()).unwrap());
    }

    #[test]
    fn test_tampered_payload() {
        let (key, pem) = generate_key();
        let token = sign(&key, RS256, &json!({"uid": "1"}));
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = URL_SAFE_NO_PAD.encode(json!({"uid": "2"}).to_string());
        parts[1] = &forged;
        let jws = CompactJws::parse(&parts.join(".")).unwrap();

        assert!(!verify_jws(&jws, pem.as_bytes()).unwrap());
    }

    #[test]
    fn test_unsupported_algorithm() {
        let (key, pem) = generate_key();
        let jws = CompactJws::parse(&sign(&key, "HS256", &json!({"uid": "1"}))).unwrap();

        assert_eq!(
            verify_jws(&jws, pem.as_bytes()).unwrap_err().error,
            SignatureError::UnsupportedAlgorithm("HS256".to_owned())
        );
    }

    #[test]
    fn test_invalid_key() {
        let (key, _) = generate_key();
        let jws = CompactJws::parse(&sign(&key, RS256, &json!({"uid": "1"}))).unwrap();

        assert_matches!(
            verify_jws(&jws, b"not a key").unwrap_err().error,
            SignatureError::InvalidKey
        );
    }
}
