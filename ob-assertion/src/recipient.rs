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

//! Recipient Verifier: matches a possibly hashed recipient identity against
//! known plaintext identities.

use std::str::FromStr;

use bherror::traits::ForeignError as _;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The recipient of an assertion, in the 1.0+ `IdentityObject` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// The identity type, usually `email`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub identity_type: Option<String>,
    /// The plaintext identity, or `<alg>$<hex digest>` if hashed.
    pub identity: String,
    /// Whether `identity` is hashed.
    #[serde(default)]
    pub hashed: bool,
    /// The salt appended to the plaintext identity before hashing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
}

impl Recipient {
    /// Builds a recipient from the flat 0.5 `recipient` and `salt` properties.
    ///
    /// The identity counts as hashed only if it carries a known algorithm prefix.
    pub fn from_flat(identity: &str, salt: Option<&str>) -> Self {
        let hashed = IdentityHashAlgorithm::from_identity(identity).is_ok();

        Self {
            identity_type: Some("email".to_owned()),
            identity: identity.to_owned(),
            hashed,
            salt: salt.filter(|salt| !salt.is_empty()).map(ToOwned::to_owned),
        }
    }
}

/// Hash algorithms allowed for recipient identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityHashAlgorithm {
    /// MD5, legacy.
    Md5,
    /// SHA-256.
    Sha256,
}

impl IdentityHashAlgorithm {
    /// The prefix identifying the algorithm in a hashed identity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha256 => "sha256",
        }
    }

    /// Extracts the algorithm from the `<alg>$<hex digest>` identity.
    pub fn from_identity(identity: &str) -> Result<Self> {
        let prefix = identity.split_once('$').map_or(identity, |(alg, _)| alg);
        prefix.parse()
    }

    fn hasher(&self) -> &'static dyn IdentityHasher {
        match self {
            Self::Md5 => &Md5,
            Self::Sha256 => &Sha256,
        }
    }
}

impl FromStr for IdentityHashAlgorithm {
    type Err = bherror::Error<Error>;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" => Ok(Self::Sha256),
            _ => Err(bherror::Error::root(Error::UnknownHashAlgorithm(
                value.to_owned(),
            ))),
        }
    }
}

impl std::fmt::Display for IdentityHashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The trait used for calculating identity hash digests.
pub trait IdentityHasher: Send + Sync {
    /// The algorithm used by [`IdentityHasher::digest`].
    fn algorithm(&self) -> IdentityHashAlgorithm;

    /// Computes the hash digest of the given `input`.
    fn digest(&self, input: &[u8]) -> Result<Vec<u8>>;
}

/// An [`IdentityHasher`] implementation for the `MD5` hash function.
#[derive(Debug, Default, Copy, Clone)]
pub struct Md5;

impl IdentityHasher for Md5 {
    fn algorithm(&self) -> IdentityHashAlgorithm {
        IdentityHashAlgorithm::Md5
    }

    fn digest(&self, input: &[u8]) -> Result<Vec<u8>> {
        openssl::hash::hash(openssl::hash::MessageDigest::md5(), input)
            .map(|digest| digest.to_vec())
            .foreign_err(|| Error::Hashing)
    }
}

/// An [`IdentityHasher`] implementation for the `SHA-256` hash function.
#[derive(Debug, Default, Copy, Clone)]
pub struct Sha256;

impl IdentityHasher for Sha256 {
    fn algorithm(&self) -> IdentityHashAlgorithm {
        IdentityHashAlgorithm::Sha256
    }

    fn digest(&self, input: &[u8]) -> Result<Vec<u8>> {
        Ok(openssl::sha::sha256(input).to_vec())
    }
}

/// Computes `<alg>$<hex digest of identity + salt>`.
pub fn identity_hash(identity: &str, salt: &str, hasher: &dyn IdentityHasher) -> Result<String> {
    let digest = hasher.digest(format!("{identity}{salt}").as_bytes())?;
    Ok(format!("{}${}", hasher.algorithm(), hex::encode(digest)))
}

/// Returns the first of `allowed_identities` the `recipient` was issued to.
///
/// A plaintext identity must be one of `allowed_identities` exactly.  For a
/// hashed identity every candidate is hashed with the recipient's salt and
/// the algorithm named by the identity prefix; hex digests compare
/// case-insensitively.  An unknown prefix is an error.
pub fn verify_recipient(
    recipient: &Recipient,
    allowed_identities: &[impl AsRef<str>],
) -> Result<Option<String>> {
    if !recipient.hashed {
        return Ok(allowed_identities
            .iter()
            .map(AsRef::as_ref)
            .find(|allowed| *allowed == recipient.identity)
            .map(ToOwned::to_owned));
    }

    let hasher = IdentityHashAlgorithm::from_identity(&recipient.identity)?.hasher();
    let salt = recipient.salt.as_deref().unwrap_or_default();

    for allowed in allowed_identities.iter().map(AsRef::as_ref) {
        if identity_hash(allowed, salt, hasher)?.eq_ignore_ascii_case(&recipient.identity) {
            return Ok(Some(allowed.to_owned()));
        }
    }

    Ok(None)
}
