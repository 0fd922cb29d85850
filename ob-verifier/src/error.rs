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

/// Error type for the verification of a badge.
///
/// [`VerificationError::Revoked`] is kept apart from the other failures so
/// that callers can record the revocation instead of rejecting the badge as
/// malformed.
#[derive(strum_macros::Display, Debug, Clone, PartialEq)]
pub enum VerificationError {
    /// The issuer revoked the assertion; carries the explanation of the report.
    #[strum(to_string = "Assertion revoked: {0}")]
    Revoked(String),

    /// The report is not valid for any other reason.
    #[strum(to_string = "Could not verify assertion: {0}")]
    Invalid(String),

    /// A valid report does not name the protocol version.
    #[strum(to_string = "Verification report is missing the Open Badges version")]
    MissingVersion,

    /// The reported protocol version is not supported by the parser.
    #[strum(to_string = "Unsupported Open Badges version \"{0}\"")]
    UnsupportedVersion(String),

    /// The verification engine failed to produce a report.
    #[strum(to_string = "Verification engine failure: {0}")]
    Engine(String),
}

impl bherror::BhError for VerificationError {}

impl VerificationError {
    /// Whether the assertion was revoked by its issuer.
    pub fn is_revoked(&self) -> bool {
        matches!(self, Self::Revoked(_))
    }
}

/// Error type for the cryptographic checks of signed assertions.
#[derive(strum_macros::Display, Debug, Clone, PartialEq)]
pub enum SignatureError {
    /// The public key can not be read from its PEM encoding.
    #[strum(to_string = "Invalid public key")]
    InvalidKey,
    /// The JWS uses an algorithm other than `RS256`.
    #[strum(to_string = "Unsupported signing algorithm \"{0}\"")]
    UnsupportedAlgorithm(String),
    /// Error in the underlying crypto library.
    #[strum(to_string = "Crypto backend error")]
    CryptoBackend,
}

impl bherror::BhError for SignatureError {}

/// Result type used by the verification functions.
pub type Result<T> = bherror::Result<T, VerificationError>;
