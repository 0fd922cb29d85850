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

use crate::{date::DateField, detect::DetectedType};

/// Error type for everything that can go wrong while reading an assertion.
///
/// The leaf variants describe what actually failed.  The section variants
/// (`RawAssertion`, `AssertionRefetch`, `Badge`, `BadgeImage`, `Criteria`,
/// `Issuer`, `Evidence`, `Endorsement`) wrap a leaf (or another section) with
/// the logical part of the document that was being processed, so that the
/// rendered message reads e.g. `Error parsing badge data (invalid badge image;
/// unhandled format "image/gif")`.  Use [`Error::root_cause`] to match on the
/// leaf regardless of wrapping depth.
#[derive(strum_macros::Display, Debug, Clone, PartialEq)]
pub enum Error {
    /// Network or HTTP failure, or unusable content while retrieving a resource.
    #[strum(to_string = "{0}")]
    Fetch(String),

    /// The value is neither a URL, JSON, a JWS nor a `data:` URI.
    #[strum(to_string = "unknown type")]
    UnknownType,

    /// The value was classified as a type not allowed for the property.
    #[strum(to_string = "unhandled type \"{0}\"")]
    DisallowedType(DetectedType),

    /// The image is not in the set of MIME types allowed for its context.
    #[strum(to_string = "unhandled format \"{0}\"")]
    InvalidImageFormat(String),

    /// A date property could not be parsed.
    #[strum(to_string = "Error parsing {0} ({1})")]
    DateParse(DateField, String),

    /// The hashed recipient identity uses an unsupported algorithm prefix.
    #[strum(to_string = "unknown hash type in identity \"{0}\"")]
    UnknownHashAlgorithm(String),

    /// The identity hash could not be computed.
    #[strum(to_string = "hashing failed")]
    Hashing,

    /// The requested protocol version is not one of `0.5`, `1.0`, `1.1`, `2.0`.
    #[strum(to_string = "Unknown assertion version \"{0}\"")]
    UnsupportedVersion(String),

    /// The `data:` URI is malformed or its payload can not be decoded.
    #[strum(to_string = "invalid data URI")]
    InvalidDataUri,

    /// The compact JWS can not be parsed.
    #[strum(to_string = "invalid JWS")]
    InvalidJws,

    /// A required property is missing or has an unexpected shape.
    #[strum(to_string = "missing or invalid property `{0}`")]
    InvalidProperty(String),

    /// A temporary file could not be created, written or persisted.
    #[strum(to_string = "temporary file error")]
    TempFile,

    /// Failure while turning the raw input into assertion JSON.
    #[strum(to_string = "Error processing raw assertion ({0})")]
    RawAssertion(Box<Error>),

    /// Failure while re-fetching a hosted assertion.
    #[strum(to_string = "Unable to retrieve assertion json ({0})")]
    AssertionRefetch(Box<Error>),

    /// Failure anywhere within the badge class.
    #[strum(to_string = "Error parsing badge data ({0})")]
    Badge(Box<Error>),

    /// Failure while resolving the badge image.
    #[strum(to_string = "invalid badge image; {0}")]
    BadgeImage(Box<Error>),

    /// Failure while resolving the badge criteria.
    #[strum(to_string = "invalid badge criteria; {0}")]
    Criteria(Box<Error>),

    /// Failure while resolving the issuer profile.
    #[strum(to_string = "invalid issuer; {0}")]
    Issuer(Box<Error>),

    /// Failure while parsing evidence.
    #[strum(to_string = "Error parsing evidence ({0})")]
    Evidence(Box<Error>),

    /// Failure while parsing an endorsement.
    #[strum(to_string = "Error parsing endorsement ({0})")]
    Endorsement(Box<Error>),
}

impl bherror::BhError for Error {}

impl Error {
    /// Returns the innermost error, skipping all section wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::RawAssertion(inner)
            | Self::AssertionRefetch(inner)
            | Self::Badge(inner)
            | Self::BadgeImage(inner)
            | Self::Criteria(inner)
            | Self::Issuer(inner)
            | Self::Evidence(inner)
            | Self::Endorsement(inner) => inner.root_cause(),
            other => other,
        }
    }
}

/// Builds the closure for [`bherror::traits::PropagateError::match_err`]
/// which wraps the propagated error into the given section variant.
pub(crate) fn section(wrap: fn(Box<Error>) -> Error) -> impl FnOnce(&Error) -> Error {
    move |inner| wrap(Box::new(inner.clone()))
}

/// Result type used across the crate.
pub type Result<T> = bherror::Result<T, Error>;
