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

//! Version specific assertion parsers and the common entry point.

mod v0_5;
mod v1_0;
mod v2_0;

use std::str::FromStr;

use bherror::traits::{ForeignError as _, PropagateError as _};
use ob_uri_utils::{origin, DataUri};
use serde_json::Value;

use crate::{
    client::HttpGetClient,
    date::{normalize_date, DateField},
    detect::{detect_raw_type, detect_type, DetectedType, Resolved},
    error::section,
    fetch::{Fetcher, TempFile},
    jws::decode_unverified,
    record::{IssuerData, NormalizedAssertionRecord},
    Error, Result,
};

/// An Open Badges protocol version understood by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVersion {
    /// Open Badges 0.5, the original Mozilla backpack format.
    V0_5,
    /// Open Badges 1.0.
    V1_0,
    /// Open Badges 1.1, parsed like 1.0.
    V1_1,
    /// Open Badges 2.0.
    V2_0,
}

impl ProtocolVersion {
    /// Every supported version, oldest first.
    pub const ALL: [Self; 4] = [Self::V0_5, Self::V1_0, Self::V1_1, Self::V2_0];

    /// The version string, e.g. `"2.0"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V0_5 => "0.5",
            Self::V1_0 => "1.0",
            Self::V1_1 => "1.1",
            Self::V2_0 => "2.0",
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = bherror::Error<Error>;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|version| version.as_str() == value)
            .ok_or_else(|| bherror::Error::root(Error::UnsupportedVersion(value.to_owned())))
    }
}

impl std::fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses assertions of every [`ProtocolVersion`] into a
/// [`NormalizedAssertionRecord`].
///
/// The protocol version is not detected here; it is the one reported by the
/// verification of the same input, which must happen first.
#[derive(Debug, Clone)]
pub struct AssertionParser<C> {
    fetcher: Fetcher<C>,
}

impl<C: HttpGetClient> AssertionParser<C> {
    /// Creates a new [`AssertionParser`] resolving references with `fetcher`.
    pub fn new(fetcher: Fetcher<C>) -> Self {
        Self { fetcher }
    }

    /// The fetcher used for every remote resource.
    pub fn fetcher(&self) -> &Fetcher<C> {
        &self.fetcher
    }

    /// Parses `raw` as an assertion of the given `version`.
    ///
    /// `raw` is an assertion object, or a string holding a hosted assertion
    /// URL, assertion JSON, a compact JWS or a `data:` URI of either.  A JWS
    /// payload is decoded without checking the signature.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedVersion`] for an unknown `version`, before `raw`
    /// is looked at.  Otherwise the first failing step, wrapped in the
    /// section it belongs to.
    pub async fn parse(&self, raw: &Value, version: &str) -> Result<NormalizedAssertionRecord> {
        let version = version.parse()?;
        self.parse_version(raw, version).await
    }

    /// Like [`AssertionParser::parse`] for textual content.
    pub async fn parse_str(&self, raw: &str, version: &str) -> Result<NormalizedAssertionRecord> {
        self.parse(&Value::String(raw.to_owned()), version).await
    }

    /// Like [`AssertionParser::parse`] with an already parsed version.
    pub async fn parse_version(
        &self,
        raw: &Value,
        version: ProtocolVersion,
    ) -> Result<NormalizedAssertionRecord> {
        tracing::info!(%version, "parsing assertion");

        let assertion = self
            .load_assertion(raw)
            .await
            .match_err(section(Error::RawAssertion))?;

        let record = match version {
            ProtocolVersion::V0_5 => v0_5::parse(&self.fetcher, assertion).await,
            ProtocolVersion::V1_0 | ProtocolVersion::V1_1 => {
                v1_0::parse(&self.fetcher, assertion).await
            }
            ProtocolVersion::V2_0 => v2_0::parse(&self.fetcher, assertion).await,
        }?;

        tracing::info!(id = %record.id, "assertion parsed");
        Ok(record)
    }

    async fn load_assertion(&self, raw: &Value) -> Result<Value> {
        let text = match raw {
            Value::Object(_) => return Ok(raw.clone()),
            Value::String(text) => text,
            _ => return Err(bherror::Error::root(Error::UnknownType)),
        };

        let allowed = [
            DetectedType::Url,
            DetectedType::Json,
            DetectedType::Jws,
            DetectedType::DataUri,
        ];
        match detect_raw_type(text, Some(&allowed))? {
            Resolved::Url(url) => self.fetcher.fetch_json(&url).await,
            Resolved::Json(json) => Ok(json),
            Resolved::Jws(jws) => decode_unverified(&jws),
            Resolved::DataUri(data_uri) => {
                let payload = DataUri::parse(&data_uri)
                    .and_then(|uri| uri.decode())
                    .with_err(|| Error::InvalidDataUri)?;
                let payload = String::from_utf8(payload).foreign_err(|| Error::InvalidDataUri)?;

                match detect_raw_type(&payload, Some(&[DetectedType::Json, DetectedType::Jws]))? {
                    Resolved::Jws(jws) => decode_unverified(&jws),
                    Resolved::Json(json) => Ok(json),
                    other => Err(bherror::Error::root(Error::DisallowedType(other.kind()))),
                }
            }
        }
    }
}

/// Fetches the document `value` references, or returns it if inline.
pub(crate) async fn resolve_document<C: HttpGetClient>(
    fetcher: &Fetcher<C>,
    value: &Value,
) -> Result<Value> {
    match detect_type(value, Some(&[DetectedType::Url, DetectedType::Json]))? {
        Resolved::Url(url) => fetcher.fetch_json(&url).await,
        Resolved::Json(json) => Ok(json),
        other => Err(bherror::Error::root(Error::DisallowedType(other.kind()))),
    }
}

/// Fetches or decodes the image `value` into a temporary file and checks its
/// MIME type against `allowed`.
///
/// The image is a URL or a `data:` URI, or an `Image` object whose `id` is.
pub(crate) async fn resolve_image<C: HttpGetClient>(
    fetcher: &Fetcher<C>,
    value: Option<&Value>,
    allowed: &[&str],
) -> Result<TempFile> {
    let location = match value {
        Some(Value::String(location)) => location.as_str(),
        Some(Value::Object(image)) => image
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| bherror::Error::root(Error::InvalidProperty("image.id".to_owned())))?,
        _ => {
            return Err(bherror::Error::root(Error::InvalidProperty(
                "image".to_owned(),
            )))
        }
    };

    let detectable = [DetectedType::Url, DetectedType::DataUri];
    let fetched = match detect_raw_type(location, Some(&detectable))? {
        Resolved::DataUri(data_uri) => fetcher.save_data_uri(&data_uri, None)?,
        Resolved::Url(url) => fetcher.fetch_image(url.as_str()).await?,
        other => return Err(bherror::Error::root(Error::DisallowedType(other.kind()))),
    };

    match fetched.content_type {
        Some(content_type) if allowed.contains(&content_type.as_str()) => Ok(fetched.file),
        content_type => Err(bherror::Error::root(Error::InvalidImageFormat(
            content_type.unwrap_or_default(),
        ))),
    }
}

/// Reads the issuer properties from an issuer `Profile` document.
///
/// The origin is derived from the required `url`.
pub(crate) fn issuer_from_profile(profile: &Value) -> Result<IssuerData> {
    let Some(url) = string_property(profile, "url") else {
        return Err(bherror::Error::root(Error::InvalidProperty("url".to_owned())));
    };
    let issuer_org_origin = origin(&url).with_err(|| Error::InvalidProperty("url".to_owned()))?;
    let name = string_property(profile, "name");

    Ok(IssuerData {
        org_issued_name: name.clone(),
        issuer_org_url: Some(url),
        issuer_org_name: name,
        issuer_org_email: string_property(profile, "email"),
        issuer_org_origin: Some(issuer_org_origin),
    })
}

/// Re-fetches a hosted assertion from `url`.
pub(crate) async fn hosted_refetch<C: HttpGetClient>(
    fetcher: &Fetcher<C>,
    url: Option<&str>,
) -> Result<Value> {
    tracing::debug!(url, "re-fetching hosted assertion");

    let refetched = match url {
        Some(url) => fetcher.fetch_json(url).await,
        None => Err(bherror::Error::root(Error::InvalidProperty(
            "verify.url".to_owned(),
        ))),
    };
    refetched.match_err(section(Error::AssertionRefetch))
}

/// Normalizes the date in `document[key]`; absent, `null` and empty values
/// are `None`.
pub(crate) fn optional_date(
    document: &Value,
    key: &str,
    field: DateField,
) -> Result<Option<String>> {
    match document.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) if text.is_empty() => Ok(None),
        Some(value) => normalize_date(value, field).map(Some),
    }
}

/// Normalizes the mandatory date in `document[key]`.
pub(crate) fn required_date(document: &Value, key: &str, field: DateField) -> Result<String> {
    normalize_date(document.get(key).unwrap_or(&Value::Null), field)
}

/// `document[key]` if it is a string.
pub(crate) fn string_property(document: &Value, key: &str) -> Option<String> {
    document
        .get(key)
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
}

/// `document[key]` if it is a string, or the `id` of the object it holds.
pub(crate) fn string_or_id(document: &Value, key: &str) -> Option<String> {
    match document.get(key)? {
        Value::String(text) => Some(text.clone()),
        Value::Object(object) => object.get("id")?.as_str().map(ToOwned::to_owned),
        _ => None,
    }
}
