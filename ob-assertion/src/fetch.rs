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

//! Retrieval of remote and embedded resources into temporary files.

use std::{
    io::Write as _,
    path::{Path, PathBuf},
};

use bherror::traits::{ErrorContext as _, ForeignError as _, PropagateError as _};
use ob_uri_utils::DataUri;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::{
    client::{HttpGetClient, HttpResponse},
    config::FetchConfig,
    Error, Result,
};

/// MIME type of PNG images.
pub const MIME_TYPE_PNG: &str = "image/png";
/// MIME type of SVG images.
pub const MIME_TYPE_SVG: &str = "image/svg+xml";
/// MIME type of GIF images.
pub const MIME_TYPE_GIF: &str = "image/gif";
/// MIME type of JPEG images.
pub const MIME_TYPE_JPEG: &str = "image/jpeg";

/// Image formats allowed for badge class images.
pub const BADGE_IMAGE_MIME_TYPES: &[&str] = &[MIME_TYPE_PNG, MIME_TYPE_SVG];

/// Image formats allowed for every other image, e.g. endorser images.
pub const IMAGE_MIME_TYPES: &[&str] = &[
    MIME_TYPE_PNG,
    MIME_TYPE_SVG,
    MIME_TYPE_GIF,
    MIME_TYPE_JPEG,
];

const TEMP_FILE_PREFIX: &str = "ob-";

/// Temporary file holding fetched or decoded content.
///
/// The file is deleted when the handle is dropped, so a failed parse never
/// leaves files behind.  Call [`TempFile::keep`] to take ownership of the
/// file on disk.
#[derive(Debug)]
pub struct TempFile(tempfile::TempPath);

impl TempFile {
    /// Creates a new temporary file with the given `suffix` and `contents`,
    /// inside `dir` or the system temporary directory.
    pub fn create(dir: Option<&Path>, suffix: &str, contents: &[u8]) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_FILE_PREFIX).suffix(suffix);

        let mut file = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .foreign_err(|| Error::TempFile)?;

        file.write_all(contents).foreign_err(|| Error::TempFile)?;
        file.flush().foreign_err(|| Error::TempFile)?;

        Ok(Self(file.into_temp_path()))
    }

    /// The location of the file.
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Reads the whole content of the file.
    pub fn read(&self) -> Result<Vec<u8>> {
        std::fs::read(self.path())
            .foreign_err(|| Error::TempFile)
            .ctx(|| format!("reading {}", self.path().display()))
    }

    /// Disables the automatic deletion and returns the path of the file,
    /// which is from now on owned by the caller.
    pub fn keep(self) -> Result<PathBuf> {
        self.0.keep().foreign_err(|| Error::TempFile)
    }
}

impl Serialize for TempFile {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.path().serialize(serializer)
    }
}

/// A resource stored into a [`TempFile`].
#[derive(Debug)]
pub struct FetchedResource {
    /// The stored content.
    pub file: TempFile,
    /// The MIME type of the content, if known.
    pub content_type: Option<String>,
}

/// The source of a resource to fetch.
#[derive(Debug, Clone)]
pub enum ResourceInput<'a> {
    /// A URL that still has to be requested.
    Url(&'a str),
    /// An already received response.
    Response(HttpResponse),
}

impl<'a> From<&'a str> for ResourceInput<'a> {
    fn from(url: &'a str) -> Self {
        Self::Url(url)
    }
}

impl From<HttpResponse> for ResourceInput<'_> {
    fn from(response: HttpResponse) -> Self {
        Self::Response(response)
    }
}

/// Resource Fetcher: retrieves documents and files referenced by an assertion.
#[derive(Debug, Clone)]
pub struct Fetcher<C> {
    client: C,
    config: FetchConfig,
}

impl<C: HttpGetClient> Fetcher<C> {
    /// Creates a new [`Fetcher`] sending requests through `client`.
    pub fn new(client: C, config: FetchConfig) -> Self {
        Self { client, config }
    }

    /// The underlying HTTP client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// The configuration of this fetcher.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Sends a GET request, mapping transport failures to
    /// [`Error::Fetch`]`("connection error")`.
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url)
            .await
            .foreign_err(|| Error::Fetch("connection error".to_owned()))
            .ctx(|| format!("GET {url}"))?;

        if response.body.len() > self.config.max_body_size {
            return Err(bherror::Error::root(Error::Fetch(format!(
                "response body exceeds {} bytes",
                self.config.max_body_size
            ))));
        }

        Ok(response)
    }

    /// Retrieves the resource into a new temporary file.
    ///
    /// The file extension is derived from the `Content-Type` header, falling
    /// back to `suffix`.  Fails if the response status is not successful.
    pub async fn fetch_file<'a>(
        &self,
        input: impl Into<ResourceInput<'a>>,
        suffix: Option<&str>,
    ) -> Result<FetchedResource> {
        let response = self.successful_response(input.into()).await?;
        let content_type = response.mime_type();

        let suffix = content_type
            .as_deref()
            .and_then(guess_extension)
            .or(suffix)
            .unwrap_or_default();

        let file = self.store(suffix, &response.body)?;
        Ok(FetchedResource { file, content_type })
    }

    /// Retrieves an image into a new temporary file.
    ///
    /// The `Content-Type` header is trusted if it names one of the
    /// [`IMAGE_MIME_TYPES`]; otherwise the type is sniffed from the content.
    /// Content which is not recognised as an image is an error.
    pub async fn fetch_image<'a>(
        &self,
        input: impl Into<ResourceInput<'a>>,
    ) -> Result<FetchedResource> {
        let response = self.successful_response(input.into()).await?;

        let content_type = match response.mime_type() {
            Some(mime) if IMAGE_MIME_TYPES.contains(&mime.as_str()) => mime,
            declared => {
                let Some(sniffed) = sniff_image_type(&response.body) else {
                    return Err(bherror::Error::root(Error::Fetch(format!(
                        "unrecognized image content (declared \"{}\")",
                        declared.unwrap_or_default()
                    ))));
                };
                tracing::debug!(?declared, sniffed, "image type detected from content");
                sniffed.to_owned()
            }
        };

        let suffix = guess_extension(&content_type).unwrap_or_default();
        let file = self.store(suffix, &response.body)?;

        Ok(FetchedResource {
            file,
            content_type: Some(content_type),
        })
    }

    /// Retrieves a JSON document.
    pub async fn fetch_json(&self, url: &str) -> Result<Value> {
        tracing::debug!(url, "fetching JSON document");

        let response = self.get(url).await?;
        if !response.is_success() {
            return Err(
                bherror::Error::root(Error::Fetch("could not complete request".to_owned()))
                    .ctx(format!("HTTP {} from {url}", response.status)),
            );
        }

        serde_json::from_slice(&response.body)
            .foreign_err(|| Error::Fetch("invalid response content".to_owned()))
    }

    /// Retrieves a textual document, e.g. a PEM encoded key.
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        if !response.is_success() {
            return Err(
                bherror::Error::root(Error::Fetch("could not complete request".to_owned()))
                    .ctx(format!("HTTP {} from {url}", response.status)),
            );
        }

        String::from_utf8(response.body)
            .foreign_err(|| Error::Fetch("invalid response content".to_owned()))
    }

    /// Decodes the `data:` URI into a new temporary file.
    ///
    /// The returned content type is the media type of the URI.  Without an
    /// explicit `suffix` the extension is derived from the media type.
    pub fn save_data_uri(&self, data_uri: &str, suffix: Option<&str>) -> Result<FetchedResource> {
        let parsed = DataUri::parse(data_uri).with_err(|| Error::InvalidDataUri)?;
        let payload = parsed.decode().with_err(|| Error::InvalidDataUri)?;

        let media_type = parsed.media_type().to_owned();
        let suffix = suffix
            .filter(|suffix| !suffix.is_empty())
            .or_else(|| guess_extension(&media_type))
            .unwrap_or_default();

        let file = self.store(suffix, &payload)?;
        Ok(FetchedResource {
            file,
            content_type: Some(media_type),
        })
    }

    async fn successful_response(&self, input: ResourceInput<'_>) -> Result<HttpResponse> {
        match input {
            ResourceInput::Url(url) => {
                tracing::debug!(url, "fetching file");

                let response = self.get(url).await?;
                if !response.is_success() {
                    return Err(bherror::Error::root(Error::Fetch(format!(
                        "could not retrieve \"{url}\" (HTTP {})",
                        response.status
                    ))));
                }
                Ok(response)
            }
            ResourceInput::Response(response) => {
                if !response.is_success() {
                    return Err(bherror::Error::root(Error::Fetch(format!(
                        "could not retrieve resource (HTTP {})",
                        response.status
                    ))));
                }
                Ok(response)
            }
        }
    }

    fn store(&self, suffix: &str, contents: &[u8]) -> Result<TempFile> {
        TempFile::create(self.config.temp_dir.as_deref(), suffix, contents)
    }
}

/// Returns the file extension, including the leading dot, for `mime_type`.
pub fn guess_extension(mime_type: &str) -> Option<&'static str> {
    let extension = match mime_type {
        MIME_TYPE_PNG => ".png",
        MIME_TYPE_SVG => ".svg",
        MIME_TYPE_GIF => ".gif",
        MIME_TYPE_JPEG => ".jpg",
        "text/plain" => ".txt",
        "text/html" => ".html",
        "application/json" | "application/ld+json" => ".json",
        "application/pdf" => ".pdf",
        _ => return None,
    };
    Some(extension)
}

/// Detects the image format from the leading bytes of `content`.
///
/// Recognises PNG, GIF, JPEG and SVG.
pub fn sniff_image_type(content: &[u8]) -> Option<&'static str> {
    const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

    if content.starts_with(PNG_SIGNATURE) {
        Some(MIME_TYPE_PNG)
    } else if content.starts_with(b"GIF87a") || content.starts_with(b"GIF89a") {
        Some(MIME_TYPE_GIF)
    } else if content.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(MIME_TYPE_JPEG)
    } else if is_svg(content) {
        Some(MIME_TYPE_SVG)
    } else {
        None
    }
}

/// Checks whether the first element of the XML document is `<svg>`,
/// possibly namespace prefixed.
fn is_svg(content: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(content) else {
        return false;
    };
    let mut rest = text.trim_start_matches('\u{feff}');

    loop {
        rest = rest.trim_start();

        let skip_until = if rest.starts_with("<?") {
            "?>"
        } else if rest.starts_with("<!--") {
            "-->"
        } else if rest.starts_with("<!") {
            ">"
        } else {
            break;
        };

        match rest.find(skip_until) {
            Some(idx) => rest = &rest[idx + skip_until.len()..],
            None => return false,
        }
    }

    let Some(element) = rest.strip_prefix('<') else {
        return false;
    };
    let name: String = element
        .chars()
        .take_while(|c| !c.is_whitespace() && *c != '>' && *c != '/')
        .collect();

    match name.rsplit_once(':') {
        Some((_, local)) => local == "svg",
        None => name == "svg",
    }
}

/// Renders image `content` as a `base64` encoded `data:` URI.
///
/// The `content_type` is used if given, otherwise the type is sniffed.
/// Fails if neither is available.
pub fn make_image_data_uri(content: &[u8], content_type: Option<&str>) -> Result<String> {
    let mime = content_type
        .or_else(|| sniff_image_type(content))
        .ok_or_else(|| bherror::Error::root(Error::InvalidImageFormat("unknown".to_owned())))?;

    Ok(DataUri::encode(mime, content))
}
