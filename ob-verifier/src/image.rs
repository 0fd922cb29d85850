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

//! Validation of the badge class image during verification.
//!
//! The check is a strategy injected into the engine.  [`HostedImageValidator`]
//! only accepts images hosted with a correct `Content-Type`, while
//! [`DataUriImageValidator`] also accepts `data:` URIs and images served
//! without a `Content-Type` header, as found in the wild.

use std::future::Future;

use ob_assertion::{make_image_data_uri, sniff_image_type, Fetcher, HttpGetClient};
use ob_uri_utils::{is_data_uri, DataUri};
use serde_json::Value;

use crate::options::VerifierOptions;

/// Outcome of an image validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageValidation {
    /// The image is acceptable; its content is kept as a `data:` URI.
    Valid {
        /// Where the image was found.
        url: String,
        /// The original resource.
        data_uri: String,
    },
    /// There is no image and none is required.
    Skipped,
    /// The image is unusable, but this does not invalidate the badge.
    Tolerated(String),
    /// The image is unusable and the badge is invalid.
    Invalid(String),
}

/// Strategy validating the `image` property of a badge class.
pub trait ImageValidator: Sync {
    /// Validates `image`, retrieving it through `fetcher` if hosted.
    ///
    /// The value is an image URL or `data:` URI, or an `Image` object with
    /// such an `id`.  A missing image is [`ImageValidation::Invalid`] only if
    /// `required`.
    fn validate<C: HttpGetClient>(
        &self,
        fetcher: &Fetcher<C>,
        image: Option<&Value>,
        required: bool,
    ) -> impl Future<Output = ImageValidation> + Send;
}

/// [`ImageValidator`] accepting only hosted images.
#[derive(Debug, Clone, Default)]
pub struct HostedImageValidator {
    options: VerifierOptions,
}

impl HostedImageValidator {
    /// Creates the validator with the given `options`.
    pub fn new(options: VerifierOptions) -> Self {
        Self { options }
    }
}

impl ImageValidator for HostedImageValidator {
    async fn validate<C: HttpGetClient>(
        &self,
        fetcher: &Fetcher<C>,
        image: Option<&Value>,
        required: bool,
    ) -> ImageValidation {
        let location = match locate(image, required) {
            Ok(location) => location,
            Err(outcome) => return outcome,
        };

        if is_data_uri(location) {
            return ImageValidation::Invalid(format!(
                "Could not fetch image at {}",
                abbreviate(location)
            ));
        }

        validate_hosted(
            fetcher,
            location,
            &self.options,
            self.options.require_content_type,
            ImageValidation::Invalid,
        )
        .await
    }
}

/// [`ImageValidator`] also accepting `data:` URIs, and hosted images without
/// a `Content-Type` header whose type is detected from the content.
///
/// Images of a type other than the accepted ones are tolerated with a
/// warning.
#[derive(Debug, Clone, Default)]
pub struct DataUriImageValidator {
    options: VerifierOptions,
}

impl DataUriImageValidator {
    /// Creates the validator with the given `options`.
    pub fn new(options: VerifierOptions) -> Self {
        Self { options }
    }
}

impl ImageValidator for DataUriImageValidator {
    async fn validate<C: HttpGetClient>(
        &self,
        fetcher: &Fetcher<C>,
        image: Option<&Value>,
        required: bool,
    ) -> ImageValidation {
        let location = match locate(image, required) {
            Ok(location) => location,
            Err(outcome) => return outcome,
        };

        if !is_data_uri(location) {
            return validate_hosted(
                fetcher,
                location,
                &self.options,
                false,
                ImageValidation::Tolerated,
            )
            .await;
        }

        match DataUri::parse(location) {
            Ok(data_uri) if self.options.accepts(data_uri.media_type()) => ImageValidation::Valid {
                url: location.to_owned(),
                data_uri: location.to_owned(),
            },
            Ok(_) => ImageValidation::Tolerated(format!(
                "Invalid image at url {}",
                abbreviate(location)
            )),
            Err(_) => ImageValidation::Invalid(format!(
                "Could not decode image at {}",
                abbreviate(location)
            )),
        }
    }
}

/// The URL or `data:` URI of the image.
fn locate(image: Option<&Value>, required: bool) -> Result<&str, ImageValidation> {
    let location = match image {
        None | Some(Value::Null) if !required => return Err(ImageValidation::Skipped),
        None | Some(Value::Null) => None,
        Some(Value::String(location)) => Some(location.as_str()),
        Some(Value::Object(image)) => image.get("id").and_then(Value::as_str),
        Some(Value::Array(_)) => {
            return Err(ImageValidation::Invalid("many images not allowed".to_owned()))
        }
        Some(_) => None,
    };

    location
        .filter(|location| !location.is_empty())
        .ok_or_else(|| ImageValidation::Invalid("Could not load and validate image".to_owned()))
}

/// Retrieves a hosted image; a type which is not accepted is reported with
/// `unaccepted`.
async fn validate_hosted<C: HttpGetClient>(
    fetcher: &Fetcher<C>,
    url: &str,
    options: &VerifierOptions,
    require_content_type: bool,
    unaccepted: fn(String) -> ImageValidation,
) -> ImageValidation {
    let response = match fetcher.get(url).await {
        Ok(response) if response.is_success() => response,
        _ => return ImageValidation::Invalid(format!("Could not fetch image at {url}")),
    };

    let content_type = match response.mime_type() {
        Some(content_type) => content_type,
        None if require_content_type => {
            return ImageValidation::Invalid(format!(
                "Image at {url} was served without a Content-Type"
            ))
        }
        None => match sniff_image_type(&response.body) {
            Some(sniffed) => {
                tracing::debug!(url, sniffed, "image type detected from content");
                sniffed.to_owned()
            }
            None => return unaccepted(format!("Invalid image at url {url}")),
        },
    };

    if !options.accepts(&content_type) {
        return unaccepted(format!("Invalid image at url {url}"));
    }

    match make_image_data_uri(&response.body, Some(&content_type)) {
        Ok(data_uri) => ImageValidation::Valid {
            url: url.to_owned(),
            data_uri,
        },
        Err(err) => ImageValidation::Invalid(err.to_string()),
    }
}

fn abbreviate(value: &str) -> String {
    const MAX_CHARS: usize = 48;

    if value.chars().count() <= MAX_CHARS {
        value.to_owned()
    } else {
        format!("{}...", value.chars().take(MAX_CHARS).collect::<String>())
    }
}
