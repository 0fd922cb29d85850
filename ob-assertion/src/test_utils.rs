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

//! Helpers for tests: an in-memory HTTP client and image fixtures.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use serde_json::Value;

use crate::{
    bakery::{bake_png, bake_svg},
    client::{HttpGetClient, HttpResponse},
    Error,
};

/// A valid 1x1 RGBA PNG image.
pub const PNG_IMAGE: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // signature
    0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4,
    0x89, // IHDR end
    0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, // IDAT
    0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4,
    0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82, // IEND
];

/// A minimal SVG image.
pub const SVG_IMAGE: &str =
    r#"<svg xmlns="http://www.w3.org/2000/svg" width="1" height="1"></svg>"#;

/// Length of the PNG signature plus the complete `IHDR` chunk.
const PNG_HEADER_LEN: usize = 8 + 4 + 4 + 13 + 4;

/// Returns [`PNG_IMAGE`] with an extra chunk inserted right after `IHDR`.
pub fn png_with_chunk(chunk_type: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut crc = flate2::Crc::new();
    crc.update(chunk_type);
    crc.update(data);

    let mut png = PNG_IMAGE[..PNG_HEADER_LEN].to_vec();
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);
    png.extend_from_slice(&crc.sum().to_be_bytes());
    png.extend_from_slice(&PNG_IMAGE[PNG_HEADER_LEN..]);
    png
}

/// Returns [`PNG_IMAGE`] baked with `assertion`.
pub fn baked_png(assertion: &str) -> Vec<u8> {
    bake_png(PNG_IMAGE, assertion).unwrap()
}

/// Returns [`SVG_IMAGE`] baked with `assertion`.
pub fn baked_svg(assertion: &str) -> String {
    bake_svg(SVG_IMAGE, assertion).unwrap()
}

/// [`HttpGetClient`] serving canned responses from memory.
///
/// Requests to URLs without a registered response fail like an unreachable
/// host.  Every requested URL is recorded.
#[derive(Debug, Clone, Default)]
pub struct MockClient {
    responses: HashMap<String, HttpResponse>,
    requested: Arc<Mutex<Vec<String>>>,
}

impl MockClient {
    /// Creates a client without any responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a response for `url`.
    pub fn with_response(
        mut self,
        url: &str,
        status: u16,
        content_type: Option<&str>,
        body: Vec<u8>,
    ) -> Self {
        self.responses.insert(
            url.to_owned(),
            HttpResponse {
                status,
                content_type: content_type.map(ToOwned::to_owned),
                body,
            },
        );
        self
    }

    /// Registers a successful JSON response for `url`.
    pub fn with_json(self, url: &str, json: Value) -> Self {
        let body = json.to_string().into_bytes();
        self.with_response(url, 200, Some("application/json"), body)
    }

    /// Registers a successful image response for `url`.
    pub fn with_image(self, url: &str, content_type: &str, body: &[u8]) -> Self {
        self.with_response(url, 200, Some(content_type), body.to_vec())
    }

    /// All URLs requested so far, in order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl HttpGetClient for MockClient {
    type Err = bherror::Error<Error>;

    async fn get(&self, url: &str) -> crate::Result<HttpResponse> {
        self.requested.lock().unwrap().push(url.to_owned());

        self.responses.get(url).cloned().ok_or_else(|| {
            bherror::Error::root(Error::Fetch(format!("no mock response for {url}")))
        })
    }
}
