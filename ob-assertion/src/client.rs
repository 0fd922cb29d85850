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

//! HTTP access used for every remote resource of an assertion.

use std::future::Future;

use bherror::traits::ForeignError as _;
use reqwest::{header::CONTENT_TYPE, Client, ClientBuilder};

use crate::{config::FetchConfig, Error, Result};

/// Response of a HTTP GET request, with the body fully read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// The HTTP status code.
    pub status: u16,
    /// The raw value of the `Content-Type` header, if present.
    pub content_type: Option<String>,
    /// The response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the status code is in the `2xx` range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The lowercased MIME type of the `Content-Type` header without parameters.
    pub fn mime_type(&self) -> Option<String> {
        self.content_type
            .as_deref()
            .and_then(|value| value.split(';').next())
            .map(|mime| mime.trim().to_ascii_lowercase())
            .filter(|mime| !mime.is_empty())
    }
}

/// Interface providing functionality of sending HTTP GET request.
///
/// The abstraction allows plugging a client which restricts the reachable
/// hosts, and lets tests run without network access.
pub trait HttpGetClient: Sync {
    /// Error type used by this trait.
    type Err: std::error::Error + Send + Sync + 'static;

    /// Performs a HTTP GET request with provided `url`.
    ///
    /// Responses with a non-success status are returned as `Ok`; only
    /// transport failures are errors.
    fn get(
        &self,
        url: &str,
    ) -> impl Future<Output = std::result::Result<HttpResponse, Self::Err>> + Send;
}

/// [`HttpGetClient`] implementation using the [`reqwest`] crate.
#[derive(Debug, Clone)]
pub struct ReqwestGetClient {
    client: Client,
    max_body_size: usize,
}

impl ReqwestGetClient {
    /// Construct [`ReqwestGetClient`] from [`Client`].
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_body_size: crate::config::DEFAULT_MAX_BODY_SIZE,
        }
    }

    /// Construct [`ReqwestGetClient`] from [`ClientBuilder`].
    pub fn from_builder(builder: ClientBuilder) -> reqwest::Result<Self> {
        Ok(Self::new(builder.build()?))
    }

    /// Construct [`ReqwestGetClient`] with timeouts, user agent and body
    /// limit taken from the [`FetchConfig`].
    pub fn from_config(config: &FetchConfig) -> reqwest::Result<Self> {
        let builder = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone());

        let mut client = Self::from_builder(builder)?;
        client.max_body_size = config.max_body_size;
        Ok(client)
    }
}

impl HttpGetClient for ReqwestGetClient {
    type Err = bherror::Error<Error>;

    async fn get(&self, url: &str) -> Result<HttpResponse> {
        tracing::debug!(url, "sending GET request");

        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .foreign_err(|| Error::Fetch("connection error".to_owned()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .foreign_err(|| Error::Fetch("could not complete request".to_owned()))?
        {
            if body.len() + chunk.len() > self.max_body_size {
                return Err(bherror::Error::root(Error::Fetch(format!(
                    "response body exceeds {} bytes",
                    self.max_body_size
                ))));
            }
            body.extend_from_slice(&chunk);
        }

        tracing::debug!(url, status, size = body.len(), "received response");

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
