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

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! This crate parses [Open Badges][1] assertions of every published protocol
//! version (0.5, 1.0, 1.1 and 2.0) into a single, version independent
//! [`NormalizedAssertionRecord`].
//!
//! [1]: https://www.imsglobal.org/spec/ob/v2p0/
//!
//! # Details
//!
//! An assertion references other documents (the badge class, the issuer
//! profile, images, endorsements) which are either embedded or hosted.  The
//! [`AssertionParser`] resolves all of them through a [`Fetcher`], which in
//! turn sends requests through the [`HttpGetClient`] trait.  A default
//! [`reqwest`] backed implementation is available as [`ReqwestGetClient`].
//!
//! Binary resources (the badge image, issuer images of endorsements, files
//! embedded in evidence) are stored in [`TempFile`]s owned by the record.
//! They are deleted when the record is dropped, unless persisted with
//! [`TempFile::keep`].
//!
//! Parsing does **not** check the authenticity of the assertion: the payload
//! of a signed assertion is decoded without verifying the signature.  The
//! assertion must be verified beforehand, and the protocol version reported
//! by that verification is passed to [`AssertionParser::parse`].
//!
//! # Examples
//!
//! ```no_run
//! use ob_assertion::{AssertionParser, FetchConfig, Fetcher, ReqwestGetClient};
//!
//! # async fn run() -> ob_assertion::Result<()> {
//! let config = FetchConfig::default();
//! let client = ReqwestGetClient::from_config(&config).unwrap();
//! let parser = AssertionParser::new(Fetcher::new(client, config));
//!
//! let record = parser
//!     .parse_str("https://example.org/assertions/123", "2.0")
//!     .await?;
//!
//! // Move the badge image out of the temporary directory.
//! let image_path = record.badge.badge_image.keep()?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod fetch;
mod parser;
mod record;

pub mod bakery;
pub mod date;
pub mod detect;
pub mod endorsement;
pub mod evidence;
pub mod jws;
pub mod recipient;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use client::*;
pub use config::*;
pub use error::*;
pub use fetch::*;
pub use parser::*;
pub use record::*;
