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

//! This crate verifies [Open Badges][1] assertions before they are parsed.
//!
//! [1]: https://www.imsglobal.org/spec/ob/v2p0/
//!
//! # Details
//!
//! A [`VerificationEngine`] checks a badge and describes the outcome in a
//! [`VerificationReport`].  The built-in [`OpenBadgesEngine`] checks that
//!
//! - the assertion has a known protocol version and its required properties,
//! - a hosted assertion can be retrieved and is not revoked,
//! - a hosted assertion lives on an origin its issuer allows,
//! - a signed assertion carries a valid `RS256` signature by a key its issuer
//!   owns, and is not on the issuer's revocation list,
//! - the badge class image is acceptable, and
//! - the badge was issued to the expected recipient, if one is given.
//!
//! The [`BadgeVerifier`] turns the report into the verified
//! [`ProtocolVersion`](ob_assertion::ProtocolVersion), which is then passed
//! to the [`AssertionParser`](ob_assertion::AssertionParser).  Revocation
//! is reported as [`VerificationError::Revoked`], distinct from the other
//! failures.
//!
//! # Examples
//!
//! ```no_run
//! use ob_assertion::{AssertionParser, FetchConfig, Fetcher, ReqwestGetClient};
//! use ob_verifier::{BadgeInput, BadgeVerifier, OpenBadgesEngine};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FetchConfig::default();
//! let client = ReqwestGetClient::from_config(&config)?;
//! let fetcher = Fetcher::new(client, config);
//!
//! let url = "https://example.org/assertions/123";
//! let verifier = BadgeVerifier::new(OpenBadgesEngine::new(fetcher.clone()));
//! let version = verifier
//!     .verify(&BadgeInput::Url(url.to_owned()), None)
//!     .await?;
//!
//! let record = AssertionParser::new(fetcher)
//!     .parse_str(url, version.as_str())
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod engine;
mod error;
mod image;
mod input;
mod options;
mod report;
mod signature;
mod verify;
mod version;

pub use engine::*;
pub use error::*;
pub use image::*;
pub use input::*;
pub use options::*;
pub use report::*;
pub use signature::{verify_jws, RS256};
pub use verify::*;
pub use version::*;
