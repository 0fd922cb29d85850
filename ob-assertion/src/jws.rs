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

//! Compact JWS handling for signed assertions.
//!
//! Nothing in this module checks signatures.  Decoding a signed assertion
//! here only extracts its payload; authenticity is established by the
//! verification engine, which must run before the payload is trusted.

use base64::Engine as _;
use bherror::traits::ForeignError as _;
use serde_json::Value;

use crate::{Error, Result};

/// A compact JWS split into its parts, with header and payload decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactJws {
    /// The protected header.
    pub header: Value,
    /// The payload, i.e. the assertion.
    pub payload: Value,
    /// The `<header>.<payload>` string the signature was computed over.
    pub signing_input: String,
    /// The raw signature bytes.
    pub signature: Vec<u8>,
}

impl CompactJws {
    /// Splits and decodes the compact serialization `raw`.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();

        let token: jwt::Token<Value, Value, _> =
            jwt::Token::parse_unverified(raw).foreign_err(|| Error::InvalidJws)?;

        let Some((signing_input, signature)) = raw.rsplit_once('.') else {
            return Err(bherror::Error::root(Error::InvalidJws));
        };
        let signature = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(signature.trim_end_matches('='))
            .foreign_err(|| Error::InvalidJws)?;

        Ok(Self {
            header: token.header().clone(),
            payload: token.claims().clone(),
            signing_input: signing_input.to_owned(),
            signature,
        })
    }

    /// The `alg` header parameter.
    pub fn algorithm(&self) -> Option<&str> {
        self.header.get("alg").and_then(Value::as_str)
    }
}

/// Extracts the payload of a compact JWS WITHOUT verifying its signature.
pub fn decode_unverified(raw: &str) -> Result<Value> {
    tracing::warn!("decoding JWS payload without signature verification");

    let token: jwt::Token<Value, Value, _> =
        jwt::Token::parse_unverified(raw.trim()).foreign_err(|| Error::InvalidJws)?;

    Ok(token.claims().clone())
}
