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

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A badge as submitted for verification.
#[derive(Debug, Clone, PartialEq)]
pub enum BadgeInput {
    /// URL of a hosted assertion.
    Url(String),
    /// Assertion JSON.
    Json(Value),
    /// Compact JWS of a signed assertion.
    Jws(String),
    /// Content of a PNG or SVG image with a baked assertion.
    Baked(Vec<u8>),
}

impl BadgeInput {
    /// Classifies textual input as a URL, assertion JSON or a JWS.
    ///
    /// Anything else is kept as [`BadgeInput::Jws`] and rejected by the
    /// engine.
    pub fn from_text(text: &str) -> Self {
        let text = text.trim();

        if ob_uri_utils::is_url(text) {
            return Self::Url(text.to_owned());
        }
        match serde_json::from_str::<Value>(text) {
            Ok(json @ Value::Object(_)) => Self::Json(json),
            _ => Self::Jws(text.to_owned()),
        }
    }
}

/// Identities of the user claiming the badge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientProfile {
    /// Verified email addresses.
    #[serde(default, deserialize_with = "one_or_many")]
    pub email: Vec<String>,
}

impl RecipientProfile {
    /// Creates a profile with the given verified `emails`.
    pub fn with_emails<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            email: emails.into_iter().map(Into::into).collect(),
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(email) => vec![email],
        OneOrMany::Many(emails) => emails,
    })
}
