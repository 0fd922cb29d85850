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

use ob_assertion::BADGE_IMAGE_MIME_TYPES;
use serde::Deserialize;

/// Settings of the image validation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VerifierOptions {
    /// Reject hosted images served without a `Content-Type` header instead of
    /// detecting the type from their content.
    pub require_content_type: bool,
    /// MIME types accepted for badge class images.
    pub image_mime_types: Vec<String>,
}

impl Default for VerifierOptions {
    fn default() -> Self {
        Self {
            require_content_type: true,
            image_mime_types: BADGE_IMAGE_MIME_TYPES
                .iter()
                .map(|mime| (*mime).to_owned())
                .collect(),
        }
    }
}

impl VerifierOptions {
    /// Whether `mime_type` is an accepted badge image type.
    pub fn accepts(&self, mime_type: &str) -> bool {
        self.image_mime_types
            .iter()
            .any(|accepted| accepted == mime_type)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_defaults() {
        let options: VerifierOptions = serde_json::from_value(json!({})).unwrap();

        assert_eq!(options, VerifierOptions::default());
        assert!(options.require_content_type);
        assert!(options.accepts("image/png"));
        assert!(options.accepts("image/svg+xml"));
        assert!(!options.accepts("image/gif"));
    }

    #[test]
    fn test_override() {
        let options: VerifierOptions = serde_json::from_value(json!({
            "require_content_type": false,
            "image_mime_types": ["image/png", "image/gif"],
        }))
        .unwrap();

        assert!(!options.require_content_type);
        assert!(options.accepts("image/gif"));
        assert!(!options.accepts("image/svg+xml"));
    }
}
