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

//! The normalized record every version parser produces.

use serde::Serialize;

use crate::{fetch::TempFile, recipient::Recipient};

/// Version independent view of an assertion.
///
/// The record owns the temporary files it references.  They are deleted
/// together with the record unless the caller persists them first with
/// [`TempFile::keep`].
///
/// Serializes into one flat JSON object, with temporary files rendered as
/// their paths.
#[derive(Debug, Serialize)]
pub struct NormalizedAssertionRecord {
    /// Identifier of the issuance, usable as a de-duplication key.
    pub id: String,
    /// The recipient identity claim.
    pub recipient: Recipient,
    /// URL of the hosted assertion; absent for signed assertions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assertion_url: Option<String>,
    /// The badge class.
    #[serde(flatten)]
    pub badge: BadgeData,
    /// The issuer of the badge class.
    #[serde(flatten)]
    pub issuer: IssuerData,
    /// Issue date, `YYYY-MM-DD`.
    pub issued_date: Option<String>,
    /// Expiration date, `YYYY-MM-DD`.
    pub expiration_date: Option<String>,
    /// Supporting artifacts, in document order.
    pub evidence: Vec<EvidenceItem>,
    /// Endorsements of the assertion, its badge class and its issuer.
    pub endorsements: Vec<Endorsement>,
}

/// Badge class properties of a [`NormalizedAssertionRecord`].
#[derive(Debug, Serialize)]
pub struct BadgeData {
    /// Identifier of the badge class; may be empty.
    pub badge_id: String,
    /// Name of the badge.
    pub badge_name: Option<String>,
    /// Version of the badge class; empty unless declared.
    pub badge_version: String,
    /// Description of the badge.
    pub badge_description: Option<String>,
    /// Criteria URL or narrative.
    pub badge_criteria: Option<String>,
    /// The badge image, PNG or SVG.
    pub badge_image: TempFile,
}

/// Issuer properties of a [`NormalizedAssertionRecord`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IssuerData {
    /// Name the badge was issued under.
    pub org_issued_name: Option<String>,
    /// URL of the issuer.
    pub issuer_org_url: Option<String>,
    /// Name of the issuer.
    pub issuer_org_name: Option<String>,
    /// Contact e-mail of the issuer.
    pub issuer_org_email: Option<String>,
    /// `scheme://host[:port]` of the issuer.
    pub issuer_org_origin: Option<String>,
}

/// One supporting artifact.
#[derive(Debug, Serialize)]
pub struct EvidenceItem {
    /// Link to the artifact; empty for text-only evidence.
    pub hyperlink: String,
    /// Name of the artifact.
    pub label: String,
    /// Description and narrative.
    pub description: String,
    /// Decoded embedded file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filepath: Option<TempFile>,
    /// Intended file name of [`EvidenceItem::filepath`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl EvidenceItem {
    /// Evidence consisting of a hyperlink only.
    pub fn link(hyperlink: impl Into<String>) -> Self {
        Self::new(hyperlink.into(), String::new(), String::new())
    }

    /// Evidence consisting of a description only.
    pub fn text(description: impl Into<String>) -> Self {
        Self::new(String::new(), String::new(), description.into())
    }

    pub(crate) fn new(hyperlink: String, label: String, description: String) -> Self {
        Self {
            hyperlink,
            label,
            description,
            filepath: None,
            filename: None,
        }
    }
}

/// An endorsement of the assertion, its badge class or its issuer.
#[derive(Debug, Serialize)]
pub struct Endorsement {
    /// Name of the endorser.
    pub issuer_name: Option<String>,
    /// URL of the endorser.
    pub issuer_url: Option<String>,
    /// Contact e-mail of the endorser.
    pub issuer_email: Option<String>,
    /// Image of the endorser.
    pub issuer_image: Option<TempFile>,
    /// Date of the endorsement, `YYYY-MM-DD`.
    pub issued_on: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_serialized_shape() {
        let image = TempFile::create(None, ".png", b"png").unwrap();
        let image_path = image.path().to_str().unwrap().to_owned();

        let record = NormalizedAssertionRecord {
            id: "urn:uuid:1".to_owned(),
            recipient: Recipient::from_flat("alice@example.com", None),
            assertion_url: None,
            badge: BadgeData {
                badge_id: "https://example.org/badge".to_owned(),
                badge_name: Some("Badge".to_owned()),
                badge_version: String::new(),
                badge_description: None,
                badge_criteria: Some("Do it".to_owned()),
                badge_image: image,
            },
            issuer: IssuerData {
                issuer_org_origin: Some("http://example.org".to_owned()),
                ..Default::default()
            },
            issued_date: Some("2018-01-01".to_owned()),
            expiration_date: None,
            evidence: vec![EvidenceItem::link("http://example.org/proof")],
            endorsements: Vec::new(),
        };

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "id": "urn:uuid:1",
                "recipient": {"type": "email", "identity": "alice@example.com", "hashed": false},
                "badge_id": "https://example.org/badge",
                "badge_name": "Badge",
                "badge_version": "",
                "badge_description": null,
                "badge_criteria": "Do it",
                "badge_image": image_path,
                "org_issued_name": null,
                "issuer_org_url": null,
                "issuer_org_name": null,
                "issuer_org_email": null,
                "issuer_org_origin": "http://example.org",
                "issued_date": "2018-01-01",
                "expiration_date": null,
                "evidence": [{"hyperlink": "http://example.org/proof", "label": "", "description": ""}],
                "endorsements": [],
            })
        );
    }
}
