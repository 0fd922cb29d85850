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

//! Open Badges 2.0: JSON-LD documents, each of which may be embedded or
//! referenced by its `id`.

use bherror::traits::PropagateError as _;
use serde_json::Value;

use super::{
    hosted_refetch, issuer_from_profile, optional_date, required_date, resolve_document,
    resolve_image, string_property, v1_0::parse_recipient,
};
use crate::{
    client::HttpGetClient,
    date::DateField,
    detect::{detect_type, DetectedType, Resolved},
    endorsement::parse_endorsements,
    error::section,
    evidence::parse_evidence,
    fetch::{Fetcher, BADGE_IMAGE_MIME_TYPES},
    record::{BadgeData, IssuerData, NormalizedAssertionRecord},
    Error, Result,
};

const HOSTED_VERIFICATION_TYPES: [&str; 2] = ["HostedBadge", "hosted"];

/// The badge class and issuer documents, kept for their endorsements.
struct BadgeDocuments {
    badge: Value,
    issuer: Value,
}

pub(super) async fn parse<C: HttpGetClient>(
    fetcher: &Fetcher<C>,
    mut assertion: Value,
) -> Result<NormalizedAssertionRecord> {
    let hosted = is_hosted(&assertion);
    if hosted {
        let url = string_property(&assertion, "id");
        assertion = hosted_refetch(fetcher, url.as_deref()).await?;
    }

    let recipient = parse_recipient(&assertion)?;
    let assertion_url = hosted.then(|| string_property(&assertion, "id")).flatten();

    let (badge, issuer, documents) = parse_badge(fetcher, assertion.get("badge"))
        .await
        .match_err(section(Error::Badge))?;

    let issued_date = required_date(&assertion, "issuedOn", DateField::IssuedDate)?;

    let evidence = match assertion.get("evidence") {
        None | Some(Value::Null) => assertion.get("narrative"),
        evidence => evidence,
    };
    let evidence = parse_evidence(fetcher, evidence).match_err(section(Error::Evidence))?;

    let expiration_date = optional_date(&assertion, "expires", DateField::ExpirationDate)?;

    let endorsements = parse_endorsements(
        fetcher,
        &[
            assertion.get("endorsement"),
            documents.badge.get("endorsement"),
            documents.issuer.get("endorsement"),
        ],
    )
    .await?;

    let id = string_property(&assertion, "uid")
        .or_else(|| string_property(&assertion, "id"))
        .unwrap_or_default();

    Ok(NormalizedAssertionRecord {
        id,
        recipient,
        assertion_url,
        badge,
        issuer,
        issued_date: Some(issued_date),
        expiration_date,
        evidence,
        endorsements,
    })
}

/// Whether the assertion's verification object asks for a hosted check.
///
/// Pre-release 2.0 assertions still use the 1.x `verify` property.
fn is_hosted(assertion: &Value) -> bool {
    assertion
        .get("verification")
        .or_else(|| assertion.get("verify"))
        .and_then(|verification| verification.get("type"))
        .and_then(Value::as_str)
        .is_some_and(|kind| HOSTED_VERIFICATION_TYPES.contains(&kind))
}

async fn parse_badge<C: HttpGetClient>(
    fetcher: &Fetcher<C>,
    badge: Option<&Value>,
) -> Result<(BadgeData, IssuerData, BadgeDocuments)> {
    let Some(badge) = badge else {
        return Err(bherror::Error::root(Error::InvalidProperty(
            "badge".to_owned(),
        )));
    };
    let badge = resolve_document(fetcher, badge).await?;

    let badge_criteria = parse_criteria(badge.get("criteria")).match_err(section(Error::Criteria))?;

    let badge_image = resolve_image(fetcher, badge.get("image"), BADGE_IMAGE_MIME_TYPES)
        .await
        .match_err(section(Error::BadgeImage))?;

    let (issuer, issuer_document) = parse_issuer(fetcher, badge.get("issuer"))
        .await
        .match_err(section(Error::Issuer))?;

    let data = BadgeData {
        badge_id: string_property(&badge, "id").unwrap_or_default(),
        badge_name: string_property(&badge, "name"),
        badge_version: String::new(),
        badge_description: string_property(&badge, "description"),
        badge_criteria,
        badge_image,
    };

    Ok((
        data,
        issuer,
        BadgeDocuments {
            badge,
            issuer: issuer_document,
        },
    ))
}

/// The narrative of an embedded `Criteria` object, or the criteria URL.
fn parse_criteria(criteria: Option<&Value>) -> Result<Option<String>> {
    let Some(criteria) = criteria.filter(|criteria| !criteria.is_null()) else {
        return Ok(None);
    };

    match detect_type(criteria, Some(&[DetectedType::Json, DetectedType::Url]))? {
        Resolved::Json(criteria) => Ok(string_property(&criteria, "narrative")),
        Resolved::Url(url) => Ok(Some(url)),
        other => Err(bherror::Error::root(Error::DisallowedType(other.kind()))),
    }
}

async fn parse_issuer<C: HttpGetClient>(
    fetcher: &Fetcher<C>,
    issuer: Option<&Value>,
) -> Result<(IssuerData, Value)> {
    let Some(issuer) = issuer else {
        return Err(bherror::Error::root(Error::InvalidProperty(
            "issuer".to_owned(),
        )));
    };
    let profile = resolve_document(fetcher, issuer).await?;
    let issuer = issuer_from_profile(&profile)?;

    Ok((issuer, profile))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use ob_uri_utils::DataUri;
    use serde_json::{json, Value};

    use crate::{
        config::FetchConfig,
        detect::OPENBADGES_CONTEXT_V2_URI,
        fetch::Fetcher,
        parser::AssertionParser,
        recipient::verify_recipient,
        test_utils::{MockClient, PNG_IMAGE, SVG_IMAGE},
        Error,
    };

    const ASSERTION_URL: &str = "https://example.org/assertions/123";
    const BADGE_URL: &str = "https://example.org/robotics-badge.json";
    const ISSUER_URL: &str = "https://example.org/organization.json";

    fn parser(client: MockClient) -> AssertionParser<MockClient> {
        AssertionParser::new(Fetcher::new(client, FetchConfig::default()))
    }

    fn inline_assertion() -> Value {
        json!({
            "@context": OPENBADGES_CONTEXT_V2_URI,
            "type": "Assertion",
            "recipient": {
                "type": "email",
                "hashed": false,
                "identity": "alice@example.org",
            },
            "issuedOn": "2016-12-31T23:59:59+00:00",
            "verification": {"type": "SignedBadge"},
            "badge": {
                "type": "BadgeClass",
                "name": "Awesome Robotics Badge",
                "description": "For doing awesome things with robots.",
                "image": DataUri::encode("image/png", PNG_IMAGE),
                "criteria": {"narrative": "Build a robot."},
                "issuer": {
                    "type": "Profile",
                    "name": "Example Issuer",
                    "url": "http://example.org",
                },
            },
            "evidence": "http://example.org/proof",
        })
    }

    fn hosted_assertion() -> Value {
        json!({
            "@context": OPENBADGES_CONTEXT_V2_URI,
            "type": "Assertion",
            "id": ASSERTION_URL,
            "recipient": {
                "type": "email",
                "hashed": true,
                "salt": "deadsea",
                "identity": "sha256$c934fdacc6242be0277a284970416aa9bfa583241fb85094bc96c504ee0abd4e",
            },
            "issuedOn": "2016-12-31T23:59:59Z",
            "expires": "2030-12-31T23:59:59Z",
            "verification": {"type": "HostedBadge"},
            "badge": BADGE_URL,
            "narrative": "Built a robot that sorts socks.",
            "endorsement": {
                "type": "Endorsement",
                "issuer": {"name": "Assertion endorser", "url": "https://endorser.org"},
                "issuedOn": "2017-01-02",
            },
        })
    }

    fn hosted_client() -> MockClient {
        MockClient::new()
            .with_json(ASSERTION_URL, hosted_assertion())
            .with_json(
                BADGE_URL,
                json!({
                    "@context": OPENBADGES_CONTEXT_V2_URI,
                    "type": "BadgeClass",
                    "id": BADGE_URL,
                    "name": "Awesome Robotics Badge",
                    "image": {"id": "https://example.org/robot.svg"},
                    "criteria": "https://example.org/robotics-badge.html",
                    "issuer": ISSUER_URL,
                    "endorsement": [{
                        "type": "Endorsement",
                        "issuer": {"name": "Badge endorser", "url": "https://badges.org"},
                    }],
                }),
            )
            .with_json(
                ISSUER_URL,
                json!({
                    "@context": OPENBADGES_CONTEXT_V2_URI,
                    "type": "Profile",
                    "id": ISSUER_URL,
                    "name": "An Example Badge Issuer",
                    "url": "https://example.org/about",
                    "email": "steved@example.org",
                    "endorsement": {
                        "type": "Endorsement",
                        "issuer": {"name": "Issuer endorser", "url": "https://issuers.org"},
                    },
                }),
            )
            .with_image(
                "https://example.org/robot.svg",
                "image/svg+xml",
                SVG_IMAGE.as_bytes(),
            )
    }

    #[tokio::test]
    async fn test_inline_assertion() {
        let record = parser(MockClient::new())
            .parse(&inline_assertion(), "2.0")
            .await
            .unwrap();

        assert_eq!(record.id, "");
        assert_eq!(record.assertion_url, None);
        assert!(!record.recipient.hashed);
        assert_eq!(record.badge.badge_id, "");
        assert_eq!(record.badge.badge_version, "");
        assert_eq!(
            record.badge.badge_criteria.as_deref(),
            Some("Build a robot.")
        );
        assert_eq!(record.badge.badge_image.read().unwrap(), PNG_IMAGE);
        assert!(record
            .badge
            .badge_image
            .path()
            .to_string_lossy()
            .ends_with(".png"));
        assert_eq!(
            record.issuer.issuer_org_origin.as_deref(),
            Some("http://example.org")
        );
        assert_eq!(record.issued_date.as_deref(), Some("2016-12-31"));
        assert_eq!(
            serde_json::to_value(&record.evidence).unwrap(),
            json!([{"hyperlink": "http://example.org/proof", "label": "", "description": ""}])
        );
        assert!(record.endorsements.is_empty());
    }

    #[tokio::test]
    async fn test_json_text_parses_like_object() {
        let parser = parser(MockClient::new());
        let assertion = inline_assertion();

        let from_object = parser.parse(&assertion, "2.0").await.unwrap();
        let from_text = parser
            .parse_str(&assertion.to_string(), "2.0")
            .await
            .unwrap();

        assert_eq!(from_text.recipient, from_object.recipient);
        assert_eq!(from_text.issuer, from_object.issuer);
        assert_eq!(
            from_text.badge.badge_criteria,
            from_object.badge.badge_criteria
        );
        assert_eq!(
            from_text.badge.badge_image.read().unwrap(),
            from_object.badge.badge_image.read().unwrap()
        );
        assert_ne!(
            from_text.badge.badge_image.path(),
            from_object.badge.badge_image.path()
        );
    }

    #[tokio::test]
    async fn test_hosted_assertion() {
        let parser = parser(hosted_client());
        let stale = json!({
            "id": ASSERTION_URL,
            "verification": {"type": "hosted"},
        });

        let record = parser.parse(&stale, "2.0").await.unwrap();

        assert_eq!(record.id, ASSERTION_URL);
        assert_eq!(record.assertion_url.as_deref(), Some(ASSERTION_URL));
        assert_eq!(
            verify_recipient(&record.recipient, &["bob@example.org", "alice@example.org"])
                .unwrap()
                .as_deref(),
            Some("alice@example.org")
        );
        assert_eq!(record.badge.badge_id, BADGE_URL);
        assert_eq!(
            record.badge.badge_criteria.as_deref(),
            Some("https://example.org/robotics-badge.html")
        );
        assert_eq!(
            record.badge.badge_image.read().unwrap(),
            SVG_IMAGE.as_bytes()
        );
        assert_eq!(
            record.issuer.issuer_org_url.as_deref(),
            Some("https://example.org/about")
        );
        assert_eq!(
            record.issuer.issuer_org_origin.as_deref(),
            Some("https://example.org")
        );
        assert_eq!(record.expiration_date.as_deref(), Some("2030-12-31"));
        assert_eq!(record.evidence.len(), 1);
        assert_eq!(
            record.evidence[0].description,
            "Built a robot that sorts socks."
        );

        let endorsers: Vec<_> = record
            .endorsements
            .iter()
            .map(|endorsement| endorsement.issuer_name.as_deref().unwrap())
            .collect();
        assert_eq!(
            endorsers,
            ["Assertion endorser", "Badge endorser", "Issuer endorser"]
        );
        assert_eq!(
            record.endorsements[0].issued_on.as_deref(),
            Some("2017-01-02")
        );
    }

    #[tokio::test]
    async fn test_hosted_assertion_by_url() {
        let record = parser(hosted_client())
            .parse_str(ASSERTION_URL, "2.0")
            .await
            .unwrap();

        assert_eq!(record.assertion_url.as_deref(), Some(ASSERTION_URL));
    }

    #[tokio::test]
    async fn test_badge_image_format() {
        let mut assertion = inline_assertion();
        assertion["badge"]["image"] = json!("data:image/gif;base64,R0lGODlh");

        let err = parser(MockClient::new())
            .parse(&assertion, "2.0")
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Error parsing badge data (invalid badge image; unhandled format \"image/gif\")"
        );
        assert_eq!(
            err.error.root_cause(),
            &Error::InvalidImageFormat("image/gif".to_owned())
        );
    }

    #[tokio::test]
    async fn test_invalid_criteria() {
        let mut assertion = inline_assertion();
        assertion["badge"]["criteria"] = json!(17);

        let err = parser(MockClient::new())
            .parse(&assertion, "2.0")
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Error parsing badge data (invalid badge criteria; unknown type)"
        );
    }

    #[tokio::test]
    async fn test_issuer_without_url() {
        let mut assertion = inline_assertion();
        assertion["badge"]["issuer"] = json!({"type": "Profile", "name": "Nameless"});

        let err = parser(MockClient::new())
            .parse(&assertion, "2.0")
            .await
            .unwrap_err();

        assert_matches!(&err.error, Error::Badge(inner) if matches!(**inner, Error::Issuer(_)));
        assert_eq!(
            err.error.root_cause(),
            &Error::InvalidProperty("url".to_owned())
        );
    }

    #[tokio::test]
    async fn test_failing_endorsement_fails_parse() {
        let mut assertion = inline_assertion();
        assertion["endorsement"] = json!("https://example.org/endorsement/404");

        let err = parser(MockClient::new())
            .parse(&assertion, "2.0")
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Error parsing endorsement (connection error)"
        );
    }

    #[tokio::test]
    async fn test_invalid_evidence() {
        let mut assertion = inline_assertion();
        assertion["evidence"] = json!({"schema:contentUrl": "nope"});

        let err = parser(MockClient::new())
            .parse(&assertion, "2.0")
            .await
            .unwrap_err();

        assert_matches!(err.error, Error::Evidence(_));
    }
}
