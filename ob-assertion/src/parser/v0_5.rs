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

//! Open Badges 0.5: badge and issuer are inline, the recipient is a flat
//! string with a top-level salt.

use bherror::traits::PropagateError as _;
use ob_uri_utils::resolve;
use serde_json::Value;

use super::{hosted_refetch, optional_date, resolve_image, string_property};
use crate::{
    client::HttpGetClient,
    date::DateField,
    error::section,
    evidence::parse_evidence,
    fetch::{Fetcher, BADGE_IMAGE_MIME_TYPES},
    record::{BadgeData, IssuerData, NormalizedAssertionRecord},
    recipient::Recipient,
    Error, Result,
};

pub(super) async fn parse<C: HttpGetClient>(
    fetcher: &Fetcher<C>,
    mut assertion: Value,
) -> Result<NormalizedAssertionRecord> {
    if let Some(url) = hosted_url(&assertion) {
        assertion = hosted_refetch(fetcher, url.as_deref()).await?;
    }

    let Some(identity) = string_property(&assertion, "recipient") else {
        return Err(bherror::Error::root(Error::InvalidProperty(
            "recipient".to_owned(),
        )));
    };
    let salt = string_property(&assertion, "salt");
    let recipient = Recipient::from_flat(&identity, salt.as_deref());

    let assertion_url = hosted_url(&assertion).flatten();

    let (badge, issuer) = parse_badge(fetcher, assertion.get("badge").unwrap_or(&Value::Null))
        .await
        .match_err(section(Error::Badge))?;

    let evidence =
        parse_evidence(fetcher, assertion.get("evidence")).match_err(section(Error::Evidence))?;

    let expiration_date = optional_date(&assertion, "expires", DateField::ExpirationDate)?;
    let issued_date = match optional_date(&assertion, "issuedOn", DateField::IssuedDate)? {
        Some(date) => Some(date),
        None => optional_date(&assertion, "issued_on", DateField::IssuedDate)?,
    };

    Ok(NormalizedAssertionRecord {
        id: string_property(&assertion, "uid").unwrap_or_default(),
        recipient,
        assertion_url,
        badge,
        issuer,
        issued_date,
        expiration_date,
        evidence,
        endorsements: Vec::new(),
    })
}

/// `Some(verify.url)` if the assertion declares itself hosted.
fn hosted_url(assertion: &Value) -> Option<Option<String>> {
    let verify = assertion.get("verify")?;
    (verify.get("type").and_then(Value::as_str) == Some("hosted"))
        .then(|| string_property(verify, "url"))
}

async fn parse_badge<C: HttpGetClient>(
    fetcher: &Fetcher<C>,
    badge: &Value,
) -> Result<(BadgeData, IssuerData)> {
    if !badge.is_object() {
        return Err(bherror::Error::root(Error::InvalidProperty(
            "badge".to_owned(),
        )));
    }
    let issuer = badge.get("issuer").unwrap_or(&Value::Null);
    let issuer_origin = string_property(issuer, "origin");

    // Images may be given relative to the issuer origin.
    let image = match (badge.get("image"), issuer_origin.as_deref()) {
        (Some(Value::String(image)), Some(origin)) => resolve(origin, image)
            .map(Value::String)
            .unwrap_or_else(|_| Value::String(image.clone())),
        (image, _) => image.cloned().unwrap_or(Value::Null),
    };
    let badge_image = resolve_image(fetcher, Some(&image), BADGE_IMAGE_MIME_TYPES)
        .await
        .match_err(section(Error::BadgeImage))?;

    let issuer = parse_issuer(issuer).match_err(section(Error::Issuer))?;

    let badge = BadgeData {
        badge_id: string_property(badge, "uid").unwrap_or_default(),
        badge_name: string_property(badge, "name"),
        badge_version: string_property(badge, "version").unwrap_or_default(),
        badge_description: string_property(badge, "description"),
        badge_criteria: string_property(badge, "criteria"),
        badge_image,
    };

    Ok((badge, issuer))
}

fn parse_issuer(issuer: &Value) -> Result<IssuerData> {
    let Some(origin) = string_property(issuer, "origin") else {
        return Err(bherror::Error::root(Error::InvalidProperty(
            "origin".to_owned(),
        )));
    };
    let name = string_property(issuer, "name");

    Ok(IssuerData {
        org_issued_name: name.clone(),
        issuer_org_url: Some(origin.clone()),
        issuer_org_name: name,
        issuer_org_email: string_property(issuer, "contact"),
        issuer_org_origin: Some(origin),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use crate::{
        config::FetchConfig,
        fetch::Fetcher,
        parser::AssertionParser,
        recipient::{identity_hash, verify_recipient, Sha256},
        test_utils::{MockClient, PNG_IMAGE},
        Error,
    };

    const BADGE_IMAGE_URL: &str = "http://p2pu.org/img/beta.png";

    fn assertion(recipient: &str) -> serde_json::Value {
        json!({
            "recipient": recipient,
            "salt": "deadsea",
            "evidence": "/evidence/1",
            "expires": "2030-01-01",
            "issued_on": "2012-05-01",
            "badge": {
                "version": "0.5.0",
                "name": "Open Source Contributor",
                "image": "/img/beta.png",
                "description": "For rocking in the free world",
                "criteria": "http://example.org/criteria",
                "issuer": {
                    "origin": "http://p2pu.org",
                    "name": "P2PU",
                    "org": "School of Webcraft",
                    "contact": "admin@p2pu.org",
                },
            },
        })
    }

    fn parser(client: MockClient) -> AssertionParser<MockClient> {
        AssertionParser::new(Fetcher::new(client, FetchConfig::default()))
    }

    fn image_client() -> MockClient {
        MockClient::new().with_image(BADGE_IMAGE_URL, "image/png", PNG_IMAGE)
    }

    #[tokio::test]
    async fn test_signed_assertion() {
        let identity = identity_hash("bimmy@example.com", "deadsea", &Sha256).unwrap();
        let parser = parser(image_client());

        let record = parser.parse(&assertion(&identity), "0.5").await.unwrap();

        assert_eq!(record.id, "");
        assert_eq!(record.assertion_url, None);
        assert!(record.recipient.hashed);
        assert_eq!(
            verify_recipient(&record.recipient, &["bimmy@example.com"]).unwrap(),
            Some("bimmy@example.com".to_owned())
        );
        assert_eq!(
            record.badge.badge_name.as_deref(),
            Some("Open Source Contributor")
        );
        assert_eq!(record.badge.badge_version, "0.5.0");
        assert_eq!(record.badge.badge_image.read().unwrap(), PNG_IMAGE);
        assert_eq!(
            record.issuer.issuer_org_origin.as_deref(),
            Some("http://p2pu.org")
        );
        assert_eq!(
            record.issuer.issuer_org_url.as_deref(),
            Some("http://p2pu.org")
        );
        assert_eq!(
            record.issuer.issuer_org_email.as_deref(),
            Some("admin@p2pu.org")
        );
        assert_eq!(record.issuer.org_issued_name.as_deref(), Some("P2PU"));
        assert_eq!(record.issued_date.as_deref(), Some("2012-05-01"));
        assert_eq!(record.expiration_date.as_deref(), Some("2030-01-01"));
        assert_eq!(record.evidence.len(), 1);
        assert_eq!(record.evidence[0].description, "/evidence/1");
        assert!(record.endorsements.is_empty());
    }

    #[tokio::test]
    async fn test_plaintext_recipient() {
        let record = parser(image_client())
            .parse(&assertion("bimmy@example.com"), "0.5")
            .await
            .unwrap();

        assert!(!record.recipient.hashed);
        assert_eq!(record.recipient.identity, "bimmy@example.com");
    }

    #[tokio::test]
    async fn test_json_text_parses_like_object() {
        let identity = identity_hash("bimmy@example.com", "deadsea", &Sha256).unwrap();
        let assertion = assertion(&identity);
        let parser = parser(image_client());

        let from_object = parser.parse(&assertion, "0.5").await.unwrap();
        let from_text = parser
            .parse_str(&assertion.to_string(), "0.5")
            .await
            .unwrap();

        assert_eq!(from_text.recipient, from_object.recipient);
        assert_eq!(from_text.issuer, from_object.issuer);
        assert_eq!(from_text.badge.badge_name, from_object.badge.badge_name);
        assert_eq!(from_text.badge.badge_version, "0.5.0");
        assert_eq!(from_text.issued_date, from_object.issued_date);
        assert_eq!(from_text.expiration_date, from_object.expiration_date);
        assert_eq!(from_text.evidence.len(), from_object.evidence.len());
        assert_eq!(
            from_text.badge.badge_image.read().unwrap(),
            from_object.badge.badge_image.read().unwrap()
        );
    }

    #[tokio::test]
    async fn test_hosted_assertion_is_refetched() {
        let mut hosted = assertion("bimmy@example.com");
        hosted["uid"] = json!("abc-1");
        hosted["verify"] = json!({"type": "hosted", "url": "http://p2pu.org/assertions/1"});

        let client = MockClient::new()
            .with_json("http://p2pu.org/assertions/1", hosted)
            .with_image(BADGE_IMAGE_URL, "image/png", PNG_IMAGE);
        let parser = parser(client);

        let stale = json!({"verify": {"type": "hosted", "url": "http://p2pu.org/assertions/1"}});
        let record = parser.parse(&stale, "0.5").await.unwrap();

        assert_eq!(record.id, "abc-1");
        assert_eq!(
            record.assertion_url.as_deref(),
            Some("http://p2pu.org/assertions/1")
        );
        assert_eq!(
            parser
                .fetcher()
                .client()
                .requested()
                .first()
                .map(String::as_str),
            Some("http://p2pu.org/assertions/1")
        );
    }

    #[tokio::test]
    async fn test_image_failure_is_wrapped() {
        let client = MockClient::new().with_image(BADGE_IMAGE_URL, "image/gif", b"GIF89a");

        let err = parser(client)
            .parse(&assertion("bimmy@example.com"), "0.5")
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Error parsing badge data (invalid badge image; unhandled format \"image/gif\")"
        );
    }

    #[tokio::test]
    async fn test_invalid_date() {
        let client = image_client();
        let mut raw = assertion("bimmy@example.com");
        raw["expires"] = json!("someday");

        let err = parser(client).parse(&raw, "0.5").await.unwrap_err();

        assert_matches!(err.error, Error::DateParse(crate::date::DateField::ExpirationDate, _));
    }
}
