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

//! Open Badges 1.0 and 1.1: the badge class and the issuer are hosted
//! documents referenced by URL.

use bherror::traits::{ForeignError as _, PropagateError as _};
use serde::Deserialize as _;
use serde_json::Value;

use super::{
    hosted_refetch, issuer_from_profile, optional_date, required_date, resolve_document,
    resolve_image, string_or_id, string_property,
};
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

    let recipient = parse_recipient(&assertion)?;
    let assertion_url = hosted_url(&assertion).flatten();

    let (badge, issuer) = parse_badge(fetcher, assertion.get("badge"))
        .await
        .match_err(section(Error::Badge))?;

    let issued_date = required_date(&assertion, "issuedOn", DateField::IssuedDate)?;

    let evidence =
        parse_evidence(fetcher, assertion.get("evidence")).match_err(section(Error::Evidence))?;

    let expiration_date = optional_date(&assertion, "expires", DateField::ExpirationDate)?;

    Ok(NormalizedAssertionRecord {
        id: string_property(&assertion, "uid").unwrap_or_default(),
        recipient,
        assertion_url,
        badge,
        issuer,
        issued_date: Some(issued_date),
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

pub(super) fn parse_recipient(assertion: &Value) -> Result<Recipient> {
    let Some(recipient) = assertion.get("recipient") else {
        return Err(bherror::Error::root(Error::InvalidProperty(
            "recipient".to_owned(),
        )));
    };

    Recipient::deserialize(recipient)
        .foreign_err(|| Error::InvalidProperty("recipient".to_owned()))
}

async fn parse_badge<C: HttpGetClient>(
    fetcher: &Fetcher<C>,
    badge: Option<&Value>,
) -> Result<(BadgeData, IssuerData)> {
    let Some(badge_url) = badge.and_then(Value::as_str) else {
        return Err(bherror::Error::root(Error::InvalidProperty(
            "badge".to_owned(),
        )));
    };
    let badge = fetcher.fetch_json(badge_url).await?;

    let badge_image = resolve_image(fetcher, badge.get("image"), BADGE_IMAGE_MIME_TYPES)
        .await
        .match_err(section(Error::BadgeImage))?;

    let issuer = parse_issuer(fetcher, badge.get("issuer"))
        .await
        .match_err(section(Error::Issuer))?;

    let badge = BadgeData {
        // 1.1 badge classes carry an `id`; 1.0 ones are identified by their URL
        badge_id: string_property(&badge, "id").unwrap_or_else(|| badge_url.to_owned()),
        badge_name: string_property(&badge, "name"),
        badge_version: string_property(&badge, "version").unwrap_or_default(),
        badge_description: string_property(&badge, "description"),
        badge_criteria: string_or_id(&badge, "criteria"),
        badge_image,
    };

    Ok((badge, issuer))
}

async fn parse_issuer<C: HttpGetClient>(
    fetcher: &Fetcher<C>,
    issuer: Option<&Value>,
) -> Result<IssuerData> {
    let Some(issuer) = issuer else {
        return Err(bherror::Error::root(Error::InvalidProperty(
            "issuer".to_owned(),
        )));
    };
    let profile = resolve_document(fetcher, issuer).await?;

    issuer_from_profile(&profile)
}
