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

//! Parsing of Open Badges 2.0 endorsements.

use bherror::traits::PropagateError as _;
use futures::future::try_join_all;
use serde_json::Value;

use crate::{
    client::HttpGetClient,
    date::DateField,
    error::section,
    fetch::{Fetcher, IMAGE_MIME_TYPES},
    parser::{optional_date, resolve_document, resolve_image, string_property},
    record::Endorsement,
    Error, Result,
};

/// Parses every endorsement found in `sources`, in order.
///
/// Each source may be a single endorsement (URL or inline object) or an
/// arbitrarily nested list of them.  Endorsements are resolved concurrently;
/// the first failure aborts the whole parse.
pub async fn parse_endorsements<C: HttpGetClient>(
    fetcher: &Fetcher<C>,
    sources: &[Option<&Value>],
) -> Result<Vec<Endorsement>> {
    let mut nodes = Vec::new();
    for source in sources.iter().copied().flatten() {
        flatten(source, &mut nodes);
    }

    if !nodes.is_empty() {
        tracing::debug!(count = nodes.len(), "resolving endorsements");
    }

    try_join_all(nodes.into_iter().map(|node| async move {
        parse_endorsement(fetcher, node)
            .await
            .match_err(section(Error::Endorsement))
    }))
    .await
}

fn flatten<'a>(value: &'a Value, nodes: &mut Vec<&'a Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| flatten(item, nodes)),
        Value::Null => {}
        Value::String(text) if text.is_empty() => {}
        other => nodes.push(other),
    }
}

async fn parse_endorsement<C: HttpGetClient>(
    fetcher: &Fetcher<C>,
    node: &Value,
) -> Result<Endorsement> {
    let endorsement = resolve_document(fetcher, node).await?;

    let Some(issuer) = endorsement.get("issuer") else {
        return Err(bherror::Error::root(Error::InvalidProperty(
            "issuer".to_owned(),
        )));
    };
    let profile = resolve_document(fetcher, issuer)
        .await
        .match_err(section(Error::Issuer))?;

    let issuer_image = match profile.get("image") {
        None | Some(Value::Null) => None,
        image => Some(resolve_image(fetcher, image, IMAGE_MIME_TYPES).await?),
    };

    let issued_on = optional_date(&endorsement, "issuedOn", DateField::EndorsementDate)?;

    Ok(Endorsement {
        issuer_name: string_property(&profile, "name"),
        issuer_url: string_property(&profile, "url"),
        issuer_email: string_property(&profile, "email"),
        issuer_image,
        issued_on,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use ob_uri_utils::DataUri;
    use serde_json::json;

    use super::*;
    use crate::{
        config::FetchConfig,
        test_utils::{MockClient, PNG_IMAGE},
    };

    fn fetcher(client: MockClient) -> Fetcher<MockClient> {
        Fetcher::new(client, FetchConfig::default())
    }

    fn endorsement(issuer: Value, issued_on: &str) -> Value {
        json!({
            "type": "Endorsement",
            "claim": {"id": "https://example.org/badge", "endorsementComment": "Great"},
            "issuer": issuer,
            "issuedOn": issued_on,
        })
    }

    #[tokio::test]
    async fn test_no_endorsements() {
        let fetcher = fetcher(MockClient::new());

        assert!(parse_endorsements(&fetcher, &[None, Some(&json!([])), Some(&json!(null))])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_inline_and_referenced() {
        let client = MockClient::new()
            .with_json(
                "https://endorser.org/endorsement/1",
                endorsement(json!("https://endorser.org/profile"), "2018-02-03T00:00:00Z"),
            )
            .with_json(
                "https://endorser.org/profile",
                json!({
                    "name": "Endorser",
                    "url": "https://endorser.org",
                    "email": "info@endorser.org",
                    "image": "https://endorser.org/logo.gif",
                }),
            )
            .with_image("https://endorser.org/logo.gif", "image/gif", b"GIF89a");
        let fetcher = fetcher(client);

        let inline = endorsement(
            json!({"name": "Inline", "url": "https://inline.org"}),
            "2018-01-01",
        );
        let assertion_endorsements = json!(["https://endorser.org/endorsement/1"]);

        let endorsements = parse_endorsements(
            &fetcher,
            &[Some(&assertion_endorsements), None, Some(&inline)],
        )
        .await
        .unwrap();

        assert_eq!(endorsements.len(), 2);

        let first = &endorsements[0];
        assert_eq!(first.issuer_name.as_deref(), Some("Endorser"));
        assert_eq!(first.issuer_url.as_deref(), Some("https://endorser.org"));
        assert_eq!(first.issuer_email.as_deref(), Some("info@endorser.org"));
        assert_eq!(first.issued_on.as_deref(), Some("2018-02-03"));
        let image = first.issuer_image.as_ref().unwrap();
        assert!(image.path().to_string_lossy().ends_with(".gif"));

        let second = &endorsements[1];
        assert_eq!(second.issuer_name.as_deref(), Some("Inline"));
        assert_eq!(second.issuer_email, None);
        assert!(second.issuer_image.is_none());
        assert_eq!(second.issued_on.as_deref(), Some("2018-01-01"));
    }

    #[tokio::test]
    async fn test_data_uri_image() {
        let fetcher = fetcher(MockClient::new());
        let node = endorsement(
            json!({"name": "E", "image": DataUri::encode("image/png", PNG_IMAGE)}),
            "2018-01-01",
        );

        let endorsements = parse_endorsements(&fetcher, &[Some(&node)]).await.unwrap();

        let image = endorsements[0].issuer_image.as_ref().unwrap();
        assert_eq!(image.read().unwrap(), PNG_IMAGE);
    }

    #[tokio::test]
    async fn test_bad_image_fails_parse() {
        let client = MockClient::new().with_image(
            "https://endorser.org/logo.bmp",
            "image/bmp",
            b"BM\x00\x00",
        );
        let fetcher = fetcher(client);
        let node = endorsement(
            json!({"name": "E", "image": "https://endorser.org/logo.bmp"}),
            "2018-01-01",
        );

        let err = parse_endorsements(&fetcher, &[Some(&node)])
            .await
            .unwrap_err();

        assert_matches!(err.error, Error::Endorsement(_));
        assert_matches!(err.error.root_cause(), Error::Fetch(_));
    }

    #[tokio::test]
    async fn test_disallowed_image_type() {
        let fetcher = fetcher(MockClient::new());
        let node = endorsement(
            json!({"name": "E", "image": "data:image/webp;base64,UklGRg=="}),
            "2018-01-01",
        );

        let err = parse_endorsements(&fetcher, &[Some(&node)])
            .await
            .unwrap_err();

        assert_eq!(
            err.error.root_cause(),
            &Error::InvalidImageFormat("image/webp".to_owned())
        );
        assert!(err.to_string().starts_with("Error parsing endorsement ("));
    }

    #[tokio::test]
    async fn test_missing_issuer() {
        let fetcher = fetcher(MockClient::new());
        let node = json!({"type": "Endorsement", "claim": {}});

        let err = parse_endorsements(&fetcher, &[Some(&node)])
            .await
            .unwrap_err();

        assert_eq!(
            err.error.root_cause(),
            &Error::InvalidProperty("issuer".to_owned())
        );
    }
}
