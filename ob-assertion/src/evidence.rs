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

//! Parsing of the `evidence` property.

use std::path::Path;

use ob_uri_utils::is_url;
use serde_json::{Map, Value};

use crate::{client::HttpGetClient, fetch::Fetcher, record::EvidenceItem, Result};

/// Property of a structured evidence holding an embedded file.
pub const CONTENT_URL_PROPERTY: &str = "schema:contentUrl";
/// Property of a structured evidence holding the file name of the embedded file.
pub const ALTERNATE_NAME_PROPERTY: &str = "schema:alternateName";

/// Shape of an evidence value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ContentNode<'a> {
    /// A list of evidence values, possibly of mixed shapes.
    List(&'a [Value]),
    /// A URL of the evidence.
    LinkRef(&'a str),
    /// A textual description.
    PlainText(&'a str),
    /// An `Evidence` object.
    Structured(&'a Map<String, Value>),
    /// No evidence: absent, `null`, or an empty string, list or object.
    Empty,
    /// A value no evidence can be read from, e.g. a number.
    Unsupported(&'a Value),
}

impl<'a> ContentNode<'a> {
    /// Classifies the evidence `value`.
    pub fn classify(value: Option<&'a Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Empty,
            Some(Value::Array(items)) if items.is_empty() => Self::Empty,
            Some(Value::Array(items)) => Self::List(items),
            Some(Value::String(text)) if text.is_empty() => Self::Empty,
            Some(Value::String(text)) if is_url(text) => Self::LinkRef(text),
            Some(Value::String(text)) => Self::PlainText(text),
            Some(Value::Object(object)) if object.is_empty() => Self::Empty,
            Some(Value::Object(object)) => Self::Structured(object),
            Some(other) => Self::Unsupported(other),
        }
    }
}

/// Parses `content` into evidence items, preserving document order.
///
/// Lists are flattened recursively; a URL becomes a hyperlink, any other
/// string a description, and an `Evidence` object a labelled item whose
/// description joins `description` and `narrative`.  An object embedding a
/// file as a `data:` URI in `schema:contentUrl` has the file decoded into a
/// temporary file, named after `schema:alternateName`.
pub fn parse_evidence<C: HttpGetClient>(
    fetcher: &Fetcher<C>,
    content: Option<&Value>,
) -> Result<Vec<EvidenceItem>> {
    let mut items = Vec::new();
    collect(fetcher, ContentNode::classify(content), &mut items)?;
    Ok(items)
}

fn collect<C: HttpGetClient>(
    fetcher: &Fetcher<C>,
    node: ContentNode<'_>,
    items: &mut Vec<EvidenceItem>,
) -> Result<()> {
    match node {
        ContentNode::List(values) => {
            for value in values {
                collect(fetcher, ContentNode::classify(Some(value)), items)?;
            }
        }
        ContentNode::LinkRef(url) => items.push(EvidenceItem::link(url)),
        ContentNode::PlainText(text) => items.push(EvidenceItem::text(text)),
        ContentNode::Structured(object) => items.push(structured(fetcher, object)?),
        ContentNode::Empty => {}
        ContentNode::Unsupported(value) => {
            tracing::warn!(%value, "ignoring evidence of unsupported shape");
        }
    }
    Ok(())
}

fn structured<C: HttpGetClient>(
    fetcher: &Fetcher<C>,
    object: &Map<String, Value>,
) -> Result<EvidenceItem> {
    let description = text(object, "description");
    let narrative = text(object, "narrative");

    let description = match (description.is_empty(), narrative.is_empty()) {
        (false, false) => format!("{description}\n\n{narrative}"),
        (true, false) => narrative,
        _ => description,
    };
    let label = text(object, "name");

    let data_uri = text(object, CONTENT_URL_PROPERTY);
    if data_uri.is_empty() {
        return Ok(EvidenceItem::new(text(object, "id"), label, description));
    }

    let filename = text(object, ALTERNATE_NAME_PROPERTY);
    let suffix = Path::new(&filename)
        .extension()
        .map(|extension| format!(".{}", extension.to_string_lossy()));

    let saved = fetcher.save_data_uri(&data_uri, suffix.as_deref())?;

    let mut item = EvidenceItem::new(String::new(), label, description);
    item.filepath = Some(saved.file);
    item.filename = Some(filename);
    Ok(item)
}

fn text(object: &Map<String, Value>, key: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}
