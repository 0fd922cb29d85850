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

//! Detection of the protocol version and its required properties.

use ob_assertion::ProtocolVersion;
use serde_json::Value;

const CONTEXT_V2: &str = "w3id.org/openbadges/v2";
const CONTEXT_V1: &str = "w3id.org/openbadges/v1";

/// Detects the protocol version of the `assertion` document.
///
/// 2.0 and 1.1 declare their JSON-LD `@context`; 1.0 and 0.5 are told apart
/// by the shape of `recipient` and `badge`.
pub fn detect_version(assertion: &Value) -> Option<ProtocolVersion> {
    let context = assertion.get("@context");
    if declares_context(context, CONTEXT_V2) {
        return Some(ProtocolVersion::V2_0);
    }
    if declares_context(context, CONTEXT_V1) {
        return Some(ProtocolVersion::V1_1);
    }

    match (assertion.get("recipient"), assertion.get("badge")) {
        (Some(Value::Object(_)), Some(Value::String(_))) if assertion.get("verify").is_some() => {
            Some(ProtocolVersion::V1_0)
        }
        (Some(Value::String(_)), Some(Value::Object(_))) => Some(ProtocolVersion::V0_5),
        _ => None,
    }
}

fn declares_context(context: Option<&Value>, uri: &str) -> bool {
    match context {
        Some(Value::String(context)) => context.contains(uri),
        Some(Value::Array(contexts)) => contexts
            .iter()
            .any(|context| declares_context(Some(context), uri)),
        _ => false,
    }
}

/// Dotted paths of the properties the `version` requires in an assertion.
pub fn required_properties(version: ProtocolVersion) -> &'static [&'static str] {
    match version {
        ProtocolVersion::V0_5 => &[
            "recipient",
            "badge.name",
            "badge.description",
            "badge.image",
            "badge.criteria",
            "badge.issuer.origin",
            "badge.issuer.name",
        ],
        ProtocolVersion::V1_0 | ProtocolVersion::V1_1 => &[
            "uid",
            "recipient.identity",
            "recipient.type",
            "badge",
            "verify.type",
            "verify.url",
            "issuedOn",
        ],
        ProtocolVersion::V2_0 => &[
            "recipient.identity",
            "recipient.type",
            "badge",
            "verification.type",
            "issuedOn",
        ],
    }
}

/// The value at the dotted `path`, if present and not `null`.
pub fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |node, key| node.get(key))
        .filter(|value| !value.is_null())
}
