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

//! Baking of assertions into PNG and SVG badge images, and their extraction.
//!
//! See the [baking specification] for the embedding formats.
//!
//! [baking specification]: https://www.imsglobal.org/sites/default/files/Badges/OBv2p0/baking/index.html

use std::io::Read as _;

use regex::Regex;
use serde_json::Value;

use crate::fetch::{sniff_image_type, MIME_TYPE_PNG, MIME_TYPE_SVG};

/// The keyword of the PNG text chunk carrying the assertion.
pub const PNG_KEYWORD: &str = "openbadges";

const PNG_SIGNATURE_LEN: usize = 8;

lazy_static::lazy_static! {
    static ref SVG_ASSERTION: Regex = Regex::new(
        r"(?s)<openbadges:assertion\b(?P<attrs>[^>]*?)(?:/>|>(?P<body>.*?)</openbadges:assertion\s*>)"
    )
    .unwrap();
    static ref SVG_VERIFY_ATTR: Regex =
        Regex::new(r#"\bverify\s*=\s*(?:"(?P<dq>[^"]*)"|'(?P<sq>[^']*)')"#).unwrap();
    static ref CDATA: Regex = Regex::new(r"(?s)<!\[CDATA\[(?P<data>.*?)\]\]>").unwrap();
    static ref SVG_ROOT: Regex =
        Regex::new(r"(?s)<svg\b(?P<attrs>[^>]*?)(?P<empty>/?)>").unwrap();
}

/// The namespace of the SVG `openbadges:assertion` element.
pub const SVG_NAMESPACE: &str = "http://openbadges.org";

/// Bakes `assertion` into the PNG `image`.
///
/// The assertion is stored uncompressed in an `iTXt` chunk right after
/// `IHDR`.  Text chunks of a previous baking are dropped.  Returns [`None`]
/// if `image` is not a well-formed PNG.
pub fn bake_png(image: &[u8], assertion: &str) -> Option<Vec<u8>> {
    if sniff_image_type(image)? != MIME_TYPE_PNG {
        return None;
    }

    let mut baked = image[..PNG_SIGNATURE_LEN].to_vec();
    let mut rest = &image[PNG_SIGNATURE_LEN..];
    let mut inserted = false;

    while rest.len() >= 12 {
        let length = u32::from_be_bytes(rest[..4].try_into().ok()?) as usize;
        let chunk_type = &rest[4..8];
        let data = rest.get(8..8usize.checked_add(length)?)?;
        let chunk = rest.get(..length.checked_add(12)?)?;

        if !is_baked_text(chunk_type, data) {
            baked.extend_from_slice(chunk);
        }
        if chunk_type == b"IHDR" && !inserted {
            write_chunk(&mut baked, b"iTXt", &international_text_data(assertion));
            inserted = true;
        }
        if chunk_type == b"IEND" {
            return inserted.then_some(baked);
        }

        rest = &rest[chunk.len()..];
    }

    None
}

/// Bakes `assertion` into the SVG `image`.
///
/// An assertion URL becomes the `verify` attribute of the
/// `openbadges:assertion` element.  Assertion JSON is stored as the element
/// content, with its `verify.url` or `id` as the `verify` attribute.  Returns
/// [`None`] if `image` has no `svg` element.
pub fn bake_svg(image: &str, assertion: &str) -> Option<String> {
    let root = SVG_ROOT.captures(image)?;
    let whole = root.get(0)?;
    let attrs = &root["attrs"];

    let mut tag = format!("<svg{attrs}");
    if !attrs.contains("xmlns:openbadges") {
        tag.push_str(&format!(r#" xmlns:openbadges="{SVG_NAMESPACE}""#));
    }
    tag.push('>');

    let (before, after) = (&image[..whole.start()], &image[whole.end()..]);
    let element = assertion_element(assertion);
    let closing = if root["empty"].is_empty() { "" } else { "</svg>" };

    Some(format!("{before}{tag}{element}{closing}{after}"))
}

fn is_baked_text(chunk_type: &[u8], data: &[u8]) -> bool {
    matches!(chunk_type, b"iTXt" | b"tEXt")
        && split_at_nul(data).is_some_and(|(keyword, _)| keyword == PNG_KEYWORD.as_bytes())
}

fn international_text_data(text: &str) -> Vec<u8> {
    let mut data = PNG_KEYWORD.as_bytes().to_vec();
    // keyword terminator, compression flag and method, empty language and
    // translated keyword
    data.extend_from_slice(&[0, 0, 0, 0, 0]);
    data.extend_from_slice(text.as_bytes());
    data
}

fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    let mut crc = flate2::Crc::new();
    crc.update(chunk_type);
    crc.update(data);

    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);
    png.extend_from_slice(&crc.sum().to_be_bytes());
}

fn assertion_element(assertion: &str) -> String {
    let Ok(Value::Object(json)) = serde_json::from_str::<Value>(assertion) else {
        return format!(
            r#"<openbadges:assertion verify="{}"/>"#,
            escape_xml(assertion)
        );
    };

    let verify = json
        .get("verify")
        .and_then(|verify| verify.get("url"))
        .or_else(|| json.get("id"))
        .and_then(Value::as_str)
        .map(|url| format!(r#" verify="{}""#, escape_xml(url)))
        .unwrap_or_default();

    let content = if assertion.contains("]]>") {
        escape_xml(assertion)
    } else {
        format!("<![CDATA[{assertion}]]>")
    };

    format!("<openbadges:assertion{verify}>{content}</openbadges:assertion>")
}

/// Returns the assertion baked into a PNG or SVG `image`, if any.
///
/// The result is the raw baked value: a hosted assertion URL, assertion
/// JSON, or a compact JWS.
pub fn unbake(image: &[u8]) -> Option<String> {
    let baked = match sniff_image_type(image)? {
        MIME_TYPE_PNG => unbake_png(image),
        MIME_TYPE_SVG => unbake_svg(std::str::from_utf8(image).ok()?),
        _ => None,
    };

    baked
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn unbake_png(png: &[u8]) -> Option<String> {
    let mut rest = png.get(PNG_SIGNATURE_LEN..)?;

    while rest.len() >= 12 {
        let length = u32::from_be_bytes(rest[..4].try_into().ok()?) as usize;
        let chunk_type = &rest[4..8];
        let data = rest.get(8..8usize.checked_add(length)?)?;

        let text = match chunk_type {
            b"iTXt" => international_text(data),
            b"tEXt" => latin1_text(data),
            b"IEND" => return None,
            _ => None,
        };
        if text.is_some() {
            return text;
        }

        // data plus CRC
        rest = rest.get(8 + length + 4..)?;
    }

    None
}

/// `keyword \0 compression-flag compression-method language \0 translated-keyword \0 text`
fn international_text(data: &[u8]) -> Option<String> {
    let (keyword, rest) = split_at_nul(data)?;
    if keyword != PNG_KEYWORD.as_bytes() || rest.len() < 2 {
        return None;
    }

    let compressed = rest[0] == 1;
    let (_language, rest) = split_at_nul(&rest[2..])?;
    let (_translated_keyword, text) = split_at_nul(rest)?;

    if compressed {
        let mut inflated = String::new();
        flate2::read::ZlibDecoder::new(text)
            .read_to_string(&mut inflated)
            .ok()?;
        Some(inflated)
    } else {
        String::from_utf8(text.to_vec()).ok()
    }
}

/// `keyword \0 text`
fn latin1_text(data: &[u8]) -> Option<String> {
    let (keyword, text) = split_at_nul(data)?;
    if keyword != PNG_KEYWORD.as_bytes() {
        return None;
    }

    Some(text.iter().map(|&byte| char::from(byte)).collect())
}

fn split_at_nul(data: &[u8]) -> Option<(&[u8], &[u8])> {
    let idx = data.iter().position(|&byte| byte == 0)?;
    Some((&data[..idx], &data[idx + 1..]))
}

fn unbake_svg(svg: &str) -> Option<String> {
    let captures = SVG_ASSERTION.captures(svg)?;

    let attrs = captures.name("attrs").map_or("", |m| m.as_str());
    if let Some(verify) = SVG_VERIFY_ATTR.captures(attrs) {
        let url = verify.name("dq").or_else(|| verify.name("sq"))?;
        return Some(unescape_xml(url.as_str()));
    }

    let body = captures.name("body")?.as_str();
    match CDATA.captures(body) {
        Some(cdata) => Some(cdata["data"].to_owned()),
        None => Some(unescape_xml(body)),
    }
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
