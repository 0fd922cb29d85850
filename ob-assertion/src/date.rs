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

//! Normalization of assertion dates.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::{Error, Result};

/// Output format of normalized dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%z",
    "%Y-%m-%d %H:%M%:z",
];

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// The date property being normalized, used in error messages.
#[derive(strum_macros::Display, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    /// `issuedOn`.
    #[strum(to_string = "issued date")]
    IssuedDate,
    /// `expires`.
    #[strum(to_string = "expiration date")]
    ExpirationDate,
    /// `issuedOn` of an endorsement.
    #[strum(to_string = "endorsement date")]
    EndorsementDate,
}

/// Normalizes a date property to `YYYY-MM-DD`.
///
/// Accepts ISO 8601 date-times with or without an offset (`Z` included),
/// plain dates in extended (`2018-01-01`) or basic (`20180101`) format and
/// Unix timestamps in seconds, possibly fractional, as a number or a string.
/// The date is taken in the offset the value was written in.
pub fn normalize_date(value: &Value, field: DateField) -> Result<String> {
    let date = match value {
        Value::Number(number) => number.as_f64().and_then(from_timestamp),
        Value::String(text) => parse_date(text.trim()),
        _ => None,
    };

    match date {
        Some(date) => Ok(date.format(DATE_FORMAT).to_string()),
        None => {
            let shown = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            Err(bherror::Error::root(Error::DateParse(field, shown)))
        }
    }
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    if let Some(date) = basic_date(text) {
        return Some(date);
    }

    if is_timestamp(text) {
        return text.parse().ok().and_then(from_timestamp);
    }

    if let Ok(date_time) = DateTime::parse_from_rfc3339(text) {
        return Some(date_time.date_naive());
    }

    let text = utc_designator_as_offset(text);
    OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(&text, format).ok())
        .map(|date_time| date_time.date_naive())
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(&text, format).ok())
                .map(|date_time| date_time.date())
        })
        .or_else(|| NaiveDate::parse_from_str(&text, DATE_FORMAT).ok())
}

/// The date of an ISO 8601 basic value, `YYYYMMDD` optionally followed by a
/// `T` and a time.
fn basic_date(text: &str) -> Option<NaiveDate> {
    let (date, time) = match text.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (text, None),
    };
    if date.len() != 8 || !is_digits(date) || time.is_some_and(str::is_empty) {
        return None;
    }

    let year = date[..4].parse().ok()?;
    let month = date[4..6].parse().ok()?;
    let day = date[6..].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|byte| byte.is_ascii_digit())
}

/// `<digits>` or `<digits>.<digits>`.
fn is_timestamp(text: &str) -> bool {
    match text.split_once('.') {
        Some((seconds, fraction)) => is_digits(seconds) && is_digits(fraction),
        None => is_digits(text),
    }
}

/// Rewrites a trailing `Z` to `+00:00`, which the `%z` formats require.
fn utc_designator_as_offset(text: &str) -> Cow<'_, str> {
    match text.strip_suffix(['Z', 'z']) {
        Some(local) => Cow::Owned(format!("{local}+00:00")),
        None => Cow::Borrowed(text),
    }
}

fn from_timestamp(seconds: f64) -> Option<NaiveDate> {
    if !seconds.is_finite() {
        return None;
    }

    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9) as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
        .map(|date_time| date_time.date_naive())
}
