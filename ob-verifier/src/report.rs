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

//! The verification report model.

use serde::{Deserialize, Serialize};

/// Severity of a [`ReportMessage`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum MessageLevel {
    /// The check failed; the report is not valid.
    Error,
    /// The check found a problem which does not invalidate the badge.
    Warning,
    /// Informational.
    Info,
}

/// The checks performed by the verification engine, named as they appear in
/// [`ReportMessage::name`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum_macros::Display, strum_macros::AsRefStr,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Task {
    /// Classifying the input as URL, JSON, JWS or baked image.
    DetectInputType,
    /// Retrieving a hosted document.
    FetchHttpNode,
    /// Detecting the protocol version of the assertion.
    DetectAndValidateVersion,
    /// Checking the presence and shape of required properties.
    ValidateProperty,
    /// Checking that a hosted assertion is hosted where its issuer allows.
    HostedIdInVerificationScope,
    /// Checking that a hosted assertion is not revoked.
    VerifyHostedAssertionNotRevoked,
    /// Checking that the signing key belongs to the issuer.
    VerifyKeyOwnership,
    /// Checking the signature of a signed assertion.
    VerifyJws,
    /// Checking that a signed assertion is not on the issuer's revocation list.
    VerifySignedAssertionNotRevoked,
    /// Validating the badge class image.
    ImageValidation,
    /// Matching the recipient against the recipient profile.
    VerifyRecipientIdentifier,
}

impl Task {
    /// Whether the task reports revocations.
    pub fn is_revocation_check(&self) -> bool {
        matches!(
            self,
            Self::VerifyHostedAssertionNotRevoked | Self::VerifySignedAssertionNotRevoked
        )
    }
}

/// A single outcome of the verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMessage {
    /// Severity of the message.
    pub message_level: MessageLevel,
    /// Symbolic name of the check, e.g. `VERIFY_HOSTED_ASSERTION_NOT_REVOKED`.
    pub name: String,
    /// Human readable explanation.
    pub result: String,
}

impl ReportMessage {
    /// Creates a message of the given `task`.
    pub fn new(message_level: MessageLevel, task: Task, result: impl Into<String>) -> Self {
        Self {
            message_level,
            name: task.to_string(),
            result: result.into(),
        }
    }

    /// Whether this is an [`MessageLevel::Error`] message of a revocation check.
    pub fn is_revocation(&self) -> bool {
        self.message_level == MessageLevel::Error
            && [
                Task::VerifyHostedAssertionNotRevoked,
                Task::VerifySignedAssertionNotRevoked,
            ]
            .iter()
            .any(|task| task.as_ref() == self.name)
    }
}

/// Outcome of the verification of a badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    /// `true` iff no [`MessageLevel::Error`] message was produced.
    pub valid: bool,
    /// All messages, in the order the checks ran.
    pub messages: Vec<ReportMessage>,
    /// The detected protocol version, e.g. `"2.0"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_badges_version: Option<String>,
    /// Number of [`MessageLevel::Error`] messages.
    pub error_count: usize,
    /// Number of [`MessageLevel::Warning`] messages.
    pub warning_count: usize,
}

impl VerificationReport {
    /// Builds the report from the `messages`, deriving validity and counts.
    pub fn new(messages: Vec<ReportMessage>, open_badges_version: Option<String>) -> Self {
        let count = |level| {
            messages
                .iter()
                .filter(|message| message.message_level == level)
                .count()
        };
        let error_count = count(MessageLevel::Error);
        let warning_count = count(MessageLevel::Warning);

        Self {
            valid: error_count == 0,
            messages,
            open_badges_version,
            error_count,
            warning_count,
        }
    }

    /// The [`MessageLevel::Error`] messages.
    pub fn errors(&self) -> impl Iterator<Item = &ReportMessage> {
        self.messages
            .iter()
            .filter(|message| message.message_level == MessageLevel::Error)
    }

    /// The first error message reporting a revocation.
    pub fn revocation(&self) -> Option<&ReportMessage> {
        self.messages.iter().find(|message| message.is_revocation())
    }
}
