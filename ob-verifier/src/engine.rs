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

//! The verification engine producing [`VerificationReport`]s.

use std::future::Future;

use ob_assertion::{
    bakery::unbake,
    detect::{detect_raw_type, DetectedType, Resolved},
    jws::CompactJws,
    recipient::{verify_recipient, Recipient},
    Fetcher, HttpGetClient, ProtocolVersion,
};
use ob_uri_utils::{authority, is_url, same_origin};
use serde::Deserialize as _;
use serde_json::Value;

use crate::{
    error::Result,
    image::{ImageValidation, ImageValidator},
    input::{BadgeInput, RecipientProfile},
    report::{MessageLevel, ReportMessage, Task, VerificationReport},
    signature::verify_jws,
    version::{detect_version, lookup, required_properties},
};

/// HTTP status of a hosted assertion removed by its issuer.
pub const HTTP_GONE: u16 = 410;

const HOSTED_VERIFICATION_TYPES: [&str; 2] = ["hosted", "HostedBadge"];

/// Interface of a badge verification engine.
///
/// The engine checks the structure, the authenticity (hosting or signature)
/// and the revocation status of a badge, and optionally whether it was issued
/// to the given recipient.  Every outcome is reported as a message of the
/// returned report; an error is returned only when no report can be made.
pub trait VerificationEngine: Sync {
    /// Verifies `input`, validating the badge image with `image_validator`.
    fn generate_report<V: ImageValidator>(
        &self,
        input: &BadgeInput,
        recipient_profile: Option<&RecipientProfile>,
        image_validator: &V,
    ) -> impl Future<Output = Result<VerificationReport>> + Send;
}

/// Built-in [`VerificationEngine`] for Open Badges 0.5 to 2.0.
///
/// Hosted assertions are authentic if they can be retrieved from their URL,
/// that URL lies within the verification scope of the issuer, and they are
/// not revoked.  Signed assertions must carry a valid `RS256` signature of a
/// key owned by the issuer and must not be on the issuer's revocation list.
#[derive(Debug, Clone)]
pub struct OpenBadgesEngine<C> {
    fetcher: Fetcher<C>,
}

/// How the authenticity of an assertion is established.
enum Delivery {
    Hosted(String),
    Signed(CompactJws),
}

/// A public key of a signed assertion.
struct IssuerKey {
    url: String,
    pem: String,
    /// The `owner` a 2.0 `CryptographicKey` claims.
    owner: Option<String>,
}

#[derive(Default)]
struct ReportBuilder {
    messages: Vec<ReportMessage>,
}

impl ReportBuilder {
    fn push(&mut self, level: MessageLevel, task: Task, result: impl Into<String>) {
        let message = ReportMessage::new(level, task, result);
        if level != MessageLevel::Info {
            tracing::warn!(
                name = %message.name,
                result = %message.result,
                %level,
                "verification issue"
            );
        }
        self.messages.push(message);
    }

    fn error(&mut self, task: Task, result: impl Into<String>) {
        self.push(MessageLevel::Error, task, result);
    }

    fn warning(&mut self, task: Task, result: impl Into<String>) {
        self.push(MessageLevel::Warning, task, result);
    }

    fn has_errors(&self) -> bool {
        self.messages
            .iter()
            .any(|message| message.message_level == MessageLevel::Error)
    }
}

impl<C: HttpGetClient> OpenBadgesEngine<C> {
    /// Creates a new engine retrieving documents with `fetcher`.
    pub fn new(fetcher: Fetcher<C>) -> Self {
        Self { fetcher }
    }

    /// The fetcher used for every remote document.
    pub fn fetcher(&self) -> &Fetcher<C> {
        &self.fetcher
    }

    async fn verify<V: ImageValidator>(
        &self,
        report: &mut ReportBuilder,
        input: &BadgeInput,
        recipient_profile: Option<&RecipientProfile>,
        image_validator: &V,
    ) -> Option<ProtocolVersion> {
        let delivery = match detect_input(input) {
            Ok(delivery) => delivery,
            Err(message) => {
                report.error(Task::DetectInputType, message);
                return None;
            }
        };

        let assertion = match &delivery {
            Delivery::Hosted(url) => self.fetch_hosted(report, url).await?,
            Delivery::Signed(jws) => jws.payload.clone(),
        };

        let Some(version) = detect_version(&assertion) else {
            report.error(
                Task::DetectAndValidateVersion,
                "Could not determine the Open Badges version of the assertion",
            );
            return None;
        };
        tracing::debug!(%version, "assertion version detected");

        for property in required_properties(version) {
            if lookup(&assertion, property).is_none() {
                report.error(
                    Task::ValidateProperty,
                    format!("Required property {property} not present in assertion"),
                );
            }
        }
        if report.has_errors() {
            return Some(version);
        }

        let badge = match self.badge_class(&assertion, version).await {
            Ok(badge) => Some(badge),
            Err(message) => {
                report.error(Task::FetchHttpNode, message);
                None
            }
        };

        let issuer = match &badge {
            Some(badge) => match self.resolve_node(badge.get("issuer"), "issuer").await {
                Ok(issuer) => Some(issuer),
                Err(message) => {
                    report.error(Task::FetchHttpNode, message);
                    None
                }
            },
            None => None,
        };

        match (&delivery, &issuer) {
            (Delivery::Hosted(url), issuer) => {
                if let Some(issuer) = issuer {
                    check_hosted_scope(report, url, &assertion, issuer, version);
                }
                check_hosted_not_revoked(report, &assertion);
            }
            (Delivery::Signed(jws), Some(issuer)) => {
                let signed = self
                    .check_signature(report, jws, &assertion, issuer, version)
                    .await;
                if signed {
                    self.check_revocation_list(report, &assertion, issuer, version)
                        .await;
                }
            }
            (Delivery::Signed(_), None) => {}
        }

        if let Some(badge) = &badge {
            match image_validator
                .validate(&self.fetcher, badge.get("image"), true)
                .await
            {
                ImageValidation::Valid { .. } | ImageValidation::Skipped => {}
                ImageValidation::Tolerated(message) => {
                    report.warning(Task::ImageValidation, message)
                }
                ImageValidation::Invalid(message) => report.error(Task::ImageValidation, message),
            }
        }

        if let Some(profile) = recipient_profile {
            check_recipient(report, &assertion, version, profile);
        }

        Some(version)
    }

    async fn fetch_hosted(&self, report: &mut ReportBuilder, url: &str) -> Option<Value> {
        let response = match self.fetcher.get(url).await {
            Ok(response) => response,
            Err(err) => {
                report.error(
                    Task::FetchHttpNode,
                    format!("Could not fetch {url} ({err})"),
                );
                return None;
            }
        };

        if response.status == HTTP_GONE {
            report.error(
                Task::VerifyHostedAssertionNotRevoked,
                format!("Assertion {url} has been revoked (HTTP {HTTP_GONE})"),
            );
            return None;
        }
        if !response.is_success() {
            report.error(
                Task::FetchHttpNode,
                format!("HTTP {} while fetching {url}", response.status),
            );
            return None;
        }

        match serde_json::from_slice::<Value>(&response.body) {
            Ok(assertion @ Value::Object(_)) => Some(assertion),
            _ => {
                report.error(
                    Task::FetchHttpNode,
                    format!("Response from {url} is not an assertion"),
                );
                None
            }
        }
    }

    /// Fetches or reads the inline document `value`.
    async fn resolve_node(
        &self,
        value: Option<&Value>,
        name: &str,
    ) -> std::result::Result<Value, String> {
        match value {
            Some(Value::String(url)) => self
                .fetcher
                .fetch_json(url)
                .await
                .map_err(|err| format!("Could not fetch {name} at {url} ({err})")),
            Some(node @ Value::Object(_)) => Ok(node.clone()),
            _ => Err(format!("Missing {name}")),
        }
    }

    async fn badge_class(
        &self,
        assertion: &Value,
        version: ProtocolVersion,
    ) -> std::result::Result<Value, String> {
        let badge = assertion.get("badge");
        match version {
            ProtocolVersion::V0_5 => match badge {
                Some(badge @ Value::Object(_)) => Ok(badge.clone()),
                _ => Err("Missing badge class".to_owned()),
            },
            _ => self.resolve_node(badge, "badge class").await,
        }
    }

    /// Checks the key ownership and the signature; `true` if both hold.
    async fn check_signature(
        &self,
        report: &mut ReportBuilder,
        jws: &CompactJws,
        assertion: &Value,
        issuer: &Value,
        version: ProtocolVersion,
    ) -> bool {
        let key = match self.issuer_key(assertion, version).await {
            Ok(key) => key,
            Err(message) => {
                report.error(Task::VerifyJws, message);
                return false;
            }
        };

        if !key_is_owned(&key, issuer, version) {
            report.error(
                Task::VerifyKeyOwnership,
                format!("Public key {} is not owned by the badge issuer", key.url),
            );
            return false;
        }

        match verify_jws(jws, key.pem.as_bytes()) {
            Ok(true) => true,
            Ok(false) => {
                report.error(
                    Task::VerifyJws,
                    format!(
                        "Signature for assertion {} failed verification",
                        assertion_id(assertion, version)
                    ),
                );
                false
            }
            Err(err) => {
                report.error(Task::VerifyJws, err.to_string());
                false
            }
        }
    }

    /// The signing key: a `CryptographicKey` document in 2.0, a PEM file in 1.x.
    async fn issuer_key(
        &self,
        assertion: &Value,
        version: ProtocolVersion,
    ) -> std::result::Result<IssuerKey, String> {
        match version {
            ProtocolVersion::V2_0 => {
                let creator = lookup(assertion, "verification.creator");
                let key = self.resolve_node(creator, "public key").await?;
                let Some(pem) = key.get("publicKeyPem").and_then(Value::as_str) else {
                    return Err("Public key document has no publicKeyPem".to_owned());
                };

                let url = key
                    .get("id")
                    .or(creator)
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let owner = key.get("owner").and_then(Value::as_str);

                Ok(IssuerKey {
                    url: url.to_owned(),
                    pem: pem.to_owned(),
                    owner: owner.map(ToOwned::to_owned),
                })
            }
            ProtocolVersion::V1_0 | ProtocolVersion::V1_1 => {
                let Some(url) = lookup(assertion, "verify.url").and_then(Value::as_str) else {
                    return Err("Missing public key".to_owned());
                };
                let pem = self
                    .fetcher
                    .fetch_text(url)
                    .await
                    .map_err(|err| format!("Could not fetch public key at {url} ({err})"))?;

                Ok(IssuerKey {
                    url: url.to_owned(),
                    pem,
                    owner: None,
                })
            }
            ProtocolVersion::V0_5 => {
                Err("Signed assertions require version 1.0 or later".to_owned())
            }
        }
    }

    async fn check_revocation_list(
        &self,
        report: &mut ReportBuilder,
        assertion: &Value,
        issuer: &Value,
        version: ProtocolVersion,
    ) {
        let Some(list) = issuer.get("revocationList").filter(|list| !list.is_null()) else {
            tracing::debug!("issuer publishes no revocation list");
            return;
        };
        let list = match self.resolve_node(Some(list), "revocation list").await {
            Ok(list) => list,
            Err(message) => {
                report.warning(Task::VerifySignedAssertionNotRevoked, message);
                return;
            }
        };

        let id = assertion_id(assertion, version);
        if let Some(reason) = revocation_reason(&list, &id, version) {
            report.error(
                Task::VerifySignedAssertionNotRevoked,
                revoked_message(&id, reason),
            );
        }
    }
}

impl<C: HttpGetClient> VerificationEngine for OpenBadgesEngine<C> {
    async fn generate_report<V: ImageValidator>(
        &self,
        input: &BadgeInput,
        recipient_profile: Option<&RecipientProfile>,
        image_validator: &V,
    ) -> Result<VerificationReport> {
        let mut builder = ReportBuilder::default();
        let version = self
            .verify(&mut builder, input, recipient_profile, image_validator)
            .await;

        let report = VerificationReport::new(builder.messages, version.map(|v| v.to_string()));
        tracing::info!(
            valid = report.valid,
            errors = report.error_count,
            warnings = report.warning_count,
            "verification report generated"
        );

        Ok(report)
    }
}

fn detect_input(input: &BadgeInput) -> std::result::Result<Delivery, String> {
    match input {
        BadgeInput::Url(url) => Ok(Delivery::Hosted(url.clone())),
        BadgeInput::Json(assertion) => delivery_of_json(assertion),
        BadgeInput::Jws(raw) => CompactJws::parse(raw)
            .map(Delivery::Signed)
            .map_err(|_| "Could not parse the signed assertion".to_owned()),
        BadgeInput::Baked(image) => {
            let baked = unbake(image).ok_or_else(|| "No assertion baked into image".to_owned())?;
            let allowed = [DetectedType::Url, DetectedType::Json, DetectedType::Jws];

            match detect_raw_type(&baked, Some(&allowed)) {
                Ok(Resolved::Url(url)) => Ok(Delivery::Hosted(url)),
                Ok(Resolved::Json(assertion)) => delivery_of_json(&assertion),
                Ok(Resolved::Jws(raw)) => CompactJws::parse(&raw)
                    .map(Delivery::Signed)
                    .map_err(|_| "Could not parse the signed assertion".to_owned()),
                Ok(Resolved::DataUri(_)) | Err(_) => {
                    Err("Could not recognise the baked assertion".to_owned())
                }
            }
        }
    }
}

/// Assertion JSON can only be verified through its hosted copy.
fn delivery_of_json(assertion: &Value) -> std::result::Result<Delivery, String> {
    let verification = assertion
        .get("verification")
        .or_else(|| assertion.get("verify"));

    let hosted = verification
        .and_then(|verification| verification.get("type"))
        .and_then(Value::as_str)
        .is_some_and(|kind| HOSTED_VERIFICATION_TYPES.contains(&kind));
    if !hosted {
        return Err("Assertion JSON is not hosted; submit the signed assertion".to_owned());
    }

    verification
        .and_then(|verification| verification.get("url"))
        .or_else(|| assertion.get("id"))
        .and_then(Value::as_str)
        .map(|url| Delivery::Hosted(url.to_owned()))
        .ok_or_else(|| "Hosted assertion JSON does not name its URL".to_owned())
}

/// Checks that the hosted assertion lives where it was retrieved from, on an
/// origin the issuer allows.
///
/// The issuer's `verification` policy may list `allowedOrigins` and URL
/// prefixes (`startsWith`).  Without a policy, only the origin of the issuer
/// itself is allowed.
fn check_hosted_scope(
    report: &mut ReportBuilder,
    requested_url: &str,
    assertion: &Value,
    issuer: &Value,
    version: ProtocolVersion,
) {
    let declared = match version {
        ProtocolVersion::V2_0 => assertion.get("id"),
        _ => lookup(assertion, "verify.url"),
    }
    .and_then(Value::as_str)
    .unwrap_or(requested_url);

    if !same_origin(requested_url, declared) {
        report.error(
            Task::HostedIdInVerificationScope,
            format!("Assertion {declared} was fetched from another origin ({requested_url})"),
        );
        return;
    }

    let policy = issuer.get("verification");
    let declared_origins = policy.and_then(|policy| policy.get("allowedOrigins"));
    let allowed_origins: Vec<String> = match declared_origins {
        Some(origins) => string_list(origins)
            .into_iter()
            .map(ToOwned::to_owned)
            .collect(),
        None => issuer_home(issuer)
            .and_then(|home| authority(home).ok())
            .into_iter()
            .collect(),
    };
    if allowed_origins.is_empty() {
        report.error(
            Task::HostedIdInVerificationScope,
            "The badge issuer does not declare its origin",
        );
        return;
    }

    let in_scope = authority(declared).is_ok_and(|declared| {
        allowed_origins
            .iter()
            .any(|origin| origin.eq_ignore_ascii_case(&declared))
    });
    if !in_scope {
        report.error(
            Task::HostedIdInVerificationScope,
            format!("Assertion {declared} is not hosted on an origin allowed by its issuer"),
        );
        return;
    }

    let Some(prefixes) = policy.and_then(|policy| policy.get("startsWith")) else {
        return;
    };
    let prefixes = string_list(prefixes);
    if !prefixes.iter().any(|prefix| declared.starts_with(prefix)) {
        report.error(
            Task::HostedIdInVerificationScope,
            format!("Assertion {declared} is not within the URL prefixes of its issuer"),
        );
    }
}

/// Whether `key` belongs to `issuer`.
///
/// A key listed in the issuer's `publicKey` is owned.  Otherwise a 2.0 key
/// must name the issuer as its `owner`, and every key must be hosted on the
/// issuer's origin.
fn key_is_owned(key: &IssuerKey, issuer: &Value, version: ProtocolVersion) -> bool {
    let listed = issuer
        .get("publicKey")
        .is_some_and(|keys| string_list(keys).contains(&key.url.as_str()));
    if listed {
        return true;
    }

    let issuer_id = issuer.get("id").and_then(Value::as_str);
    let owner_matches = match version {
        ProtocolVersion::V2_0 => key.owner.is_some() && key.owner.as_deref() == issuer_id,
        _ => true,
    };

    owner_matches && issuer_home(issuer).is_some_and(|home| same_origin(&key.url, home))
}

/// The URL identifying the issuer's web presence: a URL `id`, its `url`, or
/// the 0.5 `origin`.
fn issuer_home(issuer: &Value) -> Option<&str> {
    let property = |key: &str| issuer.get(key).and_then(Value::as_str);

    property("id")
        .filter(|id| is_url(id))
        .or_else(|| property("url"))
        .or_else(|| property("origin"))
}

/// Strings of a single or multi-valued property; objects contribute their `id`.
fn string_list(value: &Value) -> Vec<&str> {
    fn item(value: &Value) -> Option<&str> {
        match value {
            Value::Object(object) => object.get("id").and_then(Value::as_str),
            value => value.as_str(),
        }
    }

    match value {
        Value::Array(values) => values.iter().filter_map(item).collect(),
        value => item(value).into_iter().collect(),
    }
}

fn check_hosted_not_revoked(report: &mut ReportBuilder, assertion: &Value) {
    if assertion.get("revoked").and_then(Value::as_bool) != Some(true) {
        return;
    }

    let id = assertion
        .get("id")
        .or_else(|| assertion.get("uid"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let reason = assertion.get("revocationReason").and_then(Value::as_str);

    report.error(
        Task::VerifyHostedAssertionNotRevoked,
        revoked_message(id, reason),
    );
}

/// The identifier revocation lists refer to: `id` in 2.0, `uid` before.
fn assertion_id(assertion: &Value, version: ProtocolVersion) -> String {
    let key = match version {
        ProtocolVersion::V2_0 => "id",
        _ => "uid",
    };
    assertion
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned()
}

/// `Some(reason)` if `id` is revoked by the revocation `list`.
///
/// A 2.0 `RevocationList` holds `revokedAssertions`, each an id or an object
/// with `id` (or `uid`) and an optional `revocationReason`.  A 1.x list maps
/// revoked `uid`s to their reasons.
fn revocation_reason<'a>(
    list: &'a Value,
    id: &str,
    version: ProtocolVersion,
) -> Option<Option<&'a str>> {
    if id.is_empty() {
        return None;
    }

    match version {
        ProtocolVersion::V2_0 => list
            .get("revokedAssertions")?
            .as_array()?
            .iter()
            .find_map(|revoked| match revoked {
                Value::String(revoked) => (revoked.as_str() == id).then_some(None),
                Value::Object(revoked) => {
                    let matches = ["id", "uid"]
                        .iter()
                        .any(|key| revoked.get(*key).and_then(Value::as_str) == Some(id));
                    matches.then(|| revoked.get("revocationReason").and_then(Value::as_str))
                }
                _ => None,
            }),
        _ => list.get(id).map(Value::as_str),
    }
}

fn revoked_message(id: &str, reason: Option<&str>) -> String {
    match reason {
        Some(reason) if !reason.is_empty() => {
            format!("Assertion {id} has been revoked. Reason: {reason}")
        }
        _ => format!("Assertion {id} has been revoked"),
    }
}

fn check_recipient(
    report: &mut ReportBuilder,
    assertion: &Value,
    version: ProtocolVersion,
    profile: &RecipientProfile,
) {
    let recipient = match (version, assertion.get("recipient")) {
        (ProtocolVersion::V0_5, Some(Value::String(identity))) => {
            let salt = assertion.get("salt").and_then(Value::as_str);
            Some(Recipient::from_flat(identity, salt))
        }
        (_, Some(recipient)) => Recipient::deserialize(recipient).ok(),
        _ => None,
    };
    let Some(recipient) = recipient else {
        report.error(
            Task::VerifyRecipientIdentifier,
            "Could not read the assertion recipient",
        );
        return;
    };

    match verify_recipient(&recipient, &profile.email) {
        Ok(Some(_)) => {}
        Ok(None) => report.error(
            Task::VerifyRecipientIdentifier,
            "The recipient does not match any identifier of the recipient profile",
        ),
        Err(err) => report.error(Task::VerifyRecipientIdentifier, err.to_string()),
    }
}
