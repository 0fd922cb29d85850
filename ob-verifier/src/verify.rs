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

use bherror::Error;
use ob_assertion::ProtocolVersion;

use crate::{
    engine::VerificationEngine,
    error::{Result, VerificationError},
    image::{DataUriImageValidator, ImageValidator},
    input::{BadgeInput, RecipientProfile},
    report::VerificationReport,
};

/// Verifies badges with a [`VerificationEngine`] and interprets its reports.
///
/// By default badge images are checked with the [`DataUriImageValidator`],
/// which accepts images embedded as `data:` URIs and images served without a
/// `Content-Type` header.
#[derive(Debug, Clone)]
pub struct BadgeVerifier<E, V = DataUriImageValidator> {
    engine: E,
    image_validator: V,
}

impl<E: VerificationEngine> BadgeVerifier<E> {
    /// Creates a verifier using `engine` and the default image validation.
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            image_validator: DataUriImageValidator::default(),
        }
    }
}

impl<E: VerificationEngine, V: ImageValidator> BadgeVerifier<E, V> {
    /// Replaces the image validation strategy.
    pub fn with_image_validator<W: ImageValidator>(
        self,
        image_validator: W,
    ) -> BadgeVerifier<E, W> {
        BadgeVerifier {
            engine: self.engine,
            image_validator,
        }
    }

    /// The underlying engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Verifies the badge `input`, returning its protocol version.
    ///
    /// If `recipient_profile` is given, the badge must also be issued to one
    /// of its identities.  A revoked badge fails with
    /// [`VerificationError::Revoked`], any other invalid badge with
    /// [`VerificationError::Invalid`].
    pub async fn verify(
        &self,
        input: &BadgeInput,
        recipient_profile: Option<&RecipientProfile>,
    ) -> Result<ProtocolVersion> {
        let report = self
            .engine
            .generate_report(input, recipient_profile, &self.image_validator)
            .await?;

        interpret_report(&report).inspect_err(|err| {
            tracing::info!(%err, "badge verification failed");
        })
    }
}

/// Turns a [`VerificationReport`] into the verified protocol version.
pub fn interpret_report(report: &VerificationReport) -> Result<ProtocolVersion> {
    if !report.valid {
        if let Some(revocation) = report.revocation() {
            return Err(Error::root(VerificationError::Revoked(
                revocation.result.clone(),
            )));
        }

        let reasons = report
            .errors()
            .map(|message| message.result.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(Error::root(VerificationError::Invalid(reasons)));
    }

    let Some(version) = report.open_badges_version.as_deref() else {
        return Err(Error::root(VerificationError::MissingVersion));
    };

    version
        .parse()
        .map_err(|_| Error::root(VerificationError::UnsupportedVersion(version.to_owned())))
}
