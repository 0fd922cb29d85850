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

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;

/// Default timeout of a single request, including reading the body.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default upper bound on the size of a downloaded body.
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Default `User-Agent` header sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("ob-assertion/", env!("CARGO_PKG_VERSION"));

/// Settings for retrieving remote resources and storing them locally.
///
/// The structure can be deserialized from a configuration file; every field
/// is optional and falls back to its default.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Timeout of a single request, in seconds when deserialized.
    #[serde(with = "seconds")]
    pub timeout: Duration,
    /// Timeout for establishing a connection, in seconds when deserialized.
    #[serde(with = "seconds")]
    pub connect_timeout: Duration,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
    /// Bodies larger than this are rejected.
    pub max_body_size: usize,
    /// Directory for downloaded files; the system temporary directory if unset.
    pub temp_dir: Option<PathBuf>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            temp_dir: None,
        }
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
