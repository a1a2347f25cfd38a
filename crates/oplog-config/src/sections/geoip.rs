// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! GeoIP configuration section.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 200;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GeoIpConfigLayer {
	pub database_path: Option<String>,
	pub timeout_ms: Option<u64>,
}

impl GeoIpConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.database_path.is_some() {
			self.database_path = other.database_path;
		}
		if other.timeout_ms.is_some() {
			self.timeout_ms = other.timeout_ms;
		}
	}

	/// Returns `None` when no database is configured, which disables geo
	/// enrichment entirely. A zero lookup timeout is rejected.
	pub fn finalize(self) -> Result<Option<GeoIpConfig>, ConfigError> {
		let timeout_ms = self.timeout_ms.unwrap_or(DEFAULT_LOOKUP_TIMEOUT_MS);
		if timeout_ms == 0 {
			return Err(ConfigError::InvalidValue {
				key: "geoip.timeout_ms".to_string(),
				message: "must be greater than zero".to_string(),
			});
		}
		Ok(self
			.database_path
			.filter(|p| !p.trim().is_empty())
			.map(|database_path| GeoIpConfig {
				database_path,
				timeout_ms,
			}))
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeoIpConfig {
	pub database_path: String,
	pub timeout_ms: u64,
}
