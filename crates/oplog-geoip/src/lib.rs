// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! IP geolocation for oplog records.
//!
//! Lookups are served from a local MaxMind GeoLite2/GeoIP2 City database
//! whose path comes from the capture configuration.
//!
//! # Usage
//!
//! ```ignore
//! use oplog_geoip::GeoIpService;
//!
//! let service = GeoIpService::new("/var/lib/geoip/GeoLite2-City.mmdb")?;
//! let location = service.lookup_str("8.8.8.8")?;
//! println!("{:?} / {:?}", location.country_code, location.city);
//! ```

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use maxminddb::{geoip2, Reader};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum GeoIpError {
	#[error("GeoIP database not found at path: {0}")]
	DatabaseNotFound(String),

	#[error("Failed to open GeoIP database: {0}")]
	DatabaseOpen(#[source] maxminddb::MaxMindDBError),

	#[error("Failed to lookup IP address: {0}")]
	Lookup(#[source] maxminddb::MaxMindDBError),

	#[error("Invalid IP address: {0}")]
	InvalidIp(String),
}

pub type Result<T> = std::result::Result<T, GeoIpError>;

/// Location data for one address. Every field is optional because the
/// database coverage varies per network.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct GeoLocation {
	pub city: Option<String>,
	pub region: Option<String>,
	pub country: Option<String>,
	pub country_code: Option<String>,
	pub continent: Option<String>,
	pub latitude: Option<f64>,
	pub longitude: Option<f64>,
}

impl GeoLocation {
	/// Most specific place name first, e.g. `"Mountain View, California, United States"`.
	pub fn display_string(&self) -> Option<String> {
		let parts: Vec<&str> = [&self.city, &self.region, &self.country]
			.into_iter()
			.filter_map(|p| p.as_deref())
			.collect();
		if parts.is_empty() {
			None
		} else {
			Some(parts.join(", "))
		}
	}

	pub fn coordinates(&self) -> Option<(f64, f64)> {
		match (self.longitude, self.latitude) {
			(Some(lon), Some(lat)) => Some((lon, lat)),
			_ => None,
		}
	}
}

pub struct GeoIpService {
	reader: Arc<Reader<Vec<u8>>>,
	database_path: String,
}

impl std::fmt::Debug for GeoIpService {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GeoIpService")
			.field("database_path", &self.database_path)
			.finish()
	}
}

impl GeoIpService {
	#[tracing::instrument(level = "info", skip(database_path), fields(path))]
	pub fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
		let path = database_path.as_ref();
		let path_str = path.display().to_string();
		tracing::Span::current().record("path", &path_str);

		if !path.exists() {
			return Err(GeoIpError::DatabaseNotFound(path_str));
		}

		let reader = Reader::open_readfile(path).map_err(GeoIpError::DatabaseOpen)?;

		tracing::info!(
			database_type = %reader.metadata.database_type,
			"GeoIP database loaded"
		);

		Ok(Self {
			reader: Arc::new(reader),
			database_path: path_str,
		})
	}

	pub fn database_path(&self) -> &str {
		&self.database_path
	}

	#[tracing::instrument(level = "trace", skip(self), fields(ip = %ip))]
	pub fn lookup(&self, ip: IpAddr) -> Result<GeoLocation> {
		let city: geoip2::City = self.reader.lookup(ip).map_err(GeoIpError::Lookup)?;

		// First subdivision is the state/province level.
		let region = city
			.subdivisions
			.as_ref()
			.and_then(|subs| subs.first())
			.and_then(|sub| english_name(sub.names.as_ref()));

		Ok(GeoLocation {
			city: city.city.as_ref().and_then(|c| english_name(c.names.as_ref())),
			region,
			country: city
				.country
				.as_ref()
				.and_then(|c| english_name(c.names.as_ref())),
			country_code: city
				.country
				.as_ref()
				.and_then(|c| c.iso_code)
				.map(String::from),
			continent: city
				.continent
				.as_ref()
				.and_then(|c| english_name(c.names.as_ref())),
			latitude: city.location.as_ref().and_then(|l| l.latitude),
			longitude: city.location.as_ref().and_then(|l| l.longitude),
		})
	}

	#[tracing::instrument(level = "trace", skip(self), fields(ip = %ip_str))]
	pub fn lookup_str(&self, ip_str: &str) -> Result<GeoLocation> {
		let ip: IpAddr = ip_str
			.trim()
			.parse()
			.map_err(|_| GeoIpError::InvalidIp(ip_str.to_string()))?;
		self.lookup(ip)
	}
}

fn english_name(names: Option<&BTreeMap<&str, &str>>) -> Option<String> {
	names.and_then(|n| n.get("en").copied()).map(String::from)
}


#[cfg(test)]
mod proptests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn test_display_does_not_panic(
			city in proptest::option::of("[a-zA-Z ]{1,50}"),
			region in proptest::option::of("[a-zA-Z ]{1,50}"),
			country in proptest::option::of("[a-zA-Z ]{1,50}")
		) {
			let loc = GeoLocation {
				city,
				region,
				country,
				..Default::default()
			};
			let _ = loc.display_string();
		}

		/// Property: display contains every populated place name
		#[test]
		fn test_display_contains_all_parts(
			city in "[a-zA-Z]{1,30}",
			region in "[a-zA-Z]{1,30}",
			country in "[a-zA-Z]{1,30}",
		) {
			let loc = GeoLocation {
				city: Some(city.clone()),
				region: Some(region.clone()),
				country: Some(country.clone()),
				..Default::default()
			};
			let display = loc.display_string().unwrap();
			prop_assert!(display.contains(&city));
			prop_assert!(display.contains(&region));
			prop_assert!(display.contains(&country));
		}
	}
}
