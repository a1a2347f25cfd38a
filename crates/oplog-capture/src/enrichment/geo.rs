// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

use async_trait::async_trait;

use crate::record::Location;

#[derive(Debug, thiserror::Error)]
pub enum GeoError {
	#[error("geo lookup timed out after {0:?}")]
	Timeout(Duration),

	#[cfg(feature = "geo-ip")]
	#[error(transparent)]
	GeoIp(#[from] oplog_geoip::GeoIpError),

	#[error("no location for {0}")]
	NotFound(String),

	#[error("geo resolver unavailable: {0}")]
	Unavailable(String),
}

/// Resolves an IP address to a [`Location`].
///
/// Implementations surface every error and never retry; the assembler
/// decides what to do with a failure.
#[async_trait]
pub trait GeoResolver: Send + Sync {
	async fn resolve(&self, ip: &str) -> Result<Location, GeoError>;
}

#[cfg(feature = "geo-ip")]
pub use maxmind::MaxMindGeoResolver;

#[cfg(feature = "geo-ip")]
mod maxmind {
	use std::sync::Arc;

	use async_trait::async_trait;
	use oplog_config::GeoIpConfig;
	use oplog_geoip::{GeoIpService, GeoLocation};
	use tracing::{debug, instrument};

	use super::{GeoError, GeoResolver};
	use crate::record::{Country, District, GeoPoint, Location};

	/// [`GeoResolver`] backed by a MaxMind GeoLite2/GeoIP2 City database.
	#[derive(Clone)]
	pub struct MaxMindGeoResolver {
		service: Arc<GeoIpService>,
	}

	impl MaxMindGeoResolver {
		pub fn new(service: GeoIpService) -> Self {
			Self {
				service: Arc::new(service),
			}
		}

		pub fn from_config(config: &GeoIpConfig) -> Result<Self, GeoError> {
			let service = GeoIpService::new(&config.database_path)?;
			debug!(path = %config.database_path, "opened GeoIP database");
			Ok(Self::new(service))
		}
	}

	impl std::fmt::Debug for MaxMindGeoResolver {
		fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
			f.debug_struct("MaxMindGeoResolver")
				.field("database_path", &self.service.database_path())
				.finish()
		}
	}

	#[async_trait]
	impl GeoResolver for MaxMindGeoResolver {
		#[instrument(skip(self), level = "debug")]
		async fn resolve(&self, ip: &str) -> Result<Location, GeoError> {
			let service = Arc::clone(&self.service);
			let ip_owned = ip.to_string();
			let found = tokio::task::spawn_blocking(move || service.lookup_str(&ip_owned))
				.await
				.map_err(|e| GeoError::Unavailable(format!("lookup task failed: {e}")))??;

			let location = location_from_geoip(&found);
			if location.is_empty() {
				return Err(GeoError::NotFound(ip.to_string()));
			}
			Ok(location)
		}
	}

	/// Country requires both code and name. District prefers the city and
	/// falls back to the region.
	pub(crate) fn location_from_geoip(found: &GeoLocation) -> Location {
		let country = match (&found.country_code, &found.country) {
			(Some(code), Some(name)) => Some(Country {
				code: code.clone(),
				name: name.clone(),
				full_name: match &found.continent {
					Some(continent) => format!("{name}, {continent}"),
					None => name.clone(),
				},
			}),
			_ => None,
		};

		let district = found
			.city
			.as_ref()
			.or(found.region.as_ref())
			.map(|name| District {
				name: name.clone(),
				full_name: found.display_string().unwrap_or_else(|| name.clone()),
			});

		let geo = found
			.coordinates()
			.map(|(lon, lat)| GeoPoint { lon, lat });

		Location {
			geo,
			country,
			district,
		}
	}

	#[cfg(test)]
	mod tests {
		use super::*;

		#[test]
		fn full_location() {
			let found = GeoLocation {
				city: Some("Mountain View".to_string()),
				region: Some("California".to_string()),
				country: Some("United States".to_string()),
				country_code: Some("US".to_string()),
				continent: Some("North America".to_string()),
				latitude: Some(37.386),
				longitude: Some(-122.0838),
			};
			let location = location_from_geoip(&found);

			let country = location.country.unwrap();
			assert_eq!(country.code, "US");
			assert_eq!(country.full_name, "United States, North America");

			let district = location.district.unwrap();
			assert_eq!(district.name, "Mountain View");
			assert_eq!(district.full_name, "Mountain View, California, United States");

			let geo = location.geo.unwrap();
			assert_eq!(geo.lat, 37.386);
			assert_eq!(geo.lon, -122.0838);
		}

		#[test]
		fn country_needs_code_and_name() {
			let found = GeoLocation {
				country_code: Some("US".to_string()),
				..Default::default()
			};
			assert!(location_from_geoip(&found).country.is_none());
		}

		#[test]
		fn district_falls_back_to_region() {
			let found = GeoLocation {
				region: Some("Bavaria".to_string()),
				country: Some("Germany".to_string()),
				..Default::default()
			};
			let district = location_from_geoip(&found).district.unwrap();
			assert_eq!(district.name, "Bavaria");
			assert_eq!(district.full_name, "Bavaria, Germany");
		}

		#[test]
		fn empty_lookup_is_empty_location() {
			assert!(location_from_geoip(&GeoLocation::default()).is_empty());
		}

		#[test]
		fn from_config_missing_database() {
			let config = GeoIpConfig {
				database_path: "/nonexistent/GeoLite2-City.mmdb".to_string(),
				timeout_ms: 200,
			};
			let err = MaxMindGeoResolver::from_config(&config).unwrap_err();
			assert!(matches!(err, GeoError::GeoIp(_)));
		}
	}
}
