// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered configuration for the oplog capture pipeline.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration for sinks, GeoIP enrichment and logging
//! - Consistent environment variable naming (`OPLOG_*`)
//!
//! # Usage
//!
//! ```ignore
//! use oplog_config::load_config;
//!
//! let config = load_config()?;
//! println!("Sink backend: {}", config.sink.backend);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::CaptureConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved capture configuration.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
	pub enabled: bool,
	/// Header consulted first when deriving the client IP (e.g. `cf-connecting-ip`).
	pub client_ip_header: Option<String>,
	pub user_agent_enabled: bool,
	pub geoip: Option<GeoIpConfig>,
	pub sink: SinkConfig,
	pub logging: LoggingConfig,
}

impl Default for CaptureConfig {
	fn default() -> Self {
		Self {
			enabled: true,
			client_ip_header: None,
			user_agent_enabled: true,
			geoip: None,
			sink: SinkConfig::default(),
			logging: LoggingConfig::default(),
		}
	}
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`OPLOG_*`)
/// 2. Config file (`/etc/oplog/capture.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<CaptureConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<CaptureConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<CaptureConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = CaptureConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
pub fn finalize(layer: CaptureConfigLayer) -> Result<CaptureConfig, ConfigError> {
	let client_ip_header = layer
		.client_ip_header
		.map(|h| h.trim().to_ascii_lowercase())
		.filter(|h| !h.is_empty());

	if let Some(ref header) = client_ip_header {
		validate_header_name(header)?;
	}

	let geoip = match layer.geoip {
		Some(geoip) => geoip.finalize()?,
		None => None,
	};

	let config = CaptureConfig {
		enabled: layer.enabled.unwrap_or(true),
		client_ip_header,
		user_agent_enabled: layer.user_agent_enabled.unwrap_or(true),
		geoip,
		sink: layer.sink.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	info!(
		enabled = config.enabled,
		sink_backend = %config.sink.backend,
		geoip_configured = config.geoip.is_some(),
		user_agent_enabled = config.user_agent_enabled,
		"capture configuration loaded"
	);

	Ok(config)
}

fn validate_header_name(header: &str) -> Result<(), ConfigError> {
	let valid = header
		.bytes()
		.all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
	if !valid {
		return Err(ConfigError::Validation(format!(
			"client_ip_header '{header}' is not a valid HTTP header name"
		)));
	}
	Ok(())
}
