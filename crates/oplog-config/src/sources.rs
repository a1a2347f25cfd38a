// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::CaptureConfigLayer;
use crate::sections::{GeoIpConfigLayer, LoggingConfigLayer, SinkBackend, SinkConfigLayer};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<CaptureConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<CaptureConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(CaptureConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/oplog/capture.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<CaptureConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(CaptureConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: CaptureConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: OPLOG_<SECTION>_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<CaptureConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(CaptureConfigLayer {
			enabled: env_bool("OPLOG_ENABLED"),
			client_ip_header: env_var("OPLOG_CLIENT_IP_HEADER"),
			user_agent_enabled: env_bool("OPLOG_USER_AGENT_ENABLED"),
			geoip: Some(load_geoip_from_env()?),
			sink: Some(load_sink_from_env()?),
			logging: Some(load_logging_from_env()),
		})
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_bool(name: &str) -> Option<bool> {
	env_var(name).map(|v| v.eq_ignore_ascii_case("true") || v == "1")
}

fn env_u64(name: &str) -> Result<Option<u64>, ConfigError> {
	match env_var(name) {
		Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid u64 value '{v}'"),
		}),
		None => Ok(None),
	}
}

fn load_geoip_from_env() -> Result<GeoIpConfigLayer, ConfigError> {
	Ok(GeoIpConfigLayer {
		database_path: env_var("OPLOG_GEOIP_DATABASE_PATH"),
		timeout_ms: env_u64("OPLOG_GEOIP_TIMEOUT_MS")?,
	})
}

fn load_sink_from_env() -> Result<SinkConfigLayer, ConfigError> {
	let backend = match env_var("OPLOG_SINK_BACKEND") {
		Some(v) => Some(
			SinkBackend::parse(&v).ok_or_else(|| ConfigError::InvalidValue {
				key: "OPLOG_SINK_BACKEND".to_string(),
				message: format!("unknown sink backend '{v}'"),
			})?,
		),
		None => None,
	};

	Ok(SinkConfigLayer {
		backend,
		path: env_var("OPLOG_SINK_PATH"),
		url: env_var("OPLOG_SINK_URL"),
		method: env_var("OPLOG_SINK_METHOD"),
		headers: None,
		timeout_ms: env_u64("OPLOG_SINK_TIMEOUT_MS")?,
	})
}

fn load_logging_from_env() -> LoggingConfigLayer {
	LoggingConfigLayer {
		level: env_var("OPLOG_LOG_LEVEL"),
	}
}
