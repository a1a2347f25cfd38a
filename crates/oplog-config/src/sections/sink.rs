// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Sink configuration section.
//!
//! Finalizing never fails on missing backend-specific fields. Required
//! fields are checked when the sink factory is constructed so that a
//! half-configured sink is rejected before anything is built.

use std::fmt;

use serde::{Deserialize, Serialize};

const DEFAULT_HTTP_METHOD: &str = "POST";
const DEFAULT_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SinkBackend {
	/// Structured console output through `tracing`.
	#[default]
	Tracing,
	/// Newline-delimited JSON appended to a file.
	File,
	/// JSON POSTed to an HTTP callback.
	Http,
}

impl SinkBackend {
	pub fn parse(value: &str) -> Option<Self> {
		match value.trim().to_ascii_lowercase().as_str() {
			"tracing" | "console" => Some(Self::Tracing),
			"file" => Some(Self::File),
			"http" | "rest" => Some(Self::Http),
			_ => None,
		}
	}
}

impl fmt::Display for SinkBackend {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			SinkBackend::Tracing => "tracing",
			SinkBackend::File => "file",
			SinkBackend::Http => "http",
		};
		write!(f, "{s}")
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SinkConfigLayer {
	pub backend: Option<SinkBackend>,
	pub path: Option<String>,
	pub url: Option<String>,
	pub method: Option<String>,
	pub headers: Option<Vec<(String, String)>>,
	pub timeout_ms: Option<u64>,
}

impl SinkConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.backend.is_some() {
			self.backend = other.backend;
		}
		if other.path.is_some() {
			self.path = other.path;
		}
		if other.url.is_some() {
			self.url = other.url;
		}
		if other.method.is_some() {
			self.method = other.method;
		}
		if other.headers.is_some() {
			self.headers = other.headers;
		}
		if other.timeout_ms.is_some() {
			self.timeout_ms = other.timeout_ms;
		}
	}

	pub fn finalize(self) -> SinkConfig {
		SinkConfig {
			backend: self.backend.unwrap_or_default(),
			path: self.path.filter(|p| !p.trim().is_empty()),
			url: self.url.filter(|u| !u.trim().is_empty()),
			method: self
				.method
				.unwrap_or_else(|| DEFAULT_HTTP_METHOD.to_string()),
			headers: self.headers.unwrap_or_default(),
			timeout_ms: self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
		}
	}
}

/// Resolved sink configuration.
///
/// # Security Note
///
/// `headers` may carry API keys for the HTTP backend, so Debug is
/// implemented by hand and redacts them.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct SinkConfig {
	pub backend: SinkBackend,
	/// Output path for the file backend. Supports `%Y %m %d %H` placeholders.
	pub path: Option<String>,
	/// Callback URL for the HTTP backend.
	pub url: Option<String>,
	pub method: String,
	pub headers: Vec<(String, String)>,
	pub timeout_ms: u64,
}

impl Default for SinkConfig {
	fn default() -> Self {
		SinkConfigLayer::default().finalize()
	}
}

impl fmt::Debug for SinkConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SinkConfig")
			.field("backend", &self.backend)
			.field("path", &self.path)
			.field("url", &self.url)
			.field("method", &self.method)
			.field(
				"headers",
				&format!("[{} header(s) REDACTED]", self.headers.len()),
			)
			.field("timeout_ms", &self.timeout_ms)
			.finish()
	}
}


#[cfg(test)]
mod proptests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn backend_display_parses_back(backend in prop_oneof![
			Just(SinkBackend::Tracing),
			Just(SinkBackend::File),
			Just(SinkBackend::Http),
		]) {
			prop_assert_eq!(SinkBackend::parse(&backend.to_string()), Some(backend));
			prop_assert_eq!(SinkBackend::parse(&backend.to_string().to_uppercase()), Some(backend));
		}

		#[test]
		fn finalize_never_keeps_blank_url(url in "[ ]{0,4}") {
			let config = SinkConfigLayer {
				url: Some(url),
				..Default::default()
			}
			.finalize();
			prop_assert!(config.url.is_none());
		}
	}
}
