// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Lazy, at-most-once sink construction.
//!
//! [`SinkFactory`] validates the sink configuration when it is created, so a
//! missing required field fails before any sink exists. The sink itself is
//! built on first use inside a [`OnceCell`]; concurrent first callers block on
//! the same initialization and all observe the same instance.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use oplog_config::{SinkBackend, SinkConfig};
use tracing::{debug, instrument};

use crate::error::{CaptureError, CaptureResult, SinkError};
use crate::sink::LogSink;

pub type SinkBuilder = dyn Fn(&SinkConfig) -> Result<Arc<dyn LogSink>, SinkError> + Send + Sync;

const HTTP_METHODS: &[&str] = &["POST", "PUT", "PATCH"];

pub struct SinkFactory {
	config: SinkConfig,
	builder: Box<SinkBuilder>,
	sink: OnceCell<Arc<dyn LogSink>>,
}

impl SinkFactory {
	/// Factory for the configured reference backend.
	pub fn new(config: SinkConfig) -> CaptureResult<Self> {
		Self::with_builder(config, build_sink)
	}

	/// Factory with injected construction. The configuration is still
	/// validated before `builder` can ever run.
	pub fn with_builder<F>(config: SinkConfig, builder: F) -> CaptureResult<Self>
	where
		F: Fn(&SinkConfig) -> Result<Arc<dyn LogSink>, SinkError> + Send + Sync + 'static,
	{
		validate_sink_config(&config)?;
		Ok(Self {
			config,
			builder: Box::new(builder),
			sink: OnceCell::new(),
		})
	}

	/// Factory around an already constructed sink.
	pub fn from_sink(config: SinkConfig, sink: Arc<dyn LogSink>) -> Self {
		Self {
			config,
			builder: Box::new(|_: &SinkConfig| Err(SinkError::Permanent("sink already provided".to_string()))),
			sink: OnceCell::with_value(sink),
		}
	}

	pub fn config(&self) -> &SinkConfig {
		&self.config
	}

	pub fn is_initialized(&self) -> bool {
		self.sink.get().is_some()
	}

	/// Return the sink, building it on first use.
	///
	/// A failed build leaves the cell empty and is reported to the caller.
	#[instrument(skip(self), fields(backend = %self.config.backend))]
	pub fn get_or_create(&self) -> CaptureResult<Arc<dyn LogSink>> {
		self
			.sink
			.get_or_try_init(|| {
				debug!("constructing log sink");
				(self.builder)(&self.config).map_err(|source| CaptureError::SinkBuild {
					backend: self.config.backend.to_string(),
					source,
				})
			})
			.cloned()
	}
}

impl std::fmt::Debug for SinkFactory {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SinkFactory")
			.field("config", &self.config)
			.field("initialized", &self.is_initialized())
			.finish()
	}
}

/// Check the fields the configured backend requires.
pub fn validate_sink_config(config: &SinkConfig) -> CaptureResult<()> {
	match config.backend {
		SinkBackend::Tracing => Ok(()),
		SinkBackend::File => match config.path.as_deref() {
			Some(path) if !path.trim().is_empty() => Ok(()),
			_ => Err(CaptureError::Config(
				"file sink requires sink.path".to_string(),
			)),
		},
		SinkBackend::Http => {
			let url = config
				.url
				.as_deref()
				.filter(|u| !u.trim().is_empty())
				.ok_or_else(|| CaptureError::Config("http sink requires sink.url".to_string()))?;

			let parsed = url::Url::parse(url)
				.map_err(|e| CaptureError::Config(format!("invalid sink.url '{url}': {e}")))?;
			if !matches!(parsed.scheme(), "http" | "https") {
				return Err(CaptureError::Config(format!(
					"sink.url must use http or https, got '{}'",
					parsed.scheme()
				)));
			}

			if !HTTP_METHODS
				.iter()
				.any(|m| m.eq_ignore_ascii_case(&config.method))
			{
				return Err(CaptureError::Config(format!(
					"unsupported sink.method '{}' (expected one of {})",
					config.method,
					HTTP_METHODS.join(", ")
				)));
			}

			if config.timeout_ms == 0 {
				return Err(CaptureError::Config(
					"sink.timeout_ms must be greater than zero".to_string(),
				));
			}

			Ok(())
		}
	}
}

/// Construct the reference sink for `config.backend`.
///
/// A backend whose cargo feature is disabled is a permanent build error.
pub fn build_sink(config: &SinkConfig) -> Result<Arc<dyn LogSink>, SinkError> {
	match config.backend {
		#[cfg(feature = "sink-tracing")]
		SinkBackend::Tracing => Ok(Arc::new(crate::sink::tracing::TracingLogSink::new())),

		#[cfg(feature = "sink-file")]
		SinkBackend::File => {
			let path = config
				.path
				.clone()
				.ok_or_else(|| SinkError::Permanent("file sink requires a path".to_string()))?;
			Ok(Arc::new(crate::sink::file::FileLogSink::new(path)))
		}

		#[cfg(feature = "sink-http")]
		SinkBackend::Http => Ok(Arc::new(crate::sink::http::HttpLogSink::new(config)?)),

		#[allow(unreachable_patterns)]
		other => Err(SinkError::Permanent(format!(
			"sink backend '{other}' is not compiled in"
		))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::record::LogRecord;
	use crate::sink::HandleStatus;
	use async_trait::async_trait;
	use std::sync::atomic::{AtomicUsize, Ordering};

	struct NullSink;

	#[async_trait]
	impl LogSink for NullSink {
		fn name(&self) -> &str {
			"null"
		}

		async fn handle(&self, _record: Arc<LogRecord>) -> HandleStatus {
			HandleStatus::Success
		}
	}

	fn null_sink() -> Arc<dyn LogSink> {
		Arc::new(NullSink)
	}

	fn file_config(path: Option<&str>) -> SinkConfig {
		SinkConfig {
			backend: SinkBackend::File,
			path: path.map(str::to_string),
			..Default::default()
		}
	}

	fn http_config(url: Option<&str>) -> SinkConfig {
		SinkConfig {
			backend: SinkBackend::Http,
			url: url.map(str::to_string),
			..Default::default()
		}
	}

	mod validation {
		use super::*;

		#[test]
		fn tracing_needs_nothing() {
			assert!(validate_sink_config(&SinkConfig::default()).is_ok());
		}

		#[test]
		fn file_requires_path() {
			assert!(matches!(
				validate_sink_config(&file_config(None)),
				Err(CaptureError::Config(_))
			));
			assert!(validate_sink_config(&file_config(Some("  "))).is_err());
			assert!(validate_sink_config(&file_config(Some("/var/log/oplog.jsonl"))).is_ok());
		}

		#[test]
		fn http_requires_url() {
			assert!(validate_sink_config(&http_config(None)).is_err());
			assert!(validate_sink_config(&http_config(Some("https://logs.example.com"))).is_ok());
		}

		#[test]
		fn http_rejects_other_schemes() {
			let err = validate_sink_config(&http_config(Some("ftp://logs.example.com"))).unwrap_err();
			assert!(err.to_string().contains("http or https"));
			assert!(validate_sink_config(&http_config(Some("not a url"))).is_err());
		}

		#[test]
		fn http_method_and_timeout() {
			let mut config = http_config(Some("https://logs.example.com"));
			config.method = "put".to_string();
			assert!(validate_sink_config(&config).is_ok());

			config.method = "GET".to_string();
			assert!(validate_sink_config(&config).is_err());

			config.method = "POST".to_string();
			config.timeout_ms = 0;
			assert!(validate_sink_config(&config).is_err());
		}
	}

	#[test]
	fn missing_field_never_invokes_builder() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();
		let result = SinkFactory::with_builder(file_config(None), move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
			Ok(null_sink())
		});

		assert!(matches!(result, Err(CaptureError::Config(_))));
		assert_eq!(calls.load(Ordering::SeqCst), 0);
	}

	#[test]
	fn builds_once() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();
		let factory = SinkFactory::with_builder(SinkConfig::default(), move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
			Ok(null_sink())
		})
		.unwrap();

		assert!(!factory.is_initialized());
		let first = factory.get_or_create().unwrap();
		let second = factory.get_or_create().unwrap();
		assert!(Arc::ptr_eq(&first, &second));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert!(factory.is_initialized());
	}

	#[test]
	fn build_failure_is_reported_and_retried_on_next_use() {
		let calls = Arc::new(AtomicUsize::new(0));
		let counter = calls.clone();
		let factory = SinkFactory::with_builder(SinkConfig::default(), move |_| {
			counter.fetch_add(1, Ordering::SeqCst);
			Err(SinkError::Transient("backend down".to_string()))
		})
		.unwrap();

		let Err(err) = factory.get_or_create() else {
			panic!("expected build failure");
		};
		assert!(matches!(err, CaptureError::SinkBuild { .. }));
		assert!(factory.get_or_create().is_err());
		assert_eq!(calls.load(Ordering::SeqCst), 2);
		assert!(!factory.is_initialized());
	}

	#[cfg(feature = "sink-tracing")]
	#[test]
	fn default_backend_builds_tracing_sink() {
		let factory = SinkFactory::new(SinkConfig::default()).unwrap();
		assert_eq!(factory.get_or_create().unwrap().name(), "tracing");
	}

	#[cfg(feature = "sink-file")]
	#[test]
	fn file_backend_builds_file_sink() {
		let factory = SinkFactory::new(file_config(Some("/tmp/oplog-%Y.jsonl"))).unwrap();
		assert_eq!(factory.get_or_create().unwrap().name(), "file");
	}

	#[cfg(not(feature = "sink-http"))]
	#[test]
	fn uncompiled_backend_fails_to_build() {
		let factory = SinkFactory::new(http_config(Some("https://logs.example.com"))).unwrap();
		let Err(err) = factory.get_or_create() else {
			panic!("expected build failure");
		};
		assert!(err.to_string().contains("not compiled in"));
	}

	#[test]
	fn from_sink_is_initialized() {
		let factory = SinkFactory::from_sink(SinkConfig::default(), null_sink());
		assert!(factory.is_initialized());
		assert_eq!(factory.get_or_create().unwrap().name(), "null");
	}
}
