// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use oplog_config::SinkConfig;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};
use tracing::{debug, warn};

use crate::error::SinkError;
use crate::record::LogRecord;
use crate::sink::{HandleStatus, LogSink};

/// Posts each record as JSON to a callback URL.
///
/// Delivery is spawned on the runtime and `handle` returns
/// [`HandleStatus::Submitted`] without waiting for the response.
pub struct HttpLogSink {
	client: Client,
	url: String,
	method: Method,
	headers: HeaderMap,
}

impl HttpLogSink {
	pub fn new(config: &SinkConfig) -> Result<Self, SinkError> {
		let url = config
			.url
			.clone()
			.ok_or_else(|| SinkError::Permanent("http sink requires a url".to_string()))?;

		let method = Method::from_bytes(config.method.to_ascii_uppercase().as_bytes())
			.map_err(|e| SinkError::Permanent(format!("invalid method '{}': {e}", config.method)))?;

		let mut headers = HeaderMap::new();
		for (name, value) in &config.headers {
			let name = HeaderName::from_bytes(name.as_bytes())
				.map_err(|e| SinkError::Permanent(format!("invalid header name '{name}': {e}")))?;
			let value = HeaderValue::from_str(value)
				.map_err(|e| SinkError::Permanent(format!("invalid value for header '{name}': {e}")))?;
			headers.insert(name, value);
		}

		let client = Client::builder()
			.timeout(Duration::from_millis(config.timeout_ms))
			.build()
			.map_err(|e| SinkError::Permanent(format!("failed to build HTTP client: {e}")))?;

		Ok(Self {
			client,
			url,
			method,
			headers,
		})
	}

	pub fn url(&self) -> &str {
		&self.url
	}

	async fn deliver(
		client: Client,
		url: String,
		method: Method,
		headers: HeaderMap,
		body: Vec<u8>,
	) -> Result<(), SinkError> {
		let response = client
			.request(method, &url)
			.headers(headers)
			.header(CONTENT_TYPE, "application/json")
			.body(body)
			.send()
			.await
			.map_err(|e| SinkError::Transient(format!("request failed: {e}")))?;

		let status = response.status();
		if status.is_success() {
			Ok(())
		} else if status.is_server_error() || status.as_u16() == 429 {
			Err(SinkError::Transient(format!("server returned {status}")))
		} else {
			Err(SinkError::Permanent(format!("server returned {status}")))
		}
	}
}

impl std::fmt::Debug for HttpLogSink {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("HttpLogSink")
			.field("url", &self.url)
			.field("method", &self.method)
			.field("headers", &format!("[{} header(s) REDACTED]", self.headers.len()))
			.finish()
	}
}

#[async_trait]
impl LogSink for HttpLogSink {
	fn name(&self) -> &str {
		"http"
	}

	async fn handle(&self, record: Arc<LogRecord>) -> HandleStatus {
		let body = match serde_json::to_vec(&*record) {
			Ok(body) => body,
			Err(e) => {
				warn!(sink = "http", record_id = %record.id, error = %e, "failed to serialize record");
				return HandleStatus::Failure;
			}
		};

		let client = self.client.clone();
		let url = self.url.clone();
		let method = self.method.clone();
		let headers = self.headers.clone();
		let record_id = record.id;

		tokio::spawn(async move {
			match Self::deliver(client, url, method, headers, body).await {
				Ok(()) => debug!(sink = "http", %record_id, "record delivered"),
				Err(e) => warn!(sink = "http", %record_id, error = %e, "record delivery failed"),
			}
		});

		HandleStatus::Submitted
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use oplog_config::SinkBackend;

	fn config(url: &str) -> SinkConfig {
		SinkConfig {
			backend: SinkBackend::Http,
			url: Some(url.to_string()),
			headers: vec![("Authorization".to_string(), "Bearer secret".to_string())],
			..Default::default()
		}
	}

	#[test]
	fn builds_from_config() {
		let sink = HttpLogSink::new(&config("https://logs.example.com/ingest")).unwrap();
		assert_eq!(sink.name(), "http");
		assert_eq!(sink.url(), "https://logs.example.com/ingest");
		assert_eq!(sink.method, Method::POST);
	}

	#[test]
	fn debug_redacts_headers() {
		let sink = HttpLogSink::new(&config("https://logs.example.com/ingest")).unwrap();
		let debug = format!("{sink:?}");
		assert!(!debug.contains("secret"));
		assert!(debug.contains("REDACTED"));
	}

	#[test]
	fn rejects_invalid_header() {
		let mut config = config("https://logs.example.com/ingest");
		config.headers = vec![("bad header".to_string(), "x".to_string())];
		assert!(matches!(HttpLogSink::new(&config), Err(SinkError::Permanent(_))));
	}

	#[tokio::test]
	async fn handle_returns_submitted() {
		use crate::metadata::LogKind;
		use crate::record::sample_record;

		// Nothing listens on port 9; delivery fails in the background.
		let sink = HttpLogSink::new(&config("http://127.0.0.1:9/ingest")).unwrap();
		let status = sink.handle(Arc::new(sample_record(LogKind::Log))).await;
		assert_eq!(status, HandleStatus::Submitted);
	}
}
