// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::record::{LogRecord, OperationStatus};
use crate::sink::{HandleStatus, LogSink};

/// Emits each record as a structured `tracing` event on the `oplog` target.
#[derive(Debug, Clone, Default)]
pub struct TracingLogSink;

impl TracingLogSink {
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl LogSink for TracingLogSink {
	fn name(&self) -> &str {
		"tracing"
	}

	async fn handle(&self, record: Arc<LogRecord>) -> HandleStatus {
		let principal = record.principal.as_ref().map(|p| p.user_name.as_str());
		let country = record
			.location
			.as_ref()
			.and_then(|l| l.country.as_ref())
			.map(|c| c.code.as_str());
		let browser = record.browser.as_ref().map(|b| b.name.as_str());
		let os = record.operating_system.as_ref().map(|o| o.name.as_str());

		match record.status {
			OperationStatus::Success => info!(
				target: "oplog",
				record_id = %record.id,
				kind = %record.kind,
				event = record.event.as_deref(),
				business_type = record.business_type.as_deref(),
				description = record.description.as_deref(),
				principal,
				method = %record.request_method,
				url = record.url.as_deref(),
				client_ip = record.client_ip.as_deref(),
				country,
				browser,
				os,
				trace_id = record.trace_id.as_deref(),
				status = %record.status,
				"operation logged"
			),
			OperationStatus::Failure => warn!(
				target: "oplog",
				record_id = %record.id,
				kind = %record.kind,
				event = record.event.as_deref(),
				business_type = record.business_type.as_deref(),
				description = record.description.as_deref(),
				principal,
				method = %record.request_method,
				url = record.url.as_deref(),
				client_ip = record.client_ip.as_deref(),
				country,
				browser,
				os,
				trace_id = record.trace_id.as_deref(),
				status = %record.status,
				"operation logged"
			),
		}

		HandleStatus::Success
	}
}
