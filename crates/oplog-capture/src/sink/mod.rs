// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistence targets for log records.
//!
//! Every backend implements [`LogSink`]. Per-record failures are reported as
//! [`HandleStatus::Failure`] and logged by the sink; they never panic.

#[cfg(feature = "sink-file")]
pub mod file;
#[cfg(feature = "sink-http")]
pub mod http;
#[cfg(feature = "sink-tracing")]
pub mod tracing;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SinkError;
use crate::record::LogRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleStatus {
	Success,
	Failure,
	/// Accepted for asynchronous delivery; the final outcome is not observed.
	Submitted,
}

impl HandleStatus {
	pub fn is_failure(&self) -> bool {
		matches!(self, HandleStatus::Failure)
	}
}

#[async_trait]
pub trait LogSink: Send + Sync {
	fn name(&self) -> &str;

	async fn handle(&self, record: Arc<LogRecord>) -> HandleStatus;
}

/// Map an internal sink result to a status, logging the cause of a failure.
pub(crate) fn status_from(sink: &str, record: &LogRecord, result: Result<(), SinkError>) -> HandleStatus {
	match result {
		Ok(()) => HandleStatus::Success,
		Err(e) => {
			::tracing::warn!(sink, record_id = %record.id, error = %e, "log sink write failed");
			HandleStatus::Failure
		}
	}
}
