// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Timelike, Utc};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::SinkError;
use crate::record::LogRecord;
use crate::sink::{status_from, HandleStatus, LogSink};

struct FileHandle {
	path: String,
	file: tokio::fs::File,
}

/// Appends one JSON document per line. The path may contain date
/// placeholders; the file is reopened when the expanded path changes.
pub struct FileLogSink {
	path: String,
	handle: Mutex<Option<FileHandle>>,
}

impl FileLogSink {
	pub fn new(path: impl Into<String>) -> Self {
		Self {
			path: path.into(),
			handle: Mutex::new(None),
		}
	}

	pub fn path(&self) -> &str {
		&self.path
	}

	async fn append(&self, line: &str) -> Result<(), SinkError> {
		let expanded_path = expand_path(&self.path);
		let mut guard = self.handle.lock().await;

		let needs_reopen = match &*guard {
			Some(handle) => handle.path != expanded_path,
			None => true,
		};

		if needs_reopen {
			if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
				if !parent.as_os_str().is_empty() {
					tokio::fs::create_dir_all(parent)
						.await
						.map_err(|e| SinkError::Transient(format!("failed to create directory: {e}")))?;
				}
			}

			let file = OpenOptions::new()
				.create(true)
				.append(true)
				.open(&expanded_path)
				.await
				.map_err(|e| SinkError::Transient(format!("failed to open file: {e}")))?;

			*guard = Some(FileHandle {
				path: expanded_path,
				file,
			});
		}

		let handle = guard
			.as_mut()
			.ok_or_else(|| SinkError::Permanent("file handle not initialized".to_string()))?;

		handle
			.file
			.write_all(line.as_bytes())
			.await
			.map_err(|e| SinkError::Transient(format!("failed to write to file: {e}")))?;

		handle
			.file
			.flush()
			.await
			.map_err(|e| SinkError::Transient(format!("failed to flush file: {e}")))?;

		Ok(())
	}
}

impl std::fmt::Debug for FileLogSink {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FileLogSink").field("path", &self.path).finish()
	}
}

#[async_trait]
impl LogSink for FileLogSink {
	fn name(&self) -> &str {
		"file"
	}

	async fn handle(&self, record: Arc<LogRecord>) -> HandleStatus {
		let result = match format_json_line(&record) {
			Ok(line) => self.append(&line).await,
			Err(e) => Err(e),
		};
		status_from(self.name(), &record, result)
	}
}

pub fn format_json_line(record: &LogRecord) -> Result<String, SinkError> {
	let json = serde_json::to_string(record)
		.map_err(|e| SinkError::Permanent(format!("JSON serialization failed: {e}")))?;
	Ok(format!("{json}\n"))
}

/// Replace `%Y %m %d %H %M %S` with the current UTC time.
pub fn expand_path(path: &str) -> String {
	let now = Utc::now();

	path
		.replace("%Y", &format!("{:04}", now.year()))
		.replace("%m", &format!("{:02}", now.month()))
		.replace("%d", &format!("{:02}", now.day()))
		.replace("%H", &format!("{:02}", now.hour()))
		.replace("%M", &format!("{:02}", now.minute()))
		.replace("%S", &format!("{:02}", now.second()))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::metadata::LogKind;
	use crate::record::sample_record;
	use tempfile::tempdir;

	#[test]
	fn test_expand_path_no_placeholders() {
		assert_eq!(expand_path("/var/log/oplog.jsonl"), "/var/log/oplog.jsonl");
	}

	#[test]
	fn test_expand_path_date_placeholders() {
		let expanded = expand_path("/var/log/oplog-%Y-%m-%d.jsonl");
		let now = Utc::now();
		assert!(expanded.contains(&format!("{:04}", now.year())));
		assert!(!expanded.contains('%'));
	}

	#[test]
	fn test_format_json_line() {
		let record = sample_record(LogKind::Audit);
		let line = format_json_line(&record).unwrap();
		assert!(line.ends_with('\n'));
		let parsed: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
		assert_eq!(parsed["event"], "order.create");
		assert_eq!(parsed["kind"], "audit");
	}

	#[tokio::test]
	async fn test_appends_lines() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("nested").join("oplog.jsonl");
		let sink = FileLogSink::new(path.to_string_lossy());

		for _ in 0..2 {
			let status = sink.handle(Arc::new(sample_record(LogKind::Log))).await;
			assert_eq!(status, HandleStatus::Success);
		}

		let content = std::fs::read_to_string(&path).unwrap();
		assert_eq!(content.lines().count(), 2);
	}

	#[tokio::test]
	async fn test_unwritable_path_is_failure() {
		let dir = tempdir().unwrap();
		let blocker = dir.path().join("blocker");
		std::fs::write(&blocker, b"not a directory").unwrap();
		let sink = FileLogSink::new(blocker.join("oplog.jsonl").to_string_lossy());

		let status = sink.handle(Arc::new(sample_record(LogKind::Log))).await;
		assert_eq!(status, HandleStatus::Failure);
	}
}
