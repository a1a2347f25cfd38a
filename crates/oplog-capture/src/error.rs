// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

pub type CaptureResult<T> = Result<T, CaptureError>;

#[derive(Error, Debug)]
pub enum CaptureError {
	/// A required setting is missing or invalid. Fatal: no sink is built.
	#[error("configuration error: {0}")]
	Config(String),

	#[error("sink '{backend}' could not be built: {source}")]
	SinkBuild {
		backend: String,
		#[source]
		source: SinkError,
	},
}

#[derive(Error, Debug)]
pub enum SinkError {
	#[error("transient error: {0}")]
	Transient(String),

	#[error("permanent error: {0}")]
	Permanent(String),
}
