// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Guarded-operation dispatch.
//!
//! [`CaptureDispatcher::guard`] wraps a business future: it awaits it, maps
//! the result to an [`OperationStatus`](crate::record::OperationStatus),
//! assembles one record per declared kind and hands each to the sink exactly
//! once. Capture is best-effort. Its outcomes are returned next to the
//! business result, which is never altered.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use oplog_config::CaptureConfig;
use serde::Serialize;
use tracing::{error, instrument, warn};
use uuid::Uuid;

use crate::assembler::{CaptureInput, RecordAssembler, RecordAssemblerBuilder};
use crate::error::CaptureResult;
use crate::factory::SinkFactory;
use crate::metadata::{GuardedOperation, LogKind, ResolvedMetadata};
use crate::principal::PrincipalResolver;
use crate::request::RequestContext;
use crate::sink::HandleStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CaptureOutcome {
	pub kind: LogKind,
	/// `None` when no record reached a sink.
	pub record_id: Option<Uuid>,
	pub status: HandleStatus,
}

impl CaptureOutcome {
	fn failed(kind: LogKind) -> Self {
		Self {
			kind,
			record_id: None,
			status: HandleStatus::Failure,
		}
	}
}

/// A business result together with the outcomes of capturing it.
#[derive(Debug)]
pub struct Guarded<T, E> {
	pub result: Result<T, E>,
	pub captures: Vec<CaptureOutcome>,
}

impl<T, E> Guarded<T, E> {
	pub fn into_result(self) -> Result<T, E> {
		self.result
	}

	pub fn any_failed(&self) -> bool {
		self.captures.iter().any(|c| c.status.is_failure())
	}
}

pub struct CaptureDispatcher {
	assembler: RecordAssembler,
	sinks: SinkFactory,
	enabled: bool,
}

impl CaptureDispatcher {
	pub fn new(assembler: RecordAssembler, sinks: SinkFactory) -> Self {
		Self {
			assembler,
			sinks,
			enabled: true,
		}
	}

	/// Dispatcher for a loaded configuration. Fails when the sink
	/// configuration is incomplete.
	pub fn from_config(
		config: &CaptureConfig,
		principal_resolver: Arc<dyn PrincipalResolver>,
	) -> CaptureResult<Self> {
		let sinks = SinkFactory::new(config.sink.clone())?;
		let assembler = RecordAssemblerBuilder::from_config(config)
			.principal_resolver(principal_resolver)
			.build();
		Ok(Self::new(assembler, sinks).with_enabled(config.enabled))
	}

	pub fn with_enabled(mut self, enabled: bool) -> Self {
		self.enabled = enabled;
		self
	}

	pub fn is_enabled(&self) -> bool {
		self.enabled
	}

	pub fn assembler(&self) -> &RecordAssembler {
		&self.assembler
	}

	pub fn sinks(&self) -> &SinkFactory {
		&self.sinks
	}

	/// Capture one record per declaration of `op`, plain log first.
	#[instrument(skip_all, fields(operation = op.name()))]
	pub async fn capture(
		&self,
		op: &GuardedOperation,
		ctx: &dyn RequestContext,
		input: CaptureInput,
	) -> Vec<CaptureOutcome> {
		if !self.enabled {
			return Vec::new();
		}

		let mut outcomes = Vec::new();
		for metadata in op.declarations() {
			let outcome = AssertUnwindSafe(self.capture_one(op, metadata, ctx, input.clone()))
				.catch_unwind()
				.await
				.unwrap_or_else(|_| {
					report_failure(op, metadata.kind, "capture panicked");
					CaptureOutcome::failed(metadata.kind)
				});
			outcomes.push(outcome);
		}
		outcomes
	}

	/// Run `fut`, then capture with a status derived from its result.
	pub async fn guard<T, E, Fut>(
		&self,
		op: &GuardedOperation,
		ctx: &dyn RequestContext,
		fut: Fut,
	) -> Guarded<T, E>
	where
		Fut: Future<Output = Result<T, E>>,
	{
		self
			.guard_with(op, ctx, fut, |result| match result {
				Ok(_) => CaptureInput::success(),
				Err(_) => CaptureInput::failure(),
			})
			.await
	}

	/// Like [`guard`](Self::guard), with the capture input built from the result.
	pub async fn guard_with<T, E, Fut, F>(
		&self,
		op: &GuardedOperation,
		ctx: &dyn RequestContext,
		fut: Fut,
		input: F,
	) -> Guarded<T, E>
	where
		Fut: Future<Output = Result<T, E>>,
		F: FnOnce(&Result<T, E>) -> CaptureInput,
	{
		let result = fut.await;
		let captures = self.capture(op, ctx, input(&result)).await;
		Guarded { result, captures }
	}

	async fn capture_one(
		&self,
		op: &GuardedOperation,
		metadata: &ResolvedMetadata,
		ctx: &dyn RequestContext,
		input: CaptureInput,
	) -> CaptureOutcome {
		let sink = match self.sinks.get_or_create() {
			Ok(sink) => sink,
			Err(e) => {
				report_failure(op, metadata.kind, &e.to_string());
				return CaptureOutcome::failed(metadata.kind);
			}
		};

		let record = Arc::new(self.assembler.assemble(metadata, ctx, input).await);
		let record_id = record.id;

		let status = AssertUnwindSafe(sink.handle(record))
			.catch_unwind()
			.await
			.unwrap_or(HandleStatus::Failure);

		if status.is_failure() {
			report_failure(op, metadata.kind, &format!("sink '{}' rejected record {record_id}", sink.name()));
		}

		CaptureOutcome {
			kind: metadata.kind,
			record_id: Some(record_id),
			status,
		}
	}
}

impl std::fmt::Debug for CaptureDispatcher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CaptureDispatcher")
			.field("assembler", &self.assembler)
			.field("sinks", &self.sinks)
			.field("enabled", &self.enabled)
			.finish()
	}
}

fn report_failure(op: &GuardedOperation, kind: LogKind, cause: &str) {
	if kind.is_mandatory() {
		error!(operation = op.name(), %kind, cause, "audit capture failed");
	} else {
		warn!(operation = op.name(), %kind, cause, "log capture failed");
	}
}
