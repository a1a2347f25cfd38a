// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Capture pipeline for guarded operations.
//!
//! A [`GuardedOperation`] carries precomputed plain-log and audit metadata.
//! [`CaptureDispatcher`] wraps the business call, has the
//! [`RecordAssembler`] build a [`LogRecord`] from that metadata and the
//! [`RequestContext`], and hands it to the [`LogSink`] obtained from the
//! [`SinkFactory`].
//!
//! ```ignore
//! let op = GuardedOperation::builder("OrderService::create")
//!     .method_audit(MetadataDeclaration::new().event("order.create").business_type("ORDER"))
//!     .build();
//! let dispatcher = CaptureDispatcher::from_config(&config, Arc::new(TaskLocalPrincipalResolver))?;
//! let guarded = dispatcher.guard(&op, &ctx, create_order(req)).await;
//! ```

pub mod assembler;
pub mod dispatch;
pub mod enrichment;
pub mod error;
pub mod factory;
pub mod metadata;
pub mod principal;
pub mod record;
pub mod request;
pub mod sink;

pub use assembler::{CaptureInput, RecordAssembler, RecordAssemblerBuilder};
pub use dispatch::{CaptureDispatcher, CaptureOutcome, Guarded};
pub use enrichment::{GeoError, GeoResolver, OfflineUserAgentEnricher, UserAgentEnricher};
pub use error::{CaptureError, CaptureResult, SinkError};
pub use factory::{build_sink, validate_sink_config, SinkFactory};
pub use metadata::{
	GuardedOperation, GuardedOperationBuilder, LogKind, MetadataDeclaration, ResolvedMetadata,
};
pub use principal::{scope_principal, NoPrincipal, PrincipalResolver, TaskLocalPrincipalResolver};
pub use record::{
	Browser, BrowserType, Country, DeviceType, District, GeoPoint, Location, LogRecord,
	OperatingSystem, OperationStatus, Principal, RequestMethod, RequestParameters,
};
pub use request::{HttpRequestContext, RequestContext, RequestSnapshot};
pub use sink::{HandleStatus, LogSink};

pub use oplog_config::{CaptureConfig, SinkBackend, SinkConfig};

#[cfg(feature = "geo-ip")]
pub use enrichment::MaxMindGeoResolver;

#[cfg(feature = "sink-tracing")]
pub use sink::tracing::TracingLogSink;

#[cfg(feature = "sink-file")]
pub use sink::file::FileLogSink;

#[cfg(feature = "sink-http")]
pub use sink::http::HttpLogSink;
