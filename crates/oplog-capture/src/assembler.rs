// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Builds a [`LogRecord`] from resolved metadata and the live request.
//!
//! Steps run in a fixed order: timestamp, request fields, geo, user agent,
//! principal, classification. Enrichment failures are logged and leave the
//! field unset; [`RecordAssembler::assemble`] itself cannot fail.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use oplog_config::CaptureConfig;
use oplog_useragent::UserAgentInfo;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::enrichment::{GeoError, GeoResolver, OfflineUserAgentEnricher, UserAgentEnricher};
use crate::metadata::ResolvedMetadata;
use crate::principal::{NoPrincipal, PrincipalResolver};
use crate::record::{Location, LogRecord, OperationStatus, RequestMethod};
use crate::request::RequestContext;

pub const DEFAULT_GEO_TIMEOUT: Duration = Duration::from_millis(200);

/// What the guarded operation contributes to its record.
#[derive(Debug, Clone)]
pub struct CaptureInput {
	pub status: OperationStatus,
	/// Already-rendered description. Takes precedence over the declared one.
	pub description: Option<String>,
	pub extra: BTreeMap<String, serde_json::Value>,
}

impl CaptureInput {
	pub fn new(status: OperationStatus) -> Self {
		Self {
			status,
			description: None,
			extra: BTreeMap::new(),
		}
	}

	pub fn success() -> Self {
		Self::new(OperationStatus::Success)
	}

	pub fn failure() -> Self {
		Self::new(OperationStatus::Failure)
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
		self.extra.insert(key.into(), value.into());
		self
	}
}

impl Default for CaptureInput {
	fn default() -> Self {
		Self::success()
	}
}

pub struct RecordAssembler {
	geo_resolver: Option<Arc<dyn GeoResolver>>,
	geo_timeout: Duration,
	user_agent_enricher: Option<Arc<dyn UserAgentEnricher>>,
	principal_resolver: Arc<dyn PrincipalResolver>,
}

impl RecordAssembler {
	pub fn builder() -> RecordAssemblerBuilder {
		RecordAssemblerBuilder::default()
	}

	pub fn has_geo_resolver(&self) -> bool {
		self.geo_resolver.is_some()
	}

	#[instrument(
		skip_all,
		fields(kind = %metadata.kind, event = metadata.event.as_deref())
	)]
	pub async fn assemble(
		&self,
		metadata: &ResolvedMetadata,
		ctx: &dyn RequestContext,
		input: CaptureInput,
	) -> LogRecord {
		let id = Uuid::new_v4();
		let occurred_at = Utc::now();

		let url = ctx.url();
		let request_method = ctx
			.method()
			.map(|m| RequestMethod::parse(&m))
			.unwrap_or_default();
		let request_parameters = ctx.parameters();
		let request_body = ctx.body();
		let client_ip = ctx.client_ip();
		let remote_addr = ctx.remote_addr();
		let user_agent = ctx.user_agent();
		let trace_id = ctx.trace_id();

		let location = match (&self.geo_resolver, client_ip.as_deref()) {
			(Some(resolver), Some(ip)) => self.resolve_location(resolver.as_ref(), ip).await,
			_ => None,
		};

		let ua = self.parse_user_agent(user_agent.as_deref());

		let principal = self.principal_resolver.resolve();

		LogRecord {
			id,
			occurred_at,
			kind: metadata.kind,
			principal,
			business_type: metadata.business_type.clone(),
			event: metadata.event.clone(),
			description: input.description.or_else(|| metadata.description.clone()),
			trace_id,
			url,
			request_method,
			request_parameters,
			request_body,
			client_ip,
			remote_addr,
			user_agent,
			operating_system: ua.operating_system,
			device_type: ua.device_type,
			browser: ua.browser,
			location,
			status: input.status,
			extra: input.extra,
		}
	}

	async fn resolve_location(&self, resolver: &dyn GeoResolver, ip: &str) -> Option<Location> {
		let result = match tokio::time::timeout(self.geo_timeout, resolver.resolve(ip)).await {
			Ok(result) => result,
			Err(_) => Err(GeoError::Timeout(self.geo_timeout)),
		};

		match result {
			Ok(location) if location.is_empty() => None,
			Ok(location) => Some(location),
			Err(e) => {
				warn!(ip = %ip, error = %e, "geo enrichment failed");
				None
			}
		}
	}

	fn parse_user_agent(&self, user_agent: Option<&str>) -> UserAgentInfo {
		match (&self.user_agent_enricher, user_agent) {
			(Some(enricher), Some(ua)) if !ua.trim().is_empty() => enricher.parse(ua),
			_ => UserAgentInfo::default(),
		}
	}
}

impl Default for RecordAssembler {
	fn default() -> Self {
		RecordAssemblerBuilder::default().build()
	}
}

impl std::fmt::Debug for RecordAssembler {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RecordAssembler")
			.field("geo_resolver", &self.geo_resolver.is_some())
			.field("geo_timeout", &self.geo_timeout)
			.field("user_agent_enricher", &self.user_agent_enricher.is_some())
			.finish_non_exhaustive()
	}
}

pub struct RecordAssemblerBuilder {
	geo_resolver: Option<Arc<dyn GeoResolver>>,
	geo_timeout: Duration,
	user_agent_enricher: Option<Arc<dyn UserAgentEnricher>>,
	principal_resolver: Arc<dyn PrincipalResolver>,
}

impl Default for RecordAssemblerBuilder {
	fn default() -> Self {
		Self {
			geo_resolver: None,
			geo_timeout: DEFAULT_GEO_TIMEOUT,
			user_agent_enricher: Some(Arc::new(OfflineUserAgentEnricher)),
			principal_resolver: Arc::new(NoPrincipal),
		}
	}
}

impl RecordAssemblerBuilder {
	/// Enrichers as configured. A GeoIP database that cannot be opened
	/// disables geo enrichment instead of failing.
	pub fn from_config(config: &CaptureConfig) -> Self {
		let mut builder = Self::default();

		if !config.user_agent_enabled {
			builder = builder.without_user_agent();
		}

		if let Some(geoip) = &config.geoip {
			builder = builder.geo_timeout(Duration::from_millis(geoip.timeout_ms));

			#[cfg(feature = "geo-ip")]
			{
				match crate::enrichment::MaxMindGeoResolver::from_config(geoip) {
					Ok(resolver) => builder = builder.geo_resolver(Arc::new(resolver)),
					Err(e) => warn!(
						path = %geoip.database_path,
						error = %e,
						"GeoIP unavailable, geo enrichment disabled"
					),
				}
			}

			#[cfg(not(feature = "geo-ip"))]
			{
				debug!("geo-ip feature disabled, ignoring GeoIP configuration");
			}
		}

		builder
	}

	pub fn geo_resolver(mut self, resolver: Arc<dyn GeoResolver>) -> Self {
		self.geo_resolver = Some(resolver);
		self
	}

	pub fn geo_timeout(mut self, timeout: Duration) -> Self {
		self.geo_timeout = timeout;
		self
	}

	pub fn user_agent_enricher(mut self, enricher: Arc<dyn UserAgentEnricher>) -> Self {
		self.user_agent_enricher = Some(enricher);
		self
	}

	pub fn without_user_agent(mut self) -> Self {
		self.user_agent_enricher = None;
		self
	}

	pub fn principal_resolver(mut self, resolver: Arc<dyn PrincipalResolver>) -> Self {
		self.principal_resolver = resolver;
		self
	}

	pub fn build(self) -> RecordAssembler {
		debug!(
			geo = self.geo_resolver.is_some(),
			user_agent = self.user_agent_enricher.is_some(),
			"record assembler ready"
		);
		RecordAssembler {
			geo_resolver: self.geo_resolver,
			geo_timeout: self.geo_timeout,
			user_agent_enricher: self.user_agent_enricher,
			principal_resolver: self.principal_resolver,
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};

	use async_trait::async_trait;

	use super::*;
	use crate::metadata::LogKind;
	use crate::record::{Country, Principal};
	use crate::request::RequestSnapshot;

	struct CountingGeo {
		calls: AtomicUsize,
	}

	#[async_trait]
	impl GeoResolver for CountingGeo {
		async fn resolve(&self, _ip: &str) -> Result<Location, GeoError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			Ok(Location {
				country: Some(Country {
					code: "DE".to_string(),
					name: "Germany".to_string(),
					full_name: "Germany".to_string(),
				}),
				..Default::default()
			})
		}
	}

	struct FailingGeo;

	#[async_trait]
	impl GeoResolver for FailingGeo {
		async fn resolve(&self, ip: &str) -> Result<Location, GeoError> {
			Err(GeoError::NotFound(ip.to_string()))
		}
	}

	fn metadata() -> ResolvedMetadata {
		ResolvedMetadata {
			kind: LogKind::Log,
			event: Some("user.login".to_string()),
			business_type: Some("AUTH".to_string()),
			description: Some("declared".to_string()),
		}
	}

	#[tokio::test]
	async fn stamps_time_and_defaults_method() {
		let before = Utc::now();
		let ctx = RequestSnapshot {
			method: Some("BREW".to_string()),
			..Default::default()
		};
		let record = RecordAssembler::default()
			.assemble(&metadata(), &ctx, CaptureInput::success())
			.await;

		assert!(record.occurred_at >= before);
		assert_eq!(record.request_method, RequestMethod::Get);
		assert_eq!(record.event.as_deref(), Some("user.login"));
		assert_eq!(record.kind, LogKind::Log);
	}

	#[tokio::test]
	async fn missing_method_defaults_to_get() {
		let record = RecordAssembler::default()
			.assemble(&metadata(), &RequestSnapshot::default(), CaptureInput::success())
			.await;
		assert_eq!(record.request_method, RequestMethod::Get);
	}

	#[tokio::test]
	async fn skips_geo_without_client_ip() {
		let geo = Arc::new(CountingGeo {
			calls: AtomicUsize::new(0),
		});
		let assembler = RecordAssembler::builder().geo_resolver(geo.clone()).build();

		let record = assembler
			.assemble(&metadata(), &RequestSnapshot::default(), CaptureInput::success())
			.await;
		assert!(record.location.is_none());
		assert_eq!(geo.calls.load(Ordering::SeqCst), 0);

		let ctx = RequestSnapshot {
			client_ip: Some("192.0.2.1".to_string()),
			..Default::default()
		};
		let record = assembler.assemble(&metadata(), &ctx, CaptureInput::success()).await;
		assert_eq!(record.location.unwrap().country.unwrap().code, "DE");
		assert_eq!(geo.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn geo_error_leaves_location_unset() {
		let assembler = RecordAssembler::builder()
			.geo_resolver(Arc::new(FailingGeo))
			.build();
		let ctx = RequestSnapshot {
			client_ip: Some("192.0.2.1".to_string()),
			..Default::default()
		};
		let record = assembler.assemble(&metadata(), &ctx, CaptureInput::success()).await;
		assert!(record.location.is_none());
		assert_eq!(record.client_ip.as_deref(), Some("192.0.2.1"));
	}

	#[tokio::test]
	async fn user_agent_can_be_disabled() {
		let ctx = RequestSnapshot {
			user_agent: Some("Mozilla/5.0 (Windows NT 10.0) Chrome/120 Safari/537.36".to_string()),
			..Default::default()
		};

		let record = RecordAssembler::default()
			.assemble(&metadata(), &ctx, CaptureInput::success())
			.await;
		assert_eq!(record.browser.unwrap().name, "Chrome");

		let record = RecordAssembler::builder()
			.without_user_agent()
			.build()
			.assemble(&metadata(), &ctx, CaptureInput::success())
			.await;
		assert!(record.browser.is_none());
		assert!(record.user_agent.is_some());
	}

	#[tokio::test]
	async fn principal_and_input_are_copied() {
		let assembler = RecordAssembler::builder()
			.principal_resolver(Arc::new(|| Some(Principal::new("9", "ops"))))
			.build();
		let input = CaptureInput::failure()
			.with_description("rendered")
			.with_extra("order_id", 1001);

		let record = assembler
			.assemble(&metadata(), &RequestSnapshot::default(), input)
			.await;

		assert_eq!(record.principal.unwrap().user_name, "ops");
		assert_eq!(record.status, OperationStatus::Failure);
		assert_eq!(record.description.as_deref(), Some("rendered"));
		assert_eq!(record.extra["order_id"], 1001);
	}

	#[tokio::test]
	async fn declared_description_when_input_has_none() {
		let record = RecordAssembler::default()
			.assemble(&metadata(), &RequestSnapshot::default(), CaptureInput::success())
			.await;
		assert_eq!(record.description.as_deref(), Some("declared"));
		assert!(record.principal.is_none());
	}

	#[test]
	fn from_config_with_missing_database_disables_geo() {
		let config = CaptureConfig {
			geoip: Some(oplog_config::GeoIpConfig {
				database_path: "/nonexistent/GeoLite2-City.mmdb".to_string(),
				timeout_ms: 50,
			}),
			..Default::default()
		};
		let assembler = RecordAssemblerBuilder::from_config(&config).build();
		assert!(!assembler.has_geo_resolver());
		assert_eq!(assembler.geo_timeout, Duration::from_millis(50));
	}
}
