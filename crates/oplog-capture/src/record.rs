// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The canonical log record and its parts.
//!
//! - [`LogRecord`]: one record per guarded-operation invocation and declaration
//! - [`RequestMethod`]: closed set of HTTP methods, unknown input folds to GET
//! - [`RequestParameters`]: multi-valued request parameters
//! - [`Location`]: geo enrichment result
//!
//! Records are only built by [`RecordAssembler`](crate::assembler::RecordAssembler)
//! and are shared with sinks as `Arc<LogRecord>`, so they are never mutated
//! after dispatch.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::metadata::LogKind;

pub use oplog_useragent::{Browser, BrowserType, DeviceType, OperatingSystem};

/// HTTP method captured from the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestMethod {
	#[default]
	Get,
	Head,
	Post,
	Put,
	Patch,
	Delete,
	Options,
	Trace,
}

impl RequestMethod {
	/// Case-insensitive. Anything unrecognized, including empty input, is GET.
	pub fn parse(value: &str) -> Self {
		match value.trim().to_ascii_uppercase().as_str() {
			"HEAD" => RequestMethod::Head,
			"POST" => RequestMethod::Post,
			"PUT" => RequestMethod::Put,
			"PATCH" => RequestMethod::Patch,
			"DELETE" => RequestMethod::Delete,
			"OPTIONS" => RequestMethod::Options,
			"TRACE" => RequestMethod::Trace,
			_ => RequestMethod::Get,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			RequestMethod::Get => "GET",
			RequestMethod::Head => "HEAD",
			RequestMethod::Post => "POST",
			RequestMethod::Put => "PUT",
			RequestMethod::Patch => "PATCH",
			RequestMethod::Delete => "DELETE",
			RequestMethod::Options => "OPTIONS",
			RequestMethod::Trace => "TRACE",
		}
	}
}

impl fmt::Display for RequestMethod {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl From<&http::Method> for RequestMethod {
	fn from(method: &http::Method) -> Self {
		RequestMethod::parse(method.as_str())
	}
}

/// Request parameters as `(key, value)` pairs. A key sent several times
/// appears once per value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestParameters(Vec<(String, String)>);

impl RequestParameters {
	pub fn new() -> Self {
		Self::default()
	}

	/// Parse an `application/x-www-form-urlencoded` query string.
	pub fn from_query(query: &str) -> Self {
		Self(
			url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
				.map(|(k, v)| (k.into_owned(), v.into_owned()))
				.collect(),
		)
	}

	pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
		self.0.push((key.into(), value.into()));
	}

	pub fn get(&self, key: &str) -> Option<&str> {
		self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
	}

	pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
		self.0
			.iter()
			.filter(move |(k, _)| k == key)
			.map(|(_, v)| v.as_str())
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestParameters {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}

/// The acting user, when one is authenticated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
	pub id: String,
	pub user_name: String,
	pub real_name: Option<String>,
}

impl Principal {
	pub fn new(id: impl Into<String>, user_name: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			user_name: user_name.into(),
			real_name: None,
		}
	}

	pub fn with_real_name(mut self, real_name: impl Into<String>) -> Self {
		self.real_name = Some(real_name.into());
		self
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
	pub lon: f64,
	pub lat: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
	/// ISO 3166-1 alpha-2 code.
	pub code: String,
	pub name: String,
	pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct District {
	pub name: String,
	pub full_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
	pub geo: Option<GeoPoint>,
	pub country: Option<Country>,
	pub district: Option<District>,
}

impl Location {
	pub fn is_empty(&self) -> bool {
		self.geo.is_none() && self.country.is_none() && self.district.is_none()
	}
}

/// Outcome of the guarded business operation, not of the log write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
	Success,
	Failure,
}

impl fmt::Display for OperationStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OperationStatus::Success => f.write_str("success"),
			OperationStatus::Failure => f.write_str("failure"),
		}
	}
}

/// A structured record of one guarded-operation invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
	/// Unique identifier for this record.
	pub id: Uuid,
	/// When the record was assembled.
	pub occurred_at: DateTime<Utc>,
	/// Which declaration produced this record.
	pub kind: LogKind,

	/// The authenticated actor, if any.
	pub principal: Option<Principal>,

	pub business_type: Option<String>,
	pub event: Option<String>,
	pub description: Option<String>,
	/// Correlation id propagated from the inbound request.
	pub trace_id: Option<String>,

	pub url: Option<String>,
	pub request_method: RequestMethod,
	pub request_parameters: RequestParameters,
	pub request_body: Option<String>,
	pub client_ip: Option<String>,
	pub remote_addr: Option<String>,
	/// Raw user-agent header.
	pub user_agent: Option<String>,

	pub operating_system: Option<OperatingSystem>,
	pub device_type: Option<DeviceType>,
	pub browser: Option<Browser>,
	pub location: Option<Location>,

	pub status: OperationStatus,
	/// Caller-supplied supplementary data.
	pub extra: BTreeMap<String, serde_json::Value>,
}

#[cfg(test)]
pub(crate) fn sample_record(kind: LogKind) -> LogRecord {
	LogRecord {
		id: Uuid::new_v4(),
		occurred_at: Utc::now(),
		kind,
		principal: Some(Principal::new("42", "jdoe").with_real_name("Jane Doe")),
		business_type: Some("ORDER".to_string()),
		event: Some("order.create".to_string()),
		description: Some("created order 1001".to_string()),
		trace_id: Some("4bf92f3577b34da6a3ce929d0e0e4736".to_string()),
		url: Some("/orders".to_string()),
		request_method: RequestMethod::Post,
		request_parameters: RequestParameters::from_query("source=web"),
		request_body: Some("{\"sku\":\"A-1\"}".to_string()),
		client_ip: Some("203.0.113.7".to_string()),
		remote_addr: Some("10.0.0.2".to_string()),
		user_agent: Some("Mozilla/5.0 (Windows NT 10.0) Chrome/120.0 Safari/537.36".to_string()),
		operating_system: None,
		device_type: None,
		browser: None,
		location: None,
		status: OperationStatus::Success,
		extra: BTreeMap::new(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	mod request_method {
		use super::*;

		#[test]
		fn parses_known_methods_case_insensitively() {
			assert_eq!(RequestMethod::parse("post"), RequestMethod::Post);
			assert_eq!(RequestMethod::parse(" Delete "), RequestMethod::Delete);
			assert_eq!(RequestMethod::parse("OPTIONS"), RequestMethod::Options);
			assert_eq!(RequestMethod::parse("trace"), RequestMethod::Trace);
		}

		#[test]
		fn unknown_methods_fold_to_get() {
			assert_eq!(RequestMethod::parse("BREW"), RequestMethod::Get);
			assert_eq!(RequestMethod::parse("PROPFIND"), RequestMethod::Get);
			assert_eq!(RequestMethod::parse(""), RequestMethod::Get);
		}

		#[test]
		fn from_http_method() {
			assert_eq!(RequestMethod::from(&http::Method::PATCH), RequestMethod::Patch);
			let custom = http::Method::from_bytes(b"PURGE").unwrap();
			assert_eq!(RequestMethod::from(&custom), RequestMethod::Get);
		}

		#[test]
		fn serializes_uppercase() {
			assert_eq!(serde_json::to_string(&RequestMethod::Head).unwrap(), "\"HEAD\"");
		}

		proptest! {
			#[test]
			fn parse_is_total(raw in "\\PC{0,16}") {
				let method = RequestMethod::parse(&raw);
				prop_assert_eq!(RequestMethod::parse(method.as_str()), method);
			}
		}
	}

	mod request_parameters {
		use super::*;

		#[test]
		fn keeps_duplicate_keys() {
			let params = RequestParameters::from_query("tag=a&tag=b&page=2");
			assert_eq!(params.len(), 3);
			assert_eq!(params.get_all("tag").collect::<Vec<_>>(), vec!["a", "b"]);
			assert_eq!(params.get("page"), Some("2"));
		}

		#[test]
		fn percent_decodes() {
			let params = RequestParameters::from_query("?q=hello%20world&name=J%C3%BCrgen+K");
			assert_eq!(params.get("q"), Some("hello world"));
			assert_eq!(params.get("name"), Some("Jürgen K"));
		}

		#[test]
		fn empty_query() {
			assert!(RequestParameters::from_query("").is_empty());
		}

		#[test]
		fn serializes_as_pairs() {
			let params: RequestParameters = [("a", "1"), ("a", "2")].into_iter().collect();
			let json = serde_json::to_value(&params).unwrap();
			assert_eq!(json, serde_json::json!([["a", "1"], ["a", "2"]]));
		}
	}

	mod log_record {
		use super::*;

		#[test]
		fn serializes_to_json() {
			let record = sample_record(LogKind::Audit);
			let json = serde_json::to_value(&record).unwrap();
			assert_eq!(json["kind"], "audit");
			assert_eq!(json["request_method"], "POST");
			assert_eq!(json["status"], "success");
			assert_eq!(json["principal"]["user_name"], "jdoe");
			assert!(json["location"].is_null());
		}

		#[test]
		fn deserializes_from_json() {
			let record = sample_record(LogKind::Log);
			let json = serde_json::to_string(&record).unwrap();
			let parsed: LogRecord = serde_json::from_str(&json).unwrap();
			assert_eq!(parsed.id, record.id);
			assert_eq!(parsed.request_parameters, record.request_parameters);
		}

		#[test]
		fn location_is_empty() {
			assert!(Location::default().is_empty());
			let loc = Location {
				geo: Some(GeoPoint { lon: 1.0, lat: 2.0 }),
				..Default::default()
			};
			assert!(!loc.is_empty());
		}
	}
}
