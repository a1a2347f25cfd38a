// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request context adapters.
//!
//! The assembler reads the inbound request only through [`RequestContext`],
//! so it does not depend on any server framework. [`HttpRequestContext`]
//! adapts `http::request::Parts`; [`RequestSnapshot`] is a plain value for
//! hosts that already extracted the fields.

use std::net::SocketAddr;

use http::HeaderMap;

use crate::record::RequestParameters;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";
const TRACEPARENT: &str = "traceparent";
const X_TRACE_ID: &str = "x-trace-id";
const X_REQUEST_ID: &str = "x-request-id";

/// Read-only view of the request a guarded operation runs under.
pub trait RequestContext: Send + Sync {
	fn url(&self) -> Option<String>;

	/// Raw method string as received. Parsing happens in the assembler.
	fn method(&self) -> Option<String>;

	fn parameters(&self) -> RequestParameters;

	fn body(&self) -> Option<String>;

	fn client_ip(&self) -> Option<String>;

	fn remote_addr(&self) -> Option<String>;

	fn user_agent(&self) -> Option<String>;

	fn trace_id(&self) -> Option<String> {
		None
	}
}

/// Adapter over `http::request::Parts`.
#[derive(Debug)]
pub struct HttpRequestContext {
	parts: http::request::Parts,
	body: Option<String>,
	peer: Option<SocketAddr>,
	client_ip_header: Option<String>,
}

impl HttpRequestContext {
	pub fn new(parts: http::request::Parts) -> Self {
		Self {
			parts,
			body: None,
			peer: None,
			client_ip_header: None,
		}
	}

	/// Split a request, keeping its body when it is valid UTF-8 and non-empty.
	pub fn from_request<B: AsRef<[u8]>>(request: http::Request<B>) -> Self {
		let (parts, body) = request.into_parts();
		let body = std::str::from_utf8(body.as_ref())
			.ok()
			.filter(|s| !s.is_empty())
			.map(str::to_string);
		Self {
			body,
			..Self::new(parts)
		}
	}

	pub fn with_peer(mut self, peer: SocketAddr) -> Self {
		self.peer = Some(peer);
		self
	}

	pub fn with_body(mut self, body: impl Into<String>) -> Self {
		self.body = Some(body.into());
		self
	}

	/// Header consulted before the standard forwarding headers.
	pub fn with_client_ip_header(mut self, header: Option<impl Into<String>>) -> Self {
		self.client_ip_header = header.map(|h| h.into().to_ascii_lowercase());
		self
	}

	pub fn headers(&self) -> &HeaderMap {
		&self.parts.headers
	}

	fn header(&self, name: &str) -> Option<&str> {
		self
			.parts
			.headers
			.get(name)
			.and_then(|v| v.to_str().ok())
			.map(str::trim)
			.filter(|v| !v.is_empty())
	}
}

impl RequestContext for HttpRequestContext {
	/// Scheme, authority and path for an absolute request URI, the bare path
	/// otherwise. The query is recorded separately as parameters.
	fn url(&self) -> Option<String> {
		let uri = &self.parts.uri;
		match (uri.scheme_str(), uri.authority()) {
			(Some(scheme), Some(authority)) => Some(format!("{scheme}://{authority}{}", uri.path())),
			_ => Some(uri.path().to_string()),
		}
	}

	fn method(&self) -> Option<String> {
		Some(self.parts.method.as_str().to_string())
	}

	fn parameters(&self) -> RequestParameters {
		self
			.parts
			.uri
			.query()
			.map(RequestParameters::from_query)
			.unwrap_or_default()
	}

	fn body(&self) -> Option<String> {
		self.body.clone()
	}

	fn client_ip(&self) -> Option<String> {
		let from_override = self
			.client_ip_header
			.as_deref()
			.and_then(|name| self.header(name))
			.filter(|v| !is_unknown(v))
			.map(str::to_string);

		from_override
			.or_else(|| {
				self
					.header(X_FORWARDED_FOR)
					.and_then(first_forwarded_hop)
			})
			.or_else(|| {
				self
					.header(X_REAL_IP)
					.filter(|v| !is_unknown(v))
					.map(str::to_string)
			})
			.or_else(|| self.peer.map(|p| p.ip().to_string()))
	}

	fn remote_addr(&self) -> Option<String> {
		self.peer.map(|p| p.ip().to_string())
	}

	fn user_agent(&self) -> Option<String> {
		self.header(http::header::USER_AGENT.as_str()).map(str::to_string)
	}

	fn trace_id(&self) -> Option<String> {
		self
			.header(TRACEPARENT)
			.and_then(trace_id_from_traceparent)
			.or_else(|| self.header(X_TRACE_ID).map(str::to_string))
			.or_else(|| self.header(X_REQUEST_ID).map(str::to_string))
	}
}

/// Plain request fields for hosts that are not HTTP servers.
#[derive(Debug, Clone, Default)]
pub struct RequestSnapshot {
	pub url: Option<String>,
	pub method: Option<String>,
	pub parameters: RequestParameters,
	pub body: Option<String>,
	pub client_ip: Option<String>,
	pub remote_addr: Option<String>,
	pub user_agent: Option<String>,
	pub trace_id: Option<String>,
}

impl RequestContext for RequestSnapshot {
	fn url(&self) -> Option<String> {
		self.url.clone()
	}

	fn method(&self) -> Option<String> {
		self.method.clone()
	}

	fn parameters(&self) -> RequestParameters {
		self.parameters.clone()
	}

	fn body(&self) -> Option<String> {
		self.body.clone()
	}

	fn client_ip(&self) -> Option<String> {
		self.client_ip.clone()
	}

	fn remote_addr(&self) -> Option<String> {
		self.remote_addr.clone()
	}

	fn user_agent(&self) -> Option<String> {
		self.user_agent.clone()
	}

	fn trace_id(&self) -> Option<String> {
		self.trace_id.clone()
	}
}

fn is_unknown(value: &str) -> bool {
	value.eq_ignore_ascii_case("unknown")
}

fn first_forwarded_hop(value: &str) -> Option<String> {
	value
		.split(',')
		.map(str::trim)
		.find(|hop| !hop.is_empty() && !is_unknown(hop))
		.map(str::to_string)
}

/// `version-traceid-parentid-flags`
fn trace_id_from_traceparent(value: &str) -> Option<String> {
	let trace_id = value.split('-').nth(1)?;
	if trace_id.len() == 32 && trace_id.chars().all(|c| c.is_ascii_hexdigit()) {
		Some(trace_id.to_ascii_lowercase())
	} else {
		None
	}
}
