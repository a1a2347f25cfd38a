// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{GeoIpConfigLayer, LoggingConfigLayer, SinkConfigLayer};

/// Capture configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct CaptureConfigLayer {
	#[serde(default)]
	pub enabled: Option<bool>,
	/// Header inspected before the standard client IP derivation.
	#[serde(default)]
	pub client_ip_header: Option<String>,
	#[serde(default)]
	pub user_agent_enabled: Option<bool>,
	#[serde(default)]
	pub geoip: Option<GeoIpConfigLayer>,
	#[serde(default)]
	pub sink: Option<SinkConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl CaptureConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: CaptureConfigLayer) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.client_ip_header.is_some() {
			self.client_ip_header = other.client_ip_header;
		}
		if other.user_agent_enabled.is_some() {
			self.user_agent_enabled = other.user_agent_enabled;
		}
		merge_option(&mut self.geoip, other.geoip, GeoIpConfigLayer::merge);
		merge_option(&mut self.sink, other.sink, SinkConfigLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_option<T>(target: &mut Option<T>, source: Option<T>, merge_fn: fn(&mut T, T)) {
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}
