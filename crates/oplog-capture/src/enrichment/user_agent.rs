// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use oplog_useragent::UserAgentInfo;

/// Decomposes a raw user-agent string. Pure and infallible: unparseable
/// input yields an empty [`UserAgentInfo`].
pub trait UserAgentEnricher: Send + Sync {
	fn parse(&self, user_agent: &str) -> UserAgentInfo;
}

/// Token-matching parser with no I/O and no external database.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineUserAgentEnricher;

impl UserAgentEnricher for OfflineUserAgentEnricher {
	fn parse(&self, user_agent: &str) -> UserAgentInfo {
		oplog_useragent::parse(user_agent)
	}
}
