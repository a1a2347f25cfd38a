// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fail-soft enrichers. Each adds optional derived data to a record; a
//! failure leaves the corresponding field unset.

pub mod geo;
pub mod user_agent;

pub use geo::{GeoError, GeoResolver};
#[cfg(feature = "geo-ip")]
pub use geo::MaxMindGeoResolver;
pub use user_agent::{OfflineUserAgentEnricher, UserAgentEnricher};
