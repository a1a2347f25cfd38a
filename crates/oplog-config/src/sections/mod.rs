// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for the capture pipeline.

pub mod geoip;
pub mod logging;
pub mod sink;

pub use geoip::{GeoIpConfig, GeoIpConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
pub use sink::{SinkBackend, SinkConfig, SinkConfigLayer};
