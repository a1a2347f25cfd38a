// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Offline user-agent decomposition.
//!
//! [`parse`] splits a raw `User-Agent` header into browser, operating system
//! and device class using product-token matching. It never performs I/O and
//! never fails: input it does not recognize produces an empty
//! [`UserAgentInfo`].
//!
//! Each component is all-or-nothing. A [`Browser`] is only returned when
//! both its name and version were found; the same holds for
//! [`OperatingSystem`].

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserType {
	Browser,
	MobileBrowser,
	Robot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Browser {
	pub name: String,
	pub browser_type: BrowserType,
	pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingSystem {
	pub name: String,
	pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
	Computer,
	Mobile,
	Tablet,
	GameConsole,
	DigitalMediaPlayer,
	Wearable,
	Robot,
}

impl fmt::Display for DeviceType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let s = match self {
			DeviceType::Computer => "computer",
			DeviceType::Mobile => "mobile",
			DeviceType::Tablet => "tablet",
			DeviceType::GameConsole => "game_console",
			DeviceType::DigitalMediaPlayer => "digital_media_player",
			DeviceType::Wearable => "wearable",
			DeviceType::Robot => "robot",
		};
		write!(f, "{s}")
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAgentInfo {
	pub browser: Option<Browser>,
	pub operating_system: Option<OperatingSystem>,
	pub device_type: Option<DeviceType>,
}

impl UserAgentInfo {
	pub fn is_empty(&self) -> bool {
		self.browser.is_none() && self.operating_system.is_none() && self.device_type.is_none()
	}
}

/// Matched against product-token names and `compatible` comment entries,
/// never against the whole string.
const BOT_MARKERS: &[&str] = &["bot", "crawler", "spider", "slurp", "curl", "wget"];

/// Browser product tokens, checked in order. Chromium derivatives send
/// `Chrome/` and `Safari/` too, so they come first.
const BROWSER_TOKENS: &[(&str, &str)] = &[
	("EdgA/", "Microsoft Edge"),
	("EdgiOS/", "Microsoft Edge"),
	("Edg/", "Microsoft Edge"),
	("Edge/", "Microsoft Edge"),
	("OPR/", "Opera"),
	("SamsungBrowser/", "Samsung Internet"),
	("FxiOS/", "Firefox"),
	("Firefox/", "Firefox"),
	("CriOS/", "Chrome"),
	("Chromium/", "Chromium"),
	("Chrome/", "Chrome"),
];

/// Decompose a raw user-agent string.
pub fn parse(user_agent: &str) -> UserAgentInfo {
	let ua = user_agent.trim();
	if ua.is_empty() {
		return UserAgentInfo::default();
	}

	let is_bot = is_robot(ua);
	let device_type = detect_device(ua, is_bot);

	UserAgentInfo {
		browser: detect_browser(ua, is_bot, device_type),
		operating_system: detect_os(ua),
		device_type,
	}
}

fn is_robot(ua: &str) -> bool {
	product_tokens(ua).any(|(name, _)| has_bot_marker(name))
		|| compatible_entries(ua).any(has_bot_marker)
}

fn has_bot_marker(name: &str) -> bool {
	let lower = name.to_ascii_lowercase();
	BOT_MARKERS.iter().any(|m| lower.contains(m))
}

/// `Name/version` pairs, both leading products and those inside comments.
fn product_tokens(ua: &str) -> impl Iterator<Item = (&str, &str)> + '_ {
	ua.split(|c: char| c == ';' || c == '(' || c == ')' || c.is_whitespace())
		.filter_map(|segment| segment.split_once('/'))
}

/// Entries of every `(compatible; ...)` comment, after the `compatible` marker.
fn compatible_entries(ua: &str) -> impl Iterator<Item = &str> + '_ {
	ua.split('(')
		.skip(1)
		.map(|rest| rest.split_once(')').map_or(rest, |(comment, _)| comment))
		.filter(|comment| {
			comment
				.split(';')
				.next()
				.is_some_and(|first| first.trim().eq_ignore_ascii_case("compatible"))
		})
		.flat_map(|comment| comment.split(';').skip(1).map(str::trim))
}

fn detect_browser(ua: &str, is_bot: bool, device: Option<DeviceType>) -> Option<Browser> {
	let browser_type = if is_bot {
		BrowserType::Robot
	} else if matches!(device, Some(DeviceType::Mobile | DeviceType::Tablet)) {
		BrowserType::MobileBrowser
	} else {
		BrowserType::Browser
	};

	if is_bot {
		return detect_robot_agent(ua).map(|(name, version)| Browser {
			name,
			browser_type,
			version,
		});
	}

	let found = BROWSER_TOKENS
		.iter()
		.find_map(|(token, name)| version_after(ua, token).map(|v| (name.to_string(), v)))
		.or_else(|| detect_safari(ua))
		.or_else(|| detect_internet_explorer(ua));

	found.map(|(name, version)| Browser {
		name,
		browser_type,
		version,
	})
}

fn detect_safari(ua: &str) -> Option<(String, String)> {
	if !ua.contains("Safari/") {
		return None;
	}
	version_after(ua, "Version/").map(|v| ("Safari".to_string(), v))
}

fn detect_internet_explorer(ua: &str) -> Option<(String, String)> {
	if let Some(v) = version_after(ua, "MSIE ") {
		return Some(("Internet Explorer".to_string(), v));
	}
	if ua.contains("Trident/") {
		return version_after(ua, "rv:").map(|v| ("Internet Explorer".to_string(), v));
	}
	None
}

/// Crawlers identify as `Name/version`, usually inside the comment
/// (`compatible; Googlebot/2.1; +http://...`) or as the leading product.
fn detect_robot_agent(ua: &str) -> Option<(String, String)> {
	product_tokens(ua)
		.find(|(name, _)| has_bot_marker(name))
		.and_then(|(name, rest)| {
			let version = leading_version(rest)?;
			Some((name.to_string(), version))
		})
}

fn detect_os(ua: &str) -> Option<OperatingSystem> {
	if let Some(nt) = version_after(ua, "Windows NT ") {
		let version = match nt.as_str() {
			"10.0" => "10".to_string(),
			"6.3" => "8.1".to_string(),
			"6.2" => "8".to_string(),
			"6.1" => "7".to_string(),
			"6.0" => "Vista".to_string(),
			"5.1" | "5.2" => "XP".to_string(),
			_ => nt,
		};
		return Some(os("Windows", version));
	}

	if ua.contains("iPhone") || ua.contains("iPad") || ua.contains("iPod") {
		let version = underscored_version_after(ua, "iPhone OS ")
			.or_else(|| underscored_version_after(ua, "CPU OS "))?;
		return Some(os("iOS", version));
	}

	if let Some(v) = version_after(ua, "Android ") {
		return Some(os("Android", v));
	}

	if let Some(v) = underscored_version_after(ua, "Mac OS X ") {
		return Some(os("macOS", v));
	}

	if let Some(rest) = token_suffix(ua, "CrOS ") {
		// `CrOS x86_64 15633.69.0`: platform first, then the build.
		let build = rest.split_whitespace().nth(1).and_then(leading_version)?;
		return Some(os("Chrome OS", build));
	}

	if let Some(rest) = token_suffix(ua, "Linux ") {
		// Desktop Linux only advertises the architecture.
		let arch: String = rest
			.chars()
			.take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
			.collect();
		if !arch.is_empty() {
			return Some(os("Linux", arch));
		}
	}

	None
}

fn os(name: &str, version: String) -> OperatingSystem {
	OperatingSystem {
		name: name.to_string(),
		version,
	}
}

fn detect_device(ua: &str, is_bot: bool) -> Option<DeviceType> {
	if is_bot {
		return Some(DeviceType::Robot);
	}
	if ["PlayStation", "Xbox", "Nintendo"]
		.iter()
		.any(|t| ua.contains(t))
	{
		return Some(DeviceType::GameConsole);
	}
	if ["SmartTV", "SMART-TV", "AppleTV", "Roku", "CrKey", "BRAVIA"]
		.iter()
		.any(|t| ua.contains(t))
	{
		return Some(DeviceType::DigitalMediaPlayer);
	}
	if ua.contains("Watch") {
		return Some(DeviceType::Wearable);
	}
	if ua.contains("iPad") || ua.contains("Tablet") || (ua.contains("Android") && !ua.contains("Mobile"))
	{
		return Some(DeviceType::Tablet);
	}
	if ["Mobile", "iPhone", "iPod", "Android"]
		.iter()
		.any(|t| ua.contains(t))
	{
		return Some(DeviceType::Mobile);
	}
	if ["Windows", "Macintosh", "X11", "CrOS", "Linux"]
		.iter()
		.any(|t| ua.contains(t))
	{
		return Some(DeviceType::Computer);
	}
	None
}

fn token_suffix<'a>(ua: &'a str, token: &str) -> Option<&'a str> {
	ua.find(token).map(|idx| &ua[idx + token.len()..])
}

/// Dotted numeric version directly following `token`.
fn version_after(ua: &str, token: &str) -> Option<String> {
	token_suffix(ua, token).and_then(leading_version)
}

/// iOS and macOS write versions with underscores (`17_1_2`).
fn underscored_version_after(ua: &str, token: &str) -> Option<String> {
	let rest = token_suffix(ua, token)?;
	let raw: String = rest
		.chars()
		.take_while(|c| c.is_ascii_digit() || *c == '_' || *c == '.')
		.collect();
	let version = raw.replace('_', ".");
	let version = version.trim_matches('.');
	if version.is_empty() {
		None
	} else {
		Some(version.to_string())
	}
}

fn leading_version(s: &str) -> Option<String> {
	let version: String = s
		.chars()
		.take_while(|c| c.is_ascii_digit() || *c == '.')
		.collect();
	let version = version.trim_end_matches('.');
	if version.is_empty() || !version.starts_with(|c: char| c.is_ascii_digit()) {
		None
	} else {
		Some(version.to_string())
	}
}
