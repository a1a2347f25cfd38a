// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Declared metadata for guarded operations.
//!
//! An operation may carry a class-level and a method-level declaration for
//! each [`LogKind`]. The two are merged once, when the operation is
//! registered, and the resulting [`ResolvedMetadata`] is stored on the
//! [`GuardedOperation`]. Method-level fields override class-level ones field
//! by field; a conflict is never an error.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
	Log,
	Audit,
}

impl LogKind {
	/// Audit records are mandatory: their delivery failures are logged at
	/// error level.
	pub fn is_mandatory(&self) -> bool {
		matches!(self, LogKind::Audit)
	}
}

impl fmt::Display for LogKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			LogKind::Log => f.write_str("log"),
			LogKind::Audit => f.write_str("audit"),
		}
	}
}

/// One declaration site. Unset fields inherit from the enclosing level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDeclaration {
	pub event: Option<String>,
	pub business_type: Option<String>,
	pub description: Option<String>,
}

impl MetadataDeclaration {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn event(mut self, event: impl Into<String>) -> Self {
		self.event = Some(event.into());
		self
	}

	pub fn business_type(mut self, business_type: impl Into<String>) -> Self {
		self.business_type = Some(business_type.into());
		self
	}

	pub fn description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	/// Merge another declaration into this one. Fields set in `other` win.
	pub fn merge(&mut self, other: MetadataDeclaration) {
		if other.event.is_some() {
			self.event = other.event;
		}
		if other.business_type.is_some() {
			self.business_type = other.business_type;
		}
		if other.description.is_some() {
			self.description = other.description;
		}
	}

	pub fn resolve(
		class_level: Option<&MetadataDeclaration>,
		method_level: Option<&MetadataDeclaration>,
		kind: LogKind,
	) -> ResolvedMetadata {
		let mut merged = class_level.cloned().unwrap_or_default();
		if let Some(method_level) = method_level {
			merged.merge(method_level.clone());
		}

		ResolvedMetadata {
			kind,
			event: merged.event,
			business_type: merged.business_type,
			description: merged.description,
		}
	}
}

/// The effective metadata for one declaration of a guarded operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMetadata {
	pub kind: LogKind,
	pub event: Option<String>,
	pub business_type: Option<String>,
	pub description: Option<String>,
}

impl ResolvedMetadata {
	pub fn new(kind: LogKind) -> Self {
		Self {
			kind,
			event: None,
			business_type: None,
			description: None,
		}
	}
}

/// A registered guarded operation with its precomputed metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardedOperation {
	name: String,
	log: Option<ResolvedMetadata>,
	audit: Option<ResolvedMetadata>,
}

impl GuardedOperation {
	pub fn builder(name: impl Into<String>) -> GuardedOperationBuilder {
		GuardedOperationBuilder::new(name)
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn log(&self) -> Option<&ResolvedMetadata> {
		self.log.as_ref()
	}

	pub fn audit(&self) -> Option<&ResolvedMetadata> {
		self.audit.as_ref()
	}

	/// Declarations in dispatch order: plain log first, then audit.
	pub fn declarations(&self) -> impl Iterator<Item = &ResolvedMetadata> {
		self.log.iter().chain(self.audit.iter())
	}
}

#[derive(Debug, Default)]
pub struct GuardedOperationBuilder {
	name: String,
	class_log: Option<MetadataDeclaration>,
	method_log: Option<MetadataDeclaration>,
	class_audit: Option<MetadataDeclaration>,
	method_audit: Option<MetadataDeclaration>,
}

impl GuardedOperationBuilder {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Default::default()
		}
	}

	pub fn class_log(mut self, declaration: MetadataDeclaration) -> Self {
		self.class_log = Some(declaration);
		self
	}

	pub fn method_log(mut self, declaration: MetadataDeclaration) -> Self {
		self.method_log = Some(declaration);
		self
	}

	pub fn class_audit(mut self, declaration: MetadataDeclaration) -> Self {
		self.class_audit = Some(declaration);
		self
	}

	pub fn method_audit(mut self, declaration: MetadataDeclaration) -> Self {
		self.method_audit = Some(declaration);
		self
	}

	pub fn build(self) -> GuardedOperation {
		let log = resolve_level(
			self.class_log.as_ref(),
			self.method_log.as_ref(),
			LogKind::Log,
		);
		let audit = resolve_level(
			self.class_audit.as_ref(),
			self.method_audit.as_ref(),
			LogKind::Audit,
		);

		GuardedOperation {
			name: self.name,
			log,
			audit,
		}
	}
}

/// A kind is declared when either level declares it.
fn resolve_level(
	class_level: Option<&MetadataDeclaration>,
	method_level: Option<&MetadataDeclaration>,
	kind: LogKind,
) -> Option<ResolvedMetadata> {
	if class_level.is_none() && method_level.is_none() {
		return None;
	}
	Some(MetadataDeclaration::resolve(class_level, method_level, kind))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn method_level_overrides_class_level() {
		let class = MetadataDeclaration::new()
			.event("Y")
			.business_type("ORDER")
			.description("class description");
		let method = MetadataDeclaration::new().event("X");

		let resolved = MetadataDeclaration::resolve(Some(&class), Some(&method), LogKind::Audit);

		assert_eq!(resolved.event.as_deref(), Some("X"));
		assert_eq!(resolved.business_type.as_deref(), Some("ORDER"));
		assert_eq!(resolved.description.as_deref(), Some("class description"));
		assert_eq!(resolved.kind, LogKind::Audit);
	}

	#[test]
	fn method_level_alone() {
		let method = MetadataDeclaration::new().event("order.cancel");
		let resolved = MetadataDeclaration::resolve(None, Some(&method), LogKind::Log);
		assert_eq!(resolved.event.as_deref(), Some("order.cancel"));
		assert!(resolved.business_type.is_none());
	}

	#[test]
	fn neither_level_is_all_unset() {
		let resolved = MetadataDeclaration::resolve(None, None, LogKind::Log);
		assert_eq!(resolved, ResolvedMetadata::new(LogKind::Log));
	}

	#[test]
	fn merge_keeps_base_when_other_unset() {
		let mut base = MetadataDeclaration::new().event("a").description("d");
		base.merge(MetadataDeclaration::new().business_type("B"));
		assert_eq!(base.event.as_deref(), Some("a"));
		assert_eq!(base.business_type.as_deref(), Some("B"));
		assert_eq!(base.description.as_deref(), Some("d"));
	}

	#[test]
	fn audit_is_mandatory() {
		assert!(LogKind::Audit.is_mandatory());
		assert!(!LogKind::Log.is_mandatory());
	}

	mod guarded_operation {
		use super::*;

		#[test]
		fn precomputes_both_kinds() {
			let op = GuardedOperation::builder("OrderService::create")
				.class_log(MetadataDeclaration::new().business_type("ORDER"))
				.method_log(MetadataDeclaration::new().event("order.create"))
				.method_audit(MetadataDeclaration::new().event("order.create.audit"))
				.build();

			let log = op.log().unwrap();
			assert_eq!(log.kind, LogKind::Log);
			assert_eq!(log.event.as_deref(), Some("order.create"));
			assert_eq!(log.business_type.as_deref(), Some("ORDER"));

			let audit = op.audit().unwrap();
			assert_eq!(audit.kind, LogKind::Audit);
			assert!(audit.business_type.is_none());
		}

		#[test]
		fn declarations_yield_log_before_audit() {
			let op = GuardedOperation::builder("op")
				.class_audit(MetadataDeclaration::new())
				.class_log(MetadataDeclaration::new())
				.build();

			let kinds: Vec<_> = op.declarations().map(|m| m.kind).collect();
			assert_eq!(kinds, vec![LogKind::Log, LogKind::Audit]);
		}

		#[test]
		fn undeclared_operation_has_no_declarations() {
			let op = GuardedOperation::builder("op").build();
			assert_eq!(op.name(), "op");
			assert_eq!(op.declarations().count(), 0);
		}
	}
}
