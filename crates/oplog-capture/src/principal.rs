// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::future::Future;

use crate::record::Principal;

tokio::task_local! {
	static CURRENT_PRINCIPAL: Option<Principal>;
}

/// Supplies the authenticated actor for the current invocation.
///
/// Must not panic. `None` is a valid answer.
pub trait PrincipalResolver: Send + Sync {
	fn resolve(&self) -> Option<Principal>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrincipal;

impl PrincipalResolver for NoPrincipal {
	fn resolve(&self) -> Option<Principal> {
		None
	}
}

impl<F> PrincipalResolver for F
where
	F: Fn() -> Option<Principal> + Send + Sync,
{
	fn resolve(&self) -> Option<Principal> {
		self()
	}
}

/// Reads the principal installed by [`scope_principal`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskLocalPrincipalResolver;

impl PrincipalResolver for TaskLocalPrincipalResolver {
	fn resolve(&self) -> Option<Principal> {
		CURRENT_PRINCIPAL
			.try_with(|principal| principal.clone())
			.ok()
			.flatten()
	}
}

/// Run `fut` with `principal` visible to [`TaskLocalPrincipalResolver`].
pub async fn scope_principal<F>(principal: Option<Principal>, fut: F) -> F::Output
where
	F: Future,
{
	CURRENT_PRINCIPAL.scope(principal, fut).await
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn no_principal_resolves_none() {
		assert!(NoPrincipal.resolve().is_none());
	}

	#[test]
	fn closures_are_resolvers() {
		let resolver = || Some(Principal::new("7", "alice"));
		assert_eq!(resolver.resolve().unwrap().user_name, "alice");
	}

	#[test]
	fn task_local_outside_scope_is_none() {
		assert!(TaskLocalPrincipalResolver.resolve().is_none());
	}

	#[tokio::test]
	async fn task_local_inside_scope() {
		let principal = Principal::new("42", "jdoe");
		let seen = scope_principal(Some(principal.clone()), async {
			TaskLocalPrincipalResolver.resolve()
		})
		.await;
		assert_eq!(seen, Some(principal));
	}

	#[tokio::test]
	async fn nested_scopes_shadow() {
		let outer = Principal::new("1", "outer");
		let inner = Principal::new("2", "inner");
		let (seen_inner, seen_outer) = scope_principal(Some(outer), async {
			let seen_inner =
				scope_principal(Some(inner), async { TaskLocalPrincipalResolver.resolve() }).await;
			(seen_inner, TaskLocalPrincipalResolver.resolve())
		})
		.await;
		assert_eq!(seen_inner.unwrap().user_name, "inner");
		assert_eq!(seen_outer.unwrap().user_name, "outer");
	}
}
