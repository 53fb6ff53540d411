//! Policy registration and evaluation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use portico_core::CallerIdentity;
use tracing::{debug, info};

use crate::error::{AuthzError, AuthzResult};
use crate::policy::Policy;

/// Collects policies during startup.
///
/// Call [`build`](Self::build) once every policy is registered to obtain the
/// immutable [`PolicyEvaluator`].
#[derive(Debug, Default)]
pub struct PolicyRegistry {
    policies: BTreeMap<String, Policy>,
}

impl PolicyRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a named policy.
    ///
    /// Fails when the name is empty, already registered, or when no roles
    /// are given (such a policy could never allow anyone).
    pub fn register<I, S>(&mut self, name: impl Into<String>, required_roles: I) -> AuthzResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(AuthzError::InvalidPolicyName);
        }
        if self.policies.contains_key(&name) {
            return Err(AuthzError::DuplicatePolicy { name });
        }

        let required_roles: BTreeSet<String> = required_roles
            .into_iter()
            .map(Into::into)
            .filter(|role: &String| !role.trim().is_empty())
            .collect();
        if required_roles.is_empty() {
            return Err(AuthzError::EmptyPolicy { name });
        }

        info!(policy = %name, roles = ?required_roles, "registered authorization policy");
        self.policies
            .insert(name.clone(), Policy::new(name, required_roles));
        Ok(())
    }

    /// Returns the number of registered policies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> PolicyEvaluator {
        PolicyEvaluator {
            policies: Arc::new(self.policies),
        }
    }
}

/// Immutable, cheaply cloneable set of named policies.
///
/// Evaluation is pure: the same name and role set always yield the same
/// answer, so the evaluator can be shared freely across request tasks.
#[derive(Debug, Clone, Default)]
pub struct PolicyEvaluator {
    policies: Arc<BTreeMap<String, Policy>>,
}

impl PolicyEvaluator {
    /// Evaluates `name` against the caller's roles.
    ///
    /// Returns [`AuthzError::UnknownPolicy`] for names that were never
    /// registered.
    pub fn evaluate(&self, name: &str, caller_roles: &BTreeSet<String>) -> AuthzResult<bool> {
        let policy = self
            .policies
            .get(name)
            .ok_or_else(|| AuthzError::UnknownPolicy {
                name: name.to_string(),
            })?;

        let allowed = policy.allows(caller_roles);
        debug!(policy = name, allowed, "policy evaluated");
        Ok(allowed)
    }

    /// Evaluates `name` against a caller identity.
    pub fn evaluate_identity(&self, name: &str, caller: &CallerIdentity) -> AuthzResult<bool> {
        self.evaluate(name, caller.roles())
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    /// Looks up a policy by name.
    #[must_use]
    pub fn policy(&self, name: &str) -> Option<&Policy> {
        self.policies.get(name)
    }

    /// Returns registered policy names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(String::as_str)
    }

    /// Returns the number of policies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.policies.len()
    }

    /// Returns `true` if no policies are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
