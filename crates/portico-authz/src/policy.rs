//! Policy definition.

use std::collections::BTreeSet;

/// A named authorization rule.
///
/// Required roles are disjunctive: holding any one of them is enough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    name: String,
    required_roles: BTreeSet<String>,
}

impl Policy {
    pub(crate) fn new(name: String, required_roles: BTreeSet<String>) -> Self {
        Self {
            name,
            required_roles,
        }
    }

    /// Returns the policy name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the roles that satisfy this policy.
    #[must_use]
    pub fn required_roles(&self) -> &BTreeSet<String> {
        &self.required_roles
    }

    /// Returns `true` when `caller_roles` shares at least one role with the
    /// policy.
    #[must_use]
    pub fn allows(&self, caller_roles: &BTreeSet<String>) -> bool {
        !self.required_roles.is_disjoint(caller_roles)
    }
}
