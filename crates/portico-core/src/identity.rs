//! Caller identity.
//!
//! The authentication stage turns a validated credential into a
//! [`CallerIdentity`]; the authorization stage only ever looks at the role
//! set it exposes.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

static NO_ROLES: BTreeSet<String> = BTreeSet::new();

/// Claims carried by an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Stable subject identifier (user id, client id).
    pub subject: String,

    /// Optional display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Role names held by the caller. Comparison is case-sensitive.
    #[serde(default)]
    pub roles: BTreeSet<String>,
}

impl Claims {
    /// Creates claims for `subject` with no roles.
    #[must_use]
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            name: None,
            roles: BTreeSet::new(),
        }
    }

    /// Adds a role.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    /// Adds several roles.
    #[must_use]
    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// The caller of a request.
///
/// # Example
///
/// ```
/// use portico_core::{CallerIdentity, Claims};
///
/// let caller = CallerIdentity::Authenticated(Claims::new("u-1").with_role("Admin"));
/// assert!(caller.has_role("Admin"));
/// assert_eq!(caller.log_id(), "user:u-1");
///
/// assert!(CallerIdentity::Anonymous.roles().is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "claims", rename_all = "snake_case")]
pub enum CallerIdentity {
    /// No credential was presented.
    #[default]
    Anonymous,
    /// A credential was presented and validated.
    Authenticated(Claims),
}

impl CallerIdentity {
    /// Returns `true` if a validated credential backs this identity.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// Returns the caller's role set. Anonymous callers hold no roles.
    #[must_use]
    pub fn roles(&self) -> &BTreeSet<String> {
        match self {
            Self::Anonymous => &NO_ROLES,
            Self::Authenticated(claims) => &claims.roles,
        }
    }

    /// Returns `true` if the caller holds `role`.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles().contains(role)
    }

    /// Returns the claims, if authenticated.
    #[must_use]
    pub const fn claims(&self) -> Option<&Claims> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(claims) => Some(claims),
        }
    }

    /// Returns an identifier suitable for logs. Never includes credentials.
    #[must_use]
    pub fn log_id(&self) -> String {
        match self {
            Self::Anonymous => "anonymous".to_string(),
            Self::Authenticated(claims) => format!("user:{}", claims.subject),
        }
    }
}
