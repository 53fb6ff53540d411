//! # Portico Authz
//!
//! Named role-based authorization policies.
//!
//! A policy names a set of required roles; a caller satisfies it when it
//! holds at least one of them. Policies are registered once at startup on a
//! [`PolicyRegistry`], which is then frozen into a [`PolicyEvaluator`]. The
//! split makes "all registrations happen before the first evaluation" a
//! property of the types rather than a convention.
//!
//! ```
//! use portico_authz::PolicyRegistry;
//! use std::collections::BTreeSet;
//!
//! let mut registry = PolicyRegistry::new();
//! registry.register("OnlyAdmins", ["SuperAdmin", "Admin"]).unwrap();
//! let evaluator = registry.build();
//!
//! let roles: BTreeSet<String> = ["Admin".to_string()].into();
//! assert!(evaluator.evaluate("OnlyAdmins", &roles).unwrap());
//! assert!(evaluator.evaluate("Missing", &roles).is_err());
//! ```

#![doc(html_root_url = "https://docs.rs/portico-authz/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod evaluator;
mod policy;

pub use error::{AuthzError, AuthzResult};
pub use evaluator::{PolicyEvaluator, PolicyRegistry};
pub use policy::Policy;
