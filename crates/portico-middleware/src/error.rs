//! Startup errors for the stage chain and route table.

use thiserror::Error;

use crate::stage::StageKind;

/// Errors detected while assembling the chain or the route table.
///
/// These are configuration errors: they can only occur at startup and
/// must stop the process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// Two stages share a name.
    #[error("stage name '{name}' is used more than once")]
    DuplicateStageName {
        /// The duplicated name.
        name: String,
    },

    /// A core stage is absent.
    #[error("required {kind} stage is missing")]
    MissingStage {
        /// The missing kind.
        kind: StageKind,
    },

    /// A core stage kind appears more than once.
    #[error("{kind} stage appears more than once")]
    DuplicateStageKind {
        /// The repeated kind.
        kind: StageKind,
    },

    /// Error interception is not the outermost stage.
    #[error("error interception must be the first stage, found '{found}' before it")]
    ErrorInterceptionNotFirst {
        /// The stage that precedes error interception.
        found: String,
    },

    /// Two core stages are out of order.
    #[error("{stage} stage must come after the {after} stage")]
    OutOfOrder {
        /// The misplaced kind.
        stage: StageKind,
        /// The kind it must follow.
        after: StageKind,
    },

    /// A stage follows routing and could never run.
    #[error("stage '{name}' is placed after routing and would never run")]
    StageAfterRouting {
        /// The unreachable stage.
        name: String,
    },

    /// A route group was declared twice.
    #[error("route group '{group}' is declared more than once")]
    DuplicateRouteGroup {
        /// The group name.
        group: String,
    },

    /// A route referenced a group that was never declared.
    #[error("route {method} {path} references undeclared group '{group}'")]
    UndeclaredRouteGroup {
        /// Route method.
        method: String,
        /// Route path pattern.
        path: String,
        /// The missing group.
        group: String,
    },

    /// A route group is bound to a policy the evaluator does not know.
    #[error("route group '{group}' is bound to unknown policy '{policy}'")]
    UnknownPolicy {
        /// The group name.
        group: String,
        /// The unregistered policy.
        policy: String,
    },

    /// The same method and path pattern were registered twice.
    #[error("route {method} {path} is registered more than once")]
    DuplicateRoute {
        /// Route method.
        method: String,
        /// Route path pattern.
        path: String,
    },

    /// A path pattern is malformed.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },
}
