//! The ordered, immutable stage chain.
//!
//! ```text
//! error-interception → [custom…] → authentication → [custom…]
//!     → authorization → [custom…] → routing → handler
//! ```
//!
//! [`StageChain::build`] validates the ordering once at startup. After
//! that the chain is shared read-only by every request task.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info};

use crate::context::{RequestContext, RequestState};
use crate::error::PipelineError;
use crate::stage::{BoxedStage, Next, StageKind};
use crate::types::{Request, Response, ResponseExt};

/// A validated, fixed-order list of stages.
#[derive(Clone)]
pub struct StageChain {
    stages: Arc<[BoxedStage]>,
}

impl StageChain {
    /// Validates `stages` and builds the chain.
    ///
    /// Rules:
    /// - stage names are unique
    /// - each core kind appears exactly once
    /// - error interception is the first stage
    /// - authentication precedes authorization, which precedes routing
    /// - routing is the last stage
    pub fn build(stages: Vec<BoxedStage>) -> Result<Self, PipelineError> {
        let mut names = HashSet::new();
        for stage in &stages {
            if !names.insert(stage.name()) {
                return Err(PipelineError::DuplicateStageName {
                    name: stage.name().to_string(),
                });
            }
        }

        let mut positions = Vec::with_capacity(StageKind::REQUIRED.len());
        for kind in StageKind::REQUIRED {
            let mut found = stages
                .iter()
                .enumerate()
                .filter(|(_, stage)| stage.kind() == kind)
                .map(|(index, _)| index);
            let position = found.next().ok_or(PipelineError::MissingStage { kind })?;
            if found.next().is_some() {
                return Err(PipelineError::DuplicateStageKind { kind });
            }
            positions.push((kind, position));
        }

        if positions[0].1 != 0 {
            return Err(PipelineError::ErrorInterceptionNotFirst {
                found: stages[0].name().to_string(),
            });
        }

        for pair in positions.windows(2) {
            let (after, before_index) = pair[0];
            let (stage, index) = pair[1];
            if index < before_index {
                return Err(PipelineError::OutOfOrder { stage, after });
            }
        }

        let routing = positions[positions.len() - 1].1;
        if let Some(stage) = stages.get(routing + 1) {
            return Err(PipelineError::StageAfterRouting {
                name: stage.name().to_string(),
            });
        }

        info!(
            stages = ?stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "stage chain built"
        );
        Ok(Self {
            stages: stages.into(),
        })
    }

    /// Handles a request with a fresh context.
    pub async fn handle(&self, request: Request) -> Response {
        let mut ctx = RequestContext::new();
        self.process(&mut ctx, request).await
    }

    /// Runs `request` through every stage using `ctx`.
    ///
    /// Never fails: an error escaping the chain (which only happens if the
    /// interception stage itself returns one) is rendered as a production
    /// envelope.
    pub async fn process(&self, ctx: &mut RequestContext, request: Request) -> Response {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let response = match Next::new(&self.stages).run(ctx, request).await {
            Ok(response) => {
                if !ctx.state().is_terminal() {
                    ctx.transition(RequestState::Handled);
                }
                response
            }
            Err(error) => {
                let state = if error.category().is_client_error() {
                    RequestState::Rejected
                } else {
                    RequestState::Errored
                };
                ctx.transition(state);
                Response::envelope(&error, false)
            }
        };

        debug!(
            request_id = %ctx.request_id(),
            method = %method,
            path = %path,
            status = response.status().as_u16(),
            state = %ctx.state(),
            elapsed_ms = ctx.elapsed().as_millis() as u64,
            "request finished"
        );
        response
    }

    /// Stage names in execution order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always `false` for a built chain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl std::fmt::Debug for StageChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageChain")
            .field("stages", &self.stage_names())
            .finish()
    }
}
