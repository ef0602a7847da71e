//! Error types for the slideforge orchestration core.
//!
//! Three layers of failure exist, and each gets its own type:
//!
//! * [`crate::model::ModelError`] — what the external generative model can do
//!   to us (timeout, rate limit, bad credentials, everything else).
//! * [`StepError`] / [`ValidationError`] / [`RenderError`] — component-level
//!   failures: a retried stage exhausted its budget, untrusted JSON failed a
//!   structural requirement, or a boundary collaborator refused its one call.
//! * [`WorkflowError`] — the single umbrella surfaced to callers; every
//!   workflow run ends in exactly one of these (or success). Stage context
//!   travels inside, so an operator can tell *where* a run died without
//!   parsing log output.
//!
//! The Composition Validator never retries: malformed JSON will not become
//! valid on resubmission, so [`ValidationError`] aborts the workflow on first
//! occurrence.

use thiserror::Error;

use crate::model::ModelError;

/// A named workflow stage exhausted its retry budget.
///
/// `kind` is the [`WorkflowError::kind`] discriminant of the last underlying
/// failure, preserved so callers can distinguish "the model kept timing out"
/// from "the JSON never validated" without string matching.
#[derive(Debug, Clone, Error)]
#[error("Step '{step}' failed after {attempts} attempts ({kind}): {message}")]
pub struct StepError {
    pub step: String,
    pub attempts: u32,
    pub kind: &'static str,
    pub message: String,
}

/// Untrusted, model-produced JSON failed a structural requirement.
///
/// Carries the offending page and field where known. Lenient degradations
/// (unknown alignment, malformed colour) never raise this — only missing or
/// type-invalid *required* data does.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("Invalid deck config: {detail}")]
    DeckConfig { detail: String },

    #[error("Page {page}: missing required field '{field}'")]
    MissingField { page: usize, field: String },

    #[error("Page {page}: invalid value for '{field}': {detail}")]
    InvalidField {
        page: usize,
        field: String,
        detail: String,
    },

    #[error("Invalid colour value: '{value}' (expected #RRGGBB)")]
    InvalidColor { value: String },
}

impl ValidationError {
    /// The 1-based page this error refers to, when page context exists.
    pub fn page(&self) -> Option<usize> {
        match self {
            ValidationError::MissingField { page, .. }
            | ValidationError::InvalidField { page, .. } => Some(*page),
            _ => None,
        }
    }
}

/// The renderer or region-extractor boundary failed its single call.
#[derive(Debug, Clone, Error)]
#[error("Render failed: {detail}")]
pub struct RenderError {
    pub detail: String,
}

impl RenderError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// Everything a workflow run can surface to its caller.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// A retried stage exhausted its budget.
    #[error(transparent)]
    Step(#[from] StepError),

    /// Model output failed structural validation; not retried.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A model call failed outside any retry wrapper.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// The renderer or extractor boundary failed.
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Every request in an asset generation batch failed.
    ///
    /// Partial failure is tolerated and does NOT produce this — the result
    /// map simply comes back with fewer entries.
    #[error("All {failed} asset generation requests failed")]
    AllAssetsFailed { failed: usize },

    /// The workflow was handed nothing to work on.
    #[error("Empty input: {detail}")]
    EmptyInput { detail: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl WorkflowError {
    /// Stable discriminant name, carried into [`StepError::kind`].
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::Step(_) => "step",
            WorkflowError::Validation(_) => "validation",
            WorkflowError::Model(e) => e.kind(),
            WorkflowError::Render(_) => "render",
            WorkflowError::AllAssetsFailed { .. } => "assets",
            WorkflowError::EmptyInput { .. } => "empty_input",
            WorkflowError::InvalidConfig(_) => "config",
            WorkflowError::Internal(_) => "internal",
        }
    }
}
