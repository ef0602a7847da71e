//! The generative-model boundary.
//!
//! slideforge never speaks a vendor wire protocol itself. Everything it needs
//! from a model — composition JSON from text, free text, structured analysis
//! of an image — goes through the [`ModelClient`] trait, and every way a
//! model call can fail is collapsed into the four [`ModelError`] kinds.
//!
//! The Step Runner treats all four kinds as retryable, `AuthFailed`
//! included. A credential failure therefore burns its full retry budget
//! before surfacing; making it fail fast would be a policy change and
//! belongs in the retry layer, not here.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// One already-decoded source image handed into the Convert workflow.
///
/// `width`/`height` define the source coordinate space that the
/// Coordinate Normalizer maps onto the deck canvas. `data` is opaque to this
/// crate — the [`ModelClient`] implementation decides how to put it on the
/// wire, and the region extractor decides how to crop it.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Error taxonomy of the external generative model.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The call exceeded the client's own timeout.
    #[error("Model call timed out: {0}")]
    Timeout(String),

    /// The vendor rejected the call with a rate limit (HTTP 429 class).
    #[error("Model rate limit exceeded: {0}")]
    RateLimited(String),

    /// Credentials were rejected (HTTP 401/403 class).
    #[error("Model authentication failed: {0}")]
    AuthFailed(String),

    /// Everything else.
    #[error("Model call failed: {0}")]
    Generic(String),
}

impl ModelError {
    /// Stable discriminant name for logging and [`crate::error::StepError`].
    pub fn kind(&self) -> &'static str {
        match self {
            ModelError::Timeout(_) => "timeout",
            ModelError::RateLimited(_) => "rate_limited",
            ModelError::AuthFailed(_) => "auth_failed",
            ModelError::Generic(_) => "generic",
        }
    }
}

/// The external generative model, text and vision.
///
/// Implementations own all transport concerns: endpoints, credentials,
/// encoding images for the wire, and per-call timeouts (a timeout surfaces
/// here as [`ModelError::Timeout`] and is retried upstream like any other
/// failure).
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Ask the model for a structured (JSON) response.
    async fn generate_structured(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<Value, ModelError>;

    /// Ask the model for a free-text response.
    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, ModelError>;

    /// Ask the vision model to analyze one image, returning structured JSON.
    async fn analyze_image(
        &self,
        image: &PageImage,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<Value, ModelError>;
}
