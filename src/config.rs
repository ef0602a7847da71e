//! Workflow configuration.
//!
//! Every knob for a Create or Convert run lives in [`WorkflowConfig`], built
//! via its [`WorkflowConfigBuilder`]. Keeping them in one struct makes it
//! trivial to share a config across a process, log it, and diff two runs to
//! understand why their outputs differ.

use std::time::Duration;

use crate::deck::DeckSize;
use crate::error::WorkflowError;

/// Configuration for one workflow run.
///
/// Built via [`WorkflowConfig::builder()`] or [`WorkflowConfig::default()`].
///
/// # Example
/// ```rust
/// use slideforge::WorkflowConfig;
///
/// let config = WorkflowConfig::builder()
///     .max_retries(5)
///     .max_concurrent(8)
///     .theme("corporate")
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Total attempt ceiling for each retried stage (not additional
    /// attempts). Default: 3.
    ///
    /// Model calls fail transiently all the time under concurrent load;
    /// three attempts absorb the vast majority without stalling a run.
    /// The render stage ignores this and always runs with a single attempt.
    pub max_retries: u32,

    /// Fixed delay between attempts. Default: 1 s.
    ///
    /// Deliberately fixed, not exponential — retry pacing is uniform across
    /// every error kind at this layer.
    pub retry_delay: Duration,

    /// Concurrency ceiling for the per-page analysis fan-out. Default: 3.
    ///
    /// Units beyond the ceiling are scheduled but perform no work (and burn
    /// no model quota) until a slot frees.
    pub max_concurrent: usize,

    /// Concurrency ceiling for asset generation. Default: 3.
    pub asset_concurrency: usize,

    /// Visual theme passed to the composition prompt. Default: "default".
    pub theme: String,

    /// Deck format requested from the model in the Create workflow.
    /// Default: 16:9.
    pub deck_size: DeckSize,

    /// Target canvas for coordinate normalization in the Convert workflow.
    /// Default: 1920×1080.
    pub canvas: (u32, u32),

    /// Whether the Create workflow runs the asset generation pass.
    /// Default: false.
    pub generate_assets: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
            max_concurrent: 3,
            asset_concurrency: 3,
            theme: "default".to_string(),
            deck_size: DeckSize::Widescreen16x9,
            canvas: (1920, 1080),
            generate_assets: false,
        }
    }
}

impl WorkflowConfig {
    /// Create a new builder for `WorkflowConfig`.
    pub fn builder() -> WorkflowConfigBuilder {
        WorkflowConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`WorkflowConfig`].
#[derive(Debug)]
pub struct WorkflowConfigBuilder {
    config: WorkflowConfig,
}

impl WorkflowConfigBuilder {
    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.config.max_concurrent = n;
        self
    }

    pub fn asset_concurrency(mut self, n: usize) -> Self {
        self.config.asset_concurrency = n;
        self
    }

    pub fn theme(mut self, theme: impl Into<String>) -> Self {
        self.config.theme = theme.into();
        self
    }

    pub fn deck_size(mut self, size: DeckSize) -> Self {
        self.config.deck_size = size;
        // Keep the canvas consistent with named formats; Custom leaves it
        // to an explicit canvas() call.
        if let Some(dims) = size.dimensions() {
            self.config.canvas = dims;
        }
        self
    }

    pub fn canvas(mut self, width: u32, height: u32) -> Self {
        self.config.canvas = (width, height);
        self
    }

    pub fn generate_assets(mut self, v: bool) -> Self {
        self.config.generate_assets = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<WorkflowConfig, WorkflowError> {
        let c = &self.config;
        if c.max_retries == 0 {
            return Err(WorkflowError::InvalidConfig(
                "max_retries must be ≥ 1 (it is the total attempt ceiling)".into(),
            ));
        }
        if c.max_concurrent == 0 || c.asset_concurrency == 0 {
            return Err(WorkflowError::InvalidConfig(
                "concurrency ceilings must be ≥ 1".into(),
            ));
        }
        if c.canvas.0 == 0 || c.canvas.1 == 0 {
            return Err(WorkflowError::InvalidConfig(format!(
                "canvas must have positive dimensions, got {}x{}",
                c.canvas.0, c.canvas.1
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = WorkflowConfig::default();
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.retry_delay, Duration::from_secs(1));
        assert_eq!(c.max_concurrent, 3);
        assert_eq!(c.canvas, (1920, 1080));
        assert!(!c.generate_assets);
    }

    #[test]
    fn deck_size_updates_canvas() {
        let c = WorkflowConfig::builder()
            .deck_size(DeckSize::Standard4x3)
            .build()
            .unwrap();
        assert_eq!(c.canvas, (1024, 768));
    }

    #[test]
    fn zero_retries_rejected() {
        assert!(WorkflowConfig::builder().max_retries(0).build().is_err());
    }

    #[test]
    fn zero_concurrency_rejected() {
        assert!(WorkflowConfig::builder().max_concurrent(0).build().is_err());
    }
}
