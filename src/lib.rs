//! # slideforge
//!
//! Orchestration and validation core for turning semi-structured content
//! into a validated slide-deck description, then handing it to a renderer.
//!
//! Two workflows sit on top of a shared set of stages:
//!
//! ```text
//!   Create:   text ──▶ generate_composition ──▶ validate ──▶ [assets] ──▶ render
//!                        (retried model call)    (1 shot)    (tolerant)   (1 shot)
//!
//!   Convert:  images ──▶ analyze_pages ──▶ extract_assets ──▶ render
//!                        (bounded fan-out,   (per-element      (1 shot)
//!                         intolerant)         tolerant)
//! ```
//!
//! The crate owns orchestration, validation, and coordinate mapping.
//! Everything external is a trait seam:
//!
//! * [`ModelClient`] — the generative model (text and vision);
//! * [`Renderer`] — the binary document encoder;
//! * [`RegionExtractor`] — the image codec that crops page regions.
//!
//! Model output is never trusted: composition JSON passes through
//! [`pipeline::validate`] (strict on required data, lenient on optional
//! styling) and analysis output through the lenient parser in
//! [`pipeline::analyze`]. All geometry from scanned sources is mapped onto
//! the deck canvas by [`pipeline::normalize`].
//!
//! Every retried stage runs under the [`StepRunner`] policy: fixed delay,
//! total-attempt ceiling, every error kind retryable.

pub mod config;
pub mod deck;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod prompts;
pub mod render;
pub mod workflow;

pub use config::{WorkflowConfig, WorkflowConfigBuilder};
pub use deck::{
    Alignment, Background, Color, DeckConfig, DeckSize, Element, FitMode, FontConfig,
    ImageElement, Page, Position, Size, TextElement,
};
pub use error::{RenderError, StepError, ValidationError, WorkflowError};
pub use model::{ModelClient, ModelError, PageImage};
pub use pipeline::analyze::{AnalysisUnit, PageAnalyzer};
pub use pipeline::assets::{AssetCoordinator, AssetRequest};
pub use pipeline::step::StepRunner;
pub use render::{PixelRegion, RegionExtractor, RenderedDeck, Renderer};
pub use workflow::convert::ConvertWorkflow;
pub use workflow::create::CreateWorkflow;
pub use workflow::WorkflowState;
