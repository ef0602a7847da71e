//! Renderer and region-extractor boundaries.
//!
//! The binary document encoder and the image codec live outside this crate;
//! these traits are the seams the workflows hand off to. The renderer is
//! called exactly once per run, after validation — a failed render is not
//! transient, so the workflows wrap it with a single-attempt Step Runner.

use async_trait::async_trait;
use std::path::PathBuf;

use crate::deck::{DeckConfig, Page};
use crate::error::RenderError;
use crate::model::PageImage;

/// Opaque handle to a rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDeck {
    /// Where the encoder put the document.
    pub path: PathBuf,
    /// How many pages it rendered.
    pub page_count: usize,
}

/// Consumes the final validated entities and produces a binary document.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render the whole deck in one atomic call.
    ///
    /// No partially validated deck ever reaches this method; by the time a
    /// workflow calls it, every page has passed the Composition Validator.
    async fn render(&self, config: &DeckConfig, pages: &[Page]) -> Result<RenderedDeck, RenderError>;
}

/// A rectangle in a source image's own pixel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Crops a region out of a source page image and persists it as an asset.
///
/// Used by the Convert workflow once per detected image element; the region
/// is addressed by page and element index, which only exist after the
/// analysis fan-out has completed. A failed extraction is tolerated — the
/// element keeps its model-assigned source.
#[async_trait]
pub trait RegionExtractor: Send + Sync {
    /// Extract `region` from `image`, store it under `asset_id`, and return
    /// the stored asset's path or identifier.
    async fn extract(
        &self,
        image: &PageImage,
        region: PixelRegion,
        asset_id: &str,
    ) -> Result<String, RenderError>;
}
