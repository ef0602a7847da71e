//! The Convert workflow: scanned page images in, rendered deck out.
//!
//! Stages, in order:
//!
//! 1. `analyze_pages` — the bounded-concurrency vision fan-out, one unit per
//!    source image, intolerant of unit failure.
//! 2. `extract_assets` — for every image element the analysis found, crop
//!    the corresponding region out of the source image and point the
//!    element at the stored crop. This pass is tolerant per element: a
//!    failed crop keeps the model-assigned source and the run continues.
//! 3. `render` — the boundary call, single attempt.
//!
//! Deck geometry comes from the run configuration, not the model: the
//! canvas is fixed before analysis starts, and every page's coordinates are
//! normalized onto it by the analyzer.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::WorkflowConfig;
use crate::deck::{DeckConfig, Element, ImageElement, Page};
use crate::error::WorkflowError;
use crate::model::{ModelClient, PageImage};
use crate::pipeline::analyze::{AnalysisUnit, PageAnalyzer};
use crate::pipeline::normalize::source_region;
use crate::pipeline::step::StepRunner;
use crate::render::{RegionExtractor, RenderedDeck, Renderer};
use crate::workflow::{StateCell, WorkflowState};

/// Rebuilds a deck from scanned or exported page images.
pub struct ConvertWorkflow {
    model: Arc<dyn ModelClient>,
    renderer: Arc<dyn Renderer>,
    extractor: Arc<dyn RegionExtractor>,
    config: WorkflowConfig,
    state: StateCell,
}

impl ConvertWorkflow {
    pub fn new(
        model: Arc<dyn ModelClient>,
        renderer: Arc<dyn Renderer>,
        extractor: Arc<dyn RegionExtractor>,
        config: WorkflowConfig,
    ) -> Self {
        Self {
            model,
            renderer,
            extractor,
            config,
            state: StateCell::new(),
        }
    }

    /// Current lifecycle state; safe to poll from another task.
    pub fn state(&self) -> WorkflowState {
        self.state.get()
    }

    /// Run the workflow over `images`, one deck page per image, in order.
    pub async fn run(&self, images: Vec<PageImage>) -> Result<RenderedDeck, WorkflowError> {
        let outcome = self.execute(images).await;
        match &outcome {
            Ok(deck) => {
                info!(path = %deck.path.display(), pages = deck.page_count, "convert workflow completed");
                self.state.set(WorkflowState::Completed);
            }
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "convert workflow failed");
                self.state.set(WorkflowState::Failed {
                    error: e.to_string(),
                });
            }
        }
        outcome
    }

    async fn execute(&self, images: Vec<PageImage>) -> Result<RenderedDeck, WorkflowError> {
        if images.is_empty() {
            return Err(WorkflowError::EmptyInput {
                detail: "no page images to convert".into(),
            });
        }

        let runner = StepRunner::from_config(&self.config);
        let units: Vec<AnalysisUnit> = images
            .into_iter()
            .enumerate()
            .map(|(i, image)| AnalysisUnit {
                index: i + 1,
                image,
            })
            .collect();

        self.state.running("analyze_pages");
        let analyzer = PageAnalyzer::new(
            Arc::clone(&self.model),
            runner.clone(),
            self.config.max_concurrent,
            self.config.canvas,
        );
        let mut pages = analyzer.analyze_all(&units).await?;

        self.state.running("extract_assets");
        for (unit, page) in units.iter().zip(pages.iter_mut()) {
            self.extract_page_assets(unit, page).await;
        }

        self.state.running("render");
        let deck_config = self.deck_config();
        let rendered = runner
            .with_retries(1)
            .run("render", || {
                let renderer = Arc::clone(&self.renderer);
                let deck_config = &deck_config;
                let pages = &pages;
                async move {
                    let deck = renderer.render(deck_config, pages).await?;
                    Ok(deck)
                }
            })
            .await?;
        Ok(rendered)
    }

    /// Crop every image element of `page` out of its source image.
    ///
    /// Element identity is positional, so the asset id is derived from page
    /// and element index and the rewrite goes through
    /// [`Page::replace_element`]. Failures leave the element as analysis
    /// produced it.
    async fn extract_page_assets(&self, unit: &AnalysisUnit, page: &mut Page) {
        let (canvas_w, canvas_h) = self.config.canvas;
        for i in 0..page.elements.len() {
            let Element::Image(img) = &page.elements[i] else {
                continue;
            };
            let region = source_region(
                img.position,
                img.size,
                unit.image.width,
                unit.image.height,
                canvas_w,
                canvas_h,
            );
            let asset_id = format!("page{}_elem{}", page.index, i);
            match self.extractor.extract(&unit.image, region, &asset_id).await {
                Ok(path) => {
                    debug!(page = page.index, element = i, path = %path, "region extracted");
                    let replacement = ImageElement {
                        source: path,
                        ..img.clone()
                    };
                    page.replace_element(i, Element::Image(replacement));
                }
                Err(e) => {
                    warn!(page = page.index, element = i, error = %e,
                          "region extraction failed, keeping analysis source");
                }
            }
        }
    }

    fn deck_config(&self) -> DeckConfig {
        DeckConfig {
            size: self.config.deck_size,
            width: self.config.canvas.0,
            height: self.config.canvas.1,
            theme: self.config.theme.clone(),
            ..DeckConfig::default()
        }
    }
}
