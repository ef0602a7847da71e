//! The Create workflow: semi-structured text in, rendered deck out.
//!
//! Stages, in order:
//!
//! 1. `generate_composition` — one retried model call producing composition
//!    JSON.
//! 2. Validation — the Composition Validator, *outside* any retry wrapper:
//!    structurally invalid JSON will not become valid by re-parsing it, so a
//!    [`crate::error::ValidationError`] aborts the run on first occurrence.
//! 3. `generate_assets` (optional) — tolerant batch illustration generation,
//!    with resolved paths back-filled into the validated pages by whole-
//!    element replacement.
//! 4. `render` — the boundary call, single attempt.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::WorkflowConfig;
use crate::deck::{Element, ImageElement, Page};
use crate::error::WorkflowError;
use crate::model::ModelClient;
use crate::pipeline::assets::{AssetCoordinator, AssetRequest};
use crate::pipeline::step::StepRunner;
use crate::pipeline::validate;
use crate::prompts;
use crate::render::{RenderedDeck, Renderer};
use crate::workflow::{StateCell, WorkflowState};

/// Builds a deck from text content.
pub struct CreateWorkflow {
    model: Arc<dyn ModelClient>,
    renderer: Arc<dyn Renderer>,
    config: WorkflowConfig,
    assets: AssetCoordinator,
    state: StateCell,
}

impl CreateWorkflow {
    pub fn new(
        model: Arc<dyn ModelClient>,
        renderer: Arc<dyn Renderer>,
        config: WorkflowConfig,
    ) -> Self {
        let runner = StepRunner::from_config(&config);
        let assets = AssetCoordinator::new(Arc::clone(&model), runner, config.asset_concurrency);
        Self {
            model,
            renderer,
            config,
            assets,
            state: StateCell::new(),
        }
    }

    /// Current lifecycle state; safe to poll from another task.
    pub fn state(&self) -> WorkflowState {
        self.state.get()
    }

    /// Run the workflow over `content`.
    pub async fn run(&self, content: &str) -> Result<RenderedDeck, WorkflowError> {
        let outcome = self.execute(content).await;
        match &outcome {
            Ok(deck) => {
                info!(path = %deck.path.display(), pages = deck.page_count, "create workflow completed");
                self.state.set(WorkflowState::Completed);
            }
            Err(e) => {
                warn!(error = %e, kind = e.kind(), "create workflow failed");
                self.state.set(WorkflowState::Failed {
                    error: e.to_string(),
                });
            }
        }
        outcome
    }

    async fn execute(&self, content: &str) -> Result<RenderedDeck, WorkflowError> {
        if content.trim().is_empty() {
            return Err(WorkflowError::EmptyInput {
                detail: "no content to build a deck from".into(),
            });
        }

        let runner = StepRunner::from_config(&self.config);

        self.state.running("generate_composition");
        let prompt = prompts::composition_prompt(
            content,
            self.config.deck_size.as_str(),
            &self.config.theme,
        );
        let raw = runner
            .run("generate_composition", || {
                let model = Arc::clone(&self.model);
                let prompt = &prompt;
                async move {
                    let value = model
                        .generate_structured(prompt, Some(prompts::COMPOSITION_SYSTEM_PROMPT))
                        .await?;
                    Ok(value)
                }
            })
            .await?;

        self.state.running("validate_composition");
        let (deck_config, mut pages) = validate::parse_composition(&raw)?;
        if pages.is_empty() {
            return Err(WorkflowError::EmptyInput {
                detail: "model produced a composition with no pages".into(),
            });
        }

        if self.config.generate_assets {
            self.state.running("generate_assets");
            let requests = extract_asset_requests(&raw);
            if requests.is_empty() {
                debug!("no elements requested asset generation");
            } else {
                let resolved = self.assets.generate_all(&requests).await?;
                backfill_asset_paths(&mut pages, &resolved);
            }
        }

        self.state.running("render");
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
}

/// Pull generation requests out of the *raw* composition JSON.
///
/// The `generate` / `id` / `prompt` keys are request metadata, not element
/// state, so the validator drops them; they are read here from the raw tree
/// instead. An element opts in with `"generate": true` plus a non-empty id
/// and prompt.
pub(crate) fn extract_asset_requests(raw: &Value) -> Vec<AssetRequest> {
    let mut requests = Vec::new();
    let Some(pages) = raw.get("pages").and_then(Value::as_array) else {
        return requests;
    };
    for page in pages {
        let Some(elements) = page.get("elements").and_then(Value::as_array) else {
            continue;
        };
        for el in elements {
            if el.get("type").and_then(Value::as_str) != Some("image") {
                continue;
            }
            if el.get("generate").and_then(Value::as_bool) != Some(true) {
                continue;
            }
            let id = el.get("id").and_then(Value::as_str).unwrap_or("");
            let description = el.get("prompt").and_then(Value::as_str).unwrap_or("");
            if id.is_empty() || description.is_empty() {
                warn!("asset request without id or prompt, skipping");
                continue;
            }
            let width = el
                .pointer("/size/width")
                .and_then(Value::as_u64)
                .unwrap_or(400) as u32;
            let height = el
                .pointer("/size/height")
                .and_then(Value::as_u64)
                .unwrap_or(300) as u32;
            requests.push(AssetRequest {
                id: id.to_string(),
                description: description.to_string(),
                width,
                height,
            });
        }
    }
    requests
}

/// Rewrite image sources that reference a resolved asset id.
///
/// A source matches when it equals the id or contains it (the model emits
/// placeholders like `placeholder_img1` for id `img1`). An exact match wins
/// outright; among substring matches the longest id wins, so `img10` is
/// never claimed by `img1`. Matching elements are replaced wholesale through
/// [`Page::replace_element`]; unresolved sources keep their placeholder.
pub(crate) fn backfill_asset_paths(
    pages: &mut [Page],
    resolved: &std::collections::HashMap<String, String>,
) {
    for page in pages.iter_mut() {
        for i in 0..page.elements.len() {
            let Element::Image(img) = &page.elements[i] else {
                continue;
            };
            let hit = match resolved.get_key_value(&img.source) {
                Some(exact) => Some(exact),
                None => resolved
                    .iter()
                    .filter(|(id, _)| img.source.contains(id.as_str()))
                    .max_by_key(|(id, _)| id.len()),
            };
            if let Some((id, path)) = hit {
                debug!(page = page.index, element = i, id = %id, path = %path, "asset back-filled");
                let replacement = ImageElement {
                    source: path.clone(),
                    ..img.clone()
                };
                page.replace_element(i, Element::Image(replacement));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    use crate::deck::{FitMode, Position, Size};

    #[test]
    fn extract_requests_requires_opt_in() {
        let raw = json!({"pages": [{"elements": [
            {"type": "image", "source": "placeholder_a", "generate": true,
             "id": "a", "prompt": "a chart",
             "size": {"width": 640, "height": 480}},
            {"type": "image", "source": "kept.png"},
            {"type": "image", "source": "x", "generate": true, "id": "", "prompt": "no id"},
            {"type": "text", "content": "hi", "generate": true, "id": "t", "prompt": "nope"}
        ]}]});
        let requests = extract_asset_requests(&raw);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].id, "a");
        assert_eq!(requests[0].description, "a chart");
        assert_eq!((requests[0].width, requests[0].height), (640, 480));
    }

    fn img(source: &str) -> Element {
        Element::Image(ImageElement {
            position: Position { x: 0, y: 0 },
            size: Size {
                width: 10,
                height: 10,
            },
            z_index: 0,
            opacity: 1.0,
            source: source.to_string(),
            fit_mode: FitMode::Contain,
            alt_text: String::new(),
        })
    }

    #[test]
    fn backfill_replaces_matching_sources_only() {
        let mut page = Page::new(1);
        page.elements.push(img("placeholder_img1"));
        page.elements.push(img("img2"));
        page.elements.push(img("untouched.png"));

        let mut resolved = HashMap::new();
        resolved.insert("img1".to_string(), "/assets/img1.png".to_string());
        resolved.insert("img2".to_string(), "/assets/img2.png".to_string());

        let mut pages = vec![page];
        backfill_asset_paths(&mut pages, &resolved);

        let sources: Vec<_> = pages[0]
            .image_elements()
            .map(|i| i.source.as_str())
            .collect();
        assert_eq!(sources, vec!["/assets/img1.png", "/assets/img2.png", "untouched.png"]);
    }

    #[test]
    fn backfill_prefers_the_longest_matching_id() {
        // "img1" is a substring of "placeholder_img10"; the placeholder must
        // resolve to img10's asset on every run, not whichever id the map
        // yields first.
        let mut resolved = HashMap::new();
        resolved.insert("img1".to_string(), "/assets/img1.png".to_string());
        resolved.insert("img10".to_string(), "/assets/img10.png".to_string());

        for _ in 0..64 {
            let mut page = Page::new(1);
            page.elements.push(img("placeholder_img10"));
            page.elements.push(img("placeholder_img1"));

            let mut pages = vec![page];
            backfill_asset_paths(&mut pages, &resolved);

            let sources: Vec<_> = pages[0]
                .image_elements()
                .map(|i| i.source.as_str())
                .collect();
            assert_eq!(sources, vec!["/assets/img10.png", "/assets/img1.png"]);
        }
    }

    #[test]
    fn backfill_exact_match_beats_substring_match() {
        let mut resolved = HashMap::new();
        resolved.insert("img1".to_string(), "/assets/img1.png".to_string());
        resolved.insert("placeholder_img1".to_string(), "/assets/exact.png".to_string());

        let mut pages = vec![Page::new(1)];
        pages[0].elements.push(img("placeholder_img1"));
        backfill_asset_paths(&mut pages, &resolved);

        let source = pages[0].image_elements().next().map(|i| i.source.clone());
        assert_eq!(source.as_deref(), Some("/assets/exact.png"));
    }
}
