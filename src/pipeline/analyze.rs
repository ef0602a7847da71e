//! Bounded-concurrency per-page analysis for the Convert workflow.
//!
//! Each source page image becomes one analysis unit. Units run concurrently
//! under a semaphore ceiling; a unit past the ceiling is scheduled but holds
//! no model call in flight until a slot frees. The fan-out is *intolerant*:
//! the first unit to exhaust its retries fails the whole batch, because a
//! deck with a silently missing page is worse than no deck.
//!
//! Results come back index-aligned with the input units regardless of
//! completion order.
//!
//! Analysis output is parsed leniently, unlike composition output: the
//! vision model is describing what it sees, so a field it could not read is
//! absence of information, not a structural defect. Missing geometry falls
//! back to defaults instead of aborting.

use std::sync::Arc;

use futures::future::try_join_all;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::deck::{Element, ImageElement, Page, TextElement};
use crate::error::WorkflowError;
use crate::model::{ModelClient, PageImage};
use crate::pipeline::normalize::{normalize_position, normalize_size};
use crate::pipeline::step::StepRunner;
use crate::pipeline::validate;
use crate::prompts;

/// One page image awaiting analysis. `index` is the 1-based deck position
/// the resulting page will occupy.
#[derive(Debug, Clone)]
pub struct AnalysisUnit {
    pub index: usize,
    pub image: PageImage,
}

/// Runs the per-page vision analysis fan-out.
pub struct PageAnalyzer {
    model: Arc<dyn ModelClient>,
    runner: StepRunner,
    max_concurrent: usize,
    canvas: (u32, u32),
}

impl PageAnalyzer {
    pub fn new(
        model: Arc<dyn ModelClient>,
        runner: StepRunner,
        max_concurrent: usize,
        canvas: (u32, u32),
    ) -> Self {
        Self {
            model,
            runner,
            max_concurrent: max_concurrent.max(1),
            canvas,
        }
    }

    /// Analyze every unit, at most `max_concurrent` in flight.
    ///
    /// The returned pages are aligned with `units`: `result[i]` always came
    /// from `units[i]`, whatever order the model answered in. The first unit
    /// to fail (after its retries) aborts the batch.
    pub async fn analyze_all(&self, units: &[AnalysisUnit]) -> Result<Vec<Page>, WorkflowError> {
        if units.is_empty() {
            return Ok(Vec::new());
        }
        info!(
            units = units.len(),
            max_concurrent = self.max_concurrent,
            "starting page analysis fan-out"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let prompt = prompts::analysis_prompt(self.canvas.0, self.canvas.1);

        let tasks = units.iter().map(|unit| {
            let semaphore = Arc::clone(&semaphore);
            let prompt = &prompt;
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| WorkflowError::Internal(format!("semaphore closed: {e}")))?;
                self.analyze_one(unit, prompt).await
            }
        });

        // try_join_all keeps input order and cancels the rest on first error.
        try_join_all(tasks).await
    }

    async fn analyze_one(&self, unit: &AnalysisUnit, prompt: &str) -> Result<Page, WorkflowError> {
        let step = format!("analyze_page_{}", unit.index);
        let raw = self
            .runner
            .run(&step, || {
                let model = Arc::clone(&self.model);
                let image = &unit.image;
                async move {
                    let value = model
                        .analyze_image(image, prompt, Some(prompts::ANALYSIS_SYSTEM_PROMPT))
                        .await?;
                    Ok(value)
                }
            })
            .await?;

        let page = parse_analysis(&raw, unit.index, &unit.image, self.canvas);
        debug!(
            page = unit.index,
            elements = page.elements.len(),
            "page analysis complete"
        );
        Ok(page)
    }
}

/// Turn one raw analysis object into a page, normalizing source-pixel
/// geometry onto the deck canvas.
///
/// Every field is optional here. Unknown element types are dropped; missing
/// geometry defaults to the origin and a 100×50 source box.
pub fn parse_analysis(raw: &Value, index: usize, image: &PageImage, canvas: (u32, u32)) -> Page {
    let mut page = Page::new(index);
    page.title = raw
        .get("title")
        .and_then(Value::as_str)
        .map(str::to_string);

    if let Some(bg) = raw.get("background") {
        if let crate::deck::Background::Color(color) = validate::parse_background(bg) {
            page.background_color = Some(color);
        }
    }

    let Some(raw_elements) = raw.get("elements").and_then(Value::as_array) else {
        warn!(page = index, "analysis returned no element array");
        return page;
    };

    for el in raw_elements {
        let (x, y) = point(el.get("position"));
        let (width, height) = extent(el.get("size"));
        let position = normalize_position(x, y, image.width, image.height, canvas.0, canvas.1);
        let size = normalize_size(width, height, image.width, image.height, canvas.0, canvas.1);
        let style = el.get("style").unwrap_or(&Value::Null);

        match el.get("type").and_then(Value::as_str) {
            Some("text") => page.elements.push(Element::Text(TextElement {
                position,
                size,
                z_index: validate::parse_z_index(el),
                opacity: validate::parse_opacity(el),
                content: el
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
                font: validate::parse_font(style.get("font").or(Some(style))),
                alignment: validate::parse_alignment(style.get("alignment")),
                line_spacing: 1.0,
            })),
            Some("image") => page.elements.push(Element::Image(ImageElement {
                position,
                size,
                z_index: validate::parse_z_index(el),
                opacity: validate::parse_opacity(el),
                source: el
                    .get("source")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
                fit_mode: validate::parse_fit_mode(el.get("fitMode")),
                alt_text: el
                    .get("altText")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string(),
            })),
            other => {
                warn!(page = index, element_type = ?other, "unknown analysis element type, dropping");
            }
        }
    }
    page
}

fn point(value: Option<&Value>) -> (u32, u32) {
    let x = value
        .and_then(|v| v.get("x"))
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite() && *n >= 0.0)
        .unwrap_or(0.0);
    let y = value
        .and_then(|v| v.get("y"))
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite() && *n >= 0.0)
        .unwrap_or(0.0);
    (x as u32, y as u32)
}

fn extent(value: Option<&Value>) -> (u32, u32) {
    let width = value
        .and_then(|v| v.get("width"))
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite() && *n >= 1.0)
        .unwrap_or(100.0);
    let height = value
        .and_then(|v| v.get("height"))
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite() && *n >= 1.0)
        .unwrap_or(50.0);
    (width as u32, height as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::model::ModelError;

    fn unit(index: usize, tag: u8) -> AnalysisUnit {
        AnalysisUnit {
            index,
            image: PageImage {
                data: vec![tag],
                width: 800,
                height: 600,
            },
        }
    }

    fn fast_runner() -> StepRunner {
        StepRunner::new(3, Duration::from_millis(1))
    }

    /// Model that answers after a short pause, tracking the in-flight
    /// high-water mark. The first data byte of each image tags the answer.
    struct GaugedModel {
        in_flight: AtomicUsize,
        high_water: AtomicUsize,
        /// image tags that fail this many times before succeeding
        failures: Mutex<std::collections::HashMap<u8, u32>>,
        calls: AtomicU32,
    }

    impl GaugedModel {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                high_water: AtomicUsize::new(0),
                failures: Mutex::new(std::collections::HashMap::new()),
                calls: AtomicU32::new(0),
            }
        }

        fn failing(tag: u8, times: u32) -> Self {
            let model = Self::new();
            model.failures.lock().unwrap().insert(tag, times);
            model
        }
    }

    #[async_trait]
    impl ModelClient for GaugedModel {
        async fn generate_structured(
            &self,
            _prompt: &str,
            _system: Option<&str>,
        ) -> Result<Value, ModelError> {
            Err(ModelError::Generic("not used".into()))
        }

        async fn generate_text(
            &self,
            _prompt: &str,
            _system: Option<&str>,
        ) -> Result<String, ModelError> {
            Err(ModelError::Generic("not used".into()))
        }

        async fn analyze_image(
            &self,
            image: &PageImage,
            _prompt: &str,
            _system: Option<&str>,
        ) -> Result<Value, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.high_water.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let tag = image.data[0];
            {
                let mut failures = self.failures.lock().unwrap();
                if let Some(left) = failures.get_mut(&tag) {
                    if *left > 0 {
                        *left -= 1;
                        return Err(ModelError::Timeout(format!("unit {tag} busy")));
                    }
                }
            }
            Ok(json!({
                "title": format!("page-{tag}"),
                "elements": [{
                    "type": "text",
                    "position": {"x": 0, "y": 0},
                    "size": {"width": 400, "height": 300},
                    "content": format!("content-{tag}")
                }]
            }))
        }
    }

    fn analyzer(model: Arc<GaugedModel>, k: usize) -> PageAnalyzer {
        PageAnalyzer::new(model, fast_runner(), k, (1920, 1080))
    }

    #[tokio::test(start_paused = true)]
    async fn results_align_with_input_order() {
        let model = Arc::new(GaugedModel::new());
        let units: Vec<_> = (1..=5).map(|i| unit(i, i as u8)).collect();
        // Ceilings below, at, and above the unit count all preserve order.
        for k in [1, 3, 5, 8] {
            let pages = analyzer(Arc::clone(&model), k).analyze_all(&units).await.unwrap();
            let titles: Vec<_> = pages.iter().map(|p| p.title.clone().unwrap()).collect();
            assert_eq!(
                titles,
                vec!["page-1", "page-2", "page-3", "page-4", "page-5"],
                "k = {k}"
            );
            assert_eq!(pages.iter().map(|p| p.index).collect::<Vec<_>>(), vec![1, 2, 3, 4, 5]);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_never_exceeds_ceiling() {
        let model = Arc::new(GaugedModel::new());
        let units: Vec<_> = (1..=6).map(|i| unit(i, i as u8)).collect();
        analyzer(Arc::clone(&model), 2).analyze_all(&units).await.unwrap();
        assert!(model.high_water.load(Ordering::SeqCst) <= 2);
        // The ceiling is actually used, not serialized down to 1.
        assert_eq!(model.high_water.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_unit_failure_is_retried_in_place() {
        let model = Arc::new(GaugedModel::failing(2, 2));
        let units: Vec<_> = (1..=3).map(|i| unit(i, i as u8)).collect();
        let pages = analyzer(Arc::clone(&model), 3).analyze_all(&units).await.unwrap();
        assert_eq!(pages[1].title.as_deref(), Some("page-2"));
        // 3 units + 2 extra attempts for the flaky one.
        assert_eq!(model.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_unit_fails_the_whole_batch() {
        // Unit 2 fails more times than the budget allows.
        let model = Arc::new(GaugedModel::failing(2, 10));
        let units: Vec<_> = (1..=3).map(|i| unit(i, i as u8)).collect();
        let err = analyzer(model, 3).analyze_all(&units).await.unwrap_err();
        match err {
            WorkflowError::Step(step) => {
                assert_eq!(step.step, "analyze_page_2");
                assert_eq!(step.kind, "timeout");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op() {
        let model = Arc::new(GaugedModel::new());
        let pages = analyzer(Arc::clone(&model), 3).analyze_all(&[]).await.unwrap();
        assert!(pages.is_empty());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn parse_analysis_normalizes_geometry() {
        let image = PageImage {
            data: vec![],
            width: 800,
            height: 600,
        };
        let raw = json!({
            "title": "Scanned",
            "background": {"type": "color", "value": "#FAFAFA"},
            "elements": [
                {"type": "image", "position": {"x": 400, "y": 300},
                 "size": {"width": 200, "height": 150}, "source": "figure_1"},
                {"type": "decoration"}
            ]
        });
        let page = parse_analysis(&raw, 4, &image, (1920, 1080));
        assert_eq!(page.index, 4);
        assert_eq!(page.title.as_deref(), Some("Scanned"));
        assert!(page.background_color.is_some());
        // Unknown type dropped, image geometry scaled by 2.4 / 1.8.
        assert_eq!(page.elements.len(), 1);
        let el = &page.elements[0];
        assert_eq!(el.position(), crate::deck::Position { x: 960, y: 540 });
        assert_eq!(el.size(), crate::deck::Size { width: 480, height: 270 });
    }

    #[test]
    fn parse_analysis_defaults_missing_geometry() {
        let image = PageImage {
            data: vec![],
            width: 1920,
            height: 1080,
        };
        let raw = json!({"elements": [{"type": "text", "content": "floating"}]});
        let page = parse_analysis(&raw, 1, &image, (1920, 1080));
        assert_eq!(page.elements[0].position(), crate::deck::Position { x: 0, y: 0 });
        assert_eq!(page.elements[0].size(), crate::deck::Size { width: 100, height: 50 });
    }
}
