//! Asset generation with identity caching.
//!
//! The Create workflow may ask the model to produce illustrations for image
//! elements that requested one. This batch is *tolerant*, the mirror image
//! of the analysis fan-out: a deck with one missing illustration is still a
//! deck, so individual failures are logged and skipped, and only a batch
//! where nothing survived raises [`WorkflowError::AllAssetsFailed`].
//!
//! Assets are cached by request id for the coordinator's lifetime. A second
//! request for an id that already resolved (in this batch or an earlier one)
//! reuses the stored path and costs no model call.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::error::WorkflowError;
use crate::model::ModelClient;
use crate::pipeline::step::StepRunner;
use crate::prompts;

/// One illustration the composition asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRequest {
    /// Identity of the asset; also the cache key.
    pub id: String,
    /// What the illustration should depict.
    pub description: String,
    /// Target extent in canvas pixels.
    pub width: u32,
    pub height: u32,
}

/// Generates and caches illustration assets.
pub struct AssetCoordinator {
    model: Arc<dyn ModelClient>,
    runner: StepRunner,
    max_concurrent: usize,
    cache: Mutex<HashMap<String, String>>,
}

impl AssetCoordinator {
    pub fn new(model: Arc<dyn ModelClient>, runner: StepRunner, max_concurrent: usize) -> Self {
        Self {
            model,
            runner,
            max_concurrent: max_concurrent.max(1),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a batch of requests to `id → path`.
    ///
    /// Duplicate ids within the batch are generated once; ids already in the
    /// cache are served from it. Failed requests are absent from the result.
    /// Only a batch where *every* request failed is an error.
    pub async fn generate_all(
        &self,
        requests: &[AssetRequest],
    ) -> Result<HashMap<String, String>, WorkflowError> {
        if requests.is_empty() {
            return Ok(HashMap::new());
        }

        let mut resolved = HashMap::new();
        let mut pending: Vec<&AssetRequest> = Vec::new();
        {
            let cache = self
                .cache
                .lock()
                .map_err(|e| WorkflowError::Internal(format!("asset cache poisoned: {e}")))?;
            for request in requests {
                if resolved.contains_key(&request.id)
                    || pending.iter().any(|p| p.id == request.id)
                {
                    continue;
                }
                match cache.get(&request.id) {
                    Some(path) => {
                        debug!(id = %request.id, path = %path, "asset cache hit");
                        resolved.insert(request.id.clone(), path.clone());
                    }
                    None => pending.push(request),
                }
            }
        }

        info!(
            requested = requests.len(),
            fresh = pending.len(),
            cached = resolved.len(),
            "asset generation batch"
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let tasks = pending.iter().map(|request| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(_) => return (request.id.clone(), None),
                };
                match self.generate_one(request).await {
                    Ok(path) => (request.id.clone(), Some(path)),
                    Err(e) => {
                        warn!(id = %request.id, error = %e, "asset generation failed, skipping");
                        (request.id.clone(), None)
                    }
                }
            }
        });

        let mut failed = 0usize;
        for (id, outcome) in join_all(tasks).await {
            match outcome {
                Some(path) => {
                    resolved.insert(id, path);
                }
                None => failed += 1,
            }
        }

        if resolved.is_empty() {
            return Err(WorkflowError::AllAssetsFailed { failed });
        }
        if failed > 0 {
            warn!(failed, succeeded = resolved.len(), "asset batch partially failed");
        }

        let mut cache = self
            .cache
            .lock()
            .map_err(|e| WorkflowError::Internal(format!("asset cache poisoned: {e}")))?;
        for (id, path) in &resolved {
            cache.entry(id.clone()).or_insert_with(|| path.clone());
        }
        Ok(resolved)
    }

    async fn generate_one(&self, request: &AssetRequest) -> Result<String, WorkflowError> {
        let step = format!("generate_asset_{}", request.id);
        let size = format!("{}x{}", request.width, request.height);
        let prompt = prompts::illustration_prompt(&request.description, &size);
        let path = self
            .runner
            .run(&step, || {
                let model = Arc::clone(&self.model);
                let prompt = &prompt;
                async move {
                    let text = model
                        .generate_text(prompt, Some(prompts::ILLUSTRATION_SYSTEM_PROMPT))
                        .await?;
                    Ok(text)
                }
            })
            .await?;

        let path = path.trim();
        if path.is_empty() {
            // A blank answer still identifies the asset deterministically.
            Ok(format!("generated_{}.png", request.id))
        } else {
            Ok(path.to_string())
        }
    }

    /// The cached path for `id`, if an earlier batch resolved it.
    pub fn cached_path(&self, id: &str) -> Option<String> {
        self.cache.lock().ok()?.get(id).cloned()
    }

    /// Drop every cached asset path.
    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::time::Duration;

    use crate::model::{ModelError, PageImage};

    fn request(id: &str) -> AssetRequest {
        AssetRequest {
            id: id.to_string(),
            description: format!("an illustration of {id}"),
            width: 400,
            height: 300,
        }
    }

    /// Model whose generate_text succeeds unless the prompt mentions a
    /// poisoned id. Tracks call count and in-flight high-water mark.
    struct AssetModel {
        poisoned: HashSet<String>,
        calls: AtomicU32,
        in_flight: AtomicUsize,
        high_water: AtomicUsize,
    }

    impl AssetModel {
        fn new(poisoned: &[&str]) -> Self {
            Self {
                poisoned: poisoned.iter().map(|s| s.to_string()).collect(),
                calls: AtomicU32::new(0),
                in_flight: AtomicUsize::new(0),
                high_water: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ModelClient for AssetModel {
        async fn generate_structured(
            &self,
            _prompt: &str,
            _system: Option<&str>,
        ) -> Result<Value, ModelError> {
            Err(ModelError::Generic("not used".into()))
        }

        async fn generate_text(
            &self,
            prompt: &str,
            _system: Option<&str>,
        ) -> Result<String, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.high_water.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Some(id) = self.poisoned.iter().find(|id| prompt.contains(id.as_str())) {
                return Err(ModelError::Generic(format!("cannot draw {id}")));
            }
            // Echo a stable path derived from the description.
            let word = prompt.split_whitespace().last().unwrap_or("asset");
            Ok(format!("/assets/{word}.png"))
        }

        async fn analyze_image(
            &self,
            _image: &PageImage,
            _prompt: &str,
            _system: Option<&str>,
        ) -> Result<Value, ModelError> {
            Err(ModelError::Generic("not used".into()))
        }
    }

    fn coordinator(model: Arc<AssetModel>, k: usize) -> AssetCoordinator {
        AssetCoordinator::new(model, StepRunner::new(2, Duration::from_millis(1)), k)
    }

    #[tokio::test(start_paused = true)]
    async fn partial_failure_keeps_the_survivors() {
        let model = Arc::new(AssetModel::new(&["img2"]));
        let coordinator = coordinator(Arc::clone(&model), 3);
        let result = coordinator
            .generate_all(&[request("img1"), request("img2"), request("img3")])
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.contains_key("img1"));
        assert!(!result.contains_key("img2"));
        assert!(result.contains_key("img3"));
    }

    #[tokio::test(start_paused = true)]
    async fn total_failure_raises() {
        let model = Arc::new(AssetModel::new(&["img1", "img2"]));
        let coordinator = coordinator(model, 3);
        let err = coordinator
            .generate_all(&[request("img1"), request("img2")])
            .await
            .unwrap_err();
        match err {
            WorkflowError::AllAssetsFailed { failed } => assert_eq!(failed, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_ids_generate_once() {
        let model = Arc::new(AssetModel::new(&[]));
        let coordinator = coordinator(Arc::clone(&model), 3);
        let result = coordinator
            .generate_all(&[request("logo"), request("logo"), request("logo")])
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cache_survives_across_batches() {
        let model = Arc::new(AssetModel::new(&[]));
        let coordinator = coordinator(Arc::clone(&model), 3);

        let first = coordinator.generate_all(&[request("hero")]).await.unwrap();
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);

        let second = coordinator.generate_all(&[request("hero")]).await.unwrap();
        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first["hero"], second["hero"]);
        assert_eq!(coordinator.cached_path("hero"), Some(first["hero"].clone()));

        coordinator.clear_cache();
        assert_eq!(coordinator.cached_path("hero"), None);
        coordinator.generate_all(&[request("hero")]).await.unwrap();
        assert_eq!(model.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_never_exceeds_ceiling() {
        let model = Arc::new(AssetModel::new(&[]));
        let requests: Vec<_> = (0..6).map(|i| request(&format!("a{i}"))).collect();
        coordinator(Arc::clone(&model), 2)
            .generate_all(&requests)
            .await
            .unwrap();
        assert_eq!(model.high_water.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_batch_is_not_a_failure() {
        let model = Arc::new(AssetModel::new(&[]));
        let result = coordinator(model, 3).generate_all(&[]).await.unwrap();
        assert!(result.is_empty());
    }
}
