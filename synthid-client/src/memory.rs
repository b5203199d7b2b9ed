use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use synthid_types::{
    preview, AttackRequest, DashboardStats, Detection, DetectionId, DetectionQuery, DetectionSummary, Generation,
    GenerationId, GenerationQuery, GenerationRequest, GenerationSummary, Page, SortOrder,
};
use tokio::sync::Mutex;

use crate::{paths, ApiError, Backend};

/// One request observed by [`InMemoryBackend`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    pub method: &'static str,
    pub path: String,
    pub query: Vec<(&'static str, String)>,
}

impl RecordedCall {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// In-process stand-in for the testbed service.
///
/// Behaves like the service's stub AI layer: outputs are tagged copies of the
/// input, and detection follows the generation's `watermark_enabled` flag.
/// Every call is recorded; detail lookups can be made to fail per id and the
/// whole backend can be taken offline.
pub struct InMemoryBackend {
    inner: Mutex<Store>,
}

#[derive(Default)]
struct Store {
    generations: Vec<Generation>,
    detections: Vec<Detection>,
    next_generation: i64,
    next_detection: i64,
    failing: HashSet<GenerationId>,
    offline: bool,
    calls: Vec<RecordedCall>,
}

impl Store {
    fn record(&mut self, method: &'static str, path: String, query: Vec<(&'static str, String)>) -> Result<(), ApiError> {
        self.calls.push(RecordedCall { method, path, query });
        if self.offline {
            return Err(ApiError::Network("connection refused".into()));
        }
        Ok(())
    }

    fn generation(&self, id: GenerationId) -> Result<&Generation, ApiError> {
        self.generations
            .iter()
            .find(|g| g.id == id)
            .ok_or_else(|| not_found("Generation"))
    }

    fn insert_generation(&mut self, mut gen: Generation) -> Generation {
        self.next_generation += 1;
        gen.id = GenerationId(self.next_generation);
        gen.created_at = Utc::now();
        self.generations.push(gen.clone());
        gen
    }
}

fn not_found(what: &str) -> ApiError {
    ApiError::Http {
        status: 404,
        message: format!("{what} not found"),
    }
}

fn paginate<T>(mut rows: Vec<T>, page: u32, page_size: u32) -> Page<T> {
    let total = rows.len() as u64;
    let start = (page.max(1) as usize - 1).saturating_mul(page_size as usize);
    let items = if start >= rows.len() {
        Vec::new()
    } else {
        let end = (start + page_size as usize).min(rows.len());
        rows.drain(start..end).collect()
    };
    Page {
        total,
        page,
        page_size,
        items,
    }
}

fn matches_search(needle: Option<&str>, id: i64, text: &str) -> bool {
    match needle.map(str::trim).filter(|s| !s.is_empty()) {
        None => true,
        Some(needle) => {
            let needle = needle.to_lowercase();
            id.to_string() == needle.trim_start_matches('#') || text.to_lowercase().contains(&needle)
        }
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Store::default()),
        }
    }

    /// Insert a generation without recording a call.
    pub async fn seed(&self, req: GenerationRequest) -> Generation {
        let mut store = self.inner.lock().await;
        store.insert_generation(stub_generation(&req))
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.inner.lock().await.calls.clear();
    }

    /// Number of recorded calls with this method whose path starts with `prefix`.
    pub async fn count(&self, method: &str, prefix: &str) -> usize {
        self.inner
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.method == method && c.path.starts_with(prefix))
            .count()
    }

    pub async fn fail_detail(&self, id: GenerationId) {
        self.inner.lock().await.failing.insert(id);
    }

    pub async fn heal_detail(&self, id: GenerationId) {
        self.inner.lock().await.failing.remove(&id);
    }

    pub async fn set_offline(&self, offline: bool) {
        self.inner.lock().await.offline = offline;
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn stub_generation(req: &GenerationRequest) -> Generation {
    let cfg = &req.config;
    let tag = if cfg.watermark_enabled { "wm:on" } else { "wm:off" };
    Generation {
        id: GenerationId(0),
        original_id: None,
        created_at: Utc::now(),
        input_text: req.input_text.clone(),
        output_text: format!("[stub:{tag}] {}", req.input_text),
        model: cfg.model.clone(),
        quantization: cfg.quantization.clone(),
        temperature: Some(cfg.temperature),
        top_k: cfg.top_k,
        top_p: cfg.top_p,
        max_tokens: Some(cfg.max_tokens),
        watermark_enabled: cfg.watermark_enabled,
        context_width: cfg.context_width,
        tournament_size: cfg.tournament_size,
        g_value: cfg.g_value,
        watermark_key: cfg.watermark_key.clone(),
        attack_type: None,
        attack_intensity: None,
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn list_generations(&self, query: &GenerationQuery) -> Result<Page<GenerationSummary>, ApiError> {
        let mut store = self.inner.lock().await;
        store.record("GET", paths::GENERATIONS.into(), query.to_pairs())?;

        let mut rows: Vec<&Generation> = store
            .generations
            .iter()
            .filter(|g| matches_search(query.search.as_deref(), g.id.0, &g.input_text))
            .filter(|g| query.model.as_ref().map_or(true, |m| &g.model == m))
            .filter(|g| query.watermark_enabled.map_or(true, |wm| g.watermark_enabled == wm))
            .filter(|g| query.attack_type.map_or(true, |a| g.attack_type == Some(a)))
            .collect();
        rows.sort_by_key(|g| (g.created_at, g.id));
        if query.sort == SortOrder::Latest {
            rows.reverse();
        }

        let rows = rows.into_iter().map(Generation::summary).collect();
        Ok(paginate(rows, query.page, query.page_size))
    }

    async fn get_generation(&self, id: GenerationId) -> Result<Generation, ApiError> {
        let mut store = self.inner.lock().await;
        store.record("GET", paths::generation(id), Vec::new())?;
        if store.failing.contains(&id) {
            return Err(ApiError::Http {
                status: 500,
                message: format!("failed to load generation {id}"),
            });
        }
        store.generation(id).cloned()
    }

    async fn create_generation(&self, req: &GenerationRequest) -> Result<Generation, ApiError> {
        req.validate()?;
        let mut store = self.inner.lock().await;
        store.record("POST", paths::GENERATIONS.into(), Vec::new())?;
        Ok(store.insert_generation(stub_generation(req)))
    }

    async fn delete_generation(&self, id: GenerationId) -> Result<(), ApiError> {
        let mut store = self.inner.lock().await;
        store.record("DELETE", paths::generation(id), Vec::new())?;
        store.generation(id)?;
        store.generations.retain(|g| g.id != id);
        store.detections.retain(|d| d.generation_id != id);
        Ok(())
    }

    async fn attack_generation(&self, id: GenerationId, req: &AttackRequest) -> Result<Generation, ApiError> {
        req.validate()?;
        let mut store = self.inner.lock().await;
        store.record("POST", paths::attacks(id), Vec::new())?;
        let original = store.generation(id)?.clone();
        let attacked = Generation {
            original_id: Some(original.id),
            output_text: format!("[attack:{}:{}] {}", req.attack_type, req.attack_intensity, original.output_text),
            attack_type: Some(req.attack_type),
            attack_intensity: Some(req.attack_intensity),
            ..original
        };
        Ok(store.insert_generation(attacked))
    }

    async fn detect_generation(&self, id: GenerationId) -> Result<Detection, ApiError> {
        let mut store = self.inner.lock().await;
        store.record("POST", paths::detections_for(id), Vec::new())?;
        let gen = store.generation(id)?.clone();
        let wm = gen.watermark_enabled;

        store.next_detection += 1;
        let detection = Detection {
            id: DetectionId(store.next_detection),
            generation_id: gen.id,
            created_at: Utc::now(),
            input_text: gen.output_text,
            is_watermarked: wm,
            z_score: Some(if wm { 3.5 } else { 0.1 }),
            p_value: Some(if wm { 0.0004 } else { 0.9 }),
            confidence: Some(if wm { 0.95 } else { 0.1 }),
            true_positive_rate: wm.then_some(0.94),
            false_positive_rate: wm.then_some(0.02),
            roc_auc: wm.then_some(0.96),
            bleu_score: None,
        };
        store.detections.push(detection.clone());
        Ok(detection)
    }

    async fn list_detections(&self, query: &DetectionQuery) -> Result<Page<DetectionSummary>, ApiError> {
        let mut store = self.inner.lock().await;
        store.record("GET", paths::DETECTIONS.into(), query.to_pairs())?;

        let mut rows: Vec<&Detection> = store
            .detections
            .iter()
            .filter(|d| matches_search(query.search.as_deref(), d.id.0, &d.input_text))
            .filter(|d| query.is_watermarked.map_or(true, |wm| d.is_watermarked == wm))
            .filter(|d| {
                query
                    .min_confidence
                    .map_or(true, |min| d.confidence.unwrap_or(0.0) >= min)
            })
            .collect();
        rows.sort_by_key(|d| (d.created_at, d.id));
        if query.sort == SortOrder::Latest {
            rows.reverse();
        }

        let rows = rows
            .into_iter()
            .map(|d| DetectionSummary {
                id: d.id,
                generation_id: d.generation_id,
                created_at: d.created_at,
                input_text_preview: preview(&d.input_text, 100),
                is_watermarked: d.is_watermarked,
                z_score: d.z_score,
                confidence: d.confidence,
            })
            .collect();
        Ok(paginate(rows, query.page, query.page_size))
    }

    async fn get_detection(&self, id: DetectionId) -> Result<Detection, ApiError> {
        let mut store = self.inner.lock().await;
        store.record("GET", paths::detection(id), Vec::new())?;
        store
            .detections
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| not_found("Detection"))
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        let mut store = self.inner.lock().await;
        store.record("GET", paths::DASHBOARD_STATS.into(), Vec::new())?;
        Ok(DashboardStats::from_records(&store.generations, &store.detections))
    }
}
