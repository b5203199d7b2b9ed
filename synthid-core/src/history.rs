use synthid_cache::{enrich_detections, enrich_outputs, BatchResolver, LOADING};
use synthid_client::Backend;
use synthid_list::{Detections, Generations, ListController};
use synthid_types::{Detection, DetectionId, Generation, GenerationId, SortOrder};
use tracing::warn;

#[derive(Clone, Debug, PartialEq)]
pub enum RecordDetail {
    Generation(Generation),
    Detection(Detection),
}

/// The history tab: generation and detection lists side by side, sharing
/// search and sort, plus a detail modal.
pub struct HistoryView {
    generations: ListController<Generations>,
    detections: ListController<Detections>,
    search_draft: String,
    outputs: BatchResolver<GenerationId, String>,
    detection_texts: BatchResolver<DetectionId, String>,
    detail: Option<RecordDetail>,
}

impl HistoryView {
    pub fn new(page_size: u32) -> Self {
        Self {
            generations: ListController::new(Generations, page_size),
            detections: ListController::new(Detections, page_size),
            search_draft: String::new(),
            outputs: BatchResolver::new(),
            detection_texts: BatchResolver::new(),
            detail: None,
        }
    }

    pub fn generations(&self) -> &ListController<Generations> {
        &self.generations
    }

    pub fn generations_mut(&mut self) -> &mut ListController<Generations> {
        &mut self.generations
    }

    pub fn detections(&self) -> &ListController<Detections> {
        &self.detections
    }

    pub fn detections_mut(&mut self) -> &mut ListController<Detections> {
        &mut self.detections
    }

    pub fn search_draft(&self) -> &str {
        &self.search_draft
    }

    /// Typing in the search box. Nothing is fetched until [`Self::commit_search`].
    pub fn set_search_draft(&mut self, text: impl Into<String>) {
        self.search_draft = text.into();
    }

    pub fn commit_search(&mut self) -> bool {
        let draft = self.search_draft.clone();
        let a = self.generations.commit_search(&draft);
        let b = self.detections.commit_search(&draft);
        a || b
    }

    pub fn set_sort(&mut self, sort: SortOrder) -> bool {
        let a = self.generations.set_sort(sort);
        let b = self.detections.set_sort(sort);
        a || b
    }

    pub fn set_model(&mut self, model: Option<String>) -> bool {
        self.generations.set_model(model)
    }

    /// Bring both lists up to date and fetch any missing body text.
    /// List failures leave the previous rows on screen.
    pub async fn sync(&mut self, backend: &dyn Backend) {
        let _ = self.generations.sync(backend).await;
        let _ = self.detections.sync(backend).await;
        enrich_outputs(&mut self.outputs, backend, self.generations.items()).await;
        enrich_detections(&mut self.detection_texts, backend, self.detections.items()).await;
    }

    pub fn output_for(&self, id: GenerationId) -> &str {
        self.outputs.display(&id, LOADING)
    }

    /// Full analysed text of a detection row; list rows only carry a preview.
    pub fn text_for_detection(&self, id: DetectionId) -> &str {
        self.detection_texts.display(&id, LOADING)
    }

    pub fn detail(&self) -> Option<&RecordDetail> {
        self.detail.as_ref()
    }

    pub async fn open_generation(&mut self, backend: &dyn Backend, id: GenerationId) -> bool {
        match backend.get_generation(id).await {
            Ok(gen) => {
                self.outputs.merge([(gen.id, gen.output_text.clone())]);
                self.detail = Some(RecordDetail::Generation(gen));
                true
            }
            Err(err) => {
                warn!(generation = %id, error = %err, "failed to open generation");
                self.detail = None;
                false
            }
        }
    }

    pub async fn open_detection(&mut self, backend: &dyn Backend, id: DetectionId) -> bool {
        match backend.get_detection(id).await {
            Ok(det) => {
                self.detection_texts.merge([(det.id, det.input_text.clone())]);
                self.detail = Some(RecordDetail::Detection(det));
                true
            }
            Err(err) => {
                warn!(detection = %id, error = %err, "failed to open detection");
                self.detail = None;
                false
            }
        }
    }

    pub fn close_detail(&mut self) {
        self.detail = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthid_client::InMemoryBackend;
    use synthid_types::{GenerationConfig, GenerationRequest};

    async fn seeded() -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        for i in 0..15 {
            let mut cfg = GenerationConfig::default();
            cfg.watermark_enabled = i % 3 != 0;
            let gen = backend.seed(GenerationRequest::new(cfg, format!("story {i}"))).await;
            if i < 12 {
                backend.detect_generation(gen.id).await.unwrap();
            }
        }
        backend.clear_calls().await;
        backend
    }

    #[tokio::test]
    async fn search_is_committed_to_both_lists() {
        let backend = seeded().await;
        let mut view = HistoryView::new(10);
        view.sync(&backend).await;
        view.generations_mut().next_page();
        view.detections_mut().next_page();
        view.sync(&backend).await;

        view.set_search_draft("story 1");
        assert_eq!(view.generations().filters().search, None);
        assert!(view.commit_search());
        assert_eq!(view.generations().pager().page(), 1);
        assert_eq!(view.detections().pager().page(), 1);

        backend.clear_calls().await;
        view.sync(&backend).await;
        let lists: Vec<_> = backend
            .calls()
            .await
            .into_iter()
            .filter(|c| c.method == "GET" && c.query.iter().any(|(k, _)| *k == "page"))
            .collect();
        assert_eq!(lists.len(), 2);
        for call in lists {
            assert_eq!(call.param("search"), Some("story 1"));
            assert_eq!(call.param("page"), Some("1"));
        }
    }

    #[tokio::test]
    async fn outputs_are_enriched_after_sync() {
        let backend = seeded().await;
        let mut view = HistoryView::new(10);
        view.sync(&backend).await;

        let rows = view.generations().items().to_vec();
        assert_eq!(rows.len(), 10);
        for row in &rows {
            assert!(view.output_for(row.id).starts_with("[stub:"));
        }
        let unknown = GenerationId(999);
        assert_eq!(view.output_for(unknown), LOADING);
    }

    #[tokio::test]
    async fn detection_rows_get_full_text() {
        let backend = seeded().await;
        let mut view = HistoryView::new(10);
        view.sync(&backend).await;

        let rows = view.detections().items().to_vec();
        assert_eq!(rows.len(), 10);
        for row in &rows {
            assert!(view.text_for_detection(row.id).starts_with("[stub:"));
        }
        assert_eq!(view.text_for_detection(DetectionId(999)), LOADING);

        backend.clear_calls().await;
        view.sync(&backend).await;
        assert_eq!(backend.count("GET", "/api/detections/").await, 0);
    }

    #[tokio::test]
    async fn failed_open_closes_the_modal() {
        let backend = seeded().await;
        let mut view = HistoryView::new(10);
        assert!(view.open_generation(&backend, GenerationId(1)).await);
        assert!(matches!(view.detail(), Some(RecordDetail::Generation(_))));

        assert!(!view.open_detection(&backend, DetectionId(404)).await);
        assert!(view.detail().is_none());
    }

    #[tokio::test]
    async fn model_filter_touches_generations_only() {
        let mut view = HistoryView::new(10);
        assert!(view.set_model(Some("Gemma-2-2B".into())));
        assert_eq!(view.detections().filters().model, None);
        assert!(view.set_sort(SortOrder::Oldest));
        assert_eq!(view.detections().filters().sort, SortOrder::Oldest);
    }
}
