use async_trait::async_trait;
use synthid_client::{ApiError, Backend};
use synthid_types::{DetectionQuery, DetectionSummary, GenerationQuery, GenerationSummary, Page, SortOrder};
use tracing::{debug, warn};

pub mod local;
pub use local::{LocalList, Searchable};

pub mod pager;
pub use pager::{Pager, DEFAULT_PAGE_SIZE};

/// Filters shared by the server-side lists. `model` is ignored by sources
/// that have no such column.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListFilters {
    pub sort: SortOrder,
    pub search: Option<String>,
    pub model: Option<String>,
}

/// Parameters of one in-flight list fetch.
#[derive(Clone, Debug, PartialEq)]
pub struct ListRequest {
    pub page: u32,
    pub page_size: u32,
    pub filters: ListFilters,
}

impl ListRequest {
    pub async fn run<S: ListSource>(&self, source: &S, backend: &dyn Backend) -> Result<Page<S::Item>, ApiError> {
        source.fetch(backend, self.page, self.page_size, &self.filters).await
    }
}

/// One kind of paginated list served by the backend.
#[async_trait]
pub trait ListSource: Send + Sync {
    type Item: Clone + Send;

    fn name(&self) -> &'static str;

    async fn fetch(
        &self,
        backend: &dyn Backend,
        page: u32,
        page_size: u32,
        filters: &ListFilters,
    ) -> Result<Page<Self::Item>, ApiError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Generations;

#[async_trait]
impl ListSource for Generations {
    type Item = GenerationSummary;

    fn name(&self) -> &'static str {
        "generations"
    }

    async fn fetch(
        &self,
        backend: &dyn Backend,
        page: u32,
        page_size: u32,
        filters: &ListFilters,
    ) -> Result<Page<GenerationSummary>, ApiError> {
        let mut query = GenerationQuery::new(page, page_size);
        query.sort = filters.sort;
        query.search = filters.search.clone();
        query.model = filters.model.clone();
        backend.list_generations(&query).await
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Detections;

#[async_trait]
impl ListSource for Detections {
    type Item = DetectionSummary;

    fn name(&self) -> &'static str {
        "detections"
    }

    async fn fetch(
        &self,
        backend: &dyn Backend,
        page: u32,
        page_size: u32,
        filters: &ListFilters,
    ) -> Result<Page<DetectionSummary>, ApiError> {
        let mut query = DetectionQuery::new(page, page_size);
        query.sort = filters.sort;
        query.search = filters.search.clone();
        backend.list_detections(&query).await
    }
}

/// Server-paginated list kept in step with its page and filters.
///
/// Mutators only mark the list dirty; [`ListController::sync`] issues the
/// request. A fresh controller starts dirty so the first `sync` loads page 1.
pub struct ListController<S: ListSource> {
    source: S,
    pager: Pager,
    filters: ListFilters,
    items: Vec<S::Item>,
    loading: bool,
    dirty: bool,
}

impl<S: ListSource> ListController<S> {
    pub fn new(source: S, page_size: u32) -> Self {
        Self {
            source,
            pager: Pager::new(page_size),
            filters: ListFilters::default(),
            items: Vec::new(),
            loading: false,
            dirty: true,
        }
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn filters(&self) -> &ListFilters {
        &self.filters
    }

    pub fn items(&self) -> &[S::Item] {
        &self.items
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn set_sort(&mut self, sort: SortOrder) -> bool {
        if self.filters.sort == sort {
            return false;
        }
        self.filters.sort = sort;
        self.filters_changed();
        true
    }

    /// Commit the search box. Blank text clears the search.
    pub fn commit_search(&mut self, text: &str) -> bool {
        let search = Some(text.trim().to_string()).filter(|s| !s.is_empty());
        if self.filters.search == search {
            return false;
        }
        self.filters.search = search;
        self.filters_changed();
        true
    }

    pub fn set_model(&mut self, model: Option<String>) -> bool {
        let model = model.filter(|m| !m.is_empty());
        if self.filters.model == model {
            return false;
        }
        self.filters.model = model;
        self.filters_changed();
        true
    }

    pub fn next_page(&mut self) -> bool {
        let changed = self.pager.next();
        self.mark_if(changed)
    }

    pub fn prev_page(&mut self) -> bool {
        let changed = self.pager.prev();
        self.mark_if(changed)
    }

    pub fn go_to(&mut self, page: u32) -> bool {
        let changed = self.pager.go_to(page);
        self.mark_if(changed)
    }

    pub fn invalidate(&mut self) {
        self.dirty = true;
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Start loading the current page. `is_loading` stays true until the
    /// result is handed to [`Self::finish`].
    pub fn begin(&mut self) -> ListRequest {
        self.loading = true;
        self.dirty = false;
        ListRequest {
            page: self.pager.page(),
            page_size: self.pager.page_size(),
            filters: self.filters.clone(),
        }
    }

    /// Apply a fetched page. On failure the previous items stay in place.
    pub fn finish(&mut self, page: u32, result: Result<Page<S::Item>, ApiError>) -> Result<(), ApiError> {
        self.loading = false;
        match result {
            Ok(fetched) => {
                debug!(list = self.source.name(), page, total = fetched.total, "list loaded");
                self.items = fetched.items;
                if self.pager.set_total(fetched.total) {
                    self.dirty = true;
                }
                Ok(())
            }
            Err(err) => {
                warn!(list = self.source.name(), page, error = %err, "failed to load list");
                Err(err)
            }
        }
    }

    /// `begin`, fetch and `finish` in one call.
    pub async fn refresh(&mut self, backend: &dyn Backend) -> Result<(), ApiError> {
        let req = self.begin();
        let result = req.run(&self.source, backend).await;
        self.finish(req.page, result)
    }

    /// Refresh if anything changed since the last fetch. A page that fell off
    /// the end after a refresh is fetched once more.
    pub async fn sync(&mut self, backend: &dyn Backend) -> Result<bool, ApiError> {
        let mut fetched = false;
        for _ in 0..2 {
            if !self.dirty {
                break;
            }
            self.refresh(backend).await?;
            fetched = true;
        }
        Ok(fetched)
    }

    fn filters_changed(&mut self) {
        self.pager.reset();
        self.dirty = true;
    }

    fn mark_if(&mut self, changed: bool) -> bool {
        if changed {
            self.dirty = true;
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthid_client::InMemoryBackend;
    use synthid_types::{GenerationConfig, GenerationId, GenerationRequest};

    async fn seeded(n: usize) -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        for i in 0..n {
            let mut cfg = GenerationConfig::default();
            if i % 2 == 1 {
                cfg.model = "Gemma-2-2B".into();
            }
            backend.seed(GenerationRequest::new(cfg, format!("prompt {i}"))).await;
        }
        backend
    }

    #[tokio::test]
    async fn pages_hold_page_size_items_except_the_last() {
        let backend = seeded(23).await;
        let mut list = ListController::new(Generations, 10);
        list.sync(&backend).await.unwrap();
        assert_eq!(list.pager().max_page(), 3);

        for page in 1..=3 {
            list.go_to(page);
            list.sync(&backend).await.unwrap();
            assert_eq!(list.items().len(), list.pager().expected_len(page));
        }
        assert_eq!(list.items().len(), 3);
    }

    #[tokio::test]
    async fn filter_change_resets_to_first_page() {
        let backend = seeded(30).await;
        let mut list = ListController::new(Generations, 10);
        list.sync(&backend).await.unwrap();
        list.next_page();
        list.sync(&backend).await.unwrap();
        assert_eq!(list.pager().page(), 2);

        backend.clear_calls().await;
        assert!(list.set_model(Some("Gemma-2-2B".into())));
        assert_eq!(list.pager().page(), 1);
        list.sync(&backend).await.unwrap();

        let calls = backend.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].param("page"), Some("1"));
        assert_eq!(calls[0].param("model"), Some("Gemma-2-2B"));
        assert_eq!(list.pager().total(), 15);
    }

    #[tokio::test]
    async fn sort_and_search_reach_the_query() {
        let backend = seeded(3).await;
        let mut list = ListController::new(Generations, 10);
        list.set_sort(SortOrder::Oldest);
        list.commit_search("  prompt 2 ");
        list.sync(&backend).await.unwrap();

        let calls = backend.calls().await;
        assert_eq!(calls[0].param("sort"), Some("oldest"));
        assert_eq!(calls[0].param("search"), Some("prompt 2"));
        assert_eq!(list.items().len(), 1);

        assert!(!list.commit_search("prompt 2"));
        assert!(!list.sync(&backend).await.unwrap());
    }

    #[tokio::test]
    async fn failed_refresh_keeps_previous_items() {
        let backend = seeded(5).await;
        let mut list = ListController::new(Generations, 10);
        list.sync(&backend).await.unwrap();

        backend.set_offline(true).await;
        list.invalidate();
        assert!(list.sync(&backend).await.is_err());
        assert_eq!(list.items().len(), 5);
        assert!(!list.is_loading());
    }

    #[tokio::test]
    async fn shrinking_total_triggers_second_fetch() {
        let backend = seeded(25).await;
        let mut list = ListController::new(Generations, 10);
        list.sync(&backend).await.unwrap();
        list.go_to(3);
        list.sync(&backend).await.unwrap();
        assert_eq!(list.items().len(), 5);

        for id in 1..=10 {
            backend.delete_generation(GenerationId(id)).await.unwrap();
        }
        backend.clear_calls().await;
        list.invalidate();
        list.sync(&backend).await.unwrap();

        let calls = backend.calls().await;
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].param("page"), Some("3"));
        assert_eq!(calls[1].param("page"), Some("2"));
        assert_eq!(list.pager().page(), 2);
        assert_eq!(list.items().len(), 5);
    }

    #[tokio::test]
    async fn detections_ignore_model_filter() {
        let backend = seeded(2).await;
        let mut list = ListController::new(Detections, 10);
        list.set_model(Some("Gemma-2-2B".into()));
        list.sync(&backend).await.unwrap();
        assert_eq!(backend.calls().await[0].param("model"), None);
    }

    #[tokio::test]
    async fn loading_spans_the_fetch() {
        let backend = seeded(3).await;
        let mut list = ListController::new(Generations, 10);
        let req = list.begin();
        assert!(list.is_loading());
        assert!(!list.is_dirty());

        let result = req.run(list.source(), &backend).await;
        list.finish(req.page, result).unwrap();
        assert!(!list.is_loading());
        assert_eq!(list.items().len(), 3);
    }

    #[test]
    fn page_buttons_mark_the_list_dirty() {
        let mut list = ListController::new(Generations, 10);
        list.pager.set_total(30);
        list.dirty = false;
        assert!(!list.prev_page());
        assert!(!list.is_dirty());
        assert!(list.next_page());
        assert!(list.is_dirty());
        list.dirty = false;
        assert!(list.go_to(3));
        assert!(list.prev_page());
        assert_eq!(list.pager().page(), 2);
    }
}
