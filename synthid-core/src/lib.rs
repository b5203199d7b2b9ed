use std::sync::Arc;

use synthid_cache::{enrich_outputs, BatchReport, BatchResolver, LOADING};
use synthid_client::{ApiError, Backend, HttpBackend};
use synthid_config::{attack_intensity_draft, ClientConfig, NumericDraft, SamplingField, SamplingForm};
use synthid_list::LocalList;
use synthid_types::{
    AttackRequest, DashboardStats, Generation, GenerationId, GenerationQuery, GenerationSummary,
};
use synthid_workflow::{Action, AnalysisFlow, AnalysisReport, Composer, Outcome};
use tracing::{debug, info, warn};

pub mod history;
pub use history::{HistoryView, RecordDetail};

pub mod state;
pub use state::{AppEvent, AppState, DashboardView, Tab};

/// The testbed client: wires the backend, the app state and each tab together.
pub struct Testbed {
    backend: Arc<dyn Backend>,
    config: ClientConfig,
    state: AppState,
    form: SamplingForm,
    intensity: NumericDraft<u32>,
    attack_history: LocalList<GenerationSummary>,
    outputs: BatchResolver<GenerationId, String>,
    pub composer: Composer,
    pub flow: AnalysisFlow,
    pub history: HistoryView,
}

impl Testbed {
    pub fn new(backend: Arc<dyn Backend>, config: ClientConfig) -> Self {
        let state = AppState::new(&config);
        let form = SamplingForm::from_config(state.generation());
        let history = HistoryView::new(config.page_size);
        let attack_history = LocalList::new(Vec::new(), config.page_size);
        Self {
            backend,
            config,
            state,
            form,
            intensity: attack_intensity_draft(30),
            attack_history,
            outputs: BatchResolver::new(),
            composer: Composer::new(),
            flow: AnalysisFlow::new(),
            history,
        }
    }

    /// Talk to the REST service named in `config`.
    pub fn connect(config: ClientConfig) -> Self {
        let backend = Arc::new(HttpBackend::new(config.base_url()));
        Self::new(backend, config)
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn form(&self) -> &SamplingForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut SamplingForm {
        &mut self.form
    }

    /// Attack intensity input on the attack page.
    pub fn intensity(&self) -> &NumericDraft<u32> {
        &self.intensity
    }

    pub fn intensity_mut(&mut self) -> &mut NumericDraft<u32> {
        &mut self.intensity
    }

    /// The attack page's history panel, paged and filtered locally over the
    /// recent list.
    pub fn attack_history(&self) -> &LocalList<GenerationSummary> {
        &self.attack_history
    }

    pub fn attack_history_mut(&mut self) -> &mut LocalList<GenerationSummary> {
        &mut self.attack_history
    }

    pub fn dispatch(&mut self, event: AppEvent) -> bool {
        let regenerate_form = matches!(event, AppEvent::SetGenerationConfig(_));
        let new_attack = matches!(event, AppEvent::SetAttackType(_));
        let recent_moved = matches!(event, AppEvent::RecentLoaded(_) | AppEvent::GenerationCreated(_));
        let changed = self.state.apply(event);
        if !changed {
            return false;
        }
        if regenerate_form {
            self.form.sync(self.state.generation());
        }
        if new_attack && self.flow.clear_outcome() {
            debug!(attack = %self.state.attack_type(), "attack type changed; result cleared");
        }
        if recent_moved {
            self.attack_history.replace(self.state.recent().to_vec());
        }
        true
    }

    /// A keystroke in a sampling field. A value that commits goes straight
    /// into the generation config.
    pub fn input_field(&mut self, field: SamplingField, text: &str) -> bool {
        if !self.form.input(field, text) {
            return false;
        }
        self.push_form()
    }

    pub fn blur_field(&mut self, field: SamplingField) -> bool {
        self.form.blur(field);
        self.push_form()
    }

    /// Commit whatever is typed in the sampling fields into the generation config.
    pub fn commit_form(&mut self) -> bool {
        self.form.blur_all();
        self.push_form()
    }

    fn push_form(&mut self) -> bool {
        let mut cfg = self.state.generation().clone();
        self.form.apply(&mut cfg);
        self.dispatch(AppEvent::SetGenerationConfig(cfg))
    }

    /// Reload the sidebar's recent list and fill in its output text.
    /// Failures are logged and leave it as is.
    pub async fn load_recent(&mut self) -> bool {
        let query = GenerationQuery::new(1, self.config.recent_limit);
        match self.backend.list_generations(&query).await {
            Ok(page) => {
                self.dispatch(AppEvent::RecentLoaded(page.items));
                self.enrich_recent().await;
                true
            }
            Err(err) => {
                warn!(error = %err, "failed to load history");
                false
            }
        }
    }

    /// Fetch output text for the recent rows that lack it.
    pub async fn enrich_recent(&mut self) -> BatchReport<GenerationId> {
        let backend = Arc::clone(&self.backend);
        enrich_outputs(&mut self.outputs, backend.as_ref(), self.state.recent()).await
    }

    pub fn output_for(&self, id: GenerationId) -> &str {
        self.outputs.display(&id, LOADING)
    }

    /// Send `prompt` with the current generation config. `Ok(None)` when a
    /// send was already in flight.
    pub async fn generate(&mut self, prompt: &str) -> Result<Option<Generation>, ApiError> {
        let backend = Arc::clone(&self.backend);
        self.composer.set_prompt(prompt);
        let created = self.composer.send(backend.as_ref(), self.state.generation()).await?;
        if let Some(gen) = &created {
            self.outputs.merge([(gen.id, gen.output_text.clone())]);
            self.dispatch(AppEvent::GenerationCreated(gen.clone()));
            self.load_recent().await;
        }
        Ok(created)
    }

    pub async fn select(&mut self, id: GenerationId) -> Result<bool, ApiError> {
        let backend = Arc::clone(&self.backend);
        self.flow.select(backend.as_ref(), id).await
    }

    /// Run detection on the selected generation; the report opens the dashboard.
    pub async fn verify(&mut self) -> Result<Option<AnalysisReport>, ApiError> {
        let backend = Arc::clone(&self.backend);
        match self.flow.analyze(backend.as_ref(), Action::Verify).await? {
            Some(Outcome::Report(report)) => {
                info!(
                    generation = %report.generation_id,
                    verdict = %report.verdict,
                    confidence = report.confidence,
                    "verification complete"
                );
                self.state.apply(AppEvent::AnalysisComplete(report.clone()));
                Ok(Some(report))
            }
            _ => Ok(None),
        }
    }

    /// Attack the selected generation with the current attack type and the
    /// intensity input, committed first. The derived generation shows up in
    /// the recent list.
    pub async fn attack(&mut self) -> Result<Option<Generation>, ApiError> {
        let backend = Arc::clone(&self.backend);
        let intensity = f64::from(self.intensity.blur());
        let req = AttackRequest::new(self.state.attack_type(), intensity);
        match self.flow.analyze(backend.as_ref(), Action::Attack(req)).await? {
            Some(Outcome::Attacked(gen)) => {
                self.outputs.merge([(gen.id, gen.output_text.clone())]);
                self.load_recent().await;
                Ok(Some(gen))
            }
            _ => Ok(None),
        }
    }

    pub async fn load_stats(&mut self) -> Result<DashboardStats, ApiError> {
        let stats = self.backend.dashboard_stats().await?;
        self.state.apply(AppEvent::StatsLoaded(stats.clone()));
        Ok(stats)
    }

    pub async fn sync_history(&mut self) {
        let backend = Arc::clone(&self.backend);
        self.history.sync(backend.as_ref()).await;
    }

    pub async fn delete(&mut self, id: GenerationId) -> Result<(), ApiError> {
        self.backend.delete_generation(id).await?;
        info!(generation = %id, "generation deleted");
        self.history.generations_mut().invalidate();
        self.history.detections_mut().invalidate();
        self.load_recent().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthid_client::InMemoryBackend;
    use synthid_types::{AttackType, GenerationConfig};
    use synthid_workflow::Stage;

    fn testbed() -> (Arc<InMemoryBackend>, Testbed) {
        let backend = Arc::new(InMemoryBackend::new());
        let bed = Testbed::new(backend.clone(), ClientConfig::default());
        (backend, bed)
    }

    #[tokio::test]
    async fn generate_refreshes_recent() {
        let (backend, mut bed) = testbed();
        let gen = bed.generate("hello").await.unwrap().unwrap();

        assert_eq!(bed.state().recent()[0].id, gen.id);
        assert_eq!(bed.output_for(gen.id), "[stub:wm:on] hello");
        let recent = backend
            .calls()
            .await
            .into_iter()
            .find(|c| c.method == "GET")
            .unwrap();
        assert_eq!(recent.param("page_size"), Some("20"));
    }

    #[tokio::test]
    async fn recent_load_failure_keeps_old_rows() {
        let (backend, mut bed) = testbed();
        bed.generate("one").await.unwrap();
        backend.set_offline(true).await;
        assert!(!bed.load_recent().await);
        assert_eq!(bed.state().recent().len(), 1);
    }

    #[tokio::test]
    async fn attack_uses_sidebar_attack_type() {
        let (backend, mut bed) = testbed();
        let gen = bed.generate("hello").await.unwrap().unwrap();
        bed.dispatch(AppEvent::SetAttackType(AttackType::Substitution));
        bed.select(gen.id).await.unwrap();

        let attacked = bed.attack().await.unwrap().unwrap();
        assert_eq!(attacked.attack_type, Some(AttackType::Substitution));
        assert_eq!(bed.flow.stage(), Stage::Result);
        assert!(!bed.state().dashboard_open());
        assert_eq!(bed.state().recent()[0].id, attacked.id);
        assert_eq!(backend.count("POST", &format!("/api/generations/{}/attacks", gen.id)).await, 1);
        assert_eq!(attacked.attack_intensity, Some(30.0));
    }

    #[tokio::test]
    async fn intensity_input_feeds_the_attack() {
        let (_backend, mut bed) = testbed();
        let gen = bed.generate("hello").await.unwrap().unwrap();
        bed.select(gen.id).await.unwrap();

        bed.intensity_mut().input("");
        let attacked = bed.attack().await.unwrap().unwrap();
        assert_eq!(attacked.attack_intensity, Some(0.0));
        assert_eq!(bed.intensity().text(), "0");

        bed.intensity_mut().input("250");
        let attacked = bed.attack().await.unwrap().unwrap();
        assert_eq!(attacked.attack_intensity, Some(100.0));
    }

    #[tokio::test]
    async fn new_attack_type_clears_the_result() {
        let (_backend, mut bed) = testbed();
        let gen = bed.generate("hello").await.unwrap().unwrap();
        bed.select(gen.id).await.unwrap();
        bed.attack().await.unwrap().unwrap();
        assert_eq!(bed.flow.stage(), Stage::Result);

        assert!(!bed.dispatch(AppEvent::SetAttackType(AttackType::Deletion)));
        assert_eq!(bed.flow.stage(), Stage::Result);

        assert!(bed.dispatch(AppEvent::SetAttackType(AttackType::Summarization)));
        assert_eq!(bed.flow.stage(), Stage::Detail);
        assert!(bed.flow.outcome().is_none());
    }

    #[tokio::test]
    async fn attack_history_follows_recent() {
        let (_backend, mut bed) = testbed();
        for i in 0..12 {
            bed.generate(&format!("story {i}")).await.unwrap();
        }
        assert_eq!(bed.attack_history().total(), 12);
        assert!(bed.attack_history_mut().next_page());
        assert_eq!(bed.attack_history().pager().page(), 2);

        bed.attack_history_mut().set_filter("story 1");
        assert_eq!(bed.attack_history().framing(), "Showing 3 of 12");

        bed.attack_history_mut().set_filter("");
        bed.attack_history_mut().next_page();
        bed.generate("one more").await.unwrap();
        assert_eq!(bed.attack_history().pager().page(), 1);
        assert_eq!(bed.attack_history().visible()[0].input_text, "one more");
    }

    #[tokio::test]
    async fn recent_rows_are_enriched_on_load() {
        let (backend, mut bed) = testbed();
        let gen = backend
            .seed(synthid_types::GenerationRequest::new(Default::default(), "seeded"))
            .await;
        assert_eq!(bed.output_for(gen.id), LOADING);

        assert!(bed.load_recent().await);
        assert_eq!(bed.output_for(gen.id), "[stub:wm:on] seeded");
        assert_eq!(backend.count("GET", &format!("/api/generations/{}", gen.id)).await, 1);
    }

    #[tokio::test]
    async fn committed_form_feeds_next_generation() {
        let (_backend, mut bed) = testbed();
        bed.form_mut().temperature.input("1.4");
        bed.form_mut().top_k.input("");
        assert!(bed.commit_form());
        assert_eq!(bed.state().generation().temperature, 1.4);
        assert_eq!(bed.state().generation().top_k, Some(1));

        let gen = bed.generate("hi").await.unwrap().unwrap();
        assert_eq!(gen.temperature, Some(1.4));
    }

    #[tokio::test]
    async fn typed_value_survives_other_config_changes() {
        let (_backend, mut bed) = testbed();
        assert!(bed.input_field(SamplingField::Temperature, "1."));
        assert_eq!(bed.state().generation().temperature, 1.0);
        assert_eq!(bed.form().temperature.text(), "1.");

        assert!(bed.input_field(SamplingField::Temperature, "1.4"));
        assert_eq!(bed.state().generation().temperature, 1.4);

        let mut cfg = bed.state().generation().clone();
        cfg.model = "Gemma-2-2B".into();
        assert!(bed.dispatch(AppEvent::SetGenerationConfig(cfg)));
        assert_eq!(bed.form().temperature.text(), "1.4");

        let gen = bed.generate("hi").await.unwrap().unwrap();
        assert_eq!(gen.temperature, Some(1.4));
        assert_eq!(gen.model, "Gemma-2-2B");
    }

    #[tokio::test]
    async fn out_of_range_field_commits_on_blur() {
        let (_backend, mut bed) = testbed();
        assert!(!bed.input_field(SamplingField::MaxTokens, "9000"));
        assert_eq!(bed.state().generation().max_tokens, GenerationConfig::default().max_tokens);
        assert!(bed.blur_field(SamplingField::MaxTokens));
        assert_eq!(bed.state().generation().max_tokens, 4096);
    }

    #[tokio::test]
    async fn stats_open_the_dashboard() {
        let (_backend, mut bed) = testbed();
        bed.generate("hello").await.unwrap();
        let stats = bed.load_stats().await.unwrap();
        assert!(bed.state().dashboard_open());
        assert_eq!(bed.state().dashboard(), Some(&DashboardView::Stats(stats)));
    }

    #[tokio::test]
    async fn delete_drops_from_recent() {
        let (_backend, mut bed) = testbed();
        let gen = bed.generate("bye").await.unwrap().unwrap();
        bed.delete(gen.id).await.unwrap();
        assert!(bed.state().recent().is_empty());
    }
}
