use synthid_client::{ApiError, Backend};
use synthid_types::{AttackRequest, Generation, GenerationId};
use tracing::{info, warn};

pub mod composer;
pub use composer::Composer;

pub mod report;
pub use report::AnalysisReport;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    List,
    Detail,
    Analyzing,
    Result,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Action {
    Verify,
    Attack(AttackRequest),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Report(AnalysisReport),
    Attacked(Generation),
}

/// An analysis that has been started but not yet sent.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingAnalysis {
    pub target: GenerationId,
    pub action: Action,
}

impl PendingAnalysis {
    pub async fn run(&self, backend: &dyn Backend) -> Result<Outcome, ApiError> {
        match &self.action {
            Action::Verify => {
                let detection = backend.detect_generation(self.target).await?;
                Ok(Outcome::Report(AnalysisReport::from_detection(&detection)))
            }
            Action::Attack(req) => backend
                .attack_generation(self.target, req)
                .await
                .map(Outcome::Attacked),
        }
    }
}

/// Selection and analysis of one generation: list -> detail -> analyzing -> result.
///
/// A failed analysis drops back to detail with the message kept in
/// `last_error`. Nothing can be selected or analysed while a request is in
/// flight.
#[derive(Debug)]
pub struct AnalysisFlow {
    stage: Stage,
    selected: Option<Generation>,
    outcome: Option<Outcome>,
    last_error: Option<String>,
}

impl Default for AnalysisFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisFlow {
    pub fn new() -> Self {
        Self {
            stage: Stage::List,
            selected: None,
            outcome: None,
            last_error: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn selected(&self) -> Option<&Generation> {
        self.selected.as_ref()
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Load a generation and open it. The stage only moves once the detail
    /// fetch succeeds. Returns false when ignored.
    pub async fn select(&mut self, backend: &dyn Backend, id: GenerationId) -> Result<bool, ApiError> {
        if self.stage == Stage::Analyzing {
            return Ok(false);
        }
        match backend.get_generation(id).await {
            Ok(gen) => {
                info!(generation = %id, "generation selected");
                self.selected = Some(gen);
                self.outcome = None;
                self.last_error = None;
                self.stage = Stage::Detail;
                Ok(true)
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub fn back(&mut self) -> bool {
        if self.stage == Stage::Analyzing {
            return false;
        }
        self.stage = Stage::List;
        self.selected = None;
        self.outcome = None;
        true
    }

    /// Forget the last outcome, e.g. when the attack settings change under
    /// it. A shown result goes back to detail; in flight this is a no-op.
    pub fn clear_outcome(&mut self) -> bool {
        if self.stage == Stage::Analyzing || self.outcome.is_none() {
            return false;
        }
        self.outcome = None;
        if self.stage == Stage::Result {
            self.stage = Stage::Detail;
        }
        true
    }

    /// Enter `Analyzing`. Returns `None` when there is nothing selected or a
    /// request is already in flight.
    pub fn begin(&mut self, action: Action) -> Result<Option<PendingAnalysis>, ApiError> {
        if !matches!(self.stage, Stage::Detail | Stage::Result) {
            return Ok(None);
        }
        let Some(target) = self.selected.as_ref().map(|g| g.id) else {
            return Ok(None);
        };
        if let Action::Attack(req) = &action {
            req.validate()?;
        }
        info!(generation = %target, ?action, "analysis started");
        self.stage = Stage::Analyzing;
        self.outcome = None;
        self.last_error = None;
        Ok(Some(PendingAnalysis { target, action }))
    }

    /// Settle the in-flight analysis. A result arriving when nothing is in
    /// flight is dropped.
    pub fn complete(&mut self, result: Result<Outcome, ApiError>) -> Result<Option<&Outcome>, ApiError> {
        if self.stage != Stage::Analyzing {
            return Ok(None);
        }
        match result {
            Ok(outcome) => {
                info!("analysis finished");
                self.stage = Stage::Result;
                Ok(Some(&*self.outcome.insert(outcome)))
            }
            Err(err) => {
                warn!(error = %err, "analysis failed");
                self.stage = Stage::Detail;
                self.last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// `begin`, `run` and `complete` in one go. `Ok(None)` means the call was ignored.
    pub async fn analyze(&mut self, backend: &dyn Backend, action: Action) -> Result<Option<Outcome>, ApiError> {
        let Some(pending) = self.begin(action)? else {
            return Ok(None);
        };
        let result = pending.run(backend).await;
        self.complete(result).map(|o| o.cloned())
    }
}
