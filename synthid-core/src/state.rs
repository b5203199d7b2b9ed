use std::fmt;
use std::str::FromStr;

use synthid_config::ClientConfig;
use synthid_types::{AttackType, DashboardStats, Generation, GenerationConfig, GenerationSummary};
use synthid_workflow::AnalysisReport;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Tab {
    #[default]
    Generate,
    Verify,
    Attack,
    History,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Generate, Tab::Verify, Tab::Attack, Tab::History];

    pub fn as_str(self) -> &'static str {
        match self {
            Tab::Generate => "generate",
            Tab::Verify => "verify",
            Tab::Attack => "attack",
            Tab::History => "history",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tab::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown tab: {s}"))
    }
}

/// What the dashboard panel is showing.
#[derive(Clone, Debug, PartialEq)]
pub enum DashboardView {
    Report(AnalysisReport),
    Stats(DashboardStats),
}

#[derive(Clone, Debug, PartialEq)]
pub enum AppEvent {
    SelectTab(Tab),
    OpenDashboard,
    CloseDashboard,
    Escape,
    SetAttackType(AttackType),
    SetGenerationConfig(GenerationConfig),
    RecentLoaded(Vec<GenerationSummary>),
    GenerationCreated(Generation),
    AnalysisComplete(AnalysisReport),
    StatsLoaded(DashboardStats),
}

/// Top-level client state. Only [`AppState::apply`] mutates it.
#[derive(Clone, Debug, PartialEq)]
pub struct AppState {
    active_tab: Tab,
    dashboard_open: bool,
    dashboard: Option<DashboardView>,
    attack_type: AttackType,
    generation: GenerationConfig,
    recent: Vec<GenerationSummary>,
    recent_limit: usize,
}

impl AppState {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            active_tab: Tab::default(),
            dashboard_open: false,
            dashboard: None,
            attack_type: AttackType::default(),
            generation: config.generation.clone(),
            recent: Vec::new(),
            recent_limit: config.recent_limit as usize,
        }
    }

    pub fn active_tab(&self) -> Tab {
        self.active_tab
    }

    pub fn dashboard_open(&self) -> bool {
        self.dashboard_open
    }

    pub fn dashboard(&self) -> Option<&DashboardView> {
        self.dashboard.as_ref()
    }

    pub fn attack_type(&self) -> AttackType {
        self.attack_type
    }

    pub fn generation(&self) -> &GenerationConfig {
        &self.generation
    }

    pub fn recent(&self) -> &[GenerationSummary] {
        &self.recent
    }

    /// Returns whether anything changed.
    pub fn apply(&mut self, event: AppEvent) -> bool {
        match event {
            AppEvent::SelectTab(tab) => replace(&mut self.active_tab, tab),
            AppEvent::OpenDashboard => replace(&mut self.dashboard_open, true),
            AppEvent::CloseDashboard | AppEvent::Escape => replace(&mut self.dashboard_open, false),
            AppEvent::SetAttackType(attack) => replace(&mut self.attack_type, attack),
            AppEvent::SetGenerationConfig(cfg) => replace(&mut self.generation, cfg),
            AppEvent::RecentLoaded(mut items) => {
                items.truncate(self.recent_limit);
                replace(&mut self.recent, items)
            }
            AppEvent::GenerationCreated(gen) => {
                self.recent.retain(|r| r.id != gen.id);
                self.recent.insert(0, gen.summary());
                self.recent.truncate(self.recent_limit);
                true
            }
            AppEvent::AnalysisComplete(report) => {
                self.dashboard = Some(DashboardView::Report(report));
                self.dashboard_open = true;
                true
            }
            AppEvent::StatsLoaded(stats) => {
                self.dashboard = Some(DashboardView::Stats(stats));
                self.dashboard_open = true;
                true
            }
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}
