use std::fmt;

use serde::Serialize;
use synthid_types::detection::percent;
use synthid_types::{Detection, DetectionId, GenerationId, Verdict};

/// A detection result shaped for the dashboard panel. Rates are percentages.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub generation_id: GenerationId,
    pub detection_id: DetectionId,
    pub verdict: Verdict,
    pub confidence: f64,
    pub tpr: Option<f64>,
    pub fpr: Option<f64>,
    pub z_score: Option<f64>,
    pub p_value: Option<f64>,
    pub roc_auc: Option<f64>,
    pub bleu: Option<f64>,
    pub target_share: f64,
    pub others_share: f64,
}

impl AnalysisReport {
    pub fn from_detection(d: &Detection) -> Self {
        let confidence = d.confidence_percent();
        let target_share = confidence.round();
        Self {
            generation_id: d.generation_id,
            detection_id: d.id,
            verdict: d.verdict(),
            confidence,
            tpr: d.true_positive_rate.map(percent),
            fpr: d.false_positive_rate.map(percent),
            z_score: d.z_score,
            p_value: d.p_value,
            roc_auc: d.roc_auc,
            bleu: d.bleu_score,
            target_share,
            others_share: 100.0 - target_share,
        }
    }

    pub fn status(&self) -> &'static str {
        match self.verdict {
            Verdict::Detected => "Safe",
            Verdict::NotDetected => "Unknown",
        }
    }
}

fn opt(v: Option<f64>, suffix: &str) -> String {
    match v {
        Some(v) => format!("{v}{suffix}"),
        None => "-".into(),
    }
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "generation #{}  detection #{}", self.generation_id, self.detection_id)?;
        writeln!(f, "verdict     {} ({})", self.verdict, self.status())?;
        writeln!(f, "confidence  {:.1}%", self.confidence)?;
        writeln!(f, "tpr / fpr   {} / {}", opt(self.tpr, "%"), opt(self.fpr, "%"))?;
        writeln!(f, "z-score     {}", opt(self.z_score, ""))?;
        writeln!(f, "p-value     {}", opt(self.p_value, ""))?;
        writeln!(f, "roc-auc     {}", opt(self.roc_auc, ""))?;
        writeln!(f, "bleu        {}", opt(self.bleu, ""))?;
        write!(f, "target {:.0}% / others {:.0}%", self.target_share, self.others_share)
    }
}
