use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DetectionId, GenerationId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Detected,
    NotDetected,
}

impl Verdict {
    pub fn from_flag(is_watermarked: bool) -> Self {
        if is_watermarked {
            Verdict::Detected
        } else {
            Verdict::NotDetected
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Verdict::Detected => "Watermark Detected",
            Verdict::NotDetected => "No Watermark",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scale a 0..1 score to a percentage rounded to one decimal, clamped to [0, 100].
pub fn percent(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    ((score * 100.0).clamp(0.0, 100.0) * 10.0).round() / 10.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "detection_id")]
    pub id: DetectionId,
    pub generation_id: GenerationId,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    pub input_text: String,
    pub is_watermarked: bool,
    #[serde(default)]
    pub z_score: Option<f64>,
    #[serde(default)]
    pub p_value: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub true_positive_rate: Option<f64>,
    #[serde(default)]
    pub false_positive_rate: Option<f64>,
    #[serde(default)]
    pub roc_auc: Option<f64>,
    #[serde(default)]
    pub bleu_score: Option<f64>,
}

impl Detection {
    pub fn verdict(&self) -> Verdict {
        Verdict::from_flag(self.is_watermarked)
    }

    pub fn confidence_percent(&self) -> f64 {
        self.confidence.map(percent).unwrap_or(0.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionSummary {
    #[serde(rename = "detection_id")]
    pub id: DetectionId,
    pub generation_id: GenerationId,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub input_text_preview: String,
    pub is_watermarked: bool,
    #[serde(default)]
    pub z_score: Option<f64>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl DetectionSummary {
    pub fn verdict(&self) -> Verdict {
        Verdict::from_flag(self.is_watermarked)
    }

    pub fn confidence_percent(&self) -> f64 {
        self.confidence.map(percent).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_rounds_and_clamps() {
        assert_eq!(percent(0.95), 95.0);
        assert_eq!(percent(0.12345), 12.3);
        assert_eq!(percent(1.7), 100.0);
        assert_eq!(percent(-0.2), 0.0);
        assert_eq!(percent(f64::NAN), 0.0);
    }

    #[test]
    fn verdict_labels_match_dashboard_wording() {
        assert_eq!(Verdict::from_flag(true).to_string(), "Watermark Detected");
        assert_eq!(Verdict::from_flag(false).to_string(), "No Watermark");
    }
}
