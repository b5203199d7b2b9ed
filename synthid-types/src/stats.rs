use serde::{Deserialize, Serialize};

use crate::{Detection, Generation};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    pub fpr: f64,
    pub tpr: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistributionBin {
    pub range: String,
    pub clean: u64,
    pub watermarked: u64,
}

/// Aggregate numbers behind the dashboard panel.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    #[serde(default)]
    pub total_verifications: u64,
    #[serde(default)]
    pub avg_auc: f64,
    #[serde(default)]
    pub detection_rate: f64,
    #[serde(default)]
    pub attack_attempts: u64,
    #[serde(default)]
    pub roc_points: Vec<RocPoint>,
    #[serde(default)]
    pub distribution: Vec<DistributionBin>,
}

const BINS: [(&str, f64, f64); 5] = [
    ("0-20", 0.0, 20.0),
    ("20-40", 20.0, 40.0),
    ("40-60", 40.0, 60.0),
    ("60-80", 60.0, 80.0),
    ("80-100", 80.0, 101.0),
];

const ROC_STEPS: usize = 20;

fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

impl DashboardStats {
    /// Derive stats from raw records. Ground truth for each detection is the
    /// `watermark_enabled` flag of the generation it references.
    pub fn from_records(generations: &[Generation], detections: &[Detection]) -> Self {
        let total = detections.len() as u64;

        let aucs: Vec<f64> = detections.iter().filter_map(|d| d.roc_auc).collect();
        let avg_auc = if aucs.is_empty() {
            0.0
        } else {
            round_to(aucs.iter().sum::<f64>() / aucs.len() as f64, 3)
        };

        let detection_rate = if total > 0 {
            let detected = detections.iter().filter(|d| d.is_watermarked).count();
            round_to(detected as f64 / total as f64 * 100.0, 1)
        } else {
            0.0
        };

        let attack_attempts = generations.iter().filter(|g| g.is_attack()).count() as u64;

        let truth = |d: &Detection| {
            generations
                .iter()
                .find(|g| g.id == d.generation_id)
                .map(|g| g.watermark_enabled)
        };

        let scored: Vec<(f64, bool)> = detections
            .iter()
            .filter_map(|d| Some((d.z_score?, truth(d)?)))
            .collect();

        let conf: Vec<(f64, bool)> = detections
            .iter()
            .filter_map(|d| Some((d.confidence?, truth(d)?)))
            .collect();

        let distribution = BINS
            .iter()
            .map(|(label, low, high)| {
                let mut bin = DistributionBin {
                    range: (*label).to_string(),
                    clean: 0,
                    watermarked: 0,
                };
                for (c, is_wm) in &conf {
                    let pct = c * 100.0;
                    if pct >= *low && pct < *high {
                        if *is_wm {
                            bin.watermarked += 1;
                        } else {
                            bin.clean += 1;
                        }
                    }
                }
                bin
            })
            .collect();

        Self {
            total_verifications: total,
            avg_auc,
            detection_rate,
            attack_attempts,
            roc_points: roc_curve(&scored),
            distribution,
        }
    }
}

fn roc_curve(scored: &[(f64, bool)]) -> Vec<RocPoint> {
    if scored.is_empty() {
        return Vec::new();
    }
    let pos: Vec<f64> = scored.iter().filter(|(_, wm)| *wm).map(|(z, _)| *z).collect();
    let neg: Vec<f64> = scored.iter().filter(|(_, wm)| !*wm).map(|(z, _)| *z).collect();

    if pos.is_empty() || neg.is_empty() {
        // One class missing: no real curve can be drawn.
        return [(0.0, 0.0), (0.1, 0.8), (0.3, 0.9), (1.0, 1.0)]
            .into_iter()
            .map(|(fpr, tpr)| RocPoint { fpr, tpr })
            .collect();
    }

    let min_z = scored.iter().map(|(z, _)| *z).fold(f64::INFINITY, f64::min);
    let max_z = scored.iter().map(|(z, _)| *z).fold(f64::NEG_INFINITY, f64::max);

    let mut points: Vec<RocPoint> = (0..=ROC_STEPS)
        .map(|i| {
            let threshold = max_z - (i as f64 * (max_z - min_z) / ROC_STEPS as f64);
            let tp = pos.iter().filter(|s| **s >= threshold).count();
            let fp = neg.iter().filter(|s| **s >= threshold).count();
            RocPoint {
                fpr: round_to(fp as f64 / neg.len() as f64, 3),
                tpr: round_to(tp as f64 / pos.len() as f64, 3),
            }
        })
        .collect();
    points.sort_by(|a, b| a.fpr.total_cmp(&b.fpr));
    points
}
