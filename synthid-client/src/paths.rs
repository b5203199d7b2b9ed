//! REST paths. Only the `/api/generations/...` family is used; the older
//! `/api/generate` and `/api/detect/{id}` routes are not.

use synthid_types::{DetectionId, GenerationId};

pub const GENERATIONS: &str = "/api/generations";
pub const DETECTIONS: &str = "/api/detections";
pub const DASHBOARD_STATS: &str = "/api/dashboard/stats";

pub fn generation(id: GenerationId) -> String {
    format!("{GENERATIONS}/{id}")
}

pub fn attacks(id: GenerationId) -> String {
    format!("{GENERATIONS}/{id}/attacks")
}

pub fn detections_for(id: GenerationId) -> String {
    format!("{GENERATIONS}/{id}/detections")
}

pub fn detection(id: DetectionId) -> String {
    format!("{DETECTIONS}/{id}")
}
