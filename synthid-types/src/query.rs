use crate::{AttackType, SortOrder};

/// Query string for `GET /api/generations`.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationQuery {
    pub page: u32,
    pub page_size: u32,
    pub sort: SortOrder,
    pub search: Option<String>,
    pub model: Option<String>,
    pub watermark_enabled: Option<bool>,
    pub attack_type: Option<AttackType>,
}

impl GenerationQuery {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            sort: SortOrder::Latest,
            search: None,
            model: None,
            watermark_enabled: None,
            attack_type: None,
        }
    }

    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("page_size", self.page_size.to_string()),
            ("sort", self.sort.to_string()),
        ];
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        if let Some(model) = &self.model {
            pairs.push(("model", model.clone()));
        }
        if let Some(wm) = self.watermark_enabled {
            pairs.push(("watermark_enabled", wm.to_string()));
        }
        if let Some(attack) = self.attack_type {
            pairs.push(("attack_type", attack.to_string()));
        }
        pairs
    }
}

/// Query string for `GET /api/detections`.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionQuery {
    pub page: u32,
    pub page_size: u32,
    pub sort: SortOrder,
    pub search: Option<String>,
    pub is_watermarked: Option<bool>,
    pub min_confidence: Option<f64>,
}

impl DetectionQuery {
    pub fn new(page: u32, page_size: u32) -> Self {
        Self {
            page,
            page_size,
            sort: SortOrder::Latest,
            search: None,
            is_watermarked: None,
            min_confidence: None,
        }
    }

    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("page_size", self.page_size.to_string()),
            ("sort", self.sort.to_string()),
        ];
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        if let Some(wm) = self.is_watermarked {
            pairs.push(("is_watermarked", wm.to_string()));
        }
        if let Some(min) = self.min_confidence {
            pairs.push(("min_confidence", min.to_string()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_search_is_not_sent() {
        let mut q = GenerationQuery::new(2, 10);
        q.search = Some(String::new());
        q.model = Some("Gemma-2-2B".into());
        let pairs = q.to_pairs();
        assert!(pairs.iter().all(|(k, _)| *k != "search"));
        assert!(pairs.contains(&("model", "Gemma-2-2B".to_string())));
        assert_eq!(pairs[0], ("page", "2".to_string()));
        assert_eq!(pairs[2], ("sort", "latest".to_string()));
    }
}
