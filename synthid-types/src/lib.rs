use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub mod detection;
pub mod generation;
pub mod query;
pub mod stats;
pub mod timestamp;

pub use detection::{Detection, DetectionSummary, Verdict};
pub use generation::{
    AttackRequest, AttackType, Generation, GenerationConfig, GenerationRequest, GenerationSummary,
    ValidationError,
};
pub use query::{DetectionQuery, GenerationQuery};
pub use stats::{DashboardStats, DistributionBin, RocPoint};

macro_rules! record_id {
    ($name:ident) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().trim_start_matches('#').parse().map($name)
            }
        }
    };
}

record_id!(GenerationId);
record_id!(DetectionId);

/// One page of a server-side list.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn empty(page: u32, page_size: u32) -> Self {
        Self {
            total: 0,
            page,
            page_size,
            items: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Latest,
    Oldest,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Latest => "latest",
            SortOrder::Oldest => "oldest",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(SortOrder::Latest),
            "oldest" => Ok(SortOrder::Oldest),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// Shorten a text body for list rows.
pub fn preview(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let mut out: String = text.chars().take(limit).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_parse_with_or_without_hash() {
        assert_eq!("#12".parse::<GenerationId>().unwrap(), GenerationId(12));
        assert_eq!(" 7 ".parse::<DetectionId>().unwrap(), DetectionId(7));
        assert!("abc".parse::<GenerationId>().is_err());
    }

    #[test]
    fn page_without_total_defaults_to_zero() {
        let page: Page<u32> = serde_json::from_str(r#"{"page":1,"page_size":10,"items":[1,2]}"#).unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.items, vec![1, 2]);
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        assert_eq!(preview("short", 100), "short");
        assert_eq!(preview("가나다라", 2), "가나...");
    }
}
