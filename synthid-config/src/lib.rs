use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use synthid_types::{GenerationConfig, ValidationError};
use thiserror::Error;
use tracing::{debug, warn};

pub mod draft;
pub use draft::{attack_intensity_draft, DraftValue, NumericDraft, SamplingField, SamplingForm};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const DEFAULT_RECENT_LIMIT: u32 = 20;

pub const ENV_API_URL: &str = "SYNTHID_API_URL";
pub const ENV_PAGE_SIZE: &str = "SYNTHID_PAGE_SIZE";
pub const ENV_CONFIG: &str = "SYNTHID_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("invalid generation defaults: {0}")]
    Generation(#[from] ValidationError),
}

/// Client settings.
///
/// ```yaml
/// api_url: http://testbed.local:8000
/// page_size: 25
/// generation:
///   model: Gemma-2-2B
///   temperature: 0.9
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_url: String,
    pub page_size: u32,
    pub recent_limit: u32,
    pub generation: GenerationConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            page_size: DEFAULT_PAGE_SIZE,
            recent_limit: DEFAULT_RECENT_LIMIT,
            generation: GenerationConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        // An empty file deserializes to unit, not to a mapping.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: ClientConfig = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded client config");
        Self::from_yaml_str(&text)
    }

    /// Resolve the effective config: explicit path, else `SYNTHID_CONFIG`,
    /// else defaults; then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(ENV_CONFIG).map(PathBuf::from);
        let mut cfg = match path.map(Path::to_path_buf).or(env_path) {
            Some(p) => Self::from_path(p)?,
            None => Self::default(),
        };
        cfg.apply_env()?;
        Ok(cfg)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(url) = lookup(ENV_API_URL).filter(|u| !u.trim().is_empty()) {
            self.api_url = url;
        }
        if let Some(raw) = lookup(ENV_PAGE_SIZE) {
            match raw.trim().parse() {
                Ok(size) => self.page_size = size,
                Err(_) => warn!(value = %raw, "ignoring unparsable {ENV_PAGE_SIZE}"),
            }
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.trim().is_empty() {
            return Err(ConfigError::Invalid("api_url must not be empty".into()));
        }
        if !(1..=200).contains(&self.page_size) {
            return Err(ConfigError::Invalid(format!(
                "page_size must be between 1 and 200 (got {})",
                self.page_size
            )));
        }
        if self.recent_limit == 0 {
            return Err(ConfigError::Invalid("recent_limit must be at least 1".into()));
        }
        self.generation.validate()?;
        Ok(())
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.api_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg = ClientConfig::from_yaml_str(
            "api_url: http://testbed:9000/\ngeneration:\n  model: Gemma-2-2B\n  temperature: 1.1\n",
        )
        .unwrap();
        assert_eq!(cfg.base_url(), "http://testbed:9000");
        assert_eq!(cfg.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(cfg.generation.model, "Gemma-2-2B");
        assert_eq!(cfg.generation.temperature, 1.1);
        assert_eq!(cfg.generation.top_k, Some(50));
        assert_eq!(cfg.generation.watermark_key.as_deref(), Some("secret_key_123"));
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(ClientConfig::from_yaml_str("").unwrap(), ClientConfig::default());
    }

    #[test]
    fn reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "page_size: 25\nrecent_limit: 5").unwrap();

        let cfg = ClientConfig::from_path(file.path()).unwrap();
        assert_eq!(cfg.page_size, 25);
        assert_eq!(cfg.recent_limit, 5);
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
    }

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.yaml");
        let err = ClientConfig::from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("nope.yaml"));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(matches!(
            ClientConfig::from_yaml_str("page_size: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ClientConfig::from_yaml_str("generation:\n  top_p: 1.5"),
            Err(ConfigError::Generation(_))
        ));
        assert!(matches!(
            ClientConfig::from_yaml_str("page_size: [1]"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn overrides_replace_file_values() {
        let env: HashMap<&str, &str> = [(ENV_API_URL, "http://other:8000"), (ENV_PAGE_SIZE, "50")].into();
        let mut cfg = ClientConfig::default();
        cfg.apply_overrides(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.api_url, "http://other:8000");
        assert_eq!(cfg.page_size, 50);
    }

    #[test]
    fn unparsable_page_size_override_is_ignored() {
        let mut cfg = ClientConfig::default();
        cfg.apply_overrides(|k| (k == ENV_PAGE_SIZE).then(|| "lots".to_string()))
            .unwrap();
        assert_eq!(cfg.page_size, DEFAULT_PAGE_SIZE);
    }
}
