use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::GenerationId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("prompt must not be empty")]
    EmptyPrompt,
    #[error("model must not be empty")]
    EmptyModel,
    #[error("{field} must be between {min} and {max} (got {value})")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("unknown attack type: {0}")]
    UnknownAttack(String),
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if value.is_nan() || value < min || value > max {
        return Err(ValidationError::OutOfRange { field, min, max, value });
    }
    Ok(())
}

/// Adversarial transformation applied by the backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttackType {
    #[default]
    Deletion,
    Substitution,
    Summarization,
}

impl AttackType {
    pub const ALL: [AttackType; 3] = [AttackType::Deletion, AttackType::Substitution, AttackType::Summarization];

    pub fn as_str(self) -> &'static str {
        match self {
            AttackType::Deletion => "deletion",
            AttackType::Substitution => "substitution",
            AttackType::Summarization => "summarization",
        }
    }
}

impl fmt::Display for AttackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttackType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AttackType::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownAttack(s.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttackRequest {
    pub attack_type: AttackType,
    pub attack_intensity: f64,
}

impl AttackRequest {
    pub fn new(attack_type: AttackType, attack_intensity: f64) -> Self {
        Self {
            attack_type,
            attack_intensity,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("attack_intensity", self.attack_intensity, 0.0, 100.0)
    }
}

/// Sampling and watermark settings sent with every generation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantization: Option<String>,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    pub max_tokens: u32,
    pub watermark_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tournament_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub g_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark_key: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "Llama-3-8B".into(),
            quantization: Some("4-bit".into()),
            temperature: 0.7,
            top_k: Some(50),
            top_p: Some(0.9),
            max_tokens: 200,
            watermark_enabled: true,
            context_width: Some(3),
            tournament_size: Some(10),
            g_value: Some(0.25),
            watermark_key: Some("secret_key_123".into()),
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.model.trim().is_empty() {
            return Err(ValidationError::EmptyModel);
        }
        check_range("temperature", self.temperature, 0.0, 2.0)?;
        if let Some(top_k) = self.top_k {
            check_range("top_k", f64::from(top_k), 1.0, f64::from(u32::MAX))?;
        }
        if let Some(top_p) = self.top_p {
            check_range("top_p", top_p, 0.0, 1.0)?;
        }
        check_range("max_tokens", f64::from(self.max_tokens), 1.0, 4096.0)?;
        if let Some(width) = self.context_width {
            check_range("context_width", f64::from(width), 1.0, 5.0)?;
        }
        if let Some(size) = self.tournament_size {
            check_range("tournament_size", f64::from(size), 1.0, f64::from(u32::MAX))?;
        }
        if let Some(g) = self.g_value {
            check_range("g_value", g, 0.0, f64::MAX)?;
        }
        Ok(())
    }
}

/// Body of `POST /api/generations`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    #[serde(flatten)]
    pub config: GenerationConfig,
    pub input_text: String,
}

impl GenerationRequest {
    pub fn new(config: GenerationConfig, input_text: impl Into<String>) -> Self {
        Self {
            config,
            input_text: input_text.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.input_text.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        self.config.validate()
    }
}

/// Full generation record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    #[serde(rename = "generation_id")]
    pub id: GenerationId,
    #[serde(default)]
    pub original_id: Option<GenerationId>,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    pub input_text: String,
    pub output_text: String,
    pub model: String,
    #[serde(default)]
    pub quantization: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_k: Option<u32>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    pub watermark_enabled: bool,
    #[serde(default)]
    pub context_width: Option<u32>,
    #[serde(default)]
    pub tournament_size: Option<u32>,
    #[serde(default)]
    pub g_value: Option<f64>,
    #[serde(default)]
    pub watermark_key: Option<String>,
    #[serde(default)]
    pub attack_type: Option<AttackType>,
    #[serde(default)]
    pub attack_intensity: Option<f64>,
}

impl Generation {
    pub fn is_attack(&self) -> bool {
        self.attack_type.is_some()
    }

    pub fn summary(&self) -> GenerationSummary {
        GenerationSummary {
            id: self.id,
            original_id: self.original_id,
            created_at: self.created_at,
            input_text: self.input_text.clone(),
            model: self.model.clone(),
            watermark_enabled: self.watermark_enabled,
            attack_type: self.attack_type,
            attack_intensity: self.attack_intensity,
        }
    }
}

/// List row; carries no `output_text`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    #[serde(rename = "generation_id")]
    pub id: GenerationId,
    #[serde(default)]
    pub original_id: Option<GenerationId>,
    #[serde(with = "crate::timestamp")]
    pub created_at: DateTime<Utc>,
    pub input_text: String,
    pub model: String,
    pub watermark_enabled: bool,
    #[serde(default)]
    pub attack_type: Option<AttackType>,
    #[serde(default)]
    pub attack_intensity: Option<f64>,
}

impl GenerationSummary {
    pub fn is_attack(&self) -> bool {
        self.attack_type.is_some()
    }
}
