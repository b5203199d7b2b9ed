//! Numeric inputs edited as text.
//!
//! The draft string follows the keyboard; the committed value only changes
//! when the draft parses to something in range, or on blur.

use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;

use synthid_types::GenerationConfig;

pub trait DraftValue: Copy + PartialOrd + FromStr + Display {}

impl<T: Copy + PartialOrd + FromStr + Display> DraftValue for T {}

#[derive(Clone, Debug, PartialEq)]
pub struct NumericDraft<T: DraftValue> {
    text: String,
    value: T,
    /// Last value exchanged with the canonical config.
    synced: T,
    min: T,
    max: T,
}

impl<T: DraftValue> NumericDraft<T> {
    pub fn new(value: T, min: T, max: T) -> Self {
        let value = clamp(value, min, max);
        Self {
            text: value.to_string(),
            value,
            synced: value,
            min,
            max,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn value(&self) -> T {
        self.value
    }

    pub fn bounds(&self) -> (T, T) {
        (self.min, self.max)
    }

    /// A keystroke. Returns the newly committed value, if any.
    pub fn input(&mut self, text: impl Into<String>) -> Option<T> {
        self.text = text.into();
        let parsed = self.parse()?;
        if self.in_range(parsed) {
            self.value = parsed;
            self.synced = parsed;
            Some(parsed)
        } else {
            None
        }
    }

    /// Leave the field: blank commits the minimum, out-of-range input is
    /// clamped, garbage reverts to the last committed value.
    pub fn blur(&mut self) -> T {
        if self.text.trim().is_empty() {
            self.value = self.min;
        } else if let Some(parsed) = self.parse() {
            self.value = clamp(parsed, self.min, self.max);
        }
        self.text = self.value.to_string();
        self.synced = self.value;
        self.value
    }

    /// Adopt a value changed elsewhere. Returns whether the draft moved.
    ///
    /// A canonical value equal to the last one seen leaves the draft alone,
    /// so echoes of our own commits keep half-typed text like `1.`.
    pub fn sync(&mut self, canonical: T) -> bool {
        let canonical = clamp(canonical, self.min, self.max);
        if self.synced.partial_cmp(&canonical) == Some(Ordering::Equal) {
            return false;
        }
        self.synced = canonical;
        self.value = canonical;
        self.text = canonical.to_string();
        true
    }

    fn parse(&self) -> Option<T> {
        let parsed: T = self.text.trim().parse().ok()?;
        // NaN compares as None against itself.
        parsed.partial_cmp(&parsed)?;
        Some(parsed)
    }

    fn in_range(&self, v: T) -> bool {
        v >= self.min && v <= self.max
    }
}

fn clamp<T: DraftValue>(v: T, min: T, max: T) -> T {
    if v < min {
        min
    } else if v > max {
        max
    } else {
        v
    }
}

pub fn attack_intensity_draft(value: u32) -> NumericDraft<u32> {
    NumericDraft::new(value, 0, 100)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SamplingField {
    Temperature,
    TopK,
    TopP,
    MaxTokens,
}

/// Sampling fields of the generation form.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplingForm {
    pub temperature: NumericDraft<f64>,
    pub top_k: NumericDraft<u32>,
    pub top_p: NumericDraft<f64>,
    pub max_tokens: NumericDraft<u32>,
}

impl SamplingForm {
    pub fn from_config(cfg: &GenerationConfig) -> Self {
        Self {
            temperature: NumericDraft::new(cfg.temperature, 0.0, 2.0),
            top_k: NumericDraft::new(cfg.top_k.unwrap_or(50), 1, 100),
            top_p: NumericDraft::new(cfg.top_p.unwrap_or(0.9), 0.0, 1.0),
            max_tokens: NumericDraft::new(cfg.max_tokens, 1, 4096),
        }
    }

    /// Write the committed values into `cfg`.
    pub fn apply(&self, cfg: &mut GenerationConfig) {
        cfg.temperature = self.temperature.value();
        cfg.top_k = Some(self.top_k.value());
        cfg.top_p = Some(self.top_p.value());
        cfg.max_tokens = self.max_tokens.value();
    }

    pub fn sync(&mut self, cfg: &GenerationConfig) -> bool {
        let mut moved = self.temperature.sync(cfg.temperature);
        if let Some(k) = cfg.top_k {
            moved |= self.top_k.sync(k);
        }
        if let Some(p) = cfg.top_p {
            moved |= self.top_p.sync(p);
        }
        moved |= self.max_tokens.sync(cfg.max_tokens);
        moved
    }

    /// A keystroke in one field. True when it committed a new value.
    pub fn input(&mut self, field: SamplingField, text: &str) -> bool {
        match field {
            SamplingField::Temperature => self.temperature.input(text).is_some(),
            SamplingField::TopK => self.top_k.input(text).is_some(),
            SamplingField::TopP => self.top_p.input(text).is_some(),
            SamplingField::MaxTokens => self.max_tokens.input(text).is_some(),
        }
    }

    pub fn blur(&mut self, field: SamplingField) {
        match field {
            SamplingField::Temperature => {
                self.temperature.blur();
            }
            SamplingField::TopK => {
                self.top_k.blur();
            }
            SamplingField::TopP => {
                self.top_p.blur();
            }
            SamplingField::MaxTokens => {
                self.max_tokens.blur();
            }
        }
    }

    pub fn blur_all(&mut self) {
        self.temperature.blur();
        self.top_k.blur();
        self.top_p.blur();
        self.max_tokens.blur();
    }
}
