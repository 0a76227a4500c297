//! Core data models for translation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::errors::{Result, TranslationError};

/// How an input text is cut into translation units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segmentation {
    /// Input already carries line structure: one unit per non-blank line
    PreSegmented,
    /// Single paragraph: units come from sentence-boundary detection
    SentenceDetected,
}

impl Segmentation {
    /// Pick the strategy for a raw input text
    pub fn for_text(text: &str) -> Self {
        if text.contains('\n') {
            Segmentation::PreSegmented
        } else {
            Segmentation::SentenceDetected
        }
    }

    /// Separator used to join translated units back together
    pub fn separator(self) -> &'static str {
        match self {
            Segmentation::PreSegmented => "\n",
            Segmentation::SentenceDetected => " ",
        }
    }
}

impl fmt::Display for Segmentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segmentation::PreSegmented => write!(f, "pre-segmented"),
            Segmentation::SentenceDetected => write!(f, "sentence-detected"),
        }
    }
}

/// Natural language the sentence detector is tuned for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentenceLanguage {
    /// English
    #[default]
    English,
    /// German
    German,
    /// French
    French,
    /// Spanish
    Spanish,
    /// Arabic
    Arabic,
}

impl FromStr for SentenceLanguage {
    type Err = TranslationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(SentenceLanguage::English),
            "de" | "german" => Ok(SentenceLanguage::German),
            "fr" | "french" => Ok(SentenceLanguage::French),
            "es" | "spanish" => Ok(SentenceLanguage::Spanish),
            "ar" | "arabic" => Ok(SentenceLanguage::Arabic),
            other => Err(TranslationError::ConfigError {
                message: format!("Unsupported sentence language: {}", other),
            }),
        }
    }
}

/// Translation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    /// Raw input text
    pub text: String,
}

impl TranslationRequest {
    /// Request for `text`
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Ordered units handed to the model in a single invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentBatch {
    /// Units passed to the model in one invocation
    pub units: Vec<String>,
}

impl SegmentBatch {
    /// Batch over `units`
    pub fn new(units: Vec<String>) -> Self {
        Self { units }
    }

    /// Number of units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the batch has no units
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// The batches produced for one request and the strategy that produced them.
///
/// In the pre-segmented branch blank lines are dropped before batching, so an
/// input with an intentionally empty line comes back with one line fewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPlan {
    /// Strategy chosen for the input
    pub strategy: Segmentation,
    /// Batches in input order
    pub batches: Vec<SegmentBatch>,
}

impl SegmentPlan {
    /// Total number of units across all batches
    pub fn unit_count(&self) -> usize {
        self.batches.iter().map(SegmentBatch::len).sum()
    }

    /// Whether there is nothing to translate
    pub fn is_empty(&self) -> bool {
        self.unit_count() == 0
    }

    /// Recombine per-batch model outputs into the final text.
    ///
    /// `outputs[i]` must hold exactly as many strings as `batches[i]` has units.
    pub fn reassemble(&self, outputs: Vec<Vec<String>>) -> Result<String> {
        if outputs.len() != self.batches.len() {
            return Err(TranslationError::UnitCountMismatch {
                expected: self.batches.len(),
                actual: outputs.len(),
            });
        }

        let mut units = Vec::with_capacity(self.unit_count());
        for (batch, translated) in self.batches.iter().zip(outputs) {
            if translated.len() != batch.len() {
                return Err(TranslationError::UnitCountMismatch {
                    expected: batch.len(),
                    actual: translated.len(),
                });
            }
            units.extend(translated);
        }

        Ok(units.join(self.strategy.separator()))
    }
}

/// Translation result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationResult {
    /// Output text
    pub translated_text: String,
    /// Strategy used for the input
    pub strategy: Segmentation,
    /// Number of units sent to the model
    pub unit_count: usize,
}
