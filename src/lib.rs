//! Alignment translator - Marian sentence translation service
//!
//! Downloads a Marian checkpoint from Azure Blob Storage on first use, loads it
//! once per process, and translates text line by line or sentence by sentence
//! over HTTP or from the command line.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod core;
pub mod inference;
pub mod processors;
pub mod server;
pub mod storage;

#[cfg(test)]
mod testing;

// Re-export key types for convenience
pub use crate::core::{
    config::TranslatorConfig,
    errors::TranslationError,
    models::{Segmentation, SentenceLanguage, TranslationRequest, TranslationResult},
    translator::AsyncTranslator,
};

pub use processors::segmenter::Segmenter;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
