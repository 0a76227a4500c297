//! Seq2seq model runtime

pub mod beam;
pub mod marian;

use std::path::Path;
use std::sync::Arc;

use crate::core::errors::Result;

/// A loaded encoder-decoder model that turns source units into target units
pub trait Seq2SeqModel: Send + Sync {
    /// Translate `units` in one invocation; the output has the same length and order
    fn generate(&self, units: &[String]) -> Result<Vec<String>>;
}

/// Builds a [`Seq2SeqModel`] from a directory of downloaded artifacts
pub trait ModelLoader: Send + Sync {
    /// Load tokenizer and weights from `dir`
    fn load(&self, dir: &Path) -> Result<Arc<dyn Seq2SeqModel>>;
}

pub use beam::BeamSearch;
pub use marian::{MarianLoader, MarianTranslator};
