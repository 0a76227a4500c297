//! Text segmentation

pub mod segmenter;
