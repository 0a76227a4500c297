//! Core translation engine module

pub mod config;
pub mod errors;
pub mod model_cache;
pub mod models;
pub mod translator;
