//! Model artifact storage

pub mod artifacts;
pub mod blob;
