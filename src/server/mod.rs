//! HTTP API

pub mod api;
