//! Exporter configuration: typed settings and JSON file loading.

pub mod persistence;
pub mod types;
