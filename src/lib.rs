//! sclmap: Sentinel-2 Scene Classification Layer maps
//!
//! This library reads the per-pixel scene classification band (SCL) out of a
//! Sentinel-2 L2A product, zipped or unpacked, and renders it as a
//! color-coded image with a legend.

pub mod types;
pub mod io;
pub mod core;
pub mod config;
pub mod pipeline;

// Re-export main types and functions for easier access
pub use types::{
    ClassCode, ClassificationGrid, GeoReference, GeoTransform, SclError, SclResult,
};

pub use io::{extract, ClassificationExtractor, ExtractOptions, ProductReader, ResolutionPolicy};
pub use core::{
    render, ClassDefinition, ClassEntry, ClassStatistics, MapRenderer, RenderOptions,
    RenderedImage, Rgb,
};
pub use config::MapConfig;
pub use pipeline::{generate_classification_map, MapSummary};
