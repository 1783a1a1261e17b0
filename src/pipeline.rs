//! End-to-end map generation: extract the band, summarise it, render it.

use crate::config::MapConfig;
use crate::core::classes::ClassDefinition;
use crate::core::renderer::MapRenderer;
use crate::core::statistics::ClassStatistics;
use crate::io::extractor::ClassificationExtractor;
use crate::io::metadata::ProductInfo;
use crate::types::SclResult;
use std::path::{Path, PathBuf};

/// SCL codes counted as cloud cover (medium, high probability and cirrus)
pub const SCL_CLOUD_CODES: [u8; 3] = [8, 9, 10];

/// What a pipeline run produced
#[derive(Debug, Clone)]
pub struct MapSummary {
    pub output: PathBuf,
    pub width: usize,
    pub height: usize,
    pub resolution_m: u32,
    pub band_path: String,
    pub product_info: Option<ProductInfo>,
    pub statistics: ClassStatistics,
}

/// Extract the classification band of `product_path` and render it to `output_path`
pub fn generate_classification_map<P, Q>(
    product_path: P,
    output_path: Q,
    config: &MapConfig,
) -> SclResult<MapSummary>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let classes = config.class_definition()?;
    let renderer = MapRenderer::new(config.render.clone())?;
    let extractor = ClassificationExtractor::new(config.extract.clone());

    let extracted = extractor.extract_product(product_path)?;
    let grid = &extracted.grid;
    if let Some(info) = &extracted.product_info {
        log::info!(
            "Product {} ({})",
            info.product_uri.as_deref().unwrap_or("unknown"),
            info.spacecraft.as_deref().unwrap_or("unknown spacecraft")
        );
    }

    let statistics = ClassStatistics::compute(grid, &classes)?;
    log::info!("Class coverage of {}x{} grid:", grid.width(), grid.height());
    statistics.log_summary();
    if &classes == ClassDefinition::scl() {
        log::info!(
            "Cloud coverage: {:.2}%",
            statistics.coverage(&SCL_CLOUD_CODES)
        );
    }

    let output_path = output_path.as_ref();
    renderer.render(grid, &classes, output_path)?;

    Ok(MapSummary {
        output: output_path.to_path_buf(),
        width: grid.width(),
        height: grid.height(),
        resolution_m: extracted.band.resolution_m,
        band_path: extracted.band.path,
        product_info: extracted.product_info,
        statistics,
    })
}
