//! Classification band extraction from Sentinel-2 L2A products

use crate::io::decode::decode_band;
use crate::io::metadata::{ProductInfo, TileMetadata};
use crate::io::product::{BandFile, ProductReader};
use crate::types::{ClassificationGrid, GeoReference, SclError, SclResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Resolution the L2A processor natively produces the SCL band at
pub const NATIVE_SCL_RESOLUTION_M: u32 = 20;

/// Which resolution to read when a product carries the band more than once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionPolicy {
    /// 20 m if present, otherwise the finest available
    Native,
    /// Smallest pixel size available
    Finest,
    /// Exactly this many metres, nothing else
    Exact(u32),
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        ResolutionPolicy::Native
    }
}

/// Extraction parameters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    pub resolution: ResolutionPolicy,
    /// Where archive members are unpacked; system temp directory if unset
    pub scratch_dir: Option<PathBuf>,
}

/// Everything read from a product in one extraction
#[derive(Debug, Clone)]
pub struct ExtractedProduct {
    pub grid: ClassificationGrid,
    pub band: BandFile,
    pub product_info: Option<ProductInfo>,
}

/// Pick the band to read according to `policy`.
///
/// Several granules at the chosen resolution are resolved by taking the
/// lexicographically smallest path.
pub fn select_band(bands: &[BandFile], policy: ResolutionPolicy) -> Option<&BandFile> {
    let finest = || bands.iter().map(|b| b.resolution_m).min();
    let resolution = match policy {
        ResolutionPolicy::Native => {
            if bands.iter().any(|b| b.resolution_m == NATIVE_SCL_RESOLUTION_M) {
                NATIVE_SCL_RESOLUTION_M
            } else {
                finest()?
            }
        }
        ResolutionPolicy::Finest => finest()?,
        ResolutionPolicy::Exact(resolution) => resolution,
    };

    let mut candidates: Vec<&BandFile> = bands
        .iter()
        .filter(|b| b.resolution_m == resolution)
        .collect();
    candidates.sort_by(|a, b| a.path.cmp(&b.path));

    if candidates.len() > 1 {
        log::warn!(
            "{} SCL bands at {} m, using {}",
            candidates.len(),
            resolution,
            candidates[0].path
        );
    }
    candidates.into_iter().next()
}

/// Reads the scene classification band out of a product
pub struct ClassificationExtractor {
    options: ExtractOptions,
}

impl ClassificationExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    /// Create an extractor with the native resolution policy
    pub fn standard() -> Self {
        Self::new(ExtractOptions::default())
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract the classification grid of a product
    pub fn extract<P: AsRef<Path>>(&self, product_path: P) -> SclResult<ClassificationGrid> {
        self.extract_product(product_path).map(|p| p.grid)
    }

    /// Extract the grid together with the band it came from and product identification.
    ///
    /// The archive handle and any scratch file live only for the duration of
    /// this call.
    pub fn extract_product<P: AsRef<Path>>(&self, product_path: P) -> SclResult<ExtractedProduct> {
        let product_path = product_path.as_ref();
        log::info!("Extracting scene classification from {}", product_path.display());
        let start = std::time::Instant::now();

        let mut reader = ProductReader::open(product_path)?;
        let bands = reader.find_classification_bands()?;
        if bands.is_empty() {
            return Err(SclError::BandMissing {
                product: product_path.to_path_buf(),
                detail: "no *_SCL_<res>m band in product".to_string(),
            });
        }

        let band = select_band(&bands, self.options.resolution)
            .cloned()
            .ok_or_else(|| {
                let mut available: Vec<u32> = bands.iter().map(|b| b.resolution_m).collect();
                available.sort_unstable();
                available.dedup();
                SclError::BandMissing {
                    product: product_path.to_path_buf(),
                    detail: format!(
                        "no SCL band matching {:?} (available: {:?} m)",
                        self.options.resolution, available
                    ),
                }
            })?;
        log::info!("Reading SCL band from {}", band.path);

        let band_label = product_path.join(&band.path);
        let tile = reader.read_tile_metadata(&band).map_err(|e| match e {
            SclError::XmlParsing(reason) => SclError::decode(&band_label, reason),
            SclError::Io(e) => SclError::decode(&band_label, e),
            other => other,
        })?;

        let decoded = {
            let local = reader.materialize(&band, self.options.scratch_dir.as_deref())?;
            decode_band(local.path(), band.format).map_err(|e| match e {
                SclError::DecodeError { reason, .. } => SclError::decode(&band_label, reason),
                other => other,
            })?
        };

        match tile.as_ref().and_then(|t| t.size_at(band.resolution_m)) {
            Some(declared) if (declared.width, declared.height) != (decoded.width, decoded.height) => {
                return Err(SclError::decode(
                    &band_label,
                    format!(
                        "raster is {}x{} but the tile declares {}x{} at {} m",
                        decoded.width,
                        decoded.height,
                        declared.width,
                        declared.height,
                        band.resolution_m
                    ),
                ));
            }
            Some(_) => {}
            None => log::debug!("No declared size at {} m, using raster header", band.resolution_m),
        }

        let georef = build_georeference(&band, tile.as_ref(), decoded.geo_transform, decoded.epsg);
        let grid = ClassificationGrid::new(decoded.width, decoded.height, decoded.codes)?
            .with_georeference(georef);

        let product_info = match reader.read_product_info() {
            Ok(info) => info,
            Err(e) => {
                log::warn!("Ignoring unreadable product metadata: {}", e);
                None
            }
        };

        log::info!(
            "Read {}x{} SCL grid at {} m in {:?}",
            grid.width(),
            grid.height(),
            band.resolution_m,
            start.elapsed()
        );

        Ok(ExtractedProduct {
            grid,
            band,
            product_info,
        })
    }
}

fn build_georeference(
    band: &BandFile,
    tile: Option<&TileMetadata>,
    raster_transform: Option<crate::types::GeoTransform>,
    raster_epsg: Option<u32>,
) -> GeoReference {
    let geo_transform = tile
        .and_then(|t| t.geo_transform_at(band.resolution_m))
        .or(raster_transform);
    let pixel_size = geo_transform
        .map(|gt| (gt.pixel_width.abs(), gt.pixel_height.abs()))
        .unwrap_or((band.resolution_m as f64, band.resolution_m as f64));

    GeoReference {
        crs_name: tile.and_then(|t| t.crs_name.clone()),
        epsg: tile.and_then(|t| t.epsg).or(raster_epsg),
        geo_transform,
        pixel_size,
        resolution_m: band.resolution_m,
        source: PathBuf::from(&band.path),
    }
}

/// Extract the classification grid of a product with default options
pub fn extract<P: AsRef<Path>>(product_path: P) -> SclResult<ClassificationGrid> {
    ClassificationExtractor::standard().extract(product_path)
}
