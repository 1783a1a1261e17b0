use crate::types::{GeoTransform, SclError, SclResult};
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;

/// Element carrying attributes plus text, e.g. `<SENSING_TIME metadataLevel="Standard">..`
#[derive(Debug, Deserialize)]
struct TextElement {
    #[serde(rename = "$text")]
    value: String,
}

/// Granule tile metadata (`GRANULE/<tile>/MTD_TL.xml`)
#[derive(Debug, Deserialize)]
struct TileRoot {
    #[serde(rename = "General_Info")]
    general_info: Option<TileGeneralInfo>,
    #[serde(rename = "Geometric_Info")]
    geometric_info: GeometricInfo,
}

#[derive(Debug, Deserialize)]
struct TileGeneralInfo {
    #[serde(rename = "TILE_ID")]
    tile_id: Option<TextElement>,
    #[serde(rename = "SENSING_TIME")]
    sensing_time: Option<TextElement>,
}

#[derive(Debug, Deserialize)]
struct GeometricInfo {
    #[serde(rename = "Tile_Geocoding")]
    tile_geocoding: TileGeocoding,
}

#[derive(Debug, Deserialize)]
struct TileGeocoding {
    #[serde(rename = "HORIZONTAL_CS_NAME")]
    horizontal_cs_name: Option<String>,
    #[serde(rename = "HORIZONTAL_CS_CODE")]
    horizontal_cs_code: Option<String>,
    #[serde(rename = "Size", default)]
    sizes: Vec<SizeEntry>,
    #[serde(rename = "Geoposition", default)]
    geopositions: Vec<GeopositionEntry>,
}

#[derive(Debug, Deserialize)]
struct SizeEntry {
    #[serde(rename = "@resolution")]
    resolution: u32,
    #[serde(rename = "NROWS")]
    nrows: usize,
    #[serde(rename = "NCOLS")]
    ncols: usize,
}

#[derive(Debug, Deserialize)]
struct GeopositionEntry {
    #[serde(rename = "@resolution")]
    resolution: u32,
    #[serde(rename = "ULX")]
    ulx: f64,
    #[serde(rename = "ULY")]
    uly: f64,
    #[serde(rename = "XDIM")]
    xdim: f64,
    #[serde(rename = "YDIM")]
    ydim: f64,
}

/// User product metadata (`MTD_MSIL2A.xml` at the product root)
#[derive(Debug, Deserialize)]
struct ProductRoot {
    #[serde(rename = "General_Info")]
    general_info: ProductGeneralInfo,
}

#[derive(Debug, Deserialize)]
struct ProductGeneralInfo {
    #[serde(rename = "Product_Info")]
    product_info: ProductInfoXml,
}

#[derive(Debug, Deserialize)]
struct ProductInfoXml {
    #[serde(rename = "PRODUCT_START_TIME")]
    product_start_time: Option<String>,
    #[serde(rename = "PRODUCT_URI")]
    product_uri: Option<String>,
    #[serde(rename = "PRODUCT_TYPE")]
    product_type: Option<String>,
    #[serde(rename = "PROCESSING_BASELINE")]
    processing_baseline: Option<String>,
    #[serde(rename = "Datatake")]
    datatake: Option<Datatake>,
}

#[derive(Debug, Deserialize)]
struct Datatake {
    #[serde(rename = "SPACECRAFT_NAME")]
    spacecraft_name: Option<String>,
}

/// Declared raster size of the tile at one resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterSize {
    pub resolution_m: u32,
    pub width: usize,
    pub height: usize,
}

/// Georeferencing of a granule as declared by its tile metadata
#[derive(Debug, Clone, PartialEq)]
pub struct TileMetadata {
    pub tile_id: Option<String>,
    pub sensing_time: Option<DateTime<Utc>>,
    pub crs_name: Option<String>,
    pub epsg: Option<u32>,
    pub sizes: Vec<RasterSize>,
    geopositions: Vec<(u32, GeoTransform)>,
}

impl TileMetadata {
    /// Declared raster size at a resolution, if the tile lists it
    pub fn size_at(&self, resolution_m: u32) -> Option<RasterSize> {
        self.sizes
            .iter()
            .find(|s| s.resolution_m == resolution_m)
            .copied()
    }

    /// North-up transform of the tile at a resolution
    pub fn geo_transform_at(&self, resolution_m: u32) -> Option<GeoTransform> {
        self.geopositions
            .iter()
            .find(|(res, _)| *res == resolution_m)
            .map(|(_, gt)| *gt)
    }
}

/// Product-level identification
#[derive(Debug, Clone, PartialEq)]
pub struct ProductInfo {
    pub product_uri: Option<String>,
    pub product_type: Option<String>,
    pub spacecraft: Option<String>,
    pub processing_baseline: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
}

/// Parser for Sentinel-2 L2A metadata XML files
pub struct MetadataParser;

impl MetadataParser {
    /// Parse granule tile metadata
    pub fn parse_tile_metadata(xml_content: &str) -> SclResult<TileMetadata> {
        let root = from_str::<TileRoot>(xml_content)
            .map_err(|e| SclError::XmlParsing(format!("Failed to parse tile metadata: {}", e)))?;

        let geocoding = root.geometric_info.tile_geocoding;
        let (tile_id, sensing_time) = match root.general_info {
            Some(info) => (
                info.tile_id.map(|t| t.value.trim().to_string()),
                info.sensing_time.and_then(|t| Self::parse_time(&t.value)),
            ),
            None => (None, None),
        };

        let epsg = geocoding
            .horizontal_cs_code
            .as_deref()
            .and_then(Self::parse_epsg);

        let sizes = geocoding
            .sizes
            .iter()
            .map(|s| RasterSize {
                resolution_m: s.resolution,
                width: s.ncols,
                height: s.nrows,
            })
            .collect();

        let geopositions = geocoding
            .geopositions
            .iter()
            .map(|g| {
                (
                    g.resolution,
                    GeoTransform::north_up(g.ulx, g.uly, g.xdim, g.ydim),
                )
            })
            .collect();

        Ok(TileMetadata {
            tile_id,
            sensing_time,
            crs_name: geocoding.horizontal_cs_name.map(|s| s.trim().to_string()),
            epsg,
            sizes,
            geopositions,
        })
    }

    /// Parse the user product metadata
    pub fn parse_product_info(xml_content: &str) -> SclResult<ProductInfo> {
        let root = from_str::<ProductRoot>(xml_content)
            .map_err(|e| SclError::XmlParsing(format!("Failed to parse product metadata: {}", e)))?;
        let info = root.general_info.product_info;

        Ok(ProductInfo {
            product_uri: info.product_uri,
            product_type: info.product_type,
            spacecraft: info.datatake.and_then(|d| d.spacecraft_name),
            processing_baseline: info.processing_baseline,
            start_time: info.product_start_time.as_deref().and_then(Self::parse_time),
        })
    }

    /// Parse "EPSG:32632" style codes
    pub fn parse_epsg(code: &str) -> Option<u32> {
        let (authority, value) = code.trim().split_once(':')?;
        if !authority.eq_ignore_ascii_case("EPSG") {
            log::warn!("Ignoring non-EPSG CRS code '{}'", code);
            return None;
        }
        value.trim().parse().ok()
    }

    /// Time parsing that handles the formats found in L2A metadata
    fn parse_time(time_str: &str) -> Option<DateTime<Utc>> {
        let time_str = time_str.trim();
        if let Ok(time) = DateTime::parse_from_rfc3339(time_str) {
            return Some(time.with_timezone(&Utc));
        }

        if let Ok(time) = DateTime::parse_from_str(time_str, "%Y-%m-%dT%H:%M:%S%.fZ") {
            return Some(time.with_timezone(&Utc));
        }

        log::warn!("Could not parse time '{}'", time_str);
        None
    }
}
