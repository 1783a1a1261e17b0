//! I/O modules for reading Sentinel-2 products and their classification band

pub mod product;
pub mod metadata;
pub mod decode;
pub mod extractor;

pub use product::{BandFile, ProductReader};
pub use metadata::{MetadataParser, ProductInfo, TileMetadata};
pub use decode::{decode_band, BandFormat, DecodedBand};
pub use extractor::{extract, ClassificationExtractor, ExtractOptions, ResolutionPolicy};
