use crate::io::decode::BandFormat;
use crate::io::metadata::{MetadataParser, ProductInfo, TileMetadata};
use crate::types::{SclError, SclResult};
use lazy_static::lazy_static;
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use zip::ZipArchive;

lazy_static! {
    /// `..._SCL_20m.jp2`, `..._SCL_60m.tif`, ...
    static ref SCL_BAND_PATTERN: Regex =
        Regex::new(r"(?i)_SCL_(\d+)m\.(jp2|tiff?)$").expect("valid SCL band pattern");
}

const PRODUCT_METADATA_FILE: &str = "MTD_MSIL2A.xml";
const TILE_METADATA_FILE: &str = "MTD_TL.xml";

/// A classification band file found in a product
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandFile {
    /// Product-relative path using `/` separators
    pub path: String,
    pub resolution_m: u32,
    pub format: BandFormat,
}

impl BandFile {
    /// Recognise a classification band from its product-relative path
    pub fn from_path(path: &str) -> Option<Self> {
        let captures = SCL_BAND_PATTERN.captures(path)?;
        let resolution_m = captures.get(1)?.as_str().parse().ok()?;
        let format = BandFormat::from_extension(captures.get(2)?.as_str())?;
        Some(Self {
            path: path.to_string(),
            resolution_m,
            format,
        })
    }

    /// Path of the granule directory (`.../GRANULE/<tile>`) holding this band
    pub fn granule_dir(&self) -> Option<String> {
        let parts: Vec<&str> = self.path.split('/').collect();
        let idx = parts
            .iter()
            .position(|p| p.eq_ignore_ascii_case("GRANULE"))?;
        if idx + 1 >= parts.len() - 1 {
            return None;
        }
        Some(parts[..=idx + 1].join("/"))
    }
}

/// A band made available on local storage for decoding.
///
/// For zipped products the band is copied into a scratch file that is
/// removed when this value is dropped.
#[derive(Debug)]
pub struct LocalBand {
    path: PathBuf,
    _scratch: Option<NamedTempFile>,
}

impl LocalBand {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

enum ProductSource {
    Directory(PathBuf),
    Archive(ZipArchive<File>),
}

/// Sentinel-2 L2A product reader for `.zip` archives and unpacked `.SAFE` directories
pub struct ProductReader {
    product_path: PathBuf,
    source: ProductSource,
    files: Option<Vec<String>>,
}

impl ProductReader {
    /// Open a product archive or directory
    pub fn open<P: AsRef<Path>>(product_path: P) -> SclResult<Self> {
        let product_path = product_path.as_ref().to_path_buf();

        if !product_path.exists() {
            return Err(SclError::ProductNotFound {
                path: product_path,
                reason: "path does not exist".to_string(),
            });
        }

        let source = if product_path.is_file() && has_extension(&product_path, "zip") {
            let file = File::open(&product_path).map_err(|e| SclError::decode(&product_path, e))?;
            let archive = ZipArchive::new(file).map_err(|e| {
                SclError::decode(&product_path, format!("Failed to open ZIP: {}", e))
            })?;
            log::debug!("Opened product archive with {} entries", archive.len());
            ProductSource::Archive(archive)
        } else if product_path.is_dir() && has_extension(&product_path, "safe") {
            ProductSource::Directory(product_path.clone())
        } else {
            return Err(SclError::ProductNotFound {
                path: product_path,
                reason: "expected a .zip archive or a .SAFE directory".to_string(),
            });
        };

        Ok(Self {
            product_path,
            source,
            files: None,
        })
    }

    pub fn product_path(&self) -> &Path {
        &self.product_path
    }

    /// List all files in the product, sorted, as product-relative paths
    pub fn list_files(&mut self) -> SclResult<Vec<String>> {
        if let Some(files) = &self.files {
            return Ok(files.clone());
        }

        let mut files = match &mut self.source {
            ProductSource::Directory(root) => {
                let mut files = Vec::new();
                collect_files(root, root, &mut files)?;
                files
            }
            ProductSource::Archive(archive) => {
                let mut files = Vec::with_capacity(archive.len());
                for i in 0..archive.len() {
                    let entry = archive.by_index(i).map_err(|e| {
                        SclError::decode(
                            &self.product_path,
                            format!("Failed to access entry {}: {}", i, e),
                        )
                    })?;
                    if !entry.is_dir() {
                        files.push(entry.name().to_string());
                    }
                }
                files
            }
        };
        files.sort();

        self.files = Some(files.clone());
        Ok(files)
    }

    /// Find every classification band the product carries, at any resolution
    pub fn find_classification_bands(&mut self) -> SclResult<Vec<BandFile>> {
        let bands: Vec<BandFile> = self
            .list_files()?
            .iter()
            .filter_map(|f| BandFile::from_path(f))
            .collect();

        for band in &bands {
            log::debug!("Found SCL band at {} m: {}", band.resolution_m, band.path);
        }
        Ok(bands)
    }

    /// Read a product-relative file fully into memory
    pub fn read_file(&mut self, file_path: &str) -> SclResult<Vec<u8>> {
        let mut content = Vec::new();
        match &mut self.source {
            ProductSource::Directory(root) => {
                let path = root.join(file_path);
                File::open(&path)
                    .and_then(|mut file| file.read_to_end(&mut content))
                    .map_err(|e| SclError::decode(&path, e))?;
            }
            ProductSource::Archive(archive) => {
                let mut entry = archive.by_name(file_path).map_err(|e| {
                    SclError::decode(
                        self.product_path.join(file_path),
                        format!("Failed to access entry: {}", e),
                    )
                })?;
                entry.read_to_end(&mut content).map_err(|e| {
                    SclError::decode(self.product_path.join(file_path), e)
                })?;
            }
        }
        Ok(content)
    }

    fn read_file_as_string(&mut self, file_path: &str) -> SclResult<String> {
        let bytes = self.read_file(file_path)?;
        String::from_utf8(bytes).map_err(|e| {
            SclError::XmlParsing(format!("{} is not valid UTF-8: {}", file_path, e))
        })
    }

    /// Make a band readable from local storage.
    ///
    /// Directory products hand out the band in place. Archive members are
    /// streamed into a scratch file under `scratch_dir` (or the system
    /// temporary directory).
    pub fn materialize(&mut self, band: &BandFile, scratch_dir: Option<&Path>) -> SclResult<LocalBand> {
        match &mut self.source {
            ProductSource::Directory(root) => Ok(LocalBand {
                path: root.join(&band.path),
                _scratch: None,
            }),
            ProductSource::Archive(archive) => {
                let start = std::time::Instant::now();
                let mut entry = archive.by_name(&band.path).map_err(|e| {
                    SclError::decode(
                        self.product_path.join(&band.path),
                        format!("Failed to access entry: {}", e),
                    )
                })?;

                let suffix = format!(".{}", band.format.extension());
                let mut builder = tempfile::Builder::new();
                builder.prefix("sclmap-").suffix(&suffix);
                let mut scratch = match scratch_dir {
                    Some(dir) => builder.tempfile_in(dir),
                    None => builder.tempfile(),
                }
                .map_err(|e| {
                    SclError::decode(
                        self.product_path.join(&band.path),
                        format!("cannot create scratch file: {}", e),
                    )
                })?;

                std::io::copy(&mut entry, &mut scratch).map_err(|e| {
                    SclError::decode(self.product_path.join(&band.path), e)
                })?;
                log::debug!("Band extraction took: {:?}", start.elapsed());

                Ok(LocalBand {
                    path: scratch.path().to_path_buf(),
                    _scratch: Some(scratch),
                })
            }
        }
    }

    /// Read the granule tile metadata for a band, if the product has it
    pub fn read_tile_metadata(&mut self, band: &BandFile) -> SclResult<Option<TileMetadata>> {
        let Some(granule) = band.granule_dir() else {
            return Ok(None);
        };
        let metadata_path = format!("{}/{}", granule, TILE_METADATA_FILE);
        if !self.list_files()?.contains(&metadata_path) {
            log::debug!("No tile metadata at {}", metadata_path);
            return Ok(None);
        }

        let xml_content = self.read_file_as_string(&metadata_path)?;
        MetadataParser::parse_tile_metadata(&xml_content).map(Some)
    }

    /// Read product identification from the product-level metadata file
    pub fn read_product_info(&mut self) -> SclResult<Option<ProductInfo>> {
        let metadata_path = self
            .list_files()?
            .into_iter()
            .filter(|f| file_name(f).eq_ignore_ascii_case(PRODUCT_METADATA_FILE))
            .min_by_key(|f| (f.matches('/').count(), f.clone()));

        match metadata_path {
            Some(path) => {
                let xml_content = self.read_file_as_string(&path)?;
                MetadataParser::parse_product_info(&xml_content).map(Some)
            }
            None => Ok(None),
        }
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
        .unwrap_or(false)
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn collect_files(root: &Path, dir: &Path, files: &mut Vec<String>) -> SclResult<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| SclError::decode(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| SclError::decode(dir, e))?.path();
        if path.is_dir() {
            collect_files(root, &path, files)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(parts.join("/"));
        }
    }
    Ok(())
}
