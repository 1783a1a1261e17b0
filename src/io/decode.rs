use crate::types::{ClassCode, GeoTransform, SclError, SclResult};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tiff::ColorType;

/// GeoKey ids carrying the EPSG code of the raster CRS
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;

/// Internal raster format of a band file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandFormat {
    Jpeg2000,
    GeoTiff,
}

impl BandFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jp2" => Some(BandFormat::Jpeg2000),
            "tif" | "tiff" => Some(BandFormat::GeoTiff),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            BandFormat::Jpeg2000 => "jp2",
            BandFormat::GeoTiff => "tif",
        }
    }
}

/// A fully decoded single-band raster of class codes
#[derive(Debug, Clone)]
pub struct DecodedBand {
    pub width: usize,
    pub height: usize,
    /// Row-major codes, exactly `width * height` long
    pub codes: Vec<ClassCode>,
    pub geo_transform: Option<GeoTransform>,
    pub epsg: Option<u32>,
}

/// Decode a classification band stored at `path`
pub fn decode_band(path: &Path, format: BandFormat) -> SclResult<DecodedBand> {
    log::debug!("Decoding {:?} band {}", format, path.display());
    let start = std::time::Instant::now();

    let band = match format {
        BandFormat::GeoTiff => decode_geotiff(path)?,
        BandFormat::Jpeg2000 => decode_jpeg2000(path)?,
    };

    if band.codes.len() != band.width * band.height {
        return Err(SclError::decode(
            path,
            format!(
                "decoded {} samples for a {}x{} raster",
                band.codes.len(),
                band.width,
                band.height
            ),
        ));
    }

    log::debug!(
        "Decoded {}x{} band in {:?}",
        band.width,
        band.height,
        start.elapsed()
    );
    Ok(band)
}

fn decode_geotiff(path: &Path) -> SclResult<DecodedBand> {
    let file = File::open(path).map_err(|e| SclError::decode(path, e))?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| SclError::decode(path, format!("not a readable TIFF: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| SclError::decode(path, e))?;

    match decoder.colortype().map_err(|e| SclError::decode(path, e))? {
        ColorType::Gray(8) | ColorType::Gray(16) | ColorType::Palette(8) => {}
        other => {
            return Err(SclError::decode(
                path,
                format!("unsupported sample layout {:?}, expected one 8/16-bit channel", other),
            ))
        }
    }

    let geo_transform = read_geotiff_transform(&mut decoder);
    let epsg = read_geotiff_epsg(&mut decoder);

    let codes = match decoder.read_image().map_err(|e| SclError::decode(path, e))? {
        DecodingResult::U8(data) => data,
        DecodingResult::U16(data) => narrow_samples(path, &data)?,
        _ => {
            return Err(SclError::decode(path, "unsupported sample type"));
        }
    };

    Ok(DecodedBand {
        width: width as usize,
        height: height as usize,
        codes,
        geo_transform,
        epsg,
    })
}

/// 16-bit rasters are accepted as long as every value fits a class code
fn narrow_samples(path: &Path, data: &[u16]) -> SclResult<Vec<ClassCode>> {
    data.iter()
        .enumerate()
        .map(|(i, &value)| {
            ClassCode::try_from(value).map_err(|_| {
                SclError::decode(
                    path,
                    format!("sample {} at index {} is not a class code", value, i),
                )
            })
        })
        .collect()
}

fn read_geotiff_transform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Option<GeoTransform> {
    let scale = decoder
        .find_tag(Tag::ModelPixelScaleTag)
        .ok()
        .flatten()?
        .into_f64_vec()
        .ok()?;
    let tiepoint = decoder
        .find_tag(Tag::ModelTiepointTag)
        .ok()
        .flatten()?
        .into_f64_vec()
        .ok()?;

    if scale.len() < 2 || tiepoint.len() < 6 {
        log::warn!("Ignoring malformed GeoTIFF georeferencing tags");
        return None;
    }

    let (raster_i, raster_j) = (tiepoint[0], tiepoint[1]);
    let (model_x, model_y) = (tiepoint[3], tiepoint[4]);
    Some(GeoTransform::north_up(
        model_x - raster_i * scale[0],
        model_y + raster_j * scale[1],
        scale[0],
        -scale[1],
    ))
}

fn read_geotiff_epsg<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let keys = decoder
        .find_tag(Tag::GeoKeyDirectoryTag)
        .ok()
        .flatten()?
        .into_u16_vec()
        .ok()?;
    if keys.len() < 4 {
        return None;
    }

    let count = keys[3] as usize;
    let mut projected = None;
    let mut geographic = None;
    for entry in keys[4..].chunks_exact(4).take(count) {
        // location 0 means the value is stored inline
        if entry[1] != 0 {
            continue;
        }
        match entry[0] {
            PROJECTED_CS_TYPE_GEO_KEY => projected = Some(entry[3] as u32),
            GEOGRAPHIC_TYPE_GEO_KEY => geographic = Some(entry[3] as u32),
            _ => {}
        }
    }
    projected.or(geographic)
}

#[cfg(feature = "gdal")]
fn decode_jpeg2000(path: &Path) -> SclResult<DecodedBand> {
    let dataset = gdal::Dataset::open(path)
        .map_err(|e| SclError::decode(path, format!("Failed to open with GDAL: {}", e)))?;

    let (width, height) = dataset.raster_size();
    let band_count = dataset.raster_count();
    if band_count != 1 {
        return Err(SclError::decode(
            path,
            format!("expected a single band, found {}", band_count),
        ));
    }

    let rasterband = dataset
        .rasterband(1)
        .map_err(|e| SclError::decode(path, format!("Failed to get band 1: {}", e)))?;
    let buffer = rasterband
        .read_as::<u16>((0, 0), (width, height), (width, height), None)
        .map_err(|e| SclError::decode(path, format!("Failed to read band 1: {}", e)))?;
    let (_, data) = buffer.into_shape_and_vec();
    let codes = narrow_samples(path, &data)?;

    let geo_transform = dataset.geo_transform().ok().map(GeoTransform::from_gdal);
    let epsg = dataset
        .spatial_ref()
        .ok()
        .and_then(|srs| srs.auth_code().ok())
        .and_then(|code| u32::try_from(code).ok());

    Ok(DecodedBand {
        width,
        height,
        codes,
        geo_transform,
        epsg,
    })
}

#[cfg(not(feature = "gdal"))]
fn decode_jpeg2000(path: &Path) -> SclResult<DecodedBand> {
    Err(SclError::decode(
        path,
        "JPEG 2000 bands need the `gdal` feature (disabled in this build)",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;
    use tiff::encoder::{colortype, TiffEncoder};

    fn write_gray8(path: &Path, width: u32, height: u32, data: &[u8]) {
        let file = File::create(path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        let mut image = encoder.new_image::<colortype::Gray8>(width, height).unwrap();
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &[20.0f64, 20.0, 0.0][..])
            .unwrap();
        image
            .encoder()
            .write_tag(Tag::ModelTiepointTag, &[0.0f64, 0.0, 0.0, 600000.0, 5000040.0, 0.0][..])
            .unwrap();
        image
            .encoder()
            .write_tag(Tag::GeoKeyDirectoryTag, &[1u16, 1, 0, 3, 1024, 0, 1, 1, 1025, 0, 1, 1, 3072, 0, 1, 32632][..])
            .unwrap();
        image.write_data(data).unwrap();
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(BandFormat::from_extension("JP2"), Some(BandFormat::Jpeg2000));
        assert_eq!(BandFormat::from_extension("tiff"), Some(BandFormat::GeoTiff));
        assert_eq!(BandFormat::from_extension("png"), None);
    }

    #[test]
    fn test_decode_gray8_geotiff() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("T32TQP_SCL_20m.tif");
        write_gray8(&path, 3, 2, &[0, 4, 6, 8, 9, 11]);

        let band = decode_band(&path, BandFormat::GeoTiff).unwrap();
        assert_eq!((band.width, band.height), (3, 2));
        assert_eq!(band.codes, vec![0, 4, 6, 8, 9, 11]);
        assert_eq!(band.epsg, Some(32632));

        let gt = band.geo_transform.unwrap();
        assert_relative_eq!(gt.top_left_x, 600000.0);
        assert_relative_eq!(gt.top_left_y, 5000040.0);
        assert_relative_eq!(gt.pixel_width, 20.0);
        assert_relative_eq!(gt.pixel_height, -20.0);
    }

    #[test]
    fn test_decode_gray16_rejects_wide_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.tif");
        let file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        encoder
            .write_image::<colortype::Gray16>(2, 1, &[3u16, 1000])
            .unwrap();

        let result = decode_band(&path, BandFormat::GeoTiff);
        assert!(matches!(result, Err(SclError::DecodeError { .. })));
    }

    #[test]
    fn test_decode_rgb_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.tif");
        let file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        encoder
            .write_image::<colortype::RGB8>(1, 1, &[1u8, 2, 3])
            .unwrap();

        let err = decode_band(&path, BandFormat::GeoTiff).unwrap_err();
        assert!(err.to_string().contains("unsupported sample layout"));
    }

    #[test]
    fn test_decode_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.tif");
        File::create(&path)
            .unwrap()
            .write_all(b"definitely not a tiff")
            .unwrap();

        let result = decode_band(&path, BandFormat::GeoTiff);
        assert!(matches!(result, Err(SclError::DecodeError { .. })));
    }

    #[test]
    fn test_decode_gray16_with_class_codes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("T32TQP_SCL_60m.tif");
        let file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        encoder
            .write_image::<colortype::Gray16>(3, 1, &[0u16, 11, 255])
            .unwrap();

        let band = decode_band(&path, BandFormat::GeoTiff).unwrap();
        assert_eq!((band.width, band.height), (3, 1));
        assert_eq!(band.codes, vec![0, 11, 255]);
        assert!(band.geo_transform.is_none());
        assert!(band.epsg.is_none());
    }

    #[cfg(feature = "gdal")]
    #[test]
    fn test_gdal_reader_decodes_single_band() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("T32TQP_SCL_20m.tif");
        write_gray8(&path, 3, 2, &[0, 4, 6, 8, 9, 11]);

        // GDAL opens any raster it has a driver for; GeoTIFF needs no optional driver
        let band = decode_jpeg2000(&path).unwrap();
        assert_eq!((band.width, band.height), (3, 2));
        assert_eq!(band.codes, vec![0, 4, 6, 8, 9, 11]);
        assert_eq!(band.epsg, Some(32632));

        let gt = band.geo_transform.unwrap();
        assert_relative_eq!(gt.top_left_x, 600000.0);
        assert_relative_eq!(gt.pixel_height, -20.0);
    }

    #[cfg(feature = "gdal")]
    #[test]
    fn test_gdal_reader_rejects_wide_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wide.tif");
        let file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(file).unwrap();
        encoder
            .write_image::<colortype::Gray16>(2, 1, &[3u16, 1000])
            .unwrap();

        assert!(matches!(
            decode_jpeg2000(&path),
            Err(SclError::DecodeError { .. })
        ));
    }

    #[cfg(feature = "gdal")]
    #[test]
    fn test_gdal_reader_missing_file() {
        let result = decode_band(Path::new("/nonexistent/T32TQP_SCL_20m.jp2"), BandFormat::Jpeg2000);
        assert!(matches!(result, Err(SclError::DecodeError { .. })));
    }

    #[cfg(not(feature = "gdal"))]
    #[test]
    fn test_jpeg2000_without_gdal_is_decode_error() {
        let result = decode_band(Path::new("T32TQP_SCL_20m.jp2"), BandFormat::Jpeg2000);
        assert!(matches!(result, Err(SclError::DecodeError { .. })));
    }
}
