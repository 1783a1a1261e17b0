//! Builders for small synthetic Sentinel-2 L2A products

#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tiff::encoder::{colortype, TiffEncoder};
use tiff::tags::Tag;

pub const GRANULE: &str = "GRANULE/L2A_T32TQP_A039379_20230105T100351";
pub const PRODUCT_NAME: &str = "S2A_MSIL2A_20230105T100351_N0509_R122_T32TQP_20230105T120730";

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Relative path of the SCL band at `resolution_m` inside a product
pub fn band_path(resolution_m: u32) -> String {
    format!(
        "{}/IMG_DATA/R{res}m/T32TQP_20230105T100351_SCL_{res}m.tif",
        GRANULE,
        res = resolution_m
    )
}

/// Encode a georeferenced 8-bit GeoTIFF
pub fn scl_geotiff(width: u32, height: u32, codes: &[u8], resolution_m: u32) -> Vec<u8> {
    let mut buffer = std::io::Cursor::new(Vec::new());
    {
        let mut encoder = TiffEncoder::new(&mut buffer).expect("Failed to create TIFF encoder");
        let mut image = encoder
            .new_image::<colortype::Gray8>(width, height)
            .expect("Failed to start TIFF image");
        let res = resolution_m as f64;
        image
            .encoder()
            .write_tag(Tag::ModelPixelScaleTag, &[res, res, 0.0][..])
            .expect("Failed to write pixel scale");
        image
            .encoder()
            .write_tag(Tag::ModelTiepointTag, &[0.0f64, 0.0, 0.0, 600000.0, 5000040.0, 0.0][..])
            .expect("Failed to write tiepoint");
        image
            .encoder()
            .write_tag(Tag::GeoKeyDirectoryTag, &[1u16, 1, 0, 3, 1024, 0, 1, 1, 1025, 0, 1, 1, 3072, 0, 1, 32632][..])
            .expect("Failed to write geokeys");
        image.write_data(codes).expect("Failed to write TIFF data");
    }
    buffer.into_inner()
}

/// Tile metadata declaring the given `(resolution, width, height)` sizes
pub fn tile_metadata_xml(sizes: &[(u32, u32, u32)]) -> String {
    let mut geocoding = String::new();
    for (res, width, height) in sizes {
        geocoding.push_str(&format!(
            "<Size resolution=\"{}\"><NROWS>{}</NROWS><NCOLS>{}</NCOLS></Size>\n",
            res, height, width
        ));
    }
    for (res, _, _) in sizes {
        geocoding.push_str(&format!(
            "<Geoposition resolution=\"{r}\"><ULX>600000</ULX><ULY>5000040</ULY><XDIM>{r}</XDIM><YDIM>-{r}</YDIM></Geoposition>\n",
            r = res
        ));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<n1:Level-2A_Tile_ID xmlns:n1="https://psd-14.sentinel2.eo.esa.int/PSD/S2_PDI_Level-2A_Tile_Metadata.xsd">
  <n1:General_Info>
    <TILE_ID metadataLevel="Brief">S2A_OPER_MSI_L2A_TL_2APS_20230105T120730_A039379_T32TQP_N05.09</TILE_ID>
    <SENSING_TIME metadataLevel="Standard">2023-01-05T10:08:39.123Z</SENSING_TIME>
  </n1:General_Info>
  <n1:Geometric_Info>
    <Tile_Geocoding metadataLevel="Brief">
      <HORIZONTAL_CS_NAME>WGS84 / UTM zone 32N</HORIZONTAL_CS_NAME>
      <HORIZONTAL_CS_CODE>EPSG:32632</HORIZONTAL_CS_CODE>
      {}
    </Tile_Geocoding>
  </n1:Geometric_Info>
</n1:Level-2A_Tile_ID>"#,
        geocoding
    )
}

pub fn product_metadata_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<n1:Level-2A_User_Product xmlns:n1="https://psd-14.sentinel2.eo.esa.int/PSD/User_Product_Level-2A.xsd">
  <n1:General_Info>
    <Product_Info>
      <PRODUCT_START_TIME>2023-01-05T10:03:51.024Z</PRODUCT_START_TIME>
      <PRODUCT_URI>{}.SAFE</PRODUCT_URI>
      <PRODUCT_TYPE>S2MSI2A</PRODUCT_TYPE>
      <PROCESSING_BASELINE>05.09</PROCESSING_BASELINE>
      <Datatake datatakeIdentifier="GS2A_20230105T100351_039379_N05.09">
        <SPACECRAFT_NAME>Sentinel-2A</SPACECRAFT_NAME>
      </Datatake>
    </Product_Info>
  </n1:General_Info>
</n1:Level-2A_User_Product>"#,
        PRODUCT_NAME
    )
}

/// One SCL band to place in a synthetic product
#[derive(Debug, Clone)]
pub struct FixtureBand {
    pub resolution_m: u32,
    pub width: u32,
    pub height: u32,
    pub codes: Vec<u8>,
}

impl FixtureBand {
    pub fn new(resolution_m: u32, width: u32, height: u32, codes: Vec<u8>) -> Self {
        assert_eq!(codes.len(), (width * height) as usize);
        Self {
            resolution_m,
            width,
            height,
            codes,
        }
    }

    /// A band whose codes cycle through 0..12
    pub fn cycling(resolution_m: u32, width: u32, height: u32) -> Self {
        let codes = (0..width * height).map(|i| (i % 12) as u8).collect();
        Self::new(resolution_m, width, height, codes)
    }
}

/// Product-relative files of a synthetic product
pub fn product_files(bands: &[FixtureBand], with_tile_metadata: bool) -> Vec<(String, Vec<u8>)> {
    let mut files = vec![(
        "MTD_MSIL2A.xml".to_string(),
        product_metadata_xml().into_bytes(),
    )];

    if with_tile_metadata {
        let sizes: Vec<(u32, u32, u32)> = bands
            .iter()
            .map(|b| (b.resolution_m, b.width, b.height))
            .collect();
        files.push((
            format!("{}/MTD_TL.xml", GRANULE),
            tile_metadata_xml(&sizes).into_bytes(),
        ));
    }

    for band in bands {
        files.push((
            band_path(band.resolution_m),
            scl_geotiff(band.width, band.height, &band.codes, band.resolution_m),
        ));
    }
    files
}

/// Write an unpacked `.SAFE` product under `dir`
pub fn write_safe(dir: &Path, files: &[(String, Vec<u8>)]) -> PathBuf {
    let root = dir.join(format!("{}.SAFE", PRODUCT_NAME));
    for (name, content) in files {
        let path = root.join(name);
        std::fs::create_dir_all(path.parent().expect("file has a parent"))
            .expect("Failed to create product directory");
        std::fs::write(&path, content).expect("Failed to write product file");
    }
    root
}

/// Write a zipped product under `dir`; members sit below `<name>.SAFE/` like real archives
pub fn write_zip(dir: &Path, files: &[(String, Vec<u8>)]) -> PathBuf {
    let path = dir.join(format!("{}.zip", PRODUCT_NAME));
    let file = File::create(&path).expect("Failed to create archive");
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default();

    for (name, content) in files {
        zip.start_file(format!("{}.SAFE/{}", PRODUCT_NAME, name), options)
            .expect("Failed to start archive member");
        zip.write_all(content).expect("Failed to write archive member");
    }
    zip.finish().expect("Failed to finish archive");
    path
}

/// Names of the entries directly inside `dir`
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("Failed to read directory")
        .map(|e| e.expect("bad entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
