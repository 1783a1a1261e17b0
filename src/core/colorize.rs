use crate::core::classes::ClassDefinition;
use crate::types::{ClassificationGrid, SclError, SclResult};
use image::RgbImage;

/// Check that every cell of `grid` has an entry in `classes`.
///
/// Reports the first offending cell in row-major order.
pub fn check_codes(grid: &ClassificationGrid, classes: &ClassDefinition) -> SclResult<()> {
    match grid
        .iter_cells()
        .find(|&(_, _, code)| classes.get(code).is_none())
    {
        Some((x, y, code)) => Err(SclError::UnknownClassCode { code, x, y }),
        None => Ok(()),
    }
}

/// Paint one pixel per grid cell with its class color
pub fn colorize(grid: &ClassificationGrid, classes: &ClassDefinition) -> SclResult<RgbImage> {
    let width = u32::try_from(grid.width())
        .map_err(|_| SclError::InvalidGrid(format!("width {} too large", grid.width())))?;
    let height = u32::try_from(grid.height())
        .map_err(|_| SclError::InvalidGrid(format!("height {} too large", grid.height())))?;

    let mut raster = RgbImage::new(width, height);
    for (x, y, code) in grid.iter_cells() {
        let color = classes
            .color_of(code)
            .ok_or(SclError::UnknownClassCode { code, x, y })?;
        raster.put_pixel(x as u32, y as u32, color.into());
    }

    Ok(raster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classes::{ClassEntry, Rgb};

    const GREEN: Rgb = Rgb::new(0, 128, 0);
    const RED: Rgb = Rgb::new(255, 0, 0);
    const BLACK: Rgb = Rgb::new(0, 0, 0);

    fn table() -> ClassDefinition {
        ClassDefinition::new(vec![
            ClassEntry::new(4, "Vegetation", GREEN),
            ClassEntry::new(6, "Water", RED),
            ClassEntry::new(0, "No Data", BLACK),
        ])
        .unwrap()
    }

    #[test]
    fn test_colorize_two_by_two() {
        let grid = ClassificationGrid::from_rows(&[[4u8, 4], [6, 0]]).unwrap();
        let raster = colorize(&grid, &table()).unwrap();

        assert_eq!(raster.dimensions(), (2, 2));
        assert_eq!(raster.get_pixel(0, 0).0, GREEN.to_array());
        assert_eq!(raster.get_pixel(1, 0).0, GREEN.to_array());
        assert_eq!(raster.get_pixel(0, 1).0, RED.to_array());
        assert_eq!(raster.get_pixel(1, 1).0, BLACK.to_array());
    }

    #[test]
    fn test_unknown_code_reports_position() {
        let grid = ClassificationGrid::from_rows(&[[4u8, 4, 4], [4, 9, 7]]).unwrap();

        match colorize(&grid, &table()) {
            Err(SclError::UnknownClassCode { code, x, y }) => {
                assert_eq!((code, x, y), (9, 1, 1));
            }
            other => panic!("expected UnknownClassCode, got {:?}", other),
        }
        assert!(matches!(
            check_codes(&grid, &table()),
            Err(SclError::UnknownClassCode { code: 9, x: 1, y: 1 })
        ));
    }

    #[test]
    fn test_scl_grid_colorizes_with_builtin_table() {
        let codes: Vec<u8> = (0..12).collect();
        let grid = ClassificationGrid::new(4, 3, codes).unwrap();
        let scl = ClassDefinition::scl();

        check_codes(&grid, scl).unwrap();
        let raster = colorize(&grid, scl).unwrap();
        assert_eq!(raster.get_pixel(2, 1).0, scl.color_of(6).unwrap().to_array());
    }
}
