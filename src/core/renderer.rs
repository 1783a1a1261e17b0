use crate::core::classes::{ClassDefinition, Rgb};
use crate::core::colorize::colorize;
use crate::core::legend::{default_font, px_add, LegendLayout, LegendStyle};
use crate::types::{ClassificationGrid, SclError, SclResult};
use ab_glyph::{FontRef, PxScale};
use image::{ImageFormat, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use serde::Deserialize;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Upper bound for spacing and swatch options, in pixels
pub const MAX_LAYOUT_PX: u32 = 4096;
/// Upper bound for font sizes, in pixels
pub const MAX_FONT_PX: f32 = 1024.0;

/// Layout and styling parameters for the rendered map
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Title drawn above the map, none if unset
    pub title: Option<String>,
    /// Heading of the legend block
    pub legend_title: Option<String>,
    pub background: Rgb,
    pub text_color: Rgb,
    /// Empty border around the whole image in pixels
    pub margin: u32,
    /// Horizontal space between the map and the legend
    pub legend_gap: u32,
    pub swatch_size: u32,
    /// Vertical space between legend rows
    pub row_gap: u32,
    /// Horizontal space between a swatch and its label
    pub label_gap: u32,
    pub font_size: f32,
    pub title_font_size: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            title: Some("Scene Classification Map (SCL)".to_string()),
            legend_title: Some("SCL Classes".to_string()),
            background: Rgb::new(255, 255, 255),
            text_color: Rgb::new(0, 0, 0),
            margin: 16,
            legend_gap: 24,
            swatch_size: 18,
            row_gap: 6,
            label_gap: 8,
            font_size: 16.0,
            title_font_size: 20.0,
        }
    }
}

impl RenderOptions {
    fn legend_style(&self) -> LegendStyle {
        LegendStyle {
            title: self.legend_title.clone(),
            font_size: self.font_size,
            swatch_size: self.swatch_size,
            row_gap: self.row_gap,
            label_gap: self.label_gap,
            text_color: self.text_color,
        }
    }

    fn validate(&self) -> SclResult<()> {
        for (name, size) in [
            ("font_size", self.font_size),
            ("title_font_size", self.title_font_size),
        ] {
            if !(size > 0.0 && size <= MAX_FONT_PX) {
                return Err(SclError::Config(format!(
                    "{} must be in (0, {}], got {}",
                    name, MAX_FONT_PX, size
                )));
            }
        }
        if self.swatch_size == 0 {
            return Err(SclError::Config("swatch_size must be positive".to_string()));
        }
        for (name, value) in [
            ("margin", self.margin),
            ("legend_gap", self.legend_gap),
            ("swatch_size", self.swatch_size),
            ("row_gap", self.row_gap),
            ("label_gap", self.label_gap),
        ] {
            if value > MAX_LAYOUT_PX {
                return Err(SclError::Config(format!(
                    "{} must be at most {} px, got {}",
                    name, MAX_LAYOUT_PX, value
                )));
            }
        }
        Ok(())
    }
}

/// A composed map: colorized raster plus legend on one canvas
#[derive(Debug, Clone)]
pub struct RenderedImage {
    canvas: RgbImage,
    raster_origin: (u32, u32),
    raster_size: (u32, u32),
    legend: LegendLayout,
}

impl RenderedImage {
    pub fn canvas(&self) -> &RgbImage {
        &self.canvas
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.canvas.dimensions()
    }

    /// Top-left corner of the map raster on the canvas
    pub fn raster_origin(&self) -> (u32, u32) {
        self.raster_origin
    }

    pub fn raster_size(&self) -> (u32, u32) {
        self.raster_size
    }

    /// Color of grid cell `(x, y)` as painted on the canvas
    pub fn raster_pixel(&self, x: u32, y: u32) -> Option<Rgb> {
        let (width, height) = self.raster_size;
        if x >= width || y >= height {
            return None;
        }
        let (ox, oy) = self.raster_origin;
        Some(Rgb::from(self.canvas.get_pixel(ox + x, oy + y).0))
    }

    pub fn legend(&self) -> &LegendLayout {
        &self.legend
    }

    /// Encode and persist the image. Consumes the image: it is written once.
    ///
    /// The data goes to a temporary file next to `output_path` that is renamed
    /// into place once complete, so a failed write leaves nothing behind.
    pub fn write_to<P: AsRef<Path>>(self, output_path: P) -> SclResult<()> {
        let output_path = output_path.as_ref();
        let format = output_format(output_path)?;

        let parent = match output_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        if !parent.is_dir() {
            return Err(SclError::write(output_path, "parent directory does not exist"));
        }

        let mut partial = tempfile::Builder::new()
            .prefix(".sclmap-")
            .suffix(".part")
            .tempfile_in(parent)
            .map_err(|e| SclError::write(output_path, e))?;

        {
            let mut writer = BufWriter::new(partial.as_file_mut());
            self.canvas
                .write_to(&mut writer, format)
                .map_err(|e| SclError::write(output_path, e))?;
            writer.flush().map_err(|e| SclError::write(output_path, e))?;
        }

        partial
            .persist(output_path)
            .map_err(|e| SclError::write(output_path, e.error))?;

        log::info!("Classification map saved to {}", output_path.display());
        Ok(())
    }
}

/// Lossless formats the map can be written as, chosen by file extension
fn output_format(path: &Path) -> SclResult<ImageFormat> {
    match ImageFormat::from_path(path) {
        Ok(format @ (ImageFormat::Png | ImageFormat::Tiff | ImageFormat::Bmp)) => Ok(format),
        Ok(other) => Err(SclError::write(
            path,
            format!("{:?} is not a lossless output format", other),
        )),
        Err(e) => Err(SclError::write(path, e)),
    }
}

/// Renders classification grids into map images with a legend
pub struct MapRenderer {
    options: RenderOptions,
    font: FontRef<'static>,
}

impl MapRenderer {
    pub fn new(options: RenderOptions) -> SclResult<Self> {
        options.validate()?;
        Ok(Self {
            options,
            font: default_font()?,
        })
    }

    /// Create a renderer with the default layout
    pub fn standard() -> SclResult<Self> {
        Self::new(RenderOptions::default())
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Compose the map in memory: title on top, raster on the left, legend on the right
    pub fn compose(
        &self,
        grid: &ClassificationGrid,
        classes: &ClassDefinition,
    ) -> SclResult<RenderedImage> {
        let raster = colorize(grid, classes)?;
        let (raster_width, raster_height) = raster.dimensions();
        let opts = &self.options;
        let margin = opts.margin;

        let title_scale = PxScale::from(opts.title_font_size);
        let (title_width, title_block) = match &opts.title {
            Some(title) => {
                let (width, _) = text_size(title_scale, &self.font, title);
                (width, px_add(opts.title_font_size.ceil() as u32, margin)?)
            }
            None => (0, 0),
        };

        let raster_top = px_add(margin, title_block)?;
        let raster_origin = (margin, raster_top);
        let legend_style = opts.legend_style();
        let legend_left = px_add(px_add(margin, raster_width)?, opts.legend_gap)?;
        let legend = LegendLayout::compute(classes, &legend_style, &self.font, (legend_left, raster_top))?;

        let width = px_add(legend.right(), margin)?.max(px_add(px_add(margin, margin)?, title_width)?);
        let height = px_add(px_add(raster_top, raster_height.max(legend.height))?, margin)?;
        log::debug!(
            "Composing {}x{} map ({}x{} raster, {} legend rows)",
            width,
            height,
            raster_width,
            raster_height,
            legend.items.len()
        );

        let mut canvas = RgbImage::from_pixel(width, height, opts.background.into());
        image::imageops::replace(
            &mut canvas,
            &raster,
            raster_origin.0 as i64,
            raster_origin.1 as i64,
        );

        if let Some(title) = &opts.title {
            draw_text_mut(
                &mut canvas,
                opts.text_color.into(),
                margin as i32,
                margin as i32,
                title_scale,
                &self.font,
                title,
            );
        }
        legend.draw(&mut canvas, &legend_style, &self.font);

        Ok(RenderedImage {
            canvas,
            raster_origin,
            raster_size: (raster_width, raster_height),
            legend,
        })
    }

    /// Compose the map and write it to `output_path`
    pub fn render<P: AsRef<Path>>(
        &self,
        grid: &ClassificationGrid,
        classes: &ClassDefinition,
        output_path: P,
    ) -> SclResult<()> {
        let output_path = output_path.as_ref();
        log::info!(
            "Rendering {}x{} classification map to {}",
            grid.width(),
            grid.height(),
            output_path.display()
        );
        self.compose(grid, classes)?.write_to(output_path)
    }
}

/// Render a grid with the default layout
pub fn render<P: AsRef<Path>>(
    grid: &ClassificationGrid,
    classes: &ClassDefinition,
    output_path: P,
) -> SclResult<()> {
    MapRenderer::standard()?.render(grid, classes, output_path)
}
