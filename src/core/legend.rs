//! Legend layout and drawing.
//!
//! The layout is a pure function of the class table, the style and the font,
//! so the same inputs always place every swatch and label on the same pixels.

use crate::core::classes::{ClassDefinition, Rgb};
use crate::types::{ClassCode, SclError, SclResult};
use ab_glyph::{FontRef, PxScale};
use image::RgbImage;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

static LEGEND_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

/// Load the font bundled with the crate
pub fn default_font() -> SclResult<FontRef<'static>> {
    FontRef::try_from_slice(LEGEND_FONT)
        .map_err(|e| SclError::Config(format!("bundled legend font is invalid: {}", e)))
}

/// Pixel coordinate sum that fails instead of wrapping
pub(crate) fn px_add(a: u32, b: u32) -> SclResult<u32> {
    a.checked_add(b).ok_or_else(|| {
        SclError::Config(format!(
            "map layout exceeds the pixel coordinate range ({} + {})",
            a, b
        ))
    })
}

/// Axis-aligned pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }

    fn to_rect(self) -> Rect {
        Rect::at(self.x as i32, self.y as i32).of_size(self.width, self.height)
    }
}

/// Sizes and colors used to draw the legend
#[derive(Debug, Clone)]
pub struct LegendStyle {
    pub title: Option<String>,
    pub font_size: f32,
    pub swatch_size: u32,
    pub row_gap: u32,
    pub label_gap: u32,
    pub text_color: Rgb,
}

impl LegendStyle {
    fn line_height(&self) -> u32 {
        self.font_size.ceil() as u32
    }

    fn row_height(&self) -> u32 {
        self.swatch_size.max(self.line_height())
    }
}

/// Placement of one class in the legend
#[derive(Debug, Clone, PartialEq)]
pub struct LegendItem {
    pub code: ClassCode,
    pub text: String,
    pub swatch: PixelRect,
    pub color: Rgb,
    pub text_origin: (u32, u32),
}

/// Placement of the whole legend block
#[derive(Debug, Clone, PartialEq)]
pub struct LegendLayout {
    pub origin: (u32, u32),
    pub width: u32,
    pub height: u32,
    pub title_origin: Option<(u32, u32)>,
    pub items: Vec<LegendItem>,
}

impl LegendLayout {
    /// Lay out one row per class, in the table's declared order, starting at `origin`.
    ///
    /// Fails with `Config` if the layout leaves the `u32` pixel range.
    pub fn compute(
        classes: &ClassDefinition,
        style: &LegendStyle,
        font: &FontRef<'_>,
        origin: (u32, u32),
    ) -> SclResult<Self> {
        let scale = PxScale::from(style.font_size);
        let (x0, y0) = origin;
        let line_height = style.line_height();
        let row_height = style.row_height();
        let row_step = px_add(row_height, style.row_gap)?;
        let label_offset = px_add(style.swatch_size, style.label_gap)?;
        let label_x = px_add(x0, label_offset)?;

        let mut width = 0;
        let mut y = y0;

        let title_origin = match &style.title {
            Some(title) => {
                let (title_width, _) = text_size(scale, font, title);
                width = title_width;
                let at = (x0, y);
                y = px_add(y, px_add(line_height, style.row_gap)?)?;
                Some(at)
            }
            None => None,
        };

        let mut items = Vec::with_capacity(classes.len());
        for entry in classes {
            let text = entry.legend_label();
            let (text_width, _) = text_size(scale, font, &text);
            width = width.max(px_add(label_offset, text_width)?);

            items.push(LegendItem {
                code: entry.code,
                swatch: PixelRect {
                    x: x0,
                    y: px_add(y, (row_height - style.swatch_size) / 2)?,
                    width: style.swatch_size,
                    height: style.swatch_size,
                },
                color: entry.color,
                text_origin: (label_x, px_add(y, (row_height - line_height) / 2)?),
                text,
            });
            y = px_add(y, row_step)?;
        }

        // right() must stay representable
        px_add(x0, width)?;
        let height = (y - y0).saturating_sub(style.row_gap);

        Ok(Self {
            origin,
            width,
            height,
            title_origin,
            items,
        })
    }

    /// Rightmost column covered by the legend, exclusive
    pub fn right(&self) -> u32 {
        self.origin.0 + self.width
    }

    /// Bottom row covered by the legend, exclusive
    pub fn bottom(&self) -> u32 {
        self.origin.1 + self.height
    }

    pub fn item(&self, code: ClassCode) -> Option<&LegendItem> {
        self.items.iter().find(|i| i.code == code)
    }

    /// Draw swatches (outlined in the text color) and labels onto `canvas`
    pub fn draw(&self, canvas: &mut RgbImage, style: &LegendStyle, font: &FontRef<'_>) {
        let scale = PxScale::from(style.font_size);
        let text_color: image::Rgb<u8> = style.text_color.into();

        if let (Some(title), Some((x, y))) = (&style.title, self.title_origin) {
            draw_text_mut(canvas, text_color, x as i32, y as i32, scale, font, title);
        }

        for item in &self.items {
            draw_filled_rect_mut(canvas, item.swatch.to_rect(), item.color.into());
            draw_hollow_rect_mut(canvas, item.swatch.to_rect(), text_color);
            let (x, y) = item.text_origin;
            draw_text_mut(canvas, text_color, x as i32, y as i32, scale, font, &item.text);
        }
    }
}
