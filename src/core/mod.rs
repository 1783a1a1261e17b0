//! Classification map rendering modules

pub mod classes;
pub mod colorize;
pub mod statistics;
pub mod legend;
pub mod renderer;

// Re-export main types
pub use classes::{ClassDefinition, ClassEntry, Rgb, SCL_NO_DATA};
pub use colorize::{check_codes, colorize};
pub use statistics::{ClassCount, ClassStatistics};
pub use legend::{LegendItem, LegendLayout, LegendStyle, PixelRect};
pub use renderer::{render, MapRenderer, RenderOptions, RenderedImage};
