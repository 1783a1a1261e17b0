use crate::types::{ClassCode, SclError, SclResult};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// 8-bit RGB color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self::new(r, g, b)
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(color: Rgb) -> Self {
        color.to_array()
    }
}

impl From<Rgb> for image::Rgb<u8> {
    fn from(color: Rgb) -> Self {
        image::Rgb(color.to_array())
    }
}

/// One class of the classification table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassEntry {
    pub code: ClassCode,
    pub label: String,
    pub color: Rgb,
}

impl ClassEntry {
    pub fn new(code: ClassCode, label: impl Into<String>, color: Rgb) -> Self {
        Self {
            code,
            label: label.into(),
            color,
        }
    }

    /// Text shown next to the swatch in the legend
    pub fn legend_label(&self) -> String {
        format!("{}: {}", self.code, self.label)
    }
}

/// Sentinel-2 SCL no-data code
pub const SCL_NO_DATA: ClassCode = 0;

const SCL_CLASSES: [(ClassCode, &str, Rgb); 12] = [
    (0, "No Data", Rgb::new(0, 0, 0)),
    (1, "Saturated or Defective", Rgb::new(255, 0, 0)),
    (2, "Dark Area Pixels", Rgb::new(105, 105, 105)),
    (3, "Cloud Shadows", Rgb::new(139, 69, 19)),
    (4, "Vegetation", Rgb::new(0, 128, 0)),
    (5, "Not Vegetated", Rgb::new(189, 183, 107)),
    (6, "Water", Rgb::new(0, 0, 255)),
    (7, "Unclassified", Rgb::new(128, 128, 128)),
    (8, "Cloud Medium Probability", Rgb::new(211, 211, 211)),
    (9, "Cloud High Probability", Rgb::new(245, 245, 245)),
    (10, "Thin Cirrus", Rgb::new(0, 255, 255)),
    (11, "Snow / Ice", Rgb::new(147, 112, 219)),
];

lazy_static! {
    static ref SCL_DEFINITION: ClassDefinition = ClassDefinition::build(
        SCL_CLASSES
            .iter()
            .map(|&(code, label, color)| ClassEntry::new(code, label, color))
            .collect(),
        Some(SCL_NO_DATA),
    );
}

/// Ordered, immutable code -> (label, color) table
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDefinition {
    entries: Vec<ClassEntry>,
    index: [Option<usize>; 256],
    no_data: Option<ClassCode>,
}

impl ClassDefinition {
    /// Build a table from entries in legend order. Codes must be unique.
    pub fn new(entries: Vec<ClassEntry>) -> SclResult<Self> {
        Self::validate(&entries)?;
        Ok(Self::build(entries, None))
    }

    /// The Sentinel-2 Scene Classification Layer table
    pub fn scl() -> &'static ClassDefinition {
        &SCL_DEFINITION
    }

    /// Mark `code` as the reserved no-data class
    pub fn with_no_data(mut self, code: ClassCode) -> SclResult<Self> {
        if self.get(code).is_none() {
            return Err(SclError::Config(format!(
                "no-data code {} has no class entry",
                code
            )));
        }
        self.no_data = Some(code);
        Ok(self)
    }

    fn validate(entries: &[ClassEntry]) -> SclResult<()> {
        if entries.is_empty() {
            return Err(SclError::Config("class table is empty".to_string()));
        }
        let mut seen = [false; 256];
        for entry in entries {
            if seen[entry.code as usize] {
                return Err(SclError::Config(format!(
                    "class code {} defined more than once",
                    entry.code
                )));
            }
            seen[entry.code as usize] = true;
        }
        Ok(())
    }

    fn build(entries: Vec<ClassEntry>, no_data: Option<ClassCode>) -> Self {
        let mut index = [None; 256];
        for (i, entry) in entries.iter().enumerate() {
            index[entry.code as usize] = Some(i);
        }
        Self {
            entries,
            index,
            no_data,
        }
    }

    pub fn get(&self, code: ClassCode) -> Option<&ClassEntry> {
        self.index[code as usize].map(|i| &self.entries[i])
    }

    pub fn color_of(&self, code: ClassCode) -> Option<Rgb> {
        self.get(code).map(|e| e.color)
    }

    /// Position of `code` in declared order
    pub fn position(&self, code: ClassCode) -> Option<usize> {
        self.index[code as usize]
    }

    pub fn no_data_code(&self) -> Option<ClassCode> {
        self.no_data
    }

    pub fn entries(&self) -> &[ClassEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ClassEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a ClassDefinition {
    type Item = &'a ClassEntry;
    type IntoIter = std::slice::Iter<'a, ClassEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
