use crate::core::classes::ClassDefinition;
use crate::core::colorize::check_codes;
use crate::types::{ClassCode, ClassificationGrid, SclResult};

/// Pixel count of one class
#[derive(Debug, Clone, PartialEq)]
pub struct ClassCount {
    pub code: ClassCode,
    pub label: String,
    pub pixels: usize,
}

/// Per-class pixel counts of a grid, in the table's declared order
#[derive(Debug, Clone, PartialEq)]
pub struct ClassStatistics {
    counts: Vec<ClassCount>,
    total: usize,
    no_data: Option<ClassCode>,
}

impl ClassStatistics {
    /// Count pixels per class; unknown codes are an error
    pub fn compute(grid: &ClassificationGrid, classes: &ClassDefinition) -> SclResult<Self> {
        check_codes(grid, classes)?;
        let mut histogram = [0usize; 256];
        for &code in grid.codes().iter() {
            histogram[code as usize] += 1;
        }

        let counts = classes
            .iter()
            .map(|entry| ClassCount {
                code: entry.code,
                label: entry.label.clone(),
                pixels: histogram[entry.code as usize],
            })
            .collect();

        Ok(Self {
            counts,
            total: grid.width() * grid.height(),
            no_data: classes.no_data_code(),
        })
    }

    pub fn counts(&self) -> &[ClassCount] {
        &self.counts
    }

    pub fn total_pixels(&self) -> usize {
        self.total
    }

    pub fn pixels(&self, code: ClassCode) -> usize {
        self.counts
            .iter()
            .find(|c| c.code == code)
            .map(|c| c.pixels)
            .unwrap_or(0)
    }

    /// Pixels outside the no-data class
    pub fn valid_pixels(&self) -> usize {
        match self.no_data {
            Some(code) => self.total - self.pixels(code),
            None => self.total,
        }
    }

    /// Share of all pixels in class `code`, in percent
    pub fn percentage(&self, code: ClassCode) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.pixels(code) as f64 / self.total as f64
    }

    /// Share of valid (non no-data) pixels covered by `codes`, in percent
    pub fn coverage(&self, codes: &[ClassCode]) -> f64 {
        let valid = self.valid_pixels();
        if valid == 0 {
            return 0.0;
        }
        let covered: usize = self
            .counts
            .iter()
            .filter(|c| codes.contains(&c.code) && Some(c.code) != self.no_data)
            .map(|c| c.pixels)
            .sum();
        100.0 * covered as f64 / valid as f64
    }

    /// Log one line per non-empty class
    pub fn log_summary(&self) {
        for count in self.counts.iter().filter(|c| c.pixels > 0) {
            log::info!(
                "  {:>2} {:<26} {:>10} px ({:.2}%)",
                count.code,
                count.label,
                count.pixels,
                self.percentage(count.code)
            );
        }
    }
}
