//! Chart Configuration
//! Figure sizes and fonts shared by the renderers, overridable from JSON.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Font family used for every label and caption.
    pub font_family: String,
    pub caption_size: f64,
    pub label_size: f64,
    /// Bar chart width; height grows with the number of bars.
    pub bar_width: u32,
    pub bar_row_height: u32,
    pub line_size: (u32, u32),
    /// Size of one cell of the multi-predictor grid.
    pub grid_cell_size: (u32, u32),
    pub map_size: (u32, u32),
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            font_family: "sans-serif".to_string(),
            caption_size: 24.0,
            label_size: 14.0,
            bar_width: 600,
            bar_row_height: 24,
            line_size: (900, 500),
            grid_cell_size: (660, 500),
            map_size: (1800, 1000),
        }
    }
}

impl ChartConfig {
    /// Parse a (possibly partial) JSON override; missing fields keep defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Total bar chart height for `rows` bars, including title and axis areas.
    pub fn bar_height(&self, rows: usize) -> u32 {
        let rows = u32::try_from(rows).unwrap_or(u32::MAX);
        self.bar_row_height.saturating_mul(rows).saturating_add(120)
    }
}
