// Library exports for queryviz

pub mod data;
pub mod graph;
pub mod logging;
pub mod chart_options;
pub mod palette;
pub mod runtime;
pub mod table;

// Render pipeline phases
pub mod ir;
pub mod resolve;
pub mod transform;
pub mod scale;
pub mod compiler;

pub use data::{ColumnRef, QueryResult, Record, ResultSet, Scalar, VizType};
pub use ir::{ChartKind, ChartSeries, ChartSpec, Rendered, Series, SliceSeries, TableSpec};
pub use runtime::{init_viz, render_viz, Surfaces, Visualization};

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
pub enum OutputFormat {
    #[serde(rename = "png")]
    #[default]
    Png,
    #[serde(rename = "svg")]
    Svg,
}

/// How the category axis treats repeated group-by values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CategoryMode {
    /// One axis slot per record, duplicates kept; a repeated value owns its
    /// last slot and the earlier ones stay empty.
    #[default]
    SortedRows,
    /// One axis slot per distinct value.
    Distinct,
}

/// What the table projection does with a record field that names no column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedField {
    #[default]
    Drop,
    /// Write the field into the first column, overwriting it.
    FirstColumn,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RenderOptions {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default, rename = "type")]
    pub format: OutputFormat,
    #[serde(default)]
    pub category_mode: CategoryMode,
    #[serde(default)]
    pub unmatched_fields: UnmatchedField,
}

fn default_width() -> u32 { 800 }
fn default_height() -> u32 { 600 }

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            format: OutputFormat::Png,
            category_mode: CategoryMode::SortedRows,
            unmatched_fields: UnmatchedField::Drop,
        }
    }
}

impl RenderOptions {
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read options file '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid options file '{}'", path.display()))
    }
}
