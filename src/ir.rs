use crate::data::CategoryKey;
use serde::Serialize;
use std::collections::HashMap;

// =============================================================================
// Phase 1: Resolution
// =============================================================================

/// Which logical axis a chart presents as its primary (category) axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisRole {
    Categories,
    Series,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Line,
    Column,
    Bar,
    Pie,
}

impl ChartKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChartKind::Line => "line",
            ChartKind::Column => "column",
            ChartKind::Bar => "bar",
            ChartKind::Pie => "pie",
        }
    }

    /// The per-shape knobs of the alignment engine.
    pub fn shape(self) -> ShapeConfig {
        match self {
            ChartKind::Line | ChartKind::Column => ShapeConfig {
                kind: self,
                primary_axis: AxisRole::Categories,
                sort_slices_by_value: false,
            },
            ChartKind::Bar => ShapeConfig {
                kind: self,
                primary_axis: AxisRole::Series,
                sort_slices_by_value: false,
            },
            ChartKind::Pie => ShapeConfig {
                kind: self,
                primary_axis: AxisRole::Categories,
                sort_slices_by_value: true,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeConfig {
    pub kind: ChartKind,
    pub primary_axis: AxisRole,
    pub sort_slices_by_value: bool,
}

// =============================================================================
// Phase 2: Alignment
// =============================================================================

/// Sorted category axis plus the value -> position lookup built from it.
///
/// `len()` is the length of the sorted axis, which in the default mode keeps
/// duplicate values; a duplicated value resolves to its last position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryIndex {
    pub(crate) categories: Vec<CategoryKey>,
    pub(crate) positions: HashMap<CategoryKey, usize>,
}

impl CategoryIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn categories(&self) -> &[CategoryKey] {
        &self.categories
    }

    pub fn position(&self, key: &CategoryKey) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub fn labels(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.to_string()).collect()
    }
}

/// One measure column projected onto the category axis. `None` marks a
/// position no record wrote to; `Some(NaN)` marks a non-numeric value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub label: String,
    pub values: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slice {
    pub name: String,
    pub value: f64,
}

/// Pie form of a series: slices ordered by value, largest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliceSeries {
    pub label: String,
    pub slices: Vec<Slice>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChartSeries {
    Values(Series),
    Slices(SliceSeries),
}

impl ChartSeries {
    pub fn label(&self) -> &str {
        match self {
            ChartSeries::Values(s) => &s.label,
            ChartSeries::Slices(s) => &s.label,
        }
    }
}

// =============================================================================
// Phase 3: Sink input
// =============================================================================

/// Everything a chart sink needs: the category list and the aligned series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub mount_id: String,
    pub kind: ChartKind,
    pub primary_axis: AxisRole,
    pub title: Option<String>,
    pub categories: Vec<String>,
    pub series: Vec<ChartSeries>,
}

/// Table markup ready to be placed in a container.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSpec {
    pub mount_id: String,
    pub html: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rendered {
    Chart(ChartSpec),
    Table(TableSpec),
}
