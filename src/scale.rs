use crate::ir::{ChartKind, ChartSeries, ChartSpec};

/// Continuous scale for the value axis of a categorical chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueScale {
    pub domain: (f64, f64),
}

/// Categorical scale: one unit-wide band per category, centred on the
/// category's index so axis ticks (placed on integers) sit mid-band.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryScale {
    pub categories: Vec<String>,
}

impl CategoryScale {
    pub fn new(categories: &[String]) -> Self {
        Self {
            categories: categories.to_vec(),
        }
    }

    /// Band range; a chart without categories still gets one empty band.
    pub fn range(&self) -> (f64, f64) {
        (-0.5, self.categories.len().max(1) as f64 - 0.5)
    }

    pub fn center(&self, index: usize) -> f64 {
        index as f64
    }

    /// Label under an axis tick; ticks between band centres stay blank.
    pub fn label_at(&self, coord: f64) -> String {
        let nearest = coord.round();
        if nearest < 0.0 || (coord - nearest).abs() > 1e-6 {
            return String::new();
        }
        self.categories
            .get(nearest as usize)
            .cloned()
            .unwrap_or_default()
    }
}

/// Build the value scale for a chart's series.
///
/// Empty slots and non-finite values are ignored. Bar and column charts
/// always include zero so bars have a baseline.
pub fn build_value_scale(chart: &ChartSpec) -> ValueScale {
    let mut mm = MinMax::default();
    for series in &chart.series {
        match series {
            ChartSeries::Values(s) => s.values.iter().flatten().for_each(|&v| mm.include(v)),
            ChartSeries::Slices(s) => s.slices.iter().for_each(|slice| mm.include(slice.value)),
        }
    }

    let has_bars = matches!(chart.kind, ChartKind::Bar | ChartKind::Column);
    if has_bars && mm.is_set() {
        mm.include(0.0);
    }

    ValueScale {
        domain: mm.padded(),
    }
}

#[derive(Debug, Clone)]
struct MinMax {
    min: f64,
    max: f64,
}

impl Default for MinMax {
    fn default() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl MinMax {
    fn include(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    fn is_set(&self) -> bool {
        self.min <= self.max
    }

    fn padded(&self) -> (f64, f64) {
        if !self.is_set() {
            return (0.0, 1.0);
        }
        pad_range(self.min, self.max)
    }
}

fn pad_range(min: f64, max: f64) -> (f64, f64) {
    if min == max {
        (min - 1.0, max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding, max + padding)
    }
}
