// Visualization selector and render driver

use anyhow::{Context, Result};
use std::collections::HashMap;

use crate::compiler::compile_chart;
use crate::data::{QueryResult, VizType};
use crate::graph::Sink;
use crate::ir::{ChartKind, Rendered};
use crate::table::render_table;
use crate::RenderOptions;

/// Lookup of render targets by container id.
pub trait Surfaces {
    fn surface(&mut self, id: &str) -> Option<&mut dyn Sink>;
}

impl<S: Sink> Surfaces for HashMap<String, S> {
    fn surface(&mut self, id: &str) -> Option<&mut dyn Sink> {
        self.get_mut(id).map(|sink| sink as &mut dyn Sink)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VizKind {
    Table,
    Chart(ChartKind),
}

impl VizKind {
    pub fn from_viz_type(viz_type: VizType) -> Option<Self> {
        match viz_type {
            VizType::Table => Some(VizKind::Table),
            VizType::LineChart => Some(VizKind::Chart(ChartKind::Line)),
            VizType::ColumnChart => Some(VizKind::Chart(ChartKind::Column)),
            VizType::BarChart => Some(VizKind::Chart(ChartKind::Bar)),
            VizType::PieChart => Some(VizKind::Chart(ChartKind::Pie)),
            VizType::Unknown => None,
        }
    }
}

/// A query result bound to the container it renders into.
#[derive(Debug, Clone)]
pub struct Visualization<'q> {
    container_id: String,
    kind: VizKind,
    query: &'q QueryResult,
}

/// Pick the visualization for a query result's `type`; unrecognised types
/// have none.
pub fn init_viz<'q>(container_id: &str, query: &'q QueryResult) -> Option<Visualization<'q>> {
    let Some(kind) = VizKind::from_viz_type(query.viz_type) else {
        tracing::warn!(
            container = container_id,
            "unrecognised visualization type, nothing to render"
        );
        return None;
    };

    Some(Visualization {
        container_id: container_id.to_string(),
        kind,
        query,
    })
}

impl<'q> Visualization<'q> {
    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn kind(&self) -> VizKind {
        self.kind
    }

    /// Derive the sink input from scratch. Never fails; malformed results
    /// compile to empty charts.
    pub fn compile(&self, options: &RenderOptions) -> Rendered {
        match self.kind {
            VizKind::Table => {
                Rendered::Table(render_table(&self.container_id, self.query, options))
            }
            VizKind::Chart(kind) => {
                Rendered::Chart(compile_chart(&self.container_id, self.query, kind, options))
            }
        }
    }

    /// Compile and hand the result to the container's sink. Returns
    /// `Ok(false)` without compiling when the container does not exist.
    pub fn render(&self, surfaces: &mut dyn Surfaces, options: &RenderOptions) -> Result<bool> {
        let Some(sink) = surfaces.surface(&self.container_id) else {
            tracing::debug!(
                container = self.container_id.as_str(),
                "container not found, skipping render"
            );
            return Ok(false);
        };

        match self.compile(options) {
            Rendered::Chart(chart) => {
                tracing::debug!(
                    mount = chart.mount_id.as_str(),
                    categories = chart.categories.len(),
                    series = chart.series.len(),
                    "drawing chart"
                );
                sink.draw_chart(&chart)
                    .with_context(|| format!("Failed to draw chart '{}'", chart.mount_id))?;
            }
            Rendered::Table(table) => {
                sink.draw_table(&table)
                    .with_context(|| format!("Failed to draw table '{}'", table.mount_id))?;
            }
        }

        Ok(true)
    }
}

/// Select and render in one step. `Ok(false)` means nothing was drawn,
/// either because the type is unrecognised or the container is missing.
pub fn render_viz(
    container_id: &str,
    query: &QueryResult,
    surfaces: &mut dyn Surfaces,
    options: &RenderOptions,
) -> Result<bool> {
    match init_viz(container_id, query) {
        Some(viz) => viz.render(surfaces, options),
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart_options::JsonSink;
    use crate::table::HtmlSink;
    use serde_json::json;

    fn make_query(viz_type: &str) -> QueryResult {
        QueryResult::from_json(&json!({
            "type": viz_type,
            "select": [{"name": "n", "word": "N"}],
            "group_by": [{"name": "k", "word": "K"}],
            "result": [{"k": "b", "n": 2}, {"k": "a", "n": 1}]
        }))
        .unwrap()
    }

    #[test]
    fn test_init_viz_dispatch() {
        let cases = [
            ("TABLE", VizKind::Table),
            ("LINECHART", VizKind::Chart(ChartKind::Line)),
            ("COLUMNCHART", VizKind::Chart(ChartKind::Column)),
            ("BARCHART", VizKind::Chart(ChartKind::Bar)),
            ("PIECHART", VizKind::Chart(ChartKind::Pie)),
        ];
        for (viz_type, expected) in cases {
            let query = make_query(viz_type);
            let viz = init_viz("main", &query).unwrap();
            assert_eq!(viz.kind(), expected, "type {}", viz_type);
            assert_eq!(viz.container_id(), "main");
        }
    }

    #[test]
    fn test_init_viz_unknown_type() {
        let query = make_query("HEATMAP");
        assert!(init_viz("main", &query).is_none());
    }

    #[test]
    fn test_init_viz_null_type() {
        let query = QueryResult::from_json(&json!({"type": null, "result": []})).unwrap();
        assert!(init_viz("main", &query).is_none());
    }

    #[test]
    fn test_compile_is_idempotent() {
        let query = make_query("COLUMNCHART");
        let viz = init_viz("main", &query).unwrap();
        let options = RenderOptions::default();
        assert_eq!(viz.compile(&options), viz.compile(&options));
    }

    #[test]
    fn test_render_into_container() {
        let query = make_query("LINECHART");
        let mut surfaces: HashMap<String, JsonSink> = HashMap::new();
        surfaces.insert("main".to_string(), JsonSink::new());

        let drawn = render_viz("main", &query, &mut surfaces, &RenderOptions::default()).unwrap();
        assert!(drawn);

        let sink = surfaces.remove("main").unwrap();
        let document = sink.into_json();
        assert_eq!(document["chart"]["renderTo"], "main-line-chart");
        assert_eq!(document["xAxis"]["categories"], json!(["a", "b"]));
        assert_eq!(document["series"][0]["data"], json!([1.0, 2.0]));
    }

    #[test]
    fn test_missing_container_is_noop() {
        let query = make_query("TABLE");
        let mut surfaces: HashMap<String, HtmlSink> = HashMap::new();
        surfaces.insert("other".to_string(), HtmlSink::new());

        let drawn = render_viz("main", &query, &mut surfaces, &RenderOptions::default()).unwrap();
        assert!(!drawn);
        let sink = surfaces.remove("other").unwrap();
        assert_eq!(sink.into_html(), "");
    }

    #[test]
    fn test_sink_error_propagates_with_context() {
        let query = make_query("PIECHART");
        let mut surfaces: HashMap<String, HtmlSink> = HashMap::new();
        surfaces.insert("main".to_string(), HtmlSink::new());

        let err = render_viz("main", &query, &mut surfaces, &RenderOptions::default()).unwrap_err();
        assert!(err.to_string().contains("main-pie-chart"));
    }
}
