use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::graph::Sink;
use crate::ir::{ChartKind, ChartSeries, ChartSpec, TableSpec};

/// Options document handed to a browser charting widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartOptions {
    pub chart: ChartSection,
    pub title: TitleSection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_axis: Option<AxisSection>,
    pub series: Vec<SeriesOptions>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSection {
    #[serde(rename = "type")]
    pub chart_type: &'static str,
    pub render_to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitleSection {
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AxisSection {
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesOptions {
    pub name: String,
    #[serde(rename = "type")]
    pub series_type: &'static str,
    pub data: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct PiePoint<'a> {
    name: &'a str,
    y: f64,
}

impl ChartOptions {
    /// Translate a compiled chart. Empty slots and NaN values become `null`.
    pub fn from_chart(chart: &ChartSpec) -> Result<Self> {
        let series_type = chart.kind.as_str();
        let series = chart
            .series
            .iter()
            .map(|series| {
                let data = match series {
                    ChartSeries::Values(s) => s
                        .values
                        .iter()
                        .map(|v| serde_json::to_value(v))
                        .collect::<serde_json::Result<Vec<Value>>>(),
                    ChartSeries::Slices(s) => s
                        .slices
                        .iter()
                        .map(|slice| {
                            serde_json::to_value(PiePoint {
                                name: &slice.name,
                                y: slice.value,
                            })
                        })
                        .collect::<serde_json::Result<Vec<Value>>>(),
                }
                .with_context(|| format!("Failed to serialize series '{}'", series.label()))?;
                Ok(SeriesOptions {
                    name: series.label().to_string(),
                    series_type,
                    data,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ChartOptions {
            chart: ChartSection {
                chart_type: series_type,
                render_to: chart.mount_id.clone(),
            },
            title: TitleSection {
                text: chart.title.clone(),
            },
            // Pie charts have no category axis
            x_axis: (chart.kind != ChartKind::Pie).then(|| AxisSection {
                categories: chart.categories.clone(),
            }),
            series,
        })
    }
}

/// Collects one JSON document per mounted chart or table.
#[derive(Debug, Default)]
pub struct JsonSink {
    documents: Vec<Value>,
}

impl JsonSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn documents(&self) -> &[Value] {
        &self.documents
    }

    /// A single document is returned as-is, several as an array.
    pub fn into_json(mut self) -> Value {
        if self.documents.len() == 1 {
            self.documents.remove(0)
        } else {
            Value::Array(self.documents)
        }
    }
}

impl Sink for JsonSink {
    fn draw_chart(&mut self, chart: &ChartSpec) -> Result<()> {
        let options = ChartOptions::from_chart(chart)?;
        let document = serde_json::to_value(&options)
            .with_context(|| format!("Failed to serialize chart '{}'", chart.mount_id))?;
        self.documents.push(document);
        Ok(())
    }

    fn draw_table(&mut self, table: &TableSpec) -> Result<()> {
        self.documents.push(serde_json::json!({
            "renderTo": table.mount_id,
            "html": table.html,
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_chart;
    use crate::data::QueryResult;
    use crate::RenderOptions;
    use serde_json::json;

    fn make_query() -> QueryResult {
        QueryResult::from_json(&json!({
            "title": "Share",
            "select": [{"name": "value", "word": "Value"}],
            "group_by": [{"name": "label", "word": "Label"}],
            "result": [
                {"label": "A", "value": 10},
                {"label": "B", "value": 30},
                {"label": "C", "value": "oops"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_column_options() {
        let options = RenderOptions::default();
        let chart = compile_chart("viz", &make_query(), ChartKind::Column, &options);
        let mut sink = JsonSink::new();
        sink.draw_chart(&chart).unwrap();

        assert_eq!(
            sink.into_json(),
            json!({
                "chart": {"type": "column", "renderTo": "viz-column-chart"},
                "title": {"text": "Share"},
                "xAxis": {"categories": ["A", "B", "C"]},
                "series": [{"name": "Value", "type": "column", "data": [10.0, 30.0, null]}]
            })
        );
    }

    #[test]
    fn test_pie_options() {
        let chart = compile_chart("viz", &make_query(), ChartKind::Pie, &RenderOptions::default());
        let options = serde_json::to_value(ChartOptions::from_chart(&chart).unwrap()).unwrap();

        assert!(options.get("xAxis").is_none());
        assert_eq!(
            options["series"][0]["data"],
            json!([
                {"name": "B", "y": 30.0},
                {"name": "A", "y": 10.0},
                {"name": "C", "y": null}
            ])
        );
    }

    #[test]
    fn test_table_document() {
        let mut sink = JsonSink::new();
        sink.draw_table(&TableSpec {
            mount_id: "viz".to_string(),
            html: "<table></table>".to_string(),
        })
        .unwrap();
        assert_eq!(sink.documents().len(), 1);
        assert_eq!(sink.into_json()["html"], "<table></table>");
    }
}
