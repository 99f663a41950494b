use crate::data::QueryResult;
use crate::ir::{CategoryIndex, ChartKind, ChartSeries, ChartSpec};
use crate::resolve::resolve_query;
use crate::transform::{build_index, project_series, project_slices};
use crate::RenderOptions;

/// Mount point of a chart inside its container.
pub fn chart_mount_id(container_id: &str, kind: ChartKind) -> String {
    format!("{}-{}-chart", container_id, kind.as_str())
}

/// Compile a query result into the category list and aligned series of one
/// chart shape.
///
/// All shapes share the same pipeline: index the first group-by column,
/// then project every selected measure onto it. A result that is not an
/// array, or a query without a group-by column, compiles to a chart with no
/// categories and no series.
pub fn compile_chart(
    container_id: &str,
    query: &QueryResult,
    kind: ChartKind,
    options: &RenderOptions,
) -> ChartSpec {
    let shape = kind.shape();
    let resolved = resolve_query(query);

    let (index, series) = match resolved.chartable() {
        Some((rows, field)) if !rows.is_empty() => {
            let index = build_index(rows, field, options.category_mode);
            let series = resolved
                .measures
                .iter()
                .map(|measure| {
                    if shape.sort_slices_by_value {
                        ChartSeries::Slices(project_slices(rows, measure, field, &index))
                    } else {
                        ChartSeries::Values(project_series(rows, measure, field, &index))
                    }
                })
                .collect();
            (index, series)
        }
        _ => (CategoryIndex::empty(), Vec::new()),
    };

    ChartSpec {
        mount_id: chart_mount_id(container_id, kind),
        kind,
        primary_axis: shape.primary_axis,
        title: resolved.title.map(str::to_string),
        categories: index.labels(),
        series,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::AxisRole;
    use crate::CategoryMode;
    use serde_json::json;

    fn make_query() -> QueryResult {
        QueryResult::from_json(&json!({
            "type": "COLUMNCHART",
            "title": "Revenue",
            "select": [
                {"name": "revenue", "word": "Revenue"},
                {"name": "cost", "word": "Cost"}
            ],
            "group_by": [{"name": "month", "word": "Month"}],
            "result": [
                {"month": "2024-03", "revenue": 30, "cost": 12},
                {"month": "2024-01", "revenue": 10, "cost": "4"},
                {"month": "2024-02", "revenue": 20}
            ]
        }))
        .unwrap()
    }

    fn values(series: &ChartSeries) -> Vec<Option<f64>> {
        match series {
            ChartSeries::Values(s) => s.values.clone(),
            ChartSeries::Slices(_) => panic!("expected values"),
        }
    }

    #[test]
    fn test_compile_column_chart() {
        let options = RenderOptions::default();
        let chart = compile_chart("viz", &make_query(), ChartKind::Column, &options);

        assert_eq!(chart.mount_id, "viz-column-chart");
        assert_eq!(chart.title.as_deref(), Some("Revenue"));
        assert_eq!(chart.primary_axis, AxisRole::Categories);
        assert_eq!(chart.categories, vec!["2024-01", "2024-02", "2024-03"]);
        assert_eq!(chart.series.len(), 2);
        assert_eq!(chart.series[0].label(), "Revenue");
        assert_eq!(values(&chart.series[0]), vec![Some(10.0), Some(20.0), Some(30.0)]);

        let cost = values(&chart.series[1]);
        assert_eq!(cost[0], Some(4.0));
        assert!(cost[1].unwrap().is_nan());
        assert_eq!(cost[2], Some(12.0));
    }

    #[test]
    fn test_bar_and_column_share_alignment() {
        let query = make_query();
        let options = RenderOptions::default();
        let column = compile_chart("viz", &query, ChartKind::Column, &options);
        let bar = compile_chart("viz", &query, ChartKind::Bar, &options);
        let line = compile_chart("viz", &query, ChartKind::Line, &options);

        assert_eq!(bar.primary_axis, AxisRole::Series);
        assert_eq!(bar.categories, column.categories);
        // Compared as JSON: the missing cost is NaN, which never equals itself
        let as_json = |chart: &ChartSpec| serde_json::to_value(&chart.series).unwrap();
        assert_eq!(as_json(&bar), as_json(&column));
        assert_eq!(as_json(&line), as_json(&column));
        assert_eq!(line.mount_id, "viz-line-chart");
    }

    #[test]
    fn test_compile_pie_chart() {
        let chart = compile_chart("viz", &make_query(), ChartKind::Pie, &RenderOptions::default());
        match &chart.series[0] {
            ChartSeries::Slices(pie) => {
                let names: Vec<&str> = pie.slices.iter().map(|s| s.name.as_str()).collect();
                assert_eq!(names, vec!["2024-03", "2024-02", "2024-01"]);
            }
            ChartSeries::Values(_) => panic!("expected slices"),
        }
    }

    #[test]
    fn test_unchartable_inputs_compile_empty() {
        let options = RenderOptions::default();
        for input in [
            json!({"select": [{"name": "a"}], "group_by": [{"name": "g"}], "result": []}),
            json!({"select": [{"name": "a"}], "group_by": [{"name": "g"}], "result": {"a": 1}}),
            json!({"select": [{"name": "a"}], "group_by": [{"name": "g"}]}),
            json!({"select": [{"name": "a"}], "result": [{"a": 1, "g": "x"}]}),
        ] {
            let query = QueryResult::from_json(&input).unwrap();
            for kind in [ChartKind::Line, ChartKind::Column, ChartKind::Bar, ChartKind::Pie] {
                let chart = compile_chart("viz", &query, kind, &options);
                assert!(chart.categories.is_empty());
                assert!(chart.series.is_empty());
            }
        }
    }

    #[test]
    fn test_series_length_matches_category_count() {
        let query = QueryResult::from_json(&json!({
            "select": [{"name": "v"}],
            "group_by": [{"name": "g"}],
            "result": [{"g": "b", "v": 1}, {"g": "a", "v": 2}, {"g": "b", "v": 3}, {"v": 4}]
        }))
        .unwrap();
        let chart = compile_chart("viz", &query, ChartKind::Line, &RenderOptions::default());
        assert_eq!(chart.categories.len(), 3);
        assert_eq!(values(&chart.series[0]).len(), 3);

        let options = RenderOptions {
            category_mode: CategoryMode::Distinct,
            ..RenderOptions::default()
        };
        let distinct = compile_chart("viz", &query, ChartKind::Line, &options);
        assert_eq!(distinct.categories, vec!["a", "b"]);
        assert_eq!(values(&distinct.series[0]), vec![Some(2.0), Some(3.0)]);
    }
}
