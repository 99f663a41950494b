use anyhow::Result;
use std::collections::HashMap;

use crate::data::{ColumnRef, QueryResult, Record};
use crate::graph::Sink;
use crate::ir::{ChartSpec, TableSpec};
use crate::{RenderOptions, UnmatchedField};

/// Column name -> position over the selected columns followed by the
/// group-by columns. A name listed twice resolves to its later position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnIndex {
    positions: HashMap<String, usize>,
    len: usize,
}

impl ColumnIndex {
    pub fn new(select: &[ColumnRef], group_by: &[ColumnRef]) -> Self {
        let mut positions = HashMap::new();
        let mut counter = 0;
        for col in select.iter().chain(group_by) {
            positions.insert(col.name.clone(), counter);
            counter += 1;
        }
        Self {
            positions,
            len: counter,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }
}

/// Lay one record's fields out as a dense row of cell texts.
pub fn project_row(
    record: &Record,
    index: &ColumnIndex,
    policy: UnmatchedField,
) -> Vec<Option<String>> {
    let mut cells: Vec<Option<String>> = vec![None; index.len()];
    for (field, value) in record {
        let position = match (index.position(field), policy) {
            (Some(position), _) => position,
            (None, UnmatchedField::FirstColumn) => 0,
            (None, UnmatchedField::Drop) => {
                tracing::trace!(field = field.as_str(), "dropping field with no table column");
                continue;
            }
        };
        if position >= cells.len() {
            cells.resize(position + 1, None);
        }
        cells[position] = Some(value.to_string());
    }
    cells
}

/// Render a query result as HTML table markup.
pub fn render_table(container_id: &str, query: &QueryResult, options: &RenderOptions) -> TableSpec {
    let index = ColumnIndex::new(&query.select, &query.group_by);

    let mut html = String::from("<table>");
    if !(query.select.is_empty() && query.group_by.is_empty()) {
        html.push_str(&header_html(&query.select, &query.group_by));
    }
    if let Some(rows) = query.result.rows() {
        html.push_str(&body_html(rows, &index, options.unmatched_fields));
    }
    html.push_str("</table>");

    TableSpec {
        mount_id: container_id.to_string(),
        html,
    }
}

fn header_html(select: &[ColumnRef], group_by: &[ColumnRef]) -> String {
    let mut html = String::from("<thead><tr>");
    for col in select.iter().chain(group_by) {
        html.push_str("<th>");
        html.push_str(&escape_html(col.label()));
        html.push_str("</th>");
    }
    html.push_str("</tr></thead>");
    html
}

fn body_html(rows: &[Record], index: &ColumnIndex, policy: UnmatchedField) -> String {
    let mut html = String::from("<tbody>");
    for row in rows {
        html.push_str("<tr>");
        for cell in project_row(row, index, policy) {
            html.push_str("<td>");
            if let Some(text) = cell {
                html.push_str(&escape_html(&text));
            }
            html.push_str("</td>");
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody>");
    html
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Collects table markup; charts need a drawing sink.
#[derive(Debug, Default)]
pub struct HtmlSink {
    tables: Vec<TableSpec>,
}

impl HtmlSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_html(self) -> String {
        self.tables
            .into_iter()
            .map(|t| t.html)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Sink for HtmlSink {
    fn draw_chart(&mut self, chart: &ChartSpec) -> Result<()> {
        anyhow::bail!(
            "Cannot render {} chart '{}' as HTML markup (use json, png or svg output)",
            chart.kind.as_str(),
            chart.mount_id
        )
    }

    fn draw_table(&mut self, table: &TableSpec) -> Result<()> {
        self.tables.push(table.clone());
        Ok(())
    }
}
