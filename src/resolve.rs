use crate::data::{ColumnRef, QueryResult, Record};

/// A query result checked for chartability.
///
/// `rows` is `None` when the result is not an array of records and
/// `category_field` is `None` when no group-by column was supplied; either
/// one means the query cannot be charted categorically.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedQuery<'q> {
    pub rows: Option<&'q [Record]>,
    pub category_field: Option<&'q str>,
    pub measures: &'q [ColumnRef],
    pub title: Option<&'q str>,
}

impl<'q> ResolvedQuery<'q> {
    /// Rows and the category field, when both are usable.
    pub fn chartable(&self) -> Option<(&'q [Record], &'q str)> {
        Some((self.rows?, self.category_field?))
    }
}

/// Resolve the chart roles of a query. Only the first group-by column
/// supplies categories; the rest are ignored.
pub fn resolve_query(query: &QueryResult) -> ResolvedQuery<'_> {
    ResolvedQuery {
        rows: query.result.rows(),
        category_field: query.group_by.first().map(|col| col.name.as_str()),
        measures: &query.select,
        title: query.title.as_deref(),
    }
}
