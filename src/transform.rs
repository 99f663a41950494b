use crate::data::{CategoryKey, ColumnRef, Record};
use crate::ir::{CategoryIndex, Series, Slice, SliceSeries};
use crate::CategoryMode;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Category value of a record. Records without the field (or with a null
/// in it) have no category and take no slot on the axis.
pub fn category_of(record: &Record, field: &str) -> Option<CategoryKey> {
    record.get(field).and_then(CategoryKey::from_scalar)
}

/// Build the category axis for `field` and its value -> position lookup.
///
/// The axis is every record's category value in ascending order. Positions
/// are assigned by walking the sorted axis, so in `SortedRows` mode a value
/// seen more than once resolves to the last of its slots and the axis length
/// counts duplicates.
pub fn build_index(records: &[Record], field: &str, mode: CategoryMode) -> CategoryIndex {
    let mut categories: Vec<CategoryKey> = records
        .iter()
        .filter_map(|record| category_of(record, field))
        .collect();
    categories.sort();

    if mode == CategoryMode::Distinct {
        categories.dedup();
    }

    let mut positions = HashMap::with_capacity(categories.len());
    for (position, key) in categories.iter().enumerate() {
        positions.insert(key.clone(), position);
    }

    tracing::debug!(
        field,
        rows = records.len(),
        slots = categories.len(),
        distinct = positions.len(),
        "built category index"
    );

    CategoryIndex {
        categories,
        positions,
    }
}

/// Walk the records in order, yielding each one's axis position, category
/// and coerced measure value.
fn aligned_points<'a>(
    records: &'a [Record],
    measure: &'a ColumnRef,
    field: &'a str,
    index: &'a CategoryIndex,
) -> impl Iterator<Item = (usize, CategoryKey, f64)> + 'a {
    records.iter().filter_map(move |record| {
        let key = category_of(record, field)?;
        let position = index.position(&key)?;
        let value = record
            .get(&measure.name)
            .map_or(f64::NAN, |cell| cell.to_number());
        Some((position, key, value))
    })
}

/// Project one measure column into a dense array aligned with the axis.
/// Later records overwrite earlier ones at the same position.
pub fn project_series(
    records: &[Record],
    measure: &ColumnRef,
    field: &str,
    index: &CategoryIndex,
) -> Series {
    let mut values = vec![None; index.len()];
    for (position, _, value) in aligned_points(records, measure, field, index) {
        values[position] = Some(value);
    }

    Series {
        label: measure.label().to_string(),
        values,
    }
}

/// Project one measure column into pie slices, largest value first.
///
/// Slots no record wrote to produce no slice. Equal values keep their axis
/// order and NaN values sort last.
pub fn project_slices(
    records: &[Record],
    measure: &ColumnRef,
    field: &str,
    index: &CategoryIndex,
) -> SliceSeries {
    let mut slots: Vec<Option<Slice>> = vec![None; index.len()];
    for (position, key, value) in aligned_points(records, measure, field, index) {
        slots[position] = Some(Slice {
            name: key.to_string(),
            value,
        });
    }

    let mut slices: Vec<Slice> = slots.into_iter().flatten().collect();
    slices.sort_by(|a, b| descending(a.value, b.value));

    SliceSeries {
        label: measure.label().to_string(),
        slices,
    }
}

fn descending(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Scalar;

    fn record(fields: &[(&str, Scalar)]) -> Record {
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn sales() -> Vec<Record> {
        vec![
            record(&[("region", "west".into()), ("amount", 20.0.into())]),
            record(&[("region", "east".into()), ("amount", 10.0.into())]),
            record(&[("region", "north".into()), ("amount", "15".into())]),
        ]
    }

    #[test]
    fn test_index_is_sorted_and_contiguous() {
        let index = build_index(&sales(), "region", CategoryMode::SortedRows);
        assert_eq!(index.labels(), vec!["east", "north", "west"]);
        for (i, key) in index.categories().iter().enumerate() {
            assert_eq!(index.position(key), Some(i));
        }
    }

    #[test]
    fn test_projection_aligns_out_of_order_rows() {
        let records = sales();
        let index = build_index(&records, "region", CategoryMode::SortedRows);
        let amount = ColumnRef::new("amount", "Amount");
        let series = project_series(&records, &amount, "region", &index);

        assert_eq!(series.label, "Amount");
        assert_eq!(series.values, vec![Some(10.0), Some(15.0), Some(20.0)]);
    }

    #[test]
    fn test_duplicate_categories_inflate_axis() {
        let records = vec![
            record(&[("region", "a".into()), ("amount", 1.0.into())]),
            record(&[("region", "b".into()), ("amount", 2.0.into())]),
            record(&[("region", "a".into()), ("amount", 3.0.into())]),
        ];
        let index = build_index(&records, "region", CategoryMode::SortedRows);
        assert_eq!(index.len(), 3);
        assert_eq!(index.labels(), vec!["a", "a", "b"]);
        assert_eq!(index.position(&CategoryKey::Text("a".to_string())), Some(1));

        let amount = ColumnRef::new("amount", "Amount");
        let series = project_series(&records, &amount, "region", &index);
        // Leading slot stays empty, last "a" record wins
        assert_eq!(series.values, vec![None, Some(3.0), Some(2.0)]);
    }

    #[test]
    fn test_distinct_mode_deduplicates() {
        let records = vec![
            record(&[("region", "a".into()), ("amount", 1.0.into())]),
            record(&[("region", "b".into()), ("amount", 2.0.into())]),
            record(&[("region", "a".into()), ("amount", 3.0.into())]),
        ];
        let index = build_index(&records, "region", CategoryMode::Distinct);
        assert_eq!(index.labels(), vec!["a", "b"]);

        let series = project_series(&records, &ColumnRef::new("amount", ""), "region", &index);
        assert_eq!(series.label, "amount");
        assert_eq!(series.values, vec![Some(3.0), Some(2.0)]);
    }

    #[test]
    fn test_count_excludes_rows_without_category() {
        let records = vec![
            record(&[("region", "a".into()), ("amount", 1.0.into())]),
            record(&[("amount", 2.0.into())]),
            record(&[("region", Scalar::Null), ("amount", 3.0.into())]),
        ];
        let index = build_index(&records, "region", CategoryMode::SortedRows);
        assert_eq!(index.len(), 1);

        let amount = ColumnRef::new("amount", "Amount");
        let series = project_series(&records, &amount, "region", &index);
        assert_eq!(series.values, vec![Some(1.0)]);
    }

    #[test]
    fn test_invalid_measures_become_nan() {
        let records = vec![
            record(&[("region", "a".into()), ("amount", "n/a".into())]),
            record(&[("region", "b".into())]),
        ];
        let index = build_index(&records, "region", CategoryMode::SortedRows);
        let amount = ColumnRef::new("amount", "Amount");
        let series = project_series(&records, &amount, "region", &index);

        assert_eq!(series.values.len(), 2);
        assert!(series.values.iter().all(|v| v.is_some_and(f64::is_nan)));
    }

    #[test]
    fn test_numeric_categories_sort_numerically() {
        let records = vec![
            record(&[("year", 2020.0.into()), ("amount", 1.0.into())]),
            record(&[("year", 9.0.into()), ("amount", 2.0.into())]),
            record(&[("year", 100.0.into()), ("amount", 3.0.into())]),
        ];
        let index = build_index(&records, "year", CategoryMode::SortedRows);
        assert_eq!(index.labels(), vec!["9", "100", "2020"]);
    }

    #[test]
    fn test_empty_records() {
        let index = build_index(&[], "region", CategoryMode::SortedRows);
        assert!(index.is_empty());
        let series = project_series(&[], &ColumnRef::new("amount", "Amount"), "region", &index);
        assert!(series.values.is_empty());
    }

    #[test]
    fn test_projection_is_idempotent() {
        let records = sales();
        let measure = ColumnRef::new("amount", "Amount");
        let first = build_index(&records, "region", CategoryMode::SortedRows);
        let second = build_index(&records, "region", CategoryMode::SortedRows);
        assert_eq!(first, second);
        assert_eq!(
            project_series(&records, &measure, "region", &first),
            project_series(&records, &measure, "region", &second)
        );
    }

    #[test]
    fn test_slices_sorted_by_value_descending() {
        let records = vec![
            record(&[("label", "A".into()), ("value", 10.0.into())]),
            record(&[("label", "B".into()), ("value", 30.0.into())]),
            record(&[("label", "C".into()), ("value", 20.0.into())]),
        ];
        let index = build_index(&records, "label", CategoryMode::SortedRows);
        let pie = project_slices(&records, &ColumnRef::new("value", "Value"), "label", &index);

        let order: Vec<(&str, f64)> =
            pie.slices.iter().map(|s| (s.name.as_str(), s.value)).collect();
        assert_eq!(order, vec![("B", 30.0), ("C", 20.0), ("A", 10.0)]);
    }

    #[test]
    fn test_slice_ties_keep_axis_order_and_nan_last() {
        let records = vec![
            record(&[("label", "D".into()), ("value", "x".into())]),
            record(&[("label", "C".into()), ("value", 5.0.into())]),
            record(&[("label", "A".into()), ("value", 5.0.into())]),
            record(&[("label", "B".into()), ("value", 7.0.into())]),
        ];
        let index = build_index(&records, "label", CategoryMode::SortedRows);
        let pie = project_slices(&records, &ColumnRef::new("value", "Value"), "label", &index);

        let names: Vec<&str> = pie.slices.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C", "D"]);
    }
}
