use anyhow::{Context, Result};
use csv::ReaderBuilder;
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::io::Read;
use std::path::Path;

/// A single cell of a result row.
///
/// Nested arrays and objects are kept as their compact JSON text so that a
/// single odd cell never invalidates the whole result set.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl From<Value> for Scalar {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Scalar::Null,
            Value::Bool(b) => Scalar::Bool(b),
            Value::Number(n) => Scalar::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Scalar::Text(s),
            other => Scalar::Text(other.to_string()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_unit(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Number(n) => serializer.serialize_f64(*n),
            Scalar::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl Scalar {
    /// Numeric coercion with unary-plus semantics: never fails, yields NaN
    /// for anything that is not a number.
    pub fn to_number(&self) -> f64 {
        match self {
            Scalar::Null => 0.0,
            Scalar::Bool(b) => f64::from(u8::from(*b)),
            Scalar::Number(n) => *n,
            Scalar::Text(s) => coerce_text(s),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => f.write_str("null"),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Number(n) => f.write_str(&format_number(*n)),
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

fn coerce_text(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }

    // Radix prefixes are only accepted unsigned ("-0x10" is NaN)
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = trimmed.strip_prefix(prefix) {
            return u64::from_str_radix(digits, radix)
                .map(|v| v as f64)
                .unwrap_or(f64::NAN);
        }
    }

    let (sign, body) = match trimmed.as_bytes()[0] {
        b'-' => (-1.0, &trimmed[1..]),
        b'+' => (1.0, &trimmed[1..]),
        _ => (1.0, trimmed),
    };
    if body == "Infinity" {
        return sign * f64::INFINITY;
    }

    // Rust accepts "inf" and "nan" spellings that are not numbers here
    if body
        .bytes()
        .any(|b| b.is_ascii_alphabetic() && b != b'e' && b != b'E')
    {
        return f64::NAN;
    }

    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Render a number the way it reads in a report: shortest round-trip
/// digits, integers without a trailing fraction, exponent notation below
/// 1e-6 and from 1e21 on, `NaN` and signed `Infinity` spelled out.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n == f64::INFINITY {
        "Infinity".to_string()
    } else if n == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n < 0.0 {
        format!("-{}", format_magnitude(-n))
    } else {
        format_magnitude(n)
    }
}

fn format_magnitude(n: f64) -> String {
    // `{:e}` yields the shortest digits that round-trip, e.g. "1.2345e3"
    let sci = format!("{:e}", n);
    let Some((mantissa, exponent)) = sci.split_once('e') else {
        return n.to_string();
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return n.to_string();
    };
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let len = digits.len() as i32;
    // Position of the decimal point relative to the first digit
    let point = exponent + 1;

    if len <= point && point <= 21 {
        format!("{}{}", digits, "0".repeat((point - len) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{}.{}", int, frac)
    } else if -6 < point && point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else {
        let (lead, rest) = digits.split_at(1);
        let sign = if exponent < 0 { '-' } else { '+' };
        if rest.is_empty() {
            format!("{}e{}{}", lead, sign, exponent.abs())
        } else {
            format!("{}.{}e{}{}", lead, rest, sign, exponent.abs())
        }
    }
}

/// Totally ordered key for a category value.
///
/// Variant order defines the cross-type ordering: booleans, then numbers
/// (numerically), then text (by code point).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CategoryKey {
    Bool(bool),
    Number(OrderedFloat<f64>),
    Text(String),
}

impl CategoryKey {
    /// Null cells have no category.
    pub fn from_scalar(value: &Scalar) -> Option<Self> {
        match value {
            Scalar::Null => None,
            Scalar::Bool(b) => Some(CategoryKey::Bool(*b)),
            Scalar::Number(n) => Some(CategoryKey::Number(OrderedFloat(*n))),
            Scalar::Text(s) => Some(CategoryKey::Text(s.clone())),
        }
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryKey::Bool(b) => write!(f, "{}", b),
            CategoryKey::Number(n) => f.write_str(&format_number(n.into_inner())),
            CategoryKey::Text(s) => f.write_str(s),
        }
    }
}

/// One result row: column name to cell, in the order the columns arrived.
pub type Record = IndexMap<String, Scalar>;

/// The `result` member of a query result. Anything that is not an array of
/// objects is kept verbatim as `Malformed` and charts as "no data".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultSet {
    Rows(Vec<Record>),
    Malformed(Value),
}

impl Default for ResultSet {
    fn default() -> Self {
        ResultSet::Malformed(Value::Null)
    }
}

impl ResultSet {
    pub fn rows(&self) -> Option<&[Record]> {
        match self {
            ResultSet::Rows(rows) => Some(rows),
            ResultSet::Malformed(_) => None,
        }
    }

    /// Read rows from CSV; the header row names the columns and every cell
    /// becomes a text scalar.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);

        let headers: Vec<String> = reader
            .headers()
            .context("Failed to read CSV headers")?
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let csv_record = result.context("Failed to read CSV record")?;
            let record: Record = headers
                .iter()
                .zip(csv_record.iter())
                .map(|(header, cell)| (header.clone(), Scalar::from(cell)))
                .collect();
            rows.push(record);
        }

        Ok(ResultSet::Rows(rows))
    }

    pub fn from_csv_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open CSV file '{}'", path.display()))?;
        Self::from_csv_reader(file)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    String,
    Int,
    Float,
    Date,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregationFn {
    Count,
    Sum,
    Avg,
}

/// A column selected or grouped by in the query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnRef {
    #[serde(deserialize_with = "null_as_default")]
    pub uid: String,
    /// Display label.
    #[serde(deserialize_with = "null_as_default")]
    pub word: String,
    #[serde(deserialize_with = "null_as_default")]
    pub puid: String,
    /// Field name in the result records.
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub children: Vec<Value>,
    #[serde(deserialize_with = "null_as_default")]
    pub measure: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub dimension: bool,
    pub aggregation_fn: Option<AggregationFn>,
    pub data_type: Option<DataType>,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
}

impl ColumnRef {
    pub fn new(name: impl Into<String>, word: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            word: word.into(),
            ..Default::default()
        }
    }

    /// Display label, falling back to the field name.
    pub fn label(&self) -> &str {
        if self.word.is_empty() {
            &self.name
        } else {
            &self.word
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metric {
    #[serde(deserialize_with = "null_as_default")]
    pub resource_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub display_name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub measure: bool,
    #[serde(deserialize_with = "null_as_default")]
    pub dimension: bool,
}

/// Source table of the queried columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableRef {
    #[serde(deserialize_with = "null_as_default")]
    pub uid: String,
    #[serde(deserialize_with = "null_as_default")]
    pub word: String,
    #[serde(deserialize_with = "null_as_default")]
    pub puid: String,
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub children: Vec<ColumnRef>,
    #[serde(deserialize_with = "null_as_default")]
    pub default_date_field_uid: String,
    pub default_date_field: Option<ColumnRef>,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(deserialize_with = "null_as_default")]
    pub datastore_id: i64,
}

/// Visualization discriminator carried in the `type` member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VizType {
    #[serde(rename = "TABLE")]
    Table,
    #[serde(rename = "LINECHART")]
    LineChart,
    #[serde(rename = "COLUMNCHART")]
    ColumnChart,
    #[serde(rename = "PIECHART")]
    PieChart,
    #[serde(rename = "BARCHART")]
    BarChart,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A query, its result rows and the suggested visualization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryResult {
    #[serde(deserialize_with = "null_as_default")]
    pub tables: IndexMap<String, TableRef>,
    #[serde(deserialize_with = "null_as_default")]
    pub select: Vec<ColumnRef>,
    #[serde(deserialize_with = "null_as_default")]
    pub group_by: Vec<ColumnRef>,
    pub result: ResultSet,
    #[serde(deserialize_with = "null_as_default")]
    pub metrics: Vec<Metric>,
    #[serde(rename = "type", deserialize_with = "null_as_default")]
    pub viz_type: VizType,
    pub title: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub description: String,
}

impl QueryResult {
    pub fn from_json(value: &Value) -> Result<Self> {
        serde_json::from_value(value.clone()).context("Input is not a valid query result")
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader).context("Input is not a valid query result")
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
