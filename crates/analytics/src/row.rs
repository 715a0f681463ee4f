//! Row normalization
//!
//! Turns a positional [`RawRow`] into a named, ordered record. Metric values are
//! parsed as `f64`; anything that does not parse to a finite number becomes
//! [`FieldValue::Missing`], serialized as `null`.

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::provider::RawRow;

/// A single normalized field value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Dimension value, kept verbatim
    Text(String),
    /// Parsed metric value
    Number(f64),
    /// Metric value that could not be parsed
    Missing,
}

impl FieldValue {
    /// Numeric value, if any
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Numeric value for summation; missing counts as zero
    pub fn sum_value(&self) -> f64 {
        self.as_f64().unwrap_or(0.0)
    }

    /// Cell text for flat outputs (CSV); missing renders empty
    pub fn to_cell(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Number(n) => n.to_string(),
            Self::Missing => String::new(),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Missing => serializer.serialize_none(),
        }
    }
}

/// A normalized row: field name to value, in query column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedRow {
    fields: Vec<(&'static str, FieldValue)>,
}

impl NormalizedRow {
    /// Insert a field, replacing the value if the name is already present
    pub fn insert(&mut self, name: &'static str, value: FieldValue) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    /// Look up a field by name
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// Fields in column order
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        self.fields.iter().map(|(n, v)| (*n, v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for NormalizedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Parse a metric string, rejecting empty, non-numeric and non-finite values
pub fn parse_metric(raw: &str) -> FieldValue {
    match raw.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => FieldValue::Number(n),
        _ => FieldValue::Missing,
    }
}

/// Decode a raw row against the names it was queried with
///
/// The i-th dimension value maps to the i-th dimension name, likewise for
/// metrics. Short rows yield empty dimensions and missing metrics; extra
/// values are ignored.
pub fn normalize(
    row: &RawRow,
    dimensions: &[&'static str],
    metrics: &[&'static str],
) -> NormalizedRow {
    let mut out = NormalizedRow {
        fields: Vec::with_capacity(dimensions.len() + metrics.len()),
    };

    for (i, name) in dimensions.iter().enumerate() {
        let value = row.dimension_values.get(i).cloned().unwrap_or_default();
        out.insert(name, FieldValue::Text(value));
    }

    for (i, name) in metrics.iter().enumerate() {
        let value = row
            .metric_values
            .get(i)
            .map(|v| parse_metric(v))
            .unwrap_or(FieldValue::Missing);
        out.insert(name, value);
    }

    out
}

/// Normalize a whole batch
pub fn normalize_batch(
    rows: &[RawRow],
    dimensions: &[&'static str],
    metrics: &[&'static str],
) -> Vec<NormalizedRow> {
    rows.iter()
        .map(|row| normalize(row, dimensions, metrics))
        .collect()
}
