//! Column cache for fast per-document value lookups during scoring.
//!
//! A query names the columns it wants up front. Each name carries its logical
//! type as a substring (`_int`, `_long`, `_float`, `_double`), which decides the
//! typed array the values are loaded into. Names without one of these markers
//! are rejected when the query is constructed.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{PilumError, Result};
use crate::segment::{DocId, SegmentReader};

/// A numeric value stored in a segment column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumericValue {
    Int(i64),
    Float(f64),
}

impl NumericValue {
    fn as_i64(&self) -> i64 {
        match self {
            NumericValue::Int(v) => *v,
            NumericValue::Float(v) => *v as i64,
        }
    }

    fn as_f64(&self) -> f64 {
        match self {
            NumericValue::Int(v) => *v as f64,
            NumericValue::Float(v) => *v,
        }
    }
}

impl From<i64> for NumericValue {
    fn from(value: i64) -> Self {
        NumericValue::Int(value)
    }
}

impl From<i32> for NumericValue {
    fn from(value: i32) -> Self {
        NumericValue::Int(value as i64)
    }
}

impl From<f64> for NumericValue {
    fn from(value: f64) -> Self {
        NumericValue::Float(value)
    }
}

impl From<f32> for NumericValue {
    fn from(value: f32) -> Self {
        NumericValue::Float(value as f64)
    }
}

/// Logical type of a cached column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int,
    Long,
    Float,
    Double,
}

impl ColumnType {
    /// Resolve the type from the naming convention. Markers are probed in the
    /// order `_int`, `_long`, `_float`, `_double`.
    pub fn from_name(name: &str) -> Result<Self> {
        if name.contains("_int") {
            Ok(ColumnType::Int)
        } else if name.contains("_long") {
            Ok(ColumnType::Long)
        } else if name.contains("_float") {
            Ok(ColumnType::Float)
        } else if name.contains("_double") {
            Ok(ColumnType::Double)
        } else {
            Err(PilumError::config(format!(
                "{name} can only get column cache for _int|_long|_float|_double"
            )))
        }
    }

    /// Get the type name.
    pub fn type_name(&self) -> &'static str {
        match self {
            ColumnType::Int => "int",
            ColumnType::Long => "long",
            ColumnType::Float => "float",
            ColumnType::Double => "double",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A typed, document-indexed array.
#[derive(Debug, Clone)]
pub enum ColumnValues {
    Int(Arc<[i32]>),
    Long(Arc<[i64]>),
    Float(Arc<[f32]>),
    Double(Arc<[f64]>),
}

impl ColumnValues {
    /// Load a column from a segment. Documents without a value read as zero.
    pub fn load(segment: &dyn SegmentReader, name: &str, column_type: ColumnType) -> Self {
        let max_doc = segment.max_doc() as usize;
        let raw = segment.numeric_column(name).unwrap_or(&[]);
        let value_at = |doc: usize| raw.get(doc).copied().flatten();

        match column_type {
            ColumnType::Int => ColumnValues::Int(
                (0..max_doc)
                    .map(|doc| value_at(doc).map_or(0, |v| v.as_i64() as i32))
                    .collect(),
            ),
            ColumnType::Long => ColumnValues::Long(
                (0..max_doc)
                    .map(|doc| value_at(doc).map_or(0, |v| v.as_i64()))
                    .collect(),
            ),
            ColumnType::Float => ColumnValues::Float(
                (0..max_doc)
                    .map(|doc| value_at(doc).map_or(0.0, |v| v.as_f64() as f32))
                    .collect(),
            ),
            ColumnType::Double => ColumnValues::Double(
                (0..max_doc)
                    .map(|doc| value_at(doc).map_or(0.0, |v| v.as_f64()))
                    .collect(),
            ),
        }
    }

    /// Get the logical type.
    pub fn column_type(&self) -> ColumnType {
        match self {
            ColumnValues::Int(_) => ColumnType::Int,
            ColumnValues::Long(_) => ColumnType::Long,
            ColumnValues::Float(_) => ColumnType::Float,
            ColumnValues::Double(_) => ColumnType::Double,
        }
    }

    /// Number of documents covered.
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Int(v) => v.len(),
            ColumnValues::Long(v) => v.len(),
            ColumnValues::Float(v) => v.len(),
            ColumnValues::Double(v) => v.len(),
        }
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pre-loaded columns of one segment, keyed by the requested name.
#[derive(Debug, Clone, Default)]
pub struct ColumnCache {
    columns: AHashMap<String, ColumnValues>,
}

impl ColumnCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that every requested name follows the naming convention.
    pub fn validate<S: AsRef<str>>(requests: &[S]) -> Result<()> {
        for name in requests {
            ColumnType::from_name(name.as_ref())?;
        }
        Ok(())
    }

    /// Load every requested column from a segment.
    pub fn load<S: AsRef<str>>(segment: &dyn SegmentReader, requests: &[S]) -> Result<Self> {
        let mut columns = AHashMap::with_capacity(requests.len());
        for name in requests {
            let name = name.as_ref();
            let column_type = ColumnType::from_name(name)?;
            columns.insert(
                name.to_string(),
                ColumnValues::load(segment, name, column_type),
            );
        }
        Ok(ColumnCache { columns })
    }

    /// Insert an already loaded column.
    pub fn insert<S: Into<String>>(&mut self, name: S, values: ColumnValues) {
        self.columns.insert(name.into(), values);
    }

    /// Check if a column was loaded.
    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Number of loaded columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Check if no column was loaded.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn column(&self, name: &str, expected: ColumnType) -> Result<&ColumnValues> {
        let column = self.columns.get(name).ok_or_else(|| {
            PilumError::config(format!("column <{name}> was not requested by the query"))
        })?;
        if column.column_type() != expected {
            return Err(PilumError::config(format!(
                "column <{name}> holds {} values, not {expected}",
                column.column_type()
            )));
        }
        Ok(column)
    }

    /// Get an int value. Documents outside the column read as zero.
    pub fn get_int(&self, name: &str, doc: DocId) -> Result<i32> {
        match self.column(name, ColumnType::Int)? {
            ColumnValues::Int(values) => Ok(values.get(doc as usize).copied().unwrap_or(0)),
            _ => unreachable!("column type checked"),
        }
    }

    /// Get a long value. Documents outside the column read as zero.
    pub fn get_long(&self, name: &str, doc: DocId) -> Result<i64> {
        match self.column(name, ColumnType::Long)? {
            ColumnValues::Long(values) => Ok(values.get(doc as usize).copied().unwrap_or(0)),
            _ => unreachable!("column type checked"),
        }
    }

    /// Get a float value. Documents outside the column read as zero.
    pub fn get_float(&self, name: &str, doc: DocId) -> Result<f32> {
        match self.column(name, ColumnType::Float)? {
            ColumnValues::Float(values) => Ok(values.get(doc as usize).copied().unwrap_or(0.0)),
            _ => unreachable!("column type checked"),
        }
    }

    /// Get a double value. Documents outside the column read as zero.
    pub fn get_double(&self, name: &str, doc: DocId) -> Result<f64> {
        match self.column(name, ColumnType::Double)? {
            ColumnValues::Double(values) => Ok(values.get(doc as usize).copied().unwrap_or(0.0)),
            _ => unreachable!("column type checked"),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{IndexedDocument, SegmentBuilder};

    #[test]
    fn test_column_type_from_name() {
        assert_eq!(ColumnType::from_name("rank_int").unwrap(), ColumnType::Int);
        assert_eq!(ColumnType::from_name("ts_long").unwrap(), ColumnType::Long);
        assert_eq!(ColumnType::from_name("boost_float").unwrap(), ColumnType::Float);
        assert_eq!(ColumnType::from_name("geo_double_x").unwrap(), ColumnType::Double);
        // `_int` is probed first
        assert_eq!(ColumnType::from_name("a_long_int").unwrap(), ColumnType::Int);

        let err = ColumnType::from_name("rank").unwrap_err();
        assert!(matches!(err, PilumError::Config(_)));
    }

    #[test]
    fn test_load_and_get() {
        let mut builder = SegmentBuilder::new(0);
        builder.add_document(
            IndexedDocument::new()
                .column("rank_int", 3i64)
                .column("boost_float", 1.5f64),
        );
        builder.add_document(IndexedDocument::new().column("rank_int", 9i64));
        let segment = builder.build();

        let cache = ColumnCache::load(&segment, &["rank_int", "boost_float", "size_long"]).unwrap();
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get_int("rank_int", 0).unwrap(), 3);
        assert_eq!(cache.get_int("rank_int", 1).unwrap(), 9);
        assert_eq!(cache.get_float("boost_float", 0).unwrap(), 1.5);
        assert_eq!(cache.get_float("boost_float", 1).unwrap(), 0.0);
        // column never written in the segment reads as zeros
        assert_eq!(cache.get_long("size_long", 1).unwrap(), 0);
        // doc outside of the column
        assert_eq!(cache.get_int("rank_int", 42).unwrap(), 0);
    }

    #[test]
    fn test_unknown_and_mismatched_columns() {
        let segment = SegmentBuilder::new(0).build();
        let cache = ColumnCache::load(&segment, &["rank_int"]).unwrap();

        assert!(matches!(
            cache.get_int("other_int", 0).unwrap_err(),
            PilumError::Config(_)
        ));
        assert!(matches!(
            cache.get_double("rank_int", 0).unwrap_err(),
            PilumError::Config(_)
        ));
        assert!(ColumnCache::load(&segment, &["rank"]).is_err());
        assert!(ColumnCache::validate(&["a_int", "b_double"]).is_ok());
    }
}
