//! In-memory column table handed over to the SED fitting engines.
//!
//! Columns are kept in insertion order. A column holds either bare values or a
//! value/error pair; integer columns carry bookkeeping (pixel index, context),
//! float columns carry measurements.

use serde::{Deserialize, Serialize};

use crate::error::SedError;

/// Payload of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValues {
    Int(Vec<i64>),
    Float(Vec<f64>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Int(v) => v.len(),
            ColumnValues::Float(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values widened to f64 regardless of payload type.
    pub fn as_floats(&self) -> Vec<f64> {
        match self {
            ColumnValues::Int(v) => v.iter().map(|&x| x as f64).collect(),
            ColumnValues::Float(v) => v.clone(),
        }
    }
}

/// A named column, optionally paired with per-row errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: ColumnValues,
    pub errors: Option<Vec<f64>>,
}

impl Column {
    pub fn ints(name: impl Into<String>, values: Vec<i64>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Int(values),
            errors: None,
        }
    }

    pub fn floats(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Float(values),
            errors: None,
        }
    }

    pub fn with_errors(name: impl Into<String>, values: Vec<f64>, errors: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Float(values),
            errors: Some(errors),
        }
    }
}

/// An ordered collection of uniquely named, equal-length columns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, enforcing name uniqueness and row-count consistency
    /// (including between a column's values and its errors).
    pub fn push(&mut self, column: Column) -> Result<(), SedError> {
        if self.column(&column.name).is_some() {
            return Err(SedError::Configuration(format!(
                "column '{}' already present in table",
                column.name
            )));
        }
        if let Some(errors) = &column.errors {
            if errors.len() != column.values.len() {
                return Err(SedError::Configuration(format!(
                    "column '{}' has {} values but {} errors",
                    column.name,
                    column.values.len(),
                    errors.len()
                )));
            }
        }
        if let Some(first) = self.columns.first() {
            if column.values.len() != first.values.len() {
                return Err(SedError::Configuration(format!(
                    "column '{}' has {} rows but table has {}",
                    column.name,
                    column.values.len(),
                    first.values.len()
                )));
            }
        }
        self.columns.push(column);
        Ok(())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
