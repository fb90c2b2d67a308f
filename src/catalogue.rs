//! Engine-specific projections of a generated table.
//!
//! The pipeline stores each band as a single value/error column pair; the
//! fitting engines want those pairs flattened into separate physical columns
//! in a fixed order with their own naming conventions. The projection is pure
//! relabelling, no value is recomputed.

use crate::bandset::SedCode;
use crate::error::SedError;
use crate::table::{Column, Table};

/// A table laid out for one SED fitting engine, tagged with the base name the
/// serialization layer will write it under (extension applied there).
#[derive(Debug, Clone)]
pub struct Catalogue {
    base_name: String,
    table: Table,
}

impl Catalogue {
    /// Project a band-set table into the fixed column layout `code` expects.
    ///
    /// Fails with [`SedError::UnknownColumn`] when the table is missing the
    /// bookkeeping columns of that engine (it was generated for the other
    /// one, or not by the pipeline at all).
    pub fn project(
        code: SedCode,
        table: &Table,
        base_name: impl Into<String>,
    ) -> Result<Self, SedError> {
        let table = match code {
            SedCode::LePhare => project_lephare(table)?,
            SedCode::Cigale => project_cigale(table)?,
        };
        Ok(Self {
            base_name: base_name.into(),
            table,
        })
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn table(&self) -> &Table {
        &self.table
    }
}

fn require<'t>(table: &'t Table, name: &str) -> Result<&'t Column, SedError> {
    table
        .column(name)
        .ok_or_else(|| SedError::UnknownColumn(name.to_string()))
}

/// LePhare layout: `ID`, then per band the value and its `e_`-prefixed error
/// interleaved, then `Context` and `zs`.
fn project_lephare(table: &Table) -> Result<Table, SedError> {
    let mut out = Table::new();
    out.push(require(table, "ID")?.clone())?;
    for column in table.columns() {
        if let Some(errors) = &column.errors {
            out.push(Column::floats(
                column.name.clone(),
                column.values.as_floats(),
            ))?;
            out.push(Column::floats(format!("e_{}", column.name), errors.clone()))?;
        }
    }
    out.push(require(table, "Context")?.clone())?;
    out.push(require(table, "zs")?.clone())?;
    Ok(out)
}

/// Cigale layout: `id` and `redshift` first, then per band the value and its
/// `_err`-suffixed error.
fn project_cigale(table: &Table) -> Result<Table, SedError> {
    let mut out = Table::new();
    out.push(require(table, "id")?.clone())?;
    out.push(require(table, "redshift")?.clone())?;
    for column in table.columns() {
        if let Some(errors) = &column.errors {
            out.push(Column::floats(
                column.name.clone(),
                column.values.as_floats(),
            ))?;
            out.push(Column::floats(
                format!("{}_err", column.name),
                errors.clone(),
            ))?;
        }
    }
    Ok(out)
}
