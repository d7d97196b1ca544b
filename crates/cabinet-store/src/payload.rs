//! Accepted input representations and their normalization into [`Table`].

use std::collections::BTreeSet;

use cabinet_types::Scalar;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};
use crate::table::{Column, Table};

/// Name given to the single column of an [`Payload::Array`] without a name.
pub const DEFAULT_ARRAY_COLUMN: &str = "values";

/// One named column of a columnar batch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnInput {
    pub name: String,
    pub values: Vec<Value>,
}

/// Data as callers hand it in. Cells are JSON values; only scalars are legal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// Row-oriented records. Columns are the sorted union of all keys; a
    /// record missing a key contributes a null. Records with no keys at all
    /// are rejected since they cannot carry a row count.
    Rows { records: Vec<Map<String, Value>> },
    /// A columnar batch. All columns must have the same length.
    Columns { columns: Vec<ColumnInput> },
    /// A one-dimensional scalar array.
    Array {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        values: Vec<Value>,
    },
    /// A two-dimensional scalar array, row-major. Columns are `c0..cN`.
    /// Rows must be non-empty.
    Matrix { rows: Vec<Vec<Value>> },
}

impl Payload {
    /// Short label of the representation, for logs and errors.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Rows { .. } => "rows",
            Self::Columns { .. } => "columns",
            Self::Array { .. } => "array",
            Self::Matrix { .. } => "matrix",
        }
    }

    /// Convert into the canonical column-major table.
    pub fn normalize(&self) -> StoreResult<Table> {
        match self {
            Self::Rows { records } => normalize_rows(records),
            Self::Columns { columns } => {
                let columns = columns
                    .iter()
                    .map(|c| Column::new(c.name.clone(), scalars(&c.name, &c.values)?))
                    .collect::<StoreResult<Vec<_>>>()?;
                Table::new(columns)
            }
            Self::Array { name, values } => {
                let name = name.as_deref().unwrap_or(DEFAULT_ARRAY_COLUMN);
                Table::new(vec![Column::new(name, scalars(name, values)?)?])
            }
            Self::Matrix { rows } => normalize_matrix(rows),
        }
    }
}

impl From<&Table> for Payload {
    fn from(table: &Table) -> Self {
        Self::Columns {
            columns: table
                .columns()
                .iter()
                .map(|c| ColumnInput {
                    name: c.name().to_string(),
                    values: c.values().iter().map(Scalar::to_json).collect(),
                })
                .collect(),
        }
    }
}

fn scalars(column: &str, values: &[Value]) -> StoreResult<Vec<Scalar>> {
    values
        .iter()
        .map(|v| Scalar::from_json(column, v).map_err(|e| StoreError::unsupported(e.to_string())))
        .collect()
}

fn normalize_rows(records: &[Map<String, Value>]) -> StoreResult<Table> {
    let names: BTreeSet<&String> = records.iter().flat_map(|r| r.keys()).collect();
    if names.is_empty() && !records.is_empty() {
        return Err(StoreError::unsupported(format!(
            "{} records without any fields",
            records.len()
        )));
    }
    let columns = names
        .into_iter()
        .map(|name| {
            let values = records
                .iter()
                .map(|r| match r.get(name) {
                    Some(v) => Scalar::from_json(name, v)
                        .map_err(|e| StoreError::unsupported(e.to_string())),
                    None => Ok(Scalar::Null),
                })
                .collect::<StoreResult<Vec<_>>>()?;
            Column::new(name.clone(), values)
        })
        .collect::<StoreResult<Vec<_>>>()?;
    Table::new(columns)
}

fn normalize_matrix(rows: &[Vec<Value>]) -> StoreResult<Table> {
    let width = rows.first().map_or(0, Vec::len);
    if width == 0 && !rows.is_empty() {
        return Err(StoreError::unsupported(format!(
            "matrix of {} empty rows",
            rows.len()
        )));
    }
    if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
        return Err(StoreError::unsupported(format!(
            "ragged matrix: row {i} has {} values, expected {width}",
            row.len()
        )));
    }
    let columns = (0..width)
        .map(|j| {
            let name = format!("c{j}");
            let values = rows
                .iter()
                .map(|r| {
                    Scalar::from_json(&name, &r[j]).map_err(|e| StoreError::unsupported(e.to_string()))
                })
                .collect::<StoreResult<Vec<_>>>()?;
            Column::new(name, values)
        })
        .collect::<StoreResult<Vec<_>>>()?;
    Table::new(columns)
}
