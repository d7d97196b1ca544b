//! The canonical in-memory representation of every stored dataset.

use std::collections::HashSet;
use std::fmt;

use cabinet_types::Scalar;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Element type of a column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Every value is null (or the column is empty).
    Null,
    Bool,
    Int,
    Float,
    Text,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Text => write!(f, "text"),
        }
    }
}

/// A named, homogeneously typed column. Nulls are allowed in any column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ColumnParts", into = "ColumnParts")]
pub struct Column {
    name: String,
    dtype: DataType,
    values: Vec<Scalar>,
}

#[derive(Clone, Serialize, Deserialize)]
struct ColumnParts {
    name: String,
    dtype: DataType,
    values: Vec<Scalar>,
}

impl TryFrom<ColumnParts> for Column {
    type Error = StoreError;

    fn try_from(parts: ColumnParts) -> Result<Self, Self::Error> {
        Column::with_dtype(parts.name, parts.dtype, parts.values)
    }
}

impl From<Column> for ColumnParts {
    fn from(column: Column) -> Self {
        Self {
            name: column.name,
            dtype: column.dtype,
            values: column.values,
        }
    }
}

impl Column {
    /// Build a column, inferring its type.
    ///
    /// Integers mixed with floats are widened to floats. Any other mix of
    /// non-null types is rejected.
    pub fn new(name: impl Into<String>, mut values: Vec<Scalar>) -> StoreResult<Self> {
        let name = name.into();
        let mut dtype = DataType::Null;
        for value in &values {
            let seen = match value {
                Scalar::Null => continue,
                Scalar::Bool(_) => DataType::Bool,
                Scalar::Int(_) => DataType::Int,
                Scalar::Float(_) => DataType::Float,
                Scalar::Text(_) => DataType::Text,
            };
            dtype = match (dtype, seen) {
                (DataType::Null, t) => t,
                (a, b) if a == b => a,
                (DataType::Int, DataType::Float) | (DataType::Float, DataType::Int) => {
                    DataType::Float
                }
                (a, b) => {
                    return Err(StoreError::unsupported(format!(
                        "column {name:?} mixes {a} and {b} values"
                    )))
                }
            };
        }
        if dtype == DataType::Float {
            for value in &mut values {
                if let Scalar::Int(i) = *value {
                    *value = Scalar::Float(i as f64);
                }
            }
        }
        Ok(Self {
            name,
            dtype,
            values,
        })
    }

    /// Build a column with a declared type.
    ///
    /// An all-null slice of a typed column keeps the declared type; any
    /// non-null value must agree with it.
    pub fn with_dtype(
        name: impl Into<String>,
        dtype: DataType,
        values: Vec<Scalar>,
    ) -> StoreResult<Self> {
        let mut column = Self::new(name, values)?;
        if column.dtype == DataType::Null {
            column.dtype = dtype;
        } else if column.dtype != dtype {
            return Err(StoreError::unsupported(format!(
                "column {:?} declared {dtype} but holds {} values",
                column.name, column.dtype
            )));
        }
        Ok(column)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn slice(&self, start: usize, end: usize) -> Self {
        Self {
            name: self.name.clone(),
            dtype: self.dtype,
            values: self.values[start..end].to_vec(),
        }
    }
}

/// Column-major table: uniquely named columns of equal length.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Column>", into = "Vec<Column>")]
pub struct Table {
    columns: Vec<Column>,
    num_rows: usize,
}

impl TryFrom<Vec<Column>> for Table {
    type Error = StoreError;

    fn try_from(columns: Vec<Column>) -> Result<Self, Self::Error> {
        Table::new(columns)
    }
}

impl From<Table> for Vec<Column> {
    fn from(table: Table) -> Self {
        table.columns
    }
}

impl Table {
    /// Assemble a table, rejecting ragged or duplicate columns.
    pub fn new(columns: Vec<Column>) -> StoreResult<Self> {
        let num_rows = columns.first().map_or(0, Column::len);
        let mut names = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !names.insert(column.name.as_str()) {
                return Err(StoreError::unsupported(format!(
                    "duplicate column name {:?}",
                    column.name
                )));
            }
            if column.len() != num_rows {
                return Err(StoreError::unsupported(format!(
                    "ragged column {:?}: expected {num_rows} values, found {}",
                    column.name,
                    column.len()
                )));
            }
        }
        Ok(Self { columns, num_rows })
    }

    /// A table with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    /// Column names and types in order.
    pub fn schema(&self) -> Vec<(String, DataType)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.dtype))
            .collect()
    }

    /// One row as borrowed cells, in column order.
    pub fn row(&self, index: usize) -> Option<Vec<&Scalar>> {
        (index < self.num_rows).then(|| self.columns.iter().map(|c| &c.values[index]).collect())
    }

    /// Split into consecutive row batches of at most `batch_rows` rows.
    ///
    /// An empty table yields a single empty batch so the schema still
    /// travels with the stream.
    pub fn row_batches(&self, batch_rows: usize) -> Vec<Table> {
        let batch_rows = batch_rows.max(1);
        if self.num_rows == 0 {
            return vec![self.clone()];
        }
        (0..self.num_rows)
            .step_by(batch_rows)
            .map(|start| {
                let end = (start + batch_rows).min(self.num_rows);
                Table {
                    columns: self.columns.iter().map(|c| c.slice(start, end)).collect(),
                    num_rows: end - start,
                }
            })
            .collect()
    }

    /// Append the rows of `other`, which must have the same schema.
    pub fn append(&mut self, other: Table) -> StoreResult<()> {
        if self.columns.is_empty() && self.num_rows == 0 {
            *self = other;
            return Ok(());
        }
        if self.schema() != other.schema() {
            return Err(StoreError::unsupported("batch schema does not match"));
        }
        for (mine, theirs) in self.columns.iter_mut().zip(other.columns) {
            mine.values.extend(theirs.values);
        }
        self.num_rows += other.num_rows;
        Ok(())
    }
}
